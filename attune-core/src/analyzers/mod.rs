//! Pluggable session analyzers.
//!
//! Analyzers are external collaborators. The registry runs all of them for a
//! session and collects one [`AnalyzerResult`] per analyzer, whatever any
//! single analyzer does.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AnalyzerError;
use crate::events::SessionData;

pub mod builtin;
pub mod registry;

pub use builtin::{EngagementAnalyzer, SensoryRegulationAnalyzer};
pub use registry::{AnalysisReport, AnalyzerRegistry};

/// A session analysis collaborator.
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// One-time setup, run during orchestrator initialization.
    async fn initialize(&self) -> Result<(), AnalyzerError> {
        Ok(())
    }

    /// Analyze one session. `profile` is the stored user profile, if any.
    async fn analyze(
        &self,
        user_id: &str,
        session: &SessionData,
        profile: Option<&Value>,
    ) -> Result<Value, AnalyzerError>;
}

/// Outcome of one analyzer invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalyzerResult {
    Ok { payload: Value },
    Err { reason: String },
}

impl AnalyzerResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }

    pub fn payload(&self) -> Option<&Value> {
        match self {
            Self::Ok { payload } => Some(payload),
            Self::Err { .. } => None,
        }
    }
}

impl From<Result<Value, AnalyzerError>> for AnalyzerResult {
    fn from(result: Result<Value, AnalyzerError>) -> Self {
        match result {
            Ok(payload) => Self::Ok { payload },
            Err(e) => Self::Err {
                reason: e.to_string(),
            },
        }
    }
}
