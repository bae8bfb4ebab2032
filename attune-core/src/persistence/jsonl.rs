//! JSONL file gateway
//!
//! Append-only files under one directory:
//! `sessions.jsonl`, `analyses.jsonl` and `profiles.jsonl`. A profile update
//! appends the merged profile; the last line for a user wins.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;

use super::{AnalysisRecord, PersistenceGateway, SessionRecord, merge_profile};
use crate::error::GatewayError;

const SESSIONS_FILE: &str = "sessions.jsonl";
const ANALYSES_FILE: &str = "analyses.jsonl";
const PROFILES_FILE: &str = "profiles.jsonl";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileLine {
    user_id: String,
    profile: Value,
}

/// File-backed gateway
pub struct JsonlGateway {
    dir: PathBuf,
    /// Serializes profile read-merge-append cycles.
    profile_lock: Mutex<()>,
}

impl JsonlGateway {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            profile_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn ensure_dir(&self) -> Result<(), GatewayError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| GatewayError::new(format!("failed to create {}: {}", self.dir.display(), e)))
    }

    async fn append<T: Serialize>(&self, file: &str, value: &T) -> Result<(), GatewayError> {
        self.ensure_dir().await?;

        let path = self.dir.join(file);
        let mut line = serde_json::to_string(value)
            .map_err(|e| GatewayError::new(format!("failed to serialize record: {}", e)))?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| GatewayError::new(format!("failed to open {}: {}", path.display(), e)))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| GatewayError::new(format!("failed to write {}: {}", path.display(), e)))?;
        file.flush()
            .await
            .map_err(|e| GatewayError::new(format!("failed to flush {}: {}", path.display(), e)))?;
        Ok(())
    }

    /// Parse every line of a file. A missing file reads as empty; unparsable
    /// lines are skipped.
    async fn read_all<T: for<'de> Deserialize<'de>>(&self, file: &str) -> Result<Vec<T>, GatewayError> {
        let path = self.dir.join(file);
        let file = match File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(GatewayError::new(format!("failed to open {}: {}", path.display(), e)));
            }
        };

        let mut lines = BufReader::new(file).lines();
        let mut records = Vec::new();
        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| GatewayError::new(format!("failed to read {}: {}", path.display(), e)))?
        {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "Skipping unparsable line"),
            }
        }
        Ok(records)
    }

    async fn latest_profile(&self, user_id: &str) -> Result<Option<Value>, GatewayError> {
        let lines: Vec<ProfileLine> = self.read_all(PROFILES_FILE).await?;
        Ok(lines
            .into_iter()
            .rev()
            .find(|line| line.user_id == user_id)
            .map(|line| line.profile))
    }

    /// Every stored session, oldest first.
    pub async fn sessions(&self) -> Result<Vec<SessionRecord>, GatewayError> {
        self.read_all(SESSIONS_FILE).await
    }

    /// Every stored analysis, oldest first.
    pub async fn analyses(&self) -> Result<Vec<AnalysisRecord>, GatewayError> {
        self.read_all(ANALYSES_FILE).await
    }
}

#[async_trait]
impl PersistenceGateway for JsonlGateway {
    async fn initialize(&self) -> Result<(), GatewayError> {
        self.ensure_dir().await
    }

    async fn save_analysis_results(&self, record: &AnalysisRecord) -> Result<(), GatewayError> {
        self.append(ANALYSES_FILE, record).await
    }

    async fn save_game_session(&self, record: &SessionRecord) -> Result<(), GatewayError> {
        self.append(SESSIONS_FILE, record).await
    }

    async fn get_profile(&self, user_id: &str) -> Result<Option<Value>, GatewayError> {
        self.latest_profile(user_id).await
    }

    async fn update_profile(&self, user_id: &str, data: &Value) -> Result<(), GatewayError> {
        let _guard = self.profile_lock.lock().await;
        let mut profile = self.latest_profile(user_id).await?.unwrap_or(Value::Null);
        merge_profile(&mut profile, data);
        self.append(
            PROFILES_FILE,
            &ProfileLine {
                user_id: user_id.to_string(),
                profile,
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::SessionMetrics;
    use chrono::Utc;
    use serde_json::json;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn session(user_id: &str) -> SessionRecord {
        SessionRecord {
            id: Uuid::now_v7(),
            user_id: user_id.to_string(),
            activity_id: "memory-match".to_string(),
            session_id: None,
            event_type: "game_end".to_string(),
            metrics: SessionMetrics::default(),
            difficulty: None,
            reviews: Vec::new(),
            recorded_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn sessions_are_appended_in_order() {
        let dir = TempDir::new().unwrap();
        let gateway = JsonlGateway::new(dir.path().join("store"));

        gateway.save_game_session(&session("u1")).await.unwrap();
        gateway.save_game_session(&session("u2")).await.unwrap();

        let sessions = gateway.sessions().await.unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].user_id, "u1");
        assert_eq!(sessions[1].user_id, "u2");
    }

    #[tokio::test]
    async fn initialize_creates_directory() {
        let dir = TempDir::new().unwrap();
        let gateway = JsonlGateway::new(dir.path().join("nested").join("store"));
        gateway.initialize().await.unwrap();
        assert!(gateway.dir().is_dir());
    }

    #[tokio::test]
    async fn initialize_fails_when_path_is_a_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("occupied");
        std::fs::write(&file, "x").unwrap();
        let gateway = JsonlGateway::new(&file);
        assert!(gateway.initialize().await.is_err());
    }

    #[tokio::test]
    async fn missing_files_read_as_empty() {
        let dir = TempDir::new().unwrap();
        let gateway = JsonlGateway::new(dir.path());
        assert!(gateway.sessions().await.unwrap().is_empty());
        assert_eq!(gateway.get_profile("u1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn profile_updates_merge_and_latest_wins() {
        let dir = TempDir::new().unwrap();
        let gateway = JsonlGateway::new(dir.path());

        gateway.update_profile("u1", &json!({"age": 7})).await.unwrap();
        gateway.update_profile("u2", &json!({"age": 9})).await.unwrap();
        gateway
            .update_profile("u1", &json!({"prefers": "visual"}))
            .await
            .unwrap();

        assert_eq!(
            gateway.get_profile("u1").await.unwrap(),
            Some(json!({"age": 7, "prefers": "visual"}))
        );
        assert_eq!(gateway.get_profile("u2").await.unwrap(), Some(json!({"age": 9})));
    }

    #[tokio::test]
    async fn unparsable_lines_are_skipped() {
        let dir = TempDir::new().unwrap();
        let gateway = JsonlGateway::new(dir.path());
        gateway.save_game_session(&session("u1")).await.unwrap();
        tokio::fs::write(
            dir.path().join(SESSIONS_FILE),
            format!(
                "{}\nnot json\n",
                serde_json::to_string(&session("u3")).unwrap()
            ),
        )
        .await
        .unwrap();

        let sessions = gateway.sessions().await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].user_id, "u3");
    }
}
