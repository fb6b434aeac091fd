use serde::{Deserialize, Deserializer, Serialize};

use crate::JobStatus;

/// Latest known state of a job. Replaced wholesale on every `progress_update`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    #[serde(default)]
    pub overall_progress: f64,
    #[serde(default)]
    pub current_step: Option<String>,
    #[serde(default)]
    pub steps: Vec<StepProgress>,
    #[serde(default)]
    pub statistics: Statistics,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StepProgress {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub progress: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Statistics {
    #[serde(default, alias = "files_processed", alias = "processed_files")]
    pub processed: u64,
    #[serde(default, alias = "files_failed", alias = "failed_files")]
    pub failed: u64,
    #[serde(default, alias = "chunks_created", alias = "total_chunks")]
    pub chunks: u64,
    #[serde(default, alias = "embeddings_generated", alias = "total_embeddings")]
    pub embeddings: u64,
}

/// Body of `GET .../jobs/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusReport {
    pub status: JobStatus,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub statistics: Option<Statistics>,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// A decoded progress-socket frame.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketFrame {
    /// `progress_update`: full snapshot replacement.
    ProgressUpdate(ProgressSnapshot),
    /// `processing_complete`.
    ProcessingComplete,
    /// `progress` frames of the transform socket.
    StepProgress {
        step: Option<String>,
        status: Option<String>,
    },
    /// `log`: one backend log line.
    Log { message: String },
    /// Any other `type`; ignored by the monitor.
    Unknown { kind: String },
}

/// Accepts ids that the backend sends either as strings or as numbers.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(text) => text,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_tolerates_missing_fields() {
        let snapshot: ProgressSnapshot =
            serde_json::from_str(r#"{"overall_progress":0.5}"#).unwrap();
        assert_eq!(snapshot.overall_progress, 0.5);
        assert!(snapshot.current_step.is_none());
        assert!(snapshot.steps.is_empty());
        assert_eq!(snapshot.statistics, Statistics::default());
    }

    #[test]
    fn step_ids_may_be_numeric() {
        let step: StepProgress =
            serde_json::from_str(r#"{"id":3,"name":"chunk","status":"running","progress":0.1}"#)
                .unwrap();
        assert_eq!(step.id, "3");
    }

    #[test]
    fn statistics_accept_long_field_names() {
        let stats: Statistics = serde_json::from_str(
            r#"{"files_processed":4,"files_failed":1,"chunks_created":40,"embeddings_generated":38}"#,
        )
        .unwrap();
        assert_eq!(
            stats,
            Statistics {
                processed: 4,
                failed: 1,
                chunks: 40,
                embeddings: 38
            }
        );
    }
}
