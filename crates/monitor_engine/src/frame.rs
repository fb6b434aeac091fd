use monitor_core::{ProgressSnapshot, SocketFrame};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("malformed frame: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    step: Value,
    #[serde(default)]
    status: Value,
    #[serde(default)]
    message: Value,
}

/// Decodes one text frame of the progress socket.
///
/// Frames with an unknown or missing `type` decode to [`SocketFrame::Unknown`];
/// only invalid JSON (or an unreadable `progress_update` payload) is an error.
pub fn decode_frame(text: &str) -> Result<SocketFrame, FrameError> {
    let raw: RawFrame = serde_json::from_str(text)?;
    let kind = raw.kind.unwrap_or_default();
    let frame = match kind.as_str() {
        "progress_update" => {
            let snapshot = if raw.data.is_null() {
                ProgressSnapshot::default()
            } else {
                serde_json::from_value(raw.data)?
            };
            SocketFrame::ProgressUpdate(snapshot)
        }
        "processing_complete" => SocketFrame::ProcessingComplete,
        "progress" => SocketFrame::StepProgress {
            step: text_of(&raw.step).or_else(|| raw.data.get("step").and_then(text_of)),
            status: text_of(&raw.status).or_else(|| raw.data.get("status").and_then(text_of)),
        },
        "log" => {
            let message = text_of(&raw.message)
                .or_else(|| raw.data.get("message").and_then(text_of))
                .or_else(|| text_of(&raw.data));
            match message {
                Some(message) => SocketFrame::Log { message },
                None => SocketFrame::Unknown { kind },
            }
        }
        _ => SocketFrame::Unknown { kind },
    };
    Ok(frame)
}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        Value::Object(_) => None,
        other => Some(other.to_string()),
    }
}
