use monitor_core::{RecordDraft, RecordKind, SavedRecord};
use serde_json::Value;

use crate::backend::{authorize, build_client, read_json, send};
use crate::settings::{push_id_segment, BackendSettings};
use crate::{ApiError, FailureKind};

/// REST client for saved-record collections at `/api/<collection>`.
#[derive(Debug, Clone)]
pub struct RecordsClient {
    settings: BackendSettings,
    client: reqwest::Client,
}

impl RecordsClient {
    pub fn new(settings: BackendSettings) -> Result<Self, ApiError> {
        let client = build_client(&settings)?;
        Ok(Self { settings, client })
    }

    pub async fn list(&self, kind: RecordKind) -> Result<Vec<SavedRecord>, ApiError> {
        let url = self.settings.endpoint_url(&collection_path(kind))?;
        let body: Value = read_json(send(authorize(self.client.get(url), &self.settings)).await?).await?;
        decode_list(body)
    }

    pub async fn create(
        &self,
        kind: RecordKind,
        draft: &RecordDraft,
    ) -> Result<SavedRecord, ApiError> {
        validate(draft)?;
        let url = self.settings.endpoint_url(&collection_path(kind))?;
        let builder = self.client.post(url).json(draft);
        read_json(send(authorize(builder, &self.settings)).await?).await
    }

    pub async fn update(
        &self,
        kind: RecordKind,
        id: &str,
        draft: &RecordDraft,
    ) -> Result<SavedRecord, ApiError> {
        validate(draft)?;
        let url = self.record_url(kind, id)?;
        let builder = self.client.put(url).json(draft);
        read_json(send(authorize(builder, &self.settings)).await?).await
    }

    fn record_url(&self, kind: RecordKind, id: &str) -> Result<url::Url, ApiError> {
        push_id_segment(self.settings.endpoint_url(&collection_path(kind))?, id)
    }

    pub async fn delete(&self, kind: RecordKind, id: &str) -> Result<(), ApiError> {
        let url = self.record_url(kind, id)?;
        send(authorize(self.client.delete(url), &self.settings)).await?;
        Ok(())
    }
}

fn collection_path(kind: RecordKind) -> String {
    format!("/api/{}", kind.collection())
}

fn validate(draft: &RecordDraft) -> Result<(), ApiError> {
    draft
        .validate()
        .map_err(|err| ApiError::new(FailureKind::InvalidInput, err.to_string()))
}

/// Accepts a bare array or an object wrapping one (`{"personas": [...]}`, `{"items": [...]}`).
fn decode_list(body: Value) -> Result<Vec<SavedRecord>, ApiError> {
    let items = match body {
        Value::Array(items) => items,
        Value::Object(map) => map
            .into_iter()
            .find_map(|(_, value)| match value {
                Value::Array(items) => Some(items),
                _ => None,
            })
            .unwrap_or_default(),
        other => {
            return Err(ApiError::new(
                FailureKind::Decode,
                format!("expected a list of records, got {other}"),
            ))
        }
    };
    items
        .into_iter()
        .map(|item| {
            serde_json::from_value(item)
                .map_err(|err| ApiError::new(FailureKind::Decode, err.to_string()))
        })
        .collect()
}
