use std::io::Write;

use anyhow::{Context, Result};
use monitor_core::{RecordDraft, RecordKind, RecordStore, SavedRecord};
use monitor_engine::RecordsClient;
use monitor_logging::monitor_info;

use crate::cli::RecordAction;

/// Runs one `records` subcommand, keeping `store` in step with the backend.
pub(crate) async fn run_records(
    client: &RecordsClient,
    store: &mut RecordStore,
    action: RecordAction,
    out: &mut impl Write,
) -> Result<()> {
    match action {
        RecordAction::List { collection, search } => {
            let kind: RecordKind = collection.parse()?;
            let records = client
                .list(kind)
                .await
                .with_context(|| format!("listing {kind}"))?;
            store.replace(kind, records);

            let shown: Vec<&SavedRecord> = match search.as_deref() {
                Some(query) => store.search(kind, query),
                None => store.list(kind).iter().collect(),
            };
            for record in &shown {
                writeln!(out, "{}", record_line(record))?;
            }
            writeln!(out, "{} {}", shown.len(), kind)?;
        }
        RecordAction::Create {
            collection,
            name,
            description,
            content,
            tags,
        } => {
            let kind: RecordKind = collection.parse()?;
            let draft = draft_from(name, description, content, tags)?;
            let saved = client
                .create(kind, &draft)
                .await
                .with_context(|| format!("creating in {kind}"))?;
            monitor_info!("Created {} record {}", kind, saved.id);
            writeln!(out, "created {}", record_line(&saved))?;
            store.upsert(kind, saved);
        }
        RecordAction::Update {
            collection,
            id,
            name,
            description,
            content,
            tags,
        } => {
            let kind: RecordKind = collection.parse()?;
            let draft = draft_from(name, description, content, tags)?;
            let saved = client
                .update(kind, &id, &draft)
                .await
                .with_context(|| format!("updating {kind}/{id}"))?;
            monitor_info!("Updated {} record {}", kind, saved.id);
            writeln!(out, "updated {}", record_line(&saved))?;
            store.upsert(kind, saved);
        }
        RecordAction::Delete { collection, id } => {
            let kind: RecordKind = collection.parse()?;
            client
                .delete(kind, &id)
                .await
                .with_context(|| format!("deleting {kind}/{id}"))?;
            store.remove(kind, &id);
            monitor_info!("Deleted {} record {}", kind, id);
            writeln!(out, "deleted {id}")?;
        }
    }
    Ok(())
}

fn draft_from(
    name: String,
    description: String,
    content: Option<String>,
    tags: Vec<String>,
) -> Result<RecordDraft> {
    let content = match content {
        Some(text) => serde_json::from_str::<serde_json::Value>(&text)
            .context("--content is not valid JSON")?,
        None => serde_json::Value::Null,
    };
    Ok(RecordDraft {
        name,
        description,
        content,
        tags,
    })
}

fn record_line(record: &SavedRecord) -> String {
    let mut line = format!("{}\t{}", record.id, record.name);
    if !record.tags.is_empty() {
        line.push_str(&format!("\t[{}]", record.tags.join(", ")));
    }
    line
}

#[cfg(test)]
mod tests {
    use monitor_engine::BackendSettings;
    use serde_json::json;
    use url::Url;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client_for(server: &MockServer) -> RecordsClient {
        RecordsClient::new(BackendSettings::new(Url::parse(&server.uri()).unwrap())).unwrap()
    }

    async fn run(server: &MockServer, store: &mut RecordStore, action: RecordAction) -> String {
        let mut out = Vec::new();
        run_records(&client_for(server), store, action, &mut out)
            .await
            .unwrap();
        String::from_utf8(out).unwrap()
    }

    #[tokio::test]
    async fn list_filters_through_the_store() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/styles"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": 1, "name": "Plain", "tags": ["default"]},
                {"id": 2, "name": "Noir", "description": "Hard-boiled"}
            ])))
            .mount(&server)
            .await;

        let mut store = RecordStore::new();
        let printed = run(
            &server,
            &mut store,
            RecordAction::List {
                collection: "styles".to_string(),
                search: Some("boiled".to_string()),
            },
        )
        .await;

        assert_eq!(printed, "2\tNoir\n1 styles\n");
        assert_eq!(store.list(RecordKind::Style).len(), 2);
    }

    #[tokio::test]
    async fn delete_drops_the_cached_record() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/personas/p-1"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let mut store = RecordStore::new();
        store.replace(
            RecordKind::Persona,
            vec![SavedRecord {
                id: "p-1".to_string(),
                name: "Archivist".to_string(),
                description: String::new(),
                content: serde_json::Value::Null,
                tags: Vec::new(),
            }],
        );
        let printed = run(
            &server,
            &mut store,
            RecordAction::Delete {
                collection: "persona".to_string(),
                id: "p-1".to_string(),
            },
        )
        .await;

        assert_eq!(printed, "deleted p-1\n");
        assert!(store.list(RecordKind::Persona).is_empty());
    }

    #[tokio::test]
    async fn update_replaces_the_cached_record() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/styles/2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 2, "name": "Noir", "description": "Rain and neon", "tags": ["mood"]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut store = RecordStore::new();
        let printed = run(
            &server,
            &mut store,
            RecordAction::Update {
                collection: "style".to_string(),
                id: "2".to_string(),
                name: "Noir".to_string(),
                description: "Rain and neon".to_string(),
                content: Some(r#"{"palette":"dark"}"#.to_string()),
                tags: vec!["mood".to_string()],
            },
        )
        .await;

        assert_eq!(printed, "updated 2\tNoir\t[mood]\n");
        assert_eq!(
            store.get(RecordKind::Style, "2").map(|r| r.description.as_str()),
            Some("Rain and neon")
        );
    }

    #[tokio::test]
    async fn unknown_collections_are_rejected_before_any_request() {
        let server = MockServer::start().await;
        let mut store = RecordStore::new();
        let err = run_records(
            &client_for(&server),
            &mut store,
            RecordAction::List {
                collection: "widgets".to_string(),
                search: None,
            },
            &mut Vec::new(),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("widgets"));
    }
}
