use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "lighthouse-monitor")]
#[command(version)]
#[command(about = "Follow long-running Lighthouse backend jobs from the terminal")]
pub struct Cli {
    /// RON config file (defaults to ./lighthouse.ron when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Backend base URL, e.g. http://localhost:8100
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// API key sent as a bearer token
    #[arg(long, global = true)]
    pub api_key: Option<String>,

    /// Also log to the terminal, at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start a backend job and follow it until it finishes
    Watch {
        /// Start endpoint; falls back to the configured one
        #[arg(long)]
        endpoint: Option<String>,

        /// JSON file used as the request body
        #[arg(long, conflicts_with = "json")]
        body: Option<PathBuf>,

        /// Inline JSON request body
        #[arg(long)]
        json: Option<String>,
    },

    /// Follow a session that is already running
    Attach { session_id: String },

    /// Manage saved records (personas, namespaces, styles, ...)
    Records {
        #[command(subcommand)]
        action: RecordAction,
    },

    /// List past monitored sessions
    History,
}

#[derive(Debug, Subcommand)]
pub enum RecordAction {
    /// List a collection
    List {
        collection: String,

        /// Case-insensitive filter over name, description and tags
        #[arg(long)]
        search: Option<String>,
    },
    /// Create a record
    Create {
        collection: String,

        #[arg(long)]
        name: String,

        #[arg(long, default_value = "")]
        description: String,

        /// JSON content of the record
        #[arg(long)]
        content: Option<String>,

        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// Replace a record's fields
    Update {
        collection: String,
        id: String,

        #[arg(long)]
        name: String,

        #[arg(long, default_value = "")]
        description: String,

        /// JSON content of the record
        #[arg(long)]
        content: Option<String>,

        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// Delete a record by id
    Delete { collection: String, id: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watch_takes_endpoint_and_inline_body() {
        let cli = Cli::try_parse_from([
            "lighthouse-monitor",
            "--base-url",
            "http://localhost:8100",
            "watch",
            "--endpoint",
            "/api/archive/ingest",
            "--json",
            r#"{"path":"/data"}"#,
        ])
        .unwrap();

        assert_eq!(cli.base_url.as_deref(), Some("http://localhost:8100"));
        let Commands::Watch {
            endpoint,
            body,
            json,
        } = cli.command
        else {
            panic!("expected watch");
        };
        assert_eq!(endpoint.as_deref(), Some("/api/archive/ingest"));
        assert!(body.is_none());
        assert_eq!(json.as_deref(), Some(r#"{"path":"/data"}"#));
    }

    #[test]
    fn body_file_and_inline_json_conflict() {
        let cli = Cli::try_parse_from([
            "lighthouse-monitor",
            "watch",
            "--body",
            "req.json",
            "--json",
            "{}",
        ]);
        assert!(cli.is_err());
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli = Cli::try_parse_from(["lighthouse-monitor", "attach", "abc", "--verbose"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Attach { session_id } if session_id == "abc"));
    }

    #[test]
    fn records_create_collects_tags() {
        let cli = Cli::try_parse_from([
            "lighthouse-monitor",
            "records",
            "create",
            "personas",
            "--name",
            "Archivist",
            "--tag",
            "voice",
            "--tag",
            "dry",
        ])
        .unwrap();
        let Commands::Records {
            action: RecordAction::Create { name, tags, .. },
        } = cli.command
        else {
            panic!("expected records create");
        };
        assert_eq!(name, "Archivist");
        assert_eq!(tags, vec!["voice", "dry"]);
    }

    #[test]
    fn records_update_takes_an_id() {
        let cli = Cli::try_parse_from([
            "lighthouse-monitor",
            "records",
            "update",
            "styles",
            "42",
            "--name",
            "Noir",
        ])
        .unwrap();
        let Commands::Records {
            action: RecordAction::Update { collection, id, name, .. },
        } = cli.command
        else {
            panic!("expected records update");
        };
        assert_eq!((collection.as_str(), id.as_str(), name.as_str()), ("styles", "42", "Noir"));
    }
}
