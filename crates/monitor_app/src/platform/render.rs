use std::io::{self, Write};

use monitor_core::{LogRowView, LogSeverity, MonitorViewModel};

/// Line-oriented terminal renderer.
///
/// Prints the status line only when it changes and each log line once,
/// tracked by sequence number.
#[derive(Debug, Default)]
pub struct Renderer {
    last_status: Option<String>,
    last_seq: Option<u64>,
    last_error: Option<String>,
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&mut self, view: &MonitorViewModel, out: &mut impl Write) -> io::Result<()> {
        let since = self.last_seq;
        for row in view
            .logs
            .iter()
            .filter(|row| since.is_none_or(|seq| row.seq > seq))
        {
            writeln!(out, "{}", log_line(row))?;
            self.last_seq = Some(row.seq);
        }

        let status = status_line(view);
        if self.last_status.as_deref() != Some(status.as_str()) {
            writeln!(out, "{status}")?;
            self.last_status = Some(status);
        }

        // A failure is also pushed into the log as an error row; print it once.
        if view.error != self.last_error {
            if let Some(error) = &view.error {
                let already_logged = view
                    .logs
                    .iter()
                    .any(|row| row.severity == LogSeverity::Error && row.text == *error);
                if !already_logged {
                    writeln!(out, "error: {error}")?;
                }
            }
            self.last_error = view.error.clone();
        }
        out.flush()
    }
}

pub(crate) fn status_line(view: &MonitorViewModel) -> String {
    let mut line = format!("[{}]", view.status.label());
    if let Some(session_id) = &view.session_id {
        line.push_str(&format!(" {session_id}"));
    }
    if let Some(label) = view.progress_label() {
        line.push_str(&format!(" {label}"));
    }
    if let Some(step) = &view.current_step {
        line.push_str(&format!(" {step}"));
    }
    if let Some(stats) = &view.statistics {
        line.push_str(&format!(
            " (processed {}, failed {}, chunks {}, embeddings {})",
            stats.processed, stats.failed, stats.chunks, stats.embeddings
        ));
    }
    if let Some(note) = &view.channel_note {
        line.push_str(&format!(" - {note}"));
    }
    line
}

fn log_line(row: &LogRowView) -> String {
    let tag = match row.severity {
        LogSeverity::Error => "E",
        LogSeverity::Warning => "W",
        LogSeverity::Info => "I",
        LogSeverity::Plain => " ",
    };
    format!("{tag} | {}", row.text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use monitor_core::{LogSource, SessionId, SessionStatus, Statistics};

    fn processing_view() -> MonitorViewModel {
        MonitorViewModel {
            status: SessionStatus::Processing,
            session_id: Some(SessionId::new("abc")),
            progress_percent: Some(42),
            current_step: Some("embedding".to_string()),
            ..MonitorViewModel::default()
        }
    }

    fn row(seq: u64, text: &str) -> LogRowView {
        LogRowView {
            seq,
            text: text.to_string(),
            severity: LogSeverity::infer(text),
            source: LogSource::Socket,
        }
    }

    fn rendered(renderer: &mut Renderer, view: &MonitorViewModel) -> String {
        let mut out = Vec::new();
        renderer.render(view, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn status_line_shows_percent_and_step() {
        assert_eq!(status_line(&processing_view()), "[processing] abc 42% embedding");
    }

    #[test]
    fn statistics_follow_the_step() {
        let view = MonitorViewModel {
            statistics: Some(Statistics {
                processed: 3,
                failed: 1,
                chunks: 20,
                embeddings: 8,
            }),
            ..processing_view()
        };
        assert!(status_line(&view)
            .ends_with("(processed 3, failed 1, chunks 20, embeddings 8)"));
    }

    #[test]
    fn unchanged_views_print_nothing() {
        let mut renderer = Renderer::new();
        let view = processing_view();
        assert_eq!(rendered(&mut renderer, &view), "[processing] abc 42% embedding\n");
        assert_eq!(rendered(&mut renderer, &view), "");
    }

    #[test]
    fn log_lines_print_once() {
        let mut renderer = Renderer::new();
        let mut view = processing_view();
        view.logs = vec![row(0, "INFO scanning"), row(1, "WARNING slow disk")];
        let first = rendered(&mut renderer, &view);
        assert!(first.starts_with("I | INFO scanning\nW | WARNING slow disk\n"));

        view.logs.push(row(2, "ERROR bad file"));
        assert_eq!(rendered(&mut renderer, &view), "E | ERROR bad file\n");
    }

    #[test]
    fn errors_print_when_they_appear() {
        let mut renderer = Renderer::new();
        let view = MonitorViewModel {
            status: SessionStatus::Failed,
            error: Some("http status 500: disk full".to_string()),
            ..MonitorViewModel::default()
        };
        let out = rendered(&mut renderer, &view);
        assert!(out.contains("[failed]"));
        assert!(out.contains("error: http status 500: disk full"));
    }

    #[test]
    fn logged_failures_print_once() {
        let mut renderer = Renderer::new();
        let message = "http status 500: disk full";
        let view = MonitorViewModel {
            status: SessionStatus::Failed,
            error: Some(message.to_string()),
            logs: vec![LogRowView {
                seq: 0,
                text: message.to_string(),
                severity: LogSeverity::Error,
                source: LogSource::Client,
            }],
            ..MonitorViewModel::default()
        };
        let out = rendered(&mut renderer, &view);
        assert_eq!(out.matches("disk full").count(), 1, "{out}");
        assert!(out.starts_with("E | http status 500: disk full\n"));
    }

    #[test]
    fn later_batches_continue_after_the_last_printed_row() {
        let mut renderer = Renderer::new();
        let mut view = processing_view();
        view.logs = vec![row(4, "INFO a")];
        rendered(&mut renderer, &view);

        view.logs = vec![row(4, "INFO a"), row(5, "INFO b"), row(6, "INFO c")];
        let out = rendered(&mut renderer, &view);
        assert_eq!(out, "I | INFO b\nI | INFO c\n");
    }
}
