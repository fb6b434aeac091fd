//! Monitor core: pure state machine, log buffer, record store and view-model helpers.
mod effect;
mod log_buffer;
mod msg;
mod progress;
mod session;
mod state;
mod store;
mod update;
mod view_model;

pub use effect::Effect;
pub use log_buffer::{LogBuffer, LogEntry, LogSeverity, LogSource, LOG_CAPACITY};
pub use msg::Msg;
pub use progress::{JobStatusReport, ProgressSnapshot, SocketFrame, Statistics, StepProgress};
pub use session::{JobStatus, Session, SessionId, SessionStatus, StartRequest};
pub use state::{ChannelState, MonitorState, RefreshState};
pub use store::{RecordDraft, RecordError, RecordKind, RecordStore, SavedRecord};
pub use update::update;
pub use view_model::{percent, LogRowView, MonitorViewModel, StepRowView};
