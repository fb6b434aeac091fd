//! Monitor engine: backend HTTP client, progress socket, polling timer and effect execution.
mod backend;
mod engine;
mod frame;
mod persist;
mod records;
mod settings;
mod socket;
mod types;

pub use backend::{Backend, ReqwestBackend};
pub use engine::EngineHandle;
pub use frame::{decode_frame, FrameError};
pub use persist::{ensure_state_dir, read_state_file, write_atomically, PersistError};
pub use records::RecordsClient;
pub use settings::BackendSettings;
pub use socket::progress_socket_url;
pub use types::{ApiError, EngineError, EngineEvent, FailureKind, StartedJob};
