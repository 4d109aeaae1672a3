mod app_error;
mod options;
mod reactor;
mod shutdown;
mod tracing_config;

pub use app_error::{AppError, AppResult};
pub use options::{
    AcceptOptions, LinkOptions, QueuePolicy, DEFAULT_HEARTBEAT_PERIOD, DEFAULT_MAX_FRAME_SIZE,
    DEFAULT_RECONNECT_PERIOD,
};
pub use reactor::Reactor;
pub use shutdown::Shutdown;
pub use tracing_config::setup_local_tracing;
