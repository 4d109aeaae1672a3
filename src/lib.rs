pub mod endpoint;
pub mod network;
pub mod service;

pub use endpoint::{ClientHandle, LinkEvent, ServerHandle};
pub use service::{
    setup_local_tracing,
    AcceptOptions,
    AppError,
    AppResult,
    LinkOptions,
    QueuePolicy,
    Reactor,
    Shutdown,
};
