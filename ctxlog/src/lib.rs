//! Process-wide structured logging with request scoped propagation.
//!
//! [`get`] builds the process logger once from the environment: coloured lines on standard
//! output in development, JSON lines in a size rolled file everywhere else. A
//! [`RequestContext`] carries a logger through a call chain, see [`from_ctx`].

pub mod build_info;
pub mod context;
pub mod level;
pub mod logger;
pub mod rolling;
pub mod writer;

pub use build_info::BuildInfo;
pub use context::{
    RequestContext, UserIdField, from_ctx, get_context_logger, log_user_id, with_ctx,
};
pub use ctxlog_config::{Environment, LoggerConfig, RotationConfig};
pub use level::parse_level;
pub use logger::{Logger, LoggerBuilder, LoggerError, Sink, get, get_with_config, try_get};
pub use writer::{SharedWriter, shared};
