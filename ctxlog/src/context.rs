//! Request scoped logger propagation.
//!
//! A [`RequestContext`] travels with a call chain and may carry an explicit [`Logger`].
//! Lookups resolve, in order, to the attached logger, the process-wide logger and finally
//! a no-op logger.

use std::fmt;

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

use crate::logger::{self, Logger};

/// Name of the field produced by [`log_user_id`].
pub const USER_ID_KEY: &str = "user_id";

/// Values carried alongside a single request.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    logger: Option<Logger>,
    user_id: Option<Value>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a context carrying `user_id`, which may be any JSON value.
    pub fn with_user_id(mut self, user_id: impl Into<Value>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn user_id(&self) -> Option<&Value> {
        self.user_id.as_ref()
    }

    /// The logger explicitly attached to this context, if any.
    pub fn logger(&self) -> Option<&Logger> {
        self.logger.as_ref()
    }
}

/// Returns the logger of `ctx`.
///
/// Falls back to the process-wide logger when none is attached, and to a no-op logger when
/// the process-wide one has not been built either.
pub fn from_ctx(ctx: &RequestContext) -> Logger {
    if let Some(logger) = &ctx.logger {
        return logger.clone();
    }

    logger::try_get().unwrap_or_else(Logger::noop)
}

/// Returns a context derived from `ctx` that carries `logger`.
///
/// If `ctx` already carries this very logger it is returned as is.
pub fn with_ctx(ctx: &RequestContext, logger: &Logger) -> RequestContext {
    if ctx.logger.as_ref() == Some(logger) {
        return ctx.clone();
    }

    RequestContext {
        logger: Some(logger.clone()),
        ..ctx.clone()
    }
}

/// Resolves the logger of `ctx` and returns it together with a context carrying it
/// explicitly.
pub fn get_context_logger(ctx: &RequestContext) -> (RequestContext, Logger) {
    let logger = from_ctx(ctx);
    let ctx = with_ctx(ctx, &logger);

    (ctx, logger)
}

/// Returns the user id of `ctx` as a `user_id` field.
///
/// A missing user id yields a null field. Record it on an event with
/// `tracing::info!(user_id = %log_user_id(&ctx), "...")`.
pub fn log_user_id(ctx: &RequestContext) -> UserIdField {
    UserIdField(ctx.user_id.clone().unwrap_or(Value::Null))
}

/// The `user_id` field of a log record.
///
/// Displays as JSON text (`"u123"`, `42`, `null` when absent) and serializes as
/// `{"user_id": <value>}`. JSON records carry the value with its JSON type.
#[derive(Debug, Clone, PartialEq)]
pub struct UserIdField(Value);

impl UserIdField {
    pub fn name(&self) -> &'static str {
        USER_ID_KEY
    }

    pub fn value(&self) -> &Value {
        &self.0
    }

    pub fn is_absent(&self) -> bool {
        self.0.is_null()
    }
}

impl fmt::Display for UserIdField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for UserIdField {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(USER_ID_KEY, &self.0)?;
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::context::{
        RequestContext, from_ctx, get_context_logger, log_user_id, with_ctx,
    };
    use crate::logger::{LoggerBuilder, Sink};

    fn logger() -> crate::Logger {
        LoggerBuilder::new("unused.log")
            .sink(Sink::Writer(crate::writer::shared(std::io::sink())))
            .build()
    }

    // The process-wide logger is never built in this test binary.
    #[test]
    fn from_ctx_without_any_logger_is_noop() {
        let logger = from_ctx(&RequestContext::new());

        assert!(logger.is_noop());
        logger.in_scope(|| tracing::error!("discarded"));
    }

    #[test]
    fn from_ctx_prefers_attached_logger() {
        let logger = logger();
        let ctx = with_ctx(&RequestContext::new(), &logger);

        assert_eq!(from_ctx(&ctx), logger);
    }

    #[test]
    fn with_ctx_keeps_context_when_logger_is_already_attached() {
        let logger = logger();
        let once = with_ctx(&RequestContext::new(), &logger);
        let twice = with_ctx(&once, &logger);

        assert_eq!(twice.logger(), Some(&logger));
        assert_eq!(once.logger(), twice.logger());
    }

    #[test]
    fn with_ctx_replaces_a_different_logger() {
        let first = logger();
        let second = logger();
        let ctx = with_ctx(&RequestContext::new(), &first);

        let ctx = with_ctx(&ctx, &second);

        assert_eq!(ctx.logger(), Some(&second));
        assert_ne!(ctx.logger(), Some(&first));
    }

    #[test]
    fn with_ctx_keeps_other_values() {
        let ctx = RequestContext::new().with_user_id("u123");

        let ctx = with_ctx(&ctx, &logger());

        assert_eq!(ctx.user_id(), Some(&json!("u123")));
    }

    #[test]
    fn get_context_logger_attaches_the_resolved_logger() {
        let logger = logger();
        let ctx = with_ctx(&RequestContext::new(), &logger);

        let (ctx, resolved) = get_context_logger(&ctx);

        assert_eq!(resolved, logger);
        assert_eq!(from_ctx(&ctx), resolved);
    }

    #[test]
    fn get_context_logger_pins_the_fallback() {
        let (ctx, resolved) = get_context_logger(&RequestContext::new());

        assert!(resolved.is_noop());
        assert_eq!(ctx.logger(), Some(&resolved));
        assert_eq!(from_ctx(&ctx), resolved);
    }

    #[test]
    fn log_user_id_wraps_present_value() {
        let ctx = RequestContext::new().with_user_id("u123");

        let field = log_user_id(&ctx);

        assert_eq!(field.name(), "user_id");
        assert_eq!(serde_json::to_value(&field).unwrap(), json!({"user_id": "u123"}));
        assert_eq!(field.to_string(), "\"u123\"");
    }

    #[test]
    fn log_user_id_is_null_when_absent() {
        let field = log_user_id(&RequestContext::new());

        assert!(field.is_absent());
        assert_eq!(serde_json::to_value(&field).unwrap(), json!({"user_id": null}));
        assert_eq!(field.to_string(), "null");
    }

    #[test]
    fn log_user_id_accepts_any_json_value() {
        let ctx = RequestContext::new().with_user_id(42);

        assert_eq!(
            serde_json::to_value(log_user_id(&ctx)).unwrap(),
            json!({"user_id": 42})
        );
    }
}
