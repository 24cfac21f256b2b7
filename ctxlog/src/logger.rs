use std::backtrace::{Backtrace, BacktraceStatus};
use std::future::Future;
use std::io::{self, Write};
use std::panic::PanicHookInfo;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use ctxlog_config::{Environment, LoggerConfig, RotationConfig};
use thiserror::Error;
use tracing::dispatcher::{self, DefaultGuard, SetGlobalDefaultError};
use tracing::instrument::{WithDispatch, WithSubscriber};
use tracing::{Dispatch, Level};
use tracing_log::{LogTracer, log_tracer::SetLoggerError};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{Registry, fmt, layer::SubscriberExt};

use crate::build_info::BuildInfo;
use crate::level::{DEFAULT_LEVEL, parse_level};
use crate::rolling::RollingFile;
use crate::writer::{Encoding, RecordMakeWriter, SharedWriter, Target};

/// The process-wide logger, built by the first call to [`get`] or [`get_with_config`].
static LOGGER: OnceLock<Logger> = OnceLock::new();

/// Errors that can occur while installing a logger as the global default.
#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("failed to init log tracer: {0}")]
    InitLogTracer(#[from] SetLoggerError),

    #[error("failed to set global default subscriber: {0}")]
    SetGlobalDefault(#[from] SetGlobalDefaultError),
}

/// Returns the process-wide logger, building it on the first call.
///
/// `path` is the log file used outside of development and `level` the severity name. Both
/// are only read by the call that builds the logger; every call, concurrent or not, returns
/// the same instance.
pub fn get(path: impl Into<PathBuf>, level: &str) -> Logger {
    LOGGER
        .get_or_init(|| LoggerBuilder::from_env(path, level).build())
        .clone()
}

/// Same as [`get`], driven by a [`LoggerConfig`].
pub fn get_with_config(config: &LoggerConfig) -> Logger {
    LOGGER
        .get_or_init(|| LoggerBuilder::from_config(config).build())
        .clone()
}

/// Returns the process-wide logger if it has been built.
pub fn try_get() -> Option<Logger> {
    LOGGER.get().cloned()
}

struct Inner {
    dispatch: Dispatch,
    /// `None` for the no-op logger.
    level: Option<Level>,
}

/// A handle to a logger.
///
/// Cloning is cheap and clones share the same logger. Two handles compare equal only when
/// they are clones of the same instance.
#[derive(Clone)]
pub struct Logger {
    inner: Arc<Inner>,
}

impl Logger {
    /// Returns a logger that discards every record.
    pub fn noop() -> Self {
        Self {
            inner: Arc::new(Inner {
                dispatch: Dispatch::none(),
                level: None,
            }),
        }
    }

    /// Minimum severity of emitted records, `None` for the no-op logger.
    pub fn level(&self) -> Option<Level> {
        self.inner.level
    }

    pub fn is_noop(&self) -> bool {
        self.inner.level.is_none()
    }

    pub fn dispatch(&self) -> &Dispatch {
        &self.inner.dispatch
    }

    /// Runs `f` with this logger receiving every `tracing` event emitted on this thread.
    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        dispatcher::with_default(&self.inner.dispatch, f)
    }

    /// Makes this logger the default of the current thread until the guard is dropped.
    pub fn set_default(&self) -> DefaultGuard {
        dispatcher::set_default(&self.inner.dispatch)
    }

    /// Attaches this logger to `future`, so that events emitted while it is polled reach it.
    pub fn scope<F>(&self, future: F) -> WithDispatch<F>
    where
        F: Future,
    {
        future.with_subscriber(self.inner.dispatch.clone())
    }

    /// Installs this logger as the global default.
    ///
    /// Records from the `log` crate are forwarded to it and panics are logged through it
    /// before the previous panic hook runs. Fails if a global default is already set.
    pub fn install_global_default(&self) -> Result<(), LoggerError> {
        // Captures logs from libraries that use the `log` crate.
        LogTracer::init()?;

        dispatcher::set_global_default(self.inner.dispatch.clone())?;

        set_tracing_panic_hook();

        Ok(())
    }
}

impl PartialEq for Logger {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Logger {}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("level", &self.inner.level)
            .finish_non_exhaustive()
    }
}

/// Destination of the formatted records.
pub enum Sink {
    /// Standard output.
    Stdout,
    /// A size rolled file.
    File(PathBuf),
    /// Any shared writer.
    Writer(SharedWriter),
}

impl std::fmt::Debug for Sink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sink::Stdout => f.write_str("Stdout"),
            Sink::File(path) => f.debug_tuple("File").field(path).finish(),
            Sink::Writer(_) => f.write_str("Writer"),
        }
    }
}

/// Builds a [`Logger`] without touching the process-wide instance.
///
/// The environment selects the encoding: [`Environment::Dev`] writes coloured,
/// human-readable lines, any other environment writes JSON lines tagged with
/// [`BuildInfo`]. Unless a sink is set explicitly, development logs go to standard output
/// and the others to the rolled file at `path`.
#[derive(Debug)]
pub struct LoggerBuilder {
    path: PathBuf,
    environment: Environment,
    level: Level,
    rotation: RotationConfig,
    build_info: BuildInfo,
    sink: Option<Sink>,
}

impl LoggerBuilder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            environment: Environment::Prod,
            level: DEFAULT_LEVEL,
            rotation: RotationConfig::default(),
            build_info: BuildInfo::current(),
            sink: None,
        }
    }

    /// Reads the environment from `APP_ENVIRONMENT` and parses `level`.
    ///
    /// Problems are reported on standard error and replaced by defaults: an unsupported
    /// environment behaves as production and an invalid level as `info`.
    pub fn from_env(path: impl Into<PathBuf>, level: &str) -> Self {
        Self::from_env_with_diagnostics(path, level, &mut io::stderr())
    }

    /// Same as [`LoggerBuilder::from_env`], reporting problems to `diagnostics`.
    pub fn from_env_with_diagnostics<W>(
        path: impl Into<PathBuf>,
        level: &str,
        diagnostics: &mut W,
    ) -> Self
    where
        W: Write + ?Sized,
    {
        let environment = environment_or_prod(Environment::load(), diagnostics);

        Self::new(path)
            .environment(environment)
            .level_name(level, diagnostics)
    }

    /// Same as [`LoggerBuilder::from_env`], taking path, level and rotation from `config`.
    pub fn from_config(config: &LoggerConfig) -> Self {
        Self::from_env(config.path.clone(), &config.level).rotation(config.rotation.clone())
    }

    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Parses `name` as the level, see [`parse_level`].
    pub fn level_name<W>(mut self, name: &str, diagnostics: &mut W) -> Self
    where
        W: Write + ?Sized,
    {
        self.level = parse_level(name, diagnostics);
        self
    }

    pub fn rotation(mut self, rotation: RotationConfig) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn build_info(mut self, build_info: BuildInfo) -> Self {
        self.build_info = build_info;
        self
    }

    pub fn sink(mut self, sink: Sink) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn build(self) -> Logger {
        let is_dev = self.environment.is_dev();

        let sink = match self.sink {
            Some(sink) => sink,
            None if is_dev => Sink::Stdout,
            None => Sink::File(self.path),
        };
        let target = match sink {
            Sink::Stdout => Target::Stdout,
            Sink::File(path) => match RollingFile::open(&path, &self.rotation) {
                Ok(file) => Target::File(file),
                Err(err) => {
                    let _ = writeln!(
                        io::stderr(),
                        "failed to open log file {}, logging to stderr: {err}",
                        path.display()
                    );
                    Target::Stderr
                }
            },
            Sink::Writer(writer) => Target::Writer(writer),
        };

        let filter = LevelFilter::from_level(self.level);

        let dispatch = if is_dev {
            configure_dev_logging(filter, target)
        } else {
            configure_prod_logging(filter, target, self.build_info)
        };

        Logger {
            inner: Arc::new(Inner {
                dispatch,
                level: Some(self.level),
            }),
        }
    }
}

/// Falls back to production when the environment is unsupported, with one diagnostic line.
fn environment_or_prod<E, W>(loaded: Result<Environment, E>, diagnostics: &mut W) -> Environment
where
    E: std::fmt::Display,
    W: Write + ?Sized,
{
    loaded.unwrap_or_else(|err| {
        let _ = writeln!(diagnostics, "{err} Defaulting to `{}`.", Environment::Prod);
        Environment::Prod
    })
}

fn configure_prod_logging(filter: LevelFilter, target: Target, build_info: BuildInfo) -> Dispatch {
    let make_writer = RecordMakeWriter::new(target, Encoding::json(build_info));

    let subscriber = Registry::default().with(filter).with(
        fmt::layer()
            .json()
            // Per call fields sit next to `message` instead of under `fields`.
            .flatten_event(true)
            .with_current_span(true)
            .with_span_list(true)
            // ANSI colors are only for terminal output
            .with_ansi(false)
            .with_writer(make_writer),
    );

    Dispatch::new(subscriber)
}

fn configure_dev_logging(filter: LevelFilter, target: Target) -> Dispatch {
    let make_writer = RecordMakeWriter::new(target, Encoding::Console);

    let subscriber = Registry::default().with(filter).with(
        fmt::layer()
            // Colour the level for terminal output
            .with_ansi(true)
            // Disable line number and file to reduce noise in the logs
            .with_line_number(false)
            .with_file(false)
            .with_target(true)
            .with_writer(make_writer),
    );

    Dispatch::new(subscriber)
}

/// The default panic hook logs the panic information to stderr, which means
/// it will not be sent to our logging system. This function replaces the default panic
/// hook with a custom one that logs the panic information using `tracing`.
/// It also calls the original panic hook after logging the panic information.
fn set_tracing_panic_hook() {
    let prev_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        panic_hook(info);
        prev_hook(info);
    }));
}

/// A custom panic hook that logs the panic information using `tracing`.
fn panic_hook(panic_info: &PanicHookInfo) {
    let backtrace = Backtrace::capture();
    let (backtrace, note) = match backtrace.status() {
        BacktraceStatus::Captured => (Some(backtrace), None),
        BacktraceStatus::Disabled => (
            None,
            Some("run with RUST_BACKTRACE=1 to display backtraces"),
        ),
        BacktraceStatus::Unsupported => {
            (None, Some("backtraces are not supported on this platform"))
        }
        _ => (None, Some("backtrace status is unknown")),
    };

    let payload = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
        s
    } else {
        "unknown panic payload"
    };

    let location = panic_info.location().map(|location| location.to_string());

    tracing::error!(
        panic.payload = payload,
        panic.location = location,
        panic.backtrace = backtrace.map(tracing::field::display),
        panic.note = note,
        "a panic occurred",
    );
}
