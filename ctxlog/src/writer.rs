use std::backtrace::Backtrace;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::{Map, Value};
use tracing::{Level, Metadata};
use tracing_subscriber::fmt::MakeWriter;

use crate::build_info::BuildInfo;
use crate::context::USER_ID_KEY;
use crate::rolling::RollingFile;

/// JSON field name of the call site stack trace attached to error records.
pub const STACKTRACE_KEY: &str = "stacktrace";

/// A shared destination for formatted records.
pub type SharedWriter = Arc<Mutex<dyn Write + Send>>;

/// Wraps `writer` for use as [`crate::Sink::Writer`].
pub fn shared<W>(writer: W) -> SharedWriter
where
    W: Write + Send + 'static,
{
    Arc::new(Mutex::new(writer))
}

/// Resolved destination of the formatted records.
pub(crate) enum Target {
    Stdout,
    /// Used when the log file cannot be opened.
    Stderr,
    File(RollingFile),
    Writer(SharedWriter),
}

impl Target {
    fn write_all(&self, buf: &[u8]) -> io::Result<()> {
        match self {
            Target::Stdout => io::stdout().lock().write_all(buf),
            Target::Stderr => io::stderr().lock().write_all(buf),
            Target::File(file) => file.write_record(buf),
            Target::Writer(writer) => writer
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .write_all(buf),
        }
    }

    fn flush(&self) -> io::Result<()> {
        match self {
            Target::Stdout => io::stdout().flush(),
            Target::Stderr => io::stderr().flush(),
            Target::File(file) => file.flush(),
            Target::Writer(writer) => writer.lock().unwrap_or_else(PoisonError::into_inner).flush(),
        }
    }
}

/// How a formatted record is finished before it reaches the target.
pub(crate) enum Encoding {
    /// Human readable lines, the stack trace follows the line.
    Console,
    /// One JSON object per line, static fields and the stack trace are merged into it.
    Json { static_fields: Map<String, Value> },
}

impl Encoding {
    pub(crate) fn json(build_info: BuildInfo) -> Self {
        let static_fields = build_info
            .fields()
            .into_iter()
            .map(|(key, value)| (key.to_string(), Value::String(value.to_string())))
            .collect();

        Encoding::Json { static_fields }
    }

    fn finish(&self, buf: &[u8], stacktrace: Option<Backtrace>) -> Option<Vec<u8>> {
        match self {
            Encoding::Console => {
                let stacktrace = stacktrace?;
                let mut record = buf.to_vec();
                record.extend_from_slice(format!("{stacktrace}\n").as_bytes());

                Some(record)
            }
            Encoding::Json { static_fields } => {
                let json_str = std::str::from_utf8(buf).ok()?;
                let Ok(Value::Object(mut map)) = serde_json::from_str::<Value>(json_str) else {
                    return None;
                };

                // Per call fields take precedence over static ones.
                for (key, value) in static_fields {
                    if !map.contains_key(key) {
                        map.insert(key.clone(), value.clone());
                    }
                }
                // The user id is recorded as JSON text, restore its JSON type.
                let user_id = match map.get(USER_ID_KEY) {
                    Some(Value::String(text)) => serde_json::from_str::<Value>(text).ok(),
                    _ => None,
                };
                if let Some(user_id) = user_id {
                    map.insert(USER_ID_KEY.to_string(), user_id);
                }
                if let Some(stacktrace) = stacktrace {
                    map.insert(
                        STACKTRACE_KEY.to_string(),
                        Value::String(stacktrace.to_string()),
                    );
                }

                let mut record = serde_json::to_vec(&map).ok()?;
                if json_str.ends_with('\n') {
                    record.push(b'\n');
                }

                Some(record)
            }
        }
    }
}

/// [`MakeWriter`] handing out one [`RecordWriter`] per event.
///
/// The writer for an error event captures the stack trace while still running on the
/// thread that emitted the event.
pub(crate) struct RecordMakeWriter {
    target: Target,
    encoding: Encoding,
}

impl RecordMakeWriter {
    pub(crate) fn new(target: Target, encoding: Encoding) -> Self {
        Self { target, encoding }
    }

    fn writer(&self, capture_stacktrace: bool) -> RecordWriter<'_> {
        RecordWriter {
            make_writer: self,
            stacktrace: capture_stacktrace.then(Backtrace::force_capture),
        }
    }
}

impl<'a> MakeWriter<'a> for RecordMakeWriter {
    type Writer = RecordWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        self.writer(false)
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        self.writer(*meta.level() == Level::ERROR)
    }
}

/// Writes one formatted record to the target.
pub(crate) struct RecordWriter<'a> {
    make_writer: &'a RecordMakeWriter,
    stacktrace: Option<Backtrace>,
}

impl Write for RecordWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let encoding = &self.make_writer.encoding;
        let target = &self.make_writer.target;

        match encoding.finish(buf, self.stacktrace.take()) {
            Some(record) => target.write_all(&record)?,
            None => target.write_all(buf)?,
        }

        // The caller only knows about its own buffer.
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.make_writer.target.flush()
    }
}
