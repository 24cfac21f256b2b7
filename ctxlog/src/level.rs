use std::io::Write;

use tracing::Level;

/// Severity used when no valid level name is configured.
pub const DEFAULT_LEVEL: Level = Level::INFO;

/// Parses a severity name such as `debug` or `WARN`.
///
/// An empty name selects [`DEFAULT_LEVEL`]. An unknown name also selects it and writes one
/// diagnostic line to `diagnostics`. Numeric names such as `3` are unknown, only names are
/// accepted. Failing to write the diagnostic is ignored.
pub fn parse_level<W>(name: &str, diagnostics: &mut W) -> Level
where
    W: Write + ?Sized,
{
    let name = name.trim();
    if name.is_empty() {
        return DEFAULT_LEVEL;
    }

    if name.bytes().all(|byte| byte.is_ascii_digit()) {
        let _ = writeln!(
            diagnostics,
            "invalid level `{name}`, defaulting to {DEFAULT_LEVEL}: expected a level name"
        );
        return DEFAULT_LEVEL;
    }

    match name.parse::<Level>() {
        Ok(level) => level,
        Err(err) => {
            let _ = writeln!(
                diagnostics,
                "invalid level `{name}`, defaulting to {DEFAULT_LEVEL}: {err}"
            );
            DEFAULT_LEVEL
        }
    }
}
