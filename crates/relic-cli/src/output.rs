//! Shared output layer for human/JSON parity across all CLI commands.
//!
//! Every command handler receives an [`OutputMode`] and formats its result
//! accordingly: key/value text for humans, stable JSON for machines.

use relic_core::error::ErrorCode;
use serde::Serialize;
use std::io::{self, Write};

/// The two output modes supported by the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable text.
    Human,
    /// Machine-readable JSON (one object or array per result).
    Json,
}

impl OutputMode {
    /// Returns `true` if JSON output was requested.
    pub fn is_json(self) -> bool {
        matches!(self, Self::Json)
    }
}

/// Render a serializable value: JSON when requested, otherwise through the
/// provided human formatter.
///
/// # Errors
///
/// Returns serialization or terminal write failures.
pub fn render<T, F>(mode: OutputMode, value: &T, human: F) -> anyhow::Result<()>
where
    T: Serialize,
    F: FnOnce(&T, &mut dyn Write) -> io::Result<()>,
{
    let stdout = io::stdout();
    let mut w = stdout.lock();
    if mode.is_json() {
        serde_json::to_writer_pretty(&mut w, value)?;
        writeln!(w)?;
    } else {
        human(value, &mut w)?;
    }
    Ok(())
}

/// Render a left-aligned key/value line in human output.
pub fn kv(w: &mut dyn Write, key: &str, value: impl AsRef<str>) -> io::Result<()> {
    writeln!(w, "{:<16} {}", format!("{key}:"), value.as_ref())
}

/// Build the terminal error for a coded failure: `E#### message` plus the
/// remediation hint when one exists.
pub fn coded_failure(code: ErrorCode, detail: impl std::fmt::Display) -> anyhow::Error {
    let mut text = format!("{}: {detail}", code.code());
    if let Some(hint) = code.hint() {
        text.push_str(&format!("\n  hint: {hint}"));
    }
    anyhow::anyhow!(text)
}

#[cfg(test)]
mod tests {
    use super::{OutputMode, coded_failure, kv};
    use relic_core::error::ErrorCode;

    #[test]
    fn json_mode_detection() {
        assert!(OutputMode::Json.is_json());
        assert!(!OutputMode::Human.is_json());
    }

    #[test]
    fn kv_pads_the_key_column() {
        let mut out = Vec::new();
        kv(&mut out, "slug", "rusty-dagger").expect("write");
        let line = String::from_utf8(out).expect("utf8");
        assert!(line.starts_with("slug:"));
        assert!(line.trim_end().ends_with("rusty-dagger"));
    }

    #[test]
    fn coded_failures_carry_code_and_hint() {
        let err = coded_failure(ErrorCode::EmptySubmission, "submission text is empty");
        let text = err.to_string();
        assert!(text.starts_with("E1001"));
        assert!(text.contains("hint:"));
    }
}
