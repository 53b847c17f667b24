//! Rendering of live updates for the CLI.
use std::io::Write;

use serde::Serialize;
use serde_json::Value;

use crate::args::OutputFormat;
use crate::error::AppResult;

#[derive(Serialize)]
struct UpdateLine<'a> {
    key: &'a str,
    value: &'a Value,
}

/// Writes one line per update in the configured format.
pub struct UpdatePrinter<W> {
    format: OutputFormat,
    writer: W,
}

impl<W> UpdatePrinter<W>
where
    W: Write,
{
    pub const fn new(format: OutputFormat, writer: W) -> Self {
        Self { format, writer }
    }

    /// Prints a single update and flushes.
    ///
    /// # Errors
    ///
    /// Returns an error when the writer fails or the value cannot be serialized.
    pub fn print(&mut self, key: &str, value: &Value) -> AppResult<()> {
        match self.format {
            OutputFormat::Text => {
                // Strings print raw, everything else as compact JSON.
                match value {
                    Value::String(text) => writeln!(self.writer, "{} {}", key, text)?,
                    Value::Null
                    | Value::Bool(_)
                    | Value::Number(_)
                    | Value::Array(_)
                    | Value::Object(_) => {
                        writeln!(self.writer, "{} {}", key, serde_json::to_string(value)?)?;
                    }
                }
            }
            OutputFormat::Json => {
                serde_json::to_writer(&mut self.writer, &UpdateLine { key, value })?;
                writeln!(self.writer)?;
            }
        }
        self.writer.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}
