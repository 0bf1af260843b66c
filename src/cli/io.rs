//! JSON output for the CLI
//!
//! Every command ends with one response line on stdout:
//! `{"status":"ok","data":...}` or `{"status":"error","code":...,"message":...}`.
//! INFO event lines logged while loading configs may precede it.

use std::io::{self, Write};

use serde_json::{json, Value};

use super::errors::{CliError, CliResult};

/// Write a success response to stdout
pub fn write_response(data: Value) -> CliResult<()> {
    write_to(&mut io::stdout().lock(), &json!({"status": "ok", "data": data}))
}

/// Write an error response to stdout
pub fn write_error(code: &str, message: &str) -> CliResult<()> {
    write_to(
        &mut io::stdout().lock(),
        &json!({"status": "error", "code": code, "message": message}),
    )
}

fn write_to<W: Write>(writer: &mut W, response: &Value) -> CliResult<()> {
    serde_json::to_writer(&mut *writer, response)
        .map_err(|e| CliError::io_error(format!("JSON error: {}", e)))?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}
