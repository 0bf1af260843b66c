//! Structured JSON logger for shardbase
//!
//! - One JSON object per line, one line per event
//! - `event` then `severity` first, remaining fields sorted by key
//! - INFO/WARN to stdout, ERROR/FATAL to stderr
//! - Synchronous, no buffering

use std::fmt;
use std::io::{self, Write};

use serde_json::{Map, Value as JsonValue};

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info = 1,
    Warn = 2,
    Error = 3,
    Fatal = 4,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        }
    }

    /// ERROR and FATAL lines go to stderr
    pub fn is_failure(&self) -> bool {
        *self >= Severity::Error
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Stateless JSON-line logger
pub struct Logger;

impl Logger {
    pub fn log(severity: Severity, event: &str, fields: &[(&str, &str)]) {
        let line = Self::render(severity, event, fields);
        if severity.is_failure() {
            Self::write_line(&mut io::stderr().lock(), &line);
        } else {
            Self::write_line(&mut io::stdout().lock(), &line);
        }
    }

    pub fn info(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Info, event, fields);
    }

    pub fn warn(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Warn, event, fields);
    }

    pub fn error(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Error, event, fields);
    }

    pub fn fatal(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Fatal, event, fields);
    }

    /// Renders one log line, newline included
    pub(crate) fn render(severity: Severity, event: &str, fields: &[(&str, &str)]) -> String {
        let mut sorted: Vec<&(&str, &str)> = fields.iter().collect();
        sorted.sort_by_key(|(k, _)| *k);

        let mut object = Map::with_capacity(fields.len() + 2);
        object.insert("event".into(), JsonValue::from(event));
        object.insert("severity".into(), JsonValue::from(severity.as_str()));
        for (key, value) in sorted {
            if *key == "event" || *key == "severity" {
                continue;
            }
            object.insert((*key).to_string(), JsonValue::from(*value));
        }

        let mut line = JsonValue::Object(object).to_string();
        line.push('\n');
        line
    }

    fn write_line<W: Write>(writer: &mut W, line: &str) {
        // Logging never fails the caller
        let _ = writer.write_all(line.as_bytes());
        let _ = writer.flush();
    }
}
