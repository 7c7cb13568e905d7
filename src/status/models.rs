use std::fmt::{Display, Formatter};

use serde_json::{Map, Value};
use snafu::{ResultExt, Snafu};

// ///////// //
// Telemetry //
// ///////// //

/// A message from `device/{serial}/report` that carries a `print` section.
///
/// Echoes of our own request and other acks arrive on the same topic but
/// lack that section; they are rejected by [`TelemetryReport::from_payload`].
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryReport {
    document: Map<String, Value>,
}

impl TelemetryReport {
    pub const PRINT_SECTION: &'static str = "print";

    pub fn from_payload(payload: &[u8]) -> Result<Self, ReportError> {
        let document: Value = serde_json::from_slice(payload).context(MalformedSnafu)?;
        Self::from_value(document)
    }

    pub fn from_value(document: Value) -> Result<Self, ReportError> {
        match document {
            Value::Object(document) if document.contains_key(Self::PRINT_SECTION) => Ok(Self { document }),
            _ => NotAReportSnafu.fail(),
        }
    }

    pub fn print_section(&self) -> Option<&Map<String, Value>> {
        self.document.get(Self::PRINT_SECTION).and_then(Value::as_object)
    }

    pub fn document(&self) -> &Map<String, Value> {
        &self.document
    }
}

/// Device-reported job lifecycle state (`gcode_state`). The set is open-ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Idle,
    Running,
    Finish,
    Failed,
    Other(String),
}

impl From<&str> for JobState {
    fn from(value: &str) -> Self {
        match value {
            "IDLE" => JobState::Idle,
            "RUNNING" => JobState::Running,
            "FINISH" => JobState::Finish,
            "FAILED" => JobState::Failed,
            other => JobState::Other(other.to_owned()),
        }
    }
}

// ////// //
// Status //
// ////// //

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassifiedStatus {
    Done,
    Remaining { hours: u64, minutes: u8 },
    Unknown,
}

impl ClassifiedStatus {
    /// Splits a positive minute estimate into hours and minutes.
    pub fn remaining_from_minutes(total_minutes: u64) -> Self {
        ClassifiedStatus::Remaining {
            hours: total_minutes / 60,
            // Always < 60.
            minutes: (total_minutes % 60) as u8,
        }
    }
}

impl Display for ClassifiedStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ClassifiedStatus::Done => f.write_str("Done"),
            ClassifiedStatus::Remaining { hours: 0, minutes } => write!(f, "{minutes} minutes"),
            ClassifiedStatus::Remaining { hours, minutes } => write!(f, "{hours}h {minutes}m"),
            ClassifiedStatus::Unknown => f.write_str("Unknown"),
        }
    }
}

// ////// //
// Errors //
// ////// //

#[derive(Debug, Snafu)]
pub enum ReportError {
    #[snafu(display("Payload is not a JSON document"))]
    Malformed { source: serde_json::Error },

    #[snafu(display("Payload has no '{}' section", TelemetryReport::PRINT_SECTION))]
    NotAReport,
}
