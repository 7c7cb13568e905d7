use super::models::{ClassifiedStatus, JobState, TelemetryReport};

const GCODE_STATE: &str = "gcode_state";
const REMAINING_TIME: &str = "mc_remaining_time";

/// Reduces a telemetry report to a coarse job status.
///
/// Order matters: finished states win over everything, and a running job
/// with zero minutes left counts as done before the remaining-time branch.
/// A missing or negative estimate while not finished yields `Unknown`.
pub fn classify(report: &TelemetryReport) -> ClassifiedStatus {
    let Some(print) = report.print_section() else {
        return ClassifiedStatus::Unknown;
    };

    let state = JobState::from(print.get(GCODE_STATE).and_then(|v| v.as_str()).unwrap_or_default());
    let remaining = print.get(REMAINING_TIME).and_then(|v| v.as_i64());

    match (state, remaining) {
        (JobState::Finish | JobState::Failed | JobState::Idle, _) => ClassifiedStatus::Done,
        (JobState::Running, Some(0)) => ClassifiedStatus::Done,
        (JobState::Running, Some(minutes)) if minutes > 0 => ClassifiedStatus::remaining_from_minutes(minutes as u64),
        _ => ClassifiedStatus::Unknown,
    }
}
