//! Single-shot print job status for Bambu Lab printers over their local MQTT broker.
//!
//! [`StatusSession`] opens a TLS MQTT connection, asks the printer to push its
//! state, waits a bounded time for the first report and always disconnects
//! before returning. Anything that goes wrong on the wire reads as
//! [`ClassifiedStatus::Unknown`]; [`StatusSession::fetch_outcome`] keeps the
//! reason for callers that care.

use std::time::Duration;

pub mod config;
pub mod mqtt_client;
pub mod status;
pub mod watch;

pub use mqtt_client::{
    models::PrinterEndpoint,
    session::{SessionError, SessionOutcome, StatusSession},
};
pub use status::{classifier::classify, models::{ClassifiedStatus, TelemetryReport}};

/// Fetches the job status with the default session settings.
pub fn fetch_status(ip: &str, serial: &str, access_code: &str, timeout: Duration) -> Result<ClassifiedStatus, SessionError> {
    StatusSession::new().fetch(&PrinterEndpoint::new(ip, serial, access_code), timeout)
}
