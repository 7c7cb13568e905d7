use std::{fmt::{Debug, Formatter}, time::Duration};

use serde_derive::Serialize;

use crate::config::models::Printer;

use super::session::{InvalidEndpointSnafu, SessionError};

pub const MQTT_PORT: u16 = 8883;
pub const MQTT_USERNAME: &str = "bblp";

// //////// //
// Endpoint //
// //////// //

#[derive(Clone, PartialEq, Eq)]
pub struct PrinterEndpoint {
    pub host: String,
    pub serial: String,
    pub access_code: String,
}

impl PrinterEndpoint {
    pub fn new(host: impl Into<String>, serial: impl Into<String>, access_code: impl Into<String>) -> Self {
        Self { host: host.into(), serial: serial.into(), access_code: access_code.into() }
    }

    pub fn request_topic(&self) -> String {
        format!("device/{}/request", self.serial)
    }

    pub fn report_topic(&self) -> String {
        format!("device/{}/report", self.serial)
    }

    pub fn validate(&self) -> Result<(), SessionError> {
        if self.host.trim().is_empty() {
            return InvalidEndpointSnafu { reason: "host is empty" }.fail();
        }
        if self.serial.trim().is_empty() {
            return InvalidEndpointSnafu { reason: "serial is empty" }.fail();
        }
        // The serial is spliced into topic names.
        if self.serial.contains(['/', '+', '#']) {
            return InvalidEndpointSnafu { reason: format!("serial '{}' contains a topic separator or wildcard", self.serial) }.fail();
        }
        if self.access_code.is_empty() {
            return InvalidEndpointSnafu { reason: "access code is empty" }.fail();
        }
        Ok(())
    }
}

impl Debug for PrinterEndpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrinterEndpoint")
            .field("host", &self.host)
            .field("serial", &self.serial)
            .field("access_code", &"<redacted>")
            .finish()
    }
}

impl From<&Printer> for PrinterEndpoint {
    fn from(printer: &Printer) -> Self {
        PrinterEndpoint::new(printer.host.clone(), printer.serial.clone(), printer.access_code.clone())
    }
}

// /////// //
// Request //
// /////// //

#[derive(Debug, Serialize)]
pub struct StatusRequest {
    pushing: PushingCommand,
}

#[derive(Debug, Serialize)]
struct PushingCommand {
    sequence_id: String,
    command: String,
}

impl StatusRequest {
    /// Asks the device to push its full current state on the report topic.
    pub fn push_all() -> Self {
        StatusRequest {
            pushing: PushingCommand { sequence_id: "0".to_owned(), command: "pushall".to_owned() },
        }
    }

    pub fn to_payload(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

// ///////// //
// Transport //
// ///////// //

/// Everything needed to open one transport connection.
#[derive(Clone)]
pub struct ConnectOptions {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub username: String,
    pub password: String,
    pub keep_alive: Duration,
    pub ignore_tls_errors: bool,
}

impl Debug for ConnectOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field("keep_alive", &self.keep_alive)
            .field("ignore_tls_errors", &self.ignore_tls_errors)
            .finish_non_exhaustive()
    }
}

/// What the transport's delivery path reports back to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Connected,
    Message { topic: String, payload: Vec<u8> },
    Failed(String),
}
