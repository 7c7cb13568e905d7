use std::{sync::Arc, time::{Duration, Instant}};

use log::{debug, info, warn};
use snafu::{ResultExt, Snafu};
use uuid::Uuid;

use crate::{
    config::models::Session,
    status::{classifier::classify, models::{ClassifiedStatus, TelemetryReport}},
};

use super::{
    client::MqttConnector,
    models::{ConnectOptions, PrinterEndpoint, StatusRequest, MQTT_PORT, MQTT_USERNAME},
    signal::Latch,
    transport::{Connector, Delivery, EventSink, Transport},
};

/// How a single status fetch ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    Classified { status: ClassifiedStatus, report: TelemetryReport },
    ConnectionFailed(String),
    TimedOut,
}

impl SessionOutcome {
    /// Connection failures and timeouts both read as `Unknown`.
    pub fn status(&self) -> ClassifiedStatus {
        match self {
            SessionOutcome::Classified { status, .. } => *status,
            SessionOutcome::ConnectionFailed(_) | SessionOutcome::TimedOut => ClassifiedStatus::Unknown,
        }
    }
}

/// Runs one connect, subscribe, request, wait, disconnect cycle per call.
///
/// Nothing is shared between calls: every fetch gets its own connection and
/// client id, so concurrent fetches are independent.
pub struct StatusSession<C = MqttConnector> {
    connector: C,
    port: u16,
    keep_alive: Duration,
    ignore_tls_errors: bool,
}

impl StatusSession<MqttConnector> {
    pub fn new() -> Self {
        Self::with_connector(MqttConnector)
    }

    pub fn from_settings(settings: &Session) -> Self {
        Self::new()
            .with_port(settings.port)
            .with_keep_alive(settings.keep_alive)
            .ignore_tls_errors(settings.ignore_tls_errors)
    }
}

impl Default for StatusSession<MqttConnector> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Connector> StatusSession<C> {
    pub fn with_connector(connector: C) -> Self {
        Self { connector, port: MQTT_PORT, keep_alive: Duration::from_secs(60), ignore_tls_errors: true }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn ignore_tls_errors(mut self, ignore: bool) -> Self {
        self.ignore_tls_errors = ignore;
        self
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn fetch(&self, endpoint: &PrinterEndpoint, timeout: Duration) -> Result<ClassifiedStatus, SessionError> {
        Ok(self.fetch_outcome(endpoint, timeout)?.status())
    }

    pub fn fetch_outcome(&self, endpoint: &PrinterEndpoint, timeout: Duration) -> Result<SessionOutcome, SessionError> {
        endpoint.validate()?;
        self.validate_settings()?;
        let request = StatusRequest::push_all().to_payload().context(EncodeRequestSnafu)?;

        let started = Instant::now();
        let options = self.connect_options(endpoint);
        debug!("Connecting to {}:{} as {}", options.host, options.port, options.client_id);

        let latch = Arc::new(Latch::new());
        let sink = EventSink::new(endpoint.report_topic(), latch.clone());

        let outcome = match self.connector.open(options, sink) {
            Ok(transport) => {
                let mut transport = OpenTransport(transport);
                exchange(&mut transport, endpoint, &request, &latch, timeout)
                // Dropping `transport` closes the connection.
            }
            Err(e) => SessionOutcome::ConnectionFailed(e.to_string()),
        };

        match &outcome {
            SessionOutcome::Classified { status, .. } => info!("Printer {} status: {status} ({:?})", endpoint.serial, started.elapsed()),
            SessionOutcome::ConnectionFailed(reason) => warn!("Connection to printer {} failed: {reason}", endpoint.serial),
            SessionOutcome::TimedOut => warn!("No report from printer {} within {timeout:?}", endpoint.serial),
        }
        Ok(outcome)
    }

    fn validate_settings(&self) -> Result<(), SessionError> {
        // MQTT keep-alive is a whole number of seconds; zero disables it.
        if !self.keep_alive.is_zero() && self.keep_alive < Duration::from_secs(1) {
            return InvalidSettingsSnafu { reason: format!("keep-alive {:?} is shorter than one second", self.keep_alive) }.fail();
        }
        Ok(())
    }

    fn connect_options(&self, endpoint: &PrinterEndpoint) -> ConnectOptions {
        ConnectOptions {
            host: endpoint.host.clone(),
            port: self.port,
            client_id: format!("bambu-status-{}", Uuid::new_v4().simple()),
            username: MQTT_USERNAME.to_owned(),
            password: endpoint.access_code.clone(),
            keep_alive: self.keep_alive,
            ignore_tls_errors: self.ignore_tls_errors,
        }
    }
}

fn exchange(
    transport: &mut OpenTransport,
    endpoint: &PrinterEndpoint,
    request: &[u8],
    latch: &Latch<Delivery>,
    timeout: Duration,
) -> SessionOutcome {
    // Subscribe first so the response cannot beat the subscription.
    if let Err(e) = transport.0.subscribe(&endpoint.report_topic()) {
        return SessionOutcome::ConnectionFailed(e.to_string());
    }
    if let Err(e) = transport.0.publish(&endpoint.request_topic(), request) {
        return SessionOutcome::ConnectionFailed(e.to_string());
    }
    debug!("Requested full status from {}", endpoint.serial);

    match latch.wait(timeout) {
        Some(Delivery::Report(report)) => SessionOutcome::Classified { status: classify(&report), report },
        Some(Delivery::Failed(reason)) => SessionOutcome::ConnectionFailed(reason),
        None => SessionOutcome::TimedOut,
    }
}

/// Disconnects on every exit path, unwinding included.
struct OpenTransport(Box<dyn Transport>);

impl Drop for OpenTransport {
    fn drop(&mut self) {
        self.0.disconnect();
        debug!("Transport closed");
    }
}

// ////// //
// Errors //
// ////// //

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SessionError {
    #[snafu(display("Invalid printer endpoint: {reason}"))]
    InvalidEndpoint { reason: String },

    #[snafu(display("Invalid session settings: {reason}"))]
    InvalidSettings { reason: String },

    #[snafu(display("Could not encode the status request"))]
    EncodeRequest { source: serde_json::Error },
}
