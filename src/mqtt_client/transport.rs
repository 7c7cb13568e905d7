use std::sync::Arc;

use log::{debug, trace, warn};
use snafu::Snafu;

use crate::status::models::{ReportError, TelemetryReport};

use super::{
    models::{ConnectOptions, TransportEvent},
    signal::Latch,
};

/// An open pub/sub connection owned by exactly one session.
#[cfg_attr(test, mockall::automock)]
pub trait Transport {
    fn subscribe(&mut self, topic: &str) -> Result<(), TransportError>;

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), TransportError>;

    /// Closes the connection and stops its delivery path. Called once.
    fn disconnect(&mut self);
}

/// Opens transports. Events for the new connection must be handed to `sink`
/// from the transport's own delivery path.
pub trait Connector {
    fn open(&self, options: ConnectOptions, sink: EventSink) -> Result<Box<dyn Transport>, TransportError>;
}

/// What ends the wait of a session.
#[derive(Debug)]
pub enum Delivery {
    Report(TelemetryReport),
    Failed(String),
}

/// Callback side of a session: filters transport events and resolves the
/// session's latch with the first qualifying report or failure.
#[derive(Clone)]
pub struct EventSink {
    report_topic: Arc<str>,
    latch: Arc<Latch<Delivery>>,
}

impl EventSink {
    pub fn new(report_topic: impl Into<Arc<str>>, latch: Arc<Latch<Delivery>>) -> Self {
        Self { report_topic: report_topic.into(), latch }
    }

    pub fn dispatch(&self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => debug!("Connected, awaiting report on {}", self.report_topic),
            TransportEvent::Message { topic, payload } => self.on_message(&topic, &payload),
            TransportEvent::Failed(reason) => {
                if !self.latch.resolve(Delivery::Failed(reason.clone())) {
                    debug!("Ignoring transport failure after the session resolved: {reason}");
                }
            }
        }
    }

    fn on_message(&self, topic: &str, payload: &[u8]) {
        if topic != &*self.report_topic {
            trace!("Ignoring message on unrelated topic {topic}");
            return;
        }

        match TelemetryReport::from_payload(payload) {
            Ok(report) => {
                if !self.latch.resolve(Delivery::Report(report)) {
                    debug!("Discarding report that arrived after the session resolved");
                }
            }
            Err(e @ ReportError::Malformed { .. }) => warn!("Skipping message on {topic}: {e}"),
            Err(e @ ReportError::NotAReport) => debug!("Skipping message on {topic}: {e}"),
        }
    }
}

// ////// //
// Errors //
// ////// //

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum TransportError {
    #[snafu(display("Could not start the MQTT runtime"))]
    Runtime { source: std::io::Error },

    #[snafu(display("Could not spawn the MQTT delivery thread"))]
    Spawn { source: std::io::Error },

    #[snafu(display("Could not queue {action} request"))]
    Request { action: &'static str, source: rumqttc::ClientError },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const TOPIC: &str = "device/SERIAL/report";

    fn sink() -> (EventSink, Arc<Latch<Delivery>>) {
        let latch = Arc::new(Latch::new());
        (EventSink::new(TOPIC, latch.clone()), latch)
    }

    fn message(topic: &str, payload: &str) -> TransportEvent {
        TransportEvent::Message { topic: topic.to_owned(), payload: payload.as_bytes().to_vec() }
    }

    #[test]
    fn malformed_and_echo_payloads_do_not_resolve() {
        let (sink, latch) = sink();
        sink.dispatch(TransportEvent::Connected);
        sink.dispatch(message(TOPIC, "{not json"));
        sink.dispatch(message(TOPIC, r#"{"pushing":{"command":"pushall","sequence_id":"0"}}"#));
        sink.dispatch(message("device/OTHER/report", r#"{"print":{}}"#));

        assert!(latch.wait(Duration::from_millis(20)).is_none());
    }

    #[test]
    fn first_qualifying_report_wins() {
        let (sink, latch) = sink();
        sink.dispatch(message(TOPIC, r#"{"print":{"gcode_state":"RUNNING","mc_remaining_time":10}}"#));
        sink.dispatch(message(TOPIC, r#"{"print":{"gcode_state":"FINISH"}}"#));
        sink.dispatch(TransportEvent::Failed("connection reset".to_owned()));

        match latch.wait(Duration::from_millis(20)) {
            Some(Delivery::Report(report)) => {
                assert_eq!(report.print_section().unwrap()["mc_remaining_time"], 10);
            }
            other => panic!("unexpected delivery {other:?}"),
        }
    }

    #[test]
    fn failure_before_report_resolves_as_failure() {
        let (sink, latch) = sink();
        sink.dispatch(TransportEvent::Failed("Connection refused".to_owned()));
        sink.dispatch(message(TOPIC, r#"{"print":{"gcode_state":"IDLE"}}"#));

        assert!(matches!(latch.wait(Duration::from_millis(20)), Some(Delivery::Failed(reason)) if reason == "Connection refused"));
    }
}
