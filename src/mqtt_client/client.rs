use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS, TlsConfiguration, Transport as MqttTransportKind};
use std::{sync::Arc, thread::{self, JoinHandle}, time::Duration};
use log::{debug, warn};
use snafu::ResultExt;
use tokio::{runtime::{Builder, Runtime}, sync::oneshot};

use super::{
    models::{ConnectOptions, TransportEvent},
    tls::client_config,
    transport::{Connector, EventSink, RequestSnafu, RuntimeSnafu, SpawnSnafu, Transport, TransportError},
};

/// How long a connected event loop may keep running after DISCONNECT was queued.
const DISCONNECT_LINGER: Duration = Duration::from_millis(500);

/// Opens rumqttc connections, each driven on its own thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct MqttConnector;

impl Connector for MqttConnector {
    fn open(&self, options: ConnectOptions, sink: EventSink) -> Result<Box<dyn Transport>, TransportError> {
        let mqtt_options = MqttOptions::new(options.client_id.to_owned(), options.host.to_owned(), options.port)
            .set_credentials(options.username.to_owned(), options.password.to_owned())
            .set_transport(MqttTransportKind::tls_with_config(TlsConfiguration::Rustls(Arc::new(client_config(options.ignore_tls_errors)))))
            .set_keep_alive(options.keep_alive)
            .set_clean_session(true)
            .to_owned();

        let runtime = Builder::new_current_thread().enable_all().build().context(RuntimeSnafu)?;
        let (client, event_loop) = AsyncClient::new(mqtt_options, 10);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let worker = thread::Builder::new()
            .name(format!("mqtt-{}", options.client_id))
            .spawn(move || deliver(runtime, event_loop, sink, shutdown_rx))
            .context(SpawnSnafu)?;

        Ok(Box::new(MqttTransport { client, shutdown: Some(shutdown_tx), worker: Some(worker) }))
    }
}

pub struct MqttTransport {
    client: AsyncClient,
    shutdown: Option<oneshot::Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl Transport for MqttTransport {
    fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        self.client.try_subscribe(topic, QoS::AtMostOnce).context(RequestSnafu { action: "subscribe" })
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), TransportError> {
        self.client.try_publish(topic, QoS::AtMostOnce, false, payload.to_vec()).context(RequestSnafu { action: "publish" })
    }

    fn disconnect(&mut self) {
        if let Err(e) = self.client.try_disconnect() {
            // The event loop already stopped, usually after a connection error.
            debug!("Could not queue disconnect: {e}");
        }
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("MQTT delivery thread panicked");
            }
        }
    }
}

/// Runs the event loop until it fails, the connection is closed, or the
/// owning transport asks it to stop.
fn deliver(runtime: Runtime, mut event_loop: EventLoop, sink: EventSink, mut shutdown: oneshot::Receiver<()>) {
    runtime.block_on(async move {
        let mut connected = false;
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    if connected {
                        let _ = tokio::time::timeout(DISCONNECT_LINGER, flush_disconnect(&mut event_loop)).await;
                    }
                    break;
                }
                event = event_loop.poll() => match event {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        connected = true;
                        sink.dispatch(TransportEvent::Connected);
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        sink.dispatch(TransportEvent::Message { topic: publish.topic, payload: publish.payload.to_vec() });
                    }
                    Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                        debug!("Disconnect sent");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        sink.dispatch(TransportEvent::Failed(e.to_string()));
                        break;
                    }
                },
            }
        }
    });
}

async fn flush_disconnect(event_loop: &mut EventLoop) {
    loop {
        match event_loop.poll().await {
            Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => return,
            Ok(_) => {}
        }
    }
}
