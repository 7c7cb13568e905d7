//! Runs a full fetch against a minimal in-process MQTT broker over TLS.

use std::{sync::Arc, time::Duration};

use bambu_status::{ClassifiedStatus, PrinterEndpoint, SessionOutcome, StatusSession};
use rumqttc::tokio_rustls::{
    rustls::{
        pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer},
        ServerConfig,
    },
    TlsAcceptor,
};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
    runtime::Runtime,
};

const SERIAL: &str = "01P00A000000001";
const CERT: &[u8] = include_bytes!("fixtures/printer-cert.der");
const KEY: &[u8] = include_bytes!("fixtures/printer-key.der");

#[derive(Debug, PartialEq)]
enum Seen {
    Connect { client_id: String, username: String, password: String, keep_alive: u16 },
    Subscribe(String),
    Publish { topic: String, payload: Vec<u8> },
    Disconnect,
}

fn acceptor() -> TlsAcceptor {
    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(vec![CertificateDer::from(CERT)], PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(KEY)))
        .expect("fixture certificate and key match");
    TlsAcceptor::from(Arc::new(config))
}

async fn read_packet<S: AsyncRead + Unpin>(stream: &mut S) -> Option<(u8, Vec<u8>)> {
    let header = stream.read_u8().await.ok()?;
    let mut len = 0usize;
    let mut shift = 0;
    loop {
        let byte = stream.read_u8().await.ok()?;
        len |= ((byte & 0x7f) as usize) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
    }
    let mut body = vec![0; len];
    stream.read_exact(&mut body).await.ok()?;
    Some((header, body))
}

fn encode(header: u8, body: &[u8]) -> Vec<u8> {
    let mut packet = vec![header];
    let mut len = body.len();
    loop {
        let mut byte = (len % 128) as u8;
        len /= 128;
        if len > 0 {
            byte |= 0x80;
        }
        packet.push(byte);
        if len == 0 {
            break;
        }
    }
    packet.extend_from_slice(body);
    packet
}

fn publish(topic: &str, payload: &str) -> Vec<u8> {
    let mut body = (topic.len() as u16).to_be_bytes().to_vec();
    body.extend_from_slice(topic.as_bytes());
    body.extend_from_slice(payload.as_bytes());
    encode(0x30, &body)
}

fn read_string(body: &[u8], at: &mut usize) -> String {
    let len = u16::from_be_bytes([body[*at], body[*at + 1]]) as usize;
    let value = String::from_utf8_lossy(&body[*at + 2..*at + 2 + len]).into_owned();
    *at += 2 + len;
    value
}

fn parse_connect(body: &[u8]) -> Seen {
    let mut at = 0;
    assert_eq!(read_string(body, &mut at), "MQTT");
    let flags = body[at + 1];
    let keep_alive = u16::from_be_bytes([body[at + 2], body[at + 3]]);
    at += 4;
    let client_id = read_string(body, &mut at);
    let username = if flags & 0x80 != 0 { read_string(body, &mut at) } else { String::new() };
    let password = if flags & 0x40 != 0 { read_string(body, &mut at) } else { String::new() };
    Seen::Connect { client_id, username, password, keep_alive }
}

/// Accepts one client, answers its request with `replies` and records what it sent.
async fn serve_one(listener: TcpListener, acceptor: TlsAcceptor, replies: Vec<Vec<u8>>) -> Vec<Seen> {
    let (tcp, _) = listener.accept().await.expect("client connects");
    let mut stream = acceptor.accept(tcp).await.expect("TLS handshake");
    let mut seen = Vec::new();

    while let Some((header, body)) = read_packet(&mut stream).await {
        match header >> 4 {
            1 => {
                seen.push(parse_connect(&body));
                stream.write_all(&[0x20, 0x02, 0x00, 0x00]).await.unwrap();
            }
            8 => {
                let mut at = 2;
                seen.push(Seen::Subscribe(read_string(&body, &mut at)));
                stream.write_all(&[0x90, 0x03, body[0], body[1], 0x00]).await.unwrap();
            }
            3 => {
                let mut at = 0;
                let topic = read_string(&body, &mut at);
                seen.push(Seen::Publish { topic, payload: body[at..].to_vec() });
                for reply in &replies {
                    stream.write_all(reply).await.unwrap();
                }
            }
            12 => stream.write_all(&[0xd0, 0x00]).await.unwrap(),
            14 => {
                seen.push(Seen::Disconnect);
                break;
            }
            _ => {}
        }
        stream.flush().await.unwrap();
    }
    seen
}

#[test]
fn first_report_is_classified_and_the_client_disconnects() {
    let runtime = Runtime::new().unwrap();
    let listener = runtime.block_on(TcpListener::bind("127.0.0.1:0")).unwrap();
    let port = listener.local_addr().unwrap().port();

    let report_topic = format!("device/{SERIAL}/report");
    let replies = vec![
        publish(&report_topic, r#"{"pushing":{"sequence_id":"0","command":"pushall"}}"#),
        publish(&report_topic, r#"{"print":{"gcode_state":"RUNNING","mc_remaining_time":125}}"#),
        publish(&report_topic, r#"{"print":{"gcode_state":"FINISH","mc_remaining_time":0}}"#),
    ];
    let broker = runtime.spawn(serve_one(listener, acceptor(), replies));

    let session = StatusSession::new().with_port(port);
    let endpoint = PrinterEndpoint::new("127.0.0.1", SERIAL, "12345678");
    let outcome = session.fetch_outcome(&endpoint, Duration::from_secs(10)).unwrap();

    match &outcome {
        SessionOutcome::Classified { status, report } => {
            assert_eq!(*status, ClassifiedStatus::Remaining { hours: 2, minutes: 5 });
            assert_eq!(report.print_section().unwrap()["gcode_state"], "RUNNING");
        }
        other => panic!("expected a classified report, got {other:?}"),
    }

    let seen = runtime
        .block_on(async { tokio::time::timeout(Duration::from_secs(5), broker).await })
        .expect("broker finished")
        .expect("broker task did not panic");

    assert_eq!(seen.len(), 4, "broker saw {seen:?}");
    match &seen[0] {
        Seen::Connect { client_id, username, password, keep_alive } => {
            assert!(client_id.starts_with("bambu-status-"));
            assert_eq!(username, "bblp");
            assert_eq!(password, "12345678");
            assert_eq!(*keep_alive, 60);
        }
        other => panic!("expected CONNECT first, got {other:?}"),
    }
    assert_eq!(seen[1], Seen::Subscribe(report_topic));
    match &seen[2] {
        Seen::Publish { topic, payload } => {
            assert_eq!(topic, &format!("device/{SERIAL}/request"));
            let request: serde_json::Value = serde_json::from_slice(payload).unwrap();
            assert_eq!(request, serde_json::json!({"pushing": {"sequence_id": "0", "command": "pushall"}}));
        }
        other => panic!("expected the status request, got {other:?}"),
    }
    assert_eq!(seen[3], Seen::Disconnect);
}
