use std::time::Duration;

use serde_derive::Deserialize;

use super::schedule::TimeSchedule;

// When changing anything here, make sure to add
// #[serde(alias = "ihavenounderscores")]
// where needed, so it can be read from the ENV vars.

#[derive(Debug, Deserialize)]
pub struct Printer {
    pub host: String,
    pub serial: String,
    #[serde(alias = "accesscode")]
    pub access_code: String,
}

// Fields with underscores take their defaults here rather than in the
// config builder, otherwise a default under one spelling and a value under
// the other end up as duplicate fields.
#[derive(Debug, Deserialize)]
pub struct Session {
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    pub port: u16,
    #[serde(alias = "ignoretlserrors", default = "default_ignore_tls_errors")]
    pub ignore_tls_errors: bool,
    #[serde(alias = "keepalive", with = "humantime_serde", default = "default_keep_alive")]
    pub keep_alive: Duration,
}

fn default_ignore_tls_errors() -> bool {
    true
}

fn default_keep_alive() -> Duration {
    Duration::from_secs(60)
}

#[derive(Debug, Deserialize)]
pub struct Watch {
    pub schedule: TimeSchedule,
    pub retries: usize,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub printer: Printer,
    pub session: Session,
    pub watch: Watch,
}
