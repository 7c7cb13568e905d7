pub mod client;
pub mod models;
pub mod session;
pub mod signal;
pub mod tls;
pub mod transport;
