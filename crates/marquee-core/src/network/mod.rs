mod client;
mod config;

pub use client::{redact, ClientError, ClientResult, HttpClient};
pub use config::{NetworkConfig, NetworkConfigError};
