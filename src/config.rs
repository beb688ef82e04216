//! Exporter configuration.
//!
//! The binary reads the raw values from flags or environment variables and
//! hands them to [`ExporterConfig::new`], which rejects anything that would
//! make the exporter useless before a socket is ever opened.

use crate::error::{ExporterError, Result};
use crate::web::WebConfig;
use std::net::IpAddr;
use std::time::Duration;

/// Length in bytes of a miIO device token.
pub const TOKEN_LEN: usize = 16;

/// A validated device token.
#[derive(Clone, PartialEq, Eq)]
pub struct Token([u8; TOKEN_LEN]);

impl Token {
    /// Parse a hex-encoded token (32 hex characters).
    pub fn from_hex(value: &str) -> Result<Self> {
        let bytes = hex::decode(value.trim())
            .map_err(|e| ExporterError::config_error(format!("TOKEN is not valid hex: {}", e)))?;
        let bytes: [u8; TOKEN_LEN] = bytes.try_into().map_err(|bytes: Vec<u8>| {
            ExporterError::config_error(format!(
                "TOKEN must be {} bytes ({} hex characters), got {} bytes",
                TOKEN_LEN,
                TOKEN_LEN * 2,
                bytes.len()
            ))
        })?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; TOKEN_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Token(..)")
    }
}

/// Complete configuration of one exporter process.
#[derive(Debug, Clone)]
pub struct ExporterConfig {
    /// Address of the vacuum on the local network
    pub ip_address: IpAddr,
    /// Device token used to derive the session key
    pub token: Token,
    /// Pause between two poll cycles
    pub polling_interval: Duration,
    /// Upper bound on a single request to the device
    pub device_timeout: Duration,
    /// Where the metrics endpoint listens
    pub web: WebConfig,
}

impl ExporterConfig {
    /// Validate raw configuration values.
    ///
    /// Address and token are required; an empty value counts as missing.
    pub fn new(
        ip_address: Option<&str>,
        token: Option<&str>,
        polling_interval_secs: u64,
        device_timeout_secs: u64,
        web: WebConfig,
    ) -> Result<Self> {
        let ip_address = required("IP_ADDRESS", ip_address)?;
        let token = required("TOKEN", token)?;

        let ip_address = ip_address.parse::<IpAddr>().map_err(|e| {
            ExporterError::config_error(format!("Invalid IP_ADDRESS {:?}: {}", ip_address, e))
        })?;
        let token = Token::from_hex(token)?;

        if polling_interval_secs == 0 {
            return Err(ExporterError::config_error(
                "POLLING_INTERVAL_SECONDS must be at least 1",
            ));
        }
        if device_timeout_secs == 0 {
            return Err(ExporterError::config_error(
                "DEVICE_TIMEOUT_SECONDS must be at least 1",
            ));
        }

        Ok(Self {
            ip_address,
            token,
            polling_interval: Duration::from_secs(polling_interval_secs),
            device_timeout: Duration::from_secs(device_timeout_secs),
            web,
        })
    }
}

fn required<'a>(name: &str, value: Option<&'a str>) -> Result<&'a str> {
    match value.map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(ExporterError::config_error(format!(
            "No {} found, it is required",
            name
        ))),
    }
}
