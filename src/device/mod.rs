//! Device layer for network platforms.
//!
//! This module provides the [`Device`] trait and shared types for talking to
//! network devices. Each supported platform maps to a device-type key and a
//! concrete driver:
//!
//! - `cisco_nxos_nxapi` → `nxos` → [`nxapi::NxapiDevice`] (HTTP/HTTPS)
//! - `arista_eos_eapi` → `eos` → [`eapi::EapiDevice`] (HTTP/HTTPS)
//! - `cisco_ios` → `ios` → [`ios::IosDevice`] (SSH)
//!
//! The contract is deliberately narrow: open a session, copy the running
//! configuration to persistent storage (startup config or a named file),
//! fetch the running configuration for a local backup, close the session.
//! There is no retry logic and no partial-failure recovery.

pub mod eapi;
pub mod ios;
pub mod nxapi;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Default per-request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Errors raised by device drivers.
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("Failed to connect to device: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Device command failed: {0}")]
    CommandFailed(String),

    #[error("Unexpected device response: {0}")]
    BadResponse(String),

    #[error("Session is not open")]
    NotOpen,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for device operations.
pub type DeviceResult<T> = Result<T, DeviceError>;

// ============================================================================
// Platform Types
// ============================================================================

/// Supported device platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    /// Cisco Nexus switches with NX-API enabled
    CiscoNxosNxapi,
    /// Cisco IOS/IOS-XE over SSH
    CiscoIos,
    /// Arista switches with eAPI enabled
    AristaEosEapi,
}

impl Platform {
    /// Device-type key for this platform.
    pub fn device_type(&self) -> &'static str {
        match self {
            Platform::CiscoNxosNxapi => "nxos",
            Platform::CiscoIos => "ios",
            Platform::AristaEosEapi => "eos",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Platform::CiscoNxosNxapi => write!(f, "cisco_nxos_nxapi"),
            Platform::CiscoIos => write!(f, "cisco_ios"),
            Platform::AristaEosEapi => write!(f, "arista_eos_eapi"),
        }
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "cisco_nxos_nxapi" | "nxos" | "nxapi" => Ok(Platform::CiscoNxosNxapi),
            "cisco_ios" | "ios" => Ok(Platform::CiscoIos),
            "arista_eos_eapi" | "eos" | "eapi" => Ok(Platform::AristaEosEapi),
            _ => Err(format!(
                "unknown platform '{}', valid options: cisco_nxos_nxapi, cisco_ios, arista_eos_eapi",
                s
            )),
        }
    }
}

/// Transport protocol for API-based platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Http,
    Https,
}

impl Transport {
    /// Standard port for this transport.
    pub fn default_port(&self) -> u16 {
        match self {
            Transport::Http => 80,
            Transport::Https => 443,
        }
    }

    /// URL scheme for this transport.
    pub fn scheme(&self) -> &'static str {
        match self {
            Transport::Http => "http",
            Transport::Https => "https",
        }
    }
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.scheme())
    }
}

impl std::str::FromStr for Transport {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "http" => Ok(Transport::Http),
            "https" => Ok(Transport::Https),
            _ => Err(format!("unknown transport '{}', valid options: http, https", s)),
        }
    }
}

// ============================================================================
// Connection Options
// ============================================================================

/// Optional session overrides.
///
/// Every field left unset falls back to the driver's platform default; the
/// caller only sets what it was explicitly given.
#[derive(Debug, Clone, Default)]
pub struct ConnectOptions {
    /// Transport protocol override (API platforms only).
    pub transport: Option<Transport>,
    /// TCP port override.
    pub port: Option<u16>,
    /// Enable secret (SSH platforms only).
    pub secret: Option<String>,
    /// Certificate verification for HTTPS transports.
    pub validate_certs: bool,
    /// Per-request timeout.
    pub timeout: Option<Duration>,
}

impl ConnectOptions {
    /// Effective timeout, defaulting to [`DEFAULT_TIMEOUT_SECS`].
    pub fn effective_timeout(&self) -> Duration {
        self.timeout
            .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }
}

// ============================================================================
// Device Trait
// ============================================================================

/// A session with a network device.
///
/// Drivers implement the narrow contract used by the save operation. All
/// methods are fallible; `save` additionally distinguishes a device-side
/// rejection (`Ok(false)`, e.g. a remote file that already exists) from a
/// transport or authentication failure (`Err`).
#[async_trait]
pub trait Device: Send {
    /// Establish and verify the session.
    async fn open(&mut self) -> DeviceResult<()>;

    /// Copy the running configuration to persistent storage on the device.
    ///
    /// With no filename the startup configuration is the destination.
    /// Returns whether the device reported success.
    async fn save(&mut self, filename: Option<&str>) -> DeviceResult<bool>;

    /// Fetch the running configuration text.
    async fn running_config(&mut self) -> DeviceResult<String>;

    /// Copy the running configuration to a local file.
    async fn backup_running_config(&mut self, path: &Path) -> DeviceResult<()> {
        let config = self.running_config().await?;
        tokio::fs::write(path, config).await?;
        Ok(())
    }

    /// Release the session.
    async fn close(&mut self) -> DeviceResult<()>;
}

/// Create a driver for the given platform.
///
/// The returned device is not yet open; callers must invoke
/// [`Device::open`] before issuing commands.
pub fn connect(
    platform: Platform,
    host: &str,
    username: &str,
    password: &str,
    options: ConnectOptions,
) -> Box<dyn Device> {
    match platform {
        Platform::CiscoNxosNxapi => {
            Box::new(nxapi::NxapiDevice::new(host, username, password, options))
        }
        Platform::AristaEosEapi => {
            Box::new(eapi::EapiDevice::new(host, username, password, options))
        }
        Platform::CiscoIos => Box::new(ios::IosDevice::new(host, username, password, options)),
    }
}
