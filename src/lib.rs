//! # Netsave - Network Configuration Saver
//!
//! Netsave saves a network device's running configuration to the device's
//! startup configuration, to a named file on the device, and/or to a local
//! file on the control machine.
//!
//! ## Core Concepts
//!
//! - **Modules**: Units of work driven by a flat parameter map and reporting
//!   a structured, JSON-serializable result
//! - **Devices**: Platform drivers (NX-API, eAPI, SSH) behind a narrow
//!   open/save/backup/close contract
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  CLI Interface                      │
//! │             (clap-based flag parsing)               │
//! └─────────────────────────────────────────────────────┘
//!                          │
//!                          ▼
//! ┌─────────────────────────────────────────────────────┐
//! │                 Module Registry                     │
//! │          (save_config parameter handling)           │
//! └─────────────────────────────────────────────────────┘
//!                          │
//!                          ▼
//! ┌─────────────────────────────────────────────────────┐
//! │                  Device Layer                       │
//! │   (NX-API / eAPI via HTTP, Cisco IOS via SSH)       │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use netsave::modules::{ModuleRegistry, ModuleParams};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = ModuleRegistry::with_builtins();
//!     let params: ModuleParams = serde_json::from_value(serde_json::json!({
//!         "platform": "cisco_nxos_nxapi",
//!         "host": "10.1.1.1",
//!         "username": "admin",
//!         "password": "secret",
//!     }))?;
//!
//!     let output = registry.execute("save_config", &params).await?;
//!     println!("{}", serde_json::to_string_pretty(&output)?);
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

/// Error types and result aliases for netsave operations.
///
/// The main [`Error`](error::Error) enum covers configuration problems,
/// connection failures, and module execution errors, and maps each class
/// to a CLI exit code.
pub mod error;

/// Platform drivers for network devices.
///
/// This module provides the [`Device`](device::Device) trait and one driver
/// per supported platform:
/// - **NX-API** (Cisco Nexus): `ins_api` JSON over HTTP/HTTPS
/// - **eAPI** (Arista EOS): JSON-RPC over HTTP/HTTPS
/// - **SSH** (Cisco IOS): interactive CLI session
pub mod device;

/// Module system: parameter handling, results, and the registry.
///
/// Modules are driven by a flat key/value parameter map and report a
/// structured [`ModuleOutput`](modules::ModuleOutput). The only built-in
/// module is [`save_config`](modules::save_config).
pub mod modules;
