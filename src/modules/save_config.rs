//! Configuration saver module.
//!
//! Saves the running configuration as the startup configuration or to a file
//! on the network device. Optionally saves the running configuration to the
//! control machine. Supported platforms: Cisco Nexus switches with NX-API,
//! Cisco IOS over SSH, Arista switches with eAPI.
//!
//! This module is not idempotent: every invocation performs a save.
//!
//! ## Parameters
//!
//! - `platform`: Vendor and platform identifier (required). One of
//!   `cisco_nxos_nxapi`, `cisco_ios`, `arista_eos_eapi`
//! - `host`: Hostname or IP address of the device (required)
//! - `username`: Login username (required)
//! - `password`: Login password (required)
//! - `secret`: Enable secret for devices connecting over SSH
//! - `transport`: Transport protocol for API platforms (`http`, `https`).
//!   If omitted the platform default is used
//! - `port`: TCP port override. If omitted standard port numbers are used:
//!   80 for HTTP, 443 for HTTPS, 22 for SSH
//! - `remote_file`: Name of remote file to save the running configuration.
//!   If omitted it is saved to the startup configuration
//! - `local_file`: Path of a local file to save the running configuration.
//!   If omitted no local copy is made
//! - `append_timestamp`: Insert a UTC timestamp into the local file name
//! - `validate_certs`: Verify HTTPS certificates (default false; device APIs
//!   almost always use self-signed certificates)
//! - `timeout`: Per-request timeout in seconds
//!
//! ## Examples
//!
//! ```json
//! {
//!     "platform": "cisco_nxos_nxapi",
//!     "host": "nxos-spine1",
//!     "username": "admin",
//!     "password": "secret"
//! }
//! ```
//!
//! ```json
//! {
//!     "platform": "arista_eos_eapi",
//!     "host": "eos-leaf1",
//!     "username": "admin",
//!     "password": "secret",
//!     "remote_file": "running_config_copy.cfg",
//!     "transport": "https"
//! }
//! ```
//!
//! ## Return values
//!
//! - `changed`: whether anything changed on the device or locally
//! - `remote_save_successful`: whether the device accepted the remote save.
//!   May be false when a file with the same name already exists
//! - `remote_file`: the remote file name, or `(Startup Config)` when the
//!   startup configuration was the destination
//! - `local_file`: the local file path written, or null
//! - `local_file_checksum`: SHA-256 of the local copy, when one was written

use crate::device::{self, ConnectOptions, Device, Platform, Transport};
use crate::modules::{Module, ModuleError, ModuleOutput, ModuleParams, ModuleResult, ParamExt};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Placeholder reported as `remote_file` when the startup configuration was
/// the save destination.
pub const STARTUP_CONFIG_LABEL: &str = "(Startup Config)";

// ============================================================================
// Save Request
// ============================================================================

/// Save request parsed from module parameters.
#[derive(Debug, Clone)]
struct SaveConfig {
    platform: Platform,
    host: String,
    username: String,
    password: String,
    secret: Option<String>,
    transport: Option<Transport>,
    port: Option<u16>,
    remote_file: Option<String>,
    local_file: Option<String>,
    append_timestamp: bool,
    validate_certs: bool,
    timeout: Option<Duration>,
}

impl SaveConfig {
    fn from_params(params: &ModuleParams) -> ModuleResult<Self> {
        let platform = params
            .get_string_required("platform")?
            .parse::<Platform>()
            .map_err(|e| ModuleError::InvalidParameter(e.to_string()))?;

        let transport = match params.get_string("transport")? {
            Some(t) => Some(
                t.parse::<Transport>()
                    .map_err(|e| ModuleError::InvalidParameter(e.to_string()))?,
            ),
            None => None,
        };

        let port = match params.get_u32("port")? {
            Some(p) => Some(u16::try_from(p).map_err(|_| {
                ModuleError::InvalidParameter(format!("port {} is out of range", p))
            })?),
            None => None,
        };

        let timeout = params
            .get_u32("timeout")?
            .map(|t| Duration::from_secs(u64::from(t)));

        Ok(Self {
            platform,
            host: params.get_string_required("host")?,
            username: params.get_string_required("username")?,
            password: params.get_string_required("password")?,
            secret: params.get_string("secret")?,
            transport,
            port,
            remote_file: params.get_string("remote_file")?,
            local_file: params.get_string("local_file")?,
            append_timestamp: params.get_bool_or("append_timestamp", false)?,
            validate_certs: params.get_bool_or("validate_certs", false)?,
            timeout,
        })
    }

    /// Session overrides, populated only from explicitly supplied parameters
    /// so omitted ones cannot shadow driver defaults.
    fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            transport: self.transport,
            port: self.port,
            secret: self.secret.clone(),
            validate_certs: self.validate_certs,
            timeout: self.timeout,
        }
    }

    /// The remote file label reported back to the caller.
    fn remote_file_label(&self) -> String {
        self.remote_file
            .clone()
            .unwrap_or_else(|| STARTUP_CONFIG_LABEL.to_string())
    }

    /// The local path to write, with the timestamp inserted when requested.
    fn local_backup_path(&self) -> Option<PathBuf> {
        let local_file = self.local_file.as_ref()?;
        if !self.append_timestamp {
            return Some(PathBuf::from(local_file));
        }

        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S").to_string();
        Some(timestamped_path(Path::new(local_file), &timestamp))
    }
}

/// Insert a timestamp between the file stem and its extension.
fn timestamped_path(path: &Path, timestamp: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let file_name = match path.extension() {
        Some(ext) => format!("{}_{}.{}", stem, timestamp, ext.to_string_lossy()),
        None => format!("{}_{}", stem, timestamp),
    };

    path.with_file_name(file_name)
}

fn sha256_hex(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

// ============================================================================
// Save Outcome
// ============================================================================

/// What the save run accomplished, before result formatting.
struct SaveOutcome {
    remote_save_successful: bool,
    local_file: Option<String>,
    local_file_checksum: Option<String>,
}

// ============================================================================
// Module Implementation
// ============================================================================

/// Save the running config locally and/or remotely.
pub struct SaveConfigModule;

impl SaveConfigModule {
    /// Perform the remote save and the optional local backup on an open
    /// session.
    async fn run_save(device: &mut dyn Device, config: &SaveConfig) -> ModuleResult<SaveOutcome> {
        let remote_save_successful = device.save(config.remote_file.as_deref()).await?;
        debug!(
            remote_file = %config.remote_file_label(),
            success = remote_save_successful,
            "Remote save completed"
        );

        let mut local_file = None;
        let mut local_file_checksum = None;
        if let Some(path) = config.local_backup_path() {
            device.backup_running_config(&path).await?;
            let content = tokio::fs::read(&path).await?;
            local_file_checksum = Some(sha256_hex(&content));
            local_file = Some(path.to_string_lossy().into_owned());
            debug!(path = %path.display(), "Local backup written");
        }

        Ok(SaveOutcome {
            remote_save_successful,
            local_file,
            local_file_checksum,
        })
    }

    /// Open the session, run the save, and close the session regardless of
    /// save outcome.
    async fn run_module(device: &mut dyn Device, config: &SaveConfig) -> ModuleResult<ModuleOutput> {
        device.open().await?;
        let result = Self::run_save(device, config).await;
        let close_result = device.close().await;
        let outcome = result?;
        close_result?;

        let mut messages = Vec::new();
        let label = config.remote_file_label();
        if outcome.remote_save_successful {
            messages.push(format!("Saved running config to {}", label));
        } else {
            messages.push(format!("Device did not accept save to {}", label));
        }
        if let Some(ref path) = outcome.local_file {
            messages.push(format!("Backed up running config to {}", path));
        }
        let msg = messages.join(". ");

        // A local backup has no independent success signal, so it always
        // counts as a change.
        let changed = outcome.remote_save_successful || outcome.local_file.is_some();

        let mut output = if changed {
            ModuleOutput::changed(msg)
        } else {
            ModuleOutput::ok(msg)
        };
        output = output
            .with_data(
                "remote_save_successful",
                serde_json::json!(outcome.remote_save_successful),
            )
            .with_data("remote_file", serde_json::json!(label))
            .with_data("local_file", serde_json::json!(outcome.local_file));
        if let Some(checksum) = outcome.local_file_checksum {
            output = output.with_data("local_file_checksum", serde_json::json!(checksum));
        }

        Ok(output)
    }
}

#[async_trait]
impl Module for SaveConfigModule {
    fn name(&self) -> &'static str {
        "save_config"
    }

    fn description(&self) -> &'static str {
        "Save the running config locally and/or remotely"
    }

    fn required_params(&self) -> &[&'static str] {
        &["platform", "host", "username", "password"]
    }

    fn validate_params(&self, params: &ModuleParams) -> ModuleResult<()> {
        SaveConfig::from_params(params).map(|_| ())
    }

    async fn execute(&self, params: &ModuleParams) -> ModuleResult<ModuleOutput> {
        let config = SaveConfig::from_params(params)?;
        info!(
            platform = %config.platform,
            device_type = config.platform.device_type(),
            host = %config.host,
            "Saving device configuration"
        );

        let mut device = device::connect(
            config.platform,
            &config.host,
            &config.username,
            &config.password,
            config.connect_options(),
        );

        Self::run_module(device.as_mut(), &config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceError, DeviceResult};
    use pretty_assertions::assert_eq;

    fn base_params() -> ModuleParams {
        let mut params = ModuleParams::new();
        params.insert("platform".to_string(), serde_json::json!("cisco_nxos_nxapi"));
        params.insert("host".to_string(), serde_json::json!("10.1.1.1"));
        params.insert("username".to_string(), serde_json::json!("admin"));
        params.insert("password".to_string(), serde_json::json!("secret"));
        params
    }

    // ------------------------------------------------------------------
    // Parameter parsing
    // ------------------------------------------------------------------

    #[test]
    fn test_from_params_basic() {
        let config = SaveConfig::from_params(&base_params()).unwrap();
        assert_eq!(config.platform, Platform::CiscoNxosNxapi);
        assert_eq!(config.host, "10.1.1.1");
        assert!(config.remote_file.is_none());
        assert!(config.local_file.is_none());
        assert!(!config.append_timestamp);
    }

    #[test]
    fn test_from_params_unknown_platform() {
        let mut params = base_params();
        params.insert("platform".to_string(), serde_json::json!("juniper_junos"));
        assert!(matches!(
            SaveConfig::from_params(&params),
            Err(ModuleError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_from_params_invalid_transport() {
        let mut params = base_params();
        params.insert("transport".to_string(), serde_json::json!("telnet"));
        assert!(matches!(
            SaveConfig::from_params(&params),
            Err(ModuleError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_from_params_port_out_of_range() {
        let mut params = base_params();
        params.insert("port".to_string(), serde_json::json!(70000));
        assert!(matches!(
            SaveConfig::from_params(&params),
            Err(ModuleError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_omitted_options_stay_unset() {
        let config = SaveConfig::from_params(&base_params()).unwrap();
        let options = config.connect_options();
        assert!(options.transport.is_none());
        assert!(options.port.is_none());
        assert!(options.secret.is_none());
        assert!(options.timeout.is_none());
    }

    #[test]
    fn test_supplied_options_are_forwarded() {
        let mut params = base_params();
        params.insert("transport".to_string(), serde_json::json!("https"));
        params.insert("port".to_string(), serde_json::json!(8443));
        params.insert("secret".to_string(), serde_json::json!("enablepass"));
        params.insert("timeout".to_string(), serde_json::json!(10));

        let config = SaveConfig::from_params(&params).unwrap();
        let options = config.connect_options();
        assert_eq!(options.transport, Some(Transport::Https));
        assert_eq!(options.port, Some(8443));
        assert_eq!(options.secret.as_deref(), Some("enablepass"));
        assert_eq!(options.timeout, Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_remote_file_label() {
        let config = SaveConfig::from_params(&base_params()).unwrap();
        assert_eq!(config.remote_file_label(), STARTUP_CONFIG_LABEL);

        let mut params = base_params();
        params.insert("remote_file".to_string(), serde_json::json!("copy.cfg"));
        let config = SaveConfig::from_params(&params).unwrap();
        assert_eq!(config.remote_file_label(), "copy.cfg");
    }

    #[test]
    fn test_timestamped_path() {
        assert_eq!(
            timestamped_path(Path::new("backup.cfg"), "20260828_120000"),
            PathBuf::from("backup_20260828_120000.cfg")
        );
        assert_eq!(
            timestamped_path(Path::new("/tmp/configs/sw1"), "20260828_120000"),
            PathBuf::from("/tmp/configs/sw1_20260828_120000")
        );
    }

    #[test]
    fn test_local_backup_path_echoes_without_timestamp() {
        let mut params = base_params();
        params.insert("local_file".to_string(), serde_json::json!("backup.cfg"));
        let config = SaveConfig::from_params(&params).unwrap();
        assert_eq!(config.local_backup_path(), Some(PathBuf::from("backup.cfg")));
    }

    #[test]
    fn test_validate_params_rejects_bad_platform() {
        let module = SaveConfigModule;
        let mut params = base_params();
        params.insert("platform".to_string(), serde_json::json!("unknown"));
        assert!(module.validate_params(&params).is_err());
    }

    #[test]
    fn test_validate_params_rejects_bad_boolean() {
        let module = SaveConfigModule;
        let mut params = base_params();
        params.insert("append_timestamp".to_string(), serde_json::json!("banana"));
        assert!(matches!(
            module.validate_params(&params),
            Err(ModuleError::InvalidParameter(_))
        ));

        let mut params = base_params();
        params.insert("validate_certs".to_string(), serde_json::json!("banana"));
        assert!(module.validate_params(&params).is_err());
    }

    // ------------------------------------------------------------------
    // Save behavior with a scripted device
    // ------------------------------------------------------------------

    /// In-memory device recording the calls made against it.
    struct FakeDevice {
        save_ok: bool,
        fail_save: bool,
        opened: bool,
        closed: bool,
        saved_with: Option<Option<String>>,
        running: String,
    }

    impl FakeDevice {
        fn new(save_ok: bool) -> Self {
            Self {
                save_ok,
                fail_save: false,
                opened: false,
                closed: false,
                saved_with: None,
                running: "hostname sw1\n!\nend\n".to_string(),
            }
        }
    }

    #[async_trait]
    impl Device for FakeDevice {
        async fn open(&mut self) -> DeviceResult<()> {
            self.opened = true;
            Ok(())
        }

        async fn save(&mut self, filename: Option<&str>) -> DeviceResult<bool> {
            self.saved_with = Some(filename.map(String::from));
            if self.fail_save {
                return Err(DeviceError::CommandFailed("save exploded".to_string()));
            }
            Ok(self.save_ok)
        }

        async fn running_config(&mut self) -> DeviceResult<String> {
            Ok(self.running.clone())
        }

        async fn close(&mut self) -> DeviceResult<()> {
            self.closed = true;
            Ok(())
        }
    }

    fn config_with(params: ModuleParams) -> SaveConfig {
        SaveConfig::from_params(&params).unwrap()
    }

    #[tokio::test]
    async fn test_startup_save_success() {
        let mut device = FakeDevice::new(true);
        let config = config_with(base_params());

        let output = SaveConfigModule::run_module(&mut device, &config)
            .await
            .unwrap();

        assert!(device.opened);
        assert!(device.closed);
        assert_eq!(device.saved_with, Some(None));
        assert!(output.changed);
        assert_eq!(
            output.data["remote_save_successful"],
            serde_json::json!(true)
        );
        assert_eq!(
            output.data["remote_file"],
            serde_json::json!(STARTUP_CONFIG_LABEL)
        );
        assert_eq!(output.data["local_file"], serde_json::Value::Null);
    }

    #[tokio::test]
    async fn test_remote_file_is_forwarded_and_reported() {
        let mut device = FakeDevice::new(true);
        let mut params = base_params();
        params.insert("remote_file".to_string(), serde_json::json!("copy.cfg"));
        let config = config_with(params);

        let output = SaveConfigModule::run_module(&mut device, &config)
            .await
            .unwrap();

        assert_eq!(device.saved_with, Some(Some("copy.cfg".to_string())));
        assert_eq!(output.data["remote_file"], serde_json::json!("copy.cfg"));
    }

    #[tokio::test]
    async fn test_failed_save_without_local_file_is_unchanged() {
        let mut device = FakeDevice::new(false);
        let config = config_with(base_params());

        let output = SaveConfigModule::run_module(&mut device, &config)
            .await
            .unwrap();

        assert!(!output.changed);
        assert_eq!(
            output.data["remote_save_successful"],
            serde_json::json!(false)
        );
        assert!(device.closed);
    }

    #[tokio::test]
    async fn test_local_file_forces_changed_even_when_save_fails() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("backup.cfg");

        let mut device = FakeDevice::new(false);
        let mut params = base_params();
        params.insert("platform".to_string(), serde_json::json!("cisco_ios"));
        params.insert(
            "local_file".to_string(),
            serde_json::json!(local.to_string_lossy()),
        );
        let config = config_with(params);

        let output = SaveConfigModule::run_module(&mut device, &config)
            .await
            .unwrap();

        assert!(output.changed);
        assert_eq!(
            output.data["remote_save_successful"],
            serde_json::json!(false)
        );
        assert_eq!(
            output.data["local_file"],
            serde_json::json!(local.to_string_lossy())
        );
        assert_eq!(
            std::fs::read_to_string(&local).unwrap(),
            "hostname sw1\n!\nend\n"
        );
        assert!(output.data.contains_key("local_file_checksum"));
    }

    #[tokio::test]
    async fn test_local_backup_checksum_matches_content() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("backup.cfg");

        let mut device = FakeDevice::new(true);
        let mut params = base_params();
        params.insert(
            "local_file".to_string(),
            serde_json::json!(local.to_string_lossy()),
        );
        let config = config_with(params);

        let output = SaveConfigModule::run_module(&mut device, &config)
            .await
            .unwrap();

        let expected = sha256_hex("hostname sw1\n!\nend\n".as_bytes());
        assert_eq!(
            output.data["local_file_checksum"],
            serde_json::json!(expected)
        );
    }

    #[tokio::test]
    async fn test_session_closed_when_save_errors() {
        let mut device = FakeDevice::new(true);
        device.fail_save = true;
        let config = config_with(base_params());

        let result = SaveConfigModule::run_module(&mut device, &config).await;

        assert!(matches!(result, Err(ModuleError::Device(_))));
        assert!(device.closed);
    }

    #[tokio::test]
    async fn test_append_timestamp_rewrites_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("backup.cfg");

        let mut device = FakeDevice::new(true);
        let mut params = base_params();
        params.insert(
            "local_file".to_string(),
            serde_json::json!(local.to_string_lossy()),
        );
        params.insert("append_timestamp".to_string(), serde_json::json!(true));
        let config = config_with(params);

        let output = SaveConfigModule::run_module(&mut device, &config)
            .await
            .unwrap();

        let reported = output.data["local_file"].as_str().unwrap().to_string();
        assert_ne!(reported, local.to_string_lossy());
        assert!(reported.starts_with(&*dir.path().join("backup_").to_string_lossy()));
        assert!(reported.ends_with(".cfg"));
        assert!(std::path::Path::new(&reported).exists());
    }
}
