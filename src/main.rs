//! netsave - save network device configurations
//!
//! Saves the running configuration of a network device to its startup
//! configuration, to a named file on the device, and/or to a local file.
//!
//! This is the main entry point for the netsave CLI.

use clap::Parser;
use netsave::device::DeviceError;
use netsave::error::Error;
use netsave::modules::{ModuleError, ModuleParams, ModuleRegistry};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const MODULE: &str = "save_config";

/// Save the running config of a network device locally and/or remotely.
#[derive(Parser, Debug)]
#[command(name = "netsave", version, about, long_about = None)]
struct Cli {
    /// Vendor and platform of the device (cisco_nxos_nxapi, cisco_ios,
    /// arista_eos_eapi)
    #[arg(long)]
    platform: String,

    /// Hostname or IP address of the device
    #[arg(long)]
    host: String,

    /// Username used to login to the device
    #[arg(long, short = 'u')]
    username: String,

    /// Password used to login to the device
    #[arg(long, env = "NETSAVE_PASSWORD", hide_env_values = true)]
    password: String,

    /// Enable secret for devices connecting over SSH
    #[arg(long, env = "NETSAVE_SECRET", hide_env_values = true)]
    secret: Option<String>,

    /// Transport protocol for API-based platforms (http, https)
    #[arg(long)]
    transport: Option<String>,

    /// TCP port override (defaults: 80 http, 443 https, 22 ssh)
    #[arg(long)]
    port: Option<u16>,

    /// Name of remote file to save the running config to; the startup
    /// config is used when omitted
    #[arg(long)]
    remote_file: Option<String>,

    /// Path of a local file to save the running config to
    #[arg(long)]
    local_file: Option<String>,

    /// Insert a UTC timestamp into the local file name
    #[arg(long)]
    append_timestamp: bool,

    /// Verify HTTPS certificates
    #[arg(long)]
    validate_certs: bool,

    /// Per-request timeout in seconds
    #[arg(long)]
    timeout: Option<u32>,

    /// Increase output verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn params(&self) -> ModuleParams {
        let mut params = ModuleParams::new();
        params.insert("platform".to_string(), serde_json::json!(self.platform));
        params.insert("host".to_string(), serde_json::json!(self.host));
        params.insert("username".to_string(), serde_json::json!(self.username));
        params.insert("password".to_string(), serde_json::json!(self.password));

        if let Some(ref secret) = self.secret {
            params.insert("secret".to_string(), serde_json::json!(secret));
        }
        if let Some(ref transport) = self.transport {
            params.insert("transport".to_string(), serde_json::json!(transport));
        }
        if let Some(port) = self.port {
            params.insert("port".to_string(), serde_json::json!(port));
        }
        if let Some(ref remote_file) = self.remote_file {
            params.insert("remote_file".to_string(), serde_json::json!(remote_file));
        }
        if let Some(ref local_file) = self.local_file {
            params.insert("local_file".to_string(), serde_json::json!(local_file));
        }
        if self.append_timestamp {
            params.insert("append_timestamp".to_string(), serde_json::json!(true));
        }
        if self.validate_certs {
            params.insert("validate_certs".to_string(), serde_json::json!(true));
        }
        if let Some(timeout) = self.timeout {
            params.insert("timeout".to_string(), serde_json::json!(timeout));
        }
        params
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let registry = ModuleRegistry::with_builtins();
    let params = cli.params();

    match registry.execute(MODULE, &params).await {
        Ok(output) => {
            match serde_json::to_string_pretty(&output) {
                Ok(json) => println!("{}", json),
                Err(e) => eprintln!("Failed to serialize result: {}", e),
            }
            std::process::exit(0);
        }
        Err(err) => {
            let err = to_cli_error(err, &cli.host, &cli.username);
            eprintln!("Error: {}", err);
            std::process::exit(err.exit_code());
        }
    }
}

/// Map a module error into the CLI error type, attaching connection context.
fn to_cli_error(err: ModuleError, host: &str, user: &str) -> Error {
    match err {
        ModuleError::NotFound(name) => Error::ModuleNotFound(name),
        ModuleError::InvalidParameter(message) => Error::module_args(MODULE, message),
        ModuleError::MissingParameter(param) => {
            Error::module_args(MODULE, format!("missing required parameter '{}'", param))
        }
        ModuleError::Device(DeviceError::ConnectionFailed(message)) => {
            Error::connection_failed(host, message)
        }
        ModuleError::Device(DeviceError::AuthenticationFailed(message)) => {
            Error::AuthenticationFailed {
                user: user.to_string(),
                host: host.to_string(),
                message,
            }
        }
        ModuleError::Device(e) => Error::module_execution(MODULE, e.to_string()),
        ModuleError::ExecutionFailed(message) => Error::module_execution(MODULE, message),
        ModuleError::Io(e) => Error::Io(e),
    }
}

/// Initialize logging based on verbosity level
fn init_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(verbosity >= 3).with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_params_only_include_supplied_options() {
        let cli = Cli::parse_from([
            "netsave",
            "--platform",
            "cisco_nxos_nxapi",
            "--host",
            "10.1.1.1",
            "--username",
            "admin",
            "--password",
            "secret",
        ]);
        let params = cli.params();
        assert_eq!(params["platform"], serde_json::json!("cisco_nxos_nxapi"));
        assert!(!params.contains_key("transport"));
        assert!(!params.contains_key("port"));
        assert!(!params.contains_key("secret"));
        assert!(!params.contains_key("append_timestamp"));
    }

    #[test]
    fn test_cli_params_forward_overrides() {
        let cli = Cli::parse_from([
            "netsave",
            "--platform",
            "arista_eos_eapi",
            "--host",
            "10.2.2.2",
            "--username",
            "admin",
            "--password",
            "secret",
            "--transport",
            "https",
            "--port",
            "8443",
            "--remote-file",
            "copy.cfg",
            "--append-timestamp",
        ]);
        let params = cli.params();
        assert_eq!(params["transport"], serde_json::json!("https"));
        assert_eq!(params["port"], serde_json::json!(8443));
        assert_eq!(params["remote_file"], serde_json::json!("copy.cfg"));
        assert_eq!(params["append_timestamp"], serde_json::json!(true));
    }

    #[test]
    fn test_error_mapping() {
        let err = to_cli_error(
            ModuleError::Device(DeviceError::ConnectionFailed("refused".to_string())),
            "10.1.1.1",
            "admin",
        );
        assert_eq!(err.exit_code(), 3);

        let err = to_cli_error(
            ModuleError::MissingParameter("platform".to_string()),
            "10.1.1.1",
            "admin",
        );
        assert_eq!(err.exit_code(), 4);
    }
}
