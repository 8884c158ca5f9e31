//! Arista eAPI driver.
//!
//! Talks to EOS switches through the JSON-RPC `command-api` endpoint over
//! HTTP or HTTPS using the `runCmds` method. eAPI defaults to HTTPS on port
//! 443; plain HTTP uses 80.

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::{ConnectOptions, Device, DeviceError, DeviceResult, Transport};
use async_trait::async_trait;

/// eAPI JSON-RPC request.
#[derive(Debug, Serialize)]
struct EapiRequest {
    jsonrpc: String,
    method: String,
    params: EapiParams,
    id: String,
}

#[derive(Debug, Serialize)]
struct EapiParams {
    version: u32,
    cmds: Vec<String>,
    format: String,
}

/// eAPI JSON-RPC response.
#[derive(Debug, Deserialize)]
struct EapiResponse {
    #[serde(default)]
    result: Option<Vec<EapiResult>>,
    #[serde(default)]
    error: Option<EapiError>,
}

#[derive(Debug, Deserialize)]
struct EapiResult {
    #[serde(default)]
    output: String,
}

#[derive(Debug, Deserialize)]
struct EapiError {
    code: i32,
    message: String,
    #[serde(default)]
    data: Option<Vec<EapiErrorData>>,
}

#[derive(Debug, Deserialize)]
struct EapiErrorData {
    #[serde(default)]
    errors: Vec<String>,
}

impl EapiError {
    fn details(&self) -> String {
        self.data
            .as_ref()
            .map(|d| {
                d.iter()
                    .flat_map(|ed| ed.errors.iter())
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_default()
    }
}

/// Arista EOS device reached through eAPI.
pub struct EapiDevice {
    host: String,
    username: String,
    password: String,
    transport: Transport,
    port: u16,
    validate_certs: bool,
    timeout: std::time::Duration,
    client: Option<Client>,
}

impl EapiDevice {
    pub fn new(host: &str, username: &str, password: &str, options: ConnectOptions) -> Self {
        let transport = options.transport.unwrap_or(Transport::Https);
        let port = options.port.unwrap_or_else(|| transport.default_port());

        Self {
            host: host.to_string(),
            username: username.to_string(),
            password: password.to_string(),
            transport,
            port,
            validate_certs: options.validate_certs,
            timeout: options.effective_timeout(),
            client: None,
        }
    }

    fn url(&self) -> String {
        format!(
            "{}://{}:{}/command-api",
            self.transport.scheme(),
            self.host,
            self.port
        )
    }

    fn build_client(&self) -> DeviceResult<Client> {
        let builder = Client::builder().timeout(self.timeout);

        let client = if self.transport == Transport::Https && !self.validate_certs {
            builder.danger_accept_invalid_certs(true).build()
        } else {
            builder.build()
        };

        client.map_err(|e| {
            DeviceError::ConnectionFailed(format!("Failed to create HTTP client: {}", e))
        })
    }

    /// Run commands via JSON-RPC. HTTP-level failures are errors; a JSON-RPC
    /// error object is handed back for the caller to interpret.
    async fn run_cmds(&self, cmds: Vec<String>) -> DeviceResult<EapiResponse> {
        let client = self.client.as_ref().ok_or(DeviceError::NotOpen)?;

        let request = EapiRequest {
            jsonrpc: "2.0".to_string(),
            method: "runCmds".to_string(),
            params: EapiParams {
                version: 1,
                cmds,
                format: "text".to_string(),
            },
            id: uuid::Uuid::new_v4().to_string(),
        };

        trace!(cmds = ?request.params.cmds, "Sending eAPI request");

        let response = client
            .post(self.url())
            .basic_auth(&self.username, Some(&self.password))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| DeviceError::ConnectionFailed(format!("eAPI request failed: {}", e)))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(DeviceError::AuthenticationFailed(format!(
                "eAPI rejected credentials for {}",
                self.username
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeviceError::CommandFailed(format!(
                "eAPI returned status {}: {}",
                status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| DeviceError::BadResponse(format!("Failed to parse eAPI response: {}", e)))
    }

    /// Run a single show command and return its text output.
    async fn show(&self, command: &str) -> DeviceResult<String> {
        let response = self.run_cmds(vec![command.to_string()]).await?;

        if let Some(error) = response.error {
            return Err(DeviceError::CommandFailed(format!(
                "eAPI error {}: {} {}",
                error.code,
                error.message,
                error.details()
            )));
        }

        response
            .result
            .and_then(|r| r.into_iter().next())
            .map(|r| r.output)
            .ok_or_else(|| DeviceError::BadResponse("eAPI returned no result".to_string()))
    }
}

#[async_trait]
impl Device for EapiDevice {
    async fn open(&mut self) -> DeviceResult<()> {
        debug!(host = %self.host, port = %self.port, transport = %self.transport, "Opening eAPI session");
        self.client = Some(self.build_client()?);

        // Cheap command to surface connectivity and auth problems early.
        self.show("show hostname").await?;
        Ok(())
    }

    async fn save(&mut self, filename: Option<&str>) -> DeviceResult<bool> {
        let command = match filename {
            Some(name) => format!("copy running-config {}", name),
            None => "copy running-config startup-config".to_string(),
        };

        debug!(command = %command, "Saving configuration via eAPI");
        let response = self.run_cmds(vec![command]).await?;

        // A JSON-RPC error here means the CLI rejected the copy, not that the
        // transport failed.
        match response.error {
            Some(error) => {
                debug!(code = %error.code, message = %error.message, "eAPI copy rejected");
                Ok(false)
            }
            None => Ok(true),
        }
    }

    async fn running_config(&mut self) -> DeviceResult<String> {
        self.show("show running-config").await
    }

    async fn close(&mut self) -> DeviceResult<()> {
        self.client = None;
        Ok(())
    }
}
