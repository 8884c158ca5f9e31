//! Cisco NX-API driver.
//!
//! Talks to Nexus switches through the `ins_api` JSON endpoint over HTTP or
//! HTTPS. Configuration commands go through `cli_conf`, show commands through
//! `cli_show_ascii`. NX-API defaults to plain HTTP on port 80; HTTPS uses 443.

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::{ConnectOptions, Device, DeviceError, DeviceResult, Transport};
use async_trait::async_trait;

/// NX-API request envelope.
#[derive(Debug, Serialize)]
struct NxapiRequest {
    ins_api: NxapiInsApi,
}

#[derive(Debug, Serialize)]
struct NxapiInsApi {
    version: String,
    #[serde(rename = "type")]
    req_type: String,
    chunk: String,
    sid: String,
    input: String,
    output_format: String,
}

/// NX-API response envelope.
#[derive(Debug, Deserialize)]
struct NxapiResponse {
    ins_api: NxapiInsApiResponse,
}

#[derive(Debug, Deserialize)]
struct NxapiInsApiResponse {
    outputs: NxapiOutputs,
}

#[derive(Debug, Deserialize)]
struct NxapiOutputs {
    output: NxapiOutputWrapper,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NxapiOutputWrapper {
    Single(NxapiOutput),
    Multiple(Vec<NxapiOutput>),
}

/// Per-command result. NX-API reports CLI errors with a non-200 `code`
/// while the HTTP layer still answers 200.
#[derive(Debug, Deserialize)]
struct NxapiOutput {
    code: String,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    body: serde_json::Value,
}

impl NxapiOutput {
    fn succeeded(&self) -> bool {
        self.code == "200"
    }
}

/// Cisco Nexus device reached through NX-API.
pub struct NxapiDevice {
    host: String,
    username: String,
    password: String,
    transport: Transport,
    port: u16,
    validate_certs: bool,
    timeout: std::time::Duration,
    client: Option<Client>,
}

impl NxapiDevice {
    pub fn new(host: &str, username: &str, password: &str, options: ConnectOptions) -> Self {
        let transport = options.transport.unwrap_or(Transport::Http);
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
            "{}://{}:{}/ins",
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

    /// Send commands to the `ins_api` endpoint and return the per-command
    /// outputs. HTTP-level failures are errors; per-command codes are left
    /// for the caller to interpret.
    async fn request(&self, req_type: &str, input: &str) -> DeviceResult<Vec<NxapiOutput>> {
        let client = self.client.as_ref().ok_or(DeviceError::NotOpen)?;

        let request = NxapiRequest {
            ins_api: NxapiInsApi {
                version: "1.0".to_string(),
                req_type: req_type.to_string(),
                chunk: "0".to_string(),
                sid: "1".to_string(),
                input: input.to_string(),
                output_format: "json".to_string(),
            },
        };

        trace!(input = %input, req_type = %req_type, "Sending NX-API request");

        let response = client
            .post(self.url())
            .basic_auth(&self.username, Some(&self.password))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| DeviceError::ConnectionFailed(format!("NX-API request failed: {}", e)))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(DeviceError::AuthenticationFailed(format!(
                "NX-API rejected credentials for {}",
                self.username
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeviceError::CommandFailed(format!(
                "NX-API returned status {}: {}",
                status, body
            )));
        }

        let api_response: NxapiResponse = response.json().await.map_err(|e| {
            DeviceError::BadResponse(format!("Failed to parse NX-API response: {}", e))
        })?;

        Ok(match api_response.ins_api.outputs.output {
            NxapiOutputWrapper::Single(out) => vec![out],
            NxapiOutputWrapper::Multiple(outs) => outs,
        })
    }

    /// Run a show command and return its text body.
    async fn show(&self, command: &str) -> DeviceResult<String> {
        let outputs = self.request("cli_show_ascii", command).await?;
        let output = outputs
            .into_iter()
            .next()
            .ok_or_else(|| DeviceError::BadResponse("Empty NX-API response".to_string()))?;

        if !output.succeeded() {
            return Err(DeviceError::CommandFailed(format!(
                "'{}' failed with code {}: {}",
                command, output.code, output.msg
            )));
        }

        if let Some(text) = output.body.as_str() {
            Ok(text.to_string())
        } else {
            Ok(output.body.to_string())
        }
    }
}

#[async_trait]
impl Device for NxapiDevice {
    async fn open(&mut self) -> DeviceResult<()> {
        debug!(host = %self.host, port = %self.port, transport = %self.transport, "Opening NX-API session");
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

        debug!(command = %command, "Saving configuration via NX-API");
        let outputs = self.request("cli_conf", &command).await?;

        // The device answers 200 at the HTTP layer even when the copy is
        // rejected, e.g. the target file already exists.
        let ok = outputs.iter().all(NxapiOutput::succeeded);
        if !ok {
            for output in outputs.iter().filter(|o| !o.succeeded()) {
                debug!(code = %output.code, msg = %output.msg, "NX-API copy rejected");
            }
        }
        Ok(ok)
    }

    async fn running_config(&mut self) -> DeviceResult<String> {
        self.show("show running-config").await
    }

    async fn close(&mut self) -> DeviceResult<()> {
        self.client = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(options: ConnectOptions) -> NxapiDevice {
        NxapiDevice::new("10.1.1.1", "admin", "secret", options)
    }

    #[test]
    fn test_default_transport_is_http() {
        let dev = device(ConnectOptions::default());
        assert_eq!(dev.transport, Transport::Http);
        assert_eq!(dev.port, 80);
        assert_eq!(dev.url(), "http://10.1.1.1:80/ins");
    }

    #[test]
    fn test_https_default_port() {
        let dev = device(ConnectOptions {
            transport: Some(Transport::Https),
            ..Default::default()
        });
        assert_eq!(dev.port, 443);
        assert_eq!(dev.url(), "https://10.1.1.1:443/ins");
    }

    #[test]
    fn test_port_override_wins() {
        let dev = device(ConnectOptions {
            transport: Some(Transport::Https),
            port: Some(8443),
            ..Default::default()
        });
        assert_eq!(dev.url(), "https://10.1.1.1:8443/ins");
    }

    #[test]
    fn test_request_before_open_fails() {
        let dev = device(ConnectOptions::default());
        let err = tokio_test::block_on(dev.request("cli_show_ascii", "show hostname"));
        assert!(matches!(err, Err(DeviceError::NotOpen)));
    }

    #[test]
    fn test_output_code_check() {
        let ok: NxapiOutput = serde_json::from_value(serde_json::json!({
            "code": "200", "msg": "Success", "body": {}
        }))
        .unwrap();
        assert!(ok.succeeded());

        let rejected: NxapiOutput = serde_json::from_value(serde_json::json!({
            "code": "400", "msg": "File already exists"
        }))
        .unwrap();
        assert!(!rejected.succeeded());
    }
}
