//! Cisco IOS driver.
//!
//! Drives an interactive CLI session over SSH using the ssh2 crate. All ssh2
//! calls are synchronous and run inside `spawn_blocking` tasks. The session
//! starts a PTY shell, optionally enters enable mode with the configured
//! secret, and disables paging before issuing commands. Output is framed by
//! the device prompt; `copy` confirmation prompts are answered with a bare
//! newline to accept the default.

use parking_lot::Mutex;
use ssh2::{Channel, Session};
use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;
use tokio::task;
use tracing::{debug, trace};

use super::{ConnectOptions, Device, DeviceError, DeviceResult};
use async_trait::async_trait;

/// Default SSH port.
const SSH_DEFAULT_PORT: u16 = 22;

/// An open interactive shell on the device.
struct Shell {
    session: Session,
    channel: Channel,
}

/// Cisco IOS device reached over SSH.
pub struct IosDevice {
    host: String,
    username: String,
    password: String,
    secret: Option<String>,
    port: u16,
    timeout: Duration,
    shell: Arc<Mutex<Option<Shell>>>,
}

impl IosDevice {
    pub fn new(host: &str, username: &str, password: &str, options: ConnectOptions) -> Self {
        let port = options.port.unwrap_or(SSH_DEFAULT_PORT);
        let timeout = options.effective_timeout();

        Self {
            host: host.to_string(),
            username: username.to_string(),
            password: password.to_string(),
            secret: options.secret,
            port,
            timeout,
            shell: Arc::new(Mutex::new(None)),
        }
    }

    /// Run a command on the shell from a blocking task.
    async fn run(&self, command: String) -> DeviceResult<String> {
        let shell = Arc::clone(&self.shell);
        task::spawn_blocking(move || {
            let mut guard = shell.lock();
            let sh = guard.as_mut().ok_or(DeviceError::NotOpen)?;
            exec_command(sh, &command)
        })
        .await
        .map_err(|e| DeviceError::CommandFailed(format!("Task join error: {}", e)))?
    }
}

#[async_trait]
impl Device for IosDevice {
    async fn open(&mut self) -> DeviceResult<()> {
        debug!(host = %self.host, port = %self.port, user = %self.username, "Opening SSH session");

        let host = self.host.clone();
        let port = self.port;
        let username = self.username.clone();
        let password = self.password.clone();
        let secret = self.secret.clone();
        let timeout = self.timeout;

        let opened = task::spawn_blocking(move || {
            open_shell(&host, port, &username, &password, secret.as_deref(), timeout)
        })
        .await
        .map_err(|e| DeviceError::ConnectionFailed(format!("Task join error: {}", e)))??;

        *self.shell.lock() = Some(opened);
        Ok(())
    }

    async fn save(&mut self, filename: Option<&str>) -> DeviceResult<bool> {
        let command = match filename {
            Some(name) => format!("copy running-config {}", name),
            None => "copy running-config startup-config".to_string(),
        };

        debug!(command = %command, "Saving configuration via SSH");
        let output = self.run(command).await?;

        // IOS flags rejected copies with a %-prefixed message while the
        // session itself stays healthy.
        Ok(!output_indicates_failure(&output))
    }

    async fn running_config(&mut self) -> DeviceResult<String> {
        self.run("show running-config".to_string()).await
    }

    async fn close(&mut self) -> DeviceResult<()> {
        let shell = Arc::clone(&self.shell);
        task::spawn_blocking(move || {
            if let Some(mut sh) = shell.lock().take() {
                sh.channel.send_eof().ok();
                sh.channel.close().ok();
                sh.channel.wait_close().ok();
                sh.session.disconnect(None, "closing session", None).ok();
            }
        })
        .await
        .map_err(|e| DeviceError::CommandFailed(format!("Task join error: {}", e)))?;
        Ok(())
    }
}

// ============================================================================
// Blocking shell plumbing
// ============================================================================

/// Connect, authenticate, and prepare an interactive shell.
fn open_shell(
    host: &str,
    port: u16,
    username: &str,
    password: &str,
    secret: Option<&str>,
    timeout: Duration,
) -> DeviceResult<Shell> {
    let addr = (host, port)
        .to_socket_addrs()
        .map_err(|e| DeviceError::ConnectionFailed(format!("Failed to resolve {}: {}", host, e)))?
        .next()
        .ok_or_else(|| {
            DeviceError::ConnectionFailed(format!("No address found for {}:{}", host, port))
        })?;

    let tcp = TcpStream::connect_timeout(&addr, timeout).map_err(|e| {
        DeviceError::ConnectionFailed(format!("Failed to connect to {}:{}: {}", host, port, e))
    })?;
    tcp.set_nodelay(true).ok();

    let mut session = Session::new().map_err(|e| {
        DeviceError::ConnectionFailed(format!("Failed to create SSH session: {}", e))
    })?;
    session.set_tcp_stream(tcp);
    session.set_timeout(timeout.as_millis() as u32);

    session
        .handshake()
        .map_err(|e| DeviceError::ConnectionFailed(format!("SSH handshake failed: {}", e)))?;

    session.userauth_password(username, password).map_err(|e| {
        DeviceError::AuthenticationFailed(format!("Password authentication failed: {}", e))
    })?;
    if !session.authenticated() {
        return Err(DeviceError::AuthenticationFailed(
            "Password authentication failed".to_string(),
        ));
    }

    let mut channel = session
        .channel_session()
        .map_err(|e| DeviceError::ConnectionFailed(format!("Failed to open channel: {}", e)))?;
    channel
        .request_pty("vt100", None, None)
        .map_err(|e| DeviceError::ConnectionFailed(format!("Failed to request PTY: {}", e)))?;
    channel
        .shell()
        .map_err(|e| DeviceError::ConnectionFailed(format!("Failed to start shell: {}", e)))?;

    let mut shell = Shell { session, channel };

    // Swallow the login banner and motd up to the first prompt.
    read_until_prompt(&mut shell.channel)?;

    if let Some(secret) = secret {
        enter_enable_mode(&mut shell, secret)?;
    }

    // Disable paging so show output is not interleaved with --More--.
    exec_command(&mut shell, "terminal length 0")?;

    debug!("SSH shell session established");
    Ok(shell)
}

/// Enter privileged exec mode using the enable secret.
fn enter_enable_mode(shell: &mut Shell, secret: &str) -> DeviceResult<()> {
    send_line(&mut shell.channel, "enable")?;

    let mut output = String::new();
    loop {
        output.push_str(&read_chunk(&mut shell.channel)?);
        let tail = last_nonempty_line(&output);

        if tail.ends_with('#') {
            return Ok(());
        }
        if tail.ends_with('>') {
            return Err(DeviceError::AuthenticationFailed(
                "Enable secret rejected".to_string(),
            ));
        }
        if tail.ends_with(':') {
            send_line(&mut shell.channel, secret)?;
            output.clear();
        }
    }
}

/// Send a command and collect output up to the next prompt, answering
/// confirmation prompts with a newline.
fn exec_command(shell: &mut Shell, command: &str) -> DeviceResult<String> {
    trace!(command = %command, "Executing shell command");
    send_line(&mut shell.channel, command)?;

    let mut output = String::new();
    loop {
        output.push_str(&read_chunk(&mut shell.channel)?);
        let tail = last_nonempty_line(&output);

        if tail.ends_with('#') || tail.ends_with('>') {
            break;
        }
        if tail.ends_with('?') || tail.ends_with("[confirm]") {
            // Accept the default, e.g. "Destination filename [startup-config]?"
            shell
                .channel
                .write_all(b"\n")
                .and_then(|_| shell.channel.flush())
                .map_err(|e| {
                    DeviceError::CommandFailed(format!("Failed to answer prompt: {}", e))
                })?;
        }
    }

    Ok(clean_output(&output, command))
}

fn send_line(channel: &mut Channel, line: &str) -> DeviceResult<()> {
    channel
        .write_all(format!("{}\n", line).as_bytes())
        .and_then(|_| channel.flush())
        .map_err(|e| DeviceError::CommandFailed(format!("Failed to write to channel: {}", e)))
}

/// Read one chunk from the channel. A timeout or closed channel is an error;
/// prompt detection is the caller's job.
fn read_chunk(channel: &mut Channel) -> DeviceResult<String> {
    let mut buf = [0u8; 8192];
    match channel.read(&mut buf) {
        Ok(0) => Err(DeviceError::ConnectionFailed(
            "SSH channel closed by device".to_string(),
        )),
        Ok(n) => Ok(String::from_utf8_lossy(&buf[..n]).into_owned()),
        Err(e) => Err(DeviceError::CommandFailed(format!(
            "Timed out waiting for device prompt: {}",
            e
        ))),
    }
}

/// Read and discard output until a prompt shows up.
fn read_until_prompt(channel: &mut Channel) -> DeviceResult<String> {
    let mut output = String::new();
    loop {
        output.push_str(&read_chunk(channel)?);
        let tail = last_nonempty_line(&output);
        if tail.ends_with('#') || tail.ends_with('>') {
            return Ok(output);
        }
    }
}

/// Last non-empty line of the buffer, trimmed.
fn last_nonempty_line(output: &str) -> &str {
    output
        .lines()
        .rev()
        .map(str::trim_end)
        .find(|l| !l.trim().is_empty())
        .unwrap_or("")
}

/// Strip the command echo and the trailing prompt from command output.
fn clean_output(output: &str, command: &str) -> String {
    let mut lines: Vec<&str> = output.lines().collect();

    if !lines.is_empty() && lines[0].trim_end().ends_with(command) {
        lines.remove(0);
    }

    while let Some(last) = lines.last() {
        let trimmed = last.trim();
        if trimmed.is_empty() || trimmed.ends_with('#') || trimmed.ends_with('>') {
            lines.pop();
        } else {
            break;
        }
    }

    lines.join("\n")
}

/// Whether IOS rejected the command (%-prefixed diagnostics).
fn output_indicates_failure(output: &str) -> bool {
    output.lines().any(|l| l.trim_start().starts_with('%'))
}
