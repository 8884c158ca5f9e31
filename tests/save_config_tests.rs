//! End-to-end save_config module tests through the registry, with the
//! device side played by a mock NX-API endpoint.

use netsave::modules::{ModuleError, ModuleParams, ModuleRegistry};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn params_for(server: &MockServer) -> ModuleParams {
    let mut params = ModuleParams::new();
    params.insert("platform".to_string(), json!("cisco_nxos_nxapi"));
    params.insert("host".to_string(), json!("127.0.0.1"));
    params.insert("username".to_string(), json!("admin"));
    params.insert("password".to_string(), json!("secret"));
    params.insert("transport".to_string(), json!("http"));
    params.insert("port".to_string(), json!(server.address().port()));
    params
}

async fn mount_show(server: &MockServer, command: &str, body: &str) {
    Mock::given(method("POST"))
        .and(path("/ins"))
        .and(body_partial_json(json!({
            "ins_api": {"type": "cli_show_ascii", "input": command}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ins_api": {"outputs": {"output": {
                "code": "200", "msg": "Success", "body": body
            }}}
        })))
        .mount(server)
        .await;
}

async fn mount_copy(server: &MockServer, code: &str, msg: &str) {
    Mock::given(method("POST"))
        .and(path("/ins"))
        .and(body_partial_json(json!({"ins_api": {"type": "cli_conf"}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ins_api": {"outputs": {"output": {
                "code": code, "msg": msg, "body": {}
            }}}
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn startup_save_reports_changed() {
    let server = MockServer::start().await;
    mount_show(&server, "show hostname", "nxos-spine1\n").await;
    mount_copy(&server, "200", "Success").await;

    let registry = ModuleRegistry::with_builtins();
    let output = registry
        .execute("save_config", &params_for(&server))
        .await
        .unwrap();

    assert!(output.changed);
    assert_eq!(output.data["remote_save_successful"], json!(true));
    assert_eq!(output.data["remote_file"], json!("(Startup Config)"));
    assert_eq!(output.data["local_file"], serde_json::Value::Null);
}

#[tokio::test]
async fn rejected_save_reports_unchanged() {
    let server = MockServer::start().await;
    mount_show(&server, "show hostname", "nxos-spine1\n").await;
    mount_copy(&server, "400", "File already exists").await;

    let registry = ModuleRegistry::with_builtins();
    let mut params = params_for(&server);
    params.insert("remote_file".to_string(), json!("existing.cfg"));

    let output = registry.execute("save_config", &params).await.unwrap();

    assert!(!output.changed);
    assert_eq!(output.data["remote_save_successful"], json!(false));
    assert_eq!(output.data["remote_file"], json!("existing.cfg"));
}

#[tokio::test]
async fn local_backup_is_a_change_even_when_remote_save_fails() {
    let server = MockServer::start().await;
    mount_show(&server, "show hostname", "nxos-spine1\n").await;
    mount_show(&server, "show running-config", "hostname nxos-spine1\n!\nend\n").await;
    mount_copy(&server, "400", "File already exists").await;

    let dir = tempfile::tempdir().unwrap();
    let local = dir.path().join("backup.cfg");

    let registry = ModuleRegistry::with_builtins();
    let mut params = params_for(&server);
    params.insert("local_file".to_string(), json!(local.to_string_lossy()));

    let output = registry.execute("save_config", &params).await.unwrap();

    assert!(output.changed);
    assert_eq!(output.data["remote_save_successful"], json!(false));
    assert_eq!(output.data["local_file"], json!(local.to_string_lossy()));
    assert!(output.data.contains_key("local_file_checksum"));
    assert_eq!(
        std::fs::read_to_string(&local).unwrap(),
        "hostname nxos-spine1\n!\nend\n"
    );
}

#[tokio::test]
async fn missing_required_parameter_is_rejected_before_connecting() {
    let registry = ModuleRegistry::with_builtins();
    let mut params = ModuleParams::new();
    params.insert("platform".to_string(), json!("cisco_nxos_nxapi"));
    params.insert("host".to_string(), json!("10.1.1.1"));
    params.insert("username".to_string(), json!("admin"));

    let err = registry.execute("save_config", &params).await;
    assert!(matches!(err, Err(ModuleError::MissingParameter(p)) if p == "password"));
}

#[tokio::test]
async fn unknown_platform_is_rejected_before_connecting() {
    let registry = ModuleRegistry::with_builtins();
    let mut params = ModuleParams::new();
    params.insert("platform".to_string(), json!("juniper_junos"));
    params.insert("host".to_string(), json!("10.1.1.1"));
    params.insert("username".to_string(), json!("admin"));
    params.insert("password".to_string(), json!("secret"));

    let err = registry.execute("save_config", &params).await;
    assert!(matches!(err, Err(ModuleError::InvalidParameter(_))));
}
