use anyhow::Context as _;
use crm_bridge_test_support::{MockCrm, pick_unused_port};
use serde_json::{Value, json};
use std::path::Path;
use std::process::Output;

const CRM_ENV: [&str; 7] = [
    "CRM_API_URL",
    "CRM_API_USER",
    "CRM_API_PASSWORD",
    "CRM_CATALOG",
    "CRM_TIMEOUT_SECS",
    "CRM_MAX_RESPONSE_BYTES",
    "CRM_BRIDGE_CONFIG",
];

async fn run_cli(config_dir: &Path, args: &[&str]) -> anyhow::Result<Output> {
    let bin = env!("CARGO_BIN_EXE_plugin-bridge");
    let mut cmd = tokio::process::Command::new(bin);
    for var in CRM_ENV {
        cmd.env_remove(var);
    }
    cmd.env_remove("RUST_LOG")
        .arg("--config")
        .arg(config_dir.join("config.json"))
        .args(args);
    cmd.output().await.context("run plugin-bridge")
}

fn stdout_json(out: &Output) -> anyhow::Result<Value> {
    serde_json::from_slice(&out.stdout).with_context(|| {
        format!(
            "stdout is not JSON; stderr: {}",
            String::from_utf8_lossy(&out.stderr)
        )
    })
}

#[tokio::test]
async fn query_prints_normalized_records() -> anyhow::Result<()> {
    let crm = MockCrm::start().await?.with_response(
        "campaigns",
        200,
        json!({"total": 1, "campaigns": [{"id": 3, "name": "Spring launch"}]}),
    );
    let dir = tempfile::tempdir()?;

    let out = run_cli(
        dir.path(),
        &[
            "--base-url",
            crm.base_url(),
            "--username",
            "api-user",
            "--password",
            "s3cret",
            "query",
            "show",
            "me",
            "my",
            "campaigns",
            "--limit",
            "5",
        ],
    )
    .await?;
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(
        stdout_json(&out)?,
        json!({"campaigns": [{"id": 3, "name": "Spring launch"}]})
    );

    let req = &crm.requests()[0];
    assert_eq!(req.path, "campaigns");
    assert_eq!(req.query_param("limit").as_deref(), Some("5"));

    crm.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn configure_saves_defaults_for_later_runs() -> anyhow::Result<()> {
    let crm = MockCrm::start().await?.with_response(
        "forms",
        200,
        json!({"forms": [{"id": 1, "name": "Signup"}]}),
    );
    let dir = tempfile::tempdir()?;

    let out = run_cli(
        dir.path(),
        &[
            "--base-url",
            crm.base_url(),
            "--username",
            "api-user",
            "--password",
            "s3cret",
            "configure",
        ],
    )
    .await?;
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let shown = run_cli(dir.path(), &["configure", "--show"]).await?;
    let shown = stdout_json(&shown)?;
    assert_eq!(shown["username"], "api-user");
    assert_eq!(shown["password"], "********");

    let out = run_cli(dir.path(), &["query", "signup", "forms"]).await?;
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(stdout_json(&out)?, json!({"forms": [{"id": 1, "name": "Signup"}]}));

    crm.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn validation_and_configuration_errors_exit_nonzero() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;

    let out = run_cli(dir.path(), &["query", "contacts"]).await?;
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("Configuration error"), "{stderr}");

    let out = run_cli(
        dir.path(),
        &[
            "--base-url",
            "http://127.0.0.1:9",
            "--username",
            "u",
            "--password",
            "p",
            "query",
            "contacts",
            "--limit",
            "150",
        ],
    )
    .await?;
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("limit must be between 1 and 100"));
    Ok(())
}

#[tokio::test]
async fn unreachable_crm_is_a_transport_error_without_secrets() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let port = pick_unused_port()?;
    let base = format!("http://127.0.0.1:{port}");

    let out = run_cli(
        dir.path(),
        &[
            "--base-url",
            &base,
            "--username",
            "u",
            "--password",
            "top-secret",
            "--timeout-secs",
            "5",
            "call",
            "contacts",
        ],
    )
    .await?;
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("Transport error"), "{stderr}");
    assert!(!stderr.contains("top-secret"));
    Ok(())
}

#[tokio::test]
async fn offline_commands_need_no_crm() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;

    let out = run_cli(dir.path(), &["plugins"]).await?;
    assert!(out.status.success());
    assert_eq!(String::from_utf8_lossy(&out.stdout), "OfficialCrm\nOfficialCrmApi\n");

    let out = run_cli(dir.path(), &["resolve", "show", "me", "my", "campaigns"]).await?;
    let v = stdout_json(&out)?;
    assert_eq!(v["resource"], "campaigns");

    let out = run_cli(dir.path(), &["openapi", "OfficialCrmApi"]).await?;
    let v = stdout_json(&out)?;
    assert_eq!(v["openapi"], "3.0.3");

    let out = run_cli(dir.path(), &["dispatch", "NoSuchPlugin"]).await?;
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("Unable to find plugin 'NoSuchPlugin'"));
    Ok(())
}

#[tokio::test]
async fn custom_catalog_adds_a_resource() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let catalog = dir.path().join("catalog.yaml");
    std::fs::write(
        &catalog,
        r"resources:
  - key: contacts
    remotePath: contacts
    responseKey: contacts
    terms: [contact, contacts]
    fields:
      - {name: id, kind: integer, id: true}
  - key: deals
    remotePath: deals
    responseKey: deals
    terms: [deal, deals, opportunity]
    fields:
      - {name: id, kind: integer, id: true}
      - {name: amount, kind: number}
",
    )?;
    let catalog = catalog.to_string_lossy().into_owned();

    let out = run_cli(
        dir.path(),
        &["--catalog", &catalog, "resolve", "big", "opportunity"],
    )
    .await?;
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(stdout_json(&out)?["resource"], "deals");
    Ok(())
}
