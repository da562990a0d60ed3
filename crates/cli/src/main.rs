mod config;
mod logging;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use crm_bridge_plugins::crm::{API_PLUGIN_NAME, QUERY_PLUGIN_NAME};
use crm_bridge_plugins::registry::PluginRegistry;
use crm_bridge_tools::catalog::ResourceCatalog;
use crm_bridge_tools::config::{BASE_URL_ENV, PASSWORD_ENV, USERNAME_ENV};
use crm_bridge_tools::resolver::EndpointResolver;
use crm_bridge_tools::transport::ReqwestTransport;
use owo_colors::OwoColorize as _;
use serde_json::{Value, json};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{CliConfig, default_config_path, load_config, save_config};
use crate::logging::{LogFormat, init_logging};

#[derive(Debug, Parser)]
#[command(
    name = "plugin-bridge",
    version,
    about = "Query a CRM through the plugin bridge"
)]
struct Cli {
    /// CRM base URL (e.g. https://crm.example.com).
    #[arg(long, global = true, env = BASE_URL_ENV)]
    base_url: Option<String>,

    /// Basic-auth username.
    #[arg(long, global = true, env = USERNAME_ENV)]
    username: Option<String>,

    /// Basic-auth password.
    #[arg(long, global = true, env = PASSWORD_ENV, hide_env_values = true)]
    password: Option<String>,

    /// Resource catalog file (YAML or JSON) replacing the built-in catalog.
    #[arg(long, global = true, env = "CRM_CATALOG")]
    catalog: Option<PathBuf>,

    /// Per-request timeout in seconds; 0 disables it.
    #[arg(long, global = true, env = "CRM_TIMEOUT_SECS", default_value_t = 30)]
    timeout_secs: u64,

    /// Reject CRM responses larger than this many bytes.
    #[arg(long, global = true, env = "CRM_MAX_RESPONSE_BYTES")]
    max_response_bytes: Option<usize>,

    /// Saved defaults file. Defaults to `$XDG_CONFIG_HOME/crm-bridge/config.json`.
    #[arg(long, global = true, env = "CRM_BRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter used when `RUST_LOG` is unset.
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Compact)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Resolve a free-text query and print the normalized records.
    Query {
        /// Free-text query; multiple words are joined with spaces.
        query: Vec<String>,
        /// Explicit resource key (overrides inference).
        #[arg(long)]
        endpoint: Option<String>,
        #[arg(long, allow_negative_numbers = true)]
        limit: Option<i64>,
        #[arg(long, allow_negative_numbers = true)]
        offset: Option<i64>,
    },
    /// Forward an explicit call to the CRM API and print `{code, data}`.
    Call {
        /// API path below `/api`, e.g. `contacts/42`.
        endpoint: String,
        #[arg(long)]
        method: Option<String>,
        /// JSON request body.
        #[arg(long)]
        data: Option<String>,
    },
    /// Dispatch raw JSON options to a named plugin.
    Dispatch {
        plugin: String,
        /// JSON options object.
        #[arg(default_value = "{}")]
        options: String,
    },
    /// Show how a query would be resolved, with every resource's score. No CRM call is made.
    Resolve {
        query: Vec<String>,
        #[arg(long)]
        endpoint: Option<String>,
    },
    /// List registered plugins.
    Plugins,
    /// Print OpenAPI descriptors (all plugins, or one).
    Openapi { plugin: Option<String> },
    /// Save connection defaults to the config file.
    Configure {
        /// Print the saved config instead of writing it.
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_format);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {e:#}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = match &cli.config {
        Some(p) => p.clone(),
        None => default_config_path()?,
    };
    let saved = load_config(&config_path)?;
    let settings = saved.clone().merged(CliConfig {
        base_url: cli.base_url.clone(),
        username: cli.username.clone(),
        password: cli.password.clone(),
        catalog: cli.catalog.clone(),
    });

    let catalog = Arc::new(match &settings.catalog {
        Some(path) => ResourceCatalog::from_path(path)
            .with_context(|| format!("load catalog {}", path.display()))?,
        None => ResourceCatalog::builtin().clone(),
    });
    tracing::debug!(
        resources = catalog.all().len(),
        config = %config_path.display(),
        "loaded bridge settings"
    );

    match cli.command {
        Command::Resolve { query, endpoint } => {
            print_json(&explain(&catalog, &query.join(" "), endpoint.as_deref()))
        }
        Command::Configure { show } => {
            if show {
                let mut redacted = saved;
                if redacted.password.is_some() {
                    redacted.password = Some("********".to_string());
                }
                print_json(&serde_json::to_value(&redacted)?)
            } else {
                save_config(&config_path, &settings)?;
                eprintln!("{} {}", "saved".green().bold(), config_path.display());
                Ok(())
            }
        }
        command => {
            let timeout = (cli.timeout_secs > 0).then(|| Duration::from_secs(cli.timeout_secs));
            let transport = ReqwestTransport::default()
                .with_timeout(timeout)
                .with_max_response_bytes(cli.max_response_bytes);
            let registry = crm_bridge_plugins::default_registry(
                catalog,
                settings.connection(),
                Arc::new(transport),
            )
            .context("build plugin registry")?;
            run_plugin_command(&registry, command).await
        }
    }
}

async fn run_plugin_command(registry: &PluginRegistry, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Query {
            query,
            endpoint,
            limit,
            offset,
        } => {
            let mut options = serde_json::Map::new();
            if !query.is_empty() {
                options.insert("query".to_string(), json!(query.join(" ")));
            }
            if let Some(e) = endpoint {
                options.insert("endpoint".to_string(), json!(e));
            }
            if let Some(l) = limit {
                options.insert("limit".to_string(), json!(l));
            }
            if let Some(o) = offset {
                options.insert("offset".to_string(), json!(o));
            }
            let out = registry
                .dispatch(QUERY_PLUGIN_NAME, Value::Object(options))
                .await?;
            print_json(&out)
        }
        Command::Call {
            endpoint,
            method,
            data,
        } => {
            let mut options = json!({"endpoint": endpoint});
            if let Some(m) = method {
                options["method"] = json!(m);
            }
            if let Some(d) = data {
                options["data"] = serde_json::from_str(&d).context("parse --data as JSON")?;
            }
            let out = registry.dispatch(API_PLUGIN_NAME, options).await?;
            print_json(&out)
        }
        Command::Dispatch { plugin, options } => {
            let options: Value =
                serde_json::from_str(&options).context("parse plugin options as JSON")?;
            let out = registry.dispatch(&plugin, options).await?;
            print_json(&out)
        }
        Command::Plugins => {
            for name in registry.names() {
                println!("{name}");
            }
            Ok(())
        }
        Command::Openapi { plugin } => match plugin {
            Some(name) => {
                let doc = registry
                    .openapi(&name)
                    .with_context(|| format!("unknown plugin '{name}'"))?;
                print_json(&serde_json::to_value(doc)?)
            }
            None => print_json(&serde_json::to_value(registry.openapi_documents())?),
        },
        Command::Resolve { .. } | Command::Configure { .. } => {
            anyhow::bail!("command does not use the plugin registry")
        }
    }
}

fn explain(catalog: &ResourceCatalog, query: &str, endpoint: Option<&str>) -> Value {
    let resolver = EndpointResolver::new(catalog);
    let query = (!query.is_empty()).then_some(query);
    let resolution = resolver.resolve_detailed(query, endpoint);
    json!({
        "resource": resolution.descriptor.key(),
        "remotePath": resolution.descriptor.remote_path(),
        "responseKey": resolution.descriptor.response_key(),
        "reason": resolution.reason,
        "score": resolution.score,
        "scores": resolver.explain(query.unwrap_or_default()),
    })
}

fn print_json(v: &Value) -> anyhow::Result<()> {
    let s = serde_json::to_string_pretty(v).context("serialize output")?;
    println!("{s}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory as _;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn query_words_and_pagination_parse() {
        let cli = Cli::try_parse_from([
            "plugin-bridge",
            "--base-url",
            "https://crm.example.com",
            "query",
            "show",
            "me",
            "my",
            "campaigns",
            "--limit",
            "150",
        ])
        .expect("parse");
        assert_eq!(cli.base_url.as_deref(), Some("https://crm.example.com"));
        match cli.command {
            Command::Query { query, limit, .. } => {
                assert_eq!(query.join(" "), "show me my campaigns");
                // Range checks happen in the plugin, not in argument parsing.
                assert_eq!(limit, Some(150));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn global_flags_work_after_the_subcommand() {
        let cli = Cli::try_parse_from([
            "plugin-bridge",
            "call",
            "contacts/new",
            "--method",
            "POST",
            "--data",
            "{}",
            "--timeout-secs",
            "0",
            "--log-format",
            "json",
        ])
        .expect("parse");
        assert_eq!(cli.timeout_secs, 0);
        assert_eq!(cli.log_format, LogFormat::Json);
        assert!(matches!(cli.command, Command::Call { ref endpoint, .. } if endpoint == "contacts/new"));
    }

    #[test]
    fn explain_reports_choice_and_scores() {
        let out = explain(ResourceCatalog::builtin(), "show me my campaigns", None);
        assert_eq!(out["resource"], "campaigns");
        assert_eq!(out["reason"], "matched");
        assert_eq!(out["scores"].as_array().map(Vec::len), Some(8));

        let out = explain(ResourceCatalog::builtin(), "", Some("segments"));
        assert_eq!(out["resource"], "segments");
        assert_eq!(out["responseKey"], "lists");
        assert_eq!(out["reason"], "explicit");
    }
}
