use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use polsync_audit::VerifyResult;
use polsync_model::RuleBaseSelector;

mod commands;

#[derive(Parser)]
#[command(name = "polsync")]
#[command(about = "Firewall security rule-base reconciliation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rule-base identifier utilities
    Id {
        #[command(subcommand)]
        cmd: IdCmd,
    },

    /// Print the plan that `apply` would execute, without writing
    Plan {
        #[command(flatten)]
        target: TargetArgs,

        /// Desired-state YAML (`rules: [...]`)
        #[arg(long)]
        rules: String,

        /// Print the plan as JSON instead of key=value lines
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Exit non-zero when the plan is not empty
        #[arg(long, default_value_t = false)]
        fail_on_drift: bool,
    },

    /// Converge the rule base to the desired state
    Apply {
        #[command(flatten)]
        target: TargetArgs,

        /// Desired-state YAML (`rules: [...]`)
        #[arg(long)]
        rules: String,

        /// Audit log path (overrides `audit.path` from config)
        #[arg(long)]
        audit: Option<String>,
    },

    /// Print the rules currently on the device
    Read {
        #[command(flatten)]
        target: TargetArgs,

        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Delete every rule under the identifier
    Destroy {
        #[command(flatten)]
        target: TargetArgs,

        /// Audit log path (overrides `audit.path` from config)
        #[arg(long)]
        audit: Option<String>,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> site -> device ...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Audit trail utilities
    Audit {
        #[command(subcommand)]
        cmd: AuditCmd,
    },
}

#[derive(Subcommand)]
enum IdCmd {
    /// Encode (container, rule base) into an identifier
    Encode {
        #[arg(long)]
        container: String,

        /// pre | post | default (or the device token, e.g. pre-rulebase)
        #[arg(long, default_value = "default")]
        rulebase: RuleBaseSelector,
    },

    /// Decode an identifier into its parts
    Decode { id: String },
}

#[derive(Subcommand)]
enum AuditCmd {
    /// Verify the hash chain of an audit log
    Verify { path: String },
}

/// Where a pass runs and under which configuration.
#[derive(Args)]
pub struct TargetArgs {
    /// Offline device snapshot (JSON); created on first write
    #[arg(long)]
    device: String,

    /// Rule-base identifier, e.g. vsys1:rulebase
    #[arg(long)]
    id: String,

    /// Layered config paths in merge order
    #[arg(long = "config")]
    config_paths: Vec<String>,
}

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Id { cmd } => match cmd {
            IdCmd::Encode {
                container,
                rulebase,
            } => {
                let id = polsync_model::encode(&container, rulebase)?;
                println!("id={id}");
            }
            IdCmd::Decode { id } => {
                let key = polsync_model::decode(&id)?;
                println!("container={}", key.container());
                println!("rulebase={}", key.selector().token());
            }
        },

        Commands::Plan {
            target,
            rules,
            json,
            fail_on_drift,
        } => commands::rulebase::plan(&target, &rules, json, fail_on_drift)?,

        Commands::Apply {
            target,
            rules,
            audit,
        } => commands::rulebase::apply(&target, &rules, audit)?,

        Commands::Read { target, json } => commands::rulebase::read(&target, json)?,

        Commands::Destroy { target, audit } => commands::rulebase::destroy(&target, audit)?,

        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = polsync_config::load_layered_yaml(&path_refs)?;
            let settings = loaded.settings()?;
            commands::warn_unused_keys(&loaded.config_json)?;

            println!("config_hash={}", loaded.config_hash);
            println!("list_order={}", settings.diff.list_order.as_str());
            println!(
                "require_match_criteria={}",
                settings.validation.require_match_criteria
            );
            if settings.device.hostname.is_some() {
                let ok = commands::device_credentials_resolve(&settings.device);
                println!("device_credentials={}", if ok { "ok" } else { "missing" });
            }
            println!("{}", loaded.canonical_json);
        }

        Commands::Audit { cmd } => match cmd {
            AuditCmd::Verify { path } => match polsync_audit::verify_hash_chain(&path)? {
                VerifyResult::Valid { lines, passes } => {
                    println!("audit_valid=true lines={lines} passes={passes}");
                }
                VerifyResult::Broken {
                    line,
                    topic,
                    pass_id,
                    reason,
                } => {
                    println!("audit_valid=false line={line} id={topic} pass_id={pass_id}");
                    bail!("AUDIT_CHAIN_BROKEN at line {line}: {reason}");
                }
            },
        },
    }

    Ok(())
}

/// Logs go to stderr; stdout carries only key=value results.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}
