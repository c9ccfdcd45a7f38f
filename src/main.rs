use clap::{Args, Parser, Subcommand};
use cliclack::{confirm, input, intro, multiselect, outro_cancel, password, select};
use ftm::auth::Credentials;
use ftm::config::{self, CliConfig};
use ftm::feature::{ActivityUpdate, AudienceType, FeatureForm, KNOWN_TEAMS, TASK_ID_PREFIX};
use ftm::{Dispatcher, Environment, Operation, ValidationError};
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
mod commands;

#[derive(Parser)]
#[command(
    name = "ftm",
    version,
    about = "Feature Toggle Manager - create, delete and toggle feature flags across environments"
)]
struct Cli {
    /// Increase log verbosity (-v warn, -vv info, -vvv debug, -vvvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Require valid TLS certificates (overrides http.insecure_skip_verify)
    #[arg(long, global = true)]
    verify_tls: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a feature flag (missing fields are asked for interactively)
    Create {
        #[command(flatten)]
        feature: FeatureArgs,

        #[command(flatten)]
        target: TargetArgs,
    },

    /// Delete one or more feature flags
    Delete {
        /// Feature IDs (e.g. Team.Service.FeatureName)
        #[arg(required = true, value_name = "ID")]
        ids: Vec<String>,

        #[command(flatten)]
        target: TargetArgs,
    },

    /// Enable or disable feature flags
    Activity {
        /// Updates in the form ID=true or ID=false, applied in order
        #[arg(required = true, value_name = "ID=BOOL")]
        updates: Vec<ActivityUpdate>,

        #[command(flatten)]
        target: TargetArgs,
    },

    /// Show the environment endpoints in use
    Envs,

    /// Add the identity provider entry to the hosts file (needs admin rights)
    Hosts {
        /// Only report whether the entry is present
        #[arg(long)]
        dry_run: bool,
    },

    /// Initialize CLI config file (~/.config/ftm/config.toml)
    Init {
        /// Overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Get or set local CLI configuration
    LocalConfig {
        #[command(subcommand)]
        action: LocalConfigAction,
    },
}

#[derive(Args)]
struct TargetArgs {
    /// Target environment (repeatable): dev, test, preprod, stage, prod
    #[arg(short, long = "env", value_name = "ENV")]
    envs: Vec<Environment>,

    /// Target all environments
    #[arg(long, conflicts_with = "envs")]
    all: bool,

    /// Username without the mail domain (default from config)
    #[arg(short, long, env = "FTM_USERNAME")]
    username: Option<String>,

    /// Password (prompted when omitted)
    #[arg(long, env = "FTM_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    yes: bool,
}

#[derive(Args)]
struct FeatureArgs {
    /// Feature ID (Team.Service.FeatureName)
    #[arg(long)]
    id: Option<String>,

    /// Feature description
    #[arg(long)]
    description: Option<String>,

    /// Initial state of the flag
    #[arg(long, value_name = "BOOL")]
    enabled: Option<bool>,

    /// Owning team
    #[arg(long)]
    team: Option<String>,

    /// Audience type: ALL or SERVICE
    #[arg(long)]
    audience_type: Option<AudienceType>,

    /// Affected services, comma separated
    #[arg(long)]
    audience_target: Option<String>,

    /// Tracker task that introduces the feature (e.g. OMNI-1234)
    #[arg(long)]
    task_id: Option<String>,

    /// Whether removal of the feature is already planned
    #[arg(long, value_name = "BOOL")]
    scheduled_for_removal: Option<bool>,

    /// Tracker task for the removal (required when scheduled for removal)
    #[arg(long)]
    removal_task_id: Option<String>,

    /// Planned removal date (required when scheduled for removal)
    #[arg(long)]
    planned_removal_date: Option<String>,
}

#[derive(Subcommand)]
enum LocalConfigAction {
    /// Show current local config
    Show,
    /// Get a config value
    Get {
        /// Config key (e.g., "auth.username", "http.insecure_skip_verify")
        key: String,
    },
    /// Set a config value
    Set {
        /// Config key (e.g., "auth.username", "http.insecure_skip_verify")
        key: String,
        /// Value to set
        value: String,
    },
    /// Show config file path
    Path,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install rustls crypto provider BEFORE tokio runtime starts
    // (required for rustls 0.23+ - must happen before any TLS operations)
    #[cfg(feature = "rustls")]
    {
        rustls_crate::crypto::ring::default_provider()
            .install_default()
            .map_err(|_| "Failed to install rustls crypto provider")?;
    }

    // Now start tokio runtime and run async main
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main())
}

async fn async_main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "error",
        1 => "warn",
        2 => "info",
        3 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    // Load config from file
    let cfg = CliConfig::load();
    let registry = Arc::new(cfg.registry());
    let mut http = cfg.http_settings();
    if cli.verify_tls {
        http.insecure_skip_verify = false;
    }

    match cli.command {
        Commands::Create { feature, target } => {
            let interactive = can_prompt_interactively();
            if interactive {
                intro("Create feature flag")?;
            }
            let form = complete_feature_form(feature, interactive)?;
            let payload = form.validate()?;
            let operation = Operation::Create(payload);
            let (environments, credentials) =
                resolve_target(&cfg, target, &operation, interactive)?;
            let dispatcher = Dispatcher::new(registry, &http)?;
            commands::run_operation(&dispatcher, operation, environments, credentials).await
        }
        Commands::Delete { ids, target } => {
            let interactive = can_prompt_interactively();
            let operation = Operation::Delete(
                ids.into_iter()
                    .map(|id| id.trim().to_string())
                    .filter(|id| !id.is_empty())
                    .collect(),
            );
            if operation.item_count() == 0 {
                return Err(ValidationError::MissingFields(vec!["ID"]).into());
            }
            let (environments, credentials) =
                resolve_target(&cfg, target, &operation, interactive)?;
            let dispatcher = Dispatcher::new(registry, &http)?;
            commands::run_operation(&dispatcher, operation, environments, credentials).await
        }
        Commands::Activity { updates, target } => {
            let interactive = can_prompt_interactively();
            let operation = Operation::UpdateActivity(updates);
            let (environments, credentials) =
                resolve_target(&cfg, target, &operation, interactive)?;
            let dispatcher = Dispatcher::new(registry, &http)?;
            commands::run_operation(&dispatcher, operation, environments, credentials).await
        }
        Commands::Envs => {
            commands::print_environments(&registry, &http);
            Ok(())
        }
        Commands::Hosts { dry_run } => {
            commands::run_hosts(&cfg.hosts_path(), &cfg.hosts_entry(), dry_run)
        }
        Commands::Init { force } => run_init(force),
        Commands::LocalConfig { action } => run_local_config(action),
    }
}

fn run_init(force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let Some(path) = CliConfig::config_path() else {
        return Err("Could not determine config directory".into());
    };

    if path.exists() && !force {
        println!("Config file already exists at: {}", path.display());
        println!("\nUse --force to overwrite, or edit directly:");
        println!("  $EDITOR {}", path.display());
        return Ok(());
    }

    // Create parent directory
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Write sample config
    std::fs::write(&path, config::sample_config())?;

    println!("Created config file: {}", path.display());
    println!("\nOr use 'ftm local-config set' to update values:");
    println!("  ftm local-config set auth.username Ivan.Ivanov");
    println!("  ftm local-config set http.insecure_skip_verify false");

    Ok(())
}

fn run_local_config(action: LocalConfigAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        LocalConfigAction::Show => {
            let cfg = CliConfig::load();
            let toml_str = toml::to_string_pretty(&cfg)?;
            println!("{}", toml_str);
        }

        LocalConfigAction::Get { key } => {
            let cfg = CliConfig::load();
            let value = match key.as_str() {
                "auth.username" => cfg.auth.username,
                "http.insecure_skip_verify" => Some(cfg.http.insecure_skip_verify.to_string()),
                "http.timeout_secs" => Some(cfg.http.timeout_secs.to_string()),
                "hosts.entry" => Some(cfg.hosts_entry()),
                "hosts.path" => Some(cfg.hosts_path().display().to_string()),
                _ => {
                    eprintln!("Unknown config key: {}", key);
                    eprintln!("\nValid keys:");
                    eprintln!("  auth.username");
                    eprintln!("  http.insecure_skip_verify, http.timeout_secs");
                    eprintln!("  hosts.entry, hosts.path");
                    return Ok(());
                }
            };

            match value {
                Some(v) => println!("{}", v),
                None => println!("(not set)"),
            }
        }

        LocalConfigAction::Set { key, value } => {
            let mut cfg = CliConfig::load();

            match key.as_str() {
                "auth.username" => cfg.auth.username = Some(value.clone()),
                "http.insecure_skip_verify" => {
                    cfg.http.insecure_skip_verify = value
                        .parse()
                        .map_err(|_| format!("{} expects true or false", key))?
                }
                "http.timeout_secs" => {
                    cfg.http.timeout_secs = value
                        .parse()
                        .map_err(|_| format!("{} expects a number of seconds", key))?
                }
                "hosts.entry" => cfg.hosts.entry = Some(value.clone()),
                "hosts.path" => cfg.hosts.path = Some(PathBuf::from(value.clone())),
                _ => {
                    eprintln!("Unknown config key: {}", key);
                    return Ok(());
                }
            }

            cfg.save()?;
            println!("Set {} = {}", key, value);
        }

        LocalConfigAction::Path => match CliConfig::config_path() {
            Some(path) => {
                println!("{}", path.display());
                if path.exists() {
                    println!("(exists)");
                } else {
                    println!("(not created yet - run 'ftm init')");
                }
            }
            None => println!("Could not determine config path"),
        },
    }

    Ok(())
}

fn can_prompt_interactively() -> bool {
    io::stdin().is_terminal() && io::stdout().is_terminal()
}

fn prompt_yes_no(prompt: &str, default_yes: bool) -> Result<bool, Box<dyn std::error::Error>> {
    let mut prompt = confirm(prompt).initial_value(default_yes);
    Ok(prompt.interact()?)
}

fn prompt_line(
    prompt: &str,
    default: Option<&str>,
) -> Result<Option<String>, Box<dyn std::error::Error>> {
    let mut prompt = input(prompt).required(false);
    if let Some(value) = default {
        prompt = prompt.default_input(value);
    }
    let value: String = prompt.interact()?;
    let trimmed = value.trim();

    if trimmed.is_empty() {
        if let Some(value) = default {
            return Ok(Some(value.to_string()));
        }
        return Ok(None);
    }

    Ok(Some(trimmed.to_string()))
}

fn prompt_secret(prompt: &str) -> Result<Option<String>, Box<dyn std::error::Error>> {
    let mut prompt = password(prompt).allow_empty();
    let value = prompt.interact()?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    Ok(Some(trimmed.to_string()))
}

fn prompt_team() -> Result<String, Box<dyn std::error::Error>> {
    let mut prompt = select("Team");
    for team in KNOWN_TEAMS {
        prompt = prompt.item(team.to_string(), *team, "");
    }
    Ok(prompt.interact()?)
}

fn prompt_audience_type() -> Result<AudienceType, Box<dyn std::error::Error>> {
    let value = select("Audience type")
        .item(AudienceType::All, "ALL", "every service")
        .item(AudienceType::Service, "SERVICE", "only the listed services")
        .interact()?;
    Ok(value)
}

fn prompt_environments() -> Result<Vec<Environment>, Box<dyn std::error::Error>> {
    let mut prompt = multiselect("Select environments").required(true);
    for env in Environment::ALL {
        let hint = if env.is_production() { "PRODUCTION" } else { "" };
        prompt = prompt.item(env, env.as_str(), hint);
    }
    Ok(prompt.interact()?)
}

/// Fill in create-form fields that were not given on the command line.
fn complete_feature_form(
    args: FeatureArgs,
    interactive: bool,
) -> Result<FeatureForm, Box<dyn std::error::Error>> {
    let ask = |value: Option<String>,
               prompt: &str,
               default: Option<&str>|
     -> Result<String, Box<dyn std::error::Error>> {
        match value {
            Some(value) => Ok(value),
            None if interactive => Ok(prompt_line(prompt, default)?.unwrap_or_default()),
            None => Ok(String::new()),
        }
    };

    let id = ask(args.id, "Feature ID (Team.Service.FeatureName)", None)?;
    let description = ask(args.description, "Description", None)?;
    let enabled = match args.enabled {
        Some(value) => value,
        None if interactive => prompt_yes_no("Enabled?", false)?,
        None => false,
    };
    let team = match args.team {
        Some(team) => team,
        None if interactive => prompt_team()?,
        None => String::new(),
    };
    let audience_type = match args.audience_type {
        Some(value) => value,
        None if interactive => prompt_audience_type()?,
        None => AudienceType::All,
    };
    let audience_target = ask(
        args.audience_target,
        "Audience target (affected services, comma separated)",
        None,
    )?;
    let task_id = ask(args.task_id, "Task ID", Some(TASK_ID_PREFIX))?;
    let is_scheduled_for_removal = match args.scheduled_for_removal {
        Some(value) => value,
        None if interactive => prompt_yes_no("Is it scheduled for removal?", false)?,
        None => false,
    };

    let (removal_feature_task_id, planned_removal_date) = if is_scheduled_for_removal {
        (
            ask(args.removal_task_id, "Removal feature task ID", None)?,
            ask(args.planned_removal_date, "Planned removal date", None)?,
        )
    } else {
        (
            args.removal_task_id.unwrap_or_default(),
            args.planned_removal_date.unwrap_or_default(),
        )
    };

    Ok(FeatureForm {
        id,
        description,
        enabled,
        team,
        audience_type: audience_type.as_str().to_string(),
        audience_target,
        task_id,
        is_scheduled_for_removal,
        removal_feature_task_id,
        planned_removal_date,
    })
}

/// Resolve environments and credentials, then pass the confirmation gate.
fn resolve_target(
    cfg: &CliConfig,
    args: TargetArgs,
    operation: &Operation,
    interactive: bool,
) -> Result<(Vec<Environment>, Credentials), Box<dyn std::error::Error>> {
    let environments = if args.all {
        Environment::ALL.to_vec()
    } else if !args.envs.is_empty() {
        args.envs
    } else if interactive {
        prompt_environments()?
    } else {
        Vec::new()
    };
    if environments.is_empty() {
        return Err(ValidationError::NoEnvironments.into());
    }

    let username = match args.username.or_else(|| cfg.default_username()) {
        Some(username) => username,
        None if interactive => prompt_line("Username (without @domain)", None)?.unwrap_or_default(),
        None => String::new(),
    };
    let password = match args.password {
        Some(password) => password,
        None if interactive => prompt_secret("Password")?.unwrap_or_default(),
        None => String::new(),
    };
    let credentials = Credentials::new(username.trim(), password.trim());
    credentials.validate()?;

    let touches_prod = environments.iter().any(|env| env.is_production());
    let needs_confirmation = operation.is_destructive() || touches_prod;
    if needs_confirmation && !args.yes {
        let names: Vec<&str> = environments.iter().map(|env| env.as_str()).collect();
        if interactive {
            let question = format!(
                "Run {} ({} item(s)) on {}?",
                operation.kind(),
                operation.item_count(),
                names.join(", ")
            );
            if !prompt_yes_no(&question, false)? {
                let _ = outro_cancel("Cancelled.");
                return Err("Operation cancelled.".into());
            }
        } else if operation.is_destructive() {
            return Err(format!(
                "Refusing to run {} on {} without confirmation; pass --yes",
                operation.kind(),
                names.join(", ")
            )
            .into());
        }
    }

    Ok((environments, credentials))
}
