mod cipher_commands;
mod config_commands;

use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    keysafe_config::KeysafeConfig,
    tracing::debug,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "keysafe", about = "keysafe: cipher negotiation for encrypted key-value stores")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error). Overrides the config value.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file (overrides discovery of ./keysafe.toml and ~/.config/keysafe/).
    #[arg(long, global = true, env = "KEYSAFE_CONFIG")]
    config: Option<PathBuf>,

    /// Platform version to negotiate against (overrides config value).
    #[arg(long, global = true)]
    platform_version: Option<u32>,
}

#[derive(Subcommand)]
enum Commands {
    /// List every algorithm with its minimum platform version.
    Algorithms,
    /// Show the saved and current algorithm pairs.
    Negotiate {
        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Record the current pair as the one protecting the store.
    Commit,
    /// Remove the recorded pair; the next negotiation sees defaults.
    Clear,
    /// Encrypt a value and print it as base64.
    Encrypt {
        text: String,
        /// Use the saved pair instead of the current one.
        #[arg(long)]
        saved: bool,
    },
    /// Decrypt a base64 value.
    Decrypt {
        ciphertext: String,
        /// Use the saved pair instead of the current one.
        #[arg(long)]
        saved: bool,
    },
    /// Validate the configuration file and report errors/warnings.
    Validate {
        /// Show informational diagnostics in addition to errors and warnings.
        #[arg(long)]
        verbose: bool,
    },
}

fn init_telemetry(level: &str, json_logs: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);

    if json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

/// Load the config, then layer env and command-line overrides on top.
fn resolve_config(cli: &Cli) -> anyhow::Result<KeysafeConfig> {
    let mut config = match cli.config {
        Some(ref path) => keysafe_config::load_config(path)?,
        None => keysafe_config::load_discovered()?,
    };
    keysafe_config::apply_env_overrides(&mut config);
    if let Some(version) = cli.platform_version {
        config.platform.version = Some(version);
    }
    if let Some(ref level) = cli.log_level {
        config.logging.level = level.clone();
    }
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Validation must work on configs that fail to load.
    if let Commands::Validate { verbose } = cli.command {
        init_telemetry(cli.log_level.as_deref().unwrap_or("info"), cli.json_logs);
        return config_commands::check(cli.config.as_deref(), verbose);
    }

    let config = resolve_config(&cli)?;
    init_telemetry(&config.logging.level, cli.json_logs || config.logging.json);

    debug!(
        version = env!("CARGO_PKG_VERSION"),
        platform = %config.platform.resolved(),
        "keysafe starting"
    );

    match cli.command {
        Commands::Algorithms => cipher_commands::algorithms(&config),
        Commands::Negotiate { json } => cipher_commands::negotiate(&config, json),
        Commands::Commit => cipher_commands::commit(&config),
        Commands::Clear => cipher_commands::clear(&config),
        Commands::Encrypt { text, saved } => cipher_commands::encrypt(&config, &text, saved),
        Commands::Decrypt { ciphertext, saved } => {
            cipher_commands::decrypt(&config, &ciphertext, saved)
        },
        Commands::Validate { .. } => Ok(()),
    }
}
