use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand};
use ratekeeper::core::config::ConfigOverrides;
use ratekeeper::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(flatten)]
    overrides: OverrideArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Settings that win over the config file.
#[derive(Args)]
struct OverrideArgs {
    /// Port for the HTTP API
    #[arg(long, env = "PORT", global = true)]
    port: Option<u16>,

    /// Rate database directory, or ":memory:"
    #[arg(long, env = "DBPATH", global = true)]
    dbpath: Option<String>,

    /// Upstream API key
    #[arg(long, env = "APIKEY", global = true, hide_env_values = true)]
    apikey: Option<String>,

    /// Comma-separated currency codes, e.g. UAH,USD,EUR
    #[arg(long, env = "CURRENCIES", global = true)]
    currencies: Option<String>,

    /// Seconds between background refreshes, 0 disables
    #[arg(long, env = "INTERVAL", global = true)]
    interval: Option<u64>,

    /// Debug mode
    #[arg(long, env = "DEBUG", global = true)]
    dbg: bool,
}

impl From<OverrideArgs> for ConfigOverrides {
    fn from(args: OverrideArgs) -> Self {
        Self {
            port: args.port,
            data_path: args.dbpath,
            api_key: args.apikey,
            currencies: args.currencies,
            interval: args.interval,
            debug: args.dbg,
        }
    }
}

impl From<Commands> for ratekeeper::AppCommand {
    fn from(cmd: Commands) -> ratekeeper::AppCommand {
        match cmd {
            Commands::Serve => ratekeeper::AppCommand::Serve,
            Commands::Rates { date } => ratekeeper::AppCommand::Rates { date },
            Commands::Pair { pair } => ratekeeper::AppCommand::Pair { pair },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Run the HTTP rate service
    Serve,
    /// Show rates for a date (YYYY-MM-DD), today by default
    Rates { date: Option<String> },
    /// Show today's rate for a pair, e.g. USD-UAH
    Pair { pair: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let overrides = ConfigOverrides::from(cli.overrides);
    init_logging(cli.verbose || overrides.debug);

    let result = match cli.command {
        Some(Commands::Setup) => ratekeeper::cli::setup::setup(),
        Some(cmd) => {
            ratekeeper::run_command(cmd.into(), cli.config_path.as_deref(), &overrides).await
        }
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
