use anyhow::Result;
use clap::Parser;
use collectdesk::backend::PasswordChange;
use collectdesk::commands::{self, Services};
use collectdesk::config::{Config, ConfigOverrides};

/// collectdesk - command-line client for the collection back office
///
/// Talks to the back-office REST API with a stored bearer token. When the
/// primary API is unreachable, configured fallback URLs are tried in order
/// and the first one that answers is used for the rest of the run.
///
/// Examples:
///   collectdesk token set <TOKEN>          # Store the token from the login flow
///   collectdesk officers                   # List collection officers
///   collectdesk collections weekly         # Weekly collection report
#[derive(Parser, Debug)]
#[command(author, version = env!("COLLECTDESK_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Primary API base URL (also via COLLECTDESK_API_URL)
    #[arg(long = "api-url", value_name = "URL", global = true)]
    pub api_url: Option<String>,

    /// Fallback API base URL, tried in the order given (repeatable)
    #[arg(long = "fallback-url", value_name = "URL", global = true)]
    pub fallback_urls: Vec<String>,

    /// Per-request timeout in milliseconds (also via COLLECTDESK_TIMEOUT_MS)
    #[arg(long = "timeout-ms", value_name = "MS", global = true)]
    pub timeout_ms: Option<u64>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Check that the API answers on its health path
    Health,

    /// Probe every configured endpoint
    Endpoints,

    /// Manage the stored bearer token
    #[command(subcommand)]
    Token(TokenCommands),

    /// GET an arbitrary API path and print the JSON response
    Get {
        /// Path relative to the API base URL, e.g. "users/42"
        path: String,
    },

    /// List collection officers
    Officers,

    /// List customers
    Customers,

    /// Show one customer
    Customer {
        #[arg(value_name = "ID")]
        id: String,
    },

    /// List loan or saving accounts
    Accounts {
        /// "loan" or "saving"
        #[arg(value_name = "KIND")]
        kind: String,
    },

    /// Collection report for a period
    Collections {
        /// "daily", "weekly" or "monthly"
        #[arg(value_name = "PERIOD")]
        period: String,
    },

    /// Assign a customer to another officer
    Reassign {
        #[arg(value_name = "CUSTOMER_ID")]
        customer_id: String,
        #[arg(value_name = "OFFICER_ID")]
        officer_id: String,
    },

    /// Record an amount collected by an officer
    Collect(CollectArgs),

    /// Change the signed-in user's password
    Password(PasswordArgs),
}

#[derive(clap::Subcommand, Debug)]
enum TokenCommands {
    /// Store a token
    Set {
        #[arg(value_name = "TOKEN")]
        token: String,
    },
    /// Remove the stored token
    Clear,
    /// Show whether a token is stored
    Status,
}

#[derive(clap::Args, Debug)]
pub struct CollectArgs {
    #[arg(value_name = "OFFICER_ID")]
    pub officer_id: String,

    #[arg(value_name = "AMOUNT")]
    pub amount: f64,

    /// Collection date as YYYY-MM-DD (defaults to today)
    #[arg(long, value_name = "DATE")]
    pub date: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct PasswordArgs {
    #[arg(
        long,
        env = "COLLECTDESK_CURRENT_PASSWORD",
        hide_env_values = true,
        value_name = "PASSWORD"
    )]
    pub current: String,

    #[arg(
        long,
        env = "COLLECTDESK_NEW_PASSWORD",
        hide_env_values = true,
        value_name = "PASSWORD"
    )]
    pub new: String,

    #[arg(
        long,
        env = "COLLECTDESK_CONFIRM_PASSWORD",
        hide_env_values = true,
        value_name = "PASSWORD"
    )]
    pub confirm: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let runtime = collectdesk::runtime::RealRuntime;

    let overrides = ConfigOverrides {
        api_url: cli.api_url,
        fallback_urls: cli.fallback_urls,
        timeout_ms: cli.timeout_ms,
    };
    let config = Config::load(&runtime, overrides)?;
    let services = Services::from_config(runtime, &config)?;
    let store = services.store.as_ref();

    match cli.command {
        Commands::Health => commands::health(&services.client).await?,
        Commands::Endpoints => commands::endpoints(&services.client).await?,
        Commands::Token(TokenCommands::Set { token }) => commands::token_set(store, &token)?,
        Commands::Token(TokenCommands::Clear) => commands::token_clear(store)?,
        Commands::Token(TokenCommands::Status) => commands::token_status(store)?,
        Commands::Get { path } => commands::get(&services.client, &path).await?,
        Commands::Officers => commands::officers(&services.backend).await?,
        Commands::Customers => commands::customers(&services.backend).await?,
        Commands::Customer { id } => commands::customer(&services.backend, &id).await?,
        Commands::Accounts { kind } => commands::accounts(&services.backend, &kind).await?,
        Commands::Collections { period } => {
            commands::collections(&services.backend, &period).await?
        }
        Commands::Reassign {
            customer_id,
            officer_id,
        } => commands::reassign(&services.backend, &customer_id, &officer_id).await?,
        Commands::Collect(args) => {
            commands::collect(
                &services.backend,
                &args.officer_id,
                args.amount,
                args.date.as_deref(),
            )
            .await?
        }
        Commands::Password(args) => {
            let change = PasswordChange {
                current_password: args.current,
                new_password: args.new,
                confirm_password: args.confirm,
            };
            commands::change_password(&services.backend, change).await?
        }
    }
    Ok(())
}
