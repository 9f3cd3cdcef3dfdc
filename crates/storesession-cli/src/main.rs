//! storesession - command-line access to a WooCommerce GraphQL store.
//!
//! Logs in, keeps the auth and session tokens fresh, and runs GraphQL
//! operations with the tokens attached.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use storesession_core::auth::{FileStore, KeyValueStore, KeyringStore, MemoryStore};
use storesession_core::{AuthError, Config, Operation, StoreClient};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// File holding the refresh token when the keychain is not used
const TOKEN_FILE: &str = "tokens.json";

/// How often `watch` prints the refresh status (in seconds)
const WATCH_REPORT_SECS: u64 = 10;

#[derive(Parser)]
#[command(name = "storesession", version, about = "Auth and session tokens for a WooCommerce GraphQL store")]
struct Cli {
    /// GraphQL endpoint, overriding config and environment
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Keep the refresh token in the OS keychain instead of a file
    #[arg(long, global = true)]
    keychain: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in and store the refresh token
    Login {
        #[arg(short, long)]
        username: Option<String>,
    },
    /// Forget every stored token
    Logout,
    /// Show what is stored
    Status,
    /// Refresh and print the auth token
    Token,
    /// Print the session token
    Session {
        /// Fetch a new session even if one is cached
        #[arg(long)]
        force: bool,
    },
    /// Run a GraphQL operation from a file
    Query {
        file: PathBuf,
        /// Variables as a JSON object
        #[arg(long)]
        variables: Option<String>,
        /// Operation name
        #[arg(long)]
        name: Option<String>,
    },
    /// Keep refreshing tokens until interrupted
    Watch,
}

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load()?.with_env_overrides(|key| std::env::var(key).ok())?;
    if let Some(ref endpoint) = cli.endpoint {
        config.endpoint = endpoint.clone();
    }
    config.validate()?;
    Ok(config)
}

fn build_client(cli: &Cli, config: &Config) -> Result<StoreClient> {
    let long_lived: Arc<dyn KeyValueStore> = if cli.keychain {
        Arc::new(KeyringStore::new(config.keychain_service()))
    } else {
        Arc::new(FileStore::new(config.data_dir()?.join(TOKEN_FILE)))
    };

    Ok(StoreClient::new(config, Arc::new(MemoryStore::new()), long_lived)?)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();
    let cli = Cli::parse();

    let mut config = load_config(&cli)?;
    let client = build_client(&cli, &config)?;
    info!(endpoint = client.endpoint(), "storesession starting");

    match cli.command {
        Command::Login { username } => {
            let username = match username.or_else(|| config.last_username.clone()) {
                Some(name) => name,
                None => prompt("Username: ")?,
            };
            let password = rpassword::prompt_password("Password: ")?;

            let customer = client.login(&username, &password).await?;
            println!("Logged in as {}", customer.display_name());

            config.last_username = Some(username);
            config.save().context("Failed to save config")?;
        }
        Command::Logout => {
            client.logout()?;
            println!("Logged out");
        }
        Command::Status => print_status(&client)?,
        Command::Token => match client.refresher().get_auth_token().await {
            Ok(token) => println!("{}", token),
            Err(AuthError::NotAuthenticated) => {
                anyhow::bail!("Not logged in - run `storesession login` first")
            }
            Err(e) => return Err(e.into()),
        },
        Command::Session { force } => match client.credentials().get_session_token(force).await? {
            Some(token) => println!("{}", token),
            None => anyhow::bail!("The store did not hand out a session token"),
        },
        Command::Query {
            file,
            variables,
            name,
        } => {
            let query = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let mut operation = Operation::new(query);
            if let Some(vars) = variables {
                operation = operation
                    .with_variables(serde_json::from_str(&vars).context("Variables must be valid JSON")?);
            }
            if let Some(name) = name {
                operation = operation.with_name(name);
            }

            let response = client.execute(operation).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Watch => watch(&client).await?,
    }

    Ok(())
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn print_status(client: &StoreClient) -> Result<()> {
    let store = client.credentials();
    println!("Endpoint:       {}", client.endpoint());
    println!(
        "Refresh token:  {}",
        if store.refresh_token()?.is_some() { "stored" } else { "none" }
    );
    println!(
        "Session token:  {}",
        if store.cached_session_token()?.is_some() { "cached" } else { "none" }
    );
    println!(
        "Refresh every:  {}s",
        client.refresher().refresh_interval().as_secs_f64()
    );
    Ok(())
}

/// Arm the refresh timer and report on it until Ctrl-C or logout
async fn watch(client: &StoreClient) -> Result<()> {
    let refresher = client.refresher();
    refresher.fetch_auth_token().await.map_err(|e| match e {
        AuthError::NotAuthenticated => anyhow::anyhow!("Not logged in - run `storesession login` first"),
        other => other.into(),
    })?;
    println!(
        "Refreshing every {}s, press Ctrl-C to stop",
        refresher.refresh_interval().as_secs_f64()
    );

    let mut report = tokio::time::interval(Duration::from_secs(WATCH_REPORT_SECS));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                refresher.disarm();
                println!("Stopped");
                return Ok(());
            }
            _ = report.tick() => {
                if !refresher.is_armed() {
                    println!("Credentials gone, refresh timer stopped");
                    return Ok(());
                }
                match refresher.last_refresh() {
                    Some(at) => println!("Last refresh: {}", at.with_timezone(&chrono::Local).format("%H:%M:%S")),
                    None => println!("Last refresh: never"),
                }
            }
        }
    }
}
