use anyhow::{Context, Result};
use clap::Parser;
use log::debug;
use retryable::{Cancellation, ClientConfig, Credentials, Outcome, RetryPolicy, TokenLocation};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Exit status reported when a call is cancelled (Ctrl-C or timeout).
const EXIT_CANCELLED: i32 = 130;

/// retryable - authenticated HTTP requests with automatic retry
///
/// Exchanges credentials for a bearer token, sends the request with it,
/// re-authorizes when the token is rejected (HTTP 401) and retries
/// network failures after a delay.
///
/// Examples:
///   retryable --auth-url https://api.example.com/login -u alice get https://api.example.com/items
#[derive(Parser, Debug)]
#[command(author, version = env!("RETRYABLE_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Authorization endpoint receiving the credentials
    #[arg(long, env = "RETRYABLE_AUTH_URL", value_name = "URL", global = true)]
    auth_url: Option<String>,

    /// Username for the authorization endpoint
    #[arg(long, short = 'u', env = "RETRYABLE_USERNAME", global = true)]
    username: Option<String>,

    /// Password for the authorization endpoint
    #[arg(
        long,
        short = 'p',
        env = "RETRYABLE_PASSWORD",
        hide_env_values = true,
        global = true
    )]
    password: Option<String>,

    /// Maximum number of attempts per request
    #[arg(
        long,
        env = "RETRYABLE_MAX_ATTEMPTS",
        default_value_t = retryable::retry::DEFAULT_MAX_ATTEMPTS,
        global = true
    )]
    max_attempts: u32,

    /// Delay after a network failure before the next attempt
    #[arg(
        long,
        env = "RETRYABLE_RETRY_DELAY_MS",
        value_name = "MS",
        default_value_t = retryable::retry::DEFAULT_RETRY_DELAY_MS,
        global = true
    )]
    retry_delay_ms: u64,

    /// Give up (cancel) after this many seconds
    #[arg(long, env = "RETRYABLE_TIMEOUT_SECS", value_name = "SECS", global = true)]
    timeout_secs: Option<u64>,

    /// Read the token from this JSON field instead of the raw response body
    #[arg(long, env = "RETRYABLE_TOKEN_FIELD", value_name = "FIELD", global = true)]
    token_field: Option<String>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Send a GET request
    Get(GetArgs),

    /// Send a POST request with a JSON body
    Post(PostArgs),
}

#[derive(clap::Args, Debug)]
struct GetArgs {
    /// Target URL
    #[arg(value_name = "URL")]
    url: String,
}

#[derive(clap::Args, Debug)]
struct PostArgs {
    /// Target URL
    #[arg(value_name = "URL")]
    url: String,

    /// JSON request body
    #[arg(long, short = 'd', value_name = "JSON")]
    data: String,
}

impl Cli {
    fn client_config(&self) -> Result<ClientConfig> {
        let auth_url = self
            .auth_url
            .clone()
            .context("--auth-url (or RETRYABLE_AUTH_URL) is required")?;
        let username = self
            .username
            .clone()
            .context("--username (or RETRYABLE_USERNAME) is required")?;
        let password = self.password.clone().unwrap_or_default();

        let policy = RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.retry_delay_ms),
        )?;

        let token_location = match &self.token_field {
            Some(field) => TokenLocation::JsonField(field.clone()),
            None => TokenLocation::Body,
        };

        Ok(ClientConfig::new(auth_url, Credentials::new(username, password))
            .with_policy(policy)
            .with_token_location(token_location))
    }
}

/// Cancels `token` on Ctrl-C or once the optional timeout elapses.
fn spawn_cancellation_triggers(token: &CancellationToken, timeout_secs: Option<u64>) {
    let on_interrupt = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("Interrupted, cancelling request");
            on_interrupt.cancel();
        }
    });

    if let Some(secs) = timeout_secs {
        let on_timeout = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            debug!("Timed out after {}s, cancelling request", secs);
            on_timeout.cancel();
        });
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let client = cli.client_config()?.build()?;

    let token = CancellationToken::new();
    spawn_cancellation_triggers(&token, cli.timeout_secs);
    let cancel = Cancellation::new(token);

    let outcome = match &cli.command {
        Commands::Get(args) => client.get(&args.url, &cancel).await?,
        Commands::Post(args) => {
            let body: serde_json::Value =
                serde_json::from_str(&args.data).context("--data must be valid JSON")?;
            client.post(&args.url, &body, &cancel).await?
        }
    };

    match outcome {
        Outcome::Completed(response) => {
            eprintln!("HTTP {}", response.status());
            let body = response
                .text()
                .await
                .context("Failed to read response body")?;
            println!("{}", body);
            Ok(())
        }
        Outcome::Cancelled => {
            eprintln!("Request cancelled");
            std::process::exit(EXIT_CANCELLED);
        }
    }
}
