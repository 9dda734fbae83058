use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ebank_session::{
    AuthError, AuthGateway, AuthorizedClient, ConfigError, LogNavigator, RegisterRequest, SessionConfig, SessionState,
    User,
};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{}", .0.user_message())]
    Auth(#[from] AuthError),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("not signed in")]
    NotSignedIn,
    #[error("request failed with status {0}")]
    Status(u16),
    #[error("signal handler failed: {0}")]
    Signal(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "ebank-session", about = "E-banking session client")]
struct Cli {
    /// Backend origin, e.g. `http://localhost:8080`.
    #[arg(long, env = "EBANK_API_BASE_URL")]
    base_url: Option<String>,

    /// Where the session is persisted between runs.
    #[arg(long, env = "EBANK_STORAGE_PATH")]
    storage_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and persist the session.
    Login {
        #[arg(long)]
        username: String,
        #[arg(long, env = "EBANK_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account; does not sign in.
    Register(RegisterArgs),
    /// Show the restored session.
    Status,
    /// Exchange the persisted token for a fresh one.
    Refresh,
    /// Drop the persisted session.
    Logout,
    /// GET a protected backend path with the session's token.
    Get { path: String },
    /// Keep the session alive and print every transition until Ctrl-C.
    Watch,
}

#[derive(Args, Debug)]
struct RegisterArgs {
    #[arg(long)]
    username: String,
    #[arg(long)]
    email: String,
    #[arg(long, env = "EBANK_PASSWORD", hide_env_values = true)]
    password: String,
    #[arg(long)]
    first_name: String,
    #[arg(long)]
    last_name: String,
}

impl From<RegisterArgs> for RegisterRequest {
    fn from(args: RegisterArgs) -> Self {
        Self {
            username: args.username,
            email: args.email,
            password: args.password,
            first_name: args.first_name,
            last_name: args.last_name,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = SessionConfig::from_env()?;
    if let Some(base_url) = cli.base_url.as_deref() {
        config = config.with_base_url(base_url)?;
    }
    if let Some(path) = cli.storage_path {
        config.storage_path = path;
    }

    let gateway = AuthGateway::from_config(&config, Arc::new(LogNavigator))?;

    match cli.command {
        Command::Login { username, password } => {
            let response = gateway.login(&username, &password).await?;
            print_user("signed in as", &response.user);
            println!("token expires in {}s", response.expires_in);
            Ok(())
        }
        Command::Register(args) => {
            let response = gateway.register(&args.into()).await?;
            println!("{}", response.message);
            print_user("registered", &response.user);
            Ok(())
        }
        Command::Status => {
            run_status(&gateway);
            Ok(())
        }
        Command::Refresh => {
            let response = gateway.refresh().await?;
            print_user("refreshed session for", &response.user);
            Ok(())
        }
        Command::Logout => {
            gateway.logout();
            println!("signed out");
            Ok(())
        }
        Command::Get { path } => run_get(&config, &gateway, &path).await,
        Command::Watch => run_watch(&gateway).await,
    }
}

fn print_user(prefix: &str, user: &User) {
    let roles: Vec<&str> = user.roles.iter().map(String::as_str).collect();
    println!("{prefix} {} <{}> [{}]", user.display_name(), user.email, roles.join(", "));
}

fn print_state(state: &SessionState) {
    match (&state.user, state.is_authenticated) {
        (Some(user), true) => print_user("authenticated:", user),
        _ if state.loading => println!("working..."),
        _ => match &state.error {
            Some(error) => println!("signed out ({error})"),
            None => println!("signed out"),
        },
    }
}

fn run_status(gateway: &AuthGateway) {
    print_state(&gateway.session().current());
    if let Some(deadline) = gateway.refresh_deadline() {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        println!("next refresh in {}s", remaining.as_secs());
    }
}

async fn run_get(config: &SessionConfig, gateway: &AuthGateway, path: &str) -> Result<(), CliError> {
    if !gateway.is_authenticated() {
        return Err(CliError::NotSignedIn);
    }
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeouts.request_secs))
        .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
        .build()?;
    let client = AuthorizedClient::new(http, gateway.clone());
    let url = format!("{}/{}", config.api_base_url, path.trim_start_matches('/'));

    let response = client.send(client.get(&url)).await?;
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        eprintln!("{body}");
        return Err(CliError::Status(status.as_u16()));
    }
    println!("{body}");
    Ok(())
}

async fn run_watch(gateway: &AuthGateway) -> Result<(), CliError> {
    if !gateway.is_authenticated() {
        return Err(CliError::NotSignedIn);
    }
    let _subscription = gateway.subscribe(print_state);
    tokio::signal::ctrl_c().await?;
    Ok(())
}
