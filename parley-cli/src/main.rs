use clap::{Args, Parser, Subcommand};
use futures::StreamExt;
use parley_a2a::{
    A2aError, A2aServer, CallContext, ConfigError, DispatchOutcome, Dispatcher,
    ReferenceExecutor, ServerConfig, ServerConfigBuilder, StoreKind,
};
use std::io::Read;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "parley", version)]
#[command(about = "Parley - Agent2Agent JSON-RPC server")]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the reference agent over HTTP
    Serve {
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Print the agent card
    Card {
        #[command(flatten)]
        config: ConfigArgs,
        /// Print the authenticated extended card instead
        #[arg(long)]
        extended: bool,
    },
    /// Dispatch one JSON-RPC request in-process and print the reply
    Call {
        #[command(flatten)]
        config: ConfigArgs,
        /// Request body; read from stdin when omitted
        body: Option<String>,
    },
}

/// Flags layered over the `PARLEY_*` environment.
#[derive(Args, Debug)]
struct ConfigArgs {
    /// Bind address
    #[arg(long)]
    host: Option<String>,
    /// Bind port
    #[arg(long, short)]
    port: Option<u16>,
    /// Persistence backend (memory, file)
    #[arg(long)]
    store: Option<StoreKind>,
    /// File backend location
    #[arg(long)]
    store_path: Option<String>,
    /// Name on the agent card
    #[arg(long)]
    agent_name: Option<String>,
    /// Endpoint URL on the agent card
    #[arg(long)]
    agent_url: Option<String>,
    /// Disable message/stream and tasks/resubscribe
    #[arg(long)]
    no_streaming: bool,
    /// Disable push notification configs
    #[arg(long)]
    no_push: bool,
    /// Simulated work per request in milliseconds
    #[arg(long)]
    work_ms: Option<u64>,
    /// Bearer token unlocking the extended card
    #[arg(long)]
    auth_token: Option<String>,
    /// Disable permissive CORS
    #[arg(long)]
    no_cors: bool,
}

impl ConfigArgs {
    fn resolve(self) -> Result<ServerConfig, CliError> {
        let mut builder = ServerConfigBuilder::from_env()?;
        if let Some(host) = self.host {
            builder = builder.host(host);
        }
        if let Some(port) = self.port {
            builder = builder.port(port);
        }
        if let Some(store) = self.store {
            builder = builder.store(store);
        }
        if let Some(path) = self.store_path {
            builder = builder.store_path(path);
        }
        if let Some(name) = self.agent_name {
            builder = builder.agent_name(name);
        }
        if let Some(url) = self.agent_url {
            builder = builder.agent_url(url);
        }
        if self.no_streaming {
            builder = builder.streaming(false);
        }
        if self.no_push {
            builder = builder.push_notifications(false);
        }
        if let Some(ms) = self.work_ms {
            builder = builder.executor_work_ms(ms);
        }
        if self.auth_token.is_some() {
            builder = builder.auth_token(self.auth_token);
        }
        if self.no_cors {
            builder = builder.enable_cors(false);
        }
        Ok(builder.build()?)
    }
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Server(#[from] A2aError),

    #[error("failed to read request: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode output: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no extended card: set --auth-token or PARLEY_AUTH_TOKEN")]
    NoExtendedCard,
}

fn init_logging(json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

async fn serve(config: ServerConfig) -> Result<(), CliError> {
    tracing::info!(
        address = %config.bind_addr(),
        store = %config.store,
        "Starting parley"
    );
    let executor = ReferenceExecutor::new(config.executor_work);
    let server = A2aServer::from_config(&config, executor);
    server
        .serve_with_shutdown(&config.bind_addr(), shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

fn card(config: ServerConfig, extended: bool) -> Result<(), CliError> {
    let card = if extended {
        config.extended_card().ok_or(CliError::NoExtendedCard)?
    } else {
        config.agent_card()
    };
    println!("{}", serde_json::to_string_pretty(&card)?);
    Ok(())
}

async fn call(config: ServerConfig, body: Option<String>) -> Result<(), CliError> {
    let body = match body {
        Some(body) => body,
        None => {
            let mut input = String::new();
            std::io::stdin().read_to_string(&mut input)?;
            input
        }
    };

    let mut builder = Dispatcher::builder(ReferenceExecutor::new(config.executor_work))
        .store(config.open_store())
        .agent_card(config.agent_card())
        .sse_buffer(config.sse_buffer);
    if let Some(card) = config.extended_card() {
        builder = builder.extended_card(card);
    }
    let dispatcher = builder.build();

    // A locally supplied token counts as authenticated.
    let ctx = CallContext {
        authenticated: config.auth_token.is_some(),
    };
    match dispatcher.dispatch_str(&body, ctx).await {
        DispatchOutcome::Response(response) => {
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        DispatchOutcome::Stream(mut frames) => {
            while let Some(frame) = frames.next().await {
                print!("{}", frame.to_wire());
            }
        }
    }
    Ok(())
}

async fn run(command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Serve { config } => serve(config.resolve()?).await,
        Commands::Card { config, extended } => card(config.resolve()?, extended),
        Commands::Call { config, body } => call(config.resolve()?, body).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.json_logs);

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
