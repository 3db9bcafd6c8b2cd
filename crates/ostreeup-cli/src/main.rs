//! `ostree-upload`: the command-line front-end for the publish
//! protocol. Three subcommands drive the protocol itself
//! (`receive`/`push`) plus the one piece of local state management it
//! depends on (`gentoken`).

use std::{net::SocketAddr, path::PathBuf, process::ExitCode, sync::Arc, time::Duration};

use clap::{Parser, Subcommand};
use futures::FutureExt;
use ostreeup_client::{push, PushClient};
use ostreeup_core::store::{OstreeRepo, StoreAdapter};
use ostreeup_server::{
    api::{auth::AuthState, routes::build_router, state::ApiState},
    queue::QueueEngine,
    staging::StagingEngine,
    supervisor::Supervisor,
    task::ApiServerTask,
    TokenStore,
};
use ostreeup_tracing::{init_tracing, TracingConsumer};
use tokio::{net::TcpListener, signal::ctrl_c};

const DEFAULT_CONFIG: &str = "ostree-upload.yaml";
const DEFAULT_REPO: &str = "repo";
const DEFAULT_RECEIVE_ADDRESS: &str = ":8080";
const DEFAULT_PUSH_ADDRESS: &str = "http://localhost:8080";

#[derive(Parser)]
#[command(name = "ostree-upload", version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a bearer token and append it to the token config.
    Gentoken {
        #[arg(long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,
    },
    /// Run the publish server.
    Receive {
        #[arg(long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,
        #[arg(long, default_value = DEFAULT_REPO)]
        repo: PathBuf,
        #[arg(long, default_value = DEFAULT_RECEIVE_ADDRESS)]
        address: String,
        #[arg(long)]
        verbose: bool,
    },
    /// Push local branches to a remote publish server.
    Push {
        #[arg(long, default_value = DEFAULT_PUSH_ADDRESS)]
        address: String,
        #[arg(long, default_value = DEFAULT_REPO)]
        repo: PathBuf,
        #[arg(long)]
        token: String,
        #[arg(long = "branch")]
        branches: Vec<String>,
        #[arg(long)]
        prune: bool,
        #[arg(long)]
        verbose: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let (consumer, verbose) = match &cli.command {
        Command::Gentoken { .. } => (TracingConsumer::Tool, false),
        Command::Receive { verbose, .. } => (TracingConsumer::Server, *verbose),
        Command::Push { verbose, .. } => (TracingConsumer::Tool, *verbose),
    };
    init_tracing(consumer, verbose);

    let result = match cli.command {
        Command::Gentoken { config } => gentoken(&config),
        Command::Receive { config, repo, address, .. } => {
            runtime().block_on(receive(&config, &repo, &address))
        }
        Command::Push { address, repo, token, branches, prune, .. } => {
            push_cmd(&address, &repo, &token, &branches, prune)
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "ostree-upload failed");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to start tokio runtime")
}

fn gentoken(config: &std::path::Path) -> Result<(), Box<dyn std::error::Error>> {
    let token = TokenStore::gentoken(config)?;
    println!("{token}");
    Ok(())
}

async fn receive(
    config: &std::path::Path,
    repo: &std::path::Path,
    address: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = OstreeRepo::open(repo)?;
    let tokens = TokenStore::load(config)?;

    let staging = StagingEngine::open(store.root())?;
    let state = ApiState::new(
        Arc::new(store) as Arc<dyn StoreAdapter + Send + Sync>,
        Arc::new(QueueEngine::new()),
        Arc::new(staging),
    );
    let auth = AuthState::new(Arc::new(tokens));
    let router = build_router(state, auth);

    let bind_addr = bind_address(address)?;
    let listener = TcpListener::bind(bind_addr).await?;
    tracing::info!(address = %bind_addr, "listening");

    let mut supervisor = Supervisor::default();
    supervisor.spawn(ApiServerTask::new(listener, router));

    tokio::select! {
        result = supervisor.supervise().fuse() => result.map_err(|err| err as Box<dyn std::error::Error>)?,
        _ = ctrl_c().fuse() => {
            tracing::info!("received shutdown signal");
            supervisor.shutdown(Duration::from_secs(5)).await?;
        }
    }
    Ok(())
}

/// `:PORT` binds every interface, matching the default `:8080`; any
/// other value is passed through as a literal `host:port`.
fn bind_address(address: &str) -> Result<SocketAddr, Box<dyn std::error::Error>> {
    let full = if let Some(port) = address.strip_prefix(':') {
        format!("0.0.0.0:{port}")
    } else {
        address.to_string()
    };
    Ok(full.parse()?)
}

fn push_cmd(
    address: &str,
    repo: &std::path::Path,
    token: &str,
    branches: &[String],
    prune: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = OstreeRepo::open(repo)?;
    let client = PushClient::new(address, token)?;

    let outcome = push(&client, &store, branches)?;
    if outcome.branches_updated.is_empty() {
        println!("nothing to push");
    } else {
        println!(
            "pushed {} object(s), updated branches: {}",
            outcome.objects_uploaded,
            outcome.branches_updated.join(", ")
        );
    }

    if prune {
        let stats = store.prune(false)?;
        println!(
            "pruned {} of {} object(s), freed {} bytes",
            stats.pruned, stats.total, stats.bytes_freed
        );
    }

    Ok(())
}
