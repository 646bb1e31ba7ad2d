use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use zettel_presenter::client::ZettelstoreClient;
use zettel_presenter::config::{self, CliOverrides, PresenterConfig};
use zettel_presenter::server::{self, AppState};

const TRACING_TARGET: &str = "zettel_presenter::startup";

#[derive(Parser)]
#[command(name = "zettel-presenter")]
#[command(about = "Serve slide shows and handouts assembled from a Zettelstore")]
#[command(long_about = "\
Serve slide shows and handouts assembled from a Zettelstore

A slide set is a zettel with role \"slideset\" whose content links to the
zettel that make up the presentation, in order. Level-1 headings split a
zettel into several show slides.

Routes:

  /{zid}           zettel page, or table of contents of a slide set
  /reveal/{zid}    Reveal.js slide show
  /slidy/{zid}     Slidy slide show
  /handout/{zid}   printable handout
  /content/{zid}   raw zettel content
  /l?{query}       zettel matching a Zettelstore query (any single letter)

Configuration layers (later wins):
  stock defaults → config.toml → command line → config zettel 00009000001000

Run 'zettel-presenter gen-config' to generate a documented config.toml.")]
#[command(version = env!("PRESENTER_BUILD_VERSION"))]
struct Cli {
    /// Config file; missing means stock defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Socket address to listen on, e.g. 127.0.0.1:23120
    #[arg(long, global = true)]
    listen: Option<String>,

    /// Base URL of the Zettelstore
    url: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve presentations over HTTP (default)
    Serve,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

#[tokio::main]
async fn main() {
    let Err(error) = run().await else {
        process::exit(0);
    };

    if tracing::enabled!(tracing::Level::ERROR) {
        tracing::error!(
            target: TRACING_TARGET,
            error = format!("{error:#}"),
            "terminated with error"
        );
    } else {
        eprintln!("Error: {error:#}");
    }
    process::exit(1);
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Serve) {
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
            Ok(())
        }
        Command::Serve => {
            init_tracing();
            let overrides = CliOverrides {
                listen_addr: cli.listen,
                zettelstore_url: cli.url,
            };
            let config = config::load_config(cli.config.as_deref(), &overrides)
                .context("failed to load configuration")?;
            serve(config).await
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn serve(config: PresenterConfig) -> anyhow::Result<()> {
    let client = ZettelstoreClient::new(&config.zettelstore.url, config.zettelstore.timeout())
        .context("failed to create Zettelstore client")?;
    let config = config.with_config_zettel(&client).await;
    config
        .validate()
        .context("invalid configuration after applying config zettel")?;

    let addr = config.listen_socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(
        target: TRACING_TARGET,
        version = env!("PRESENTER_BUILD_VERSION"),
        addr = %addr,
        zettelstore = %client.base(),
        slideset_role = %config.slides.slideset_role,
        "presenter listening"
    );

    let app = server::router(AppState::new(Arc::new(client), config));
    axum::serve(listener, app)
        .with_graceful_shutdown(server::shutdown_signal(addr))
        .await
        .context("server terminated unexpectedly")?;

    tracing::info!(target: TRACING_TARGET, "presenter stopped");
    Ok(())
}
