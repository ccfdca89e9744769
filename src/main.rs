use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use integration_connect::{
    AirtableIntegration, BrowserSurface, ConnectConfig, ConnectError, ConnectionController,
    ExpansionState, HubspotIntegration, Integration, IntegrationClient, visible_rows,
};

#[derive(Debug, Parser)]
#[command(
    name = "integration-connect",
    about = "Connect a data source through its OAuth popup flow and list its items."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Airtable(ConnectArgs),
    Hubspot(ConnectArgs),
}

#[derive(Debug, Args)]
struct ConnectArgs {
    #[arg(long)]
    user_id: String,

    #[arg(long)]
    org_id: String,

    /// Integrations backend, overrides INTEGRATION_CONNECT_BASE_URL.
    #[arg(long)]
    base_url: Option<String>,

    /// Give up if the authorization window is still open after this long.
    #[arg(long)]
    poll_timeout_secs: Option<u64>,

    #[arg(long)]
    expand_all: bool,

    /// Print the connected `{credentials, type}` as JSON instead of the tree.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<(), ConnectError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Airtable(args) => run(AirtableIntegration, args).await,
        Command::Hubspot(args) => run(HubspotIntegration, args).await,
    }
}

async fn run<I: Integration>(integration: I, args: ConnectArgs) -> Result<(), ConnectError> {
    let mut config = ConnectConfig::from_env()?;
    if let Some(base_url) = args.base_url {
        config.base_url = base_url;
    }
    if let Some(secs) = args.poll_timeout_secs {
        config = config.with_poll_timeout(Duration::from_secs(secs));
    }

    let empty_message = integration.empty_message();
    let client = IntegrationClient::new(integration, config.clone())?;
    let controller = ConnectionController::new(client, BrowserSurface, config);

    controller.connect(&args.user_id, &args.org_id).await?;

    if args.json {
        let output = serde_json::to_string_pretty(&controller.params())?;
        println!("{output}");
        return Ok(());
    }

    let tree = controller.tree().snapshot();
    if tree.nodes.is_empty() {
        println!("{empty_message}");
        return Ok(());
    }

    let mut expansion = ExpansionState::new();
    if args.expand_all {
        expansion.expand_all(&tree.nodes);
    }
    for row in visible_rows(&tree.nodes, controller.tree().strategy(), &expansion) {
        println!("{}", row.render());
    }
    Ok(())
}
