use std::{sync::Arc, time::Duration};

use anyhow::Context;
use clap::{Parser, Subcommand};
use flight_booking_client::{
    config::{config_dir, ConfigLoader},
    registry::ServiceRegistry,
    telemetry, FlightClient, RequestContext,
};

#[derive(Parser, Debug)]
#[command(name = "flight-client", about = "Book seats and look up flights")]
struct Cli {
    /// Deployment environment; selects /etc/gobiz/<env>. Defaults to $ENV.
    #[arg(long, env = "ENV", default_value = "")]
    env: String,

    /// Abort the call after this many milliseconds.
    #[arg(long)]
    deadline_ms: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Book a seat on a flight
    Book { flight_id: i64, seat_id: i64 },
    /// Fetch details of a flight
    Details { flight_id: i64 },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let loader = ConfigLoader::new(config_dir(&cli.env));
    let app_config = loader
        .load()
        .with_context(|| format!("loading config from {}", loader.dir().display()))?;
    telemetry::init_logging(&app_config.logger).context("initializing logger")?;

    let client_config = app_config.flight.to_client_config()?;
    let client = FlightClient::new(client_config).context("building flight client")?;

    let registry = ServiceRegistry::new();
    registry.register(Arc::new(client));
    let service = registry.current()?;

    let mut ctx = RequestContext::new(format!("cli-{}", std::process::id()));
    if let Some(ms) = cli.deadline_ms {
        ctx = ctx.with_timeout(Duration::from_millis(ms));
    }

    match cli.command {
        Command::Book { flight_id, seat_id } => {
            let outcome = service.book_seat(&ctx, flight_id, seat_id).await?;
            tracing::info!(flight_id, seat_id, ?outcome, "seat booking finished");
            println!("{outcome:?}");
        }
        Command::Details { flight_id } => {
            let details = service.get_flight_details(&ctx, flight_id).await?;
            tracing::info!(flight_id, "flight details fetched");
            println!(
                "{} -> {} | {} | cost {}",
                details.origin,
                details.destination,
                details.description_opt().unwrap_or("-"),
                details
                    .cost_opt()
                    .map_or_else(|| "-".to_string(), |c| c.to_string())
            );
        }
    }

    Ok(())
}
