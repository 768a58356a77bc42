use std::{path::PathBuf, process::ExitCode, time::Duration};

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use xplane_feeder::{
    config::Config,
    feeder::{ErrorPolicy, Feeder},
    source::influx::InfluxSource,
    transport, FeedResult,
};

#[derive(Parser)]
#[command(name = "xplane-feeder")]
#[command(about = "Feed a tracked flight's latest InfluxDB position to X-Plane over UDP")]
struct Cli {
    /// Flight name as recorded in the store, e.g. ROF123
    flight: String,
    /// Vehicle id the simulator shows the flight as
    #[arg(allow_negative_numbers = true)]
    vehicle_id: i32,
    /// YAML config file; command line options override it
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Simulator host:port
    #[arg(long)]
    xplane: Option<String>,
    /// Tick period, e.g. 100ms or 50ms
    #[arg(long, value_parser = humantime::parse_duration)]
    period: Option<Duration>,
    /// What to do when a tick fails
    #[arg(long, value_enum)]
    on_error: Option<ErrorPolicy>,
    #[arg(long)]
    influx_url: Option<String>,
    #[arg(long)]
    database: Option<String>,
    #[arg(long)]
    username: Option<String>,
    #[arg(long)]
    password: Option<String>,
    /// Log every tick
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn apply(&self, config: &mut Config) {
        if let Some(xplane) = &self.xplane {
            config.xplane = xplane.clone();
        }
        if let Some(period) = self.period {
            config.tick_period = period;
        }
        if let Some(policy) = self.on_error {
            config.on_error = policy;
        }
        if let Some(url) = &self.influx_url {
            config.influx.url = url.clone();
        }
        if let Some(database) = &self.database {
            config.influx.database = database.clone();
        }
        if self.username.is_some() {
            config.influx.username = self.username.clone();
        }
        if self.password.is_some() {
            config.influx.password = self.password.clone();
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> FeedResult<()> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    cli.apply(&mut config);
    config.validate()?;

    let socket = transport::connect(config.bind_addr()?, config.xplane_addr()?).await?;
    let source = InfluxSource::new(config.influx.clone())?;
    info!("reading {} from {}", config.influx.database, config.influx.url);

    let mut feeder = Feeder::new(
        source,
        socket,
        cli.flight,
        cli.vehicle_id,
        config.tick_period,
        config.on_error,
    )?;
    feeder.run(shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("interrupt received, stopping"),
        Err(e) => {
            error!("cannot listen for interrupt: {}", e);
            std::future::pending::<()>().await
        }
    }
}
