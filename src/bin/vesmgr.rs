use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, trace, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use vesmgr::{
    AppmgrClient, SupervisorActor,
    api::{ApiConfig, ApiState, spawn_api_server},
    config::{Config, read_config_file},
    util::{get_my_ip, wait_for_shutdown_signal},
};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Parser)]
#[command(version, about = "VES agent lifecycle supervisor")]
struct Args {
    /// Config file (JSON); defaults apply when omitted
    #[arg(short, long)]
    file: Option<String>,
}

fn init() {
    dotenv::dotenv().ok();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("vesmgr=debug,info"));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    let mut config = match &args.file {
        Some(file) => read_config_file(file)?,
        None => Config::default(),
    };
    config.apply_env_overrides();

    let host = match &config.notification.host {
        Some(host) => host.clone(),
        None => get_my_ip()
            .context("cannot determine the IPv4 address of this host")?
            .to_string(),
    };
    let callback_url = config.notification.target_url(&host);

    let manager = AppmgrClient::new(&config.appmgr);
    let (actor, supervisor) =
        SupervisorActor::new(manager, config.supervisor_settings(callback_url));

    // Listen before subscribing so no notification is missed
    spawn_api_server(
        ApiConfig::from(&config.notification),
        ApiState::new(supervisor.clone()),
    )
    .await
    .context("cannot start notification server")?;

    let mut run = tokio::spawn(actor.run());

    tokio::select! {
        result = &mut run => {
            let result = result.context("supervisor task failed")?;
            if let Err(e) = &result {
                error!("vesmgr exiting: {e}");
            }
            result?;
        }
        signal = wait_for_shutdown_signal() => {
            signal.context("cannot listen for shutdown signals")?;
            info!("shutdown signal received, stopping agent");

            match tokio::time::timeout(SHUTDOWN_TIMEOUT, supervisor.shutdown()).await {
                Ok(Ok(())) => info!("agent stopped"),
                Ok(Err(e)) => warn!("shutdown failed: {e:#}"),
                Err(_) => warn!("agent did not stop within {SHUTDOWN_TIMEOUT:?}"),
            }
        }
    }

    Ok(())
}
