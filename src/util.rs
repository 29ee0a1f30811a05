use std::net::{IpAddr, Ipv4Addr};

use sysinfo::Networks;
use tracing::{debug, info};

/// Read a non-empty environment variable
pub fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}

/// First non-loopback IPv4 address of this host
///
/// Interfaces are visited in name order so the choice is stable across calls.
pub fn get_my_ip() -> Option<Ipv4Addr> {
    let networks = Networks::new_with_refreshed_list();

    let mut interfaces: Vec<_> = networks.iter().collect();
    interfaces.sort_by(|(a, _), (b, _)| a.cmp(b));

    for (name, data) in interfaces {
        for network in data.ip_networks() {
            if let IpAddr::V4(addr) = network.addr
                && !addr.is_loopback()
            {
                info!("my IP address: {addr} ({name})");
                return Some(addr);
            }
        }
    }

    debug!("no non-loopback IPv4 address found");
    None
}

/// Completes when the process receives SIGINT, SIGTERM or SIGQUIT
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = sigint.recv()  => {},
        _ = sigterm.recv() => {},
        _ = sigquit.recv() => {},
    }
    Ok(())
}

#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
