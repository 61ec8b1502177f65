// SPDX-License-Identifier: AGPL-3.0-or-later

mod arg;

use std::sync::Arc;

use bgp_core::config::ServerConfig;
use bgp_core::rde::{NullRde, RealTcpConnector};
use bgp_core::registry::PeerRegistry;
use bgp_core::session::Session;
use bgp_core::Listener;
use clap::Parser;

fn setup_logger(verbose: bool) {
    let level = if verbose {
        simplelog::LevelFilter::Debug
    } else {
        simplelog::LevelFilter::Info
    };
    let config = simplelog::ConfigBuilder::new().set_time_format_rfc3339().build();
    simplelog::TermLogger::init(
        level,
        config,
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )
    .expect("failed to initialize logger");
}

fn load_config(path: &std::path::Path) -> ServerConfig {
    let raw = std::fs::read_to_string(path)
        .unwrap_or_else(|err| panic!("failed to read {}: {err}", path.display()));
    serde_yaml::from_str(&raw).unwrap_or_else(|err| panic!("failed to parse {}: {err}", path.display()))
}

#[tokio::main]
async fn main() {
    let args = arg::Bgpd::parse();
    setup_logger(args.verbose);

    let server = load_config(&args.config);
    log::info!(
        "starting bgpd: asn={} bgp_id={} peers={}",
        server.asn,
        server.bgp_id,
        server.peers.len()
    );

    let rde = Arc::new(NullRde);
    let connector = Arc::new(RealTcpConnector);
    let sessions = PeerRegistry::new();
    let listeners = PeerRegistry::new();

    let listener = Listener::new(server.clone(), Arc::clone(&rde), sessions.clone(), listeners.clone());
    let listener_task = tokio::spawn(async move {
        if let Err(err) = listener.run().await {
            log::error!("listener exited: {err}");
        }
    });

    let mut session_tasks = Vec::new();
    for peer in server.peers {
        let session = Session::new(
            server.asn,
            server.bgp_id,
            peer,
            Arc::clone(&connector),
            Arc::clone(&rde),
            sessions.clone(),
            listeners.clone(),
        );
        session_tasks.push(tokio::spawn(session.run()));
    }

    let _ = listener_task.await;
    for task in session_tasks {
        let _ = task.await;
    }
}
