use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use weheat_poller::api::WeheatClient;
use weheat_poller::config::Config;
use weheat_poller::host::InMemoryHost;
use weheat_poller::identity::KeycloakProvider;
use weheat_poller::scheduler::THROTTLE_FACTOR;
use weheat_poller::WeheatPlugin;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let cfg_path =
        std::env::var("APP_CONFIG").unwrap_or_else(|_| "config/config.example.yaml".into());
    let cfg = Config::load(&cfg_path)?;

    let default_level = if cfg.host.debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    info!(
        heartbeat_secs = cfg.host.heartbeat_secs,
        poll_secs = cfg.host.heartbeat_secs * u64::from(THROTTLE_FACTOR),
        "loaded config from {}",
        cfg_path
    );
    if cfg.host.debug {
        debug!(config = ?cfg, "configuration");
    }

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;
    let provider = Arc::new(KeycloakProvider::new(http.clone(), &cfg.weheat));
    let api = Arc::new(WeheatClient::new(http, &cfg.weheat.api_url));

    let mut plugin = WeheatPlugin::new(&cfg.weheat, provider, api, InMemoryHost::new());
    plugin.on_start(chrono::Utc::now()).await;
    if cfg.host.debug {
        plugin.host().dump_to_log();
    }

    let mut heartbeat = tokio::time::interval(Duration::from_secs(cfg.host.heartbeat_secs));
    heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let sig = tokio::signal::ctrl_c();
    tokio::pin!(sig);
    loop {
        tokio::select! {
            biased;
            _ = &mut sig => {
                info!("shutdown requested");
                break;
            }
            _ = heartbeat.tick() => {
                let outcome = plugin.on_heartbeat(chrono::Utc::now()).await;
                debug!(?outcome, "heartbeat done");
            }
        }
    }

    plugin.on_stop().await;
    Ok(())
}
