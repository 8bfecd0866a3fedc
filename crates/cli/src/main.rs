mod bootstrap;
mod di;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use sentinel_dns_infrastructure::blocklist::compile_snapshot;
use sentinel_dns_jobs::RefreshSweepJob;
use tokio_util::sync::CancellationToken;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// An ad-blocking recursive/forwarding DNS resolver.
#[derive(Debug, Parser)]
#[command(name = "sentinel-dns", version)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "sentinel-dns.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = bootstrap::load_config(&args.config)?;
    bootstrap::init_logging(&config);

    let services = di::build(&config).await?;
    let shutdown = CancellationToken::new();

    let listener_tracker = sentinel_dns_infrastructure::spawn_listeners(
        &config.listen,
        services.pipeline.clone(),
        Duration::from_secs(config.read_timeout_s),
        shutdown.clone(),
    )
    .await?;
    tracing::info!(listeners = config.listen.len(), "listener set started");

    let sweep = Arc::new(
        RefreshSweepJob::new(
            services.pipeline.clone(),
            services.l0.clone(),
            services.hit_counter.clone(),
            sentinel_dns_application::SweepConfig {
                window_s: config.refresh.sweep_window_s,
                min_hits: config.refresh.sweep_min_hits,
                max_inflight: config.refresh.max_inflight,
            },
            Duration::from_secs(config.refresh.sweep_interval_s),
            Duration::from_secs(config.refresh.lock_ttl_s),
        )
        .with_cancellation(shutdown.clone()),
    );
    sweep.start();
    tracing::info!("refresh sweep job started");

    spawn_blocklist_reload(
        services.blocklist.clone(),
        config.blocklist.deny_sources.clone(),
        config.blocklist.allow_sources.clone(),
        Duration::from_secs(config.blocklist.reload_interval_s),
        shutdown.clone(),
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received, draining in-flight work");
    shutdown.cancel();
    listener_tracker.wait().await;
    tracing::info!("listener set drained, exiting");

    Ok(())
}

/// Periodically recompiles the blocklist from its configured file sources.
/// Fetching/refreshing the sources themselves lives with the external config
/// store collaborator (§6.1); this loop only owns swapping the result in.
fn spawn_blocklist_reload(
    engine: Arc<sentinel_dns_infrastructure::BlockFilterEngine>,
    deny_sources: Vec<String>,
    allow_sources: Vec<String>,
    interval: Duration,
    shutdown: CancellationToken,
) {
    if interval.is_zero() {
        return;
    }
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // first tick fires immediately; skip it, startup already compiled once
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let deny = deny_sources.clone();
                    let allow = allow_sources.clone();
                    match tokio::task::spawn_blocking(move || compile_snapshot(&deny, &allow)).await {
                        Ok(Ok(snapshot)) => {
                            tracing::info!(
                                domains = snapshot.domain_count,
                                "blocklist reloaded"
                            );
                            engine.reload(snapshot);
                        }
                        Ok(Err(e)) => tracing::warn!(error = %e, "blocklist reload failed, keeping previous snapshot"),
                        Err(e) => tracing::warn!(error = %e, "blocklist reload task panicked"),
                    }
                }
            }
        }
    });
}
