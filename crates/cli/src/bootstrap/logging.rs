use sentinel_dns_domain::Config;
use tracing_subscriber::EnvFilter;

pub fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    if config.logging.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    tracing::info!(level = %config.logging.level, json = config.logging.json, "logging initialized");
}
