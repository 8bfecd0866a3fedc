use sentinel_dns_domain::Config;
use tracing::info;

pub fn load_config(config_path: &str) -> anyhow::Result<Config> {
    let raw = std::fs::read_to_string(config_path)
        .map_err(|e| anyhow::anyhow!("reading config file {config_path}: {e}"))?;
    let config = Config::from_str(&raw)?;
    config.validate()?;

    info!(
        config_file = config_path,
        listeners = config.listen.len(),
        upstreams = config.upstreams.servers.len(),
        instance_id = %config.instance_id,
        "configuration loaded"
    );

    Ok(config)
}
