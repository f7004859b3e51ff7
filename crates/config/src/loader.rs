use std::path::{Path, PathBuf};

use {
    secrecy::SecretString,
    tracing::{debug, warn},
};

use crate::schema::SubgateConfig;

/// Config file name, looked up project-local first, then user-global.
const CONFIG_FILENAME: &str = "subgate.toml";

/// Load configuration for the process.
///
/// Order: `subgate.toml` (if discovered), then `SUBGATE_*` environment
/// variables on top of it. Fails when a required value is still missing
/// afterwards.
pub fn load() -> anyhow::Result<SubgateConfig> {
    let mut config = match find_config_file() {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            load_file(&path)?
        },
        None => {
            debug!("no config file found, starting from defaults");
            SubgateConfig::default()
        },
    };

    apply_env_overrides(&mut config);
    normalize(&mut config);
    validate(&config)?;
    Ok(config)
}

/// Load and parse a specific config file, without env overrides.
pub fn load_file(path: &Path) -> anyhow::Result<SubgateConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    Ok(toml::from_str(&raw)?)
}

/// Find `subgate.toml` in the working directory or `~/.config/subgate/`.
fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILENAME);
    if local.exists() {
        return Some(local);
    }

    if let Some(dirs) = directories::BaseDirs::new() {
        let global = dirs.home_dir().join(".config").join("subgate").join(CONFIG_FILENAME);
        if global.exists() {
            return Some(global);
        }
    }

    None
}

/// Override individual fields from `SUBGATE_*` environment variables.
pub fn apply_env_overrides(config: &mut SubgateConfig) {
    if let Ok(v) = std::env::var("SUBGATE_BOT_TOKEN") {
        config.telegram.token = Some(SecretString::new(v));
    }
    if let Ok(v) = std::env::var("SUBGATE_WEB_APP_URL") {
        config.telegram.web_app_url = non_empty(v);
    }
    if let Ok(v) = std::env::var("SUBGATE_PANEL_URL") {
        config.panel.url = v;
    }
    if let Ok(v) = std::env::var("SUBGATE_PANEL_USERNAME") {
        config.panel.username = v;
    }
    if let Ok(v) = std::env::var("SUBGATE_PANEL_PASSWORD") {
        config.panel.password = SecretString::new(v);
    }
    if let Ok(v) = std::env::var("SUBGATE_PROTOCOL") {
        config.panel.protocol = v;
    }
    if let Ok(v) = std::env::var("SUBGATE_QUOTA_GB") {
        match v.parse() {
            Ok(n) => config.panel.quota_gb = n,
            Err(_) => warn!(value = %v, "SUBGATE_QUOTA_GB is not a number, ignoring"),
        }
    }
    if let Ok(v) = std::env::var("SUBGATE_INBOUND_ID") {
        match v.parse() {
            Ok(n) => config.panel.inbound_id = Some(n),
            Err(_) => warn!(value = %v, "SUBGATE_INBOUND_ID is not a number, ignoring"),
        }
    }
    if let Ok(v) = std::env::var("SUBGATE_SUBSCRIPTION_HOST") {
        config.panel.subscription_host = non_empty(v);
    }
    if let Ok(v) = std::env::var("SUBGATE_SUBSCRIPTION_PORT") {
        match v.parse() {
            Ok(n) => config.panel.subscription_port = Some(n),
            Err(_) => warn!(value = %v, "SUBGATE_SUBSCRIPTION_PORT is not a port, ignoring"),
        }
    }
    if let Ok(v) = std::env::var("SUBGATE_VERIFY_TLS") {
        config.panel.verify_tls = matches!(v.as_str(), "1" | "true" | "yes");
    }
}

fn non_empty(v: String) -> Option<String> {
    if v.is_empty() { None } else { Some(v) }
}

fn normalize(config: &mut SubgateConfig) {
    while config.panel.url.ends_with('/') {
        config.panel.url.pop();
    }
}

fn validate(config: &SubgateConfig) -> anyhow::Result<()> {
    if config.telegram.token.is_none() {
        anyhow::bail!("telegram.token (SUBGATE_BOT_TOKEN) is required");
    }
    if config.panel.url.is_empty() {
        anyhow::bail!("panel.url (SUBGATE_PANEL_URL) is required");
    }
    Ok(())
}
