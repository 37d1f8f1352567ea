//! Client-side configuration. Follows the teacher's `config.rs` shape
//! (serde + toml, falling back to `Default` with a logged warning on a
//! missing or malformed file) generalized to what `MountContext` needs,
//! plus the `LIBGKFS_*` environment variable overrides named in spec.md §6.

use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::warn;

/// The client's view of deployment topology. `mountdir`/`hosts_file` mirror
/// the `LIBGKFS_MOUNTDIR`/`LIBGKFS_HOSTS_FILE` env vars from spec.md §6;
/// values found in the environment always win over `config.toml`.
#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    pub mountdir: String,
    pub hosts_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mountdir: "/tmp/gkfs_mnt".to_string(),
            hosts_file: "/tmp/gkfs_hosts.txt".to_string(),
        }
    }
}

pub fn load_config() -> Config {
    let mut config = load_from_file();
    apply_env_overrides(&mut config);
    config
}

fn load_from_file() -> Config {
    let path = Path::new("config.toml");
    if !path.exists() {
        warn!("config.toml not found, using default configuration");
        return Config::default();
    }

    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "could not read config.toml, using default configuration");
            return Config::default();
        }
    };

    match toml::from_str(&content) {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %e, "could not parse config.toml, using default configuration");
            Config::default()
        }
    }
}

fn apply_env_overrides(config: &mut Config) {
    if let Ok(v) = std::env::var("LIBGKFS_MOUNTDIR") {
        config.mountdir = v;
    }
    if let Ok(v) = std::env::var("LIBGKFS_HOSTS_FILE") {
        config.hosts_file = v;
    }
}
