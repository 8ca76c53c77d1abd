//! Configuration loading

use std::path::Path;

use anyhow::Result;
use quarry_common::config::Config;

use crate::cli::Options;

/// Load configuration from file, falling back to defaults
pub async fn load(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) if path.exists() => Config::load(path).await.map_err(|e| anyhow::anyhow!(e)),
        Some(path) => anyhow::bail!("config file {} does not exist", path.display()),
        None => Ok(Config::default()),
    }
}

/// Apply command line flags on top of the file configuration
pub fn apply(config: &mut Config, options: &Options) {
    if let Some(zk) = &options.zk {
        config.cluster.connect.clone_from(zk);
        config.cluster.endpoints.clear();
    }
    if let Some(bits) = options.bits {
        config.local.bits = bits;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use quarry_client::StaticDiscovery;

    #[tokio::test]
    async fn test_missing_path_uses_defaults() {
        let config = load(None).await.unwrap();
        assert_eq!(config.local.bits, 1);
    }

    #[tokio::test]
    async fn test_nonexistent_file_is_an_error() {
        assert!(load(Some(Path::new("/definitely/not/here.toml"))).await.is_err());
    }

    #[tokio::test]
    async fn test_flags_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quarry.toml");
        std::fs::write(&path, "[local]\nbits = 4\nbatch_size = 16\n").unwrap();

        let mut config = load(Some(&path)).await.unwrap();
        let options =
            Options::try_parse_from(["submit_plan", "-f", "p", "-t", "sql", "--local", "--bits", "2"]).unwrap();
        apply(&mut config, &options);

        assert_eq!(config.local.bits, 2);
        assert_eq!(config.local.batch_size, 16);
        assert_eq!(config.cluster.connect, "localhost:2181");
    }

    #[tokio::test]
    async fn test_connect_flag_overrides_file_endpoints() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quarry.toml");
        std::fs::write(&path, "[cluster]\nendpoints = [\"10.0.0.1:31010\"]\n").unwrap();

        let mut config = load(Some(&path)).await.unwrap();
        let options =
            Options::try_parse_from(["submit_plan", "-f", "p", "-t", "sql", "--zk", "127.0.0.1:4000"]).unwrap();
        apply(&mut config, &options);

        let discovery = StaticDiscovery::from_config(&config.cluster).unwrap();
        assert_eq!(discovery.raw_endpoints().to_vec(), vec!["127.0.0.1:4000".to_string()]);
    }

    #[tokio::test]
    async fn test_file_endpoints_kept_without_connect_flag() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quarry.toml");
        std::fs::write(&path, "[cluster]\nendpoints = [\"10.0.0.1:31010\"]\n").unwrap();

        let mut config = load(Some(&path)).await.unwrap();
        let options = Options::try_parse_from(["submit_plan", "-f", "p", "-t", "sql"]).unwrap();
        apply(&mut config, &options);

        let discovery = StaticDiscovery::from_config(&config.cluster).unwrap();
        assert_eq!(discovery.raw_endpoints().to_vec(), vec!["10.0.0.1:31010".to_string()]);
    }
}
