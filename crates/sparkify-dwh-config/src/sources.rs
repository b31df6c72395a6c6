// Configuration source loading.
//
// Priority order:
// 1. Environment variables (SPARKIFY_DWH_* prefix, plus AWS_* credentials)
// 2. Config file at the explicit path, SPARKIFY_DWH_CONFIG, or ./dwh.cfg
// 3. Built-in provisioning and logging defaults

use crate::env_overrides::{self, EnvSource};
use crate::*;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_CONFIG_PATH: &str = "dwh.cfg";

/// Pick the config file path: explicit flag, then SPARKIFY_DWH_CONFIG, then ./dwh.cfg.
pub fn resolve_config_path<E: EnvSource>(explicit: Option<&Path>, env: &E) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    env.get("CONFIG")
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Read the document at `path`.
pub(crate) fn read_document(path: &Path) -> Result<ConfigDocument> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(ConfigDocument::parse(&content))
}

pub(crate) fn load_config<E: EnvSource>(explicit: Option<&Path>, env: &E) -> Result<RuntimeConfig> {
    let path = resolve_config_path(explicit, env);
    debug!("Reading config file: {}", path.display());

    let doc = read_document(&path)?;
    let cluster = ClusterConfig::from_document(&doc)?;

    let mut config = RuntimeConfig {
        cluster,
        provision: ProvisionSettings::default(),
        log: LogConfig::default(),
        path,
    };

    env_overrides::apply_env_overrides(&mut config, env)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    struct MapEnv(HashMap<String, String>);

    impl EnvSource for MapEnv {
        fn get(&self, key: &str) -> Option<String> {
            self.0.get(&format!("{}{}", ENV_PREFIX, key)).cloned()
        }

        fn get_raw(&self, key: &str) -> Option<String> {
            self.0.get(key).cloned()
        }
    }

    #[test]
    fn test_resolve_config_path_priority() {
        let empty = MapEnv(HashMap::new());
        assert_eq!(
            resolve_config_path(None, &empty),
            PathBuf::from(DEFAULT_CONFIG_PATH)
        );

        let env = MapEnv(HashMap::from([(
            "SPARKIFY_DWH_CONFIG".to_string(),
            "/etc/dwh.cfg".to_string(),
        )]));
        assert_eq!(resolve_config_path(None, &env), PathBuf::from("/etc/dwh.cfg"));
        assert_eq!(
            resolve_config_path(Some(Path::new("local.cfg")), &env),
            PathBuf::from("local.cfg")
        );
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "[AWS]\nKEY=k\nSECRET=s\n[CLUSTER]\nHOST=h.example.com\nDB_NAME=dev\nDB_USER=u\nDB_PASSWORD=p\nDB_PORT=5440\nARN=arn:aws:iam::1:role/x\n"
        )
        .unwrap();

        let config = load_config(Some(file.path()), &MapEnv(HashMap::new())).unwrap();
        assert_eq!(config.cluster.db_port, 5440);
        assert_eq!(
            config.cluster.cluster_endpoint.as_deref(),
            Some("h.example.com")
        );
        assert_eq!(config.path, file.path());
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let err = load_config(
            Some(Path::new("/nonexistent/dwh.cfg")),
            &MapEnv(HashMap::new()),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
