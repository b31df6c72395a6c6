use crate::{ConfigError, LogFormat, Result, RuntimeConfig};

pub const ENV_PREFIX: &str = "SPARKIFY_DWH_";

/// Abstraction over environment-variable lookups so tests can supply their
/// own source of overrides.
pub trait EnvSource {
    fn get(&self, key: &str) -> Option<String>;

    /// Get an environment variable WITHOUT the SPARKIFY_DWH_ prefix
    /// Used for AWS standard variables (AWS_ACCESS_KEY_ID, etc.)
    fn get_raw(&self, key: &str) -> Option<String>;
}

/// Reads overrides from the process environment.
pub struct StdEnvSource;

impl EnvSource for StdEnvSource {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(format!("{}{}", ENV_PREFIX, key)).ok()
    }

    fn get_raw(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Apply environment-variable overrides (highest priority) to the runtime config.
pub fn apply_env_overrides<E: EnvSource>(config: &mut RuntimeConfig, env: &E) -> Result<()> {
    // Provisioning shape
    if let Some(region) = get_env_string(env, "REGION") {
        config.provision.region = region;
    }
    if let Some(name) = get_env_string(env, "ROLE_NAME") {
        config.provision.role_name = name;
    }
    if let Some(id) = get_env_string(env, "CLUSTER_IDENTIFIER") {
        config.provision.cluster_identifier = id;
    }
    if let Some(node_type) = get_env_string(env, "NODE_TYPE") {
        config.provision.node_type = node_type;
    }
    if let Some(count) = get_env_u32(env, "NODE_COUNT")? {
        config.provision.node_count = count;
    }
    if let Some(group) = get_env_string(env, "SECURITY_GROUP_ID") {
        config.provision.security_group_id = group;
    }

    // Logging
    if let Some(level) = get_env_string(env, "LOG_LEVEL") {
        config.log.level = level;
    }
    if let Some(format) = get_env_string(env, "LOG_FORMAT") {
        config.log.format = format.parse::<LogFormat>()?;
    }

    // AWS standard credentials (without SPARKIFY_DWH_ prefix for compatibility)
    if let Some(key) = env.get_raw("AWS_ACCESS_KEY_ID") {
        config.cluster.aws_key = key;
    }
    if let Some(secret) = env.get_raw("AWS_SECRET_ACCESS_KEY") {
        config.cluster.aws_secret = secret;
    }

    Ok(())
}

fn get_env_string<E: EnvSource>(env: &E, key: &str) -> Option<String> {
    env.get(key).filter(|v| !v.is_empty())
}

fn get_env_u32<E: EnvSource>(env: &E, key: &str) -> Result<Option<u32>> {
    match get_env_string(env, key) {
        Some(val) => {
            let parsed = val.parse::<u32>().map_err(|e| ConfigError::InvalidValue {
                key: format!("{}{}", ENV_PREFIX, key),
                message: e.to_string(),
            })?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ClusterConfig, LogConfig, ProvisionSettings, S3Locations};
    use std::collections::HashMap;
    use std::path::PathBuf;

    struct MapEnv(HashMap<&'static str, &'static str>);

    impl EnvSource for MapEnv {
        fn get(&self, key: &str) -> Option<String> {
            self.get_raw(&format!("{}{}", ENV_PREFIX, key))
        }

        fn get_raw(&self, key: &str) -> Option<String> {
            self.0.get(key).map(|v| v.to_string())
        }
    }

    fn base_config() -> RuntimeConfig {
        RuntimeConfig {
            cluster: ClusterConfig {
                aws_key: "file-key".to_string(),
                aws_secret: "file-secret".to_string(),
                db_name: "dev".to_string(),
                db_user: "awsuser".to_string(),
                db_password: "pw".to_string(),
                db_port: 5439,
                role_arn: None,
                cluster_endpoint: None,
                s3: S3Locations::default(),
            },
            provision: ProvisionSettings::default(),
            log: LogConfig::default(),
            path: PathBuf::from("dwh.cfg"),
        }
    }

    #[test]
    fn test_overrides_applied() {
        let env = MapEnv(HashMap::from([
            ("SPARKIFY_DWH_REGION", "us-west-2"),
            ("SPARKIFY_DWH_NODE_COUNT", "2"),
            ("SPARKIFY_DWH_LOG_FORMAT", "json"),
            ("AWS_ACCESS_KEY_ID", "env-key"),
        ]));
        let mut config = base_config();
        apply_env_overrides(&mut config, &env).unwrap();

        assert_eq!(config.provision.region, "us-west-2");
        assert_eq!(config.provision.node_count, 2);
        assert_eq!(config.log.format, LogFormat::Json);
        assert_eq!(config.cluster.aws_key, "env-key");
        assert_eq!(config.cluster.aws_secret, "file-secret");
    }

    #[test]
    fn test_invalid_node_count() {
        let env = MapEnv(HashMap::from([("SPARKIFY_DWH_NODE_COUNT", "four")]));
        let mut config = base_config();
        let err = apply_env_overrides(&mut config, &env).unwrap_err();
        assert!(err.to_string().contains("SPARKIFY_DWH_NODE_COUNT"));
    }
}
