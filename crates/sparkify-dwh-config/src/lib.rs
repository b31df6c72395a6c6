// sparkify-dwh-config - Config store shared by the provisioning and ETL binaries
//
// Settings are resolved from multiple sources:
// 1. Environment variables (highest priority)
// 2. The sectioned key=value config file (dwh.cfg by default, or SPARKIFY_DWH_CONFIG)
// 3. Built-in provisioning defaults (lowest priority)
//
// The config file is also the write-back target for the resolved role ARN and
// cluster endpoint, so it is kept as a line-preserving document rather than
// being deserialized and re-rendered.

use std::path::{Path, PathBuf};

mod document;
mod env_overrides;
mod error;
mod sources;
mod sync;
mod validation;

pub use document::ConfigDocument;
pub use env_overrides::{EnvSource, StdEnvSource, ENV_PREFIX};
pub use error::{ConfigError, Result};
pub use sources::{resolve_config_path, DEFAULT_CONFIG_PATH};
pub use sync::SyncSummary;

/// Section holding the AWS access key pair
pub const AWS_SECTION: &str = "AWS";
/// Section holding warehouse connection parameters and resolved outputs
pub const CLUSTER_SECTION: &str = "CLUSTER";
/// Legacy section some configs keep the role ARN in
pub const IAM_ROLE_SECTION: &str = "IAM_ROLE";
/// Optional section with object storage locations for COPY statements
pub const S3_SECTION: &str = "S3";

/// Key rewritten with the resolved IAM role ARN
pub const ARN_KEY: &str = "ARN";
/// Key rewritten with the resolved cluster endpoint
pub const HOST_KEY: &str = "HOST";

/// Default Redshift port when DB_PORT is absent
pub const DEFAULT_DB_PORT: u16 = 5439;

/// Values read from the config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterConfig {
    pub aws_key: String,
    pub aws_secret: String,
    pub db_name: String,
    pub db_user: String,
    pub db_password: String,
    pub db_port: u16,
    /// Unset until `check` sees the cluster available
    pub role_arn: Option<String>,
    /// Unset until `check` sees the cluster available
    pub cluster_endpoint: Option<String>,
    pub s3: S3Locations,
}

/// Object storage locations referenced by the COPY statements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct S3Locations {
    pub log_data: Option<String>,
    pub log_jsonpath: Option<String>,
    pub song_data: Option<String>,
}

impl ClusterConfig {
    /// Extract the cluster config from a parsed document.
    ///
    /// Missing credentials and database fields are reported as
    /// [`ConfigError::MissingKey`]; empty `ARN`/`HOST` values read as unresolved.
    pub fn from_document(doc: &ConfigDocument) -> Result<Self> {
        let required = |section: &str, key: &str| -> Result<String> {
            doc.get(section, key)
                .map(str::to_string)
                .ok_or_else(|| ConfigError::MissingKey {
                    section: section.to_string(),
                    key: key.to_string(),
                })
        };

        let db_port = match non_empty(doc.get(CLUSTER_SECTION, "DB_PORT")) {
            Some(port) => port.parse::<u16>().map_err(|e| ConfigError::InvalidValue {
                key: format!("{}.DB_PORT", CLUSTER_SECTION),
                message: format!("'{}' is not a valid port: {}", port, e),
            })?,
            None => DEFAULT_DB_PORT,
        };

        let role_arn = non_empty(doc.get(CLUSTER_SECTION, ARN_KEY))
            .or_else(|| non_empty(doc.get(IAM_ROLE_SECTION, ARN_KEY)));

        Ok(Self {
            aws_key: required(AWS_SECTION, "KEY")?,
            aws_secret: required(AWS_SECTION, "SECRET")?,
            db_name: required(CLUSTER_SECTION, "DB_NAME")?,
            db_user: required(CLUSTER_SECTION, "DB_USER")?,
            db_password: required(CLUSTER_SECTION, "DB_PASSWORD")?,
            db_port,
            role_arn,
            cluster_endpoint: non_empty(doc.get(CLUSTER_SECTION, HOST_KEY)),
            s3: S3Locations {
                log_data: s3_location(doc.get(S3_SECTION, "LOG_DATA")),
                log_jsonpath: s3_location(doc.get(S3_SECTION, "LOG_JSONPATH")),
                song_data: s3_location(doc.get(S3_SECTION, "SONG_DATA")),
            },
        })
    }
}

/// S3 locations are conventionally written quoted (`LOG_DATA='s3://...'`);
/// one layer of matching quotes is dropped so the catalog controls quoting.
fn s3_location(value: Option<&str>) -> Option<String> {
    non_empty(value.map(unquote))
}

fn unquote(value: &str) -> &str {
    for quote in ['\'', '"'] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}

/// Fixed shape of the provisioned resources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionSettings {
    pub region: String,
    pub role_name: String,
    pub cluster_identifier: String,
    pub node_type: String,
    pub node_count: u32,
    pub security_group_id: String,
    pub policy_arn: String,
}

impl Default for ProvisionSettings {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            role_name: "sparkify-role".to_string(),
            cluster_identifier: "sparkify-cluster".to_string(),
            node_type: "dc2.large".to_string(),
            node_count: 4,
            security_group_id: "sg-0b9d647cb7001e060".to_string(),
            policy_arn: "arn:aws:iam::aws:policy/AmazonS3ReadOnlyAccess".to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(ConfigError::InvalidValue {
                key: format!("{}LOG_FORMAT", ENV_PREFIX),
                message: format!("unsupported log format '{}'. Supported: text, json", s),
            }),
        }
    }
}

/// Fully resolved runtime configuration for one invocation.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub cluster: ClusterConfig,
    pub provision: ProvisionSettings,
    pub log: LogConfig,
    /// File the cluster config was read from (and is written back to)
    pub path: PathBuf,
}

impl RuntimeConfig {
    /// Load configuration from the file and the process environment.
    ///
    /// `path` overrides `SPARKIFY_DWH_CONFIG`, which overrides `./dwh.cfg`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        sources::load_config(path, &StdEnvSource)
    }

    /// Load configuration with a custom environment source (useful for testing).
    pub fn load_with_env<E: EnvSource>(path: Option<&Path>, env: &E) -> Result<Self> {
        sources::load_config(path, env)
    }

    /// Check the fields provisioning needs.
    pub fn validate_for_provisioning(&self) -> Result<()> {
        validation::validate_for_provisioning(self)
    }

    /// Check the fields the warehouse loader needs.
    pub fn validate_for_loading(&self) -> Result<()> {
        validation::validate_for_loading(self)
    }

    /// Rewrite the ARN and HOST entries of the backing file in place.
    pub fn write_back(&self, arn: &str, endpoint: &str) -> Result<SyncSummary> {
        sync::write_back(&self.path, arn, endpoint)
    }
}
