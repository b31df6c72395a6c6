// Configuration validation
//
// Validates that required fields are present and values are sensible

use crate::*;
use tracing::warn;

pub fn validate_for_provisioning(config: &RuntimeConfig) -> Result<()> {
    validate_credentials(&config.cluster)?;
    validate_database(&config.cluster)?;
    validate_provision_settings(&config.provision)?;
    Ok(())
}

pub fn validate_for_loading(config: &RuntimeConfig) -> Result<()> {
    validate_database(&config.cluster)?;

    if config.cluster.cluster_endpoint.is_none() {
        return Err(ConfigError::Invalid(format!(
            "Cluster endpoint is not set in {}\n\n\
            How to fix:\n\
              • Run `sparkify-dwh check` until the cluster is available;\n\
                it writes HOST and ARN back into the config file\n\
              • Or set [{}] {}=<endpoint> by hand",
            config.path.display(),
            CLUSTER_SECTION,
            HOST_KEY
        )));
    }

    if config.cluster.role_arn.is_none() {
        warn!("No role ARN in config; COPY statements that reference {{{{ARN}}}} will fail to render");
    }

    Ok(())
}

fn validate_credentials(cluster: &ClusterConfig) -> Result<()> {
    if cluster.aws_key.is_empty() || cluster.aws_secret.is_empty() {
        return Err(ConfigError::Invalid(format!(
            "AWS credentials are required\n\n\
            How to fix:\n\
              • Config file: [{}] KEY=<access key id> and SECRET=<secret access key>\n\
              • Environment: export AWS_ACCESS_KEY_ID=... AWS_SECRET_ACCESS_KEY=...",
            AWS_SECTION
        )));
    }
    Ok(())
}

fn validate_database(cluster: &ClusterConfig) -> Result<()> {
    for (key, value) in [
        ("DB_NAME", &cluster.db_name),
        ("DB_USER", &cluster.db_user),
        ("DB_PASSWORD", &cluster.db_password),
    ] {
        if value.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "[{}] {} must not be empty",
                CLUSTER_SECTION, key
            )));
        }
    }

    if cluster.db_port == 0 {
        return Err(ConfigError::Invalid(format!(
            "[{}] DB_PORT must be greater than 0",
            CLUSTER_SECTION
        )));
    }

    Ok(())
}

fn validate_provision_settings(settings: &ProvisionSettings) -> Result<()> {
    for (name, value) in [
        ("REGION", &settings.region),
        ("ROLE_NAME", &settings.role_name),
        ("CLUSTER_IDENTIFIER", &settings.cluster_identifier),
        ("NODE_TYPE", &settings.node_type),
        ("SECURITY_GROUP_ID", &settings.security_group_id),
    ] {
        if value.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "{}{} must not be empty",
                ENV_PREFIX, name
            )));
        }
    }

    // multi-node clusters need at least two compute nodes
    if settings.node_count < 2 {
        return Err(ConfigError::Invalid(format!(
            "A multi-node cluster needs at least 2 nodes, got {}\n\n\
            How to fix:\n\
              • Environment: export {}NODE_COUNT=4",
            settings.node_count, ENV_PREFIX
        )));
    }

    if settings.node_count > 32 {
        warn!(
            node_count = settings.node_count,
            "node count is very large; check the account's node quota"
        );
    }

    Ok(())
}
