//! AWS SDK configuration built from the config store credentials.

use super::{AwsClusterProvider, AwsIdentityProvider, Provisioner};
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::Credentials;
use sparkify_dwh_config::RuntimeConfig;
use tracing::info;

/// Load an SDK config using the access key pair from the config file.
pub async fn load_sdk_config(config: &RuntimeConfig) -> SdkConfig {
    let credentials = Credentials::new(
        config.cluster.aws_key.clone(),
        config.cluster.aws_secret.clone(),
        None,
        None,
        "sparkify-dwh-config",
    );

    aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(config.provision.region.clone()))
        .credentials_provider(credentials)
        .load()
        .await
}

impl Provisioner {
    /// Provisioner backed by IAM and Redshift clients.
    pub async fn aws(config: &RuntimeConfig) -> Self {
        info!("Using AWS region: {}", config.provision.region);
        let sdk_config = load_sdk_config(config).await;
        Self::new(
            Box::new(AwsIdentityProvider::new(&sdk_config)),
            Box::new(AwsClusterProvider::new(&sdk_config)),
            config.provision.clone(),
        )
    }
}
