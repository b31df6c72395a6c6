//! IAM role provisioning: the role Redshift assumes to read from S3.

use super::error::{ProvisionError, Result};
use async_trait::async_trait;
use aws_sdk_iam::Client as IamClient;
use serde_json::json;
use tracing::debug;

/// What to create for the warehouse role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleSpec {
    pub name: String,
    pub description: String,
    pub trust_policy: String,
}

impl RoleSpec {
    /// Role assumable by the Redshift service principal
    pub fn for_redshift(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: "IAM role allowing the Sparkify Redshift cluster to read from S3"
                .to_string(),
            trust_policy: redshift_trust_policy(),
        }
    }
}

/// Trust policy permitting `redshift.amazonaws.com` to assume the role.
pub fn redshift_trust_policy() -> String {
    json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Action": "sts:AssumeRole",
            "Effect": "Allow",
            "Principal": { "Service": "redshift.amazonaws.com" }
        }]
    })
    .to_string()
}

/// Identity-role primitives of a cloud provider.
///
/// Implementations report an existing role as [`ProvisionError::Conflict`]
/// and a missing role or attachment as [`ProvisionError::NotFound`].
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn create_role(&self, spec: &RoleSpec) -> Result<()>;
    async fn attach_policy(&self, role_name: &str, policy_arn: &str) -> Result<()>;
    async fn role_arn(&self, role_name: &str) -> Result<String>;
    async fn detach_policy(&self, role_name: &str, policy_arn: &str) -> Result<()>;
    async fn delete_role(&self, role_name: &str) -> Result<()>;
}

/// IAM-backed identity provider
pub struct AwsIdentityProvider {
    client: IamClient,
}

impl AwsIdentityProvider {
    pub fn new(sdk_config: &aws_config::SdkConfig) -> Self {
        Self {
            client: IamClient::new(sdk_config),
        }
    }
}

fn role_not_found(role_name: &str) -> ProvisionError {
    ProvisionError::NotFound {
        resource: "IAM role",
        name: role_name.to_string(),
    }
}

#[async_trait]
impl IdentityProvider for AwsIdentityProvider {
    async fn create_role(&self, spec: &RoleSpec) -> Result<()> {
        debug!(role = %spec.name, "CreateRole");
        match self
            .client
            .create_role()
            .path("/")
            .role_name(&spec.name)
            .description(&spec.description)
            .assume_role_policy_document(&spec.trust_policy)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(err) => {
                let err = err.into_service_error();
                if err.is_entity_already_exists_exception() {
                    Err(ProvisionError::Conflict {
                        resource: "IAM role",
                        name: spec.name.clone(),
                    })
                } else {
                    Err(ProvisionError::provider("CreateRole", err))
                }
            }
        }
    }

    async fn attach_policy(&self, role_name: &str, policy_arn: &str) -> Result<()> {
        debug!(role = %role_name, policy = %policy_arn, "AttachRolePolicy");
        match self
            .client
            .attach_role_policy()
            .role_name(role_name)
            .policy_arn(policy_arn)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(err) => {
                let err = err.into_service_error();
                if err.is_no_such_entity_exception() {
                    Err(role_not_found(role_name))
                } else {
                    Err(ProvisionError::provider("AttachRolePolicy", err))
                }
            }
        }
    }

    async fn role_arn(&self, role_name: &str) -> Result<String> {
        match self.client.get_role().role_name(role_name).send().await {
            Ok(output) => output
                .role()
                .map(|role| role.arn().to_string())
                .ok_or_else(|| role_not_found(role_name)),
            Err(err) => {
                let err = err.into_service_error();
                if err.is_no_such_entity_exception() {
                    Err(role_not_found(role_name))
                } else {
                    Err(ProvisionError::provider("GetRole", err))
                }
            }
        }
    }

    async fn detach_policy(&self, role_name: &str, policy_arn: &str) -> Result<()> {
        debug!(role = %role_name, policy = %policy_arn, "DetachRolePolicy");
        match self
            .client
            .detach_role_policy()
            .role_name(role_name)
            .policy_arn(policy_arn)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(err) => {
                let err = err.into_service_error();
                if err.is_no_such_entity_exception() {
                    Err(ProvisionError::NotFound {
                        resource: "policy attachment",
                        name: format!("{} on {}", policy_arn, role_name),
                    })
                } else {
                    Err(ProvisionError::provider("DetachRolePolicy", err))
                }
            }
        }
    }

    async fn delete_role(&self, role_name: &str) -> Result<()> {
        debug!(role = %role_name, "DeleteRole");
        match self.client.delete_role().role_name(role_name).send().await {
            Ok(_) => Ok(()),
            Err(err) => {
                let err = err.into_service_error();
                if err.is_no_such_entity_exception() {
                    Err(role_not_found(role_name))
                } else {
                    Err(ProvisionError::provider("DeleteRole", err))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trust_policy_allows_redshift() {
        let policy: serde_json::Value = serde_json::from_str(&redshift_trust_policy()).unwrap();
        assert_eq!(policy["Version"], "2012-10-17");
        let statement = &policy["Statement"][0];
        assert_eq!(statement["Action"], "sts:AssumeRole");
        assert_eq!(statement["Effect"], "Allow");
        assert_eq!(statement["Principal"]["Service"], "redshift.amazonaws.com");
    }

    #[test]
    fn test_role_spec_for_redshift() {
        let spec = RoleSpec::for_redshift("sparkify-role");
        assert_eq!(spec.name, "sparkify-role");
        assert_eq!(spec.trust_policy, redshift_trust_policy());
    }
}
