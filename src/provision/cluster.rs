//! Redshift cluster lifecycle: create, describe, delete.

use super::error::{ProvisionError, Result};
use async_trait::async_trait;
use aws_sdk_redshift::Client as RedshiftClient;
use std::fmt;
use tracing::debug;

/// Cluster lifecycle state reported by `check`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterStatus {
    Creating,
    Available,
    /// Transitional states: modifying, rebooting, resizing, renaming, ...
    Modifying,
    Paused,
    Deleting,
    /// Incompatible-*, hardware-failure, storage-full
    Failed,
    Absent,
}

impl ClusterStatus {
    pub const ALL: [ClusterStatus; 7] = [
        ClusterStatus::Creating,
        ClusterStatus::Available,
        ClusterStatus::Modifying,
        ClusterStatus::Paused,
        ClusterStatus::Deleting,
        ClusterStatus::Failed,
        ClusterStatus::Absent,
    ];

    /// Map a provider status string onto the fixed set.
    pub fn from_provider(status: &str) -> Self {
        match status {
            "creating" => ClusterStatus::Creating,
            "available" => ClusterStatus::Available,
            "paused" => ClusterStatus::Paused,
            "deleting" | "final-snapshot" => ClusterStatus::Deleting,
            "hardware-failure" | "storage-full" => ClusterStatus::Failed,
            s if s.starts_with("incompatible-") => ClusterStatus::Failed,
            _ => ClusterStatus::Modifying,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ClusterStatus::Creating => "creating",
            ClusterStatus::Available => "available",
            ClusterStatus::Modifying => "modifying",
            ClusterStatus::Paused => "paused",
            ClusterStatus::Deleting => "deleting",
            ClusterStatus::Failed => "failed",
            ClusterStatus::Absent => "absent",
        }
    }
}

impl fmt::Display for ClusterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request for a new multi-node cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterSpec {
    pub identifier: String,
    pub node_type: String,
    pub node_count: u32,
    pub db_name: String,
    pub master_user: String,
    pub master_password: String,
    pub iam_role_arn: String,
    pub security_group_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterEndpoint {
    pub address: String,
    pub port: Option<i32>,
}

/// Selected attributes of a described cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterDescription {
    pub identifier: String,
    pub node_type: Option<String>,
    /// Status string as reported by the provider
    pub provider_status: String,
    pub master_username: Option<String>,
    pub db_name: Option<String>,
    pub endpoint: Option<ClusterEndpoint>,
    pub number_of_nodes: Option<i32>,
    pub vpc_id: Option<String>,
}

impl ClusterDescription {
    pub fn status(&self) -> ClusterStatus {
        ClusterStatus::from_provider(&self.provider_status)
    }

    /// Key/value rows shown by `check`.
    pub fn summary_rows(&self) -> Vec<(&'static str, String)> {
        let opt = |v: &Option<String>| v.clone().unwrap_or_default();
        vec![
            ("ClusterIdentifier", self.identifier.clone()),
            ("NodeType", opt(&self.node_type)),
            ("ClusterStatus", self.provider_status.clone()),
            ("MasterUsername", opt(&self.master_username)),
            ("DBName", opt(&self.db_name)),
            (
                "Endpoint",
                self.endpoint
                    .as_ref()
                    .map(|e| match e.port {
                        Some(port) => format!("{}:{}", e.address, port),
                        None => e.address.clone(),
                    })
                    .unwrap_or_default(),
            ),
            (
                "NumberOfNodes",
                self.number_of_nodes
                    .map(|n| n.to_string())
                    .unwrap_or_default(),
            ),
            ("VpcId", opt(&self.vpc_id)),
        ]
    }

    /// Render the summary rows as a two-column table.
    pub fn summary_table(&self) -> String {
        let rows = self.summary_rows();
        let key_width = rows
            .iter()
            .map(|(k, _)| k.len())
            .max()
            .unwrap_or(0)
            .max("Key".len());
        let value_width = rows
            .iter()
            .map(|(_, v)| v.chars().count())
            .max()
            .unwrap_or(0)
            .max("Value".len());

        let rule = |left: &str, mid: &str, right: &str| {
            format!(
                "{}{}{}{}{}\n",
                left,
                "─".repeat(key_width + 2),
                mid,
                "─".repeat(value_width + 2),
                right
            )
        };

        let mut out = rule("╭", "┬", "╮");
        out.push_str(&format!(
            "│ {:<kw$} │ {:<vw$} │\n",
            "Key",
            "Value",
            kw = key_width,
            vw = value_width
        ));
        out.push_str(&rule("├", "┼", "┤"));
        for (key, value) in &rows {
            out.push_str(&format!(
                "│ {:<kw$} │ {:<vw$} │\n",
                key,
                value,
                kw = key_width,
                vw = value_width
            ));
        }
        out.push_str(&rule("╰", "┴", "╯"));
        out
    }
}

/// Cluster primitives of a cloud provider.
///
/// `describe_cluster` returns `Ok(None)` for a cluster that does not exist.
#[async_trait]
pub trait ClusterProvider: Send + Sync {
    async fn create_cluster(&self, spec: &ClusterSpec) -> Result<()>;
    async fn describe_cluster(&self, identifier: &str) -> Result<Option<ClusterDescription>>;
    async fn delete_cluster(&self, identifier: &str) -> Result<()>;
}

/// Redshift-backed cluster provider
pub struct AwsClusterProvider {
    client: RedshiftClient,
}

impl AwsClusterProvider {
    pub fn new(sdk_config: &aws_config::SdkConfig) -> Self {
        Self {
            client: RedshiftClient::new(sdk_config),
        }
    }
}

fn cluster_not_found(identifier: &str) -> ProvisionError {
    ProvisionError::NotFound {
        resource: "cluster",
        name: identifier.to_string(),
    }
}

#[async_trait]
impl ClusterProvider for AwsClusterProvider {
    async fn create_cluster(&self, spec: &ClusterSpec) -> Result<()> {
        let node_count = i32::try_from(spec.node_count).map_err(|e| ProvisionError::Provider {
            operation: "CreateCluster",
            message: format!("node count {} out of range: {}", spec.node_count, e),
        })?;

        debug!(cluster = %spec.identifier, node_type = %spec.node_type, node_count, "CreateCluster");
        match self
            .client
            .create_cluster()
            .cluster_type("multi-node")
            .node_type(&spec.node_type)
            .number_of_nodes(node_count)
            .db_name(&spec.db_name)
            .cluster_identifier(&spec.identifier)
            .master_username(&spec.master_user)
            .master_user_password(&spec.master_password)
            .iam_roles(&spec.iam_role_arn)
            .vpc_security_group_ids(&spec.security_group_id)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(err) => {
                let err = err.into_service_error();
                if err.is_cluster_already_exists_fault() {
                    Err(ProvisionError::Conflict {
                        resource: "cluster",
                        name: spec.identifier.clone(),
                    })
                } else {
                    Err(ProvisionError::provider("CreateCluster", err))
                }
            }
        }
    }

    async fn describe_cluster(&self, identifier: &str) -> Result<Option<ClusterDescription>> {
        let output = match self
            .client
            .describe_clusters()
            .cluster_identifier(identifier)
            .send()
            .await
        {
            Ok(output) => output,
            Err(err) => {
                let err = err.into_service_error();
                if err.is_cluster_not_found_fault() {
                    return Ok(None);
                }
                return Err(ProvisionError::provider("DescribeClusters", err));
            }
        };

        Ok(output.clusters().first().map(|cluster| ClusterDescription {
            identifier: cluster
                .cluster_identifier()
                .unwrap_or(identifier)
                .to_string(),
            node_type: cluster.node_type().map(str::to_string),
            provider_status: cluster.cluster_status().unwrap_or_default().to_string(),
            master_username: cluster.master_username().map(str::to_string),
            db_name: cluster.db_name().map(str::to_string),
            endpoint: cluster.endpoint().and_then(|e| {
                e.address().map(|address| ClusterEndpoint {
                    address: address.to_string(),
                    port: e.port(),
                })
            }),
            number_of_nodes: cluster.number_of_nodes(),
            vpc_id: cluster.vpc_id().map(str::to_string),
        }))
    }

    async fn delete_cluster(&self, identifier: &str) -> Result<()> {
        debug!(cluster = %identifier, "DeleteCluster");
        match self
            .client
            .delete_cluster()
            .cluster_identifier(identifier)
            .skip_final_cluster_snapshot(true)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(err) => {
                let err = err.into_service_error();
                if err.is_cluster_not_found_fault() {
                    Err(cluster_not_found(identifier))
                } else {
                    Err(ProvisionError::provider("DeleteCluster", err))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn description(status: &str) -> ClusterDescription {
        ClusterDescription {
            identifier: "sparkify-cluster".to_string(),
            node_type: Some("dc2.large".to_string()),
            provider_status: status.to_string(),
            master_username: Some("awsuser".to_string()),
            db_name: Some("dev".to_string()),
            endpoint: Some(ClusterEndpoint {
                address: "sparkify-cluster.abc.us-east-1.redshift.amazonaws.com".to_string(),
                port: Some(5439),
            }),
            number_of_nodes: Some(4),
            vpc_id: None,
        }
    }

    #[test]
    fn test_status_mapping_is_closed() {
        for raw in [
            "creating",
            "available",
            "modifying",
            "rebooting",
            "resizing",
            "paused",
            "deleting",
            "final-snapshot",
            "hardware-failure",
            "incompatible-network",
            "something-new",
        ] {
            let status = ClusterStatus::from_provider(raw);
            assert!(ClusterStatus::ALL.contains(&status), "{raw}");
        }
        assert_eq!(ClusterStatus::from_provider("available"), ClusterStatus::Available);
        assert_eq!(ClusterStatus::from_provider("rebooting"), ClusterStatus::Modifying);
        assert_eq!(
            ClusterStatus::from_provider("incompatible-hsm"),
            ClusterStatus::Failed
        );
    }

    #[test]
    fn test_status_as_str_round_trips_for_core_states() {
        for status in [
            ClusterStatus::Creating,
            ClusterStatus::Available,
            ClusterStatus::Paused,
            ClusterStatus::Deleting,
        ] {
            assert_eq!(ClusterStatus::from_provider(status.as_str()), status);
        }
    }

    #[test]
    fn test_summary_rows_order() {
        let keys: Vec<&str> = description("available")
            .summary_rows()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(
            keys,
            vec![
                "ClusterIdentifier",
                "NodeType",
                "ClusterStatus",
                "MasterUsername",
                "DBName",
                "Endpoint",
                "NumberOfNodes",
                "VpcId"
            ]
        );
    }

    #[test]
    fn test_summary_table_contains_values() {
        let table = description("creating").summary_table();
        assert!(table.contains("ClusterStatus"));
        assert!(table.contains("creating"));
        assert!(table.contains("sparkify-cluster.abc.us-east-1.redshift.amazonaws.com:5439"));
        // header, rule, 8 rows, plus top and bottom borders
        assert_eq!(table.lines().count(), 12);
    }
}
