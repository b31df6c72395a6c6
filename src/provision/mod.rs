//! Identity and cluster provisioning plus config write-back.
//!
//! A [`Provisioner`] carries the provider clients and the fixed resource
//! shape explicitly; each operator mode (`create`, `check`, `clean`) is one
//! method on it.

mod aws;
mod cluster;
mod error;
mod identity;

pub use aws::load_sdk_config;
pub use cluster::{
    AwsClusterProvider, ClusterDescription, ClusterEndpoint, ClusterProvider, ClusterSpec,
    ClusterStatus,
};
pub use error::{ProvisionError, Result};
pub use identity::{redshift_trust_policy, AwsIdentityProvider, IdentityProvider, RoleSpec};

use sparkify_dwh_config::{ClusterConfig, ProvisionSettings, RuntimeConfig, SyncSummary};
use std::fmt;
use tracing::{error, info, warn};

/// Result of a create request that tolerates existing resources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    AlreadyExists,
    /// Request rejected; logged and not fatal
    Failed(String),
}

impl fmt::Display for CreateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CreateOutcome::Created => write!(f, "created"),
            CreateOutcome::AlreadyExists => write!(f, "already exists"),
            CreateOutcome::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Result of one teardown step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Removed,
    AlreadyAbsent,
    /// Deletion was requested earlier and has not finished
    InProgress,
    Failed(String),
}

impl StepOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, StepOutcome::Failed(_))
    }

    fn from_result(result: Result<()>) -> Self {
        match result {
            Ok(()) => StepOutcome::Removed,
            Err(e) if e.is_not_found() => StepOutcome::AlreadyAbsent,
            Err(e) => StepOutcome::Failed(e.to_string()),
        }
    }
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepOutcome::Removed => write!(f, "removed"),
            StepOutcome::AlreadyAbsent => write!(f, "already absent"),
            StepOutcome::InProgress => write!(f, "deletion in progress"),
            StepOutcome::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Outcome of `clean`, one entry per teardown step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownReport {
    pub cluster: StepOutcome,
    pub policy: StepOutcome,
    pub role: StepOutcome,
}

impl TeardownReport {
    pub fn steps(&self) -> [(&'static str, &StepOutcome); 3] {
        [
            ("cluster", &self.cluster),
            ("policy attachment", &self.policy),
            ("IAM role", &self.role),
        ]
    }

    pub fn has_failures(&self) -> bool {
        self.steps().iter().any(|(_, outcome)| outcome.is_failure())
    }
}

/// Outcome of `create`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateReport {
    pub role: CreateOutcome,
    pub role_arn: String,
    pub cluster: CreateOutcome,
}

/// Outcome of `check`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReport {
    pub status: ClusterStatus,
    /// Present only when the cluster was available and the config was rewritten
    pub synced: Option<SyncedOutputs>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncedOutputs {
    pub role_arn: String,
    pub endpoint: String,
    pub summary: SyncSummary,
}

/// Provider clients plus the fixed resource shape.
pub struct Provisioner {
    identity: Box<dyn IdentityProvider>,
    clusters: Box<dyn ClusterProvider>,
    settings: ProvisionSettings,
}

impl Provisioner {
    pub fn new(
        identity: Box<dyn IdentityProvider>,
        clusters: Box<dyn ClusterProvider>,
        settings: ProvisionSettings,
    ) -> Self {
        Self {
            identity,
            clusters,
            settings,
        }
    }

    pub fn settings(&self) -> &ProvisionSettings {
        &self.settings
    }

    // ---------------------------------------------------------------------
    // Identity
    // ---------------------------------------------------------------------

    /// Create the warehouse role; an existing role is logged and tolerated.
    pub async fn create_role(&self) -> Result<CreateOutcome> {
        let spec = RoleSpec::for_redshift(&self.settings.role_name);
        match self.identity.create_role(&spec).await {
            Ok(()) => {
                info!("Created IAM role {}", spec.name);
                Ok(CreateOutcome::Created)
            }
            Err(e) if e.is_conflict() => {
                warn!("{}; continuing", e);
                Ok(CreateOutcome::AlreadyExists)
            }
            Err(e) => Err(e),
        }
    }

    /// Attach the read-only S3 policy to the role.
    pub async fn attach_policy(&self) -> Result<()> {
        self.identity
            .attach_policy(&self.settings.role_name, &self.settings.policy_arn)
            .await?;
        info!(
            "Attached {} to {}",
            self.settings.policy_arn, self.settings.role_name
        );
        Ok(())
    }

    /// ARN of the role; `NotFound` if it does not exist.
    pub async fn resolve_arn(&self) -> Result<String> {
        self.identity.role_arn(&self.settings.role_name).await
    }

    /// Detach the policy, then delete the role.
    pub async fn teardown_identity(&self) -> (StepOutcome, StepOutcome) {
        let policy = StepOutcome::from_result(
            self.identity
                .detach_policy(&self.settings.role_name, &self.settings.policy_arn)
                .await,
        );
        let role = StepOutcome::from_result(
            self.identity.delete_role(&self.settings.role_name).await,
        );
        (policy, role)
    }

    // ---------------------------------------------------------------------
    // Cluster
    // ---------------------------------------------------------------------

    /// Request the fixed-shape cluster bound to `role_arn`.
    ///
    /// Failures are logged and reported in the outcome, never raised.
    pub async fn create_cluster(&self, config: &ClusterConfig, role_arn: &str) -> CreateOutcome {
        let spec = ClusterSpec {
            identifier: self.settings.cluster_identifier.clone(),
            node_type: self.settings.node_type.clone(),
            node_count: self.settings.node_count,
            db_name: config.db_name.clone(),
            master_user: config.db_user.clone(),
            master_password: config.db_password.clone(),
            iam_role_arn: role_arn.to_string(),
            security_group_id: self.settings.security_group_id.clone(),
        };

        match self.clusters.create_cluster(&spec).await {
            Ok(()) => {
                info!(
                    "Requested cluster {} ({} x {})",
                    spec.identifier, spec.node_count, spec.node_type
                );
                CreateOutcome::Created
            }
            Err(e) if e.is_conflict() => {
                warn!("{}", e);
                CreateOutcome::AlreadyExists
            }
            Err(e) => {
                error!("Cluster creation failed: {}", e);
                CreateOutcome::Failed(e.to_string())
            }
        }
    }

    async fn describe(&self) -> Result<Option<ClusterDescription>> {
        self.clusters
            .describe_cluster(&self.settings.cluster_identifier)
            .await
    }

    /// Current cluster status; prints the attribute summary table.
    pub async fn check_status(&self) -> Result<ClusterStatus> {
        match self.describe().await? {
            Some(description) => {
                print!("{}", description.summary_table());
                Ok(description.status())
            }
            None => {
                println!(
                    "Cluster {} does not exist",
                    self.settings.cluster_identifier
                );
                Ok(ClusterStatus::Absent)
            }
        }
    }

    /// Endpoint host of an available cluster.
    pub async fn resolve_endpoint(&self) -> Result<String> {
        let identifier = &self.settings.cluster_identifier;
        let description = self
            .describe()
            .await?
            .ok_or_else(|| ProvisionError::NotFound {
                resource: "cluster",
                name: identifier.clone(),
            })?;

        let status = description.status();
        if status != ClusterStatus::Available {
            return Err(ProvisionError::NotAvailable {
                identifier: identifier.clone(),
                status,
            });
        }

        description
            .endpoint
            .map(|e| e.address)
            .ok_or_else(|| ProvisionError::NotFound {
                resource: "cluster endpoint",
                name: identifier.clone(),
            })
    }

    /// Delete the cluster without a final snapshot.
    pub async fn teardown_cluster(&self) -> StepOutcome {
        match self.describe().await {
            Ok(None) => return StepOutcome::AlreadyAbsent,
            Ok(Some(d)) if d.status() == ClusterStatus::Deleting => {
                return StepOutcome::InProgress
            }
            Ok(Some(_)) => {}
            Err(e) => return StepOutcome::Failed(e.to_string()),
        }

        StepOutcome::from_result(
            self.clusters
                .delete_cluster(&self.settings.cluster_identifier)
                .await,
        )
    }

    // ---------------------------------------------------------------------
    // Operator modes
    // ---------------------------------------------------------------------

    /// `create`: role, policy, ARN, then the cluster bound to that ARN.
    pub async fn run_create(&self, config: &ClusterConfig) -> Result<CreateReport> {
        let role = self.create_role().await?;
        self.attach_policy().await?;
        let role_arn = self.resolve_arn().await?;
        info!("Resolved role ARN: {}", role_arn);

        let cluster = self.create_cluster(config, &role_arn).await;

        Ok(CreateReport {
            role,
            role_arn,
            cluster,
        })
    }

    /// `check`: report status and, once available, write ARN and endpoint back.
    pub async fn run_check(&self, config: &RuntimeConfig) -> Result<CheckReport> {
        let status = self.check_status().await?;
        info!("Cluster status: {}", status);

        if status != ClusterStatus::Available {
            return Ok(CheckReport {
                status,
                synced: None,
            });
        }

        let role_arn = self.resolve_arn().await?;
        let endpoint = self.resolve_endpoint().await?;
        let summary = config.write_back(&role_arn, &endpoint)?;
        info!(
            "Wrote ARN and HOST to {} ({} + {} lines)",
            config.path.display(),
            summary.arn_lines,
            summary.host_lines
        );

        Ok(CheckReport {
            status,
            synced: Some(SyncedOutputs {
                role_arn,
                endpoint,
                summary,
            }),
        })
    }

    /// `clean`: delete the cluster, detach the policy, delete the role.
    pub async fn run_clean(&self) -> TeardownReport {
        let cluster = self.teardown_cluster().await;
        let (policy, role) = self.teardown_identity().await;

        let report = TeardownReport {
            cluster,
            policy,
            role,
        };
        for (step, outcome) in report.steps() {
            if outcome.is_failure() {
                error!("Teardown of {} {}", step, outcome);
            } else {
                info!("Teardown of {}: {}", step, outcome);
            }
        }
        report
    }
}
