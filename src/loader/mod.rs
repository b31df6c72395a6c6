//! Warehouse loader: COPY into staging tables, then INSERT into the star schema.
//!
//! Every statement is committed on its own, so a failure part-way through a
//! stage leaves the statements before it committed and skips the rest.

mod catalog;
mod error;
mod redshift;

pub use catalog::{template_vars, Catalog, Statement, DEFAULT_CATALOG};
pub use error::{CatalogError, LoadError, Result};
pub use redshift::{ConnectionSettings, RedshiftWarehouse, SqlSession};

use async_trait::async_trait;
use std::fmt;
use tracing::{debug, info};

/// Connect/execute/commit contract of the warehouse.
#[async_trait]
pub trait Warehouse: Send {
    async fn execute(&mut self, sql: &str) -> std::result::Result<(), sqlx::Error>;
    async fn commit(&mut self) -> std::result::Result<(), sqlx::Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Drop,
    Create,
    Staging,
    Transform,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Drop => write!(f, "drop"),
            Stage::Create => write!(f, "create"),
            Stage::Staging => write!(f, "staging"),
            Stage::Transform => write!(f, "transform"),
        }
    }
}

/// Statements executed (and committed) per stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub dropped: usize,
    pub created: usize,
    pub staged: usize,
    pub transformed: usize,
}

/// Execute `statements` in order, committing after each one.
pub async fn run_stage<W: Warehouse + ?Sized>(
    warehouse: &mut W,
    stage: Stage,
    statements: &[Statement],
) -> Result<usize> {
    for (index, statement) in statements.iter().enumerate() {
        info!(%stage, index, name = %statement.name, "Executing statement");
        debug!(%stage, sql = %statement.sql);

        let sql_error = |action: &'static str, source: sqlx::Error| LoadError::SqlExecution {
            stage,
            index,
            name: statement.name.clone(),
            action,
            source,
        };

        warehouse
            .execute(&statement.sql)
            .await
            .map_err(|e| sql_error("execute", e))?;
        warehouse
            .commit()
            .await
            .map_err(|e| sql_error("commit", e))?;
    }
    Ok(statements.len())
}

/// COPY raw records into the staging tables.
pub async fn load_staging<W: Warehouse + ?Sized>(
    warehouse: &mut W,
    statements: &[Statement],
) -> Result<usize> {
    run_stage(warehouse, Stage::Staging, statements).await
}

/// Populate the fact and dimension tables from staging.
pub async fn run_transforms<W: Warehouse + ?Sized>(
    warehouse: &mut W,
    statements: &[Statement],
) -> Result<usize> {
    run_stage(warehouse, Stage::Transform, statements).await
}

/// Drop then recreate every table.
pub async fn reset_tables<W: Warehouse + ?Sized>(
    warehouse: &mut W,
    drop: &[Statement],
    create: &[Statement],
) -> Result<(usize, usize)> {
    let dropped = run_stage(warehouse, Stage::Drop, drop).await?;
    let created = run_stage(warehouse, Stage::Create, create).await?;
    Ok((dropped, created))
}

/// Full loader run over a rendered catalog.
pub async fn run_etl<W: Warehouse + ?Sized>(
    warehouse: &mut W,
    catalog: &Catalog,
    reset: bool,
) -> Result<LoadReport> {
    let mut report = LoadReport::default();

    if reset {
        let (dropped, created) = reset_tables(warehouse, &catalog.drop, &catalog.create).await?;
        report.dropped = dropped;
        report.created = created;
    }

    report.staged = load_staging(warehouse, &catalog.staging).await?;
    info!("Loaded {} staging statements", report.staged);

    report.transformed = run_transforms(warehouse, &catalog.transforms).await?;
    info!("Ran {} transform statements", report.transformed);

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Eq)]
    enum Call {
        Execute(String),
        Commit,
    }

    /// Records calls; fails `execute` for any statement containing `fail_on`.
    #[derive(Default)]
    struct RecordingWarehouse {
        calls: Vec<Call>,
        fail_on: Option<&'static str>,
    }

    impl RecordingWarehouse {
        fn executions(&self) -> usize {
            self.calls
                .iter()
                .filter(|c| matches!(c, Call::Execute(_)))
                .count()
        }

        fn commits(&self) -> usize {
            self.calls.iter().filter(|c| **c == Call::Commit).count()
        }
    }

    #[async_trait]
    impl Warehouse for RecordingWarehouse {
        async fn execute(&mut self, sql: &str) -> std::result::Result<(), sqlx::Error> {
            if let Some(marker) = self.fail_on {
                if sql.contains(marker) {
                    return Err(sqlx::Error::Protocol(format!("cannot run {}", sql)));
                }
            }
            self.calls.push(Call::Execute(sql.to_string()));
            Ok(())
        }

        async fn commit(&mut self) -> std::result::Result<(), sqlx::Error> {
            self.calls.push(Call::Commit);
            Ok(())
        }
    }

    fn statements(sqls: &[&str]) -> Vec<Statement> {
        sqls.iter()
            .enumerate()
            .map(|(i, sql)| Statement {
                name: format!("s{}", i),
                sql: sql.to_string(),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_commit_after_each_statement() {
        let mut warehouse = RecordingWarehouse::default();
        let n = load_staging(&mut warehouse, &statements(&["COPY a", "COPY b"]))
            .await
            .unwrap();

        assert_eq!(n, 2);
        assert_eq!(
            warehouse.calls,
            vec![
                Call::Execute("COPY a".to_string()),
                Call::Commit,
                Call::Execute("COPY b".to_string()),
                Call::Commit,
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_lists_do_nothing() {
        let mut warehouse = RecordingWarehouse::default();
        assert_eq!(load_staging(&mut warehouse, &[]).await.unwrap(), 0);
        assert_eq!(run_transforms(&mut warehouse, &[]).await.unwrap(), 0);
        assert_eq!(warehouse.executions(), 0);
        assert_eq!(warehouse.commits(), 0);
    }

    #[tokio::test]
    async fn test_failure_aborts_remaining_and_keeps_prior_commits() {
        let mut warehouse = RecordingWarehouse {
            fail_on: Some("INSERT bad"),
            ..Default::default()
        };
        let err = run_transforms(
            &mut warehouse,
            &statements(&["INSERT ok", "INSERT bad", "INSERT never"]),
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            LoadError::SqlExecution {
                stage: Stage::Transform,
                index: 1,
                action: "execute",
                ..
            }
        ));
        assert_eq!(
            warehouse.calls,
            vec![Call::Execute("INSERT ok".to_string()), Call::Commit]
        );
    }

    #[tokio::test]
    async fn test_run_etl_orders_stages() {
        let catalog = Catalog {
            drop: statements(&["DROP t"]),
            create: statements(&["CREATE t"]),
            staging: statements(&["COPY t"]),
            transforms: statements(&["INSERT t"]),
        };

        let mut warehouse = RecordingWarehouse::default();
        let report = run_etl(&mut warehouse, &catalog, true).await.unwrap();
        assert_eq!(
            report,
            LoadReport {
                dropped: 1,
                created: 1,
                staged: 1,
                transformed: 1
            }
        );
        let executed: Vec<&str> = warehouse
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::Execute(sql) => Some(sql.as_str()),
                Call::Commit => None,
            })
            .collect();
        assert_eq!(executed, vec!["DROP t", "CREATE t", "COPY t", "INSERT t"]);

        let mut warehouse = RecordingWarehouse::default();
        run_etl(&mut warehouse, &catalog, false).await.unwrap();
        assert_eq!(warehouse.executions(), 2);
    }

    #[tokio::test]
    async fn test_staging_failure_skips_transforms() {
        let catalog = Catalog {
            staging: statements(&["COPY broken"]),
            transforms: statements(&["INSERT t"]),
            ..Default::default()
        };
        let mut warehouse = RecordingWarehouse {
            fail_on: Some("broken"),
            ..Default::default()
        };
        assert!(run_etl(&mut warehouse, &catalog, false).await.is_err());
        assert_eq!(warehouse.executions(), 0);
    }
}
