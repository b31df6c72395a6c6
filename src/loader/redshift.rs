//! Redshift connection over the PostgreSQL wire protocol.

use super::error::{LoadError, Result};
use super::Warehouse;
use async_trait::async_trait;
use sparkify_dwh_config::{ClusterConfig, ConfigError, CLUSTER_SECTION, HOST_KEY};
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::{Connection, Executor};
use tracing::{debug, info};

/// Connection parameters taken from the config store.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl std::fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

impl ConnectionSettings {
    /// Fails when the cluster endpoint has not been written back yet.
    pub fn from_config(config: &ClusterConfig) -> Result<Self> {
        let host = config
            .cluster_endpoint
            .clone()
            .ok_or_else(|| ConfigError::MissingKey {
                section: CLUSTER_SECTION.to_string(),
                key: HOST_KEY.to_string(),
            })?;

        Ok(Self {
            host,
            port: config.db_port,
            database: config.db_name.clone(),
            user: config.db_user.clone(),
            password: config.db_password.clone(),
        })
    }

    fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .username(&self.user)
            .password(&self.password)
    }
}

/// Raw SQL text execution on one open session.
#[async_trait]
pub trait SqlSession: Send {
    async fn run(&mut self, sql: &str) -> std::result::Result<(), sqlx::Error>;
}

#[async_trait]
impl SqlSession for PgConnection {
    async fn run(&mut self, sql: &str) -> std::result::Result<(), sqlx::Error> {
        // No bind arguments, so this goes over the simple query protocol
        (&mut *self).execute(sql).await?;
        Ok(())
    }
}

/// One connection for the duration of a loader run.
///
/// Each statement runs inside an explicit transaction opened on first
/// `execute` and closed by `commit`.
pub struct RedshiftWarehouse<S = PgConnection> {
    session: S,
    in_transaction: bool,
}

impl<S: SqlSession> RedshiftWarehouse<S> {
    pub fn from_session(session: S) -> Self {
        Self {
            session,
            in_transaction: false,
        }
    }
}

impl RedshiftWarehouse<PgConnection> {
    pub async fn connect(settings: &ConnectionSettings) -> Result<Self> {
        info!(
            "Connecting to {}:{}/{} as {}",
            settings.host, settings.port, settings.database, settings.user
        );
        let conn = PgConnection::connect_with(&settings.connect_options())
            .await
            .map_err(|source| LoadError::Connect {
                host: settings.host.clone(),
                port: settings.port,
                database: settings.database.clone(),
                source,
            })?;

        Ok(Self::from_session(conn))
    }

    /// Close the connection; an open transaction is rolled back by the server.
    pub async fn close(self) -> std::result::Result<(), sqlx::Error> {
        debug!("Closing warehouse connection");
        self.session.close().await
    }
}

#[async_trait]
impl<S: SqlSession> Warehouse for RedshiftWarehouse<S> {
    async fn execute(&mut self, sql: &str) -> std::result::Result<(), sqlx::Error> {
        if !self.in_transaction {
            self.session.run("BEGIN").await?;
            self.in_transaction = true;
        }
        self.session.run(sql).await
    }

    async fn commit(&mut self) -> std::result::Result<(), sqlx::Error> {
        if self.in_transaction {
            self.session.run("COMMIT").await?;
            self.in_transaction = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sparkify_dwh_config::S3Locations;

    fn config(endpoint: Option<&str>) -> ClusterConfig {
        ClusterConfig {
            aws_key: "k".to_string(),
            aws_secret: "s".to_string(),
            db_name: "dev".to_string(),
            db_user: "awsuser".to_string(),
            db_password: "Passw0rd".to_string(),
            db_port: 5439,
            role_arn: None,
            cluster_endpoint: endpoint.map(str::to_string),
            s3: S3Locations::default(),
        }
    }

    #[test]
    fn test_settings_from_config() {
        let settings = ConnectionSettings::from_config(&config(Some("h.example.com"))).unwrap();
        assert_eq!(settings.host, "h.example.com");
        assert_eq!(settings.port, 5439);
        assert_eq!(settings.database, "dev");
        assert!(!format!("{:?}", settings).contains("Passw0rd"));
    }

    /// Session that records every statement and fails on request.
    #[derive(Default)]
    struct RecordingSession {
        sent: Vec<String>,
        fail_on: Option<&'static str>,
    }

    #[async_trait]
    impl SqlSession for RecordingSession {
        async fn run(&mut self, sql: &str) -> std::result::Result<(), sqlx::Error> {
            self.sent.push(sql.to_string());
            if self.fail_on == Some(sql) {
                return Err(sqlx::Error::Protocol(format!("rejected: {}", sql)));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_each_statement_gets_its_own_transaction() {
        let mut warehouse = RedshiftWarehouse::from_session(RecordingSession::default());

        warehouse.execute("COPY a").await.unwrap();
        warehouse.commit().await.unwrap();
        warehouse.execute("COPY b").await.unwrap();
        warehouse.commit().await.unwrap();

        assert_eq!(
            warehouse.session.sent,
            vec!["BEGIN", "COPY a", "COMMIT", "BEGIN", "COPY b", "COMMIT"]
        );
        assert!(!warehouse.in_transaction);
    }

    #[tokio::test]
    async fn test_commit_without_open_transaction_sends_nothing() {
        let mut warehouse = RedshiftWarehouse::from_session(RecordingSession::default());

        warehouse.commit().await.unwrap();

        assert!(warehouse.session.sent.is_empty());
        assert!(!warehouse.in_transaction);
    }

    #[tokio::test]
    async fn test_failed_statement_leaves_transaction_open() {
        let mut warehouse = RedshiftWarehouse::from_session(RecordingSession {
            fail_on: Some("INSERT bad"),
            ..Default::default()
        });

        assert!(warehouse.execute("INSERT bad").await.is_err());

        assert_eq!(warehouse.session.sent, vec!["BEGIN", "INSERT bad"]);
        assert!(warehouse.in_transaction);
    }

    #[tokio::test]
    async fn test_failed_begin_is_retried_on_next_statement() {
        let mut warehouse = RedshiftWarehouse::from_session(RecordingSession {
            fail_on: Some("BEGIN"),
            ..Default::default()
        });

        assert!(warehouse.execute("COPY a").await.is_err());
        assert!(!warehouse.in_transaction);
        assert_eq!(warehouse.session.sent, vec!["BEGIN"]);
    }

    /// Needs a reachable PostgreSQL-compatible endpoint in `DATABASE_URL`.
    #[tokio::test]
    #[ignore = "Requires DATABASE_URL"]
    async fn test_statements_commit_against_live_database() {
        use std::str::FromStr;

        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let options = PgConnectOptions::from_str(&url).unwrap();
        let conn = PgConnection::connect_with(&options).await.unwrap();
        let mut warehouse = RedshiftWarehouse::from_session(conn);

        for sql in [
            "DROP TABLE IF EXISTS sparkify_commit_check",
            "CREATE TABLE sparkify_commit_check (id INT)",
            "INSERT INTO sparkify_commit_check VALUES (1)",
        ] {
            warehouse.execute(sql).await.unwrap();
            warehouse.commit().await.unwrap();
        }
        assert!(!warehouse.in_transaction);

        warehouse
            .execute("DROP TABLE sparkify_commit_check")
            .await
            .unwrap();
        warehouse.commit().await.unwrap();
        warehouse.close().await.unwrap();
    }

    #[test]
    fn test_settings_require_host() {
        let err = ConnectionSettings::from_config(&config(None)).unwrap_err();
        assert!(matches!(
            err,
            LoadError::Config(ConfigError::MissingKey { ref key, .. }) if key == "HOST"
        ));
    }
}
