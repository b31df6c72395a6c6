//! Query catalog: named SQL statements grouped by loader stage.
//!
//! Statements may reference `{{KEY}}` placeholders filled from the config
//! store (role ARN and S3 locations) before execution.

use super::error::CatalogError;
use serde::Deserialize;
use sparkify_dwh_config::ClusterConfig;
use std::path::Path;

/// Catalog shipped with the binary
pub const DEFAULT_CATALOG: &str = include_str!("../../templates/catalog.toml");

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Statement {
    pub name: String,
    pub sql: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub drop: Vec<Statement>,
    #[serde(default)]
    pub create: Vec<Statement>,
    #[serde(default)]
    pub staging: Vec<Statement>,
    #[serde(default)]
    pub transforms: Vec<Statement>,
}

impl Catalog {
    pub fn from_toml_str(content: &str) -> Result<Self, CatalogError> {
        Ok(toml::from_str(content)?)
    }

    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_toml_str(DEFAULT_CATALOG)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Substitute placeholders in every statement.
    ///
    /// Fails on the first statement still containing a `{{...}}` placeholder
    /// after substitution.
    pub fn render(&self, vars: &[(&str, String)]) -> Result<Self, CatalogError> {
        let render_all = |statements: &[Statement]| -> Result<Vec<Statement>, CatalogError> {
            statements.iter().map(|s| render_statement(s, vars)).collect()
        };

        Ok(Self {
            drop: render_all(&self.drop)?,
            create: render_all(&self.create)?,
            staging: render_all(&self.staging)?,
            transforms: render_all(&self.transforms)?,
        })
    }
}

/// Placeholder values available from the config store.
pub fn template_vars(config: &ClusterConfig) -> Vec<(&'static str, String)> {
    let mut vars = Vec::new();
    let mut push = |key: &'static str, value: &Option<String>| {
        if let Some(v) = value {
            vars.push((key, v.clone()));
        }
    };
    push("ARN", &config.role_arn);
    push("LOG_DATA", &config.s3.log_data);
    push("LOG_JSONPATH", &config.s3.log_jsonpath);
    push("SONG_DATA", &config.s3.song_data);
    vars
}

fn render_statement(statement: &Statement, vars: &[(&str, String)]) -> Result<Statement, CatalogError> {
    let mut sql = statement.sql.clone();
    for (key, value) in vars {
        sql = sql.replace(&format!("{{{{{}}}}}", key), value);
    }

    if let Some(start) = sql.find("{{") {
        let rest = &sql[start + 2..];
        let placeholder = rest.split("}}").next().unwrap_or(rest).to_string();
        return Err(CatalogError::UnresolvedPlaceholder {
            name: statement.name.clone(),
            placeholder,
        });
    }

    Ok(Statement {
        name: statement.name.clone(),
        sql,
    })
}
