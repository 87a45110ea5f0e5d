//! Inventory synthesis for opsforge
//!
//! Transforms provisioning results into configuration-management host files.
//! One inventory can be rendered to three encodings (INI, JSON, YAML) that
//! stay semantically equivalent: parsing any of them back yields the same
//! host, address and credential data.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

mod parse;
mod render;
mod schema;

pub use parse::parse;
pub use render::{render, write_file};

/// Errors related to inventory synthesis
#[derive(Error, Debug)]
pub enum InventoryError {
    #[error("Host '{host}' is missing required field '{field}'")]
    MissingField { host: String, field: &'static str },

    #[error("Malformed {format} inventory: {reason}")]
    Malformed { format: Format, reason: String },

    #[error("Unknown inventory format '{0}', expected one of: ini, json, yaml")]
    UnknownFormat(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type InventoryResult<T> = Result<T, InventoryError>;

/// Textual encodings an inventory can be written in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Grouped `key=value` sections
    Ini,
    /// Structured per-host mapping, the dynamic-inventory shape
    Json,
    /// Hierarchical grouping form
    Yaml,
}

impl Format {
    pub const fn all() -> [Format; 3] {
        [Format::Ini, Format::Json, Format::Yaml]
    }

    pub const fn extension(&self) -> &'static str {
        match self {
            Format::Ini => "ini",
            Format::Json => "json",
            Format::Yaml => "yml",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Ini => f.write_str("ini"),
            Format::Json => f.write_str("json"),
            Format::Yaml => f.write_str("yaml"),
        }
    }
}

impl FromStr for Format {
    type Err = InventoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ini" => Ok(Format::Ini),
            "json" => Ok(Format::Json),
            "yaml" | "yml" => Ok(Format::Yaml),
            other => Err(InventoryError::UnknownFormat(other.to_string())),
        }
    }
}

/// Conventional inventory hostname for an environment's web host
pub fn host_name(environment: &str) -> String {
    format!("{}-web-server", environment)
}

/// Conventional group name for an environment's web hosts
pub fn group_name(environment: &str) -> String {
    format!("{}-web", environment)
}

/// One host and its connection attributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRecord {
    /// Inventory hostname, e.g. `dev-web-server`
    pub name: String,
    /// Environment this host belongs to
    pub environment: String,
    /// Public address used for management connections
    pub address: String,
    pub instance_id: String,
    /// Login user
    pub user: String,
    /// Private key file for management connections
    pub key_file: String,
    pub private_ip: Option<String>,
}

impl HostRecord {
    /// Required connection fields must be present before anything is written
    pub fn validate(&self) -> InventoryResult<()> {
        for (field, value) in [
            ("address", &self.address),
            ("instance_id", &self.instance_id),
            ("key_file", &self.key_file),
        ] {
            if value.is_empty() {
                return Err(InventoryError::MissingField {
                    host: self.name.clone(),
                    field,
                });
            }
        }
        Ok(())
    }
}

/// A set of hosts plus shared connection defaults (`all:vars`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    pub hosts: Vec<HostRecord>,
    pub vars: BTreeMap<String, String>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn push(&mut self, host: HostRecord) {
        self.hosts.push(host);
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Distinct environments, in first-seen order
    pub fn environments(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for host in &self.hosts {
            if !seen.contains(&host.environment.as_str()) {
                seen.push(host.environment.as_str());
            }
        }
        seen
    }

    pub fn validate(&self) -> InventoryResult<()> {
        for host in &self.hosts {
            host.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn sample_host(environment: &str) -> HostRecord {
        HostRecord {
            name: host_name(environment),
            environment: environment.to_string(),
            address: "203.0.113.10".to_string(),
            instance_id: "i-abc123".to_string(),
            user: "ubuntu".to_string(),
            key_file: "~/.ssh/opsforge-key.pem".to_string(),
            private_ip: Some("10.0.1.5".to_string()),
        }
    }

    #[test]
    fn test_naming_conventions() {
        assert_eq!(host_name("dev"), "dev-web-server");
        assert_eq!(group_name("staging"), "staging-web");
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("ini".parse::<Format>().unwrap(), Format::Ini);
        assert_eq!("yml".parse::<Format>().unwrap(), Format::Yaml);
        assert_eq!("yaml".parse::<Format>().unwrap(), Format::Yaml);
        assert!(matches!(
            "xml".parse::<Format>(),
            Err(InventoryError::UnknownFormat(_))
        ));
    }

    #[test]
    fn test_host_validation() {
        let host = sample_host("dev");
        assert!(host.validate().is_ok());

        let mut host = sample_host("dev");
        host.address = String::new();
        let err = host.validate().unwrap_err();
        assert!(matches!(
            err,
            InventoryError::MissingField {
                field: "address",
                ..
            }
        ));
    }

    #[test]
    fn test_environments_are_deduplicated() {
        let mut inventory = Inventory::new();
        inventory.push(sample_host("dev"));
        inventory.push(sample_host("dev"));
        inventory.push(sample_host("prod"));
        assert_eq!(inventory.environments(), vec!["dev", "prod"]);
    }
}
