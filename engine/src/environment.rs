use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Deployment environments managed by the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Development environment
    Dev,
    /// Staging environment
    Staging,
    /// Production environment
    Prod,
}

/// Returned when parsing an environment name fails
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown environment '{0}', expected one of: dev, staging, prod")]
pub struct ParseEnvironmentError(pub String);

impl Environment {
    /// All environments, in deployment order
    pub const fn all() -> [Environment; 3] {
        [Environment::Dev, Environment::Staging, Environment::Prod]
    }

    /// Short name used in resource names, file paths and inventory groups
    pub const fn name(&self) -> &'static str {
        match self {
            Environment::Dev => "dev",
            Environment::Staging => "staging",
            Environment::Prod => "prod",
        }
    }

    /// Static sizing and feature-flag profile for this environment
    pub const fn profile(&self) -> EnvProfile {
        match self {
            Environment::Dev => EnvProfile {
                vpc_cidr: "10.0.0.0/16",
                instance_type: "t2.micro",
                encrypted_state: false,
                flow_logs: false,
                elastic_ip: false,
            },
            Environment::Staging => EnvProfile {
                vpc_cidr: "10.1.0.0/16",
                instance_type: "t2.small",
                encrypted_state: true,
                flow_logs: false,
                elastic_ip: false,
            },
            Environment::Prod => EnvProfile {
                vpc_cidr: "10.2.0.0/16",
                instance_type: "t2.medium",
                encrypted_state: true,
                flow_logs: true,
                elastic_ip: true,
            },
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Environment {
    type Err = ParseEnvironmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dev" => Ok(Environment::Dev),
            "staging" => Ok(Environment::Staging),
            "prod" => Ok(Environment::Prod),
            other => Err(ParseEnvironmentError(other.to_string())),
        }
    }
}

/// Per-environment sizing and feature flags.
///
/// CIDR ranges and instance sizing are fixed per environment; the AWS region
/// is deliberately not part of this table and must be configured explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvProfile {
    /// VPC CIDR range
    pub vpc_cidr: &'static str,
    /// EC2 instance type for the web host
    pub instance_type: &'static str,
    /// Whether remote state is stored encrypted
    pub encrypted_state: bool,
    /// Whether VPC flow logs are enabled
    pub flow_logs: bool,
    /// Whether the web host gets an elastic IP
    pub elastic_ip: bool,
}
