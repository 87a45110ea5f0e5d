use crate::environment::Environment;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Bounded retry settings for a polling gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay_secs: u64,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, delay_secs: u64) -> Self {
        Self {
            max_attempts,
            delay_secs,
        }
    }

    pub const fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }
}

/// Project-wide configuration passed explicitly to every stage.
///
/// The AWS region has no default: the source deployments disagreed on a
/// canonical region, so it must always be configured.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name, used as the prefix for backend resource names
    #[serde(default = "defaults::project_name")]
    pub project_name: String,
    /// AWS region, required
    pub region: String,
    /// Root directory holding `environments/<env>` Terraform working dirs
    #[serde(default = "defaults::terraform_dir")]
    pub terraform_dir: PathBuf,
    /// Playbook run against every deployed host
    #[serde(default = "defaults::playbook")]
    pub playbook: PathBuf,
    /// Directory generated inventory files are written to
    #[serde(default = "defaults::inventory_dir")]
    pub inventory_dir: PathBuf,
    /// Login user for deployed hosts
    #[serde(default = "defaults::ssh_user")]
    pub ssh_user: String,
    /// Private key used when provisioning outputs carry no key name
    #[serde(default = "defaults::ssh_key_path")]
    pub ssh_key_path: String,
    /// Port probed by the readiness gate
    #[serde(default = "defaults::ssh_port")]
    pub ssh_port: u16,
    #[serde(default = "defaults::terraform_bin")]
    pub terraform_bin: String,
    #[serde(default = "defaults::ansible_playbook_bin")]
    pub ansible_playbook_bin: String,
    #[serde(default = "defaults::ansible_bin")]
    pub ansible_bin: String,
    #[serde(default = "defaults::aws_bin")]
    pub aws_bin: String,
    /// SSH reachability gate before configuration runs
    #[serde(default = "defaults::readiness")]
    pub readiness: RetryPolicy,
    /// HTTP verification of the deployed endpoint
    #[serde(default = "defaults::health")]
    pub health: RetryPolicy,
}

mod defaults {
    use super::RetryPolicy;
    use std::path::PathBuf;

    pub fn project_name() -> String {
        "opsforge".to_string()
    }
    pub fn terraform_dir() -> PathBuf {
        PathBuf::from("terraform")
    }
    pub fn playbook() -> PathBuf {
        PathBuf::from("ansible/playbooks/site.yml")
    }
    pub fn inventory_dir() -> PathBuf {
        PathBuf::from("ansible/inventory")
    }
    pub fn ssh_user() -> String {
        "ubuntu".to_string()
    }
    pub fn ssh_key_path() -> String {
        "~/.ssh/opsforge-key.pem".to_string()
    }
    pub fn ssh_port() -> u16 {
        22
    }
    pub fn terraform_bin() -> String {
        "terraform".to_string()
    }
    pub fn ansible_playbook_bin() -> String {
        "ansible-playbook".to_string()
    }
    pub fn ansible_bin() -> String {
        "ansible".to_string()
    }
    pub fn aws_bin() -> String {
        "aws".to_string()
    }
    pub fn readiness() -> RetryPolicy {
        RetryPolicy::new(30, 10)
    }
    pub fn health() -> RetryPolicy {
        RetryPolicy::new(10, 10)
    }
}

impl ProjectConfig {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            project_name: defaults::project_name(),
            region: region.into(),
            terraform_dir: defaults::terraform_dir(),
            playbook: defaults::playbook(),
            inventory_dir: defaults::inventory_dir(),
            ssh_user: defaults::ssh_user(),
            ssh_key_path: defaults::ssh_key_path(),
            ssh_port: defaults::ssh_port(),
            terraform_bin: defaults::terraform_bin(),
            ansible_playbook_bin: defaults::ansible_playbook_bin(),
            ansible_bin: defaults::ansible_bin(),
            aws_bin: defaults::aws_bin(),
            readiness: defaults::readiness(),
            health: defaults::health(),
        }
    }

    pub fn with_project_name(mut self, name: impl Into<String>) -> Self {
        self.project_name = name.into();
        self
    }

    pub fn with_terraform_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.terraform_dir = dir.into();
        self
    }

    pub fn with_playbook(mut self, playbook: impl Into<PathBuf>) -> Self {
        self.playbook = playbook.into();
        self
    }

    pub fn with_inventory_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.inventory_dir = dir.into();
        self
    }

    pub fn with_ssh_user(mut self, user: impl Into<String>) -> Self {
        self.ssh_user = user.into();
        self
    }

    pub fn with_ssh_key_path(mut self, path: impl Into<String>) -> Self {
        self.ssh_key_path = path.into();
        self
    }

    pub fn with_readiness(mut self, policy: RetryPolicy) -> Self {
        self.readiness = policy;
        self
    }

    pub fn with_health(mut self, policy: RetryPolicy) -> Self {
        self.health = policy;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.project_name.is_empty() {
            return Err("Project name cannot be empty".to_string());
        }

        if self.region.is_empty() {
            return Err("AWS region must be configured explicitly".to_string());
        }

        if self.ssh_user.is_empty() {
            return Err("SSH user cannot be empty".to_string());
        }

        if self.readiness.max_attempts == 0 {
            return Err("Readiness gate must allow at least one attempt".to_string());
        }

        if self.health.max_attempts == 0 {
            return Err("Health check must allow at least one attempt".to_string());
        }

        Ok(())
    }

    /// Terraform working directory for an environment
    pub fn env_dir(&self, env: Environment) -> PathBuf {
        self.terraform_dir.join("environments").join(env.name())
    }

    /// Generated backend configuration file consumed by `terraform init`
    pub fn backend_config_path(&self, env: Environment) -> PathBuf {
        self.env_dir(env).join("backend.hcl")
    }

    /// State bucket name for an environment
    pub fn state_bucket(&self, env: Environment) -> String {
        format!("{}-terraform-state-{}", self.project_name, env.name())
    }

    /// Shared lock table name
    pub fn lock_table(&self) -> String {
        format!("{}-terraform-locks", self.project_name)
    }

    /// Path of a generated inventory file for one environment
    pub fn inventory_path(&self, env: Environment, extension: &str) -> PathBuf {
        self.inventory_dir
            .join(format!("{}.{}", env.name(), extension))
    }

    /// Path of the combined multi-environment inventory file
    pub fn combined_inventory_path(&self, extension: &str) -> PathBuf {
        self.inventory_dir.join(format!("all.{}", extension))
    }
}
