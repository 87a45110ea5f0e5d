use crate::environment::Environment;
use crate::types::ProvisioningOutput;
use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("External tool not found: {tool}. Install it and make sure it is on PATH.")]
    ToolNotFound { tool: String },

    #[error("{program} exited with {status}: {stderr}")]
    CommandFailed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("Unexpected output from {program}: {reason}")]
    UnexpectedOutput { program: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Provisioning engine seam.
///
/// The real implementation shells out to Terraform; tests substitute mocks.
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Initialize the environment's working directory, including its backend
    async fn init(&self, env: Environment) -> EngineResult<()>;

    /// Produce an inspectable plan artifact without mutating infrastructure
    async fn plan(&self, env: Environment) -> EngineResult<()>;

    /// Apply the previously produced plan. Never retried: a blind retry
    /// could duplicate non-idempotent resource creation.
    async fn apply(&self, env: Environment) -> EngineResult<()>;

    /// Parse the named outputs of the last successful apply
    async fn outputs(&self, env: Environment) -> EngineResult<ProvisioningOutput>;

    /// Destroy the environment's resources
    async fn destroy(&self, env: Environment) -> EngineResult<()>;

    /// Whether the environment currently has deployed state
    async fn has_state(&self, env: Environment) -> EngineResult<bool>;

    fn engine_name(&self) -> &'static str;
}

/// Configuration-management engine seam.
#[async_trait]
pub trait Configurator: Send + Sync {
    /// Connectivity check against the inventory, independent of the playbook
    async fn ping(&self, inventory: &Path, env: Environment) -> EngineResult<()>;

    /// Run the playbook against the inventory with `env` passed through
    async fn run(&self, inventory: &Path, env: Environment) -> EngineResult<()>;

    fn engine_name(&self) -> &'static str;
}
