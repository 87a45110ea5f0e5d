pub mod ansible;
pub mod aws;
pub mod config;
pub mod environment;
pub mod provider;
pub mod terraform;
pub mod types;

pub use ansible::AnsibleCli;
pub use aws::{AwsCli, Ec2Instance};
pub use config::{ProjectConfig, RetryPolicy};
pub use environment::{EnvProfile, Environment, ParseEnvironmentError};
pub use provider::{Configurator, EngineError, EngineResult, Provisioner};
pub use terraform::{TerraformCli, PLAN_FILE};
pub use types::{DeploymentResult, DeploymentStatus, ProvisioningOutput};

pub mod prelude {
    pub use crate::ansible::*;
    pub use crate::aws::*;
    pub use crate::config::*;
    pub use crate::environment::*;
    pub use crate::provider::*;
    pub use crate::terraform::*;
    pub use crate::types::*;
}
