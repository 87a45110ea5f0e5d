//! Precondition checks run before any pipeline stage.

use engine::{AnsibleCli, AwsCli, ProjectConfig, TerraformCli};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum PreflightError {
    #[error("Required tool '{tool}' was not found on PATH")]
    MissingTool { tool: String },

    #[error("AWS credentials did not resolve: {reason}")]
    NoCredentials { reason: String },
}

/// Verify external tools and credentials before any stage runs.
///
/// Missing tools or credentials abort the run here rather than mid-pipeline.
pub fn check(config: &ProjectConfig) -> Result<(), PreflightError> {
    let terraform = TerraformCli::from_config(config);
    if !terraform.probe() {
        return Err(PreflightError::MissingTool {
            tool: config.terraform_bin.clone(),
        });
    }

    let ansible = AnsibleCli::from_config(config);
    if !ansible.probe() {
        return Err(PreflightError::MissingTool {
            tool: config.ansible_playbook_bin.clone(),
        });
    }

    let aws = AwsCli::from_config(config);
    if !aws.probe() {
        return Err(PreflightError::MissingTool {
            tool: config.aws_bin.clone(),
        });
    }

    let arn = aws
        .caller_identity()
        .map_err(|e| PreflightError::NoCredentials {
            reason: e.to_string(),
        })?;
    info!(identity = %arn, "preflight checks passed");

    Ok(())
}
