use crate::config::ProjectConfig;
use crate::environment::Environment;
use crate::provider::{EngineError, EngineResult, Provisioner};
use crate::types::ProvisioningOutput;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use tracing::{debug, info, warn};

/// Name of the plan artifact left in each environment's working directory
pub const PLAN_FILE: &str = "tfplan";

/// Terraform CLI wrapper.
///
/// Every invocation receives its working directory explicitly; the process
/// current directory is never changed.
#[derive(Debug, Clone)]
pub struct TerraformCli {
    bin: String,
    root: PathBuf,
}

impl TerraformCli {
    pub fn new(bin: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            bin: bin.into(),
            root: root.into(),
        }
    }

    pub fn from_config(config: &ProjectConfig) -> Self {
        Self::new(&config.terraform_bin, &config.terraform_dir)
    }

    /// Whether the terraform binary is invocable
    pub fn probe(&self) -> bool {
        Command::new(&self.bin)
            .arg("version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok_and(|status| status.success())
    }

    fn env_dir(&self, env: Environment) -> PathBuf {
        self.root.join("environments").join(env.name())
    }

    fn exec(&self, env: Environment, args: &[&str]) -> EngineResult<Output> {
        let dir = self.env_dir(env);
        debug!(env = %env, dir = %dir.display(), "running {} {}", self.bin, args.join(" "));

        let output = Command::new(&self.bin)
            .args(args)
            .current_dir(&dir)
            .output()
            .map_err(|e| {
                if e.kind() == ErrorKind::NotFound {
                    EngineError::ToolNotFound {
                        tool: self.bin.clone(),
                    }
                } else {
                    EngineError::Io(e)
                }
            })?;

        if !output.status.success() {
            return Err(EngineError::CommandFailed {
                program: format!("{} {}", self.bin, args.join(" ")),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }

        Ok(output)
    }
}

/// Whether a `terraform show -json` document describes deployed state
fn state_has_values(document: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(document)
        .ok()
        .and_then(|v| v.get("values").cloned())
        .is_some_and(|values| !values.is_null())
}

#[async_trait]
impl Provisioner for TerraformCli {
    async fn init(&self, env: Environment) -> EngineResult<()> {
        info!(env = %env, "initializing terraform working directory");

        let backend_config = self.env_dir(env).join("backend.hcl");
        if backend_config.exists() {
            self.exec(
                env,
                &[
                    "init",
                    "-input=false",
                    "-reconfigure",
                    "-backend-config=backend.hcl",
                ],
            )?;
        } else {
            warn!(env = %env, "no backend.hcl found, initializing without remote backend");
            self.exec(env, &["init", "-input=false"])?;
        }

        Ok(())
    }

    async fn plan(&self, env: Environment) -> EngineResult<()> {
        info!(env = %env, "planning changes");
        self.exec(
            env,
            &["plan", "-input=false", &format!("-out={}", PLAN_FILE)],
        )?;
        Ok(())
    }

    async fn apply(&self, env: Environment) -> EngineResult<()> {
        info!(env = %env, "applying planned changes");
        self.exec(env, &["apply", "-input=false", PLAN_FILE])?;
        Ok(())
    }

    async fn outputs(&self, env: Environment) -> EngineResult<ProvisioningOutput> {
        let output = self.exec(env, &["output", "-json"])?;
        let document: serde_json::Value = serde_json::from_slice(&output.stdout)?;
        Ok(ProvisioningOutput::from_output_json(&document))
    }

    async fn destroy(&self, env: Environment) -> EngineResult<()> {
        info!(env = %env, "destroying resources");
        self.exec(env, &["destroy", "-input=false", "-auto-approve"])?;
        Ok(())
    }

    async fn has_state(&self, env: Environment) -> EngineResult<bool> {
        // An uninitialized or empty working directory is "no state", not an error
        match self.exec(env, &["show", "-json"]) {
            Ok(output) => Ok(state_has_values(&String::from_utf8_lossy(&output.stdout))),
            Err(EngineError::CommandFailed { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn engine_name(&self) -> &'static str {
        "terraform"
    }
}
