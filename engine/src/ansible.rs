use crate::config::ProjectConfig;
use crate::environment::Environment;
use crate::provider::{Configurator, EngineError, EngineResult};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info};

/// Ansible CLI wrapper: playbook runs plus the inventory connectivity check.
#[derive(Debug, Clone)]
pub struct AnsibleCli {
    playbook_bin: String,
    ping_bin: String,
    playbook: PathBuf,
}

impl AnsibleCli {
    pub fn new(
        playbook_bin: impl Into<String>,
        ping_bin: impl Into<String>,
        playbook: impl Into<PathBuf>,
    ) -> Self {
        Self {
            playbook_bin: playbook_bin.into(),
            ping_bin: ping_bin.into(),
            playbook: playbook.into(),
        }
    }

    pub fn from_config(config: &ProjectConfig) -> Self {
        Self::new(
            &config.ansible_playbook_bin,
            &config.ansible_bin,
            &config.playbook,
        )
    }

    /// Whether the ansible-playbook binary is invocable
    pub fn probe(&self) -> bool {
        Command::new(&self.playbook_bin)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok_and(|status| status.success())
    }

    fn exec(&self, bin: &str, args: &[&str]) -> EngineResult<()> {
        debug!("running {} {}", bin, args.join(" "));

        let output = Command::new(bin).args(args).output().map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                EngineError::ToolNotFound {
                    tool: bin.to_string(),
                }
            } else {
                EngineError::Io(e)
            }
        })?;

        if !output.status.success() {
            return Err(EngineError::CommandFailed {
                program: format!("{} {}", bin, args.join(" ")),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl Configurator for AnsibleCli {
    async fn ping(&self, inventory: &Path, env: Environment) -> EngineResult<()> {
        info!(env = %env, inventory = %inventory.display(), "pinging inventory hosts");
        let inventory = inventory.to_string_lossy();
        self.exec(&self.ping_bin, &["all", "-i", &inventory, "-m", "ping"])
    }

    async fn run(&self, inventory: &Path, env: Environment) -> EngineResult<()> {
        info!(env = %env, playbook = %self.playbook.display(), "running playbook");
        let inventory = inventory.to_string_lossy();
        let playbook = self.playbook.to_string_lossy();
        let env_var = format!("env={}", env);
        self.exec(
            &self.playbook_bin,
            &["-i", &inventory, &playbook, "-e", &env_var],
        )
    }

    fn engine_name(&self) -> &'static str {
        "ansible"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_binary_is_tool_not_found() {
        let cli = AnsibleCli::new(
            "ansible-playbook-definitely-not-installed",
            "ansible-definitely-not-installed",
            "site.yml",
        );

        let err = cli
            .run(Path::new("inventory.ini"), Environment::Dev)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::ToolNotFound { .. }));

        let err = cli
            .ping(Path::new("inventory.ini"), Environment::Dev)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::ToolNotFound { .. }));
    }
}
