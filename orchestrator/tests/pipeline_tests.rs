use async_trait::async_trait;
use engine::{
    Configurator, DeploymentStatus, EngineError, EngineResult, Environment, ProjectConfig,
    Provisioner, ProvisioningOutput, RetryPolicy,
};
use inventory::Format;
use orchestrator::pipeline::{DeployOptions, Pipeline};
use orchestrator::{backend, synth, teardown};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::net::TcpListener;

#[derive(Default)]
struct MockProvisioner {
    calls: Mutex<Vec<String>>,
    fail_apply_for: Option<Environment>,
    output: ProvisioningOutput,
    state: Vec<Environment>,
}

impl MockProvisioner {
    fn with_output(output: ProvisioningOutput) -> Self {
        Self {
            output,
            ..Default::default()
        }
    }

    fn record(&self, operation: &str, env: Environment) {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{} {}", operation, env));
    }

    fn called(&self, operation: &str, env: Environment) -> bool {
        self.calls
            .lock()
            .unwrap()
            .contains(&format!("{} {}", operation, env))
    }
}

#[async_trait]
impl Provisioner for MockProvisioner {
    async fn init(&self, env: Environment) -> EngineResult<()> {
        self.record("init", env);
        Ok(())
    }

    async fn plan(&self, env: Environment) -> EngineResult<()> {
        self.record("plan", env);
        Ok(())
    }

    async fn apply(&self, env: Environment) -> EngineResult<()> {
        self.record("apply", env);
        if self.fail_apply_for == Some(env) {
            return Err(EngineError::CommandFailed {
                program: "terraform apply".to_string(),
                status: "exit status: 1".to_string(),
                stderr: "Error: creating EC2 instance".to_string(),
            });
        }
        Ok(())
    }

    async fn outputs(&self, env: Environment) -> EngineResult<ProvisioningOutput> {
        self.record("outputs", env);
        Ok(self.output.clone())
    }

    async fn destroy(&self, env: Environment) -> EngineResult<()> {
        self.record("destroy", env);
        Ok(())
    }

    async fn has_state(&self, env: Environment) -> EngineResult<bool> {
        Ok(self.state.contains(&env))
    }

    fn engine_name(&self) -> &'static str {
        "mock-terraform"
    }
}

#[derive(Default)]
struct MockConfigurator {
    calls: Mutex<Vec<(PathBuf, Environment)>>,
    fail: bool,
}

#[async_trait]
impl Configurator for MockConfigurator {
    async fn ping(&self, _inventory: &Path, _env: Environment) -> EngineResult<()> {
        Ok(())
    }

    async fn run(&self, inventory: &Path, env: Environment) -> EngineResult<()> {
        self.calls
            .lock()
            .unwrap()
            .push((inventory.to_path_buf(), env));
        if self.fail {
            return Err(EngineError::CommandFailed {
                program: "ansible-playbook".to_string(),
                status: "exit status: 2".to_string(),
                stderr: "UNREACHABLE! => changed=false".to_string(),
            });
        }
        Ok(())
    }

    fn engine_name(&self) -> &'static str {
        "mock-ansible"
    }
}

fn local_output() -> ProvisioningOutput {
    ProvisioningOutput {
        instance_id: Some("i-abc123".to_string()),
        public_ip: Some("127.0.0.1".to_string()),
        private_ip: Some("10.0.1.5".to_string()),
        web_url: None,
        ssh_command: Some("ssh -i key.pem ubuntu@127.0.0.1".to_string()),
        key_name: Some("opsforge-key".to_string()),
    }
}

fn test_config(dir: &Path, ssh_port: u16) -> ProjectConfig {
    let mut config = ProjectConfig::new("ap-south-1")
        .with_inventory_dir(dir.join("inventory"))
        .with_readiness(RetryPolicy::new(3, 0))
        .with_health(RetryPolicy::new(1, 0));
    config.ssh_port = ssh_port;
    config
}

/// Listener kept alive so connections land in its backlog
async fn open_port() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

async fn closed_port() -> u16 {
    let (listener, port) = open_port().await;
    drop(listener);
    port
}

#[tokio::test]
async fn test_successful_deploy_writes_inventory_and_configures() {
    let dir = tempfile::tempdir().unwrap();
    let (_listener, port) = open_port().await;
    let config = test_config(dir.path(), port);

    let provisioner = MockProvisioner::with_output(local_output());
    let configurator = MockConfigurator::default();
    let pipeline = Pipeline::new(&config, &provisioner, &configurator);

    let options = DeployOptions {
        skip_health: true,
        ..Default::default()
    };
    let result = pipeline.deploy(Environment::Dev, options).await;

    assert_eq!(result.status, DeploymentStatus::Succeeded);
    assert!(result.succeeded());
    assert_eq!(result.endpoint.as_deref(), Some("http://127.0.0.1"));

    let inventory_path = config.inventory_path(Environment::Dev, "ini");
    let content = std::fs::read_to_string(&inventory_path).unwrap();
    assert!(content.contains("[dev-web]"));
    assert!(content.contains("127.0.0.1 ansible_user=ubuntu"));
    assert!(content.contains("env=dev"));

    let calls = configurator.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0], (inventory_path, Environment::Dev));
}

#[tokio::test]
async fn test_plan_only_stops_before_apply() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), 22);

    let provisioner = MockProvisioner::with_output(local_output());
    let configurator = MockConfigurator::default();
    let pipeline = Pipeline::new(&config, &provisioner, &configurator);

    let options = DeployOptions {
        plan_only: true,
        ..Default::default()
    };
    let result = pipeline.deploy(Environment::Dev, options).await;

    assert_eq!(result.status, DeploymentStatus::PlanOnly);
    assert!(result.succeeded());
    assert!(provisioner.called("plan", Environment::Dev));
    assert!(!provisioner.called("apply", Environment::Dev));
    assert!(!config.inventory_path(Environment::Dev, "ini").exists());
}

#[tokio::test]
async fn test_missing_public_ip_fails_inventory_without_writing() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), 22);

    let output = ProvisioningOutput {
        public_ip: None,
        ..local_output()
    };
    let provisioner = MockProvisioner::with_output(output);
    let configurator = MockConfigurator::default();
    let pipeline = Pipeline::new(&config, &provisioner, &configurator);

    let result = pipeline
        .deploy(Environment::Dev, DeployOptions::default())
        .await;

    assert_eq!(result.status, DeploymentStatus::InventoryFailed);
    assert!(result.failure.as_deref().unwrap().contains("public_ip"));
    assert!(result.status.infrastructure_up());
    assert!(!config.inventory_path(Environment::Dev, "ini").exists());
    assert!(configurator.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_provisioning_failure_surfaces_stderr_verbatim() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), 22);

    let provisioner = MockProvisioner {
        fail_apply_for: Some(Environment::Dev),
        output: local_output(),
        ..Default::default()
    };
    let configurator = MockConfigurator::default();
    let pipeline = Pipeline::new(&config, &provisioner, &configurator);

    let result = pipeline
        .deploy(Environment::Dev, DeployOptions::default())
        .await;

    assert_eq!(result.status, DeploymentStatus::ProvisioningFailed);
    assert!(!result.status.infrastructure_up());
    assert!(result
        .failure
        .as_deref()
        .unwrap()
        .contains("Error: creating EC2 instance"));
    assert!(configurator.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_configuration_failure_is_distinguishable_partial_failure() {
    let dir = tempfile::tempdir().unwrap();
    let (_listener, port) = open_port().await;
    let config = test_config(dir.path(), port);

    let provisioner = MockProvisioner::with_output(local_output());
    let configurator = MockConfigurator {
        fail: true,
        ..Default::default()
    };
    let pipeline = Pipeline::new(&config, &provisioner, &configurator);

    let result = pipeline
        .deploy(Environment::Staging, DeployOptions::default())
        .await;

    assert_eq!(result.status, DeploymentStatus::ConfigurationFailed);
    assert!(!result.succeeded());
    // Infrastructure is up even though the run failed
    assert!(result.status.infrastructure_up());
    assert_ne!(result.status, DeploymentStatus::ProvisioningFailed);
    assert!(result.endpoint.is_some());
}

#[tokio::test]
async fn test_unreachable_host_exhausts_readiness_budget() {
    let dir = tempfile::tempdir().unwrap();
    let port = closed_port().await;
    let config = test_config(dir.path(), port);

    let provisioner = MockProvisioner::with_output(local_output());
    let configurator = MockConfigurator::default();
    let pipeline = Pipeline::new(&config, &provisioner, &configurator);

    let result = pipeline
        .deploy(Environment::Dev, DeployOptions::default())
        .await;

    assert_eq!(result.status, DeploymentStatus::UnreachableHost);
    assert!(result.failure.as_deref().unwrap().contains("3 attempts"));
    assert!(configurator.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_batch_continues_past_failed_environment() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), 22);

    let provisioner = MockProvisioner {
        fail_apply_for: Some(Environment::Dev),
        output: local_output(),
        ..Default::default()
    };
    let configurator = MockConfigurator::default();
    let pipeline = Pipeline::new(&config, &provisioner, &configurator);

    let options = DeployOptions {
        skip_config: true,
        skip_health: true,
        ..Default::default()
    };
    let results = pipeline
        .deploy_many(&[Environment::Dev, Environment::Staging], options)
        .await;

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].status, DeploymentStatus::ProvisioningFailed);
    assert_eq!(results[1].status, DeploymentStatus::Succeeded);
    assert!(provisioner.called("apply", Environment::Staging));
}

#[tokio::test]
async fn test_combined_inventory_skips_environments_without_state() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), 22);

    let provisioner = MockProvisioner {
        output: local_output(),
        state: vec![Environment::Dev],
        ..Default::default()
    };

    let outcome = synth::collect(&config, &provisioner, &Environment::all()).await;

    assert!(outcome.failures.is_empty());
    assert_eq!(
        outcome.skipped,
        vec![Environment::Staging, Environment::Prod]
    );
    assert_eq!(outcome.inventory.hosts.len(), 1);
    assert_eq!(outcome.inventory.hosts[0].name, "dev-web-server");

    let combined = inventory::render(&outcome.inventory, Format::Ini).unwrap();
    assert!(combined.contains("[dev-web]"));
    assert!(!combined.contains("[staging-web]"));
    assert!(!combined.contains("[prod-web]"));
}

#[tokio::test]
async fn test_collect_reports_missing_outputs_per_environment() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), 22);

    let provisioner = MockProvisioner {
        output: ProvisioningOutput {
            public_ip: None,
            ..local_output()
        },
        state: vec![Environment::Dev, Environment::Staging],
        ..Default::default()
    };

    let outcome = synth::collect(&config, &provisioner, &Environment::all()).await;

    // Both stateful environments fail, the stateless one is skipped; the
    // batch itself never aborts
    assert_eq!(outcome.failures.len(), 2);
    assert_eq!(outcome.skipped, vec![Environment::Prod]);
    assert!(outcome.inventory.is_empty());
}

#[tokio::test]
async fn test_backend_teardown_refused_while_state_exists() {
    let provisioner = MockProvisioner {
        state: vec![Environment::Dev],
        ..Default::default()
    };

    let err = backend::ensure_no_state(&provisioner, false)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("dev"));
    assert!(err.to_string().contains("--force"));

    // Force skips the guard entirely
    backend::ensure_no_state(&provisioner, true).await.unwrap();
}

#[tokio::test]
async fn test_backend_teardown_allowed_once_states_are_gone() {
    let provisioner = MockProvisioner::default();
    backend::ensure_no_state(&provisioner, false).await.unwrap();
}

#[tokio::test]
async fn test_destroy_removes_generated_inventory() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), 22);

    std::fs::create_dir_all(config.inventory_dir.as_path()).unwrap();
    let path = config.inventory_path(Environment::Dev, "ini");
    std::fs::write(&path, "[dev-web]\n").unwrap();

    let provisioner = MockProvisioner::default();
    teardown::destroy_environment(&config, &provisioner, Environment::Dev, false)
        .await
        .unwrap();

    assert!(provisioner.called("destroy", Environment::Dev));
    assert!(!path.exists());
}

#[tokio::test]
async fn test_destroy_can_keep_inventory() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), 22);

    std::fs::create_dir_all(config.inventory_dir.as_path()).unwrap();
    let path = config.inventory_path(Environment::Dev, "ini");
    std::fs::write(&path, "[dev-web]\n").unwrap();

    let provisioner = MockProvisioner::default();
    teardown::destroy_environment(&config, &provisioner, Environment::Dev, true)
        .await
        .unwrap();

    assert!(path.exists());
}
