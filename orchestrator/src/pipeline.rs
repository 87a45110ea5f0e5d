//! The per-environment deployment pipeline:
//! provision → synthesize inventory → readiness gate → configure → verify.
//!
//! Each stage blocks until the invoked engine exits, and each stage's input
//! is the previous stage's output; stages are strictly ordered within one
//! environment. Batch runs collect per-environment failures instead of
//! aborting on the first one.

use crate::{health, readiness, synth};
use chrono::Utc;
use engine::{
    Configurator, DeploymentResult, DeploymentStatus, Environment, ProjectConfig, Provisioner,
};
use inventory::Format;
use std::fmt::Display;
use tracing::{error, info, warn};

/// Flags controlling how much of the pipeline runs
#[derive(Debug, Clone, Copy, Default)]
pub struct DeployOptions {
    /// Stop after producing the plan artifact
    pub plan_only: bool,
    /// Provision and synthesize inventory, but run no configuration
    pub skip_config: bool,
    /// Skip endpoint verification
    pub skip_health: bool,
}

pub struct Pipeline<'a, P: Provisioner, C: Configurator> {
    config: &'a ProjectConfig,
    provisioner: &'a P,
    configurator: &'a C,
}

fn fail(
    mut result: DeploymentResult,
    status: DeploymentStatus,
    stage: &str,
    err: &dyn Display,
) -> DeploymentResult {
    error!(stage, env = %result.environment, "{} failed for {}: {}", stage, result.environment, err);
    result.status = status;
    result.failure = Some(format!("{}: {}", stage, err));
    result.finished_at = Utc::now();
    result
}

impl<'a, P: Provisioner, C: Configurator> Pipeline<'a, P, C> {
    pub fn new(config: &'a ProjectConfig, provisioner: &'a P, configurator: &'a C) -> Self {
        Self {
            config,
            provisioner,
            configurator,
        }
    }

    /// Deploy one environment end to end.
    ///
    /// Never returns Err: every stage failure is folded into the result's
    /// status so batch runs can keep going and report at the end.
    pub async fn deploy(&self, env: Environment, options: DeployOptions) -> DeploymentResult {
        let mut result = DeploymentResult::new(env, DeploymentStatus::Succeeded);
        result.started_at = Utc::now();

        info!(env = %env, engine = self.provisioner.engine_name(), "starting deployment");

        if let Err(e) = self.provisioner.init(env).await {
            return fail(result, DeploymentStatus::ProvisioningFailed, "provision", &e);
        }
        if let Err(e) = self.provisioner.plan(env).await {
            return fail(result, DeploymentStatus::ProvisioningFailed, "provision", &e);
        }

        if options.plan_only {
            info!(env = %env, "plan-only run, stopping before apply");
            result.status = DeploymentStatus::PlanOnly;
            result.finished_at = Utc::now();
            return result;
        }

        if let Err(e) = self.provisioner.apply(env).await {
            return fail(result, DeploymentStatus::ProvisioningFailed, "provision", &e);
        }

        let output = match self.provisioner.outputs(env).await {
            Ok(output) => output,
            Err(e) => return fail(result, DeploymentStatus::InventoryFailed, "inventory", &e),
        };
        result.endpoint = output.endpoint();

        let host = match synth::host_record(self.config, env, &output) {
            Ok(host) => host,
            Err(e) => return fail(result, DeploymentStatus::InventoryFailed, "inventory", &e),
        };
        let address = host.address.clone();

        let mut hosts = synth::base_inventory();
        hosts.push(host);

        let inventory_path = self.config.inventory_path(env, Format::Ini.extension());
        if let Err(e) = inventory::write_file(&hosts, Format::Ini, &inventory_path) {
            return fail(result, DeploymentStatus::InventoryFailed, "inventory", &e);
        }
        info!(env = %env, path = %inventory_path.display(), "inventory written");

        if options.skip_config {
            info!(env = %env, "skipping configuration");
        } else {
            if let Err(e) =
                readiness::wait_for_port(&address, self.config.ssh_port, &self.config.readiness)
                    .await
            {
                return fail(result, DeploymentStatus::UnreachableHost, "readiness", &e);
            }

            if let Err(e) = self.configurator.run(&inventory_path, env).await {
                return fail(result, DeploymentStatus::ConfigurationFailed, "configure", &e);
            }
        }

        if options.skip_health {
            info!(env = %env, "skipping health verification");
        } else if let Some(url) = &result.endpoint {
            match health::verify(url, &self.config.health).await {
                Ok(_) => result.health_verified = true,
                Err(e) => {
                    // Degrades confidence, never the deployment status
                    warn!(
                        env = %env,
                        "health verification did not pass: {}; deployment still succeeded", e
                    );
                }
            }
        } else {
            warn!(env = %env, "no endpoint to verify");
        }

        result.finished_at = Utc::now();
        info!(env = %env, status = %result.status, "deployment finished");
        result
    }

    /// Deploy several environments sequentially, collecting every result.
    pub async fn deploy_many(
        &self,
        environments: &[Environment],
        options: DeployOptions,
    ) -> Vec<DeploymentResult> {
        let mut results = Vec::with_capacity(environments.len());

        for &env in environments {
            let result = self.deploy(env, options).await;
            if !result.succeeded() {
                error!(env = %env, "deployment failed, continuing with remaining environments");
            }
            results.push(result);
        }

        results
    }
}
