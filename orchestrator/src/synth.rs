//! Builds inventory records out of provisioning outputs (or discovered
//! instances) and decides what a combined multi-environment view contains.

use engine::{Ec2Instance, EngineError, Environment, ProjectConfig, Provisioner, ProvisioningOutput};
use inventory::{host_name, HostRecord, Inventory, InventoryError};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum SynthError {
    #[error("Provisioning output for {environment} is missing required value '{name}'")]
    MissingOutput {
        environment: Environment,
        name: &'static str,
    },

    #[error("Inventory error: {0}")]
    Inventory(#[from] InventoryError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
}

pub type SynthResult<T> = Result<T, SynthError>;

/// Connection defaults shared by every generated inventory
pub fn base_inventory() -> Inventory {
    Inventory::new()
        .with_var(
            "ansible_ssh_common_args",
            "-o StrictHostKeyChecking=no -o UserKnownHostsFile=/dev/null",
        )
        .with_var("ansible_python_interpreter", "/usr/bin/python3")
}

/// Build one environment's host record from its provisioning outputs.
///
/// Address and instance id must be present; the key file falls back to the
/// configured key when the outputs carry no key name.
pub fn host_record(
    config: &ProjectConfig,
    env: Environment,
    output: &ProvisioningOutput,
) -> SynthResult<HostRecord> {
    let address = output
        .public_ip
        .clone()
        .ok_or(SynthError::MissingOutput {
            environment: env,
            name: "public_ip",
        })?;

    let instance_id = output
        .instance_id
        .clone()
        .ok_or(SynthError::MissingOutput {
            environment: env,
            name: "instance_id",
        })?;

    let key_file = output
        .key_name
        .as_ref()
        .map(|key| format!("~/.ssh/{}.pem", key))
        .unwrap_or_else(|| config.ssh_key_path.clone());

    Ok(HostRecord {
        name: host_name(env.name()),
        environment: env.name().to_string(),
        address,
        instance_id,
        user: config.ssh_user.clone(),
        key_file,
        private_ip: output.private_ip.clone(),
    })
}

/// Result of collecting hosts across environments
#[derive(Debug)]
pub struct CollectOutcome {
    pub inventory: Inventory,
    /// Environments with no deployed state, omitted without failing
    pub skipped: Vec<Environment>,
    /// Environments whose synthesis failed; the batch keeps going
    pub failures: Vec<(Environment, SynthError)>,
}

/// Collect host records for the given environments from deployed state.
///
/// Environments without state are skipped and logged; per-environment
/// failures are collected rather than aborting the batch.
pub async fn collect<P: Provisioner + ?Sized>(
    config: &ProjectConfig,
    provisioner: &P,
    environments: &[Environment],
) -> CollectOutcome {
    let mut outcome = CollectOutcome {
        inventory: base_inventory(),
        skipped: Vec::new(),
        failures: Vec::new(),
    };

    for &env in environments {
        match provisioner.has_state(env).await {
            Ok(false) => {
                warn!(env = %env, "no deployed state, omitting from inventory");
                outcome.skipped.push(env);
                continue;
            }
            Err(e) => {
                outcome.failures.push((env, e.into()));
                continue;
            }
            Ok(true) => {}
        }

        let record = match provisioner.outputs(env).await {
            Ok(output) => host_record(config, env, &output),
            Err(e) => Err(e.into()),
        };

        match record {
            Ok(host) => {
                info!(env = %env, host = %host.name, "added host from deployed state");
                outcome.inventory.push(host);
            }
            Err(e) => outcome.failures.push((env, e)),
        }
    }

    outcome
}

/// Build an inventory from tagged EC2 instances instead of deployed state.
///
/// Instances without an Environment tag or a public address are not
/// addressable as managed hosts and are skipped.
pub fn from_ec2(config: &ProjectConfig, instances: &[Ec2Instance]) -> Inventory {
    let mut result = base_inventory();

    for instance in instances {
        let (Some(environment), Some(address)) =
            (instance.environment.as_deref(), instance.public_ip.clone())
        else {
            warn!(
                instance = %instance.instance_id,
                "instance has no environment tag or public address, skipping"
            );
            continue;
        };

        let key_file = instance
            .key_name
            .as_ref()
            .map(|key| format!("~/.ssh/{}.pem", key))
            .unwrap_or_else(|| config.ssh_key_path.clone());

        result.push(HostRecord {
            name: host_name(environment),
            environment: environment.to_string(),
            address,
            instance_id: instance.instance_id.clone(),
            user: config.ssh_user.clone(),
            key_file,
            private_ip: instance.private_ip.clone(),
        });
    }

    result
}
