//! Backend bootstrap and teardown: the S3 state buckets, the DynamoDB lock
//! table, and the generated backend configuration files.

use crate::retry::{retry_until, RetryExhausted};
use engine::{AwsCli, EngineError, Environment, ProjectConfig, Provisioner, RetryPolicy};
use std::fs;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, warn};

/// Lock-table creation is quick; poll briefly until it reports ACTIVE
const TABLE_ACTIVE_POLICY: RetryPolicy = RetryPolicy::new(30, 2);

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Backend operation failed: {0}")]
    Engine(#[from] EngineError),

    #[error("Lock table '{table}' never became ACTIVE ({source})")]
    LockTableNotActive {
        table: String,
        source: RetryExhausted,
    },

    #[error(
        "Environments still have deployed state: {environments}. \
         Destroy them first, or pass --force to delete backend storage anyway."
    )]
    StatesStillPresent { environments: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Idempotently ensure state buckets and the lock table exist, then write
/// the backend configuration files `terraform init` consumes.
///
/// All-or-nothing: the first creation error aborts the whole bootstrap.
pub async fn bootstrap(config: &ProjectConfig, aws: &AwsCli) -> BackendResult<()> {
    for env in Environment::all() {
        let bucket = config.state_bucket(env);

        if aws.bucket_exists(&bucket)? {
            info!(env = %env, bucket = %bucket, "state bucket already exists");
        } else {
            info!(env = %env, bucket = %bucket, "creating state bucket");
            aws.create_bucket(&bucket)?;
            aws.enable_bucket_versioning(&bucket)?;
            if env.profile().encrypted_state {
                aws.enable_bucket_encryption(&bucket)?;
            }
        }
    }

    let table = config.lock_table();
    if aws.table_exists(&table)? {
        info!(table = %table, "lock table already exists");
    } else {
        info!(table = %table, "creating lock table");
        aws.create_lock_table(&table)?;
    }

    retry_until(&TABLE_ACTIVE_POLICY, "lock table ACTIVE", || {
        let table = table.clone();
        async move { aws.table_status(&table).ok().flatten().as_deref() == Some("ACTIVE") }
    })
    .await
    .map_err(|source| BackendError::LockTableNotActive {
        table: table.clone(),
        source,
    })?;

    for env in Environment::all() {
        let path = write_backend_config(config, env)?;
        info!(env = %env, path = %path.display(), "wrote backend configuration");
    }

    Ok(())
}

/// Generate one environment's backend configuration file
pub fn write_backend_config(config: &ProjectConfig, env: Environment) -> std::io::Result<PathBuf> {
    let content = format!(
        "bucket         = \"{bucket}\"\n\
         key            = \"terraform.tfstate\"\n\
         region         = \"{region}\"\n\
         dynamodb_table = \"{table}\"\n\
         encrypt        = {encrypt}\n",
        bucket = config.state_bucket(env),
        region = config.region,
        table = config.lock_table(),
        encrypt = env.profile().encrypted_state,
    );

    let path = config.backend_config_path(env);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, content)?;
    Ok(path)
}

/// Refuse backend deletion while environment state still references it.
///
/// Deleting the state storage out from under a live environment is
/// unrecoverable, so this check can only be skipped explicitly.
pub async fn ensure_no_state(provisioner: &dyn Provisioner, force: bool) -> BackendResult<()> {
    if force {
        warn!("--force given, skipping deployed-state check");
        return Ok(());
    }

    let mut remaining = Vec::new();
    for env in Environment::all() {
        if provisioner.has_state(env).await? {
            remaining.push(env.name());
        }
    }

    if remaining.is_empty() {
        Ok(())
    } else {
        Err(BackendError::StatesStillPresent {
            environments: remaining.join(", "),
        })
    }
}

/// Delete backend storage, the lock table, and generated backend files.
pub async fn teardown(
    config: &ProjectConfig,
    aws: &AwsCli,
    provisioner: &dyn Provisioner,
    force: bool,
) -> BackendResult<()> {
    ensure_no_state(provisioner, force).await?;

    for env in Environment::all() {
        let bucket = config.state_bucket(env);
        if aws.bucket_exists(&bucket)? {
            info!(env = %env, bucket = %bucket, "deleting state bucket");
            aws.delete_bucket(&bucket)?;
        }
    }

    let table = config.lock_table();
    if aws.table_exists(&table)? {
        info!(table = %table, "deleting lock table");
        aws.delete_table(&table)?;
    }

    for env in Environment::all() {
        let path = config.backend_config_path(env);
        if path.exists() {
            fs::remove_file(&path)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_config_content() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProjectConfig::new("ap-south-1")
            .with_project_name("demo")
            .with_terraform_dir(dir.path());

        let path = write_backend_config(&config, Environment::Prod).unwrap();
        let content = fs::read_to_string(&path).unwrap();

        assert!(content.contains("bucket         = \"demo-terraform-state-prod\""));
        assert!(content.contains("region         = \"ap-south-1\""));
        assert!(content.contains("dynamodb_table = \"demo-terraform-locks\""));
        assert!(content.contains("encrypt        = true"));
    }

    #[test]
    fn test_dev_backend_config_is_unencrypted() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProjectConfig::new("ap-south-1").with_terraform_dir(dir.path());

        let path = write_backend_config(&config, Environment::Dev).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("encrypt        = false"));
    }
}
