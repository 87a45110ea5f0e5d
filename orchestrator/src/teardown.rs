//! Teardown reverses the pipeline: destroy resources, then delete the
//! inventory artifacts generated for the environment.

use engine::{EngineError, Environment, ProjectConfig, Provisioner};
use inventory::Format;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum TeardownError {
    #[error("Destroy failed: {0}")]
    Engine(#[from] EngineError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type TeardownResult<T> = Result<T, TeardownError>;

/// Destroy one environment's resources and, unless kept, its generated
/// inventory files.
pub async fn destroy_environment<P: Provisioner + ?Sized>(
    config: &ProjectConfig,
    provisioner: &P,
    env: Environment,
    keep_inventory: bool,
) -> TeardownResult<()> {
    provisioner.destroy(env).await?;
    info!(env = %env, "resources destroyed");

    if !keep_inventory {
        let removed = remove_inventory_artifacts(config, env)?;
        for path in &removed {
            info!(env = %env, path = %path.display(), "removed inventory artifact");
        }
    }

    Ok(())
}

/// Delete every generated inventory encoding for an environment; missing
/// files are not an error.
pub fn remove_inventory_artifacts(
    config: &ProjectConfig,
    env: Environment,
) -> std::io::Result<Vec<PathBuf>> {
    let mut removed = Vec::new();

    for format in Format::all() {
        let path = config.inventory_path(env, format.extension());
        if path.exists() {
            fs::remove_file(&path)?;
            removed.push(path);
        }
    }

    Ok(removed)
}
