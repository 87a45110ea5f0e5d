pub mod backend;
pub mod health;
pub mod pipeline;
pub mod preflight;
pub mod readiness;
pub mod retry;
pub mod synth;
pub mod teardown;

pub use backend::{bootstrap, ensure_no_state, write_backend_config, BackendError, BackendResult};
pub use health::HealthError;
pub use pipeline::{DeployOptions, Pipeline};
pub use preflight::PreflightError;
pub use retry::{retry_until, RetryExhausted};
pub use synth::{CollectOutcome, SynthError, SynthResult};
pub use teardown::{destroy_environment, remove_inventory_artifacts, TeardownError, TeardownResult};
