use crate::environment::Environment;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Named values exported by the provisioning engine after a successful apply.
///
/// Parsed from `terraform output -json`, where every output is wrapped in a
/// `{"value": ...}` object. All fields are optional at this layer; inventory
/// synthesis decides which ones are required.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningOutput {
    pub instance_id: Option<String>,
    pub public_ip: Option<String>,
    pub private_ip: Option<String>,
    pub web_url: Option<String>,
    pub ssh_command: Option<String>,
    pub key_name: Option<String>,
}

impl ProvisioningOutput {
    /// Parse the JSON document printed by `terraform output -json`
    pub fn from_output_json(value: &Value) -> Self {
        let get = |name: &str| {
            value
                .get(name)
                .and_then(|o| o.get("value"))
                .and_then(Value::as_str)
                .map(str::to_string)
        };

        Self {
            instance_id: get("instance_id"),
            public_ip: get("public_ip"),
            private_ip: get("private_ip"),
            web_url: get("web_url"),
            ssh_command: get("ssh_command"),
            key_name: get("key_name"),
        }
    }

    /// Endpoint used by health verification, derived from the outputs
    pub fn endpoint(&self) -> Option<String> {
        self.web_url.clone().or_else(|| {
            self.public_ip
                .as_ref()
                .map(|ip| format!("http://{}", ip))
        })
    }
}

/// Terminal state of one environment's deployment run.
///
/// `ConfigurationFailed` and `UnreachableHost` mean infrastructure was
/// provisioned but configuration did not complete; they are deliberately
/// distinct from `ProvisioningFailed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeploymentStatus {
    /// Full pipeline completed
    Succeeded,
    /// Run stopped after producing a plan artifact
    PlanOnly,
    /// The provisioning engine failed; no infrastructure is assumed
    ProvisioningFailed,
    /// Provisioning succeeded but required outputs were missing
    InventoryFailed,
    /// Host never accepted management connections
    UnreachableHost,
    /// Infrastructure is up but the configuration engine failed
    ConfigurationFailed,
}

impl DeploymentStatus {
    pub const fn is_success(&self) -> bool {
        matches!(self, DeploymentStatus::Succeeded | DeploymentStatus::PlanOnly)
    }

    /// Whether infrastructure exists despite the run failing
    pub const fn infrastructure_up(&self) -> bool {
        matches!(
            self,
            DeploymentStatus::Succeeded
                | DeploymentStatus::InventoryFailed
                | DeploymentStatus::UnreachableHost
                | DeploymentStatus::ConfigurationFailed
        )
    }
}

impl std::fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            DeploymentStatus::Succeeded => "succeeded",
            DeploymentStatus::PlanOnly => "plan-only",
            DeploymentStatus::ProvisioningFailed => "provisioning failed",
            DeploymentStatus::InventoryFailed => "inventory synthesis failed",
            DeploymentStatus::UnreachableHost => "host unreachable",
            DeploymentStatus::ConfigurationFailed => "configuration failed",
        };
        f.write_str(label)
    }
}

/// Summary of one environment's deployment run, reported at the end and not
/// persisted anywhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentResult {
    pub environment: Environment,
    pub status: DeploymentStatus,
    /// Deployed endpoint URL, when provisioning got far enough to know it
    pub endpoint: Option<String>,
    /// Cleared when health verification exhausted its budget; a false value
    /// degrades confidence but never the status
    pub health_verified: bool,
    /// Failure detail for the stage that ended the run
    pub failure: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl DeploymentResult {
    pub fn new(environment: Environment, status: DeploymentStatus) -> Self {
        let now = Utc::now();
        Self {
            environment,
            status,
            endpoint: None,
            health_verified: false,
            failure: None,
            started_at: now,
            finished_at: now,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status.is_success()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_terraform_outputs() {
        let doc = json!({
            "instance_id": {"sensitive": false, "type": "string", "value": "i-abc123"},
            "public_ip": {"value": "203.0.113.10"},
            "ssh_command": {"value": "ssh -i key.pem ubuntu@203.0.113.10"},
        });

        let output = ProvisioningOutput::from_output_json(&doc);
        assert_eq!(output.instance_id.as_deref(), Some("i-abc123"));
        assert_eq!(output.public_ip.as_deref(), Some("203.0.113.10"));
        assert_eq!(
            output.ssh_command.as_deref(),
            Some("ssh -i key.pem ubuntu@203.0.113.10")
        );
        assert_eq!(output.private_ip, None);
        assert_eq!(output.key_name, None);
    }

    #[test]
    fn test_parse_empty_outputs() {
        let output = ProvisioningOutput::from_output_json(&json!({}));
        assert_eq!(output, ProvisioningOutput::default());
    }

    #[test]
    fn test_endpoint_prefers_web_url() {
        let output = ProvisioningOutput {
            public_ip: Some("203.0.113.10".to_string()),
            web_url: Some("http://203.0.113.10:8080".to_string()),
            ..Default::default()
        };
        assert_eq!(output.endpoint().as_deref(), Some("http://203.0.113.10:8080"));

        let output = ProvisioningOutput {
            public_ip: Some("203.0.113.10".to_string()),
            ..Default::default()
        };
        assert_eq!(output.endpoint().as_deref(), Some("http://203.0.113.10"));

        assert_eq!(ProvisioningOutput::default().endpoint(), None);
    }

    #[test]
    fn test_status_partial_failure_is_distinguishable() {
        assert!(DeploymentStatus::ConfigurationFailed.infrastructure_up());
        assert!(!DeploymentStatus::ConfigurationFailed.is_success());

        assert!(!DeploymentStatus::ProvisioningFailed.infrastructure_up());
        assert_ne!(
            DeploymentStatus::ConfigurationFailed,
            DeploymentStatus::ProvisioningFailed
        );
    }

    #[test]
    fn test_deployment_result() {
        let mut result =
            DeploymentResult::new(Environment::Dev, DeploymentStatus::Succeeded);
        result.health_verified = true;
        assert!(result.succeeded());

        let result = DeploymentResult::new(
            Environment::Prod,
            DeploymentStatus::ConfigurationFailed,
        );
        assert!(!result.succeeded());
        assert!(result.status.infrastructure_up());
    }
}
