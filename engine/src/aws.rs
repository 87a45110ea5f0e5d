use crate::config::ProjectConfig;
use crate::provider::{EngineError, EngineResult};
use serde_json::Value;
use std::io::ErrorKind;
use std::process::{Command, Output, Stdio};
use tracing::debug;

/// AWS CLI wrapper used for backend storage management and instance discovery.
#[derive(Debug, Clone)]
pub struct AwsCli {
    bin: String,
    region: String,
}

/// A running EC2 instance discovered through instance tags
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ec2Instance {
    pub instance_id: String,
    pub environment: Option<String>,
    pub public_ip: Option<String>,
    pub private_ip: Option<String>,
    pub key_name: Option<String>,
    pub instance_type: Option<String>,
}

impl AwsCli {
    pub fn new(bin: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            bin: bin.into(),
            region: region.into(),
        }
    }

    pub fn from_config(config: &ProjectConfig) -> Self {
        Self::new(&config.aws_bin, &config.region)
    }

    /// Whether the aws binary is invocable
    pub fn probe(&self) -> bool {
        Command::new(&self.bin)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok_and(|status| status.success())
    }

    fn exec(&self, args: &[&str]) -> EngineResult<Output> {
        debug!("running {} {}", self.bin, args.join(" "));

        let output = Command::new(&self.bin)
            .args(args)
            .args(["--region", &self.region])
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

    /// Existence probes treat a failed call as "absent", never as an error;
    /// that is what makes the bootstrap idempotent.
    fn exists(&self, args: &[&str]) -> EngineResult<bool> {
        match self.exec(args) {
            Ok(_) => Ok(true),
            Err(EngineError::CommandFailed { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// ARN of the configured credentials, or an error when none resolve
    pub fn caller_identity(&self) -> EngineResult<String> {
        let output = self.exec(&["sts", "get-caller-identity", "--output", "json"])?;
        let document: Value = serde_json::from_slice(&output.stdout)?;
        document
            .get("Arn")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| EngineError::UnexpectedOutput {
                program: "aws sts get-caller-identity".to_string(),
                reason: "response has no Arn field".to_string(),
            })
    }

    pub fn bucket_exists(&self, name: &str) -> EngineResult<bool> {
        self.exists(&["s3api", "head-bucket", "--bucket", name])
    }

    pub fn create_bucket(&self, name: &str) -> EngineResult<()> {
        // us-east-1 rejects an explicit LocationConstraint
        if self.region == "us-east-1" {
            self.exec(&["s3api", "create-bucket", "--bucket", name])?;
        } else {
            let constraint = format!("LocationConstraint={}", self.region);
            self.exec(&[
                "s3api",
                "create-bucket",
                "--bucket",
                name,
                "--create-bucket-configuration",
                &constraint,
            ])?;
        }
        Ok(())
    }

    pub fn enable_bucket_versioning(&self, name: &str) -> EngineResult<()> {
        self.exec(&[
            "s3api",
            "put-bucket-versioning",
            "--bucket",
            name,
            "--versioning-configuration",
            "Status=Enabled",
        ])?;
        Ok(())
    }

    pub fn enable_bucket_encryption(&self, name: &str) -> EngineResult<()> {
        self.exec(&[
            "s3api",
            "put-bucket-encryption",
            "--bucket",
            name,
            "--server-side-encryption-configuration",
            r#"{"Rules":[{"ApplyServerSideEncryptionByDefault":{"SSEAlgorithm":"AES256"}}]}"#,
        ])?;
        Ok(())
    }

    /// Remove the bucket and everything in it
    pub fn delete_bucket(&self, name: &str) -> EngineResult<()> {
        let uri = format!("s3://{}", name);
        self.exec(&["s3", "rb", &uri, "--force"])?;
        Ok(())
    }

    pub fn table_exists(&self, name: &str) -> EngineResult<bool> {
        self.exists(&["dynamodb", "describe-table", "--table-name", name])
    }

    /// Table status string (CREATING, ACTIVE, ...), or None when absent
    pub fn table_status(&self, name: &str) -> EngineResult<Option<String>> {
        match self.exec(&[
            "dynamodb",
            "describe-table",
            "--table-name",
            name,
            "--output",
            "json",
        ]) {
            Ok(output) => {
                let document: Value = serde_json::from_slice(&output.stdout)?;
                Ok(parse_table_status(&document))
            }
            Err(EngineError::CommandFailed { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn create_lock_table(&self, name: &str) -> EngineResult<()> {
        self.exec(&[
            "dynamodb",
            "create-table",
            "--table-name",
            name,
            "--attribute-definitions",
            "AttributeName=LockID,AttributeType=S",
            "--key-schema",
            "AttributeName=LockID,KeyType=HASH",
            "--billing-mode",
            "PAY_PER_REQUEST",
        ])?;
        Ok(())
    }

    pub fn delete_table(&self, name: &str) -> EngineResult<()> {
        self.exec(&["dynamodb", "delete-table", "--table-name", name])?;
        Ok(())
    }

    /// Running instances tagged with the given project name
    pub fn running_instances(&self, project: &str) -> EngineResult<Vec<Ec2Instance>> {
        let project_filter = format!("Name=tag:Project,Values={}", project);
        let output = self.exec(&[
            "ec2",
            "describe-instances",
            "--filters",
            &project_filter,
            "Name=instance-state-name,Values=running,pending",
            "--output",
            "json",
        ])?;

        let document: Value = serde_json::from_slice(&output.stdout)?;
        Ok(instances_from_json(&document))
    }
}

fn parse_table_status(document: &Value) -> Option<String> {
    document
        .get("Table")
        .and_then(|t| t.get("TableStatus"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn instances_from_json(document: &Value) -> Vec<Ec2Instance> {
    let mut instances = Vec::new();

    let reservations = document
        .get("Reservations")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    for reservation in &reservations {
        let Some(members) = reservation.get("Instances").and_then(Value::as_array) else {
            continue;
        };

        for instance in members {
            let Some(instance_id) = instance
                .get("InstanceId")
                .and_then(Value::as_str)
                .map(str::to_string)
            else {
                continue;
            };

            let str_field = |name: &str| {
                instance
                    .get(name)
                    .and_then(Value::as_str)
                    .map(str::to_string)
            };

            let environment = instance
                .get("Tags")
                .and_then(Value::as_array)
                .and_then(|tags| {
                    tags.iter().find_map(|tag| {
                        (tag.get("Key").and_then(Value::as_str) == Some("Environment"))
                            .then(|| tag.get("Value").and_then(Value::as_str))
                            .flatten()
                            .map(str::to_string)
                    })
                });

            instances.push(Ec2Instance {
                instance_id,
                environment,
                public_ip: str_field("PublicIpAddress"),
                private_ip: str_field("PrivateIpAddress"),
                key_name: str_field("KeyName"),
                instance_type: str_field("InstanceType"),
            });
        }
    }

    instances
}
