use clap::{Parser, Subcommand, ValueEnum};
use engine::{
    AnsibleCli, AwsCli, DeploymentResult, DeploymentStatus, Environment, ProjectConfig,
    TerraformCli,
};
use inventory::Format;
use orchestrator::pipeline::{DeployOptions, Pipeline};
use orchestrator::{backend, health, preflight, synth, teardown};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "opsforge")]
#[command(about = "Deploy and configure multi-environment AWS infrastructure")]
struct Cli {
    /// Project configuration file
    #[arg(long, global = true, default_value = "opsforge.toml")]
    config: PathBuf,
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision, configure and verify one environment or all of them
    Deploy {
        target: Target,
        /// Stop after producing a plan artifact, without applying
        #[arg(long)]
        plan_only: bool,
        /// Skip the configuration stage
        #[arg(long)]
        skip_config: bool,
        /// Skip endpoint health verification
        #[arg(long)]
        skip_health: bool,
        /// Run non-interactively, without the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Destroy deployed resources and generated inventory artifacts
    Destroy {
        target: Target,
        /// Run non-interactively, without the confirmation prompt
        #[arg(short, long)]
        yes: bool,
        /// Leave generated inventory files in place
        #[arg(long)]
        keep_inventory: bool,
        /// After destroying all environments, never offer to delete the
        /// backend state storage
        #[arg(long)]
        keep_backend: bool,
    },
    /// Ensure backend state storage and the lock table exist
    Bootstrap,
    /// Delete backend state storage and the lock table
    TeardownBackend {
        /// Delete even while environments still have deployed state
        #[arg(long)]
        force: bool,
    },
    /// Generate inventory files from deployed state
    Inventory {
        target: Target,
        /// Encoding(s) to write
        #[arg(long, value_enum, default_value = "ini")]
        format: FormatArg,
        /// Print the full JSON inventory to stdout instead of writing files
        #[arg(long)]
        list: bool,
        /// Print one host's variables as JSON
        #[arg(long)]
        host: Option<String>,
        /// Where host data comes from
        #[arg(long, value_enum, default_value = "terraform")]
        source: SourceArg,
    },
    /// Connectivity check against an environment's generated inventory
    Ping { environment: EnvArg },
    /// Poll an environment's endpoint until it reports healthy
    Health { environment: EnvArg },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Target {
    Dev,
    Staging,
    Prod,
    All,
}

impl Target {
    fn environments(self) -> Vec<Environment> {
        match self {
            Target::Dev => vec![Environment::Dev],
            Target::Staging => vec![Environment::Staging],
            Target::Prod => vec![Environment::Prod],
            Target::All => Environment::all().to_vec(),
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum EnvArg {
    Dev,
    Staging,
    Prod,
}

impl From<EnvArg> for Environment {
    fn from(arg: EnvArg) -> Self {
        match arg {
            EnvArg::Dev => Environment::Dev,
            EnvArg::Staging => Environment::Staging,
            EnvArg::Prod => Environment::Prod,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Ini,
    Json,
    Yaml,
    All,
}

impl FormatArg {
    fn formats(self) -> Vec<Format> {
        match self {
            FormatArg::Ini => vec![Format::Ini],
            FormatArg::Json => vec![Format::Json],
            FormatArg::Yaml => vec![Format::Yaml],
            FormatArg::All => Format::all().to_vec(),
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SourceArg {
    /// Deployed state queried through the provisioning engine
    Terraform,
    /// Running instances discovered through their tags
    Ec2,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::new(if cli.verbose { "debug" } else { "info" })
        });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Deploy {
            target,
            plan_only,
            skip_config,
            skip_health,
            yes,
        } => {
            let options = DeployOptions {
                plan_only,
                skip_config,
                skip_health,
            };
            run_deploy(&config, &target.environments(), options, yes).await?;
        }
        Commands::Destroy {
            target,
            yes,
            keep_inventory,
            keep_backend,
        } => {
            let offer_backend_removal = matches!(target, Target::All) && !keep_backend;
            run_destroy(
                &config,
                &target.environments(),
                yes,
                keep_inventory,
                offer_backend_removal,
            )
            .await?;
        }
        Commands::Bootstrap => {
            run_bootstrap(&config).await?;
        }
        Commands::TeardownBackend { force } => {
            run_teardown_backend(&config, force).await?;
        }
        Commands::Inventory {
            target,
            format,
            list,
            host,
            source,
        } => {
            run_inventory(
                &config,
                &target.environments(),
                format.formats(),
                list,
                host,
                source,
            )
            .await?;
        }
        Commands::Ping { environment } => {
            run_ping(&config, environment.into()).await?;
        }
        Commands::Health { environment } => {
            run_health(&config, environment.into()).await?;
        }
    }

    Ok(())
}

fn load_config(path: &Path) -> Result<ProjectConfig, Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        format!(
            "cannot read configuration file {}: {} (the AWS region must be configured there)",
            path.display(),
            e
        )
    })?;

    let config: ProjectConfig = toml::from_str(&raw)?;
    config
        .validate()
        .map_err(|reason| format!("invalid configuration: {}", reason))?;
    Ok(config)
}

fn confirm(prompt: &str) -> io::Result<bool> {
    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim().to_lowercase();
    Ok(input == "y" || input == "yes")
}

fn environment_names(environments: &[Environment]) -> String {
    environments
        .iter()
        .map(Environment::name)
        .collect::<Vec<_>>()
        .join(", ")
}

async fn run_deploy(
    config: &ProjectConfig,
    environments: &[Environment],
    options: DeployOptions,
    yes: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    preflight::check(config)?;

    if !yes && !options.plan_only {
        let prompt = format!("Deploy {}?", environment_names(environments));
        if !confirm(&prompt)? {
            println!("Aborted.");
            return Ok(());
        }
    }

    let provisioner = TerraformCli::from_config(config);
    let configurator = AnsibleCli::from_config(config);
    let pipeline = Pipeline::new(config, &provisioner, &configurator);

    let results = pipeline.deploy_many(environments, options).await;
    print_summary(&results);

    let failed: Vec<&str> = results
        .iter()
        .filter(|r| !r.succeeded())
        .map(|r| r.environment.name())
        .collect();

    if failed.is_empty() {
        Ok(())
    } else {
        Err(format!("deployment failed for: {}", failed.join(", ")).into())
    }
}

fn print_summary(results: &[DeploymentResult]) {
    println!("\n--- Deployment Summary ---");
    for result in results {
        let mark = if result.succeeded() { "✓" } else { "✗" };
        let mut line = format!("{} {}: {}", mark, result.environment, result.status);

        if let Some(endpoint) = &result.endpoint {
            line.push_str(&format!(" ({})", endpoint));
        }
        if result.status == DeploymentStatus::Succeeded && !result.health_verified {
            line.push_str(" [health unverified]");
        }
        println!("{}", line);

        if let Some(failure) = &result.failure {
            println!("    {}", failure);
        }
    }
}

async fn run_destroy(
    config: &ProjectConfig,
    environments: &[Environment],
    yes: bool,
    keep_inventory: bool,
    offer_backend_removal: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    preflight::check(config)?;

    if !yes {
        let prompt = format!(
            "Destroy {}? This cannot be undone.",
            environment_names(environments)
        );
        if !confirm(&prompt)? {
            println!("Aborted.");
            return Ok(());
        }
    }

    let provisioner = TerraformCli::from_config(config);
    let mut failed = Vec::new();

    for &env in environments {
        match teardown::destroy_environment(config, &provisioner, env, keep_inventory).await {
            Ok(()) => println!("✓ {} destroyed", env),
            Err(e) => {
                error!(stage = "teardown", env = %env, "teardown failed for {}: {}", env, e);
                failed.push(env.name());
            }
        }
    }

    if !failed.is_empty() {
        return Err(format!("teardown failed for: {}", failed.join(", ")).into());
    }

    // Backend removal stays opt-in: deleting state storage is unrecoverable
    if offer_backend_removal
        && !yes
        && confirm("Also delete backend state storage and the lock table?")?
    {
        let aws = AwsCli::from_config(config);
        backend::teardown(config, &aws, &provisioner, false).await?;
        println!("✓ Backend storage removed");
    }

    Ok(())
}

async fn run_bootstrap(config: &ProjectConfig) -> Result<(), Box<dyn std::error::Error>> {
    preflight::check(config)?;

    let aws = AwsCli::from_config(config);
    backend::bootstrap(config, &aws).await?;

    println!("✓ Backend ready: lock table '{}'", config.lock_table());
    for env in Environment::all() {
        println!("  {} -> s3://{}", env, config.state_bucket(env));
    }
    Ok(())
}

async fn run_teardown_backend(
    config: &ProjectConfig,
    force: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    preflight::check(config)?;

    if !force && !confirm("Delete backend state storage and the lock table?")? {
        println!("Aborted.");
        return Ok(());
    }

    let aws = AwsCli::from_config(config);
    let provisioner = TerraformCli::from_config(config);
    backend::teardown(config, &aws, &provisioner, force).await?;

    println!("✓ Backend storage removed");
    Ok(())
}

async fn run_inventory(
    config: &ProjectConfig,
    environments: &[Environment],
    formats: Vec<Format>,
    list: bool,
    host: Option<String>,
    source: SourceArg,
) -> Result<(), Box<dyn std::error::Error>> {
    let (hosts, failures) = match source {
        SourceArg::Terraform => {
            let provisioner = TerraformCli::from_config(config);
            let outcome = synth::collect(config, &provisioner, environments).await;

            for env in &outcome.skipped {
                info!(env = %env, "omitted from inventory: no deployed state");
            }
            for (env, err) in &outcome.failures {
                error!(stage = "inventory", env = %env, "inventory failed for {}: {}", env, err);
            }

            let failed: Vec<&str> = outcome.failures.iter().map(|(e, _)| e.name()).collect();
            (outcome.inventory, failed)
        }
        SourceArg::Ec2 => {
            let aws = AwsCli::from_config(config);
            let instances = aws.running_instances(&config.project_name)?;
            (synth::from_ec2(config, &instances), Vec::new())
        }
    };

    if let Some(name) = host {
        let rendered = inventory::render(&hosts, Format::Json)?;
        let document: serde_json::Value = serde_json::from_str(&rendered)?;
        let vars = document["_meta"]["hostvars"]
            .get(name.as_str())
            .cloned()
            .unwrap_or_else(|| serde_json::json!({}));
        println!("{}", serde_json::to_string_pretty(&vars)?);
    } else if list {
        print!("{}", inventory::render(&hosts, Format::Json)?);
    } else if hosts.is_empty() {
        warn!("no deployed hosts found, nothing written");
    } else {
        for format in formats {
            let path = match environments {
                [only] => config.inventory_path(*only, format.extension()),
                _ => config.combined_inventory_path(format.extension()),
            };
            inventory::write_file(&hosts, format, &path)?;
            println!("✓ wrote {}", path.display());
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(format!("inventory synthesis failed for: {}", failures.join(", ")).into())
    }
}

async fn run_ping(
    config: &ProjectConfig,
    env: Environment,
) -> Result<(), Box<dyn std::error::Error>> {
    use engine::Configurator;

    let path = config.inventory_path(env, Format::Ini.extension());
    if !path.exists() {
        return Err(format!(
            "no inventory file at {}; run 'opsforge inventory {}' first",
            path.display(),
            env
        )
        .into());
    }

    let configurator = AnsibleCli::from_config(config);
    configurator.ping(&path, env).await?;
    println!("✓ All {} hosts answered", env);
    Ok(())
}

async fn run_health(
    config: &ProjectConfig,
    env: Environment,
) -> Result<(), Box<dyn std::error::Error>> {
    use engine::Provisioner;

    let provisioner = TerraformCli::from_config(config);
    if !provisioner.has_state(env).await? {
        return Err(format!("{} has no deployed state", env).into());
    }

    let output = provisioner.outputs(env).await?;
    let Some(url) = output.endpoint() else {
        return Err(format!("{} outputs expose no endpoint to verify", env).into());
    };

    match health::verify(&url, &config.health).await {
        Ok(attempt) => {
            println!("✓ {} healthy after {} attempt(s)", url, attempt);
            Ok(())
        }
        Err(e) => {
            println!("✗ {} never became healthy", url);
            Err(e.into())
        }
    }
}
