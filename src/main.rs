use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use cis_rate_limit::api::HttpRateLimitClient;
use cis_rate_limit::config::{LoggingConfig, ProviderConfig};
use cis_rate_limit::id::DomainId;
use cis_rate_limit::resource::expand::expand_rule;
use cis_rate_limit::resource::{resource_schema, RateLimitResource, RateLimitSpec, ResourceData};

/// Manage CIS edge rate limit rules declaratively.
#[derive(Parser)]
#[command(name = "cis-rate-limit", version)]
struct Cli {
    /// Provider configuration file (YAML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the resource schema as JSON
    Schema,
    /// Expand a resource file and print the request payload without calling the service
    Validate {
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Create a rule from a resource file
    Create {
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Read a rule by composite id
    Read {
        #[arg(long)]
        id: String,
    },
    /// Update a rule from a resource file
    Update {
        #[arg(long)]
        id: String,
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Delete a rule by composite id
    Delete {
        #[arg(long)]
        id: String,
    },
    /// Check whether a rule exists
    Exists {
        #[arg(long)]
        id: String,
    },
    /// Import an existing rule by composite id
    Import {
        #[arg(long)]
        id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = ProviderConfig::load(cli.config.as_deref())?;
    init_tracing(&config.logging);

    info!(version = env!("CARGO_PKG_VERSION"), "Starting cis-rate-limit");
    info!(endpoint = %config.api.endpoint, "Configuration loaded");

    match cli.command {
        Command::Schema => {
            println!("{}", serde_json::to_string_pretty(&resource_schema())?);
        }
        Command::Validate { file } => {
            let spec = RateLimitSpec::from_file(&file)?;
            DomainId::parse(&spec.domain_id)?;
            let record = expand_rule(&spec.rule)?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        command => {
            let client = HttpRateLimitClient::new(&config.api)?;
            let resource = RateLimitResource::new(Arc::new(client));
            run(&resource, command).await?;
        }
    }

    Ok(())
}

/// Execute a lifecycle subcommand against the service.
///
/// `schema` and `validate` never reach the service and are no-ops here.
async fn run(
    resource: &RateLimitResource<HttpRateLimitClient>,
    command: Command,
) -> anyhow::Result<()> {
    match command {
        Command::Schema | Command::Validate { .. } => {}
        Command::Create { file } => {
            let mut data = ResourceData::new(RateLimitSpec::from_file(&file)?);
            resource.create(&mut data).await?;
            print_state(&data)?;
        }
        Command::Read { id } => {
            let mut data = ResourceData::with_id(id);
            resource.read(&mut data).await?;
            print_state(&data)?;
        }
        Command::Update { id, file } => {
            let desired = RateLimitSpec::from_file(&file)?;

            let mut current = ResourceData::with_id(id.clone());
            resource.read(&mut current).await?;
            if !current.exists() {
                bail!("rate limit {} does not exist", id);
            }
            let prior = current
                .into_spec()
                .context("read returned no state")?
                .rule;

            let mut data = ResourceData::planned(id, desired, prior);
            resource.update(&mut data).await?;
            print_state(&data)?;
        }
        Command::Delete { id } => {
            let mut data = ResourceData::with_id(id);
            resource.delete(&mut data).await?;
            println!("deleted");
        }
        Command::Exists { id } => {
            let exists = resource.exists(&ResourceData::with_id(id)).await?;
            println!("{}", exists);
        }
        Command::Import { id } => {
            let data = resource.import(&id).await?;
            print_state(&data)?;
        }
    }
    Ok(())
}

fn print_state(data: &ResourceData) -> anyhow::Result<()> {
    if !data.exists() {
        println!("# rate limit no longer exists");
        return Ok(());
    }
    println!("# id: {}", data.id());
    if let Some(spec) = data.spec() {
        print!("{}", spec.to_yaml()?);
    }
    Ok(())
}

/// Initialize tracing; `RUST_LOG` takes precedence over the configured level.
fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}
