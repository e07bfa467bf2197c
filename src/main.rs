use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use mldeploy::config::{ClientConfig, ServiceManifest};
use mldeploy::utils::{logger, validation::Validate};
use mldeploy::{DeployError, SwaggerProjector};
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG: &str = "mldeploy.toml";

#[derive(Parser)]
#[command(name = "mldeploy")]
#[command(about = "Describe and check operationalized model services")]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Client configuration file; its [logging] section overrides --verbose
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the swagger document of a service described in a manifest
    Swagger {
        /// Path to the TOML service manifest
        #[arg(short, long, default_value = "services.toml")]
        manifest: PathBuf,

        /// Service to project; defaults to the first one in the manifest
        #[arg(short, long)]
        service: Option<String>,

        #[arg(long)]
        pretty: bool,

        /// Write the document to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate every service in a manifest
    Check {
        #[arg(short, long, default_value = "services.toml")]
        manifest: PathBuf,
    },
    /// Validate the client configuration file (default: mldeploy.toml)
    Config,
}

fn main() {
    let cli = Cli::parse();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));

    match cli.config.as_ref().map(ClientConfig::from_file) {
        Some(Ok(config)) => logger::init_logger(&config.logging()),
        _ => logger::init_cli_logger(cli.verbose),
    }

    if let Err(e) = run(cli.command, &config_path) {
        match e.downcast_ref::<DeployError>() {
            Some(deploy_error) => {
                eprintln!("❌ {}", deploy_error);
                eprintln!("💡 {}", deploy_error.recovery_suggestion());
            }
            None => eprintln!("❌ {:#}", e),
        }
        std::process::exit(1);
    }
}

fn run(command: Command, config_path: &Path) -> anyhow::Result<()> {
    match command {
        Command::Swagger {
            manifest,
            service,
            pretty,
            output,
        } => {
            let manifest = load_manifest(&manifest)?;
            let entry = match &service {
                Some(name) => manifest
                    .get(name)
                    .with_context(|| format!("service '{}' is not in the manifest", name))?,
                None => match manifest.services.first() {
                    Some(entry) => entry,
                    None => bail!("the manifest does not define any service"),
                },
            };

            let definition = entry.definition()?;
            let swagger = SwaggerProjector::project(&definition);
            let json = if pretty {
                swagger.to_pretty_string()?
            } else {
                swagger.to_json_string()?
            };

            match output {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    tracing::info!(
                        "📁 Swagger for {}@{} written to {}",
                        definition.name,
                        definition.version,
                        path.display()
                    );
                }
                None => println!("{}", json),
            }
        }
        Command::Check { manifest } => {
            let manifest = load_manifest(&manifest)?;
            manifest.validate()?;
            for entry in &manifest.services {
                let definition = entry.definition()?;
                println!(
                    "✅ {}@{} ({} inputs, {} outputs, operation '{}')",
                    definition.name,
                    definition.version,
                    definition.inputs.len(),
                    definition.outputs.len(),
                    definition.operation_id()
                );
            }
        }
        Command::Config => {
            let config = ClientConfig::from_file(config_path)
                .with_context(|| format!("failed to load {}", config_path.display()))?;
            config.validate()?;
            println!("✅ endpoint: {}", config.endpoint().trim_end_matches('/'));
            println!("   strict plugin check: {}", config.strict_plugin_check());
            println!(
                "   auth: {}",
                if config.auth.is_some() { "provided" } else { "none" }
            );
        }
    }
    Ok(())
}

fn load_manifest(path: &Path) -> anyhow::Result<ServiceManifest> {
    tracing::debug!("📁 Loading manifest from: {}", path.display());
    ServiceManifest::from_file(path).with_context(|| format!("failed to load {}", path.display()))
}
