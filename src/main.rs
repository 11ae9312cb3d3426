use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use lambda_shipper::{
    package::{CargoPackager, Packager},
    DeployOptions,
    Deployer,
    ShipperConfig,
};

#[derive(Parser)]
#[command(name = "lambda-shipper", version, about = "Deploy Rust handlers to AWS Lambda")]
struct Cli {
    /// Path to a YAML config file. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build, package, and deploy a handler, then verify it with a dry-run
    /// invocation.
    Deploy {
        /// Function name.
        name: String,
        /// Path to the handler source file or crate directory.
        source: PathBuf,
        /// Comma-separated managed policy names or full ARNs to attach to the
        /// execution role.
        #[arg(long)]
        managed_policies: Option<String>,
        /// Inline IAM policy document (JSON) for the execution role.
        #[arg(long)]
        inline_policy: Option<String>,
        /// Resource policy document (JSON) naming who may invoke the
        /// function.
        #[arg(long)]
        resource_policy: Option<String>,
    },
    /// Delete a function and tear down its execution role.
    Delete {
        /// Function name.
        name: String,
    },
    /// Build and package a handler without deploying it.
    Package {
        /// Path to the handler source file or crate directory.
        source: PathBuf,
        /// Where to write the archive.
        #[arg(long, default_value = "bootstrap.zip")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(err) = run().await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => ShipperConfig::from_path(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => ShipperConfig::default(),
    };

    match cli.command {
        Command::Deploy {
            name,
            source,
            managed_policies,
            inline_policy,
            resource_policy,
        } => {
            let deployer = Deployer::from_env(config).await?;
            let options = DeployOptions {
                managed_policies,
                inline_policy,
                resource_policy,
            };
            deployer.deploy(&name, &source, &options).await
        }
        Command::Delete { name } => {
            let deployer = Deployer::from_env(config).await?;
            deployer.delete(&name).await
        }
        Command::Package { source, output } => {
            let packager = CargoPackager::new(config.build_target.clone());
            let archive = packager
                .package(&source)
                .await
                .context("packaging handler")?;
            tokio::fs::write(&output, &archive)
                .await
                .with_context(|| format!("writing archive to {}", output.display()))?;
            println!("wrote {} ({} bytes)", output.display(), archive.len());
            Ok(())
        }
    }
}
