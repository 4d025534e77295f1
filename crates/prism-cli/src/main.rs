//! Prism - mirrored federation metadata generator

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;

use config::{load_discovery, ModulesFile, Settings};
use prism_metadata::{GenerationReport, MetadataGenerator, ModuleRegistry};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    init_tracing();

    let settings = Settings::load().context("Failed to load configuration")?;

    info!("Starting Prism metadata generator v{}", env!("CARGO_PKG_VERSION"));

    let modules = ModulesFile::load(&settings.modules.path)?;
    let registry = ModuleRegistry::from_modules(
        settings.proxy.base_url.clone(),
        modules.frontends,
        modules.backends,
    )
    .context("Invalid module configuration")?;

    let discovery = load_discovery(settings.discovery.path.as_deref())?;
    if settings.discovery.path.is_none() {
        warn!("No discovery file configured, mirrored modules will have no peers");
    }

    let generator = MetadataGenerator::for_registry(&registry, Arc::new(discovery));
    let report = generator
        .create_entity_descriptors(&registry)
        .await
        .context("Metadata generation failed")?;

    for failure in &report.failures {
        warn!(
            "No entities for {} / {}: {}",
            failure.module, failure.peer_module, failure.message
        );
    }

    write_report(&report, &settings)?;

    Ok(())
}

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,prism=debug"));

    // Logs go to stderr so the report can be piped from stdout
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .init();
}

fn write_report(report: &GenerationReport, settings: &Settings) -> Result<()> {
    let json = if settings.output.pretty {
        serde_json::to_string_pretty(report)?
    } else {
        serde_json::to_string(report)?
    };

    match &settings.output.path {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            info!("Report written to {}", path.display());
        }
        None => println!("{}", json),
    }

    Ok(())
}
