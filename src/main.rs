use std::io;
use std::process::ExitCode;

use anyhow::{Context, anyhow};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use from_xml::{
    BatchConverter, Cli, ConfigManager, FileDiscovery, FromXml, FromXmlConfig, Output,
    VerbosityLevel,
};

fn init_tracing(verbosity: VerbosityLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.log_directive()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn discovery_for(config: &FromXmlConfig) -> anyhow::Result<FileDiscovery> {
    Ok(FileDiscovery::new()
        .with_extensions(config.files.extensions.clone())
        .with_include_patterns(config.files.include_patterns.clone())?
        .with_exclude_patterns(config.files.exclude_patterns.clone())?)
}

/// Returns whether every discovered file converted
async fn run(cli: Cli) -> anyhow::Result<bool> {
    cli.validate().map_err(|message| anyhow!(message))?;

    let config = ConfigManager::load_config(&cli)
        .await
        .context("loading configuration")?;
    let verbosity = VerbosityLevel::from_config(&config);
    init_tracing(verbosity);
    debug!(?config, "effective configuration");

    let files = discovery_for(&config)?
        .discover_all(&cli.inputs)
        .await
        .context("discovering input files")?;
    info!(files = files.len(), "discovered input files");

    let mut transform = FromXml::value();
    transform
        .configure_with(config.clone())
        .await
        .context("compiling schema")?;

    let threads = ConfigManager::get_thread_count(&config);
    let converted = tokio::task::block_in_place(|| {
        BatchConverter::new(&transform, threads).convert_files(&files)
    });
    transform.close();
    let results = converted?;

    let output = Output::new(verbosity, config.output.format.into());
    output.write_results(&results, &mut io::stdout().lock(), &mut io::stderr().lock())?;

    Ok(!results.has_failures())
}

#[tokio::main]
async fn main() -> ExitCode {
    match run(Cli::parse_args()).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}
