use std::io::{self, Write};
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use registry_sync::cancellation::CancellationFlag;
use registry_sync::client::config::SchemaRegistryConfig;
use registry_sync::engine::ReplicationEngine;
use registry_sync::error::EngineError;
use registry_sync::plugins::apicurio::ApicurioSource;
use registry_sync::plugins::memory::InMemoryDestination;
use registry_sync::settings::{Cli, Mode, ReplicationConfig};
use registry_sync::SchemaRegistryClient;

#[tokio::main]
async fn main() {
    match run().await {
        Ok(()) => std::process::exit(0),
        Err(error) => {
            tracing::error!(%error, "registry-sync exiting");
            std::process::exit(1);
        }
    }
}

async fn run() -> Result<(), EngineError> {
    match dotenvy::dotenv() {
        Ok(_) | Err(dotenvy::Error::Io(_)) => {}
        Err(error) => tracing::warn!(%error, "failed to load .env file"),
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = ReplicationConfig::build(cli)?;

    let cancellation = CancellationFlag::new();
    cancellation.install_signal_handlers();

    let engine = ReplicationEngine::new(
        config.filter.clone(),
        config.sync_deletes,
        config.sync_hard_deletes,
        config.scrape_interval,
        cancellation,
    );

    match config.mode {
        Mode::Sync => run_sync(&config, &engine).await,
        Mode::BatchExport => run_batch_export(&config, &engine).await,
        Mode::GetLocalCopy => run_get_local_copy(&config, &engine).await,
        Mode::FromLocalCopy => run_from_local_copy(&config, &engine).await,
        Mode::DeleteAllFromDestination => run_delete_all(&config, &engine).await,
    }
}

async fn build_client(url: &str, key: Option<&str>, secret: Option<&str>, timeout: std::time::Duration) -> Result<SchemaRegistryClient, EngineError> {
    let mut conf = SchemaRegistryConfig::new(url).timeout(timeout);
    if let Some(key) = key {
        conf = conf.basic_auth(key, secret.map(str::to_string));
    }
    Ok(SchemaRegistryClient::from_conf(conf)?)
}

async fn run_sync(config: &ReplicationConfig, engine: &ReplicationEngine) -> Result<(), EngineError> {
    if config.custom_source {
        let mut source = ApicurioSource::from_env();
        let dst = Arc::new(build_client(config.require_dst_url()?, config.dst_api_key.as_deref(), config.dst_api_secret.as_deref(), config.timeout).await?);

        if !engine.prepare_destination(dst.as_ref(), config.no_prompt, confirm).await? {
            return Ok(());
        }

        return engine.custom_source_sync(&mut source, &dst).await;
    }

    if config.custom_destination {
        let src = Arc::new(build_client(config.require_src_url()?, config.src_api_key.as_deref(), config.src_api_secret.as_deref(), config.timeout).await?);
        let mut destination = InMemoryDestination::new();
        return engine.custom_destination_sync(&src, &mut destination).await;
    }

    let src = Arc::new(build_client(config.require_src_url()?, config.src_api_key.as_deref(), config.src_api_secret.as_deref(), config.timeout).await?);
    let dst = Arc::new(build_client(config.require_dst_url()?, config.dst_api_key.as_deref(), config.dst_api_secret.as_deref(), config.timeout).await?);

    if !engine.prepare_destination(dst.as_ref(), config.no_prompt, confirm).await? {
        return Ok(());
    }

    engine.sync(&src, &dst).await
}

async fn run_batch_export(config: &ReplicationConfig, engine: &ReplicationEngine) -> Result<(), EngineError> {
    let src = Arc::new(build_client(config.require_src_url()?, config.src_api_key.as_deref(), config.src_api_secret.as_deref(), config.timeout).await?);
    let dst = Arc::new(build_client(config.require_dst_url()?, config.dst_api_key.as_deref(), config.dst_api_secret.as_deref(), config.timeout).await?);

    if !engine.prepare_destination(dst.as_ref(), config.no_prompt, confirm).await? {
        return Ok(());
    }

    engine.batch_export(&src, &dst).await
}

async fn run_get_local_copy(config: &ReplicationConfig, engine: &ReplicationEngine) -> Result<(), EngineError> {
    let src = Arc::new(build_client(config.require_src_url()?, config.src_api_key.as_deref(), config.src_api_secret.as_deref(), config.timeout).await?);
    let path = config.require_local_copy_path()?;
    engine.local_export(&src, path).await
}

async fn run_from_local_copy(config: &ReplicationConfig, engine: &ReplicationEngine) -> Result<(), EngineError> {
    let dst = build_client(config.require_dst_url()?, config.dst_api_key.as_deref(), config.dst_api_secret.as_deref(), config.timeout).await?;

    if !engine.prepare_destination(&dst, config.no_prompt, confirm).await? {
        return Ok(());
    }

    let path = config.require_local_copy_path()?;
    engine.local_import(&dst, path).await
}

async fn run_delete_all(config: &ReplicationConfig, engine: &ReplicationEngine) -> Result<(), EngineError> {
    let dst = build_client(config.require_dst_url()?, config.dst_api_key.as_deref(), config.dst_api_secret.as_deref(), config.timeout).await?;

    if !config.no_prompt && !confirm("This will permanently delete every subject at the destination. Continue? [y/N] ") {
        tracing::info!("delete-all-from-destination cancelled by user");
        return Ok(());
    }

    engine.delete_all_from_destination(&dst).await
}

fn confirm(prompt: &str) -> bool {
    print!("{prompt}");
    let _ = io::stdout().flush();

    let mut answer = String::new();
    if io::stdin().read_line(&mut answer).is_err() {
        return false;
    }

    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}
