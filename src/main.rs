//! media-keeper - scan configured datasources and keep their items named
//!
//! Loads configuration from the environment, scans every datasource once and,
//! when enabled, renames the items discovered by the scan.

use std::sync::Arc;

use anyhow::bail;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use media_keeper::config::EngineConfig;
use media_keeper::media::ItemCollection;
use media_keeper::services::{
    KodiNfoParser, LibraryEvent, MediaLibrary, MemoryItemStore, NoopProber,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "media_keeper=info".into());
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    let config = EngineConfig::from_env()?;
    if config.data_sources.is_empty() {
        bail!("No datasource configured, set MK_DATASOURCES");
    }
    let rename_after_scan = config.rename_after_scan;
    info!(
        data_sources = config.data_sources.len(),
        dir_template = %config.dir_template,
        file_template = %config.file_template,
        "Configuration loaded"
    );

    let library = Arc::new(MediaLibrary::new(
        config,
        Arc::new(ItemCollection::new()),
        Arc::new(MemoryItemStore::new()),
        Arc::new(KodiNfoParser),
        Arc::new(NoopProber),
    ));

    let mut events = library.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if let LibraryEvent::Progress {
                task,
                message,
                done,
                total,
            } = event
            {
                debug!(task = %task, done, total, "{}", message);
            }
        }
    });

    {
        let library = library.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, finishing in-flight work");
                library.cancel();
            }
        });
    }

    let summaries = library.scan_all().await;
    for summary in &summaries {
        info!(
            data_source = %summary.data_source.display(),
            directories = summary.directories,
            failed = summary.scan.failed,
            discovered = summary.discovered.len(),
            items_removed = summary.cleanup.items_removed,
            cancelled = summary.cancelled,
            "Scan summary"
        );
    }

    if rename_after_scan {
        let ids: Vec<_> = summaries
            .iter()
            .filter(|s| !s.cancelled)
            .flat_map(|s| s.discovered.iter().copied())
            .collect();
        let outcome = library.rename_items(&ids).await;
        info!(
            renamed = outcome.completed - outcome.failed,
            failed = outcome.failed,
            cancelled = outcome.cancelled,
            "Rename finished"
        );
    }

    info!(items = library.items().len(), "Done");
    Ok(())
}
