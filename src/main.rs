use mail_table_sync::{SyncConfig, run_once};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = SyncConfig::from_env()?;

    // Keep the guard alive so the file writer flushes on exit
    let _log_guard = init_tracing(&config);

    eprintln!("📬 mail-table-sync v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Sender: {}", config.filter.sender);
    eprintln!("   Table: {}", config.table.table_name);
    eprintln!("   Zone: {} ({})\n", config.zone.name, config.zone.offset);

    let summary = match run_once(&config).await {
        Ok(summary) => summary,
        Err(e) => {
            tracing::error!(error = %e, "Sync aborted");
            return Err(e.into());
        }
    };

    eprintln!("\n--- 🏁 Sync finished ---");
    eprintln!("   Processed: {}", summary.processed);
    eprintln!("   Succeeded: {}", summary.succeeded);
    eprintln!("   Failed: {}", summary.failed);

    Ok(())
}

fn init_tracing(config: &SyncConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let Some(dir) = config.log_dir.as_ref() else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
        return None;
    };

    let file_appender = tracing_appender::rolling::daily(dir, "mail-table-sync.log");
    let (writer, guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_target(false)
        .with_writer(writer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    Some(guard)
}
