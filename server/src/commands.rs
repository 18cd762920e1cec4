use std::path::Path;
use std::sync::Arc;

use log::info;
use tokio::net::TcpListener;

use finsight::analyzer::{normalize_query, AnalyzerError};
use finsight::config::Settings;
use finsight::error::ConfigError;
use finsight::queue::QueueBackend;
use finsight::{http, processor};
use finsight::{CrewAnalyzer, DocumentAnalyzer, FinsightError, JobManager, WorkerConfig, WorkerPool};

pub(crate) async fn serve(
    settings: Settings,
    bind: Option<String>,
    workers: Option<usize>,
) -> finsight::Result<()> {
    let analyzer: Arc<dyn DocumentAnalyzer> = Arc::new(CrewAnalyzer::from_settings(&settings)?);
    let manager = Arc::new(JobManager::from_settings(&settings, analyzer)?);

    let pool = if QueueBackend::parse(&settings.queue_url)?.is_in_process() {
        let mut config = WorkerConfig::from_settings(&settings);
        if let Some(n) = workers {
            config.worker_count = n;
        }
        Some(WorkerPool::start(Arc::clone(&manager), config).await?)
    } else {
        None
    };

    let bind = bind.unwrap_or_else(|| settings.bind.clone());
    let listener = TcpListener::bind(&bind)
        .await
        .map_err(FinsightError::Server)?;
    let served = http::serve(listener, http::router(manager), shutdown_signal()).await;

    if let Some(pool) = pool {
        pool.shutdown();
        pool.wait().await?;
    }
    served
}

pub(crate) async fn worker(settings: Settings, workers: Option<usize>) -> finsight::Result<()> {
    if QueueBackend::parse(&settings.queue_url)?.is_in_process() {
        return Err(ConfigError::InvalidValue {
            name: "REDIS_URL".to_string(),
            value: settings.queue_url.clone(),
            reason: "a standalone worker needs a shared broker; memory:// only works with `serve`"
                .to_string(),
        }
        .into());
    }

    let analyzer: Arc<dyn DocumentAnalyzer> = Arc::new(CrewAnalyzer::from_settings(&settings)?);
    let manager = Arc::new(JobManager::from_settings(&settings, analyzer)?);

    let mut config = WorkerConfig::from_settings(&settings);
    if let Some(n) = workers {
        config.worker_count = n;
    }
    let pool = WorkerPool::start(manager, config).await?;

    shutdown_signal().await;
    pool.shutdown();
    pool.wait().await?;
    Ok(())
}

pub(crate) async fn analyze(settings: Settings, file: &Path, query: Option<&str>) -> finsight::Result<()> {
    let name = file.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    processor::validate_filename(name)?;

    let analyzer = CrewAnalyzer::from_settings(&settings)?;
    let query = normalize_query(query);
    let timeout = settings.analysis_timeout();

    info!("Analyzing {}", finsight::sanitize::redact_path(file));
    let analysis = tokio::time::timeout(timeout, analyzer.analyze(&query, file))
        .await
        .unwrap_or_else(|_| Err(AnalyzerError::Timeout(timeout)))?;

    println!("{}", analysis);
    Ok(())
}

/// Resolves on Ctrl+C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Could not listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                log::warn!("Could not listen for SIGTERM: {}", e);
                ctrl_c.await;
            }
        }
    }
    #[cfg(not(unix))]
    ctrl_c.await;

    info!("Shutdown signal received");
}
