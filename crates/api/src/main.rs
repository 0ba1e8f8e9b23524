use std::net::SocketAddr;
use std::time::Duration;

use api::{create_app, AppState, Config};
use integrations::{SmsLogSender, WebPushSender};
use jobs::{
    BroadcastEngine, Dispatcher, JobIntervals, RecurringMaterializer, ReportArchiver, spawn_jobs,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const SCHEDULER_GRACE: Duration = Duration::from_secs(10);
const HTTP_GRACE: Duration = Duration::from_secs(15);

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Check for --migrate-only flag
    let migrate_only = std::env::args().any(|arg| arg == "--migrate-only");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e:#}");
            std::process::exit(1);
        }
    };

    init_tracing(&config);

    // Open the data store and apply pending migrations
    let pool = match db::create_pool(&config.database_path).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!(error = %e, "failed to open database");
            std::process::exit(1);
        }
    };

    tracing::info!(path = %config.database_path.display(), "running database migrations");
    if let Err(e) = db::MIGRATOR.run(&pool).await {
        tracing::error!(error = %e, "migrations failed");
        std::process::exit(1);
    }

    if migrate_only {
        tracing::info!("migration-only mode, exiting");
        return;
    }

    // Senders
    let sms = SmsLogSender::new(config.otp_log_path.clone());
    let push = if config.push_configured() {
        let private_key = config.vapid_private_key.clone().unwrap_or_default();
        let subject = config.vapid_subject.clone().unwrap_or_default();
        match WebPushSender::new(private_key, subject, config.push_ttl_secs) {
            Ok(sender) => Some(sender),
            Err(e) => {
                tracing::error!(error = %e, "push sender initialization failed");
                std::process::exit(1);
            }
        }
    } else {
        tracing::info!("VAPID keys absent, push delivery disabled");
        None
    };

    // Periodic jobs
    let dispatcher = Dispatcher::new(
        pool.clone(),
        sms,
        push,
        config.outbox_batch_size,
        config.outbox_max_retries,
    );
    let broadcasts = BroadcastEngine::new(pool.clone());
    let materializer = RecurringMaterializer::new(pool.clone(), config.recurring_horizon_days);
    let archiver = ReportArchiver::new(pool.clone(), config.report_retention_days);

    let jobs_cancel = CancellationToken::new();
    let job_handles = spawn_jobs(
        dispatcher,
        broadcasts,
        materializer,
        archiver,
        JobIntervals::default(),
        jobs_cancel.clone(),
    );

    // HTTP frontend
    let port = config.server_port;
    let state = AppState::new(pool.clone(), config);
    let app = create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, %addr, "failed to bind");
            std::process::exit(1);
        }
    };
    tracing::info!("listening on {}", addr);

    let http_cancel = CancellationToken::new();
    let http_shutdown = http_cancel.clone();
    let mut server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                http_shutdown.cancelled().await;
            })
            .await
    });

    tokio::select! {
        _ = wait_for_shutdown() => {
            tracing::info!("shutdown signal received");
        }
        result = &mut server_handle => {
            tracing::error!(?result, "HTTP server exited unexpectedly");
            std::process::exit(2);
        }
    }

    // Stop accepting new requests, then drain the scheduler, then the HTTP
    // server, then close the store.
    http_cancel.cancel();
    jobs_cancel.cancel();

    let drain_jobs = async {
        for handle in job_handles {
            let _ = handle.await;
        }
    };
    if tokio::time::timeout(SCHEDULER_GRACE, drain_jobs).await.is_err() {
        tracing::warn!("scheduler did not drain within grace period");
    }

    if tokio::time::timeout(HTTP_GRACE, server_handle).await.is_err() {
        tracing::warn!("HTTP server did not drain within grace period");
    }

    pool.close().await;
    tracing::info!("shutdown complete");
}

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());

    match config.log_format {
        api::config::LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        api::config::LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }
}

async fn wait_for_shutdown() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to register SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => {},
            _ = sigterm.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
}
