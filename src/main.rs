use std::{future::IntoFuture, process, sync::Arc};

use tagfeed::{
    application::{error::AppError, posts::PostSearchService},
    cache::{CacheConfig, PostCache},
    config,
    infra::{
        error::InfraError,
        http::{self, ApiState},
        telemetry,
        upstream::UpstreamClient,
    },
};
use tokio::sync::watch;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let state = build_api_state(&settings)?;
    let router = http::build_api_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(InfraError::from)?;
    info!(
        addr = %settings.server.addr,
        upstream = %settings.upstream.base_url,
        "tagfeed listening"
    );

    let (stop_tx, mut stop_rx) = watch::channel(false);
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move {
            wait_for_shutdown_signal().await;
            let _ = stop_tx.send(true);
        })
        .into_future();

    let grace = settings.server.graceful_shutdown;
    let deadline = async move {
        let _ = stop_rx.wait_for(|stopping| *stopping).await;
        tokio::time::sleep(grace).await;
    };

    tokio::select! {
        result = server => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        _ = deadline => {
            warn!(grace_secs = grace.as_secs(), "graceful shutdown timed out; dropping open connections");
        }
    }

    info!("tagfeed stopped");
    Ok(())
}

fn build_api_state(settings: &config::Settings) -> Result<ApiState, AppError> {
    let upstream = UpstreamClient::new(&settings.upstream)?;
    let cache = Arc::new(PostCache::new(&CacheConfig::from(&settings.cache)));
    let search = PostSearchService::new(
        Arc::new(upstream),
        cache,
        settings.upstream.max_concurrency,
    );

    Ok(ApiState {
        search: Arc::new(search),
    })
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
