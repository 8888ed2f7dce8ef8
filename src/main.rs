use std::process;
use std::sync::Arc;

use brusio::application::error::AppError;
use brusio::application::messages::{MessageCache, MessageService};
use brusio::application::repos::{MessagesRepo, RoomsRepo, StorePing, UsersRepo};
use brusio::application::rooms::RoomService;
use brusio::application::users::UserService;
use brusio::config;
use brusio::infra::cache::RedisMessageCache;
use brusio::infra::db::MongoRepositories;
use brusio::infra::error::InfraError;
use brusio::infra::http::{self, AppState};
use brusio::infra::telemetry;
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
    let (_cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    telemetry::init(&settings.logging).map_err(AppError::from)?;
    run_serve(settings).await
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let client = MongoRepositories::connect(database_url)
        .await
        .map_err(|err| AppError::from(InfraError::store(err.to_string())))?;
    let repositories = Arc::new(
        MongoRepositories::new(
            &client,
            &settings.database.name,
            settings.database.read_deadline,
        )
        .map_err(|err| AppError::from(InfraError::store(err.to_string())))?,
    );
    repositories
        .health_check()
        .await
        .map_err(|err| AppError::from(InfraError::store(err.to_string())))?;

    // Cache trouble is a degradation, not a startup failure: an unreachable
    // cache endpoint leaves the message path store-only.
    let cache: Option<Arc<dyn MessageCache>> = match settings.cache.url.as_deref() {
        Some(url) => match RedisMessageCache::connect(url, settings.cache.ttl).await {
            Ok(cache) => {
                info!(target: "brusio::startup", "message cache enabled");
                Some(Arc::new(cache))
            }
            Err(err) => {
                warn!(
                    target: "brusio::startup",
                    error = %err,
                    "message cache unreachable; serving from the store only"
                );
                None
            }
        },
        None => None,
    };

    let users_repo: Arc<dyn UsersRepo> = repositories.clone();
    let rooms_repo: Arc<dyn RoomsRepo> = repositories.clone();
    let messages_repo: Arc<dyn MessagesRepo> = repositories.clone();
    let store: Arc<dyn StorePing> = repositories.clone();

    let state = AppState {
        users: UserService::new(users_repo),
        rooms: RoomService::new(rooms_repo.clone()),
        messages: MessageService::new(messages_repo, rooms_repo).with_cache_opt(cache),
        store,
    };

    let router = http::build_router(state);
    let listener = tokio::net::TcpListener::bind(settings.server.listen_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target: "brusio::startup",
        addr = %settings.server.listen_addr,
        database = %settings.database.name,
        "listening"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            // Without a handler the only orderly exit left is the signal
            // default; keep serving rather than shut down spuriously.
            error!(error = %err, "failed to install the interrupt handler");
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
                error!(error = %err, "failed to install the terminate handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
