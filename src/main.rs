use std::{net::SocketAddr, process, sync::Arc};

use todolist::{
    application::{
        auth::{AuthService, TokenIssuer},
        database::DatabaseService,
        error::AppError,
        history::HistoryService,
        profile::ProfileService,
        repos::{
            HistoryRepo, PushSubscriptionsRepo, SchemaOptions, SchemaRepo, TasksRepo, UsersRepo,
        },
        tasks::TaskService,
    },
    config,
    infra::{
        assets::StaticFiles,
        db::PostgresRepositories,
        error::InfraError,
        http::{self, ApiRateLimiter, ApiState},
        telemetry,
        uploads::UploadStorage,
    },
    offline::{
        self, CacheGeneration, FsCacheStorage, FsOfflineData, FsSyncQueue, HttpNetwork,
        MemoryClients, NotificationCenter, ProxyState, SyncScheduler, WorkerContext,
    },
};
use tokio::sync::watch;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

const CACHE_DIR: &str = "caches";
const QUEUE_DIR: &str = "sync-queue";
const DATA_DIR: &str = "data";
const RATE_LIMIT_PRUNE_SECS: u64 = 60;

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
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Offline(_) => run_offline(settings).await,
        config::Command::Database(args) => run_database(settings, args).await,
        config::Command::Sync(_) => run_sync(settings).await,
    }
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let jwt_secret = settings.auth.jwt_secret.as_deref().ok_or_else(|| {
        AppError::from(InfraError::configuration(
            "auth.jwt_secret must be set to serve the API",
        ))
    })?;

    let repositories = init_repositories(&settings).await?;
    let database = Arc::new(DatabaseService::new(
        repositories.clone() as Arc<dyn SchemaRepo>
    ));

    if settings.database.init_on_start {
        let options = SchemaOptions {
            add_test_data: settings.database.seed_test_data,
            ..SchemaOptions::default()
        };
        let result = database.initialize(options).await;
        if !result.success {
            return Err(AppError::from(InfraError::database(
                result
                    .error
                    .unwrap_or_else(|| "database initialization failed".to_string()),
            )));
        }
    }

    let token_ttl = time::Duration::try_from(settings.auth.token_ttl)
        .map_err(|err| AppError::unexpected(format!("invalid token ttl: {err}")))?;
    let users = repositories.clone() as Arc<dyn UsersRepo>;
    let history = HistoryService::new(repositories.clone() as Arc<dyn HistoryRepo>);
    let uploads = UploadStorage::new(
        settings.uploads.directory.clone(),
        settings.uploads.max_avatar_bytes.get(),
    )
    .map_err(InfraError::storage(&settings.uploads.directory))?;
    let body_limit = usize::try_from(settings.uploads.max_request_bytes.get())
        .map_err(|_| AppError::unexpected("uploads.max_request_bytes exceeds usize"))?;
    let rate_limiter = Arc::new(ApiRateLimiter::new(
        std::time::Duration::from_secs(settings.rate_limit.window_seconds.get().into()),
        settings.rate_limit.max_requests.get(),
    ));

    let state = ApiState {
        auth: Arc::new(AuthService::new(
            users.clone(),
            history.clone(),
            TokenIssuer::new(jwt_secret, token_ttl),
        )),
        profile: Arc::new(ProfileService::new(users.clone(), history.clone())),
        tasks: Arc::new(TaskService::new(
            repositories.clone() as Arc<dyn TasksRepo>,
            users,
            history.clone(),
        )),
        history,
        database,
        push: repositories.clone() as Arc<dyn PushSubscriptionsRepo>,
        uploads: Arc::new(uploads),
        files: StaticFiles::new(settings.static_files.directory.clone()),
        rate_limiter: rate_limiter.clone(),
        admin_token: settings.admin.token.as_deref().map(Arc::from),
        body_limit,
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let prune_handle = tokio::spawn(prune_rate_limiter(rate_limiter, shutdown_rx));

    let router = http::build_router(state);
    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(InfraError::bind(settings.server.addr))?;

    info!(
        target: "todolist::serve",
        addr = %settings.server.addr,
        static_dir = %settings.static_files.directory.display(),
        admin_enabled = settings.admin.token.is_some(),
        "todolist server listening"
    );

    let result = axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .map_err(|err| AppError::unexpected(format!("server error: {err}")));

    let _ = shutdown_tx.send(true);
    if tokio::time::timeout(settings.server.graceful_shutdown, prune_handle)
        .await
        .is_err()
    {
        warn!(target: "todolist::serve", "rate limiter task did not stop in time");
    }
    repositories.pool().close().await;

    result
}

async fn prune_rate_limiter(limiter: Arc<ApiRateLimiter>, mut shutdown: watch::Receiver<bool>) {
    let mut interval =
        tokio::time::interval(std::time::Duration::from_secs(RATE_LIMIT_PRUNE_SECS));
    interval.tick().await;
    loop {
        tokio::select! {
            _ = interval.tick() => limiter.prune(),
            _ = shutdown.changed() => break,
        }
    }
}

fn build_worker_context(
    settings: &config::Settings,
    scheduler: Arc<SyncScheduler>,
    notifications: Arc<NotificationCenter>,
) -> Result<WorkerContext, AppError> {
    let storage = &settings.offline.storage_dir;

    let network = HttpNetwork::new(settings.offline.request_timeout)
        .map_err(|err| AppError::unexpected(err.to_string()))?;

    Ok(
        WorkerContext::builder(settings.offline.upstream.clone(), Arc::new(network))
            .generation(CacheGeneration::new(settings.offline.generation.clone()))
            .caches(Arc::new(
                FsCacheStorage::new(storage.join(CACHE_DIR))
                    .map_err(InfraError::storage(storage.join(CACHE_DIR)))?,
            ))
            .queue(Arc::new(
                FsSyncQueue::new(storage.join(QUEUE_DIR))
                    .map_err(InfraError::storage(storage.join(QUEUE_DIR)))?,
            ))
            .data(Arc::new(
                FsOfflineData::new(storage.join(DATA_DIR))
                    .map_err(InfraError::storage(storage.join(DATA_DIR)))?,
            ))
            .registrar(scheduler)
            .notifier(notifications)
            .clients(Arc::new(MemoryClients::new()))
            .build(),
    )
}

async fn run_offline(settings: config::Settings) -> Result<(), AppError> {
    let scheduler = Arc::new(SyncScheduler::new());
    let notifications = Arc::new(NotificationCenter::new());
    let context = build_worker_context(&settings, scheduler.clone(), notifications.clone())?;

    offline::bootstrap(&context)
        .await
        .map_err(|err| AppError::unexpected(format!("offline layer failed to start: {err}")))?;

    let body_limit = usize::try_from(settings.uploads.max_request_bytes.get())
        .map_err(|_| AppError::unexpected("uploads.max_request_bytes exceeds usize"))?;

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let sync_handle = tokio::spawn(scheduler.clone().run(
        context.clone(),
        settings.offline.sync_retry_interval,
        async move {
            let _ = shutdown_rx.changed().await;
        },
    ));

    let router = offline::build_router(ProxyState {
        context,
        scheduler,
        notifications,
        body_limit,
    });
    let listener = tokio::net::TcpListener::bind(settings.offline.addr)
        .await
        .map_err(InfraError::bind(settings.offline.addr))?;

    info!(
        target: "todolist::offline",
        addr = %settings.offline.addr,
        upstream = %settings.offline.upstream,
        storage = %settings.offline.storage_dir.display(),
        "offline proxy listening"
    );

    let result = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")));

    let _ = shutdown_tx.send(true);
    if tokio::time::timeout(settings.server.graceful_shutdown, sync_handle)
        .await
        .is_err()
    {
        warn!(target: "todolist::offline", "sync loop did not stop in time");
    }

    result
}

async fn run_database(
    settings: config::Settings,
    args: config::DatabaseArgs,
) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let database = DatabaseService::new(repositories.clone() as Arc<dyn SchemaRepo>);

    let output = match args.command {
        config::DatabaseCommand::Init(init) => {
            let result = database
                .initialize(SchemaOptions {
                    drop_existing: init.drop_existing,
                    add_test_data: !init.no_test_data,
                    fix_only: false,
                })
                .await;
            operation_output(result)?
        }
        config::DatabaseCommand::Fix(_) => operation_output(database.fix().await)?,
        config::DatabaseCommand::Status(_) => {
            let status = database.status().await;
            let json = to_pretty_json(&status)?;
            if status.status == "error" {
                println!("{json}");
                return Err(AppError::from(InfraError::database(
                    status.error.unwrap_or_default(),
                )));
            }
            json
        }
    };

    println!("{output}");
    repositories.pool().close().await;
    Ok(())
}

fn operation_output(result: todolist_api_types::OperationResult) -> Result<String, AppError> {
    let json = to_pretty_json(&result)?;
    if result.success {
        Ok(json)
    } else {
        println!("{json}");
        Err(AppError::from(InfraError::database(
            result.error.unwrap_or_default(),
        )))
    }
}

async fn run_sync(settings: config::Settings) -> Result<(), AppError> {
    let context = build_worker_context(
        &settings,
        Arc::new(SyncScheduler::new()),
        Arc::new(NotificationCenter::new()),
    )?;

    let report = context
        .sync()
        .await
        .map_err(|err| AppError::unexpected(format!("sync failed: {err}")))?;
    println!("{}", to_pretty_json(&report)?);
    Ok(())
}

fn to_pretty_json<T: serde::Serialize>(value: &T) -> Result<String, AppError> {
    serde_json::to_string_pretty(value)
        .map_err(|err| AppError::unexpected(format!("failed to encode output: {err}")))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(target: "todolist::serve", error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!(target: "todolist::serve", "shutdown signal received");
}
