use chrono::{Duration, Utc};
use migration::{Migrator, MigratorTrait};
use settings::Database;

mod settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let settings = settings::Settings::new()?;
    let mut tasks = tokio::task::JoinSet::new();

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "passculture={level},server={level},engine={level}",
            level = settings.app.level
        ))
        .init();

    let Some(server) = settings.server else {
        tracing::warn!("No server settings found, nothing to run");
        return Ok(());
    };
    tracing::info!("Found server settings...");
    let db = parse_database(&server.database).await?;
    let lock_timeout = Duration::minutes(settings.finance.cashflow_lock_timeout_minutes);
    let build_engine = move |db: sea_orm::DatabaseConnection| async move {
        engine::Engine::builder()
            .database(db)
            .cashflow_lock_timeout(lock_timeout)
            .build()
            .await
    };

    let engine = build_engine(db.clone()).await?;
    tasks.spawn(async move {
        let bind = server.bind.unwrap_or_else(|| "127.0.0.1".to_string());
        let addr = format!("{}:{}", bind, server.port);
        let listener = match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(err) => {
                tracing::error!("failed to bind server listener: {err}");
                return;
            }
        };
        if let Err(err) = server::run_with_listener(engine, listener).await {
            tracing::error!("server failed: {err}");
        }
    });

    if let Some(minutes) = settings.finance.jobs_interval_minutes {
        let engine = build_engine(db).await?;
        let min_date = settings.finance.price_events_min_date;
        tasks.spawn(async move {
            tracing::info!(minutes, "Starting background jobs");
            let mut interval =
                tokio::time::interval(std::time::Duration::from_secs(minutes.max(1) * 60));
            loop {
                interval.tick().await;
                run_jobs(&engine, min_date).await;
            }
        });
    }

    while tasks.join_next().await.is_some() {
        tasks.shutdown().await;
    }

    Ok(())
}

/// One round of the periodic booking and pricing jobs. Failures are logged
/// and retried on the next round.
async fn run_jobs(engine: &engine::Engine, min_date: Option<chrono::DateTime<Utc>>) {
    let now = Utc::now();
    if let Err(err) = engine.auto_mark_as_used_after_event(now).await {
        tracing::error!("failed to mark past event bookings as used: {err}");
    }
    if let Err(err) = engine.cancel_expired_bookings(now).await {
        tracing::error!("failed to cancel expired bookings: {err}");
    }
    if let Err(err) = engine.recredit_underage_users(now).await {
        tracing::error!("failed to recredit underage beneficiaries: {err}");
    }
    if let Err(err) = engine.price_events(min_date, now).await {
        tracing::error!("failed to price finance events: {err}");
    }
}

async fn parse_database(
    config: &settings::Database,
) -> Result<sea_orm::DatabaseConnection, Box<dyn std::error::Error + Send + Sync>> {
    let url = match config {
        Database::Memory => String::from("sqlite::memory:"),
        Database::Sqlite(path) => format!("sqlite:{}?mode=rwc", path),
    };

    let database = sea_orm::Database::connect(url).await?;
    Migrator::up(&database, None).await?;
    Ok(database)
}
