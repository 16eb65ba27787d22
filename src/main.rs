use domain_vault::db::schema::EXPECTED_TABLES;
use domain_vault::service::startup::start_storage;
use mimalloc::MiMalloc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cfg = &domain_vault::config::CONFIG;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cfg.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        storage_location = %cfg.storage_location(),
        db_path = %cfg.database_path().display(),
        loglevel = %cfg.loglevel
    );

    let storage = domain_vault::db::storage();
    let outcome = start_storage(storage, &cfg.retry_policy(), cfg.init_timeout()).await;

    if let Some(db) = domain_vault::get_db()
        && outcome.is_ready()
    {
        for table in EXPECTED_TABLES {
            let rows = db.collection(table).find().to_array().await;
            info!(table, rows = rows.len(), "table ready");
        }
    } else {
        let err = domain_vault::get_storage_error();
        warn!(
            error = err.as_deref().unwrap_or("<none>"),
            "running without storage"
        );
    }

    let report = serde_json::json!({
        "startup": outcome,
        "status": storage.status().snapshot(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    domain_vault::close_db().await;
    Ok(())
}
