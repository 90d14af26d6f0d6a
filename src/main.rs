use std::sync::Arc;

use dotenvy::dotenv;
use restaurant_service::domain::ports::RecordStore;
use restaurant_service::infrastructure::{MemoryStore, PgRecordStore};
use restaurant_service::{build_server, create_pool, run_migrations, AppState, Config};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = Config::from_env()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

    let store: Arc<dyn RecordStore> = match &config.database_url {
        Some(url) => {
            let pool = create_pool(url).map_err(std::io::Error::other)?;
            run_migrations(&pool).map_err(std::io::Error::other)?;
            Arc::new(PgRecordStore::new(pool))
        }
        None => {
            log::warn!("DATABASE_URL is not set, records are kept in memory only");
            Arc::new(MemoryStore::new())
        }
    };

    log::info!(
        "Starting server at http://{}:{} (store timeout {:?}, payment due policy {:?})",
        config.host,
        config.port,
        config.store_timeout,
        config.payment_due_policy
    );

    build_server(AppState::new(store, &config), &config.host, config.port)?.await
}
