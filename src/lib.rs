pub mod application;
pub mod config;
pub mod db;
pub mod domain;
pub mod errors;
pub mod handlers;
pub mod infrastructure;
pub mod schema;

use std::sync::Arc;
use std::time::Duration;

use actix_web::{middleware::Logger, web, App, HttpServer};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use application::billing::{BillingService, PaymentDuePolicy};
use application::catalog::CatalogService;
use application::invoice_service::InvoiceService;
use application::order_service::OrderService;
use domain::deadline::Deadline;
use domain::ports::RecordStore;
use handlers::{catalog, invoices, orders, ApiDoc};

pub use config::Config;
pub use db::{create_pool, DbPool};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Run any pending Diesel migrations against the pool's database.
pub fn run_migrations(pool: &DbPool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut conn = pool.get()?;
    conn.run_pending_migrations(MIGRATIONS)?;
    Ok(())
}

/// Shared by every worker: the injected store plus per-request settings.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub store_timeout: Duration,
    pub payment_due_policy: PaymentDuePolicy,
}

impl AppState {
    pub fn new(store: Arc<dyn RecordStore>, config: &Config) -> Self {
        Self {
            store,
            store_timeout: config.store_timeout,
            payment_due_policy: config.payment_due_policy,
        }
    }

    /// Deadline for every store call made on behalf of one request.
    pub fn deadline(&self) -> Deadline {
        Deadline::after(self.store_timeout)
    }

    pub fn orders(&self) -> OrderService<dyn RecordStore> {
        OrderService::new(self.store.clone())
    }

    pub fn billing(&self) -> BillingService<dyn RecordStore> {
        BillingService::new(self.store.clone(), self.payment_due_policy)
    }

    pub fn invoices(&self) -> InvoiceService<dyn RecordStore> {
        InvoiceService::new(self.store.clone(), self.payment_due_policy)
    }

    pub fn catalog(&self) -> CatalogService<dyn RecordStore> {
        CatalogService::new(self.store.clone())
    }
}

/// Register every route and the JSON body error handler.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(handlers::json_config())
        .service(
            web::scope("/orders")
                .route("", web::post().to(orders::create_order))
                .route("", web::get().to(orders::list_orders))
                .route("/{order_id}", web::get().to(orders::get_order))
                .route("/{order_id}", web::patch().to(orders::update_order))
                .route("/{order_id}/items", web::get().to(orders::order_billing)),
        )
        .service(
            web::scope("/order-items")
                .route("", web::post().to(orders::create_order_items))
                .route("", web::get().to(orders::list_order_items))
                .route("/{order_item_id}", web::get().to(orders::get_order_item))
                .route("/{order_item_id}", web::patch().to(orders::update_order_item)),
        )
        .service(
            web::scope("/invoices")
                .route("", web::post().to(invoices::create_invoice))
                .route("", web::get().to(invoices::list_invoices))
                .route("/{invoice_id}", web::get().to(invoices::get_invoice))
                .route("/{invoice_id}", web::patch().to(invoices::update_invoice)),
        )
        .service(
            web::scope("/menus")
                .route("", web::post().to(catalog::create_menu))
                .route("", web::get().to(catalog::list_menus))
                .route("/{menu_id}", web::get().to(catalog::get_menu))
                .route("/{menu_id}", web::patch().to(catalog::update_menu)),
        )
        .service(
            web::scope("/foods")
                .route("", web::post().to(catalog::create_food))
                .route("", web::get().to(catalog::list_foods))
                .route("/{food_id}", web::get().to(catalog::get_food))
                .route("/{food_id}", web::patch().to(catalog::update_food)),
        )
        .service(
            web::scope("/tables")
                .route("", web::post().to(catalog::create_table))
                .route("", web::get().to(catalog::list_tables))
                .route("/{table_id}", web::get().to(catalog::get_table))
                .route("/{table_id}", web::patch().to(catalog::update_table)),
        );
}

/// Build and return an actix-web `Server` bound to `host:port`.
///
/// The caller is responsible for `.await`-ing (or `tokio::spawn`-ing) the
/// returned server.
pub fn build_server(
    state: AppState,
    host: &str,
    port: u16,
) -> std::io::Result<actix_web::dev::Server> {
    let openapi = ApiDoc::openapi();
    Ok(HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(Logger::default())
            .configure(configure)
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", openapi.clone()),
            )
    })
    .bind((host.to_string(), port))?
    .run())
}
