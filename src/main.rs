use actix_web::{middleware::Compress, App, HttpServer};
use actix_cors::Cors;
use utoipa_swagger_ui::SwaggerUi;

mod auth;
mod directory;
mod dispatch;
mod error;
mod mailer;
mod models;
mod openapi;
mod render;
mod repo;
mod routes;

use dispatch::Dispatcher;
use mailer::build_mailer;
use openapi::ApiDoc;
use routes::{config, AppState};
use utoipa::OpenApi; // bring trait into scope for ApiDoc::openapi()
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;
use tracing_actix_web::TracingLogger;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Environment variables must be set externally (shell, systemd, Docker, etc.)
    // Load .env automatically only in debug builds to reduce manual setup overhead.
    if cfg!(debug_assertions) {
        let _ = dotenv::dotenv();
    }

    validate_env_vars();

    // Structured logging initialisation
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    info!("Bootstrapping Telloo notification dispatcher");

    if let Err(e) = PrometheusBuilder::new().install() {
        warn!("metrics exporter not installed: {e}");
    }

    let app_url =
        std::env::var("APP_URL").unwrap_or_else(|_| "https://telloo.vercel.app".to_string());
    info!("App URL: {app_url}");
    info!("Resend configured: {}", std::env::var("RESEND_API_KEY").is_ok());

    #[cfg(all(feature = "inmem-store", not(feature = "postgres-store")))]
    let (repo, user_directory): (Arc<dyn repo::Repo>, Arc<dyn directory::UserDirectory>) = {
        info!("Using in-memory content snapshot (dev only: starts empty)");
        (
            Arc::new(repo::inmem::InMemRepo::new()),
            Arc::new(directory::inmem::InMemDirectory::new()),
        )
    };

    #[cfg(feature = "postgres-store")]
    let (repo, user_directory): (Arc<dyn repo::Repo>, Arc<dyn directory::UserDirectory>) = {
        use sqlx::postgres::PgPoolOptions;
        let db_url =
            std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for postgres-store");
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect_lazy(&db_url)
            .expect("Failed to create Pg pool");
        sqlx::migrate!()
            .run(&pool)
            .await
            .expect("Failed to run database migrations");
        info!("Using Postgres content snapshot");
        (
            Arc::new(repo::pg::PgRepo::new(pool.clone())),
            Arc::new(directory::pg::PgDirectory::new(pool)),
        )
    };

    let dispatcher = Arc::new(Dispatcher::new(repo, user_directory, build_mailer(), app_url));

    let openapi = ApiDoc::openapi();
    info!("OpenAPI spec generated");

    let server = HttpServer::new(move || {
        // The dispatch endpoint is called from browser sessions on arbitrary
        // customer domains, so preflight must be permissive.
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .wrap(TracingLogger::default())
            .wrap(Compress::default())
            .wrap(cors)
            .configure(config)
            .service(SwaggerUi::new("/docs").url("/docs/openapi.json", openapi.clone()))
            .app_data(actix_web::web::Data::new(AppState { dispatcher: dispatcher.clone() }))
    })
    .bind(("0.0.0.0", 8080))?;

    info!("Listening on http://0.0.0.0:8080 (all interfaces)");

    server.run().await
}

/// Validate that required environment variables are set
fn validate_env_vars() {
    use std::env;

    let mut missing = Vec::new();
    if env::var("JWT_SECRET").is_err() {
        missing.push("JWT_SECRET");
    }
    if cfg!(feature = "postgres-store") && env::var("DATABASE_URL").is_err() {
        missing.push("DATABASE_URL");
    }

    if !missing.is_empty() {
        eprintln!("Missing required environment variables: {:?}", missing);
        eprintln!("Please copy .env.example to .env and configure it");
        std::process::exit(1);
    }

    // Validate JWT_SECRET is sufficiently long
    if let Ok(secret) = env::var("JWT_SECRET") {
        if secret.len() < 32 {
            eprintln!("JWT_SECRET must be at least 32 characters long for security");
            std::process::exit(1);
        }
    }

    if env::var("RESEND_API_KEY").is_err() {
        eprintln!("Warning: RESEND_API_KEY not set; emails will be logged instead of delivered");
    }
}
