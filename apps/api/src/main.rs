use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod config;
mod extractors;
mod gateway;
mod handlers;

use application::chat::sequences::SequenceAllocator;
use config::Config;
use gateway::tcp::TcpServer;
use gateway::{ConnectionRegistry, Dispatcher};
use infrastructure::session::SessionStore;

#[derive(Parser, Debug)]
#[command(name = "im-server", about = "Real-time instant messaging server")]
struct Args {
    /// Path to the configuration file
    #[arg(long, default_value = "config/config.toml")]
    config: PathBuf,
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,api=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(Config::from_file(&args.config)?);
    info!("Starting IM server...");

    let db = infrastructure::database::init_database(&config.database.url).await?;
    let redis_conn = infrastructure::database::init_redis(&config.redis.url).await?;
    let sessions = SessionStore::new(redis_conn);

    let registry = Arc::new(ConnectionRegistry::new());
    let sequences = Arc::new(SequenceAllocator::new());
    let dispatcher = Arc::new(Dispatcher::new(
        db.clone(),
        registry.clone(),
        sessions,
        sequences,
        config.clone(),
    ));

    // TCP transport. Binding here makes a bad port fail startup.
    let tcp_addr = format!("{}:{}", config.server.host, config.server.tcp_port);
    let tcp_listener = tokio::net::TcpListener::bind(&tcp_addr)
        .await
        .with_context(|| format!("failed to bind TCP transport on {}", tcp_addr))?;
    info!(addr = %tcp_addr, "TCP server listening");
    let tcp_server = Arc::new(TcpServer::new(registry.clone(), dispatcher.clone()));
    tokio::spawn(tcp_server.run(tcp_listener));

    // Rate-limit bucket cleanup every 5 min, evict buckets idle >10 min.
    {
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(300));
            loop {
                interval.tick().await;
                dispatcher.purge_stale_rate_buckets(600.0);
            }
        });
    }

    let db_data = web::Data::new(db);
    let config_data = web::Data::from(config.clone());
    let registry_data = web::Data::from(registry);
    let dispatcher_data = web::Data::from(dispatcher);

    // WebSocket transport on its own port.
    let ws_addr = format!("{}:{}", config.server.host, config.server.ws_port);
    let ws_server = {
        let registry_data = registry_data.clone();
        let dispatcher_data = dispatcher_data.clone();
        HttpServer::new(move || {
            App::new()
                .app_data(registry_data.clone())
                .app_data(dispatcher_data.clone())
                .service(gateway::ws::websocket_route)
        })
        .bind(&ws_addr)
        .with_context(|| format!("failed to bind WebSocket transport on {}", ws_addr))?
        .run()
    };
    info!(addr = %ws_addr, "WebSocket server listening");

    // HTTP admin surface.
    let http_addr = format!("{}:{}", config.server.host, config.server.http_port);
    let api_server = {
        let db_data = db_data.clone();
        let config_data = config_data.clone();
        let registry_data = registry_data.clone();
        HttpServer::new(move || {
            let cors = Cors::default()
                .allow_any_origin()
                .allow_any_method()
                .allow_any_header()
                .max_age(3600);

            App::new()
                .wrap(cors)
                .wrap(Logger::default())
                .app_data(db_data.clone())
                .app_data(config_data.clone())
                .app_data(registry_data.clone())
                .service(handlers::health::health_check)
                .service(handlers::auth::register)
                .service(handlers::auth::login)
                .service(handlers::users::user_info)
                .service(handlers::users::user_info_batch)
                .service(handlers::groups::create_group)
                .service(handlers::groups::group_members)
        })
        .bind(&http_addr)
        .with_context(|| format!("failed to bind HTTP API on {}", http_addr))?
        .run()
    };
    info!(addr = %http_addr, "HTTP API server listening");

    info!(
        tcp_port = config.server.tcp_port,
        ws_port = config.server.ws_port,
        http_port = config.server.http_port,
        "IM server started"
    );

    // Both servers stop gracefully on SIGINT/SIGTERM.
    tokio::try_join!(ws_server, api_server)?;

    info!("Server stopped");
    Ok(())
}
