use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{error, info};

use cafeteria_rs::{
    create_app, init_observability, observability::Metrics, repositories::TableManager,
    shutdown_observability, AppSettings, Config, Repositories,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration first (basic logging only)
    let config = Config::from_environment().await?;
    println!("Configuration loaded successfully");

    init_observability(&config.observability)?;

    info!("Starting cafeteria-rs service");
    info!(
        "Service: {} v{}",
        config.observability.service_name, config.observability.service_version
    );
    info!("Region: {}", config.aws.region);
    info!(
        "DynamoDB Tables: users={}, dishes={}, restaurants={}, carts={}, orders={}",
        config.database.users_table_name,
        config.database.dishes_table_name,
        config.database.restaurants_table_name,
        config.database.carts_table_name,
        config.database.orders_table_name
    );

    let metrics = Arc::new(Metrics::new()?);
    info!("Metrics initialized successfully");

    let dynamodb_client = Arc::new(config.aws.dynamodb_client.clone());
    let table_manager = Arc::new(TableManager::new(dynamodb_client.clone()));
    let repositories = Repositories::dynamodb(dynamodb_client, &config.database);
    info!("Repositories initialized successfully");

    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);

    let app = create_app(
        repositories,
        table_manager,
        metrics,
        AppSettings {
            server: config.server,
            pagination: config.pagination,
            database: config.database,
        },
    );

    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;

    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install CTRL+C signal handler: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received");
        shutdown_observability().await;
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
