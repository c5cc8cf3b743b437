use espnow_bridge_light::app::App;
use espnow_bridge_light::config::{self, Config};
use log::{error, info};
use tokio::signal;

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

#[tokio::main]
async fn main() {
    // Load .env file before anything else
    config::load_dotenv();
    init_logger();
    info!("Starting ESP-NOW Bridge Light");

    let config = Config::from_env();
    info!("Configuration loaded:");
    info!("  Device Name: {}", config.matter.device_name);
    info!("  Vendor ID: 0x{:04X}", config.matter.vendor_id);
    info!("  Product ID: 0x{:04X}", config.matter.product_id);
    info!("  Discriminator: {}", config.matter.discriminator);
    info!("  Persistence: {:?}", config.bridge.persist_dir);

    let console_enabled = config.console;
    let app = match App::bootstrap(config) {
        Ok(app) => app,
        Err(e) => {
            error!("Failed to start bridge light: {}", e);
            std::process::exit(1);
        }
    };

    let gateway_task = app.spawn_gateway();
    let console_task = console_enabled.then(|| tokio::spawn(app.console().run()));

    info!("ESP-NOW Bridge Light is running");
    info!("  - Light on endpoint {}", app.light_endpoint_id());
    info!("  - Aggregator on endpoint {}", app.aggregator_endpoint_id());
    info!("  - Press Ctrl+C to exit");

    match signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal"),
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }

    if let Some(task) = gateway_task {
        task.abort();
    }
    if let Some(task) = console_task {
        task.abort();
    }
    app.shutdown();

    info!("ESP-NOW Bridge Light stopped");
}
