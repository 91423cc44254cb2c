use smsrelay::AppConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    smsrelay::logging::init(&config.logging);
    smsrelay::server::run(config).await
}
