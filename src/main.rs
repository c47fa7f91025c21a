use estate_auctions::config::AppConfig;
use estate_auctions::web::app::run_app;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = AppConfig::from_env();
    run_app(config).await
}
