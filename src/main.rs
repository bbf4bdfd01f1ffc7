use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use snakeserve::classifier::Model;
use snakeserve::config;
use snakeserve::server::{routes, AppState};
use std::env;
use tch::Device;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut settings = config::get_configuration()?;
    if let Some(weights) = env::args().nth(1) {
        settings.model.weights_file = weights;
    }

    let device = Device::cuda_if_available();
    info!("using device {device:?}");

    // a load failure does not abort startup: the health route keeps
    // answering and /predict reports the failure on every call
    let model = match Model::load(&settings.model.weights_file, device) {
        Ok(model) => {
            info!("model ready ({})", settings.model.weights_file);
            Some(model)
        }
        Err(e) => {
            error!("failed to load model from {}: {e}", settings.model.weights_file);
            None
        }
    };

    let state = web::Data::new(AppState::new(model, settings.model.weights_file.clone()));
    let address = settings.server.address();
    info!("listening on {address}");

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header();

        App::new()
            .app_data(state.clone())
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .service(routes::health)
            .service(routes::predict)
    })
    .bind(address)?
    .run()
    .await?;

    Ok(())
}
