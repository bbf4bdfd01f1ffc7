//! Route handlers: a health/info route that always succeeds and the single
//! prediction route that accepts one uploaded image.

use super::protocol::{HealthResponse, PredictionResponse};
use super::{ApiError, AppState};
use actix_multipart::Multipart;
use actix_web::{get, post, web, Responder};
use futures_util::TryStreamExt;
use tracing::info;

type Result<T> = std::result::Result<T, ApiError>;

#[get("/")]
pub async fn health(state: web::Data<AppState>) -> impl Responder {
    web::Json(HealthResponse {
        message: "API de clasificación de serpientes funcionando 🚀".to_string(),
        model_loaded: state.model_loaded(),
        model_path: state.weights_path().to_string(),
    })
}

#[post("/predict")]
pub async fn predict(
    state: web::Data<AppState>,
    mut payload: Multipart,
) -> Result<impl Responder> {
    // a failed startup load disables this route for the process lifetime
    if !state.model_loaded() {
        return Err(ApiError::ModelNotLoaded);
    }

    let mut upload: Option<(String, Vec<u8>)> = None;
    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| ApiError::Processing(e.to_string()))?
    {
        if field.name() != "file" {
            continue;
        }
        let is_image = field
            .content_type()
            .map(|mime| mime.essence_str().starts_with("image/"))
            .unwrap_or(false);
        if !is_image {
            return Err(ApiError::NotAnImage);
        }
        let filename = field
            .content_disposition()
            .get_filename()
            .map(str::to_string)
            .unwrap_or_default();
        let mut bytes = Vec::new();
        while let Some(chunk) = field
            .try_next()
            .await
            .map_err(|e| ApiError::Processing(e.to_string()))?
        {
            bytes.extend_from_slice(&chunk);
        }
        upload = Some((filename, bytes));
        break;
    }
    let (filename, bytes) = upload.ok_or(ApiError::MissingFile)?;

    // inference is blocking compute; keep it off the async workers
    let shared = state.clone();
    let prediction = web::block(move || {
        let model = shared.model().ok_or(ApiError::ModelNotLoaded)?.lock().unwrap();
        model
            .predict(&bytes)
            .map_err(|e| ApiError::Processing(e.to_string()))
    })
    .await
    .map_err(|e| ApiError::Processing(e.to_string()))??;

    info!(
        "classified {filename:?} as {} ({:.2}%)",
        prediction.label, prediction.confidence
    );

    Ok(web::Json(PredictionResponse {
        filename,
        predicted_class: prediction.label,
        confidence: prediction.confidence,
    }))
}
