//! The user-facing JSON web server: shared application state plus the API
//! error type that maps failures onto the HTTP status codes and the fixed
//! `{"detail": ...}` bodies clients of the original service expect.

use crate::classifier::Model;
use actix_web::http::header::ContentType;
use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use std::sync::Mutex;
use thiserror::Error;

pub mod protocol;
pub mod routes;

/// Shared, explicitly constructed application state. `model` is `None` when
/// weight loading failed at startup; that state is permanent for the process
/// lifetime and makes every `/predict` call fail uniformly.
///
/// The model sits behind a mutex because libtorch module values are `Send`
/// but not `Sync`; predictions through the single instance are serialized.
pub struct AppState {
    model: Option<Mutex<Model>>,
    weights_path: String,
}

impl AppState {
    pub fn new(model: Option<Model>, weights_path: String) -> Self {
        AppState {
            model: model.map(Mutex::new),
            weights_path,
        }
    }

    pub fn model_loaded(&self) -> bool {
        self.model.is_some()
    }

    pub fn model(&self) -> Option<&Mutex<Model>> {
        self.model.as_ref()
    }

    pub fn weights_path(&self) -> &str {
        &self.weights_path
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("El modelo no se cargó correctamente al iniciar la API.")]
    ModelNotLoaded,

    #[error("El archivo debe ser una imagen (content-type image/*).")]
    NotAnImage,

    #[error("La petición debe incluir un archivo en el campo 'file'.")]
    MissingFile,

    #[error("Error al procesar la imagen: {0}")]
    Processing(String),
}

impl actix_web::error::ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotAnImage | ApiError::MissingFile => StatusCode::BAD_REQUEST,
            ApiError::ModelNotLoaded | ApiError::Processing(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .json(protocol::ErrorResponse {
                detail: self.to_string(),
            })
    }
}
