//! JSON response shapes for the HTTP surface.

use serde::{Deserialize, Serialize};

/// Body of `GET /`.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub message: String,
    pub model_loaded: bool,
    pub model_path: String,
}

/// Body of a successful `POST /predict`.
#[derive(Debug, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub filename: String,
    pub predicted_class: String,
    pub confidence: f64,
}

/// Body of every error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prediction_response_serializes_with_the_expected_keys() {
        let body = PredictionResponse {
            filename: "snake.png".to_string(),
            predicted_class: "Coral".to_string(),
            confidence: 97.25,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "filename": "snake.png",
                "predicted_class": "Coral",
                "confidence": 97.25,
            })
        );
    }
}
