use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "buoy-server",
        description = "Normalized ocean and weather conditions from the moored buoy"
    ),
    paths(
        crate::routes::health::healthz_handler,
        crate::routes::buoy::wave_height,
        crate::routes::buoy::wave_count,
        crate::routes::buoy::wave_direction,
        crate::routes::buoy::wind_speed,
        crate::routes::buoy::wind_direction,
        crate::routes::buoy::temperature,
        crate::routes::buoy::pressure,
        crate::routes::buoy::status,
        crate::routes::buoy::position,
    ),
    components(schemas(
        crate::error::ErrorBody,
        crate::routes::health::HealthResponse,
        crate::routes::buoy::PositionResponse,
        crate::services::gps::GpsState,
        crate::services::normalize::NormalizedPoint,
        crate::services::normalize::WaveDirectionPoint,
        crate::services::normalize::WindSpeedPoint,
        crate::services::series::CurrentValue,
        crate::services::series::WindDirectionResponse,
        crate::services::status::StatusSnapshot,
    )),
    tags((name = "buoy", description = "Buoy telemetry"))
)]
pub struct ApiDoc;

pub fn openapi_json() -> serde_json::Value {
    serde_json::to_value(ApiDoc::openapi()).unwrap_or_else(|err| {
        tracing::error!(error = %err, "failed to render OpenAPI document");
        serde_json::Value::Null
    })
}

async fn openapi_handler() -> Json<serde_json::Value> {
    Json(openapi_json())
}

pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_handler))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_buoy_route() {
        let doc = openapi_json();
        let paths = doc["paths"].as_object().expect("paths");
        for route in [
            "/healthz",
            "/api/buoy/wave-height",
            "/api/buoy/wave-count",
            "/api/buoy/wave-direction",
            "/api/buoy/wind-speed",
            "/api/buoy/wind-direction",
            "/api/buoy/temperature",
            "/api/buoy/pressure",
            "/api/buoy/status",
            "/api/buoy/position",
        ] {
            assert!(paths.contains_key(route), "missing {route}");
        }
        assert!(doc["components"]["schemas"]["StatusSnapshot"].is_object());
    }
}
