use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use std::time::Instant;

use crate::error::{AppError, AppResult, ErrorBody};
use crate::services::gps::{GeoPoint, GpsState};
use crate::services::normalize::{NormalizedPoint, WaveDirectionPoint, WindSpeedPoint};
use crate::services::series::{
    SeriesContext, SeriesResponse, SeriesSource, WindDirectionResponse,
};
use crate::services::status::StatusSnapshot;
use crate::state::AppState;
use crate::time::{display_clock, parse_raw_hours, QueryWindow, TimeRange};

#[derive(Debug, Clone, serde::Deserialize, utoipa::IntoParams)]
pub(crate) struct RangeQuery {
    /// One of `12h`, `24h`, `48h`, `7d`; anything else means `24h`.
    range: Option<String>,
}

#[derive(Debug, Clone, serde::Deserialize, utoipa::IntoParams)]
pub(crate) struct WaveCountQuery {
    /// Window length in hours; takes precedence over `range`.
    hours: Option<String>,
    range: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PositionResponse {
    state: GpsState,
    latitude: f64,
    longitude: f64,
    deviation_meters: f64,
    raw_latitude: Option<f64>,
    raw_longitude: Option<f64>,
    last_update: Option<String>,
}

fn series_context(state: &AppState) -> SeriesContext<'_> {
    SeriesContext {
        vendor: &state.vendor,
        policy: state.config.parse_failure_policy,
        last_update: display_clock(Utc::now(), state.config.display_timezone),
    }
}

fn range_window(query: &RangeQuery) -> QueryWindow {
    QueryWindow::for_range(Utc::now(), TimeRange::parse(query.range.as_deref()))
}

#[utoipa::path(
    get,
    path = "/api/buoy/wave-height",
    tag = "buoy",
    params(RangeQuery),
    responses(
        (status = 200, description = "Significant wave height series"),
        (status = 500, description = "Vendor unavailable", body = ErrorBody)
    )
)]
pub(crate) async fn wave_height(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> AppResult<Json<SeriesResponse<NormalizedPoint>>> {
    let source = SeriesSource::wave_height(&state.config.wave_height);
    series_context(&state)
        .scalar(&source, &range_window(&query))
        .await
        .map(Json)
        .map_err(|err| AppError::upstream(source.kind, err))
}

#[utoipa::path(
    get,
    path = "/api/buoy/wave-count",
    tag = "buoy",
    params(WaveCountQuery),
    responses(
        (status = 200, description = "Number of waves per measurement period"),
        (status = 500, description = "Vendor unavailable", body = ErrorBody)
    )
)]
pub(crate) async fn wave_count(
    State(state): State<AppState>,
    Query(query): Query<WaveCountQuery>,
) -> AppResult<Json<SeriesResponse<NormalizedPoint>>> {
    let source = SeriesSource::wave_count();
    let hours = parse_raw_hours(query.hours.as_deref())
        .unwrap_or_else(|| TimeRange::parse(query.range.as_deref()).hours());
    let ctx = series_context(&state);
    let now = Instant::now();

    let payload = match state.wave_count_cache.fresh(&hours, now).await {
        Some(payload) => payload,
        None => {
            let window = QueryWindow::ending_at(Utc::now(), hours);
            let payload = source
                .fetch(&state.vendor, Some(&window))
                .await
                .map_err(|err| AppError::upstream(source.kind, err))?;
            state
                .wave_count_cache
                .store(hours, payload.clone(), now)
                .await;
            payload
        }
    };

    ctx.scalar_from_payload(&source, &payload)
        .map(Json)
        .map_err(|err| AppError::upstream(source.kind, err))
}

#[utoipa::path(
    get,
    path = "/api/buoy/wave-direction",
    tag = "buoy",
    params(RangeQuery),
    responses(
        (status = 200, description = "Wave direction and spread, newest first"),
        (status = 500, description = "Vendor unavailable", body = ErrorBody)
    )
)]
pub(crate) async fn wave_direction(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> AppResult<Json<SeriesResponse<WaveDirectionPoint>>> {
    series_context(&state)
        .wave_direction(&range_window(&query))
        .await
        .map(Json)
        .map_err(|err| AppError::upstream("wave direction", err))
}

#[utoipa::path(
    get,
    path = "/api/buoy/wind-speed",
    tag = "buoy",
    params(RangeQuery),
    responses(
        (status = 200, description = "Wind speed series in m/s with gusts where available"),
        (status = 500, description = "Vendor unavailable", body = ErrorBody)
    )
)]
pub(crate) async fn wind_speed(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> AppResult<Json<SeriesResponse<WindSpeedPoint>>> {
    series_context(&state)
        .wind_speed_with_gusts(&range_window(&query))
        .await
        .map(Json)
        .map_err(|err| AppError::upstream("wind speed", err))
}

#[utoipa::path(
    get,
    path = "/api/buoy/wind-direction",
    tag = "buoy",
    responses(
        (status = 200, description = "Current wind direction and speed", body = WindDirectionResponse),
        (status = 500, description = "Vendor unavailable", body = ErrorBody)
    )
)]
pub(crate) async fn wind_direction(
    State(state): State<AppState>,
) -> AppResult<Json<WindDirectionResponse>> {
    let window = QueryWindow::ending_at(Utc::now(), 1);
    series_context(&state)
        .wind_direction(&window)
        .await
        .map(Json)
        .map_err(|err| AppError::upstream("wind direction", err))
}

#[utoipa::path(
    get,
    path = "/api/buoy/temperature",
    tag = "buoy",
    params(RangeQuery),
    responses(
        (status = 200, description = "Air temperature series in °C"),
        (status = 500, description = "Vendor unavailable", body = ErrorBody)
    )
)]
pub(crate) async fn temperature(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> AppResult<Json<SeriesResponse<NormalizedPoint>>> {
    let source = SeriesSource::temperature();
    series_context(&state)
        .scalar(&source, &range_window(&query))
        .await
        .map(Json)
        .map_err(|err| AppError::upstream(source.kind, err))
}

#[utoipa::path(
    get,
    path = "/api/buoy/pressure",
    tag = "buoy",
    responses(
        (status = 200, description = "Atmospheric pressure over the last 24h in hPa"),
        (status = 500, description = "Vendor unavailable", body = ErrorBody)
    )
)]
pub(crate) async fn pressure(
    State(state): State<AppState>,
) -> AppResult<Json<SeriesResponse<NormalizedPoint>>> {
    let source = SeriesSource::pressure();
    let window = QueryWindow::for_range(Utc::now(), TimeRange::Last24Hours);
    series_context(&state)
        .scalar(&source, &window)
        .await
        .map(Json)
        .map_err(|err| AppError::upstream(source.kind, err))
}

#[utoipa::path(
    get,
    path = "/api/buoy/status",
    tag = "buoy",
    responses((status = 200, description = "Buoy technical status; fields are null when unavailable", body = StatusSnapshot))
)]
pub(crate) async fn status(State(state): State<AppState>) -> Json<StatusSnapshot> {
    Json(state.status.snapshot(Instant::now()).await)
}

#[utoipa::path(
    get,
    path = "/api/buoy/position",
    tag = "buoy",
    responses((status = 200, description = "Displayed buoy position after GPS outlier filtering", body = PositionResponse))
)]
pub(crate) async fn position(State(state): State<AppState>) -> Json<PositionResponse> {
    let snapshot = state.status.snapshot(Instant::now()).await;
    let reading = {
        let mut filter = state.gps.lock().await;
        match (snapshot.latitude, snapshot.longitude) {
            (Some(lat), Some(lon)) => filter.observe(GeoPoint::new(lat, lon)),
            _ => filter.current(),
        }
    };
    if reading.state == GpsState::Unstable {
        tracing::info!(
            deviation_m = reading.deviation_m,
            "GPS sample far from anchor; holding nominal position"
        );
    }
    Json(PositionResponse {
        state: reading.state,
        latitude: reading.displayed.lat,
        longitude: reading.displayed.lon,
        deviation_meters: reading.deviation_m,
        raw_latitude: snapshot.latitude,
        raw_longitude: snapshot.longitude,
        last_update: snapshot.last_update,
    })
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/buoy/wave-height", get(wave_height))
        .route("/buoy/wave-count", get(wave_count))
        .route("/buoy/wave-direction", get(wave_direction))
        .route("/buoy/wind-speed", get(wind_speed))
        .route("/buoy/wind-direction", get(wind_direction))
        .route("/buoy/temperature", get(temperature))
        .route("/buoy/pressure", get(pressure))
        .route("/buoy/status", get(status))
        .route("/buoy/position", get(position))
}
