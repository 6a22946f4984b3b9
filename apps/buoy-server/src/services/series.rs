//! One parameterized proxy for every buoy time series: fetch the vendor
//! payload, locate the sensor, normalize, and wrap the points together with
//! the request-time `lastUpdate` label.

use futures::future;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::services::normalize::{
    join_gusts, join_wave_direction, latest_value, normalize_series, NormalizedPoint,
    ParseFailurePolicy, UnitConversion, ValueParseError, WaveDirectionPoint, WindSpeedPoint,
};
use crate::services::sensor_path::{extract_samples, SensorPath};
use crate::services::vendor::{VendorClient, VendorError};
use crate::time::QueryWindow;

#[derive(Debug, thiserror::Error)]
pub enum SeriesError {
    #[error(transparent)]
    Vendor(#[from] VendorError),
    #[error(transparent)]
    Parse(#[from] ValueParseError),
}

/// Which vendor codes carry wave height, and in what unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaveHeightProfile {
    pub codes: Vec<String>,
    pub conversion: UnitConversion,
}

#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
#[serde(untagged)]
pub enum CurrentValue {
    Scalar(f64),
    Direction { direction: f64, spread: f64 },
}

pub trait SeriesPoint {
    fn current_value(&self) -> CurrentValue;
}

impl SeriesPoint for NormalizedPoint {
    fn current_value(&self) -> CurrentValue {
        CurrentValue::Scalar(self.value)
    }
}

impl SeriesPoint for WindSpeedPoint {
    fn current_value(&self) -> CurrentValue {
        CurrentValue::Scalar(self.value)
    }
}

impl SeriesPoint for WaveDirectionPoint {
    fn current_value(&self) -> CurrentValue {
        CurrentValue::Direction {
            direction: self.direction,
            spread: self.spread,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesResponse<P> {
    pub data: Vec<P>,
    pub last_update: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_value: Option<CurrentValue>,
}

impl<P: SeriesPoint> SeriesResponse<P> {
    /// `currentValue` mirrors `data[0]`, whatever order the series is in.
    pub fn new(data: Vec<P>, last_update: String) -> Self {
        let current_value = data.first().map(SeriesPoint::current_value);
        Self {
            data,
            last_update,
            current_value,
        }
    }

    pub fn empty(last_update: String) -> Self {
        Self::new(Vec::new(), last_update)
    }
}

/// A scalar series: where it lives and how to convert it.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesSource {
    pub kind: &'static str,
    pub path: SensorPath,
    pub conversion: UnitConversion,
}

impl SeriesSource {
    pub fn wave_height(profile: &WaveHeightProfile) -> Self {
        let codes: Vec<&str> = profile.codes.iter().map(String::as_str).collect();
        Self {
            kind: "wave height",
            path: SensorPath::new("Waves", "Wave Height", &codes),
            conversion: profile.conversion,
        }
    }

    pub fn wave_count() -> Self {
        Self {
            kind: "wave count",
            path: SensorPath::new("Waves", "Wave Count", &["VQTY"]),
            conversion: UnitConversion::Identity,
        }
    }

    pub fn temperature() -> Self {
        Self {
            kind: "temperature",
            path: SensorPath::new("EMA", "Temperature", &["DRYT", "DEWT"]),
            conversion: UnitConversion::Identity,
        }
    }

    pub fn pressure() -> Self {
        Self {
            kind: "pressure",
            path: SensorPath::new("EMA", "Atmospheric Pressure", &["ATMS"]),
            conversion: UnitConversion::Identity,
        }
    }

    pub fn wind_speed() -> Self {
        Self {
            kind: "wind speed",
            path: SensorPath::new("EMA", "Wind Speed", &["WSPD"]),
            conversion: UnitConversion::Identity,
        }
    }

    pub fn wind_gust() -> Self {
        Self {
            kind: "wind gust",
            path: SensorPath::new("EMA", "Wind Gust", &["WGST"]),
            conversion: UnitConversion::Identity,
        }
    }

    pub fn fetch<'a>(
        &self,
        vendor: &'a VendorClient,
        window: Option<&QueryWindow>,
    ) -> impl std::future::Future<Output = Result<JsonValue, VendorError>> + 'a {
        let category = self.path.category.clone();
        let sensor = self.path.sensor.clone();
        let window = window.copied();
        async move {
            vendor
                .fetch_series(&category, &sensor, window.as_ref())
                .await
        }
    }

    /// Normalizes an already fetched payload. An absent sensor is an empty
    /// series, not an error.
    pub fn points_from(
        &self,
        payload: &JsonValue,
        policy: ParseFailurePolicy,
    ) -> Result<Vec<NormalizedPoint>, ValueParseError> {
        match extract_samples(payload, &self.path) {
            Some(samples) => normalize_series(&samples, self.conversion, policy),
            None => {
                tracing::info!(kind = self.kind, "sensor not present in vendor payload");
                Ok(Vec::new())
            }
        }
    }
}

/// Everything a series request needs besides its window.
pub struct SeriesContext<'a> {
    pub vendor: &'a VendorClient,
    pub policy: ParseFailurePolicy,
    pub last_update: String,
}

impl SeriesContext<'_> {
    pub async fn scalar(
        &self,
        source: &SeriesSource,
        window: &QueryWindow,
    ) -> Result<SeriesResponse<NormalizedPoint>, SeriesError> {
        let payload = source.fetch(self.vendor, Some(window)).await?;
        self.scalar_from_payload(source, &payload)
    }

    pub fn scalar_from_payload(
        &self,
        source: &SeriesSource,
        payload: &JsonValue,
    ) -> Result<SeriesResponse<NormalizedPoint>, SeriesError> {
        let points = source.points_from(payload, self.policy)?;
        Ok(SeriesResponse::new(points, self.last_update.clone()))
    }

    /// Wind speed with gusts attached. The gust feed is best effort: if it
    /// fails every point carries a null gust.
    pub async fn wind_speed_with_gusts(
        &self,
        window: &QueryWindow,
    ) -> Result<SeriesResponse<WindSpeedPoint>, SeriesError> {
        let speed_source = SeriesSource::wind_speed();
        let gust_source = SeriesSource::wind_gust();
        let (speed, gust) = future::join(
            speed_source.fetch(self.vendor, Some(window)),
            gust_source.fetch(self.vendor, Some(window)),
        )
        .await;

        let speeds = speed_source.points_from(&speed?, self.policy)?;
        let gusts = match gust {
            Ok(payload) => gust_source
                .points_from(&payload, ParseFailurePolicy::Drop)
                .unwrap_or_default(),
            Err(err) => {
                tracing::warn!(error = %err, "wind gust fetch failed; continuing without gusts");
                Vec::new()
            }
        };

        Ok(SeriesResponse::new(
            join_gusts(speeds, &gusts),
            self.last_update.clone(),
        ))
    }

    pub async fn wave_direction(
        &self,
        window: &QueryWindow,
    ) -> Result<SeriesResponse<WaveDirectionPoint>, SeriesError> {
        let payload = self
            .vendor
            .fetch_series("Waves", "Angular", Some(window))
            .await?;
        self.wave_direction_from_payload(&payload)
    }

    pub fn wave_direction_from_payload(
        &self,
        payload: &JsonValue,
    ) -> Result<SeriesResponse<WaveDirectionPoint>, SeriesError> {
        let angular = SensorPath::new("Waves", "Angular", &["VDIR"]);
        let Some(directions) = extract_samples(payload, &angular) else {
            tracing::info!("wave direction not present in vendor payload");
            return Ok(SeriesResponse::empty(self.last_update.clone()));
        };
        let spreads = extract_samples(payload, &angular.with_code("VPSP")).unwrap_or_default();
        let points = join_wave_direction(&directions, &spreads, self.policy)?;
        Ok(SeriesResponse::new(points, self.last_update.clone()))
    }

    /// Current wind conditions from the last hour. Direction is required;
    /// speed and gust degrade to zero / absent.
    pub async fn wind_direction(
        &self,
        window: &QueryWindow,
    ) -> Result<WindDirectionResponse, SeriesError> {
        let speed_source = SeriesSource::wind_speed();
        let gust_source = SeriesSource::wind_gust();
        let (angular, speed, gust) = future::join3(
            self.vendor.fetch_series("EMA", "Angular", Some(window)),
            speed_source.fetch(self.vendor, Some(window)),
            gust_source.fetch(self.vendor, Some(window)),
        )
        .await;
        let angular = angular?;
        let speed = speed
            .map_err(|err| tracing::warn!(error = %err, "wind speed fetch failed; reporting 0"))
            .ok();
        let gust = gust
            .map_err(|err| tracing::warn!(error = %err, "wind gust fetch failed; omitting gust"))
            .ok();

        Ok(self.wind_direction_from_payloads(&angular, speed.as_ref(), gust.as_ref()))
    }

    pub fn wind_direction_from_payloads(
        &self,
        angular: &JsonValue,
        speed: Option<&JsonValue>,
        gust: Option<&JsonValue>,
    ) -> WindDirectionResponse {
        let direction_path = SensorPath::new("EMA", "Angular", &["WDIR"]);
        let latest = |payload: Option<&JsonValue>, path: &SensorPath| {
            payload
                .and_then(|payload| extract_samples(payload, path))
                .and_then(|samples| latest_value(&samples))
        };

        let Some(directions) = extract_samples(angular, &direction_path) else {
            tracing::info!("wind direction not present in vendor payload");
            return WindDirectionResponse {
                direction: 0.0,
                speed: 0.0,
                gust_direction: None,
                gust_speed: None,
                last_update: self.last_update.clone(),
            };
        };

        WindDirectionResponse {
            direction: latest_value(&directions).unwrap_or(0.0),
            speed: latest(speed, &SeriesSource::wind_speed().path).unwrap_or(0.0),
            gust_direction: latest(Some(angular), &direction_path.with_code("GDIR")),
            gust_speed: latest(gust, &SeriesSource::wind_gust().path),
            last_update: self.last_update.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WindDirectionResponse {
    pub direction: f64,
    pub speed: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gust_direction: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gust_speed: Option<f64>,
    pub last_update: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use url::Url;

    fn context(vendor: &VendorClient, policy: ParseFailurePolicy) -> SeriesContext<'_> {
        SeriesContext {
            vendor,
            policy,
            last_update: "10:05".to_string(),
        }
    }

    fn offline_vendor() -> VendorClient {
        VendorClient::new(
            reqwest::Client::new(),
            Url::parse("http://127.0.0.1:9/api/device").unwrap(),
            "10",
            "t",
            Duration::from_millis(50),
        )
    }

    fn sensor_payload(category: &str, sensor: &str, code: &str, values: JsonValue) -> JsonValue {
        json!({"data": {category: [{sensor: {code: {"values": values}}}]}})
    }

    #[test]
    fn empty_data_yields_empty_series_with_label() {
        let vendor = offline_vendor();
        let ctx = context(&vendor, ParseFailurePolicy::Drop);
        let response = ctx
            .scalar_from_payload(&SeriesSource::pressure(), &json!({"data": {}}))
            .unwrap();
        assert!(response.data.is_empty());
        assert_eq!(response.last_update, "10:05");
        assert!(response.current_value.is_none());

        let rendered = serde_json::to_value(&response).unwrap();
        assert_eq!(rendered, json!({"data": [], "lastUpdate": "10:05"}));
    }

    #[test]
    fn wave_height_profiles_differ_in_codes_and_units() {
        let vendor = offline_vendor();
        let ctx = context(&vendor, ParseFailurePolicy::Drop);
        let payload = json!({"data": {"Waves": {"0": {"Wave Height": {
            "VMXL": {"values": {"0": {"date": "t0", "value": "2.4"}}},
            "VAVH": {"values": {"0": {"date": "t0", "value": "150"}}}
        }}}}});

        let cm = SeriesSource::wave_height(&WaveHeightProfile {
            codes: vec!["VAVH".to_string()],
            conversion: UnitConversion::CentimetersToMeters,
        });
        let response = ctx.scalar_from_payload(&cm, &payload).unwrap();
        assert_eq!(response.current_value, Some(CurrentValue::Scalar(1.5)));

        let meters = SeriesSource::wave_height(&WaveHeightProfile {
            codes: vec!["VHM0".to_string(), "VMXL".to_string()],
            conversion: UnitConversion::Identity,
        });
        let response = ctx.scalar_from_payload(&meters, &payload).unwrap();
        assert_eq!(response.data[0].value, 2.4);
    }

    #[test]
    fn temperature_falls_back_to_dew_point_code() {
        let vendor = offline_vendor();
        let ctx = context(&vendor, ParseFailurePolicy::Drop);
        let payload = sensor_payload(
            "EMA",
            "Temperature",
            "DEWT",
            json!({"0": {"date": "t0", "value": "17.2"}}),
        );
        let response = ctx
            .scalar_from_payload(&SeriesSource::temperature(), &payload)
            .unwrap();
        assert_eq!(response.data.len(), 1);
        assert_eq!(response.data[0].value, 17.2);
    }

    #[test]
    fn temperature_skips_an_empty_primary_code() {
        let vendor = offline_vendor();
        let ctx = context(&vendor, ParseFailurePolicy::Drop);
        for dry in [json!({}), JsonValue::Null] {
            let payload = json!({"data": {"EMA": [{"Temperature": {
                "DRYT": dry,
                "DEWT": {"values": {"0": {"date": "t0", "value": "17.2"}}}
            }}]}});
            let response = ctx
                .scalar_from_payload(&SeriesSource::temperature(), &payload)
                .unwrap();
            assert_eq!(response.data.len(), 1);
            assert_eq!(response.data[0].value, 17.2);
        }
    }

    #[test]
    fn fail_policy_surfaces_parse_error() {
        let vendor = offline_vendor();
        let ctx = context(&vendor, ParseFailurePolicy::Fail);
        let payload = sensor_payload(
            "EMA",
            "Atmospheric Pressure",
            "ATMS",
            json!({"0": {"date": "t0", "value": "---"}}),
        );
        let err = ctx
            .scalar_from_payload(&SeriesSource::pressure(), &payload)
            .unwrap_err();
        assert!(matches!(err, SeriesError::Parse(_)));
    }

    #[test]
    fn wave_direction_current_value_is_an_object() {
        let vendor = offline_vendor();
        let ctx = context(&vendor, ParseFailurePolicy::Drop);
        let payload = json!({"data": {"Waves": {"0": {"Angular": {
            "VDIR": {"values": {
                "0": {"date": "2025-01-05 10:00:00", "value": "180"},
                "1": {"date": "2025-01-05 11:00:00", "value": "200"}
            }},
            "VPSP": {"values": {"1": {"date": "2025-01-05 11:00:00", "value": "25"}}}
        }}}}});
        let response = ctx.wave_direction_from_payload(&payload).unwrap();
        assert_eq!(response.data[0].timestamp, "2025-01-05 11:00:00");
        let rendered = serde_json::to_value(&response).unwrap();
        assert_eq!(
            rendered["currentValue"],
            json!({"direction": 200.0, "spread": 25.0})
        );
    }

    #[test]
    fn wind_direction_combines_latest_values() {
        let vendor = offline_vendor();
        let ctx = context(&vendor, ParseFailurePolicy::Drop);
        let angular = json!({"data": {"EMA": [{"Angular": {
            "WDIR": {"values": {
                "0": {"date": "t0", "value": "90"},
                "1": {"date": "t1", "value": "135"}
            }},
            "GDIR": {"values": {"0": {"date": "t0", "value": "140"}}}
        }}]}});
        let speed = sensor_payload(
            "EMA",
            "Wind Speed",
            "WSPD",
            json!({"0": {"date": "t0", "value": "4.1"}, "1": {"date": "t1", "value": "5.3"}}),
        );

        let response = ctx.wind_direction_from_payloads(&angular, Some(&speed), None);
        assert_eq!(response.direction, 135.0);
        assert_eq!(response.speed, 5.3);
        assert_eq!(response.gust_direction, Some(140.0));
        assert_eq!(response.gust_speed, None);

        let rendered = serde_json::to_value(&response).unwrap();
        assert!(rendered.get("gustSpeed").is_none());
    }

    #[test]
    fn wind_direction_without_wdir_reports_zeroes() {
        let vendor = offline_vendor();
        let ctx = context(&vendor, ParseFailurePolicy::Drop);
        let response = ctx.wind_direction_from_payloads(&json!({"data": {}}), None, None);
        assert_eq!(response.direction, 0.0);
        assert_eq!(response.speed, 0.0);
    }
}
