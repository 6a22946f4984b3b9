use anyhow::{Context, Result};
use chrono_tz::Tz;
use dotenvy::dotenv;
use std::fmt;
use std::time::Duration;
use url::Url;

use crate::services::gps::{GeoPoint, GpsFilterSettings};
use crate::services::normalize::{ParseFailurePolicy, UnitConversion};
use crate::services::series::WaveHeightProfile;

const DEFAULT_VENDOR_BASE_URL: &str = "https://oceancom.msm-data.com/api/device";
const DEFAULT_NOMINAL_LATITUDE: f64 = -18.46772;
const DEFAULT_NOMINAL_LONGITUDE: f64 = -70.34051;

#[derive(Clone)]
pub struct BuoyConfig {
    pub vendor_base_url: Url,
    pub vendor_token: String,
    pub device_id: String,
    pub status_station: String,
    pub vendor_timeout: Duration,
    pub status_timeout: Duration,
    pub status_cache_ttl: Duration,
    pub wave_count_cache_ttl: Duration,
    pub wave_height: WaveHeightProfile,
    pub parse_failure_policy: ParseFailurePolicy,
    pub display_timezone: Tz,
    pub gps: GpsFilterSettings,
    pub rate_limit_per_second: u64,
    pub rate_limit_burst: u32,
}

impl fmt::Debug for BuoyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuoyConfig")
            .field("vendor_base_url", &self.vendor_base_url.as_str())
            .field("vendor_token", &"<redacted>")
            .field("device_id", &self.device_id)
            .field("status_station", &self.status_station)
            .field("vendor_timeout", &self.vendor_timeout)
            .field("status_timeout", &self.status_timeout)
            .field("status_cache_ttl", &self.status_cache_ttl)
            .field("wave_count_cache_ttl", &self.wave_count_cache_ttl)
            .field("wave_height", &self.wave_height)
            .field("parse_failure_policy", &self.parse_failure_policy)
            .field("display_timezone", &self.display_timezone)
            .field("gps", &self.gps)
            .field("rate_limit_per_second", &self.rate_limit_per_second)
            .field("rate_limit_burst", &self.rate_limit_burst)
            .finish()
    }
}

impl BuoyConfig {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env = EnvReader { lookup: &lookup };

        let base_raw = env.string("BUOY_VENDOR_BASE_URL", DEFAULT_VENDOR_BASE_URL);
        let vendor_base_url = Url::parse(&base_raw)
            .with_context(|| format!("BUOY_VENDOR_BASE_URL is not a valid URL ({base_raw})"))?;
        if vendor_base_url.cannot_be_a_base() {
            anyhow::bail!("BUOY_VENDOR_BASE_URL must be a hierarchical http(s) URL");
        }
        let vendor_token = env
            .optional_string("BUOY_VENDOR_TOKEN")
            .context("BUOY_VENDOR_TOKEN must be set to the telemetry vendor access token")?;
        let device_id = env.string("BUOY_DEVICE_ID", "10");
        let status_station = env.string("BUOY_STATUS_STATION", "MMB03");

        let vendor_timeout =
            Duration::from_secs(env.u64("BUOY_VENDOR_TIMEOUT_SECONDS", 20).clamp(1, 120));
        let status_timeout =
            Duration::from_secs(env.u64("BUOY_STATUS_TIMEOUT_SECONDS", 10).clamp(1, 120));
        let status_cache_ttl = Duration::from_secs(env.u64("BUOY_STATUS_CACHE_SECONDS", 60));
        let wave_count_cache_ttl =
            Duration::from_secs(env.u64("BUOY_WAVE_COUNT_CACHE_SECONDS", 300));

        let codes = env.list("BUOY_WAVE_HEIGHT_CODES", &["VAVH"]);
        let conversion = match env.string("BUOY_WAVE_HEIGHT_UNIT", "cm").to_lowercase().as_str() {
            "cm" => UnitConversion::CentimetersToMeters,
            "m" => UnitConversion::Identity,
            other => anyhow::bail!("BUOY_WAVE_HEIGHT_UNIT must be `cm` or `m` (got `{other}`)"),
        };
        let wave_height = WaveHeightProfile { codes, conversion };

        let policy_raw = env.string("BUOY_PARSE_FAILURE_POLICY", "drop");
        let parse_failure_policy = ParseFailurePolicy::parse(&policy_raw).with_context(|| {
            format!("BUOY_PARSE_FAILURE_POLICY must be drop, zero or fail (got `{policy_raw}`)")
        })?;

        let tz_raw = env.string("BUOY_DISPLAY_TIMEZONE", "America/Santiago");
        let display_timezone: Tz = tz_raw
            .parse()
            .map_err(|err| anyhow::anyhow!("BUOY_DISPLAY_TIMEZONE `{tz_raw}` is invalid: {err}"))?;

        let nominal = GeoPoint::new(
            env.f64("BUOY_NOMINAL_LATITUDE", DEFAULT_NOMINAL_LATITUDE),
            env.f64("BUOY_NOMINAL_LONGITUDE", DEFAULT_NOMINAL_LONGITUDE),
        );
        if !(-90.0..=90.0).contains(&nominal.lat) {
            anyhow::bail!("BUOY_NOMINAL_LATITUDE must be -90..90");
        }
        if !(-180.0..=180.0).contains(&nominal.lon) {
            anyhow::bail!("BUOY_NOMINAL_LONGITUDE must be -180..180");
        }
        let gps = GpsFilterSettings {
            nominal,
            max_deviation_m: env.f64("BUOY_GPS_MAX_DEVIATION_METERS", 2000.0).max(0.0),
            min_movement_m: env.f64("BUOY_GPS_MIN_MOVEMENT_METERS", 10.0).max(0.0),
        };

        let rate_limit_per_second = env.u64("BUOY_RATE_LIMIT_PER_SECOND", 5).max(1);
        let rate_limit_burst = env.u32("BUOY_RATE_LIMIT_BURST", 30).max(1);

        Ok(Self {
            vendor_base_url,
            vendor_token,
            device_id,
            status_station,
            vendor_timeout,
            status_timeout,
            status_cache_ttl,
            wave_count_cache_ttl,
            wave_height,
            parse_failure_policy,
            display_timezone,
            gps,
            rate_limit_per_second,
            rate_limit_burst,
        })
    }
}

struct EnvReader<'a, F: Fn(&str) -> Option<String>> {
    lookup: &'a F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<'_, F> {
    fn optional_string(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn string(&self, key: &str, default: &str) -> String {
        self.optional_string(key)
            .unwrap_or_else(|| default.to_string())
    }

    fn list(&self, key: &str, default: &[&str]) -> Vec<String> {
        let parsed: Vec<String> = self
            .optional_string(key)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        if parsed.is_empty() {
            default.iter().map(|item| item.to_string()).collect()
        } else {
            parsed
        }
    }

    fn u32(&self, key: &str, default: u32) -> u32 {
        self.optional_string(key)
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(default)
    }

    fn u64(&self, key: &str, default: u64) -> u64 {
        self.optional_string(key)
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(default)
    }

    fn f64(&self, key: &str, default: f64) -> f64 {
        self.optional_string(key)
            .and_then(|value| value.parse::<f64>().ok())
            .filter(|value| value.is_finite())
            .unwrap_or(default)
    }
}
