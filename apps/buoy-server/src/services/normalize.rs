use std::cmp::Ordering;
use std::collections::HashMap;

use serde::Serialize;

use crate::services::sensor_path::RawSample;
use crate::time::parse_vendor_timestamp;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("sample {key} at {date} has non-numeric value {raw:?}")]
pub struct ValueParseError {
    pub key: String,
    pub date: String,
    pub raw: String,
}

pub fn parse_value(sample: &RawSample) -> Result<f64, ValueParseError> {
    sample
        .value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| ValueParseError {
            key: sample.key.clone(),
            date: sample.date.clone(),
            raw: sample.value.clone(),
        })
}

/// What to do with a sample whose value does not parse as a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseFailurePolicy {
    #[default]
    Drop,
    Zero,
    Fail,
}

impl ParseFailurePolicy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "drop" => Some(Self::Drop),
            "zero" => Some(Self::Zero),
            "fail" => Some(Self::Fail),
            _ => None,
        }
    }

    /// `Ok(None)` means the sample is dropped.
    pub fn apply(self, parsed: Result<f64, ValueParseError>) -> Result<Option<f64>, ValueParseError> {
        match (parsed, self) {
            (Ok(value), _) => Ok(Some(value)),
            (Err(err), Self::Drop) => {
                tracing::debug!(error = %err, "dropping unparseable sample");
                Ok(None)
            }
            (Err(_), Self::Zero) => Ok(Some(0.0)),
            (Err(err), Self::Fail) => Err(err),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnitConversion {
    #[default]
    Identity,
    CentimetersToMeters,
}

impl UnitConversion {
    pub fn apply(self, value: f64) -> f64 {
        match self {
            Self::Identity => value,
            Self::CentimetersToMeters => value / 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
pub struct NormalizedPoint {
    pub timestamp: String,
    pub value: f64,
}

/// Parses and converts samples, preserving their order.
pub fn normalize_series(
    samples: &[RawSample],
    conversion: UnitConversion,
    policy: ParseFailurePolicy,
) -> Result<Vec<NormalizedPoint>, ValueParseError> {
    let mut points = Vec::with_capacity(samples.len());
    for sample in samples {
        if let Some(value) = policy.apply(parse_value(sample))? {
            points.push(NormalizedPoint {
                timestamp: sample.date.clone(),
                value: conversion.apply(value),
            });
        }
    }
    Ok(points)
}

#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
pub struct WaveDirectionPoint {
    pub timestamp: String,
    pub direction: f64,
    pub spread: f64,
}

/// Zips direction and spread samples by vendor key. A direction without a
/// usable spread gets spread 0; the policy only decides the fate of the bad
/// sample itself. Output is newest first.
pub fn join_wave_direction(
    directions: &[RawSample],
    spreads: &[RawSample],
    policy: ParseFailurePolicy,
) -> Result<Vec<WaveDirectionPoint>, ValueParseError> {
    let spread_by_key: HashMap<&str, &RawSample> = spreads
        .iter()
        .map(|sample| (sample.key.as_str(), sample))
        .collect();

    let mut points = Vec::with_capacity(directions.len());
    for sample in directions {
        let Some(direction) = policy.apply(parse_value(sample))? else {
            continue;
        };
        let spread = match spread_by_key.get(sample.key.as_str()) {
            Some(spread) => policy.apply(parse_value(spread))?.unwrap_or(0.0),
            None => 0.0,
        };
        points.push(WaveDirectionPoint {
            timestamp: sample.date.clone(),
            direction,
            spread,
        });
    }

    points.sort_by(|a, b| compare_timestamps_desc(&a.timestamp, &b.timestamp));
    Ok(points)
}

fn compare_timestamps_desc(a: &str, b: &str) -> Ordering {
    match (parse_vendor_timestamp(a), parse_vendor_timestamp(b)) {
        (Some(a), Some(b)) => b.cmp(&a),
        _ => b.cmp(a),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WindSpeedPoint {
    pub timestamp: String,
    pub value: f64,
    pub gust_value: Option<f64>,
}

/// Attaches gusts to wind speed points by exact timestamp string.
pub fn join_gusts(speeds: Vec<NormalizedPoint>, gusts: &[NormalizedPoint]) -> Vec<WindSpeedPoint> {
    let gust_by_time: HashMap<&str, f64> = gusts
        .iter()
        .map(|point| (point.timestamp.as_str(), point.value))
        .collect();
    speeds
        .into_iter()
        .map(|point| {
            let gust_value = gust_by_time.get(point.timestamp.as_str()).copied();
            WindSpeedPoint {
                timestamp: point.timestamp,
                value: point.value,
                gust_value,
            }
        })
        .collect()
}

/// Most recent value of a current-conditions series: the last sample that
/// parses, in vendor order.
pub fn latest_value(samples: &[RawSample]) -> Option<f64> {
    samples
        .iter()
        .rev()
        .find_map(|sample| parse_value(sample).ok())
}
