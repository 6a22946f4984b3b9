//! Locates a sensor's `values` map inside a vendor telemetry payload.
//!
//! The vendor nests every series as
//! `data → category → 0 → sensor name → code → values`, where the `0` level
//! is sometimes an array and sometimes an object keyed by `"0"`, and the code
//! level varies between firmware revisions. Paths are therefore described as
//! data and evaluated by [`lookup`] instead of being hand-chained per route.

use serde_json::{Map, Value as JsonValue};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathStep {
    /// Object member by exact name.
    Key(String),
    /// Array element `n`, or object member `"n"`.
    Slot(usize),
    /// First object member present, in order.
    FirstOf(Vec<String>),
}

impl PathStep {
    fn resolve<'a>(&self, node: &'a JsonValue) -> Option<&'a JsonValue> {
        match self {
            PathStep::Key(name) => node.as_object()?.get(name),
            PathStep::Slot(index) => match node {
                JsonValue::Array(items) => items.get(*index),
                JsonValue::Object(map) => map.get(&index.to_string()),
                _ => None,
            },
            PathStep::FirstOf(names) => {
                let map = node.as_object()?;
                names.iter().find_map(|name| map.get(name))
            }
        }
    }
}

/// Walks `steps` from `root`; `None` as soon as any link is absent. A
/// `FirstOf` step picks the first member whose remaining path resolves, so a
/// code present without samples falls through to the next one.
pub fn lookup<'a>(root: &'a JsonValue, steps: &[PathStep]) -> Option<&'a JsonValue> {
    let Some((step, rest)) = steps.split_first() else {
        return Some(root).filter(|node| !node.is_null());
    };
    match step {
        PathStep::FirstOf(names) if !rest.is_empty() => {
            let map = root.as_object()?;
            names
                .iter()
                .filter_map(|name| map.get(name))
                .find_map(|node| lookup(node, rest))
        }
        _ => lookup(step.resolve(root)?, rest),
    }
}

/// Where a named sensor's samples live in the vendor payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorPath {
    pub category: String,
    pub sensor: String,
    /// Vendor codes tried in order; the first one carrying samples wins.
    pub codes: Vec<String>,
}

impl SensorPath {
    pub fn new(category: &str, sensor: &str, codes: &[&str]) -> Self {
        Self {
            category: category.to_string(),
            sensor: sensor.to_string(),
            codes: codes.iter().map(|code| code.to_string()).collect(),
        }
    }

    pub fn with_code(&self, code: &str) -> Self {
        Self {
            category: self.category.clone(),
            sensor: self.sensor.clone(),
            codes: vec![code.to_string()],
        }
    }

    pub fn steps(&self) -> Vec<PathStep> {
        vec![
            PathStep::Key("data".to_string()),
            PathStep::Key(self.category.clone()),
            PathStep::Slot(0),
            PathStep::Key(self.sensor.clone()),
            PathStep::FirstOf(self.codes.clone()),
            PathStep::Key("values".to_string()),
        ]
    }

    pub fn values<'a>(&self, payload: &'a JsonValue) -> Option<&'a Map<String, JsonValue>> {
        self.codes
            .iter()
            .find_map(|code| lookup(payload, &self.with_code(code).steps())?.as_object())
    }
}

/// One sample as emitted by the vendor, still in string form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSample {
    pub key: String,
    pub date: String,
    pub value: String,
    pub unit: Option<String>,
}

impl RawSample {
    fn from_entry(key: &str, entry: &JsonValue) -> Option<Self> {
        let obj = entry.as_object()?;
        let date = obj.get("date")?.as_str()?.to_string();
        let value = match obj.get("value")? {
            JsonValue::String(raw) => raw.clone(),
            JsonValue::Number(num) => num.to_string(),
            _ => return None,
        };
        let unit = obj
            .get("unit")
            .and_then(JsonValue::as_str)
            .map(str::to_string);
        Some(Self {
            key: key.to_string(),
            date,
            value,
            unit,
        })
    }
}

/// Samples in the order a JavaScript client would see them: integer-like keys
/// ascending, then every other key in payload order. Malformed entries are
/// skipped.
pub fn ordered_samples(values: &Map<String, JsonValue>) -> Vec<RawSample> {
    let mut indexed: Vec<(u64, &String, &JsonValue)> = Vec::new();
    let mut named: Vec<(&String, &JsonValue)> = Vec::new();
    for (key, entry) in values {
        match integer_key(key) {
            Some(index) => indexed.push((index, key, entry)),
            None => named.push((key, entry)),
        }
    }
    indexed.sort_by_key(|(index, _, _)| *index);

    indexed
        .into_iter()
        .map(|(_, key, entry)| (key, entry))
        .chain(named)
        .filter_map(|(key, entry)| RawSample::from_entry(key, entry))
        .collect()
}

fn integer_key(key: &str) -> Option<u64> {
    if key.is_empty() || (key.len() > 1 && key.starts_with('0')) {
        return None;
    }
    if !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    key.parse().ok()
}

/// Resolves `path` in `payload` and returns its samples, or `None` when the
/// sensor is absent.
pub fn extract_samples(payload: &JsonValue, path: &SensorPath) -> Option<Vec<RawSample>> {
    path.values(payload).map(ordered_samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn wave_payload() -> JsonValue {
        json!({
            "data": {
                "Waves": [{
                    "Wave Height": {
                        "VAVH": {
                            "values": {
                                "0": {"date": "2025-01-05 10:00:00", "value": "150", "unit": "cm"},
                                "1": {"date": "2025-01-05 10:30:00", "value": "160", "unit": "cm"},
                                "2": {"date": "2025-01-05 11:00:00", "value": "170", "unit": "cm"}
                            }
                        }
                    }
                }]
            }
        })
    }

    #[test]
    fn slot_matches_array_index_and_string_key() {
        let as_array = json!({"Waves": [{"x": 1}]});
        let as_object = json!({"Waves": {"0": {"x": 1}}});
        let steps = [
            PathStep::Key("Waves".to_string()),
            PathStep::Slot(0),
            PathStep::Key("x".to_string()),
        ];
        assert_eq!(lookup(&as_array, &steps), Some(&json!(1)));
        assert_eq!(lookup(&as_object, &steps), Some(&json!(1)));
    }

    #[test]
    fn code_without_samples_falls_through_to_the_next() {
        let path = SensorPath::new("EMA", "Temperature", &["DRYT", "DEWT"]);
        let dew = json!({"values": {"0": {"date": "t0", "value": "17.2"}}});
        for dry in [json!({}), JsonValue::Null, json!({"values": "n/a"})] {
            let payload = json!({"data": {"EMA": [{"Temperature": {"DRYT": dry, "DEWT": dew.clone()}}]}});
            let samples = extract_samples(&payload, &path).expect("falls back to DEWT");
            assert_eq!(samples.len(), 1);
            assert_eq!(samples[0].value, "17.2");
        }

        let steps = [
            PathStep::FirstOf(vec!["DRYT".to_string(), "DEWT".to_string()]),
            PathStep::Key("values".to_string()),
        ];
        let node = json!({"DRYT": {}, "DEWT": {"values": 1}});
        assert_eq!(lookup(&node, &steps), Some(&json!(1)));
    }

    #[test]
    fn first_of_prefers_earlier_codes() {
        let payload = json!({"Temperature": {"DEWT": "dew", "DRYT": "dry"}});
        let steps = [
            PathStep::Key("Temperature".to_string()),
            PathStep::FirstOf(vec!["DRYT".to_string(), "DEWT".to_string()]),
        ];
        assert_eq!(lookup(&payload, &steps), Some(&json!("dry")));

        let payload = json!({"Temperature": {"DEWT": "dew"}});
        assert_eq!(lookup(&payload, &steps), Some(&json!("dew")));
    }

    #[test]
    fn missing_link_yields_none() {
        let path = SensorPath::new("Waves", "Wave Height", &["VAVH"]);
        assert!(extract_samples(&json!({"data": {}}), &path).is_none());
        assert!(extract_samples(&json!({}), &path).is_none());
        assert!(extract_samples(&json!({"data": {"Waves": []}}), &path).is_none());
        assert!(extract_samples(&json!({"data": {"Waves": [{"Wave Height": {"VAVH": null}}]}}), &path).is_none());
    }

    #[test]
    fn extracts_three_samples_in_key_order() {
        let path = SensorPath::new("Waves", "Wave Height", &["VAVH"]);
        let samples = extract_samples(&wave_payload(), &path).expect("samples");
        let values: Vec<&str> = samples.iter().map(|s| s.value.as_str()).collect();
        assert_eq!(values, vec!["150", "160", "170"]);
        assert_eq!(samples[0].unit.as_deref(), Some("cm"));
        assert_eq!(samples[2].date, "2025-01-05 11:00:00");
    }

    #[test]
    fn integer_keys_sort_numerically_before_named_keys() {
        let values = json!({
            "10": {"date": "d10", "value": "10"},
            "extra": {"date": "dx", "value": "99"},
            "2": {"date": "d2", "value": "2"},
            "01": {"date": "d01", "value": "1"},
            "0": {"date": "d0", "value": "0"}
        });
        let samples = ordered_samples(values.as_object().unwrap());
        let keys: Vec<&str> = samples.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, vec!["0", "2", "10", "extra", "01"]);
    }

    #[test]
    fn numeric_values_are_stringified_and_malformed_entries_skipped() {
        let values = json!({
            "0": {"date": "d0", "value": 12.5},
            "1": {"value": "3"},
            "2": {"date": "d2", "value": null},
            "3": "garbage"
        });
        let samples = ordered_samples(values.as_object().unwrap());
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].value, "12.5");
    }
}
