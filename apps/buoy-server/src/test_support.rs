use crate::config::BuoyConfig;
use crate::state::AppState;
use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::Router;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub const TEST_TOKEN: &str = "stub-token-0001";

pub fn test_config(base_url: &str, overrides: &[(&str, &str)]) -> BuoyConfig {
    let mut vars: HashMap<String, String> = HashMap::from([
        ("BUOY_VENDOR_BASE_URL".to_string(), base_url.to_string()),
        ("BUOY_VENDOR_TOKEN".to_string(), TEST_TOKEN.to_string()),
        ("BUOY_VENDOR_TIMEOUT_SECONDS".to_string(), "2".to_string()),
        ("BUOY_STATUS_TIMEOUT_SECONDS".to_string(), "2".to_string()),
    ]);
    for (key, value) in overrides {
        vars.insert(key.to_string(), value.to_string());
    }
    BuoyConfig::from_lookup(|key| vars.get(key).cloned()).expect("test config")
}

pub fn test_state(config: BuoyConfig) -> AppState {
    AppState::new(config, reqwest::Client::new())
}

#[derive(Default)]
struct StubTable {
    /// (path fragment, status, body); first match wins.
    routes: Vec<(String, StatusCode, String)>,
    requests: Vec<String>,
}

/// In-process stand-in for the telemetry vendor. Answers every request by
/// matching a fragment of the (percent-encoded) request path.
#[derive(Clone)]
pub struct StubVendor {
    pub base_url: String,
    table: Arc<Mutex<StubTable>>,
}

impl StubVendor {
    /// Returns `None` when the sandbox refuses to bind a loopback socket.
    pub async fn start() -> Option<Self> {
        let listener = match tokio::net::TcpListener::bind("127.0.0.1:0").await {
            Ok(listener) => listener,
            Err(err) if err.kind() == std::io::ErrorKind::PermissionDenied => return None,
            Err(err) => panic!("stub vendor bind failed: {err}"),
        };
        let addr = listener.local_addr().expect("stub addr");
        let table = Arc::new(Mutex::new(StubTable::default()));
        let app = Router::new()
            .fallback(respond)
            .with_state(table.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Some(Self {
            base_url: format!("http://{addr}/api/device"),
            table,
        })
    }

    pub fn route(&self, fragment: &str, status: StatusCode, body: impl Into<String>) {
        let mut table = self.table.lock().expect("stub table");
        table.routes.retain(|(existing, _, _)| existing != fragment);
        table
            .routes
            .push((fragment.to_string(), status, body.into()));
    }

    pub fn json(&self, fragment: &str, body: serde_json::Value) {
        self.route(fragment, StatusCode::OK, body.to_string());
    }

    /// Number of requests whose path contained `fragment`.
    pub fn hits(&self, fragment: &str) -> usize {
        let table = self.table.lock().expect("stub table");
        table
            .requests
            .iter()
            .filter(|uri| uri.contains(fragment))
            .count()
    }

    pub fn requests(&self) -> Vec<String> {
        self.table.lock().expect("stub table").requests.clone()
    }
}

async fn respond(State(table): State<Arc<Mutex<StubTable>>>, uri: Uri) -> (StatusCode, String) {
    let mut table = table.lock().expect("stub table");
    table.requests.push(uri.to_string());
    let path = uri.path();
    table
        .routes
        .iter()
        .find(|(fragment, _, _)| path.contains(fragment.as_str()))
        .map(|(_, status, body)| (*status, body.clone()))
        .unwrap_or((StatusCode::NOT_FOUND, String::new()))
}

/// Vendor series payload with one code and ordered `(date, value)` samples.
pub fn series_payload(category: &str, sensor: &str, code: &str, samples: &[(&str, &str)]) -> serde_json::Value {
    let values: serde_json::Map<String, serde_json::Value> = samples
        .iter()
        .enumerate()
        .map(|(idx, (date, value))| {
            (
                idx.to_string(),
                serde_json::json!({"date": date, "value": value, "unit": ""}),
            )
        })
        .collect();
    serde_json::json!({
        "data": {
            category: [{
                sensor: {
                    code: {"values": values}
                }
            }]
        }
    })
}
