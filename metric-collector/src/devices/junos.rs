//! Juniper devices over the Junos REST API.
//!
//! CLI commands are sent as `<command format="json">` RPCs to `/rpc` and
//! the JSON reply goes through [`json_points`](super::json_points).

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::json_points::reply_to_points;
use super::{DeviceDriver, DeviceError, DeviceTarget, DriverSettings};
use crate::inventory::Credential;
use crate::models::MetricPoint;

const REST_PORT: u16 = 3000;
const FACTS_RPC: &str = "get-software-information";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct JunosFacts {
    pub hostname: Option<String>,
    pub model: Option<String>,
    pub version: Option<String>,
}

pub struct JunosDriver {
    host_id: String,
    base_url: String,
    credential: Credential,
    client: Client,
    settings: DriverSettings,
    connected: bool,
    /// Software information fetched while connecting, reused for the facts.
    software_info: Option<Value>,
    facts: Option<JunosFacts>,
}

impl JunosDriver {
    pub fn new(target: &DeviceTarget, settings: &DriverSettings) -> Result<Self, DeviceError> {
        let credential = target.require_credential()?.clone();
        let client = Client::builder().timeout(settings.timeout).build()?;
        Ok(Self {
            host_id: target.host_id.clone(),
            base_url: target.base_url("http", Some(REST_PORT)),
            credential,
            client,
            settings: settings.clone(),
            connected: false,
            software_info: None,
            facts: None,
        })
    }

    pub fn facts(&self) -> Option<&JunosFacts> {
        self.facts.as_ref()
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .basic_auth(&self.credential.username, Some(&self.credential.password))
            .header(ACCEPT, "application/json")
    }

    async fn send(&self, request: RequestBuilder, url: &str) -> Result<Value, DeviceError> {
        let response = self.authed(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DeviceError::Status { status: status.as_u16(), url: url.to_string() });
        }
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn rpc(&self, name: &str) -> Result<Value, DeviceError> {
        let url = format!("{}/rpc/{name}", self.base_url);
        self.send(self.client.get(&url), &url).await
    }
}

#[async_trait]
impl DeviceDriver for JunosDriver {
    async fn connect(&mut self) -> Result<(), DeviceError> {
        let attempts = self.settings.connect_attempts.max(1);
        let mut last_error = DeviceError::NotConnected;
        for attempt in 1..=attempts {
            match self.rpc(FACTS_RPC).await {
                Ok(reply) => {
                    self.connected = true;
                    self.software_info = Some(reply);
                    debug!("[{}] connected to {} (attempt {})", self.host_id, self.base_url, attempt);
                    return Ok(());
                }
                Err(e) => {
                    warn!("[{}] connection attempt {}/{} failed: {}", self.host_id, attempt, attempts, e);
                    last_error = e;
                }
            }
            if attempt < attempts {
                tokio::time::sleep(self.settings.retry_delay).await;
            }
        }
        self.connected = false;
        Err(last_error)
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn collect_facts(&mut self) -> Result<(), DeviceError> {
        if !self.connected {
            return Err(DeviceError::NotConnected);
        }
        let reply = match self.software_info.take() {
            Some(reply) => reply,
            None => self.rpc(FACTS_RPC).await?,
        };
        let info = &reply["software-information"][0];
        let text = |key: &str| info[key][0]["data"].as_str().map(str::to_string);
        let facts = JunosFacts {
            hostname: text("host-name"),
            model: text("product-model"),
            version: text("junos-version"),
        };
        info!(
            "[{}] facts: hostname={:?} model={:?} version={:?}",
            self.host_id, facts.hostname, facts.model, facts.version
        );
        self.facts = Some(facts);
        Ok(())
    }

    async fn collect(&mut self, command: &str) -> Result<Vec<MetricPoint>, DeviceError> {
        if !self.connected {
            return Err(DeviceError::NotConnected);
        }
        let url = format!("{}/rpc?stop-on-error=1", self.base_url);
        let body = format!("<command format=\"json\">{}</command>", xml_escape(command));
        let request = self.client.post(&url).header(CONTENT_TYPE, "application/xml").body(body);
        let reply = self.send(request, &url).await?;
        Ok(reply_to_points(&self.host_id, command, &reply)?)
    }
}

fn xml_escape(raw: &str) -> String {
    raw.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::TagList;
    use crate::test_support::serve;
    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn authorized(headers: &HeaderMap) -> bool {
        headers.get("authorization").is_some()
    }

    fn fake_junos() -> Router {
        Router::new()
            .route(
                "/rpc/get-software-information",
                get(|headers: HeaderMap| async move {
                    if !authorized(&headers) {
                        return Err(StatusCode::UNAUTHORIZED);
                    }
                    Ok(Json(json!({
                        "software-information": [{
                            "host-name": [{"data": "mx-lab-1"}],
                            "product-model": [{"data": "mx960"}],
                            "junos-version": [{"data": "21.4R3"}]
                        }]
                    })))
                }),
            )
            .route(
                "/rpc",
                post(|body: String| async move {
                    if body.contains("show route summary") {
                        Ok(Json(json!({"route-summary-information": [{"route-table": [{"total-route-count": [{"data": "812"}]}]}]})))
                    } else {
                        Err(StatusCode::BAD_REQUEST)
                    }
                }),
            )
    }

    fn target(address: String) -> DeviceTarget {
        DeviceTarget {
            host_id: "mx1".into(),
            address,
            device_type: "juniper".into(),
            credential: Some(Credential {
                username: "netops".into(),
                password: "pw".into(),
                tags: TagList::default(),
            }),
        }
    }

    fn settings() -> DriverSettings {
        DriverSettings {
            timeout: Duration::from_secs(5),
            connect_attempts: 2,
            retry_delay: Duration::from_millis(10),
        }
    }

    #[tokio::test]
    async fn test_connect_facts_and_collect() {
        let base = serve(fake_junos()).await;
        let mut driver = JunosDriver::new(&target(base), &settings()).unwrap();

        driver.connect().await.unwrap();
        assert!(driver.is_connected());

        driver.collect_facts().await.unwrap();
        let facts = driver.facts().unwrap();
        assert_eq!(facts.hostname.as_deref(), Some("mx-lab-1"));
        assert_eq!(facts.version.as_deref(), Some("21.4R3"));

        let points = driver.collect("show route summary").await.unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].measurement(), "show_route_summary");
        assert_eq!(points[0].tag("device"), Some("mx1"));
    }

    #[tokio::test]
    async fn test_facts_reuse_the_connect_reply() {
        let hits = Arc::new(AtomicUsize::new(0));
        let router = Router::new()
            .route(
                "/rpc/get-software-information",
                get(|State(hits): State<Arc<AtomicUsize>>| async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    Json(json!({"software-information": [{"host-name": [{"data": "mx-lab-2"}]}]}))
                }),
            )
            .with_state(hits.clone());
        let mut driver = JunosDriver::new(&target(serve(router).await), &settings()).unwrap();

        driver.connect().await.unwrap();
        driver.collect_facts().await.unwrap();
        assert_eq!(driver.facts().unwrap().hostname.as_deref(), Some("mx-lab-2"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        // a second facts read goes back to the device
        driver.collect_facts().await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_rejected_command_is_an_error() {
        let base = serve(fake_junos()).await;
        let mut driver = JunosDriver::new(&target(base), &settings()).unwrap();
        driver.connect().await.unwrap();

        let err = driver.collect("show bogus").await.unwrap_err();
        assert!(matches!(err, DeviceError::Status { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_unreachable_device_stays_disconnected() {
        let mut driver = JunosDriver::new(&target("http://127.0.0.1:9".into()), &settings()).unwrap();
        assert!(driver.connect().await.is_err());
        assert!(!driver.is_connected());
        assert!(matches!(driver.collect("show version").await, Err(DeviceError::NotConnected)));
    }

    #[test]
    fn test_xml_escape() {
        assert_eq!(xml_escape("show route | match <x> & y"), "show route | match &lt;x&gt; &amp; y");
    }
}
