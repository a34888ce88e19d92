//! Telemetry API capability and the WeHeat REST implementation.
//!
//! HTTP statuses are returned as data in [`ApiResponse`]; only transport and
//! decoding failures surface as `Err`.

use crate::error::Result;
use crate::sample::RemoteSample;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    Unauthorized,
    RateLimited,
    ServerError,
    Unexpected,
}

impl StatusClass {
    pub fn of(status: u16) -> Self {
        match status {
            200 => StatusClass::Success,
            401 => StatusClass::Unauthorized,
            429 => StatusClass::RateLimited,
            500..=599 => StatusClass::ServerError,
            _ => StatusClass::Unexpected,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse<T> {
    pub status: u16,
    /// Present only for status 200.
    pub payload: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(payload: T) -> Self {
        Self {
            status: 200,
            payload: Some(payload),
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            payload: None,
        }
    }

    pub fn class(&self) -> StatusClass {
        StatusClass::of(self.status)
    }
}

/// One heat pump as listed for the authenticated user.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    pub id: String,
    #[serde(default)]
    pub boiler_type: Option<i64>,
    #[serde(default)]
    pub model: Option<i64>,
}

#[async_trait]
pub trait TelemetryApi: Send + Sync {
    async fn list_devices(&self, access_token: &str) -> Result<ApiResponse<Vec<DeviceRecord>>>;
    async fn latest_sample(
        &self,
        access_token: &str,
        device_id: &str,
    ) -> Result<ApiResponse<RemoteSample>>;
}

pub struct WeheatClient {
    http: reqwest::Client,
    base_url: String,
}

impl WeheatClient {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn get_json(&self, access_token: &str, path: &str) -> Result<ApiResponse<Value>> {
        let url = format!("{}{}", self.base_url, path);
        let res = self.http.get(&url).bearer_auth(access_token).send().await?;
        let status = res.status().as_u16();
        debug!(url = %url, status, "telemetry API response");
        if StatusClass::of(status) != StatusClass::Success {
            return Ok(ApiResponse::status(status));
        }
        let body: Value = res.json().await?;
        Ok(ApiResponse::ok(body))
    }
}

#[async_trait]
impl TelemetryApi for WeheatClient {
    async fn list_devices(&self, access_token: &str) -> Result<ApiResponse<Vec<DeviceRecord>>> {
        let res = self.get_json(access_token, "/api/v1/heat-pumps").await?;
        match res.payload {
            Some(body) => Ok(ApiResponse::ok(serde_json::from_value(body)?)),
            None => Ok(ApiResponse::status(res.status)),
        }
    }

    async fn latest_sample(
        &self,
        access_token: &str,
        device_id: &str,
    ) -> Result<ApiResponse<RemoteSample>> {
        let path = format!("/api/v1/heat-pumps/{}/logs/latest", device_id);
        let res = self.get_json(access_token, &path).await?;
        match res.payload {
            Some(body) => Ok(ApiResponse::ok(RemoteSample::from_json(&body)?)),
            None => Ok(ApiResponse::status(res.status)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_class() {
        assert_eq!(StatusClass::of(200), StatusClass::Success);
        assert_eq!(StatusClass::of(401), StatusClass::Unauthorized);
        assert_eq!(StatusClass::of(429), StatusClass::RateLimited);
        assert_eq!(StatusClass::of(500), StatusClass::ServerError);
        assert_eq!(StatusClass::of(503), StatusClass::ServerError);
        assert_eq!(StatusClass::of(204), StatusClass::Unexpected);
        assert_eq!(StatusClass::of(404), StatusClass::Unexpected);
    }

    #[test]
    fn test_device_record_decoding() {
        let devices: Vec<DeviceRecord> = serde_json::from_value(json!([
            {"id": "3fa85f64", "boilerType": 2, "model": 0, "name": "Blackbird"},
            {"id": "5b1c"}
        ]))
        .unwrap();

        assert_eq!(devices[0].boiler_type, Some(2));
        assert_eq!(devices[0].model, Some(0));
        assert_eq!(devices[1].boiler_type, None);
        assert_eq!(devices[1].model, None);
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let c = WeheatClient::new(reqwest::Client::new(), "https://api.weheat.nl/");
        assert_eq!(c.base_url, "https://api.weheat.nl");
    }
}
