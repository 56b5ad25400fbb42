//! Clients for the two analytics services that run next to the kitchen
//! displays: the bottle volume estimator and the fruit freshness detector.
//!
//! Both accept a multipart upload with the image under the `image` field and
//! answer with JSON, or with `{"error": "..."}` on failure.

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use super::vision::truncate;
use crate::acquisition::CapturedImage;
use crate::config::PanelConfig;
use crate::error::{PanelError, PanelResult};
use crate::processing::DataUri;

/// Bottle capacity assumed when the caller gives none.
pub const DEFAULT_CAPACITY_ML: f64 = 750.0;

#[derive(Debug, Deserialize)]
struct ErrorField {
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HealthBody {
    #[serde(default)]
    status: String,
}

/// Shared HTTP plumbing for one local service.
#[derive(Debug, Clone)]
struct LocalService {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl LocalService {
    fn new(base_url: &str, timeout: Duration) -> PanelResult<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PanelError::from_reqwest(&base_url, 0, e))?;
        Ok(Self {
            http,
            base_url,
            timeout,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn timeout_ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }

    fn image_part(image: &CapturedImage) -> PanelResult<Part> {
        let bytes = image
            .decode_bytes()
            .map_err(|reason| PanelError::image("multipart encoding", reason))?;
        Part::bytes(bytes)
            .file_name(image.upload_file_name())
            .mime_str(image.mime())
            .map_err(|e| PanelError::image("multipart encoding", e.to_string()))
    }

    async fn post_form<T: DeserializeOwned>(&self, path: &str, form: Form) -> PanelResult<T> {
        let endpoint = self.url(path);
        debug!(%endpoint, "uploading image");
        let response = self
            .http
            .post(&endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| PanelError::from_reqwest(&endpoint, self.timeout_ms(), e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PanelError::from_reqwest(&endpoint, self.timeout_ms(), e))?;

        if let Ok(ErrorField { error: Some(message) }) = serde_json::from_str::<ErrorField>(&body) {
            warn!(%endpoint, status = status.as_u16(), %message, "backend reported an error");
            return Err(PanelError::Backend { endpoint, message });
        }
        if !status.is_success() {
            return Err(PanelError::Status {
                endpoint,
                status: status.as_u16(),
                message: truncate(&body),
            });
        }
        serde_json::from_str(&body).map_err(|e| PanelError::Decode {
            endpoint,
            reason: e.to_string(),
        })
    }

    async fn health(&self, path: &str) -> PanelResult<bool> {
        let endpoint = self.url(path);
        let response = self
            .http
            .get(&endpoint)
            .send()
            .await
            .map_err(|e| PanelError::from_reqwest(&endpoint, self.timeout_ms(), e))?;
        if !response.status().is_success() {
            return Ok(false);
        }
        let body: HealthBody = response
            .json()
            .await
            .map_err(|e| PanelError::from_reqwest(&endpoint, self.timeout_ms(), e))?;
        Ok(body.status == "healthy")
    }
}

/// Liquid level reading for a bottle photo.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeEstimate {
    pub liquid_percentage: f64,
    pub remaining_volume_ml: f64,
    /// Annotated JPEG as a data URI, when the service returned one.
    pub result_image: Option<String>,
}

impl VolumeEstimate {
    /// Raw bytes of the annotated image.
    pub fn result_image_bytes(&self) -> Option<Result<Vec<u8>, String>> {
        self.result_image
            .as_deref()
            .map(|uri| DataUri::parse(uri).map(|parsed| parsed.bytes))
    }
}

#[derive(Debug, Deserialize)]
struct VolumeResponse {
    #[serde(default)]
    success: bool,
    liquid_percentage: Option<f64>,
    remaining_volume_ml: Option<f64>,
    #[serde(default)]
    result_image: Option<String>,
}

/// Bottle volume estimator client.
#[derive(Debug, Clone)]
pub struct VolumeClient {
    service: LocalService,
}

impl VolumeClient {
    pub fn from_config(config: &PanelConfig) -> PanelResult<Self> {
        Ok(Self {
            service: LocalService::new(&config.volume_base_url, config.timeout())?,
        })
    }

    /// Estimate the remaining liquid in a bottle of `capacity_ml`.
    pub async fn estimate(&self, image: &CapturedImage, capacity_ml: f64) -> PanelResult<VolumeEstimate> {
        let form = Form::new()
            .part("image", LocalService::image_part(image)?)
            .text("capacity", capacity_ml.to_string());
        let response: VolumeResponse = self.service.post_form("/api/estimate-volume", form).await?;

        let endpoint = self.service.url("/api/estimate-volume");
        let (Some(liquid_percentage), Some(remaining_volume_ml)) =
            (response.liquid_percentage, response.remaining_volume_ml)
        else {
            return Err(PanelError::Decode {
                endpoint,
                reason: "response is missing the volume fields".to_string(),
            });
        };
        if !response.success {
            debug!(%endpoint, "volume response without success flag");
        }
        info!(liquid_percentage, remaining_volume_ml, "volume estimated");

        Ok(VolumeEstimate {
            liquid_percentage,
            remaining_volume_ml,
            result_image: response
                .result_image
                .filter(|b64| !b64.is_empty())
                .map(|b64| format!("data:image/jpeg;base64,{}", b64)),
        })
    }

    pub async fn health(&self) -> PanelResult<bool> {
        self.service.health("/api/health").await
    }
}

/// Fruit and its freshness state.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FreshnessPrediction {
    pub fruit: String,
    pub freshness: String,
}

/// Fruit freshness detector client.
#[derive(Debug, Clone)]
pub struct FreshnessClient {
    service: LocalService,
}

impl FreshnessClient {
    pub fn from_config(config: &PanelConfig) -> PanelResult<Self> {
        Ok(Self {
            service: LocalService::new(&config.freshness_base_url, config.timeout())?,
        })
    }

    pub async fn predict(&self, image: &CapturedImage) -> PanelResult<FreshnessPrediction> {
        let form = Form::new().part("image", LocalService::image_part(image)?);
        let prediction: FreshnessPrediction = self.service.post_form("/predict", form).await?;
        info!(fruit = %prediction.fruit, freshness = %prediction.freshness, "freshness predicted");
        Ok(prediction)
    }

    pub async fn health(&self) -> PanelResult<bool> {
        self.service.health("/health").await
    }
}
