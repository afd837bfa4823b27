use std::time::Instant;

use actionlens_contracts::catalog::SampleImage;
use actionlens_contracts::predictions::{
    ActionsResponse, ErrorBody, HealthStatus, PredictResponse, PredictionList, TopPrediction,
};
use actionlens_contracts::upload::UploadFile;
use anyhow::{bail, Context, Result};
use reqwest::blocking::multipart::{Form as MultipartForm, Part as MultipartPart};
use reqwest::blocking::Client as HttpClient;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::PredictError;

/// Multipart field the service reads the image from.
pub const UPLOAD_FIELD: &str = "file";

/// Anything that can turn an upload into ranked predictions. One call is
/// one request; implementations never retry.
pub trait Predictor: Send + Sync {
    fn endpoint(&self) -> &str;
    fn predict(&self, file: &UploadFile) -> Result<PredictResponse, PredictError>;
}

/// Blocking HTTP client for the prediction service.
#[derive(Debug, Clone)]
pub struct HttpPredictionClient {
    config: ClientConfig,
    http: HttpClient,
}

impl HttpPredictionClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(config.timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn health(&self) -> Result<HealthStatus> {
        let url = self.config.health_url();
        self.get_json(&url)
    }

    /// Action identifiers the service itself reports, in model output order.
    pub fn remote_actions(&self) -> Result<Vec<String>> {
        let url = self.config.actions_url();
        let payload: ActionsResponse = self.get_json(&url)?;
        Ok(payload.actions)
    }

    /// Downloads one of the bundled sample images as a JPEG upload.
    pub fn fetch_sample(&self, sample: &SampleImage) -> Result<UploadFile> {
        let response = self
            .http
            .get(sample.url)
            .send()
            .with_context(|| format!("sample download failed ({})", sample.url))?;
        if !response.status().is_success() {
            bail!(
                "sample download failed ({}): {}",
                response.status().as_u16(),
                sample.url
            );
        }
        let bytes = response
            .bytes()
            .context("failed reading sample image bytes")?
            .to_vec();
        Ok(UploadFile::new(sample.file_name(), "image/jpeg", bytes))
    }

    fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .http
            .get(url)
            .send()
            .with_context(|| format!("request failed ({url})"))?;
        let status_code = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.bytes().map(|bytes| bytes.to_vec()).unwrap_or_default();
            bail!("{}", service_error(status_code, &body));
        }
        response
            .json::<T>()
            .with_context(|| format!("failed parsing JSON response ({url})"))
    }

    fn multipart_form(file: &UploadFile) -> MultipartForm {
        let part = MultipartPart::bytes(file.bytes.clone()).file_name(file.name.clone());
        let part = match part.mime_str(&file.media_type) {
            Ok(part) => part,
            Err(_) => MultipartPart::bytes(file.bytes.clone()).file_name(file.name.clone()),
        };
        MultipartForm::new().part(UPLOAD_FIELD, part)
    }
}

impl Predictor for HttpPredictionClient {
    fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    fn predict(&self, file: &UploadFile) -> Result<PredictResponse, PredictError> {
        let url = self.config.predict_url();
        let started = Instant::now();
        debug!(%url, file = %file.name, size = file.size(), "sending prediction request");

        let response = self
            .http
            .post(&url)
            .multipart(Self::multipart_form(file))
            .send()
            .map_err(|err| {
                warn!(%url, error = %err, "prediction service unreachable");
                PredictError::Connectivity {
                    endpoint: self.config.endpoint.clone(),
                    reason: error_chain_text(&err),
                }
            })?;

        let status = response.status();
        let body = response.bytes().map(|bytes| bytes.to_vec());
        debug!(
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "prediction response received"
        );

        if !status.is_success() {
            return Err(service_error(status.as_u16(), &body.unwrap_or_default()));
        }
        let body = body.map_err(|err| {
            PredictError::MalformedResponse(format!("failed reading response body: {err}"))
        })?;
        parse_success_body(&body)
    }
}

/// Builds the error for a non-success status from whatever body came back.
pub fn service_error(status: u16, body: &[u8]) -> PredictError {
    let detail = serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .and_then(|parsed| parsed.detail_message())
        .unwrap_or_else(|| format!("API Error: {status}"));
    PredictError::Service { status, detail }
}

/// Checks a 2xx body against the prediction contract.
pub fn parse_success_body(body: &[u8]) -> Result<PredictResponse, PredictError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|err| PredictError::MalformedResponse(format!("body is not JSON: {err}")))?;
    let Some(obj) = value.as_object() else {
        return Err(PredictError::MalformedResponse(
            "body is not a JSON object".to_string(),
        ));
    };

    let success = obj
        .get("success")
        .and_then(Value::as_bool)
        .ok_or_else(|| {
            PredictError::MalformedResponse("missing boolean 'success' flag".to_string())
        })?;
    if !success {
        return Err(PredictError::PredictionFailed);
    }

    let raw_predictions = obj
        .get("predictions")
        .cloned()
        .ok_or_else(|| PredictError::MalformedResponse("missing 'predictions'".to_string()))?;
    let predictions: PredictionList = serde_json::from_value(raw_predictions)
        .map_err(|err| PredictError::MalformedResponse(format!("invalid predictions: {err}")))?;

    Ok(PredictResponse {
        success,
        predictions,
        filename: obj
            .get("filename")
            .and_then(Value::as_str)
            .map(str::to_string),
        top_prediction: obj
            .get("top_prediction")
            .cloned()
            .and_then(|value| serde_json::from_value::<TopPrediction>(value).ok()),
    })
}

fn error_chain_text(err: &(dyn std::error::Error + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !text.trim().is_empty() && !parts.contains(&text) {
            parts.push(text);
        }
        source = cause.source();
    }
    parts.join(": ")
}
