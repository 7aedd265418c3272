use async_trait::async_trait;
use reqwest::{multipart, Client, Method};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

use crate::config::RunnerConfig;
use crate::error::TransportError;
use crate::response::CaseResponse;
use crate::substitution::value_text;

/// Resolved request descriptor, the deserialized form of a case's
/// substituted `request` mapping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestSpec {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub params: HashMap<String, Value>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub json: Option<Value>,
    #[serde(default)]
    pub data: Option<Value>,
    /// Multipart uploads: form field name -> file path.
    #[serde(default)]
    pub files: Option<HashMap<String, String>>,
}

/// Dispatches resolved requests and produces response snapshots.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn dispatch(&self, request: &RequestSpec)
        -> std::result::Result<CaseResponse, TransportError>;
}

/// HTTP transport over a shared reqwest session.
///
/// Run-wide default query parameters are merged into every request, with the
/// defaults winning on key collision.
pub struct HttpTransport {
    client: Client,
    base_url: String,
    default_params: HashMap<String, String>,
}

impl HttpTransport {
    pub fn new(config: &RunnerConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.base_url.clone(),
            default_params: config.global_params.clone(),
        }
    }

    /// Relative urls are joined onto the configured base url.
    fn resolve_url(&self, url: &str) -> String {
        if url.starts_with('/') && !self.base_url.is_empty() {
            format!("{}{}", self.base_url.trim_end_matches('/'), url)
        } else {
            url.to_string()
        }
    }

    /// Request params merged with the run-wide defaults.
    fn merged_params(&self, request: &RequestSpec) -> Vec<(String, String)> {
        let mut merged: HashMap<String, String> = request
            .params
            .iter()
            .map(|(k, v)| (k.clone(), value_text(v)))
            .collect();
        for (k, v) in &self.default_params {
            merged.insert(k.clone(), v.clone());
        }
        let mut pairs: Vec<(String, String)> = merged.into_iter().collect();
        pairs.sort();
        pairs
    }

    /// Build a multipart form from the `files` mapping plus any `data`
    /// fields. A file that cannot be read fails the whole form; the caller
    /// then sends the request without attachments.
    fn build_multipart(
        files: &HashMap<String, String>,
        data: &Option<Value>,
    ) -> std::io::Result<multipart::Form> {
        let mut form = multipart::Form::new();
        if let Some(Value::Object(fields)) = data {
            for (k, v) in fields {
                form = form.text(k.clone(), value_text(v));
            }
        }
        for (field, path) in files {
            let bytes = std::fs::read(path)?;
            let file_name = Path::new(path)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.clone());
            form = form.part(field.clone(), multipart::Part::bytes(bytes).file_name(file_name));
        }
        Ok(form)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn dispatch(
        &self,
        request: &RequestSpec,
    ) -> std::result::Result<CaseResponse, TransportError> {
        let method = Method::from_bytes(request.method.to_uppercase().as_bytes())
            .map_err(|_| TransportError::InvalidRequest(format!("bad method '{}'", request.method)))?;
        let url = self.resolve_url(&request.url);

        let params = self.merged_params(request);
        log::info!("request {} {} params {:?}", method, url, params);

        let mut builder = self.client.request(method, &url).query(&params);
        for (k, v) in &request.headers {
            builder = builder.header(k, v);
        }

        if let Some(files) = &request.files {
            match Self::build_multipart(files, &request.data) {
                Ok(form) => {
                    builder = builder.multipart(form);
                }
                Err(e) => {
                    // bad file path: log and send without attachments
                    log::error!("file attachment failed: {}", e);
                }
            }
        } else if let Some(json) = &request.json {
            log::info!("request json {}", json);
            builder = builder.json(json);
        } else if let Some(Value::Object(fields)) = &request.data {
            let form: HashMap<String, String> = fields
                .iter()
                .map(|(k, v)| (k.clone(), value_text(v)))
                .collect();
            log::info!("request form {:?}", form);
            builder = builder.form(&form);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        let snapshot = CaseResponse::from_reqwest(response).await;
        log::info!("response status {}", snapshot.status_code);
        log::debug!("response body {}", snapshot.text);
        Ok(snapshot)
    }
}
