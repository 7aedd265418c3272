use serde_json::{Map, Value};
use std::collections::HashMap;

/// Response snapshot handed to the extraction engine and assertion evaluator.
///
/// Instead of reflective attribute access, the recognized fields are a fixed
/// set exposed through `get_field`.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseResponse {
    pub status_code: u16,
    pub headers: HashMap<String, String>,
    pub text: String,
    /// Eagerly decoded body, populated by `decode_json`. `None` when the body
    /// is not valid JSON.
    pub json: Option<Value>,
}

impl CaseResponse {
    pub fn new(status_code: u16, headers: HashMap<String, String>, text: String) -> Self {
        Self {
            status_code,
            headers,
            text,
            json: None,
        }
    }

    /// Build from a reqwest response, consuming its body.
    pub async fn from_reqwest(response: reqwest::Response) -> Self {
        let status_code = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| {
                (
                    k.as_str().to_string(),
                    v.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect();
        let text = response.text().await.unwrap_or_default();
        Self::new(status_code, headers, text)
    }

    /// One-shot JSON decode of the body text. Failure leaves `json` as `None`
    /// and reports the parse error; the response itself stays usable.
    pub fn decode_json(&mut self) -> Result<(), String> {
        match serde_json::from_str::<Value>(&self.text) {
            Ok(value) => {
                self.json = Some(value);
                Ok(())
            }
            Err(e) => {
                self.json = None;
                Err(e.to_string())
            }
        }
    }

    /// Returns a copy with the body decoded when possible. Decode failure is
    /// not fatal here; callers that require JSON check `json` themselves.
    pub fn decoded(&self) -> Self {
        let mut copy = self.clone();
        if copy.json.is_none() {
            if let Err(e) = copy.decode_json() {
                log::debug!("response body is not JSON: {}", e);
            }
        }
        copy
    }

    /// Capability interface over the fixed set of recognized field names.
    pub fn get_field(&self, name: &str) -> Option<Value> {
        match name {
            "status_code" => Some(Value::Number(self.status_code.into())),
            "text" => Some(Value::String(self.text.clone())),
            "json" => self.json.clone(),
            "headers" => {
                let map: Map<String, Value> = self
                    .headers
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect();
                Some(Value::Object(map))
            }
            _ => None,
        }
    }
}
