use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

use caseflow::{CaseResponse, RequestSpec, Transport, TransportError};

/// Transport stub that replays canned responses in order and records every
/// dispatched request for inspection.
pub struct ScriptedTransport {
    responses: Mutex<Vec<Result<CaseResponse, TransportError>>>,
    requests: Mutex<Vec<RequestSpec>>,
}

impl ScriptedTransport {
    pub fn new(responses: Vec<Result<CaseResponse, TransportError>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<RequestSpec> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn dispatch(&self, request: &RequestSpec) -> Result<CaseResponse, TransportError> {
        self.requests.lock().push(request.clone());
        let mut responses = self.responses.lock();
        if responses.is_empty() {
            return Err(TransportError::ConnectionFailed(
                "scripted transport exhausted".to_string(),
            ));
        }
        responses.remove(0)
    }
}

/// 200 response with a JSON body.
pub fn json_response(body: &str) -> Result<CaseResponse, TransportError> {
    Ok(CaseResponse::new(200, HashMap::new(), body.to_string()))
}

/// Response with an arbitrary status code and body.
pub fn status_response(status: u16, body: &str) -> Result<CaseResponse, TransportError> {
    Ok(CaseResponse::new(status, HashMap::new(), body.to_string()))
}
