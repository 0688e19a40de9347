#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use muxllm::LLMError;
use muxllm::http::{HttpRequest, HttpResponse, HttpTransport};
use serde_json::Value;

/// Replays canned responses in order and records every request.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<HttpResponse>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_json(&self, status: u16, body: Value) {
        self.push(status, HashMap::new(), body.to_string());
    }

    pub fn push(&self, status: u16, headers: HashMap<String, String>, body: String) {
        self.responses.lock().unwrap().push_back(HttpResponse {
            status,
            headers,
            body: body.into_bytes(),
        });
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn body(&self, index: usize) -> Value {
        self.requests.lock().unwrap()[index]
            .json_body()
            .expect("request body is JSON")
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, LLMError> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| LLMError::transport("no scripted response left"))
    }
}
