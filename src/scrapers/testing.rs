//! Canned [`Fetch`] implementation for tests.

use crate::error::{IngestError, Result};
use crate::fetch::Fetch;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};

/// Serves registered bodies by URL. Registering several texts for one URL
/// serves them in order, repeating the last one. Unknown URLs answer 404.
#[derive(Debug, Default)]
pub struct StubFetcher {
    texts: RefCell<HashMap<String, VecDeque<String>>>,
    bytes: HashMap<String, Vec<u8>>,
    json: HashMap<String, Value>,
    posted: RefCell<Vec<(String, Value)>>,
    requested: RefCell<Vec<String>>,
}

impl StubFetcher {
    pub fn with_text(self, url: &str, body: &str) -> Self {
        self.texts
            .borrow_mut()
            .entry(url.to_string())
            .or_default()
            .push_back(body.to_string());
        self
    }

    pub fn with_bytes(mut self, url: &str, body: &[u8]) -> Self {
        self.bytes.insert(url.to_string(), body.to_vec());
        self
    }

    pub fn with_json(mut self, url: &str, body: Value) -> Self {
        self.json.insert(url.to_string(), body);
        self
    }

    pub fn posted(&self) -> Vec<(String, Value)> {
        self.posted.borrow().clone()
    }

    /// URLs requested with GET, in order.
    pub fn requested(&self) -> Vec<String> {
        self.requested.borrow().clone()
    }

    fn not_found(url: &str) -> IngestError {
        IngestError::Status {
            url: url.to_string(),
            status: 404,
        }
    }
}

impl Fetch for StubFetcher {
    async fn get_text(&self, url: &str) -> Result<String> {
        self.requested.borrow_mut().push(url.to_string());
        let mut texts = self.texts.borrow_mut();
        let queue = texts.get_mut(url).ok_or_else(|| Self::not_found(url))?;
        let body = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        body.ok_or_else(|| Self::not_found(url))
    }

    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        if let Some(body) = self.bytes.get(url) {
            self.requested.borrow_mut().push(url.to_string());
            return Ok(body.clone());
        }
        self.get_text(url).await.map(String::into_bytes)
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<Value> {
        self.posted.borrow_mut().push((url.to_string(), body.clone()));
        self.json.get(url).cloned().ok_or_else(|| Self::not_found(url))
    }
}
