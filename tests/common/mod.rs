//! Shared fixtures for the integration tests
//!
//! `FixtureTransport` serves `fixtures/metadata.json` and records every
//! request, so tests can assert on cache behaviour by counting round trips.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use form_compiler::{
    FormCompiler, InMemoryFormStorage, Master, MetadataCache, MetadataError, MetadataService,
    MetadataTransport,
};

pub struct FixtureTransport {
    metadata: Value,
    delay: Option<Duration>,
    requests: Mutex<Vec<String>>,
}

impl FixtureTransport {
    pub fn new() -> Self {
        Self {
            metadata: serde_json::from_str(include_str!("../fixtures/metadata.json")).unwrap(),
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every response is held back by `delay`, keeping fetches in flight
    pub fn with_delay(delay: Duration) -> Self {
        Self { delay: Some(delay), ..Self::new() }
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }

    /// Requests equal to `request`, e.g. `class:MY.document`
    pub fn count(&self, request: &str) -> usize {
        self.requests.lock().iter().filter(|r| *r == request).count()
    }

    async fn respond(&self, request: String, body: Value) -> Result<Value, MetadataError> {
        self.requests.lock().push(request);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(body)
    }
}

#[async_trait]
impl MetadataTransport for FixtureTransport {
    async fn class_properties(
        &self,
        class_name: &str,
        _lang: &str,
    ) -> Result<Value, MetadataError> {
        let body = self.metadata["classes"].get(class_name).cloned().unwrap_or(json!({}));
        self.respond(format!("class:{}", class_name), body).await
    }

    async fn range(&self, range_id: &str, _lang: &str) -> Result<Value, MetadataError> {
        let body = self.metadata["ranges"].get(range_id).cloned().unwrap_or(json!([]));
        self.respond(format!("range:{}", range_id), body).await
    }

    async fn all_ranges(&self, _lang: &str) -> Result<Value, MetadataError> {
        let body = self.metadata["ranges"].clone();
        self.respond("ranges".to_string(), body).await
    }
}

/// Everything a compile test touches, wired together
pub struct Harness {
    pub transport: Arc<FixtureTransport>,
    pub cache: MetadataCache,
    pub storage: Arc<InMemoryFormStorage>,
    pub compiler: FormCompiler,
}

impl Harness {
    pub fn new(forms: Vec<Master>) -> Self {
        Self::with_transport(FixtureTransport::new(), forms)
    }

    pub fn with_transport(transport: FixtureTransport, forms: Vec<Master>) -> Self {
        let transport = Arc::new(transport);
        let cache = MetadataCache::new();
        let metadata = Arc::new(MetadataService::new(transport.clone(), &cache, "MY."));
        let storage = Arc::new(InMemoryFormStorage::with_forms(forms).unwrap());
        let compiler = FormCompiler::new(storage.clone(), metadata);
        Self { transport, cache, storage, compiler }
    }
}

pub fn master(value: Value) -> Master {
    Master::from_json(value).unwrap()
}

pub fn trip_report() -> Master {
    master(serde_json::from_str(include_str!("../fixtures/trip_report.json")).unwrap())
}

pub fn trip_report_compiled_fi() -> Value {
    serde_json::from_str(include_str!("../fixtures/trip_report.compiled.fi.json")).unwrap()
}
