//! The discovery pipeline: enumerate listening ports, probe them
//! concurrently, fold the outcomes back in, and partition the result.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::enumerate::PortEnumerator;
use crate::probe::WebProbe;
use crate::types::{DiscoveryResult, ServiceRecord};

/// Concurrent probes in flight at once.
pub const DEFAULT_WORKERS: usize = 12;

/// Coordinates one full discovery pass.
pub struct ServiceDiscovery {
    enumerator: PortEnumerator,
    probe: Arc<WebProbe>,
    self_port: u16,
    workers: usize,
}

impl ServiceDiscovery {
    /// `self_port` is the dashboard's own listen port; it never shows
    /// up in results.
    pub fn new(enumerator: PortEnumerator, probe: WebProbe, self_port: u16) -> Self {
        Self {
            enumerator,
            probe: Arc::new(probe),
            self_port,
            workers: DEFAULT_WORKERS,
        }
    }

    /// Override the probe pool size. Zero is clamped to one.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Run one discovery pass. Individual probe failures only ever
    /// classify a record as non-web; they never fail the pass.
    pub async fn run(&self) -> DiscoveryResult {
        let records = self.enumerator.enumerate(self.self_port).await;
        tracing::debug!(count = records.len(), "Enumerated listening ports");
        classify(records, &self.probe, self.workers).await
    }
}

/// Fan the records out to the probe pool and merge outcomes back by
/// port. A probe task that panics is logged and its record stays
/// non-web.
async fn classify(
    records: Vec<ServiceRecord>,
    probe: &Arc<WebProbe>,
    workers: usize,
) -> DiscoveryResult {
    let semaphore = Arc::new(Semaphore::new(workers.max(1)));
    let mut handles = Vec::with_capacity(records.len());

    for record in &records {
        let port = record.port;
        let probe = Arc::clone(probe);
        let semaphore = Arc::clone(&semaphore);
        handles.push(tokio::spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .expect("probe semaphore closed");
            (port, probe.probe(port).await)
        }));
    }

    let mut outcomes = HashMap::with_capacity(handles.len());
    for handle in handles {
        match handle.await {
            Ok((port, outcome)) => {
                outcomes.insert(port, outcome);
            }
            Err(err) => {
                tracing::error!(error = %err, "Probe task panicked");
            }
        }
    }

    let mut result = DiscoveryResult::default();
    for mut record in records {
        let outcome = outcomes.remove(&record.port).flatten();
        record.apply_probe(outcome);
        if record.has_web {
            result.web.push(record);
        } else {
            result.other.push(record);
        }
    }
    result.web.sort_by_key(|record| record.port);
    result.other.sort_by_key(|record| record.port);
    result
}
