//! Multi-host coordinator.
//!
//! Fans one [`Operation`] out across many targets. Each target gets its own
//! [`DeviceHandle`](crate::session::DeviceHandle) built from a shared
//! [`DeviceBuilder`] template and runs on its own tokio task: connect,
//! operate, disconnect. At most `concurrency` targets are in flight at once.
//!
//! A failing target never stops the others; its error becomes that target's
//! [`DeviceResult`]. Results are yielded in completion order.

mod sink;

pub use sink::{OutputSink, SinkMode};

use std::pin::pin;
use std::sync::Arc;

use futures_core::Stream;
use futures_util::stream::{self, StreamExt};
use log::{debug, info, warn};

use crate::driver::{CommandBatch, DeviceBuilder, DeviceResult, Operation};
use crate::error::{ErrorKind, Result};
use crate::session::DeviceHandle;

/// Default number of targets in flight: twice the available parallelism.
///
/// Workers spend nearly all their time waiting on the network.
fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get() * 2)
        .unwrap_or(8)
}

/// Runs one operation against many devices.
#[derive(Debug)]
pub struct Coordinator {
    template: DeviceBuilder,
    concurrency: usize,
    sink: OutputSink,
}

impl Coordinator {
    /// Coordinator whose per-target handles come from `template`.
    pub fn new(template: DeviceBuilder) -> Self {
        Self {
            template,
            concurrency: default_concurrency(),
            sink: OutputSink::default(),
        }
    }

    /// Maximum number of targets worked on at once.
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Where results are written by [`run`](Self::run).
    pub fn sink(mut self, sink: OutputSink) -> Self {
        self.sink = sink;
        self
    }

    /// Start the operation on every target and yield results as they complete.
    ///
    /// Argument problems (no targets, a multi-target diff, empty commands, a
    /// bad template) are reported here, before any device is contacted.
    pub fn stream(
        &self,
        targets: &CommandBatch,
        operation: &Operation,
    ) -> Result<impl Stream<Item = DeviceResult> + Send + 'static> {
        operation.validate(targets.len())?;
        let handles = targets
            .iter()
            .map(|target| self.template.for_host(target).build())
            .collect::<Result<Vec<_>>>()?;

        info!(
            "running {} on {} target(s), {} at a time",
            operation,
            handles.len(),
            self.concurrency
        );
        // Progress lines go straight to the terminal and would tear with
        // other targets' output.
        let mut operation = operation.clone();
        if handles.len() > 1 && operation.reports_progress() {
            warn!("transfer progress is only shown for a single target");
            operation = operation.without_progress();
        }
        let operation = Arc::new(operation);

        Ok(stream::iter(handles)
            .map(move |handle| {
                let operation = Arc::clone(&operation);
                async move {
                    let target = handle.host().to_string();
                    match tokio::spawn(run_target(handle, operation)).await {
                        Ok(result) => result,
                        Err(e) => {
                            warn!("{}: worker stopped: {}", target, e);
                            DeviceResult::failure(
                                target.clone(),
                                format!("Worker for device {target} stopped: {e}\n"),
                                ErrorKind::Operation,
                            )
                        }
                    }
                }
            })
            .buffer_unordered(self.concurrency))
    }

    /// Run the operation on every target, writing each result to the sink as
    /// it completes. Returns all results in completion order.
    pub async fn run(&self, targets: &CommandBatch, operation: &Operation) -> Result<Vec<DeviceResult>> {
        let mut results = pin!(self.stream(targets, operation)?);
        let mut collected = Vec::with_capacity(targets.len());

        while let Some(result) = results.next().await {
            if let Err(e) = self.sink.emit(&result).await {
                warn!("{}: failed to write result: {}", result.target, e);
            }
            collected.push(result);
        }
        Ok(collected)
    }
}

async fn run_target(mut handle: DeviceHandle, operation: Arc<Operation>) -> DeviceResult {
    let result = handle.run(&operation).await;
    handle.disconnect().await;
    debug!("{}: finished with status {:?}", result.target, result.status);
    result
}
