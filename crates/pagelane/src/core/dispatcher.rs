//! Page dispatch orchestration.
//!
//! The [`Dispatcher`] is the entry point of the crate. One dispatch call:
//!
//! 1. materializes the job source into a [`PageBatch`]
//! 2. resolves the device count once (config override, else the device probe, else 1)
//! 3. assigns job `i` to device `i mod device_count`
//! 4. runs the jobs, either in index order on one blocking task (one device) or
//!    as one task per job gated by a capacity-1 slot per device (several devices)
//! 5. waits for every job and returns exactly one [`ResultRecord`] per page
//!
//! Per-page failures never abort the call: they come back as records whose
//! `page_content` is an `"Error: ..."` marker and whose `error` field is set.
//! Only call-level problems (unreadable input, invalid configuration, engine
//! provisioning failures) are returned as `Err`.

use crate::core::aggregator::{CollectionOrder, ResultAggregator};
use crate::core::config::{DispatchConfig, OverlayConfig};
use crate::device::{DeviceProbe, DeviceSlotPool, EnvDeviceProbe, device_for_index, resolve_device_count};
use crate::engine::{EngineProvisioning, EngineSet, RecognitionEngine};
use crate::source::{JobSource, PageBatch};
use crate::types::{Job, ResultRecord};
use crate::worker;
use crate::{PagelaneError, Result};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::{JoinHandle, JoinSet};

/// Runtime backing [`dispatch_sync`], built on first use and shared by every call.
static GLOBAL_RUNTIME: Lazy<std::io::Result<tokio::runtime::Runtime>> =
    Lazy::new(|| tokio::runtime::Builder::new_multi_thread().enable_all().build());

/// Device slot for every job index of a batch.
///
/// `assign_devices(n, d)[i] == i % d` when `d > 1`, and all zeros otherwise.
pub fn assign_devices(job_count: usize, device_count: usize) -> Vec<usize> {
    (0..job_count).map(|index| device_for_index(index, device_count)).collect()
}

/// Fans page jobs out across device slots and joins their results.
///
/// # Example
///
/// ```rust,no_run
/// use image::RgbImage;
/// use pagelane::engine::{RawDetection, RecognitionEngine};
/// use pagelane::{DispatchConfig, Dispatcher, EngineProvisioning, ImageFileSource, Result};
///
/// struct WholePage;
///
/// impl RecognitionEngine for WholePage {
///     fn name(&self) -> &str {
///         "whole-page"
///     }
///
///     fn recognize(&self, image: &RgbImage, _device_id: usize) -> Result<Vec<RawDetection>> {
///         let (w, h) = image.dimensions();
///         Ok(vec![RawDetection::from_rect(0.0, 0.0, w as f32 - 1.0, h as f32 - 1.0, "page")])
///     }
/// }
///
/// # async fn example() -> Result<()> {
/// let dispatcher = Dispatcher::new(EngineProvisioning::shared(WholePage), DispatchConfig::default());
/// let records = dispatcher.dispatch(&ImageFileSource::new("scans/", "out/")).await?;
/// for record in records {
///     println!("page {}: {}", record.page, record.page_content);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Dispatcher {
    engines: EngineProvisioning,
    config: DispatchConfig,
    probe: Arc<dyn DeviceProbe>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("engines", &self.engines)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Build a dispatcher that probes devices from the environment.
    pub fn new(engines: EngineProvisioning, config: DispatchConfig) -> Self {
        Self {
            engines,
            config,
            probe: Arc::new(EnvDeviceProbe),
        }
    }

    /// Replace the device probe.
    pub fn with_probe(mut self, probe: Arc<dyn DeviceProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Effective device count for the next dispatch call, always at least 1.
    pub fn device_count(&self) -> usize {
        match self.config.device_count {
            Some(count) => count.max(1),
            None => resolve_device_count(self.probe.as_ref()),
        }
    }

    /// Materialize `source` and dispatch its pages.
    ///
    /// # Errors
    ///
    /// Returns the source's error if materialization fails (no job is started
    /// in that case), plus the call-level errors of [`Dispatcher::dispatch_batch`].
    #[cfg_attr(feature = "otel", tracing::instrument(skip(self, source)))]
    pub async fn dispatch(&self, source: &dyn JobSource) -> Result<Vec<ResultRecord>> {
        self.config.validate()?;
        let batch = source.materialize().await?;
        self.run_batch(batch).await
    }

    /// Dispatch an already materialized batch.
    ///
    /// # Errors
    ///
    /// - `PagelaneError::Validation` for an invalid configuration or an engine
    ///   that cannot be shared across the available devices
    /// - the engine factory's error if per-device provisioning fails
    #[cfg_attr(feature = "otel", tracing::instrument(
        skip(self, batch),
        fields(
            dispatch.batch_size = batch.len(),
        )
    ))]
    pub async fn dispatch_batch(&self, batch: PageBatch) -> Result<Vec<ResultRecord>> {
        self.config.validate()?;
        self.run_batch(batch).await
    }

    /// Run a batch against an already validated configuration.
    async fn run_batch(&self, batch: PageBatch) -> Result<Vec<ResultRecord>> {
        if batch.is_empty() {
            tracing::debug!("Empty page batch, nothing to dispatch");
            return Ok(vec![]);
        }

        let device_count = self.device_count();
        let engines = self.engines.provision(device_count)?;
        let jobs = batch.into_jobs(device_count);
        let mut aggregator = ResultAggregator::new(jobs.len());

        tracing::debug!("Dispatching {} pages across {} device(s)", jobs.len(), device_count);

        if device_count > 1 {
            self.run_concurrent(jobs, &engines, device_count, &mut aggregator).await?;
        } else {
            let engine = engines.for_device(0)?;
            aggregator = self.run_sequential(jobs, engine, aggregator).await?;
        }

        let order = if self.config.sort_by_page {
            CollectionOrder::ByPage
        } else {
            CollectionOrder::Completion
        };
        aggregator.finish(order)
    }

    /// Run every job in index order on a single blocking task.
    ///
    /// No slot is taken and no task is spawned per job; a panicking job only
    /// fails its own page.
    async fn run_sequential(
        &self,
        jobs: Vec<Job>,
        engine: Arc<dyn RecognitionEngine>,
        mut aggregator: ResultAggregator,
    ) -> Result<ResultAggregator> {
        let overlay = self.config.overlay.clone();

        spawn_worker(move || {
            for job in jobs {
                let index = job.index;
                let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
                    worker::run_job(engine.as_ref(), job, &overlay)
                }))
                .unwrap_or_else(|payload| {
                    Err(PagelaneError::recognition(format!(
                        "Worker panicked: {}",
                        panic_message(payload.as_ref())
                    )))
                });

                match outcome {
                    Ok(record) => aggregator.push(record),
                    Err(e) => aggregator.push_failure(index, &e),
                }
            }
            aggregator
        })
        .await
        .map_err(|join_err| PagelaneError::Other(format!("Sequential dispatch task failed: {}", join_err)))
    }

    /// Spawn one task per job; each task waits for its device slot before running.
    async fn run_concurrent(
        &self,
        jobs: Vec<Job>,
        engines: &EngineSet,
        device_count: usize,
        aggregator: &mut ResultAggregator,
    ) -> Result<()> {
        let pool = Arc::new(DeviceSlotPool::new(device_count));
        let overlay = Arc::new(self.config.overlay.clone());
        let stagger = self.config.spawn_stagger();
        let total = jobs.len();

        let mut tasks = JoinSet::new();
        let mut task_pages = HashMap::with_capacity(total);

        for (position, job) in jobs.into_iter().enumerate() {
            let index = job.index;
            let engine = engines.for_device(job.device_id)?;
            let pool = Arc::clone(&pool);
            let overlay = Arc::clone(&overlay);

            tracing::debug!("Page {} assigned to device {}", job.page(), job.device_id);

            let handle = tasks.spawn(async move { (index, run_on_slot(&pool, engine, job, overlay).await) });
            task_pages.insert(handle.id(), index);

            if !stagger.is_zero() && position + 1 < total {
                tokio::time::sleep(stagger).await;
            }
        }

        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((_, (_, Ok(record)))) => aggregator.push(record),
                Ok((_, (index, Err(e)))) => aggregator.push_failure(index, &e),
                Err(join_err) => {
                    let index = task_pages.get(&join_err.id()).copied().ok_or_else(|| {
                        PagelaneError::Other(format!("Join error from an unknown task: {}", join_err))
                    })?;
                    let e = PagelaneError::recognition(format!("Task for page {} failed: {}", index + 1, join_err));
                    aggregator.push_failure(index, &e);
                }
            }
        }

        Ok(())
    }
}

/// Hold the job's device slot for the whole worker run.
async fn run_on_slot(
    pool: &DeviceSlotPool,
    engine: Arc<dyn RecognitionEngine>,
    job: Job,
    overlay: Arc<OverlayConfig>,
) -> Result<ResultRecord> {
    let _slot = pool.acquire(job.device_id).await?;
    let page = job.page();

    spawn_worker(move || worker::run_job(engine.as_ref(), job, &overlay))
        .await
        .map_err(|join_err| {
            if join_err.is_panic() {
                PagelaneError::recognition(format!(
                    "Worker panicked on page {}: {}",
                    page,
                    panic_message(join_err.into_panic().as_ref())
                ))
            } else {
                PagelaneError::recognition(format!("Worker for page {} did not complete: {}", page, join_err))
            }
        })?
}

/// `spawn_blocking` that keeps the caller's subscriber and span for worker logs.
fn spawn_worker<F, R>(f: F) -> JoinHandle<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let dispatch = tracing::dispatcher::get_default(|dispatch| dispatch.clone());
    let span = tracing::Span::current();
    tokio::task::spawn_blocking(move || tracing::dispatcher::with_default(&dispatch, || span.in_scope(f)))
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Synchronous wrapper for [`Dispatcher::dispatch`].
///
/// Blocks the current thread on a shared global runtime. Must not be called
/// from within an async context.
///
/// # Errors
///
/// Returns `PagelaneError::Other` if the global runtime could not be built,
/// plus every error of [`Dispatcher::dispatch`].
pub fn dispatch_sync(dispatcher: &Dispatcher, source: &dyn JobSource) -> Result<Vec<ResultRecord>> {
    let runtime = GLOBAL_RUNTIME
        .as_ref()
        .map_err(|e| PagelaneError::Other(format!("Failed to create global Tokio runtime: {}", e)))?;
    runtime.block_on(dispatcher.dispatch(source))
}
