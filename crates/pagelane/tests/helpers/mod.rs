//! Shared fixtures for pagelane integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use image::{Rgb, RgbImage};
use pagelane::engine::{RawDetection, RecognitionEngine};
use pagelane::{JobSource, PageBatch, PagelaneError, Result};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

/// White page whose top-left pixel encodes the page index in the red channel.
pub fn page_image(index: usize) -> RgbImage {
    let mut image = RgbImage::from_pixel(64, 48, WHITE);
    image.put_pixel(0, 0, Rgb([index as u8, 0, 0]));
    image
}

pub fn page_index(image: &RgbImage) -> usize {
    image.get_pixel(0, 0).0[0] as usize
}

/// Batch of `pages` synthetic pages writing PNG overlays into `output_dir`.
pub fn page_batch(output_dir: &Path, pages: usize) -> PageBatch {
    PageBatch::new(
        (0..pages).map(page_image).collect(),
        (0..pages).map(|i| output_dir.join(format!("page_{}.png", i))).collect(),
    )
    .expect("aligned batch")
}

/// Job source handing out a prepared batch.
pub struct MemorySource {
    pub batch: PageBatch,
}

#[async_trait]
impl JobSource for MemorySource {
    async fn materialize(&self) -> Result<PageBatch> {
        Ok(self.batch.clone())
    }
}

/// One recognition call as observed by the tracker.
#[derive(Debug, Clone, Copy)]
pub struct Interval {
    pub index: usize,
    pub device_id: usize,
    pub start: Instant,
    pub end: Instant,
}

impl Interval {
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }
}

#[derive(Default)]
struct TrackerState {
    active: HashMap<usize, usize>,
    max_active: HashMap<usize, usize>,
    open: HashMap<usize, (usize, Instant)>,
    intervals: Vec<Interval>,
}

/// Records which pages run on which device and when.
#[derive(Default)]
pub struct ConcurrencyTracker {
    state: Mutex<TrackerState>,
}

impl ConcurrencyTracker {
    pub fn enter(&self, index: usize, device_id: usize) {
        let mut state = self.state.lock();
        let active = state.active.entry(device_id).or_insert(0);
        *active += 1;
        let now_active = *active;
        let max = state.max_active.entry(device_id).or_insert(0);
        *max = (*max).max(now_active);
        state.open.insert(index, (device_id, Instant::now()));
    }

    pub fn exit(&self, index: usize) {
        let mut state = self.state.lock();
        if let Some((device_id, start)) = state.open.remove(&index) {
            if let Some(active) = state.active.get_mut(&device_id) {
                *active -= 1;
            }
            state.intervals.push(Interval {
                index,
                device_id,
                start,
                end: Instant::now(),
            });
        }
    }

    /// Highest number of simultaneous calls seen on any single device.
    pub fn max_active_per_device(&self) -> usize {
        self.state.lock().max_active.values().copied().max().unwrap_or(0)
    }

    pub fn interval(&self, index: usize) -> Interval {
        *self
            .state
            .lock()
            .intervals
            .iter()
            .find(|interval| interval.index == index)
            .unwrap_or_else(|| panic!("page index {} never ran", index))
    }

    /// Intervals in page index order.
    pub fn intervals(&self) -> Vec<Interval> {
        let mut intervals = self.state.lock().intervals.clone();
        intervals.sort_by_key(|interval| interval.index);
        intervals
    }
}

/// Engine driven by the page index encoded in each image.
///
/// Emits one box with the text `page <index>`, sleeping `delay` inside the
/// call so that overlapping work becomes observable.
pub struct ScriptedEngine {
    pub tracker: Arc<ConcurrencyTracker>,
    pub delay: Duration,
    pub fail_pages: HashSet<usize>,
    pub panic_pages: HashSet<usize>,
}

impl ScriptedEngine {
    pub fn new(tracker: Arc<ConcurrencyTracker>, delay: Duration) -> Self {
        Self {
            tracker,
            delay,
            fail_pages: HashSet::new(),
            panic_pages: HashSet::new(),
        }
    }

    pub fn failing_on(mut self, index: usize) -> Self {
        self.fail_pages.insert(index);
        self
    }

    pub fn panicking_on(mut self, index: usize) -> Self {
        self.panic_pages.insert(index);
        self
    }
}

impl RecognitionEngine for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    fn recognize(&self, image: &RgbImage, device_id: usize) -> Result<Vec<RawDetection>> {
        let index = page_index(image);

        self.tracker.enter(index, device_id);
        std::thread::sleep(self.delay);
        self.tracker.exit(index);

        if self.panic_pages.contains(&index) {
            panic!("scripted panic on page index {}", index);
        }
        if self.fail_pages.contains(&index) {
            return Err(PagelaneError::recognition(format!("scripted failure on page index {}", index)));
        }

        Ok(vec![RawDetection::from_rect(4.0, 4.0, 40.0, 20.0, format!("page {}", index))])
    }
}

/// Engine returning a fixed list of detections for every page.
pub struct FixedEngine(pub Vec<RawDetection>);

impl RecognitionEngine for FixedEngine {
    fn name(&self) -> &str {
        "fixed"
    }

    fn recognize(&self, _image: &RgbImage, _device_id: usize) -> Result<Vec<RawDetection>> {
        Ok(self.0.clone())
    }
}
