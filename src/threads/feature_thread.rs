//! Feature worker thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::algorithms::extraction::{SolidExtractor, SpinExtractor};
use crate::config::PipelineConfig;
use crate::core::types::{FeatureFrame, SyncedFrame};
use crate::io::queue::SyncedQueue;

/// Handle to the feature extraction worker.
///
/// Consumes synchronized frames, extracts per-sensor features, applies
/// the solid-LiDAR extrinsic and hands the pair downstream. Frames
/// whose extraction fails a yield gate are dropped with an info log.
pub struct FeatureWorker {
    handle: JoinHandle<()>,
    queue: Arc<SyncedQueue<SyncedFrame>>,
    stop: Arc<AtomicBool>,
}

impl FeatureWorker {
    /// Spawn the worker.
    pub fn spawn(
        config: &PipelineConfig,
        input: Arc<SyncedQueue<SyncedFrame>>,
        output: Arc<SyncedQueue<(SyncedFrame, FeatureFrame)>>,
    ) -> Self {
        let stop = Arc::new(AtomicBool::new(false));

        let use_spin = config.use_spin_lidar;
        let use_solid = config.use_solid_lidar;
        let spin_extractor = SpinExtractor::new(config.spin_extractor.clone());
        let solid_extractor =
            SolidExtractor::new(config.solid_extractor.clone(), &config.solid_lidar_extrinsic);

        let queue = input.clone();
        let worker_stop = stop.clone();
        let handle = thread::Builder::new()
            .name("feature".into())
            .spawn(move || {
                run(
                    input,
                    output,
                    worker_stop,
                    use_spin,
                    use_solid,
                    spin_extractor,
                    solid_extractor,
                );
            })
            .expect("failed to spawn feature worker");

        Self {
            handle,
            queue,
            stop,
        }
    }

    /// Request stop, wake the queue and join.
    pub fn shutdown(self) {
        self.stop.store(true, Ordering::Release);
        self.queue.notify();
        self.handle.join().ok();
    }
}

#[allow(clippy::too_many_arguments)]
fn run(
    input: Arc<SyncedQueue<SyncedFrame>>,
    output: Arc<SyncedQueue<(SyncedFrame, FeatureFrame)>>,
    stop: Arc<AtomicBool>,
    use_spin: bool,
    use_solid: bool,
    spin_extractor: SpinExtractor,
    solid_extractor: SolidExtractor,
) {
    log::info!("feature worker started");

    loop {
        let batch = input.acquire(|| stop.load(Ordering::Acquire));
        if batch.is_empty() {
            break;
        }

        for frame in batch {
            if stop.load(Ordering::Acquire) {
                break;
            }

            let mut features = FeatureFrame::default();

            if use_spin {
                match spin_extractor.extract(&frame.spin_cloud) {
                    Ok(spin) => features.spin = spin,
                    Err(reason) => {
                        log::info!("{}", reason);
                        continue;
                    }
                }
            }

            if use_solid {
                match solid_extractor.extract(&frame.solid_cloud) {
                    Ok(solid) => features.solid = solid,
                    Err(reason) => {
                        log::info!("{}", reason);
                        continue;
                    }
                }
            }

            output.push((frame, features));
        }
    }

    log::info!("feature worker stopped");
}
