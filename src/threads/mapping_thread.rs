//! Mapping worker thread.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::config::PipelineConfig;
use crate::core::types::transform::invert_rigid;
use crate::core::types::{FeatureFrame, SyncedFrame};
use crate::engine::loop_closure::LoopDetector;
use crate::engine::mapping::MappingEngine;
use crate::io::publisher::{
    CloudMsg, LoopMarkerMsg, PathMsg, PoseMsg, PoseStampedMsg, PublishMsg, PublishSink, SensorKind,
    TransformMsg, MAP_FRAME, SPIN_LIDAR_FRAME,
};
use crate::io::queue::SyncedQueue;
use crate::io::trajectory::save_trajectory;

/// Handle to the mapping worker.
///
/// Consumes extracted feature frames, drives the mapping engine and
/// publishes poses, transformed clouds, the path and loop markers. On
/// shutdown the accumulated trajectory is dumped when a save path is
/// configured.
pub struct MappingWorker {
    handle: JoinHandle<()>,
    queue: Arc<SyncedQueue<(SyncedFrame, FeatureFrame)>>,
    stop: Arc<AtomicBool>,
}

impl MappingWorker {
    /// Spawn the worker.
    pub fn spawn(
        config: PipelineConfig,
        detector: Box<dyn LoopDetector>,
        input: Arc<SyncedQueue<(SyncedFrame, FeatureFrame)>>,
        sink: Arc<dyn PublishSink>,
    ) -> Self {
        let stop = Arc::new(AtomicBool::new(false));

        let queue = input.clone();
        let worker_stop = stop.clone();
        let handle = thread::Builder::new()
            .name("mapping".into())
            .spawn(move || run(config, detector, input, sink, worker_stop))
            .expect("failed to spawn mapping worker");

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

fn run(
    config: PipelineConfig,
    detector: Box<dyn LoopDetector>,
    input: Arc<SyncedQueue<(SyncedFrame, FeatureFrame)>>,
    sink: Arc<dyn PublishSink>,
    stop: Arc<AtomicBool>,
) {
    let mut engine = MappingEngine::new(config.mapping.clone(), detector);
    let solid_extrinsic = invert_rigid(&config.solid_lidar_extrinsic.to_matrix());
    let save_path = config.mapping_save_path.clone();
    log::info!("mapping save path: {}", save_path);

    log::info!("mapping worker started");

    loop {
        let batch = input.acquire(|| stop.load(Ordering::Acquire));
        if batch.is_empty() {
            break;
        }

        for (frame, features) in batch {
            if stop.load(Ordering::Acquire) {
                break;
            }

            let Some(world) = engine.process(&frame.spin_cloud, &features, frame.timestamp_us)
            else {
                continue;
            };

            let stamp = frame.timestamp_us;

            sink.publish(PublishMsg::Cloud(CloudMsg {
                frame_id: MAP_FRAME.to_string(),
                sensor: SensorKind::Spin,
                timestamp_us: stamp,
                cloud: frame.spin_cloud.transformed(&world),
            }));
            sink.publish(PublishMsg::Cloud(CloudMsg {
                frame_id: MAP_FRAME.to_string(),
                sensor: SensorKind::Solid,
                timestamp_us: stamp,
                cloud: frame.solid_cloud.transformed(&(world * solid_extrinsic)),
            }));

            sink.publish(PublishMsg::Transform(TransformMsg {
                frame_id: MAP_FRAME.to_string(),
                child_frame_id: SPIN_LIDAR_FRAME.to_string(),
                timestamp_us: stamp,
                pose: PoseMsg::from_matrix(&world),
            }));

            sink.publish(PublishMsg::Path(PathMsg {
                frame_id: MAP_FRAME.to_string(),
                timestamp_us: stamp,
                poses: engine
                    .trajectory()
                    .iter()
                    .map(|entry| PoseStampedMsg {
                        timestamp_us: entry.timestamp_us,
                        pose: PoseMsg::from_matrix(&entry.data),
                    })
                    .collect(),
            }));

            if !engine.loop_markers().is_empty() {
                sink.publish(PublishMsg::LoopMarkers(LoopMarkerMsg::from_pairs(
                    engine.loop_markers(),
                    stamp,
                )));
            }
        }
    }

    if !save_path.is_empty() {
        if let Err(e) = save_trajectory(&PathBuf::from(&save_path), engine.trajectory()) {
            log::error!("failed to save trajectory: {}", e);
        }
    }

    log::info!("mapping worker stopped");
}
