//! Worker pipeline.
//!
//! Two dedicated threads form the core: the feature worker extracts
//! geometric primitives from synchronized frames, the mapping worker
//! registers them, maintains the trajectory and publishes results.
//! Handoff runs through [`SyncedQueue`]s passed in at construction; no
//! global state is involved.

mod feature_thread;
mod mapping_thread;

pub use feature_thread::FeatureWorker;
pub use mapping_thread::MappingWorker;

use std::sync::Arc;

use crate::config::PipelineConfig;
use crate::core::types::{FeatureFrame, SyncedFrame};
use crate::engine::loop_closure::LoopDetector;
use crate::io::publisher::PublishSink;
use crate::io::queue::SyncedQueue;

/// Both workers wired together.
///
/// The frame-sync source pushes into [`Pipeline::input`]; shutdown is
/// cooperative and drops any queued frames.
pub struct Pipeline {
    /// Queue fed by the frame-sync source.
    pub input: Arc<SyncedQueue<SyncedFrame>>,
    feature: FeatureWorker,
    mapping: MappingWorker,
}

impl Pipeline {
    /// Spawn both workers.
    pub fn launch(
        config: PipelineConfig,
        detector: Box<dyn LoopDetector>,
        sink: Arc<dyn PublishSink>,
    ) -> Self {
        let input: Arc<SyncedQueue<SyncedFrame>> = Arc::new(SyncedQueue::new());
        let handoff: Arc<SyncedQueue<(SyncedFrame, FeatureFrame)>> = Arc::new(SyncedQueue::new());

        let feature = FeatureWorker::spawn(&config, input.clone(), handoff.clone());
        let mapping = MappingWorker::spawn(config, detector, handoff, sink);

        Self {
            input,
            feature,
            mapping,
        }
    }

    /// Stop both workers and join their threads.
    pub fn shutdown(self) {
        self.feature.shutdown();
        self.mapping.shutdown();
    }
}
