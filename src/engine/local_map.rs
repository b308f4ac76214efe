//! Sliding window of recent keyframes.

use nalgebra::Matrix4;

use crate::core::types::transform::invert_rigid;
use crate::core::types::{FeatureFrame, FeatureObjects, Keyframe, PointCloud};

/// Number of keyframes retained in the window.
pub const WINDOW_CAPACITY: usize = 20;

/// Fixed-capacity ring of recent keyframes plus the cached aggregate
/// local map.
///
/// The aggregate expresses every window entry in the head keyframe's
/// local frame and is rebuilt on demand after any mutation (push or
/// pose rewrite).
#[derive(Debug, Default)]
pub struct LocalMapWindow {
    slots: Vec<Keyframe>,
    /// Physical index of the newest entry.
    head: usize,
    /// Number of live entries, up to `WINDOW_CAPACITY`.
    len: usize,
    aggregate: Option<FeatureFrame>,
}

impl LocalMapWindow {
    /// Create an empty window.
    pub fn new() -> Self {
        Self {
            slots: Vec::with_capacity(WINDOW_CAPACITY),
            head: WINDOW_CAPACITY - 1,
            len: 0,
            aggregate: None,
        }
    }

    /// Number of live entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the window holds no keyframe yet.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append a keyframe at the head, evicting the oldest when full.
    pub fn push(&mut self, features: FeatureFrame, world_pose: Matrix4<f64>) {
        self.head = (self.head + 1) % WINDOW_CAPACITY;
        let entry = Keyframe {
            features,
            world_pose,
        };
        if self.slots.len() < WINDOW_CAPACITY {
            // Still filling: head walks in step with the storage.
            self.slots.push(entry);
        } else {
            self.slots[self.head] = entry;
        }
        if self.len < WINDOW_CAPACITY {
            self.len += 1;
        }
        self.aggregate = None;
    }

    /// World pose of the newest keyframe.
    ///
    /// # Panics
    /// Panics on an empty window.
    pub fn head_pose(&self) -> &Matrix4<f64> {
        assert!(self.len > 0, "empty local-map window");
        &self.slots[self.head].world_pose
    }

    /// Rewrite the pose of the entry `back_index` positions back from
    /// the head (1 = newest). Used by loop closure.
    ///
    /// # Panics
    /// Panics when `back_index` is 0 or exceeds the window size.
    pub fn set(&mut self, back_index: usize, world_pose: Matrix4<f64>) {
        assert!(
            back_index >= 1 && back_index <= self.len,
            "back_index {} out of range 1..={}",
            back_index,
            self.len
        );
        let slot = (self.head + WINDOW_CAPACITY + 1 - back_index) % WINDOW_CAPACITY;
        self.slots[slot].world_pose = world_pose;
        self.aggregate = None;
    }

    /// World pose `back_index` entries back from the head (1 = newest).
    pub fn pose_back(&self, back_index: usize) -> &Matrix4<f64> {
        assert!(back_index >= 1 && back_index <= self.len);
        let slot = (self.head + WINDOW_CAPACITY + 1 - back_index) % WINDOW_CAPACITY;
        &self.slots[slot].world_pose
    }

    /// Aggregate local map, rebuilt when dirty.
    pub fn local_map(&mut self) -> &FeatureFrame {
        if self.aggregate.is_none() {
            self.aggregate = Some(self.rebuild_aggregate());
        }
        self.aggregate.as_ref().unwrap()
    }

    fn rebuild_aggregate(&self) -> FeatureFrame {
        assert!(self.len > 0, "empty local-map window");
        let head_inverse = invert_rigid(self.head_pose());

        let mut spin_line = PointCloud::new();
        let mut spin_plane = PointCloud::new();
        let mut solid_plane = PointCloud::new();
        let mut solid_non = PointCloud::new();

        for entry in &self.slots[..self.len.min(self.slots.len())] {
            let relative = head_inverse * entry.world_pose;
            let mut append = |acc: &mut PointCloud, cloud: &Option<std::sync::Arc<PointCloud>>| {
                if let Some(cloud) = cloud {
                    acc.extend_transformed(cloud, &relative);
                }
            };
            append(&mut spin_line, &entry.features.spin.line);
            append(&mut spin_plane, &entry.features.spin.plane);
            append(&mut solid_plane, &entry.features.solid.plane);
            append(&mut solid_non, &entry.features.solid.non_planar);
        }

        let wrap = |cloud: PointCloud| {
            if cloud.is_empty() {
                None
            } else {
                Some(std::sync::Arc::new(cloud))
            }
        };

        FeatureFrame {
            spin: FeatureObjects {
                line: wrap(spin_line),
                plane: wrap(spin_plane),
                non_planar: None,
            },
            solid: FeatureObjects {
                line: None,
                plane: wrap(solid_plane),
                non_planar: wrap(solid_non),
            },
        }
    }
}
