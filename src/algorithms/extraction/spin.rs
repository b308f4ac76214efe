//! Spin-LiDAR feature extraction.
//!
//! Curvature-sorted selection per ring: each ring is divided into equal
//! segments, the highest-curvature points of a segment become line
//! features and the lowest-curvature points become plane features, with
//! neighbourhood masking so selections do not cluster.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::NotEnoughFeatures;
use crate::core::types::{FeatureObjects, PointCloud};

/// Configuration for the spin-LiDAR extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpinExtractorConfig {
    /// Curvature window half-width (points on each side).
    pub half_window: usize,
    /// Equal segments per ring for selection spreading.
    pub segments: usize,
    /// Line picks per segment.
    pub max_line_per_segment: usize,
    /// Plane picks per segment.
    pub max_plane_per_segment: usize,
    /// Minimum curvature for a line pick.
    pub edge_curvature_min: f32,
    /// Maximum curvature for a plane pick.
    pub surface_curvature_max: f32,
    /// Frame gate: minimum line features.
    pub min_line_points: usize,
    /// Frame gate: minimum plane features.
    pub min_plane_points: usize,
}

impl Default for SpinExtractorConfig {
    fn default() -> Self {
        Self {
            half_window: 5,
            segments: 6,
            max_line_per_segment: 2,
            max_plane_per_segment: 4,
            edge_curvature_min: 0.1,
            surface_curvature_max: 0.05,
            min_line_points: 20,
            min_plane_points: 100,
        }
    }
}

/// Curvature-based line/plane feature extractor for dense multi-ring
/// sweeps.
#[derive(Debug)]
pub struct SpinExtractor {
    config: SpinExtractorConfig,
}

impl SpinExtractor {
    /// Create an extractor.
    pub fn new(config: SpinExtractorConfig) -> Self {
        Self { config }
    }

    /// Extract line and plane features.
    ///
    /// Returns `NotEnoughFeatures` when the yield gate fails; the
    /// caller drops the frame.
    pub fn extract(&self, cloud: &PointCloud) -> Result<FeatureObjects, NotEnoughFeatures> {
        let mut line = PointCloud::new();
        let mut plane = PointCloud::new();

        for indices in rings_of(cloud).values() {
            self.extract_ring(cloud, indices, &mut line, &mut plane);
        }

        if line.len() < self.config.min_line_points || plane.len() < self.config.min_plane_points {
            return Err(NotEnoughFeatures {
                reason: format!(
                    "spin features not enough ({} line, {} plane)",
                    line.len(),
                    plane.len()
                ),
            });
        }

        Ok(FeatureObjects {
            line: Some(Arc::new(line)),
            plane: Some(Arc::new(plane)),
            non_planar: None,
        })
    }

    fn extract_ring(
        &self,
        cloud: &PointCloud,
        indices: &[usize],
        line: &mut PointCloud,
        plane: &mut PointCloud,
    ) {
        let w = self.config.half_window;
        if indices.len() < 2 * w + 2 {
            return;
        }

        // Curvature of interior points: squared norm of the summed
        // second differences over the window.
        let usable = indices.len() - 2 * w;
        let mut curvature = vec![0.0f32; usable];
        for (slot, c) in curvature.iter_mut().enumerate() {
            let i = slot + w;
            let center = &cloud.points[indices[i]];
            let (mut dx, mut dy, mut dz) = (0.0f32, 0.0, 0.0);
            for j in 1..=w {
                let prev = &cloud.points[indices[i - j]];
                let next = &cloud.points[indices[i + j]];
                dx += prev.x + next.x - 2.0 * center.x;
                dy += prev.y + next.y - 2.0 * center.y;
                dz += prev.z + next.z - 2.0 * center.z;
            }
            *c = dx * dx + dy * dy + dz * dz;
        }

        let mut picked = vec![false; usable];
        let segment_len = usable.div_ceil(self.config.segments);

        for seg_start in (0..usable).step_by(segment_len.max(1)) {
            let seg_end = (seg_start + segment_len).min(usable);
            let mut order: Vec<usize> = (seg_start..seg_end).collect();
            order.sort_by(|&a, &b| {
                curvature[a]
                    .partial_cmp(&curvature[b])
                    .unwrap_or(std::cmp::Ordering::Equal)
            });

            // Highest curvature first for line picks.
            let mut line_picked = 0;
            for &slot in order.iter().rev() {
                if line_picked >= self.config.max_line_per_segment {
                    break;
                }
                if picked[slot] || curvature[slot] <= self.config.edge_curvature_min {
                    continue;
                }
                line.push(cloud.points[indices[slot + w]]);
                line_picked += 1;
                mask_neighbors(&mut picked, slot, w);
            }

            // Lowest curvature first for plane picks.
            let mut plane_picked = 0;
            for &slot in order.iter() {
                if plane_picked >= self.config.max_plane_per_segment {
                    break;
                }
                if picked[slot] || curvature[slot] >= self.config.surface_curvature_max {
                    continue;
                }
                plane.push(cloud.points[indices[slot + w]]);
                plane_picked += 1;
                mask_neighbors(&mut picked, slot, w);
            }
        }
    }
}

/// Group point indices by ring, preserving sweep order within a ring.
fn rings_of(cloud: &PointCloud) -> BTreeMap<u16, Vec<usize>> {
    let mut rings: BTreeMap<u16, Vec<usize>> = BTreeMap::new();
    for (i, p) in cloud.points.iter().enumerate() {
        rings.entry(p.ring).or_default().push(i);
    }
    rings
}

/// Mark a selection and its window so later picks keep their distance.
fn mask_neighbors(picked: &mut [bool], slot: usize, half_window: usize) {
    let lo = slot.saturating_sub(half_window);
    let hi = (slot + half_window).min(picked.len() - 1);
    for flag in &mut picked[lo..=hi] {
        *flag = true;
    }
}
