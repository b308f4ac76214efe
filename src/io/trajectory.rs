//! Trajectory dump and parse.
//!
//! One line per keyframe in TUM layout, CRLF-terminated:
//! `timestamp_seconds tx ty tz qx qy qz qw`. The dump file is named
//! `<unix-seconds>.txt` inside the configured directory.

use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use nalgebra::Matrix4;
use thiserror::Error;

use crate::core::types::{Timestamped, Transform};
use super::publisher::PoseMsg;

/// Trajectory io errors.
#[derive(Error, Debug)]
pub enum TrajectoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed line {0}: {1}")]
    Parse(usize, String),
}

/// Dump the trajectory into `dir`, returning the written path.
///
/// An empty trajectory writes nothing and returns `None`.
pub fn save_trajectory(
    dir: &Path,
    trajectory: &[Timestamped<Matrix4<f64>>],
) -> Result<Option<PathBuf>, TrajectoryError> {
    if trajectory.is_empty() {
        log::info!("no trace to save");
        return Ok(None);
    }

    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let path = dir.join(format!("{}.txt", stamp));
    let mut file = File::create(&path)?;

    for entry in trajectory {
        let pose = PoseMsg::from_matrix(&entry.data);
        write!(
            file,
            "{:.6} {:.6} {:.6} {:.6} {:.6} {:.6} {:.6} {:.6}\r\n",
            entry.timestamp_secs(),
            pose.position[0],
            pose.position[1],
            pose.position[2],
            pose.orientation[0],
            pose.orientation[1],
            pose.orientation[2],
            pose.orientation[3],
        )?;
    }

    log::info!("saved {} traces to {}", trajectory.len(), path.display());
    Ok(Some(path))
}

/// Parse a dump back into stamped poses.
pub fn load_trajectory<R: Read>(reader: R) -> Result<Vec<Timestamped<Matrix4<f64>>>, TrajectoryError> {
    let mut trajectory = Vec::new();

    for (number, line) in BufReader::new(reader).lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let fields: Vec<f64> = trimmed
            .split_whitespace()
            .map(str::parse)
            .collect::<Result<_, _>>()
            .map_err(|e| TrajectoryError::Parse(number + 1, format!("{}", e)))?;

        if fields.len() != 8 {
            return Err(TrajectoryError::Parse(
                number + 1,
                format!("expected 8 fields, got {}", fields.len()),
            ));
        }

        let quaternion = nalgebra::UnitQuaternion::from_quaternion(nalgebra::Quaternion::new(
            fields[7], fields[4], fields[5], fields[6],
        ));
        let (roll, pitch, yaw) = quaternion.euler_angles();
        let pose = Transform::new(fields[1], fields[2], fields[3], roll, pitch, yaw).to_matrix();

        trajectory.push(Timestamped::new(pose, (fields[0] * 1e6).round() as u64));
    }

    Ok(trajectory)
}
