//! Synthetic end-to-end scenario runner.
//!
//! Drives the full two-worker pipeline with a generated dual-LiDAR
//! scene: a square room swept by the spinning scanner and a wall patch
//! plus clutter seen by the solid-state scanner, observed from a sensor
//! translating along +x. Prints the published pose stream and, when a
//! save path is given, dumps the trajectory on shutdown.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use yugma_slam::config::{ConfigValue, MapConfig, PipelineConfig};
use yugma_slam::core::types::{LidarPoint, PointCloud, SyncedFrame};
use yugma_slam::engine::loop_closure::NullDetector;
use yugma_slam::io::publisher::{ChannelSink, PublishMsg};
use yugma_slam::threads::Pipeline;

#[derive(Parser, Debug)]
#[command(name = "scenario_odometry")]
#[command(about = "Run the dual-LiDAR pipeline on a synthetic scene")]
struct Args {
    /// Number of synthetic frames to feed.
    #[arg(long, default_value_t = 20)]
    frames: usize,

    /// Sensor translation between frames, meters.
    #[arg(long, default_value_t = 0.6)]
    spacing: f64,

    /// Trajectory dump directory (empty disables the dump).
    #[arg(long, default_value = "")]
    save_path: String,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let provider = MapConfig::new()
        .set("loop/enable", ConfigValue::Bool(false))
        .set("mapping_save_path", ConfigValue::Text(args.save_path.clone()));
    let config = PipelineConfig::from_provider(&provider).expect("invalid configuration");

    let (tx, rx) = crossbeam_channel::unbounded();
    let pipeline = Pipeline::launch(config, Box::new(NullDetector), Arc::new(ChannelSink::new(tx)));

    for i in 0..args.frames {
        let sensor_x = i as f64 * args.spacing;
        pipeline.input.push(SyncedFrame {
            spin_cloud: Arc::new(spin_sweep(sensor_x)),
            solid_cloud: Arc::new(solid_scan(sensor_x)),
            timestamp_us: i as u64 * 100_000,
        });
    }

    let mut published = 0;
    while published < args.frames {
        match rx.recv_timeout(Duration::from_secs(5)) {
            Ok(PublishMsg::Transform(t)) => {
                published += 1;
                log::info!(
                    "pose {:>3}: x={:.3} y={:.3} z={:.3}",
                    published,
                    t.pose.position[0],
                    t.pose.position[1],
                    t.pose.position[2]
                );
            }
            Ok(_) => {}
            Err(_) => {
                log::warn!("pipeline idle before all frames were published");
                break;
            }
        }
    }

    pipeline.shutdown();
}

/// Square-room sweep observed from `sensor_x` down the +x axis.
fn spin_sweep(sensor_x: f64) -> PointCloud {
    let half = 25.0f32;
    let steps = 1440;
    let mut cloud = PointCloud::new();
    for ring in 0..16u16 {
        let z = ring as f32 * 0.08;
        for step in 0..steps {
            let theta = step as f32 * std::f32::consts::TAU / steps as f32;
            let (s, c) = theta.sin_cos();
            let r = half / c.abs().max(s.abs());
            cloud.push(LidarPoint {
                x: r * c - sensor_x as f32,
                y: r * s,
                z,
                intensity: 100.0,
                ring,
                time: step as f32 / steps as f32 * 0.1,
            });
        }
    }
    cloud
}

/// Narrow-FoV scan: a wall patch ahead plus volumetric clutter.
fn solid_scan(sensor_x: f64) -> PointCloud {
    let mut cloud = PointCloud::new();
    for i in 0..24 {
        for j in 0..24 {
            cloud.push(LidarPoint::from_xyz(
                25.0 - sensor_x as f32,
                i as f32 * 0.1 - 1.2,
                j as f32 * 0.1,
            ));
        }
    }
    // Deterministic volumetric clutter from a small LCG.
    let mut state = 0x2545F4914F6CDD1Du64;
    let mut next = move || {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (state >> 33) as f32 / (1u64 << 31) as f32 - 1.0
    };
    for _ in 0..200 {
        cloud.push(LidarPoint::from_xyz(
            20.0 - sensor_x as f32 + next(),
            2.0 + next(),
            1.0 + next(),
        ));
    }
    cloud
}
