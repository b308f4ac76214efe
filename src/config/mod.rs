//! Configuration provider contract and pipeline configuration.
//!
//! Configuration loading is an external collaborator: the pipeline only
//! asks a [`ConfigProvider`] for named scalars with defaults.
//! [`MapConfig`] is the in-memory implementation used by tests and the
//! scenario binary.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::algorithms::extraction::{SolidExtractorConfig, SpinExtractorConfig};
use crate::core::types::Transform;
use crate::engine::mapping::MappingConfig;

/// Named scalar access with defaults.
pub trait ConfigProvider {
    /// Boolean parameter.
    fn get_bool(&self, key: &str, default: bool) -> bool;
    /// Floating-point parameter.
    fn get_f64(&self, key: &str, default: f64) -> f64;
    /// Integer parameter.
    fn get_i64(&self, key: &str, default: i64) -> i64;
    /// String parameter.
    fn get_string(&self, key: &str, default: &str) -> String;
    /// Float list parameter; `None` when absent.
    fn get_f32_list(&self, key: &str) -> Option<Vec<f32>>;
}

/// A configuration value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    /// Boolean
    Bool(bool),
    /// Number (integers included)
    Number(f64),
    /// Text
    Text(String),
    /// Float list
    List(Vec<f32>),
}

/// In-memory configuration provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MapConfig {
    values: HashMap<String, ConfigValue>,
}

impl MapConfig {
    /// Create an empty provider (all defaults).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value, builder style.
    pub fn set(mut self, key: &str, value: ConfigValue) -> Self {
        self.values.insert(key.to_string(), value);
        self
    }
}

impl ConfigProvider for MapConfig {
    fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.values.get(key) {
            Some(ConfigValue::Bool(v)) => *v,
            _ => default,
        }
    }

    fn get_f64(&self, key: &str, default: f64) -> f64 {
        match self.values.get(key) {
            Some(ConfigValue::Number(v)) => *v,
            _ => default,
        }
    }

    fn get_i64(&self, key: &str, default: i64) -> i64 {
        match self.values.get(key) {
            Some(ConfigValue::Number(v)) => *v as i64,
            _ => default,
        }
    }

    fn get_string(&self, key: &str, default: &str) -> String {
        match self.values.get(key) {
            Some(ConfigValue::Text(v)) => v.clone(),
            _ => default.to_string(),
        }
    }

    fn get_f32_list(&self, key: &str) -> Option<Vec<f32>> {
        match self.values.get(key) {
            Some(ConfigValue::List(v)) => Some(v.clone()),
            _ => None,
        }
    }
}

/// Fatal configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("solid_lidar_extrinsic must have 6 elements, {0} got")]
    BadExtrinsic(usize),
}

/// Complete pipeline configuration resolved from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Enable the spin-LiDAR branch.
    pub use_spin_lidar: bool,
    /// Enable the solid-LiDAR branch.
    pub use_solid_lidar: bool,
    /// Spin→solid extrinsic (x y z roll pitch yaw).
    pub solid_lidar_extrinsic: Transform,
    /// Spin extractor settings.
    pub spin_extractor: SpinExtractorConfig,
    /// Solid extractor settings.
    pub solid_extractor: SolidExtractorConfig,
    /// Mapping engine settings.
    pub mapping: MappingConfig,
    /// Trajectory dump directory; empty disables the dump.
    pub mapping_save_path: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            use_spin_lidar: true,
            use_solid_lidar: true,
            solid_lidar_extrinsic: Transform::identity(),
            spin_extractor: SpinExtractorConfig::default(),
            solid_extractor: SolidExtractorConfig::default(),
            mapping: MappingConfig::default(),
            mapping_save_path: String::new(),
        }
    }
}

impl PipelineConfig {
    /// Resolve every parameter from a provider, validating the fatal
    /// invariants.
    ///
    /// Disabling both sensor branches is repaired by forcing both on,
    /// logged at fatal severity; a malformed extrinsic vector is a hard
    /// error.
    pub fn from_provider(provider: &dyn ConfigProvider) -> Result<Self, ConfigError> {
        let mut config = Self {
            use_spin_lidar: provider.get_bool("use_spin_lidar", true),
            use_solid_lidar: provider.get_bool("use_solid_lidar", true),
            ..Self::default()
        };

        if !config.use_spin_lidar && !config.use_solid_lidar {
            log::error!("use_spin_lidar and use_solid_lidar cannot be both false");
            config.use_spin_lidar = true;
            config.use_solid_lidar = true;
        }

        if let Some(extrinsic) = provider.get_f32_list("solid_lidar_extrinsic") {
            if extrinsic.len() != 6 {
                log::error!(
                    "solid_lidar_extrinsic must have 6 elements, {} got",
                    extrinsic.len()
                );
                return Err(ConfigError::BadExtrinsic(extrinsic.len()));
            }
            config.solid_lidar_extrinsic = Transform::new(
                extrinsic[0] as f64,
                extrinsic[1] as f64,
                extrinsic[2] as f64,
                extrinsic[3] as f64,
                extrinsic[4] as f64,
                extrinsic[5] as f64,
            );
        }
        let e = &config.solid_lidar_extrinsic;
        log::info!(
            "solid_lidar_extrinsic: {} {} {} {} {} {}",
            e.x,
            e.y,
            e.z,
            e.roll,
            e.pitch,
            e.yaw
        );

        let degenerate_threshold = provider.get_f64("lm/degenerate_threshold", 10.0);
        if degenerate_threshold < 5.0 {
            log::warn!("degenerate_threshold is too small, {}", degenerate_threshold);
        }
        config.mapping.registration.degenerate_threshold = degenerate_threshold;

        let gates = &mut config.mapping.keyframe_gates;
        gates.x = provider.get_f64("keyframe/x", 0.5);
        gates.y = provider.get_f64("keyframe/y", 0.5);
        gates.z = provider.get_f64("keyframe/z", 0.1);
        gates.roll = provider.get_f64("keyframe/roll", 0.02);
        gates.pitch = provider.get_f64("keyframe/pitch", 0.02);
        gates.yaw = provider.get_f64("keyframe/yaw", 0.02);

        config.mapping.loop_closure.max_loss = provider.get_f64("loop/max_loss", 0.05);
        config.mapping.loop_closure.reset = provider.get_i64("loop/reset", 5) as u32;
        config.mapping.loop_closure.initial_load = provider.get_i64("loop/initial_load", 100) as u32;
        config.mapping.enable_loop = provider.get_bool("loop/enable", true);

        config.mapping_save_path = provider.get_string("mapping_save_path", "");

        Ok(config)
    }
}
