//! Configuration models for handsweep.
//!
//! Everything the operator tunes between runs lives here: the output layout,
//! the swept parameter space and the geometry of the simulated rig.

use crate::models::{Dof, ParameterSpace};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Top-level configuration for handsweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Output settings
    pub output: OutputConfig,

    /// Swept ranges, one table per DOF
    pub space: ParameterSpace,

    /// Simulated rig geometry
    #[serde(default)]
    pub rig: RigConfig,
}

/// Output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Folder holding the CSV and the images.
    /// `${VAR}` placeholders are expanded from the environment.
    pub folder: PathBuf,

    /// CSV file name inside `folder`
    #[serde(default = "default_csv_file")]
    pub csv_file: String,

    /// Prefix of generated image names
    #[serde(default = "default_image_prefix")]
    pub image_prefix: String,

    /// Save a checkpoint every N grid points (0 disables checkpoints)
    #[serde(default = "default_checkpoint_interval")]
    pub checkpoint_interval: u64,

    /// Resume from an existing checkpoint in `folder`
    #[serde(default)]
    pub resume: bool,
}

fn default_csv_file() -> String {
    "joints.csv".to_string()
}

fn default_image_prefix() -> String {
    "hand".to_string()
}

fn default_checkpoint_interval() -> u64 {
    100
}

/// Geometry of the simulated planar hand, lengths in pixels and angles in degrees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RigConfig {
    /// Thumb base position
    #[serde(default = "default_thumb_base")]
    pub thumb_base: [f64; 2],

    /// Thumb segment lengths (driven by gamma1, gamma2, gamma3)
    #[serde(default = "default_thumb_segments")]
    pub thumb_segments: [f64; 3],

    /// Index finger base position
    #[serde(default = "default_index_base")]
    pub index_base: [f64; 2],

    /// Index segment lengths (driven by alpha1, alpha2; beta rotates the base)
    #[serde(default = "default_index_segments")]
    pub index_segments: [f64; 2],

    /// Minimum distance between the two fingers for a valid sample
    #[serde(default = "default_min_clearance")]
    pub min_clearance: f64,

    /// Optional per-DOF joint limits `[min, max]`
    #[serde(default)]
    pub joint_limits: BTreeMap<Dof, [f64; 2]>,

    /// Rendered image width
    #[serde(default = "default_image_size")]
    pub image_width: u32,

    /// Rendered image height
    #[serde(default = "default_image_size")]
    pub image_height: u32,
}

fn default_thumb_base() -> [f64; 2] {
    [40.0, 100.0]
}

fn default_thumb_segments() -> [f64; 3] {
    [30.0, 22.0, 18.0]
}

fn default_index_base() -> [f64; 2] {
    [60.0, 20.0]
}

fn default_index_segments() -> [f64; 2] {
    [35.0, 28.0]
}

fn default_min_clearance() -> f64 {
    4.0
}

fn default_image_size() -> u32 {
    128
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            thumb_base: default_thumb_base(),
            thumb_segments: default_thumb_segments(),
            index_base: default_index_base(),
            index_segments: default_index_segments(),
            min_clearance: default_min_clearance(),
            joint_limits: BTreeMap::new(),
            image_width: default_image_size(),
            image_height: default_image_size(),
        }
    }
}

/// Example configuration printed by `handsweep example`.
pub const EXAMPLE_CONFIG: &str = r#"# handsweep configuration file

[output]
folder = "${HOME}/datasets/hand"
csv_file = "joints.csv"
image_prefix = "hand"
checkpoint_interval = 100
resume = false

# One table per DOF, swept outer to inner in this order.
# step = 0 holds the DOF at min.
[space.gamma1]
min = 0.0
max = 30.0
step = 15.0

[space.gamma2]
min = 0.0
max = 0.0

[space.gamma3]
min = 0.0
max = 0.0

[space.alpha1]
min = 0.0
max = 60.0
step = 20.0

[space.alpha2]
min = 0.0
max = 0.0

[space.beta]
min = -10.0
max = 10.0
step = 5.0

[rig]
min_clearance = 4.0
image_width = 128
image_height = 128

[rig.joint_limits]
alpha1 = [0.0, 90.0]
"#;

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_owned(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_owned(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check the values serde cannot check on its own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let csv = Path::new(&self.output.csv_file);
        if self.output.csv_file.is_empty() || csv.file_name() != Some(csv.as_os_str()) {
            return Err(ConfigError::Invalid(format!(
                "output.csv_file must be a plain file name, got '{}'",
                self.output.csv_file
            )));
        }
        if self.rig.image_width == 0 || self.rig.image_height == 0 {
            return Err(ConfigError::Invalid("rig image size must be non-zero".to_string()));
        }
        let segments = self
            .rig
            .thumb_segments
            .iter()
            .chain(self.rig.index_segments.iter());
        if segments.into_iter().any(|&len| !(len > 0.0)) {
            return Err(ConfigError::Invalid("rig segment lengths must be positive".to_string()));
        }
        for (dof, [lo, hi]) in &self.rig.joint_limits {
            if lo > hi {
                return Err(ConfigError::Invalid(format!(
                    "joint limit for {dof} has min {lo} > max {hi}"
                )));
            }
        }
        Ok(())
    }

    /// Output folder with environment variables expanded.
    pub fn output_folder(&self) -> PathBuf {
        PathBuf::from(expand_env_vars(&self.output.folder.to_string_lossy()))
    }

    /// Full path of the CSV file.
    pub fn csv_path(&self) -> PathBuf {
        self.output_folder().join(&self.output.csv_file)
    }
}

/// Expand environment variables in a string.
///
/// Supports ${VAR_NAME} syntax.
/// If the variable is not set, the placeholder is left unchanged.
pub fn expand_env_vars(s: &str) -> String {
    let Ok(re) = Regex::new(r"\$\{([^}]+)\}") else {
        return s.to_string();
    };

    let mut result = s.to_string();
    for cap in re.captures_iter(s) {
        if let Ok(value) = std::env::var(&cap[1]) {
            result = result.replace(&cap[0], &value);
        }
    }
    result
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_example_config_parses() {
        let config: Config = toml::from_str(EXAMPLE_CONFIG).unwrap();
        config.validate().unwrap();
        assert_eq!(config.output.csv_file, "joints.csv");
        assert_eq!(config.space.total_points(), 3 * 4 * 5);
        assert_eq!(config.rig.joint_limits[&Dof::Alpha1], [0.0, 90.0]);
        assert_eq!(config.rig.thumb_segments, default_thumb_segments());
    }

    #[test]
    fn test_defaults_applied() {
        let toml = r#"
            [output]
            folder = "out"

            [space]
            gamma1 = { min = 0.0, max = 0.0 }
            gamma2 = { min = 0.0, max = 0.0 }
            gamma3 = { min = 0.0, max = 0.0 }
            alpha1 = { min = 0.0, max = 0.0 }
            alpha2 = { min = 0.0, max = 0.0 }
            beta = { min = 0.0, max = 10.0, step = 5.0 }
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.output.checkpoint_interval, 100);
        assert!(!config.output.resume);
        assert_eq!(config.rig.image_width, 128);
        assert_eq!(config.csv_path(), PathBuf::from("out").join("joints.csv"));
    }

    #[test]
    fn test_missing_dof_rejected() {
        let toml = r#"
            [output]
            folder = "out"

            [space]
            gamma1 = { min = 0.0, max = 0.0 }
        "#;
        assert!(toml::from_str::<Config>(toml).is_err());
    }

    #[test]
    fn test_csv_file_must_be_plain_name() {
        let mut config: Config = toml::from_str(EXAMPLE_CONFIG).unwrap();
        config.output.csv_file = "../escape.csv".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_expand_env_vars() {
        std::env::set_var("HANDSWEEP_TEST_DIR", "/data");
        assert_eq!(expand_env_vars("${HANDSWEEP_TEST_DIR}/hand"), "/data/hand");
        assert_eq!(
            expand_env_vars("${HANDSWEEP_UNSET_VAR}/hand"),
            "${HANDSWEEP_UNSET_VAR}/hand"
        );
    }
}
