use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::transform::Pose;
use crate::types::LegSide;

// ---------------------------------------------------------------------------
// Serde default functions
// ---------------------------------------------------------------------------

const fn default_dt() -> f64 {
    0.005
}
const fn default_step_time() -> f64 {
    1.0
}
const fn default_double_support_ratio() -> f64 {
    0.2
}
const fn default_step_height() -> f64 {
    0.05
}
const fn default_top_ratio() -> f64 {
    0.5
}

// ---------------------------------------------------------------------------
// ControlConfig
// ---------------------------------------------------------------------------

/// Static controller configuration, read once at initialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlConfig {
    /// Control period in seconds (default: 0.005 = 200 Hz).
    #[serde(default = "default_dt")]
    pub dt: f64,

    /// Robot model locator, passed through to the model loader.
    #[serde(default)]
    pub model: String,

    /// Flat end-effector list:
    /// `name,target_link,base_link,px,py,pz,ax,ay,az,angle,...`
    /// with exactly one entry for `rleg` and one for `lleg`. The axis-angle
    /// part fixes the sole frame relative to the ankle link.
    #[serde(default)]
    pub end_effectors: String,

    /// Nominal step duration in seconds.
    #[serde(default = "default_step_time")]
    pub step_time: f64,

    /// Fraction of each step spent in double support.
    #[serde(default = "default_double_support_ratio")]
    pub double_support_ratio: f64,

    /// Swing apex height in meters.
    #[serde(default = "default_step_height")]
    pub step_height: f64,

    /// Swing-phase fraction at which the cycloid orbit peaks.
    #[serde(default = "default_top_ratio")]
    pub top_ratio: f64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            dt: default_dt(),
            model: String::new(),
            end_effectors: String::new(),
            step_time: default_step_time(),
            double_support_ratio: default_double_support_ratio(),
            step_height: default_step_height(),
            top_ratio: default_top_ratio(),
        }
    }
}

impl ControlConfig {
    /// Validate configuration. Returns Err on invalid values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dt <= 0.0 {
            return Err(ConfigError::InvalidDt(self.dt));
        }
        if self.step_time <= self.dt {
            return Err(ConfigError::InvalidStepTime(self.step_time));
        }
        if !(0.0..1.0).contains(&self.double_support_ratio) {
            return Err(ConfigError::InvalidDoubleSupportRatio(
                self.double_support_ratio,
            ));
        }
        Ok(())
    }

    /// Samples per step at the configured period.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn step_samples(&self) -> usize {
        (self.step_time / self.dt).round() as usize
    }

    /// Load from a TOML file.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse the end-effector list into per-leg frames (right = 0, left = 1).
    pub fn parse_end_effectors(&self) -> Result<[EndEffectorFrame; 2], ConfigError> {
        let fields: Vec<&str> = self
            .end_effectors
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        const TUPLE_LEN: usize = 10;
        if fields.len() % TUPLE_LEN != 0 {
            return Err(ConfigError::MalformedEndEffector(self.end_effectors.clone()));
        }

        let mut frames: [Option<EndEffectorFrame>; 2] = [None, None];
        for chunk in fields.chunks(TUPLE_LEN) {
            let name = chunk[0];
            let side = match name {
                "rleg" => LegSide::Right,
                "lleg" => LegSide::Left,
                _ => continue,
            };
            let mut nums = [0.0f64; 7];
            for (i, field) in chunk[3..].iter().enumerate() {
                nums[i] = field
                    .parse()
                    .map_err(|_| ConfigError::MalformedEndEffector((*field).to_string()))?;
            }
            let axis = Vector3::new(nums[3], nums[4], nums[5]);
            let rot = if axis.norm() < 1e-12 {
                UnitQuaternion::identity()
            } else {
                UnitQuaternion::new(axis.normalize() * nums[6])
            };
            frames[side.index()] = Some(EndEffectorFrame {
                side,
                target_link: chunk[1].to_string(),
                base_link: chunk[2].to_string(),
                local: Pose::new(Vector3::new(nums[0], nums[1], nums[2]), rot),
            });
        }

        match frames {
            [Some(r), Some(l)] => Ok([r, l]),
            [None, _] => Err(ConfigError::MissingEndEffector("rleg".into())),
            [_, None] => Err(ConfigError::MissingEndEffector("lleg".into())),
        }
    }
}

/// Sole frame fixed relative to a leg's ankle link.
#[derive(Debug, Clone, PartialEq)]
pub struct EndEffectorFrame {
    pub side: LegSide,
    /// Link the sole frame is attached to.
    pub target_link: String,
    /// Root of the leg chain.
    pub base_link: String,
    /// Sole pose in the target link frame.
    pub local: Pose,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
