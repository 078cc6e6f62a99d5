//! Runtime tunables threaded explicitly into every agent update.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::AiError;

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AiConfig {
    pub pipe: PipeConfig,
    pub nav: NavConfig,
    pub cover: CoverConfig,
}

/// Pipe executor guardrails.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PipeConfig {
    /// Subpipe nesting depth that triggers a warning.
    pub subpipe_warn_depth: usize,
    /// Active-goal count that triggers a warning.
    pub active_goal_warn: usize,
    /// Active-goal count treated as a leak.
    pub active_goal_cap: usize,
    /// Accept unknown numeric branch codes, evaluating them as "has active
    /// goals". Off by default: unknown codes are rejected at build time.
    pub legacy_branch_fallback: bool,
}

impl Default for PipeConfig {
    fn default() -> Self {
        Self {
            subpipe_warn_depth: 10,
            active_goal_warn: 10,
            active_goal_cap: 100,
            legacy_branch_fallback: false,
        }
    }
}

/// Path following, maneuvering and stuck detection.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct NavConfig {
    pub stuck_min_improvement: f32,
    pub stuck_timeout_seconds: f32,
    /// Distance to path end under which a pending actor-target request starts.
    pub exact_positioning_distance: f32,
    /// Speed along the move direction under which the postamble considers the
    /// agent stopped.
    pub stopped_speed: f32,
    pub maneuver_min_seconds: f32,
    pub maneuver_max_seconds: f32,
    /// Distance of the initial backwards leg of a maneuver.
    pub maneuver_back_distance: f32,
    /// Maximum distance covered by a single maneuver.
    pub maneuver_max_distance: f32,
    pub maneuver_back_speed: f32,
    /// Cosine between move direction and path direction below which a
    /// maneuver starts.
    pub maneuver_trigger_cos: f32,
    /// Cosine above which a maneuver counts as realigned.
    pub maneuver_exit_cos: f32,
    /// Cosine under which the preamble turns the body before moving.
    pub alignment_cos: f32,
    pub alignment_timeout_seconds: f32,
    pub predictive_following: bool,
    pub prediction_horizon_seconds: f32,
    pub prediction_step_seconds: f32,
    /// Accumulated follower failure time before a path is regenerated.
    pub regenerate_after_seconds: f32,
}

impl Default for NavConfig {
    fn default() -> Self {
        Self {
            stuck_min_improvement: 0.05,
            stuck_timeout_seconds: 2.0,
            exact_positioning_distance: 2.5,
            stopped_speed: 0.01,
            maneuver_min_seconds: 0.3,
            maneuver_max_seconds: 5.0,
            maneuver_back_distance: 2.5,
            maneuver_max_distance: 5.0,
            maneuver_back_speed: 5.0,
            maneuver_trigger_cos: -0.2,
            maneuver_exit_cos: 0.98,
            alignment_cos: 0.5,
            alignment_timeout_seconds: 1.0,
            predictive_following: true,
            prediction_horizon_seconds: 1.0,
            prediction_step_seconds: 0.1,
            regenerate_after_seconds: 0.5,
        }
    }
}

/// Cover probing, blacklisting and ray bookkeeping.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CoverConfig {
    pub blacklist_seconds: f32,
    pub low_probe_height: f32,
    pub high_probe_height: f32,
    /// Probe rays are clamped to this length (2D) towards the target.
    pub probe_length: f32,
    pub max_eye_count: usize,
    /// Seconds of target velocity used to predict a second eye position.
    pub predict_target_seconds: f32,
    /// Eyes closer than this are merged.
    pub eye_merge_distance: f32,
    /// Distance from the cover location beyond which an agent "in cover" is
    /// treated as compromised.
    pub in_cover_radius: f32,
    /// Outstanding ray batches older than this are abandoned. `None` waits
    /// forever.
    pub ray_timeout_seconds: Option<f32>,
}

impl Default for CoverConfig {
    fn default() -> Self {
        Self {
            blacklist_seconds: 10.0,
            low_probe_height: 0.7,
            high_probe_height: 1.5,
            probe_length: 3.0,
            max_eye_count: 2,
            predict_target_seconds: 0.0,
            eye_merge_distance: 0.5,
            in_cover_radius: 1.5,
            ray_timeout_seconds: None,
        }
    }
}

impl AiConfig {
    /// Parse a YAML document. Missing keys fall back to defaults.
    #[cfg(feature = "yaml")]
    #[cfg_attr(docsrs, doc(cfg(feature = "yaml")))]
    pub fn from_yaml_str(src: &str) -> crate::error::Result<Self> {
        let config: AiConfig =
            serde_yaml::from_str(src).map_err(|e| AiError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        if self.pipe.active_goal_warn > self.pipe.active_goal_cap {
            return Err(AiError::InvalidConfig {
                field: "pipe.active_goal_warn",
                reason: format!(
                    "warn threshold {} exceeds cap {}",
                    self.pipe.active_goal_warn, self.pipe.active_goal_cap
                ),
            });
        }
        if self.nav.maneuver_min_seconds > self.nav.maneuver_max_seconds {
            return Err(AiError::InvalidConfig {
                field: "nav.maneuver_min_seconds",
                reason: "minimum maneuver time exceeds maximum".to_string(),
            });
        }
        if self.nav.prediction_step_seconds <= 0.0 {
            return Err(AiError::InvalidConfig {
                field: "nav.prediction_step_seconds",
                reason: "must be positive".to_string(),
            });
        }
        if let Some(timeout) = self.cover.ray_timeout_seconds {
            if timeout <= 0.0 {
                return Err(AiError::InvalidConfig {
                    field: "cover.ray_timeout_seconds",
                    reason: "must be positive when set".to_string(),
                });
            }
        }
        Ok(())
    }
}
