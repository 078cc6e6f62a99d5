use ai_core::{Vec3, WorldView};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::NavigationService;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Stance {
    #[default]
    Stand,
    Crouch,
    Prone,
    Relaxed,
    Stealth,
}

impl Stance {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "stand" => Some(Stance::Stand),
            "crouch" => Some(Stance::Crouch),
            "prone" => Some(Stance::Prone),
            "relaxed" => Some(Stance::Relaxed),
            "stealth" => Some(Stance::Stealth),
            _ => None,
        }
    }
}

/// Answer of the body/animation provider.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BodyInfo {
    pub eye_pos: Vec3,
    pub eye_dir: Vec3,
    pub body_dir: Vec3,
    pub move_dir: Vec3,
    pub stance: Stance,
}

pub trait NavWorldView: WorldView {
    fn position(&self, agent: Self::Agent) -> Option<Vec3>;

    fn velocity(&self, _agent: Self::Agent) -> Vec3 {
        Vec3::ZERO
    }

    /// Body state for `stance`, or for the current stance when `None`.
    fn query_body_info(&self, agent: Self::Agent, stance: Option<Stance>) -> Option<BodyInfo>;

    fn is_vehicle_driver_fallen(&self, _agent: Self::Agent) -> bool {
        false
    }

    fn is_grounded(&self, _agent: Self::Agent) -> bool {
        true
    }
}

pub trait NavWorldMut: NavWorldView {
    fn navigation(&mut self) -> &mut dyn NavigationService;
}
