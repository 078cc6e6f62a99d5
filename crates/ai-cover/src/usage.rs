use ai_core::{CoverConfig, Vec3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One side of a cover object at a given height.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CoverSpan {
    pub left_valid: bool,
    pub right_valid: bool,
    /// The threat can already see past this span.
    pub compromised: bool,
}

/// Geometry of the cover currently in use, as reported by the world.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CoverSurface {
    pub location: Vec3,
    /// Points away from the cover towards the protected side.
    pub normal: Vec3,
    pub left: Vec3,
    pub right: Vec3,
    pub low: Option<CoverSpan>,
    pub high: Option<CoverSpan>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ProbeSlot {
    LowLeft,
    LowCenter,
    LowRight,
    HighLeft,
    HighCenter,
    HighRight,
}

impl ProbeSlot {
    pub const ALL: [ProbeSlot; 6] = [
        ProbeSlot::LowLeft,
        ProbeSlot::LowCenter,
        ProbeSlot::LowRight,
        ProbeSlot::HighLeft,
        ProbeSlot::HighCenter,
        ProbeSlot::HighRight,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoverProbe {
    pub slot: ProbeSlot,
    pub origin: Vec3,
}

impl CoverSurface {
    /// Up to six ray origins along the cover edges, pulled inwards by
    /// `pass_radius`. Invalid edges produce no probe.
    pub fn probes(&self, pass_radius: f32, config: &CoverConfig) -> Vec<CoverProbe> {
        let mut out = Vec::with_capacity(ProbeSlot::ALL.len());
        let levels = [
            (
                self.low,
                config.low_probe_height,
                [ProbeSlot::LowLeft, ProbeSlot::LowCenter, ProbeSlot::LowRight],
            ),
            (
                self.high,
                config.high_probe_height,
                [ProbeSlot::HighLeft, ProbeSlot::HighCenter, ProbeSlot::HighRight],
            ),
        ];
        let (left, right) = self.inset_edges(pass_radius);

        for (span, height, [l, c, r]) in levels {
            let Some(span) = span else {
                continue;
            };
            let lift = Vec3::UNIT_Z * height;
            let (left, right) = (left + lift, right + lift);
            if span.left_valid {
                out.push(CoverProbe { slot: l, origin: left });
            }
            out.push(CoverProbe {
                slot: c,
                origin: left.lerp(right, 0.5),
            });
            if span.right_valid {
                out.push(CoverProbe { slot: r, origin: right });
            }
        }
        out
    }

    fn inset_edges(&self, inset: f32) -> (Vec3, Vec3) {
        let span = self.right - self.left;
        let width = span.length();
        if width <= 2.0 * inset {
            let mid = self.left.lerp(self.right, 0.5);
            return (mid, mid);
        }
        let along = span * (1.0 / width);
        (self.left + along * inset, self.right - along * inset)
    }
}

/// Which positions behind the current cover still block line of sight to the
/// attention target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CoverUsageInfo {
    pub low_compromised: bool,
    pub high_compromised: bool,
    pub low_left: bool,
    pub low_center: bool,
    pub low_right: bool,
    pub high_left: bool,
    pub high_center: bool,
    pub high_right: bool,
}

impl CoverUsageInfo {
    /// Result reported when there is nothing to probe against.
    pub fn no_cover() -> Self {
        Self::default()
    }

    pub fn any_usable(&self) -> bool {
        self.low_left
            || self.low_center
            || self.low_right
            || self.high_left
            || self.high_center
            || self.high_right
    }

    pub fn set(&mut self, slot: ProbeSlot, value: bool) {
        match slot {
            ProbeSlot::LowLeft => self.low_left = value,
            ProbeSlot::LowCenter => self.low_center = value,
            ProbeSlot::LowRight => self.low_right = value,
            ProbeSlot::HighLeft => self.high_left = value,
            ProbeSlot::HighCenter => self.high_center = value,
            ProbeSlot::HighRight => self.high_right = value,
        }
    }

    pub fn get(&self, slot: ProbeSlot) -> bool {
        match slot {
            ProbeSlot::LowLeft => self.low_left,
            ProbeSlot::LowCenter => self.low_center,
            ProbeSlot::LowRight => self.low_right,
            ProbeSlot::HighLeft => self.high_left,
            ProbeSlot::HighCenter => self.high_center,
            ProbeSlot::HighRight => self.high_right,
        }
    }
}
