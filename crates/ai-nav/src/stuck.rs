use ai_core::NavConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Progressing,
    Stuck,
}

/// Tracks the best distance-to-end seen so far and flags a lack of
/// improvement.
///
/// After reporting `Stuck` the window re-arms, so a permanently stalled agent
/// is reported once per timeout rather than every tick.
#[derive(Debug, Clone, PartialEq)]
pub struct StuckDetector {
    min_improvement: f32,
    timeout_seconds: f64,
    best: Option<(f32, f64)>,
}

impl StuckDetector {
    pub fn new(min_improvement: f32, timeout_seconds: f32) -> Self {
        Self {
            min_improvement,
            timeout_seconds: f64::from(timeout_seconds),
            best: None,
        }
    }

    pub fn from_config(config: &NavConfig) -> Self {
        Self::new(config.stuck_min_improvement, config.stuck_timeout_seconds)
    }

    pub fn update(&mut self, distance_to_end: f32, now_seconds: f64) -> Progress {
        let Some((best, since)) = self.best else {
            self.best = Some((distance_to_end, now_seconds));
            return Progress::Progressing;
        };

        if best - distance_to_end >= self.min_improvement {
            self.best = Some((distance_to_end, now_seconds));
            return Progress::Progressing;
        }

        if now_seconds - since > self.timeout_seconds {
            self.best = Some((best, now_seconds));
            return Progress::Stuck;
        }

        Progress::Progressing
    }

    pub fn best_distance(&self) -> Option<f32> {
        self.best.map(|(d, _)| d)
    }

    pub fn reset(&mut self) {
        self.best = None;
    }
}

impl Default for StuckDetector {
    fn default() -> Self {
        Self::from_config(&NavConfig::default())
    }
}
