use ai_core::{CoverConfig, ObjectState, Vec3};

/// Positions cover must hide the agent from: the threat itself plus where it
/// is heading, merged when close together.
pub fn gather_eyes(threat: Option<ObjectState>, config: &CoverConfig) -> Vec<Vec3> {
    let mut eyes = Vec::with_capacity(config.max_eye_count);
    let Some(threat) = threat else {
        return eyes;
    };
    push_unique(&mut eyes, threat.position, config);

    if config.predict_target_seconds > 0.001 {
        let predicted = threat.position + threat.velocity * config.predict_target_seconds;
        push_unique(&mut eyes, predicted, config);
    }
    eyes
}

fn push_unique(eyes: &mut Vec<Vec3>, eye: Vec3, config: &CoverConfig) {
    if eyes.len() >= config.max_eye_count {
        return;
    }
    if eyes
        .iter()
        .any(|e| e.distance(eye) < config.eye_merge_distance)
    {
        return;
    }
    eyes.push(eye);
}
