use ai_core::{AiConfig, AiError};

#[test]
fn defaults_match_documented_tunables() {
    let config = AiConfig::default();

    assert_eq!(config.pipe.active_goal_warn, 10);
    assert_eq!(config.pipe.active_goal_cap, 100);
    assert_eq!(config.pipe.subpipe_warn_depth, 10);
    assert!(!config.pipe.legacy_branch_fallback);
    assert_eq!(config.nav.stuck_min_improvement, 0.05);
    assert_eq!(config.nav.stuck_timeout_seconds, 2.0);
    assert_eq!(config.nav.exact_positioning_distance, 2.5);
    assert_eq!(config.cover.blacklist_seconds, 10.0);
    assert_eq!(config.cover.ray_timeout_seconds, None);
    assert!(config.validate().is_ok());
}

#[test]
fn validate_rejects_inverted_thresholds() {
    let mut config = AiConfig::default();
    config.pipe.active_goal_warn = 200;

    let err = config.validate().unwrap_err();
    assert!(matches!(
        err,
        AiError::InvalidConfig {
            field: "pipe.active_goal_warn",
            ..
        }
    ));
}

#[test]
fn validate_rejects_non_positive_ray_timeout() {
    let mut config = AiConfig::default();
    config.cover.ray_timeout_seconds = Some(0.0);

    assert!(config.validate().is_err());
}

#[cfg(feature = "yaml")]
#[test]
fn yaml_overrides_only_given_keys() {
    let config = AiConfig::from_yaml_str(
        "nav:\n  stuck_timeout_seconds: 3.5\ncover:\n  ray_timeout_seconds: 1.0\n",
    )
    .unwrap();

    assert_eq!(config.nav.stuck_timeout_seconds, 3.5);
    assert_eq!(config.nav.stuck_min_improvement, 0.05);
    assert_eq!(config.cover.ray_timeout_seconds, Some(1.0));
    assert_eq!(config.pipe, ai_core::PipeConfig::default());
}

#[cfg(feature = "yaml")]
#[test]
fn yaml_parse_errors_are_typed() {
    let err = AiConfig::from_yaml_str("nav: [1, 2").unwrap_err();
    assert!(matches!(err, AiError::ConfigParse(_)));
}

#[cfg(feature = "serde")]
#[test]
fn config_roundtrips_through_json() {
    let mut config = AiConfig::default();
    config.nav.predictive_following = false;

    let json = serde_json::to_string(&config).unwrap();
    let back: AiConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, config);
}
