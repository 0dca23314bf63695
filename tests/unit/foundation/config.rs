use super::*;
use crate::FrameError;

#[test]
fn empty_object_takes_defaults() {
    let cfg = RenderConfig::from_json_str("{}").unwrap();
    assert_eq!(cfg, RenderConfig::default());
    assert_eq!(cfg.leak_warning_threshold, 250);
    assert_eq!(cfg.mask_readback, ReadbackMode::Auto);
}

#[test]
fn readback_mode_uses_snake_case() {
    let json = r#"{ "mask_readback": "four_channel", "leak_warning_threshold": 3 }"#;
    let cfg = RenderConfig::from_json_str(json).unwrap();
    assert_eq!(cfg.mask_readback, ReadbackMode::FourChannel);
    assert_eq!(cfg.leak_warning_threshold, 3);
}

#[test]
fn json_roundtrip_preserves_fields() {
    let cfg = RenderConfig {
        leak_warning_threshold: 7,
        mask_readback: ReadbackMode::SingleChannel,
    };
    let s = cfg.to_json_string().unwrap();
    assert_eq!(RenderConfig::from_json_str(&s).unwrap(), cfg);
}

#[test]
fn unknown_fields_are_rejected() {
    let err = RenderConfig::from_json_str(r#"{ "leak_threshold": 3 }"#).unwrap_err();
    assert!(matches!(err, FrameError::Other(_)));
    assert!(err.to_string().contains("render config"));
}
