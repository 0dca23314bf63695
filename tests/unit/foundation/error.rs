use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        FrameError::configuration("x")
            .to_string()
            .contains("configuration error:")
    );
    assert!(
        FrameError::compile("x")
            .to_string()
            .contains("shader compile error:")
    );
    assert!(
        FrameError::link("x")
            .to_string()
            .contains("program link error:")
    );
    assert!(FrameError::resource("x").to_string().contains("resource error:"));
    assert!(
        FrameError::unsupported_format("x")
            .to_string()
            .contains("unsupported format:")
    );
    assert!(
        FrameError::context_mismatch("x")
            .to_string()
            .contains("context mismatch:")
    );
    assert!(
        FrameError::programmer("x")
            .to_string()
            .contains("programmer error:")
    );
    assert!(
        FrameError::validation("x")
            .to_string()
            .contains("validation error:")
    );
}

#[test]
fn compile_error_keeps_driver_log_verbatim() {
    let log = "ERROR: 0:3: 'vTex' : undeclared identifier";
    let err = FrameError::compile(log);
    assert!(err.to_string().ends_with(log));
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = FrameError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}
