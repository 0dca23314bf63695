use super::*;
use crate::gpu::software::{SoftwareOptions, SoftwareSurface};

fn canvas(options: SoftwareOptions, readback: ReadbackMode) -> Canvas {
    Canvas::new(SoftwareSurface::new(options), readback)
}

#[test]
fn prefers_full_float_when_renderable() {
    let mut c = canvas(SoftwareOptions::default(), ReadbackMode::Auto);
    assert_eq!(c.mask_texture_format().unwrap(), TextureFormat::R32F);
}

#[test]
fn falls_back_to_half_float() {
    let options =
        SoftwareOptions::default().with_renderable_float_formats(vec![TextureFormat::R16F]);
    let mut c = canvas(options, ReadbackMode::Auto);
    assert_eq!(c.mask_texture_format().unwrap(), TextureFormat::R16F);
}

#[test]
fn half_float_without_linear_filtering_extension() {
    let options = SoftwareOptions::default().without_extension("OES_texture_float_linear");
    let mut c = canvas(options, ReadbackMode::Auto);
    assert_eq!(c.mask_texture_format().unwrap(), TextureFormat::R16F);
}

#[test]
fn no_float_format_is_unsupported_and_memoized() {
    let surface =
        SoftwareSurface::new(SoftwareOptions::default().with_renderable_float_formats(vec![]));
    let counters = surface.counters();
    let mut c = Canvas::new(surface, ReadbackMode::Auto);

    let err = c.mask_texture_format().unwrap_err();
    assert!(matches!(err, FrameError::UnsupportedFormat(_)));
    let created = counters.snapshot().textures_created;
    assert!(created > 0);

    assert!(c.mask_texture_format().is_err());
    assert_eq!(counters.snapshot().textures_created, created);
}

#[test]
fn format_detection_cleans_up_its_objects() {
    let surface = SoftwareSurface::default();
    let counters = surface.counters();
    let mut c = Canvas::new(surface, ReadbackMode::Auto);
    c.mask_texture_format().unwrap();
    let counts = counters.snapshot();
    assert_eq!(counts.live_textures(), 0);
    assert!(counts.framebuffers_deleted > 0);
}

#[test]
fn format_detection_reports_allocation_failure() {
    let mut c = canvas(SoftwareOptions::default().with_failing_allocations(), ReadbackMode::Auto);
    assert!(matches!(c.mask_texture_format(), Err(FrameError::Resource(_))));
}

#[test]
fn readback_mode_overrides_context_capability() {
    let options = SoftwareOptions::default().with_red_float_readback(false);
    assert!(!canvas(options.clone(), ReadbackMode::Auto).reads_single_float_channel());
    assert!(canvas(options, ReadbackMode::SingleChannel).reads_single_float_channel());
    let mut four = canvas(SoftwareOptions::default(), ReadbackMode::FourChannel);
    assert!(!four.reads_single_float_channel());
}

#[test]
fn resize_guard_restores_previous_size() {
    let mut c = canvas(SoftwareOptions::default().with_size(8, 4), ReadbackMode::Auto);
    {
        let guard = c.resized(2, 3);
        assert_eq!(guard.size(), (2, 3));
    }
    assert_eq!(c.size(), (8, 4));
}

#[test]
fn bitmap_accessors() {
    let b = Bitmap::from_raw(9, 4, 2);
    assert_eq!((b.id(), b.width(), b.height()), (9, 4, 2));
}
