use std::rc::Rc;

use super::*;
use crate::{
    foundation::config::RenderConfig,
    gpu::context::TextureFormat,
    gpu::software::{GlCounters, SoftwareOptions, SoftwareSurface},
};

fn handle() -> (RenderHandle, Rc<GlCounters>) {
    let surface = SoftwareSurface::default();
    let counters = surface.counters();
    (RenderHandle::new(surface, &RenderConfig::default()), counters)
}

fn floats(values: &[f32], w: u32, h: u32) -> GrayF32Image {
    GrayF32Image::from_raw(w, h, values.to_vec()).unwrap()
}

#[test]
fn byte_float_conversion_rounds() {
    let f = floats(&[0.0, 0.5, 1.0, 0.25, -0.2, 1.7], 3, 2);
    assert_eq!(floats_to_bytes(&f).into_raw(), vec![0, 128, 255, 64, 0, 255]);
    let b = GrayImage::from_raw(2, 1, vec![0, 51]).unwrap();
    assert_eq!(bytes_to_floats(&b).into_raw(), vec![0.0, 0.2]);
}

#[test]
fn cpu_conversions_skip_the_gpu() {
    let bytes = GrayImage::from_raw(2, 1, vec![0, 255]).unwrap();
    let mut m = MaskContainer::from_bytes(bytes, true, None).unwrap();
    assert_eq!(m.get_as_float_buffer().unwrap().as_raw(), &vec![0.0, 1.0]);
    assert_eq!(m.kinds(), vec![MaskKind::ByteBuffer, MaskKind::FloatBuffer]);
}

#[test]
fn filter_follows_interpolation_flag() {
    let m = MaskContainer::from_floats(floats(&[0.0], 1, 1), false, None).unwrap();
    assert_eq!(m.filter(), TextureFilter::Nearest);
    let m = MaskContainer::from_floats(floats(&[0.0], 1, 1), true, None).unwrap();
    assert_eq!(m.filter(), TextureFilter::Linear);
}

#[test]
fn texture_upload_uses_negotiated_format() {
    let (gpu, counters) = handle();
    let mut m =
        MaskContainer::from_floats(floats(&[0.25; 4], 2, 2), true, Some(gpu.clone())).unwrap();
    m.get_as_texture().unwrap();
    assert!(m.owns_texture());
    let format = gpu.canvas().borrow_mut().mask_texture_format().unwrap();
    assert_eq!(format, TextureFormat::R32F);
    assert_eq!(counters.snapshot().uploads, 1);
}

#[test]
fn clone_of_cpu_only_mask_owns_nothing() {
    let (gpu, _) = handle();
    let m = MaskContainer::from_floats(floats(&[0.5; 4], 2, 2), true, Some(gpu.clone())).unwrap();
    let c = m.try_clone().unwrap();
    assert!(!c.owns_texture());
    assert_eq!(
        gpu.diagnostics().remaining(ContainerClass::Mask),
        crate::foundation::config::DEFAULT_LEAK_WARNING_THRESHOLD
    );
}

#[test]
fn zero_size_is_rejected() {
    let err = MaskContainer::new(MaskSource::Texture(TextureId(1)), 2, 0, true, None).unwrap_err();
    assert!(matches!(err, FrameError::Validation(_)));
}

#[test]
fn unsupported_float_formats_surface_as_error() {
    let surface =
        SoftwareSurface::new(SoftwareOptions::default().with_renderable_float_formats(vec![]));
    let gpu = RenderHandle::new(surface, &RenderConfig::default());
    let mut m = MaskContainer::from_floats(floats(&[0.5], 1, 1), true, Some(gpu)).unwrap();
    assert!(matches!(m.get_as_texture(), Err(FrameError::UnsupportedFormat(_))));
    assert!(!m.has_texture());
}
