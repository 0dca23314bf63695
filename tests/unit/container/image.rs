use std::rc::Rc;

use image::Rgba;

use super::*;
use crate::{
    foundation::config::RenderConfig,
    gpu::software::{GlCounters, SoftwareOptions, SoftwareSurface},
};

fn handle_with(options: SoftwareOptions) -> (RenderHandle, Rc<GlCounters>) {
    let surface = SoftwareSurface::new(options);
    let counters = surface.counters();
    (RenderHandle::new(surface, &RenderConfig::default()), counters)
}

fn checker() -> RgbaImage {
    RgbaImage::from_fn(4, 2, |x, y| {
        if (x + y) % 2 == 0 {
            Rgba([255, 255, 255, 255])
        } else {
            Rgba([0, 0, 0, 255])
        }
    })
}

#[test]
fn rejects_zero_and_mismatched_dimensions() {
    let err = ImageContainer::new(ImageSource::PixelBuffer(checker()), 0, 2, None).unwrap_err();
    assert!(matches!(err, FrameError::Validation(_)));
    let err = ImageContainer::new(ImageSource::PixelBuffer(checker()), 2, 2, None).unwrap_err();
    assert!(matches!(err, FrameError::Validation(_)));
}

#[test]
fn source_representation_is_borrowed() {
    let (gpu, _) = handle_with(SoftwareOptions::default());
    let c = ImageContainer::from_texture(TextureId(42), 4, 2, gpu).unwrap();
    assert_eq!(c.texture, Some(Held::Borrowed(TextureId(42))));
    assert!(!c.owns_texture());
}

#[test]
fn conversions_are_owned_and_cached() {
    let (gpu, counters) = handle_with(SoftwareOptions::default());
    let mut c = ImageContainer::from_pixels(checker(), Some(gpu)).unwrap();
    let t = c.get_as_texture().unwrap();
    assert!(c.owns_texture());
    assert_eq!(c.get_as_texture().unwrap(), t);
    assert_eq!(counters.snapshot().uploads, 1);
}

#[test]
fn missing_representation_is_programmer_error() {
    let mut c = ImageContainer::from_pixels(checker(), None).unwrap();
    c.pixels = None;
    let (gpu, _) = handle_with(SoftwareOptions::default());
    c.gpu = Some(gpu);
    assert!(matches!(c.get_as_texture(), Err(FrameError::Programmer(_))));
}

#[test]
fn reentrant_canvas_use_is_rejected() {
    let (gpu, _) = handle_with(SoftwareOptions::default());
    let mut c = ImageContainer::from_pixels(checker(), Some(gpu.clone())).unwrap();
    let _busy = gpu.canvas().borrow_mut();
    assert!(matches!(c.get_as_texture(), Err(FrameError::Programmer(_))));
}

#[test]
fn failed_bitmap_clone_releases_copied_texture() {
    let (gpu, counters) = handle_with(SoftwareOptions::default().without_bitmap_transfer());
    let mut c = ImageContainer::from_pixels(checker(), Some(gpu)).unwrap();
    c.get_as_texture().unwrap();
    c.bitmap = Some(Held::Borrowed(Bitmap::from_raw(1, 4, 2)));
    let live = counters.snapshot().live_textures();
    assert!(matches!(c.try_clone(), Err(FrameError::Configuration(_))));
    assert_eq!(counters.snapshot().live_textures(), live);
}
