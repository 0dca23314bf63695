use super::*;
use crate::{
    foundation::config::ReadbackMode,
    gpu::software::{SoftwareOptions, SoftwareSurface},
};

fn setup(options: SoftwareOptions, readback: ReadbackMode) -> (Canvas, ShaderContext) {
    (Canvas::new(SoftwareSurface::new(options), readback), ShaderContext::new())
}

fn upload_rgba(
    gl: &mut dyn GlContext,
    shaders: &mut ShaderContext,
    size: (u32, u32),
    source: TexSource<'_>,
) -> TextureId {
    upload(gl, shaders, TextureFormat::Rgba8, TextureFilter::Linear, size, source).unwrap()
}

const PX: [u8; 16] = [
    255, 0, 0, 255, 0, 255, 0, 255, //
    0, 0, 255, 255, 10, 20, 30, 40,
];

#[test]
fn duplicate_preserves_pixels() {
    let (mut canvas, mut shaders) = setup(SoftwareOptions::default(), ReadbackMode::Auto);
    let gl = canvas.gl();
    let src = upload_rgba(gl, &mut shaders, (2, 2), TexSource::Rgba8(&PX));
    let dst = duplicate(
        gl,
        &mut shaders,
        src,
        TextureFormat::Rgba8,
        TextureFilter::Linear,
        (2, 2),
    )
    .unwrap();
    assert_ne!(src, dst);
    assert_eq!(read_rgba8(gl, &mut shaders, dst, (2, 2)).unwrap(), PX.to_vec());
}

#[test]
fn red_float_readback_uses_either_path() {
    for readback in [ReadbackMode::SingleChannel, ReadbackMode::FourChannel] {
        let (mut canvas, mut shaders) = setup(SoftwareOptions::default(), readback);
        let format = canvas.mask_texture_format().unwrap();
        let values = [0.0, 0.5, 1.0, 0.25];
        let t = upload(
            canvas.gl(),
            &mut shaders,
            format,
            TextureFilter::Nearest,
            (2, 2),
            TexSource::Float(&values),
        )
        .unwrap();
        let read = read_red_f32(&mut canvas, &mut shaders, t, (2, 2)).unwrap();
        assert_eq!(read, values.to_vec());
    }
}

#[test]
fn bitmap_keeps_top_row_first_and_restores_canvas() {
    let surface = SoftwareSurface::new(SoftwareOptions::default().with_size(7, 5));
    let mut canvas = Canvas::new(surface, ReadbackMode::Auto);
    let mut shaders = ShaderContext::new();
    let t = upload_rgba(canvas.gl(), &mut shaders, (2, 2), TexSource::Rgba8(&PX));
    let bitmap = render_to_bitmap(&mut canvas, &mut shaders, t, (2, 2)).unwrap();
    assert_eq!((bitmap.width(), bitmap.height()), (2, 2));
    assert_eq!(canvas.size(), (7, 5));

    // Uploading a bitmap copies its rows as stored, so reading them back shows bitmap order.
    let gl = canvas.gl();
    let copy = upload_rgba(gl, &mut shaders, (2, 2), TexSource::Bitmap(&bitmap));
    let pixels = read_rgba8(gl, &mut shaders, copy, (2, 2)).unwrap();
    assert_eq!(pixels[..8], PX[..8]);
    assert_eq!(pixels, PX.to_vec());
}

#[test]
fn bitmap_without_transfer_is_configuration_error() {
    let (mut canvas, mut shaders) = setup(
        SoftwareOptions::default().without_bitmap_transfer(),
        ReadbackMode::Auto,
    );
    let t = upload_rgba(canvas.gl(), &mut shaders, (1, 1), TexSource::Rgba8(&PX[..4]));
    let err = render_to_bitmap(&mut canvas, &mut shaders, t, (1, 1)).unwrap_err();
    assert!(matches!(err, FrameError::Configuration(_)));
}
