//! Draw and read-back sequences shared by the image and mask containers.

use crate::{
    foundation::error::{FrameError, FrameResult},
    gpu::context::{GlContext, ReadTarget, TexSource, TextureFilter, TextureFormat, TextureId},
    gpu::shader::ShaderContext,
    gpu::surface::{Bitmap, Canvas},
};

/// Allocate a `width`×`height` texture of `format` and fill it from `source`.
pub(crate) fn upload(
    gl: &mut dyn GlContext,
    shaders: &mut ShaderContext,
    format: TextureFormat,
    filter: TextureFilter,
    (width, height): (u32, u32),
    source: TexSource<'_>,
) -> FrameResult<TextureId> {
    let texture = shaders.create_texture(gl, Some(filter), None)?;
    gl.bind_texture(Some(texture));
    gl.tex_image_2d(format, width, height, source);
    gl.bind_texture(None);
    Ok(texture)
}

/// Draw `source` into a freshly allocated texture of the same size.
pub(crate) fn duplicate(
    gl: &mut dyn GlContext,
    shaders: &mut ShaderContext,
    source: TextureId,
    format: TextureFormat,
    filter: TextureFilter,
    size: (u32, u32),
) -> FrameResult<TextureId> {
    let target = upload(gl, shaders, format, filter, size, TexSource::Empty)?;
    if let Err(e) = draw_into(gl, shaders, source, target, size) {
        gl.delete_texture(target);
        return Err(e);
    }
    Ok(target)
}

fn draw_into(
    gl: &mut dyn GlContext,
    shaders: &mut ShaderContext,
    source: TextureId,
    target: TextureId,
    size: (u32, u32),
) -> FrameResult<()> {
    shaders.bind_framebuffer(gl, target)?;
    let drawn = shaders.run(gl, false, |gl| draw_quad(gl, source, size));
    shaders.unbind_framebuffer(gl)?;
    drawn
}

fn draw_quad(gl: &mut dyn GlContext, source: TextureId, (width, height): (u32, u32)) {
    gl.viewport(width, height);
    gl.active_texture(0);
    gl.bind_texture(Some(source));
    gl.draw_triangle_fan(0, 4);
    gl.bind_texture(None);
}

/// Read `texture` back as tightly packed RGBA8 rows.
pub(crate) fn read_rgba8(
    gl: &mut dyn GlContext,
    shaders: &mut ShaderContext,
    texture: TextureId,
    (width, height): (u32, u32),
) -> FrameResult<Vec<u8>> {
    let mut out = vec![0u8; width as usize * height as usize * 4];
    shaders.bind_framebuffer(gl, texture)?;
    gl.read_pixels(width, height, ReadTarget::Rgba8(&mut out));
    shaders.unbind_framebuffer(gl)?;
    Ok(out)
}

/// Read the red channel of a float `texture`, one value per pixel.
///
/// Falls back to an RGBA read when the platform cannot read a single float channel.
pub(crate) fn read_red_f32(
    canvas: &mut Canvas,
    shaders: &mut ShaderContext,
    texture: TextureId,
    (width, height): (u32, u32),
) -> FrameResult<Vec<f32>> {
    let px = width as usize * height as usize;
    let single = canvas.reads_single_float_channel();
    let gl = canvas.gl();
    shaders.bind_framebuffer(gl, texture)?;
    let out = if single {
        let mut out = vec![0.0f32; px];
        gl.read_pixels(width, height, ReadTarget::RedF32(&mut out));
        out
    } else {
        tracing::trace!(width, height, "reading mask through four float channels");
        let mut rgba = vec![0.0f32; px * 4];
        gl.read_pixels(width, height, ReadTarget::RgbaF32(&mut rgba));
        rgba.chunks_exact(4).map(|c| c[0]).collect()
    };
    shaders.unbind_framebuffer(gl)?;
    Ok(out)
}

/// Render `texture` onto the canvas resized to `size` and move the result into a bitmap.
///
/// The canvas gets its previous size back before this returns.
pub(crate) fn render_to_bitmap(
    canvas: &mut Canvas,
    shaders: &mut ShaderContext,
    texture: TextureId,
    size: (u32, u32),
) -> FrameResult<Bitmap> {
    if canvas.surface_mut().bitmap_transfer().is_none() {
        return Err(no_bitmap_transfer());
    }
    let mut canvas = canvas.resized(size.0, size.1);
    let gl = canvas.gl();
    shaders.unbind_framebuffer(gl)?;
    shaders.run(gl, true, |gl| {
        gl.clear([0.0; 4]);
        draw_quad(gl, texture, size);
    })?;
    canvas
        .surface_mut()
        .bitmap_transfer()
        .ok_or_else(no_bitmap_transfer)?
        .transfer_to_bitmap()
        .ok_or_else(|| FrameError::resource("surface produced no bitmap"))
}

pub(crate) fn no_bitmap_transfer() -> FrameError {
    FrameError::configuration("rendering surface cannot transfer to bitmaps")
}

#[cfg(test)]
#[path = "../../tests/unit/container/gpu_ops.rs"]
mod tests;
