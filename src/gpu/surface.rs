use std::ops::{Deref, DerefMut};

use crate::{
    foundation::config::ReadbackMode,
    foundation::error::{FrameError, FrameResult},
    gpu::context::{GlContext, TexSource, TextureFormat},
};

/// Opaque platform bitmap handle.
///
/// A bitmap is released through the [`BitmapTransfer`] of the surface that produced it. The
/// handle is deliberately not `Clone`: two copies would invite a double release.
#[derive(Debug, PartialEq, Eq)]
pub struct Bitmap {
    id: u64,
    width: u32,
    height: u32,
}

impl Bitmap {
    /// Wrap a platform bitmap id. Intended for [`BitmapTransfer`] implementations.
    pub fn from_raw(id: u64, width: u32, height: u32) -> Self {
        Self { id, width, height }
    }

    /// Platform id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }
}

/// Synchronous "snapshot the surface into a bitmap" capability.
pub trait BitmapTransfer {
    /// Move the surface's current contents into a new bitmap, leaving the surface blank.
    fn transfer_to_bitmap(&mut self) -> Option<Bitmap>;

    /// Release a bitmap previously produced by this surface.
    fn close_bitmap(&mut self, bitmap: Bitmap);
}

/// Canvas-like drawing surface that owns a rendering context.
pub trait Surface {
    /// Current pixel dimensions `(width, height)`.
    fn size(&self) -> (u32, u32);

    /// Resize the surface. Contents are discarded.
    fn set_size(&mut self, width: u32, height: u32);

    /// The rendering context bound to this surface.
    fn gl(&mut self) -> &mut dyn GlContext;

    /// Bitmap transfer, when the surface kind supports it.
    fn bitmap_transfer(&mut self) -> Option<&mut dyn BitmapTransfer> {
        None
    }
}

/// A surface plus the per-context state containers cache against it.
pub struct Canvas {
    surface: Box<dyn Surface>,
    readback: ReadbackMode,
    mask_format: Option<Option<TextureFormat>>,
}

impl std::fmt::Debug for Canvas {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Canvas")
            .field("size", &self.surface.size())
            .field("readback", &self.readback)
            .field("mask_format", &self.mask_format)
            .finish_non_exhaustive()
    }
}

impl Canvas {
    /// Wrap `surface` with the given mask read-back strategy.
    pub fn new(surface: impl Surface + 'static, readback: ReadbackMode) -> Self {
        Self::from_boxed(Box::new(surface), readback)
    }

    /// Wrap an already boxed surface.
    pub fn from_boxed(surface: Box<dyn Surface>, readback: ReadbackMode) -> Self {
        Self {
            surface,
            readback,
            mask_format: None,
        }
    }

    /// The surface's rendering context.
    pub fn gl(&mut self) -> &mut dyn GlContext {
        self.surface.gl()
    }

    /// The wrapped surface.
    pub fn surface_mut(&mut self) -> &mut dyn Surface {
        self.surface.as_mut()
    }

    /// Current surface dimensions.
    pub fn size(&self) -> (u32, u32) {
        self.surface.size()
    }

    /// Temporarily resize the surface; the previous size comes back when the guard drops.
    pub fn resized(&mut self, width: u32, height: u32) -> CanvasSizeGuard<'_> {
        let restore = self.surface.size();
        if restore != (width, height) {
            self.surface.set_size(width, height);
        }
        CanvasSizeGuard {
            canvas: self,
            restore,
        }
    }

    /// Whether mask read-backs can use a single float channel.
    pub fn reads_single_float_channel(&mut self) -> bool {
        match self.readback {
            ReadbackMode::SingleChannel => true,
            ReadbackMode::FourChannel => false,
            ReadbackMode::Auto => self.surface.gl().supports_red_float_readback(),
        }
    }

    /// Float precision used for mask textures, detected once per canvas.
    pub fn mask_texture_format(&mut self) -> FrameResult<TextureFormat> {
        let format = match self.mask_format {
            Some(cached) => cached,
            None => {
                let detected = detect_mask_format(self.surface.gl())?;
                tracing::debug!(format = ?detected, "detected mask texture precision");
                self.mask_format = Some(detected);
                detected
            }
        };
        format.ok_or_else(|| {
            FrameError::unsupported_format(
                "neither 32-bit nor 16-bit single-channel float textures are renderable",
            )
        })
    }
}

fn detect_mask_format(gl: &mut dyn GlContext) -> FrameResult<Option<TextureFormat>> {
    let color_float = gl.enable_extension("EXT_color_buffer_float");
    let float_linear = gl.enable_extension("OES_texture_float_linear");
    if color_float && float_linear && is_renderable(gl, TextureFormat::R32F)? {
        return Ok(Some(TextureFormat::R32F));
    }
    let color_half = gl.enable_extension("EXT_color_buffer_half_float") || color_float;
    if color_half && is_renderable(gl, TextureFormat::R16F)? {
        return Ok(Some(TextureFormat::R16F));
    }
    Ok(None)
}

fn is_renderable(gl: &mut dyn GlContext, format: TextureFormat) -> FrameResult<bool> {
    let texture = gl
        .create_texture()
        .ok_or_else(|| FrameError::resource("failed to create format test texture"))?;
    gl.bind_texture(Some(texture));
    gl.tex_image_2d(format, 1, 1, TexSource::Empty);
    let Some(framebuffer) = gl.create_framebuffer() else {
        gl.bind_texture(None);
        gl.delete_texture(texture);
        return Err(FrameError::resource("failed to create format test framebuffer"));
    };
    gl.bind_framebuffer(Some(framebuffer));
    gl.framebuffer_texture_2d(Some(texture));
    let complete = gl.framebuffer_complete();
    gl.bind_framebuffer(None);
    gl.delete_framebuffer(framebuffer);
    gl.bind_texture(None);
    gl.delete_texture(texture);
    Ok(complete)
}

/// Scoped size override returned by [`Canvas::resized`].
pub struct CanvasSizeGuard<'a> {
    canvas: &'a mut Canvas,
    restore: (u32, u32),
}

impl Deref for CanvasSizeGuard<'_> {
    type Target = Canvas;

    fn deref(&self) -> &Canvas {
        self.canvas
    }
}

impl DerefMut for CanvasSizeGuard<'_> {
    fn deref_mut(&mut self) -> &mut Canvas {
        self.canvas
    }
}

impl Drop for CanvasSizeGuard<'_> {
    fn drop(&mut self) {
        let (w, h) = self.restore;
        if self.canvas.surface.size() != (w, h) {
            self.canvas.surface.set_size(w, h);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/gpu/surface.rs"]
mod tests;
