use image::RgbaImage;

use crate::{
    container::{gpu_ops, handle::RenderHandle, held::Held},
    foundation::diagnostics::ContainerClass,
    foundation::error::{FrameError, FrameResult},
    gpu::context::{TexSource, TextureFilter, TextureFormat, TextureId},
    gpu::surface::Bitmap,
};

/// The representation an [`ImageContainer`] is constructed from.
#[derive(Debug)]
pub enum ImageSource {
    /// RGBA8 pixels, row-major from the top-left corner.
    PixelBuffer(RgbaImage),
    /// Platform bitmap owned by the producer.
    Bitmap(Bitmap),
    /// GPU texture owned by the producer.
    Texture(TextureId),
}

/// Representation kinds an [`ImageContainer`] can hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImageKind {
    /// RGBA8 pixel buffer.
    PixelBuffer,
    /// Platform bitmap.
    Bitmap,
    /// GPU texture.
    Texture,
}

/// A frame of RGBA image data held in whichever representations have been requested so far.
///
/// Representations are produced lazily and cached; all of them depict the same pixels. Only
/// representations this container created are released by [`ImageContainer::close`]; the one
/// passed in at construction stays with the producer.
#[derive(Debug)]
pub struct ImageContainer {
    width: u32,
    height: u32,
    pixels: Option<RgbaImage>,
    bitmap: Option<Held<Bitmap>>,
    texture: Option<Held<TextureId>>,
    gpu: Option<RenderHandle>,
}

impl ImageContainer {
    /// Wrap `source` describing a `width`×`height` frame.
    ///
    /// `gpu` is required for any conversion touching a texture or bitmap.
    pub fn new(
        source: ImageSource,
        width: u32,
        height: u32,
        gpu: Option<RenderHandle>,
    ) -> FrameResult<Self> {
        if width == 0 || height == 0 {
            return Err(FrameError::validation(format!(
                "image dimensions must be positive, got {width}x{height}"
            )));
        }
        let mut container = Self {
            width,
            height,
            pixels: None,
            bitmap: None,
            texture: None,
            gpu,
        };
        match source {
            ImageSource::PixelBuffer(pixels) => {
                check_size("pixel buffer", pixels.dimensions(), (width, height))?;
                container.pixels = Some(pixels);
            }
            ImageSource::Bitmap(bitmap) => {
                check_size("bitmap", (bitmap.width(), bitmap.height()), (width, height))?;
                container.bitmap = Some(Held::Borrowed(bitmap));
            }
            ImageSource::Texture(texture) => container.texture = Some(Held::Borrowed(texture)),
        }
        Ok(container)
    }

    /// Wrap a pixel buffer, taking the dimensions from it.
    pub fn from_pixels(pixels: RgbaImage, gpu: Option<RenderHandle>) -> FrameResult<Self> {
        let (width, height) = pixels.dimensions();
        Self::new(ImageSource::PixelBuffer(pixels), width, height, gpu)
    }

    /// Wrap a producer-owned bitmap, taking the dimensions from it.
    pub fn from_bitmap(bitmap: Bitmap, gpu: RenderHandle) -> FrameResult<Self> {
        let (width, height) = (bitmap.width(), bitmap.height());
        Self::new(ImageSource::Bitmap(bitmap), width, height, Some(gpu))
    }

    /// Wrap a producer-owned texture.
    pub fn from_texture(
        texture: TextureId,
        width: u32,
        height: u32,
        gpu: RenderHandle,
    ) -> FrameResult<Self> {
        Self::new(ImageSource::Texture(texture), width, height, Some(gpu))
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Whether a pixel buffer is cached.
    pub fn has_pixel_buffer(&self) -> bool {
        self.pixels.is_some()
    }

    /// Whether a bitmap is held, owned or not.
    pub fn has_bitmap(&self) -> bool {
        self.bitmap.is_some()
    }

    /// Whether a texture is held, owned or not.
    pub fn has_texture(&self) -> bool {
        self.texture.is_some()
    }

    /// Held representations, in pixel buffer, bitmap, texture order.
    pub fn kinds(&self) -> Vec<ImageKind> {
        [
            (self.has_pixel_buffer(), ImageKind::PixelBuffer),
            (self.has_bitmap(), ImageKind::Bitmap),
            (self.has_texture(), ImageKind::Texture),
        ]
        .into_iter()
        .filter_map(|(held, kind)| held.then_some(kind))
        .collect()
    }

    /// Whether `close` will release the bitmap.
    pub fn owns_bitmap(&self) -> bool {
        self.bitmap.as_ref().is_some_and(Held::is_owned)
    }

    /// Whether `close` will release the texture.
    pub fn owns_texture(&self) -> bool {
        self.texture.as_ref().is_some_and(Held::is_owned)
    }

    fn gpu(&self) -> FrameResult<&RenderHandle> {
        self.gpu
            .as_ref()
            .ok_or_else(|| FrameError::configuration("no rendering canvas configured for image"))
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// The frame as RGBA8 pixels, reading the texture back if needed.
    #[tracing::instrument(level = "trace", skip(self), fields(w = self.width, h = self.height))]
    pub fn get_as_pixel_buffer(&mut self) -> FrameResult<&RgbaImage> {
        if self.pixels.is_none() {
            let gpu = self.gpu()?.clone();
            let texture = self.get_as_texture()?;
            let size = self.size();
            let data = gpu.with_gpu(|canvas, shaders| {
                gpu_ops::read_rgba8(canvas.gl(), shaders, texture, size)
            })?;
            let pixels = RgbaImage::from_raw(size.0, size.1, data)
                .ok_or_else(|| FrameError::programmer("read-back size does not match image"))?;
            tracing::debug!(w = size.0, h = size.1, "image read back from texture");
            self.pixels = Some(pixels);
        }
        self.pixels
            .as_ref()
            .ok_or_else(|| FrameError::programmer("pixel buffer missing after conversion"))
    }

    /// The frame as a platform bitmap, rendering through the canvas if needed.
    #[tracing::instrument(level = "trace", skip(self), fields(w = self.width, h = self.height))]
    pub fn get_as_bitmap(&mut self) -> FrameResult<&Bitmap> {
        if self.bitmap.is_none() {
            let gpu = self.gpu()?.clone();
            if !gpu.with_canvas(|canvas| Ok(canvas.surface_mut().bitmap_transfer().is_some()))? {
                return Err(gpu_ops::no_bitmap_transfer());
            }
            let texture = self.get_as_texture()?;
            let size = self.size();
            let bitmap = gpu.with_gpu(|canvas, shaders| {
                gpu_ops::render_to_bitmap(canvas, shaders, texture, size)
            })?;
            tracing::debug!(bitmap = bitmap.id(), "image rendered to bitmap");
            self.bitmap = Some(Held::Owned(bitmap));
        }
        self.bitmap
            .as_ref()
            .map(Held::get)
            .ok_or_else(|| FrameError::programmer("bitmap missing after conversion"))
    }

    /// The frame as a texture, uploading pixels or a bitmap if needed.
    #[tracing::instrument(level = "trace", skip(self), fields(w = self.width, h = self.height))]
    pub fn get_as_texture(&mut self) -> FrameResult<TextureId> {
        if let Some(texture) = &self.texture {
            return Ok(*texture.get());
        }
        let gpu = self.gpu()?.clone();
        let size = self.size();
        let source = match (&self.pixels, &self.bitmap) {
            (Some(pixels), _) => TexSource::Rgba8(pixels.as_raw()),
            (None, Some(bitmap)) => TexSource::Bitmap(bitmap.get()),
            (None, None) => {
                return Err(FrameError::programmer("image container holds no representation"));
            }
        };
        let texture = gpu.with_gpu(|canvas, shaders| {
            gpu_ops::upload(
                canvas.gl(),
                shaders,
                TextureFormat::Rgba8,
                TextureFilter::Linear,
                size,
                source,
            )
        })?;
        tracing::debug!(texture = texture.0, "image uploaded to texture");
        self.texture = Some(Held::Owned(texture));
        Ok(texture)
    }

    /// Deep copy owning every representation it holds.
    ///
    /// Pixel buffers are copied by value and textures by drawing. A bitmap is re-rendered from
    /// the copied texture, converting this container to a texture first if it had none.
    pub fn try_clone(&mut self) -> FrameResult<ImageContainer> {
        let size = self.size();
        let pixels = self.pixels.clone();
        let mut texture = None;
        let mut bitmap = None;

        if self.texture.is_some() || self.bitmap.is_some() {
            let gpu = self.gpu()?.clone();
            if let Some(source) = self.texture.as_ref().map(|t| *t.get()) {
                texture = Some(gpu.with_gpu(|canvas, shaders| {
                    gpu_ops::duplicate(
                        canvas.gl(),
                        shaders,
                        source,
                        TextureFormat::Rgba8,
                        TextureFilter::Linear,
                        size,
                    )
                })?);
            }
            if self.bitmap.is_some() {
                let rendered = match texture {
                    Some(t) => Ok(t),
                    None => self.get_as_texture(),
                }
                .and_then(|source| {
                    gpu.with_gpu(|canvas, shaders| {
                        gpu_ops::render_to_bitmap(canvas, shaders, source, size)
                    })
                });
                match rendered {
                    Ok(b) => bitmap = Some(b),
                    Err(e) => {
                        if let Some(t) = texture {
                            gpu.with_canvas(|canvas| {
                                canvas.gl().delete_texture(t);
                                Ok(())
                            })?;
                        }
                        return Err(e);
                    }
                }
            }
        }

        let clone = ImageContainer {
            width: self.width,
            height: self.height,
            pixels,
            bitmap: bitmap.map(Held::Owned),
            texture: texture.map(Held::Owned),
            gpu: self.gpu.clone(),
        };
        if let Some(gpu) = &clone.gpu
            && (clone.owns_texture() || clone.owns_bitmap())
        {
            gpu.diagnostics()
                .owning_instance_created(ContainerClass::Image);
        }
        Ok(clone)
    }

    /// Release every representation this container created.
    ///
    /// Producer-owned representations are left untouched.
    pub fn close(self) -> FrameResult<()> {
        let bitmap = self.bitmap.and_then(Held::into_owned);
        let texture = self.texture.and_then(Held::into_owned);
        if bitmap.is_none() && texture.is_none() {
            return Ok(());
        }
        let gpu = self
            .gpu
            .ok_or_else(|| FrameError::programmer("owned GPU resources without a canvas"))?;
        gpu.with_canvas(|canvas| {
            if let Some(bitmap) = bitmap {
                canvas
                    .surface_mut()
                    .bitmap_transfer()
                    .ok_or_else(gpu_ops::no_bitmap_transfer)?
                    .close_bitmap(bitmap);
            }
            if let Some(texture) = texture {
                canvas.gl().delete_texture(texture);
            }
            Ok(())
        })
    }
}

fn check_size(what: &str, actual: (u32, u32), declared: (u32, u32)) -> FrameResult<()> {
    if actual != declared {
        return Err(FrameError::validation(format!(
            "{what} is {}x{} but the image is declared {}x{}",
            actual.0, actual.1, declared.0, declared.1
        )));
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/container/image.rs"]
mod tests;
