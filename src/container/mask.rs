use image::{GrayImage, ImageBuffer, Luma};

use crate::{
    container::{gpu_ops, handle::RenderHandle, held::Held},
    foundation::diagnostics::ContainerClass,
    foundation::error::{FrameError, FrameResult},
    gpu::context::{TexSource, TextureFilter, TextureId},
};

/// Single-channel `f32` image, values nominally in `[0, 1]`.
pub type GrayF32Image = ImageBuffer<Luma<f32>, Vec<f32>>;

/// The representation a [`MaskContainer`] is constructed from.
#[derive(Debug)]
pub enum MaskSource {
    /// One byte per pixel, `0..=255` mapping to `[0, 1]`.
    ByteBuffer(GrayImage),
    /// One float per pixel.
    FloatBuffer(GrayF32Image),
    /// Single-channel float texture owned by the producer.
    Texture(TextureId),
}

/// Representation kinds a [`MaskContainer`] can hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MaskKind {
    /// [`MaskSource::ByteBuffer`] form.
    ByteBuffer,
    /// [`MaskSource::FloatBuffer`] form.
    FloatBuffer,
    /// GPU texture.
    Texture,
}

/// A single-channel frame (segmentation or confidence mask) held in several representations.
///
/// Conversions between the two CPU buffers never touch the GPU. Textures use the single-channel
/// float format the canvas supports, detected once per canvas.
#[derive(Debug)]
pub struct MaskContainer {
    width: u32,
    height: u32,
    interpolate_values: bool,
    bytes: Option<GrayImage>,
    floats: Option<GrayF32Image>,
    texture: Option<Held<TextureId>>,
    gpu: Option<RenderHandle>,
}

impl MaskContainer {
    /// Wrap `source` describing a `width`×`height` mask.
    ///
    /// With `interpolate_values` textures sample bilinearly, otherwise nearest.
    pub fn new(
        source: MaskSource,
        width: u32,
        height: u32,
        interpolate_values: bool,
        gpu: Option<RenderHandle>,
    ) -> FrameResult<Self> {
        if width == 0 || height == 0 {
            return Err(FrameError::validation(format!(
                "mask dimensions must be positive, got {width}x{height}"
            )));
        }
        let mut container = Self {
            width,
            height,
            interpolate_values,
            bytes: None,
            floats: None,
            texture: None,
            gpu,
        };
        match source {
            MaskSource::ByteBuffer(bytes) => {
                check_size("byte buffer", bytes.dimensions(), (width, height))?;
                container.bytes = Some(bytes);
            }
            MaskSource::FloatBuffer(floats) => {
                check_size("float buffer", floats.dimensions(), (width, height))?;
                container.floats = Some(floats);
            }
            MaskSource::Texture(texture) => container.texture = Some(Held::Borrowed(texture)),
        }
        Ok(container)
    }

    /// Wrap a byte mask, taking the dimensions from it.
    pub fn from_bytes(
        bytes: GrayImage,
        interpolate_values: bool,
        gpu: Option<RenderHandle>,
    ) -> FrameResult<Self> {
        let (w, h) = bytes.dimensions();
        Self::new(MaskSource::ByteBuffer(bytes), w, h, interpolate_values, gpu)
    }

    /// Wrap a float mask, taking the dimensions from it.
    pub fn from_floats(
        floats: GrayF32Image,
        interpolate_values: bool,
        gpu: Option<RenderHandle>,
    ) -> FrameResult<Self> {
        let (w, h) = floats.dimensions();
        Self::new(MaskSource::FloatBuffer(floats), w, h, interpolate_values, gpu)
    }

    /// Wrap a producer-owned single-channel float texture.
    pub fn from_texture(
        texture: TextureId,
        width: u32,
        height: u32,
        interpolate_values: bool,
        gpu: RenderHandle,
    ) -> FrameResult<Self> {
        Self::new(MaskSource::Texture(texture), width, height, interpolate_values, Some(gpu))
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Whether textures sample bilinearly.
    pub fn interpolate_values(&self) -> bool {
        self.interpolate_values
    }

    /// Whether a byte buffer is cached.
    pub fn has_byte_buffer(&self) -> bool {
        self.bytes.is_some()
    }

    /// Whether a float buffer is cached.
    pub fn has_float_buffer(&self) -> bool {
        self.floats.is_some()
    }

    /// Whether a texture is held, owned or not.
    pub fn has_texture(&self) -> bool {
        self.texture.is_some()
    }

    /// Held representations, in byte, float, texture order.
    pub fn kinds(&self) -> Vec<MaskKind> {
        [
            (self.has_byte_buffer(), MaskKind::ByteBuffer),
            (self.has_float_buffer(), MaskKind::FloatBuffer),
            (self.has_texture(), MaskKind::Texture),
        ]
        .into_iter()
        .filter_map(|(held, kind)| held.then_some(kind))
        .collect()
    }

    /// Whether `close` will release the texture.
    pub fn owns_texture(&self) -> bool {
        self.texture.as_ref().is_some_and(Held::is_owned)
    }

    fn gpu(&self) -> FrameResult<&RenderHandle> {
        self.gpu
            .as_ref()
            .ok_or_else(|| FrameError::configuration("no rendering canvas configured for mask"))
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn filter(&self) -> TextureFilter {
        if self.interpolate_values {
            TextureFilter::Linear
        } else {
            TextureFilter::Nearest
        }
    }

    /// The mask as bytes, `round(v * 255)` clamped to `0..=255`.
    #[tracing::instrument(level = "trace", skip(self), fields(w = self.width, h = self.height))]
    pub fn get_as_byte_buffer(&mut self) -> FrameResult<&GrayImage> {
        if self.bytes.is_none() {
            let bytes = floats_to_bytes(self.get_as_float_buffer()?);
            self.bytes = Some(bytes);
        }
        self.bytes
            .as_ref()
            .ok_or_else(|| FrameError::programmer("byte buffer missing after conversion"))
    }

    /// The mask as floats, from bytes (`b / 255`) or by reading the texture back.
    #[tracing::instrument(level = "trace", skip(self), fields(w = self.width, h = self.height))]
    pub fn get_as_float_buffer(&mut self) -> FrameResult<&GrayF32Image> {
        if self.floats.is_none() {
            let floats = match (&self.bytes, &self.texture) {
                (Some(bytes), _) => bytes_to_floats(bytes),
                (None, Some(texture)) => {
                    let texture = *texture.get();
                    let size = self.size();
                    let data = self.gpu()?.with_gpu(|canvas, shaders| {
                        gpu_ops::read_red_f32(canvas, shaders, texture, size)
                    })?;
                    tracing::debug!(w = size.0, h = size.1, "mask read back from texture");
                    GrayF32Image::from_raw(size.0, size.1, data).ok_or_else(|| {
                        FrameError::programmer("read-back size does not match mask")
                    })?
                }
                (None, None) => {
                    return Err(FrameError::programmer("mask container holds no representation"));
                }
            };
            self.floats = Some(floats);
        }
        self.floats
            .as_ref()
            .ok_or_else(|| FrameError::programmer("float buffer missing after conversion"))
    }

    /// The mask as a single-channel float texture.
    ///
    /// Fails with [`FrameError::UnsupportedFormat`] when the canvas renders no float format.
    #[tracing::instrument(level = "trace", skip(self), fields(w = self.width, h = self.height))]
    pub fn get_as_texture(&mut self) -> FrameResult<TextureId> {
        if let Some(texture) = &self.texture {
            return Ok(*texture.get());
        }
        let gpu = self.gpu()?.clone();
        let format = gpu.with_canvas(|canvas| canvas.mask_texture_format())?;
        let (size, filter) = (self.size(), self.filter());
        let floats = self.get_as_float_buffer()?;
        let texture = gpu.with_gpu(|canvas, shaders| {
            gpu_ops::upload(
                canvas.gl(),
                shaders,
                format,
                filter,
                size,
                TexSource::Float(floats.as_raw()),
            )
        })?;
        tracing::debug!(texture = texture.0, ?format, "mask uploaded to texture");
        self.texture = Some(Held::Owned(texture));
        Ok(texture)
    }

    /// Deep copy owning every representation it holds. Textures are copied by drawing.
    pub fn try_clone(&self) -> FrameResult<MaskContainer> {
        let texture = match &self.texture {
            Some(source) => {
                let source = *source.get();
                let gpu = self.gpu()?;
                let format = gpu.with_canvas(|canvas| canvas.mask_texture_format())?;
                let (size, filter) = (self.size(), self.filter());
                Some(gpu.with_gpu(|canvas, shaders| {
                    gpu_ops::duplicate(canvas.gl(), shaders, source, format, filter, size)
                })?)
            }
            None => None,
        };
        let clone = MaskContainer {
            width: self.width,
            height: self.height,
            interpolate_values: self.interpolate_values,
            bytes: self.bytes.clone(),
            floats: self.floats.clone(),
            texture: texture.map(Held::Owned),
            gpu: self.gpu.clone(),
        };
        if let Some(gpu) = &clone.gpu
            && clone.owns_texture()
        {
            gpu.diagnostics()
                .owning_instance_created(ContainerClass::Mask);
        }
        Ok(clone)
    }

    /// Release the texture if this container created it.
    pub fn close(self) -> FrameResult<()> {
        let Some(texture) = self.texture.and_then(Held::into_owned) else {
            return Ok(());
        };
        let gpu = self
            .gpu
            .ok_or_else(|| FrameError::programmer("owned texture without a canvas"))?;
        gpu.with_canvas(|canvas| {
            canvas.gl().delete_texture(texture);
            Ok(())
        })
    }
}

fn bytes_to_floats(bytes: &GrayImage) -> GrayF32Image {
    ImageBuffer::from_fn(bytes.width(), bytes.height(), |x, y| {
        Luma([f32::from(bytes.get_pixel(x, y)[0]) / 255.0])
    })
}

fn floats_to_bytes(floats: &GrayF32Image) -> GrayImage {
    ImageBuffer::from_fn(floats.width(), floats.height(), |x, y| {
        Luma([(floats.get_pixel(x, y)[0].clamp(0.0, 1.0) * 255.0).round() as u8])
    })
}

fn check_size(what: &str, actual: (u32, u32), declared: (u32, u32)) -> FrameResult<()> {
    if actual != declared {
        return Err(FrameError::validation(format!(
            "{what} is {}x{} but the mask is declared {}x{}",
            actual.0, actual.1, declared.0, declared.1
        )));
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/container/mask.rs"]
mod tests;
