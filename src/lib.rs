//! Dualframe holds a single frame of image or mask data in several interchangeable
//! representations and converts between them lazily.
//!
//! An [`ImageContainer`] carries RGBA pixels as a CPU buffer, a platform [`Bitmap`] or a GPU
//! texture. A [`MaskContainer`] carries a single-channel mask as bytes, floats or a float
//! texture. Whatever representation a container was built from, any other can be requested;
//! conversions run on demand and their results are cached for the container's lifetime.
//!
//! # Rendering
//!
//! GPU-side work goes through a [`RenderHandle`], which shares one [`Canvas`] (a [`Surface`]
//! plus the state cached against its context) and one [`ShaderContext`] among all containers
//! built against it. The rendering seam is the [`GlContext`] trait; [`SoftwareSurface`] is an
//! in-memory implementation usable headless and in tests.
//!
//! # Ownership
//!
//! - The representation a container is constructed from belongs to the producer and is never
//!   released by the container.
//! - Representations a container creates (conversions, clones) are released by
//!   [`ImageContainer::close`] / [`MaskContainer::close`].
//! - The shader context is owned by whoever created it and closed through
//!   [`RenderHandle::close_shaders`].
//!
//! Everything here is single-threaded: handles are `!Send` and a canvas serves one operation at
//! a time.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod container;
mod foundation;
mod gpu;

pub use container::handle::RenderHandle;
pub use container::image::{ImageContainer, ImageKind, ImageSource};
pub use container::mask::{GrayF32Image, MaskContainer, MaskKind, MaskSource};
pub use foundation::config::{DEFAULT_LEAK_WARNING_THRESHOLD, ReadbackMode, RenderConfig};
pub use foundation::diagnostics::{ContainerClass, LeakDiagnostics};
pub use foundation::error::{FrameError, FrameResult};
pub use gpu::context::{
    BufferId, ContextId, FramebufferId, GlContext, ProgramId, ReadTarget, ShaderId, ShaderKind,
    TexSource, TextureFilter, TextureFormat, TextureId, TextureWrap, UniformLocation,
    VertexArrayId,
};
pub use gpu::shader::{
    ALPHA_FROM_RED_FRAGMENT_SHADER, AlphaFromRedProgram, CopyProgram, DEFAULT_FRAGMENT_SHADER,
    DEFAULT_VERTEX_SHADER, ShaderContext, ShaderProgram,
};
pub use gpu::software::{
    DEFAULT_EXTENSIONS, GlCounters, GlCounts, SoftwareOptions, SoftwareSurface,
};
pub use gpu::surface::{Bitmap, BitmapTransfer, Canvas, CanvasSizeGuard, Surface};
