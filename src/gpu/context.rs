//! The rendering-context seam.
//!
//! [`GlContext`] is the narrow slice of a GLES3/WebGL2-style API that containers and shader
//! contexts need. Handles are plain copyable ids; a method that allocates returns `None` when
//! the driver hands back an invalid object, and callers turn that into
//! [`crate::FrameError::Resource`].

use crate::gpu::surface::Bitmap;

/// Identity of one rendering context. Two contexts with different ids never share objects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ContextId(pub u64);

macro_rules! gl_handle {
    ($(#[$m:meta])* $name:ident) => {
        $(#[$m])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub struct $name(pub u32);
    };
}

gl_handle!(
    /// 2D texture object.
    TextureId
);
gl_handle!(
    /// Framebuffer object.
    FramebufferId
);
gl_handle!(
    /// Linked or unlinked program object.
    ProgramId
);
gl_handle!(
    /// Shader stage object.
    ShaderId
);
gl_handle!(
    /// Array buffer object.
    BufferId
);
gl_handle!(
    /// Vertex array object.
    VertexArrayId
);
gl_handle!(
    /// Uniform location within a program.
    UniformLocation
);

/// Shader stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShaderKind {
    /// Vertex stage.
    Vertex,
    /// Fragment stage.
    Fragment,
}

/// Minification and magnification filter applied to a texture.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TextureFilter {
    /// Bilinear sampling.
    #[default]
    Linear,
    /// Nearest-texel sampling.
    Nearest,
}

/// Wrap mode applied on both texture axes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TextureWrap {
    /// Clamp coordinates to the edge texel.
    #[default]
    ClampToEdge,
    /// Tile the texture.
    Repeat,
    /// Tile the texture, mirroring every other repetition.
    MirroredRepeat,
}

/// Internal storage format of a texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// Four 8-bit normalized channels.
    Rgba8,
    /// One 32-bit float channel.
    R32F,
    /// One 16-bit float channel.
    R16F,
}

impl TextureFormat {
    /// Whether the format stores floating-point texels.
    pub fn is_float(self) -> bool {
        matches!(self, Self::R32F | Self::R16F)
    }
}

/// Pixel data handed to [`GlContext::tex_image_2d`].
#[derive(Clone, Copy, Debug)]
pub enum TexSource<'a> {
    /// Allocate storage without uploading.
    Empty,
    /// Tightly packed RGBA8 rows.
    Rgba8(&'a [u8]),
    /// One float per texel, tightly packed rows.
    Float(&'a [f32]),
    /// Upload from a platform bitmap.
    Bitmap(&'a Bitmap),
}

/// Destination of a pixel read-back from the bound framebuffer.
#[derive(Debug)]
pub enum ReadTarget<'a> {
    /// RGBA / UNSIGNED_BYTE.
    Rgba8(&'a mut [u8]),
    /// RED / FLOAT, one value per pixel.
    RedF32(&'a mut [f32]),
    /// RGBA / FLOAT, four values per pixel.
    RgbaF32(&'a mut [f32]),
}

/// GLES3/WebGL2-style rendering context.
///
/// All state is global to the context: bound texture, framebuffer, program and vertex array
/// persist across calls until rebound. Implementations are single-threaded.
pub trait GlContext {
    /// Identity used to detect objects crossing context boundaries.
    fn context_id(&self) -> ContextId;

    /// Enable a named extension, returning whether it is available.
    fn enable_extension(&mut self, name: &str) -> bool;

    /// Whether RED/FLOAT read-back of single-channel float attachments works on this platform.
    fn supports_red_float_readback(&self) -> bool {
        true
    }

    /// Allocate a texture object.
    fn create_texture(&mut self) -> Option<TextureId>;
    /// Release a texture object.
    fn delete_texture(&mut self, texture: TextureId);
    /// Select the texture unit subsequent [`GlContext::bind_texture`] calls target.
    fn active_texture(&mut self, unit: u32);
    /// Bind a texture on the active unit; `None` unbinds.
    fn bind_texture(&mut self, texture: Option<TextureId>);
    /// Set min and mag filter of the bound texture.
    fn set_texture_filter(&mut self, filter: TextureFilter);
    /// Set S and T wrap of the bound texture.
    fn set_texture_wrap(&mut self, wrap: TextureWrap);
    /// (Re)define storage of the bound texture.
    fn tex_image_2d(
        &mut self,
        format: TextureFormat,
        width: u32,
        height: u32,
        source: TexSource<'_>,
    );

    /// Allocate a framebuffer object.
    fn create_framebuffer(&mut self) -> Option<FramebufferId>;
    /// Release a framebuffer object.
    fn delete_framebuffer(&mut self, framebuffer: FramebufferId);
    /// Bind a framebuffer; `None` binds the default (surface) framebuffer.
    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>);
    /// Retarget color attachment 0 of the bound framebuffer.
    fn framebuffer_texture_2d(&mut self, texture: Option<TextureId>);
    /// Whether the bound framebuffer is complete and renderable.
    fn framebuffer_complete(&self) -> bool;

    /// Allocate a shader object of the given stage.
    fn create_shader(&mut self, kind: ShaderKind) -> Option<ShaderId>;
    /// Replace the shader's source text.
    fn shader_source(&mut self, shader: ShaderId, source: &str);
    /// Compile the shader's current source.
    fn compile_shader(&mut self, shader: ShaderId);
    /// Whether the last compile succeeded.
    fn shader_compile_status(&self, shader: ShaderId) -> bool;
    /// Driver log of the last compile.
    fn shader_info_log(&self, shader: ShaderId) -> String;
    /// Release a shader object.
    fn delete_shader(&mut self, shader: ShaderId);

    /// Allocate a program object.
    fn create_program(&mut self) -> Option<ProgramId>;
    /// Attach a compiled stage to a program.
    fn attach_shader(&mut self, program: ProgramId, shader: ShaderId);
    /// Link the program's attached stages.
    fn link_program(&mut self, program: ProgramId);
    /// Whether the last link succeeded.
    fn program_link_status(&self, program: ProgramId) -> bool;
    /// Driver log of the last link.
    fn program_info_log(&self, program: ProgramId) -> String;
    /// Make a program current for draws.
    fn use_program(&mut self, program: Option<ProgramId>);
    /// Location of an active vertex attribute.
    fn attrib_location(&mut self, program: ProgramId, name: &str) -> Option<u32>;
    /// Location of an active uniform.
    fn uniform_location(&mut self, program: ProgramId, name: &str) -> Option<UniformLocation>;
    /// Set an integer uniform of the current program.
    fn uniform_1i(&mut self, location: UniformLocation, value: i32);
    /// Release a program object.
    fn delete_program(&mut self, program: ProgramId);

    /// Allocate a vertex array object.
    fn create_vertex_array(&mut self) -> Option<VertexArrayId>;
    /// Bind a vertex array; `None` binds the default one.
    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayId>);
    /// Release a vertex array object.
    fn delete_vertex_array(&mut self, vertex_array: VertexArrayId);
    /// Allocate an array buffer.
    fn create_buffer(&mut self) -> Option<BufferId>;
    /// Bind the array buffer target.
    fn bind_array_buffer(&mut self, buffer: Option<BufferId>);
    /// Upload static float data to the bound array buffer.
    fn array_buffer_data(&mut self, data: &[f32]);
    /// Point `location` at the bound array buffer, `components` tightly packed floats per vertex.
    fn vertex_attrib_pointer(&mut self, location: u32, components: u32);
    /// Enable the attribute at `location` on the bound vertex array.
    fn enable_vertex_attrib_array(&mut self, location: u32);
    /// Disable the attribute at `location`.
    fn disable_vertex_attrib_array(&mut self, location: u32);
    /// Release an array buffer.
    fn delete_buffer(&mut self, buffer: BufferId);

    /// Set the draw viewport, anchored at the origin.
    fn viewport(&mut self, width: u32, height: u32);
    /// Clear the bound framebuffer's color to `rgba`.
    fn clear(&mut self, rgba: [f32; 4]);
    /// Draw `count` vertices starting at `first` as a triangle fan.
    fn draw_triangle_fan(&mut self, first: u32, count: u32);
    /// Read a `width`×`height` block at the origin of the bound framebuffer.
    fn read_pixels(&mut self, width: u32, height: u32, target: ReadTarget<'_>);
}
