use crate::{
    foundation::error::{FrameError, FrameResult},
    gpu::context::{
        BufferId, ContextId, FramebufferId, GlContext, ProgramId, ShaderId, ShaderKind,
        TextureFilter, TextureId, TextureWrap, VertexArrayId,
    },
};

/// Vertex stage of the copy program. Attribute names are part of the draw contract.
pub const DEFAULT_VERTEX_SHADER: &str = "
attribute vec2 aVertex;
attribute vec2 aTex;
varying vec2 vTex;
void main(void) {
  gl_Position = vec4(aVertex, 0.0, 1.0);
  vTex = aTex;
}
";

/// Fragment stage of the copy program: samples `inputTexture` unchanged.
pub const DEFAULT_FRAGMENT_SHADER: &str = "
precision highp float;
varying vec2 vTex;
uniform sampler2D inputTexture;
void main() {
  gl_FragColor = texture2D(inputTexture, vTex);
}
";

const QUAD_VERTICES: [f32; 8] = [-1.0, -1.0, -1.0, 1.0, 1.0, 1.0, 1.0, -1.0];
const QUAD_TEX_UPRIGHT: [f32; 8] = [0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 0.0];
const QUAD_TEX_FLIPPED: [f32; 8] = [0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 1.0, 1.0];

/// The program-specific half of a [`ShaderContext`].
///
/// Implementors supply shader sources and per-draw uniform setup; the context owns compilation,
/// buffers and the framebuffer.
pub trait ShaderProgram {
    /// Vertex stage source. Must declare `aVertex` and `aTex`.
    fn vertex_shader(&self) -> &str {
        DEFAULT_VERTEX_SHADER
    }

    /// Fragment stage source.
    fn fragment_shader(&self) -> &str {
        DEFAULT_FRAGMENT_SHADER
    }

    /// Called on every [`ShaderContext::run`] after the program is bound.
    fn setup_uniforms(
        &mut self,
        _gl: &mut dyn GlContext,
        _program: ProgramId,
    ) -> FrameResult<()> {
        Ok(())
    }
}

/// Draws the bound texture through unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct CopyProgram;

impl ShaderProgram for CopyProgram {
    fn setup_uniforms(&mut self, gl: &mut dyn GlContext, program: ProgramId) -> FrameResult<()> {
        bind_input_texture(gl, program);
        Ok(())
    }
}

/// Fragment stage of [`AlphaFromRedProgram`]: keeps RGB and writes red into alpha.
pub const ALPHA_FROM_RED_FRAGMENT_SHADER: &str = "
precision highp float;
varying vec2 vTex;
uniform sampler2D inputTexture;
void main() {
  vec4 c = texture2D(inputTexture, vTex);
  gl_FragColor = vec4(c.rgb, c.r);
}
";

/// Draws the bound texture with its red channel copied into alpha.
///
/// Suited to single-channel masks that are composited as alpha. Running it over an RGBA image
/// replaces the image's alpha.
#[derive(Clone, Copy, Debug, Default)]
pub struct AlphaFromRedProgram;

impl ShaderProgram for AlphaFromRedProgram {
    fn fragment_shader(&self) -> &str {
        ALPHA_FROM_RED_FRAGMENT_SHADER
    }

    fn setup_uniforms(&mut self, gl: &mut dyn GlContext, program: ProgramId) -> FrameResult<()> {
        bind_input_texture(gl, program);
        Ok(())
    }
}

fn bind_input_texture(gl: &mut dyn GlContext, program: ProgramId) {
    if let Some(loc) = gl.uniform_location(program, "inputTexture") {
        gl.uniform_1i(loc, 0);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BindState {
    Unbound,
    Bound(ContextId),
    Closed,
}

#[derive(Clone, Copy, Debug)]
struct AttribLocations {
    vertex: u32,
    tex: u32,
}

#[derive(Clone, Copy, Debug)]
struct QuadBuffers {
    vertex_array: VertexArrayId,
    vertices: BufferId,
    tex_coords: BufferId,
}

impl QuadBuffers {
    fn create(
        gl: &mut dyn GlContext,
        attribs: AttribLocations,
        flip_vertically: bool,
    ) -> FrameResult<Self> {
        let vertex_array = gl
            .create_vertex_array()
            .ok_or_else(|| FrameError::resource("failed to create vertex array"))?;
        gl.bind_vertex_array(Some(vertex_array));
        let vertices = upload_attribute(gl, attribs.vertex, &QUAD_VERTICES);
        let tex = if flip_vertically {
            &QUAD_TEX_FLIPPED
        } else {
            &QUAD_TEX_UPRIGHT
        };
        let tex_coords = upload_attribute(gl, attribs.tex, tex);
        gl.bind_array_buffer(None);
        gl.bind_vertex_array(None);

        match (vertices, tex_coords) {
            (Some(vertices), Some(tex_coords)) => Ok(Self {
                vertex_array,
                vertices,
                tex_coords,
            }),
            (vertices, tex_coords) => {
                for b in [vertices, tex_coords].into_iter().flatten() {
                    gl.delete_buffer(b);
                }
                gl.delete_vertex_array(vertex_array);
                Err(FrameError::resource("failed to create vertex buffer"))
            }
        }
    }

    fn bind(&self, gl: &mut dyn GlContext) {
        gl.bind_vertex_array(Some(self.vertex_array));
    }

    fn unbind(&self, gl: &mut dyn GlContext) {
        gl.bind_vertex_array(None);
    }

    fn close(self, gl: &mut dyn GlContext) {
        gl.delete_vertex_array(self.vertex_array);
        gl.delete_buffer(self.vertices);
        gl.delete_buffer(self.tex_coords);
    }
}

fn upload_attribute(gl: &mut dyn GlContext, location: u32, data: &[f32]) -> Option<BufferId> {
    let buffer = gl.create_buffer()?;
    gl.bind_array_buffer(Some(buffer));
    gl.array_buffer_data(data);
    gl.vertex_attrib_pointer(location, 2);
    gl.enable_vertex_attrib_array(location);
    Some(buffer)
}

/// One compiled GPU program with its quad buffers and scratch framebuffer.
///
/// A shader context is shared by reference among many containers and owned by none of them;
/// whoever constructed it calls [`ShaderContext::close`]. It binds to the first rendering
/// context it is used with and rejects any other.
pub struct ShaderContext {
    program: Box<dyn ShaderProgram>,
    state: BindState,
    gl_program: Option<ProgramId>,
    vertex_shader: Option<ShaderId>,
    fragment_shader: Option<ShaderId>,
    attribs: Option<AttribLocations>,
    upright: Option<QuadBuffers>,
    flipped: Option<QuadBuffers>,
    framebuffer: Option<FramebufferId>,
}

impl std::fmt::Debug for ShaderContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShaderContext")
            .field("state", &self.state)
            .field("program", &self.gl_program)
            .field("framebuffer", &self.framebuffer)
            .finish_non_exhaustive()
    }
}

impl Default for ShaderContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ShaderContext {
    /// A context running [`CopyProgram`].
    pub fn new() -> Self {
        Self::with_program(CopyProgram)
    }

    /// A context running a custom program.
    pub fn with_program(program: impl ShaderProgram + 'static) -> Self {
        Self {
            program: Box::new(program),
            state: BindState::Unbound,
            gl_program: None,
            vertex_shader: None,
            fragment_shader: None,
            attribs: None,
            upright: None,
            flipped: None,
            framebuffer: None,
        }
    }

    /// Vertex stage source of the program.
    pub fn vertex_shader(&self) -> &str {
        self.program.vertex_shader()
    }

    /// Fragment stage source of the program.
    pub fn fragment_shader(&self) -> &str {
        self.program.fragment_shader()
    }

    /// The rendering context this shader context is bound to, if any.
    pub fn bound_context(&self) -> Option<ContextId> {
        match self.state {
            BindState::Bound(id) => Some(id),
            _ => None,
        }
    }

    /// Whether [`ShaderContext::close`] has run.
    pub fn is_closed(&self) -> bool {
        self.state == BindState::Closed
    }

    fn bind_to(&mut self, gl: &dyn GlContext) -> FrameResult<()> {
        let id = gl.context_id();
        match self.state {
            BindState::Unbound => {
                tracing::trace!(context = id.0, "shader context bound");
                self.state = BindState::Bound(id);
                Ok(())
            }
            BindState::Bound(bound) if bound == id => Ok(()),
            BindState::Bound(bound) => Err(FrameError::context_mismatch(format!(
                "shader context is bound to context {} but was used with context {}",
                bound.0, id.0
            ))),
            BindState::Closed => Err(FrameError::resource("shader context is closed")),
        }
    }

    /// Compile `source` as a `kind` stage and attach it to the program.
    pub fn compile_shader(
        &mut self,
        gl: &mut dyn GlContext,
        source: &str,
        kind: ShaderKind,
    ) -> FrameResult<ShaderId> {
        self.bind_to(gl)?;
        let program = self
            .gl_program
            .ok_or_else(|| FrameError::programmer("no program to attach the shader to"))?;
        let shader = gl
            .create_shader(kind)
            .ok_or_else(|| FrameError::resource(format!("failed to create {kind:?} shader")))?;
        gl.shader_source(shader, source);
        gl.compile_shader(shader);
        if !gl.shader_compile_status(shader) {
            let log = gl.shader_info_log(shader);
            gl.delete_shader(shader);
            return Err(FrameError::compile(log));
        }
        gl.attach_shader(program, shader);
        Ok(shader)
    }

    /// Create, compile and link the program, caching attribute locations. Idempotent.
    pub fn setup_shaders(&mut self, gl: &mut dyn GlContext) -> FrameResult<()> {
        self.bind_to(gl)?;
        if self.attribs.is_some() {
            return Ok(());
        }
        let result = self.build_program(gl);
        if result.is_err() {
            self.release_program(gl);
        }
        result
    }

    fn build_program(&mut self, gl: &mut dyn GlContext) -> FrameResult<()> {
        let program = gl
            .create_program()
            .ok_or_else(|| FrameError::resource("failed to create program"))?;
        self.gl_program = Some(program);

        let vertex_src = self.program.vertex_shader().to_string();
        let fragment_src = self.program.fragment_shader().to_string();
        self.vertex_shader = Some(self.compile_shader(gl, &vertex_src, ShaderKind::Vertex)?);
        self.fragment_shader = Some(self.compile_shader(gl, &fragment_src, ShaderKind::Fragment)?);

        gl.link_program(program);
        if !gl.program_link_status(program) {
            return Err(FrameError::link(gl.program_info_log(program)));
        }
        gl.use_program(Some(program));

        let locate = |gl: &mut dyn GlContext, name: &str| {
            gl.attrib_location(program, name)
                .ok_or_else(|| FrameError::link(format!("attribute {name} is not active")))
        };
        self.attribs = Some(AttribLocations {
            vertex: locate(gl, "aVertex")?,
            tex: locate(gl, "aTex")?,
        });
        tracing::trace!(program = program.0, "shader program linked");
        Ok(())
    }

    fn release_program(&mut self, gl: &mut dyn GlContext) {
        if let Some(p) = self.gl_program.take() {
            gl.delete_program(p);
        }
        for s in [self.vertex_shader.take(), self.fragment_shader.take()]
            .into_iter()
            .flatten()
        {
            gl.delete_shader(s);
        }
        self.attribs = None;
    }

    /// Build the quad buffers for `flip_vertically`, at most once per orientation.
    pub fn create_buffers(
        &mut self,
        gl: &mut dyn GlContext,
        flip_vertically: bool,
    ) -> FrameResult<()> {
        self.setup_shaders(gl)?;
        let attribs = self
            .attribs
            .ok_or_else(|| FrameError::programmer("attribute locations missing after setup"))?;
        let slot = if flip_vertically {
            &mut self.flipped
        } else {
            &mut self.upright
        };
        if slot.is_none() {
            *slot = Some(QuadBuffers::create(gl, attribs, flip_vertically)?);
        }
        Ok(())
    }

    /// Allocate an empty 2D texture. Defaults to LINEAR filtering and CLAMP_TO_EDGE wrapping.
    pub fn create_texture(
        &mut self,
        gl: &mut dyn GlContext,
        filter: Option<TextureFilter>,
        wrap: Option<TextureWrap>,
    ) -> FrameResult<TextureId> {
        self.bind_to(gl)?;
        let texture = gl
            .create_texture()
            .ok_or_else(|| FrameError::resource("failed to create texture"))?;
        gl.bind_texture(Some(texture));
        gl.set_texture_filter(filter.unwrap_or_default());
        gl.set_texture_wrap(wrap.unwrap_or_default());
        gl.bind_texture(None);
        Ok(texture)
    }

    /// Bind the scratch framebuffer with `texture` as its color attachment.
    pub fn bind_framebuffer(
        &mut self,
        gl: &mut dyn GlContext,
        texture: TextureId,
    ) -> FrameResult<()> {
        self.bind_to(gl)?;
        let framebuffer = match self.framebuffer {
            Some(fb) => fb,
            None => {
                let fb = gl
                    .create_framebuffer()
                    .ok_or_else(|| FrameError::resource("failed to create framebuffer"))?;
                self.framebuffer = Some(fb);
                fb
            }
        };
        gl.bind_framebuffer(Some(framebuffer));
        gl.framebuffer_texture_2d(Some(texture));
        Ok(())
    }

    /// Restore the default framebuffer.
    pub fn unbind_framebuffer(&mut self, gl: &mut dyn GlContext) -> FrameResult<()> {
        self.bind_to(gl)?;
        gl.bind_framebuffer(None);
        Ok(())
    }

    /// Bind the program and the quad for `flip_vertically`, run `f`, then unbind the quad.
    pub fn run<R>(
        &mut self,
        gl: &mut dyn GlContext,
        flip_vertically: bool,
        f: impl FnOnce(&mut dyn GlContext) -> R,
    ) -> FrameResult<R> {
        self.create_buffers(gl, flip_vertically)?;
        let program = self
            .gl_program
            .ok_or_else(|| FrameError::programmer("program missing after setup"))?;
        let buffers = match flip_vertically {
            true => self.flipped,
            false => self.upright,
        };
        let buffers =
            buffers.ok_or_else(|| FrameError::programmer("quad buffers missing after setup"))?;

        gl.use_program(Some(program));
        buffers.bind(gl);
        if let Err(e) = self.program.setup_uniforms(gl, program) {
            buffers.unbind(gl);
            return Err(e);
        }
        let out = f(gl);
        buffers.unbind(gl);
        Ok(out)
    }

    /// Delete every GPU object this context created. Further use fails.
    pub fn close(&mut self, gl: &mut dyn GlContext) -> FrameResult<()> {
        match self.state {
            BindState::Closed => return Ok(()),
            BindState::Unbound => {
                self.state = BindState::Closed;
                return Ok(());
            }
            BindState::Bound(_) => self.bind_to(gl)?,
        }
        self.release_program(gl);
        if let Some(fb) = self.framebuffer.take() {
            gl.delete_framebuffer(fb);
        }
        for buffers in [self.upright.take(), self.flipped.take()].into_iter().flatten() {
            buffers.close(gl);
        }
        self.state = BindState::Closed;
        tracing::trace!("shader context closed");
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/gpu/shader.rs"]
mod tests;
