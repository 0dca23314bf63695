use super::*;
use crate::gpu::context::{ReadTarget, TexSource, TextureFormat};
use crate::gpu::software::{SoftwareOptions, SoftwareSurface};

struct BrokenFragment;

impl ShaderProgram for BrokenFragment {
    fn fragment_shader(&self) -> &str {
        "precision highp float; varying vec2 vTex;"
    }
}

struct NoPosition;

impl ShaderProgram for NoPosition {
    fn vertex_shader(&self) -> &str {
        "attribute vec2 aVertex; attribute vec2 aTex; varying vec2 vTex; \
         void main() { vTex = aTex; }"
    }
}

#[test]
fn setup_is_idempotent() {
    let mut gl = SoftwareSurface::default();
    let mut ctx = ShaderContext::new();
    ctx.setup_shaders(&mut gl).unwrap();
    let program = ctx.gl_program;
    ctx.setup_shaders(&mut gl).unwrap();
    assert_eq!(ctx.gl_program, program);
    assert_eq!(ctx.bound_context(), Some(gl.context_id()));
}

#[test]
fn compile_failure_carries_driver_log() {
    let mut gl = SoftwareSurface::default();
    let mut ctx = ShaderContext::with_program(BrokenFragment);
    let err = ctx.setup_shaders(&mut gl).unwrap_err();
    match err {
        FrameError::Compile(log) => assert!(log.contains("main")),
        other => panic!("expected compile error, got {other:?}"),
    }
    assert!(ctx.gl_program.is_none());
}

#[test]
fn link_failure_carries_program_log() {
    let mut gl = SoftwareSurface::default();
    let mut ctx = ShaderContext::with_program(NoPosition);
    let err = ctx.setup_shaders(&mut gl).unwrap_err();
    match err {
        FrameError::Link(log) => assert!(log.contains("gl_Position")),
        other => panic!("expected link error, got {other:?}"),
    }
}

#[test]
fn buffers_are_created_once_per_orientation() {
    let mut gl = SoftwareSurface::default();
    let mut ctx = ShaderContext::new();
    ctx.create_buffers(&mut gl, false).unwrap();
    let upright = ctx.upright.map(|b| b.vertex_array);
    ctx.create_buffers(&mut gl, false).unwrap();
    assert_eq!(ctx.upright.map(|b| b.vertex_array), upright);
    assert!(ctx.flipped.is_none());
    ctx.create_buffers(&mut gl, true).unwrap();
    assert!(ctx.flipped.is_some());
}

#[test]
fn texture_defaults_to_linear_clamp() {
    let mut gl = SoftwareSurface::default();
    let mut ctx = ShaderContext::new();
    let t = ctx.create_texture(&mut gl, None, None).unwrap();
    assert!(gl.is_texture(t));
}

#[test]
fn run_draws_bound_texture_into_framebuffer() {
    let mut gl = SoftwareSurface::default();
    let mut ctx = ShaderContext::new();
    let src = ctx.create_texture(&mut gl, Some(TextureFilter::Nearest), None).unwrap();
    gl.bind_texture(Some(src));
    let px: Vec<u8> = (0..16).map(|v| v * 10).collect();
    gl.tex_image_2d(TextureFormat::Rgba8, 2, 2, TexSource::Rgba8(&px));
    let dst = ctx.create_texture(&mut gl, None, None).unwrap();
    gl.bind_texture(Some(dst));
    gl.tex_image_2d(TextureFormat::Rgba8, 2, 2, TexSource::Empty);
    gl.bind_texture(None);

    ctx.bind_framebuffer(&mut gl, dst).unwrap();
    ctx.run(&mut gl, false, |gl| {
        gl.viewport(2, 2);
        gl.active_texture(0);
        gl.bind_texture(Some(src));
        gl.draw_triangle_fan(0, 4);
    })
    .unwrap();
    let mut out = vec![0u8; 16];
    gl.read_pixels(2, 2, ReadTarget::Rgba8(&mut out));
    ctx.unbind_framebuffer(&mut gl).unwrap();
    assert_eq!(out, px);
}

#[test]
fn rejects_second_context() {
    let mut a = SoftwareSurface::default();
    let mut b = SoftwareSurface::default();
    let mut ctx = ShaderContext::new();
    ctx.setup_shaders(&mut a).unwrap();
    assert!(matches!(ctx.setup_shaders(&mut b), Err(FrameError::ContextMismatch(_))));
    assert!(matches!(ctx.close(&mut b), Err(FrameError::ContextMismatch(_))));
}

#[test]
fn close_releases_everything_and_blocks_reuse() {
    let mut gl = SoftwareSurface::new(SoftwareOptions::default());
    let counters = gl.counters();
    let mut ctx = ShaderContext::new();
    let t = ctx.create_texture(&mut gl, None, None).unwrap();
    ctx.bind_framebuffer(&mut gl, t).unwrap();
    ctx.create_buffers(&mut gl, false).unwrap();
    ctx.create_buffers(&mut gl, true).unwrap();
    ctx.close(&mut gl).unwrap();

    let c = counters.snapshot();
    assert_eq!(c.programs_deleted, 1);
    assert_eq!(c.shaders_deleted, 2);
    assert_eq!(c.framebuffers_deleted, 1);
    assert_eq!(c.vertex_arrays_deleted, 2);
    assert_eq!(c.buffers_deleted, 4);
    assert!(ctx.is_closed());
    assert!(matches!(ctx.setup_shaders(&mut gl), Err(FrameError::Resource(_))));
    ctx.close(&mut gl).unwrap();
}

#[test]
fn closing_unused_context_touches_nothing() {
    let mut gl = SoftwareSurface::default();
    let counters = gl.counters();
    let mut ctx = ShaderContext::new();
    ctx.close(&mut gl).unwrap();
    assert_eq!(counters.snapshot().deletions(), 0);
    assert!(ctx.is_closed());
}

#[test]
fn alpha_from_red_program_links_with_copy_vertex_stage() {
    let mut gl = SoftwareSurface::default();
    let mut ctx = ShaderContext::with_program(AlphaFromRedProgram);
    assert_eq!(ctx.vertex_shader(), DEFAULT_VERTEX_SHADER);
    assert_eq!(ctx.fragment_shader(), ALPHA_FROM_RED_FRAGMENT_SHADER);
    assert!(ctx.fragment_shader().contains("vec4(c.rgb, c.r)"));

    ctx.setup_shaders(&mut gl).unwrap();
    let program = ctx.gl_program.unwrap();
    assert!(gl.uniform_location(program, "inputTexture").is_some());

    let t = ctx.create_texture(&mut gl, None, None).unwrap();
    gl.bind_texture(Some(t));
    gl.tex_image_2d(TextureFormat::Rgba8, 1, 1, TexSource::Empty);
    gl.bind_texture(None);
    ctx.bind_framebuffer(&mut gl, t).unwrap();
    ctx.run(&mut gl, false, |gl| gl.viewport(1, 1)).unwrap();
    ctx.unbind_framebuffer(&mut gl).unwrap();
    ctx.close(&mut gl).unwrap();
}
