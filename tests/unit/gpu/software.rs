use super::*;

fn upload_rgba(s: &mut SoftwareSurface, w: u32, h: u32, px: &[u8]) -> TextureId {
    let t = s.create_texture().unwrap();
    s.bind_texture(Some(t));
    s.tex_image_2d(TextureFormat::Rgba8, w, h, TexSource::Rgba8(px));
    s.bind_texture(None);
    t
}

#[test]
fn context_ids_are_unique() {
    let a = SoftwareSurface::default();
    let b = SoftwareSurface::default();
    assert_ne!(a.context_id(), b.context_id());
}

#[test]
fn extensions_are_gated_by_options() {
    let mut s = SoftwareSurface::new(
        SoftwareOptions::default().without_extension("EXT_color_buffer_float"),
    );
    assert!(!s.enable_extension("EXT_color_buffer_float"));
    assert!(s.enable_extension("EXT_color_buffer_half_float"));
    assert!(!s.enable_extension("WEBGL_unknown"));
}

#[test]
fn framebuffer_readback_matches_upload() {
    let mut s = SoftwareSurface::default();
    let px: Vec<u8> = (0..16).collect();
    let t = upload_rgba(&mut s, 2, 2, &px);
    let fb = s.create_framebuffer().unwrap();
    s.bind_framebuffer(Some(fb));
    s.framebuffer_texture_2d(Some(t));
    assert!(s.framebuffer_complete());
    let mut out = vec![0u8; 16];
    s.read_pixels(2, 2, ReadTarget::Rgba8(&mut out));
    assert_eq!(out, px);
}

#[test]
fn float_attachment_needs_extension() {
    let mut s = SoftwareSurface::default();
    let t = s.create_texture().unwrap();
    s.bind_texture(Some(t));
    s.tex_image_2d(TextureFormat::R32F, 1, 1, TexSource::Empty);
    let fb = s.create_framebuffer().unwrap();
    s.bind_framebuffer(Some(fb));
    s.framebuffer_texture_2d(Some(t));
    assert!(!s.framebuffer_complete());
    s.enable_extension("EXT_color_buffer_float");
    assert!(s.framebuffer_complete());
}

#[test]
fn compile_without_main_fails_with_log() {
    let mut s = SoftwareSurface::default();
    let sh = s.create_shader(ShaderKind::Fragment).unwrap();
    s.shader_source(sh, "void nope() {}");
    s.compile_shader(sh);
    assert!(!s.shader_compile_status(sh));
    assert!(s.shader_info_log(sh).contains("main"));
}

#[test]
fn transfer_flips_rows_and_clears_surface() {
    let mut s = SoftwareSurface::new(SoftwareOptions::default().with_size(1, 2));
    s.clear([1.0, 0.0, 0.0, 1.0]);
    let b = s.transfer_to_bitmap().unwrap();
    assert_eq!(s.bitmap_pixels(&b).unwrap(), &[255, 0, 0, 255, 255, 0, 0, 255]);
    let mut out = vec![9u8; 8];
    s.read_pixels(1, 2, ReadTarget::Rgba8(&mut out));
    assert_eq!(out, vec![0; 8]);
    s.close_bitmap(b);
    let c = s.counters().snapshot();
    assert_eq!((c.bitmaps_transferred, c.bitmaps_closed), (1, 1));
}

#[test]
fn failing_allocations_return_no_handles() {
    let mut s = SoftwareSurface::new(SoftwareOptions::default().with_failing_allocations());
    assert!(s.create_texture().is_none());
    assert!(s.create_framebuffer().is_none());
    assert!(s.create_program().is_none());
    assert!(s.transfer_to_bitmap().is_none());
}

#[test]
fn bitmap_transfer_can_be_disabled() {
    let mut s = SoftwareSurface::new(SoftwareOptions::default().without_bitmap_transfer());
    assert!(s.bitmap_transfer().is_none());
}

#[test]
fn counters_track_texture_lifetime() {
    let mut s = SoftwareSurface::default();
    let t = upload_rgba(&mut s, 1, 1, &[1, 2, 3, 4]);
    assert!(s.is_texture(t));
    s.delete_texture(t);
    assert!(!s.is_texture(t));
    let c = s.counters().snapshot();
    assert_eq!((c.textures_created, c.textures_deleted, c.uploads), (1, 1, 1));
    assert_eq!(c.live_textures(), 0);
}
