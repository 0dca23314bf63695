//! In-memory reference implementation of [`Surface`], [`GlContext`] and [`BitmapTransfer`].
//!
//! The software surface keeps every object the GL seam can create in plain collections and
//! interprets draws as a textured-quad copy: each covered pixel samples the texture bound to the
//! program's first sampler at the texture coordinate interpolated from the `aTex` attribute.
//! That is exactly what the built-in copy program does on real hardware, which makes the
//! backend suitable for headless pipelines and for deterministic tests. Custom fragment logic is
//! not interpreted. Half floats are stored at full precision.

use std::{
    cell::Cell,
    collections::{HashMap, HashSet},
    rc::Rc,
    sync::atomic::{AtomicU64, Ordering},
};

use crate::gpu::{
    context::{
        BufferId, ContextId, FramebufferId, GlContext, ProgramId, ReadTarget, ShaderId,
        ShaderKind, TexSource, TextureFilter, TextureFormat, TextureId, TextureWrap,
        UniformLocation, VertexArrayId,
    },
    surface::{Bitmap, BitmapTransfer, Surface},
};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Extensions a default software surface advertises.
pub const DEFAULT_EXTENSIONS: [&str; 3] = [
    "EXT_color_buffer_float",
    "OES_texture_float_linear",
    "EXT_color_buffer_half_float",
];

/// Capabilities and fault injection for a [`SoftwareSurface`].
#[derive(Clone, Debug)]
pub struct SoftwareOptions {
    /// Initial surface width.
    pub width: u32,
    /// Initial surface height.
    pub height: u32,
    /// Extensions [`GlContext::enable_extension`] reports as available.
    pub extensions: Vec<String>,
    /// Float formats that can be framebuffer color attachments (given their extension).
    pub renderable_float_formats: Vec<TextureFormat>,
    /// Whether RED/FLOAT read-back is reported as supported.
    pub red_float_readback: bool,
    /// Whether the surface exposes [`BitmapTransfer`].
    pub bitmap_transfer: bool,
    /// Make every object allocation return no handle.
    pub fail_allocations: bool,
}

impl Default for SoftwareOptions {
    fn default() -> Self {
        Self {
            width: 300,
            height: 150,
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            renderable_float_formats: vec![TextureFormat::R32F, TextureFormat::R16F],
            red_float_readback: true,
            bitmap_transfer: true,
            fail_allocations: false,
        }
    }
}

impl SoftwareOptions {
    /// Set the initial surface size.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Stop advertising extension `name`.
    pub fn without_extension(mut self, name: &str) -> Self {
        self.extensions.retain(|e| e != name);
        self
    }

    /// Replace the set of renderable float formats.
    pub fn with_renderable_float_formats(mut self, formats: Vec<TextureFormat>) -> Self {
        self.renderable_float_formats = formats;
        self
    }

    /// Report RED/FLOAT read-back support as `supported`.
    pub fn with_red_float_readback(mut self, supported: bool) -> Self {
        self.red_float_readback = supported;
        self
    }

    /// Build a surface without bitmap transfer.
    pub fn without_bitmap_transfer(mut self) -> Self {
        self.bitmap_transfer = false;
        self
    }

    /// Make all allocations fail.
    pub fn with_failing_allocations(mut self) -> Self {
        self.fail_allocations = true;
        self
    }
}

/// Snapshot of [`GlCounters`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GlCounts {
    /// Successful texture allocations.
    pub textures_created: u32,
    /// Texture deletions of live textures.
    pub textures_deleted: u32,
    /// Framebuffer deletions.
    pub framebuffers_deleted: u32,
    /// Program deletions.
    pub programs_deleted: u32,
    /// Shader deletions.
    pub shaders_deleted: u32,
    /// Array buffer deletions.
    pub buffers_deleted: u32,
    /// Vertex array deletions.
    pub vertex_arrays_deleted: u32,
    /// Bitmaps produced by [`BitmapTransfer::transfer_to_bitmap`].
    pub bitmaps_transferred: u32,
    /// Bitmaps released through [`BitmapTransfer::close_bitmap`].
    pub bitmaps_closed: u32,
    /// `tex_image_2d` calls that carried pixel data.
    pub uploads: u32,
    /// Draw calls, including ones that drew nothing.
    pub draws: u32,
    /// `read_pixels` calls.
    pub readbacks: u32,
}

impl GlCounts {
    /// Total release calls of any kind, bitmaps included.
    pub fn deletions(&self) -> u32 {
        self.textures_deleted
            + self.framebuffers_deleted
            + self.programs_deleted
            + self.shaders_deleted
            + self.buffers_deleted
            + self.vertex_arrays_deleted
            + self.bitmaps_closed
    }

    /// Textures created and not yet deleted.
    pub fn live_textures(&self) -> u32 {
        self.textures_created.saturating_sub(self.textures_deleted)
    }
}

/// Call statistics shared between a [`SoftwareSurface`] and its observers.
#[derive(Debug, Default)]
pub struct GlCounters {
    counts: Cell<GlCounts>,
}

impl GlCounters {
    /// Current counts.
    pub fn snapshot(&self) -> GlCounts {
        self.counts.get()
    }

    fn bump(&self, f: impl FnOnce(&mut GlCounts)) {
        let mut c = self.counts.get();
        f(&mut c);
        self.counts.set(c);
    }
}

#[derive(Clone, Debug)]
enum Texels {
    Rgba8(Vec<u8>),
    Float(Vec<f32>),
}

#[derive(Clone, Debug)]
struct Texture {
    format: Option<TextureFormat>,
    width: u32,
    height: u32,
    texels: Texels,
    filter: TextureFilter,
    wrap: TextureWrap,
}

impl Texture {
    fn undefined() -> Self {
        Self {
            format: None,
            width: 0,
            height: 0,
            texels: Texels::Rgba8(Vec::new()),
            filter: TextureFilter::Linear,
            wrap: TextureWrap::ClampToEdge,
        }
    }

    fn rgba8(width: u32, height: u32) -> Self {
        let mut t = Self::undefined();
        t.define(TextureFormat::Rgba8, width, height);
        t
    }

    fn define(&mut self, format: TextureFormat, width: u32, height: u32) {
        let px = width as usize * height as usize;
        self.format = Some(format);
        self.width = width;
        self.height = height;
        self.texels = match format {
            TextureFormat::Rgba8 => Texels::Rgba8(vec![0; px * 4]),
            TextureFormat::R32F | TextureFormat::R16F => Texels::Float(vec![0.0; px]),
        };
    }

    fn texel(&self, x: u32, y: u32) -> [f32; 4] {
        let i = y as usize * self.width as usize + x as usize;
        match &self.texels {
            Texels::Rgba8(b) => {
                let p = &b[i * 4..i * 4 + 4];
                [p[0], p[1], p[2], p[3]].map(|c| f32::from(c) / 255.0)
            }
            Texels::Float(f) => [f[i], 0.0, 0.0, 1.0],
        }
    }

    fn store(&mut self, x: u32, y: u32, c: [f32; 4]) {
        let i = y as usize * self.width as usize + x as usize;
        match &mut self.texels {
            Texels::Rgba8(b) => {
                for (k, v) in c.iter().enumerate() {
                    b[i * 4 + k] = unorm8(*v);
                }
            }
            Texels::Float(f) => f[i] = c[0],
        }
    }

    fn fill(&mut self, c: [f32; 4]) {
        for y in 0..self.height {
            for x in 0..self.width {
                self.store(x, y, c);
            }
        }
    }

    fn wrap_index(&self, i: i64, n: u32) -> u32 {
        let n = i64::from(n);
        let w = match self.wrap {
            TextureWrap::ClampToEdge => i.clamp(0, n - 1),
            TextureWrap::Repeat => i.rem_euclid(n),
            TextureWrap::MirroredRepeat => {
                let period = i.rem_euclid(2 * n);
                if period < n { period } else { 2 * n - 1 - period }
            }
        };
        w as u32
    }

    fn sample(&self, u: f32, v: f32) -> [f32; 4] {
        if self.format.is_none() || self.width == 0 || self.height == 0 {
            return [0.0, 0.0, 0.0, 1.0];
        }
        let fx = u * self.width as f32;
        let fy = v * self.height as f32;
        match self.filter {
            TextureFilter::Nearest => {
                let x = self.wrap_index(fx.floor() as i64, self.width);
                let y = self.wrap_index(fy.floor() as i64, self.height);
                self.texel(x, y)
            }
            TextureFilter::Linear => {
                let fx = fx - 0.5;
                let fy = fy - 0.5;
                let x0 = fx.floor();
                let y0 = fy.floor();
                let tx = fx - x0;
                let ty = fy - y0;
                let (x0, y0) = (x0 as i64, y0 as i64);
                let xa = self.wrap_index(x0, self.width);
                let xb = self.wrap_index(x0 + 1, self.width);
                let ya = self.wrap_index(y0, self.height);
                let yb = self.wrap_index(y0 + 1, self.height);
                let (c00, c10) = (self.texel(xa, ya), self.texel(xb, ya));
                let (c01, c11) = (self.texel(xa, yb), self.texel(xb, yb));
                let mut out = [0.0; 4];
                for k in 0..4 {
                    let top = c00[k] + (c10[k] - c00[k]) * tx;
                    let bottom = c01[k] + (c11[k] - c01[k]) * tx;
                    out[k] = top + (bottom - top) * ty;
                }
                out
            }
        }
    }
}

fn unorm8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[derive(Debug)]
struct Shader {
    kind: ShaderKind,
    source: String,
    compiled: bool,
    log: String,
}

#[derive(Debug, Default)]
struct Program {
    shaders: Vec<ShaderId>,
    linked: bool,
    log: String,
    attribs: Vec<String>,
    samplers: Vec<String>,
    uniforms: Vec<String>,
    uniform_values: HashMap<u32, i32>,
}

impl Program {
    /// Texture unit sampled by draws: the value assigned to the first sampler uniform.
    fn sampler_unit(&self) -> u32 {
        self.samplers
            .first()
            .and_then(|name| self.uniforms.iter().position(|u| u == name))
            .and_then(|loc| self.uniform_values.get(&(loc as u32)))
            .map(|v| (*v).max(0) as u32)
            .unwrap_or(0)
    }
}

/// Collect `(type, name)` for declarations introduced by `keyword` in GLSL `source`.
fn declarations<'a>(source: &'a str, keyword: &str) -> Vec<(&'a str, &'a str)> {
    source
        .split(';')
        .filter_map(|stmt| {
            let mut words = stmt.split_whitespace();
            let first = words.next()?;
            if first != keyword {
                return None;
            }
            let rest: Vec<&str> = words
                .filter(|w| !matches!(*w, "lowp" | "mediump" | "highp"))
                .collect();
            match rest.as_slice() {
                [ty, name] => Some((*ty, *name)),
                _ => None,
            }
        })
        .collect()
}

#[derive(Debug, Default)]
struct VertexArray {
    pointers: HashMap<u32, (BufferId, u32)>,
    enabled: HashSet<u32>,
}

/// A surface that renders into memory. See the module docs.
pub struct SoftwareSurface {
    id: ContextId,
    options: SoftwareOptions,
    counters: Rc<GlCounters>,
    next_object: u32,
    next_bitmap: u64,
    enabled_extensions: HashSet<String>,

    default_framebuffer: Texture,
    textures: HashMap<TextureId, Texture>,
    framebuffers: HashMap<FramebufferId, Option<TextureId>>,
    shaders: HashMap<ShaderId, Shader>,
    programs: HashMap<ProgramId, Program>,
    buffers: HashMap<BufferId, Vec<f32>>,
    vertex_arrays: HashMap<VertexArrayId, VertexArray>,
    default_vertex_array: VertexArray,
    bitmaps: HashMap<u64, (u32, u32, Vec<u8>)>,

    active_unit: u32,
    bound_textures: HashMap<u32, TextureId>,
    bound_framebuffer: Option<FramebufferId>,
    current_program: Option<ProgramId>,
    bound_vertex_array: Option<VertexArrayId>,
    bound_array_buffer: Option<BufferId>,
    viewport: (u32, u32),
}

impl std::fmt::Debug for SoftwareSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoftwareSurface")
            .field("id", &self.id)
            .field("size", &self.size())
            .field("textures", &self.textures.len())
            .field("counts", &self.counters.snapshot())
            .finish_non_exhaustive()
    }
}

impl Default for SoftwareSurface {
    fn default() -> Self {
        Self::new(SoftwareOptions::default())
    }
}

impl SoftwareSurface {
    /// Create a surface with its own context id.
    pub fn new(options: SoftwareOptions) -> Self {
        let id = ContextId(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed));
        Self {
            id,
            default_framebuffer: Texture::rgba8(options.width, options.height),
            viewport: (options.width, options.height),
            options,
            counters: Rc::new(GlCounters::default()),
            next_object: 1,
            next_bitmap: 1,
            enabled_extensions: HashSet::new(),
            textures: HashMap::new(),
            framebuffers: HashMap::new(),
            shaders: HashMap::new(),
            programs: HashMap::new(),
            buffers: HashMap::new(),
            vertex_arrays: HashMap::new(),
            default_vertex_array: VertexArray::default(),
            bitmaps: HashMap::new(),
            active_unit: 0,
            bound_textures: HashMap::new(),
            bound_framebuffer: None,
            current_program: None,
            bound_vertex_array: None,
            bound_array_buffer: None,
        }
    }

    /// Shared call statistics; stays valid after the surface is boxed into a canvas.
    pub fn counters(&self) -> Rc<GlCounters> {
        Rc::clone(&self.counters)
    }

    /// Register a bitmap as if produced by an upstream decoder. `rgba` rows are top-down.
    pub fn insert_bitmap(&mut self, width: u32, height: u32, rgba: Vec<u8>) -> Bitmap {
        let id = self.next_bitmap;
        self.next_bitmap += 1;
        self.bitmaps.insert(id, (width, height, rgba));
        Bitmap::from_raw(id, width, height)
    }

    /// Pixels of a live bitmap, top-down RGBA8.
    pub fn bitmap_pixels(&self, bitmap: &Bitmap) -> Option<&[u8]> {
        self.bitmaps.get(&bitmap.id()).map(|(_, _, px)| px.as_slice())
    }

    /// Whether `texture` still exists.
    pub fn is_texture(&self, texture: TextureId) -> bool {
        self.textures.contains_key(&texture)
    }

    fn alloc_object(&mut self) -> Option<u32> {
        if self.options.fail_allocations {
            return None;
        }
        let id = self.next_object;
        self.next_object += 1;
        Some(id)
    }

    fn bound_texture_mut(&mut self) -> Option<&mut Texture> {
        let id = self.bound_textures.get(&self.active_unit)?;
        self.textures.get_mut(id)
    }

    fn current_vertex_array(&mut self) -> &mut VertexArray {
        match self.bound_vertex_array {
            Some(id) => self.vertex_arrays.entry(id).or_default(),
            None => &mut self.default_vertex_array,
        }
    }

    fn attachment(&self) -> Option<TextureId> {
        self.bound_framebuffer
            .and_then(|fb| self.framebuffers.get(&fb).copied().flatten())
    }

    fn format_renderable(&self, format: TextureFormat) -> bool {
        let ext = |name: &str| self.enabled_extensions.contains(name);
        match format {
            TextureFormat::Rgba8 => true,
            TextureFormat::R32F => {
                self.options.renderable_float_formats.contains(&format)
                    && ext("EXT_color_buffer_float")
            }
            TextureFormat::R16F => {
                self.options.renderable_float_formats.contains(&format)
                    && (ext("EXT_color_buffer_half_float") || ext("EXT_color_buffer_float"))
            }
        }
    }

    /// Run `f` on the bound draw target: the attached texture or the default framebuffer.
    fn with_target<R>(&mut self, f: impl FnOnce(&mut Texture) -> R) -> Option<R> {
        match self.bound_framebuffer {
            None => {
                let mut target =
                    std::mem::replace(&mut self.default_framebuffer, Texture::undefined());
                let r = f(&mut target);
                self.default_framebuffer = target;
                Some(r)
            }
            Some(_) => {
                let id = self.attachment()?;
                let mut target = self.textures.remove(&id)?;
                let r = f(&mut target);
                self.textures.insert(id, target);
                Some(r)
            }
        }
    }

    fn attribute_data(
        &self,
        program: &Program,
        name: &str,
        fallback: usize,
    ) -> Option<(Vec<f32>, u32)> {
        let loc = program
            .attribs
            .iter()
            .position(|a| a == name)
            .or_else(|| (fallback < program.attribs.len()).then_some(fallback))? as u32;
        let vao = match self.bound_vertex_array {
            Some(id) => self.vertex_arrays.get(&id)?,
            None => &self.default_vertex_array,
        };
        if !vao.enabled.contains(&loc) {
            return None;
        }
        let (buffer, components) = *vao.pointers.get(&loc)?;
        Some((self.buffers.get(&buffer)?.clone(), components))
    }
}

fn vertex(data: &(Vec<f32>, u32), i: usize) -> Option<[f32; 2]> {
    let (values, components) = data;
    let base = i * *components as usize;
    Some([*values.get(base)?, *values.get(base + 1)?])
}

impl GlContext for SoftwareSurface {
    fn context_id(&self) -> ContextId {
        self.id
    }

    fn enable_extension(&mut self, name: &str) -> bool {
        if self.options.extensions.iter().any(|e| e == name) {
            self.enabled_extensions.insert(name.to_string());
            true
        } else {
            false
        }
    }

    fn supports_red_float_readback(&self) -> bool {
        self.options.red_float_readback
    }

    fn create_texture(&mut self) -> Option<TextureId> {
        let id = TextureId(self.alloc_object()?);
        self.textures.insert(id, Texture::undefined());
        self.counters.bump(|c| c.textures_created += 1);
        Some(id)
    }

    fn delete_texture(&mut self, texture: TextureId) {
        if self.textures.remove(&texture).is_some() {
            self.counters.bump(|c| c.textures_deleted += 1);
        }
        self.bound_textures.retain(|_, t| *t != texture);
        for attachment in self.framebuffers.values_mut() {
            if *attachment == Some(texture) {
                *attachment = None;
            }
        }
    }

    fn active_texture(&mut self, unit: u32) {
        self.active_unit = unit;
    }

    fn bind_texture(&mut self, texture: Option<TextureId>) {
        match texture {
            Some(t) => {
                self.bound_textures.insert(self.active_unit, t);
            }
            None => {
                self.bound_textures.remove(&self.active_unit);
            }
        }
    }

    fn set_texture_filter(&mut self, filter: TextureFilter) {
        if let Some(t) = self.bound_texture_mut() {
            t.filter = filter;
        }
    }

    fn set_texture_wrap(&mut self, wrap: TextureWrap) {
        if let Some(t) = self.bound_texture_mut() {
            t.wrap = wrap;
        }
    }

    fn tex_image_2d(
        &mut self,
        format: TextureFormat,
        width: u32,
        height: u32,
        source: TexSource<'_>,
    ) {
        let bitmap = match source {
            TexSource::Bitmap(b) => self.bitmaps.get(&b.id()).map(|(_, _, px)| px.clone()),
            _ => None,
        };
        let uploaded = !matches!(source, TexSource::Empty);
        let Some(tex) = self.bound_texture_mut() else {
            return;
        };
        tex.define(format, width, height);
        let px = width as usize * height as usize;
        match (&mut tex.texels, source) {
            (_, TexSource::Empty) => {}
            (Texels::Rgba8(dst), TexSource::Rgba8(src)) => {
                let n = dst.len().min(src.len());
                dst[..n].copy_from_slice(&src[..n]);
            }
            (Texels::Float(dst), TexSource::Float(src)) => {
                let n = dst.len().min(src.len());
                dst[..n].copy_from_slice(&src[..n]);
            }
            (Texels::Float(dst), TexSource::Rgba8(src)) => {
                for (d, s) in dst.iter_mut().zip(src.chunks_exact(4)) {
                    *d = f32::from(s[0]) / 255.0;
                }
            }
            (Texels::Rgba8(dst), TexSource::Float(src)) => {
                for (d, s) in dst.chunks_exact_mut(4).zip(src.iter().take(px)) {
                    d.copy_from_slice(&[unorm8(*s), 0, 0, 255]);
                }
            }
            (texels, TexSource::Bitmap(_)) => {
                let src = bitmap.unwrap_or_default();
                match texels {
                    Texels::Rgba8(dst) => {
                        let n = dst.len().min(src.len());
                        dst[..n].copy_from_slice(&src[..n]);
                    }
                    Texels::Float(dst) => {
                        for (d, s) in dst.iter_mut().zip(src.chunks_exact(4)) {
                            *d = f32::from(s[0]) / 255.0;
                        }
                    }
                }
            }
        }
        if uploaded {
            self.counters.bump(|c| c.uploads += 1);
        }
    }

    fn create_framebuffer(&mut self) -> Option<FramebufferId> {
        let id = FramebufferId(self.alloc_object()?);
        self.framebuffers.insert(id, None);
        Some(id)
    }

    fn delete_framebuffer(&mut self, framebuffer: FramebufferId) {
        if self.framebuffers.remove(&framebuffer).is_some() {
            self.counters.bump(|c| c.framebuffers_deleted += 1);
        }
        if self.bound_framebuffer == Some(framebuffer) {
            self.bound_framebuffer = None;
        }
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>) {
        self.bound_framebuffer = framebuffer;
    }

    fn framebuffer_texture_2d(&mut self, texture: Option<TextureId>) {
        if let Some(fb) = self.bound_framebuffer
            && let Some(attachment) = self.framebuffers.get_mut(&fb)
        {
            *attachment = texture;
        }
    }

    fn framebuffer_complete(&self) -> bool {
        if self.bound_framebuffer.is_none() {
            return true;
        }
        let Some(tex) = self.attachment().and_then(|id| self.textures.get(&id)) else {
            return false;
        };
        match tex.format {
            Some(format) => tex.width > 0 && tex.height > 0 && self.format_renderable(format),
            None => false,
        }
    }

    fn create_shader(&mut self, kind: ShaderKind) -> Option<ShaderId> {
        let id = ShaderId(self.alloc_object()?);
        self.shaders.insert(
            id,
            Shader {
                kind,
                source: String::new(),
                compiled: false,
                log: String::new(),
            },
        );
        Some(id)
    }

    fn shader_source(&mut self, shader: ShaderId, source: &str) {
        if let Some(s) = self.shaders.get_mut(&shader) {
            s.source = source.to_string();
        }
    }

    fn compile_shader(&mut self, shader: ShaderId) {
        if let Some(s) = self.shaders.get_mut(&shader) {
            s.compiled = s.source.contains("main");
            s.log = if s.compiled {
                String::new()
            } else {
                "ERROR: 0:1: 'main' : function not defined".to_string()
            };
        }
    }

    fn shader_compile_status(&self, shader: ShaderId) -> bool {
        self.shaders.get(&shader).is_some_and(|s| s.compiled)
    }

    fn shader_info_log(&self, shader: ShaderId) -> String {
        self.shaders
            .get(&shader)
            .map(|s| s.log.clone())
            .unwrap_or_default()
    }

    fn delete_shader(&mut self, shader: ShaderId) {
        if self.shaders.remove(&shader).is_some() {
            self.counters.bump(|c| c.shaders_deleted += 1);
        }
    }

    fn create_program(&mut self) -> Option<ProgramId> {
        let id = ProgramId(self.alloc_object()?);
        self.programs.insert(id, Program::default());
        Some(id)
    }

    fn attach_shader(&mut self, program: ProgramId, shader: ShaderId) {
        if let Some(p) = self.programs.get_mut(&program)
            && !p.shaders.contains(&shader)
        {
            p.shaders.push(shader);
        }
    }

    fn link_program(&mut self, program: ProgramId) {
        let Some(p) = self.programs.get(&program) else {
            return;
        };
        let stage = |kind: ShaderKind| {
            p.shaders
                .iter()
                .filter_map(|id| self.shaders.get(id))
                .find(|s| s.kind == kind)
        };
        let (vertex, fragment) = (stage(ShaderKind::Vertex), stage(ShaderKind::Fragment));
        let outcome = match (vertex, fragment) {
            (Some(v), Some(f)) if v.compiled && f.compiled => {
                if v.source.contains("gl_Position") {
                    Ok((v.source.clone(), f.source.clone()))
                } else {
                    Err("ERROR: vertex shader does not write gl_Position".to_string())
                }
            }
            (Some(_), Some(_)) => Err("ERROR: attached shaders are not compiled".to_string()),
            _ => Err("ERROR: missing vertex or fragment shader".to_string()),
        };
        let Some(p) = self.programs.get_mut(&program) else {
            return;
        };
        match outcome {
            Ok((vs, fs)) => {
                p.linked = true;
                p.log.clear();
                p.attribs = declarations(&vs, "attribute")
                    .into_iter()
                    .chain(declarations(&vs, "in"))
                    .map(|(_, name)| name.to_string())
                    .collect();
                let uniforms: Vec<(&str, &str)> = declarations(&vs, "uniform")
                    .into_iter()
                    .chain(declarations(&fs, "uniform"))
                    .collect();
                p.samplers = uniforms
                    .iter()
                    .filter(|(ty, _)| *ty == "sampler2D")
                    .map(|(_, name)| name.to_string())
                    .collect();
                p.uniforms = uniforms.iter().map(|(_, name)| name.to_string()).collect();
            }
            Err(log) => {
                p.linked = false;
                p.log = log;
            }
        }
    }

    fn program_link_status(&self, program: ProgramId) -> bool {
        self.programs.get(&program).is_some_and(|p| p.linked)
    }

    fn program_info_log(&self, program: ProgramId) -> String {
        self.programs
            .get(&program)
            .map(|p| p.log.clone())
            .unwrap_or_default()
    }

    fn use_program(&mut self, program: Option<ProgramId>) {
        self.current_program = program;
    }

    fn attrib_location(&mut self, program: ProgramId, name: &str) -> Option<u32> {
        let p = self.programs.get(&program).filter(|p| p.linked)?;
        p.attribs.iter().position(|a| a == name).map(|i| i as u32)
    }

    fn uniform_location(&mut self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        let p = self.programs.get(&program).filter(|p| p.linked)?;
        p.uniforms
            .iter()
            .position(|u| u == name)
            .map(|i| UniformLocation(i as u32))
    }

    fn uniform_1i(&mut self, location: UniformLocation, value: i32) {
        if let Some(p) = self
            .current_program
            .and_then(|id| self.programs.get_mut(&id))
        {
            p.uniform_values.insert(location.0, value);
        }
    }

    fn delete_program(&mut self, program: ProgramId) {
        if self.programs.remove(&program).is_some() {
            self.counters.bump(|c| c.programs_deleted += 1);
        }
        if self.current_program == Some(program) {
            self.current_program = None;
        }
    }

    fn create_vertex_array(&mut self) -> Option<VertexArrayId> {
        let id = VertexArrayId(self.alloc_object()?);
        self.vertex_arrays.insert(id, VertexArray::default());
        Some(id)
    }

    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayId>) {
        self.bound_vertex_array = vertex_array;
    }

    fn delete_vertex_array(&mut self, vertex_array: VertexArrayId) {
        if self.vertex_arrays.remove(&vertex_array).is_some() {
            self.counters.bump(|c| c.vertex_arrays_deleted += 1);
        }
        if self.bound_vertex_array == Some(vertex_array) {
            self.bound_vertex_array = None;
        }
    }

    fn create_buffer(&mut self) -> Option<BufferId> {
        let id = BufferId(self.alloc_object()?);
        self.buffers.insert(id, Vec::new());
        Some(id)
    }

    fn bind_array_buffer(&mut self, buffer: Option<BufferId>) {
        self.bound_array_buffer = buffer;
    }

    fn array_buffer_data(&mut self, data: &[f32]) {
        if let Some(b) = self
            .bound_array_buffer
            .and_then(|id| self.buffers.get_mut(&id))
        {
            *b = data.to_vec();
        }
    }

    fn vertex_attrib_pointer(&mut self, location: u32, components: u32) {
        if let Some(buffer) = self.bound_array_buffer {
            self.current_vertex_array()
                .pointers
                .insert(location, (buffer, components));
        }
    }

    fn enable_vertex_attrib_array(&mut self, location: u32) {
        self.current_vertex_array().enabled.insert(location);
    }

    fn disable_vertex_attrib_array(&mut self, location: u32) {
        self.current_vertex_array().enabled.remove(&location);
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        if self.buffers.remove(&buffer).is_some() {
            self.counters.bump(|c| c.buffers_deleted += 1);
        }
        if self.bound_array_buffer == Some(buffer) {
            self.bound_array_buffer = None;
        }
    }

    fn viewport(&mut self, width: u32, height: u32) {
        self.viewport = (width, height);
    }

    fn clear(&mut self, rgba: [f32; 4]) {
        self.with_target(|target| target.fill(rgba));
    }

    fn draw_triangle_fan(&mut self, first: u32, count: u32) {
        self.counters.bump(|c| c.draws += 1);
        if count < 3 {
            return;
        }
        let Some(program) = self
            .current_program
            .and_then(|id| self.programs.get(&id))
            .filter(|p| p.linked)
        else {
            return;
        };
        let (Some(pos), Some(tex)) = (
            self.attribute_data(program, "aVertex", 0),
            self.attribute_data(program, "aTex", 1),
        ) else {
            return;
        };
        let unit = program.sampler_unit();
        let Some(source) = self
            .bound_textures
            .get(&unit)
            .and_then(|id| self.textures.get(id))
            .cloned()
        else {
            return;
        };
        if self.attachment().is_some()
            && self.bound_textures.get(&unit) == self.attachment().as_ref()
        {
            // feedback loop: sampling the attachment being drawn
            return;
        }

        let first = first as usize;
        let corners: Option<Vec<([f32; 2], [f32; 2])>> = (first..first + count as usize)
            .map(|i| Some((vertex(&pos, i)?, vertex(&tex, i)?)))
            .collect();
        let Some(corners) = corners else {
            return;
        };
        let (p0, t0) = corners[0];
        let (p1, t1) = corners[1];
        let (p2, t2) = corners[2];
        let d1 = [p1[0] - p0[0], p1[1] - p0[1]];
        let d2 = [p2[0] - p0[0], p2[1] - p0[1]];
        let det = d1[0] * d2[1] - d1[1] * d2[0];
        if det == 0.0 {
            return;
        }
        let (min_x, max_x, min_y, max_y) = corners.iter().fold(
            (f32::MAX, f32::MIN, f32::MAX, f32::MIN),
            |(a, b, c, d), (p, _)| (a.min(p[0]), b.max(p[0]), c.min(p[1]), d.max(p[1])),
        );
        let (vw, vh) = self.viewport;
        if vw == 0 || vh == 0 {
            return;
        }

        self.with_target(|target| {
            for y in 0..vh.min(target.height) {
                let ny = (y as f32 + 0.5) / vh as f32 * 2.0 - 1.0;
                if ny < min_y || ny > max_y {
                    continue;
                }
                for x in 0..vw.min(target.width) {
                    let nx = (x as f32 + 0.5) / vw as f32 * 2.0 - 1.0;
                    if nx < min_x || nx > max_x {
                        continue;
                    }
                    let (rx, ry) = (nx - p0[0], ny - p0[1]);
                    let a = (rx * d2[1] - ry * d2[0]) / det;
                    let b = (d1[0] * ry - d1[1] * rx) / det;
                    let u = t0[0] + a * (t1[0] - t0[0]) + b * (t2[0] - t0[0]);
                    let v = t0[1] + a * (t1[1] - t0[1]) + b * (t2[1] - t0[1]);
                    target.store(x, y, source.sample(u, v));
                }
            }
        });
    }

    fn read_pixels(&mut self, width: u32, height: u32, target: ReadTarget<'_>) {
        self.counters.bump(|c| c.readbacks += 1);
        let source = match self.bound_framebuffer {
            None => Some(&self.default_framebuffer),
            Some(_) => self.attachment().and_then(|id| self.textures.get(&id)),
        };
        let Some(source) = source else {
            return;
        };
        let w = width.min(source.width);
        let h = height.min(source.height);
        let row = width as usize;
        match target {
            ReadTarget::Rgba8(out) => {
                for y in 0..h {
                    for x in 0..w {
                        let o = (y as usize * row + x as usize) * 4;
                        let Some(dst) = out.get_mut(o..o + 4) else {
                            return;
                        };
                        match &source.texels {
                            Texels::Rgba8(b) => {
                                let i = (y as usize * source.width as usize + x as usize) * 4;
                                dst.copy_from_slice(&b[i..i + 4]);
                            }
                            Texels::Float(_) => {
                                let c = source.texel(x, y);
                                for (d, v) in dst.iter_mut().zip(c) {
                                    *d = unorm8(v);
                                }
                            }
                        }
                    }
                }
            }
            ReadTarget::RedF32(out) => {
                for y in 0..h {
                    for x in 0..w {
                        if let Some(dst) = out.get_mut(y as usize * row + x as usize) {
                            *dst = source.texel(x, y)[0];
                        }
                    }
                }
            }
            ReadTarget::RgbaF32(out) => {
                for y in 0..h {
                    for x in 0..w {
                        let o = (y as usize * row + x as usize) * 4;
                        if let Some(dst) = out.get_mut(o..o + 4) {
                            dst.copy_from_slice(&source.texel(x, y));
                        }
                    }
                }
            }
        }
    }
}

impl BitmapTransfer for SoftwareSurface {
    fn transfer_to_bitmap(&mut self) -> Option<Bitmap> {
        if self.options.fail_allocations {
            return None;
        }
        let fb = &self.default_framebuffer;
        let (w, h) = (fb.width, fb.height);
        let stride = w as usize * 4;
        let Texels::Rgba8(bytes) = &fb.texels else {
            return None;
        };
        let mut pixels = Vec::with_capacity(bytes.len());
        for row in bytes.chunks_exact(stride.max(1)).rev() {
            pixels.extend_from_slice(row);
        }
        self.default_framebuffer = Texture::rgba8(w, h);
        self.counters.bump(|c| c.bitmaps_transferred += 1);
        Some(self.insert_bitmap(w, h, pixels))
    }

    fn close_bitmap(&mut self, bitmap: Bitmap) {
        if self.bitmaps.remove(&bitmap.id()).is_some() {
            self.counters.bump(|c| c.bitmaps_closed += 1);
        }
    }
}

impl Surface for SoftwareSurface {
    fn size(&self) -> (u32, u32) {
        (self.default_framebuffer.width, self.default_framebuffer.height)
    }

    fn set_size(&mut self, width: u32, height: u32) {
        self.default_framebuffer = Texture::rgba8(width, height);
    }

    fn gl(&mut self) -> &mut dyn GlContext {
        self
    }

    fn bitmap_transfer(&mut self) -> Option<&mut dyn BitmapTransfer> {
        if self.options.bitmap_transfer {
            Some(self)
        } else {
            None
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/gpu/software.rs"]
mod tests;
