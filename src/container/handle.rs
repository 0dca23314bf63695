use std::{cell::RefCell, rc::Rc};

use crate::{
    foundation::config::RenderConfig,
    foundation::diagnostics::LeakDiagnostics,
    foundation::error::{FrameError, FrameResult},
    gpu::shader::ShaderContext,
    gpu::surface::{Canvas, Surface},
};

/// Shared rendering state handed to every container built against one surface.
///
/// Cloning a handle shares the canvas, the shader context and the leak diagnostics. Handles are
/// `!Send`: the canvas and its GPU context are single-threaded global state, and exclusive
/// `RefCell` borrows keep at most one container operation in flight.
#[derive(Clone, Debug)]
pub struct RenderHandle {
    canvas: Rc<RefCell<Canvas>>,
    shaders: Rc<RefCell<ShaderContext>>,
    diagnostics: Rc<LeakDiagnostics>,
}

impl RenderHandle {
    /// Wrap `surface` with a fresh copy-program shader context.
    pub fn new(surface: impl Surface + 'static, config: &RenderConfig) -> Self {
        Self::with_shaders(surface, Rc::new(RefCell::new(ShaderContext::new())), config)
    }

    /// Wrap `surface` and share an existing shader context.
    pub fn with_shaders(
        surface: impl Surface + 'static,
        shaders: Rc<RefCell<ShaderContext>>,
        config: &RenderConfig,
    ) -> Self {
        Self::from_parts(
            Rc::new(RefCell::new(Canvas::new(surface, config.mask_readback))),
            shaders,
            Rc::new(LeakDiagnostics::new(config.leak_warning_threshold)),
        )
    }

    /// Assemble a handle from already shared parts.
    pub fn from_parts(
        canvas: Rc<RefCell<Canvas>>,
        shaders: Rc<RefCell<ShaderContext>>,
        diagnostics: Rc<LeakDiagnostics>,
    ) -> Self {
        Self {
            canvas,
            shaders,
            diagnostics,
        }
    }

    /// The shared canvas.
    pub fn canvas(&self) -> &Rc<RefCell<Canvas>> {
        &self.canvas
    }

    /// The shared shader context.
    pub fn shaders(&self) -> &Rc<RefCell<ShaderContext>> {
        &self.shaders
    }

    /// Leak heuristic fed by owning container constructions.
    pub fn diagnostics(&self) -> &LeakDiagnostics {
        &self.diagnostics
    }

    /// Close the shared shader context against this canvas.
    ///
    /// Containers never do this themselves; call it once every container using the shader
    /// context is done.
    pub fn close_shaders(&self) -> FrameResult<()> {
        self.with_gpu(|canvas, shaders| shaders.close(canvas.gl()))
    }

    pub(crate) fn with_canvas<R>(
        &self,
        f: impl FnOnce(&mut Canvas) -> FrameResult<R>,
    ) -> FrameResult<R> {
        let mut canvas = self
            .canvas
            .try_borrow_mut()
            .map_err(|_| FrameError::programmer("rendering canvas is already in use"))?;
        f(&mut canvas)
    }

    pub(crate) fn with_gpu<R>(
        &self,
        f: impl FnOnce(&mut Canvas, &mut ShaderContext) -> FrameResult<R>,
    ) -> FrameResult<R> {
        let mut canvas = self
            .canvas
            .try_borrow_mut()
            .map_err(|_| FrameError::programmer("rendering canvas is already in use"))?;
        let mut shaders = self
            .shaders
            .try_borrow_mut()
            .map_err(|_| FrameError::programmer("shader context is already in use"))?;
        f(&mut canvas, &mut shaders)
    }
}
