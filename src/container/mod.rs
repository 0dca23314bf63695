mod gpu_ops;
pub(crate) mod handle;
mod held;
pub(crate) mod image;
pub(crate) mod mask;
