pub(crate) mod context;
pub(crate) mod shader;
pub(crate) mod software;
pub(crate) mod surface;
