/// A GPU-backed representation tagged with who must release it.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Held<T> {
    /// Created by this container; released by its `close()`.
    Owned(T),
    /// Received from an upstream producer; never released here.
    Borrowed(T),
}

impl<T> Held<T> {
    pub(crate) fn get(&self) -> &T {
        match self {
            Self::Owned(v) | Self::Borrowed(v) => v,
        }
    }

    pub(crate) fn is_owned(&self) -> bool {
        matches!(self, Self::Owned(_))
    }

    /// The value if this container must release it.
    pub(crate) fn into_owned(self) -> Option<T> {
        match self {
            Self::Owned(v) => Some(v),
            Self::Borrowed(_) => None,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/container/held.rs"]
mod tests;
