use std::cell::Cell;

/// Container classes tracked by the leak heuristic, one countdown each.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContainerClass {
    /// [`crate::ImageContainer`].
    Image,
    /// [`crate::MaskContainer`].
    Mask,
}

impl ContainerClass {
    fn name(self) -> &'static str {
        match self {
            Self::Image => "ImageContainer",
            Self::Mask => "MaskContainer",
        }
    }
}

#[derive(Debug)]
struct Countdown {
    remaining: Cell<u32>,
    emissions: Cell<u32>,
}

impl Countdown {
    fn new(start: u32) -> Self {
        Self {
            remaining: Cell::new(start),
            emissions: Cell::new(0),
        }
    }
}

/// Leak heuristic for containers that own GPU resources.
///
/// Each construction of an owning container decrements its class countdown. When a countdown
/// reaches zero a single `tracing::warn!` is emitted for that class; later constructions stay
/// silent until [`LeakDiagnostics::reset`]. The countdown never observes `close()`, so it only
/// estimates leaks and has no effect on container behavior.
#[derive(Debug)]
pub struct LeakDiagnostics {
    threshold: u32,
    images: Countdown,
    masks: Countdown,
}

impl LeakDiagnostics {
    /// Create a heuristic with `threshold` owning constructions per class. Zero disables it.
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            images: Countdown::new(threshold),
            masks: Countdown::new(threshold),
        }
    }

    fn countdown(&self, class: ContainerClass) -> &Countdown {
        match class {
            ContainerClass::Image => &self.images,
            ContainerClass::Mask => &self.masks,
        }
    }

    /// Record the construction of an owning container of `class`.
    pub fn owning_instance_created(&self, class: ContainerClass) {
        if self.threshold == 0 {
            return;
        }
        let c = self.countdown(class);
        let remaining = c.remaining.get();
        if remaining == 0 {
            return;
        }
        c.remaining.set(remaining - 1);
        if remaining == 1 {
            c.emissions.set(c.emissions.get() + 1);
            tracing::warn!(
                class = class.name(),
                threshold = self.threshold,
                "{} instances are being created without close(); this leaks GPU resources",
                class.name()
            );
        }
    }

    /// Owning constructions left before the warning fires for `class`.
    pub fn remaining(&self, class: ContainerClass) -> u32 {
        self.countdown(class).remaining.get()
    }

    /// Number of warnings emitted for `class` since creation or the last reset.
    pub fn emissions(&self, class: ContainerClass) -> u32 {
        self.countdown(class).emissions.get()
    }

    /// Rearm both countdowns and clear emission counts.
    pub fn reset(&self) {
        for c in [&self.images, &self.masks] {
            c.remaining.set(self.threshold);
            c.emissions.set(0);
        }
    }
}

impl Default for LeakDiagnostics {
    fn default() -> Self {
        Self::new(crate::foundation::config::DEFAULT_LEAK_WARNING_THRESHOLD)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/diagnostics.rs"]
mod tests;
