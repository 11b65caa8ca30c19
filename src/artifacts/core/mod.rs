//! Shared types used across stores

/// Answer of a visitor passed to tree walks and reference iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WalkControl {
    #[default]
    Continue,
    /// Do not descend into the entry just visited (tree walks only)
    Skip,
    /// End the iteration; the caller receives `Error::Aborted`
    Stop,
}
