//! Capability traits shared by every chip.
//!
//! Components implement only what they support and the machine composes
//! them through explicit registration lists.

/// A component with power-on and reset state.
pub trait Resettable {
    /// Return to the reset state. A hard reset also wipes state that
    /// survives a soft reset (inserted media, configuration-derived tables).
    fn reset(&mut self, hard: bool);
}

/// A component that can describe its state as human-readable text.
pub trait Dumpable {
    /// Short component name used as a section header.
    fn name(&self) -> &'static str;

    /// Multi-line description of the current state.
    fn dump(&self) -> String;
}
