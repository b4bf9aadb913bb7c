//! Connections to the chips that live outside this crate.
//!
//! The CPU, Denise, the two CIAs and the audio state machines are driven
//! through these traits. Every method has a no-op default, so a host only
//! implements what it consumes. [`Detached`] implements all of them.

use commodore_agnus::SpriteFetch;
use emu_core::Cycle;

pub trait CpuPort: Send {
    /// The CPU lost `cycles` master cycles to bus arbitration.
    fn add_wait_states(&mut self, _cycles: Cycle) {}
}

pub trait DenisePort: Send {
    fn begin_of_line(&mut self, _vpos: i64) {}
    fn end_of_line(&mut self, _vpos: i64) {}
    fn vsync(&mut self) {}
    /// A bitplane word for plane `plane` (0-based).
    fn poke_bpldat(&mut self, _plane: u8, _value: u16) {}
    fn poke_sprite(&mut self, _nr: u8, _fetch: SpriteFetch) {}
    /// A write to a register Denise listens to (BPLCONx, colours, ...).
    fn poke_register(&mut self, _addr: u16, _value: u16) {}
}

pub trait CiaPort: Send {
    /// One CIA cycle.
    fn execute(&mut self) {}
    fn tod_increment(&mut self) {}
    fn eclock_syncing(&self) -> bool {
        true
    }
}

pub trait AudioPort: Send {
    fn poke_audio_data(&mut self, _channel: u8, _value: u16) {}
}

/// A port with nothing behind it.
#[derive(Debug, Clone, Copy, Default)]
pub struct Detached;

impl CpuPort for Detached {}
impl DenisePort for Detached {}
impl CiaPort for Detached {}
impl AudioPort for Detached {}

/// Every external connection of the machine.
pub struct Ports {
    pub cpu: Box<dyn CpuPort>,
    pub denise: Box<dyn DenisePort>,
    pub cia_a: Box<dyn CiaPort>,
    pub cia_b: Box<dyn CiaPort>,
    pub audio: Box<dyn AudioPort>,
}

impl Default for Ports {
    fn default() -> Self {
        Self {
            cpu: Box::new(Detached),
            denise: Box::new(Detached),
            cia_a: Box::new(Detached),
            cia_b: Box::new(Detached),
            audio: Box::new(Detached),
        }
    }
}

impl std::fmt::Debug for Ports {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ports").finish_non_exhaustive()
    }
}
