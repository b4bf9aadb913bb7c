//! Configuration for the Amiga machine crate.

use commodore_agnus::AgnusRevision;
use commodore_paula_8364::DiskControllerConfig;
use drive_amiga_floppy::DriveConfig;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AmigaConfig {
    pub revision: AgnusRevision,
    pub disk: DiskControllerConfig,
    pub drives: [DriveConfig; 4],
    /// Align CPU accesses to the CIAs with the E clock.
    pub eclock_syncing: bool,
}

impl Default for AmigaConfig {
    fn default() -> Self {
        Self {
            revision: AgnusRevision::Ocs,
            disk: DiskControllerConfig::default(),
            drives: [DriveConfig::default(); 4],
            eclock_syncing: true,
        }
    }
}

/// A single run-time configuration change, applied through
/// [`Amiga::configure`](crate::Amiga::configure).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigOption {
    Revision(AgnusRevision),
    EClockSyncing(bool),
    DriveConnected(usize, bool),
    DriveSpeed(usize, i32),
    MechanicalDelays(usize, bool),
    AsyncFifo(bool),
    LockDskSync(bool),
    AutoDskSync(bool),
    TimedFlush(bool),
}
