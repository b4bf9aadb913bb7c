use drive_amiga_floppy::MfmError;
use thiserror::Error;

/// A rejected [`ConfigOption`](crate::ConfigOption).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("drive number {0} out of range (0-3)")]
    InvalidDrive(usize),
    #[error("invalid drive speed {0} (expected -1, 1, 2, 4 or 8)")]
    InvalidDriveSpeed(i32),
    #[error("drive df{0} is not connected")]
    DriveNotConnected(usize),
}

/// Failure to put a disk image into a drive.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InsertError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("cannot encode disk image: {0}")]
    Encode(#[from] MfmError),
}
