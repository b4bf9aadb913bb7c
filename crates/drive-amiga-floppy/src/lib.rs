//! Amiga floppy drives and the MFM layer between disk images and flux.
//!
//! A [`Disk`] holds the raw MFM bytes of 84 cylinders on two sides. A
//! [`FloppyDrive`] moves its head over them under control of the CIA-B
//! port lines and exposes the byte under the head to the disk controller.

pub mod mfm;

mod disk;
mod drive;

pub use disk::{CYLINDER_SIZE, DISK_SIZE, Disk, DiskType, NUM_CYLINDERS, NUM_SIDES, NUM_TRACKS};
pub use drive::{DriveConfig, DriveHead, FloppyDrive};
pub use mfm::{MfmError, SYNC_WORD, TRACK_SIZE};
