//! Sector-addressable floppy images.
//!
//! ADF is a raw AmigaDOS sector dump: 80 cylinders x 2 heads x 11 sectors
//! x 512 bytes = 901,120 bytes for double-density disks. HD disks double
//! the sector count. IMG is the PC equivalent with 9 (DD) or 18 (HD)
//! sectors per track. Neither format carries any metadata, so the image
//! size alone determines the geometry.

mod adf;
mod img;

pub use adf::{ADF_SIZE_DD, ADF_SIZE_HD, Adf, SECTORS_PER_TRACK_DD, SECTORS_PER_TRACK_HD};
pub use img::{IMG_SIZE_DD, IMG_SIZE_HD, Img};

use thiserror::Error;

pub const SECTOR_SIZE: u32 = 512;
pub const CYLINDERS: u32 = 80;
pub const HEADS: u32 = 2;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ImageError {
    #[error("invalid {format} size: {size} bytes (expected {dd} for DD or {hd} for HD)")]
    InvalidSize {
        format: &'static str,
        size: usize,
        dd: usize,
        hd: usize,
    },
    #[error("track {track} sector {sector} is outside the image")]
    SectorOutOfRange { track: u32, sector: u32 },
}

/// Low-level sector layout of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ImageKind {
    /// AmigaDOS track format (sync 0x4489, odd/even data, XOR checksums).
    Amiga,
    /// IBM PC track format (IDAM/DAM address marks, CRC-16).
    Dos,
}

/// A disk image that can be read and rebuilt sector by sector.
pub trait DiskImage {
    fn kind(&self) -> ImageKind;

    fn sectors_per_track(&self) -> u32;

    /// Raw image bytes, track after track.
    fn data(&self) -> &[u8];

    fn data_mut(&mut self) -> &mut [u8];

    fn is_hd(&self) -> bool;

    fn num_tracks(&self) -> u32 {
        CYLINDERS * HEADS
    }

    /// Borrow one 512-byte sector. Tracks count cylinder-major
    /// (`track = cylinder * 2 + head`).
    fn read_sector(&self, track: u32, sector: u32) -> Result<&[u8], ImageError> {
        let start = sector_offset(self, track, sector)?;
        Ok(&self.data()[start..start + SECTOR_SIZE as usize])
    }

    fn write_sector(&mut self, track: u32, sector: u32, bytes: &[u8]) -> Result<(), ImageError> {
        let start = sector_offset(self, track, sector)?;
        self.data_mut()[start..start + SECTOR_SIZE as usize].copy_from_slice(bytes);
        Ok(())
    }

    /// FNV-1a checksum identifying the image contents.
    fn fnv(&self) -> u64 {
        fnv_1a_64(self.data())
    }
}

fn sector_offset<I: DiskImage + ?Sized>(
    image: &I,
    track: u32,
    sector: u32,
) -> Result<usize, ImageError> {
    if track >= image.num_tracks() || sector >= image.sectors_per_track() {
        return Err(ImageError::SectorOutOfRange { track, sector });
    }
    Ok((track * image.sectors_per_track() + sector) as usize * SECTOR_SIZE as usize)
}

/// 64-bit FNV-1a hash.
#[must_use]
pub fn fnv_1a_64(bytes: &[u8]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    bytes.iter().fold(OFFSET_BASIS, |hash, &b| {
        (hash ^ u64::from(b)).wrapping_mul(PRIME)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fnv_matches_reference_vectors() {
        assert_eq!(fnv_1a_64(b""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(fnv_1a_64(b"a"), 0xaf63_dc4c_8601_ec8c);
    }

    #[test]
    fn sector_access_is_bounds_checked() {
        let img = Img::from_bytes(vec![0; IMG_SIZE_DD]).expect("valid");
        assert!(img.read_sector(159, 8).is_ok());
        assert_eq!(
            img.read_sector(160, 0),
            Err(ImageError::SectorOutOfRange { track: 160, sector: 0 })
        );
        assert_eq!(
            img.read_sector(0, 9),
            Err(ImageError::SectorOutOfRange { track: 0, sector: 9 })
        );
    }

    #[test]
    fn fnv_changes_with_content() {
        let mut adf = Adf::from_bytes(vec![0; ADF_SIZE_DD]).expect("valid");
        let before = adf.fnv();
        adf.write_sector(0, 0, &[1; 512]).expect("in range");
        assert_ne!(before, adf.fnv());
    }
}
