use crate::{CYLINDERS, DiskImage, HEADS, ImageError, ImageKind, SECTOR_SIZE};

pub const SECTORS_PER_TRACK_DD: u32 = 11;
pub const SECTORS_PER_TRACK_HD: u32 = 22;
pub const ADF_SIZE_DD: usize = (CYLINDERS * HEADS * SECTORS_PER_TRACK_DD * SECTOR_SIZE) as usize;
pub const ADF_SIZE_HD: usize = (CYLINDERS * HEADS * SECTORS_PER_TRACK_HD * SECTOR_SIZE) as usize;

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Adf {
    data: Vec<u8>,
    sectors_per_track: u32,
}

impl Adf {
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, ImageError> {
        let sectors_per_track = match data.len() {
            ADF_SIZE_DD => SECTORS_PER_TRACK_DD,
            ADF_SIZE_HD => SECTORS_PER_TRACK_HD,
            size => {
                return Err(ImageError::InvalidSize {
                    format: "ADF",
                    size,
                    dd: ADF_SIZE_DD,
                    hd: ADF_SIZE_HD,
                });
            }
        };
        Ok(Self {
            data,
            sectors_per_track,
        })
    }

    /// A blank double-density image.
    #[must_use]
    pub fn blank_dd() -> Self {
        Self {
            data: vec![0; ADF_SIZE_DD],
            sectors_per_track: SECTORS_PER_TRACK_DD,
        }
    }

    /// All sectors of one track, back to back.
    #[must_use]
    pub fn read_track_sectors(&self, cyl: u32, head: u32) -> &[u8] {
        let len = self.sectors_per_track as usize * SECTOR_SIZE as usize;
        let start = (cyl * HEADS + head) as usize * len;
        &self.data[start..start + len]
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

impl DiskImage for Adf {
    fn kind(&self) -> ImageKind {
        ImageKind::Amiga
    }

    fn sectors_per_track(&self) -> u32 {
        self.sectors_per_track
    }

    fn data(&self) -> &[u8] {
        &self.data
    }

    fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    fn is_hd(&self) -> bool {
        self.sectors_per_track == SECTORS_PER_TRACK_HD
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reject_invalid_size() {
        let err = Adf::from_bytes(vec![0; 100]).expect_err("too small");
        assert_eq!(
            err.to_string(),
            "invalid ADF size: 100 bytes (expected 901120 for DD or 1802240 for HD)"
        );
    }

    #[test]
    fn accept_dd_and_hd_sizes() {
        let dd = Adf::from_bytes(vec![0; ADF_SIZE_DD]).expect("valid");
        assert_eq!(dd.sectors_per_track(), SECTORS_PER_TRACK_DD);
        assert!(!dd.is_hd());

        let hd = Adf::from_bytes(vec![0; ADF_SIZE_HD]).expect("valid");
        assert_eq!(hd.sectors_per_track(), SECTORS_PER_TRACK_HD);
        assert!(hd.is_hd());
    }

    #[test]
    fn sector_offsets_are_cylinder_major() {
        let mut adf = Adf::blank_dd();
        // Track 3 = cylinder 1, head 1.
        adf.write_sector(3, 2, &[0x5A; 512]).expect("in range");
        let track = adf.read_track_sectors(1, 1);
        assert_eq!(track[2 * 512], 0x5A);
        assert_eq!(track[2 * 512 - 1], 0);
        assert_eq!(adf.data()[(3 * 11 + 2) * 512], 0x5A);
    }

    #[test]
    fn read_track_sectors_length() {
        let adf = Adf::blank_dd();
        assert_eq!(adf.read_track_sectors(10, 0).len(), 11 * 512);
    }
}
