use crate::{CYLINDERS, DiskImage, HEADS, ImageError, ImageKind, SECTOR_SIZE};

const SECTORS_PER_TRACK_DD: u32 = 9;
const SECTORS_PER_TRACK_HD: u32 = 18;
pub const IMG_SIZE_DD: usize = (CYLINDERS * HEADS * SECTORS_PER_TRACK_DD * SECTOR_SIZE) as usize;
pub const IMG_SIZE_HD: usize = (CYLINDERS * HEADS * SECTORS_PER_TRACK_HD * SECTOR_SIZE) as usize;

/// A raw PC sector dump (720K or 1.44M).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Img {
    data: Vec<u8>,
    sectors_per_track: u32,
}

impl Img {
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, ImageError> {
        let sectors_per_track = match data.len() {
            IMG_SIZE_DD => SECTORS_PER_TRACK_DD,
            IMG_SIZE_HD => SECTORS_PER_TRACK_HD,
            size => {
                return Err(ImageError::InvalidSize {
                    format: "IMG",
                    size,
                    dd: IMG_SIZE_DD,
                    hd: IMG_SIZE_HD,
                });
            }
        };
        Ok(Self {
            data,
            sectors_per_track,
        })
    }

    #[must_use]
    pub fn blank_dd() -> Self {
        Self {
            data: vec![0; IMG_SIZE_DD],
            sectors_per_track: SECTORS_PER_TRACK_DD,
        }
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

impl DiskImage for Img {
    fn kind(&self) -> ImageKind {
        ImageKind::Dos
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
    fn accepts_pc_sizes_only() {
        assert!(Img::from_bytes(vec![0; IMG_SIZE_DD]).is_ok());
        assert!(Img::from_bytes(vec![0; IMG_SIZE_HD]).is_ok());
        assert!(Img::from_bytes(vec![0; crate::ADF_SIZE_DD]).is_err());
    }

    #[test]
    fn dd_image_has_nine_sectors() {
        let img = Img::blank_dd();
        assert_eq!(img.kind(), ImageKind::Dos);
        assert_eq!(img.sectors_per_track(), 9);
        assert_eq!(img.num_tracks(), 160);
    }
}
