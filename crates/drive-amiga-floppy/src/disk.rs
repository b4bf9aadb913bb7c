//! A floppy disk as a block of raw MFM flux bytes.

use format_adf::{Adf, DiskImage, ImageKind, Img};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use crate::mfm::{
    MfmError, TRACK_SIZE, decode_amiga_track, decode_dos_track, encode_amiga_track,
    encode_dos_track,
};

pub const NUM_CYLINDERS: usize = 84;
pub const NUM_SIDES: usize = 2;
pub const NUM_TRACKS: usize = NUM_CYLINDERS * NUM_SIDES;
pub const CYLINDER_SIZE: usize = NUM_SIDES * TRACK_SIZE;
pub const DISK_SIZE: usize = NUM_CYLINDERS * CYLINDER_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DiskType {
    #[default]
    Dd35,
    Hd35,
    Sd525,
}

/// 2 sides x 84 cylinders of MFM data.
#[derive(Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Disk {
    pub disk_type: DiskType,
    data: Vec<u8>,
    pub write_protected: bool,
    pub modified: bool,
    /// Checksum of the image this disk was created from, 0 if none.
    pub fnv: u64,
}

impl std::fmt::Debug for Disk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Disk")
            .field("disk_type", &self.disk_type)
            .field("write_protected", &self.write_protected)
            .field("modified", &self.modified)
            .field("fnv", &format_args!("{:#018x}", self.fnv))
            .finish_non_exhaustive()
    }
}

impl Disk {
    /// An unformatted disk.
    #[must_use]
    pub fn new(disk_type: DiskType) -> Self {
        let mut disk = Self {
            disk_type,
            data: vec![0; DISK_SIZE],
            write_protected: false,
            modified: false,
            fnv: 0,
        };
        disk.clear_disk();
        disk
    }

    /// A disk holding the MFM encoding of `image`.
    pub fn from_image(image: &dyn DiskImage) -> Result<Self, MfmError> {
        let disk_type = if image.is_hd() {
            DiskType::Hd35
        } else {
            DiskType::Dd35
        };
        let mut disk = Self::new(disk_type);
        disk.encode_disk(image)?;
        Ok(disk)
    }

    fn index(cylinder: usize, side: usize, offset: usize) -> usize {
        assert!(cylinder < NUM_CYLINDERS, "cylinder {cylinder} out of range");
        assert!(side < NUM_SIDES, "side {side} out of range");
        assert!(offset < TRACK_SIZE, "offset {offset} out of range");
        cylinder * CYLINDER_SIZE + side * TRACK_SIZE + offset
    }

    #[must_use]
    pub fn read_byte(&self, cylinder: usize, side: usize, offset: usize) -> u8 {
        self.data[Self::index(cylinder, side, offset)]
    }

    pub fn write_byte(&mut self, value: u8, cylinder: usize, side: usize, offset: usize) {
        self.data[Self::index(cylinder, side, offset)] = value;
    }

    /// Raw bytes of track `t` (`t = cylinder * 2 + side`).
    #[must_use]
    pub fn track(&self, t: usize) -> &[u8] {
        assert!(t < NUM_TRACKS, "track {t} out of range");
        &self.data[t * TRACK_SIZE..(t + 1) * TRACK_SIZE]
    }

    pub fn track_mut(&mut self, t: usize) -> &mut [u8] {
        assert!(t < NUM_TRACKS, "track {t} out of range");
        &mut self.data[t * TRACK_SIZE..(t + 1) * TRACK_SIZE]
    }

    /// Fill the whole disk with reproducible noise.
    ///
    /// Each track starts with `$44A2`. Some copy protections look for this
    /// value on otherwise unformatted cylinders.
    pub fn clear_disk(&mut self) {
        self.fnv = 0;
        let mut rng = StdRng::seed_from_u64(0);
        rng.fill_bytes(&mut self.data);
        for t in 0..NUM_TRACKS {
            let track = self.track_mut(t);
            track[0] = 0x44;
            track[1] = 0xA2;
        }
    }

    pub fn clear_track(&mut self, t: usize) {
        let mut rng = StdRng::seed_from_u64(t as u64);
        rng.fill_bytes(self.track_mut(t));
    }

    pub fn clear_track_with(&mut self, t: usize, value: u8) {
        self.track_mut(t).fill(value);
    }

    //
    // Encoding
    //

    /// Replace the disk contents with the MFM encoding of `image`.
    pub fn encode_disk(&mut self, image: &dyn DiskImage) -> Result<(), MfmError> {
        let tracks = image.num_tracks();
        let sectors = image.sectors_per_track();
        let supported = match image.kind() {
            ImageKind::Amiga => sectors == format_adf::SECTORS_PER_TRACK_DD,
            ImageKind::Dos => sectors == 9,
        };
        if !supported || tracks as usize > NUM_TRACKS {
            return Err(MfmError::UnsupportedGeometry { tracks, sectors });
        }

        log::debug!("encoding {:?} image ({tracks} tracks, {sectors} sectors)", image.kind());
        self.clear_disk();

        let track_bytes = sectors as usize * format_adf::SECTOR_SIZE as usize;
        for t in 0..tracks as usize {
            let data = &image.data()[t * track_bytes..(t + 1) * track_bytes];
            let track = self.track_mut(t);
            match image.kind() {
                ImageKind::Amiga => encode_amiga_track(track, t as u8, sectors as u8, data),
                ImageKind::Dos => encode_dos_track(track, t as u8, sectors as u8, data),
            }
        }

        self.fnv = image.fnv();
        Ok(())
    }

    //
    // Decoding
    //

    /// Decode `tracks` Amiga tracks into `dst` (`tracks * sectors * 512` bytes).
    pub fn decode_amiga_disk(
        &self,
        dst: &mut [u8],
        tracks: usize,
        sectors: usize,
    ) -> Result<(), MfmError> {
        let track_bytes = Self::check_decode_target(dst, tracks, sectors)?;
        for (t, chunk) in dst.chunks_exact_mut(track_bytes).take(tracks).enumerate() {
            log::trace!("decoding Amiga track {t}");
            decode_amiga_track(chunk, self.track(t), sectors)?;
        }
        Ok(())
    }

    /// Decode `tracks` DOS tracks into `dst` (`tracks * sectors * 512` bytes).
    pub fn decode_dos_disk(
        &self,
        dst: &mut [u8],
        tracks: usize,
        sectors: usize,
    ) -> Result<(), MfmError> {
        let track_bytes = Self::check_decode_target(dst, tracks, sectors)?;
        for (t, chunk) in dst.chunks_exact_mut(track_bytes).take(tracks).enumerate() {
            log::trace!("decoding DOS track {t}");
            decode_dos_track(chunk, self.track(t), sectors)?;
        }
        Ok(())
    }

    /// Bytes per decoded track, once `dst` is known to hold every track.
    fn check_decode_target(dst: &[u8], tracks: usize, sectors: usize) -> Result<usize, MfmError> {
        if sectors == 0 || tracks == 0 || tracks > NUM_TRACKS {
            return Err(MfmError::UnsupportedGeometry {
                tracks: tracks as u32,
                sectors: sectors as u32,
            });
        }
        let track_bytes = sectors * 512;
        let needed = tracks * track_bytes;
        if dst.len() < needed {
            return Err(MfmError::BufferTooSmall {
                len: dst.len(),
                needed,
            });
        }
        Ok(track_bytes)
    }

    /// Decode the disk back into a double-density ADF.
    pub fn to_adf(&self) -> Result<Adf, MfmError> {
        let mut adf = Adf::blank_dd();
        let tracks = adf.num_tracks() as usize;
        let sectors = adf.sectors_per_track() as usize;
        self.decode_amiga_disk(adf.data_mut(), tracks, sectors)?;
        Ok(adf)
    }

    /// Decode the disk back into a 720K IMG.
    pub fn to_img(&self) -> Result<Img, MfmError> {
        let mut img = Img::blank_dd();
        let tracks = img.num_tracks() as usize;
        let sectors = img.sectors_per_track() as usize;
        self.decode_dos_disk(img.data_mut(), tracks, sectors)?;
        Ok(img)
    }
}

impl Default for Disk {
    fn default() -> Self {
        Self::new(DiskType::Dd35)
    }
}
