//! MFM bit transforms and track layouts.
//!
//! Everything here is a pure function over byte slices. Track buffers are
//! exactly [`TRACK_SIZE`] bytes of raw flux data as the drive head sees it.
//!
//! Amiga sector layout (offsets relative to the sector start, 1088 bytes):
//!
//! | offset | contents |
//! |--------|----------|
//! | 0..4   | gap `$AAAA $AAAA` |
//! | 4..8   | sync `$4489 $4489` |
//! | 8..16  | info `[$FF, track, sector, sectors-to-gap]`, odd/even |
//! | 16..48 | label (16 bytes), odd/even |
//! | 48..56 | header checksum, odd/even |
//! | 56..64 | data checksum, odd/even |
//! | 64..   | data (512 bytes), odd/even |
//!
//! DOS sectors are IBM System/34 style: IDAM `A1 A1 A1 FE`, CHRN, CRC-16,
//! gap, DAM `A1 A1 A1 FB`, 512 data bytes, CRC-16, each byte expanded to
//! two flux bytes.

use thiserror::Error;

/// Bytes per encoded Amiga sector.
pub const SECTOR_SIZE: usize = 1088;
/// Bytes before the first Amiga sector.
pub const TRACK_GAP_SIZE: usize = 700;
/// Bytes per track (both formats).
pub const TRACK_SIZE: usize = 12_668;

/// Sync word marking an Amiga sector (`$A1` with a missing clock bit).
pub const SYNC_WORD: u16 = 0x4489;

const AMIGA_SYNC: [u8; 4] = [0x44, 0x89, 0x44, 0x89];
const DOS_IDAM: [u8; 8] = [0x44, 0x89, 0x44, 0x89, 0x44, 0x89, 0x55, 0x54];
const DOS_IAM: [u8; 8] = [0x52, 0x24, 0x52, 0x24, 0x52, 0x24, 0x55, 0x52];

/// Raw (pre-MFM) size of one DOS sector including gaps.
const DOS_SECTOR_RAW: usize = 683;
/// Distance between two DOS sector starts on the track.
const DOS_SECTOR_STRIDE: usize = 1300;
/// Offset of the first DOS sector on the track.
const DOS_FIRST_SECTOR: usize = 194;
/// From the end of an IDAM to the first encoded data byte: CHRN + CRC,
/// gap, sync zeros and the data address mark (all doubled by MFM).
const DOS_IDAM_TO_DATA: usize = 88;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MfmError {
    #[error("found {found} sectors, expected {expected}")]
    SectorCount { found: usize, expected: usize },
    #[error("invalid sector number {0}")]
    InvalidSectorNumber(u8),
    #[error("unsupported disk geometry: {tracks} tracks x {sectors} sectors")]
    UnsupportedGeometry { tracks: u32, sectors: u32 },
    #[error("destination holds {len} bytes, {needed} needed")]
    BufferTooSmall { len: usize, needed: usize },
}

/// Split `src` into its odd bits (first half of `dst`) and even bits
/// (second half). `dst` must hold `2 * src.len()` bytes.
pub fn encode_odd_even(dst: &mut [u8], src: &[u8]) {
    let n = src.len();
    for (i, &byte) in src.iter().enumerate() {
        dst[i] = (byte >> 1) & 0x55;
        dst[i + n] = byte & 0x55;
    }
}

/// Inverse of [`encode_odd_even`]. Clock bits in `src` are ignored.
pub fn decode_odd_even(dst: &mut [u8], src: &[u8]) {
    let n = dst.len();
    for (i, byte) in dst.iter_mut().enumerate() {
        *byte = ((src[i] & 0x55) << 1) | (src[i + n] & 0x55);
    }
}

/// Fill in the clock bits of an encoded byte.
///
/// A clock bit is set only between two zero data bits. The leftmost clock
/// bit depends on the last data bit of `previous`.
#[must_use]
pub fn add_clock_bits(value: u8, previous: u8) -> u8 {
    let value = value & 0x55;
    let neighbours = (value << 1) | (value >> 1) | (previous << 7);
    value | (neighbours ^ 0xAA)
}

/// Run [`add_clock_bits`] over `buf[start..start + len]`, each byte taking
/// its predecessor in the buffer as context. `start` must be at least 1.
pub fn add_clock_bits_range(buf: &mut [u8], start: usize, len: usize) {
    for i in start..start + len {
        buf[i] = add_clock_bits(buf[i], buf[i - 1]);
    }
}

/// Expand every byte of `src` into two bytes with the data bits in the
/// even bit positions. `dst` must hold `2 * src.len()` bytes.
pub fn encode_mfm(dst: &mut [u8], src: &[u8]) {
    for (i, &byte) in src.iter().enumerate() {
        let mut word = 0u16;
        for bit in 0..8 {
            word |= u16::from((byte >> bit) & 1) << (2 * bit);
        }
        dst[2 * i] = (word >> 8) as u8;
        dst[2 * i + 1] = word as u8;
    }
}

/// Inverse of [`encode_mfm`]. Clock bits in `src` are ignored.
pub fn decode_mfm(dst: &mut [u8], src: &[u8]) {
    for (i, byte) in dst.iter_mut().enumerate() {
        let word = u16::from_be_bytes([src[2 * i], src[2 * i + 1]]);
        let mut value = 0u8;
        for bit in 0..8 {
            value |= (((word >> (2 * bit)) & 1) as u8) << bit;
        }
        *byte = value;
    }
}

/// CRC-16/CCITT (polynomial 0x1021, initial value 0xFFFF).
#[must_use]
pub fn crc16(bytes: &[u8]) -> u16 {
    bytes.iter().fold(0xFFFF, |crc, &b| {
        let mut crc = crc ^ (u16::from(b) << 8);
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
        crc
    })
}

/// XOR of all 4-byte lanes in `bytes`.
fn lane_checksum(bytes: &[u8]) -> [u8; 4] {
    let mut check = [0u8; 4];
    for lane in bytes.chunks_exact(4) {
        for (c, b) in check.iter_mut().zip(lane) {
            *c ^= b;
        }
    }
    check
}

//
// Amiga format
//

/// Encode a full Amiga track. `data` holds `sectors * 512` bytes.
pub fn encode_amiga_track(track: &mut [u8], t: u8, sectors: u8, data: &[u8]) {
    track[..TRACK_SIZE].fill(0xAA);

    for s in 0..sectors {
        let start = usize::from(s) * 512;
        encode_amiga_sector(track, t, s, sectors, &data[start..start + 512]);
    }

    // Clock bit of the first byte as seen after the track wraps around.
    if track[TRACK_SIZE - 1] & 1 != 0 {
        track[0] &= 0x7F;
    }
}

/// Encode one Amiga sector into its slot on `track`.
pub fn encode_amiga_sector(track: &mut [u8], t: u8, s: u8, sectors: u8, data: &[u8]) {
    let p = TRACK_GAP_SIZE + usize::from(s) * SECTOR_SIZE;
    let sector = &mut track[p - 1..p + SECTOR_SIZE];
    // `sector[0]` is the last byte of the preceding gap or sector.
    let (prev, sector) = sector.split_at_mut(1);

    sector[0] = if prev[0] & 1 != 0 { 0x2A } else { 0xAA };
    sector[1..4].fill(0xAA);
    sector[4..8].copy_from_slice(&AMIGA_SYNC);

    let info = [0xFF, t, s, sectors - s];
    encode_odd_even(&mut sector[8..16], &info);
    sector[16..48].fill(0xAA);
    encode_odd_even(&mut sector[64..SECTOR_SIZE], data);

    let header_check = lane_checksum(&sector[8..48]);
    encode_odd_even(&mut sector[48..56], &header_check);
    let data_check = lane_checksum(&sector[64..SECTOR_SIZE]);
    encode_odd_even(&mut sector[56..64], &data_check);

    add_clock_bits_range(sector, 8, SECTOR_SIZE - 8);
}

/// Recover `sectors` sectors from an Amiga track into `dst`.
///
/// The track is scanned as a doubled copy so that a sector straddling the
/// index position is found intact. Sectors are placed by the number in
/// their info block.
pub fn decode_amiga_track(dst: &mut [u8], track: &[u8], sectors: usize) -> Result<(), MfmError> {
    let local = doubled(track);
    let mut starts = vec![None; sectors];
    let mut found = 0;
    let mut index = 0;

    while index < TRACK_SIZE + SECTOR_SIZE && found < sectors {
        if local[index..index + 4] != AMIGA_SYNC {
            index += 1;
            continue;
        }
        index += 4;

        // A third sync word belongs to a DOS IDAM, not an Amiga sector.
        if local[index + 1] == 0x89 {
            continue;
        }

        let mut info = [0u8; 4];
        decode_odd_even(&mut info, &local[index..index + 8]);
        let nr = info[2];
        let slot = starts
            .get_mut(usize::from(nr))
            .ok_or(MfmError::InvalidSectorNumber(nr))?;
        if slot.is_some() {
            break;
        }
        *slot = Some(index);
        found += 1;
    }

    if found != sectors {
        log::warn!("found {found} sectors, expected {sectors}");
        return Err(MfmError::SectorCount {
            found,
            expected: sectors,
        });
    }

    for (chunk, start) in dst.chunks_exact_mut(512).zip(starts.into_iter().flatten()) {
        // The sync words end 8 bytes into the sector, data starts at 64.
        decode_odd_even(chunk, &local[start + 56..start + 56 + 1024]);
    }
    Ok(())
}

//
// DOS format
//

/// Encode a full DOS track. `data` holds `sectors * 512` bytes.
pub fn encode_dos_track(track: &mut [u8], t: u8, sectors: u8, data: &[u8]) {
    for pair in track[..TRACK_SIZE].chunks_exact_mut(2) {
        pair.copy_from_slice(&[0x92, 0x54]);
    }

    // Gap and index address mark.
    track[82..106].fill(0xAA);
    track[106..114].copy_from_slice(&DOS_IAM);

    for s in 0..sectors {
        let start = usize::from(s) * 512;
        encode_dos_sector(track, t, s, &data[start..start + 512]);
    }
}

/// Encode one DOS sector into its slot on `track`.
pub fn encode_dos_sector(track: &mut [u8], t: u8, s: u8, data: &[u8]) {
    let mut buf = [0u8; DOS_SECTOR_RAW];

    // ID field
    buf[12..16].copy_from_slice(&[0xA1, 0xA1, 0xA1, 0xFE]);
    buf[16..20].copy_from_slice(&[t / 2, t % 2, s + 1, 2]);
    let crc = crc16(&buf[12..20]);
    buf[20..22].copy_from_slice(&crc.to_be_bytes());

    // Data field
    buf[22..44].fill(0x4E);
    buf[56..60].copy_from_slice(&[0xA1, 0xA1, 0xA1, 0xFB]);
    buf[60..572].copy_from_slice(data);
    let crc = crc16(&buf[56..572]);
    buf[572..574].copy_from_slice(&crc.to_be_bytes());
    buf[574..].fill(0x4E);

    let p = DOS_FIRST_SECTOR + usize::from(s) * DOS_SECTOR_STRIDE;
    encode_mfm(&mut track[p..p + 2 * DOS_SECTOR_RAW], &buf);
    add_clock_bits_range(track, p, 2 * DOS_SECTOR_RAW);

    // The A1 sync bytes are written with one clock bit missing.
    for k in [12, 13, 14, 56, 57, 58] {
        track[p + 2 * k + 1] &= 0xDF;
    }
}

/// Recover `sectors` sectors from a DOS track into `dst`.
pub fn decode_dos_track(dst: &mut [u8], track: &[u8], sectors: usize) -> Result<(), MfmError> {
    let local = doubled(track);
    let mut starts = vec![None; sectors];
    let mut found = 0;
    let mut index = 0;

    while index < TRACK_SIZE + TRACK_SIZE / 2 {
        if local[index..index + 8] != DOS_IDAM {
            index += 1;
            continue;
        }
        index += 8;

        let mut chrn = [0u8; 4];
        decode_mfm(&mut chrn, &local[index..index + 8]);
        let r = chrn[2];
        if r == 0 || usize::from(r) > sectors {
            log::warn!("invalid sector number {r}");
            return Err(MfmError::InvalidSectorNumber(r));
        }
        let slot = &mut starts[usize::from(r) - 1];
        if slot.is_some() {
            break;
        }
        *slot = Some(index + DOS_IDAM_TO_DATA);
        found += 1;
    }

    if found != sectors {
        log::warn!("found {found} sectors, expected {sectors}");
        return Err(MfmError::SectorCount {
            found,
            expected: sectors,
        });
    }

    for (chunk, start) in dst.chunks_exact_mut(512).zip(starts.into_iter().flatten()) {
        decode_mfm(chunk, &local[start..start + 1024]);
    }
    Ok(())
}

fn doubled(track: &[u8]) -> Vec<u8> {
    let mut local = Vec::with_capacity(2 * TRACK_SIZE);
    local.extend_from_slice(&track[..TRACK_SIZE]);
    local.extend_from_slice(&track[..TRACK_SIZE]);
    local
}
