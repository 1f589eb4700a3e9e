//! On-disk region file format.
//!
//! One file stores up to `REGION_SIZE × REGION_SIZE` chunk payloads of one
//! layer.
//!
//! ## Binary Layout
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0 | 8 | Magic bytes `".STRREG\0"` |
//! | 8 | 1 | Format version (`u8`, currently 2) |
//! | 9 | 1 | Flags (`u8`, written as 0) |
//! | 10 | … | Body: per present slot, ascending, `length: u32 BE` + payload |
//! | len−4096 | 4096 | Offset table: 1024 × `u32 BE`, absolute position of each slot's length prefix, 0 = absent |
//!
//! Slot index is `local_z * REGION_SIZE + local_x`.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::RegionError;

/// Magic bytes identifying a region file.
pub const REGION_MAGIC: [u8; 8] = *b".STRREG\0";

/// Current format version. Files with a higher version are rejected.
pub const REGION_FORMAT_VERSION: u8 = 2;

/// Chunks per region side.
pub const REGION_SIZE: i32 = 32;

/// Chunk slots per region.
pub const REGION_SLOTS: usize = (REGION_SIZE * REGION_SIZE) as usize;

/// Header length in bytes.
pub const HEADER_LEN: u64 = 10;

/// Offset table length in bytes.
pub const TABLE_LEN: u64 = REGION_SLOTS as u64 * 4;

/// Region coordinates containing chunk `(cx, cz)`.
pub fn region_coords(cx: i32, cz: i32) -> (i32, i32) {
    (cx.div_euclid(REGION_SIZE), cz.div_euclid(REGION_SIZE))
}

/// Slot index of chunk `(cx, cz)` inside its region.
pub fn slot_index(cx: i32, cz: i32) -> usize {
    let lx = cx.rem_euclid(REGION_SIZE);
    let lz = cz.rem_euclid(REGION_SIZE);
    (lz * REGION_SIZE + lx) as usize
}

/// Chunk coordinates stored in `slot` of region `(rx, rz)`.
pub fn slot_chunk(rx: i32, rz: i32, slot: usize) -> (i32, i32) {
    let slot = slot as i32;
    (
        rx * REGION_SIZE + slot % REGION_SIZE,
        rz * REGION_SIZE + slot / REGION_SIZE,
    )
}

/// File name of region `(rx, rz)` inside a layer directory.
pub fn region_file_name(rx: i32, rz: i32) -> String {
    format!("{rx}_{rz}.bin")
}

/// Parses a name produced by [`region_file_name`].
pub fn parse_region_file_name(name: &str) -> Option<(i32, i32)> {
    let (rx, rz) = name.strip_suffix(".bin")?.split_once('_')?;
    Some((rx.parse().ok()?, rz.parse().ok()?))
}

/// Parsed region header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegionHeader {
    pub version: u8,
    pub flags: u8,
}

/// Reads and validates the header at the start of `file`.
///
/// Older versions are accepted; newer ones are rejected.
pub fn read_header(file: &mut File, path: &Path) -> Result<RegionHeader, RegionError> {
    let len = file.metadata()?.len();
    if len < HEADER_LEN + TABLE_LEN {
        return Err(corrupted(path, format!("file is only {len} bytes")));
    }
    let mut header = [0u8; HEADER_LEN as usize];
    file.seek(SeekFrom::Start(0))?;
    file.read_exact(&mut header)?;
    if header[..8] != REGION_MAGIC {
        return Err(RegionError::InvalidMagic(path.to_path_buf()));
    }
    let version = header[8];
    if version > REGION_FORMAT_VERSION {
        return Err(RegionError::UnsupportedVersion {
            found: version,
            supported: REGION_FORMAT_VERSION,
        });
    }
    Ok(RegionHeader {
        version,
        flags: header[9],
    })
}

/// Reads the raw payload of one slot from an open, validated region file.
///
/// Returns `Ok(None)` for an absent slot.
pub fn read_slot(file: &mut File, path: &Path, slot: usize) -> Result<Option<Vec<u8>>, RegionError> {
    let len = file.metadata()?.len();
    let Some(table_start) = len.checked_sub(TABLE_LEN) else {
        return Err(corrupted(path, format!("file is only {len} bytes")));
    };

    let mut entry = [0u8; 4];
    file.seek(SeekFrom::Start(table_start + slot as u64 * 4))?;
    file.read_exact(&mut entry)?;
    let offset = u64::from(u32::from_be_bytes(entry));
    if offset == 0 {
        return Ok(None);
    }
    if offset < HEADER_LEN || offset + 4 > table_start {
        return Err(corrupted(path, format!("slot {slot} offset {offset} out of range")));
    }

    let mut length = [0u8; 4];
    file.seek(SeekFrom::Start(offset))?;
    file.read_exact(&mut length)?;
    let length = u64::from(u32::from_be_bytes(length));
    if offset + 4 + length > table_start {
        return Err(corrupted(path, format!("slot {slot} length {length} overruns body")));
    }

    let mut payload = vec![0u8; length as usize];
    file.read_exact(&mut payload)?;
    Ok(Some(payload))
}

/// Fully parsed region file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegionContents {
    pub header: RegionHeader,
    /// Raw payloads keyed by slot index.
    pub slots: BTreeMap<usize, Vec<u8>>,
}

/// Reads every present slot of the region file at `path`.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn read_region(path: &Path) -> Result<Option<RegionContents>, RegionError> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let header = read_header(&mut file, path)?;
    let mut slots = BTreeMap::new();
    for slot in 0..REGION_SLOTS {
        if let Some(payload) = read_slot(&mut file, path, slot)? {
            slots.insert(slot, payload);
        }
    }
    Ok(Some(RegionContents { header, slots }))
}

/// Serializes a region with the given raw slot payloads.
pub fn encode_region(slots: &BTreeMap<usize, Vec<u8>>) -> Vec<u8> {
    let body: usize = slots.values().map(|p| 4 + p.len()).sum();
    let mut buf = Vec::with_capacity(HEADER_LEN as usize + body + TABLE_LEN as usize);
    buf.extend_from_slice(&REGION_MAGIC);
    buf.push(REGION_FORMAT_VERSION);
    buf.push(0);

    let mut table = vec![0u32; REGION_SLOTS];
    for (&slot, payload) in slots {
        table[slot] = buf.len() as u32;
        buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        buf.extend_from_slice(payload);
    }
    for offset in table {
        buf.extend_from_slice(&offset.to_be_bytes());
    }
    buf
}

/// Writes a region file atomically: the bytes go to a sibling temporary file
/// which is then renamed over `path`.
pub fn write_region(path: &Path, slots: &BTreeMap<usize, Vec<u8>>) -> Result<(), RegionError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = temp_path(path);
    {
        let mut file = File::create(&tmp)?;
        file.write_all(&encode_region(slots))?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn corrupted(path: &Path, reason: String) -> RegionError {
    RegionError::Corrupted {
        path: path.to_path_buf(),
        reason,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_coords_and_slots() {
        assert_eq!(region_coords(0, 0), (0, 0));
        assert_eq!(region_coords(31, 32), (0, 1));
        assert_eq!(region_coords(-1, -33), (-1, -2));
        assert_eq!(slot_index(0, 0), 0);
        assert_eq!(slot_index(5, 0), 5);
        assert_eq!(slot_index(31, 31), 1023);
        assert_eq!(slot_index(-1, -1), 1023);
        assert_eq!(slot_index(33, 1), 33);
    }

    #[test]
    fn test_empty_region_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("0_0.bin");
        write_region(&path, &BTreeMap::new()).unwrap();

        let len = std::fs::metadata(&path).unwrap().len();
        assert_eq!(len, HEADER_LEN + TABLE_LEN);

        let contents = read_region(&path).unwrap().unwrap();
        assert!(contents.slots.is_empty());
        assert_eq!(contents.header.version, REGION_FORMAT_VERSION);
    }

    #[test]
    fn test_slots_0_5_1023_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("-1_2.bin");
        let mut slots = BTreeMap::new();
        slots.insert(0, vec![1u8, 2, 3]);
        slots.insert(5, vec![]);
        slots.insert(1023, vec![0xFFu8; 1000]);
        write_region(&path, &slots).unwrap();

        let contents = read_region(&path).unwrap().unwrap();
        assert_eq!(contents.slots, slots);

        let mut file = File::open(&path).unwrap();
        read_header(&mut file, &path).unwrap();
        for slot in 0..REGION_SLOTS {
            let payload = read_slot(&mut file, &path, slot).unwrap();
            assert_eq!(payload.as_ref(), slots.get(&slot), "slot {slot}");
        }
    }

    #[test]
    fn test_first_record_offset_follows_header() {
        let mut slots = BTreeMap::new();
        slots.insert(7, vec![9u8; 4]);
        let bytes = encode_region(&slots);
        let table_start = bytes.len() - TABLE_LEN as usize;
        let entry = &bytes[table_start + 7 * 4..table_start + 8 * 4];
        assert_eq!(u32::from_be_bytes(entry.try_into().unwrap()), HEADER_LEN as u32);
        assert_eq!(&bytes[10..14], &[0, 0, 0, 4]);
    }

    #[test]
    fn test_newer_version_rejected_older_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("0_0.bin");
        let mut bytes = encode_region(&BTreeMap::new());

        bytes[8] = REGION_FORMAT_VERSION + 1;
        std::fs::write(&path, &bytes).unwrap();
        assert!(matches!(
            read_region(&path),
            Err(RegionError::UnsupportedVersion { found: 3, supported: 2 })
        ));

        bytes[8] = 1;
        std::fs::write(&path, &bytes).unwrap();
        assert_eq!(read_region(&path).unwrap().unwrap().header.version, 1);
    }

    #[test]
    fn test_bad_magic_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("0_0.bin");
        let mut bytes = encode_region(&BTreeMap::new());
        bytes[0] = b'X';
        std::fs::write(&path, &bytes).unwrap();
        assert!(matches!(read_region(&path), Err(RegionError::InvalidMagic(_))));
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_region(&dir.path().join("9_9.bin")).unwrap().is_none());
    }

    #[test]
    fn test_offset_past_body_is_corrupted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("0_0.bin");
        let mut bytes = encode_region(&BTreeMap::new());
        let table_start = bytes.len() - TABLE_LEN as usize;
        bytes[table_start..table_start + 4].copy_from_slice(&5000u32.to_be_bytes());
        std::fs::write(&path, &bytes).unwrap();
        assert!(matches!(read_region(&path), Err(RegionError::Corrupted { .. })));
    }

    #[test]
    fn test_region_file_names() {
        assert_eq!(region_file_name(-3, 12), "-3_12.bin");
        assert_eq!(parse_region_file_name("-3_12.bin"), Some((-3, 12)));
        assert_eq!(parse_region_file_name("0_0.bin.tmp"), None);
        assert_eq!(parse_region_file_name("a_b.bin"), None);
    }

    #[test]
    fn test_slot_chunk_inverts_slot_index() {
        for (cx, cz) in [(0, 0), (31, 31), (-1, -1), (-33, 40), (100, -7)] {
            let (rx, rz) = region_coords(cx, cz);
            assert_eq!(slot_chunk(rx, rz, slot_index(cx, cz)), (cx, cz));
        }
    }
}
