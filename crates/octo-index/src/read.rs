//! DIRC parsing for versions 2 through 4.

use bstr::BString;
use octo_hash::hasher::Hasher;
use octo_hash::{HashAlgorithm, ObjectId};
use octo_object::FileMode;

use crate::entry::{EntryFlags, IndexEntry, StatData};
use crate::{Index, IndexError, RawExtension, Stage};

pub(crate) const SIGNATURE: &[u8; 4] = b"DIRC";
const HEADER_LEN: usize = 12;
/// Stat fields plus mode: the fixed part before the object id.
pub(crate) const STAT_LEN: usize = 40;

/// Extensions carried through a read/write cycle. Everything else optional is
/// dropped; the cache tree in particular would go stale after a merge.
const KEPT_EXTENSIONS: &[&[u8; 4]] = &[b"REUC"];

pub(crate) fn parse_index(data: &[u8], algo: HashAlgorithm) -> Result<Index, IndexError> {
    let hash_len = algo.digest_len();
    if data.len() < HEADER_LEN + hash_len {
        return Err(IndexError::InvalidHeader("index file too short".into()));
    }
    if &data[..4] != SIGNATURE {
        return Err(IndexError::InvalidHeader("bad signature".into()));
    }
    verify_checksum(data, algo)?;

    let version = read_u32(&data[4..]);
    if !(2..=4).contains(&version) {
        return Err(IndexError::UnsupportedVersion(version));
    }
    let count = read_u32(&data[8..]) as usize;
    let content_end = data.len() - hash_len;

    let mut cursor = HEADER_LEN;
    let mut entries = Vec::with_capacity(count);
    let mut prev_path = BString::default();
    for _ in 0..count {
        let entry = parse_entry(data, &mut cursor, version, &prev_path, content_end, algo)?;
        prev_path = entry.path.clone();
        entries.push(entry);
    }

    let mut extensions = Vec::new();
    while cursor + 8 <= content_end {
        let mut signature = [0u8; 4];
        signature.copy_from_slice(&data[cursor..cursor + 4]);
        let size = read_u32(&data[cursor + 4..]) as usize;
        cursor += 8;
        if cursor + size > content_end {
            return Err(IndexError::InvalidHeader(format!(
                "extension {} runs past the end of the file",
                String::from_utf8_lossy(&signature)
            )));
        }
        // Uppercase first byte marks an optional extension.
        if !signature[0].is_ascii_uppercase() {
            return Err(IndexError::UnsupportedExtension(
                String::from_utf8_lossy(&signature).into_owned(),
            ));
        }
        if KEPT_EXTENSIONS.contains(&&signature) {
            extensions.push(RawExtension {
                signature,
                data: data[cursor..cursor + size].to_vec(),
            });
        } else {
            tracing::debug!(
                extension = %String::from_utf8_lossy(&signature),
                "dropping index extension"
            );
        }
        cursor += size;
    }

    Ok(Index {
        version,
        entries,
        extensions,
        hash_algo: algo,
        on_disk: true,
    })
}

/// Size of a padded v2/v3 entry.
pub(crate) fn ondisk_entry_size(hash_len: usize, name_len: usize, extended: bool) -> usize {
    let flags_len = if extended { 4 } else { 2 };
    (STAT_LEN + hash_len + flags_len + name_len + 8) & !7
}

fn parse_entry(
    data: &[u8],
    cursor: &mut usize,
    version: u32,
    prev_path: &BString,
    content_end: usize,
    algo: HashAlgorithm,
) -> Result<IndexEntry, IndexError> {
    let start = *cursor;
    let hash_len = algo.digest_len();
    let invalid = |reason: &str| IndexError::InvalidEntry {
        offset: start,
        reason: reason.to_string(),
    };

    if start + STAT_LEN + hash_len + 2 > content_end {
        return Err(invalid("entry too short"));
    }
    let d = &data[start..];
    let stat = StatData {
        ctime_secs: read_u32(d),
        ctime_nsecs: read_u32(&d[4..]),
        mtime_secs: read_u32(&d[8..]),
        mtime_nsecs: read_u32(&d[12..]),
        dev: read_u32(&d[16..]),
        ino: read_u32(&d[20..]),
        uid: read_u32(&d[28..]),
        gid: read_u32(&d[32..]),
        size: read_u32(&d[36..]),
    };
    let mode = FileMode::from_raw(read_u32(&d[24..]));
    let oid = ObjectId::from_bytes(&d[STAT_LEN..STAT_LEN + hash_len], algo)?;
    let flags = read_u16(&d[STAT_LEN + hash_len..]);
    let mut pos = start + STAT_LEN + hash_len + 2;

    let extended = flags & 0x4000 != 0;
    let stage = Stage::from_u8(((flags >> 12) & 0x3) as u8)?;
    let mut entry_flags = EntryFlags {
        assume_valid: flags & 0x8000 != 0,
        ..Default::default()
    };
    if extended {
        if version < 3 {
            return Err(invalid("extended flags in a version 2 index"));
        }
        if pos + 2 > content_end {
            return Err(invalid("truncated extended flags"));
        }
        let ext = read_u16(&data[pos..]);
        entry_flags.skip_worktree = ext & 0x4000 != 0;
        entry_flags.intent_to_add = ext & 0x2000 != 0;
        pos += 2;
    }

    let path = if version == 4 {
        let (strip, used) = read_offset_varint(&data[pos..content_end])
            .ok_or_else(|| invalid("bad path prefix length"))?;
        pos += used;
        if strip > prev_path.len() {
            return Err(invalid("path prefix longer than previous path"));
        }
        let nul = find_nul(&data[pos..content_end]).ok_or_else(|| invalid("unterminated path"))?;
        let mut path = BString::from(&prev_path[..prev_path.len() - strip]);
        path.extend_from_slice(&data[pos..pos + nul]);
        *cursor = pos + nul + 1;
        path
    } else {
        let nul = find_nul(&data[pos..content_end]).ok_or_else(|| invalid("unterminated path"))?;
        let path = BString::from(&data[pos..pos + nul]);
        *cursor = start + ondisk_entry_size(hash_len, nul, extended);
        if *cursor > content_end {
            return Err(invalid("entry padding runs past the end of the file"));
        }
        path
    };

    Ok(IndexEntry {
        path,
        oid,
        mode,
        stage,
        stat,
        flags: entry_flags,
    })
}

/// The offset varint of version 4 path compression: each continuation byte
/// adds one before shifting.
fn read_offset_varint(data: &[u8]) -> Option<(usize, usize)> {
    let mut bytes = data.iter();
    let mut c = *bytes.next()?;
    let mut value = (c & 0x7f) as usize;
    let mut used = 1;
    while c & 0x80 != 0 {
        c = *bytes.next()?;
        used += 1;
        value = value.checked_add(1)?.checked_shl(7)? | (c & 0x7f) as usize;
    }
    Some((value, used))
}

fn verify_checksum(data: &[u8], algo: HashAlgorithm) -> Result<(), IndexError> {
    let split = data.len() - algo.digest_len();
    let (content, stored) = data.split_at(split);
    // An all-zero trailer means the writer skipped hashing.
    if stored.iter().all(|&b| b == 0) {
        return Ok(());
    }
    let mut hasher = Hasher::new(algo);
    hasher.update(content);
    if hasher.finalize()?.as_bytes() != stored {
        return Err(IndexError::ChecksumMismatch);
    }
    Ok(())
}

fn find_nul(data: &[u8]) -> Option<usize> {
    data.iter().position(|&b| b == 0)
}

pub(crate) fn read_u32(data: &[u8]) -> u32 {
    u32::from_be_bytes([data[0], data[1], data[2], data[3]])
}

fn read_u16(data: &[u8]) -> u16 {
    u16::from_be_bytes([data[0], data[1]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_varint_adds_one_per_continuation() {
        assert_eq!(read_offset_varint(&[0x05]), Some((5, 1)));
        assert_eq!(read_offset_varint(&[0x80, 0x00]), Some((128, 2)));
        assert_eq!(read_offset_varint(&[0x81, 0x01]), Some((257, 2)));
        assert_eq!(read_offset_varint(&[0x80]), None);
    }

    #[test]
    fn padded_entry_sizes() {
        assert_eq!(ondisk_entry_size(20, 1, false), 64);
        assert_eq!(ondisk_entry_size(20, 8, false), 72);
        assert_eq!(ondisk_entry_size(20, 10, false), 80);
        assert_eq!(ondisk_entry_size(20, 6, true), 72);
        assert_eq!(ondisk_entry_size(32, 1, false), 80);
    }

    #[test]
    fn rejects_bad_signature_and_short_files() {
        assert!(matches!(
            parse_index(b"DIRC", HashAlgorithm::Sha1),
            Err(IndexError::InvalidHeader(_))
        ));
        let mut data = b"XXXX\0\0\0\x02\0\0\0\0".to_vec();
        data.extend_from_slice(&[0u8; 20]);
        assert!(matches!(
            parse_index(&data, HashAlgorithm::Sha1),
            Err(IndexError::InvalidHeader(_))
        ));
    }

    #[test]
    fn empty_index_with_zero_trailer() {
        let mut data = b"DIRC\0\0\0\x02\0\0\0\0".to_vec();
        data.extend_from_slice(&[0u8; 20]);
        let index = parse_index(&data, HashAlgorithm::Sha1).unwrap();
        assert!(index.is_empty());
        assert!(!index.is_unborn());
    }

    #[test]
    fn mandatory_extension_is_refused() {
        let mut data = b"DIRC\0\0\0\x02\0\0\0\0".to_vec();
        data.extend_from_slice(b"link\0\0\0\0");
        data.extend_from_slice(&[0u8; 20]);
        assert!(matches!(
            parse_index(&data, HashAlgorithm::Sha1),
            Err(IndexError::UnsupportedExtension(sig)) if sig == "link"
        ));
    }
}
