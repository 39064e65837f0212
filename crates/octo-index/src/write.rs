//! DIRC serialization. Writes version 3 when an entry needs extended flags,
//! version 2 otherwise.

use octo_hash::hasher::Hasher;

use crate::entry::IndexEntry;
use crate::read::{ondisk_entry_size, SIGNATURE};
use crate::{Index, IndexError};

pub(crate) fn serialize_index(index: &Index) -> Result<Vec<u8>, IndexError> {
    let hash_len = index.hash_algo.digest_len();
    let version: u32 = if index.entries.iter().any(|e| e.flags.has_extended()) {
        3
    } else {
        2
    };

    let mut buf = Vec::with_capacity(12 + index.entries.len() * 80);
    buf.extend_from_slice(SIGNATURE);
    buf.extend_from_slice(&version.to_be_bytes());
    buf.extend_from_slice(&(index.entries.len() as u32).to_be_bytes());

    for entry in &index.entries {
        write_entry(&mut buf, entry, hash_len);
    }

    for ext in &index.extensions {
        buf.extend_from_slice(&ext.signature);
        buf.extend_from_slice(&(ext.data.len() as u32).to_be_bytes());
        buf.extend_from_slice(&ext.data);
    }

    let mut hasher = Hasher::new(index.hash_algo);
    hasher.update(&buf);
    let trailer = hasher.finalize()?;
    buf.extend_from_slice(trailer.as_bytes());
    Ok(buf)
}

fn write_entry(buf: &mut Vec<u8>, entry: &IndexEntry, hash_len: usize) {
    let start = buf.len();
    let st = &entry.stat;
    for field in [
        st.ctime_secs,
        st.ctime_nsecs,
        st.mtime_secs,
        st.mtime_nsecs,
        st.dev,
        st.ino,
        entry.mode.raw(),
        st.uid,
        st.gid,
        st.size,
    ] {
        buf.extend_from_slice(&field.to_be_bytes());
    }
    buf.extend_from_slice(entry.oid.as_bytes());

    let extended = entry.flags.has_extended();
    let mut flags = entry.path.len().min(0xfff) as u16;
    flags |= (entry.stage.as_u8() as u16) << 12;
    if entry.flags.assume_valid {
        flags |= 0x8000;
    }
    if extended {
        flags |= 0x4000;
    }
    buf.extend_from_slice(&flags.to_be_bytes());
    if extended {
        let mut ext: u16 = 0;
        if entry.flags.skip_worktree {
            ext |= 0x4000;
        }
        if entry.flags.intent_to_add {
            ext |= 0x2000;
        }
        buf.extend_from_slice(&ext.to_be_bytes());
    }

    buf.extend_from_slice(&entry.path);
    let size = ondisk_entry_size(hash_len, entry.path.len(), extended);
    buf.resize(start + size, 0);
}
