use std::fs;
use std::io;
use std::path::Path;

use octo_hash::{hex, HashAlgorithm, ObjectId};

use crate::OdbError;

const MIN_PREFIX_LEN: usize = 4;

/// Find the single loose object whose id starts with `prefix`.
pub(crate) fn resolve(
    objects_dir: &Path,
    algo: HashAlgorithm,
    prefix: &str,
) -> Result<Option<ObjectId>, OdbError> {
    if prefix.len() < MIN_PREFIX_LEN || prefix.len() > algo.hex_len() || !hex::is_hex(prefix) {
        return Ok(None);
    }
    let prefix = prefix.to_ascii_lowercase();
    let (dir, rest) = prefix.split_at(2);

    let entries = match fs::read_dir(objects_dir.join(dir)) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let mut found = None;
    for entry in entries {
        let name = entry?.file_name();
        let Some(name) = name.to_str() else { continue };
        if name.len() + 2 != algo.hex_len() || !name.starts_with(rest) {
            continue;
        }
        let Ok(oid) = ObjectId::from_hex(&format!("{dir}{name}")) else {
            continue;
        };
        if found.replace(oid).is_some() {
            return Err(OdbError::AmbiguousPrefix {
                prefix: prefix.clone(),
            });
        }
    }
    Ok(found)
}
