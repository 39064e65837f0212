use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use octo_hash::hasher::Hasher;
use octo_hash::{HashAlgorithm, ObjectId};
use octo_object::{header, ObjectType};

use crate::OdbError;

pub(crate) fn object_path(objects_dir: &Path, oid: &ObjectId) -> PathBuf {
    objects_dir.join(oid.loose_path())
}

/// Inflate a loose object into its type and body.
pub(crate) fn read(
    objects_dir: &Path,
    oid: &ObjectId,
) -> Result<Option<(ObjectType, Vec<u8>)>, OdbError> {
    let compressed = match fs::read(object_path(objects_dir, oid)) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let mut raw = Vec::new();
    ZlibDecoder::new(compressed.as_slice())
        .read_to_end(&mut raw)
        .map_err(|e| OdbError::Corrupt {
            oid: *oid,
            reason: format!("zlib: {e}"),
        })?;

    let (kind, size, header_len) = header::parse_header(&raw)?;
    if raw.len() - header_len != size {
        return Err(OdbError::Corrupt {
            oid: *oid,
            reason: format!(
                "size mismatch: header says {size}, found {}",
                raw.len() - header_len
            ),
        });
    }
    raw.drain(..header_len);
    Ok(Some((kind, raw)))
}

/// Deflate and store an object through a temporary file and a rename.
pub(crate) fn write(
    objects_dir: &Path,
    algo: HashAlgorithm,
    kind: ObjectType,
    content: &[u8],
) -> Result<ObjectId, OdbError> {
    let hdr = header::write_header(kind, content.len());
    let mut hasher = Hasher::new(algo);
    hasher.update(&hdr);
    hasher.update(content);
    let oid = hasher.finalize()?;

    let path = object_path(objects_dir, &oid);
    if path.is_file() {
        return Ok(oid);
    }
    let fanout = path.parent().unwrap_or(objects_dir);
    fs::create_dir_all(fanout)?;

    let tmp = tempfile::Builder::new()
        .prefix("tmp_obj_")
        .tempfile_in(fanout)?;
    let mut encoder = ZlibEncoder::new(tmp, Compression::default());
    encoder.write_all(&hdr)?;
    encoder.write_all(content)?;
    let tmp = encoder.finish()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(tmp.path(), fs::Permissions::from_mode(0o444))?;
    }

    if let Err(e) = tmp.persist(&path) {
        // Another writer stored the same object first.
        if !path.is_file() {
            return Err(e.error.into());
        }
    }
    tracing::trace!(%oid, %kind, "wrote loose object");
    Ok(oid)
}
