use crate::{ObjectError, ObjectType};

/// Split `<type> <size>\0` off the front of `data`.
///
/// Returns the type, the declared content size and the header length
/// including the terminating NUL.
pub fn parse_header(data: &[u8]) -> Result<(ObjectType, usize, usize), ObjectError> {
    let nul = data
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| ObjectError::InvalidHeader("missing NUL terminator".into()))?;
    let header = &data[..nul];
    let space = header
        .iter()
        .position(|&b| b == b' ')
        .ok_or_else(|| ObjectError::InvalidHeader("missing space".into()))?;

    let kind = ObjectType::from_bytes(&header[..space])?;
    let size = std::str::from_utf8(&header[space + 1..])
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .ok_or_else(|| {
            ObjectError::InvalidHeader(format!(
                "invalid size '{}'",
                String::from_utf8_lossy(&header[space + 1..])
            ))
        })?;
    Ok((kind, size, nul + 1))
}

pub fn write_header(kind: ObjectType, size: usize) -> Vec<u8> {
    format!("{kind} {size}\0").into_bytes()
}
