use bstr::BString;
use octo_hash::ObjectId;

use crate::commit::{parse_oid, split_headers};
use crate::{ObjectError, ObjectType};

/// Annotated tag. Only the fields needed to peel it are interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub target: ObjectId,
    pub target_type: ObjectType,
    pub name: BString,
    /// Remaining headers (tagger, ...) in order.
    pub extra_headers: Vec<(BString, BString)>,
    pub message: BString,
}

impl Tag {
    pub fn parse(content: &[u8]) -> Result<Self, ObjectError> {
        let missing = |field| ObjectError::MissingField {
            kind: ObjectType::Tag,
            field,
        };
        let (headers, message) = split_headers(content);

        let mut target = None;
        let mut target_type = None;
        let mut name = None;
        let mut extra_headers = Vec::new();
        for (key, value) in headers {
            match key.as_slice() {
                b"object" => target = Some(parse_oid(&value)?),
                b"type" => target_type = Some(ObjectType::from_bytes(&value)?),
                b"tag" => name = Some(value),
                _ => extra_headers.push((key, value)),
            }
        }

        Ok(Self {
            target: target.ok_or_else(|| missing("object"))?,
            target_type: target_type.ok_or_else(|| missing("type"))?,
            name: name.ok_or_else(|| missing("tag"))?,
            extra_headers,
            message: message.into(),
        })
    }

    pub fn serialize_content(&self) -> Vec<u8> {
        let mut out = format!(
            "object {}\ntype {}\ntag ",
            self.target, self.target_type
        )
        .into_bytes();
        out.extend_from_slice(&self.name);
        out.push(b'\n');
        for (key, value) in &self.extra_headers {
            out.extend_from_slice(key);
            out.push(b' ');
            out.extend_from_slice(value);
            out.push(b'\n');
        }
        out.push(b'\n');
        out.extend_from_slice(&self.message);
        out
    }
}
