use bstr::{BString, ByteSlice};
use octo_hash::ObjectId;

use crate::{ObjectError, ObjectType};

/// Identity line of a commit: `Name <email> <seconds> <+hhmm>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub name: BString,
    pub email: BString,
    /// Seconds since the epoch.
    pub time: i64,
    /// Timezone offset as written, e.g. `+0100`.
    pub tz: BString,
}

impl Signature {
    pub fn new(name: &str, email: &str, time: i64) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            time,
            tz: "+0000".into(),
        }
    }

    pub fn parse(line: &[u8]) -> Result<Self, ObjectError> {
        let invalid = || ObjectError::InvalidSignature(BString::from(line));
        let open = line.find_byte(b'<').ok_or_else(invalid)?;
        let close = line.rfind_byte(b'>').ok_or_else(invalid)?;
        if close < open {
            return Err(invalid());
        }
        let name = line[..open].trim_end();
        let email = &line[open + 1..close];

        let mut fields = line[close + 1..].fields();
        let time = fields
            .next()
            .and_then(|t| t.to_str().ok())
            .and_then(|t| t.parse::<i64>().ok())
            .ok_or_else(invalid)?;
        let tz = fields.next().unwrap_or(b"+0000");

        Ok(Self {
            name: name.into(),
            email: email.into(),
            time,
            tz: tz.into(),
        })
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.name);
        out.extend_from_slice(b" <");
        out.extend_from_slice(&self.email);
        out.extend_from_slice(b"> ");
        out.extend_from_slice(self.time.to_string().as_bytes());
        out.push(b' ');
        out.extend_from_slice(&self.tz);
    }
}

/// A point in history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub tree: ObjectId,
    pub parents: Vec<ObjectId>,
    pub author: Signature,
    pub committer: Signature,
    /// Headers after `committer` (encoding, gpgsig, mergetag...), with
    /// continuation lines joined by `\n`.
    pub extra_headers: Vec<(BString, BString)>,
    pub message: BString,
}

impl Commit {
    pub fn parse(content: &[u8]) -> Result<Self, ObjectError> {
        let missing = |field| ObjectError::MissingField {
            kind: ObjectType::Commit,
            field,
        };
        let (headers, message) = split_headers(content);

        let mut tree = None;
        let mut parents = Vec::new();
        let mut author = None;
        let mut committer = None;
        let mut extra_headers = Vec::new();
        for (key, value) in headers {
            match key.as_slice() {
                b"tree" => tree = Some(parse_oid(&value)?),
                b"parent" => parents.push(parse_oid(&value)?),
                b"author" => author = Some(Signature::parse(&value)?),
                b"committer" => committer = Some(Signature::parse(&value)?),
                _ => extra_headers.push((key, value)),
            }
        }

        Ok(Self {
            tree: tree.ok_or_else(|| missing("tree"))?,
            parents,
            author: author.ok_or_else(|| missing("author"))?,
            committer: committer.ok_or_else(|| missing("committer"))?,
            extra_headers,
            message: message.into(),
        })
    }

    pub fn serialize_content(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(format!("tree {}\n", self.tree).as_bytes());
        for parent in &self.parents {
            out.extend_from_slice(format!("parent {parent}\n").as_bytes());
        }
        out.extend_from_slice(b"author ");
        self.author.write_to(&mut out);
        out.extend_from_slice(b"\ncommitter ");
        self.committer.write_to(&mut out);
        out.push(b'\n');
        for (key, value) in &self.extra_headers {
            out.extend_from_slice(key);
            out.push(b' ');
            out.extend_from_slice(&value.replace("\n", "\n "));
            out.push(b'\n');
        }
        out.push(b'\n');
        out.extend_from_slice(&self.message);
        out
    }

    /// Committer timestamp, which orders history walks.
    pub fn date(&self) -> i64 {
        self.committer.time
    }
}

pub(crate) fn parse_oid(value: &[u8]) -> Result<ObjectId, ObjectError> {
    let hex = value
        .to_str()
        .map_err(|_| ObjectError::InvalidHeader("non-ASCII object id".into()))?;
    Ok(ObjectId::from_hex(hex)?)
}

/// Split a commit or tag body into its header list and message.
pub(crate) fn split_headers(content: &[u8]) -> (Vec<(BString, BString)>, &[u8]) {
    let mut headers: Vec<(BString, BString)> = Vec::new();
    let mut pos = 0;
    while pos < content.len() {
        let end = content[pos..]
            .find_byte(b'\n')
            .map_or(content.len(), |i| pos + i);
        let line = &content[pos..end];
        pos = (end + 1).min(content.len());
        if line.is_empty() {
            break;
        }
        match line.strip_prefix(b" ") {
            Some(continuation) => {
                if let Some((_, value)) = headers.last_mut() {
                    value.push(b'\n');
                    value.extend_from_slice(continuation);
                }
            }
            None => {
                let (key, value) = match line.find_byte(b' ') {
                    Some(i) => (&line[..i], &line[i + 1..]),
                    None => (line, &b""[..]),
                };
                headers.push((key.into(), value.into()));
            }
        }
    }
    (headers, &content[pos..])
}
