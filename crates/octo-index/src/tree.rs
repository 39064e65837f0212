//! Tree objects from the index and the index compared against a tree.

use bstr::{BString, ByteSlice};
use octo_hash::ObjectId;
use octo_object::{FileMode, ObjectType, Tree, TreeEntry};
use octo_odb::ObjectDatabase;
use octo_utils::strmap::{KeyOwnership, StrMap};

use crate::entry::IndexEntry;
use crate::{Index, IndexError, Stage};

pub(crate) fn write_tree(index: &Index, odb: &ObjectDatabase) -> Result<ObjectId, IndexError> {
    if index.has_unmerged() {
        return Err(IndexError::Unmerged {
            paths: index.unmerged_paths(),
        });
    }
    let entries: Vec<&IndexEntry> = index
        .iter()
        .filter(|e| e.stage == Stage::Normal && !e.flags.intent_to_add)
        .collect();
    let oid = build_tree(&entries, 0, odb)?;
    tracing::debug!(tree = %oid, "wrote tree from index");
    Ok(oid)
}

/// `entries` all share the first `prefix_len` bytes of their path.
fn build_tree(
    entries: &[&IndexEntry],
    prefix_len: usize,
    odb: &ObjectDatabase,
) -> Result<ObjectId, IndexError> {
    let mut tree = Tree::default();
    let mut i = 0;
    while i < entries.len() {
        let rel = &entries[i].path[prefix_len..];
        match rel.find_byte(b'/') {
            None => {
                tree.entries.push(TreeEntry {
                    mode: entries[i].mode,
                    name: BString::from(rel),
                    oid: entries[i].oid,
                });
                i += 1;
            }
            Some(slash) => {
                let dir = &rel[..=slash];
                // Paths under one directory are contiguous in index order.
                let run = entries[i..]
                    .iter()
                    .take_while(|e| e.path[prefix_len..].starts_with(dir))
                    .count();
                let oid = build_tree(&entries[i..i + run], prefix_len + slash + 1, odb)?;
                tree.entries.push(TreeEntry {
                    mode: FileMode::Tree,
                    name: BString::from(&rel[..slash]),
                    oid,
                });
                i += run;
            }
        }
    }
    Ok(odb.write_raw(ObjectType::Tree, &tree.serialize_content())?)
}

pub(crate) fn changes_against_tree(
    index: &Index,
    odb: &ObjectDatabase,
    tree: &ObjectId,
) -> Result<Vec<BString>, IndexError> {
    let files = odb.flatten_tree(tree)?;
    let mut committed = StrMap::new(KeyOwnership::Borrow);
    for f in &files {
        committed.put(f.path.as_slice(), (f.mode, f.oid));
    }

    let mut changed = Vec::new();
    for entry in index.iter() {
        if entry.stage != Stage::Normal {
            if changed.last() != Some(&entry.path) {
                changed.push(entry.path.clone());
            }
            committed.remove(&entry.path);
            continue;
        }
        match committed.remove(&entry.path) {
            Some((mode, oid)) if entry.same_content(mode, &oid) => {}
            _ => changed.push(entry.path.clone()),
        }
    }
    changed.extend(committed.iter().map(|(path, _)| path.to_owned()));
    changed.sort();
    changed.dedup();
    Ok(changed)
}
