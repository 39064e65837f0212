//! Merge bases by painting.
//!
//! Commits reachable from `one` get PARENT1, commits reachable from any of
//! `twos` get PARENT2. A commit carrying both is a common ancestor; its own
//! ancestors are painted STALE so that only the lowest ones are reported.
//! The walk goes newest-first by committer date and stops once every queued
//! commit is stale.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};

use octo_hash::ObjectId;
use octo_object::Commit;
use octo_odb::{ObjectDatabase, OdbError};

use crate::RevWalkError;

const PARENT1: u8 = 1;
const PARENT2: u8 = 2;
const STALE: u8 = 4;
const RESULT: u8 = 8;

struct QueueEntry {
    date: i64,
    seq: Reverse<u64>,
    oid: ObjectId,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    /// Newest first; equal dates in insertion order.
    fn cmp(&self, other: &Self) -> Ordering {
        self.date
            .cmp(&other.date)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

struct Painter<'a> {
    odb: &'a ObjectDatabase,
    flags: HashMap<ObjectId, u8>,
    dates: HashMap<ObjectId, i64>,
    queue: BinaryHeap<QueueEntry>,
    seq: u64,
}

impl<'a> Painter<'a> {
    fn new(odb: &'a ObjectDatabase) -> Self {
        Self {
            odb,
            flags: HashMap::new(),
            dates: HashMap::new(),
            queue: BinaryHeap::new(),
            seq: 0,
        }
    }

    fn flags(&self, oid: &ObjectId) -> u8 {
        self.flags.get(oid).copied().unwrap_or(0)
    }

    fn date(&mut self, oid: &ObjectId) -> Result<i64, RevWalkError> {
        if let Some(&d) = self.dates.get(oid) {
            return Ok(d);
        }
        let d = read_commit(self.odb, oid)?.date();
        self.dates.insert(*oid, d);
        Ok(d)
    }

    fn push(&mut self, oid: ObjectId) -> Result<(), RevWalkError> {
        let date = self.date(&oid)?;
        self.seq += 1;
        self.queue.push(QueueEntry {
            date,
            seq: Reverse(self.seq),
            oid,
        });
        Ok(())
    }

    fn has_nonstale(&self) -> bool {
        self.queue.iter().any(|e| self.flags(&e.oid) & STALE == 0)
    }

    fn paint_down_to_common(
        &mut self,
        one: &ObjectId,
        twos: &[ObjectId],
    ) -> Result<Vec<ObjectId>, RevWalkError> {
        *self.flags.entry(*one).or_default() |= PARENT1;
        self.push(*one)?;
        for two in twos {
            *self.flags.entry(*two).or_default() |= PARENT2;
            self.push(*two)?;
        }

        let mut results = Vec::new();
        while self.has_nonstale() {
            let Some(entry) = self.queue.pop() else { break };
            let mut flags = self.flags(&entry.oid) & (PARENT1 | PARENT2 | STALE);
            if flags == (PARENT1 | PARENT2) {
                let f = self.flags.entry(entry.oid).or_default();
                if *f & RESULT == 0 {
                    *f |= RESULT;
                    results.push(entry.oid);
                }
                flags |= STALE;
            }
            let commit = read_commit(self.odb, &entry.oid)?;
            for parent in &commit.parents {
                let pf = self.flags.entry(*parent).or_default();
                if *pf & flags == flags {
                    continue;
                }
                *pf |= flags;
                self.push(*parent)?;
            }
        }
        Ok(results)
    }
}

/// Best common ancestors of `one` and any of `twos`, newest first.
///
/// When `one` is itself one of `twos` the answer is just `one`.
pub fn merge_bases_many(
    odb: &ObjectDatabase,
    one: &ObjectId,
    twos: &[ObjectId],
) -> Result<Vec<ObjectId>, RevWalkError> {
    if twos.contains(one) {
        return Ok(vec![*one]);
    }

    let mut painter = Painter::new(odb);
    let found = painter.paint_down_to_common(one, twos)?;
    let mut bases: Vec<(i64, ObjectId)> = Vec::new();
    for oid in found {
        if painter.flags(&oid) & STALE == 0 {
            bases.push((painter.date(&oid)?, oid));
        }
    }
    bases.sort_by(|a, b| b.0.cmp(&a.0));
    let bases: Vec<ObjectId> = bases.into_iter().map(|(_, oid)| oid).collect();

    let bases = remove_redundant(odb, bases)?;
    tracing::debug!(one = %one.short_hex(), count = bases.len(), "computed merge bases");
    Ok(bases)
}

/// Best common ancestors of two commits.
pub fn merge_bases(
    odb: &ObjectDatabase,
    a: &ObjectId,
    b: &ObjectId,
) -> Result<Vec<ObjectId>, RevWalkError> {
    merge_bases_many(odb, a, std::slice::from_ref(b))
}

/// Whether `ancestor` is reachable from `descendant` (a commit is its own ancestor).
pub fn is_ancestor(
    odb: &ObjectDatabase,
    ancestor: &ObjectId,
    descendant: &ObjectId,
) -> Result<bool, RevWalkError> {
    Ok(merge_bases(odb, ancestor, descendant)?.contains(ancestor))
}

/// Drop any base reachable from another base. Keeps the input order.
fn remove_redundant(
    odb: &ObjectDatabase,
    bases: Vec<ObjectId>,
) -> Result<Vec<ObjectId>, RevWalkError> {
    if bases.len() <= 1 {
        return Ok(bases);
    }
    let mut redundant: HashSet<ObjectId> = HashSet::new();
    for (i, candidate) in bases.iter().enumerate() {
        for (j, other) in bases.iter().enumerate() {
            if i == j || redundant.contains(other) {
                continue;
            }
            if reaches(odb, other, candidate)? {
                redundant.insert(*candidate);
                break;
            }
        }
    }
    Ok(bases
        .into_iter()
        .filter(|oid| !redundant.contains(oid))
        .collect())
}

/// Breadth-first search from `from` for `target` through parent links.
fn reaches(odb: &ObjectDatabase, from: &ObjectId, target: &ObjectId) -> Result<bool, RevWalkError> {
    let mut queue = VecDeque::from([*from]);
    let mut seen = HashSet::from([*from]);
    while let Some(current) = queue.pop_front() {
        if current == *target {
            return Ok(true);
        }
        for parent in read_commit(odb, &current)?.parents {
            if seen.insert(parent) {
                queue.push_back(parent);
            }
        }
    }
    Ok(false)
}

fn read_commit(odb: &ObjectDatabase, oid: &ObjectId) -> Result<Commit, RevWalkError> {
    match odb.read_commit(oid) {
        Ok(commit) => Ok(commit),
        Err(OdbError::NotFound(oid)) => Err(RevWalkError::CommitNotFound(oid)),
        Err(OdbError::UnexpectedType { oid, .. }) => Err(RevWalkError::NotACommit(oid)),
        Err(e) => Err(e.into()),
    }
}
