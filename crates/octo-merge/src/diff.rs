//! Line diff used by the textual merge.
//!
//! Myers' O(ND) algorithm over interned lines, after trimming the common
//! prefix and suffix. The output is a list of [`Change`] regions rather than
//! a per-line edit script, which is what the merge needs.

use std::collections::HashMap;

/// Split into lines, each keeping its terminating `\n`. A final line without
/// a newline is still a line.
pub(crate) fn split_lines(data: &[u8]) -> Vec<&[u8]> {
    let mut lines = Vec::new();
    let mut start = 0;
    for (i, &b) in data.iter().enumerate() {
        if b == b'\n' {
            lines.push(&data[start..=i]);
            start = i + 1;
        }
    }
    if start < data.len() {
        lines.push(&data[start..]);
    }
    lines
}

/// A region where `old[old_start..old_start + old_len]` became
/// `new[new_start..new_start + new_len]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Change {
    pub old_start: usize,
    pub old_len: usize,
    pub new_start: usize,
    pub new_len: usize,
}

impl Change {
    pub fn old_end(&self) -> usize {
        self.old_start + self.old_len
    }

    pub fn new_end(&self) -> usize {
        self.new_start + self.new_len
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EditOp {
    Equal,
    Insert,
    Delete,
}

/// Changed regions between two line sequences, in order.
pub(crate) fn diff_lines(old: &[&[u8]], new: &[&[u8]]) -> Vec<Change> {
    let (old_ids, new_ids) = intern(old, new);

    let prefix = old_ids
        .iter()
        .zip(&new_ids)
        .take_while(|(a, b)| a == b)
        .count();
    let suffix = old_ids[prefix..]
        .iter()
        .rev()
        .zip(new_ids[prefix..].iter().rev())
        .take_while(|(a, b)| a == b)
        .count();

    let a = &old_ids[prefix..old_ids.len() - suffix];
    let b = &new_ids[prefix..new_ids.len() - suffix];

    let ops = if a.is_empty() {
        vec![EditOp::Insert; b.len()]
    } else if b.is_empty() {
        vec![EditOp::Delete; a.len()]
    } else {
        myers(a, b)
    };

    collect_changes(&ops, prefix)
}

/// Map every distinct line to a small integer so the search compares ids.
fn intern<'a>(old: &[&'a [u8]], new: &[&'a [u8]]) -> (Vec<usize>, Vec<usize>) {
    let mut ids: HashMap<&'a [u8], usize> = HashMap::new();
    let mut id_of = |line: &'a [u8]| -> usize {
        let next = ids.len();
        *ids.entry(line).or_insert(next)
    };
    // Two passes keep the closure borrow simple.
    let old_ids: Vec<usize> = old.iter().map(|l| id_of(l)).collect();
    let new_ids: Vec<usize> = new.iter().map(|l| id_of(l)).collect();
    (old_ids, new_ids)
}

fn myers(a: &[usize], b: &[usize]) -> Vec<EditOp> {
    let n = a.len() as isize;
    let m = b.len() as isize;
    let max = n + m;
    let idx = |k: isize| (k + max + 1) as usize;

    let mut v = vec![0isize; (2 * max + 3) as usize];
    // trace[d] holds the furthest x on diagonals -d..=d after step d.
    let mut trace: Vec<Vec<isize>> = Vec::new();

    'search: for d in 0..=max {
        let mut k = -d;
        while k <= d {
            let mut x = if k == -d || (k != d && v[idx(k - 1)] < v[idx(k + 1)]) {
                v[idx(k + 1)]
            } else {
                v[idx(k - 1)] + 1
            };
            let mut y = x - k;
            while x < n && y < m && a[x as usize] == b[y as usize] {
                x += 1;
                y += 1;
            }
            v[idx(k)] = x;
            if x >= n && y >= m {
                trace.push(v[idx(-d)..=idx(d)].to_vec());
                break 'search;
            }
            k += 2;
        }
        trace.push(v[idx(-d)..=idx(d)].to_vec());
    }

    let mut ops = Vec::with_capacity((n + m) as usize);
    let (mut x, mut y) = (n, m);
    for d in (1..trace.len() as isize).rev() {
        let prev = &trace[(d - 1) as usize];
        let at = |k: isize| prev[(k + d - 1) as usize];
        let k = x - y;
        let prev_k = if k == -d || (k != d && at(k - 1) < at(k + 1)) {
            k + 1
        } else {
            k - 1
        };
        let prev_x = at(prev_k);
        let prev_y = prev_x - prev_k;
        while x > prev_x && y > prev_y {
            ops.push(EditOp::Equal);
            x -= 1;
            y -= 1;
        }
        ops.push(if x == prev_x {
            EditOp::Insert
        } else {
            EditOp::Delete
        });
        x = prev_x;
        y = prev_y;
    }
    while x > 0 && y > 0 {
        ops.push(EditOp::Equal);
        x -= 1;
        y -= 1;
    }
    ops.reverse();
    ops
}

fn collect_changes(ops: &[EditOp], offset: usize) -> Vec<Change> {
    let mut changes = Vec::new();
    let (mut i, mut j) = (offset, offset);
    let mut current: Option<Change> = None;

    for op in ops {
        match op {
            EditOp::Equal => {
                if let Some(c) = current.take() {
                    changes.push(c);
                }
                i += 1;
                j += 1;
            }
            EditOp::Delete => {
                current
                    .get_or_insert(Change {
                        old_start: i,
                        old_len: 0,
                        new_start: j,
                        new_len: 0,
                    })
                    .old_len += 1;
                i += 1;
            }
            EditOp::Insert => {
                current
                    .get_or_insert(Change {
                        old_start: i,
                        old_len: 0,
                        new_start: j,
                        new_len: 0,
                    })
                    .new_len += 1;
                j += 1;
            }
        }
    }
    if let Some(c) = current {
        changes.push(c);
    }
    changes
}
