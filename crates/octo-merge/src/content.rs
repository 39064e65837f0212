//! Three-way textual merge.
//!
//! Diffs base→ours and base→theirs, takes one-sided changes as they are and
//! emits conflict markers where both sides touched the same or adjacent base
//! lines differently. Conflicts are then narrowed according to the
//! [`ConflictStyle`]: `merge` splits a conflict wherever the two sides agree
//! and glues back fragments separated by a few lines or by punctuation only;
//! `zdiff3` only moves a shared prefix and suffix out of the conflict;
//! `diff3` leaves conflicts whole so the base section stays meaningful.

use crate::diff::{diff_lines, split_lines};
use crate::{ConflictStyle, ContentMergeResult};

const MARKER_LEN: usize = 7;

/// Gaps of at most this many lines between two conflicts are folded into one.
const MAX_GAP: usize = 3;

/// Labels for conflict markers.
#[derive(Debug, Clone)]
pub struct MergeLabels<'a> {
    pub base: &'a str,
    pub ours: &'a str,
    pub theirs: &'a str,
}

impl Default for MergeLabels<'_> {
    fn default() -> Self {
        Self {
            base: "base",
            ours: "ours",
            theirs: "theirs",
        }
    }
}

/// Merge `ours` and `theirs` relative to `base`.
///
/// An empty `base` is an add/add merge: every line either side has is new,
/// so only lines both sides share survive outside conflict markers.
pub fn merge_content(
    base: &[u8],
    ours: &[u8],
    theirs: &[u8],
    style: ConflictStyle,
    labels: &MergeLabels<'_>,
) -> ContentMergeResult {
    if ours == theirs || base == theirs {
        return ContentMergeResult::Clean(ours.to_vec());
    }
    if base == ours {
        return ContentMergeResult::Clean(theirs.to_vec());
    }

    let base_lines = split_lines(base);
    let ours_lines = split_lines(ours);
    let theirs_lines = split_lines(theirs);

    let segments = collect_segments(&base_lines, &ours_lines, &theirs_lines);
    let segments = match style {
        ConflictStyle::Merge => simplify_gaps(refine_conflicts(segments)),
        ConflictStyle::ZDiff3 => trim_conflicts(segments),
        ConflictStyle::Diff3 => segments,
    };

    let mut output = Vec::with_capacity(ours.len().max(theirs.len()));
    let mut conflict_count = 0;
    for segment in &segments {
        match segment {
            Segment::Common(lines) | Segment::Taken(lines) => push_lines(&mut output, lines),
            Segment::Conflict(conflict) => {
                conflict_count += 1;
                emit_conflict(&mut output, conflict, style, labels);
            }
        }
    }

    if conflict_count == 0 {
        ContentMergeResult::Clean(output)
    } else {
        ContentMergeResult::Conflict {
            content: output,
            conflict_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment<'a> {
    /// Lines neither side changed.
    Common(Vec<&'a [u8]>),
    /// A change made by one side, or identically by both.
    Taken(Vec<&'a [u8]>),
    Conflict(Conflict<'a>),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct Conflict<'a> {
    base: Vec<&'a [u8]>,
    ours: Vec<&'a [u8]>,
    theirs: Vec<&'a [u8]>,
}

/// Walk both change lists in base order, grouping changes whose base ranges
/// overlap or touch.
fn collect_segments<'a>(
    base: &[&'a [u8]],
    ours: &[&'a [u8]],
    theirs: &[&'a [u8]],
) -> Vec<Segment<'a>> {
    let ours_changes = diff_lines(base, ours);
    let theirs_changes = diff_lines(base, theirs);

    let mut segments = Vec::new();
    let mut base_pos = 0;
    let (mut oi, mut ti) = (0, 0);
    let (mut ours_delta, mut theirs_delta) = (0isize, 0isize);

    loop {
        let start = match (ours_changes.get(oi), theirs_changes.get(ti)) {
            (None, None) => break,
            (Some(o), None) => o.old_start,
            (None, Some(t)) => t.old_start,
            (Some(o), Some(t)) => o.old_start.min(t.old_start),
        };

        let (o_first, t_first) = (oi, ti);
        let mut end = start;
        loop {
            if let Some(c) = ours_changes.get(oi).filter(|c| c.old_start <= end) {
                end = end.max(c.old_end());
                oi += 1;
            } else if let Some(c) = theirs_changes.get(ti).filter(|c| c.old_start <= end) {
                end = end.max(c.old_end());
                ti += 1;
            } else {
                break;
            }
        }

        if base_pos < start {
            segments.push(Segment::Common(base[base_pos..start].to_vec()));
        }
        base_pos = end;

        let ours_growth: isize = ours_changes[o_first..oi].iter().map(growth).sum();
        let theirs_growth: isize = theirs_changes[t_first..ti].iter().map(growth).sum();
        let ours_side = side_range(ours, start, end, ours_delta, ours_growth);
        let theirs_side = side_range(theirs, start, end, theirs_delta, theirs_growth);
        ours_delta += ours_growth;
        theirs_delta += theirs_growth;

        let ours_touched = oi > o_first;
        let theirs_touched = ti > t_first;
        let segment = if !theirs_touched {
            Segment::Taken(ours_side.to_vec())
        } else if !ours_touched || ours_side == theirs_side {
            Segment::Taken(theirs_side.to_vec())
        } else {
            Segment::Conflict(Conflict {
                base: base[start..end].to_vec(),
                ours: ours_side.to_vec(),
                theirs: theirs_side.to_vec(),
            })
        };
        segments.push(segment);
    }

    if base_pos < base.len() {
        segments.push(Segment::Common(base[base_pos..].to_vec()));
    }
    segments
}

fn growth(c: &crate::diff::Change) -> isize {
    c.new_len as isize - c.old_len as isize
}

/// The lines of one side that correspond to base lines `start..end`.
fn side_range<'s, 'a>(
    side: &'s [&'a [u8]],
    start: usize,
    end: usize,
    delta: isize,
    growth: isize,
) -> &'s [&'a [u8]] {
    let from = (start as isize + delta) as usize;
    let to = (end as isize + delta + growth) as usize;
    &side[from..to]
}

/// Split each conflict where ours and theirs agree.
fn refine_conflicts(segments: Vec<Segment<'_>>) -> Vec<Segment<'_>> {
    let mut out = Vec::with_capacity(segments.len());
    for segment in segments {
        let conflict = match segment {
            Segment::Conflict(c) if !c.ours.is_empty() && !c.theirs.is_empty() => c,
            other => {
                out.push(other);
                continue;
            }
        };

        let changes = diff_lines(&conflict.ours, &conflict.theirs);
        let mut pos = 0;
        for c in &changes {
            if pos < c.old_start {
                out.push(Segment::Common(conflict.ours[pos..c.old_start].to_vec()));
            }
            out.push(Segment::Conflict(Conflict {
                base: conflict.base.clone(),
                ours: conflict.ours[c.old_start..c.old_end()].to_vec(),
                theirs: conflict.theirs[c.new_start..c.new_end()].to_vec(),
            }));
            pos = c.old_end();
        }
        if pos < conflict.ours.len() {
            out.push(Segment::Common(conflict.ours[pos..].to_vec()));
        }
    }
    out
}

/// Fold `conflict, common, conflict` into one conflict when the common part
/// is short or carries no letters or digits.
fn simplify_gaps(segments: Vec<Segment<'_>>) -> Vec<Segment<'_>> {
    let mut out: Vec<Segment<'_>> = Vec::with_capacity(segments.len());
    for segment in segments {
        let Segment::Conflict(next) = segment else {
            out.push(segment);
            continue;
        };
        let foldable = match out.as_slice() {
            [.., Segment::Conflict(_), Segment::Common(gap)] => {
                gap.len() <= MAX_GAP || !gap.iter().any(|l| has_alnum(l))
            }
            _ => false,
        };
        if !foldable {
            out.push(Segment::Conflict(next));
            continue;
        }
        if let Some(Segment::Common(gap)) = out.pop() {
            if let Some(Segment::Conflict(prev)) = out.last_mut() {
                prev.base.extend_from_slice(&gap);
                prev.base.extend(next.base);
                prev.ours.extend_from_slice(&gap);
                prev.ours.extend(next.ours);
                prev.theirs.extend_from_slice(&gap);
                prev.theirs.extend(next.theirs);
            }
        }
    }
    out
}

fn has_alnum(line: &[u8]) -> bool {
    line.iter().any(u8::is_ascii_alphanumeric)
}

/// Move the lines both sides start and end with out of each conflict.
fn trim_conflicts(segments: Vec<Segment<'_>>) -> Vec<Segment<'_>> {
    let mut out = Vec::with_capacity(segments.len());
    for segment in segments {
        let Segment::Conflict(mut c) = segment else {
            out.push(segment);
            continue;
        };
        let prefix = c
            .ours
            .iter()
            .zip(&c.theirs)
            .take_while(|(a, b)| a == b)
            .count();
        let suffix = c.ours[prefix..]
            .iter()
            .rev()
            .zip(c.theirs[prefix..].iter().rev())
            .take_while(|(a, b)| a == b)
            .count();

        if prefix > 0 {
            out.push(Segment::Common(c.ours[..prefix].to_vec()));
        }
        let tail = c.ours[c.ours.len() - suffix..].to_vec();
        c.ours.truncate(c.ours.len() - suffix);
        c.theirs.truncate(c.theirs.len() - suffix);
        c.ours.drain(..prefix);
        c.theirs.drain(..prefix);
        out.push(Segment::Conflict(c));
        if !tail.is_empty() {
            out.push(Segment::Common(tail));
        }
    }
    out
}

fn push_lines(out: &mut Vec<u8>, lines: &[&[u8]]) {
    for line in lines {
        out.extend_from_slice(line);
    }
}

/// Side content inside markers; an unterminated last line gets a newline so
/// the next marker starts on its own line.
fn push_side(out: &mut Vec<u8>, lines: &[&[u8]]) {
    push_lines(out, lines);
    if lines.last().is_some_and(|l| !l.ends_with(b"\n")) {
        out.push(b'\n');
    }
}

fn push_marker(out: &mut Vec<u8>, ch: u8, label: &str) {
    out.extend(std::iter::repeat(ch).take(MARKER_LEN));
    if !label.is_empty() {
        out.push(b' ');
        out.extend_from_slice(label.as_bytes());
    }
    out.push(b'\n');
}

fn emit_conflict(
    out: &mut Vec<u8>,
    conflict: &Conflict<'_>,
    style: ConflictStyle,
    labels: &MergeLabels<'_>,
) {
    push_marker(out, b'<', labels.ours);
    push_side(out, &conflict.ours);
    if matches!(style, ConflictStyle::Diff3 | ConflictStyle::ZDiff3) {
        push_marker(out, b'|', labels.base);
        push_side(out, &conflict.base);
    }
    push_marker(out, b'=', "");
    push_side(out, &conflict.theirs);
    push_marker(out, b'>', labels.theirs);
}
