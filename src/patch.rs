//! Building minimal patch fragments from a selection of diff lines.
//!
//! A fragment must apply cleanly in isolation, so every change line outside
//! the selection has to be reconciled against the tree the fragment will be
//! applied to: it is either dropped (the target tree does not have it) or
//! rewritten as a context line (the target tree already has it and the apply
//! must treat it as a no-op). Which of the two happens depends only on the
//! apply direction:
//!
//! ```text
//!                unselected `+`          unselected `-`
//! forward        dropped                 context (content restored)
//! reverse        context                 dropped
//! ```

use crate::diff::Hunk;
use crate::header::{HeaderError, HunkRange};
use std::collections::BTreeSet;

/// Direction a synthesized fragment will be applied in.
///
/// Staging applies forward (old content into new); unstaging and reverting
/// apply in reverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
}

/// Body-line offsets (indices into `hunk.lines`, so the `@@` header is 0) of
/// addition and deletion lines whose absolute diff-text position falls within
/// `[start_line, end_line]` inclusive.
#[must_use]
pub fn selected_change_offsets(hunk: &Hunk, start_line: usize, end_line: usize) -> BTreeSet<usize> {
    let mut offsets = BTreeSet::new();
    for offset in 1..hunk.lines.len() {
        let absolute = hunk.start + offset;
        if absolute < start_line || absolute > end_line {
            continue;
        }
        let line = &hunk.lines[offset];
        if line.starts_with('+') || line.starts_with('-') {
            offsets.insert(offset);
        }
    }
    offsets
}

/// Rewrite one hunk so that only the `selected` body offsets keep their
/// change markers, re-encoding the range header with counts computed from the
/// retained body.
///
/// Blank body lines are blank context and are re-emitted with their implicit
/// space prefix. `\ No newline at end of file` markers follow their owning
/// line: kept while the line above them survives, dropped with it otherwise,
/// and never counted in the header. A marker the rewrite strands mid-hunk is
/// repaired afterwards so no retained line gets glued onto an unterminated
/// one. Context offsets in `selected` are ignored.
pub fn isolate_hunk(
    hunk: &Hunk,
    selected: &BTreeSet<usize>,
    direction: Direction,
) -> Result<Vec<String>, HeaderError> {
    let source = HunkRange::decode(&hunk.lines[0])?;

    let mut body: Vec<String> = Vec::new();
    let mut markers: Vec<(usize, usize)> = Vec::new();
    let mut kept_previous = false;

    for (offset, line) in hunk.lines.iter().enumerate().skip(1) {
        if line.is_empty() {
            body.push(" ".to_string());
            kept_previous = true;
            continue;
        }
        if line.starts_with('\\') {
            if kept_previous {
                markers.push((body.len(), offset));
                body.push(line.clone());
            }
            continue;
        }

        let in_selection = selected.contains(&offset);
        if let Some(content) = line.strip_prefix('+') {
            if in_selection {
                body.push(line.clone());
                kept_previous = true;
            } else {
                match direction {
                    // the target tree does not have this line yet
                    Direction::Forward => kept_previous = false,
                    // the target tree already has it
                    Direction::Reverse => {
                        body.push(format!(" {content}"));
                        kept_previous = true;
                    }
                }
            }
        } else if let Some(content) = line.strip_prefix('-') {
            if in_selection {
                body.push(line.clone());
                kept_previous = true;
            } else {
                match direction {
                    // the target tree still has the content this would remove
                    Direction::Forward => {
                        body.push(format!(" {content}"));
                        kept_previous = true;
                    }
                    // already absent from the target tree
                    Direction::Reverse => kept_previous = false,
                }
            }
        } else {
            body.push(line.clone());
            kept_previous = true;
        }
    }

    reconcile_no_newline(&mut body, &markers, hunk, selected, direction);
    let (old_count, new_count) = body_counts(&body);

    let header = HunkRange {
        old_start: source.old_start,
        old_count,
        new_start: source.new_start,
        new_count,
    };

    let mut fragment = Vec::with_capacity(body.len() + 1);
    fragment.push(header.to_string());
    fragment.append(&mut body);
    Ok(fragment)
}

/// Repair `\ No newline at end of file` markers the rewrite left mid-hunk.
///
/// A marker means the line above it ends its file image. Downgrading the
/// hunk's final deletion to context keeps the marker, and any addition kept
/// after it would be concatenated onto the unterminated line by `git apply`.
/// `markers` pairs each kept marker's body index with its offset in
/// `hunk.lines`.
///
/// Repairs, all on the old-side marker:
/// * context-owned marker with the source's replacement addition kept right
///   after it: restore the owner to a deletion; the kept addition re-supplies
///   the content with a newline.
/// * context-owned marker followed by other kept lines: restore the owner to
///   a deletion and synthesize an addition with the same content, so the line
///   is re-terminated before anything follows it.
/// * reverse direction, kept deletion whose marker is followed by old-image
///   lines: drop the marker; the restored line gains a newline because
///   content now follows it.
fn reconcile_no_newline(
    body: &mut Vec<String>,
    markers: &[(usize, usize)],
    hunk: &Hunk,
    selected: &BTreeSet<usize>,
    direction: Direction,
) {
    // reverse order keeps earlier marker indices valid across edits
    for &(at, source_offset) in markers.iter().rev() {
        let owner = body[at - 1].clone();
        if let Some(content) = owner.strip_prefix(' ') {
            if at + 1 >= body.len() {
                continue;
            }
            body[at - 1] = format!("-{content}");
            let replacement_kept = hunk.lines.get(source_offset + 1).is_some_and(|next| {
                next.starts_with('+') && selected.contains(&(source_offset + 1))
            });
            if !replacement_kept {
                body.insert(at + 1, format!("+{content}"));
            }
        } else if direction == Direction::Reverse && owner.starts_with('-') {
            let old_image_follows = body[at + 1..]
                .iter()
                .any(|line| line.starts_with(' ') || line.starts_with('-'));
            if old_image_follows {
                body.remove(at);
            }
        }
    }
}

/// Header counts for a rewritten body; marker lines are never counted.
fn body_counts(body: &[String]) -> (u32, u32) {
    let mut old_count = 0u32;
    let mut new_count = 0u32;
    for line in body {
        if line.starts_with('\\') {
            continue;
        }
        if line.starts_with('+') {
            new_count += 1;
        } else if line.starts_with('-') {
            old_count += 1;
        } else {
            old_count += 1;
            new_count += 1;
        }
    }
    (old_count, new_count)
}

/// Join header lines and hunk fragments into one patch blob.
///
/// The blob always ends with a newline; `git apply` rejects a truncated
/// final line.
#[must_use]
pub fn assemble_patch(header: &[String], fragments: &[&[String]]) -> String {
    let mut patch = String::new();
    for line in header
        .iter()
        .chain(fragments.iter().flat_map(|fragment| fragment.iter()))
    {
        patch.push_str(line);
        patch.push('\n');
    }
    patch
}


#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod proptests {
    use super::*;
    use crate::header::HunkRange;
    use proptest::prelude::*;

    fn arb_body_line() -> impl Strategy<Value = String> {
        let content = "[a-zA-Z0-9 ]{0,12}";
        prop_oneof![
            content.prop_map(|c| format!(" {c}")),
            content.prop_map(|c| format!("+{c}")),
            content.prop_map(|c| format!("-{c}")),
            Just(String::new()),
        ]
    }

    fn arb_hunk_and_selection() -> impl Strategy<Value = (Hunk, BTreeSet<usize>)> {
        (
            prop::collection::vec(arb_body_line(), 1..24),
            1u32..1000,
            1u32..1000,
        )
            .prop_flat_map(|(body, old_start, new_start)| {
                let len = body.len();
                (
                    Just(body),
                    Just(old_start),
                    Just(new_start),
                    prop::collection::btree_set(1..=len, 0..=len),
                )
            })
            .prop_map(|(body, old_start, new_start, selected)| {
                let mut lines = vec![format!("@@ -{old_start},9 +{new_start},9 @@")];
                lines.extend(body);
                let end = 4 + lines.len() - 1;
                let hunk = Hunk {
                    start: 4,
                    end,
                    lines,
                };
                (hunk, selected)
            })
    }

    fn tally(fragment: &[String]) -> (u32, u32) {
        let mut old_count = 0;
        let mut new_count = 0;
        for line in &fragment[1..] {
            if line.starts_with('+') {
                new_count += 1;
            } else if line.starts_with('-') {
                old_count += 1;
            } else {
                old_count += 1;
                new_count += 1;
            }
        }
        (old_count, new_count)
    }

    proptest! {
        #[test]
        fn header_counts_match_retained_body((hunk, selected) in arb_hunk_and_selection()) {
            for direction in [Direction::Forward, Direction::Reverse] {
                let fragment = isolate_hunk(&hunk, &selected, direction).unwrap();
                let header = HunkRange::decode(&fragment[0]).unwrap();
                let (old_count, new_count) = tally(&fragment);
                prop_assert_eq!(header.old_count, old_count);
                prop_assert_eq!(header.new_count, new_count);
            }
        }

        #[test]
        fn selected_lines_survive_verbatim((hunk, selected) in arb_hunk_and_selection()) {
            for direction in [Direction::Forward, Direction::Reverse] {
                let fragment = isolate_hunk(&hunk, &selected, direction).unwrap();
                for offset in &selected {
                    let line = &hunk.lines[*offset];
                    if line.starts_with('+') || line.starts_with('-') {
                        prop_assert!(fragment.iter().any(|kept| kept == line));
                    }
                }
            }
        }

        #[test]
        fn change_lines_outside_selection_lose_their_marker((hunk, selected) in arb_hunk_and_selection()) {
            let selected_adds = (1..hunk.lines.len())
                .filter(|offset| hunk.lines[*offset].starts_with('+') && selected.contains(offset))
                .count();
            let selected_dels = (1..hunk.lines.len())
                .filter(|offset| hunk.lines[*offset].starts_with('-') && selected.contains(offset))
                .count();

            for direction in [Direction::Forward, Direction::Reverse] {
                let fragment = isolate_hunk(&hunk, &selected, direction).unwrap();
                let adds = fragment[1..].iter().filter(|line| line.starts_with('+')).count();
                let dels = fragment[1..].iter().filter(|line| line.starts_with('-')).count();
                prop_assert_eq!(adds, selected_adds);
                prop_assert_eq!(dels, selected_dels);
            }
        }

        #[test]
        fn fragment_never_contains_blank_lines((hunk, selected) in arb_hunk_and_selection()) {
            let fragment = isolate_hunk(&hunk, &selected, Direction::Forward).unwrap();
            prop_assert!(fragment.iter().all(|line| !line.is_empty()));
        }
    }
}
