//! Hunk range headers
//!
//! # Syntax
//!
//! ```text
//! @@ -<old_start>[,<old_count>] +<new_start>[,<new_count>] @@ [section heading]
//! ```
//!
//! An omitted count means 1. Anything after the closing `@@` (git's optional
//! function-context heading) is ignored on decode and never re-emitted.

use error_set::error_set;
use nom::{
    IResult, Parser,
    bytes::complete::tag,
    character::complete::u32 as decimal,
    combinator::opt,
    sequence::preceded,
};
use std::fmt;

error_set! {
    /// Errors from decoding hunk range headers
    HeaderError := {
        #[display("Invalid hunk header: {header}")]
        InvalidHeader { header: String },
    }
}

/// The four integers of a hunk range header.
///
/// Counts obey the unified diff invariant: `old_count` is the number of
/// context and deletion lines in the hunk body, `new_count` the number of
/// context and addition lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HunkRange {
    pub old_start: u32,
    pub old_count: u32,
    pub new_start: u32,
    pub new_count: u32,
}

fn side(input: &str) -> IResult<&str, (u32, u32)> {
    let (input, start) = decimal(input)?;
    let (input, count) = opt(preceded(tag(","), decimal)).parse(input)?;
    Ok((input, (start, count.unwrap_or(1))))
}

fn range(input: &str) -> IResult<&str, HunkRange> {
    let (input, _) = tag("@@ -").parse(input)?;
    let (input, (old_start, old_count)) = side(input)?;
    let (input, _) = tag(" +").parse(input)?;
    let (input, (new_start, new_count)) = side(input)?;
    let (input, _) = tag(" @@").parse(input)?;
    Ok((
        input,
        HunkRange {
            old_start,
            old_count,
            new_start,
            new_count,
        },
    ))
}

impl HunkRange {
    /// Decode a `@@ -a,b +c,d @@` header line.
    ///
    /// A header that does not match the grammar is a hard error: re-encoding a
    /// guessed range would hand `git apply` a fragment that can misapply.
    pub fn decode(header: &str) -> Result<Self, HeaderError> {
        match range(header) {
            Ok((_, decoded)) => Ok(decoded),
            Err(_) => Err(HeaderError::InvalidHeader {
                header: header.to_string(),
            }),
        }
    }
}

impl fmt::Display for HunkRange {
    /// Encode with explicit counts on both sides, dropping any section
    /// heading the source header carried.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "@@ -{},{} +{},{} @@",
            self.old_start, self.old_count, self.new_start, self.new_count
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    #[test]
    fn decodes_explicit_counts() {
        let range = HunkRange::decode("@@ -12,5 +14,8 @@").unwrap();
        assert_eq!(
            range,
            HunkRange {
                old_start: 12,
                old_count: 5,
                new_start: 14,
                new_count: 8,
            }
        );
    }

    #[test]
    fn omitted_count_means_one() {
        let range = HunkRange::decode("@@ -5 +5 @@").unwrap();
        assert_eq!(range.old_count, 1);
        assert_eq!(range.new_count, 1);

        let mixed = HunkRange::decode("@@ -5,0 +6 @@").unwrap();
        assert_eq!(mixed.old_count, 0);
        assert_eq!(mixed.new_count, 1);
    }

    #[test]
    fn decodes_new_file_range() {
        let range = HunkRange::decode("@@ -0,0 +1,7 @@").unwrap();
        assert_eq!(range.old_start, 0);
        assert_eq!(range.old_count, 0);
        assert_eq!(range.new_start, 1);
        assert_eq!(range.new_count, 7);
    }

    #[test]
    fn ignores_section_heading() {
        let range = HunkRange::decode("@@ -10,6 +10,7 @@ fn main() {").unwrap();
        assert_eq!(range.new_count, 7);
    }

    #[test]
    fn rejects_malformed_headers() {
        for header in [
            "",
            "@@",
            "@@ -a,b +c,d @@",
            "@@ -1,2 +3,4",
            "@@ +1,2 -3,4 @@",
            "not a header",
        ] {
            assert!(
                HunkRange::decode(header).is_err(),
                "accepted malformed header: {header:?}"
            );
        }
    }

    #[test]
    fn encodes_with_explicit_counts() {
        let range = HunkRange {
            old_start: 3,
            old_count: 1,
            new_start: 3,
            new_count: 2,
        };
        assert_eq!(range.to_string(), "@@ -3,1 +3,2 @@");
    }

    #[test]
    fn round_trips_explicit_headers() {
        for header in ["@@ -1,4 +1,6 @@", "@@ -0,0 +1,3 @@", "@@ -100,0 +99,0 @@"] {
            let decoded = HunkRange::decode(header).unwrap();
            assert_eq!(decoded.to_string(), header);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn encode_decode_round_trip(
            old_start in 0u32..100_000,
            old_count in 0u32..10_000,
            new_start in 0u32..100_000,
            new_count in 0u32..10_000,
        ) {
            let range = HunkRange { old_start, old_count, new_start, new_count };
            let decoded = HunkRange::decode(&range.to_string()).unwrap();
            prop_assert_eq!(decoded, range);
        }

        #[test]
        fn decode_never_panics(header in "\\PC*") {
            let _ = HunkRange::decode(&header);
        }
    }
}
