//! Splitting a unified diff into its header section and hunks.
//!
//! The split preserves the byte content and line positions of the input: every
//! line of the diff text lands either in `FileDiff::header` or in exactly one
//! hunk, and hunk spans are recorded as indices into the text so callers can
//! translate cursor positions into hunks. Line numbers used throughout this
//! crate are 0-based indices into the diff text split on `\n`, with one
//! trailing newline stripped.

/// A contiguous hunk of a unified diff.
///
/// `lines[0]` is the `@@` range header; `lines[1..]` are body lines carrying
/// their original prefix (`' '`, `'+'`, `'-'`, a bare `\` marker line, or
/// empty for a blank context line).
#[derive(Debug, PartialEq, Eq)]
pub struct Hunk {
    /// Index of the `@@` header line in the diff text.
    pub start: usize,
    /// Index of the last body line, inclusive.
    pub end: usize,
    pub lines: Vec<String>,
}

impl Hunk {
    /// Whether a diff-text line index falls inside this hunk's span.
    ///
    /// The `@@` header line itself counts as inside.
    #[must_use]
    pub fn contains(&self, line: usize) -> bool {
        (self.start..=self.end).contains(&line)
    }
}

/// One file's diff split into header lines and hunks.
#[derive(Debug, PartialEq, Eq)]
pub struct FileDiff {
    /// All lines before the first `@@` marker, unmodified.
    pub header: Vec<String>,
    pub hunks: Vec<Hunk>,
}

impl FileDiff {
    /// Split diff text at hunk boundaries.
    ///
    /// Every line before the first line starting with `@@` is header; each
    /// `@@` line opens a hunk that accumulates until the next `@@` or the end
    /// of the text. Empty input yields an empty header and no hunks, as does
    /// a header-only diff (for example a pure mode change).
    #[must_use]
    pub fn parse(diff_text: &str) -> Self {
        let mut header = Vec::new();
        let mut hunks: Vec<Hunk> = Vec::new();
        let mut open: Option<(usize, Vec<String>)> = None;

        let lines = split_lines(diff_text);
        for (index, line) in lines.iter().enumerate() {
            if line.starts_with("@@") {
                if let Some((start, body)) = open.take() {
                    hunks.push(Hunk {
                        start,
                        end: index - 1,
                        lines: body,
                    });
                }
                open = Some((index, vec![(*line).to_string()]));
            } else if let Some((_, body)) = open.as_mut() {
                body.push((*line).to_string());
            } else {
                header.push((*line).to_string());
            }
        }
        if let Some((start, body)) = open.take() {
            hunks.push(Hunk {
                start,
                end: lines.len() - 1,
                lines: body,
            });
        }

        FileDiff { header, hunks }
    }

    /// Index of the hunk whose span contains the given diff-text line.
    #[must_use]
    pub fn hunk_at(&self, line: usize) -> Option<usize> {
        self.hunks.iter().position(|hunk| hunk.contains(line))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.header.is_empty() && self.hunks.is_empty()
    }
}

/// Split diff text into lines, keeping carriage returns (CRLF file content
/// must survive a round trip into a patch) and stripping one trailing
/// newline so the last line is never a phantom empty string.
fn split_lines(text: &str) -> Vec<&str> {
    if text.is_empty() {
        return Vec::new();
    }
    text.strip_suffix('\n').unwrap_or(text).split('\n').collect()
}

/// Render diff text with a 0-based line-number gutter.
///
/// The printed numbers are exactly the coordinates the staging, unstaging and
/// reverting operations take, so the output doubles as a reference for
/// selecting lines. No trailing newline is appended.
#[must_use]
pub fn format_numbered_diff(diff_text: &str) -> String {
    let lines = split_lines(diff_text);
    if lines.is_empty() {
        return String::new();
    }

    let width = (lines.len() - 1).to_string().len();
    let mut out = String::new();
    for (index, line) in lines.iter().enumerate() {
        if index > 0 {
            out.push('\n');
        }
        out.push_str(&format!("{index:>width$} | {line}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    const SINGLE_HUNK: &str = r#"diff --git a/notes.txt b/notes.txt
index 83db48f..bf269f4 100644
--- a/notes.txt
+++ b/notes.txt
@@ -1,3 +1,4 @@
 alpha
+beta
 gamma
 delta
"#;

    const TWO_HUNKS: &str = r#"diff --git a/src/config.rs b/src/config.rs
index 2ce966d..93d8dbc 100644
--- a/src/config.rs
+++ b/src/config.rs
@@ -4,3 +4,3 @@
 const RETRIES: u32 = 3;
-const TIMEOUT_SECS: u64 = 30;
+const TIMEOUT_SECS: u64 = 60;
 const BACKOFF: f64 = 1.5;
@@ -20,2 +20,3 @@
 fn defaults() {
+    let _ = TIMEOUT_SECS;
 }
"#;

    #[test]
    fn empty_text_has_no_header_and_no_hunks() {
        let diff = FileDiff::parse("");
        assert_eq!(diff.header, Vec::<String>::new());
        assert!(diff.hunks.is_empty());
        assert!(diff.is_empty());
    }

    #[test]
    fn header_only_diff_has_no_hunks() {
        let diff = FileDiff::parse(
            "diff --git a/run.sh b/run.sh\nold mode 100644\nnew mode 100755\n",
        );
        assert_eq!(diff.header.len(), 3);
        assert!(diff.hunks.is_empty());
        assert!(!diff.is_empty());
    }

    #[test]
    fn single_hunk_span_covers_rest_of_text() {
        let diff = FileDiff::parse(SINGLE_HUNK);
        assert_eq!(diff.header.len(), 4);
        assert_eq!(diff.hunks.len(), 1);

        let hunk = &diff.hunks[0];
        assert_eq!(hunk.start, 4);
        assert_eq!(hunk.end, 8);
        assert_eq!(hunk.lines[0], "@@ -1,3 +1,4 @@");
        assert_eq!(hunk.lines[2], "+beta");
        assert_eq!(hunk.lines.len(), 5);
    }

    #[test]
    fn hunk_boundaries_abut() {
        let diff = FileDiff::parse(TWO_HUNKS);
        assert_eq!(diff.hunks.len(), 2);
        assert_eq!(diff.hunks[0].start, 4);
        assert_eq!(diff.hunks[0].end, 8);
        assert_eq!(diff.hunks[1].start, 9);
        assert_eq!(diff.hunks[1].end, 12);
        assert_eq!(diff.hunks[1].lines[0], "@@ -20,2 +20,3 @@");
    }

    #[test]
    fn blank_context_line_stays_in_hunk_body() {
        let diff = FileDiff::parse(
            "--- a/f\n+++ b/f\n@@ -1,3 +1,3 @@\n one\n\n three\n",
        );
        assert_eq!(diff.hunks[0].lines, vec!["@@ -1,3 +1,3 @@", " one", "", " three"]);
    }

    #[test]
    fn parse_is_idempotent() {
        assert_eq!(FileDiff::parse(TWO_HUNKS), FileDiff::parse(TWO_HUNKS));
    }

    #[test]
    fn hunk_at_resolves_cursor_lines() {
        let diff = FileDiff::parse(TWO_HUNKS);
        assert_eq!(diff.hunk_at(0), None); // diff --git line
        assert_eq!(diff.hunk_at(3), None); // +++ line
        assert_eq!(diff.hunk_at(4), Some(0)); // first @@ line
        assert_eq!(diff.hunk_at(6), Some(0));
        assert_eq!(diff.hunk_at(9), Some(1));
        assert_eq!(diff.hunk_at(12), Some(1));
        assert_eq!(diff.hunk_at(13), None); // past the end
    }

    #[test]
    fn format_numbers_every_line() {
        insta::assert_snapshot!(format_numbered_diff(SINGLE_HUNK), @r"
        0 | diff --git a/notes.txt b/notes.txt
        1 | index 83db48f..bf269f4 100644
        2 | --- a/notes.txt
        3 | +++ b/notes.txt
        4 | @@ -1,3 +1,4 @@
        5 |  alpha
        6 | +beta
        7 |  gamma
        8 |  delta
        ");
    }

    #[test]
    fn format_pads_the_gutter_past_ten_lines() {
        let diff = FileDiff::parse(TWO_HUNKS);
        assert_eq!(diff.hunks[1].end, 12);
        insta::assert_snapshot!(format_numbered_diff(TWO_HUNKS), @r#"
         0 | diff --git a/src/config.rs b/src/config.rs
         1 | index 2ce966d..93d8dbc 100644
         2 | --- a/src/config.rs
         3 | +++ b/src/config.rs
         4 | @@ -4,3 +4,3 @@
         5 |  const RETRIES: u32 = 3;
         6 | -const TIMEOUT_SECS: u64 = 30;
         7 | +const TIMEOUT_SECS: u64 = 60;
         8 |  const BACKOFF: f64 = 1.5;
         9 | @@ -20,2 +20,3 @@
        10 |  fn defaults() {
        11 | +    let _ = TIMEOUT_SECS;
        12 |  }
        "#);
    }

    #[test]
    fn format_of_empty_diff_is_empty() {
        assert_eq!(format_numbered_diff(""), "");
    }
}
