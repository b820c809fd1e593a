//! File status model, fed from `git status --porcelain` output.

use std::fmt;

/// Classification of a changed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Modified,
    Added,
    Deleted,
    Renamed,
    Copied,
    Untracked,
    /// Conflicted path awaiting merge resolution.
    Unmerged,
}

impl FileStatus {
    /// Map one porcelain status letter to a status tag.
    ///
    /// `' '` (no change on that side) and unknown letters map to `None`.
    /// `T` (type change) is reported as `Modified`.
    #[must_use]
    pub fn from_porcelain(flag: char) -> Option<Self> {
        match flag {
            'M' | 'T' => Some(Self::Modified),
            'A' => Some(Self::Added),
            'D' => Some(Self::Deleted),
            'R' => Some(Self::Renamed),
            'C' => Some(Self::Copied),
            'U' => Some(Self::Unmerged),
            '?' => Some(Self::Untracked),
            _ => None,
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let word = match self {
            Self::Modified => "Modified",
            Self::Added => "Added",
            Self::Deleted => "Deleted",
            Self::Renamed => "Renamed",
            Self::Copied => "Copied",
            Self::Untracked => "Untracked",
            Self::Unmerged => "Unmerged",
        };
        f.write_str(word)
    }
}

/// One changed file on one side of the index.
///
/// A file modified in both the index and the working tree yields two entries,
/// one with `staged` set and one without.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: String,
    pub status: FileStatus,
    pub staged: bool,
    /// Original path for renames and copies.
    pub old_path: Option<String>,
}

/// Conflict combinations of the two porcelain letters.
const fn is_unmerged(index: char, worktree: char) -> bool {
    matches!(
        (index, worktree),
        ('D', 'D') | ('A', 'U') | ('U', 'D') | ('U', 'A') | ('D', 'U') | ('A', 'A') | ('U', 'U')
    )
}

/// Undo git's C-style quoting of unusual paths (`core.quotePath`).
///
/// Paths with plain spaces arrive unquoted; git only quotes when a name
/// carries control bytes, quotes, backslashes or non-ASCII. Octal escapes
/// decode to raw bytes and are reassembled as UTF-8, lossily if need be.
fn unquote_path(raw: &str) -> String {
    let Some(inner) = raw.strip_prefix('"').and_then(|r| r.strip_suffix('"')) else {
        return raw.to_string();
    };

    let mut bytes = Vec::with_capacity(inner.len());
    let mut iter = inner.bytes().peekable();
    while let Some(byte) = iter.next() {
        if byte != b'\\' {
            bytes.push(byte);
            continue;
        }
        match iter.next() {
            Some(b'n') => bytes.push(b'\n'),
            Some(b't') => bytes.push(b'\t'),
            Some(b'r') => bytes.push(b'\r'),
            Some(b'a') => bytes.push(0x07),
            Some(b'b') => bytes.push(0x08),
            Some(b'f') => bytes.push(0x0c),
            Some(b'v') => bytes.push(0x0b),
            Some(digit @ b'0'..=b'7') => {
                let mut value = u32::from(digit - b'0');
                for _ in 0..2 {
                    let Some(&(next @ b'0'..=b'7')) = iter.peek() else {
                        break;
                    };
                    value = value * 8 + u32::from(next - b'0');
                    iter.next();
                }
                bytes.push((value & 0xff) as u8);
            }
            // covers \\ and \" along with anything git never emits
            Some(other) => bytes.push(other),
            None => {}
        }
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Parse `git status --porcelain` (v1) output into file changes.
///
/// Entries keep the order git printed them in, with a file's staged entry
/// before its unstaged one. Unmerged paths collapse to a single unstaged
/// entry: conflicts are resolved in the working tree, not split across
/// sides. Quoted paths are unescaped. Lines too short to carry a status pair
/// are skipped.
#[must_use]
pub fn parse_porcelain(text: &str) -> Vec<FileChange> {
    let mut changes = Vec::new();
    for line in text.lines() {
        if line.len() < 4 || !line.is_char_boundary(3) {
            continue;
        }
        let mut flags = line.chars();
        let (Some(index), Some(worktree)) = (flags.next(), flags.next()) else {
            continue;
        };
        let rest = &line[3..];
        let (old_path, path) = match rest.split_once(" -> ") {
            Some((old, new)) => (Some(unquote_path(old)), unquote_path(new)),
            None => (None, unquote_path(rest)),
        };

        if index == '?' && worktree == '?' {
            changes.push(FileChange {
                path,
                status: FileStatus::Untracked,
                staged: false,
                old_path: None,
            });
            continue;
        }
        if is_unmerged(index, worktree) {
            changes.push(FileChange {
                path,
                status: FileStatus::Unmerged,
                staged: false,
                old_path: None,
            });
            continue;
        }

        if let Some(status) = FileStatus::from_porcelain(index) {
            let renamed = matches!(status, FileStatus::Renamed | FileStatus::Copied);
            changes.push(FileChange {
                path: path.clone(),
                status,
                staged: true,
                old_path: if renamed { old_path.clone() } else { None },
            });
        }
        if let Some(status) = FileStatus::from_porcelain(worktree) {
            let renamed = matches!(status, FileStatus::Renamed | FileStatus::Copied);
            changes.push(FileChange {
                path,
                status,
                staged: false,
                old_path: if renamed { old_path } else { None },
            });
        }
    }
    changes
}
