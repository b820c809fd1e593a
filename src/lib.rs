use error_set::error_set;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

mod diff;
mod header;
mod patch;
mod status;

pub use diff::{FileDiff, Hunk, format_numbered_diff};
pub use header::{HeaderError, HunkRange};
pub use status::{FileChange, FileStatus};

use patch::{Direction, assemble_patch, isolate_hunk, selected_change_offsets};
use status::parse_porcelain;

error_set! {
    /// Top-level error for git-hunks operations
    GitHunksError := {
        #[display("No unstaged changes in {file}")]
        NoUnstagedChanges { file: String },
        #[display("No staged changes in {file}")]
        NoStagedChanges { file: String },
        #[display("No hunks found in the diff of {file}")]
        NoHunks { file: String },
        #[display("No hunk at diff line {line}")]
        NoHunkAtLine { line: usize },
        #[display("Line {line} is not an addition or deletion")]
        NotAChangeLine { line: usize },
        #[display("No change lines found in the selected range")]
        NoLinesInRange,
        HeaderError(HeaderError),
    } || GitCommandError

    /// Errors from git command execution
    GitCommandError := {
        #[display("Not a git repository: {path}")]
        NotARepository { path: String },
        #[display("Failed to run git {command}: {message}")]
        CommandFailed { command: String, message: String },
        #[display("git {command} failed: {stderr}")]
        CommandExitError { command: String, stderr: String },
        #[display("Failed to run git diff: {message}")]
        DiffFailed { message: String },
        #[display("git diff failed: {stderr}")]
        DiffExitError { stderr: String },
        #[display("Invalid UTF-8 in git output: {message}")]
        InvalidUtf8 { message: String },
        #[display("Failed to read {file}: {message}")]
        ReadFileFailed { file: String, message: String },
        #[display("Failed to spawn git apply: {message}")]
        ApplySpawnFailed { message: String },
        #[display("Failed to get stdin handle for git apply")]
        ApplyStdinFailed,
        #[display("Failed to write patch to git apply: {message}")]
        ApplyWriteFailed { message: String },
        #[display("Failed to wait for git apply: {message}")]
        ApplyWaitFailed { message: String },
        #[display("git apply failed: {detail}")]
        ApplyExitError { detail: String },
    }
}

/// Which diff a selection's line numbers index into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DiffSource {
    /// `git diff` - index against working tree.
    Unstaged,
    /// `git diff --cached` - HEAD against index.
    Staged,
}

/// Where a synthesized patch is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ApplyTarget {
    Index,
    WorkingTree,
}

/// The three operation families, with their source diff, apply target and
/// apply direction. Resolved here once instead of scattered through the
/// drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Stage,
    Unstage,
    Revert,
}

impl Operation {
    fn source(self) -> DiffSource {
        match self {
            Self::Stage | Self::Revert => DiffSource::Unstaged,
            Self::Unstage => DiffSource::Staged,
        }
    }

    fn target(self) -> ApplyTarget {
        match self {
            Self::Stage | Self::Unstage => ApplyTarget::Index,
            Self::Revert => ApplyTarget::WorkingTree,
        }
    }

    fn direction(self) -> Direction {
        match self {
            Self::Stage => Direction::Forward,
            Self::Unstage | Self::Revert => Direction::Reverse,
        }
    }

    fn verb(self) -> &'static str {
        match self {
            Self::Stage => "Staged",
            Self::Unstage => "Unstaged",
            Self::Revert => "Reverted",
        }
    }

    fn empty_diff_error(self, file: &str) -> GitHunksError {
        match self.source() {
            DiffSource::Unstaged => GitHunksError::NoUnstagedChanges {
                file: file.to_string(),
            },
            DiffSource::Staged => GitHunksError::NoStagedChanges {
                file: file.to_string(),
            },
        }
    }
}

/// Main interface for hunk-level staging, unstaging and reverting.
///
/// Every operation takes line numbers in the diff-text coordinate space: the
/// 0-based index of a line in the diff as rendered by
/// [`format_numbered_diff`], fetched with the same `context_lines` count the
/// operation is called with. Numbers measured against a diff with a
/// different context count land on different lines; the engine cannot detect
/// that, so the caller owns keeping the two in step.
///
/// Operations re-read the diff from git on every call and hold no state
/// between calls. Two operations racing against the same file are a race at
/// the git level; callers must serialize them externally.
pub struct GitHunks {
    root: PathBuf,
}

impl GitHunks {
    /// Open the repository containing `path`.
    ///
    /// Resolves the repository root the way git itself does, searching parent
    /// directories. Fails with [`GitCommandError::NotARepository`] when
    /// `path` is not inside a work tree.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, GitCommandError> {
        let path = path.as_ref();
        let stdout = match run_git(path, &["rev-parse", "--show-toplevel"], "rev-parse") {
            Ok(stdout) => stdout,
            Err(GitCommandError::CommandExitError { .. }) => {
                return Err(GitCommandError::NotARepository {
                    path: path.display().to_string(),
                });
            }
            Err(other) => return Err(other),
        };
        Ok(Self {
            root: PathBuf::from(stdout.trim_end()),
        })
    }

    /// Repository root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stage the whole hunk under the cursor.
    ///
    /// # Examples
    /// ```no_run
    /// # use git_hunks::GitHunks;
    /// let repo = GitHunks::open(".").unwrap();
    /// let message = repo.stage_hunk("src/config.rs", 6, 3).unwrap();
    /// println!("{message}");
    /// ```
    pub fn stage_hunk(
        &self,
        file: &str,
        line: usize,
        context_lines: u32,
    ) -> Result<String, GitHunksError> {
        self.hunk_operation(file, line, context_lines, Operation::Stage)
    }

    /// Stage only the change lines inside `[start_line, end_line]`.
    pub fn stage_lines(
        &self,
        file: &str,
        start_line: usize,
        end_line: usize,
        context_lines: u32,
    ) -> Result<String, GitHunksError> {
        self.line_operation(file, start_line, end_line, context_lines, Operation::Stage)
    }

    /// Unstage the whole hunk under the cursor, using staged-diff
    /// coordinates.
    pub fn unstage_hunk(
        &self,
        file: &str,
        line: usize,
        context_lines: u32,
    ) -> Result<String, GitHunksError> {
        self.hunk_operation(file, line, context_lines, Operation::Unstage)
    }

    /// Unstage only the change lines inside `[start_line, end_line]` of the
    /// staged diff; the rest of the hunk stays staged.
    pub fn unstage_lines(
        &self,
        file: &str,
        start_line: usize,
        end_line: usize,
        context_lines: u32,
    ) -> Result<String, GitHunksError> {
        self.line_operation(file, start_line, end_line, context_lines, Operation::Unstage)
    }

    /// Discard the working-tree changes of the hunk under the cursor.
    ///
    /// Destructive: the change lines are gone afterwards. Any confirmation
    /// belongs to the caller.
    pub fn revert_hunk(
        &self,
        file: &str,
        line: usize,
        context_lines: u32,
    ) -> Result<String, GitHunksError> {
        self.hunk_operation(file, line, context_lines, Operation::Revert)
    }

    /// Discard only the working-tree change lines inside
    /// `[start_line, end_line]`.
    pub fn revert_lines(
        &self,
        file: &str,
        start_line: usize,
        end_line: usize,
        context_lines: u32,
    ) -> Result<String, GitHunksError> {
        self.line_operation(file, start_line, end_line, context_lines, Operation::Revert)
    }

    /// Diff text for display, unstaged or staged.
    ///
    /// Untracked files get a synthesized new-file diff so there is something
    /// to show; staging operations still report no unstaged changes for
    /// them.
    ///
    /// # Examples
    /// ```no_run
    /// # use git_hunks::{GitHunks, format_numbered_diff};
    /// let repo = GitHunks::open(".").unwrap();
    /// let diff = repo.diff("src/config.rs", false, 3).unwrap();
    /// println!("{}", format_numbered_diff(&diff));
    /// ```
    pub fn diff(
        &self,
        file: &str,
        staged: bool,
        context_lines: u32,
    ) -> Result<String, GitCommandError> {
        if !staged && self.is_untracked(file)? {
            return self.untracked_diff(file);
        }
        let source = if staged {
            DiffSource::Staged
        } else {
            DiffSource::Unstaged
        };
        self.fetch_diff(file, source, context_lines)
    }

    /// All staged and unstaged changes in the repository.
    pub fn status(&self) -> Result<Vec<FileChange>, GitCommandError> {
        let stdout = run_git(&self.root, &["status", "--porcelain"], "status")?;
        Ok(parse_porcelain(&stdout))
    }

    /// Apply the whole hunk under `line` for the given operation.
    fn hunk_operation(
        &self,
        file: &str,
        line: usize,
        context_lines: u32,
        op: Operation,
    ) -> Result<String, GitHunksError> {
        let diff_text = self.fetch_diff(file, op.source(), context_lines)?;
        if diff_text.trim().is_empty() {
            return Err(op.empty_diff_error(file));
        }
        let diff = FileDiff::parse(&diff_text);
        if diff.hunks.is_empty() {
            return Err(GitHunksError::NoHunks {
                file: file.to_string(),
            });
        }

        let index = match diff.hunk_at(line) {
            Some(index) => index,
            // a cursor in the file header reverts the first hunk
            None if op == Operation::Revert && line < diff.header.len() => 0,
            None => return Err(GitHunksError::NoHunkAtLine { line }),
        };
        let hunk = &diff.hunks[index];

        let patch = assemble_patch(&diff.header, &[hunk.lines.as_slice()]);
        self.apply_patch(&patch, op.target(), op.direction())?;

        Ok(format!(
            "{} hunk {} of {} from {}",
            op.verb(),
            index + 1,
            diff.hunks.len(),
            file
        ))
    }

    /// Apply only the selected change lines for the given operation.
    fn line_operation(
        &self,
        file: &str,
        start_line: usize,
        end_line: usize,
        context_lines: u32,
        op: Operation,
    ) -> Result<String, GitHunksError> {
        let diff_text = self.fetch_diff(file, op.source(), context_lines)?;
        if diff_text.trim().is_empty() {
            return Err(op.empty_diff_error(file));
        }
        let diff = FileDiff::parse(&diff_text);
        if diff.hunks.is_empty() {
            return Err(GitHunksError::NoHunks {
                file: file.to_string(),
            });
        }

        if start_line == end_line {
            // single-line cursors get the precise failure
            let Some(index) = diff.hunk_at(start_line) else {
                return Err(GitHunksError::NoHunkAtLine { line: start_line });
            };
            let hunk = &diff.hunks[index];
            let offset = start_line - hunk.start;
            let on_change = offset > 0
                && (hunk.lines[offset].starts_with('+') || hunk.lines[offset].starts_with('-'));
            if !on_change {
                return Err(GitHunksError::NotAChangeLine { line: start_line });
            }
        }

        let mut fragments: Vec<Vec<String>> = Vec::new();
        let mut selected_total = 0;
        for hunk in &diff.hunks {
            let selected = selected_change_offsets(hunk, start_line, end_line);
            if selected.is_empty() {
                continue;
            }
            selected_total += selected.len();
            fragments.push(isolate_hunk(hunk, &selected, op.direction())?);
        }
        if fragments.is_empty() {
            return Err(GitHunksError::NoLinesInRange);
        }

        let fragment_slices: Vec<&[String]> = fragments.iter().map(Vec::as_slice).collect();
        let patch = assemble_patch(&diff.header, &fragment_slices);
        self.apply_patch(&patch, op.target(), op.direction())?;

        let noun = if selected_total == 1 { "line" } else { "lines" };
        Ok(format!(
            "{} {selected_total} {noun} from {file}",
            op.verb()
        ))
    }

    /// Raw `git diff` output for one file at the given context count.
    fn fetch_diff(
        &self,
        file: &str,
        source: DiffSource,
        context_lines: u32,
    ) -> Result<String, GitCommandError> {
        let context = format!("-U{context_lines}");
        let mut args = vec!["diff", "--no-ext-diff", "--no-color", context.as_str()];
        if source == DiffSource::Staged {
            args.push("--cached");
        }
        args.push("--");
        args.push(file);

        let output = Command::new("git")
            .arg("-C")
            .arg(&self.root)
            .args(&args)
            .output()
            .map_err(|e| GitCommandError::DiffFailed {
                message: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GitCommandError::DiffExitError {
                stderr: stderr.into_owned(),
            });
        }

        String::from_utf8(output.stdout).map_err(|e| GitCommandError::InvalidUtf8 {
            message: e.to_string(),
        })
    }

    /// Pipe a synthesized patch into `git apply` with the target and
    /// direction flags.
    ///
    /// `--unidiff-zero` is always passed: patches built from a `-U0` diff
    /// carry no context lines and are rejected without it, and it changes
    /// nothing for patches that do have context.
    fn apply_patch(
        &self,
        patch: &str,
        target: ApplyTarget,
        direction: Direction,
    ) -> Result<(), GitCommandError> {
        use std::io::Write;

        let mut args = vec!["apply"];
        if target == ApplyTarget::Index {
            args.push("--cached");
        }
        if direction == Direction::Reverse {
            args.push("--reverse");
        }
        args.push("--unidiff-zero");
        args.push("-");

        let mut child = Command::new("git")
            .arg("-C")
            .arg(&self.root)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| GitCommandError::ApplySpawnFailed {
                message: e.to_string(),
            })?;

        child
            .stdin
            .take()
            .ok_or(GitCommandError::ApplyStdinFailed)?
            .write_all(patch.as_bytes())
            .map_err(|e| GitCommandError::ApplyWriteFailed {
                message: e.to_string(),
            })?;

        let output = child
            .wait_with_output()
            .map_err(|e| GitCommandError::ApplyWaitFailed {
                message: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let detail = if stderr.is_empty() {
                String::from_utf8_lossy(&output.stdout).trim().to_string()
            } else {
                stderr
            };
            return Err(GitCommandError::ApplyExitError { detail });
        }

        Ok(())
    }

    /// Whether git considers the file untracked.
    fn is_untracked(&self, file: &str) -> Result<bool, GitCommandError> {
        let stdout = run_git(
            &self.root,
            &["ls-files", "--others", "--exclude-standard", "--", file],
            "ls-files",
        )?;
        Ok(!stdout.trim().is_empty())
    }

    /// Fabricate a new-file diff showing the entire content of an untracked
    /// file.
    fn untracked_diff(&self, file: &str) -> Result<String, GitCommandError> {
        let bytes =
            std::fs::read(self.root.join(file)).map_err(|e| GitCommandError::ReadFileFailed {
                file: file.to_string(),
                message: e.to_string(),
            })?;
        let content = String::from_utf8_lossy(&bytes);

        let mut diff = format!(
            "diff --git a/{file} b/{file}\nnew file mode 100644\n--- /dev/null\n+++ b/{file}\n"
        );
        if content.is_empty() {
            return Ok(diff);
        }

        let body = content.strip_suffix('\n').unwrap_or(&content);
        let lines: Vec<&str> = body.split('\n').collect();
        diff.push_str(&format!("@@ -0,0 +1,{} @@\n", lines.len()));
        for line in &lines {
            diff.push('+');
            diff.push_str(line);
            diff.push('\n');
        }
        if !content.ends_with('\n') {
            diff.push_str("\\ No newline at end of file\n");
        }
        Ok(diff)
    }
}

/// Run a git command against `dir` and capture stdout.
fn run_git(dir: &Path, args: &[&str], command: &str) -> Result<String, GitCommandError> {
    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(args)
        .output()
        .map_err(|e| GitCommandError::CommandFailed {
            command: command.to_string(),
            message: e.to_string(),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(GitCommandError::CommandExitError {
            command: command.to_string(),
            stderr: stderr.into_owned(),
        });
    }

    String::from_utf8(output.stdout).map_err(|e| GitCommandError::InvalidUtf8 {
        message: e.to_string(),
    })
}
