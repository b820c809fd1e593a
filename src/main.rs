use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use git_hunks::{FileChange, GitHunks, format_numbered_diff};
use std::io;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "git-hunks")]
#[command(about = "Stage, unstage and revert hunks or line ranges by diff coordinates")]
struct Cli {
    /// Run against the repository containing this path
    #[arg(short = 'C', long = "repo", value_name = "PATH", default_value = ".", global = true)]
    repo: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ContextOpt {
    /// Diff context lines; must match the diff the line numbers came from
    #[arg(
        short = 'U',
        long = "context",
        value_name = "N",
        default_value_t = 3,
        value_parser = clap::value_parser!(u32).range(0..=99)
    )]
    context: u32,
}

#[derive(Subcommand)]
enum Commands {
    /// Show a file's diff with the line numbers the other commands take
    Diff {
        file: String,
        /// Show the staged diff instead of the unstaged one
        #[arg(long)]
        staged: bool,
        #[command(flatten)]
        context: ContextOpt,
    },
    /// List staged and unstaged changes
    Status,
    /// Stage the whole hunk at a diff line of the unstaged diff
    StageHunk {
        file: String,
        /// Diff line anywhere inside the hunk
        line: usize,
        #[command(flatten)]
        context: ContextOpt,
    },
    /// Stage only the change lines in a diff line range
    StageLines {
        file: String,
        /// First diff line of the selection
        start: usize,
        /// Last diff line of the selection; defaults to START
        end: Option<usize>,
        #[command(flatten)]
        context: ContextOpt,
    },
    /// Unstage the whole hunk at a diff line of the staged diff
    UnstageHunk {
        file: String,
        /// Diff line anywhere inside the hunk
        line: usize,
        #[command(flatten)]
        context: ContextOpt,
    },
    /// Unstage only the change lines in a staged-diff line range
    UnstageLines {
        file: String,
        /// First diff line of the selection
        start: usize,
        /// Last diff line of the selection; defaults to START
        end: Option<usize>,
        #[command(flatten)]
        context: ContextOpt,
    },
    /// Discard the working-tree hunk at a diff line
    RevertHunk {
        file: String,
        /// Diff line anywhere inside the hunk
        line: usize,
        #[command(flatten)]
        context: ContextOpt,
    },
    /// Discard only the working-tree change lines in a diff line range
    RevertLines {
        file: String,
        /// First diff line of the selection
        start: usize,
        /// Last diff line of the selection; defaults to START
        end: Option<usize>,
        #[command(flatten)]
        context: ContextOpt,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
    /// Render the manual page
    Man,
}

fn main() -> ExitCode {
    let Cli { repo, command } = Cli::parse();
    match run(&repo, command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::FAILURE
        }
    }
}

fn run(repo_path: &str, command: Commands) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Diff {
            file,
            staged,
            context,
        } => {
            let repo = GitHunks::open(repo_path)?;
            let diff = repo.diff(&file, staged, context.context)?;
            let rendered = format_numbered_diff(&diff);
            if !rendered.is_empty() {
                println!("{rendered}");
            }
        }
        Commands::Status => {
            let repo = GitHunks::open(repo_path)?;
            print_status(&repo.status()?);
        }
        Commands::StageHunk {
            file,
            line,
            context,
        } => {
            let repo = GitHunks::open(repo_path)?;
            println!("{}", repo.stage_hunk(&file, line, context.context)?);
        }
        Commands::StageLines {
            file,
            start,
            end,
            context,
        } => {
            let repo = GitHunks::open(repo_path)?;
            let end = end.unwrap_or(start);
            println!("{}", repo.stage_lines(&file, start, end, context.context)?);
        }
        Commands::UnstageHunk {
            file,
            line,
            context,
        } => {
            let repo = GitHunks::open(repo_path)?;
            println!("{}", repo.unstage_hunk(&file, line, context.context)?);
        }
        Commands::UnstageLines {
            file,
            start,
            end,
            context,
        } => {
            let repo = GitHunks::open(repo_path)?;
            let end = end.unwrap_or(start);
            println!("{}", repo.unstage_lines(&file, start, end, context.context)?);
        }
        Commands::RevertHunk {
            file,
            line,
            context,
        } => {
            let repo = GitHunks::open(repo_path)?;
            println!("{}", repo.revert_hunk(&file, line, context.context)?);
        }
        Commands::RevertLines {
            file,
            start,
            end,
            context,
        } => {
            let repo = GitHunks::open(repo_path)?;
            let end = end.unwrap_or(start);
            println!("{}", repo.revert_lines(&file, start, end, context.context)?);
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "git-hunks", &mut io::stdout());
        }
        Commands::Man => {
            let man = clap_mangen::Man::new(Cli::command());
            man.render(&mut io::stdout())?;
        }
    }
    Ok(())
}

fn print_status(changes: &[FileChange]) {
    if changes.is_empty() {
        println!("Working tree clean");
        return;
    }

    let staged: Vec<&FileChange> = changes.iter().filter(|change| change.staged).collect();
    let unstaged: Vec<&FileChange> = changes.iter().filter(|change| !change.staged).collect();

    if !staged.is_empty() {
        println!("Staged changes:");
        for change in &staged {
            println!("  {}", describe(change));
        }
    }
    if !unstaged.is_empty() {
        if !staged.is_empty() {
            println!();
        }
        println!("Unstaged changes:");
        for change in &unstaged {
            println!("  {}", describe(change));
        }
    }
}

fn describe(change: &FileChange) -> String {
    match &change.old_path {
        Some(old) => format!("{}: {} -> {}", change.status, old, change.path),
        None => format!("{}: {}", change.status, change.path),
    }
}
