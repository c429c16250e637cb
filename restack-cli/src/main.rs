//! Restack command line

mod log;
mod select;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use restack_core::collect::first_parent_log;
use restack_core::history::Rewriter;
use restack_core::{
    CommandEditor, FilterSelector, HistoryError, HunkSelector, PathFilter, PathMerger, RefStore, Repository,
    RewriteContext, RewriteOptions, RewriteOutcome, revparse,
};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::select::TerminalSelector;

#[derive(Parser, Debug)]
#[command(name = "restack")]
#[command(author = "Restack Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Reword and split commits on a linear branch")]
struct Cli {
    /// Run as if started in this directory
    #[arg(short = 'C', long = "repo", default_value = ".")]
    repo: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create an empty repository
    Init {
        #[arg(short, long, default_value = "main")]
        branch: String,
    },

    /// Record the working tree as a new commit
    Commit {
        #[arg(short, long)]
        message: String,
    },

    /// Change the message of a commit and rebuild its descendants
    Reword { revision: String },

    /// Split a commit into two
    Split {
        revision: String,

        /// Take every change under the given paths without asking
        #[arg(short, long)]
        all: bool,

        /// Only offer changes under these paths
        #[arg(last = true)]
        paths: Vec<String>,
    },

    /// Show first-parent history
    Log {
        revision: Option<String>,

        #[arg(short = 'n', long, default_value_t = 20)]
        max_count: usize,
    },

    /// Show how a branch moved
    Reflog { branch: Option<String> },
}

fn init_tracing(debug: bool) {
    let env_filter = if debug {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into())
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

fn report(outcome: &RewriteOutcome) {
    println!(
        "{} -> {} ({} commit(s) rewritten, {} dropped)",
        outcome.old_tip.short(),
        outcome.new_tip.short(),
        outcome.chain.len(),
        outcome.collapsed
    );
}

fn context<'a>(repo: &'a Repository, editor: &'a CommandEditor) -> RewriteContext<'a> {
    RewriteContext::new(
        repo.store(),
        repo.refs(),
        &PathMerger,
        editor,
        RewriteOptions::from(repo.config()),
    )
}

async fn run(cli: Cli) -> Result<()> {
    let repo_path = cli.repo;
    match cli.command {
        Commands::Init { branch } => {
            let repo = Repository::init(&repo_path, &branch)?;
            println!("Initialized empty repository in {}", repo.root().display());
        }
        Commands::Commit { message } => {
            let repo = Repository::open(&repo_path)?;
            let id = repo.commit(&message).await?;
            println!("[{} {}] {}", repo.branch(), id.short(), message.lines().next().unwrap_or(""));
        }
        Commands::Reword { revision } => {
            let repo = Repository::open(&repo_path)?;
            let editor = CommandEditor::from_config(repo.config(), repo.root());
            let rewriter = Rewriter::new(context(&repo, &editor), &FilterSelector);
            report(&rewriter.reword(&revision).await?);
        }
        Commands::Split { revision, all, paths } => {
            let repo = Repository::open(&repo_path)?;
            let editor = CommandEditor::from_config(repo.config(), repo.root());
            let terminal;
            let selector: &dyn HunkSelector = if all {
                &FilterSelector
            } else {
                terminal = TerminalSelector::stdio();
                &terminal
            };
            let rewriter = Rewriter::new(context(&repo, &editor), selector);
            report(&rewriter.split(&revision, &PathFilter::new(&paths)).await?);
        }
        Commands::Log { revision, max_count } => {
            let repo = Repository::open(&repo_path)?;
            let spec = revision.as_deref().unwrap_or("HEAD");
            let start = revparse::resolve(repo.store(), repo.refs(), spec, repo.branch()).await?;
            let commits = first_parent_log(repo.store(), start, max_count).await?;
            log::print_log(&commits, &mut std::io::stdout())?;
        }
        Commands::Reflog { branch } => {
            let repo = Repository::open(&repo_path)?;
            let branch = branch.unwrap_or_else(|| repo.branch().to_string());
            let entries = repo
                .refs()
                .reflog(&branch)
                .await
                .with_context(|| format!("reading reflog of {}", branch))?;
            log::print_reflog(&branch, &entries, &mut std::io::stdout())?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let env_verbose = restack_core::parse::env_bool("RESTACK_VERBOSE", false).unwrap_or(false);
    init_tracing(cli.verbose || env_verbose);

    if let Err(err) = run(cli).await {
        let code = match err.downcast_ref::<HistoryError>() {
            Some(e) if e.is_internal() => {
                eprintln!("{}", e);
                e.exit_code()
            }
            Some(e) => {
                eprintln!("error: {:#}", err);
                e.exit_code()
            }
            None => {
                eprintln!("error: {:#}", err);
                1
            }
        };
        std::process::exit(code);
    }
}
