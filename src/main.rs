//! gitxref - reverse trailer cross-references as git notes
//!
//! This is the main entry point for the command-line interface.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{ArgAction, Parser, ValueEnum};
use tracing::Subscriber;
use tracing_subscriber::filter::{FilterExt, LevelFilter, Targets};
use tracing_subscriber::layer::Filter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt, EnvFilter};

use gitxref::storage::{ConflictPolicy, GitRepository, WalkOrder};
use gitxref::xref::{ChainMode, Preset, XrefConfig, XrefPass};

#[derive(Parser)]
#[command(
    name = "gitxref",
    about = "Record commits referencing each other through trailers as git notes",
    version,
    after_help = "Examples:\n  \
        gitxref --xref-cherry-picks                      note cherry-picks reachable from HEAD\n  \
        gitxref --xref-cherry-picks --clear v1.0..       drop those notes again\n  \
        gitxref --trailer-prefix 'Backport-of: ' --notes backports --tag Backported-to main"
)]
struct Cli {
    /// Use the preset for cherry-pick notes (refs/notes/xref-cherry-picks)
    #[arg(long)]
    xref_cherry_picks: bool,

    /// Process trailers starting with PREFIX
    #[arg(long, value_name = "PREFIX")]
    trailer_prefix: Option<String>,

    /// Update notes in NOTES_REF
    #[arg(long = "notes", value_name = "NOTES_REF")]
    notes_ref: Option<String>,

    /// Tag xref note lines with TAG
    #[arg(long)]
    tag: Option<String>,

    /// Clear xref notes from the specified commits
    #[arg(long)]
    clear: bool,

    /// Also list every transitive descendant on each ancestor
    #[arg(long)]
    transitive: bool,

    /// What to do when a commit already has a note
    #[arg(long, value_enum, default_value_t = OnConflict::Fail)]
    on_conflict: OnConflict,

    /// Visit parents only after all of their children
    #[arg(long)]
    topo_order: bool,

    /// Visit oldest commits first
    #[arg(long)]
    reverse: bool,

    /// Follow only the first parent of merge commits
    #[arg(long)]
    first_parent: bool,

    /// Path inside the repository
    #[arg(short = 'C', long = "repo", default_value = ".")]
    repo: PathBuf,

    /// Print the pass report as JSON
    #[arg(long)]
    json: bool,

    /// Report each commit (repeat for debug output)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Revisions to walk (default HEAD)
    #[arg(value_name = "REVISION")]
    revisions: Vec<String>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OnConflict {
    Fail,
    Replace,
    Merge,
}

impl From<OnConflict> for ConflictPolicy {
    fn from(value: OnConflict) -> Self {
        match value {
            OnConflict::Fail => ConflictPolicy::Fail,
            OnConflict::Replace => ConflictPolicy::Replace,
            OnConflict::Merge => ConflictPolicy::Merge,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("fatal: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8) {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time()
                .with_filter(log_filter(env, verbose)),
        )
        .init();
}

/// `RUST_LOG` (default `warn`), with `-v` as a floor for gitxref's own events
fn log_filter<S>(env: EnvFilter, verbose: u8) -> impl Filter<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let level = match verbose {
        0 => LevelFilter::OFF,
        1 => LevelFilter::INFO,
        _ => LevelFilter::DEBUG,
    };
    FilterExt::<S>::or(env, Targets::new().with_target("gitxref", level))
}

fn build_config(cli: &Cli) -> anyhow::Result<XrefConfig> {
    let mut builder = XrefConfig::builder()
        .clear(cli.clear)
        .conflict(cli.on_conflict.into())
        .verbose(cli.verbose > 0)
        .first_parent(cli.first_parent)
        .revisions(cli.revisions.iter().cloned());

    if cli.xref_cherry_picks {
        builder = builder.preset(Preset::CherryPicks);
    }
    if let Some(prefix) = &cli.trailer_prefix {
        builder = builder.trailer_prefix(prefix.clone());
    }
    if let Some(notes_ref) = &cli.notes_ref {
        builder = builder.notes_ref(notes_ref.clone());
    }
    if let Some(tag) = &cli.tag {
        builder = builder.tag(tag.clone());
    }
    if cli.transitive {
        builder = builder.chain(ChainMode::Transitive);
    }

    let order = match (cli.reverse, cli.topo_order) {
        (true, _) => WalkOrder::Reverse,
        (false, true) => WalkOrder::Topological,
        (false, false) => WalkOrder::Time,
    };

    Ok(builder.order(order).build()?)
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = build_config(&cli)?;
    let repo = GitRepository::discover(&cli.repo)
        .with_context(|| format!("cannot open repository at {}", cli.repo.display()))?;

    let report = XrefPass::new(config).run(&repo)?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if cli.verbose > 0 {
        eprintln!("{}", report);
    }
    Ok(())
}
