//! kbgraph command-line interface.

use std::io;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use kbgraph::operations::{
    link_interactively, EntityMerger, Organizer, RelationWriter, Selector, WriteReport,
};
use kbgraph::{Config, EntityId, KnowledgeStore, LinkProposer, SqliteStore};

#[derive(Parser)]
#[command(
    name = "kbgraph",
    version,
    about = "Maintenance utilities for a personal knowledge graph"
)]
struct Cli {
    /// SQLite database path (overrides the config file)
    #[arg(long, global = true, env = "KBGRAPH_DB", value_name = "PATH")]
    db: Option<PathBuf>,

    /// JSON configuration file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database schema if it does not exist
    Init,
    /// Print entities grouped by category
    Classify,
    /// Propose related_to links between entities of the same category
    Propose(ProposeArgs),
    /// Pick two entities and describe a relation interactively
    Link,
    /// Merge duplicate entities into canonical ones
    Merge(MergeArgs),
    /// File documents into folders by keyword and tag matching entities
    Organize(OrganizeArgs),
}

#[derive(Args)]
struct ProposeArgs {
    /// Persist the candidates instead of only printing them
    #[arg(long)]
    write: bool,
}

#[derive(Args)]
struct MergeArgs {
    /// Surviving entity id
    #[arg(required_unless_present = "pair", requires = "duplicate")]
    canonical: Option<i64>,

    /// Entity id to absorb and delete
    duplicate: Option<i64>,

    /// Additional CANONICAL:DUPLICATE pairs, merged in order
    #[arg(long, value_name = "CANONICAL:DUPLICATE", value_parser = parse_pair)]
    pair: Vec<(EntityId, EntityId)>,
}

#[derive(Args)]
struct OrganizeArgs {
    /// Directory to scan
    source: PathBuf,

    /// Root under which rule folders are created
    target: PathBuf,

    /// Report what would happen without moving or tagging anything
    #[arg(long)]
    dry_run: bool,
}

fn parse_pair(raw: &str) -> Result<(EntityId, EntityId), String> {
    let (canonical, duplicate) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected CANONICAL:DUPLICATE, got '{raw}'"))?;
    let parse = |s: &str| {
        s.trim()
            .parse::<i64>()
            .map(EntityId::new)
            .map_err(|_| format!("'{s}' is not an entity id"))
    };
    Ok((parse(canonical)?, parse(duplicate)?))
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(db) = &cli.db {
        config.database.clone_from(db);
    }
    Ok(config)
}

fn print_write_report(report: &WriteReport) {
    for (candidate, reason) in report.skips() {
        println!(
            "skipped ({}, {}, {}): {reason}",
            candidate.from_id, candidate.to_id, candidate.relation_type
        );
    }
    println!(
        "{} inserted, {} skipped",
        report.inserted(),
        report.skipped()
    );
}

fn run_classify(config: &Config, store: &mut SqliteStore) -> Result<()> {
    let proposer = LinkProposer::new(&config.categories)?;
    let entities = store.begin()?.list_entities()?;
    for group in proposer.group(&entities) {
        println!("{} ({})", group.category, group.entities.len());
        for entity in &group.entities {
            println!("  {:>6}  {} [{}]", entity.id, entity.title, entity.entity_type);
        }
    }
    Ok(())
}

fn run_propose(args: &ProposeArgs, config: &Config, store: &mut SqliteStore) -> Result<()> {
    let proposer = LinkProposer::new(&config.categories)?;
    let entities = store.begin()?.list_entities()?;
    let candidates = proposer.propose(&entities);

    if !args.write {
        for c in &candidates {
            println!("({}, {}, {}) {}", c.from_id, c.to_id, c.relation_type, c.to_name);
        }
        println!("{} candidates", candidates.len());
        return Ok(());
    }

    let report = RelationWriter::new(store).write(&candidates)?;
    print_write_report(&report);
    Ok(())
}

fn run_link(store: &mut SqliteStore) -> Result<()> {
    let stdin = io::stdin();
    let mut selector = Selector::new(stdin.lock(), io::stdout());
    match link_interactively(store, &mut selector)? {
        Some(report) => print_write_report(&report),
        None => println!("cancelled"),
    }
    Ok(())
}

fn run_merge(args: &MergeArgs, store: &mut SqliteStore) -> Result<()> {
    let mut pairs = Vec::with_capacity(args.pair.len() + 1);
    if let (Some(canonical), Some(duplicate)) = (args.canonical, args.duplicate) {
        pairs.push((EntityId::new(canonical), EntityId::new(duplicate)));
    }
    pairs.extend(args.pair.iter().copied());

    let batch = EntityMerger::new(store).merge_all(&pairs)?;
    for report in &batch.merged {
        println!(
            "merged {} into {}: {} relations repointed, {} dropped, {} observations moved",
            report.duplicate,
            report.canonical,
            report.repointed.len(),
            report.dropped.len(),
            report.observations_moved
        );
        for (key, reason) in &report.dropped {
            println!("  dropped {key}: {reason}");
        }
    }
    for failure in &batch.failed {
        println!(
            "failed to merge {} into {}: {}",
            failure.duplicate, failure.canonical, failure.error
        );
    }
    if !batch.failed.is_empty() {
        bail!("{} of {} merges failed", batch.failed.len(), pairs.len());
    }
    Ok(())
}

fn run_organize(args: &OrganizeArgs, config: &Config, store: &mut SqliteStore) -> Result<()> {
    let organizer = Organizer::new(&config.organizer)?;
    let report = organizer.organize(&args.source, &args.target, store, args.dry_run)?;
    let verb = if args.dry_run { "would move" } else { "moved" };
    for planned in &report.moved {
        println!(
            "{verb} {} -> {}",
            planned.source.display(),
            planned.destination.display()
        );
    }
    for (planned, reason) in &report.skipped {
        println!("skipped {}: {reason}", planned.source.display());
    }
    println!(
        "{} {verb}, {} skipped, {} unmatched, {} entities tagged",
        report.moved.len(),
        report.skipped.len(),
        report.unmatched,
        report.tagged.len()
    );
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(&cli)?;
    let mut store = SqliteStore::open(&config.database)
        .with_context(|| format!("opening {}", config.database.display()))?;

    match &cli.command {
        Commands::Init => {
            println!("initialized {}", config.database.display());
            Ok(())
        }
        Commands::Classify => run_classify(&config, &mut store),
        Commands::Propose(args) => run_propose(args, &config, &mut store),
        Commands::Link => run_link(&mut store),
        Commands::Merge(args) => run_merge(args, &mut store),
        Commands::Organize(args) => run_organize(args, &config, &mut store),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_pair_accepts_colon_separated_ids() {
        assert_eq!(
            parse_pair("14:32").unwrap(),
            (EntityId::new(14), EntityId::new(32))
        );
        assert!(parse_pair("14").is_err());
        assert!(parse_pair("a:32").is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn merge_accepts_positional_or_pairs() {
        let cli = Cli::try_parse_from(["kbgraph", "merge", "14", "32"]).unwrap();
        assert!(matches!(cli.command, Commands::Merge(ref a) if a.canonical == Some(14)));

        let cli = Cli::try_parse_from(["kbgraph", "merge", "--pair", "1:2", "--pair", "3:4"])
            .unwrap();
        let Commands::Merge(args) = cli.command else {
            panic!("expected merge");
        };
        assert_eq!(args.pair.len(), 2);

        assert!(Cli::try_parse_from(["kbgraph", "merge"]).is_err());
    }
}
