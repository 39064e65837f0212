pub mod merge_index;
pub mod merge_octopus;
pub mod merge_one_file;
pub mod merge_resolve;

use anyhow::{Context, Result};
use clap::Subcommand;
use octo_hash::ObjectId;
use octo_merge::{MergeError, MergeOptions, MergeOutcome};
use octo_repo::Repository;

use crate::Cli;

/// Exit code for a merge that could not be attempted or was abandoned.
pub const EXIT_FATAL_MERGE: i32 = 2;

/// Exit code for bad invocations, same as for clap parse errors.
pub const EXIT_USAGE: i32 = 128;

#[derive(Subcommand)]
pub enum Commands {
    /// Merge one remote into our head with a multi-base tree merge
    MergeResolve(merge_resolve::MergeResolveArgs),
    /// Merge two or more remotes into our head
    MergeOctopus(merge_octopus::MergeOctopusArgs),
    /// Resolve a single unmerged path from explicit sides
    MergeOneFile(merge_one_file::MergeOneFileArgs),
    /// Run a merge program for unmerged index entries
    MergeIndex(merge_index::MergeIndexArgs),
}

pub fn open_repo(cli: &Cli) -> Result<Repository> {
    let repo = if let Some(ref git_dir) = cli.git_dir {
        Repository::open(git_dir)?
    } else {
        Repository::discover(".")?
    };
    Ok(repo)
}

pub fn merge_options(repo: &Repository) -> Result<MergeOptions> {
    Ok(MergeOptions::from_config(repo.config())?)
}

pub fn usage(text: &str) -> Result<i32> {
    eprintln!("usage: {text}");
    Ok(EXIT_USAGE)
}

/// Resolve a commit argument. Arguments naming the empty tree yield `None`.
pub fn lookup_commit(repo: &Repository, spec: &str) -> Result<Option<ObjectId>> {
    let oid = lookup_head(repo, spec)?;
    Ok((oid != repo.hash_algo().empty_tree()?).then_some(oid))
}

/// Resolve our head argument, which may name the empty tree.
pub fn lookup_head(repo: &Repository, spec: &str) -> Result<ObjectId> {
    let oid = repo
        .resolve_revision(spec)
        .with_context(|| format!("could not parse object '{spec}'"))?;
    if oid != repo.hash_algo().empty_tree()? {
        repo.odb()
            .peel_to_commit(&oid)
            .with_context(|| format!("{spec} is not a commit"))?;
    }
    Ok(oid)
}

/// Map a strategy result to its exit code, reporting fatal errors.
pub fn strategy_exit(result: Result<MergeOutcome, MergeError>) -> i32 {
    match result {
        Ok(outcome) => {
            if let Some(tree) = outcome.tree {
                tracing::debug!(%tree, merged = outcome.merged.len(), "merge result");
            }
            outcome.status.code()
        }
        // Already announced by the strategy.
        Err(MergeError::OctopusAborted) => EXIT_FATAL_MERGE,
        Err(e) => {
            tracing::error!("{e}");
            EXIT_FATAL_MERGE
        }
    }
}

pub fn run(cli: Cli) -> Result<i32> {
    match &cli.command {
        Commands::MergeResolve(args) => merge_resolve::run(args, &cli),
        Commands::MergeOctopus(args) => merge_octopus::run(args, &cli),
        Commands::MergeOneFile(args) => merge_one_file::run(args, &cli),
        Commands::MergeIndex(args) => merge_index::run(args, &cli),
    }
}
