use anyhow::Result;
use clap::Args;
use octo_merge::ResolveStrategy;

use super::{lookup_commit, lookup_head, merge_options, open_repo, strategy_exit, usage, EXIT_FATAL_MERGE};
use crate::Cli;

const USAGE: &str = "octo merge-resolve <bases>... -- <head> <remote>";

#[derive(Args)]
pub struct MergeResolveArgs {
    /// Merge bases
    bases: Vec<String>,

    /// Our head, then the commit to merge
    #[arg(last = true)]
    heads: Vec<String>,
}

pub fn run(args: &MergeResolveArgs, cli: &Cli) -> Result<i32> {
    if args.heads.is_empty() || args.bases.len() + args.heads.len() < 3 {
        return usage(USAGE);
    }
    let repo = open_repo(cli)?;

    let head = lookup_head(&repo, &args.heads[0])?;
    let mut remote = None;
    for spec in &args.heads[1..] {
        if remote.is_some() {
            tracing::debug!("more than one remote, not handling octopus");
            return Ok(EXIT_FATAL_MERGE);
        }
        remote = lookup_commit(&repo, spec)?;
    }

    // A baseless merge has nothing before `--`.
    if args.bases.is_empty() {
        return Ok(EXIT_FATAL_MERGE);
    }
    let mut bases = Vec::with_capacity(args.bases.len());
    for spec in &args.bases {
        bases.extend(lookup_commit(&repo, spec)?);
    }

    let strategy = ResolveStrategy::new(&repo, merge_options(&repo)?);
    Ok(strategy_exit(strategy.run(&bases, Some(&head), remote.as_ref())))
}
