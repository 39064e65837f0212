use anyhow::{Context, Result};
use clap::Args;
use octo_merge::OctopusStrategy;

use super::{lookup_commit, merge_options, open_repo, strategy_exit, usage, EXIT_FATAL_MERGE};
use crate::Cli;

const USAGE: &str = "octo merge-octopus [<bases>...] -- <head> <remote1> <remote2> [<remotes>...]";

#[derive(Args)]
pub struct MergeOctopusArgs {
    /// Merge bases
    bases: Vec<String>,

    /// Our head, then the commits to merge
    #[arg(last = true)]
    heads: Vec<String>,
}

pub fn run(args: &MergeOctopusArgs, cli: &Cli) -> Result<i32> {
    if args.heads.is_empty() || args.bases.len() + args.heads.len() < 3 {
        return usage(USAGE);
    }
    let repo = open_repo(cli)?;

    let mut bases = Vec::with_capacity(args.bases.len());
    for spec in &args.bases {
        bases.extend(lookup_commit(&repo, spec)?);
    }
    let head_arg = &args.heads[0];
    let head = lookup_commit(&repo, head_arg)?
        .with_context(|| format!("{head_arg} is the empty tree, not a commit"))?;
    let mut remotes = Vec::with_capacity(args.heads.len() - 1);
    for spec in &args.heads[1..] {
        remotes.extend(lookup_commit(&repo, spec)?);
    }

    // Not an octopus; resolve should be used instead.
    if remotes.len() < 2 {
        return Ok(EXIT_FATAL_MERGE);
    }

    let strategy = OctopusStrategy::new(&repo, merge_options(&repo)?);
    Ok(strategy_exit(strategy.run(&bases, &head, &remotes)))
}
