use anyhow::Result;
use bstr::BString;
use clap::Args;
use octo_merge::driver::{merge_index, MergeProgram, PathSelection};
use octo_merge::ScanMode;

use super::{merge_options, open_repo, usage};
use crate::Cli;

const USAGE: &str = "octo merge-index [-o] [-q] <merge-program> (-a | [--] [<filename>...])";

#[derive(Args)]
pub struct MergeIndexArgs {
    /// Keep going after a path fails to merge
    #[arg(short = 'o')]
    one_shot: bool,

    /// Do not report paths the program failed on
    #[arg(short = 'q')]
    quiet: bool,

    /// Run the program for every unmerged path
    #[arg(short = 'a')]
    all: bool,

    /// Program to run; `merge-one-file` is handled in-process
    program: String,

    /// Paths to merge
    #[arg(conflicts_with = "all")]
    paths: Vec<String>,
}

pub fn run(args: &MergeIndexArgs, cli: &Cli) -> Result<i32> {
    let selection = if args.all {
        PathSelection::All
    } else if args.paths.is_empty() {
        return usage(USAGE);
    } else {
        PathSelection::Paths(args.paths.iter().map(|p| BString::from(p.as_str())).collect())
    };
    let mode = if args.one_shot {
        ScanMode::KeepGoing
    } else {
        ScanMode::StopAtFirstFailure
    };

    let repo = open_repo(cli)?;
    let mut options = merge_options(&repo)?;
    options.quiet = args.quiet;

    let status = merge_index(&repo, &options, &MergeProgram::parse(&args.program), &selection, mode)?;
    Ok(status.code())
}
