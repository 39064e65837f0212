use anyhow::{Context, Result};
use bstr::BStr;
use clap::Args;
use octo_hash::ObjectId;
use octo_merge::driver::merge_one_file;
use octo_merge::{Side, Sides};
use octo_object::FileMode;

use super::{merge_options, open_repo};
use crate::Cli;

/// Arguments as passed by `merge-index`. An empty id means the side is
/// absent; its mode is then ignored.
#[derive(Args)]
pub struct MergeOneFileArgs {
    /// Blob id of the common ancestor
    orig: String,
    /// Blob id of our version
    our: String,
    /// Blob id of their version
    their: String,
    /// Path being merged
    path: String,
    /// Octal mode of the common ancestor
    orig_mode: String,
    /// Octal mode of our version
    our_mode: String,
    /// Octal mode of their version
    their_mode: String,
}

fn parse_side(oid: &str, mode: &str) -> Result<Option<Side>> {
    if oid.is_empty() {
        return Ok(None);
    }
    let oid = ObjectId::from_hex(oid).with_context(|| format!("invalid object id '{oid}'"))?;
    let mode = FileMode::from_octal(mode.as_bytes()).with_context(|| format!("invalid mode '{mode}'"))?;
    Ok(Some(Side::new(oid, mode)))
}

pub fn run(args: &MergeOneFileArgs, cli: &Cli) -> Result<i32> {
    let sides = Sides {
        base: parse_side(&args.orig, &args.orig_mode)?,
        ours: parse_side(&args.our, &args.our_mode)?,
        theirs: parse_side(&args.their, &args.their_mode)?,
    };
    let repo = open_repo(cli)?;
    let options = merge_options(&repo)?;
    let status = merge_one_file(&repo, &options, BStr::new(&args.path), &sides)?;
    Ok(status.code())
}
