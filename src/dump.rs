//! Diagnostic JSON dumps.

use crate::configuration::Configuration;
use crate::error::Result;
use crate::kdtree::ConfigKdTree;
use crate::node::TreeNode;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Everything needed to replay or visualise one exploration run.
#[derive(Serialize)]
pub struct ExplorationDump<'a> {
    pub session: u64,
    pub run: u64,
    pub movable: usize,
    pub root: Configuration,
    pub target: Configuration,
    pub exact: bool,
    pub complete: bool,
    pub solution: usize,
    pub nodes: &'a [TreeNode],
    pub index: &'a ConfigKdTree,
}

/// `est-<session>-<run>.json`
pub fn exploration_file_name(session: u64, run: u64) -> String {
    format!("est-{}-{}.json", session, run)
}

/// Serialises `value` as JSON into `path`, replacing any existing file.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}
