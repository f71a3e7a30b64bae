/// Parser for the LCOV `.info` format.
///
/// Reference: https://ltp.sourceforge.net/coverage/lcov/geninfo.1.php
///
/// Key records:
///   TN:<test name>
///   SF:<absolute path to source file>
///   FN:<line>,<function name>
///   FNDA:<execution count>,<function name>
///   DA:<line number>,<execution count>[,<checksum>]
///   BRDA:<line>,<block>,<branch>,<taken>   ("-" means never evaluated)
///   LF/LH/BRF/BRH:<summary counts>
///   end_of_record
use std::collections::{BTreeMap, HashMap};

use tracing::{debug, warn};

use super::Parser;
use crate::error::{CovtrendError, Result};
use crate::model::{FileCoverage, Format};

/// LCOV format parser.
pub struct LcovParser;

impl Parser for LcovParser {
    fn source(&self) -> Format {
        Format::Lcov
    }

    fn parse_files(&self, input: &[u8]) -> Result<Vec<FileCoverage>> {
        parse(input)
    }
}

/// Hit state of one `SF` block. Lines and branches are keyed so that a
/// repeated record overwrites the earlier one instead of being counted twice.
#[derive(Debug, Default)]
struct FileBlock {
    path: String,
    lines: BTreeMap<u32, u64>,
    branches: BTreeMap<(u32, String, String), u64>,
}

impl FileBlock {
    fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            ..Default::default()
        }
    }

    /// Fold a later block for the same file into this one, summing hits the
    /// way `lcov --add-tracefile` does.
    fn absorb(&mut self, other: FileBlock) {
        for (line, hits) in other.lines {
            let entry = self.lines.entry(line).or_insert(0);
            *entry = entry.saturating_add(hits);
        }
        for (key, taken) in other.branches {
            let entry = self.branches.entry(key).or_insert(0);
            *entry = entry.saturating_add(taken);
        }
    }

    fn into_file_coverage(self) -> FileCoverage {
        FileCoverage {
            total_lines: self.lines.len() as u64,
            covered_lines: self.lines.values().filter(|&&h| h > 0).count() as u64,
            total_branches: self.branches.len() as u64,
            covered_branches: self.branches.values().filter(|&&t| t > 0).count() as u64,
            filename: self.path,
        }
    }
}

/// Parse LCOV format coverage data from raw bytes.
pub fn parse(input: &[u8]) -> Result<Vec<FileCoverage>> {
    let mut files: Vec<FileBlock> = Vec::new();
    let mut file_index: HashMap<String, usize> = HashMap::new();
    let mut current: Option<FileBlock> = None;

    for (idx, raw) in input.split(|&b| b == b'\n').enumerate() {
        let line_no = idx + 1;
        let line = std::str::from_utf8(raw).map_err(|_| CovtrendError::Malformed {
            format: "LCOV",
            detail: format!("invalid UTF-8 on line {}", line_no),
        })?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if line == "end_of_record" {
            if let Some(block) = current.take() {
                match file_index.get(&block.path) {
                    Some(&i) => files[i].absorb(block),
                    None => {
                        file_index.insert(block.path.clone(), files.len());
                        files.push(block);
                    }
                }
            }
            continue;
        }

        let (tag, value) = match line.split_once(':') {
            Some(pair) => pair,
            None => continue,
        };

        match tag {
            "SF" => {
                if let Some(open) = current.replace(FileBlock::new(value)) {
                    warn!(
                        "LCOV line {}: block for '{}' has no end_of_record, discarding it",
                        line_no, open.path
                    );
                }
            }
            "DA" => {
                // DA:<line_number>,<execution_count>[,<checksum>]
                let Some(block) = current.as_mut() else {
                    continue;
                };
                match parse_da(value) {
                    Some((number, hits)) => {
                        block.lines.insert(number, hits);
                    }
                    None => debug!("LCOV line {}: skipping malformed record '{}'", line_no, line),
                }
            }
            "BRDA" => {
                // BRDA:<line>,<block>,<branch>,<taken>
                let Some(block) = current.as_mut() else {
                    continue;
                };
                match parse_brda(value) {
                    Some((key, taken)) => {
                        block.branches.insert(key, taken);
                    }
                    None => debug!("LCOV line {}: skipping malformed record '{}'", line_no, line),
                }
            }
            // TN, FN, FNDA and the LF/LH/BRF/BRH summaries. Totals are always
            // derived from the DA/BRDA data instead.
            _ => {}
        }
    }

    if let Some(open) = current {
        warn!(
            "LCOV input ends inside the block for '{}' (no end_of_record), discarding it",
            open.path
        );
    }

    Ok(files.into_iter().map(FileBlock::into_file_coverage).collect())
}

/// `None` when malformed. A negative count is an uncovered line.
fn parse_da(value: &str) -> Option<(u32, u64)> {
    let mut parts = value.splitn(3, ',');
    let number = parts.next()?.trim().parse::<u32>().ok()?;
    let count = parts.next()?.trim().parse::<i128>().ok()?;
    Some((number, count.clamp(0, u64::MAX as i128) as u64))
}

fn parse_brda(value: &str) -> Option<((u32, String, String), u64)> {
    let parts: Vec<&str> = value.splitn(4, ',').map(str::trim).collect();
    if parts.len() != 4 {
        return None;
    }
    let line = parts[0].parse::<u32>().ok()?;
    let taken = if parts[3] == "-" {
        0
    } else {
        parts[3].parse::<u64>().ok()?
    };
    Some(((line, parts[1].to_string(), parts[2].to_string()), taken))
}
