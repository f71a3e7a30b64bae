pub mod cobertura;
pub mod lcov;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::{CoverageReport, FileCoverage, Format};

/// Every format parser implements this trait.
pub trait Parser {
    /// The format this parser reads, recorded as the report's source.
    fn source(&self) -> Format;

    /// Parse the input bytes into per-file counters.
    fn parse_files(&self, input: &[u8]) -> Result<Vec<FileCoverage>>;

    /// Parse the input bytes into a report stamped with `timestamp`.
    fn parse_at(&self, input: &[u8], timestamp: DateTime<Utc>) -> Result<CoverageReport> {
        let files = self.parse_files(input)?;
        Ok(CoverageReport::new(self.source(), files, timestamp))
    }

    /// Parse the input bytes into a report stamped with the current time.
    fn parse(&self, input: &[u8]) -> Result<CoverageReport> {
        self.parse_at(input, Utc::now())
    }
}

/// The parser for a given format.
pub fn parser_for(format: Format) -> &'static dyn Parser {
    match format {
        Format::Lcov => &lcov::LcovParser,
        Format::Cobertura => &cobertura::CoberturaParser,
    }
}
