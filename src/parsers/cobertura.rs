/// Parser for Cobertura XML coverage reports.
///
/// Cobertura XML structure:
///   <coverage line-rate="..." branch-rate="...">
///     <sources><source>...</source></sources>
///     <packages>
///       <package name="...">
///         <classes>
///           <class name="..." filename="..." line-rate="..." branch-rate="...">
///             <methods>
///               <method name="..." ... line-rate="...">
///                 <lines><line number="..." hits="..." .../></lines>
///               </method>
///             </methods>
///             <lines>
///               <line number="..." hits="..." branch="true|false"
///                     condition-coverage="50% (1/2)" />
///             </lines>
///           </class>
///         </classes>
///       </package>
///     </packages>
///   </coverage>
///
/// The rates on `<coverage>` and `<class>` are ignored; exporters round them
/// inconsistently, so every percentage is recomputed from the `<line>` data.
use std::collections::HashMap;
use std::str;
use std::sync::LazyLock;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use regex::Regex;
use tracing::debug;

/// Pre-compiled regex for condition-coverage attributes like "75% (3/4)".
static BRANCH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\((\d+)/(\d+)\)").unwrap());

use super::Parser;
use crate::error::{CovtrendError, Result};
use crate::model::{FileCoverage, Format};

pub struct CoberturaParser;

impl Parser for CoberturaParser {
    fn source(&self) -> Format {
        Format::Cobertura
    }

    fn parse_files(&self, input: &[u8]) -> Result<Vec<FileCoverage>> {
        parse(input)
    }
}

#[derive(Debug)]
struct LineHit {
    hits: u64,
    covered_branches: u64,
    total_branches: u64,
}

/// Lines of one `<class>` element. A line listed under both `<method>` and
/// the class's own `<lines>` is kept once.
#[derive(Debug, Default)]
struct ClassLines {
    filename: String,
    lines: Vec<LineHit>,
    line_index: HashMap<u32, usize>,
}

impl ClassLines {
    fn new(filename: String) -> Self {
        Self {
            filename,
            ..Default::default()
        }
    }

    fn record(&mut self, number: Option<u32>, hits: u64, branches: (u64, u64)) {
        if let Some(n) = number {
            if let Some(&idx) = self.line_index.get(&n) {
                let line = &mut self.lines[idx];
                line.hits = line.hits.max(hits);
                return;
            }
            self.line_index.insert(n, self.lines.len());
        }
        self.lines.push(LineHit {
            hits,
            covered_branches: branches.0,
            total_branches: branches.1,
        });
    }

    fn into_file_coverage(self) -> FileCoverage {
        FileCoverage {
            total_lines: self.lines.len() as u64,
            covered_lines: self.lines.iter().filter(|l| l.hits > 0).count() as u64,
            total_branches: self
                .lines
                .iter()
                .fold(0, |acc, l| acc.saturating_add(l.total_branches)),
            covered_branches: self
                .lines
                .iter()
                .fold(0, |acc, l| acc.saturating_add(l.covered_branches)),
            filename: self.filename,
        }
    }
}

/// Parse Cobertura XML coverage data from raw bytes. Classes that share a
/// `filename` are summed into one entry.
pub fn parse(input: &[u8]) -> Result<Vec<FileCoverage>> {
    let mut reader = Reader::from_reader(input);
    reader.trim_text(true);

    let mut files: Vec<FileCoverage> = Vec::new();
    let mut file_index: HashMap<String, usize> = HashMap::new();
    let mut buf = Vec::new();

    let mut current: Option<ClassLines> = None;
    let mut open_elements: Vec<String> = Vec::new();
    let mut saw_root = false;

    let mut finish_class = |class: ClassLines| {
        let file = class.into_file_coverage();
        match file_index.get(&file.filename) {
            Some(&idx) => files[idx].merge(&file),
            None => {
                file_index.insert(file.filename.clone(), files.len());
                files.push(file);
            }
        }
    };

    loop {
        let event = reader.read_event_into(&mut buf);
        let is_start_event = matches!(&event, Ok(Event::Start(_)));
        match event {
            Err(e) => {
                return Err(CovtrendError::Xml {
                    source: e,
                    position: reader.buffer_position(),
                })
            }
            Ok(Event::Eof) => break,
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                if is_start_event {
                    open_elements.push(String::from_utf8_lossy(e.name().as_ref()).into_owned());
                }
                match e.local_name().as_ref() {
                    b"coverage" => saw_root = true,
                    b"class" | b"file" => {
                        let attrs = attr_map(e);
                        match attrs.get("filename") {
                            Some(filename) => {
                                let class = ClassLines::new(filename.clone());
                                if is_start_event {
                                    current = Some(class);
                                } else {
                                    // Self-closing class: a file with no lines.
                                    finish_class(class);
                                }
                            }
                            None => {
                                debug!(
                                    "Cobertura: element at byte {} has no filename, ignoring its lines",
                                    reader.buffer_position()
                                );
                                current = None;
                            }
                        }
                    }
                    b"line" => {
                        if let Some(class) = current.as_mut() {
                            let attrs = attr_map(e);
                            let number = attrs.get("number").and_then(|n| n.trim().parse::<u32>().ok());
                            let hits = attrs
                                .get("hits")
                                .and_then(|h| h.trim().parse::<u64>().ok())
                                .unwrap_or(0);
                            let is_branch = attrs
                                .get("branch")
                                .map(|v| v.eq_ignore_ascii_case("true"))
                                .unwrap_or(false);
                            let branches = if is_branch {
                                attrs
                                    .get("condition-coverage")
                                    .and_then(|c| parse_condition_coverage(c))
                                    .unwrap_or((0, 0))
                            } else {
                                (0, 0)
                            };
                            class.record(number, hits, branches);
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::End(ref e)) => {
                open_elements.pop();
                if matches!(e.local_name().as_ref(), b"class" | b"file") {
                    if let Some(class) = current.take() {
                        finish_class(class);
                    }
                }
            }
            _ => {}
        }
        buf.clear();
    }

    if let Some(unclosed) = open_elements.last() {
        return Err(CovtrendError::Malformed {
            format: "Cobertura",
            detail: format!("unexpected end of document, <{}> is not closed", unclosed),
        });
    }
    if !saw_root {
        return Err(CovtrendError::Malformed {
            format: "Cobertura",
            detail: "missing <coverage> root element".to_string(),
        });
    }

    Ok(files)
}

/// Parse `"NN% (a/b)"` into `(covered, total)`, with `covered` capped at `total`.
fn parse_condition_coverage(value: &str) -> Option<(u64, u64)> {
    let caps = BRANCH_RE.captures(value)?;
    let covered: u64 = caps[1].parse().ok()?;
    let total: u64 = caps[2].parse().ok()?;
    Some((covered.min(total), total))
}

/// Extract attributes from an XML element into a HashMap.
fn attr_map(e: &BytesStart) -> HashMap<String, String> {
    e.attributes()
        .filter_map(|a| {
            let attr = a.ok()?;
            let key = str::from_utf8(attr.key.local_name().into_inner())
                .ok()?
                .to_string();
            let value = attr.unescape_value().ok()?.to_string();
            Some((key, value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cobertura() {
        let input = include_bytes!("../../tests/fixtures/sample_cobertura.xml");
        let files = parse(input).unwrap();

        assert_eq!(files.len(), 2);

        // Lines 5 and 6 appear under both <method> and <class>.
        let main = &files[0];
        assert_eq!(main.filename, "src/main.py");
        assert_eq!(main.total_lines, 8);
        assert_eq!(main.covered_lines, 6);
        assert_eq!(main.total_branches, 2);
        assert_eq!(main.covered_branches, 1);

        let util = &files[1];
        assert_eq!(util.filename, "src/util.py");
        assert_eq!(util.total_lines, 2);
        assert_eq!(util.covered_lines, 1);
        assert_eq!(util.total_branches, 0);
    }

    #[test]
    fn test_classes_sharing_filename_are_summed() {
        let input = include_bytes!("../../tests/fixtures/cobertura_nested_classes.xml");
        let files = parse(input).unwrap();

        assert_eq!(files.len(), 2);
        let widget = &files[0];
        assert_eq!(widget.filename, "com/example/Widget.java");
        assert_eq!(widget.total_lines, 5);
        assert_eq!(widget.covered_lines, 3);
        assert_eq!(widget.total_branches, 6);
        assert_eq!(widget.covered_branches, 3);
    }

    #[test]
    fn test_bad_attributes_degrade_to_zero() {
        let input = include_bytes!("../../tests/fixtures/cobertura_nested_classes.xml");
        let files = parse(input).unwrap();

        let gadget = &files[1];
        assert_eq!(gadget.filename, "com/example/Gadget.java");
        assert_eq!(gadget.total_lines, 3);
        assert_eq!(gadget.covered_lines, 0);
        assert_eq!(gadget.total_branches, 0);
        assert_eq!(gadget.covered_branches, 0);
    }

    #[test]
    fn test_header_rates_are_ignored() {
        let input = include_bytes!("../../tests/fixtures/cobertura_nested_classes.xml");
        let report = CoberturaParser.parse(input).unwrap();
        assert_eq!(report.source(), Format::Cobertura);
        assert_eq!(report.overall_pct(), 37.5);
    }

    #[test]
    fn test_file_dialect_and_self_closing_class() {
        let input = br#"<coverage>
            <file filename="a.go"><line number="1" hits="2"/><line number="2" hits="0"/></file>
            <class filename="b.go"/>
        </coverage>"#;
        let files = parse(input).unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].filename, "a.go");
        assert_eq!(files[0].total_lines, 2);
        assert_eq!(files[0].covered_lines, 1);
        assert_eq!(files[1].filename, "b.go");
        assert_eq!(files[1].total_lines, 0);
    }

    #[test]
    fn test_empty_coverage_document() {
        let files = parse(b"<?xml version=\"1.0\"?><coverage line-rate=\"1\"></coverage>").unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn test_mismatched_tags_are_fatal() {
        let err = parse(b"<coverage><packages></classes></coverage>").unwrap_err();
        assert!(matches!(err, CovtrendError::Xml { .. }));
        assert!(err.to_string().contains("Cobertura"));
    }

    #[test]
    fn test_truncated_document_is_fatal() {
        let err = parse(b"<coverage><packages><package name=\"x\">").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Cobertura"), "{msg}");
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let err = parse(b"this is not xml").unwrap_err();
        assert!(err.to_string().contains("<coverage>"));
    }

    #[test]
    fn test_parse_condition_coverage() {
        assert_eq!(parse_condition_coverage("50% (1/2)"), Some((1, 2)));
        assert_eq!(parse_condition_coverage("100% (4/4) [0,1]"), Some((4, 4)));
        assert_eq!(parse_condition_coverage("9/4 (9/4)"), Some((4, 4)));
        assert_eq!(parse_condition_coverage("50%"), None);
    }

    #[test]
    fn test_huge_condition_coverage_saturates() {
        let input = br#"<?xml version="1.0"?>
<coverage>
  <packages><package><classes>
    <class name="a" filename="a.py">
      <lines>
        <line number="1" hits="1" branch="true" condition-coverage="100% (18446744073709551615/18446744073709551615)"/>
        <line number="2" hits="1" branch="true" condition-coverage="100% (1/1)"/>
      </lines>
    </class>
    <class name="b" filename="a.py">
      <lines>
        <line number="3" hits="0" branch="true" condition-coverage="100% (18446744073709551615/18446744073709551615)"/>
      </lines>
    </class>
  </classes></package></packages>
</coverage>"#;
        let files = parse(input).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].total_lines, 3);
        assert_eq!(files[0].total_branches, u64::MAX);
        assert_eq!(files[0].covered_branches, u64::MAX);
    }
}
