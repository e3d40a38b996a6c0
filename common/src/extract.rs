use std::{
    fs::read_to_string,
    path::{Path, PathBuf},
};

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::record::BenchmarkRecord;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Could not read benchmark results {path:?}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid thread pattern {pattern:?}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("Thread pattern {0:?} has no capture group")]
    MissingCapture(String),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Delimiter {
    #[default]
    Comma,
    /// Raw `go test -bench` output, columns separated by runs of whitespace
    Whitespace,
}

/// How the fields of a result line are recovered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ExtractionRule {
    DelimitedRecord(DelimitedRecord),
    PatternCapture(PatternCapture),
}

impl Default for ExtractionRule {
    fn default() -> Self {
        Self::DelimitedRecord(DelimitedRecord::default())
    }
}

/// `name,runs,time_ns` rows where the thread count is a fixed segment of `name`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DelimitedRecord {
    pub marker: String,
    pub delimiter: Delimiter,
    /// Expected number of fields
    pub fields: usize,
    /// Accept rows with more than `fields` columns
    pub allow_extra_fields: bool,
    pub name_separator: char,
    pub thread_segment: usize,
    pub time_column: usize,
}

impl Default for DelimitedRecord {
    fn default() -> Self {
        Self {
            marker: "BenchmarkGol".to_owned(),
            delimiter: Delimiter::Comma,
            fields: 3,
            allow_extra_fields: false,
            name_separator: '-',
            thread_segment: 1,
            time_column: 2,
        }
    }
}

/// Thread count captured from the benchmark name by a regex, ie. `Gol/512x512x1000-4-16`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternCapture {
    pub marker: String,
    pub delimiter: Delimiter,
    /// Regex whose first capture group is the thread count
    pub pattern: String,
    pub name_column: usize,
    pub time_column: usize,
}

impl Default for PatternCapture {
    fn default() -> Self {
        Self {
            marker: "Gol".to_owned(),
            delimiter: Delimiter::Comma,
            pattern: r"Gol/\w+-(\d+)".to_owned(),
            name_column: 0,
            time_column: 1,
        }
    }
}

#[derive(Debug, Clone)]
enum CompiledRule {
    Delimited(DelimitedRecord),
    Pattern { rule: PatternCapture, regex: Regex },
}

/// An [`ExtractionRule`] ready to be applied to result text
#[derive(Debug, Clone)]
pub struct Extractor {
    rule: CompiledRule,
}

impl Extractor {
    pub fn new(rule: &ExtractionRule) -> Result<Self, ExtractError> {
        let rule = match rule {
            ExtractionRule::DelimitedRecord(rule) => CompiledRule::Delimited(rule.clone()),
            ExtractionRule::PatternCapture(rule) => {
                let regex = Regex::new(&rule.pattern).map_err(|source| ExtractError::Pattern {
                    pattern: rule.pattern.clone(),
                    source,
                })?;
                if regex.captures_len() < 2 {
                    return Err(ExtractError::MissingCapture(rule.pattern.clone()));
                }
                CompiledRule::Pattern {
                    rule: rule.clone(),
                    regex,
                }
            }
        };
        Ok(Self { rule })
    }

    fn marker(&self) -> &str {
        match &self.rule {
            CompiledRule::Delimited(rule) => &rule.marker,
            CompiledRule::Pattern { rule, .. } => &rule.marker,
        }
    }

    fn delimiter(&self) -> Delimiter {
        match &self.rule {
            CompiledRule::Delimited(rule) => rule.delimiter,
            CompiledRule::Pattern { rule, .. } => rule.delimiter,
        }
    }

    /// Parses a single line, `None` if it is not a well formed record of the benchmark family
    pub fn extract_line(&self, line: &str, category: &str) -> Option<BenchmarkRecord> {
        let line = line.trim();
        if line.is_empty() || !line.contains(self.marker()) {
            return None;
        }
        let fields = split_fields(line, self.delimiter())?;

        let (name, threads, time_ns) = match &self.rule {
            CompiledRule::Delimited(rule) => {
                let count_ok = if rule.allow_extra_fields {
                    fields.len() >= rule.fields
                } else {
                    fields.len() == rule.fields
                };
                if !count_ok {
                    return None;
                }
                let name = fields.first()?;
                let threads = name
                    .split(rule.name_separator)
                    .nth(rule.thread_segment)?
                    .trim()
                    .parse::<u32>()
                    .ok()?;
                (name, threads, parse_time(fields.get(rule.time_column)?)?)
            }
            CompiledRule::Pattern { rule, regex } => {
                let name = fields.get(rule.name_column)?;
                let threads = regex
                    .captures(name)?
                    .get(1)?
                    .as_str()
                    .parse::<u32>()
                    .ok()?;
                (name, threads, parse_time(fields.get(rule.time_column)?)?)
            }
        };

        if threads == 0 {
            return None;
        }
        Some(BenchmarkRecord::new(name.as_str(), threads, time_ns, category))
    }

    /// Every record in `text`, in line order. Lines that do not parse are skipped
    pub fn extract_text(&self, text: &str, category: &str) -> Vec<BenchmarkRecord> {
        text.lines()
            .enumerate()
            .filter(|(_, line)| line.contains(self.marker()))
            .filter_map(|(idx, line)| {
                let record = self.extract_line(line, category);
                if record.is_none() && !line.trim().is_empty() {
                    debug!("Skipping malformed line {} for {category}: {line:?}", idx + 1);
                }
                record
            })
            .collect()
    }
}

/// Reads `path` fully and extracts its records, tagging each one with `category`
pub fn extract_file(
    path: &Path,
    category: &str,
    extractor: &Extractor,
) -> Result<Vec<BenchmarkRecord>, ExtractError> {
    let text = read_to_string(path).map_err(|source| ExtractError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let records = extractor.extract_text(&text, category);
    debug!("Extracted {} {category} records from {path:?}", records.len());
    Ok(records)
}

fn split_fields(line: &str, delimiter: Delimiter) -> Option<Vec<String>> {
    match delimiter {
        Delimiter::Comma => {
            let mut reader = csv::ReaderBuilder::new()
                .has_headers(false)
                .flexible(true)
                .trim(csv::Trim::All)
                .from_reader(line.as_bytes());
            let record = reader.records().next()?.ok()?;
            Some(record.iter().map(|x| x.to_owned()).collect())
        }
        Delimiter::Whitespace => Some(line.split_whitespace().map(|x| x.to_owned()).collect()),
    }
}

fn parse_time(field: &str) -> Option<f64> {
    let time_ns = field.trim().parse::<f64>().ok()?;
    if time_ns.is_finite() && time_ns >= 0.0 {
        Some(time_ns)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;

    use super::*;

    fn delimited() -> Extractor {
        Extractor::new(&ExtractionRule::default()).unwrap()
    }

    fn pattern(delimiter: Delimiter) -> Extractor {
        Extractor::new(&ExtractionRule::PatternCapture(PatternCapture {
            delimiter,
            time_column: if delimiter == Delimiter::Whitespace { 2 } else { 1 },
            ..Default::default()
        }))
        .unwrap()
    }

    #[test]
    fn parses_delimited_record() {
        let record = delimited()
            .extract_line("BenchmarkGolDirect-4-16,10,2500000000", "Direct")
            .unwrap();
        assert_eq!(
            record,
            BenchmarkRecord {
                label: "BenchmarkGolDirect-4-16".to_owned(),
                threads: 4,
                time_seconds: 2.5,
                category: "Direct".to_owned(),
            }
        );
    }

    #[test]
    fn delimited_threads_and_time_follow_the_line() {
        let extractor = delimited();
        for (threads, ns) in [(1u32, 1.0), (3, 123_456_789.0), (16, 98_765_432_101.0)] {
            let line = format!("BenchmarkGolBroker-{threads}-16,1,{ns}");
            let record = extractor.extract_line(&line, "Broker").unwrap();
            assert_eq!(record.threads, threads);
            assert_eq!(record.time_seconds, ns / 1e9);
            assert_relative_eq!(record.time_seconds * 1e9, ns);
        }
    }

    #[test]
    fn skips_lines_without_marker() {
        let extractor = delimited();
        assert_eq!(extractor.extract_line("goos: linux", "Direct"), None);
        assert_eq!(extractor.extract_line("PASS,1,2", "Direct"), None);
        assert_eq!(extractor.extract_line("", "Direct"), None);
    }

    #[test]
    fn skips_wrong_field_count() {
        let extractor = delimited();
        assert_eq!(extractor.extract_line("BenchmarkGolDirect-4-16,10", "Direct"), None);
        assert_eq!(extractor.extract_line("BenchmarkGolDirect-4-16", "Direct"), None);
        assert_eq!(
            extractor.extract_line("BenchmarkGolDirect-4-16,10,25,ns/op", "Direct"),
            None
        );
    }

    #[test]
    fn extra_fields_when_allowed() {
        let extractor = Extractor::new(&ExtractionRule::DelimitedRecord(DelimitedRecord {
            allow_extra_fields: true,
            ..Default::default()
        }))
        .unwrap();
        let record = extractor
            .extract_line("BenchmarkGol-8-16,1,4000000000,ns/op", "Parallel")
            .unwrap();
        assert_eq!(record.threads, 8);
        assert_eq!(record.time_seconds, 4.0);
        assert_eq!(extractor.extract_line("BenchmarkGol-8-16,1", "Parallel"), None);
    }

    #[test]
    fn skips_non_numeric_values() {
        let extractor = delimited();
        assert_eq!(extractor.extract_line("BenchmarkGolDirect-x-16,1,100", "Direct"), None);
        assert_eq!(extractor.extract_line("BenchmarkGolDirect-4-16,1,fast", "Direct"), None);
        assert_eq!(extractor.extract_line("BenchmarkGolDirect,1,100", "Direct"), None);
    }

    #[test]
    fn drops_zero_threads_and_negative_time() {
        let extractor = delimited();
        assert_eq!(extractor.extract_line("BenchmarkGolDirect-0-16,1,100", "Direct"), None);
        assert_eq!(extractor.extract_line("BenchmarkGolDirect-2-16,1,-100", "Direct"), None);
        assert_eq!(extractor.extract_line("BenchmarkGolDirect-2-16,1,NaN", "Direct"), None);
    }

    #[test]
    fn extract_text_keeps_order_and_tags_category() {
        let text = "goos: linux\n\
                    BenchmarkGolDirect-1-16,10,8000000000\n\
                    BenchmarkGolDirect-2-16,10\n\
                    \n\
                    BenchmarkGolDirect-2-16,10,5000000000\n\
                    PASS\n";
        let records = delimited().extract_text(text, "Direct");
        assert_eq!(
            records
                .iter()
                .map(|r| (r.threads, r.time_seconds, r.category.as_str()))
                .collect::<Vec<_>>(),
            vec![(1, 8.0, "Direct"), (2, 5.0, "Direct")]
        );
    }

    #[test]
    fn pattern_capture_csv() {
        let text = "name,time,range\n\
                    BenchmarkGol/512x512x1000-1-16,9000000000,12\n\
                    BenchmarkGol/512x512x1000-4-16,3000000000,12\n";
        let records = pattern(Delimiter::Comma).extract_text(text, "Parallel");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].label, "BenchmarkGol/512x512x1000-1-16");
        assert_eq!(records[0].threads, 1);
        assert_eq!(records[0].time_seconds, 9.0);
        assert_eq!(records[1].threads, 4);
        assert_eq!(records[1].time_seconds, 3.0);
    }

    #[test]
    fn pattern_capture_go_bench_output() {
        let text = "goos: linux\n\
                    goarch: amd64\n\
                    BenchmarkGol/512x512x1000-8-16         \t       1\t2500000000 ns/op\n\
                    PASS\n\
                    ok  \tuk.ac.bris.cs/gameoflife\t3.1s\n";
        let records = pattern(Delimiter::Whitespace).extract_text(text, "Serial");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].threads, 8);
        assert_eq!(records[0].time_seconds, 2.5);
        assert_eq!(records[0].category, "Serial");
    }

    #[test]
    fn pattern_without_match_is_skipped() {
        let extractor = pattern(Delimiter::Comma);
        assert_eq!(extractor.extract_line("BenchmarkGolLife,100,1", "Serial"), None);
    }

    #[test]
    fn pattern_match_without_time_column_is_skipped() {
        let comma = pattern(Delimiter::Comma);
        assert_eq!(comma.extract_line("BenchmarkGol/512x512x1000-4-16", "Parallel"), None);
        assert_eq!(comma.extract_line("BenchmarkGol/512x512x1000-4-16,", "Parallel"), None);

        let whitespace = pattern(Delimiter::Whitespace);
        assert_eq!(
            whitespace.extract_line("BenchmarkGol/512x512x1000-4-16   1", "Parallel"),
            None
        );

        let text = "BenchmarkGol/512x512x1000-4-16\n\
                    BenchmarkGol/512x512x1000-8-16,2000000000\n";
        let records = comma.extract_text(text, "Parallel");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].threads, 8);
    }

    #[test]
    fn suffix_pattern_on_delimited_rows() {
        let extractor = Extractor::new(&ExtractionRule::PatternCapture(PatternCapture {
            marker: "BenchmarkGol".to_owned(),
            pattern: r"-(\d+)-16".to_owned(),
            time_column: 2,
            ..Default::default()
        }))
        .unwrap();
        let record = extractor
            .extract_line("BenchmarkGolBroker-12-16,3,1500000000", "Broker")
            .unwrap();
        assert_eq!(record.threads, 12);
        assert_eq!(record.time_seconds, 1.5);
    }

    #[test]
    fn rejects_bad_patterns() {
        let bad = ExtractionRule::PatternCapture(PatternCapture {
            pattern: "Gol/(".to_owned(),
            ..Default::default()
        });
        assert!(matches!(Extractor::new(&bad), Err(ExtractError::Pattern { .. })));

        let uncaptured = ExtractionRule::PatternCapture(PatternCapture {
            pattern: r"Gol/\w+-\d+".to_owned(),
            ..Default::default()
        });
        assert!(matches!(
            Extractor::new(&uncaptured),
            Err(ExtractError::MissingCapture(_))
        ));
    }

    #[test]
    fn reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "BenchmarkGolBroker-2-16,1,6000000000").unwrap();
        writeln!(file, "BenchmarkGolBroker-4-16,1,3000000000").unwrap();
        let records = extract_file(file.path(), "Broker", &delimited()).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.category == "Broker"));
    }

    #[test]
    fn missing_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = extract_file(&dir.path().join("Direct.csv"), "Direct", &delimited()).unwrap_err();
        assert!(matches!(err, ExtractError::Read { .. }));
    }
}
