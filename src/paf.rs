//! PAF alignment parsing.
//!
//! Parses the standard 12 PAF columns plus the `AS:i:` alignment-score tag
//! that the selection engine ranks by. Rows without the tag are malformed.

use crate::error::{PurgaError, Result};
use log::warn;
use std::io::BufRead;

/// Fraction of malformed rows above which a parse is aborted.
const MALFORMED_ABORT_PERCENT: f64 = 1.0;

/// One parsed PAF row, still keyed by sequence names.
///
/// The store converts these into compact interned records; this type is the
/// boundary representation of a single alignment.
#[derive(Debug, Clone, PartialEq)]
pub struct PafRecord {
    pub query_name: String,
    pub query_len: u32,
    /// Query start position (0-based)
    pub query_start: u32,
    /// Query end position (0-based, exclusive)
    pub query_end: u32,
    /// Strand ('+' for forward, '-' for reverse)
    pub strand: char,
    pub target_name: String,
    pub target_len: u32,
    pub target_start: u32,
    pub target_end: u32,
    /// Number of matching bases
    pub matches: u32,
    /// Alignment block length
    pub block_len: u32,
    /// Mapping quality (0-255)
    pub mapping_quality: u8,
    /// Alignment score from the `AS:i:` tag
    pub score: i32,
}

impl PafRecord {
    /// Parses a PAF line.
    ///
    /// # Errors
    /// Returns [`PurgaError::InputShape`] when a column is missing or
    /// unparseable, when an interval is empty or inverted, or when the
    /// `AS:i:` tag is absent.
    pub fn from_line(line: &str, line_number: usize) -> Result<Self> {
        let bad = |message: String| PurgaError::InputShape {
            kind: "PAF",
            line: line_number,
            message,
        };

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 12 {
            return Err(bad(format!(
                "line has {} fields, expected at least 12",
                fields.len()
            )));
        }

        fn parse_u32(field: &str, what: &str) -> std::result::Result<u32, String> {
            field.parse().map_err(|_| format!("invalid {what}: {field:?}"))
        }

        let query_len = parse_u32(fields[1], "query length").map_err(&bad)?;
        let query_start = parse_u32(fields[2], "query start").map_err(&bad)?;
        let query_end = parse_u32(fields[3], "query end").map_err(&bad)?;
        let strand = match fields[4] {
            "+" => '+',
            "-" => '-',
            other => return Err(bad(format!("invalid strand: {other:?}"))),
        };
        let target_len = parse_u32(fields[6], "target length").map_err(&bad)?;
        let target_start = parse_u32(fields[7], "target start").map_err(&bad)?;
        let target_end = parse_u32(fields[8], "target end").map_err(&bad)?;
        let matches = parse_u32(fields[9], "match count").map_err(&bad)?;
        let block_len = parse_u32(fields[10], "block length").map_err(&bad)?;
        let mapping_quality: u8 = fields[11]
            .parse()
            .map_err(|_| bad(format!("invalid mapping quality: {:?}", fields[11])))?;

        if query_start >= query_end {
            return Err(bad(format!(
                "empty or inverted query interval [{query_start}, {query_end})"
            )));
        }
        if target_start >= target_end {
            return Err(bad(format!(
                "empty or inverted target interval [{target_start}, {target_end})"
            )));
        }

        let mut score: Option<i32> = None;
        for field in &fields[12..] {
            if let Some(value) = field.strip_prefix("AS:i:") {
                score = Some(
                    value
                        .parse()
                        .map_err(|_| bad(format!("invalid AS:i: value: {value:?}")))?,
                );
                break;
            }
        }
        let score = score.ok_or_else(|| bad("missing AS:i: alignment score tag".to_string()))?;

        Ok(PafRecord {
            query_name: fields[0].to_string(),
            query_len,
            query_start,
            query_end,
            strand,
            target_name: fields[5].to_string(),
            target_len,
            target_start,
            target_end,
            matches,
            block_len,
            mapping_quality,
            score,
        })
    }
}

/// Reads PAF records from a buffered source.
///
/// Blank lines and `#` comments are skipped. Malformed rows are skipped
/// with a warning as long as they stay under 1% of the rows seen; beyond
/// that the parse aborts with [`PurgaError::TooManyMalformedRows`].
pub fn read_paf<R: BufRead>(reader: R) -> Result<Vec<PafRecord>> {
    let mut records = Vec::new();
    let mut total = 0usize;
    let mut malformed = 0usize;

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        total += 1;
        match PafRecord::from_line(&line, idx + 1) {
            Ok(record) => records.push(record),
            Err(err) => {
                malformed += 1;
                warn!("skipping PAF row: {err}");
            }
        }
    }

    if total > 0 && malformed as f64 * 100.0 > total as f64 * MALFORMED_ABORT_PERCENT {
        return Err(PurgaError::TooManyMalformedRows {
            kind: "PAF",
            malformed,
            total,
            limit_percent: MALFORMED_ABORT_PERCENT,
        });
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD: &str = "ctgA\t1000\t0\t900\t+\tchr1\t5000\t100\t1000\t850\t900\t60\tAS:i:800";

    #[test]
    fn parses_full_row() {
        let rec = PafRecord::from_line(GOOD, 1).unwrap();
        assert_eq!(rec.query_name, "ctgA");
        assert_eq!(rec.query_len, 1000);
        assert_eq!(rec.strand, '+');
        assert_eq!(rec.target_name, "chr1");
        assert_eq!(rec.target_start, 100);
        assert_eq!(rec.target_end, 1000);
        assert_eq!(rec.mapping_quality, 60);
        assert_eq!(rec.score, 800);
    }

    #[test]
    fn rejects_missing_score_tag() {
        let line = "ctgA\t1000\t0\t900\t+\tchr1\t5000\t100\t1000\t850\t900\t60";
        let err = PafRecord::from_line(line, 3).unwrap_err();
        assert!(err.to_string().contains("AS:i:"));
    }

    #[test]
    fn rejects_inverted_interval() {
        let line = "ctgA\t1000\t900\t900\t+\tchr1\t5000\t100\t1000\t850\t900\t60\tAS:i:1";
        assert!(PafRecord::from_line(line, 1).is_err());
    }

    #[test]
    fn score_tag_after_other_tags() {
        let line = format!("{GOOD}\tcg:Z:900M");
        let rec = PafRecord::from_line(&line, 1).unwrap();
        assert_eq!(rec.score, 800);
    }

    #[test]
    fn reader_skips_isolated_bad_rows() {
        let mut text = String::new();
        for i in 0..200 {
            text.push_str(&format!(
                "ctg{i}\t1000\t0\t900\t+\tchr1\t5000\t100\t1000\t850\t900\t60\tAS:i:800\n"
            ));
        }
        text.push_str("broken row\n");
        let records = read_paf(text.as_bytes()).unwrap();
        assert_eq!(records.len(), 200);
    }

    #[test]
    fn reader_aborts_on_many_bad_rows() {
        let mut text = String::new();
        for _ in 0..10 {
            text.push_str("broken row\n");
        }
        text.push_str(GOOD);
        text.push('\n');
        assert!(matches!(
            read_paf(text.as_bytes()),
            Err(PurgaError::TooManyMalformedRows { .. })
        ));
    }
}
