use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use tipjar_core::{clamp_confidence, ExtractedRow};

use crate::config::Engine;
use crate::types::{
    AnalyzeResult, Lenient, OcrOutcome, RawTextBlock, ServicePayload, Table, TableCell,
};

// ── Compiled regex cache ─────────────────────────────────────────────────────

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

re!(re_name_hours, r"([A-Za-z][\w\s\-']*?)\s+(\d+(?:[.,]\d+)?)");
re!(re_number, r"\d+(?:[.,]\d+)?");
re!(re_footer, r"(?i)total\s+tippable\s+hours");

const NAME_HEADERS: &[&str] = &["partner name", "name"];
const HOURS_HEADERS: &[&str] = &["total tippable hours", "tippable hours", "hours"];

/// Confidence given to lines synthesized from a document's plain text.
pub const CONTENT_LINE_CONFIDENCE: f64 = 0.5;

// ── Strategies ────────────────────────────────────────────────────────────────

/// Rows recovered by one strategy plus the number of candidates it discarded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParseOutcome {
    pub rows: Vec<ExtractedRow>,
    pub dropped: usize,
}

impl ParseOutcome {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A way of turning engine output into rows.
#[derive(Debug, Clone, Copy)]
pub enum Strategy<'a> {
    /// One structured table from the cloud engine.
    Table(&'a Table),
    /// `<name> <hours>` lines.
    FreeText(&'a [RawTextBlock]),
}

impl Strategy<'_> {
    pub fn extract(&self) -> ParseOutcome {
        match self {
            Strategy::Table(table) => parse_table(table),
            Strategy::FreeText(blocks) => parse_text_blocks(blocks),
        }
    }
}

/// Run strategies in order; the first one that yields rows wins.
/// When none does, the last strategy's outcome is returned for its drop count.
pub fn extract_first(strategies: &[Strategy<'_>]) -> ParseOutcome {
    let mut last = ParseOutcome::default();
    for strategy in strategies {
        let outcome = strategy.extract();
        if !outcome.is_empty() {
            return outcome;
        }
        last = outcome;
    }
    last
}

// ── Free text ─────────────────────────────────────────────────────────────────

/// Split a single `"<name> <hours>"` line. Decimal commas are accepted.
pub fn parse_text_line(text: &str) -> Option<(String, f64)> {
    let caps = re_name_hours().captures(text)?;
    let name = caps.get(1)?.as_str().trim();
    let hours = parse_decimal(caps.get(2)?.as_str())?;
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), hours))
}

pub fn parse_text_blocks(blocks: &[RawTextBlock]) -> ParseOutcome {
    let mut outcome = ParseOutcome::default();
    for block in blocks {
        match parse_text_line(&block.text) {
            Some((name, hours)) => outcome.rows.push(ExtractedRow::new(name, hours, block.confidence)),
            None => outcome.dropped += 1,
        }
    }
    outcome
}

/// Trimmed, non-empty lines of `content` as low-confidence blocks.
pub fn content_blocks(content: &str) -> Vec<RawTextBlock> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|l| RawTextBlock::new(l, CONTENT_LINE_CONFIDENCE))
        .collect()
}

// ── Structured tables ─────────────────────────────────────────────────────────

pub fn parse_table(table: &Table) -> ParseOutcome {
    let cells = &table.cells;
    let header_row = cells
        .iter()
        .filter(|c| c.is_column_header())
        .map(|c| c.row_index)
        .min()
        .or_else(|| cells.iter().map(|c| c.row_index).min());
    let Some(header_row) = header_row else {
        return ParseOutcome::default();
    };

    let mut header: Vec<&TableCell> = cells.iter().filter(|c| c.row_index == header_row).collect();
    header.sort_by_key(|c| c.column_index);

    let Some(name_col) = find_column(&header, NAME_HEADERS, None) else {
        return ParseOutcome::default();
    };
    let Some(hours_col) = find_column(&header, HOURS_HEADERS, Some(name_col)) else {
        return ParseOutcome::default();
    };

    let mut data_rows: BTreeMap<usize, Vec<&TableCell>> = BTreeMap::new();
    for cell in cells.iter().filter(|c| c.row_index > header_row) {
        data_rows.entry(cell.row_index).or_default().push(cell);
    }

    let mut outcome = ParseOutcome::default();
    for row_cells in data_rows.values() {
        match merge_row(row_cells, name_col, hours_col) {
            Some(row) => outcome.rows.push(row),
            None => outcome.dropped += 1,
        }
    }
    outcome
}

/// Column whose header contains one of `candidates`, trying candidates in priority order.
fn find_column(header: &[&TableCell], candidates: &[&str], skip: Option<usize>) -> Option<usize> {
    candidates.iter().find_map(|candidate| {
        header
            .iter()
            .filter(|c| Some(c.column_index) != skip)
            .find(|c| c.text().to_lowercase().contains(*candidate))
            .map(|c| c.column_index)
    })
}

fn merge_row(cells: &[&TableCell], name_col: usize, hours_col: usize) -> Option<ExtractedRow> {
    if cells.iter().any(|c| re_footer().is_match(c.text())) {
        return None;
    }

    let name_cell = cells.iter().find(|c| c.column_index == name_col)?;
    let hours_cell = cells.iter().find(|c| c.column_index == hours_col)?;

    let name = name_cell.text();
    if name.is_empty() {
        return None;
    }
    let hours = parse_decimal(re_number().find(hours_cell.text())?.as_str())?;

    let confidences: Vec<f64> = [name_cell, hours_cell]
        .iter()
        .filter_map(|c| c.confidence)
        .filter(|c| c.is_finite() && *c != 0.0)
        .collect();
    let confidence = if confidences.is_empty() {
        0.0
    } else {
        confidences.iter().sum::<f64>() / confidences.len() as f64
    };

    Some(ExtractedRow::new(name, hours, confidence))
}

fn parse_decimal(raw: &str) -> Option<f64> {
    let value: f64 = raw.replace(',', ".").parse().ok()?;
    value.is_finite().then_some(value)
}

// ── Engine payloads ───────────────────────────────────────────────────────────

/// Normalize the self-hosted service's JSON. Rows it already split are trusted
/// after cleanup; otherwise its blocks are parsed here.
pub fn normalize_service_payload(payload: ServicePayload) -> OcrOutcome {
    let mut malformed_blocks = 0;
    let blocks: Vec<RawTextBlock> = payload
        .blocks
        .unwrap_or_default()
        .into_iter()
        .filter_map(|b| match b {
            Lenient::Valid(b) => Some(RawTextBlock::new(b.text, b.confidence)),
            Lenient::Malformed => {
                malformed_blocks += 1;
                None
            }
        })
        .collect();

    let parsed = match payload.rows {
        Some(rows) => {
            let mut outcome = ParseOutcome::default();
            for row in rows {
                let Some(row) = row.into_valid() else {
                    outcome.dropped += 1;
                    continue;
                };
                let name = row.name.trim();
                match row.hours.filter(|h| h.is_finite()) {
                    Some(hours) if !name.is_empty() => {
                        outcome.rows.push(ExtractedRow::new(name, hours, row.confidence))
                    }
                    _ => outcome.dropped += 1,
                }
            }
            outcome
        }
        None => {
            let mut outcome = parse_text_blocks(&blocks);
            outcome.dropped += malformed_blocks;
            outcome
        }
    };

    OcrOutcome {
        engine: Engine::Service,
        rows: parsed.rows,
        blocks,
        average_confidence: clamp_confidence(payload.confidence.map(|c| c.average).unwrap_or(0.0)),
        dropped: parsed.dropped,
    }
}

/// Normalize a finished cloud analysis: tables first, then the plain-text fallback.
pub fn normalize_analyze_result(result: &AnalyzeResult) -> OcrOutcome {
    let blocks = result.content.as_deref().map(content_blocks).unwrap_or_default();

    let mut strategies: Vec<Strategy<'_>> = result.tables.iter().map(Strategy::Table).collect();
    strategies.push(Strategy::FreeText(&blocks));
    let parsed = extract_first(&strategies);

    let average_confidence = if parsed.rows.is_empty() {
        0.0
    } else {
        parsed.rows.iter().map(|r| r.confidence).sum::<f64>() / parsed.rows.len() as f64
    };

    OcrOutcome {
        engine: Engine::Azure,
        rows: parsed.rows,
        blocks,
        average_confidence,
        dropped: parsed.dropped,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ServiceConfidence, ServiceRow};

    fn cell(row: usize, col: usize, content: &str) -> TableCell {
        TableCell {
            row_index: row,
            column_index: col,
            content: Some(content.to_string()),
            confidence: None,
            kind: None,
        }
    }

    fn header(row: usize, col: usize, content: &str) -> TableCell {
        TableCell { kind: Some("columnHeader".into()), ..cell(row, col, content) }
    }

    fn scored(row: usize, col: usize, content: &str, confidence: f64) -> TableCell {
        TableCell { confidence: Some(confidence), ..cell(row, col, content) }
    }

    fn table(cells: Vec<TableCell>) -> Table {
        Table { cells, ..Default::default() }
    }

    // ── Free text ────────────────────────────────────────────────────────────

    #[test]
    fn text_line_splits_name_and_hours() {
        assert_eq!(parse_text_line("Jordan Lee 12.5"), Some(("Jordan Lee".into(), 12.5)));
        assert_eq!(parse_text_line("O'Brien-Smith 7,25"), Some(("O'Brien-Smith".into(), 7.25)));
        assert_eq!(parse_text_line("  Sam   8"), Some(("Sam".into(), 8.0)));
    }

    #[test]
    fn text_line_without_number_is_rejected() {
        assert_eq!(parse_text_line("Jordan Lee"), None);
        assert_eq!(parse_text_line("12 34"), None);
        assert_eq!(parse_text_line(""), None);
    }

    #[test]
    fn text_blocks_count_drops() {
        let blocks = vec![
            RawTextBlock::new("Weekly schedule", 0.99),
            RawTextBlock::new("Jordan Lee 12.5", 0.8),
            RawTextBlock::new("Avery 30", 1.4),
        ];
        let out = parse_text_blocks(&blocks);
        assert_eq!(out.dropped, 1);
        assert_eq!(out.rows.len(), 2);
        assert_eq!(out.rows[0], ExtractedRow::new("Jordan Lee", 12.5, 0.8));
        assert_eq!(out.rows[1].confidence, 1.0);
    }

    #[test]
    fn content_blocks_skip_blank_lines() {
        let blocks = content_blocks("  Sam 8 \n\n   \nAvery 9\n");
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].text, "Sam 8");
        assert_eq!(blocks[1].confidence, CONTENT_LINE_CONFIDENCE);
    }

    // ── Tables ───────────────────────────────────────────────────────────────

    #[test]
    fn table_with_marked_header() {
        let t = table(vec![
            header(0, 0, "Partner Name"),
            header(0, 1, "Total Tippable Hours"),
            cell(1, 0, "Sam"),
            cell(1, 1, "8,5"),
        ]);
        let out = parse_table(&t);
        assert_eq!(out.rows, vec![ExtractedRow::new("Sam", 8.5, 0.0)]);
        assert_eq!(out.dropped, 0);
    }

    #[test]
    fn table_footer_row_is_excluded() {
        let t = table(vec![
            header(0, 0, "Partner Name"),
            header(0, 1, "Total Tippable Hours"),
            cell(1, 0, "Sam"),
            cell(1, 1, "8"),
            cell(2, 0, "Total Tippable Hours"),
            cell(2, 1, "8"),
        ]);
        let out = parse_table(&t);
        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.rows[0].name, "Sam");
        assert_eq!(out.dropped, 1);
    }

    #[test]
    fn table_footer_detected_in_any_cell() {
        let t = table(vec![
            header(0, 0, "Name"),
            header(0, 1, "Hours"),
            header(0, 2, "Store"),
            cell(1, 0, ""),
            cell(1, 1, "41"),
            cell(1, 2, "Total  tippable\nhours"),
        ]);
        assert!(parse_table(&t).is_empty());
    }

    #[test]
    fn header_row_defaults_to_first_row_when_unmarked() {
        let t = table(vec![
            cell(3, 0, "Name"),
            cell(3, 1, "Hours"),
            cell(4, 0, "Avery"),
            cell(4, 1, "12 hrs"),
        ]);
        let out = parse_table(&t);
        assert_eq!(out.rows, vec![ExtractedRow::new("Avery", 12.0, 0.0)]);
    }

    #[test]
    fn marked_header_beats_earlier_rows() {
        let t = table(vec![
            cell(0, 0, "Store #1234"),
            header(1, 0, "Partner Name"),
            header(1, 1, "Tippable Hours"),
            cell(2, 0, "Kai"),
            cell(2, 1, "20"),
        ]);
        let out = parse_table(&t);
        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.rows[0].name, "Kai");
    }

    #[test]
    fn column_candidates_follow_priority() {
        let t = table(vec![
            header(0, 0, "Name"),
            header(0, 1, "Partner Name"),
            header(0, 2, "Hours"),
            header(0, 3, "Total Tippable Hours"),
            cell(1, 0, "store"),
            cell(1, 1, "Riley"),
            cell(1, 2, "99"),
            cell(1, 3, "10.5"),
        ]);
        let out = parse_table(&t);
        assert_eq!(out.rows, vec![ExtractedRow::new("Riley", 10.5, 0.0)]);
    }

    #[test]
    fn missing_column_yields_nothing() {
        let t = table(vec![header(0, 0, "Partner Name"), cell(1, 0, "Sam")]);
        assert_eq!(parse_table(&t), ParseOutcome::default());
        assert_eq!(parse_table(&table(vec![])), ParseOutcome::default());
    }

    #[test]
    fn rows_missing_name_or_hours_are_dropped() {
        let t = table(vec![
            header(0, 0, "Name"),
            header(0, 1, "Hours"),
            cell(1, 0, "   "),
            cell(1, 1, "5"),
            cell(2, 0, "Quinn"),
            cell(2, 1, "n/a"),
            cell(3, 0, "Rowan"),
            cell(4, 0, "Dana"),
            cell(4, 1, "6"),
        ]);
        let out = parse_table(&t);
        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.rows[0].name, "Dana");
        assert_eq!(out.dropped, 3);
    }

    #[test]
    fn row_confidence_averages_non_zero_cells() {
        let t = table(vec![
            header(0, 0, "Name"),
            header(0, 1, "Hours"),
            scored(1, 0, "Ash", 0.9),
            scored(1, 1, "4", 0.7),
            scored(2, 0, "Blake", 0.6),
            scored(2, 1, "5", 0.0),
        ]);
        let out = parse_table(&t);
        assert!((out.rows[0].confidence - 0.8).abs() < 1e-9);
        assert!((out.rows[1].confidence - 0.6).abs() < 1e-9);
    }

    #[test]
    fn data_rows_come_out_in_row_order() {
        let t = table(vec![
            cell(2, 1, "3"),
            cell(2, 0, "Second"),
            header(0, 0, "Name"),
            header(0, 1, "Hours"),
            cell(1, 1, "2"),
            cell(1, 0, "First"),
        ]);
        let names: Vec<String> = parse_table(&t).rows.into_iter().map(|r| r.name).collect();
        assert_eq!(names, ["First", "Second"]);
    }

    // ── Strategy composition ─────────────────────────────────────────────────

    #[test]
    fn first_non_empty_table_wins() {
        let empty = table(vec![header(0, 0, "Date"), cell(1, 0, "Mon")]);
        let good = table(vec![header(0, 0, "Name"), header(0, 1, "Hours"), cell(1, 0, "Sam"), cell(1, 1, "8")]);
        let result = AnalyzeResult {
            tables: vec![empty, good],
            content: Some("Lee 99".into()),
            errors: vec![],
        };
        let out = normalize_analyze_result(&result);
        assert_eq!(out.engine, Engine::Azure);
        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.rows[0].name, "Sam");
        assert_eq!(out.blocks.len(), 1);
    }

    #[test]
    fn falls_back_to_content_lines() {
        let result = AnalyzeResult {
            tables: vec![table(vec![header(0, 0, "Date")])],
            content: Some("Schedule\nJordan Lee 12.5\nSam 8,5\n".into()),
            errors: vec![],
        };
        let out = normalize_analyze_result(&result);
        assert_eq!(out.rows.len(), 2);
        assert_eq!(out.rows[0], ExtractedRow::new("Jordan Lee", 12.5, 0.5));
        assert_eq!(out.rows[1].hours, 8.5);
        assert_eq!(out.dropped, 1);
        assert_eq!(out.average_confidence, 0.5);
    }

    #[test]
    fn nothing_usable_is_empty() {
        let out = normalize_analyze_result(&AnalyzeResult::default());
        assert!(out.rows.is_empty());
        assert_eq!(out.average_confidence, 0.0);
    }

    // ── Service payloads ─────────────────────────────────────────────────────

    #[test]
    fn service_rows_are_cleaned() {
        let payload = ServicePayload {
            blocks: Some(vec![Lenient::Valid(RawTextBlock { text: "Sam 8".into(), confidence: 3.0 })]),
            rows: Some(vec![
                Lenient::Valid(ServiceRow { name: " Sam ".into(), hours: Some(8.0), confidence: 0.9 }),
                Lenient::Valid(ServiceRow { name: "".into(), hours: Some(3.0), confidence: 0.9 }),
                Lenient::Valid(ServiceRow { name: "Lee".into(), hours: None, confidence: 0.9 }),
            ]),
            confidence: Some(ServiceConfidence { average: 0.93 }),
        };
        let out = normalize_service_payload(payload);
        assert_eq!(out.engine, Engine::Service);
        assert_eq!(out.rows, vec![ExtractedRow::new("Sam", 8.0, 0.9)]);
        assert_eq!(out.dropped, 2);
        assert_eq!(out.blocks[0].confidence, 1.0);
        assert_eq!(out.average_confidence, 0.93);
    }

    #[test]
    fn service_without_rows_parses_blocks() {
        let payload = ServicePayload {
            blocks: Some(vec![
                Lenient::Valid(RawTextBlock { text: "Jordan Lee 12.5".into(), confidence: 0.7 }),
                Lenient::Valid(RawTextBlock { text: "Hours".into(), confidence: 0.9 }),
            ]),
            rows: None,
            confidence: None,
        };
        let out = normalize_service_payload(payload);
        assert_eq!(out.rows, vec![ExtractedRow::new("Jordan Lee", 12.5, 0.7)]);
        assert_eq!(out.dropped, 1);
        assert_eq!(out.average_confidence, 0.0);
    }

    #[test]
    fn malformed_service_rows_are_dropped() {
        let payload: ServicePayload = serde_json::from_value(serde_json::json!({
            "rows": [
                {"name": "Sam", "hours": 8, "confidence": 0.9},
                {"name": null, "hours": 5, "confidence": 0.9}
            ]
        }))
        .unwrap();
        let out = normalize_service_payload(payload);
        assert_eq!(out.rows, vec![ExtractedRow::new("Sam", 8.0, 0.9)]);
        assert_eq!(out.dropped, 1);
    }

    #[test]
    fn malformed_service_blocks_are_dropped() {
        let payload: ServicePayload = serde_json::from_value(serde_json::json!({
            "blocks": [
                {"text": "Sam 8", "confidence": null},
                {"text": "Lee 4", "confidence": 0.8}
            ]
        }))
        .unwrap();
        let out = normalize_service_payload(payload);
        assert_eq!(out.rows, vec![ExtractedRow::new("Lee", 4.0, 0.8)]);
        assert_eq!(out.blocks.len(), 1);
        assert_eq!(out.dropped, 1);
    }
}
