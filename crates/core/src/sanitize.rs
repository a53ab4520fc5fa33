use std::collections::HashMap;

use crate::row::{ExtractedRow, SanitizedRows};

/// Collapse rows that share a name (ignoring case) into one.
///
/// The row with the highest confidence wins; on a tie the first one seen stays.
/// Output keeps the order in which each name first appeared.
pub fn sanitize_rows<I>(rows: I) -> SanitizedRows
where
    I: IntoIterator<Item = ExtractedRow>,
{
    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut kept: Vec<ExtractedRow> = Vec::new();

    for row in rows {
        let key = row.key();
        match slots.get(&key).copied() {
            Some(idx) => {
                if kept[idx].confidence < row.confidence {
                    kept[idx] = row;
                }
            }
            None => {
                slots.insert(key, kept.len());
                kept.push(row);
            }
        }
    }

    SanitizedRows(kept)
}
