//! Extraction of records from stored pages
//!
//! Pages are read in ascending coordinate order so headings carry over from
//! one page to the next. Records that share an id and title are merged, which
//! stitches together records split across a page break.

mod parser;

pub use parser::{parse_paragraph, ExtractRules, ParsedParagraph, RawRecord};

use crate::state::Coordinate;
use crate::storage::{write_atomically, PageStore};
use crate::HarvestError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

/// Title used until the first heading is seen
pub const UNTITLED: &str = "Untitled";

const KEY_SEPARATOR: char = '\u{1f}';

/// One extracted record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub vol: u32,
    pub sec: u32,
    pub page: u32,
    pub id: String,
    pub title: String,
    pub content: String,
}

impl Record {
    /// Identity used for translation reuse and document ids
    ///
    /// The unit separator cannot occur in an attribute id or heading text, so
    /// distinct `(id, title)` pairs never share a key.
    pub fn key(&self) -> String {
        format!("{}{}{}", self.id, KEY_SEPARATOR, self.title)
    }
}

/// Accumulates records across pages
#[derive(Debug)]
pub struct RecordCollector {
    title: String,
    records: Vec<Record>,
    index: HashMap<(String, String), usize>,
}

impl Default for RecordCollector {
    fn default() -> Self {
        Self {
            title: UNTITLED.to_string(),
            records: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl RecordCollector {
    /// Feeds one stored page; pages must arrive in ascending order
    pub fn add_page(&mut self, coordinate: Coordinate, payload: &Value, rules: &ExtractRules) {
        let Some(paragraphs) = paragraphs(payload) else {
            tracing::debug!("{} has no paragraph list", coordinate);
            return;
        };

        for (index, paragraph) in paragraphs.iter().enumerate() {
            let Some(html) = paragraph.get("text").and_then(Value::as_str) else {
                continue;
            };

            let parsed = parse_paragraph(html, rules);
            if let Some(heading) = parsed.heading {
                self.title = heading;
            }
            if let Some(raw) = parsed.record {
                self.push(coordinate, index, raw);
            }
        }
    }

    fn push(&mut self, coordinate: Coordinate, index: usize, raw: RawRecord) {
        let id = raw.id.unwrap_or_else(|| {
            let paragraph = raw.paragraph_id.unwrap_or_else(|| index.to_string());
            format!(
                "gen_{}_{}_{}_{}",
                coordinate.volume, coordinate.section, coordinate.page, paragraph
            )
        });

        let key = (id, self.title.clone());
        if let Some(&existing) = self.index.get(&key) {
            let record = &mut self.records[existing];
            record.content.push('\n');
            record.content.push_str(&raw.content);
            return;
        }

        self.index.insert(key.clone(), self.records.len());
        self.records.push(Record {
            vol: coordinate.volume,
            sec: coordinate.section,
            page: coordinate.page,
            id: key.0,
            title: key.1,
            content: raw.content,
        });
    }

    pub fn finish(self) -> Vec<Record> {
        self.records
    }
}

/// `data[0].paragList`
fn paragraphs(payload: &Value) -> Option<&Vec<Value>> {
    payload.get("data")?.get(0)?.get("paragList")?.as_array()
}

/// Extracts records from every stored page
pub fn extract_records<S>(store: &S, rules: &ExtractRules) -> Result<Vec<Record>, HarvestError>
where
    S: PageStore + ?Sized,
{
    let coordinates = store.list_pages()?;
    tracing::info!("Found {} stored pages to parse", coordinates.len());

    let mut collector = RecordCollector::default();
    for coordinate in coordinates {
        let payload = store
            .load_page(coordinate)?
            .ok_or_else(|| HarvestError::Extract {
                coordinate,
                message: "listed page could not be loaded".to_string(),
            })?;
        collector.add_page(coordinate, &payload, rules);
    }

    Ok(collector.finish())
}

/// Writes records as a pretty JSON array
pub fn write_records(path: &Path, records: &[Record]) -> Result<(), HarvestError> {
    write_atomically(path, &serde_json::to_vec_pretty(records)?)?;
    Ok(())
}

/// Reads a JSON array of records
pub fn read_records(path: &Path) -> Result<Vec<Record>, HarvestError> {
    let bytes = std::fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStorage;
    use serde_json::json;
    use tempfile::TempDir;

    fn c(v: u32, s: u32, p: u32) -> Coordinate {
        Coordinate::new(v, s, p).unwrap()
    }

    fn rules() -> ExtractRules {
        ExtractRules::new("format.hadith", "heading", "revayatindex").unwrap()
    }

    fn page(paragraphs: &[&str]) -> Value {
        let list: Vec<Value> = paragraphs.iter().map(|t| json!({ "text": t })).collect();
        json!({ "data": [{ "paragList": list }] })
    }

    fn hadith(id: &str, text: &str) -> String {
        format!(r#"<p><format class="hadith" revayatindex="{}">{}</format></p>"#, id, text)
    }

    #[test]
    fn test_title_defaults_to_untitled() {
        let mut collector = RecordCollector::default();
        collector.add_page(c(1, 1, 1), &page(&[&hadith("1", "a")]), &rules());

        let records = collector.finish();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, UNTITLED);
    }

    #[test]
    fn test_heading_carries_across_pages() {
        let mut collector = RecordCollector::default();
        collector.add_page(
            c(1, 1, 1),
            &page(&["<p><heading>Chapter</heading></p>", &hadith("1", "a")]),
            &rules(),
        );
        collector.add_page(c(1, 1, 2), &page(&[&hadith("2", "b")]), &rules());

        let records = collector.finish();
        assert_eq!(records[1].title, "Chapter");
        assert_eq!(records[1].page, 2);
    }

    #[test]
    fn test_split_record_is_merged() {
        let mut collector = RecordCollector::default();
        collector.add_page(c(1, 1, 1), &page(&[&hadith("7", "first half")]), &rules());
        collector.add_page(c(1, 1, 2), &page(&[&hadith("7", "second half")]), &rules());

        let records = collector.finish();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].content, "first half\nsecond half");
        assert_eq!((records[0].vol, records[0].sec, records[0].page), (1, 1, 1));
    }

    #[test]
    fn test_same_id_under_new_title_is_a_new_record() {
        let mut collector = RecordCollector::default();
        collector.add_page(
            c(1, 1, 1),
            &page(&[
                &hadith("1", "a"),
                "<p><heading>Next</heading></p>",
                &hadith("1", "b"),
            ]),
            &rules(),
        );

        assert_eq!(collector.finish().len(), 2);
    }

    #[test]
    fn test_generated_ids() {
        let mut collector = RecordCollector::default();
        collector.add_page(
            c(2, 3, 4),
            &page(&[
                r#"<p id="x9"><format class="hadith">a</format></p>"#,
                r#"<span><format class="hadith">b</format></span>"#,
            ]),
            &rules(),
        );

        let records = collector.finish();
        assert_eq!(records[0].id, "gen_2_3_4_x9");
        assert_eq!(records[1].id, "gen_2_3_4_1");
    }

    #[test]
    fn test_page_without_paragraphs_is_skipped() {
        let mut collector = RecordCollector::default();
        collector.add_page(c(1, 1, 1), &json!({"data": [{}]}), &rules());
        assert!(collector.finish().is_empty());
    }

    #[test]
    fn test_extract_from_store_in_order() {
        let mut store = SqliteStorage::new_in_memory().unwrap();
        store
            .store_page(c(1, 2, 1), &page(&[&hadith("2", "later")]))
            .unwrap();
        store
            .store_page(
                c(1, 1, 1),
                &page(&["<p><heading>T</heading></p>", &hadith("1", "earlier")]),
            )
            .unwrap();

        let records = extract_records(&store, &rules()).unwrap();
        assert_eq!(records[0].content, "earlier");
        assert_eq!(records[1].content, "later");
        assert_eq!(records[1].title, "T");
    }

    #[test]
    fn test_key_keeps_id_and_title_apart() {
        let record = |id: &str, title: &str| Record {
            vol: 1,
            sec: 1,
            page: 1,
            id: id.to_string(),
            title: title.to_string(),
            content: String::new(),
        };

        assert_ne!(record("1", "2 باب").key(), record("12", " باب").key());
        assert_eq!(record("12", " باب").key(), record("12", " باب").key());
    }

    #[test]
    fn test_write_and_read_records() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out/records.json");
        let records = vec![Record {
            vol: 1,
            sec: 1,
            page: 1,
            id: "1".to_string(),
            title: "t".to_string(),
            content: "c".to_string(),
        }];

        write_records(&path, &records).unwrap();
        assert_eq!(read_records(&path).unwrap(), records);
    }
}
