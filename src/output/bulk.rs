//! Bulk index export
//!
//! Converts translated records into index documents and writes them as
//! Elasticsearch-style bulk NDJSON: one `index` action line followed by the
//! document line.

use crate::output::traits::{BookInfo, IndexDocument, IndexSink, OutputError, OutputResult};
use crate::translate::TranslatedRecord;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Removes Arabic diacritics (harakat, tanwin, shadda, sukun, dagger alif)
pub fn strip_diacritics(text: &str) -> String {
    text.chars()
        .filter(|c| {
            !matches!(
                c,
                '\u{0617}'..='\u{061A}' | '\u{064B}'..='\u{065F}' | '\u{0670}'
            )
        })
        .collect()
}

/// `{prefix}_{first 16 hex chars of sha256(key)}`, with `key` from [`Record::key`]
///
/// [`Record::key`]: crate::extract::Record::key
pub fn document_id(prefix: &str, key: &str) -> String {
    let digest = hex::encode(Sha256::digest(key.as_bytes()));
    format!("{}_{}", prefix, &digest[..16])
}

/// Builds the index document for one translated record
pub fn build_document(record: &TranslatedRecord, id_prefix: &str, book_title: &str) -> IndexDocument {
    let source = &record.record;
    IndexDocument {
        id: document_id(id_prefix, &source.key()),
        book: BookInfo {
            title: book_title.to_string(),
            vol_no: source.vol,
            sec_no: source.sec,
            page_no: source.page,
        },
        title: record.title_translated.clone(),
        topic: source.title.clone(),
        text_original: source.content.clone(),
        text_plain: strip_diacritics(&source.content),
        text_translated: record.content_translated.clone(),
    }
}

/// Writes bulk NDJSON to a file
pub struct BulkFileSink<W: Write> {
    index_name: String,
    writer: W,
    documents_written: u64,
}

impl BulkFileSink<BufWriter<File>> {
    pub fn create(path: &Path, index_name: &str) -> OutputResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file), index_name))
    }
}

impl<W: Write> BulkFileSink<W> {
    pub fn new(writer: W, index_name: &str) -> Self {
        Self {
            index_name: index_name.to_string(),
            writer,
            documents_written: 0,
        }
    }

    pub fn documents_written(&self) -> u64 {
        self.documents_written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> IndexSink for BulkFileSink<W> {
    fn write_batch(&mut self, documents: &[IndexDocument]) -> OutputResult<()> {
        for document in documents {
            let action = json!({ "index": { "_index": self.index_name, "_id": document.id } });
            serde_json::to_writer(&mut self.writer, &action)?;
            self.writer.write_all(b"\n")?;
            serde_json::to_writer(&mut self.writer, document)?;
            self.writer.write_all(b"\n")?;
        }
        self.documents_written += documents.len() as u64;
        tracing::debug!("Wrote batch of {} documents", documents.len());
        Ok(())
    }

    fn finish(&mut self) -> OutputResult<()> {
        self.writer
            .flush()
            .map_err(|e| OutputError::Write(format!("Failed to flush bulk output: {}", e)))
    }
}

/// Sends every record to `sink` in batches of `batch_size`
pub fn export_documents<S>(
    records: &[TranslatedRecord],
    sink: &mut S,
    id_prefix: &str,
    book_title: &str,
    batch_size: usize,
) -> OutputResult<usize>
where
    S: IndexSink + ?Sized,
{
    let documents: Vec<IndexDocument> = records
        .iter()
        .map(|record| build_document(record, id_prefix, book_title))
        .collect();

    for batch in documents.chunks(batch_size.max(1)) {
        sink.write_batch(batch)?;
    }
    sink.finish()?;

    Ok(documents.len())
}
