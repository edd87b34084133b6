//! Output module for status reports and index export
//!
//! This module handles:
//! - Printing harvest progress from storage
//! - Building index documents from translated records
//! - Writing bulk index files

mod bulk;
pub mod stats;
mod traits;

pub use bulk::{build_document, document_id, export_documents, strip_diacritics, BulkFileSink};
pub use stats::{load_statistics, print_statistics, HarvestStatistics};
pub use traits::{BookInfo, IndexDocument, IndexSink, OutputError, OutputResult};

use crate::config::Config;
use crate::translate::read_translated;
use crate::HarvestError;

/// Exports the translated records named in the configuration as a bulk file
///
/// # Returns
///
/// * `Ok(usize)` - Number of documents written
/// * `Err(HarvestError)` - Reading records or writing output failed
pub fn export_index(config: &Config) -> Result<usize, HarvestError> {
    let records = read_translated(&config.translate.output_path)?;
    if records.is_empty() {
        tracing::warn!(
            "No translated records found in {}",
            config.translate.output_path.display()
        );
    }

    let index = &config.index;
    let mut sink = BulkFileSink::create(&index.bulk_path, &index.index_name)?;
    let exported = export_documents(
        &records,
        &mut sink,
        &index.id_prefix,
        &index.book_title,
        index.batch_size,
    )?;

    tracing::info!(
        "Exported {} documents for index '{}' to {}",
        exported,
        index.index_name,
        index.bulk_path.display()
    );
    Ok(exported)
}
