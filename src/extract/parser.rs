//! HTML fragment parser for record extraction
//!
//! Every stored page carries a list of paragraphs, each an HTML fragment.
//! A paragraph may hold a heading (which becomes the title of the records
//! that follow it) and/or a record element.

use crate::config::ExtractConfig;
use crate::ConfigError;
use scraper::{ElementRef, Html, Selector};

/// Compiled extraction rules
#[derive(Debug, Clone)]
pub struct ExtractRules {
    record: Selector,
    heading: Selector,
    id_attribute: String,
}

impl ExtractRules {
    pub fn new(record: &str, heading: &str, id_attribute: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            record: compile(record)?,
            heading: compile(heading)?,
            id_attribute: id_attribute.to_string(),
        })
    }

    pub fn from_config(config: &ExtractConfig) -> Result<Self, ConfigError> {
        Self::new(
            &config.record_selector,
            &config.heading_selector,
            &config.id_attribute,
        )
    }
}

fn compile(selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector).map_err(|e| ConfigError::InvalidSelector {
        selector: selector.to_string(),
        message: format!("{:?}", e),
    })
}

/// What one paragraph contributes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedParagraph {
    /// Trimmed heading text, if the paragraph has a non-empty heading
    pub heading: Option<String>,

    pub record: Option<RawRecord>,
}

/// A record element before ids and titles are resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    /// Value of the id attribute, when present and non-empty
    pub id: Option<String>,

    /// `id` of the enclosing `<p>` element, if any
    pub paragraph_id: Option<String>,

    pub content: String,
}

/// Parses one paragraph fragment
pub fn parse_paragraph(html: &str, rules: &ExtractRules) -> ParsedParagraph {
    let fragment = Html::parse_fragment(html);

    let heading = collect_text(fragment.select(&rules.heading));
    let heading = (!heading.is_empty()).then_some(heading);

    let elements: Vec<ElementRef> = fragment.select(&rules.record).collect();
    let record = elements.first().map(|first| RawRecord {
        id: first
            .value()
            .attr(&rules.id_attribute)
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string),
        paragraph_id: enclosing_paragraph_id(*first),
        content: collect_text(elements.iter().copied()),
    });

    ParsedParagraph { heading, record }
}

/// Concatenated, trimmed text of all matched elements
fn collect_text<'a>(elements: impl Iterator<Item = ElementRef<'a>>) -> String {
    elements
        .flat_map(|element| element.text())
        .collect::<String>()
        .trim()
        .to_string()
}

fn enclosing_paragraph_id(element: ElementRef) -> Option<String> {
    std::iter::once(element)
        .chain(element.ancestors().filter_map(ElementRef::wrap))
        .find(|el| el.value().name() == "p")
        .and_then(|p| p.value().id())
        .map(str::to_string)
}
