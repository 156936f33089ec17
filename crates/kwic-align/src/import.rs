//! XML batch import.
//!
//! Parses a keyword-in-context XML export into an inbound batch and
//! persists it for review. The expected document is a flat list of
//! `<item>` elements:
//!
//! ```xml
//! <item preceding="writen vpon" following="of stone" location="8r" type="seg_item">a table</item>
//! ```
//!
//! The element text is the keyword; `type` maps `rubric_item` and
//! `seg_item` onto the citation kinds. Citations are numbered per
//! location in document order, starting at 1, which is the source
//! order the matcher later relies on.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context as _, Result};
use chrono::Utc;

use kwic_align_core::models::{ContextKind, InboundContext, InboundContextGroup};
use kwic_align_core::store::ContextStore;

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;

/// One `<item>` element, before numbering.
#[derive(Debug, Clone)]
pub struct ParsedItem {
    pub location: String,
    pub preceding: String,
    pub keyword: String,
    pub following: String,
    pub kind: ContextKind,
}

impl Default for ParsedItem {
    fn default() -> Self {
        Self {
            location: String::new(),
            preceding: String::new(),
            keyword: String::new(),
            following: String::new(),
            kind: ContextKind::None,
        }
    }
}

fn kind_from_attr(value: &str) -> ContextKind {
    match value {
        "rubric_item" => ContextKind::Rubric,
        "seg_item" => ContextKind::Segment,
        _ => ContextKind::None,
    }
}

fn item_from_element(e: &quick_xml::events::BytesStart<'_>) -> Result<ParsedItem> {
    let mut item = ParsedItem::default();

    for attribute in e.attributes() {
        let attribute = attribute.context("malformed attribute in <item>")?;
        let value = attribute
            .unescape_value()
            .context("malformed attribute value in <item>")?
            .into_owned();

        match attribute.key.local_name().as_ref() {
            b"location" => item.location = value,
            b"preceding" => item.preceding = value,
            b"following" => item.following = value,
            b"type" => item.kind = kind_from_attr(&value),
            _ => {}
        }
    }

    if item.location.is_empty() {
        bail!("<item> is missing a location attribute");
    }

    Ok(item)
}

/// Parses a context XML document into its items, in document order.
pub fn parse_items(xml: &[u8]) -> Result<Vec<ParsedItem>> {
    let mut items = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"item" {
                    let mut item = item_from_element(&e)?;
                    match reader.read_event_into(&mut buf) {
                        Ok(quick_xml::events::Event::Text(te)) => {
                            item.keyword = te
                                .unescape()
                                .with_context(|| {
                                    format!("malformed keyword text in <item> at {}", item.location)
                                })?
                                .into_owned();
                        }
                        Ok(_) => {}
                        Err(err) => bail!("XML parse error: {}", err),
                    }
                    if item.keyword.is_empty() {
                        bail!("<item> at {} has no keyword text", item.location);
                    }
                    items.push(item);
                }
            }
            Ok(quick_xml::events::Event::Empty(e)) => {
                if e.local_name().as_ref() == b"item" {
                    bail!("<item> without keyword text");
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => bail!("XML parse error: {}", e),
            _ => {}
        }
        buf.clear();
    }

    Ok(items)
}

/// Builds an inbound batch from parsed items, numbering citations per
/// location in document order.
pub fn batch_from_items(user: &str, items: &[ParsedItem]) -> InboundContextGroup {
    let mut batch = InboundContextGroup::new(user, Utc::now());
    let mut counters: HashMap<String, i64> = HashMap::new();

    for item in items {
        let number = counters.entry(item.location.clone()).or_insert(0);
        *number += 1;
        batch.contexts.push(InboundContext::new(
            batch.id.clone(),
            item.location.clone(),
            *number,
            item.preceding.clone(),
            item.keyword.clone(),
            item.following.clone(),
            item.kind,
        ));
    }

    batch
}

/// `kwic import <file>`: parse an XML export and persist it as a new
/// inbound batch.
pub async fn run_import(config: &Config, file: &Path, user: &str) -> Result<()> {
    let xml = std::fs::read(file)
        .with_context(|| format!("Failed to read import file: {}", file.display()))?;

    let items = parse_items(&xml)?;
    if items.is_empty() {
        bail!("no <item> elements found in {}", file.display());
    }

    let batch = batch_from_items(user, &items);

    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool);
    store.insert_batch(&batch).await?;

    let locations: usize = batch
        .contexts
        .iter()
        .map(|c| c.location.as_str())
        .collect::<std::collections::HashSet<_>>()
        .len();
    println!(
        "Imported batch {} ({} contexts across {} locations).",
        batch.id,
        batch.contexts.len(),
        locations
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<contexts>
    <item preceding="writen vpon" following="of stone" location="8r" type="seg_item">a table</item>
    <item preceding="a table" following="and grauen" location="8r" type="seg_item">of stone</item>
    <item preceding="" following="here begynneth" location="9v" type="rubric_item">prologue</item>
</contexts>
"#;

    #[test]
    fn parses_items_with_attributes_and_text() {
        let items = parse_items(SAMPLE.as_bytes()).unwrap();
        assert_eq!(items.len(), 3);

        assert_eq!(items[0].location, "8r");
        assert_eq!(items[0].preceding, "writen vpon");
        assert_eq!(items[0].keyword, "a table");
        assert_eq!(items[0].following, "of stone");
        assert_eq!(items[0].kind, ContextKind::Segment);

        assert_eq!(items[2].location, "9v");
        assert_eq!(items[2].kind, ContextKind::Rubric);
    }

    #[test]
    fn numbering_restarts_per_location() {
        let items = parse_items(SAMPLE.as_bytes()).unwrap();
        let batch = batch_from_items("alice", &items);

        let numbers: Vec<(String, i64)> = batch
            .contexts
            .iter()
            .map(|c| (c.location.clone(), c.number))
            .collect();
        assert_eq!(
            numbers,
            vec![
                ("8r".to_string(), 1),
                ("8r".to_string(), 2),
                ("9v".to_string(), 1)
            ]
        );
        assert!(batch.contexts.iter().all(|c| c.batch_id == batch.id));
    }

    #[test]
    fn missing_location_is_rejected() {
        let xml = r#"<item preceding="a" following="b" type="seg_item">word</item>"#;
        assert!(parse_items(xml.as_bytes()).is_err());
    }

    #[test]
    fn item_without_keyword_is_rejected() {
        let xml = r#"<item preceding="a" following="b" location="1r" type="seg_item"/>"#;
        assert!(parse_items(xml.as_bytes()).is_err());
    }

    #[test]
    fn malformed_keyword_entity_reports_its_cause() {
        let xml =
            r#"<item preceding="a" following="b" location="1r" type="seg_item">god &vndef; man</item>"#;
        let err = parse_items(xml.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("malformed keyword text"));
    }

    #[test]
    fn unescapes_entities() {
        let xml = r#"<item preceding="lorde &amp; kynge" following="b" location="1r" type="seg_item">god &amp; man</item>"#;
        let items = parse_items(xml.as_bytes()).unwrap();
        assert_eq!(items[0].preceding, "lorde & kynge");
        assert_eq!(items[0].keyword, "god & man");
    }
}
