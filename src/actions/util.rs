//! Tree navigation shared by the extractors.
//!
//! Packets all share the outer shape
//! `<dm_log_packet><pair key="…">value</pair>…</dm_log_packet>`, with the
//! interesting payloads nested as `<field …>` / `<dict>` / `<list>`
//! structures below. The helpers here are the vocabulary every extractor is
//! written in.

use crate::error::{Result, SieveError};
use crate::splitter::Fragment;
use crate::xml::Element;

pub fn packet_root(tree: &Element) -> Result<&Element> {
    if tree.name == "dm_log_packet" {
        Ok(tree)
    } else {
        Err(SieveError::input(format!(
            "expected a <dm_log_packet> document, found <{}>",
            tree.name
        )))
    }
}

/// The `type_id` pair of the packet; empty when the pair is absent.
pub fn packet_type(tree: &Element) -> Result<String> {
    for child in &packet_root(tree)?.children {
        if child.name == "pair" && child.attribute("key") == Some("type_id") {
            return Ok(child.text.clone());
        }
    }
    Ok(String::new())
}

pub fn is_packet_of_type(tree: &Element, type_id: &str) -> Result<bool> {
    Ok(packet_type(tree)? == type_id)
}

/// The `timestamp` pair of the packet, or the literal `timestamp N/A`.
/// A `pair` without a `key` attribute makes the packet malformed here.
pub fn packet_timestamp(tree: &Element) -> Result<String> {
    for child in &packet_root(tree)?.children {
        if child.name == "pair" && child.expect_attribute("key")? == "timestamp" {
            return Ok(child.text.clone());
        }
    }
    Ok("timestamp N/A".to_string())
}

/// All subtrees (root included) carrying the attribute `key="value"`.
/// Descendants of a hit are searched too, so results may nest.
pub fn locate_with_attribute<'a>(tree: &'a Element, key: &str, value: &str) -> Vec<&'a Element> {
    let mut found = Vec::new();
    collect_with_attribute(tree, key, value, &mut found);
    found
}

fn collect_with_attribute<'a>(
    tree: &'a Element,
    key: &str,
    value: &str,
    found: &mut Vec<&'a Element>,
) {
    if tree.attribute(key) == Some(value) {
        found.push(tree);
    }
    for child in &tree.children {
        collect_with_attribute(child, key, value, found);
    }
}

/// Like `locate_with_attribute`, but a hit stops the descent, so no result
/// is a descendant of another.
pub fn locate_disjoint_with_attribute<'a>(
    tree: &'a Element,
    key: &str,
    value: &str,
) -> Vec<&'a Element> {
    let mut found = Vec::new();
    collect_disjoint_with_attribute(tree, key, value, &mut found);
    found
}

fn collect_disjoint_with_attribute<'a>(
    tree: &'a Element,
    key: &str,
    value: &str,
    found: &mut Vec<&'a Element>,
) {
    if tree.attribute(key) == Some(value) {
        found.push(tree);
        return;
    }
    for child in &tree.children {
        collect_disjoint_with_attribute(child, key, value, found);
    }
}

/// Whether any subtree (root included) carries the attribute.
pub fn attribute_present(tree: &Element, key: &str, value: &str) -> bool {
    if tree.attribute(key) == Some(value) {
        return true;
    }
    tree.children
        .iter()
        .any(|child| attribute_present(child, key, value))
}

/// Stderr warning for a repeated structure that did not appear the expected
/// number of times.
pub fn size_warning(
    timestamp: &str,
    what: &str,
    actual: usize,
    lower: usize,
    upper: usize,
    job: &Fragment,
) -> String {
    format!(
        "Warning (packet timestamp = {timestamp}): \n\
         {what} has unexpected size {actual}\n\
         Expected range: [{lower},{upper}] (inclusive).\n\
         Input file \"{}\" at line {}-{}\n",
        job.file_name, job.start_line, job.end_line
    )
}

/// Stderr warning for a timestamp string the mode could not interpret.
pub fn timestamp_warning(timestamp: &str) -> String {
    format!(
        "Warning (packet timestamp = {timestamp}): \n\
         Timestamp is not in the format \"YYYY-MM-DD HH:MM:SS[.ffffff]\". Dropped.\n"
    )
}
