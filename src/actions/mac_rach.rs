//! MAC random-access extractors.

use std::io::Write;

use crate::error::Result;
use crate::executor::InOrderExecutor;
use crate::splitter::Fragment;
use crate::xml::Element;

use super::util;

/// `LTE_MAC_Rach_Attempt`: every `Rach result` value on one line.
pub fn attempt(tree: &Element, job: Fragment, executor: &InOrderExecutor) -> Result<()> {
    let timestamp = util::packet_timestamp(tree)?;

    let mut results = String::new();
    for node in util::locate_with_attribute(tree, "key", "Rach result") {
        if !results.is_empty() {
            results.push_str(", ");
        }
        results.push_str("Result: ");
        results.push_str(&node.text);
    }

    executor.insert(
        job.seq,
        Box::new(move |state| {
            writeln!(state.output, "{timestamp} $ LTE_MAC_Rach_Attempt $ {results}")?;
            Ok(())
        }),
    );
    Ok(())
}

/// `LTE_MAC_Rach_Trigger`: the trigger reasons, annotated with the last
/// data-bearing PDCP timestamp known at execution time.
pub fn trigger(tree: &Element, job: Fragment, executor: &InOrderExecutor) -> Result<()> {
    let timestamp = util::packet_timestamp(tree)?;

    let mut reasons = String::new();
    for node in util::locate_with_attribute(tree, "key", "Rach reason") {
        if !reasons.is_empty() {
            reasons.push_str(", ");
        }
        reasons.push_str("Reason: ");
        reasons.push_str(&node.text);
    }

    executor.insert(
        job.seq,
        Box::new(move |state| {
            writeln!(
                state.output,
                "{timestamp} $ LTE_MAC_Rach_Trigger $ {reasons}, LastPDCPPacketTimestamp: {}",
                state.last_pdcp_timestamp
            )?;
            Ok(())
        }),
    );
    Ok(())
}
