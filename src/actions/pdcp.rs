//! PDCP cipher-data extractors.
//!
//! Two very different consumers of the same packet types. `extract_pdu_sizes`
//! reports every PDU's size and bearer. `track_last_data_packet` watches for
//! data-bearing PDUs (the trace's bulk TCP transfers always ride in
//! 1412-byte PDUs) and maintains the "last data packet seen" state the RRC
//! extractors annotate their lines with; it is also the point where pending
//! disruption events get reported and cleared.

use std::io::Write;

use crate::error::{Result, SieveError};
use crate::executor::InOrderExecutor;
use crate::splitter::Fragment;
use crate::state::PdcpDirection;
use crate::xml::Element;

use super::util;

const DATA_PDU_SIZE: &str = "1412";

fn collect_sizes_and_bearers(
    tree: &Element,
    list_key: &str,
    timestamp: &str,
    warning: &mut String,
) -> Result<Vec<(String, String)>> {
    let mut pdus = Vec::new();
    for pdu_list in util::locate_with_attribute(tree, "key", list_key) {
        for pdu in util::locate_with_attribute(pdu_list, "type", "dict") {
            let mut size = String::new();
            let mut bearer_id = String::new();
            for info in &pdu.expect_child("dict")?.children {
                if info.attribute("key") == Some("Bearer ID") {
                    bearer_id = info.text.clone();
                } else if info.attribute("key") == Some("PDU Size") {
                    size = info.text.clone();
                }
            }
            if size.is_empty() {
                warning.push_str(&format!(
                    "Warning (packet timestamp = {timestamp}):\n\
                     Found an {list_key} packet with size = 0. Skipping...\n"
                ));
                continue;
            }
            if bearer_id.is_empty() {
                warning.push_str(&format!(
                    "Warning (packet timestamp = {timestamp}):\n\
                     Found an {list_key} packet with no bearer id. Skipping...\n"
                ));
                continue;
            }
            pdus.push((size, bearer_id));
        }
    }
    Ok(pdus)
}

/// `pdcp_cipher_data_pdu`: one line per PDU in either direction.
pub fn extract_pdu_sizes(tree: &Element, job: Fragment, executor: &InOrderExecutor) -> Result<()> {
    let timestamp = util::packet_timestamp(tree)?;
    let mut warning = String::new();

    let uplink = collect_sizes_and_bearers(tree, "PDCPUL CIPH DATA", &timestamp, &mut warning)?;
    let downlink = collect_sizes_and_bearers(tree, "PDCPDL CIPH DATA", &timestamp, &mut warning)?;

    executor.insert(
        job.seq,
        Box::new(move |state| {
            eprint!("{warning}");
            for (size, bearer_id) in &uplink {
                writeln!(
                    state.output,
                    "{timestamp} $ LTE_PDCP_UL_Cipher_Data_PDU $ PDU Size: {size}, \
                     Bearer ID: {bearer_id}"
                )?;
            }
            for (size, bearer_id) in &downlink {
                writeln!(
                    state.output,
                    "{timestamp} $ LTE_PDCP_DL_Cipher_Data_PDU $ PDU Size: {size}, \
                     Bearer ID: {bearer_id}"
                )?;
            }
            Ok(())
        }),
    );
    Ok(())
}

fn packet_direction(tree: &Element) -> Result<PdcpDirection> {
    for child in &util::packet_root(tree)?.children {
        if child.name == "pair" && child.attribute("key") == Some("type_id") {
            return Ok(match child.text.as_str() {
                "LTE_PDCP_UL_Cipher_Data_PDU" => PdcpDirection::Uplink,
                "LTE_PDCP_DL_Cipher_Data_PDU" => PdcpDirection::Downlink,
                _ => PdcpDirection::Unknown,
            });
        }
    }
    Ok(PdcpDirection::Unknown)
}

fn has_data_pdu(tree: &Element, list_key: &str) -> bool {
    for pdu_list in util::locate_with_attribute(tree, "key", list_key) {
        for size in util::locate_with_attribute(pdu_list, "key", "PDU Size") {
            if size.text == DATA_PDU_SIZE {
                return true;
            }
        }
    }
    false
}

/// `action_pdcp_cipher_data_pdu`: update the last-data-packet state and
/// report the first data packet after each disruption.
pub fn track_last_data_packet(
    tree: &Element,
    job: Fragment,
    executor: &InOrderExecutor,
) -> Result<()> {
    let timestamp = util::packet_timestamp(tree)?;

    let direction = packet_direction(tree)?;
    let list_key = match direction {
        PdcpDirection::Uplink => "PDCPUL CIPH DATA",
        PdcpDirection::Downlink => "PDCPDL CIPH DATA",
        PdcpDirection::Unknown => {
            return Err(SieveError::bug(
                "the PDCP tracker was invoked with a packet that is neither \
                 LTE_PDCP_UL_Cipher_Data_PDU nor LTE_PDCP_DL_Cipher_Data_PDU",
            ));
        }
    };

    if !has_data_pdu(tree, list_key) {
        executor.insert(job.seq, Box::new(|_| Ok(())));
        return Ok(());
    }

    executor.insert(
        job.seq,
        Box::new(move |state| {
            if state.disruptions.is_active() {
                for event in state.disruptions.take_pending() {
                    writeln!(
                        state.output,
                        "{timestamp} $ FirstPDCPPacketAfterDisruption $ \
                         Disruption Type: {}, Direction: {direction}",
                        event.label()
                    )?;
                }
            }
            state.last_pdcp_timestamp = timestamp;
            state.last_pdcp_direction = direction;
            Ok(())
        }),
    );
    Ok(())
}
