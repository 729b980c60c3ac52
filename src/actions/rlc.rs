//! RLC extractors: acknowledged-mode PDU dumps and radio-bearer
//! configuration logs.

use std::io::Write;

use crate::error::{Result, SieveError};
use crate::executor::InOrderExecutor;
use crate::splitter::Fragment;
use crate::xml::Element;

use super::util;

/// `LTE_RLC_{DL,UL}_AM_All_PDU`: one line per PDU listing every field of its
/// dict. Control NACKs flatten their sequence numbers; data LI blobs are
/// elided.
pub fn am_all_pdu(
    tree: &Element,
    job: Fragment,
    uplink: bool,
    executor: &InOrderExecutor,
) -> Result<()> {
    let timestamp = util::packet_timestamp(tree)?;

    let (list_key, channel_tag) = if uplink {
        ("RLCUL PDUs", " $ LTE_RLC_UL_AM_All_PDU $ ")
    } else {
        ("RLCDL PDUs", " $ LTE_RLC_DL_AM_All_PDU $ ")
    };

    let mut result = String::new();
    for pdu_list in util::locate_disjoint_with_attribute(tree, "key", list_key) {
        for pdu in util::locate_disjoint_with_attribute(pdu_list, "type", "dict") {
            result.push_str(&timestamp);
            result.push_str(channel_tag);
            let mut first = true;
            for field in &pdu.expect_child("dict")?.children {
                let key = field.expect_attribute("key")?;
                if !first {
                    result.push_str(", ");
                } else {
                    first = false;
                }
                result.push_str(key);
                result.push_str(": ");
                match key {
                    "RLC CTRL NACK" => {
                        let mut sequence_numbers = String::new();
                        for nack in util::locate_disjoint_with_attribute(field, "key", "NACK_SN") {
                            if !sequence_numbers.is_empty() {
                                sequence_numbers.push('/');
                            }
                            sequence_numbers.push_str(&nack.text);
                        }
                        result.push_str(&sequence_numbers);
                    }
                    "RLC DATA LI" => result.push_str("OMITTED"),
                    _ => result.push_str(&field.text),
                }
            }
            result.push('\n');
        }
    }

    executor.insert(
        job.seq,
        Box::new(move |state| {
            state.output.write_all(result.as_bytes())?;
            Ok(())
        }),
    );
    Ok(())
}

/// `LTE_RLC_{DL,UL}_Config_Log_Packet`: the config reason plus every
/// added/modified, released and active radio bearer entry.
pub fn config_log(
    tree: &Element,
    job: Fragment,
    uplink: bool,
    executor: &InOrderExecutor,
) -> Result<()> {
    let timestamp = util::packet_timestamp(tree)?;

    let packet_name = if uplink {
        "LTE_RLC_UL_Config_Log_Packet"
    } else {
        "LTE_RLC_DL_Config_Log_Packet"
    };

    let reasons = util::locate_disjoint_with_attribute(tree, "key", "Reason");
    if reasons.len() != 1 {
        return Err(SieveError::input(format!(
            "{packet_name} does not have a \"Reason\" field"
        )));
    }
    let reason = format!("Reason: {}", reasons[0].text);

    let mut result = String::new();
    for category in ["Added/Modified RBs", "Released RBs", "Active RBs"] {
        for rb_list in util::locate_disjoint_with_attribute(tree, "key", category) {
            for dict_node in util::locate_disjoint_with_attribute(rb_list, "type", "dict") {
                result.push_str(&timestamp);
                result.push_str(" $ ");
                result.push_str(packet_name);
                result.push_str(" $ ");
                result.push_str(&reason);
                result.push_str(", Category: ");
                result.push_str(category);
                for pair in &dict_node.expect_child("dict")?.children {
                    result.push_str(", ");
                    result.push_str(pair.expect_attribute("key")?);
                    result.push_str(": ");
                    result.push_str(&pair.text);
                }
                result.push('\n');
            }
        }
    }

    executor.insert(
        job.seq,
        Box::new(move |state| {
            state.output.write_all(result.as_bytes())?;
            Ok(())
        }),
    );
    Ok(())
}
