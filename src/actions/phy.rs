//! PHY-layer extractors: PDSCH packets, PDSCH status records, serving-cell
//! measurements.

use std::io::Write;

use crate::error::Result;
use crate::executor::InOrderExecutor;
use crate::splitter::Fragment;
use crate::xml::Element;

use super::util;

/// `LTE_PHY_PDSCH_Stat_Indication`: each record's scalar fields, repeated
/// once per transport block.
pub fn pdsch_stat(tree: &Element, job: Fragment, executor: &InOrderExecutor) -> Result<()> {
    let timestamp = util::packet_timestamp(tree)?;

    let flatten_dicts = |node: &Element| -> Result<Vec<String>> {
        let mut flattened = Vec::new();
        for dict_node in util::locate_disjoint_with_attribute(node, "type", "dict") {
            let mut line = String::new();
            for pair in &dict_node.expect_child("dict")?.children {
                if !line.is_empty() {
                    line.push_str(", ");
                }
                line.push_str(pair.expect_attribute("key")?);
                line.push_str(": ");
                line.push_str(&pair.text);
            }
            flattened.push(line);
        }
        Ok(flattened)
    };

    let mut result = String::new();
    for record_list in util::locate_disjoint_with_attribute(tree, "key", "Records") {
        for record in util::locate_disjoint_with_attribute(record_list, "type", "dict") {
            let mut scalar_fields = String::new();
            let mut transport_blocks = Vec::new();
            for item in &record.expect_child("dict")?.children {
                let key = item.expect_attribute("key")?;
                if key == "Transport Blocks" {
                    transport_blocks = flatten_dicts(item)?;
                } else {
                    if !scalar_fields.is_empty() {
                        scalar_fields.push_str(", ");
                    }
                    scalar_fields.push_str(key);
                    scalar_fields.push_str(": ");
                    scalar_fields.push_str(&item.text);
                }
            }
            for block in &transport_blocks {
                result.push_str(&timestamp);
                result.push_str(" $ LTE_PHY_PDSCH_Stat_Indication $ ");
                result.push_str(&scalar_fields);
                if !scalar_fields.is_empty() {
                    result.push_str(", ");
                }
                result.push_str(block);
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

/// `LTE_PHY_PDSCH_Packet`: a fixed set of root pairs on one line.
pub fn pdsch(tree: &Element, job: Fragment, executor: &InOrderExecutor) -> Result<()> {
    let timestamp = util::packet_timestamp(tree)?;

    const TARGET_KEYS: [&str; 8] = [
        "System Frame Number",
        "Subframe Number",
        "Number of Tx Antennas(M)",
        "Number of Rx Antennas(N)",
        "TBS 0",
        "MCS 0",
        "TBS 1",
        "MCS 1",
    ];

    let mut result = String::new();
    for pair in &util::packet_root(tree)?.children {
        if pair.name != "pair" {
            continue;
        }
        let key = pair.expect_attribute("key")?;
        if !TARGET_KEYS.contains(&key) {
            continue;
        }
        if !result.is_empty() {
            result.push_str(", ");
        }
        result.push_str(key);
        result.push_str(": ");
        result.push_str(&pair.text);
    }

    executor.insert(
        job.seq,
        Box::new(move |state| {
            writeln!(state.output, "{timestamp} $ LTE_PHY_PDSCH_Packet $ {result}")?;
            Ok(())
        }),
    );
    Ok(())
}

/// `LTE_PHY_Serv_Cell_Measurement`: the RSRP of the primary serving cell,
/// one line per subpacket that reports one.
pub fn serv_cell_measurement(
    tree: &Element,
    job: Fragment,
    executor: &InOrderExecutor,
) -> Result<()> {
    let timestamp = util::packet_timestamp(tree)?;

    #[derive(PartialEq)]
    enum CellStatus {
        Unknown,
        Primary,
        NonPrimary,
    }

    let mut result = String::new();
    for subpacket_list in util::locate_with_attribute(tree, "key", "Subpackets") {
        for subpacket in &subpacket_list.expect_child("list")?.children {
            let mut status = CellStatus::Unknown;
            let mut rsrp = String::new();
            for pair in &subpacket.expect_child("dict")?.children {
                match pair.expect_attribute("key")? {
                    "Serving Cell Index" => {
                        status = if pair.text == "PCell" {
                            CellStatus::Primary
                        } else {
                            CellStatus::NonPrimary
                        };
                    }
                    "RSRP" => rsrp = pair.text.clone(),
                    _ => {}
                }
                if status != CellStatus::Unknown && !rsrp.is_empty() {
                    break;
                }
            }
            if status == CellStatus::Primary && !rsrp.is_empty() {
                result.push_str(&timestamp);
                result.push_str(" $ LTE_PHY_Serv_Cell_Measurement $ RSRP: ");
                result.push_str(&rsrp);
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
