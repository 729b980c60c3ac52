//! Serving-cell information extractor.
//!
//! `LTE_RRC_Serv_Cell_Info` packets carry their payload directly as root
//! pairs, so this is the one extractor that never descends into the field
//! tree. Any empty field produces a warning naming the source span; the
//! output line is emitted regardless.

use std::io::Write;

use crate::error::Result;
use crate::executor::InOrderExecutor;
use crate::splitter::Fragment;
use crate::xml::Element;

use super::util;

pub fn run(tree: &Element, job: Fragment, executor: &InOrderExecutor) -> Result<()> {
    let mut timestamp = "timestamp N/A".to_string();
    let mut cell_id = String::new();
    let mut dl_freq = String::new();
    let mut ul_freq = String::new();
    let mut dl_bandwidth = String::new();
    let mut ul_bandwidth = String::new();
    let mut cell_identity = String::new();
    let mut tracking_area_code = String::new();

    for child in &util::packet_root(tree)?.children {
        if child.name != "pair" {
            continue;
        }
        match child.attribute("key") {
            Some("timestamp") => timestamp = child.text.clone(),
            Some("Cell ID") => cell_id = child.text.clone(),
            Some("Downlink frequency") => dl_freq = child.text.clone(),
            Some("Uplink frequency") => ul_freq = child.text.clone(),
            Some("Downlink bandwidth") => dl_bandwidth = child.text.clone(),
            Some("Uplink bandwidth") => ul_bandwidth = child.text.clone(),
            Some("Cell Identity") => cell_identity = child.text.clone(),
            Some("TAC") => tracking_area_code = child.text.clone(),
            _ => {}
        }
    }

    let labelled = [
        ("timestamp", &timestamp),
        ("Cell ID", &cell_id),
        ("Downlink frequency", &dl_freq),
        ("Uplink frequency", &ul_freq),
        ("Downlink bandwidth", &dl_bandwidth),
        ("Uplink bandwidth", &ul_bandwidth),
        ("Cell Identity", &cell_identity),
        ("TAC", &tracking_area_code),
    ];
    let mut warning = String::new();
    if labelled.iter().any(|(_, value)| value.is_empty()) {
        warning.push_str(&format!(
            "Warning (packet timestamp = {timestamp}): \n\
             The following field in the rrc_serv_cell_info packet is empty\n"
        ));
        for (label, value) in &labelled {
            if value.is_empty() {
                warning.push_str(label);
                warning.push_str(", ");
            }
        }
        warning.push('\n');
        warning.push_str(&format!(
            "Input file {} at line {}-{}\n",
            job.file_name, job.start_line, job.end_line
        ));
    }

    executor.insert(
        job.seq,
        Box::new(move |state| {
            eprint!("{warning}");
            writeln!(
                state.output,
                "{timestamp} $ LTE_RRC_Serv_Cell_Info $ Cell ID: {cell_id}, \
                 Downlink frequency: {dl_freq}, Uplink frequency: {ul_freq}, \
                 Downlink bandwidth: {dl_bandwidth}, Uplink bandwidth: {ul_bandwidth}, \
                 Cell Identity: {cell_identity}, TAC: {tracking_area_code}"
            )?;
            Ok(())
        }),
    );
    Ok(())
}
