//! RRC OTA extractor.
//!
//! `LTE_RRC_OTA_Packet` carries the decoded air-interface signalling, and
//! this extractor reports every connection-management signal the rest of the
//! toolchain cares about: measurement-configuration changes, measurement
//! reports, and the request/setup/reconfiguration/reestablishment/release
//! families. The connection-disrupting ones also set a pending bit in the
//! disruption log, which the PDCP tracker reports against the next
//! data-bearing packet.

use std::io::Write;

use crate::error::Result;
use crate::executor::InOrderExecutor;
use crate::splitter::Fragment;
use crate::state::DisruptionEvent;
use crate::xml::Element;

use super::util;

pub fn run(tree: &Element, job: Fragment, executor: &InOrderExecutor) -> Result<()> {
    let timestamp = util::packet_timestamp(tree)?;
    let mut warning = String::new();

    // New report-config entries: the (eventId, reportConfigId) showname
    // pairs. Each ReportConfigToAddMod element is expected to carry exactly
    // one of each.
    let mut added_report_configs: Vec<(String, String)> = Vec::new();
    for add_mod in
        util::locate_with_attribute(tree, "name", "lte-rrc.ReportConfigToAddMod_element")
    {
        let config_ids = util::locate_with_attribute(add_mod, "name", "lte-rrc.reportConfigId");
        if config_ids.len() == 1 {
            let event_ids = util::locate_with_attribute(add_mod, "name", "lte-rrc.eventId");
            if event_ids.len() == 1 {
                added_report_configs.push((
                    event_ids[0].expect_attribute("showname")?.to_string(),
                    config_ids[0].expect_attribute("showname")?.to_string(),
                ));
            } else {
                warning.push_str(&util::size_warning(
                    &timestamp,
                    "vector containing lte-rrc.eventId",
                    event_ids.len(),
                    1,
                    1,
                    &job,
                ));
            }
        } else {
            warning.push_str(&util::size_warning(
                &timestamp,
                "vector containing lte-rrc.reportConfigId",
                config_ids.len(),
                1,
                1,
                &job,
            ));
        }
    }

    // Dropped report-config entries.
    let mut removed_config_ids = Vec::new();
    for remove_list in
        util::locate_with_attribute(tree, "name", "lte-rrc.reportConfigToRemoveList")
    {
        for node in util::locate_with_attribute(remove_list, "name", "lte-rrc.ReportConfigId") {
            removed_config_ids.push(node.expect_attribute("showname")?.to_string());
        }
    }

    // New measurement-id entries: (measId, reportConfigId) showname pairs.
    let mut added_measure_ids: Vec<(String, String)> = Vec::new();
    for add_mod in util::locate_with_attribute(tree, "name", "lte-rrc.MeasIdToAddMod_element") {
        let config_ids = util::locate_with_attribute(add_mod, "name", "lte-rrc.reportConfigId");
        if config_ids.len() == 1 {
            let meas_ids = util::locate_with_attribute(add_mod, "name", "lte-rrc.measId");
            if meas_ids.len() == 1 {
                added_measure_ids.push((
                    meas_ids[0].expect_attribute("showname")?.to_string(),
                    config_ids[0].expect_attribute("showname")?.to_string(),
                ));
            } else {
                warning.push_str(&util::size_warning(
                    &timestamp,
                    "vector containing lte-rrc.measId",
                    meas_ids.len(),
                    1,
                    1,
                    &job,
                ));
            }
        } else {
            warning.push_str(&util::size_warning(
                &timestamp,
                "vector containing lte-rrc.reportConfigId",
                config_ids.len(),
                1,
                1,
                &job,
            ));
        }
    }

    // Dropped measurement-id entries.
    let mut removed_measure_ids = Vec::new();
    for remove_list in util::locate_with_attribute(tree, "name", "lte-rrc.measIdToRemoveList") {
        for node in util::locate_with_attribute(remove_list, "name", "lte-rrc.MeasId") {
            removed_measure_ids.push(node.expect_attribute("showname")?.to_string());
        }
    }

    // Measurement reports and the measId that triggered them.
    let mut measurement_reports = Vec::new();
    for results in util::locate_with_attribute(tree, "name", "lte-rrc.measResults_element") {
        for node in util::locate_with_attribute(results, "name", "lte-rrc.measId") {
            measurement_reports.push(node.expect_attribute("showname")?.to_string());
        }
    }

    let reestablishment_request =
        util::attribute_present(tree, "showname", "rrcConnectionReestablishmentRequest");
    let reestablishment_complete =
        util::attribute_present(tree, "showname", "rrcConnectionReestablishmentComplete");
    let reestablishment_reject =
        util::attribute_present(tree, "showname", "rrcConnectionReestablishmentReject");

    let mut reestablishment_cause = String::new();
    for cause in util::locate_with_attribute(tree, "name", "lte-rrc.reestablishmentCause") {
        if !reestablishment_cause.is_empty() {
            reestablishment_cause.push_str(", ");
        }
        reestablishment_cause.push_str(cause.attribute("showname").unwrap_or_default());
    }

    let reconfiguration_nodes =
        util::locate_with_attribute(tree, "showname", "rrcConnectionReconfiguration");
    let reconfiguration = !reconfiguration_nodes.is_empty();
    let mobility_control_info = reconfiguration_nodes
        .iter()
        .any(|node| util::attribute_present(node, "showname", "mobilityControlInfo"));

    let mut target_cells = String::new();
    if mobility_control_info {
        for cell in util::locate_with_attribute(tree, "name", "lte-rrc.targetPhysCellId") {
            if !target_cells.is_empty() {
                target_cells.push_str(", ");
            }
            target_cells.push_str(cell.expect_attribute("showname")?);
        }
    }

    let reconfiguration_complete =
        util::attribute_present(tree, "showname", "rrcConnectionReconfigurationComplete");
    let release = util::attribute_present(tree, "showname", "rrcConnectionRelease");
    let request = util::attribute_present(tree, "showname", "rrcConnectionRequest");
    let setup = util::attribute_present(tree, "showname", "rrcConnectionSetup");
    let reject = util::attribute_present(tree, "showname", "rrcConnectionReject");

    executor.insert(
        job.seq,
        Box::new(move |state| {
            eprint!("{warning}");

            for id in &removed_config_ids {
                writeln!(state.output, "{timestamp} $ reportConfigToRemoveList $ {id}")?;
            }
            for id in &removed_measure_ids {
                writeln!(state.output, "{timestamp} $ measIdToRemoveList $ {id}")?;
            }
            for (event_type, config_id) in &added_report_configs {
                writeln!(
                    state.output,
                    "{timestamp} $ ReportConfigToAddMod $ {event_type}, {config_id}"
                )?;
            }
            for (meas_id, config_id) in &added_measure_ids {
                writeln!(
                    state.output,
                    "{timestamp} $ MeasIdToAddMod $ {meas_id}, {config_id}"
                )?;
            }
            for report in &measurement_reports {
                writeln!(state.output, "{timestamp} $ measResults $ {report}")?;
            }

            if reestablishment_request {
                write!(
                    state.output,
                    "{timestamp} $ rrcConnectionReestablishmentRequest $ {}",
                    state.describe_last_pdcp()
                )?;
                state
                    .disruptions
                    .record(DisruptionEvent::RrcConnectionReestablishmentRequest);
                if !reestablishment_cause.is_empty() {
                    write!(state.output, ", {reestablishment_cause}")?;
                }
                writeln!(state.output)?;
            }
            if reestablishment_complete {
                writeln!(
                    state.output,
                    "{timestamp} $ rrcConnectionReestablishmentComplete $"
                )?;
                state
                    .disruptions
                    .record(DisruptionEvent::RrcConnectionReestablishmentComplete);
            }
            if reestablishment_reject {
                writeln!(
                    state.output,
                    "{timestamp} $ rrcConnectionReestablishmentReject $"
                )?;
            }
            if reconfiguration {
                write!(
                    state.output,
                    "{timestamp} $ rrcConnectionReconfiguration $ mobilityControlInfo: "
                )?;
                if mobility_control_info {
                    write!(state.output, "1, {target_cells}")?;
                } else {
                    write!(state.output, "0")?;
                }
                writeln!(state.output, ", {}", state.describe_last_pdcp())?;
                state
                    .disruptions
                    .record(DisruptionEvent::RrcConnectionReconfiguration);
            }
            if reconfiguration_complete {
                writeln!(
                    state.output,
                    "{timestamp} $ rrcConnectionReconfigurationComplete $"
                )?;
                state
                    .disruptions
                    .record(DisruptionEvent::RrcConnectionReconfigurationComplete);
            }
            if release {
                writeln!(state.output, "{timestamp} $ rrcConnectionRelease $")?;
            }
            if request {
                writeln!(
                    state.output,
                    "{timestamp} $ rrcConnectionRequest $ {}",
                    state.describe_last_pdcp()
                )?;
                state.disruptions.record(DisruptionEvent::RrcConnectionRequest);
            }
            if setup {
                writeln!(state.output, "{timestamp} $ rrcConnectionSetup $")?;
                state.disruptions.record(DisruptionEvent::RrcConnectionSetup);
            }
            if reject {
                writeln!(state.output, "{timestamp} $ rrcConnectionReject $")?;
            }
            Ok(())
        }),
    );
    Ok(())
}
