//! NAS EMM OTA extractors: tracking-area-update signalling.

use std::io::Write;

use crate::error::Result;
use crate::executor::InOrderExecutor;
use crate::splitter::Fragment;
use crate::xml::Element;

use super::util;

/// Incoming packets: report TAU accept/reject, stay silent otherwise.
pub fn incoming(tree: &Element, job: Fragment, executor: &InOrderExecutor) -> Result<()> {
    let timestamp = util::packet_timestamp(tree)?;

    let mut accept = false;
    let mut reject = false;
    for field in util::locate_with_attribute(tree, "name", "nas_eps.nas_msg_emm_type") {
        let showname = field.attribute("showname").unwrap_or_default();
        if showname.contains("Tracking area update accept") {
            accept = true;
            break;
        }
        if showname.contains("Tracking area update reject") {
            reject = true;
            break;
        }
    }

    if !accept && !reject {
        executor.insert(job.seq, Box::new(|_| Ok(())));
        return Ok(());
    }

    let message = format!(
        "{timestamp} $ LTE_NAS_EMM_OTA_Incoming_Packet $ \
         Tracking area update accept: {}, Tracking area update reject: {}",
        u8::from(accept),
        u8::from(reject)
    );
    executor.insert(
        job.seq,
        Box::new(move |state| {
            writeln!(state.output, "{message}")?;
            Ok(())
        }),
    );
    Ok(())
}

/// Outgoing packets: report the TAU request when present.
pub fn outgoing(tree: &Element, job: Fragment, executor: &InOrderExecutor) -> Result<()> {
    let timestamp = util::packet_timestamp(tree)?;

    let request = util::locate_with_attribute(tree, "name", "nas_eps.nas_msg_emm_type")
        .iter()
        .any(|field| {
            field
                .attribute("showname")
                .unwrap_or_default()
                .contains("Tracking area update request")
        });

    if !request {
        executor.insert(job.seq, Box::new(|_| Ok(())));
        return Ok(());
    }

    let message = format!(
        "{timestamp} $ LTE_NAS_EMM_OTA_Outgoing_Packet $ Tracking area update request: 1"
    );
    executor.insert(
        job.seq,
        Box::new(move |state| {
            writeln!(state.output, "{message}")?;
            Ok(())
        }),
    );
    Ok(())
}
