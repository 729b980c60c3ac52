//! Whole-fragment actions: the four passthrough modes plus the catch-all
//! packet-type extractor.
//!
//! These all schedule one task per fragment; the task body is where the
//! history-sensitive decisions (dedup high-water mark, reorder window) run,
//! single-threaded on the executor.

use std::io::Write;

use regex::Regex;

use crate::error::Result;
use crate::executor::InOrderExecutor;
use crate::splitter::Fragment;
use crate::timefmt;
use crate::xml::Element;

use super::util;

/// `all_packet_type`: one `<timestamp> $ <type_id>` line per packet.
pub fn packet_type(tree: &Element, job: Fragment, executor: &InOrderExecutor) -> Result<()> {
    let timestamp = util::packet_timestamp(tree)?;
    let type_id = util::packet_type(tree)?;
    executor.insert(
        job.seq,
        Box::new(move |state| {
            writeln!(state.output, "{timestamp} $ {type_id}")?;
            Ok(())
        }),
    );
    Ok(())
}

/// `--range`: echo the fragment verbatim when its timestamp falls inside
/// any configured `[start, end]` pair (inclusive, second resolution).
pub fn echo_within_time_range(
    tree: &Element,
    job: Fragment,
    ranges: &[(i64, i64)],
    executor: &InOrderExecutor,
) -> Result<()> {
    let timestamp = util::packet_timestamp(tree)?;

    let Some(seconds) = timefmt::stamp_to_seconds(&timestamp) else {
        executor.insert(
            job.seq,
            Box::new(move |_| {
                eprint!("{}", util::timestamp_warning(&timestamp));
                Ok(())
            }),
        );
        return Ok(());
    };

    let within = ranges
        .iter()
        .any(|&(start, end)| start <= seconds && seconds <= end);

    let mut content = String::new();
    if within {
        content = job.text;
        content.push('\n');
    }
    executor.insert(
        job.seq,
        Box::new(move |state| {
            state.output.write_all(content.as_bytes())?;
            Ok(())
        }),
    );
    Ok(())
}

/// `--filter`: echo the fragment when its `type_id` matches the anchored
/// pattern.
pub fn echo_if_type_match(
    tree: &Element,
    job: Fragment,
    pattern: &Regex,
    executor: &InOrderExecutor,
) -> Result<()> {
    let type_id = util::packet_type(tree)?;
    if pattern.is_match(&type_id) {
        let content = job.text;
        executor.insert(
            job.seq,
            Box::new(move |state| {
                writeln!(state.output, "{content}")?;
                Ok(())
            }),
        );
    } else {
        executor.insert(job.seq, Box::new(|_| Ok(())));
    }
    Ok(())
}

/// `--dedup`: echo the fragment iff its timestamp has not regressed below
/// the newest one already emitted.
pub fn echo_if_new(tree: &Element, job: Fragment, executor: &InOrderExecutor) -> Result<()> {
    let timestamp = util::packet_timestamp(tree)?;

    let Some(micros) = timefmt::stamp_to_micros(&timestamp) else {
        executor.insert(
            job.seq,
            Box::new(move |_| {
                eprint!("{}", util::timestamp_warning(&timestamp));
                Ok(())
            }),
        );
        return Ok(());
    };

    let content = job.text;
    executor.insert(
        job.seq,
        Box::new(move |state| {
            if micros >= state.latest_seen_micros {
                writeln!(state.output, "{content}")?;
                state.latest_seen_micros = micros;
                state.latest_seen_stamp = timestamp;
            } else {
                eprintln!("Dropping packet: {timestamp} < {}", state.latest_seen_stamp);
            }
            Ok(())
        }),
    );
    Ok(())
}

/// `--reorder`: feed the fragment through the timestamp-keyed window.
pub fn reorder_update(tree: &Element, job: Fragment, executor: &InOrderExecutor) -> Result<()> {
    let timestamp = util::packet_timestamp(tree)?;

    let Some(micros) = timefmt::stamp_to_micros(&timestamp) else {
        executor.insert(
            job.seq,
            Box::new(move |_| {
                eprint!("{}", util::timestamp_warning(&timestamp));
                Ok(())
            }),
        );
        return Ok(());
    };

    let content = job.text;
    executor.insert(
        job.seq,
        Box::new(move |state| {
            state.reorder_update(micros, content)?;
            Ok(())
        }),
    );
    Ok(())
}
