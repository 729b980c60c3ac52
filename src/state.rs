//! Process-wide mutable state, owned by the in-order executor.
//!
//! Everything here is history-sensitive: the output sink, the timestamp of
//! the last data-bearing PDCP packet, the disruption bookkeeping, the dedup
//! high-water mark, and the reorder window. Exactly one thread (the
//! executor) holds this value while the pipeline runs, so ordered tasks
//! mutate it through a plain `&mut` with no locking. Workers capture the
//! inputs a task needs by value at scheduling time.

use std::fmt;
use std::io::Write;

use crate::sorter::ReorderWindow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdcpDirection {
    Unknown,
    Uplink,
    Downlink,
}

impl fmt::Display for PdcpDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PdcpDirection::Unknown => "unknown",
            PdcpDirection::Uplink => "uplink",
            PdcpDirection::Downlink => "downlink",
        })
    }
}

/// Radio-layer conditions that disrupt an ongoing connection. Each sets a
/// pending bit; the first data-bearing PDCP packet afterwards reports and
/// clears them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisruptionEvent {
    RrcConnectionReestablishmentRequest,
    RrcConnectionReestablishmentComplete,
    RrcConnectionReconfiguration,
    RrcConnectionReconfigurationComplete,
    RrcConnectionRequest,
    RrcConnectionSetup,
}

pub const DISRUPTION_KINDS: usize = 6;

impl DisruptionEvent {
    pub const ALL: [DisruptionEvent; DISRUPTION_KINDS] = [
        DisruptionEvent::RrcConnectionReestablishmentRequest,
        DisruptionEvent::RrcConnectionReestablishmentComplete,
        DisruptionEvent::RrcConnectionReconfiguration,
        DisruptionEvent::RrcConnectionReconfigurationComplete,
        DisruptionEvent::RrcConnectionRequest,
        DisruptionEvent::RrcConnectionSetup,
    ];

    pub fn label(self) -> &'static str {
        match self {
            DisruptionEvent::RrcConnectionReestablishmentRequest => {
                "rrcConnectionReestablishmentRequest"
            }
            DisruptionEvent::RrcConnectionReestablishmentComplete => {
                "rrcConnectionReestablishmentComplete"
            }
            DisruptionEvent::RrcConnectionReconfiguration => "rrcConnectionReconfiguration",
            DisruptionEvent::RrcConnectionReconfigurationComplete => {
                "rrcConnectionReconfigurationComplete"
            }
            DisruptionEvent::RrcConnectionRequest => "rrcConnectionRequest",
            DisruptionEvent::RrcConnectionSetup => "rrcConnectionSetup",
        }
    }

    fn index(self) -> usize {
        Self::ALL
            .iter()
            .position(|e| *e == self)
            .unwrap_or_default()
    }
}

#[derive(Debug, Default)]
pub struct DisruptionLog {
    active: bool,
    pending: [bool; DISRUPTION_KINDS],
}

impl DisruptionLog {
    pub fn record(&mut self, event: DisruptionEvent) {
        self.active = true;
        self.pending[event.index()] = true;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Pending events in declaration order; clears the log.
    pub fn take_pending(&mut self) -> Vec<DisruptionEvent> {
        let mut events = Vec::new();
        for event in DisruptionEvent::ALL {
            if std::mem::take(&mut self.pending[event.index()]) {
                events.push(event);
            }
        }
        self.active = false;
        events
    }
}

pub struct SinkState {
    pub output: Box<dyn Write + Send>,
    pub last_pdcp_timestamp: String,
    pub last_pdcp_direction: PdcpDirection,
    pub disruptions: DisruptionLog,
    /// Dedup high-water mark in microseconds; `i64::MIN` so the first packet
    /// always passes.
    pub latest_seen_micros: i64,
    pub latest_seen_stamp: String,
    pub reorder: Option<ReorderWindow>,
}

impl SinkState {
    pub fn new(output: Box<dyn Write + Send>, reorder: Option<ReorderWindow>) -> Self {
        SinkState {
            output,
            last_pdcp_timestamp: "unknown".to_string(),
            last_pdcp_direction: PdcpDirection::Unknown,
            disruptions: DisruptionLog::default(),
            latest_seen_micros: i64::MIN,
            latest_seen_stamp: String::new(),
            reorder,
        }
    }

    /// The `LastPDCPPacketTimestamp: …, Direction: …` clause several
    /// extractors append to their lines.
    pub fn describe_last_pdcp(&self) -> String {
        format!(
            "LastPDCPPacketTimestamp: {}, Direction: {}",
            self.last_pdcp_timestamp, self.last_pdcp_direction
        )
    }

    pub fn reorder_update(&mut self, timestamp: i64, text: String) -> std::io::Result<()> {
        match self.reorder.as_mut() {
            Some(window) => window.update(timestamp, text, &mut self.output),
            None => Ok(()),
        }
    }

    /// Drain the reorder window into the output; called once during
    /// shutdown in reorder mode.
    pub fn flush_reorder(&mut self) -> std::io::Result<()> {
        if let Some(mut window) = self.reorder.take() {
            window.flush(&mut self.output)?;
        }
        Ok(())
    }
}
