//! The action registry: what to do with each parsed packet.
//!
//! A registry is an ordered list of (predicate, action) pairs. For every
//! packet the worker walks the list and runs the action of the first
//! predicate that matches, and only that one. Every action must schedule
//! exactly one ordered task for its fragment's sequence number, even when it
//! has nothing to say, because the in-order executor relies on the sequence
//! being contiguous. The unconditional sentinel entry at the end of every
//! registry is what makes that guarantee unconditional.

mod mac_rach;
mod nas_emm;
mod passthrough;
mod pdcp;
mod phy;
mod rlc;
mod rrc_ota;
mod serv_cell_info;
pub mod util;

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::{Mode, SieveConfig};
use crate::error::{Result, SieveError};
use crate::executor::InOrderExecutor;
use crate::splitter::Fragment;
use crate::xml::Element;

#[derive(Debug, Clone, Copy)]
pub enum Predicate {
    HasType(&'static str),
    HasEitherType(&'static str, &'static str),
    Always,
}

impl Predicate {
    fn matches(&self, tree: &Element) -> Result<bool> {
        match self {
            Predicate::HasType(type_id) => util::is_packet_of_type(tree, type_id),
            Predicate::HasEitherType(a, b) => {
                Ok(util::is_packet_of_type(tree, a)? || util::is_packet_of_type(tree, b)?)
            }
            Predicate::Always => Ok(true),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ActionKind {
    RrcOta,
    ServCellInfo,
    PdcpCipherData,
    PdcpTracker,
    NasEmmIncoming,
    NasEmmOutgoing,
    MacRachAttempt,
    MacRachTrigger,
    PhyPdschStat,
    PhyPdsch,
    PhyServCellMeas,
    RlcAmAllPdu { uplink: bool },
    RlcConfigLog { uplink: bool },
    PacketType,
    EchoWithinTimeRange,
    EchoIfTypeMatch,
    EchoIfNew,
    ReorderUpdate,
    /// Schedules an empty task so the sequence stays contiguous.
    Sentinel,
}

struct ConditionalAction {
    predicate: Predicate,
    action: ActionKind,
}

/// Everything the extractor catalog knows about one name on the
/// `--extract` list.
struct ExtractorEntry {
    predicate: Predicate,
    action: ActionKind,
    enabled_note: &'static str,
}

static EXTRACTOR_TABLE: Lazy<HashMap<&'static str, ExtractorEntry>> = Lazy::new(|| {
    use ActionKind::*;
    use Predicate::*;
    HashMap::from([
        (
            "rrc_ota",
            ExtractorEntry {
                predicate: HasType("LTE_RRC_OTA_Packet"),
                action: RrcOta,
                enabled_note: "Extractor enabled: LTE_RRC_OTA_Packet",
            },
        ),
        (
            "rrc_serv_cell_info",
            ExtractorEntry {
                predicate: HasType("LTE_RRC_Serv_Cell_Info"),
                action: ServCellInfo,
                enabled_note: "Extractor enabled: LTE_RRC_Serv_Cell_Info",
            },
        ),
        (
            "pdcp_cipher_data_pdu",
            ExtractorEntry {
                predicate: HasEitherType(
                    "LTE_PDCP_UL_Cipher_Data_PDU",
                    "LTE_PDCP_DL_Cipher_Data_PDU",
                ),
                action: PdcpCipherData,
                enabled_note:
                    "Extractor enabled: LTE_PDCP_UL_Cipher_Data_PDU and LTE_PDCP_DL_Cipher_Data_PDU",
            },
        ),
        (
            "action_pdcp_cipher_data_pdu",
            ExtractorEntry {
                predicate: HasEitherType(
                    "LTE_PDCP_UL_Cipher_Data_PDU",
                    "LTE_PDCP_DL_Cipher_Data_PDU",
                ),
                action: PdcpTracker,
                enabled_note:
                    "Compound extractor enabled: act on LTE_PDCP_UL_Cipher_Data_PDU and LTE_PDCP_DL_Cipher_Data_PDU",
            },
        ),
        (
            "nas_emm_ota_incoming",
            ExtractorEntry {
                predicate: HasType("LTE_NAS_EMM_OTA_Incoming_Packet"),
                action: NasEmmIncoming,
                enabled_note: "Extractor enabled: LTE_NAS_EMM_OTA_Incoming_Packet",
            },
        ),
        (
            "nas_emm_ota_outgoing",
            ExtractorEntry {
                predicate: HasType("LTE_NAS_EMM_OTA_Outgoing_Packet"),
                action: NasEmmOutgoing,
                enabled_note: "Extractor enabled: LTE_NAS_EMM_OTA_Outgoing_Packet",
            },
        ),
        (
            "mac_rach_attempt",
            ExtractorEntry {
                predicate: HasType("LTE_MAC_Rach_Attempt"),
                action: MacRachAttempt,
                enabled_note: "Extractor enabled: LTE_MAC_Rach_Attempt",
            },
        ),
        (
            "mac_rach_trigger",
            ExtractorEntry {
                predicate: HasType("LTE_MAC_Rach_Trigger"),
                action: MacRachTrigger,
                enabled_note: "Extractor enabled: LTE_MAC_Rach_Trigger",
            },
        ),
        (
            "phy_pdsch_stat",
            ExtractorEntry {
                predicate: HasType("LTE_PHY_PDSCH_Stat_Indication"),
                action: PhyPdschStat,
                enabled_note: "Extractor enabled: LTE_PHY_PDSCH_Stat_Indication",
            },
        ),
        (
            "phy_pdsch",
            ExtractorEntry {
                predicate: HasType("LTE_PHY_PDSCH_Packet"),
                action: PhyPdsch,
                enabled_note: "Extractor enabled: LTE_PHY_PDSCH_Packet",
            },
        ),
        (
            "phy_serv_cell_meas",
            ExtractorEntry {
                predicate: HasType("LTE_PHY_Serv_Cell_Measurement"),
                action: PhyServCellMeas,
                enabled_note: "Extractor enabled: LTE_PHY_Serv_Cell_Measurement",
            },
        ),
        (
            "rlc_dl_am_all_pdu",
            ExtractorEntry {
                predicate: HasType("LTE_RLC_DL_AM_All_PDU"),
                action: RlcAmAllPdu { uplink: false },
                enabled_note: "Extractor enabled: LTE_RLC_DL_AM_All_PDU",
            },
        ),
        (
            "rlc_ul_am_all_pdu",
            ExtractorEntry {
                predicate: HasType("LTE_RLC_UL_AM_All_PDU"),
                action: RlcAmAllPdu { uplink: true },
                enabled_note: "Extractor enabled: LTE_RLC_UL_AM_All_PDU",
            },
        ),
        (
            "rlc_dl_config_log",
            ExtractorEntry {
                predicate: HasType("LTE_RLC_DL_Config_Log_Packet"),
                action: RlcConfigLog { uplink: false },
                enabled_note: "Extractor enabled: LTE_RLC_DL_Config_Log_Packet",
            },
        ),
        (
            "rlc_ul_config_log",
            ExtractorEntry {
                predicate: HasType("LTE_RLC_UL_Config_Log_Packet"),
                action: RlcConfigLog { uplink: true },
                enabled_note: "Extractor enabled: LTE_RLC_UL_Config_Log_Packet",
            },
        ),
        (
            "all_packet_type",
            ExtractorEntry {
                predicate: Always,
                action: PacketType,
                enabled_note: "Extractor enabled: ALL_PACKET_TYPE",
            },
        ),
    ])
});

pub struct ActionRegistry {
    entries: Vec<ConditionalAction>,
    ranges: Vec<(i64, i64)>,
    type_pattern: Option<Regex>,
}

impl ActionRegistry {
    /// Build the registry for the configured mode. Extract mode resolves
    /// each requested name against the catalog, warning about unknown ones.
    pub fn for_mode(config: &SieveConfig) -> Self {
        let mut entries = Vec::new();
        let mut ranges = Vec::new();
        let mut type_pattern = None;

        match &config.mode {
            Mode::Extract(names) => {
                for name in names {
                    match EXTRACTOR_TABLE.get(name.as_str()) {
                        Some(entry) => {
                            entries.push(ConditionalAction {
                                predicate: entry.predicate,
                                action: entry.action,
                            });
                            eprintln!("{}", entry.enabled_note);
                        }
                        None => {
                            eprintln!("Warning: encountered unknown extractor ({name})");
                        }
                    }
                }
            }
            Mode::Range(pairs) => {
                ranges = pairs.clone();
                entries.push(ConditionalAction {
                    predicate: Predicate::Always,
                    action: ActionKind::EchoWithinTimeRange,
                });
            }
            Mode::Filter(pattern) => {
                type_pattern = Some(pattern.clone());
                entries.push(ConditionalAction {
                    predicate: Predicate::Always,
                    action: ActionKind::EchoIfTypeMatch,
                });
            }
            Mode::Dedup => {
                entries.push(ConditionalAction {
                    predicate: Predicate::Always,
                    action: ActionKind::EchoIfNew,
                });
            }
            Mode::Reorder(_) => {
                entries.push(ConditionalAction {
                    predicate: Predicate::Always,
                    action: ActionKind::ReorderUpdate,
                });
            }
        }

        // The guard entry: always matches, schedules an empty task.
        entries.push(ConditionalAction {
            predicate: Predicate::Always,
            action: ActionKind::Sentinel,
        });

        ActionRegistry {
            entries,
            ranges,
            type_pattern,
        }
    }

    /// Walk the list and run the first matching action.
    pub fn dispatch(
        &self,
        tree: Element,
        job: Fragment,
        executor: &InOrderExecutor,
    ) -> Result<()> {
        for entry in &self.entries {
            if entry.predicate.matches(&tree)? {
                return self.run(entry.action, tree, job, executor);
            }
        }
        Err(SieveError::bug(
            "every predicate in the action list yielded false; the last one must always match",
        ))
    }

    fn run(
        &self,
        action: ActionKind,
        tree: Element,
        job: Fragment,
        executor: &InOrderExecutor,
    ) -> Result<()> {
        match action {
            ActionKind::RrcOta => rrc_ota::run(&tree, job, executor),
            ActionKind::ServCellInfo => serv_cell_info::run(&tree, job, executor),
            ActionKind::PdcpCipherData => pdcp::extract_pdu_sizes(&tree, job, executor),
            ActionKind::PdcpTracker => pdcp::track_last_data_packet(&tree, job, executor),
            ActionKind::NasEmmIncoming => nas_emm::incoming(&tree, job, executor),
            ActionKind::NasEmmOutgoing => nas_emm::outgoing(&tree, job, executor),
            ActionKind::MacRachAttempt => mac_rach::attempt(&tree, job, executor),
            ActionKind::MacRachTrigger => mac_rach::trigger(&tree, job, executor),
            ActionKind::PhyPdschStat => phy::pdsch_stat(&tree, job, executor),
            ActionKind::PhyPdsch => phy::pdsch(&tree, job, executor),
            ActionKind::PhyServCellMeas => phy::serv_cell_measurement(&tree, job, executor),
            ActionKind::RlcAmAllPdu { uplink } => rlc::am_all_pdu(&tree, job, uplink, executor),
            ActionKind::RlcConfigLog { uplink } => rlc::config_log(&tree, job, uplink, executor),
            ActionKind::PacketType => passthrough::packet_type(&tree, job, executor),
            ActionKind::EchoWithinTimeRange => {
                passthrough::echo_within_time_range(&tree, job, &self.ranges, executor)
            }
            ActionKind::EchoIfTypeMatch => match self.type_pattern.as_ref() {
                Some(pattern) => passthrough::echo_if_type_match(&tree, job, pattern, executor),
                None => Err(SieveError::bug(
                    "filter action dispatched without a compiled type pattern",
                )),
            },
            ActionKind::EchoIfNew => passthrough::echo_if_new(&tree, job, executor),
            ActionKind::ReorderUpdate => passthrough::reorder_update(&tree, job, executor),
            ActionKind::Sentinel => {
                executor.insert(job.seq, Box::new(|_| Ok(())));
                Ok(())
            }
        }
    }
}
