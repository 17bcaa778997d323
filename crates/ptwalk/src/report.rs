//! Rendering an outcome as the fixed three-field record.

use crate::process::Pid;
use crate::walk::{PhysicalAddress, TranslationOutcome, VirtualAddress};
use clap::ValueEnum;
use serde::{Serialize, Serializer};
use std::fmt;

const PREFIX: &str = "[ptwalk]";
const NOT_AVAILABLE: &str = "NA";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// One translation result. At most one of the two value fields is set;
/// both are empty for an unresolvable address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Record {
    pub pid: Pid,
    #[serde(serialize_with = "serialize_hex")]
    pub virtual_address: VirtualAddress,
    #[serde(serialize_with = "serialize_optional_hex")]
    pub physical_address: Option<PhysicalAddress>,
    #[serde(serialize_with = "serialize_optional_hex")]
    pub swap_identifier: Option<u64>,
}

fn serialize_hex<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("{:#x}", value))
}

fn serialize_optional_hex<S: Serializer>(value: &Option<u64>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(v) => serialize_hex(v, serializer),
        None => serializer.serialize_none(),
    }
}

pub fn report(pid: Pid, vaddr: VirtualAddress, outcome: TranslationOutcome) -> Record {
    Record {
        pid,
        virtual_address: vaddr,
        physical_address: outcome.physical_address(),
        swap_identifier: outcome.swap_id(),
    }
}

impl Record {
    pub fn render(&self, format: OutputFormat) -> serde_json::Result<String> {
        match format {
            OutputFormat::Text => Ok(self.to_string()),
            OutputFormat::Json => serde_json::to_string(self),
        }
    }
}

struct HexOrNa(Option<u64>);

impl fmt::Display for HexOrNa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(v) => write!(f, "{:x}", v),
            None => f.write_str(NOT_AVAILABLE),
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} PID [{}]: virtual address [{:x}]  physical address [{}] swap identifier [{}]",
            PREFIX,
            self.pid,
            self.virtual_address,
            HexOrNa(self.physical_address),
            HexOrNa(self.swap_identifier)
        )
    }
}
