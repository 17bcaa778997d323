//! Command-line arguments and the image configuration file.
//!
//! ```json
//! {
//!   "image": "memory.raw",
//!   "paging": "four-level",
//!   "kernel_dtb": "0x1ad000",
//!   "symbols": "linux-6.1.json.xz",
//!   "kaslr_shift": "0x1e000000",
//!   "processes": [{ "pid": 1, "pgd": "0x10a000" }, { "pid": 2 }]
//! }
//! ```
//!
//! `processes` selects the static process table; without it, `symbols`
//! and `kernel_dtb` select the kernel task-list resolver.

use crate::memory::error::MemError;
use crate::memory::kernel::KernelMemory;
use crate::memory::traits::MemoryLayer;
use crate::process::{Pid, ProcessResolver, ProcessTable, TaskListResolver};
use crate::report::OutputFormat;
use crate::walk::PagingMode;
use clap::Parser;
use ksym::KsymError;
use serde::Deserialize;
use std::num::ParseIntError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "ptwalk", version, about = "Classify a process virtual address as resident, swapped out or unresolvable")]
pub struct Args {
    /// Image configuration file (JSON)
    #[arg(long)]
    pub config: PathBuf,

    /// Process identifier
    #[arg(long, allow_negative_numbers = true)]
    pub pid: i64,

    /// Virtual address, hex (0x...) or decimal
    #[arg(long, value_parser = parse_address)]
    pub addr: u64,

    /// Memory image, overriding the config's "image"
    #[arg(long)]
    pub image: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

/// Parse `0x`-prefixed hex or decimal.
pub fn parse_u64(s: &str) -> Result<u64, ParseIntError> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)
    } else {
        s.parse::<u64>()
    }
}

fn parse_address(s: &str) -> Result<u64, String> {
    parse_u64(s).map_err(|e| format!("invalid address '{}': {}", s, e))
}

/// Deserialize an optional u64 from either a JSON number or a string
/// (hex like "0x1ad000" or decimal like "1757184").
fn deserialize_optional_u64_hex<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de;

    let val: Option<serde_json::Value> = Option::deserialize(deserializer)?;
    match val {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Number(n)) => n
            .as_u64()
            .map(Some)
            .ok_or_else(|| de::Error::custom("expected unsigned 64-bit integer")),
        Some(serde_json::Value::String(s)) => parse_u64(&s).map(Some).map_err(de::Error::custom),
        _ => Err(de::Error::custom("expected number or hex string")),
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("no memory image: pass --image or set \"image\" in the config")]
    MissingImage,

    #[error("no process source: set \"processes\", or \"symbols\" together with \"kernel_dtb\"")]
    NoProcessSource,

    #[error(transparent)]
    Memory(#[from] MemError),

    #[error("symbols: {0}")]
    Symbols(#[from] KsymError),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessEntry {
    pub pid: Pid,
    /// Physical address of the top-level table; absent for kernel threads.
    #[serde(default, deserialize_with = "deserialize_optional_u64_hex")]
    pub pgd: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImageConfig {
    #[serde(default)]
    pub image: Option<PathBuf>,
    #[serde(default)]
    pub paging: PagingMode,
    #[serde(default, deserialize_with = "deserialize_optional_u64_hex")]
    pub kernel_dtb: Option<u64>,
    #[serde(default)]
    pub symbols: Option<PathBuf>,
    #[serde(default, deserialize_with = "deserialize_optional_u64_hex")]
    pub kaslr_shift: Option<u64>,
    #[serde(default)]
    pub processes: Option<Vec<ProcessEntry>>,
}

impl ImageConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// The image to open: the command-line override, else the config's.
    pub fn image_path(&self, cli_override: Option<&Path>) -> Result<PathBuf, ConfigError> {
        cli_override
            .map(Path::to_path_buf)
            .or_else(|| self.image.clone())
            .ok_or(ConfigError::MissingImage)
    }

    pub fn build_resolver(
        &self,
        physical: Arc<dyn MemoryLayer>,
    ) -> Result<Box<dyn ProcessResolver>, ConfigError> {
        if let Some(processes) = &self.processes {
            info!("Using static process table ({} entries)", processes.len());
            let entries = processes.iter().map(|p| (p.pid, p.pgd));
            return Ok(Box::new(ProcessTable::from_entries(physical, entries)));
        }

        match (&self.symbols, self.kernel_dtb) {
            (Some(symbols), Some(dtb)) => {
                let symbols = ksym::parse_isf_file(symbols)?;
                info!(
                    "Using kernel task list (ISF {} from {}, DTB {:#x})",
                    symbols.format(),
                    symbols.producer().unwrap_or("unknown producer"),
                    dtb
                );
                let kernel = KernelMemory::new(physical, self.paging, dtb);
                let resolver = TaskListResolver::new(symbols, kernel, self.kaslr_shift.unwrap_or(0))?;
                info!("Walking tasks from init_task at {:#x}", resolver.init_task());
                Ok(Box::new(resolver))
            }
            _ => Err(ConfigError::NoProcessSource),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::image::MemoryImage;
    use crate::memory::layers::BufferLayer;
    use crate::process::ResolveError;
    use crate::request::{self, TranslationRequest};
    use crate::walk::fixtures::HierarchyBuilder;
    use crate::walk::{PagingGeometry, TranslationWalker};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn physical() -> Arc<dyn MemoryLayer> {
        Arc::new(BufferLayer::zeroed("physical", 0x4000))
    }

    #[test]
    fn test_parse_u64() {
        assert_eq!(parse_u64("0x1ABC").unwrap(), 0x1abc);
        assert_eq!(parse_u64("0X10").unwrap(), 16);
        assert_eq!(parse_u64(" 4096 ").unwrap(), 4096);
        assert!(parse_u64("0xzz").is_err());
        assert!(parse_u64("-1").is_err());
    }

    #[test]
    fn test_args() {
        let args = Args::try_parse_from([
            "ptwalk", "--config", "c.json", "--pid", "-3", "--addr", "0x7fff1000", "--format", "json",
        ])
        .unwrap();
        assert_eq!(args.pid, -3);
        assert_eq!(args.addr, 0x7fff_1000);
        assert_eq!(args.format, OutputFormat::Json);
        assert!(args.image.is_none());

        let args = Args::try_parse_from(["ptwalk", "--config", "c.json", "--pid", "1", "--addr", "4096"]).unwrap();
        assert_eq!(args.addr, 4096);
        assert_eq!(args.format, OutputFormat::Text);

        assert!(Args::try_parse_from(["ptwalk", "--config", "c", "--pid", "1", "--addr", "nope"]).is_err());
    }

    #[test]
    fn test_static_table_config() {
        let config: ImageConfig = serde_json::from_str(
            r#"{
                "image": "memory.raw",
                "paging": "five-level",
                "processes": [{ "pid": 1, "pgd": "0x1000" }, { "pid": 2, "pgd": null }, { "pid": 3, "pgd": 8192 }]
            }"#,
        )
        .unwrap();
        assert_eq!(config.paging, PagingMode::FiveLevel);
        assert_eq!(config.image_path(None).unwrap(), PathBuf::from("memory.raw"));
        assert_eq!(
            config.image_path(Some(Path::new("other.raw"))).unwrap(),
            PathBuf::from("other.raw")
        );

        let resolver = config.build_resolver(physical()).unwrap();
        assert_eq!(resolver.resolve(1).unwrap().root(), 0x1000);
        assert_eq!(resolver.resolve(3).unwrap().root(), 0x2000);
        assert_eq!(resolver.resolve(2).unwrap_err(), ResolveError::NoAddressSpace(2));
    }

    #[test]
    fn test_missing_sources() {
        let config = ImageConfig::default();
        assert_eq!(config.paging, PagingMode::FourLevel);
        assert!(matches!(config.image_path(None), Err(ConfigError::MissingImage)));
        assert!(matches!(config.build_resolver(physical()), Err(ConfigError::NoProcessSource)));

        let config: ImageConfig = serde_json::from_str(r#"{ "symbols": "linux.json" }"#).unwrap();
        assert!(matches!(config.build_resolver(physical()), Err(ConfigError::NoProcessSource)));

        let config: ImageConfig =
            serde_json::from_str(r#"{ "symbols": "/nonexistent/linux.json", "kernel_dtb": "0x1000" }"#).unwrap();
        assert!(matches!(config.build_resolver(physical()), Err(ConfigError::Symbols(_))));
    }

    #[test]
    fn test_rejects_bad_config() {
        assert!(serde_json::from_str::<ImageConfig>(r#"{ "kernel_dtb": "0xnope" }"#).is_err());
        assert!(serde_json::from_str::<ImageConfig>(r#"{ "paging": "three-level" }"#).is_err());
        assert!(serde_json::from_str::<ImageConfig>(r#"{ "dtb": 1 }"#).is_err());
    }

    #[test]
    fn test_load() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(br#"{ "kernel_dtb": 4096, "kaslr_shift": "0x200000" }"#).unwrap();
        let config = ImageConfig::load(file.path()).unwrap();
        assert_eq!(config.kernel_dtb, Some(0x1000));
        assert_eq!(config.kaslr_shift, Some(0x20_0000));

        assert!(matches!(
            ImageConfig::load("/nonexistent/ptwalk.json"),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn test_config_to_record() {
        let layer = HierarchyBuilder::new(PagingGeometry::x86_64_four_level())
            .map_frame(0x1abc, 0x10)
            .into_layer();
        let mut image_file = NamedTempFile::new().unwrap();
        image_file.write_all(layer.bytes()).unwrap();
        image_file.flush().unwrap();

        let config_json = serde_json::json!({
            "image": image_file.path(),
            "paging": "four-level",
            "processes": [{ "pid": 42, "pgd": "0x1000" }]
        });
        let mut config_file = NamedTempFile::new().unwrap();
        config_file.write_all(config_json.to_string().as_bytes()).unwrap();
        config_file.flush().unwrap();

        let config = ImageConfig::load(config_file.path()).unwrap();
        let image = MemoryImage::open(config.image_path(None).unwrap()).unwrap();
        let resolver = config.build_resolver(image.physical_layer()).unwrap();
        let walker = TranslationWalker::for_mode(config.paging);

        let record = request::run(&TranslationRequest::new(42, 0x1abc), resolver.as_ref(), &walker).unwrap();
        assert_eq!(record.pid, 42);
        assert_eq!(record.physical_address, Some(0x10abc));
        assert_eq!(record.swap_identifier, None);

        let record = request::run(&TranslationRequest::new(7, 0x1abc), resolver.as_ref(), &walker).unwrap();
        assert_eq!(record.physical_address, None);
        assert_eq!(record.swap_identifier, None);
    }
}
