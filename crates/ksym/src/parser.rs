//! ISF loading for plain `.json` and LZMA-compressed `.json.xz` files.

use crate::error::{KsymError, KsymResult};
use crate::types::{IsfFile, KernelSymbols};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use xz2::read::XzDecoder;

/// Load a symbol file, decompressing it first when the name ends in `.xz`.
pub fn parse_isf_file(path: impl AsRef<Path>) -> KsymResult<KernelSymbols> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(KsymError::FileNotFound(path.display().to_string()));
    }

    let compressed = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("xz"))
        .unwrap_or(false);

    let file = File::open(path)
        .map_err(|e| KsymError::Io(format!("opening {}: {}", path.display(), e)))?;
    let mut buf = Vec::new();
    if compressed {
        XzDecoder::new(BufReader::new(file))
            .read_to_end(&mut buf)
            .map_err(|e| KsymError::Decompression(format!("{}: {}", path.display(), e)))?;
    } else {
        BufReader::new(file)
            .read_to_end(&mut buf)
            .map_err(|e| KsymError::Io(format!("reading {}: {}", path.display(), e)))?;
    }

    parse_isf_bytes(&buf)
}

/// Parse already-decompressed ISF JSON.
pub fn parse_isf_bytes(json: &[u8]) -> KsymResult<KernelSymbols> {
    let file: IsfFile =
        serde_json::from_slice(json).map_err(|e| KsymError::JsonParse(e.to_string()))?;
    resolve(file)
}

pub fn parse_isf_str(json: &str) -> KsymResult<KernelSymbols> {
    parse_isf_bytes(json.as_bytes())
}

fn resolve(file: IsfFile) -> KsymResult<KernelSymbols> {
    let pointer_size = file
        .base_types
        .get("pointer")
        .map(|bt| bt.size)
        .unwrap_or(8);
    if pointer_size != 4 && pointer_size != 8 {
        return Err(KsymError::UnsupportedPointerSize(pointer_size));
    }

    let producer = file.metadata.producer.as_ref().and_then(|p| {
        match (p.name.as_deref(), p.version.as_deref()) {
            (Some(name), Some(version)) => Some(format!("{} {}", name, version)),
            (Some(name), None) => Some(name.to_string()),
            _ => None,
        }
    });

    Ok(KernelSymbols {
        format: file.metadata.format,
        producer,
        user_types: file.user_types,
        symbols: file.symbols,
        pointer_size,
    })
}
