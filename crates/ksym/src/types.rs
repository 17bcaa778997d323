//! ISF document layout and the resolved kernel symbol table.
//!
//! Only the parts of a dwarf2json-produced Linux ISF that structure reading
//! needs are modelled: pointer width, user type sizes and field offsets, and
//! symbol addresses. Unknown keys are ignored.

use crate::error::{KsymError, KsymResult};
use serde::Deserialize;
use std::collections::HashMap;

/// Top-level ISF document.
#[derive(Debug, Deserialize)]
pub struct IsfFile {
    pub metadata: Metadata,
    #[serde(default)]
    pub base_types: HashMap<String, BaseType>,
    #[serde(default)]
    pub user_types: HashMap<String, UserType>,
    #[serde(default)]
    pub symbols: HashMap<String, Symbol>,
}

#[derive(Debug, Deserialize)]
pub struct Metadata {
    pub format: String,
    #[serde(default)]
    pub producer: Option<Producer>,
}

#[derive(Debug, Deserialize)]
pub struct Producer {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

/// A primitive type. Only `size` matters here (for `pointer`).
#[derive(Debug, Clone, Deserialize)]
pub struct BaseType {
    pub size: usize,
    #[serde(default)]
    pub signed: bool,
    #[serde(default)]
    pub kind: String,
}

/// A struct or union.
#[derive(Debug, Clone, Deserialize)]
pub struct UserType {
    pub size: usize,
    #[serde(default)]
    pub fields: HashMap<String, FieldDef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FieldDef {
    pub offset: usize,
    #[serde(rename = "type")]
    pub type_info: FieldType,
}

/// Outer type descriptor of a field; nested subtypes are not needed.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldType {
    pub kind: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Symbol {
    pub address: u64,
}

/// Resolved symbol table for one kernel build.
#[derive(Debug)]
pub struct KernelSymbols {
    pub(crate) format: String,
    pub(crate) producer: Option<String>,
    pub(crate) user_types: HashMap<String, UserType>,
    pub(crate) symbols: HashMap<String, Symbol>,
    pub(crate) pointer_size: usize,
}

impl KernelSymbols {
    /// ISF format version string.
    pub fn format(&self) -> &str {
        &self.format
    }

    /// `name version` of the tool that produced the file, when recorded.
    pub fn producer(&self) -> Option<&str> {
        self.producer.as_deref()
    }

    /// Width of a kernel pointer in bytes (4 or 8).
    pub fn pointer_size(&self) -> usize {
        self.pointer_size
    }

    pub fn symbol_address(&self, name: &str) -> Option<u64> {
        self.symbols.get(name).map(|s| s.address)
    }

    pub fn has_type(&self, name: &str) -> bool {
        self.user_types.contains_key(name)
    }

    pub fn field_offset(&self, type_name: &str, field: &str) -> Option<usize> {
        self.user_types
            .get(type_name)?
            .fields
            .get(field)
            .map(|f| f.offset)
    }

    pub fn require_symbol(&self, name: &str) -> KsymResult<u64> {
        self.symbol_address(name)
            .ok_or_else(|| KsymError::SymbolNotFound(name.to_string()))
    }

    pub fn require_type(&self, name: &str) -> KsymResult<()> {
        if self.has_type(name) {
            Ok(())
        } else {
            Err(KsymError::TypeNotFound(name.to_string()))
        }
    }

    pub fn require_field(&self, type_name: &str, field: &str) -> KsymResult<usize> {
        self.require_type(type_name)?;
        self.field_offset(type_name, field)
            .ok_or_else(|| KsymError::FieldNotFound {
                type_name: type_name.to_string(),
                field: field.to_string(),
            })
    }
}
