//! Project descriptor (`project.json`) parsing and reference resolution.
//!
//! The descriptor is deliberately kept as a loosely typed
//! [`serde_json::Value`]: PenguinMod projects carry extension-specific and
//! future top-level keys that must survive a round trip untouched, so the
//! only structure this module interprets is the part the transcoder needs,
//! namely the `targets` array and the `md5ext` asset references inside it
//! (plus top-level `customFonts`). Everything else is opaque payload.

use crate::error::{Error, Result};
use crate::registry;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One target's position in the project, captured at unpack time so the
/// sidecar can record the original ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetInfo {
    pub folder: String,
    pub name: String,
    #[serde(rename = "isStage")]
    pub is_stage: bool,
}

/// Provenance sidecar written next to the unpacked tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SidecarMetadata {
    pub original_file: String,
    pub target_order: Vec<TargetInfo>,
}

/// Parsed project descriptor.
#[derive(Debug, Clone)]
pub struct Descriptor {
    root: Value,
}

impl Descriptor {
    /// Parses descriptor bytes. The document must be a JSON object with a
    /// non-empty `targets` array; anything else cannot describe a project.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let root: Value = serde_json::from_slice(bytes)
            .map_err(|e| Error::Descriptor(format!("not valid JSON: {}", e)))?;
        if !root.is_object() {
            return Err(Error::Descriptor("top level is not an object".to_string()));
        }
        let targets = root
            .get("targets")
            .ok_or_else(|| Error::Descriptor("missing targets array".to_string()))?;
        match targets.as_array() {
            None => {
                return Err(Error::Descriptor("targets is not an array".to_string()));
            }
            Some(list) if list.is_empty() => {
                return Err(Error::Descriptor("targets array is empty".to_string()));
            }
            Some(_) => {}
        }
        Ok(Self { root })
    }

    pub fn as_value(&self) -> &Value {
        &self.root
    }

    /// All asset references in document order: per target, costumes then
    /// sounds, then top-level custom fonts. Shared assets are referenced
    /// by several targets; the first occurrence wins, later ones are
    /// dropped so the list maps one-to-one onto container entries.
    pub fn references(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut refs = Vec::new();
        let mut push = |value: &Value| {
            if let Some(md5ext) = value.get("md5ext").and_then(Value::as_str) {
                if seen.insert(md5ext.to_string()) {
                    refs.push(md5ext.to_string());
                }
            }
        };

        for target in self.targets() {
            for key in ["costumes", "sounds"] {
                if let Some(items) = target.get(key).and_then(Value::as_array) {
                    for item in items {
                        push(item);
                    }
                }
            }
        }
        if let Some(fonts) = self.root.get("customFonts").and_then(Value::as_array) {
            for font in fonts {
                push(font);
            }
        }
        refs
    }

    /// Checks that every reference resolves against the given entry names.
    /// Fails on the first dangling reference.
    pub fn verify_references<'a, I>(&self, names: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let present: std::collections::HashSet<&str> = names.into_iter().collect();
        for reference in self.references() {
            if !present.contains(reference.as_str()) {
                return Err(Error::BrokenReference { reference });
            }
        }
        Ok(())
    }

    /// Target order as stored in the descriptor, with filesystem-safe
    /// folder labels. The stage is always labelled `stage`.
    pub fn target_order(&self) -> Vec<TargetInfo> {
        self.targets()
            .iter()
            .enumerate()
            .map(|(idx, target)| {
                let name = target
                    .get("name")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("target_{}", idx));
                let is_stage = target
                    .get("isStage")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                let folder = if is_stage {
                    "stage".to_string()
                } else {
                    registry::folder_safe_name(&name)
                };
                TargetInfo {
                    folder,
                    name,
                    is_stage,
                }
            })
            .collect()
    }

    /// Human-editable form, written into the unpacked folder.
    pub fn to_pretty_bytes(&self) -> Vec<u8> {
        let mut bytes = serde_json::to_vec_pretty(&self.root).unwrap_or_default();
        bytes.push(b'\n');
        bytes
    }

    /// Compact form, written into containers.
    pub fn to_compact_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(&self.root).unwrap_or_default()
    }

    fn targets(&self) -> &[Value] {
        // parse() guarantees presence and shape
        self.root
            .get("targets")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
