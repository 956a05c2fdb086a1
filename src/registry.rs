//! Entry kinds and naming rules shared by both conversion directions.
//!
//! A `.pmp` container stores a flat namespace: one `project.json`
//! descriptor plus assets conventionally named `<md5>.<ext>`. Everything
//! here is a pure function over names, no I/O, so the unpacker and
//! repacker apply identical rules.

use crate::error::{Error, Result};

/// Fixed name of the descriptor entry inside a container and of the
/// serialized descriptor file inside a folder tree.
pub const DESCRIPTOR_NAME: &str = "project.json";

/// Sidecar written next to unpacked assets, recording provenance for a
/// later repack. Hidden (leading dot) so it is never collected as an asset.
pub const METADATA_NAME: &str = ".pmp_metadata.json";

/// The separator character the format reserves internally. ZIP uses it to
/// spell directories, and the `.pmp` namespace is flat, so an entry name
/// carrying one would silently turn into a subdirectory on unpack.
pub const RESERVED_SEPARATOR: char = '/';

/// Canonical entry kinds inside a container or folder tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// The project descriptor (`project.json`).
    Descriptor,
    /// A binary or text resource referenced by the descriptor.
    Asset,
    /// Hidden bookkeeping files (leading dot). Materialized on unpack,
    /// never collected back into a container.
    Metadata,
}

/// Classifies an entry name. Classification is by name only; content is
/// never inspected.
pub fn classify(name: &str) -> EntryKind {
    if name == DESCRIPTOR_NAME {
        EntryKind::Descriptor
    } else if name.starts_with('.') {
        EntryKind::Metadata
    } else {
        EntryKind::Asset
    }
}

/// Validates an entry name against the format's naming rules and the rules
/// of the target filesystems. Violations are rejected, never mangled.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::Name {
            name: name.to_string(),
            reason: "empty name",
        });
    }
    if name == "." || name == ".." {
        return Err(Error::Name {
            name: name.to_string(),
            reason: "relative path component",
        });
    }
    if name.contains(RESERVED_SEPARATOR) {
        return Err(Error::Name {
            name: name.to_string(),
            reason: "contains the reserved separator '/'",
        });
    }
    if name.contains('\\') {
        return Err(Error::Name {
            name: name.to_string(),
            reason: "contains '\\'",
        });
    }
    if name.contains('\0') {
        return Err(Error::Name {
            name: name.to_string(),
            reason: "contains NUL",
        });
    }
    Ok(())
}

/// Whether an asset name follows the content-hash convention:
/// 32 lowercase hex characters, a dot, and a non-empty extension.
/// Deviation is worth a note, not an error: the format only relies on the
/// convention, it does not enforce it.
pub fn is_md5ext(name: &str) -> bool {
    let Some((stem, ext)) = name.split_once('.') else {
        return false;
    };
    stem.len() == 32
        && stem.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
        && !ext.is_empty()
}

/// Returns the names that occur more than once, first occurrence order.
pub fn duplicate_names<'a, I>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = std::collections::HashSet::new();
    let mut duplicates = Vec::new();
    for name in names {
        if !seen.insert(name) && !duplicates.iter().any(|d| d == name) {
            duplicates.push(name.to_string());
        }
    }
    duplicates
}

/// Converts a target (sprite) name to a filesystem-safe label for the
/// sidecar's target order. `//` collapses to `_` to keep grouping info,
/// unsafe characters are stripped, trailing dots and spaces trimmed.
pub fn folder_safe_name(name: &str) -> String {
    let collapsed = name.replace("//", "_");
    let stripped: String = collapsed
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*'))
        .collect();
    let trimmed = stripped.trim_matches(|c| c == '.' || c == ' ');
    if trimmed.is_empty() {
        "sprite".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_by_name() {
        assert_eq!(classify("project.json"), EntryKind::Descriptor);
        assert_eq!(classify(".pmp_metadata.json"), EntryKind::Metadata);
        assert_eq!(
            classify("83a9787d4cb6f3b7632b4ddfebf74367.wav"),
            EntryKind::Asset
        );
        // only the exact descriptor name counts
        assert_eq!(classify("project.json.bak"), EntryKind::Asset);
    }

    #[test]
    fn reserved_separator_is_rejected() {
        let err = validate_name("sprites/cat.png").unwrap_err();
        assert!(matches!(err, Error::Name { .. }));
        assert!(validate_name("cat.png").is_ok());
    }

    #[test]
    fn hostile_names_are_rejected() {
        assert!(validate_name("").is_err());
        assert!(validate_name(".").is_err());
        assert!(validate_name("..").is_err());
        assert!(validate_name("a\\b.png").is_err());
        assert!(validate_name("a\0b").is_err());
        // a plain dotfile is a valid name, just classified as metadata
        assert!(validate_name(".pmp_metadata.json").is_ok());
    }

    #[test]
    fn md5ext_convention() {
        assert!(is_md5ext("83a9787d4cb6f3b7632b4ddfebf74367.wav"));
        assert!(is_md5ext("cd21514d0531fdffb22204e0ec5ed84a.svg"));
        assert!(!is_md5ext("83a9787d4cb6f3b7632b4ddfebf74367"));
        assert!(!is_md5ext("83A9787D4CB6F3B7632B4DDFEBF74367.wav"));
        assert!(!is_md5ext("short.png"));
        assert!(!is_md5ext("83a9787d4cb6f3b7632b4ddfebf74367."));
    }

    #[test]
    fn duplicates_reported_once() {
        let names = ["a.png", "b.png", "a.png", "a.png", "c.png", "b.png"];
        assert_eq!(
            duplicate_names(names),
            vec!["a.png".to_string(), "b.png".to_string()]
        );
        assert!(duplicate_names(["a.png", "b.png"]).is_empty());
    }

    #[test]
    fn folder_safe_names() {
        assert_eq!(folder_safe_name("Sprite1"), "Sprite1");
        assert_eq!(folder_safe_name("group//cat"), "group_cat");
        assert_eq!(folder_safe_name("what?!*"), "what!");
        assert_eq!(folder_safe_name("ends with dot."), "ends with dot");
        assert_eq!(folder_safe_name("???"), "sprite");
        assert_eq!(folder_safe_name(""), "sprite");
    }
}
