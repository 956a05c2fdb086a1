//! Folder tree → container conversion.
//!
//! Repacking is strict where unpacking is tolerant: a dangling descriptor
//! reference or an illegal file name fails the whole job, because shipping
//! a broken container is worse than shipping no container. The output is
//! staged in a temp file next to the destination and only renamed into
//! place on full success, so a failed or cancelled repack never leaves a
//! partial archive behind.
//!
//! Entry ordering is deterministic: the descriptor goes first, then the
//! assets it references in descriptor document order, then any unreferenced
//! files in discovery (lexicographic) order.

use crate::converter::CancelToken;
use crate::descriptor::{Descriptor, SidecarMetadata};
use crate::error::{Error, Result};
use crate::registry::{self, EntryKind};
use crate::sink::{EventLevel, ProgressSink};
use log::debug;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

#[derive(Debug, Clone, Default)]
pub struct RepackOptions {
    pub cancel: CancelToken,
}

/// Outcome of a repack job.
#[derive(Debug, Default)]
pub struct RepackReport {
    /// Entry names in the order they were written to the container.
    pub entries: Vec<String>,
    pub referenced: usize,
    pub unreferenced: usize,
}

/// Repacks a folder tree into a container at `dest_container`.
///
/// The folder must hold a parseable descriptor whose references all
/// resolve to files in the folder; otherwise the job fails before the
/// destination path is touched.
pub fn repack(
    src_dir: &Path,
    dest_container: &Path,
    opts: &RepackOptions,
    sink: &dyn ProgressSink,
) -> Result<RepackReport> {
    sink.event(
        EventLevel::Info,
        &format!(
            "Repacking {} into {}",
            src_dir.display(),
            dest_container.display()
        ),
    );

    if !src_dir.is_dir() {
        let err = Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("source folder does not exist: {}", src_dir.display()),
        ));
        sink.event(EventLevel::Fatal, &err.to_string());
        return Err(err);
    }

    let descriptor_path = src_dir.join(registry::DESCRIPTOR_NAME);
    let descriptor_bytes = match fs::read(&descriptor_path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            sink.event(EventLevel::Fatal, "project.json not found in source folder");
            return Err(Error::MissingDescriptor);
        }
        Err(err) => {
            sink.event(EventLevel::Fatal, &err.to_string());
            return Err(err.into());
        }
    };
    let descriptor = match Descriptor::parse(&descriptor_bytes) {
        Ok(descriptor) => descriptor,
        Err(err) => {
            sink.event(EventLevel::Fatal, &err.to_string());
            return Err(err);
        }
    };

    read_sidecar(src_dir, &descriptor, sink);

    // Discovery pass: regular files only, lexicographic order, descriptor
    // and hidden bookkeeping files excluded. Name rules are fatal here;
    // an entry we cannot faithfully store must not be silently dropped.
    let mut discovered: Vec<String> = Vec::new();
    for dirent in WalkDir::new(src_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let dirent = dirent.map_err(|e| {
            Error::Io(std::io::Error::other(format!(
                "cannot walk source folder: {}",
                e
            )))
        })?;
        let name = dirent.file_name().to_string_lossy().into_owned();
        if dirent.file_type().is_dir() {
            sink.event(
                EventLevel::Warn,
                &format!("Ignoring subdirectory {} (flat layout)", name),
            );
            continue;
        }
        if !dirent.file_type().is_file() {
            continue;
        }
        if name == registry::DESCRIPTOR_NAME || registry::classify(&name) == EntryKind::Metadata {
            continue;
        }
        if let Err(err) = registry::validate_name(&name) {
            sink.event(EventLevel::Fatal, &err.to_string());
            return Err(err);
        }
        if !registry::is_md5ext(&name) {
            sink.event(
                EventLevel::Note,
                &format!("Asset {} does not follow the content-hash naming convention", name),
            );
        }
        discovered.push(name);
    }

    // Referential integrity is a precondition for the whole job.
    let references = descriptor.references();
    if let Err(err) = descriptor.verify_references(discovered.iter().map(String::as_str)) {
        sink.event(EventLevel::Fatal, &err.to_string());
        return Err(err);
    }

    // Descriptor order wins for referenced assets; everything else keeps
    // discovery order.
    let referenced: std::collections::HashSet<&str> =
        references.iter().map(String::as_str).collect();
    let mut ordered: Vec<String> = Vec::with_capacity(discovered.len() + 1);
    ordered.push(registry::DESCRIPTOR_NAME.to_string());
    ordered.extend(references.iter().cloned());
    ordered.extend(
        discovered
            .iter()
            .filter(|name| !referenced.contains(name.as_str()))
            .cloned(),
    );

    let report = RepackReport {
        entries: ordered.clone(),
        referenced: references.len(),
        unreferenced: discovered.len() - references.len(),
    };

    sink.event(
        EventLevel::Info,
        &format!(
            "Packing {} entries ({} referenced assets, {} unreferenced)",
            ordered.len(),
            report.referenced,
            report.unreferenced
        ),
    );

    let parent = match dest_container.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;
    let tmp = NamedTempFile::new_in(parent)?;

    {
        let mut writer = ZipWriter::new(tmp.as_file());

        let total = ordered.len();
        for (index, name) in ordered.iter().enumerate() {
            if opts.cancel.is_cancelled() {
                sink.event(EventLevel::Warn, "Cancellation requested, stopping");
                return Err(Error::Cancelled);
            }

            sink.progress(index, total, name);

            let content = if name == registry::DESCRIPTOR_NAME {
                descriptor.to_compact_bytes()
            } else {
                fs::read(src_dir.join(name))?
            };

            // Fixed timestamps keep repacks of the same tree
            // byte-identical.
            let options = SimpleFileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .compression_level(Some(6))
                .last_modified_time(zip::DateTime::default());
            writer
                .start_file(name.as_str(), options)
                .map_err(zip_write_error)?;
            writer.write_all(&content)?;
            debug!("added {}", name);

            sink.progress(index + 1, total, name);
        }

        writer.finish().map_err(zip_write_error)?;
    }

    tmp.persist(dest_container).map_err(|e| Error::Io(e.error))?;

    sink.event(
        EventLevel::Info,
        &format!("Created container {}", dest_container.display()),
    );

    Ok(report)
}

/// The sidecar is provenance only; the descriptor is the source of truth.
/// A missing or unreadable sidecar is never an error.
fn read_sidecar(src_dir: &Path, descriptor: &Descriptor, sink: &dyn ProgressSink) {
    let path = src_dir.join(registry::METADATA_NAME);
    if !path.exists() {
        return;
    }
    match fs::read(&path).map_err(|e| e.to_string()).and_then(|bytes| {
        serde_json::from_slice::<SidecarMetadata>(&bytes).map_err(|e| e.to_string())
    }) {
        Ok(sidecar) => {
            sink.event(
                EventLevel::Info,
                &format!("Tree was unpacked from {}", sidecar.original_file),
            );
            if sidecar.target_order != descriptor.target_order() {
                sink.event(
                    EventLevel::Warn,
                    "Target order in sidecar differs from descriptor; the descriptor wins",
                );
            }
        }
        Err(err) => {
            sink.event(
                EventLevel::Warn,
                &format!("Could not read sidecar metadata: {}", err),
            );
        }
    }
}

fn zip_write_error(err: zip::result::ZipError) -> Error {
    match err {
        zip::result::ZipError::Io(io) => Error::Io(io),
        other => Error::Io(std::io::Error::other(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::Container;
    use crate::sink::NullSink;
    use serde_json::json;

    fn write_descriptor(dir: &Path, value: serde_json::Value) {
        fs::write(dir.join("project.json"), value.to_string()).unwrap();
    }

    fn stage_with_refs(refs: &[&str]) -> serde_json::Value {
        json!({
            "targets": [{
                "isStage": true,
                "name": "Stage",
                "costumes": refs.iter().map(|r| json!({"md5ext": r})).collect::<Vec<_>>(),
                "sounds": []
            }]
        })
    }

    #[test]
    fn descriptor_order_wins_over_discovery_order() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("tree");
        fs::create_dir(&src).unwrap();
        // discovery order would be aaaa..., bbbb..., cccc...
        for name in [
            "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa.png",
            "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb.png",
            "cccccccccccccccccccccccccccccccc.png",
        ] {
            fs::write(src.join(name), name.as_bytes()).unwrap();
        }
        write_descriptor(
            &src,
            stage_with_refs(&[
                "cccccccccccccccccccccccccccccccc.png",
                "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa.png",
            ]),
        );

        let dest = dir.path().join("out.pmp");
        let report = repack(&src, &dest, &RepackOptions::default(), &NullSink).unwrap();
        assert_eq!(report.referenced, 2);
        assert_eq!(report.unreferenced, 1);

        let container = Container::open(&dest).unwrap();
        assert_eq!(
            container.entry_names(),
            [
                "project.json",
                "cccccccccccccccccccccccccccccccc.png",
                "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa.png",
                "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb.png",
            ]
        );
    }

    #[test]
    fn discovery_order_without_descriptor_references() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("tree");
        fs::create_dir(&src).unwrap();
        for name in [
            "cccccccccccccccccccccccccccccccc.png",
            "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa.png",
        ] {
            fs::write(src.join(name), name.as_bytes()).unwrap();
        }
        write_descriptor(&src, stage_with_refs(&[]));

        let dest = dir.path().join("out.pmp");
        repack(&src, &dest, &RepackOptions::default(), &NullSink).unwrap();

        let container = Container::open(&dest).unwrap();
        assert_eq!(
            container.entry_names(),
            [
                "project.json",
                "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa.png",
                "cccccccccccccccccccccccccccccccc.png",
            ]
        );
    }

    #[test]
    fn broken_reference_fails_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("tree");
        fs::create_dir(&src).unwrap();
        write_descriptor(
            &src,
            stage_with_refs(&["ffffffffffffffffffffffffffffffff.png"]),
        );

        let dest = dir.path().join("out.pmp");
        let err = repack(&src, &dest, &RepackOptions::default(), &NullSink).unwrap_err();
        match err {
            Error::BrokenReference { reference } => {
                assert_eq!(reference, "ffffffffffffffffffffffffffffffff.png")
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!dest.exists());
    }

    #[test]
    fn illegal_file_name_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("tree");
        fs::create_dir(&src).unwrap();
        write_descriptor(&src, stage_with_refs(&[]));
        // backslash is legal on unix filesystems but illegal in the format
        fs::write(src.join("bad\\name.png"), b"x").unwrap();

        let dest = dir.path().join("out.pmp");
        let err = repack(&src, &dest, &RepackOptions::default(), &NullSink).unwrap_err();
        assert!(matches!(err, Error::Name { .. }));
        assert!(!dest.exists());
    }

    #[test]
    fn sidecar_and_dotfiles_stay_out_of_the_container() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("tree");
        fs::create_dir(&src).unwrap();
        write_descriptor(&src, stage_with_refs(&[]));
        fs::write(src.join(".pmp_metadata.json"), b"{}").unwrap();
        fs::write(src.join(".DS_Store"), b"junk").unwrap();

        let dest = dir.path().join("out.pmp");
        let report = repack(&src, &dest, &RepackOptions::default(), &NullSink).unwrap();
        assert_eq!(report.entries, ["project.json"]);
    }

    #[test]
    fn missing_descriptor_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("tree");
        fs::create_dir(&src).unwrap();
        fs::write(src.join("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa.png"), b"x").unwrap();

        let dest = dir.path().join("out.pmp");
        let err = repack(&src, &dest, &RepackOptions::default(), &NullSink).unwrap_err();
        assert!(matches!(err, Error::MissingDescriptor));
    }

    #[test]
    fn repacking_twice_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("tree");
        fs::create_dir(&src).unwrap();
        fs::write(
            src.join("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa.png"),
            b"payload",
        )
        .unwrap();
        write_descriptor(
            &src,
            stage_with_refs(&["aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa.png"]),
        );

        let first = dir.path().join("first.pmp");
        let second = dir.path().join("second.pmp");
        repack(&src, &first, &RepackOptions::default(), &NullSink).unwrap();
        repack(&src, &second, &RepackOptions::default(), &NullSink).unwrap();
        assert_eq!(fs::read(first).unwrap(), fs::read(second).unwrap());
    }
}
