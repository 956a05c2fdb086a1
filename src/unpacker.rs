//! Container → folder tree conversion.
//!
//! Unpacking is salvage-oriented: one unreadable or ill-named asset must
//! not sink an otherwise healthy archive, so per-entry failures are
//! recorded in the report and skipped. Only the descriptor is load-bearing
//! for the whole job. Every entry is written through a temp file in the
//! destination directory and persisted by rename, so an interrupted run
//! leaves fully committed files or nothing, never a half-written asset.

use crate::container::Container;
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

#[derive(Debug, Clone, Default)]
pub struct UnpackOptions {
    /// Replace conflicting destination files instead of failing.
    pub overwrite: bool,
    pub cancel: CancelToken,
}

/// One entry that could not be unpacked, with the reason it was skipped.
#[derive(Debug, Clone)]
pub struct SkippedEntry {
    pub name: String,
    pub reason: String,
}

/// Outcome of an unpack job. Successes and failures are both enumerated;
/// nothing is swallowed silently.
#[derive(Debug, Default)]
pub struct UnpackReport {
    pub written: Vec<String>,
    pub skipped: Vec<SkippedEntry>,
}

impl UnpackReport {
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Unpacks a container into `dest_dir`.
///
/// The destination is created if missing. Re-running over an identical
/// tree is a no-op; a conflicting existing file fails the job with
/// [`Error::DestinationConflict`] unless `opts.overwrite` is set.
pub fn unpack(
    container_path: &Path,
    dest_dir: &Path,
    opts: &UnpackOptions,
    sink: &dyn ProgressSink,
) -> Result<UnpackReport> {
    sink.event(
        EventLevel::Info,
        &format!(
            "Unpacking {} into {}",
            container_path.display(),
            dest_dir.display()
        ),
    );

    let mut container = match Container::open(container_path) {
        Ok(container) => container,
        Err(err) => {
            sink.event(EventLevel::Fatal, &err.to_string());
            return Err(err);
        }
    };

    let descriptor = match container
        .descriptor_bytes()
        .and_then(|bytes| Descriptor::parse(&bytes))
    {
        Ok(descriptor) => descriptor,
        Err(err) => {
            sink.event(EventLevel::Fatal, &err.to_string());
            return Err(err);
        }
    };

    fs::create_dir_all(dest_dir)?;

    let total = container.len();
    sink.event(EventLevel::Info, &format!("Container has {} entries", total));

    let mut report = UnpackReport::default();

    for (index, (name, result)) in container.entries().enumerate() {
        if opts.cancel.is_cancelled() {
            sink.event(EventLevel::Warn, "Cancellation requested, stopping");
            return Err(Error::Cancelled);
        }

        sink.progress(index, total, &name);

        if let Err(err) = registry::validate_name(&name) {
            sink.event(EventLevel::Error, &err.to_string());
            report.skipped.push(SkippedEntry {
                name,
                reason: err.to_string(),
            });
            continue;
        }

        let entry = match result {
            Ok(entry) => entry,
            Err(err) => {
                // The descriptor was already read successfully above, so a
                // failure on it here means the archive changed under us.
                if registry::classify(&name) == EntryKind::Descriptor {
                    sink.event(EventLevel::Fatal, &err.to_string());
                    return Err(err);
                }
                sink.event(
                    EventLevel::Error,
                    &format!("Skipping unreadable entry {}: {}", name, err),
                );
                report.skipped.push(SkippedEntry {
                    name,
                    reason: err.to_string(),
                });
                continue;
            }
        };

        if entry.kind == EntryKind::Asset && !registry::is_md5ext(&entry.name) {
            sink.event(
                EventLevel::Note,
                &format!(
                    "Asset {} does not follow the content-hash naming convention",
                    entry.name
                ),
            );
        }

        // The descriptor is rewritten pretty-printed so the unpacked tree
        // is actually editable; assets are byte-exact copies.
        let content = if entry.kind == EntryKind::Descriptor {
            descriptor.to_pretty_bytes()
        } else {
            entry.content
        };

        let dest_path = dest_dir.join(&name);
        if dest_path.exists() {
            match fs::read(&dest_path) {
                Ok(existing) if existing == content => {
                    debug!("{} already present with identical content", name);
                    report.written.push(name.clone());
                    sink.progress(index + 1, total, &name);
                    continue;
                }
                Ok(_) => {
                    if !opts.overwrite {
                        let err = Error::DestinationConflict { path: dest_path };
                        sink.event(EventLevel::Fatal, &err.to_string());
                        return Err(err);
                    }
                    sink.event(EventLevel::Warn, &format!("Overwriting existing {}", name));
                }
                Err(err) => {
                    sink.event(
                        EventLevel::Error,
                        &format!("Cannot inspect existing {}: {}", name, err),
                    );
                    report.skipped.push(SkippedEntry {
                        name,
                        reason: err.to_string(),
                    });
                    continue;
                }
            }
        }

        if let Err(err) = write_atomic(dest_dir, &dest_path, &content) {
            sink.event(
                EventLevel::Error,
                &format!("Failed to write {}: {}", name, err),
            );
            report.skipped.push(SkippedEntry {
                name,
                reason: err.to_string(),
            });
            continue;
        }

        debug!("wrote {}", name);
        report.written.push(name.clone());
        sink.progress(index + 1, total, &name);
    }

    let sidecar = SidecarMetadata {
        original_file: container_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        target_order: descriptor.target_order(),
    };
    let mut sidecar_bytes = serde_json::to_vec_pretty(&sidecar)
        .map_err(|e| Error::Descriptor(format!("cannot serialize sidecar: {}", e)))?;
    sidecar_bytes.push(b'\n');
    write_atomic(
        dest_dir,
        &dest_dir.join(registry::METADATA_NAME),
        &sidecar_bytes,
    )?;
    debug!(
        "saved sidecar with {} targets in order",
        sidecar.target_order.len()
    );

    sink.event(
        EventLevel::Info,
        &format!(
            "Unpacked {} entries, {} skipped",
            report.written.len(),
            report.skipped.len()
        ),
    );

    Ok(report)
}

/// Writes `content` through a temp file in `dir`, then renames over
/// `dest`. The rename is what makes an in-flight entry all-or-nothing.
fn write_atomic(dir: &Path, dest: &Path, content: &[u8]) -> Result<()> {
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.persist(dest).map_err(|e| Error::Io(e.error))?;
    Ok(())
}
