//! Conversion mode selection and pipeline dispatch.
//!
//! A conversion job runs one of four pipelines: plain unpack, plain
//! repack, normalize (unpack into a scoped temp dir, then repack, yielding
//! a canonical container with deterministic ordering and compression), or
//! verify (validation only, zero writes). Mode strings are resolved to a
//! [`Mode`] before any I/O happens, so an unknown mode can never partially
//! execute.

use crate::container::Container;
use crate::descriptor::Descriptor;
use crate::error::{Error, Result};
use crate::registry::{self, EntryKind};
use crate::repacker::{self, RepackOptions, RepackReport};
use crate::sink::{EventLevel, ProgressSink};
use crate::unpacker::{self, UnpackOptions, UnpackReport};
use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation signal, checked between entries (never
/// mid-entry). Clone freely; all clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// The four conversion modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Unpack,
    Repack,
    Normalize,
    Verify,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Unpack => "unpack",
            Mode::Repack => "repack",
            Mode::Normalize => "normalize",
            Mode::Verify => "verify",
        }
    }

    /// Maps a mode onto its pipeline.
    pub fn pipeline(self) -> Pipeline {
        match self {
            Mode::Unpack => Pipeline::UnpackOnly,
            Mode::Repack => Pipeline::RepackOnly,
            Mode::Normalize => Pipeline::UnpackThenRepack,
            Mode::Verify => Pipeline::ValidateOnly,
        }
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "unpack" => Ok(Mode::Unpack),
            "repack" => Ok(Mode::Repack),
            "normalize" => Ok(Mode::Normalize),
            "verify" => Ok(Mode::Verify),
            _ => Err(Error::UnsupportedMode(s.to_string())),
        }
    }
}

/// Pipeline shapes the selector can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pipeline {
    UnpackOnly,
    RepackOnly,
    UnpackThenRepack,
    ValidateOnly,
}

#[derive(Debug, Clone, Default)]
pub struct ConvertOptions {
    pub overwrite: bool,
    pub cancel: CancelToken,
}

/// One problem found by the verify pipeline.
#[derive(Debug, Clone)]
pub struct Finding {
    pub entry: String,
    pub problem: String,
}

/// Outcome of a verify job.
#[derive(Debug, Default)]
pub struct VerifyReport {
    pub entries: usize,
    pub findings: Vec<Finding>,
}

impl VerifyReport {
    pub fn is_valid(&self) -> bool {
        self.findings.is_empty()
    }
}

/// Outcome of a conversion job, by pipeline.
#[derive(Debug)]
pub enum ConversionReport {
    Unpacked(UnpackReport),
    Repacked(RepackReport),
    Normalized {
        unpacked: UnpackReport,
        repacked: RepackReport,
    },
    Verified(VerifyReport),
}

/// Runs the pipeline for `mode`. `dest` may be omitted only for modes that
/// never write (verify).
pub fn convert(
    mode: Mode,
    source: &Path,
    dest: Option<&Path>,
    opts: &ConvertOptions,
    sink: &dyn ProgressSink,
) -> Result<ConversionReport> {
    match mode.pipeline() {
        Pipeline::UnpackOnly => {
            let unpack_opts = UnpackOptions {
                overwrite: opts.overwrite,
                cancel: opts.cancel.clone(),
            };
            let report = unpacker::unpack(source, require_dest(dest, mode)?, &unpack_opts, sink)?;
            Ok(ConversionReport::Unpacked(report))
        }
        Pipeline::RepackOnly => {
            let repack_opts = RepackOptions {
                cancel: opts.cancel.clone(),
            };
            let report = repacker::repack(source, require_dest(dest, mode)?, &repack_opts, sink)?;
            Ok(ConversionReport::Repacked(report))
        }
        Pipeline::UnpackThenRepack => {
            let dest = require_dest(dest, mode)?;
            // Intermediate tree lives in a scoped temp dir; it disappears
            // on every exit path.
            let staging = tempfile::tempdir()?;
            sink.event(
                EventLevel::Debug,
                &format!("Normalizing via {}", staging.path().display()),
            );
            let unpack_opts = UnpackOptions {
                overwrite: true,
                cancel: opts.cancel.clone(),
            };
            let unpacked = unpacker::unpack(source, staging.path(), &unpack_opts, sink)?;
            let repack_opts = RepackOptions {
                cancel: opts.cancel.clone(),
            };
            let repacked = repacker::repack(staging.path(), dest, &repack_opts, sink)?;
            Ok(ConversionReport::Normalized { unpacked, repacked })
        }
        Pipeline::ValidateOnly => Ok(ConversionReport::Verified(verify(source, sink)?)),
    }
}

/// Validation-only dry run: structural framing, descriptor parse, naming
/// rules, duplicate entries, per-entry readability, and referential
/// integrity. Writes nothing. Structural failures (unreadable framing,
/// missing or unparseable descriptor) are errors; everything else becomes
/// a finding in the report.
pub fn verify(container_path: &Path, sink: &dyn ProgressSink) -> Result<VerifyReport> {
    sink.event(
        EventLevel::Info,
        &format!("Verifying {}", container_path.display()),
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

    let mut report = VerifyReport {
        entries: container.len(),
        ..Default::default()
    };

    for name in registry::duplicate_names(container.entry_names().iter().map(String::as_str)) {
        report.findings.push(Finding {
            entry: name,
            problem: "duplicate entry name".to_string(),
        });
    }

    let names: Vec<String> = container.entry_names().to_vec();
    for name in &names {
        if let Err(err) = registry::validate_name(name) {
            report.findings.push(Finding {
                entry: name.clone(),
                problem: err.to_string(),
            });
        } else if registry::classify(name) == EntryKind::Asset && !registry::is_md5ext(name) {
            sink.event(
                EventLevel::Note,
                &format!("Asset {} does not follow the content-hash naming convention", name),
            );
        }
    }

    let total = container.len();
    for (index, (name, result)) in container.entries().enumerate() {
        sink.progress(index, total, &name);
        if let Err(err) = result {
            report.findings.push(Finding {
                entry: name.clone(),
                problem: format!("unreadable: {}", err),
            });
        }
        sink.progress(index + 1, total, &name);
    }

    let present: std::collections::HashSet<&str> = names.iter().map(String::as_str).collect();
    for reference in descriptor.references() {
        if !present.contains(reference.as_str()) {
            report.findings.push(Finding {
                entry: reference,
                problem: "descriptor reference does not resolve to any entry".to_string(),
            });
        }
    }

    if report.is_valid() {
        sink.event(
            EventLevel::Info,
            &format!("Container is valid ({} entries)", report.entries),
        );
    } else {
        for finding in &report.findings {
            sink.event(
                EventLevel::Error,
                &format!("{}: {}", finding.entry, finding.problem),
            );
        }
        sink.event(
            EventLevel::Warn,
            &format!("Found {} problems", report.findings.len()),
        );
    }

    Ok(report)
}

fn require_dest(dest: Option<&Path>, mode: Mode) -> Result<&Path> {
    dest.ok_or_else(|| {
        Error::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("mode {} requires a destination path", mode.as_str()),
        ))
    })
}
