//! Archive Reader: opens a `.pmp` container and exposes its entries.
//!
//! A container is a ZIP archive with a flat namespace. Opening validates
//! the structural framing and that a descriptor entry is present; it does
//! not interpret the descriptor, [`Container::descriptor_bytes`] hands the
//! raw bytes to whoever needs them. [`Container::entries`] yields entries
//! lazily in stored order, which is load-bearing: repacking must be able to
//! reproduce it deterministically. A single unreadable entry does not end
//! the sequence; it surfaces as an `Err` item so callers can salvage the
//! rest of the archive.

use crate::error::{Error, Result};
use crate::registry::{self, EntryKind};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use zip::ZipArchive;

/// One named unit of content read from a container.
#[derive(Debug, Clone)]
pub struct Entry {
    pub name: String,
    pub kind: EntryKind,
    pub content: Vec<u8>,
}

/// An open `.pmp` container. The underlying file handle lives exactly as
/// long as this value.
pub struct Container {
    archive: ZipArchive<File>,
    names: Vec<String>,
    descriptor_index: usize,
}

impl Container {
    /// Opens and structurally validates a container.
    ///
    /// Fails with [`Error::CorruptContainer`] when the ZIP framing cannot
    /// be parsed and [`Error::MissingDescriptor`] when no entry classifies
    /// as the descriptor.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let mut archive = ZipArchive::new(file)?;

        // Walk the central directory once without decompressing anything:
        // this pins the stored entry order and surfaces broken headers up
        // front, before any write has happened downstream.
        let mut names = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let entry = archive.by_index_raw(index)?;
            names.push(entry.name().to_string());
        }

        let descriptor_index = names
            .iter()
            .position(|name| registry::classify(name) == EntryKind::Descriptor)
            .ok_or(Error::MissingDescriptor)?;

        Ok(Self {
            archive,
            names,
            descriptor_index,
        })
    }

    /// Number of entries, descriptor included.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Entry names in stored order.
    pub fn entry_names(&self) -> &[String] {
        &self.names
    }

    /// Raw descriptor contents. No interpretation happens here.
    pub fn descriptor_bytes(&mut self) -> Result<Vec<u8>> {
        let mut entry = self.archive.by_index(self.descriptor_index)?;
        let mut content = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut content)?;
        Ok(content)
    }

    /// Lazy, finite, non-restartable sequence of entries in stored order.
    pub fn entries(&mut self) -> Entries<'_> {
        Entries {
            container: self,
            index: 0,
        }
    }

    fn read_entry(&mut self, index: usize) -> Result<Entry> {
        let name = self.names[index].clone();
        let mut entry = self.archive.by_index(index)?;
        let mut content = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut content)?;
        Ok(Entry {
            kind: registry::classify(&name),
            name,
            content,
        })
    }
}

/// Iterator over a container's entries. Each item carries the entry name
/// alongside the read result, so a failed entry can still be reported by
/// name.
pub struct Entries<'a> {
    container: &'a mut Container,
    index: usize,
}

impl Iterator for Entries<'_> {
    type Item = (String, Result<Entry>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.container.len() {
            return None;
        }
        let index = self.index;
        self.index += 1;
        let name = self.container.names[index].clone();
        let result = self.container.read_entry(index);
        Some((name, result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn write_container(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut writer = ZipWriter::new(file);
        for (name, content) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap();
    }

    fn descriptor_json() -> Vec<u8> {
        br#"{"targets":[{"isStage":true,"name":"Stage","costumes":[],"sounds":[]}]}"#.to_vec()
    }

    #[test]
    fn open_rejects_garbage_framing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.pmp");
        std::fs::write(&path, b"this is not a zip archive at all").unwrap();
        let err = Container::open(&path).unwrap_err();
        assert!(matches!(err, Error::CorruptContainer(_)));
    }

    #[test]
    fn open_requires_a_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no_descriptor.pmp");
        write_container(&path, &[("a.png", b"x"), ("b.wav", b"y")]);
        let err = Container::open(&path).unwrap_err();
        assert!(matches!(err, Error::MissingDescriptor));
    }

    #[test]
    fn entries_preserve_stored_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ordered.pmp");
        let descriptor = descriptor_json();
        // deliberately not alphabetical
        write_container(
            &path,
            &[
                ("zz.png", b"z"),
                ("project.json", &descriptor),
                ("aa.wav", b"a"),
            ],
        );

        let mut container = Container::open(&path).unwrap();
        assert_eq!(container.len(), 3);
        assert_eq!(container.entry_names(), ["zz.png", "project.json", "aa.wav"]);

        let entries: Vec<Entry> = container
            .entries()
            .map(|(_, result)| result.unwrap())
            .collect();
        assert_eq!(entries[0].name, "zz.png");
        assert_eq!(entries[0].kind, EntryKind::Asset);
        assert_eq!(entries[1].kind, EntryKind::Descriptor);
        assert_eq!(entries[2].content, b"a");
    }

    #[test]
    fn descriptor_bytes_are_raw() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw.pmp");
        let descriptor = descriptor_json();
        write_container(&path, &[("project.json", &descriptor)]);

        let mut container = Container::open(&path).unwrap();
        assert_eq!(container.descriptor_bytes().unwrap(), descriptor);
    }
}
