//! Named ZIP entries: raw payloads and JSON manifests.

use std::io::{Read, Seek, Write};

use serde::de::DeserializeOwned;
use serde::Serialize;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::config::ArchiveOptions;
use crate::error::{MeshpackError, Result};

pub(crate) struct EntryWriter<W: Write + Seek> {
    zip: ZipWriter<W>,
    binary: SimpleFileOptions,
    text: SimpleFileOptions,
    pretty: bool,
}

impl<W: Write + Seek> EntryWriter<W> {
    pub(crate) fn new(writer: W, options: &ArchiveOptions) -> Self {
        let binary = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        let text = if options.compress_manifests {
            SimpleFileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .compression_level(Some(6))
        } else {
            binary
        };
        Self {
            zip: ZipWriter::new(writer),
            binary,
            text,
            pretty: options.pretty_manifests,
        }
    }

    pub(crate) fn write_binary(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        self.zip.start_file(name, self.binary)?;
        self.zip.write_all(bytes)?;
        tracing::debug!(entry = name, size = bytes.len(), "Wrote archive entry");
        Ok(())
    }

    pub(crate) fn write_json<T: Serialize>(&mut self, name: &str, value: &T) -> Result<()> {
        let bytes = if self.pretty {
            serde_json::to_vec_pretty(value)?
        } else {
            serde_json::to_vec(value)?
        };
        self.zip.start_file(name, self.text)?;
        self.zip.write_all(&bytes)?;
        tracing::debug!(entry = name, size = bytes.len(), "Wrote archive manifest");
        Ok(())
    }

    pub(crate) fn finish(self) -> Result<W> {
        Ok(self.zip.finish()?)
    }
}

pub(crate) struct EntryReader<R: Read + Seek> {
    zip: ZipArchive<R>,
}

impl<R: Read + Seek> EntryReader<R> {
    pub(crate) fn new(reader: R) -> Result<Self> {
        let zip = ZipArchive::new(reader)
            .map_err(|e| MeshpackError::corrupt("<archive>", format!("not a readable ZIP container: {e}")))?;
        Ok(Self { zip })
    }

    pub(crate) fn read_bytes(&mut self, name: &str) -> Result<Vec<u8>> {
        let mut file = self.zip.by_name(name).map_err(|e| match e {
            ZipError::FileNotFound => MeshpackError::corrupt(name, "entry is missing"),
            other => MeshpackError::corrupt(name, format!("entry is unreadable: {other}")),
        })?;
        // The header's size is untrusted; let the buffer grow with the data.
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)
            .map_err(|e| MeshpackError::corrupt(name, format!("entry is unreadable: {e}")))?;
        tracing::debug!(entry = name, size = bytes.len(), "Read archive entry");
        Ok(bytes)
    }

    pub(crate) fn read_json<T: DeserializeOwned>(&mut self, name: &str) -> Result<T> {
        let bytes = self.read_bytes(name)?;
        serde_json::from_slice(&bytes)
            .map_err(|e| MeshpackError::corrupt(name, format!("invalid manifest: {e}")))
    }

    pub(crate) fn names(&self) -> impl Iterator<Item = &str> {
        self.zip.file_names()
    }
}
