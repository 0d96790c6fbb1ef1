//! The standard index document.
//!
//! ```json
//! {
//!   "schema": 1,
//!   "name": "releases",
//!   "increment": 1718000000000,
//!   "resources": [
//!     {
//!       "bsn": "org.example",
//!       "version": "1.0.0",
//!       "sha1": "a9993e364706816aba3e25717850c26c9cd0d89d",
//!       "size": 1234,
//!       "url": "org.example/org.example-1.0.0.jar",
//!       "properties": { "Bundle-Name": "Example" }
//!     }
//!   ]
//! }
//! ```
//!
//! Resource URLs are relative to the directory holding the index file, so an
//! index and its artifacts can be moved together. The document may be stored
//! plain or gzip-compressed; readers detect which from the first two bytes.

use std::collections::BTreeMap;
use std::io::{self, BufRead, BufReader, Read, Write};

use anyhow::{bail, Context, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};

use crate::digest::Digest;
use crate::identity::ArtifactIdentity;
use crate::version::Version;

pub const SCHEMA_VERSION: u32 = 1;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// One artifact as described by an index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub bsn: String,
    pub version: Version,
    pub sha1: Digest,
    pub size: u64,
    /// Location relative to the index file, `/`-separated.
    pub url: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
}

impl ArtifactRecord {
    pub fn identity(&self) -> ArtifactIdentity {
        ArtifactIdentity::new(self.bsn.clone(), self.version.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDocument {
    pub schema: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Milliseconds since the epoch when the document was generated.
    pub increment: i64,
    pub resources: Vec<ArtifactRecord>,
}

impl IndexDocument {
    /// Build a document over `resources`, sorted by identity.
    pub fn new(name: Option<String>, mut resources: Vec<ArtifactRecord>) -> Self {
        resources.sort_by(|a, b| a.bsn.cmp(&b.bsn).then_with(|| a.version.cmp(&b.version)));
        Self {
            schema: SCHEMA_VERSION,
            name,
            increment: chrono::Utc::now().timestamp_millis(),
            resources,
        }
    }
}

/// How a document is laid out on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Compact JSON, gzip-compressed.
    Compressed,
    /// Indented JSON, uncompressed.
    Pretty,
}

pub fn write_document(doc: &IndexDocument, encoding: Encoding, out: &mut dyn Write) -> Result<()> {
    match encoding {
        Encoding::Compressed => {
            let mut encoder = GzEncoder::new(out, Compression::default());
            serde_json::to_writer(&mut encoder, doc).context("failed to serialize index")?;
            encoder.finish().context("failed to finish gzip stream")?;
        }
        Encoding::Pretty => {
            serde_json::to_writer_pretty(&mut *out, doc).context("failed to serialize index")?;
            out.write_all(b"\n").context("failed to write index")?;
        }
    }
    Ok(())
}

/// Read a document, plain or gzip-compressed.
pub fn read_document(input: &mut dyn Read) -> Result<IndexDocument> {
    let mut reader = BufReader::new(input);
    let compressed = {
        let head = reader.fill_buf().context("failed to read index")?;
        head.starts_with(&GZIP_MAGIC)
    };

    let doc: IndexDocument = if compressed {
        serde_json::from_reader(GzDecoder::new(reader)).context("failed to parse compressed index")?
    } else {
        serde_json::from_reader(reader).context("failed to parse index")?
    };

    if doc.schema != SCHEMA_VERSION {
        bail!(
            "unsupported index schema {} (expected {})",
            doc.schema,
            SCHEMA_VERSION
        );
    }
    Ok(doc)
}

/// Convenience for callers holding bytes.
pub fn read_document_bytes(bytes: &[u8]) -> Result<IndexDocument> {
    read_document(&mut io::Cursor::new(bytes))
}
