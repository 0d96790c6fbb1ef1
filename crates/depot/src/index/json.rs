//! Built-in generator writing the standard JSON index document.
//!
//! Options:
//! - `pretty = "true"`: write indented, uncompressed `index.json`
//!   instead of gzip-compressed `index.json.gz`.

use std::collections::BTreeMap;
use std::io::Write;

use anyhow::Result;

use super::document::{write_document, ArtifactRecord, Encoding, IndexDocument};
use super::generator::{GeneratorContext, IndexGenerator};

pub const JSON_INDEX_TYPE: &str = "json";
pub const COMPRESSED_INDEX_FILE: &str = "index.json.gz";
pub const PRETTY_INDEX_FILE: &str = "index.json";

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonIndexGenerator;

impl JsonIndexGenerator {
    fn encoding(options: &BTreeMap<String, String>) -> Encoding {
        let pretty = options
            .get("pretty")
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"));
        if pretty {
            Encoding::Pretty
        } else {
            Encoding::Compressed
        }
    }
}

impl IndexGenerator for JsonIndexGenerator {
    fn index_type(&self) -> &str {
        JSON_INDEX_TYPE
    }

    fn file_name(&self, options: &BTreeMap<String, String>) -> String {
        match Self::encoding(options) {
            Encoding::Pretty => PRETTY_INDEX_FILE.to_string(),
            Encoding::Compressed => COMPRESSED_INDEX_FILE.to_string(),
        }
    }

    fn generate(
        &self,
        artifacts: &[ArtifactRecord],
        ctx: &GeneratorContext<'_>,
        out: &mut dyn Write,
    ) -> Result<()> {
        let doc = IndexDocument::new(ctx.name.map(str::to_string), artifacts.to_vec());
        write_document(&doc, Self::encoding(ctx.options), out)
    }
}
