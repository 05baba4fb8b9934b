//! Multi-document YAML stream handling
//!
//! Input documents are kept verbatim; the parsed value sits alongside the
//! raw text so the pipeline can inspect documents without perturbing their
//! formatting on the way out.

use std::io::Write;

use crate::error::{ExpandError, Result};

/// One document of the input stream
#[derive(Debug, Clone)]
pub struct Document {
    /// Verbatim text, without separators or surrounding blank lines
    pub raw: String,

    /// Parsed value for inspection
    pub value: serde_yaml::Value,
}

/// Split a YAML stream into documents
///
/// Separators are lines that begin a new document (`---`). Segments that
/// parse to nothing (empty or comments only) are not documents and are
/// dropped.
pub fn split_documents(input: &str) -> Result<Vec<Document>> {
    let mut segments: Vec<String> = Vec::new();
    let mut current = String::new();

    for line in input.lines() {
        if line == "---" || line.starts_with("--- ") {
            segments.push(std::mem::take(&mut current));
            continue;
        }
        current.push_str(line);
        current.push('\n');
    }
    segments.push(current);

    let mut documents = Vec::new();
    for (index, segment) in segments.iter().enumerate() {
        let raw = segment.trim_matches('\n');
        if raw.is_empty() {
            continue;
        }
        let value: serde_yaml::Value =
            serde_yaml::from_str(raw).map_err(|e| ExpandError::InputParse {
                index,
                message: e.to_string(),
            })?;
        if value.is_null() {
            continue;
        }
        documents.push(Document {
            raw: raw.to_string(),
            value,
        });
    }
    Ok(documents)
}

/// Write a document stream, inserting separators between chunks
pub fn write_stream<W: Write + ?Sized>(out: &mut W, chunks: &[String]) -> Result<()> {
    for (index, chunk) in chunks.iter().enumerate() {
        if index > 0 {
            writeln!(out, "---")?;
        }
        write!(out, "{}", chunk)?;
        if !chunk.ends_with('\n') {
            writeln!(out)?;
        }
    }
    Ok(())
}
