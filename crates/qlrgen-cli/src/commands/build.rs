//! Build command implementation

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use qlrgen_core::{QlrAssembler, QlrDocument, Registry};

use crate::cli::BuildArgs;
use crate::output::OutputWriter;
use crate::output_types::BuildOutput;

pub async fn execute(args: BuildArgs, output: &OutputWriter) -> Result<()> {
    let registry = Registry::load(&args.config)
        .with_context(|| format!("Failed to load registry {}", args.config.display()))?;
    let extractor = super::extractor(args.timeout)?;
    let assembler = QlrAssembler::new(Arc::new(registry), Arc::new(extractor));

    let document = assembler
        .build(&args.url, &args.collection)
        .await
        .with_context(|| format!("Failed to build QLR for {}", args.url))?;

    let written_to = match &args.output {
        Some(target) => Some(write_document(target, &document)?),
        None => None,
    };

    if output.is_json() {
        return output.result(BuildOutput {
            url: args.url,
            collection: args.collection,
            file_name: document.file_name.clone(),
            content: written_to.is_none().then(|| document.content.clone()),
            written_to,
            bytes: document.content.len(),
        });
    }

    match written_to {
        Some(path) => {
            output.success(format!("Wrote {} ({} bytes)", path.display(), document.content.len()))
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(document.as_bytes())?;
            stdout.flush()?;
        }
    }

    Ok(())
}

/// Write `document` to `target`, or into it under the document's file name
/// when `target` is a directory.
///
/// The document goes to a temporary file beside the destination and is
/// renamed into place.
fn write_document(target: &Path, document: &QlrDocument) -> Result<PathBuf> {
    let path = if target.is_dir() {
        target.join(&document.file_name)
    } else {
        target.to_path_buf()
    };

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let mut file = tempfile::NamedTempFile::new_in(&parent)
        .with_context(|| format!("Cannot write into {}", parent.display()))?;
    file.write_all(document.as_bytes())?;
    file.persist(&path).with_context(|| format!("Failed to write {}", path.display()))?;

    tracing::debug!(path = %path.display(), "QLR written");
    Ok(path)
}
