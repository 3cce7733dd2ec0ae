//! Check-config command implementation

use anyhow::{Context, Result};
use qlrgen_core::Registry;

use crate::cli::CheckConfigArgs;
use crate::output::OutputWriter;
use crate::output_types::{CheckConfigOutput, CollectionInfo};

pub fn execute(args: CheckConfigArgs, output: &OutputWriter) -> Result<()> {
    let registry = Registry::load(&args.config)
        .with_context(|| format!("Invalid registry {}", args.config.display()))?;

    let mut collections = Vec::with_capacity(registry.len());
    for id in registry.collection_ids() {
        let descriptor = registry.resolve(id)?;
        collections.push(CollectionInfo {
            id: descriptor.id.clone(),
            template_path: descriptor.template_path.clone(),
            style_params: descriptor.style_params.clone(),
        });
    }

    if output.is_json() {
        return output.result(CheckConfigOutput {
            config: args.config,
            collections,
        });
    }

    output.success(format!(
        "{} is valid ({} collections)",
        args.config.display(),
        collections.len()
    ));
    for collection in &collections {
        output.section(&collection.id);
        output.kv("Template", collection.template_path.display());
        for (name, value) in &collection.style_params {
            output.kv(format!("  {}", name), value);
        }
    }

    Ok(())
}
