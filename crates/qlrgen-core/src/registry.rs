//! Collection registry
//!
//! The registry is loaded once at process start from a TOML (or JSON)
//! document and is read-only afterwards. Loading is eager: every template is
//! parsed and checked against the declared key set, so a misconfiguration
//! fails at startup instead of in the middle of a request.

use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{QlrError, Result};
use crate::models::CollectionDescriptor;
use crate::substitution::{style_key, METADATA_KEYS};
use crate::template::{Template, TemplateRenderer};

/// Format of a registry document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    /// `.json` files are JSON, everything else is TOML
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ConfigFormat::Json,
            _ => ConfigFormat::Toml,
        }
    }
}

/// Registry document as written on disk
#[derive(Debug, Deserialize)]
struct RegistryFile {
    collections: BTreeMap<String, CollectionEntry>,
}

#[derive(Debug, Deserialize)]
struct CollectionEntry {
    #[serde(alias = "template")]
    template_path: PathBuf,
    #[serde(default)]
    style_params: BTreeMap<String, ParamValue>,
}

/// Style values may be written as strings, numbers or booleans
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ParamValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

impl ParamValue {
    fn into_string(self) -> String {
        match self {
            ParamValue::Text(s) => s,
            ParamValue::Integer(i) => i.to_string(),
            ParamValue::Float(f) => f.to_string(),
            ParamValue::Bool(b) => b.to_string(),
        }
    }
}

/// Process-wide mapping from collection id to descriptor and template
#[derive(Debug)]
pub struct Registry {
    source: PathBuf,
    collections: HashMap<String, Arc<CollectionDescriptor>>,
    renderer: TemplateRenderer,
}

impl Registry {
    /// Load and validate a registry document.
    ///
    /// Relative template paths are resolved against the document's directory.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| QlrError::ConfigLoad {
            path: path.to_path_buf(),
            reason: format!("Failed to read config file: {}", e),
        })?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

        Self::parse(path, &content, ConfigFormat::from_path(path), base_dir)
    }

    /// Build a registry from document text already in memory
    pub fn parse(
        source: impl Into<PathBuf>,
        content: &str,
        format: ConfigFormat,
        base_dir: &Path,
    ) -> Result<Self> {
        let source = source.into();
        let config_error = |reason: String| QlrError::ConfigLoad {
            path: source.clone(),
            reason,
        };

        let file: RegistryFile = match format {
            ConfigFormat::Toml => toml::from_str(content)
                .map_err(|e| config_error(format!("Failed to parse TOML: {}", e)))?,
            ConfigFormat::Json => serde_json::from_str(content)
                .map_err(|e| config_error(format!("Failed to parse JSON: {}", e)))?,
        };

        if file.collections.is_empty() {
            return Err(config_error("No collections configured".to_string()));
        }

        let mut collections = HashMap::new();
        let mut renderer = TemplateRenderer::new();

        for (id, entry) in file.collections {
            if id.trim().is_empty() {
                return Err(config_error("Collection id must not be empty".to_string()));
            }

            let template_path = if entry.template_path.is_absolute() {
                entry.template_path
            } else {
                base_dir.join(entry.template_path)
            };

            if !template_path.is_file() {
                return Err(config_error(format!(
                    "Template for collection '{}' not found: {}",
                    id,
                    template_path.display()
                )));
            }

            let template = match renderer.get(&template_path) {
                Some(template) => template,
                None => {
                    let parsed = Template::load(&template_path).map_err(|e| {
                        config_error(format!("Template for collection '{}' is invalid: {}", id, e))
                    })?;
                    renderer.insert(parsed)
                }
            };

            let style_params: BTreeMap<String, String> = entry
                .style_params
                .into_iter()
                .map(|(name, value)| (name, value.into_string()))
                .collect();

            check_tokens(&id, &template, &style_params).map_err(config_error)?;

            tracing::debug!(
                collection = %id,
                template = %template_path.display(),
                style_params = style_params.len(),
                "Registered collection"
            );

            let descriptor = CollectionDescriptor {
                id: id.clone(),
                template_path,
                style_params,
            };
            collections.insert(id, Arc::new(descriptor));
        }

        tracing::info!(
            config = %source.display(),
            collections = collections.len(),
            "Loaded collection registry"
        );

        Ok(Self {
            source,
            collections,
            renderer,
        })
    }

    /// Look up a collection; unknown ids are always an error
    pub fn resolve(&self, collection_id: &str) -> Result<Arc<CollectionDescriptor>> {
        self.collections.get(collection_id).cloned().ok_or_else(|| {
            QlrError::UnknownCollection {
                id: collection_id.to_string(),
            }
        })
    }

    pub fn renderer(&self) -> &TemplateRenderer {
        &self.renderer
    }

    /// Document the registry was loaded from
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Configured ids in sorted order
    pub fn collection_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.collections.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }
}

/// Every template token must be a metadata key or one of this collection's
/// style keys. Style parameters the template ignores only earn a warning.
fn check_tokens(
    id: &str,
    template: &Template,
    style_params: &BTreeMap<String, String>,
) -> std::result::Result<(), String> {
    let style_keys: BTreeSet<String> = style_params.keys().map(|name| style_key(name)).collect();
    let tokens = template.tokens();

    let undeclared: Vec<&str> = tokens
        .iter()
        .copied()
        .filter(|token| !METADATA_KEYS.contains(token) && !style_keys.contains(*token))
        .collect();
    if !undeclared.is_empty() {
        return Err(format!(
            "Template {} for collection '{}' uses undeclared placeholders: {}",
            template.path().display(),
            id,
            undeclared.join(", ")
        ));
    }

    let ignored: Vec<&str> = style_keys
        .iter()
        .map(String::as_str)
        .filter(|key| !tokens.contains(key))
        .collect();
    if !ignored.is_empty() {
        tracing::warn!(
            collection = %id,
            template = %template.path().display(),
            ignored = ?ignored,
            "Style parameters are not referenced by the template"
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_template(dir: &TempDir, name: &str, body: &str) {
        fs::write(dir.path().join(name), body).unwrap();
    }

    #[test]
    fn test_parse_toml_registry() {
        let dir = TempDir::new().unwrap();
        write_template(&dir, "s2.qlr", "<l band=\"{style_red_band}\">{source_url}</l>");

        let registry = Registry::parse(
            "inline.toml",
            r#"
[collections.sentinel2_ard]
template_path = "s2.qlr"

[collections.sentinel2_ard.style_params]
red_band = 3
stretch = "minmax"
"#,
            ConfigFormat::Toml,
            dir.path(),
        )
        .unwrap();

        let descriptor = registry.resolve("sentinel2_ard").unwrap();
        assert_eq!(descriptor.template_path, dir.path().join("s2.qlr"));
        assert_eq!(descriptor.style_params["red_band"], "3");
        assert_eq!(descriptor.style_params["stretch"], "minmax");
        assert!(registry.renderer().get(&descriptor.template_path).is_some());
    }

    #[test]
    fn test_json_template_alias() {
        let dir = TempDir::new().unwrap();
        write_template(&dir, "s1.qlr", "<l>{layer_name}</l>");

        let registry = Registry::parse(
            "inline.json",
            r#"{"collections": {"sentinel1_ard": {"template": "s1.qlr"}}}"#,
            ConfigFormat::Json,
            dir.path(),
        )
        .unwrap();

        assert_eq!(registry.collection_ids(), vec!["sentinel1_ard"]);
    }

    #[test]
    fn test_unknown_collection() {
        let dir = TempDir::new().unwrap();
        write_template(&dir, "s1.qlr", "<l/>");
        let registry = Registry::parse(
            "inline.toml",
            "[collections.sentinel1_ard]\ntemplate_path = \"s1.qlr\"\n",
            ConfigFormat::Toml,
            dir.path(),
        )
        .unwrap();

        match registry.resolve("sentinel3_ard") {
            Err(QlrError::UnknownCollection { id }) => assert_eq!(id, "sentinel3_ard"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_undeclared_placeholder_rejected() {
        let dir = TempDir::new().unwrap();
        write_template(&dir, "bad.qlr", "<l>{style_missing}{xmin}</l>");

        let err = Registry::parse(
            "inline.toml",
            "[collections.c]\ntemplate_path = \"bad.qlr\"\n",
            ConfigFormat::Toml,
            dir.path(),
        )
        .unwrap_err();

        match err {
            QlrError::ConfigLoad { reason, .. } => assert!(reason.contains("style_missing")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_config_format_from_path() {
        assert_eq!(ConfigFormat::from_path(Path::new("a/config.JSON")), ConfigFormat::Json);
        assert_eq!(ConfigFormat::from_path(Path::new("a/config.toml")), ConfigFormat::Toml);
        assert_eq!(ConfigFormat::from_path(Path::new("a/config")), ConfigFormat::Toml);
    }
}
