use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A supported data collection and the template used to style it.
///
/// Built once when the registry loads and shared read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionDescriptor {
    pub id: String,
    pub template_path: PathBuf,
    pub style_params: BTreeMap<String, String>,
}

impl CollectionDescriptor {
    pub fn new(id: impl Into<String>, template_path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            template_path: template_path.into(),
            style_params: BTreeMap::new(),
        }
    }

    pub fn with_style_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.style_params.insert(name.into(), value.into());
        self
    }
}
