use serde::Serialize;

/// Content type declared for generated layer definitions
pub const QLR_MEDIA_TYPE: &str = "application/xml";

/// A rendered QGIS layer definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QlrDocument {
    pub content: String,
    pub media_type: String,
    /// Suggested download name, `<layer_id>.qlr`
    pub file_name: String,
}

impl QlrDocument {
    pub fn xml(content: String, file_name: impl Into<String>) -> Self {
        Self {
            content,
            media_type: QLR_MEDIA_TYPE.to_string(),
            file_name: file_name.into(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.content.as_bytes()
    }
}
