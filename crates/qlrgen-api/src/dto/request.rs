use serde::Deserialize;

/// Query string of `GET /api/v1/qlr`.
///
/// Both fields are optional here so that a missing parameter is reported in
/// the JSON error format rather than by the extractor rejection.
#[derive(Debug, Default, Deserialize)]
pub struct QlrQuery {
    pub url: Option<String>,
    pub collection: Option<String>,
}

impl QlrQuery {
    /// `(url, collection)`, or the name of the first missing parameter
    pub fn required(self) -> Result<(String, String), &'static str> {
        let url = present(self.url).ok_or("url")?;
        let collection = present(self.collection).ok_or("collection")?;
        Ok((url, collection))
    }
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required() {
        let query = QlrQuery {
            url: Some("https://h/a.tif".into()),
            collection: Some("sentinel2_ard".into()),
        };
        assert_eq!(
            query.required(),
            Ok(("https://h/a.tif".to_string(), "sentinel2_ard".to_string()))
        );

        let blank_url = QlrQuery {
            url: Some("  ".into()),
            collection: Some("sentinel2_ard".into()),
        };
        assert_eq!(blank_url.required(), Err("url"));
        assert_eq!(
            QlrQuery {
                url: Some("https://h/a.tif".into()),
                collection: None
            }
            .required(),
            Err("collection")
        );
    }
}
