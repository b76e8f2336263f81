//! Document metadata as stored alongside knowledge base documents.
//!
//! [`DocMetadata`] always carries a `product` and a `language`; any other key
//! lands in `extra`. The `version` key is never kept: documents are not
//! versioned in the knowledge base.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::front_matter::FrontMatter;

pub const DEFAULT_PRODUCT: &str = "unknown";
pub const DEFAULT_LANGUAGE: &str = "zh-CN";

pub const PRODUCT_KEY: &str = "product";
pub const LANGUAGE_KEY: &str = "language";
pub const VERSION_KEY: &str = "version";

/// Metadata attached to a single knowledge base document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocMetadata {
    product: String,
    language: String,
    extra: BTreeMap<String, String>,
}

impl Default for DocMetadata {
    fn default() -> Self {
        Self {
            product: DEFAULT_PRODUCT.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            extra: BTreeMap::new(),
        }
    }
}

impl DocMetadata {
    /// Empty `product` or `language` fall back to the defaults.
    pub fn new(product: impl Into<String>, language: impl Into<String>) -> Self {
        let mut meta = Self::default();
        meta.set_product(product);
        meta.set_language(language);
        meta
    }

    pub fn product(&self) -> &str {
        &self.product
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn extra(&self) -> &BTreeMap<String, String> {
        &self.extra
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        match key {
            PRODUCT_KEY => Some(&self.product),
            LANGUAGE_KEY => Some(&self.language),
            other => self.extra.get(other).map(String::as_str),
        }
    }

    pub fn set_product(&mut self, product: impl Into<String>) {
        let product = product.into();
        if !product.trim().is_empty() {
            self.product = product;
        }
    }

    pub fn set_language(&mut self, language: impl Into<String>) {
        let language = language.into();
        if !language.trim().is_empty() {
            self.language = language;
        }
    }

    /// Set any key. `version` is discarded.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        match key.as_str() {
            PRODUCT_KEY => self.set_product(value),
            LANGUAGE_KEY => self.set_language(value),
            VERSION_KEY => {}
            _ => {
                self.extra.insert(key, value.into());
            }
        }
    }

    /// Overlay front matter on top of this (path derived) metadata.
    /// Front matter wins on every overlapping key.
    pub fn merge_front_matter(&mut self, front_matter: &FrontMatter) {
        for (key, value) in front_matter {
            self.insert(key.as_str(), value.as_str());
        }
        self.strip_version();
    }

    pub fn strip_version(&mut self) {
        self.extra.remove(VERSION_KEY);
    }

    /// All key/value pairs, `product` and `language` first.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        [
            (PRODUCT_KEY, self.product.as_str()),
            (LANGUAGE_KEY, self.language.as_str()),
        ]
        .into_iter()
        .chain(self.extra.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }
}

/// One metadata value addressed by the knowledge base's field id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataValue {
    pub id: String,
    pub name: String,
    pub value: String,
}

/// Result of matching document metadata against the knowledge base fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedMetadata {
    pub values: Vec<MetadataValue>,
    /// Keys the knowledge base does not define.
    pub skipped: Vec<String>,
}

/// Field name to field id, as defined on the knowledge base.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataFieldMap {
    fields: BTreeMap<String, String>,
}

impl MetadataFieldMap {
    /// Entries with an empty name or id are ignored.
    pub fn from_fields<I, N, D>(fields: I) -> Self
    where
        I: IntoIterator<Item = (N, D)>,
        N: Into<String>,
        D: Into<String>,
    {
        let fields = fields
            .into_iter()
            .map(|(name, id)| (name.into(), id.into()))
            .filter(|(name, id)| !name.is_empty() && !id.is_empty())
            .collect();
        Self { fields }
    }

    pub fn field_id(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn resolve(&self, metadata: &DocMetadata) -> ResolvedMetadata {
        let mut resolved = ResolvedMetadata::default();
        for (name, value) in metadata.pairs() {
            match self.field_id(name) {
                Some(id) => resolved.values.push(MetadataValue {
                    id: id.to_string(),
                    name: name.to_string(),
                    value: value.to_string(),
                }),
                None => resolved.skipped.push(name.to_string()),
            }
        }
        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_empty_product_and_language() {
        let meta = DocMetadata::new("", "  ");
        assert_eq!(meta.product(), DEFAULT_PRODUCT);
        assert_eq!(meta.language(), DEFAULT_LANGUAGE);
    }

    #[test]
    fn front_matter_overrides_path_values() {
        let mut meta = DocMetadata::new("ciam", "zh-CN");
        let fm = FrontMatter::from([
            ("product".to_string(), "eiam".to_string()),
            ("title".to_string(), "Intro".to_string()),
        ]);
        meta.merge_front_matter(&fm);
        assert_eq!(meta.product(), "eiam");
        assert_eq!(meta.language(), "zh-CN");
        assert_eq!(meta.get("title"), Some("Intro"));
    }

    #[test]
    fn blank_front_matter_product_keeps_path_product() {
        let mut meta = DocMetadata::new("ciam", "en");
        meta.merge_front_matter(&FrontMatter::from([("product".to_string(), String::new())]));
        assert_eq!(meta.product(), "ciam");
    }

    #[test]
    fn version_is_never_kept() {
        let mut meta = DocMetadata::new("ciam", "en");
        meta.insert("version", "v2");
        meta.merge_front_matter(&FrontMatter::from([("version".to_string(), "3".to_string())]));
        assert_eq!(meta.get("version"), None);
        assert!(meta.pairs().all(|(k, _)| k != "version"));
    }

    #[test]
    fn resolve_skips_unknown_fields() {
        let fields = MetadataFieldMap::from_fields([("product", "f-1"), ("language", "f-2"), ("", "x")]);
        assert_eq!(fields.len(), 2);

        let mut meta = DocMetadata::new("ciam", "en");
        meta.insert("title", "Hello");
        let resolved = fields.resolve(&meta);

        assert_eq!(
            resolved.values,
            vec![
                MetadataValue { id: "f-1".into(), name: "product".into(), value: "ciam".into() },
                MetadataValue { id: "f-2".into(), name: "language".into(), value: "en".into() },
            ]
        );
        assert_eq!(resolved.skipped, vec!["title".to_string()]);
    }
}
