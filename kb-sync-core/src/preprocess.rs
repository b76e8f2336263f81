//! Turns repository files into knowledge base documents.

use tracing::debug;

use crate::contract::{NormalizedDocument, SourceFile};
use crate::front_matter;
use crate::normalize::normalize;

/// Derive name, metadata and body for `file`.
///
/// Path metadata is the base; front matter (read only when
/// `enable_metadata` is set) overrides it key by key. `version` never
/// survives.
pub fn prepare_document(file: &SourceFile, enable_metadata: bool) -> NormalizedDocument {
    let (canonical_name, mut metadata) = normalize(&file.path);

    let body = if enable_metadata {
        let (body, front_matter) = front_matter::parse(&file.content);
        if let Some(front_matter) = front_matter {
            debug!(path = %file.path, keys = front_matter.len(), "Merging front matter");
            metadata.merge_front_matter(&front_matter);
        }
        body
    } else {
        file.content.clone()
    };
    metadata.strip_version();

    NormalizedDocument {
        canonical_name,
        metadata,
        body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(path: &str, content: &str) -> SourceFile {
        SourceFile {
            path: path.to_string(),
            content: content.to_string(),
            reference: "main".to_string(),
        }
    }

    #[test]
    fn merges_front_matter_over_path_metadata() {
        let doc = prepare_document(
            &file(
                "i18n/en/docusaurus-plugin-content-docs-eiam/v2/setup.md",
                "---\nlanguage: en-US\nversion: 2\ntitle: 'Setup'\n---\n# Setup\n",
            ),
            true,
        );
        assert_eq!(doc.canonical_name, "eiam/en/setup.md");
        assert_eq!(doc.metadata.product(), "eiam");
        assert_eq!(doc.metadata.language(), "en-US");
        assert_eq!(doc.metadata.get("title"), Some("Setup"));
        assert_eq!(doc.metadata.get("version"), None);
        assert_eq!(doc.body, "# Setup");
    }

    #[test]
    fn disabled_metadata_keeps_raw_content() {
        let content = "---\nproduct: other\n---\nBody";
        let doc = prepare_document(&file("docs/ciam/a.md", content), false);
        assert_eq!(doc.body, content);
        assert_eq!(doc.metadata.product(), "ciam");
        assert!(doc.metadata.extra().is_empty());
    }
}
