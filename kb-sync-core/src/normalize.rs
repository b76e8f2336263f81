//! Mapping of repository paths to knowledge base document names.
//!
//! Two Docusaurus layouts are recognised:
//!
//! - `docs/{product}/...` holds the primary language (`zh-CN`) sources;
//! - `i18n/{language}/docusaurus-plugin-content-docs-{product}/[version/]...`
//!   holds translations, optionally below a version directory.
//!
//! Both produce `{product}/{language}/{sub-path}`, so the same page keeps the
//! same canonical name across runs and across the two layouts. Everything
//! here is a pure function of the path string.

use crate::metadata::{DocMetadata, DEFAULT_LANGUAGE, DEFAULT_PRODUCT};

pub const DOCS_ROOT: &str = "docs/";
pub const I18N_ROOT: &str = "i18n/";
pub const PLUGIN_PREFIX: &str = "docusaurus-plugin-content-docs-";
pub const VERSION_TOKENS: [&str; 12] = [
    "current", "v1", "v2", "v3", "v4", "v5", "v6", "v7", "v8", "v9", "v10", "latest",
];

/// Canonical document name and the metadata derivable from the path.
pub fn normalize(path: &str) -> (String, DocMetadata) {
    let parts: Vec<&str> = path.split('/').collect();

    let (metadata, sub_path) = if path.starts_with(DOCS_ROOT) {
        normalize_docs(&parts)
    } else if path.starts_with(I18N_ROOT) {
        normalize_i18n(&parts)
    } else {
        (DocMetadata::default(), path.to_string())
    };

    let name = collapse_separators(&format!(
        "{}/{}/{}",
        metadata.product(),
        metadata.language(),
        sub_path
    ));
    (name, metadata)
}

/// Only the canonical name of `path`.
pub fn canonical_name(path: &str) -> String {
    normalize(path).0
}

/// `docs/{product}/...`. A file directly under `docs/` has no product
/// directory and gets product `unknown`; the file name is never taken as the
/// product, so `docs/intro.md` maps to `unknown/zh-CN/intro.md` and not
/// `intro.md/zh-CN/intro.md`.
fn normalize_docs(parts: &[&str]) -> (DocMetadata, String) {
    // parts[0] == "docs"
    match parts.len() {
        0..=2 => (
            DocMetadata::new(DEFAULT_PRODUCT, DEFAULT_LANGUAGE),
            parts[1..].join("/"),
        ),
        _ => (
            DocMetadata::new(parts[1], DEFAULT_LANGUAGE),
            parts[2..].join("/"),
        ),
    }
}

fn normalize_i18n(parts: &[&str]) -> (DocMetadata, String) {
    let language = if parts.len() >= 3 { parts[1] } else { "" };

    let Some(plugin_idx) = plugin_segment(parts) else {
        let rest = if parts.len() >= 3 { &parts[2..] } else { &parts[1..] };
        return (DocMetadata::new(DEFAULT_PRODUCT, language), rest.join("/"));
    };

    let product = &parts[plugin_idx][PLUGIN_PREFIX.len()..];
    let metadata = DocMetadata::new(product, language);

    let after_plugin = &parts[plugin_idx + 1..];
    let after_version = after_plugin
        .iter()
        .position(|part| VERSION_TOKENS.contains(part))
        .map(|idx| &after_plugin[idx + 1..])
        .filter(|rest| !rest.is_empty());

    let sub_path = match after_version {
        Some(rest) => rest.join("/"),
        None if !after_plugin.is_empty() => after_plugin.join("/"),
        None => parts.last().copied().unwrap_or_default().to_string(),
    };
    (metadata, sub_path)
}

/// Index of the first `docusaurus-plugin-content-docs-*` segment after the
/// language segment.
fn plugin_segment(parts: &[&str]) -> Option<usize> {
    parts
        .iter()
        .enumerate()
        .skip(2)
        .find(|(_, part)| part.starts_with(PLUGIN_PREFIX))
        .map(|(idx, _)| idx)
}

fn collapse_separators(name: &str) -> String {
    name.split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Whether `path` is under a recognised documentation root.
pub fn is_docs_path(path: &str) -> bool {
    if path.starts_with(DOCS_ROOT) {
        return path.len() > DOCS_ROOT.len();
    }
    if path.starts_with(I18N_ROOT) {
        let parts: Vec<&str> = path.split('/').collect();
        return plugin_segment(&parts).is_some_and(|idx| idx + 1 < parts.len());
    }
    false
}

/// Whether `path` should be mirrored: allowed extension and documentation root.
pub fn is_eligible<S: AsRef<str>>(path: &str, extensions: &[S]) -> bool {
    extensions
        .iter()
        .any(|ext| !ext.as_ref().is_empty() && path.ends_with(ext.as_ref()))
        && is_docs_path(path)
}
