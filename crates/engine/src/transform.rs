//! Post-export HTML transform – makes the exported entry page loadable from
//! a local-file context.
//!
//! Two rewrites, both idempotent: inject a `<base href="./">` declaration if
//! none exists, and turn root-absolute `src=`/`href=` references into
//! relative ones. The asset pattern only matches a literal leading `/`
//! immediately after the attribute's opening quote, so protocol-relative
//! `//host` references and already-rewritten `./` paths are left alone.

use crate::error::{EngineError, EngineResult};
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

pub const BASE_TAG: &str = r#"<base href="./">"#;

fn head_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<head[^>]*>").expect("static pattern"))
}

fn root_ref_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // A second `/` or a closing quote after the first one disqualifies the
    // match, keeping `//cdn...` and bare `"/"` untouched.
    RE.get_or_init(|| Regex::new(r#"(src|href)="/([^/"])"#).expect("static pattern"))
}

fn base_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<base[^>]*>").expect("static pattern"))
}

/// Apply the transform to an HTML string.
pub fn relocate_entry_html(html: &str) -> String {
    let out = if html.contains("<base") {
        html.to_string()
    } else if let Some(m) = head_re().find(html) {
        let mut s = String::with_capacity(html.len() + BASE_TAG.len());
        s.push_str(&html[..m.end()]);
        s.push_str(BASE_TAG);
        s.push_str(&html[m.end()..]);
        s
    } else {
        tracing::warn!("entry HTML has no <head>; base declaration not injected");
        html.to_string()
    };

    // The base element itself is exempt from the attribute rewrite: an
    // author-chosen href like "/app/" must stay byte-identical.
    match base_re().find(&out) {
        Some(m) => {
            let mut s = String::with_capacity(out.len());
            s.push_str(&rewrite_root_refs(&out[..m.start()]));
            s.push_str(m.as_str());
            s.push_str(&rewrite_root_refs(&out[m.end()..]));
            s
        }
        None => rewrite_root_refs(&out),
    }
}

fn rewrite_root_refs(html: &str) -> String {
    root_ref_re().replace_all(html, "$1=\"./$2").into_owned()
}

/// Transform the entry HTML file in place. Writes only when the content
/// actually changed.
pub fn transform_entry_html(path: &Path) -> EngineResult<()> {
    let html = fs::read_to_string(path).map_err(|e| EngineError::workspace(path, e))?;
    let transformed = relocate_entry_html(&html);
    if transformed != html {
        fs::write(path, &transformed).map_err(|e| EngineError::workspace(path, e))?;
        tracing::info!(path = %path.display(), "entry HTML rewritten for file:// loading");
    } else {
        tracing::debug!(path = %path.display(), "entry HTML already relocatable");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORTED: &str = r#"<!DOCTYPE html>
<html><head><meta charset="utf-8"><title>app</title></head>
<body>
<link href="/static/app.css" rel="stylesheet">
<script src="/static/app.js"></script>
<script src="//cdn.example.com/lib.js"></script>
<a href="./relative.html">rel</a>
</body></html>"#;

    #[test]
    fn test_injects_base_tag_once() {
        let out = relocate_entry_html(EXPORTED);
        assert_eq!(out.matches("<base").count(), 1);
        assert!(out.contains(r#"<head><base href="./">"#));
    }

    #[test]
    fn test_rewrites_root_absolute_refs() {
        let out = relocate_entry_html(EXPORTED);
        assert!(out.contains(r#"href="./static/app.css""#));
        assert!(out.contains(r#"src="./static/app.js""#));
    }

    #[test]
    fn test_leaves_protocol_relative_refs() {
        let out = relocate_entry_html(EXPORTED);
        assert!(out.contains(r#"src="//cdn.example.com/lib.js""#));
    }

    #[test]
    fn test_leaves_already_relative_refs() {
        let out = relocate_entry_html(EXPORTED);
        assert!(out.contains(r#"href="./relative.html""#));
    }

    #[test]
    fn test_transform_is_idempotent() {
        let once = relocate_entry_html(EXPORTED);
        let twice = relocate_entry_html(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_existing_base_tag_is_kept_byte_identical() {
        let html = r#"<html><head><base href="/app/"></head><body></body></html>"#;
        let out = relocate_entry_html(html);
        assert_eq!(out.matches("<base").count(), 1);
        // The author's base value is exempt from the root-ref rewrite.
        assert!(out.contains(r#"<base href="/app/">"#));
    }

    #[test]
    fn test_asset_refs_around_existing_base_still_rewritten() {
        let html = concat!(
            r#"<html><head><link href="/a.css"><base href="/app/">"#,
            r#"<script src="/b.js"></script></head></html>"#
        );
        let out = relocate_entry_html(html);
        assert!(out.contains(r#"<base href="/app/">"#));
        assert!(out.contains(r#"href="./a.css""#));
        assert!(out.contains(r#"src="./b.js""#));
    }

    #[test]
    fn test_head_with_attributes() {
        let html = r#"<html><head lang="en"><title>t</title></head></html>"#;
        let out = relocate_entry_html(html);
        assert!(out.contains(r#"<head lang="en"><base href="./">"#));
    }

    #[test]
    fn test_bare_root_href_untouched() {
        let html = r#"<html><head></head><a href="/">home</a></html>"#;
        let out = relocate_entry_html(html);
        assert!(out.contains(r#"href="/""#));
    }

    #[test]
    fn test_transform_file_roundtrip() {
        let path = std::env::temp_dir().join(format!(
            "deskpack_transform_{}.html",
            std::process::id()
        ));
        fs::write(&path, EXPORTED).unwrap();
        transform_entry_html(&path).unwrap();
        let first = fs::read_to_string(&path).unwrap();
        transform_entry_html(&path).unwrap();
        let second = fs::read_to_string(&path).unwrap();
        assert_eq!(first, second);
        let _ = fs::remove_file(&path);
    }
}
