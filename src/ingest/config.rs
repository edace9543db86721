// src/ingest/config.rs
//! Source list file format: TOML `sources = [..]` (canonical) or a JSON array.

use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::Path;

/// Load a source list from an explicit path. Supports TOML or JSON formats.
pub fn load_sources_from(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading sources from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_sources(&content, ext.as_str())
}

/// Canonical TOML rendering used when persisting.
pub fn render_sources_toml(sources: &[String]) -> Result<String> {
    #[derive(serde::Serialize)]
    struct TomlSources<'a> {
        sources: &'a [String],
    }
    toml::to_string(&TomlSources { sources }).context("serializing sources")
}

pub(crate) fn parse_sources(s: &str, hint_ext: &str) -> Result<Vec<String>> {
    // Try TOML first if hinted or content looks like toml.
    let try_toml = hint_ext == "toml" || s.contains("sources");
    if try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    // Try JSON array
    if let Ok(v) = parse_json(s) {
        return Ok(v);
    }
    // Fallback: also try TOML if not attempted
    if !try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    Err(anyhow!("unsupported sources format"))
}

fn parse_toml(s: &str) -> Result<Vec<String>> {
    #[derive(serde::Deserialize)]
    struct TomlSources {
        sources: Vec<String>,
    }
    let v: TomlSources = toml::from_str(s)?;
    Ok(clean_list(v.sources))
}

fn parse_json(s: &str) -> Result<Vec<String>> {
    let v: Vec<String> = serde_json::from_str(s)?;
    Ok(clean_list(v))
}

/// Trim, strip a leading `r/`, drop empties and case-insensitive duplicates.
/// First occurrence wins; order is otherwise preserved.
pub fn clean_list<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for it in items {
        let t = normalize_source_name(it.as_ref());
        if t.is_empty() || out.iter().any(|o| o.eq_ignore_ascii_case(&t)) {
            continue;
        }
        out.push(t);
    }
    out
}

pub fn normalize_source_name(s: &str) -> String {
    let t = s.trim();
    let t = t
        .strip_prefix("/r/")
        .or_else(|| t.strip_prefix("r/"))
        .unwrap_or(t);
    t.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_trim_and_formats_work() {
        let toml = r#"sources = [" Rust ", "", "r/Python", "python", "Go"]"#;
        let json = r#"["MachineLearning", "  r/Rust  ", ""]"#;
        let toml_out = parse_toml(toml).unwrap();
        assert_eq!(toml_out, vec!["Rust", "Python", "Go"]);
        let json_out = parse_json(json).unwrap();
        assert_eq!(json_out, vec!["MachineLearning", "Rust"]);
    }

    #[test]
    fn toml_rendering_roundtrips_order() {
        let src = vec!["b".to_string(), "a".to_string()];
        let s = render_sources_toml(&src).unwrap();
        assert_eq!(parse_sources(&s, "toml").unwrap(), src);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(parse_sources("<<<", "txt").is_err());
    }
}
