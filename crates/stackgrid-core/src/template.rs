//! Template rendering for config map content.
//!
//! Templates are plain documents with literal `{{Token}}` placeholders. No
//! conditionals or loops: rendering reads the file, unescapes
//! backslash-escaped sequences, then replaces every supplied placeholder.
//! Placeholders the caller did not supply pass through untouched.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::CharIndices;

use regex::Regex;
use thiserror::Error;
use tracing::{debug, warn};

/// Result type alias for template operations.
pub type TemplateResult<T> = Result<T, TemplateError>;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("failed to read template {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid escape sequence at byte {offset}: {sequence}")]
    Escape { offset: usize, sequence: String },

    #[error("invalid placeholder pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// The fixed placeholder vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Placeholder {
    TenantId,
    Version,
    Namespace,
    ProjectId,
    CorsUrls,
}

impl Placeholder {
    pub const ALL: [Placeholder; 5] = [
        Placeholder::TenantId,
        Placeholder::Version,
        Placeholder::Namespace,
        Placeholder::ProjectId,
        Placeholder::CorsUrls,
    ];

    /// Literal token as it appears in a template.
    pub fn token(&self) -> &'static str {
        match self {
            Placeholder::TenantId => "{{TenantId}}",
            Placeholder::Version => "{{Version}}",
            Placeholder::Namespace => "{{Namespace}}",
            Placeholder::ProjectId => "{{ProjectId}}",
            Placeholder::CorsUrls => "{{CorsUrls}}",
        }
    }
}

/// Values to substitute, keyed by placeholder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaceholderMap {
    values: BTreeMap<Placeholder, String>,
}

impl PlaceholderMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set one placeholder.
    pub fn with(mut self, key: Placeholder, value: impl Into<String>) -> Self {
        self.values.insert(key, value.into());
        self
    }

    /// Builder method: set a placeholder only when a value is present.
    pub fn with_opt(self, key: Placeholder, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.with(key, v),
            None => self,
        }
    }

    pub fn get(&self, key: Placeholder) -> Option<&str> {
        self.values.get(&key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Placeholder, &str)> {
        self.values.iter().map(|(k, v)| (*k, v.as_str()))
    }
}

/// Loads templates from disk and renders them.
#[derive(Debug, Clone, Default)]
pub struct TemplateRenderer {
    /// Relative template paths are resolved against this directory.
    base_dir: Option<PathBuf>,
}

impl TemplateRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Read a template file and render it.
    ///
    /// The read is blocking.
    pub fn render(&self, path: &Path, placeholders: &PlaceholderMap) -> TemplateResult<String> {
        let resolved = self.resolve(path);
        let raw = std::fs::read_to_string(&resolved).map_err(|source| TemplateError::Read {
            path: resolved.clone(),
            source,
        })?;
        let rendered = render_str(&raw, placeholders)?;

        let unresolved = unresolved_placeholders(&rendered)?;
        if !unresolved.is_empty() {
            warn!(template = ?resolved, ?unresolved, "template rendered with unresolved placeholders");
        }
        debug!(template = ?resolved, bytes = rendered.len(), "template rendered");
        Ok(rendered)
    }
}

/// Unescape, then substitute every supplied placeholder.
pub fn render_str(raw: &str, placeholders: &PlaceholderMap) -> TemplateResult<String> {
    let mut content = unescape(raw)?;
    for (key, value) in placeholders.iter() {
        content = content.replace(key.token(), value);
    }
    Ok(content)
}

/// Tokens still shaped like `{{Name}}` after rendering.
pub fn unresolved_placeholders(text: &str) -> TemplateResult<Vec<String>> {
    let re = Regex::new(r"\{\{[A-Za-z]+\}\}")?;
    let mut found: Vec<String> = re.find_iter(text).map(|m| m.as_str().to_string()).collect();
    found.sort();
    found.dedup();
    Ok(found)
}

/// Resolve backslash escapes: `\n`, `\r`, `\t`, `\0`, `\xNN`, `\uNNNN`, and
/// `\c` → `c` for any other character. A trailing lone backslash is kept.
/// A UTF-16 surrogate pair written as two `\u` escapes decodes to one char;
/// an unpaired surrogate is an error.
pub fn unescape(raw: &str) -> TemplateResult<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.char_indices();

    while let Some((offset, c)) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some((_, next)) = chars.next() else {
            out.push('\\');
            break;
        };
        match next {
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            '0' => out.push('\0'),
            'x' | 'u' => {
                let width = if next == 'x' { 2 } else { 4 };
                let (digits, unit) = hex_unit(&mut chars, width);
                let decoded = match unit {
                    Some(high @ 0xD800..=0xDBFF) if next == 'u' => {
                        low_surrogate(&mut chars).and_then(|low| {
                            char::from_u32(0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00))
                        })
                    }
                    Some(unit) => char::from_u32(unit),
                    None => None,
                };
                match decoded {
                    Some(ch) => out.push(ch),
                    None => {
                        return Err(TemplateError::Escape {
                            offset,
                            sequence: format!("\\{next}{digits}"),
                        });
                    }
                }
            }
            other => out.push(other),
        }
    }
    Ok(out)
}

/// Read `width` hex digits. The value is `None` unless all of them parse.
fn hex_unit(chars: &mut CharIndices<'_>, width: usize) -> (String, Option<u32>) {
    let digits: String = chars.by_ref().take(width).map(|(_, d)| d).collect();
    let unit = u32::from_str_radix(&digits, 16)
        .ok()
        .filter(|_| digits.len() == width);
    (digits, unit)
}

/// Consume a `\uDC00`..`\uDFFF` escape if one follows; otherwise leave
/// `chars` untouched.
fn low_surrogate(chars: &mut CharIndices<'_>) -> Option<u32> {
    let mut ahead = chars.clone();
    if ahead.next()?.1 != '\\' || ahead.next()?.1 != 'u' {
        return None;
    }
    let (_, unit) = hex_unit(&mut ahead, 4);
    let low = unit.filter(|u| (0xDC00..=0xDFFF).contains(u))?;
    *chars = ahead;
    Some(low)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn full_map() -> PlaceholderMap {
        PlaceholderMap::new()
            .with(Placeholder::TenantId, "acme")
            .with(Placeholder::Version, "1")
            .with(Placeholder::Namespace, "tenant-apps")
            .with(Placeholder::ProjectId, "7f1c")
            .with(Placeholder::CorsUrls, "https://a.example.com,https://b.example.com")
    }

    #[test]
    fn substitutes_every_placeholder_and_keeps_other_bytes() {
        let template = "{\n  \"App\": \"{{TenantId}}\",\n  \"Ver\": \"{{Version}}\",\n  \"Ns\": \"{{Namespace}}\",\n  \"Project\": \"{{ProjectId}}\",\n  \"Cors\": \"{{CorsUrls}}\"\n}\n";
        let rendered = render_str(template, &full_map()).unwrap();
        assert_eq!(
            rendered,
            "{\n  \"App\": \"acme\",\n  \"Ver\": \"1\",\n  \"Ns\": \"tenant-apps\",\n  \"Project\": \"7f1c\",\n  \"Cors\": \"https://a.example.com,https://b.example.com\"\n}\n"
        );
    }

    #[test]
    fn replaces_repeated_occurrences() {
        let rendered = render_str("{{TenantId}}/{{TenantId}}", &full_map()).unwrap();
        assert_eq!(rendered, "acme/acme");
    }

    #[test]
    fn supplied_key_missing_from_template_is_noop() {
        let rendered = render_str("plain text", &full_map()).unwrap();
        assert_eq!(rendered, "plain text");
    }

    #[test]
    fn unsupplied_placeholder_passes_through() {
        let map = PlaceholderMap::new().with(Placeholder::TenantId, "acme");
        let rendered = render_str("{{TenantId}} {{CorsUrls}}", &map).unwrap();
        assert_eq!(rendered, "acme {{CorsUrls}}");
        assert_eq!(unresolved_placeholders(&rendered).unwrap(), vec!["{{CorsUrls}}"]);
    }

    #[test]
    fn with_opt_skips_none() {
        let map = PlaceholderMap::new().with_opt(Placeholder::ProjectId, None);
        assert_eq!(map.get(Placeholder::ProjectId), None);
    }

    #[test]
    fn unescapes_before_substitution() {
        let rendered = render_str(r#"a\tb\n\"{{TenantId}}\"A\\"#, &full_map()).unwrap();
        assert_eq!(rendered, "a\tb\n\"acme\"A\\");
    }

    #[test]
    fn unknown_escape_drops_backslash() {
        assert_eq!(unescape(r"\[x\]").unwrap(), "[x]");
        assert_eq!(unescape("tail\\").unwrap(), "tail\\");
    }

    #[test]
    fn bad_unicode_escape_is_error() {
        let err = unescape(r"\uZZ").unwrap_err();
        assert!(matches!(err, TemplateError::Escape { offset: 0, .. }));
    }

    #[test]
    fn surrogate_pair_decodes_to_one_char() {
        assert_eq!(unescape(r"\uD83D\uDE00").unwrap(), "😀");
        assert_eq!(unescape(r"a\uD83D\uDE00b").unwrap(), "a😀b");
    }

    #[test]
    fn unpaired_surrogate_is_error() {
        let err = unescape(r"x\uD83D").unwrap_err();
        assert!(matches!(err, TemplateError::Escape { offset: 1, ref sequence } if sequence == r"\uD83D"));
        assert!(unescape(r"\uD83Dx").is_err());
        assert!(unescape(r"\uD83DA").is_err());
        assert!(unescape(r"\uDE00").is_err());
    }

    #[test]
    fn render_reads_relative_to_base_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("appsettings.json")).unwrap();
        write!(file, "{{\"Tenant\": \"{{{{TenantId}}}}\"}}").unwrap();

        let renderer = TemplateRenderer::with_base_dir(dir.path());
        let rendered = renderer
            .render(Path::new("appsettings.json"), &full_map())
            .unwrap();
        assert_eq!(rendered, "{\"Tenant\": \"acme\"}");
    }

    #[test]
    fn missing_template_is_read_error() {
        let renderer = TemplateRenderer::new();
        let err = renderer
            .render(Path::new("/nonexistent/stackgrid/template.json"), &full_map())
            .unwrap_err();
        assert!(matches!(err, TemplateError::Read { .. }));
    }
}
