//! Font resolution over an ordered fallback chain of remote sources.
//!
//! Resolution runs once per conversion. Each source is fetched with its own
//! timeout, decoded, and validated; the first usable font wins. When every
//! source fails the resolver settles on [`DEFAULT_FONT_NAME`] and never errors.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::FontError;

/// Built-in font used when no source yields a usable face.
pub const DEFAULT_FONT_NAME: &str = "helvetica";

/// Per-source fetch timeout.
pub const DEFAULT_FONT_TIMEOUT: Duration = Duration::from_secs(10);

/// Family registered for the bundled CJK sources.
pub const SIMHEI_FAMILY: &str = "SimHei";

/// Primary CDN location of the SimHei font module.
pub const SIMHEI_PRIMARY_URL: &str =
    "https://cdn.jsdelivr.net/gh/kaienfr/Font@master/font/simhei/simhei-normal.js";

/// Backup location of the SimHei font module.
pub const SIMHEI_BACKUP_URL: &str =
    "https://raw.githubusercontent.com/kaienfr/Font/master/font/simhei/simhei-normal.js";

/// Encoding of a fetched font payload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FontPayloadFormat {
    /// Raw TrueType/OpenType bytes.
    Binary,
    /// Base64 text of the font file.
    Base64,
    /// JavaScript module embedding the base64 font as a string literal.
    #[default]
    ScriptModule,
}

impl FontPayloadFormat {
    /// Decode a fetched payload into font file bytes.
    pub fn decode(self, payload: &[u8]) -> Result<Vec<u8>, FontError> {
        match self {
            Self::Binary => {
                if payload.is_empty() {
                    return Err(FontError::payload("empty font payload"));
                }
                Ok(payload.to_vec())
            }
            Self::Base64 => {
                let text = core::str::from_utf8(payload)
                    .map_err(|_| FontError::payload("base64 payload is not UTF-8"))?;
                decode_base64(text)
            }
            Self::ScriptModule => {
                let text = String::from_utf8_lossy(payload);
                let literal = longest_string_literal(&text)
                    .ok_or_else(|| FontError::payload("no string literal in font module"))?;
                decode_base64(literal)
            }
        }
    }
}

fn decode_base64(text: &str) -> Result<Vec<u8>, FontError> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Err(FontError::payload("empty base64 payload"));
    }
    base64::engine::general_purpose::STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| FontError::payload(format!("invalid base64: {}", e)))
}

/// Longest `'..'`, `".."`, or `` `..` `` literal body in a script.
///
/// Escapes are skipped over, not interpreted; base64 never contains them.
fn longest_string_literal(script: &str) -> Option<&str> {
    let bytes = script.as_bytes();
    let mut best: Option<(usize, usize)> = None;
    let mut i = 0usize;
    while i < bytes.len() {
        let quote = bytes[i];
        if quote != b'\'' && quote != b'"' && quote != b'`' {
            i += 1;
            continue;
        }
        let start = i + 1;
        let mut j = start;
        let mut closed = false;
        while j < bytes.len() {
            match bytes[j] {
                b'\\' => j += 2,
                b if b == quote => {
                    closed = true;
                    break;
                }
                _ => j += 1,
            }
        }
        if !closed {
            break;
        }
        let len = j - start;
        if best.is_none_or(|(s, e)| e - s < len) {
            best = Some((start, j));
        }
        i = j + 1;
    }
    best.and_then(|(s, e)| script.get(s..e))
}

/// One entry of the fallback chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FontSource {
    /// Short label used in logs and traces.
    pub name: String,
    /// Family name the font is registered under when this source wins.
    pub family: String,
    /// Fetch location.
    pub url: String,
    /// Per-attempt timeout in milliseconds.
    pub timeout_ms: u64,
    /// Payload encoding.
    pub format: FontPayloadFormat,
}

impl FontSource {
    /// Source with the default timeout and script-module payload.
    pub fn new(name: impl Into<String>, family: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            family: family.into(),
            url: url.into(),
            timeout_ms: DEFAULT_FONT_TIMEOUT.as_millis() as u64,
            format: FontPayloadFormat::default(),
        }
    }

    /// Override the payload format.
    pub fn with_format(mut self, format: FontPayloadFormat) -> Self {
        self.format = format;
        self
    }

    /// Override the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// The two SimHei sources, CDN first.
    pub fn simhei_defaults() -> Vec<Self> {
        vec![
            Self::new("simhei-cdn", SIMHEI_FAMILY, SIMHEI_PRIMARY_URL),
            Self::new("simhei-github", SIMHEI_FAMILY, SIMHEI_BACKUP_URL),
        ]
    }
}

/// Transport used to fetch font payloads.
pub trait FontFetcher {
    /// Fetch `url`, giving up after `timeout`.
    fn fetch(&mut self, url: &str, timeout: Duration) -> Result<Vec<u8>, FontError>;
}

impl<F> FontFetcher for F
where
    F: FnMut(&str, Duration) -> Result<Vec<u8>, FontError>,
{
    fn fetch(&mut self, url: &str, timeout: Duration) -> Result<Vec<u8>, FontError> {
        self(url, timeout)
    }
}

/// Fetcher with no transport; every attempt fails.
#[derive(Clone, Copy, Debug, Default)]
pub struct OfflineFetcher;

impl FontFetcher for OfflineFetcher {
    fn fetch(&mut self, url: &str, _timeout: Duration) -> Result<Vec<u8>, FontError> {
        Err(FontError::unavailable("offline mode").with_url(url))
    }
}

/// Blocking HTTP fetcher backed by `ureq`.
#[cfg(feature = "http")]
#[derive(Clone, Copy, Debug, Default)]
pub struct HttpFontFetcher;

#[cfg(feature = "http")]
impl FontFetcher for HttpFontFetcher {
    fn fetch(&mut self, url: &str, timeout: Duration) -> Result<Vec<u8>, FontError> {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();
        let agent: ureq::Agent = config.into();
        let mut response = agent.get(url).call().map_err(|e| match e {
            ureq::Error::StatusCode(code) => FontError::status(code).with_url(url),
            ureq::Error::Timeout(which) => {
                FontError::timeout(format!("timeout: {}", which)).with_url(url)
            }
            other => FontError::network(other.to_string()).with_url(url),
        })?;
        response
            .body_mut()
            .with_config()
            .limit(64 * 1024 * 1024)
            .read_to_vec()
            .map_err(|e| FontError::network(e.to_string()).with_url(url))
    }
}

/// Acceptance check for decoded font bytes.
pub trait FontValidator {
    fn validate(&self, bytes: &[u8]) -> Result<(), FontError>;
}

/// Accepts bytes that parse as a TrueType/OpenType face.
#[derive(Clone, Copy, Debug, Default)]
pub struct TtfFontValidator;

impl FontValidator for TtfFontValidator {
    fn validate(&self, bytes: &[u8]) -> Result<(), FontError> {
        ttf_parser::Face::parse(bytes, 0)
            .map(|_| ())
            .map_err(|e| FontError::invalid_font(e.to_string()))
    }
}

/// Active font for every draw call of one conversion.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FontHandle {
    /// Family name draw calls use.
    pub canonical_name: String,
    /// Whether the face came from a fetched source.
    pub loaded: bool,
    /// Index of the winning source; `None` for the built-in default.
    pub source_priority: Option<usize>,
    /// Validated font file bytes for loaded faces.
    #[serde(skip)]
    pub data: Option<Arc<[u8]>>,
}

impl FontHandle {
    /// Handle for a built-in font name.
    pub fn builtin(name: impl Into<String>) -> Self {
        Self {
            canonical_name: name.into(),
            loaded: false,
            source_priority: None,
            data: None,
        }
    }
}

impl Default for FontHandle {
    fn default() -> Self {
        Self::builtin(DEFAULT_FONT_NAME)
    }
}

/// Resolver result with the per-attempt reasoning chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FontResolution {
    pub handle: FontHandle,
    pub reason_chain: Vec<String>,
    /// Failures in attempt order, keyed by source index.
    pub failures: Vec<(usize, FontError)>,
}

/// Ordered fallback chain over font sources.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FontResolver {
    sources: Vec<FontSource>,
    default_font: String,
}

impl Default for FontResolver {
    fn default() -> Self {
        Self::new(FontSource::simhei_defaults())
    }
}

impl FontResolver {
    /// Resolver over `sources`, tried in order.
    pub fn new(sources: Vec<FontSource>) -> Self {
        Self {
            sources,
            default_font: DEFAULT_FONT_NAME.to_string(),
        }
    }

    /// Override the final fallback font name.
    pub fn with_default_font(mut self, name: impl Into<String>) -> Self {
        self.default_font = name.into();
        self
    }

    /// Append a lower-priority source.
    pub fn push_source(&mut self, source: FontSource) {
        self.sources.push(source);
    }

    pub fn sources(&self) -> &[FontSource] {
        &self.sources
    }

    pub fn default_font(&self) -> &str {
        &self.default_font
    }

    /// Resolve with `ttf-parser` validation.
    pub fn resolve<F: FontFetcher + ?Sized>(&self, fetcher: &mut F) -> FontResolution {
        self.resolve_with(fetcher, &TtfFontValidator)
    }

    /// Resolve with an explicit validator.
    pub fn resolve_with<F, V>(&self, fetcher: &mut F, validator: &V) -> FontResolution
    where
        F: FontFetcher + ?Sized,
        V: FontValidator + ?Sized,
    {
        let mut reasons = Vec::with_capacity(self.sources.len() + 1);
        let mut failures = Vec::new();
        for (idx, source) in self.sources.iter().enumerate() {
            log::debug!(
                "[font] trying source {} '{}' ({})",
                idx,
                source.name,
                source.url
            );
            match self.attempt(source, fetcher, validator) {
                Ok(bytes) => {
                    log::info!(
                        "[font] loaded '{}' from source '{}' ({} bytes)",
                        source.family,
                        source.name,
                        bytes.len()
                    );
                    reasons.push(format!(
                        "source '{}' loaded family '{}'",
                        source.name, source.family
                    ));
                    return FontResolution {
                        handle: FontHandle {
                            canonical_name: source.family.clone(),
                            loaded: true,
                            source_priority: Some(idx),
                            data: Some(Arc::from(bytes)),
                        },
                        reason_chain: reasons,
                        failures,
                    };
                }
                Err(err) => {
                    log::warn!("[font] source '{}' failed: {}", source.name, err);
                    reasons.push(format!("source '{}' failed: {}", source.name, err));
                    failures.push((idx, err));
                }
            }
        }
        log::warn!(
            "[font] all {} font sources failed; falling back to '{}'",
            self.sources.len(),
            self.default_font
        );
        reasons.push(format!("fallback to default font '{}'", self.default_font));
        FontResolution {
            handle: FontHandle::builtin(self.default_font.clone()),
            reason_chain: reasons,
            failures,
        }
    }

    fn attempt<F, V>(
        &self,
        source: &FontSource,
        fetcher: &mut F,
        validator: &V,
    ) -> Result<Vec<u8>, FontError>
    where
        F: FontFetcher + ?Sized,
        V: FontValidator + ?Sized,
    {
        let payload = fetcher.fetch(&source.url, source.timeout())?;
        let bytes = source
            .format
            .decode(&payload)
            .map_err(|e| e.with_url(source.url.clone()))?;
        validator
            .validate(&bytes)
            .map_err(|e| e.with_url(source.url.clone()))?;
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FontErrorKind;

    struct PrefixValidator;

    impl FontValidator for PrefixValidator {
        fn validate(&self, bytes: &[u8]) -> Result<(), FontError> {
            if bytes.starts_with(b"FONT") {
                Ok(())
            } else {
                Err(FontError::invalid_font("missing FONT magic"))
            }
        }
    }

    fn module_for(bytes: &[u8]) -> Vec<u8> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        format!(
            "(function (jsPDF) {{ var font = '{}'; var callAddFont = function () {{ this.addFileToVFS('simhei-normal.ttf', font); }}; }})(jsPDF.API);",
            encoded
        )
        .into_bytes()
    }

    fn two_sources() -> Vec<FontSource> {
        vec![
            FontSource::new("primary", "SimHei", "https://primary.test/font.js"),
            FontSource::new("backup", "SimHei", "https://backup.test/font.js"),
        ]
    }

    #[test]
    fn primary_failure_falls_through_to_backup() {
        let mut calls = Vec::new();
        let mut fetcher = |url: &str, timeout: Duration| {
            calls.push((url.to_string(), timeout));
            if url.contains("primary") {
                Err(FontError::timeout("timed out"))
            } else {
                Ok(module_for(b"FONTDATA"))
            }
        };
        let resolution =
            FontResolver::new(two_sources()).resolve_with(&mut fetcher, &PrefixValidator);

        assert_eq!(resolution.handle.canonical_name, "SimHei");
        assert!(resolution.handle.loaded);
        assert_eq!(resolution.handle.source_priority, Some(1));
        assert_eq!(resolution.handle.data.as_deref(), Some(&b"FONTDATA"[..]));
        assert_eq!(resolution.failures.len(), 1);
        assert_eq!(resolution.failures[0].1.kind, FontErrorKind::Timeout);
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|(_, t)| *t == DEFAULT_FONT_TIMEOUT));
    }

    #[test]
    fn first_success_stops_the_chain() {
        let mut calls = 0usize;
        let mut fetcher = |_url: &str, _timeout: Duration| {
            calls += 1;
            Ok(module_for(b"FONT-1"))
        };
        let resolution =
            FontResolver::new(two_sources()).resolve_with(&mut fetcher, &PrefixValidator);
        assert_eq!(resolution.handle.source_priority, Some(0));
        assert_eq!(calls, 1);
    }

    #[test]
    fn all_failures_fall_back_to_default() {
        let mut fetcher = |url: &str, _timeout: Duration| {
            if url.contains("primary") {
                Err(FontError::status(404))
            } else {
                Ok(module_for(b"not a font"))
            }
        };
        let resolution =
            FontResolver::new(two_sources()).resolve_with(&mut fetcher, &PrefixValidator);

        assert_eq!(resolution.handle, FontHandle::builtin(DEFAULT_FONT_NAME));
        assert!(!resolution.handle.loaded);
        assert_eq!(resolution.failures.len(), 2);
        assert_eq!(resolution.failures[1].1.kind, FontErrorKind::InvalidFont);
        assert_eq!(resolution.reason_chain.len(), 3);
        assert!(resolution.reason_chain[2].contains("helvetica"));
    }

    #[test]
    fn offline_fetcher_and_empty_chain_resolve_to_default() {
        let resolution = FontResolver::default().resolve(&mut OfflineFetcher);
        assert_eq!(resolution.handle.canonical_name, DEFAULT_FONT_NAME);
        assert_eq!(resolution.failures.len(), 2);
        assert!(resolution
            .failures
            .iter()
            .all(|(_, e)| e.kind == FontErrorKind::Unavailable));

        let empty = FontResolver::new(Vec::new())
            .with_default_font("courier")
            .resolve(&mut OfflineFetcher);
        assert_eq!(empty.handle.canonical_name, "courier");
        assert!(empty.failures.is_empty());
    }

    #[test]
    fn sources_are_extensible_and_keep_order() {
        let mut resolver = FontResolver::new(Vec::new());
        resolver.push_source(FontSource::new("a", "A", "https://a.test"));
        resolver.push_source(
            FontSource::new("b", "B", "https://b.test").with_format(FontPayloadFormat::Binary),
        );
        let mut seen = Vec::new();
        let mut fetcher = |url: &str, _timeout: Duration| {
            seen.push(url.to_string());
            if url.contains("b.test") {
                Ok(b"FONTB".to_vec())
            } else {
                Err(FontError::network("refused"))
            }
        };
        let resolution = resolver.resolve_with(&mut fetcher, &PrefixValidator);
        assert_eq!(seen, vec!["https://a.test", "https://b.test"]);
        assert_eq!(resolution.handle.canonical_name, "B");
    }

    #[test]
    fn payload_formats_decode() {
        assert_eq!(
            FontPayloadFormat::Base64
                .decode(b"Rk9O\nVA==")
                .expect("base64 decodes"),
            b"FONT".to_vec()
        );
        assert_eq!(
            FontPayloadFormat::ScriptModule
                .decode(&module_for(b"FONTBYTES"))
                .expect("module decodes"),
            b"FONTBYTES".to_vec()
        );
        assert_eq!(
            FontPayloadFormat::ScriptModule
                .decode(b"var x = 1;")
                .expect_err("no literal")
                .kind,
            FontErrorKind::Payload
        );
        assert!(FontPayloadFormat::Binary.decode(b"").is_err());
    }

    #[test]
    fn longest_literal_skips_escapes() {
        let script = r#"var a = "x\"y"; var b = 'longer one';"#;
        assert_eq!(longest_string_literal(script), Some("longer one"));
        assert_eq!(longest_string_literal("no quotes"), None);
    }

    #[test]
    fn ttf_validator_rejects_garbage() {
        let err = TtfFontValidator
            .validate(b"definitely not a font file")
            .expect_err("garbage rejected");
        assert_eq!(err.kind, FontErrorKind::InvalidFont);
    }

    #[test]
    fn simhei_defaults_match_known_locations() {
        let sources = FontSource::simhei_defaults();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].url, SIMHEI_PRIMARY_URL);
        assert_eq!(sources[1].url, SIMHEI_BACKUP_URL);
        assert_eq!(sources[0].timeout(), Duration::from_secs(10));
    }
}
