//! Locale tag utilities: ancestor derivation, canonical rendering and
//! Accept-Language parsing.
//!
//! A locale's ancestor chain drops the most specific subtag first
//! (variants, then region, then script) and terminates at the root
//! ("und") locale. All map keys and set-membership checks in this crate
//! go through [`canonical`] so different spellings of one tag collide.

use unic_langid::LanguageIdentifier;

use crate::error::{Error, Result};

/// Canonical string form of a locale tag ("en-GB", "und" for the root).
pub fn canonical(locale: &LanguageIdentifier) -> String {
    locale.to_string()
}

/// Parse a tag, mapping failure to [`Error::InvalidLocale`].
pub fn parse(tag: &str) -> Result<LanguageIdentifier> {
    tag.parse()
        .map_err(|_| Error::InvalidLocale(tag.to_string()))
}

/// Set membership by canonical form, so "EN-gb" finds "en-GB".
pub fn contains(set: &[LanguageIdentifier], locale: &LanguageIdentifier) -> bool {
    let wanted = canonical(locale);
    set.iter().any(|member| canonical(member) == wanted)
}

/// True for the root/undefined locale, the terminal of every ancestor chain.
pub fn is_root(locale: &LanguageIdentifier) -> bool {
    *locale == LanguageIdentifier::default()
}

/// The next-more-general locale: strips variants, then region, then script.
/// The parent of a bare language is the root locale.
pub fn parent(locale: &LanguageIdentifier) -> LanguageIdentifier {
    let mut parent = locale.clone();
    if parent.variants().count() > 0 {
        parent.clear_variants();
        return parent;
    }
    if parent.region.take().is_some() {
        return parent;
    }
    if parent.script.take().is_some() {
        return parent;
    }
    LanguageIdentifier::default()
}

/// URL path segment for a locale; the root locale has no segment at all.
pub fn path_segment(locale: &LanguageIdentifier) -> String {
    if is_root(locale) {
        String::new()
    } else {
        locale.to_string()
    }
}

/// Parse an Accept-Language header value into locales ordered by weight.
///
/// Entries with equal weight keep their header order, so a client's own
/// ordering acts as the tie-break. Wildcards and unparseable entries are
/// skipped. A missing q parameter counts as 1.0 per RFC 9110.
pub fn parse_accept_language(header: &str) -> Vec<LanguageIdentifier> {
    let mut weighted: Vec<(LanguageIdentifier, f32)> = Vec::new();

    for entry in header.split(',') {
        let mut parts = entry.trim().split(';');
        let tag = parts.next().unwrap_or("").trim();
        if tag.is_empty() || tag == "*" {
            continue;
        }
        let locale = match tag.parse::<LanguageIdentifier>() {
            Ok(locale) => locale,
            Err(_) => continue,
        };

        let mut quality = 1.0f32;
        for param in parts {
            if let Some(value) = param.trim().strip_prefix("q=") {
                quality = value.trim().parse().unwrap_or(0.0);
            }
        }
        weighted.push((locale, quality));
    }

    // Stable sort keeps header order for equal weights
    weighted.sort_by(|a, b| b.1.total_cmp(&a.1));
    weighted.into_iter().map(|(locale, _)| locale).collect()
}
