//! Locale negotiation.
//!
//! Given the locale token from a request path, the client's parsed
//! language preferences and the configured supported set, decide which
//! locale actually serves the request and whether the client must be
//! redirected to the canonical locale-qualified URL.
//!
//! The algorithm is a pure function: it holds no state and takes the
//! supported set and default as arguments, so callers can snapshot those
//! under their own locking and negotiate without holding anything.

use unic_langid::LanguageIdentifier;

use crate::locale;

/// Outcome of a negotiation pass.
///
/// The three flags are independent: `valid` reports only on the primary
/// token's parseability, `matched` on whether any supported locale was
/// found (by the token or a preference), and `exact` on whether the match
/// needed no ancestor walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Negotiation {
    /// The locale that will serve the request.
    pub locale: LanguageIdentifier,
    /// A supported locale was found; false means the default was used.
    pub matched: bool,
    /// The primary token parsed as a locale tag. Empty tokens are invalid.
    pub valid: bool,
    /// The match happened at the requested locale itself, not an ancestor.
    pub exact: bool,
}

impl Negotiation {
    /// Whether the request must be redirected to the canonical path for
    /// the resolved locale. Only a fully clean outcome serves in place.
    pub fn needs_redirect(&self) -> bool {
        !self.matched || !self.valid || !self.exact
    }
}

/// Resolve a request against the supported set.
///
/// Priority order: the primary `token` first, then each entry of
/// `preferences` in the order given (callers sort by weight beforehand;
/// weights play no further role here), then `default`. Each candidate is
/// tried with its full ancestor chain before the next candidate is
/// considered, so "en-US" resolves to a supported "en" even when a later
/// preference would have matched exactly.
pub fn negotiate(
    token: &str,
    preferences: &[LanguageIdentifier],
    supported: &[LanguageIdentifier],
    default: &LanguageIdentifier,
) -> Negotiation {
    let parsed: Option<LanguageIdentifier> = if token.is_empty() {
        None
    } else {
        token.parse().ok()
    };
    let valid = parsed.is_some();

    if let Some(requested) = &parsed {
        if let Some((locale, exact)) = find_supported(requested, supported) {
            return Negotiation {
                locale,
                matched: true,
                valid,
                exact,
            };
        }
    }

    for preference in preferences {
        if let Some((locale, exact)) = find_supported(preference, supported) {
            return Negotiation {
                locale,
                matched: true,
                valid,
                exact,
            };
        }
    }

    Negotiation {
        locale: default.clone(),
        matched: false,
        valid,
        exact: false,
    }
}

/// Walk `requested` and its ancestors against the supported set, most
/// specific level first. Within one level the supported set's own order
/// breaks ties: the first listed member wins. Returns the supported
/// member (preserving the configured form) and whether the hit was at
/// level zero.
fn find_supported(
    requested: &LanguageIdentifier,
    supported: &[LanguageIdentifier],
) -> Option<(LanguageIdentifier, bool)> {
    let mut current = requested.clone();
    let mut walked = false;

    loop {
        let wanted = locale::canonical(&current);
        if let Some(found) = supported.iter().find(|s| locale::canonical(s) == wanted) {
            return Some((found.clone(), !walked));
        }
        if locale::is_root(&current) {
            return None;
        }
        current = locale::parent(&current);
        walked = true;
    }
}
