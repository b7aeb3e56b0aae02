//! Shared-secret checks for the admin API.

use subtle::ConstantTimeEq;

/// Constant-time equality for API keys. The length check may
/// short-circuit; the content comparison never does, so timing reveals
/// nothing about how much of a presented key matched.
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
