//! Registrable-domain heuristic.
//!
//! The "registrable domain" of a hostname is taken to be its last two
//! dot-separated labels. Multi-label public suffixes such as `co.uk` are not
//! recognised: `x.co.uk` and `y.co.uk` both reduce to `co.uk` and compare
//! equal. Callers rely on this exact behaviour, so it is not corrected here.

/// Return the last two dot-separated labels of `hostname`.
///
/// Hostnames with fewer than two labels are returned unchanged. No case
/// folding, IDN conversion or trailing-dot handling is applied.
///
/// Example: `"mail-api.pascal.proton.black"` -> `"proton.black"`
#[must_use]
pub fn registrable_domain(hostname: &str) -> &str {
    let mut dots = hostname.rmatch_indices('.');
    match (dots.next(), dots.next()) {
        (Some(_), Some((second_last, _))) => &hostname[second_last + 1..],
        _ => hostname,
    }
}

/// True when both hostnames share the same registrable domain.
#[must_use]
pub fn domains_equal(a: &str, b: &str) -> bool {
    registrable_domain(a) == registrable_domain(b)
}
