//! Computes the ordered subset of discovered versions to apply.
//!
//! Version identifiers are compared as plain strings. This is deliberate:
//! callers compensate with zero-padded naming (`0001`, `0002`, ...), and the
//! ledger's current-version read uses the same lexical ordering, so the two
//! always agree.

/// Compute the migration plan.
///
/// All discovered `versions` are sorted lexically ascending; a version is
/// included iff it is beyond `current` (all versions when `current` is
/// `None`) and not beyond the optional `target` ceiling. The result is
/// re-sorted before returning.
///
/// # Example
/// ```
/// use migradir::plan;
///
/// let versions = ["0003", "0001", "0002"];
/// assert_eq!(plan(versions, Some("0001"), None), vec!["0002", "0003"]);
/// assert_eq!(plan(versions, None, Some("0002")), vec!["0001", "0002"]);
/// ```
pub fn plan<'a>(
    versions: impl IntoIterator<Item = &'a str>,
    current: Option<&str>,
    target: Option<&str>,
) -> Vec<String> {
    let mut candidates: Vec<String> = versions
        .into_iter()
        .filter(|v| match current {
            Some(current) => *v > current,
            None => true,
        })
        .filter(|v| match target {
            Some(target) => *v <= target,
            None => true,
        })
        .map(str::to_string)
        .collect();
    candidates.sort();
    candidates
}
