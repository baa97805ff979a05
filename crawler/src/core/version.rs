//! Loose version comparison used by the freshness pass.

/// Leading numeric component of a version string (`^4.17.1` → 4).
pub fn leading_number(version: &str) -> Option<u64> {
    let digits: String = version
        .trim()
        .trim_start_matches(|ch: char| !ch.is_ascii_digit())
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

/// True when `installed` differs from `latest` and its leading number is lower.
///
/// Only the leading component is compared; no range solving.
pub fn is_outdated(installed: &str, latest: &str) -> bool {
    if installed.trim() == latest.trim() {
        return false;
    }
    match (leading_number(installed), leading_number(latest)) {
        (Some(local), Some(remote)) => local < remote,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leading_number_skips_range_prefixes() {
        assert_eq!(leading_number("4.17.21"), Some(4));
        assert_eq!(leading_number("^12.0.0"), Some(12));
        assert_eq!(leading_number("v0.3"), Some(0));
        assert_eq!(leading_number("latest"), None);
    }

    #[test]
    fn lower_major_is_outdated() {
        assert!(is_outdated("3.9.9", "4.0.0"));
        assert!(!is_outdated("4.0.0", "4.0.0"));
        assert!(!is_outdated("5.0.0", "4.0.0"));
    }

    #[test]
    fn same_major_is_not_flagged() {
        assert!(!is_outdated("4.1.0", "4.2.0"));
    }

    #[test]
    fn unparseable_versions_are_not_flagged() {
        assert!(!is_outdated("git+ssh://x", "1.0.0"));
    }
}
