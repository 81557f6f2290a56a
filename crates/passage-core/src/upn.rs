//! User principal name helpers.
//!
//! Imported users keep the local part of their UPN but take the domain of
//! the tenant that owns them, so the same transformation runs in both
//! directions: legacy → replacement during import, replacement → legacy when
//! the sign-in webhook validates credentials against the legacy tenant.

/// Replaces the domain of a UPN, keeping the local part.
///
/// A value without an `@` is returned unchanged; it is not a UPN this
/// system can re-domain.
#[must_use]
pub fn with_domain(upn: &str, domain: &str) -> String {
    match upn.find('@') {
        Some(at) => format!("{}@{}", &upn[..at], domain),
        None => upn.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_domain() {
        assert_eq!(
            with_domain("jo@replacement.example", "legacy.example"),
            "jo@legacy.example"
        );
    }

    #[test]
    fn keeps_local_part_with_dots_and_guids() {
        assert_eq!(
            with_domain(
                "047102b7-221a-4fcf-9bf6-a179e37efd62@replacement.example",
                "legacy.example"
            ),
            "047102b7-221a-4fcf-9bf6-a179e37efd62@legacy.example"
        );
    }

    #[test]
    fn passes_through_values_without_at() {
        assert_eq!(with_domain("not-a-upn", "legacy.example"), "not-a-upn");
    }
}
