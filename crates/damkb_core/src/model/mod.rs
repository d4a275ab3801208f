//! Knowledge-base domain model.
//!
//! # Responsibility
//! - Define classes, attribute descriptors, objects and visibility maps.
//! - Keep per-kind value validation next to the attribute descriptor.
//!
//! # Invariants
//! - Class, attribute and object ids are plain identifiers (see
//!   [`is_valid_identifier`]).
//! - Root classes own the visibility map; derived classes never do.

pub mod access;
pub mod attribute;
pub mod class;
pub mod object;

use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

/// Maximum length of a class/attribute/object identifier.
pub const MAX_IDENTIFIER_LEN: usize = 64;

static IDENTIFIER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,63}$").expect("valid identifier regex")
});

/// Returns whether `value` is usable as a class, attribute or object id.
///
/// Accepted shape: `[A-Za-z_][A-Za-z0-9_]*`, at most [`MAX_IDENTIFIER_LEN`]
/// characters.
pub fn is_valid_identifier(value: &str) -> bool {
    IDENTIFIER_RE.is_match(value)
}

/// Generates a fresh identifier with the given prefix, e.g. `class_3f2a...`.
pub fn generate_identifier(prefix: &str) -> String {
    format!("{prefix}_{}", Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::{generate_identifier, is_valid_identifier, MAX_IDENTIFIER_LEN};

    #[test]
    fn identifiers_follow_plain_identifier_shape() {
        assert!(is_valid_identifier("asset"));
        assert!(is_valid_identifier("_private_1"));
        assert!(!is_valid_identifier("1asset"));
        assert!(!is_valid_identifier("as-set"));
        assert!(!is_valid_identifier(""));
        assert!(is_valid_identifier(&"a".repeat(MAX_IDENTIFIER_LEN)));
        assert!(!is_valid_identifier(&"a".repeat(MAX_IDENTIFIER_LEN + 1)));
        assert!(!is_valid_identifier("asset\n"));
        assert!(!is_valid_identifier("café"));
    }

    #[test]
    fn generated_identifiers_are_valid_and_unique() {
        let first = generate_identifier("class");
        let second = generate_identifier("class");
        assert!(is_valid_identifier(&first));
        assert!(first.starts_with("class_"));
        assert_ne!(first, second);
    }
}
