//! Presentation-side masking for values a caller may know exist but not
//! read in full.
//!
//! ## Styles
//!
//! | Style   | Description                        |
//! |---------|------------------------------------|
//! | Partial | Keep the last 4 characters visible |
//! | Full    | Replace every character with `*`   |

use serde::{Deserialize, Serialize};

/// How much of the value survives masking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaskStyle {
    /// Last 4 characters visible; everything shorter is fully starred.
    Partial,
    /// Every character replaced.
    Full,
}

/// Masks a value for display.
///
/// `"123-45-6789"` with [`MaskStyle::Partial`] becomes `"*******6789"`.
pub fn mask(value: &str, style: MaskStyle) -> String {
    let len = value.chars().count();
    match style {
        MaskStyle::Full => "*".repeat(len),
        MaskStyle::Partial => {
            if len <= 4 {
                "*".repeat(len)
            } else {
                let visible: String = value.chars().skip(len - 4).collect();
                format!("{}{visible}", "*".repeat(len - 4))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("123-45-6789", MaskStyle::Partial, "*******6789"; "partial ssn")]
    #[test_case("1234", MaskStyle::Partial, "****"; "partial short value")]
    #[test_case("ab", MaskStyle::Partial, "**"; "partial tiny value")]
    #[test_case("secret", MaskStyle::Full, "******"; "full")]
    #[test_case("", MaskStyle::Full, ""; "empty")]
    fn test_mask(value: &str, style: MaskStyle, expected: &str) {
        assert_eq!(mask(value, style), expected);
    }

    #[test]
    fn test_mask_counts_chars_not_bytes() {
        assert_eq!(mask("äöüäöü", MaskStyle::Partial), "**üäöü");
    }
}
