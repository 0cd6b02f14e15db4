use serde::{Deserialize, Deserializer};

/// Characters stripped from user-supplied metadata before it is
/// stored or embedded in generated markup.
const STRIPPED: &[char] = &['<', '>', '"', '\'', '&'];

/// The maximum length of a sanitized metadata field, in characters.
const MAX_FIELD_LENGTH: usize = 100;

/// Normalizes a name by stripping any whitespace and decomposing it
/// into Unicode Normalization Form D.
///
/// ```
/// use beatschain::normalization::normalize_name;
/// assert_eq!(normalize_name(" hï "), "hi\u{308}");
/// ```
pub fn normalize_name(name: impl AsRef<str>) -> String {
    use unicode_normalization::UnicodeNormalization;

    name.as_ref().trim().nfd().to_string()
}

/// Sanitizes a metadata field such as a track title or artist name:
/// normalizes it, removes markup-significant characters and caps it
/// at [`MAX_FIELD_LENGTH`] characters.
///
/// ```
/// use beatschain::normalization::sanitize_field;
/// assert_eq!(sanitize_field("<b>Song</b> 'Title'"), "bSong/b Title");
/// ```
pub fn sanitize_field(value: impl AsRef<str>) -> String {
    normalize_name(value)
        .chars()
        .filter(|c| !STRIPPED.contains(c))
        .take(MAX_FIELD_LENGTH)
        .collect::<String>()
        .trim()
        .to_owned()
}

/// Deserializes a `String` after running it through `sanitize_field`.
pub fn deserialize<'de, D>(deserializer: D) -> Result<String, D::Error>
where D: Deserializer<'de> {
    let s: String = Deserialize::deserialize(deserializer)?;
    Ok(sanitize_field(s))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use unicode_normalization::is_nfd;

    use super::{normalize_name, sanitize_field, MAX_FIELD_LENGTH, STRIPPED};

    fn count_whitespace(s: impl AsRef<str>) -> usize {
        s.as_ref().chars().filter(|c| c.is_whitespace()).count()
    }

    #[test]
    fn sanitization_strips_markup_characters() {
        assert_eq!(sanitize_field("  <b>Song</b> 'Title'  "), "bSong/b Title");
        assert_eq!(sanitize_field("Say \"Hello\" & Goodbye"), "Say Hello  Goodbye");
        assert_eq!(sanitize_field("<>\"'&"), "");
    }

    #[test]
    fn sanitization_caps_length() {
        let long = "a".repeat(3 * MAX_FIELD_LENGTH);
        assert_eq!(sanitize_field(&long).chars().count(), MAX_FIELD_LENGTH);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 10000, ..ProptestConfig::default()
        })]

        #[test]
        fn normalization_works(string in "(\\S.*\\S|\\S+)", space_before in "\\s*", space_after in "\\s*") {
            let normalized = normalize_name(format!("{}{}{}", space_before, string, space_after));

            prop_assert!(is_nfd(&normalized), "{:?} (normalized form of {:?}) is in NFD", normalized, string);

            prop_assert!(!normalized.starts_with(char::is_whitespace) && !normalized.ends_with(char::is_whitespace), "{:?} (normalized form of {:?}) has no leading or trailing whitespace", normalized, string);

            let trimmed = normalized.trim();

            prop_assert_eq!(count_whitespace(&normalized), count_whitespace(&trimmed), "{:?} (normalized form of {:?}) preserves inner whitespace", normalized, string);
        }

        #[test]
        fn sanitization_works(string in ".*") {
            let sanitized = sanitize_field(&string);

            prop_assert!(!sanitized.contains(STRIPPED), "{:?} (sanitized form of {:?}) contains no markup characters", sanitized, string);

            prop_assert!(sanitized.chars().count() <= MAX_FIELD_LENGTH, "{:?} (sanitized form of {:?}) fits the length cap", sanitized, string);

            prop_assert!(!sanitized.starts_with(char::is_whitespace) && !sanitized.ends_with(char::is_whitespace), "{:?} (sanitized form of {:?}) has no leading or trailing whitespace", sanitized, string);

            prop_assert_eq!(&sanitize_field(&sanitized), &sanitized, "sanitizing {:?} again changes nothing", sanitized);
        }
    }
}
