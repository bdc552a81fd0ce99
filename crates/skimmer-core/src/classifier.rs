// ── SOTAmat message classifier ──
//
// Decoders hear everything on the band. Only 13-character texts shaped
// like `<prefix> <station>/<suffix>...` are relayed to the server.

use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};

/// Exact length of every relayable message.
pub const MESSAGE_LENGTH: usize = 13;

static SOTAMAT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(
        r"^(S(T(M(T)?)?|OTAM(T|AT)?)?M?)\s([0-9A-Z]{1,2}[0-9][0-9A-Z]{1,3})((?:/[0-9A-Z]{1,4})+)$",
    )
    .case_insensitive(true)
    .build()
    .expect("SOTAmat pattern is a valid regex")
});

/// A decoded text that matched the SOTAmat grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalSpot {
    /// The text as decoded.
    pub text: String,
    /// Leading token, e.g. `SOTAMAT` or `STM`.
    pub prefix: String,
    /// Station identifier between the space and the first slash.
    pub station: String,
    /// Slash-separated groups after the station, without the slashes.
    pub suffixes: Vec<String>,
}

/// Match `text` against the SOTAmat grammar.
///
/// Wrong-length input is rejected before the pattern runs, even if it
/// would otherwise fit.
pub fn classify(text: &str) -> Option<CanonicalSpot> {
    if text.chars().count() != MESSAGE_LENGTH {
        return None;
    }

    let caps = SOTAMAT_PATTERN.captures(text)?;
    let prefix = caps.get(1)?.as_str();
    let station = caps.get(6)?.as_str();
    let tail = caps.get(7)?.as_str();

    Some(CanonicalSpot {
        text: text.to_owned(),
        prefix: prefix.to_owned(),
        station: station.to_owned(),
        suffixes: tail
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn matches_full_prefix() {
        let spot = classify("SOTAMAT W1A/P").unwrap();
        assert_eq!(spot.prefix, "SOTAMAT");
        assert_eq!(spot.station, "W1A");
        assert_eq!(spot.suffixes, vec!["P".to_string()]);
    }

    #[test]
    fn case_insensitive() {
        let spot = classify("sotamat w1a/p").unwrap();
        assert_eq!(spot.station, "w1a");
        assert_eq!(spot.text, "sotamat w1a/p");
    }

    #[test]
    fn short_prefix_with_multiple_suffixes() {
        let spot = classify("STM AB6D/1/P2").unwrap();
        assert_eq!(spot.prefix, "STM");
        assert_eq!(spot.station, "AB6D");
        assert_eq!(spot.suffixes, vec!["1".to_string(), "P2".to_string()]);
    }

    #[test]
    fn rejects_wrong_length_even_if_shape_fits() {
        assert!(classify("SOTA AB6D/P").is_none());
        assert!(classify("STM AB6D/P").is_none());
        assert!(classify("SOTAMAT AB6D/P").is_none());
    }

    #[test]
    fn rejects_other_band_traffic() {
        assert!(classify("CQ K1ABC FN42").is_none());
        assert!(classify("W1AW K1ABC -12").is_none());
        // 13 chars but no suffix group
        assert!(classify("SOTAMAT W1AAA").is_none());
        // 13 chars but unknown prefix token
        assert!(classify("SOTAX AB6D/PP").is_none());
    }

    #[test]
    fn station_needs_a_digit() {
        assert!(classify("SOTAMT ABC/PQ").is_none());
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        // 13 chars, 14 bytes: still fails on the pattern, not on length
        assert!(classify("SOTAMAT W1A/É").is_none());
    }
}
