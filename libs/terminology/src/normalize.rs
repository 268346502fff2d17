//! Diacritic folding for romanized Sanskrit / regional-language terms.
//!
//! Search must treat `Jvāra`, `jvara` and `jwara` as the same word: stored
//! displays carry IAST diacritics (ā ī ū ṛ ḥ …) and clinicians type plain
//! ASCII, with `v`/`w` used interchangeably in romanization.

use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// Fold a display text or query into its canonical search form:
/// NFKD-decompose, drop combining marks, lowercase, and collapse the `v`/`w`
/// romanization pair onto `w`. Whitespace and punctuation are preserved so
/// substring matching over multi-word displays still works.
pub fn fold_diacritics(input: &str) -> String {
    input
        .trim()
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(|c| c.to_lowercase())
        .map(|c| if c == 'v' { 'w' } else { c })
        .collect()
}

/// The character fold applied on the SQL side via `translate(lower(...))`,
/// kept next to [`fold_diacritics`] so both sides stay in lockstep. Pairs of
/// (from, to) over the precomposed characters that appear in NAMASTE data.
pub const SQL_FOLD_FROM: &str = "āīūṛṝḥṃśṣṭḍṇñv";
pub const SQL_FOLD_TO: &str = "aiurrhmsstdnnw";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_iast_diacritics_to_ascii() {
        assert_eq!(fold_diacritics("Jvāra"), "jwara");
        assert_eq!(fold_diacritics("Śirahśūla"), "sirahsula");
        assert_eq!(fold_diacritics("Amlapitta"), "amlapitta");
    }

    #[test]
    fn v_and_w_meet_in_one_canonical_form() {
        assert_eq!(fold_diacritics("jwara"), fold_diacritics("jvara"));
        assert_eq!(fold_diacritics("Jwara"), "jwara");
    }

    #[test]
    fn preserves_word_boundaries() {
        assert_eq!(fold_diacritics("  Vāta Vyādhi "), "wata wyadhi");
    }

    #[test]
    fn sql_fold_tables_stay_aligned() {
        assert_eq!(SQL_FOLD_FROM.chars().count(), SQL_FOLD_TO.chars().count());
        // Every precomposed character folds to what fold_diacritics produces.
        for (from, to) in SQL_FOLD_FROM.chars().zip(SQL_FOLD_TO.chars()) {
            assert_eq!(fold_diacritics(&from.to_string()), to.to_string());
        }
    }
}
