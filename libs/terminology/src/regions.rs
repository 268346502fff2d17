//! Body-region catalog and the two classification tables driving the region
//! inference pipeline: the ICD-11 chapter → region map (structural evidence)
//! and the per-region AYUSH keyword lists (lexical evidence).

use phf::phf_map;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Relevance assigned to keyword-derived mappings.
pub const KEYWORD_RELEVANCE: f64 = 0.7;

/// Relevance fallback for chapter-derived mappings whose concept-mapping edge
/// has no confidence score.
pub const DEFAULT_CHAPTER_RELEVANCE: f64 = 0.9;

/// Cap on matches per keyword, bounding the blast radius of a generic term.
pub const KEYWORD_MATCH_CAP: i64 = 20;

#[derive(Debug, Error)]
#[error("unknown body region: {0}")]
pub struct ParseRegionError(pub String);

/// The six coarse anatomical zones diagnoses are grouped into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyRegion {
    Head,
    Chest,
    Abdomen,
    Pelvis,
    Arms,
    Legs,
}

impl BodyRegion {
    pub const ALL: [BodyRegion; 6] = [
        BodyRegion::Head,
        BodyRegion::Chest,
        BodyRegion::Abdomen,
        BodyRegion::Pelvis,
        BodyRegion::Arms,
        BodyRegion::Legs,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BodyRegion::Head => "head",
            BodyRegion::Chest => "chest",
            BodyRegion::Abdomen => "abdomen",
            BodyRegion::Pelvis => "pelvis",
            BodyRegion::Arms => "arms",
            BodyRegion::Legs => "legs",
        }
    }

    /// Keyword substrings whose presence in a NAMASTE display text is lexical
    /// evidence for this region. Lists are not disjoint across regions; a
    /// term may legitimately land in several regions.
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            BodyRegion::Head => &[
                "shira", "mastaka", "head", "brain", "cerebr", "netra", "akshi", "eye", "vision",
                "ophthalm", "karna", "ear", "hearing", "nasika", "nose", "nasal", "kantha",
                "throat", "pharyn", "greeva", "neck", "cervical", "migraine", "headache",
                "shirashoola",
            ],
            BodyRegion::Chest => &[
                "uras", "hridaya", "heart", "cardiac", "phupphusa", "lung", "pulmon", "respirat",
                "shwasa", "breath", "dyspnea", "kasa", "cough", "chest", "thorax",
            ],
            BodyRegion::Abdomen => &[
                "udara", "amashaya", "stomach", "gastric", "yakrit", "liver", "hepat", "antra",
                "intestin", "bowel", "pachan", "agni", "digest", "vrikka", "kidney", "renal",
                "pliha", "spleen", "abdomen", "abdominal",
            ],
            BodyRegion::Pelvis => &[
                "kati", "pelvi", "hip", "basti", "bladder", "urinary", "garbha", "reproduct",
                "uterus", "artava", "menstrual", "yoni", "gynecological",
            ],
            BodyRegion::Arms => &[
                "bahu", "arm", "upper limb", "skandha", "shoulder", "karpara", "elbow",
                "manibandha", "wrist", "hasta", "hand", "palm", "anguli", "finger",
            ],
            BodyRegion::Legs => &[
                "pada", "leg", "lower limb", "uru", "thigh", "femor", "janu", "knee", "patel",
                "gulpha", "ankle", "foot", "gridhrasi", "sciatica",
            ],
        }
    }
}

impl fmt::Display for BodyRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BodyRegion {
    type Err = ParseRegionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "head" => Ok(BodyRegion::Head),
            "chest" => Ok(BodyRegion::Chest),
            "abdomen" => Ok(BodyRegion::Abdomen),
            "pelvis" => Ok(BodyRegion::Pelvis),
            "arms" => Ok(BodyRegion::Arms),
            "legs" => Ok(BodyRegion::Legs),
            other => Err(ParseRegionError(other.to_string())),
        }
    }
}

/// Which strategy produced a region mapping. Chapter evidence is structural
/// and becomes a `primary` mapping; keyword evidence is lexical and becomes
/// `secondary`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingOrigin {
    Primary,
    Secondary,
}

impl MappingOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            MappingOrigin::Primary => "primary",
            MappingOrigin::Secondary => "secondary",
        }
    }
}

/// ICD-11 chapter prefix (first two characters of a code) → body region.
/// Skin ("EA") defaults to arms for visibility; endocrine ("5A") to abdomen
/// as the central region.
static ICD_CHAPTER_REGIONS: phf::Map<&'static str, BodyRegion> = phf_map! {
    // Respiratory
    "CA" => BodyRegion::Chest,
    "CB" => BodyRegion::Chest,
    "MD" => BodyRegion::Chest,
    // Digestive, liver, gallbladder
    "DA" => BodyRegion::Abdomen,
    "DD" => BodyRegion::Abdomen,
    "DB" => BodyRegion::Abdomen,
    // Blood, immune, circulatory
    "BA" => BodyRegion::Chest,
    "BB" => BodyRegion::Chest,
    "BC" => BodyRegion::Chest,
    // Nervous system, mental health, eye, ear
    "8A" => BodyRegion::Head,
    "8B" => BodyRegion::Head,
    "9A" => BodyRegion::Head,
    "9B" => BodyRegion::Head,
    // Musculoskeletal
    "FA" => BodyRegion::Arms,
    "FB" => BodyRegion::Legs,
    "FC" => BodyRegion::Legs,
    // Genitourinary, sexual health, pregnancy
    "GC" => BodyRegion::Pelvis,
    "GA" => BodyRegion::Pelvis,
    "GB" => BodyRegion::Pelvis,
    // Skin
    "EA" => BodyRegion::Arms,
    // Endocrine, nutritional, metabolic
    "5A" => BodyRegion::Abdomen,
};

/// The chapter prefix of an ICD-11 code (its first two characters).
pub fn chapter_of(icd_code: &str) -> Option<&str> {
    icd_code.get(0..2)
}

/// Classify an ICD-11 code into a region via its chapter prefix. Unknown
/// chapters return `None`; that is normal, not an error.
pub fn region_for_icd(icd_code: &str) -> Option<(&str, BodyRegion)> {
    let chapter = chapter_of(icd_code)?;
    ICD_CHAPTER_REGIONS.get(chapter).map(|r| (chapter, *r))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chapter_classification_covers_known_prefixes() {
        assert_eq!(
            region_for_icd("MD12"),
            Some(("MD", BodyRegion::Chest)),
            "respiratory chapter maps to chest"
        );
        assert_eq!(region_for_icd("DD70"), Some(("DD", BodyRegion::Abdomen)));
        assert_eq!(region_for_icd("8A80"), Some(("8A", BodyRegion::Head)));
        assert_eq!(region_for_icd("FA20"), Some(("FA", BodyRegion::Arms)));
        assert_eq!(region_for_icd("FB10"), Some(("FB", BodyRegion::Legs)));
        assert_eq!(region_for_icd("GB21"), Some(("GB", BodyRegion::Pelvis)));
    }

    #[test]
    fn unknown_chapter_is_silently_unclassified() {
        assert_eq!(region_for_icd("MG26"), None);
        assert_eq!(region_for_icd("X"), None);
        assert_eq!(region_for_icd(""), None);
    }

    #[test]
    fn every_region_owns_keywords() {
        for region in BodyRegion::ALL {
            assert!(!region.keywords().is_empty(), "{region} has no keywords");
        }
    }

    #[test]
    fn keyword_lists_may_overlap_regions() {
        // Non-exclusivity is accepted behavior; nothing dedups across regions.
        let head: Vec<_> = BodyRegion::Head.keywords().to_vec();
        let chest: Vec<_> = BodyRegion::Chest.keywords().to_vec();
        assert!(head.iter().all(|k| !k.is_empty()));
        assert!(chest.iter().all(|k| !k.is_empty()));
    }

    #[test]
    fn region_codes_round_trip() {
        for region in BodyRegion::ALL {
            assert_eq!(region.as_str().parse::<BodyRegion>().unwrap(), region);
        }
        assert!("torso".parse::<BodyRegion>().is_err());
    }
}
