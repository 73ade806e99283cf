//! Canonical marker vocabulary: names, dictation aliases, allowed staining
//! patterns, mandatory-field requirements and panel definitions.
//!
//! Built once (from the built-in tables or a JSON marker dictionary) and then
//! shared read-only by the normalizer, extractor and validator.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::IhcError;
use crate::models::enums::{Requirement, StainPattern};

/// Version tag of the built-in tables.
pub const BUILTIN_VOCABULARY_VERSION: &str = "ihc-vocab-v1";

// ═══════════════════════════════════════════════════════════
// Definitions
// ═══════════════════════════════════════════════════════════

/// Which optional fields a marker must report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRequirements {
    #[serde(default = "default_intensity_requirement")]
    pub intensity: Requirement,
    #[serde(default = "default_percent_requirement")]
    pub percent: Requirement,
}

fn default_intensity_requirement() -> Requirement {
    Requirement::WhenPositive
}

fn default_percent_requirement() -> Requirement {
    Requirement::Never
}

impl Default for FieldRequirements {
    fn default() -> Self {
        Self {
            intensity: default_intensity_requirement(),
            percent: default_percent_requirement(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerDef {
    #[serde(alias = "display_name")]
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub allowed_patterns: Vec<StainPattern>,
    /// Out-of-set pattern is an error when true, a warning otherwise.
    #[serde(default)]
    pub hard_pattern_enforce: bool,
    #[serde(default)]
    pub requirements: FieldRequirements,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelDef {
    pub name: String,
    pub markers: Vec<String>,
}

/// On-disk marker dictionary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VocabularyFile {
    #[serde(default = "default_file_version")]
    pub version: String,
    pub markers: Vec<MarkerDef>,
    #[serde(default)]
    pub panels: Vec<PanelDef>,
}

fn default_file_version() -> String {
    "custom".into()
}

// ═══════════════════════════════════════════════════════════
// Built-in tables
// ═══════════════════════════════════════════════════════════

struct BuiltinMarker {
    name: &'static str,
    aliases: &'static [&'static str],
    patterns: &'static [StainPattern],
    hard: bool,
    intensity: Requirement,
    percent: Requirement,
}

use Requirement::{Never, UnlessNotDone, WhenPositive};
use StainPattern::{Cytoplasmic, Membranous, Nuclear};

/// Aliases cover dictation shorthand, including Indian-English readings of
/// numerals ("TTF one", "P forty", "key sixty seven").
const BUILTIN_MARKERS: &[BuiltinMarker] = &[
    BuiltinMarker {
        name: "ER",
        aliases: &["E R", "estrogen receptor", "oestrogen receptor"],
        patterns: &[Nuclear],
        hard: true,
        intensity: WhenPositive,
        percent: WhenPositive,
    },
    BuiltinMarker {
        name: "PR",
        aliases: &["P R", "pgr", "progesterone receptor"],
        patterns: &[Nuclear],
        hard: true,
        intensity: WhenPositive,
        percent: WhenPositive,
    },
    BuiltinMarker {
        name: "HER2",
        aliases: &[
            "her 2", "her two", "her2/neu", "her 2 neu", "her two neu", "her two new",
            "her 2 new", "c erb b2", "cerb b2", "erbb2",
        ],
        patterns: &[Membranous],
        hard: true,
        intensity: WhenPositive,
        percent: Never,
    },
    BuiltinMarker {
        name: "Ki-67",
        aliases: &[
            "ki 67", "ki sixty seven", "key sixty seven", "kai sixty seven", "mib 1",
            "mib one",
        ],
        patterns: &[Nuclear],
        hard: true,
        intensity: Never,
        percent: UnlessNotDone,
    },
    BuiltinMarker {
        name: "TTF-1",
        aliases: &[
            "ttf 1", "ttf one", "thyroid transcription factor 1",
            "thyroid transcription factor one",
        ],
        patterns: &[Nuclear],
        hard: true,
        intensity: WhenPositive,
        percent: Never,
    },
    BuiltinMarker {
        name: "p40",
        aliases: &["p 40", "p forty", "pee forty"],
        patterns: &[Nuclear],
        hard: true,
        intensity: WhenPositive,
        percent: Never,
    },
    BuiltinMarker {
        name: "p63",
        aliases: &["p 63", "p sixty three", "pee sixty three"],
        patterns: &[Nuclear],
        hard: true,
        intensity: WhenPositive,
        percent: Never,
    },
    BuiltinMarker {
        name: "p53",
        aliases: &["p 53", "p fifty three", "pee fifty three"],
        patterns: &[Nuclear],
        hard: true,
        intensity: WhenPositive,
        percent: Never,
    },
    BuiltinMarker {
        name: "p16",
        aliases: &["p 16", "p sixteen", "pee sixteen"],
        patterns: &[Nuclear, Cytoplasmic],
        hard: false,
        intensity: WhenPositive,
        percent: Never,
    },
    BuiltinMarker {
        name: "CK7",
        aliases: &["ck 7", "ck seven", "cytokeratin 7", "cytokeratin seven"],
        patterns: &[Cytoplasmic, Membranous],
        hard: false,
        intensity: WhenPositive,
        percent: Never,
    },
    BuiltinMarker {
        name: "CK20",
        aliases: &["ck 20", "ck twenty", "cytokeratin 20", "cytokeratin twenty"],
        patterns: &[Cytoplasmic, Membranous],
        hard: false,
        intensity: WhenPositive,
        percent: Never,
    },
    BuiltinMarker {
        name: "CK5/6",
        aliases: &["ck 5/6", "ck five six", "ck five by six", "cytokeratin 5/6"],
        patterns: &[Cytoplasmic],
        hard: false,
        intensity: WhenPositive,
        percent: Never,
    },
    BuiltinMarker {
        name: "AE1/AE3",
        aliases: &["ae one ae three", "pan ck", "pancytokeratin", "pan cytokeratin"],
        patterns: &[Cytoplasmic],
        hard: false,
        intensity: WhenPositive,
        percent: Never,
    },
    BuiltinMarker {
        name: "CDX2",
        aliases: &["cdx 2", "cdx two"],
        patterns: &[Nuclear],
        hard: true,
        intensity: WhenPositive,
        percent: Never,
    },
    BuiltinMarker {
        name: "GATA3",
        aliases: &["gata 3", "gata three"],
        patterns: &[Nuclear],
        hard: true,
        intensity: WhenPositive,
        percent: Never,
    },
    BuiltinMarker {
        name: "PAX8",
        aliases: &["pax 8", "pax eight"],
        patterns: &[Nuclear],
        hard: true,
        intensity: WhenPositive,
        percent: Never,
    },
    BuiltinMarker {
        name: "WT1",
        aliases: &["wt 1", "wt one"],
        patterns: &[Nuclear, Cytoplasmic],
        hard: false,
        intensity: WhenPositive,
        percent: Never,
    },
    BuiltinMarker {
        name: "SOX10",
        aliases: &["sox 10", "sox ten"],
        patterns: &[Nuclear],
        hard: true,
        intensity: WhenPositive,
        percent: Never,
    },
    BuiltinMarker {
        name: "S100",
        aliases: &["s 100", "s one hundred", "s hundred"],
        patterns: &[Nuclear, Cytoplasmic],
        hard: false,
        intensity: WhenPositive,
        percent: Never,
    },
    BuiltinMarker {
        name: "Napsin A",
        aliases: &["napsin"],
        patterns: &[Cytoplasmic],
        hard: false,
        intensity: WhenPositive,
        percent: Never,
    },
    BuiltinMarker {
        name: "Synaptophysin",
        aliases: &["synapto"],
        patterns: &[Cytoplasmic],
        hard: false,
        intensity: WhenPositive,
        percent: Never,
    },
    BuiltinMarker {
        name: "Chromogranin",
        aliases: &["chromogranin a"],
        patterns: &[Cytoplasmic],
        hard: false,
        intensity: WhenPositive,
        percent: Never,
    },
    BuiltinMarker {
        name: "CD56",
        aliases: &["cd 56", "cd fifty six"],
        patterns: &[Membranous, Cytoplasmic],
        hard: false,
        intensity: WhenPositive,
        percent: Never,
    },
    BuiltinMarker {
        name: "CD117",
        aliases: &["cd 117", "cd one seventeen", "c kit"],
        patterns: &[Membranous, Cytoplasmic],
        hard: false,
        intensity: WhenPositive,
        percent: Never,
    },
    BuiltinMarker {
        name: "CD34",
        aliases: &["cd 34", "cd thirty four"],
        patterns: &[Membranous, Cytoplasmic],
        hard: false,
        intensity: WhenPositive,
        percent: Never,
    },
    BuiltinMarker {
        name: "CD45",
        aliases: &["cd 45", "cd forty five", "lca", "leucocyte common antigen", "leukocyte common antigen"],
        patterns: &[Membranous],
        hard: false,
        intensity: WhenPositive,
        percent: Never,
    },
    BuiltinMarker {
        name: "Vimentin",
        aliases: &[],
        patterns: &[Cytoplasmic],
        hard: false,
        intensity: WhenPositive,
        percent: Never,
    },
    BuiltinMarker {
        name: "Desmin",
        aliases: &[],
        patterns: &[Cytoplasmic],
        hard: false,
        intensity: WhenPositive,
        percent: Never,
    },
    BuiltinMarker {
        name: "Calretinin",
        aliases: &[],
        patterns: &[Nuclear, Cytoplasmic],
        hard: false,
        intensity: WhenPositive,
        percent: Never,
    },
    BuiltinMarker {
        name: "E-cadherin",
        aliases: &["ee cadherin"],
        patterns: &[Membranous],
        hard: true,
        intensity: WhenPositive,
        percent: Never,
    },
    BuiltinMarker {
        name: "PD-L1",
        aliases: &["pd l one", "pdl one"],
        patterns: &[Membranous],
        hard: false,
        intensity: WhenPositive,
        percent: WhenPositive,
    },
    BuiltinMarker {
        name: "MLH1",
        aliases: &["mlh 1", "mlh one"],
        patterns: &[Nuclear],
        hard: true,
        intensity: Never,
        percent: Never,
    },
    BuiltinMarker {
        name: "PMS2",
        aliases: &["pms 2", "pms two"],
        patterns: &[Nuclear],
        hard: true,
        intensity: Never,
        percent: Never,
    },
    BuiltinMarker {
        name: "MSH2",
        aliases: &["msh 2", "msh two"],
        patterns: &[Nuclear],
        hard: true,
        intensity: Never,
        percent: Never,
    },
    BuiltinMarker {
        name: "MSH6",
        aliases: &["msh 6", "msh six"],
        patterns: &[Nuclear],
        hard: true,
        intensity: Never,
        percent: Never,
    },
];

const BUILTIN_PANELS: &[(&str, &[&str])] = &[
    ("breast", &["ER", "PR", "HER2", "Ki-67"]),
    ("lung", &["TTF-1", "Napsin A", "p40", "CK7"]),
    ("gi", &["CK7", "CK20", "CDX2"]),
    ("mmr", &["MLH1", "PMS2", "MSH2", "MSH6"]),
    ("neuroendocrine", &["Synaptophysin", "Chromogranin", "CD56", "Ki-67"]),
];

fn builtin_file() -> VocabularyFile {
    let markers = BUILTIN_MARKERS
        .iter()
        .map(|m| MarkerDef {
            name: m.name.to_string(),
            aliases: m.aliases.iter().map(|a| a.to_string()).collect(),
            allowed_patterns: m.patterns.to_vec(),
            hard_pattern_enforce: m.hard,
            requirements: FieldRequirements {
                intensity: m.intensity,
                percent: m.percent,
            },
        })
        .collect();
    let panels = BUILTIN_PANELS
        .iter()
        .map(|(name, markers)| PanelDef {
            name: name.to_string(),
            markers: markers.iter().map(|m| m.to_string()).collect(),
        })
        .collect();
    VocabularyFile {
        version: BUILTIN_VOCABULARY_VERSION.into(),
        markers,
        panels,
    }
}

// ═══════════════════════════════════════════════════════════
// Compiled vocabulary
// ═══════════════════════════════════════════════════════════

/// Immutable, compiled vocabulary. Safe for unsynchronized concurrent reads.
#[derive(Debug)]
pub struct MarkerVocabulary {
    version: String,
    markers: Vec<MarkerDef>,
    panels: Vec<PanelDef>,
    /// Alias key → marker index. Keys are lowercase with separators removed.
    by_key: HashMap<String, usize>,
    /// Regex alternation of every alias and canonical name, longest first.
    alternation: String,
    mention_re: Regex,
}

impl MarkerVocabulary {
    /// The built-in vocabulary.
    pub fn builtin() -> Result<Self, IhcError> {
        Self::from_file(builtin_file())
    }

    /// Load a JSON marker dictionary.
    pub fn from_json_path(path: &Path) -> Result<Self, IhcError> {
        let raw = std::fs::read_to_string(path)?;
        let file: VocabularyFile = serde_json::from_str(&raw)?;
        let vocab = Self::from_file(file)?;
        tracing::info!(
            path = %path.display(),
            version = %vocab.version,
            markers = vocab.markers.len(),
            "Marker dictionary loaded"
        );
        Ok(vocab)
    }

    pub fn from_file(file: VocabularyFile) -> Result<Self, IhcError> {
        let mut by_key: HashMap<String, usize> = HashMap::new();
        let mut names: HashSet<String> = HashSet::new();
        let mut phrases: Vec<(usize, String)> = Vec::new();

        for (idx, def) in file.markers.iter().enumerate() {
            if def.name.trim().is_empty() {
                return Err(IhcError::InvalidVocabulary("marker with empty name".into()));
            }
            if !names.insert(def.name.to_lowercase()) {
                return Err(IhcError::InvalidVocabulary(format!(
                    "duplicate marker name: {}",
                    def.name
                )));
            }

            for phrase in std::iter::once(&def.name).chain(def.aliases.iter()) {
                let key = alias_key(phrase);
                if key.is_empty() {
                    continue;
                }
                match by_key.get(&key) {
                    Some(&other) if other != idx => {
                        return Err(IhcError::InvalidVocabulary(format!(
                            "alias '{phrase}' of {} collides with {}",
                            def.name, file.markers[other].name
                        )));
                    }
                    Some(_) => {}
                    None => {
                        by_key.insert(key, idx);
                    }
                }
                phrases.push((phrase.chars().count(), alias_fragment(phrase)));
            }
        }

        for panel in &file.panels {
            for m in &panel.markers {
                if !names.contains(&m.to_lowercase()) {
                    return Err(IhcError::InvalidVocabulary(format!(
                        "panel {} lists unknown marker {m}",
                        panel.name
                    )));
                }
            }
        }

        if phrases.is_empty() {
            return Err(IhcError::InvalidVocabulary("no markers defined".into()));
        }

        // Longest phrase first so "Ki sixty seven" wins over any shorter alias
        // starting at the same position.
        phrases.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        phrases.dedup_by(|a, b| a.1 == b.1);
        let alternation = phrases
            .iter()
            .map(|(_, f)| f.as_str())
            .collect::<Vec<_>>()
            .join("|");
        let mention_re = Regex::new(&format!(r"(?i)\b(?:{alternation})\b"))?;

        Ok(Self {
            version: file.version,
            markers: file.markers,
            panels: file.panels,
            by_key,
            alternation,
            mention_re,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn markers(&self) -> &[MarkerDef] {
        &self.markers
    }

    /// Resolve any alias spelling ("ttf one", "TTF-1") to its definition.
    pub fn resolve(&self, phrase: &str) -> Option<&MarkerDef> {
        self.by_key
            .get(&alias_key(phrase))
            .map(|&idx| &self.markers[idx])
    }

    /// Definition for a canonical name (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&MarkerDef> {
        self.markers
            .iter()
            .find(|m| m.name.eq_ignore_ascii_case(name))
    }

    /// Panel for a hint like "breast", "Breast panel" or "LUNG".
    pub fn panel(&self, hint: &str) -> Option<&PanelDef> {
        let lowered = hint.trim().to_lowercase();
        let key = lowered.strip_suffix("panel").unwrap_or(&lowered).trim();
        self.panels.iter().find(|p| p.name.eq_ignore_ascii_case(key))
    }

    /// Regex matching any marker mention.
    pub fn mention_regex(&self) -> &Regex {
        &self.mention_re
    }

    /// Raw alternation source, for embedding in larger patterns.
    pub fn alternation(&self) -> &str {
        &self.alternation
    }
}

/// Lookup key: lowercase with whitespace and hyphens removed.
pub fn alias_key(phrase: &str) -> String {
    phrase
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// Regex fragment for a phrase; spaces and hyphens become optional separators.
///
/// Short all-letter capitals ("ER", "P R") match case-sensitively, so the
/// hesitation "er" or the word "pr" never reads as a marker.
fn alias_fragment(phrase: &str) -> String {
    let fragment = phrase
        .split(|c: char| c.is_whitespace() || c == '-')
        .filter(|p| !p.is_empty())
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(r"[ \t-]*");
    if is_short_capitals(phrase) {
        format!("(?-i:{fragment})")
    } else {
        fragment
    }
}

fn is_short_capitals(phrase: &str) -> bool {
    let letters: Vec<char> = phrase.chars().filter(|c| !c.is_whitespace()).collect();
    letters.len() <= 3 && letters.iter().all(|c| c.is_ascii_uppercase())
}
