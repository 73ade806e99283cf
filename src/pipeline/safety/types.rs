use serde::{Deserialize, Serialize};

/// A span of transcript that states a conclusion instead of an observation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LeakFinding {
    /// Category of diagnostic language.
    pub category: LeakCategory,
    /// The specific text span that triggered the finding.
    pub matched_text: String,
    /// Byte offset in the scanned text.
    pub offset: usize,
    /// Length of the matched span in bytes.
    pub length: usize,
    /// Human-readable explanation for the review queue.
    pub reason: String,
}

/// Classification of diagnostic language.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LeakCategory {
    /// "consistent with", "favour", "suggestive of".
    ConclusionPhrase,
    /// Names a tumour entity ("adenocarcinoma", "lymphoma").
    TumourEntity,
    /// Site-of-origin statements ("metastatic", "lung primary").
    OriginStatement,
}
