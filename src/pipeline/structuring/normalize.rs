//! Alias normalization: dictation spellings of markers, percentages, HER2
//! scores and "+ve"/"-ve" shorthand are rewritten to canonical tokens.
//!
//! Number words are only converted inside a marker name or a percent/score
//! context. Everything else passes through untouched, so normalizing
//! already-canonical text is a no-op.

use std::collections::HashMap;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use super::vocabulary::{alias_key, MarkerVocabulary};
use super::IhcError;

/// Number words accepted inside percent and score contexts.
const NUMBER_WORD: &str = "zero|one|two|three|four|five|six|seven|eight|nine|ten|eleven|twelve|\
thirteen|fourteen|fifteen|sixteen|seventeen|eighteen|nineteen|twenty|thirty|forty|fourty|fifty|\
sixty|seventy|eighty|ninety|hundred";

/// One rewritten span. Offsets are byte positions in the normalized text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasRewrite {
    pub original: String,
    pub canonical: String,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedText {
    pub text: String,
    pub rewrites: Vec<AliasRewrite>,
}

/// Compiled normalizer for one vocabulary.
#[derive(Debug)]
pub struct AliasNormalizer {
    re: Regex,
    canonical: HashMap<String, String>,
}

impl AliasNormalizer {
    pub fn new(vocab: &MarkerVocabulary) -> Result<Self, IhcError> {
        let num = format!(
            r"(?:\d{{1,4}}(?:\.\d+)?|(?:{NUMBER_WORD})(?:[ \t-]+(?:and[ \t]+)?(?:{NUMBER_WORD}))*)"
        );
        let pct = r"(?:[ \t]*%|[ \t]*per[ \t]*cent\b)";

        // Alternatives are tried in order at each position (leftmost-first),
        // so ranges win over single percents and markers over bare numbers.
        let alternatives = [
            format!(r"(?P<range>\b(?P<rlo>{num})(?:[ \t]*%)?[ \t]*(?:-|to)[ \t]*(?P<rhi>{num}){pct})"),
            format!(r"(?P<pct>\b(?P<pnum>{num}){pct})"),
            format!(r"(?P<marker>\b(?:{})\b)", vocab.alternation()),
            r"(?P<score>\b(?P<snum>[1-3]|one|two|three)[ \t]*(?:\+|plus\b))".to_string(),
            r"(?P<sign>(?P<sym>[+-])[ \t]*ve\b)".to_string(),
            r"(?P<abbr>\b(?:pos|neg)\b)".to_string(),
        ];
        let re = Regex::new(&format!("(?i){}", alternatives.join("|")))?;

        let mut canonical = HashMap::new();
        for def in vocab.markers() {
            for phrase in std::iter::once(&def.name).chain(def.aliases.iter()) {
                canonical.insert(alias_key(phrase), def.name.clone());
            }
        }

        Ok(Self { re, canonical })
    }

    /// Rewrite aliases in `text`. Unresolvable phrases are left unchanged.
    pub fn normalize(&self, text: &str) -> NormalizedText {
        let mut out = String::with_capacity(text.len());
        let mut rewrites = Vec::new();
        let mut last = 0usize;

        for caps in self.re.captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            out.push_str(&text[last..whole.start()]);
            last = whole.end();

            let original = whole.as_str();
            let Some(canonical) = self.canonical_for(&caps, text, whole.start()) else {
                out.push_str(original);
                continue;
            };
            if canonical == original {
                out.push_str(original);
                continue;
            }

            // "CK7-ve" → "CK7 negative": keep the replaced word separate.
            if caps.name("sign").is_some()
                && out.chars().next_back().is_some_and(|c| c.is_alphanumeric())
            {
                out.push(' ');
            }
            let start = out.len();
            out.push_str(&canonical);
            rewrites.push(AliasRewrite {
                original: original.to_string(),
                canonical,
                start,
                end: out.len(),
            });
        }
        out.push_str(&text[last..]);

        NormalizedText { text: out, rewrites }
    }

    fn canonical_for(&self, caps: &Captures<'_>, text: &str, at: usize) -> Option<String> {
        if caps.name("range").is_some() {
            let lo = parse_number(caps.name("rlo")?.as_str())?;
            let hi = parse_number(caps.name("rhi")?.as_str())?;
            return Some(format!("{lo}-{hi}%"));
        }
        if caps.name("pct").is_some() {
            let n = parse_number(caps.name("pnum")?.as_str())?;
            return Some(format!("{n}%"));
        }
        if let Some(m) = caps.name("marker") {
            return self.canonical.get(&alias_key(m.as_str())).cloned();
        }
        if caps.name("score").is_some() {
            let n = parse_number(caps.name("snum")?.as_str())?;
            return Some(format!("{n}+"));
        }
        if caps.name("sign").is_some() {
            // A hyphen inside a word ("non-ve") is not a sign.
            let sym = caps.name("sym")?.as_str();
            if sym == "-" && at > 0 && text[..at].ends_with(|c: char| c == '-') {
                return None;
            }
            return Some(if sym == "+" { "positive" } else { "negative" }.to_string());
        }
        if let Some(m) = caps.name("abbr") {
            let word = m.as_str().to_lowercase();
            return Some(if word == "pos" { "positive" } else { "negative" }.to_string());
        }
        None
    }
}

/// Parse digits ("20", "2.5") or number words ("sixty seven", "one hundred").
/// Decimals are kept as written; words that do not form one number yield `None`.
fn parse_number(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.starts_with(|c: char| c.is_ascii_digit()) {
        return Some(raw.to_string());
    }
    parse_number_words(raw).map(|n| n.to_string())
}

fn word_value(word: &str) -> Option<u32> {
    let v = match word {
        "zero" => 0,
        "one" => 1,
        "two" => 2,
        "three" => 3,
        "four" => 4,
        "five" => 5,
        "six" => 6,
        "seven" => 7,
        "eight" => 8,
        "nine" => 9,
        "ten" => 10,
        "eleven" => 11,
        "twelve" => 12,
        "thirteen" => 13,
        "fourteen" => 14,
        "fifteen" => 15,
        "sixteen" => 16,
        "seventeen" => 17,
        "eighteen" => 18,
        "nineteen" => 19,
        "twenty" => 20,
        "thirty" => 30,
        "forty" | "fourty" => 40,
        "fifty" => 50,
        "sixty" => 60,
        "seventy" => 70,
        "eighty" => 80,
        "ninety" => 90,
        "hundred" => 100,
        _ => return None,
    };
    Some(v)
}

/// Grammar: `[unit] hundred`? then `tens [unit]` or `0..19`.
pub(crate) fn parse_number_words(raw: &str) -> Option<u32> {
    let lowered = raw.to_lowercase();
    let words: Vec<u32> = lowered
        .split(|c: char| c.is_whitespace() || c == '-')
        .filter(|w| !w.is_empty() && *w != "and")
        .map(word_value)
        .collect::<Option<Vec<_>>>()?;
    if words.is_empty() {
        return None;
    }

    let mut idx = 0;
    let mut value = 0;

    match (words.first(), words.get(1)) {
        (Some(&u), Some(&100)) if (1..=9).contains(&u) => {
            value = u * 100;
            idx = 2;
        }
        (Some(&100), _) => {
            value = 100;
            idx = 1;
        }
        _ => {}
    }

    if let Some(&w) = words.get(idx) {
        if (20..=90).contains(&w) && w % 10 == 0 {
            value += w;
            idx += 1;
            if let Some(&u) = words.get(idx) {
                if (1..=9).contains(&u) {
                    value += u;
                    idx += 1;
                }
            }
        } else if w < 20 {
            value += w;
            idx += 1;
        }
    }

    (idx == words.len()).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> AliasNormalizer {
        let vocab = MarkerVocabulary::builtin().unwrap();
        AliasNormalizer::new(&vocab).unwrap()
    }

    #[test]
    fn rewrites_marker_aliases() {
        let n = normalizer().normalize("TTF one positive, P forty negative");
        assert_eq!(n.text, "TTF-1 positive, p40 negative");
        assert_eq!(n.rewrites.len(), 2);
        assert_eq!(n.rewrites[0].original, "TTF one");
        assert_eq!(&n.text[n.rewrites[1].start..n.rewrites[1].end], "p40");
    }

    #[test]
    fn longest_alias_wins() {
        let n = normalizer().normalize("Ki sixty seven twenty percent");
        assert_eq!(n.text, "Ki-67 20%");
    }

    #[test]
    fn number_words_only_converted_in_context() {
        let n = normalizer().normalize("two blocks, ER positive in ninety percent");
        assert_eq!(n.text, "two blocks, ER positive in 90%");
    }

    #[test]
    fn ranges_become_dash_form() {
        let n = normalizer().normalize("Ki-67 ten to twenty percent, ER 70 - 80 %");
        assert_eq!(n.text, "Ki-67 10-20%, ER 70-80%");
    }

    #[test]
    fn scores_and_sign_shorthand() {
        let n = normalizer().normalize("HER two three plus, CK7 +ve, CK20-ve, pos");
        assert_eq!(n.text, "HER2 3+, CK7 positive, CK20 negative, positive");
    }

    #[test]
    fn canonical_text_is_unchanged() {
        let text = "ER positive 90%, PR negative, HER2 3+, Ki-67 10-20%, TTF-1 positive";
        let n = normalizer().normalize(text);
        assert_eq!(n.text, text);
        assert!(n.rewrites.is_empty());
    }

    #[test]
    fn normalization_is_idempotent() {
        let norm = normalizer();
        let once = norm.normalize("her two neu two plus, ki sixty seven around fifteen percent, ck seven +ve");
        let twice = norm.normalize(&once.text);
        assert_eq!(once.text, twice.text);
        assert!(twice.rewrites.is_empty());
    }

    #[test]
    fn unknown_tokens_pass_through() {
        let n = normalizer().normalize("CD99 positive, BRAF V600E negative");
        assert_eq!(n.text, "CD99 positive, BRAF V600E negative");
    }

    #[test]
    fn number_word_grammar() {
        assert_eq!(parse_number_words("sixty seven"), Some(67));
        assert_eq!(parse_number_words("one hundred"), Some(100));
        assert_eq!(parse_number_words("hundred"), Some(100));
        assert_eq!(parse_number_words("fourty-five"), Some(45));
        assert_eq!(parse_number_words("zero"), Some(0));
        assert_eq!(parse_number_words("one hundred and ten"), Some(110));
        assert_eq!(parse_number_words("twenty thirty"), None);
        assert_eq!(parse_number_words("five six"), None);
    }

    #[test]
    fn unparsable_number_phrase_left_alone() {
        let n = normalizer().normalize("ER five six percent");
        assert_eq!(n.text, "ER five six percent");
    }
}
