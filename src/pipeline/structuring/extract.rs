//! Rule-based marker extraction over normalized case text.
//!
//! Text is split into clauses; within a clause each marker mention owns the
//! text up to the next mention (bounded by the qualifier window). Qualifier
//! rules run in a fixed order over that tail and each claimed span is never
//! reused by a later rule.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

use super::spans::SpanSet;
use super::types::{CaseOptions, EvidenceSpan, MarkerCandidate, PercentRange};
use super::vocabulary::MarkerVocabulary;
use crate::engine_config::EngineConfig;
use crate::models::enums::{
    Extent, Intensity, MarkerResult, PercentBound, ResultSource, StainPattern,
};

// ═══════════════════════════════════════════════════════════
// Qualifier rules
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Qualifier {
    PercentRange,
    Percent,
    Result(MarkerResult),
    Score,
    Intensity,
    Pattern,
    Extent,
    Hedge,
}

struct QualifierRule {
    regex: Regex,
    qualifier: Qualifier,
}

fn rule(re: &str, qualifier: Qualifier) -> QualifierRule {
    QualifierRule {
        regex: Regex::new(re).expect("qualifier regex must compile"),
        qualifier,
    }
}

/// Ordered: earlier rules claim their spans first ("not positive" is read
/// as negative before the positive rule can see "positive").
static QUALIFIER_RULES: LazyLock<Vec<QualifierRule>> = LazyLock::new(|| {
    vec![
        rule(r"\b(\d{1,4})\s*-\s*(\d{1,4})\s*%", Qualifier::PercentRange),
        rule(
            r"(?i)(?:(?P<cmp><=?|>=?|≤|≥|\b(?:less\s+than|fewer\s+than|under|below|more\s+than|greater\s+than|over|above|at\s+least))\s*)?\b(?P<num>\d{1,4}(?:\.\d+)?)\s*%",
            Qualifier::Percent,
        ),
        rule(
            r"(?i)\b(?:not\s+done|not\s+performed|not\s+tested|not\s+available|pending|awaited|to\s+follow)\b",
            Qualifier::Result(MarkerResult::NotDone),
        ),
        rule(
            r"(?i)\b(?:equivocal|borderline|indeterminate)\b",
            Qualifier::Result(MarkerResult::Equivocal),
        ),
        rule(
            r"(?i)\b(?:negative|non[\s-]?reactive|not\s+(?:expressed|positive|reactive|seen|identified)|no\s+(?:[a-z]+\s+)?(?:staining|expression|immunoreactivity|reactivity)|loss\s+of\s+(?:[a-z]+\s+)?expression|lost)\b",
            Qualifier::Result(MarkerResult::Negative),
        ),
        rule(
            r"(?i)\b(?:positive|positivity|immunoreactive|reactive|expressed|retained|intact)\b",
            Qualifier::Result(MarkerResult::Positive),
        ),
        rule(r"\b([0-3])\s*\+", Qualifier::Score),
        rule(
            r"(?i)\b(weak(?:ly)?|mild(?:ly)?|faint(?:ly)?|moderate(?:ly)?|intermediate|strong(?:ly)?|intense(?:ly)?)\b",
            Qualifier::Intensity,
        ),
        rule(
            r"(?i)\b(nuclear|cytoplasmic|membranous|membrane)\b",
            Qualifier::Pattern,
        ),
        rule(r"(?i)\b(focal(?:ly)?|patchy|diffuse(?:ly)?)\b", Qualifier::Extent),
        rule(
            r"(?i)\b(?:maybe|kind\s+of|sort\s+of|around|approximately|approx|about|roughly|probably|possibly|questionable)\b|\?",
            Qualifier::Hedge,
        ),
    ]
});

fn intensity_word(word: &str) -> Option<Intensity> {
    let w = word.to_lowercase();
    if w.starts_with("weak") || w.starts_with("mild") || w.starts_with("faint") {
        Some(Intensity::Weak)
    } else if w.starts_with("moderate") || w == "intermediate" {
        Some(Intensity::Moderate)
    } else if w.starts_with("strong") || w.starts_with("intense") {
        Some(Intensity::Strong)
    } else {
        None
    }
}

fn pattern_word(word: &str) -> Option<StainPattern> {
    match word.to_lowercase().as_str() {
        "nuclear" => Some(StainPattern::Nuclear),
        "cytoplasmic" => Some(StainPattern::Cytoplasmic),
        "membranous" | "membrane" => Some(StainPattern::Membranous),
        _ => None,
    }
}

fn extent_word(word: &str) -> Option<Extent> {
    let w = word.to_lowercase();
    if w.starts_with("focal") || w == "patchy" {
        Some(Extent::Focal)
    } else if w.starts_with("diffuse") {
        Some(Extent::Diffuse)
    } else {
        None
    }
}

/// Score to intensity: 3+ strong, 2+ moderate, 1+ weak.
fn score_intensity(score: &str) -> Option<Intensity> {
    match score {
        "3" => Some(Intensity::Strong),
        "2" => Some(Intensity::Moderate),
        "1" => Some(Intensity::Weak),
        _ => None,
    }
}

fn bound_word(word: &str) -> Option<PercentBound> {
    let first = word.split_whitespace().next()?.to_lowercase();
    match first.as_str() {
        "<" | "<=" | "≤" | "less" | "fewer" | "under" | "below" => Some(PercentBound::Below),
        ">" | ">=" | "≥" | "more" | "greater" | "over" | "above" | "at" => Some(PercentBound::Above),
        _ => None,
    }
}

/// Percent as an integer; decimals round half up.
fn parse_percent(raw: &str) -> Option<u32> {
    let value: f64 = raw.parse().ok()?;
    (value >= 0.0).then(|| value.round() as u32)
}

// ═══════════════════════════════════════════════════════════
// Clause-level patterns
// ═══════════════════════════════════════════════════════════

/// "positive for", "negative for:", or a clause-initial "Positive:".
static LEAD_IN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:^\s*(?P<head>positive|negative|equivocal)\s*:|\b(?P<word>positive|positivity|immunoreactive|immunopositive|reactive|negative|immunonegative|non-?reactive|equivocal)\s+for\b\s*:?)",
    )
    .expect("lead-in regex must compile")
});

static CONTROL_STATEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:(?:positive|negative|appropriate|adequate|satisfactory)\s+)?(?:(?:internal|external)\s+(?:and\s+(?:internal|external)\s+)?)?controls?\b(?:\s+(?:is|are|was|were)\b)?(?:\s+(?:appropriately\s+stained|adequate|appropriate|satisfactory|fine|ok|okay|working|acceptable|inadequate|unsatisfactory|failed|not\s+working|absent|positive|negative)\b)?",
    )
    .expect("control regex must compile")
});

/// A token directly followed by a result word, e.g. "CD99 positive".
static UNKNOWN_MENTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b([a-z][a-z0-9]*(?:[-/][a-z0-9]+)*)\s+(?:(?:is|are|was|were|shows?|showing)\s+)?(?:(?:strongly|weakly|moderately|focally|diffusely)\s+)?(?:positive|negative|equivocal)\b",
    )
    .expect("unknown-mention regex must compile")
});

/// Marker-like token in a lead-in list: contains a digit or is upper-case.
static LIST_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z][A-Za-z0-9]*\d[A-Za-z0-9]*|[A-Z]{2,}[A-Za-z0-9]*)\b")
        .expect("list-token regex must compile")
});

static LIST_SEPARATOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[\s,&/]*(?:(?:and|or)\b[\s,]*)?").expect("separator regex must compile")
});

static WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9][A-Za-z0-9'/+%.-]*").expect("word regex must compile")
});

/// Words that never name a marker.
const NON_MARKER_WORDS: &[&str] = &[
    "and", "or", "also", "both", "all", "but", "not", "are", "is", "was", "were", "with", "for",
    "the", "tumor", "tumour", "cells", "cell", "nuclei", "staining", "stain", "stains", "markers",
    "marker", "control", "controls", "internal", "external", "strongly", "weakly", "moderately",
    "focally", "diffusely", "diffuse", "focal", "weak", "moderate", "strong", "nuclear",
    "cytoplasmic", "membranous", "membrane", "positive", "negative", "equivocal", "immuno",
    "immunohistochemistry", "ihc", "which", "these", "those", "they", "that", "this", "remaining",
    "others", "rest", "lesion", "lesional", "neoplastic", "background", "stroma", "stromal",
    "epithelium", "epithelial", "glands", "areas", "component", "section", "block", "specimen",
    "slide", "here", "there", "otherwise", "only", "again", "seen", "status", "expression",
    "immunostain", "immunostaining", "score", "index", "labelling", "labeling",
];

/// Residual words dropped from comments.
const FILLER_WORDS: &[&str] = &[
    "and", "or", "in", "of", "the", "a", "an", "is", "are", "was", "were", "with", "for", "on",
    "at", "to", "shows", "show", "showing", "seen", "noted", "cells", "cell", "tumor", "tumour",
    "staining", "stain", "stains", "nuclei", "also", "it", "which", "that", "this", "by",
];

fn is_list_separator_only(text: &str) -> bool {
    text.split(|c: char| c.is_whitespace() || matches!(c, ',' | '&' | '/'))
        .filter(|w| !w.is_empty())
        .all(|w| w.eq_ignore_ascii_case("and") || w.eq_ignore_ascii_case("or"))
}

// ═══════════════════════════════════════════════════════════
// Clause splitting
// ═══════════════════════════════════════════════════════════

/// Split on `.`, `;` and newlines. A `.` between two digits is a decimal point.
pub fn split_clauses(text: &str) -> Vec<Range<usize>> {
    let bytes = text.as_bytes();
    let mut clauses = Vec::new();
    let mut start = 0;

    for (i, &b) in bytes.iter().enumerate() {
        let boundary = match b {
            b';' | b'\n' => true,
            b'.' => {
                let prev_digit = i > 0 && bytes[i - 1].is_ascii_digit();
                let next_digit = bytes.get(i + 1).is_some_and(u8::is_ascii_digit);
                !(prev_digit && next_digit)
            }
            _ => false,
        };
        if boundary {
            push_clause(text, start..i, &mut clauses);
            start = i + 1;
        }
    }
    push_clause(text, start..text.len(), &mut clauses);
    clauses
}

fn push_clause(text: &str, range: Range<usize>, out: &mut Vec<Range<usize>>) {
    if !text[range.clone()].trim().is_empty() {
        out.push(range);
    }
}

// ═══════════════════════════════════════════════════════════
// Extraction
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
struct Mention {
    span: Range<usize>,
    marker: String,
    recognized: bool,
}

#[derive(Debug, Clone, Default)]
struct Qualifiers {
    /// Results in text order.
    results: Vec<MarkerResult>,
    pattern: Option<StainPattern>,
    intensity: Option<Intensity>,
    percent: Option<u32>,
    percent_bound: Option<PercentBound>,
    percent_range: Option<PercentRange>,
    extent: Option<Extent>,
    hedged: bool,
    /// End of the last claimed qualifier span (relative to the scanned text).
    last_end: usize,
}

#[derive(Debug, Clone)]
struct LeadIn {
    span: Range<usize>,
    /// Start of the attribute prefix governed by this lead-in.
    prefix_start: usize,
    result: MarkerResult,
    attrs: Qualifiers,
}

#[derive(Debug, Clone)]
struct ControlNote {
    span: Range<usize>,
    text: String,
    bound: bool,
}

/// Extracts marker candidates from one normalized case.
pub struct MarkerExtractor<'a> {
    vocab: &'a MarkerVocabulary,
    config: &'a EngineConfig,
}

impl<'a> MarkerExtractor<'a> {
    pub fn new(vocab: &'a MarkerVocabulary, config: &'a EngineConfig) -> Self {
        Self { vocab, config }
    }

    /// Candidates in text order, one per marker mention.
    pub fn extract(&self, text: &str, options: CaseOptions) -> Vec<MarkerCandidate> {
        let mut candidates = Vec::new();
        let mut case_controls: Vec<String> = Vec::new();

        for clause in split_clauses(text) {
            let (found, notes) = self.extract_clause(text, clause, options);
            candidates.extend(found);
            case_controls.extend(notes.into_iter().filter(|n| !n.bound).map(|n| n.text));
        }

        if !case_controls.is_empty() {
            let note = case_controls.join("; ");
            for c in candidates.iter_mut().filter(|c| c.controls.is_none()) {
                c.controls = Some(note.clone());
            }
        }
        candidates
    }

    fn extract_clause(
        &self,
        text: &str,
        clause: Range<usize>,
        options: CaseOptions,
    ) -> (Vec<MarkerCandidate>, Vec<ControlNote>) {
        let base = clause.start;
        let s = &text[clause];
        let mut occupied = SpanSet::new();

        // Known markers first.
        let mut mentions: Vec<Mention> = Vec::new();
        for m in self.vocab.mention_regex().find_iter(s) {
            let Some(def) = self.vocab.resolve(m.as_str()) else {
                continue;
            };
            if occupied.insert(m.range()) {
                mentions.push(Mention {
                    span: m.range(),
                    marker: def.name.clone(),
                    recognized: true,
                });
            }
        }

        let mut notes: Vec<ControlNote> = Vec::new();
        for m in CONTROL_STATEMENT.find_iter(s) {
            if occupied.insert(m.range()) {
                notes.push(ControlNote {
                    span: m.range(),
                    text: m.as_str().trim().to_lowercase(),
                    bound: false,
                });
            }
        }

        // Lead-ins, with the unknown markers they list.
        let mut lead_ins: Vec<LeadIn> = Vec::new();
        for caps in LEAD_IN.captures_iter(s) {
            let Some(whole) = caps.get(0) else { continue };
            let Some(word) = caps.name("head").or_else(|| caps.name("word")) else {
                continue;
            };
            let Some(result) = result_word(word.as_str()) else {
                continue;
            };
            if occupied.overlaps(&whole.range()) {
                continue;
            }
            let listed = self.scan_lead_in_list(s, whole.end(), &mentions, &occupied);
            let governs_known = mentions.iter().any(|m| m.span.start >= whole.end());
            if !governs_known && listed.is_empty() {
                continue;
            }
            occupied.insert(whole.range());
            for m in listed {
                occupied.insert(m.span.clone());
                mentions.push(m);
            }
            lead_ins.push(LeadIn {
                span: whole.range(),
                prefix_start: whole.start(),
                result,
                attrs: Qualifiers::default(),
            });
        }

        for caps in UNKNOWN_MENTION.captures_iter(s) {
            let Some(token) = caps.get(1) else { continue };
            if occupied.overlaps(&token.range()) || !is_marker_like(token.as_str()) {
                continue;
            }
            if self.vocab.resolve(token.as_str()).is_some() {
                continue;
            }
            // "ER SP1 positive": a token right after a known marker qualifies it.
            let follows_known = mentions
                .iter()
                .any(|m| m.recognized && m.span.end <= token.start() && s[m.span.end..token.start()].trim().is_empty());
            if follows_known {
                continue;
            }
            if occupied.insert(token.range()) {
                mentions.push(Mention {
                    span: token.range(),
                    marker: token.as_str().to_string(),
                    recognized: false,
                });
            }
        }

        mentions.sort_by_key(|m| m.span.start);
        if mentions.is_empty() {
            return (Vec::new(), notes);
        }

        // Attribute prefix of each lead-in: after the last comma following
        // the previous mention, or from clause start when nothing precedes it.
        for lead in &mut lead_ins {
            let prev_end = mentions
                .iter()
                .filter(|m| m.span.end <= lead.span.start)
                .map(|m| m.span.end)
                .max();
            let window = &s[prev_end.unwrap_or(0)..lead.span.start];
            lead.prefix_start = match (prev_end, window.rfind(',')) {
                (Some(end), Some(comma)) => end + comma + 1,
                (Some(_), None) => lead.span.start,
                (None, _) => 0,
            };
            let prefix = &s[lead.prefix_start..lead.span.start];
            lead.attrs = scan_qualifiers(prefix, &mut SpanSet::new(), false);
        }

        // Each tail stops at the next mention or the next lead-in prefix.
        let mut stops: Vec<usize> = mentions.iter().map(|m| m.span.start).collect();
        stops.extend(lead_ins.iter().map(|l| l.prefix_start));
        stops.sort_unstable();

        let mut candidates: Vec<MarkerCandidate> = Vec::with_capacity(mentions.len());
        let mut tails: Vec<Range<usize>> = Vec::with_capacity(mentions.len());

        for mention in &mentions {
            let limit = stops
                .iter()
                .copied()
                .find(|&stop| stop >= mention.span.end)
                .unwrap_or(s.len());
            let raw_tail = &s[mention.span.end..limit];
            let tail = mention.span.end..mention.span.end + cap_tokens(raw_tail, self.config.qualifier_window_tokens);

            let mut claimed = SpanSet::new();
            let mut controls: Vec<String> = Vec::new();
            for note in notes.iter_mut() {
                if note.span.start >= tail.start && note.span.start < tail.end {
                    note.bound = true;
                    controls.push(note.text.clone());
                    claimed.insert(note.span.start - tail.start..note.span.end.min(tail.end) - tail.start);
                }
            }

            let tail_text = &s[tail.clone()];
            let q = scan_qualifiers(tail_text, &mut claimed, true);
            let residual = residual_words(tail_text, &claimed);

            let mut evidence_end = tail.start + q.last_end;
            if let Some(last) = residual.last() {
                evidence_end = evidence_end.max(tail.start + last.end);
            }
            for note in notes.iter().filter(|n| n.bound && n.span.start >= tail.start && n.span.start < tail.end) {
                evidence_end = evidence_end.max(note.span.end.min(tail.end));
            }
            let evidence_end = evidence_end.max(mention.span.end);

            let mut c = MarkerCandidate::new(mention.marker.clone(), mention.recognized, 0.0);
            if let Some((&first, rest)) = q.results.split_first() {
                c.result = Some(first);
                c.result_source = ResultSource::Explicit;
                for &r in rest {
                    if r != first && !c.conflicting_results.contains(&r) {
                        c.conflicting_results.push(r);
                    }
                }
            }
            c.pattern = q.pattern;
            c.intensity = q.intensity;
            c.percent = q.percent;
            c.percent_bound = q.percent_bound;
            c.percent_range = q.percent_range;
            c.extent = q.extent;
            c.hedged = q.hedged;
            if !controls.is_empty() {
                c.controls = Some(controls.join("; "));
            }
            if !residual.is_empty() {
                c.comment = Some(
                    residual
                        .iter()
                        .map(|r| &tail_text[r.clone()])
                        .collect::<Vec<_>>()
                        .join(" "),
                );
            }
            c.evidence.push(EvidenceSpan {
                text: s[mention.span.start..evidence_end].to_string(),
                start: base + mention.span.start,
                end: base + evidence_end,
            });

            candidates.push(c);
            tails.push(tail);
        }

        // Lead-ins: latest preceding lead-in governs markers without a result.
        for (c, mention) in candidates.iter_mut().zip(&mentions) {
            if c.result.is_some() {
                continue;
            }
            let Some(lead) = lead_ins.iter().rev().find(|l| l.span.end <= mention.span.start) else {
                continue;
            };
            c.result = Some(lead.result);
            c.result_source = ResultSource::LeadIn;
            c.hedged |= lead.attrs.hedged;
            fill_missing(c, &lead.attrs);
        }

        // Shared lists, resolved right to left so chains propagate.
        for i in (0..candidates.len().saturating_sub(1)).rev() {
            if candidates[i].result.is_some() {
                continue;
            }
            let tail = &s[tails[i].clone()];
            if !is_list_separator_only(tail) || tails[i].end != mentions[i + 1].span.start {
                continue;
            }
            let next = candidates[i + 1].clone();
            if !matches!(next.result_source, ResultSource::Explicit | ResultSource::SharedList) {
                continue;
            }
            let c = &mut candidates[i];
            c.result = next.result;
            c.result_source = ResultSource::SharedList;
            c.intensity = c.intensity.or(next.intensity);
            c.pattern = c.pattern.or(next.pattern);
            c.extent = c.extent.or(next.extent);
            c.hedged |= next.hedged;
            if let Some(span) = next.evidence.first() {
                c.evidence.push(span.clone());
            }
        }

        for c in &mut candidates {
            if c.result.is_none() && options.allow_inference && c.has_supporting_attributes() {
                c.result = Some(MarkerResult::Positive);
                c.result_source = ResultSource::Inferred;
                let note = format!("result inferred from {}", describe_attributes(c));
                c.comment = Some(match c.comment.take() {
                    Some(existing) => format!("{existing}; {note}"),
                    None => note,
                });
            }
            c.confidence = if c.recognized {
                self.config.base_for(c.result_source)
            } else {
                self.config
                    .base_confidence
                    .unknown_marker
                    .min(self.config.base_for(c.result_source))
            };
        }

        (candidates, notes)
    }

    /// Marker-like tokens listed right after a lead-in ("positive for CD99, CD10").
    fn scan_lead_in_list(
        &self,
        s: &str,
        mut pos: usize,
        known: &[Mention],
        occupied: &SpanSet,
    ) -> Vec<Mention> {
        let mut listed = Vec::new();
        loop {
            if let Some(sep) = LIST_SEPARATOR.find(&s[pos..]) {
                pos += sep.end();
            }
            if pos >= s.len() {
                break;
            }
            if let Some(k) = known.iter().find(|k| k.span.start == pos) {
                pos = k.span.end;
                continue;
            }
            let Some(token) = LIST_TOKEN.find(&s[pos..]) else {
                break;
            };
            let span = pos + token.start()..pos + token.end();
            if occupied.overlaps(&span) || !is_marker_like(token.as_str()) {
                break;
            }
            listed.push(Mention {
                span: span.clone(),
                marker: token.as_str().to_string(),
                recognized: false,
            });
            pos = span.end;
        }
        listed
    }
}

fn result_word(word: &str) -> Option<MarkerResult> {
    let w = word.to_lowercase();
    if w.starts_with("non") || w.contains("negative") {
        Some(MarkerResult::Negative)
    } else if w == "equivocal" {
        Some(MarkerResult::Equivocal)
    } else if w.starts_with("positiv") || w.contains("reactive") || w == "immunopositive" {
        Some(MarkerResult::Positive)
    } else {
        None
    }
}

/// Marker names carry a digit ("CD99", "FLI1") or are all capitals ("BRAF").
fn is_marker_like(token: &str) -> bool {
    let lowered = token.to_lowercase();
    if token.chars().count() <= 2 || NON_MARKER_WORDS.contains(&lowered.as_str()) {
        return false;
    }
    let has_digit = token.chars().any(|c| c.is_ascii_digit());
    let all_capitals = token
        .chars()
        .filter(|c| c.is_alphabetic())
        .all(|c| c.is_uppercase());
    has_digit || all_capitals
}

/// Run the ordered qualifier rules over `text`, claiming spans in `claimed`.
fn scan_qualifiers(text: &str, claimed: &mut SpanSet, with_results: bool) -> Qualifiers {
    let mut q = Qualifiers::default();
    let mut results: Vec<(usize, MarkerResult)> = Vec::new();

    for rule in QUALIFIER_RULES.iter() {
        if !with_results && matches!(rule.qualifier, Qualifier::Result(_)) {
            continue;
        }
        for caps in rule.regex.captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            if !claimed.insert(whole.range()) {
                continue;
            }
            q.last_end = q.last_end.max(whole.end());
            let group = |i: usize| caps.get(i).map(|m| m.as_str()).unwrap_or_default();
            match rule.qualifier {
                Qualifier::PercentRange => {
                    if q.percent_range.is_none() {
                        if let (Ok(low), Ok(high)) = (group(1).parse(), group(2).parse()) {
                            q.percent_range = Some(PercentRange { low, high });
                        }
                    }
                }
                Qualifier::Percent => {
                    if q.percent.is_none() {
                        q.percent = caps.name("num").and_then(|m| parse_percent(m.as_str()));
                        q.percent_bound = caps.name("cmp").and_then(|m| bound_word(m.as_str()));
                    }
                }
                Qualifier::Result(r) => results.push((whole.start(), r)),
                Qualifier::Score => {
                    if q.intensity.is_none() {
                        q.intensity = score_intensity(group(1));
                    }
                }
                Qualifier::Intensity => {
                    if q.intensity.is_none() {
                        q.intensity = intensity_word(group(1));
                    }
                }
                Qualifier::Pattern => {
                    if q.pattern.is_none() {
                        q.pattern = pattern_word(group(1));
                    }
                }
                Qualifier::Extent => {
                    if q.extent.is_none() {
                        q.extent = extent_word(group(1));
                    }
                }
                Qualifier::Hedge => q.hedged = true,
            }
        }
    }

    results.sort_by_key(|(pos, _)| *pos);
    q.results = results.into_iter().map(|(_, r)| r).collect();
    q
}

/// Word ranges not claimed by any rule and not filler.
fn residual_words(text: &str, claimed: &SpanSet) -> Vec<Range<usize>> {
    WORD.find_iter(text)
        .filter(|w| !claimed.overlaps(&w.range()))
        .filter(|w| {
            let lowered = w.as_str().trim_end_matches(['.', '-']).to_lowercase();
            !FILLER_WORDS.contains(&lowered.as_str())
        })
        .map(|w| w.range())
        .collect()
}

fn fill_missing(c: &mut MarkerCandidate, attrs: &Qualifiers) {
    c.pattern = c.pattern.or(attrs.pattern);
    c.intensity = c.intensity.or(attrs.intensity);
    c.extent = c.extent.or(attrs.extent);
    if c.percent.is_none() {
        c.percent = attrs.percent;
        c.percent_bound = attrs.percent_bound;
    }
    c.percent_range = c.percent_range.or(attrs.percent_range);
}

fn describe_attributes(c: &MarkerCandidate) -> String {
    let mut parts = Vec::new();
    if let Some(i) = c.intensity {
        parts.push(format!("{i} intensity"));
    }
    if let Some(p) = c.pattern {
        parts.push(format!("{p} pattern"));
    }
    if let Some(e) = c.extent {
        parts.push(format!("{e} extent"));
    }
    if let Some(p) = c.percent.filter(|&p| p > 0) {
        parts.push(format!("{p}% of cells"));
    } else if let Some(r) = c.percent_range {
        parts.push(format!("{}-{}% of cells", r.low, r.high));
    }
    parts.join(", ")
}

/// Byte length of the first `max_tokens` whitespace-separated tokens.
fn cap_tokens(text: &str, max_tokens: usize) -> usize {
    let mut count = 0;
    let mut in_token = false;
    for (i, c) in text.char_indices() {
        if c.is_whitespace() {
            if in_token {
                in_token = false;
                if count == max_tokens {
                    return i;
                }
            }
        } else if !in_token {
            in_token = true;
            count += 1;
        }
    }
    text.len()
}
