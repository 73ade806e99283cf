use super::vocabulary::{alias_key, MarkerVocabulary};

/// Maximum edit distance for a suggestion.
const MAX_DISTANCE: u32 = 2;

/// Closest vocabulary marker to an unrecognised token, if one is clearly
/// closest. Short tokens (4 chars or fewer) only match at distance 1.
pub fn closest_marker<'v>(token: &str, vocab: &'v MarkerVocabulary) -> Option<&'v str> {
    let key = alias_key(token);
    if key.chars().count() < 3 {
        return None;
    }
    let limit = if key.chars().count() <= 4 { 1 } else { MAX_DISTANCE };

    let mut best: Option<(u32, &str)> = None;
    let mut tied = false;

    for def in vocab.markers() {
        let distance = std::iter::once(&def.name)
            .chain(def.aliases.iter())
            .map(|phrase| edit_distance(&key, &alias_key(phrase)))
            .min()
            .unwrap_or(u32::MAX);
        if distance == 0 || distance > limit {
            continue;
        }
        match best {
            Some((d, _)) if distance > d => {}
            Some((d, name)) if distance == d => tied |= name != def.name,
            _ => {
                best = Some((distance, def.name.as_str()));
                tied = false;
            }
        }
    }

    if tied {
        None
    } else {
        best.map(|(_, name)| name)
    }
}

fn edit_distance(a: &str, b: &str) -> u32 {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let m = a_chars.len();
    let n = b_chars.len();

    if m == 0 { return n as u32; }
    if n == 0 { return m as u32; }

    let mut prev: Vec<u32> = (0..=n as u32).collect();
    let mut curr = vec![0u32; n + 1];

    for (i, &a_ch) in a_chars.iter().enumerate() {
        curr[0] = (i + 1) as u32;
        for (j, &b_ch) in b_chars.iter().enumerate() {
            let cost = if a_ch == b_ch { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1)
                .min(curr[j] + 1)
                .min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[n]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vocab() -> MarkerVocabulary {
        MarkerVocabulary::builtin().unwrap()
    }

    #[test]
    fn suggests_near_miss() {
        let v = vocab();
        assert_eq!(closest_marker("Synaptophysn", &v), Some("Synaptophysin"));
        assert_eq!(closest_marker("GATA2", &v), Some("GATA3"));
        assert_eq!(closest_marker("Vimentine", &v), Some("Vimentin"));
    }

    #[test]
    fn no_suggestion_when_far() {
        let v = vocab();
        assert_eq!(closest_marker("BRAF", &v), None);
        assert_eq!(closest_marker("Calponin", &v), None);
    }

    #[test]
    fn ambiguous_suggestion_withheld() {
        let v = vocab();
        // "CK2" is one edit from CK7 and from CK20
        assert_eq!(closest_marker("CK2", &v), None);
    }

    #[test]
    fn edit_distance_basic() {
        assert_eq!(edit_distance("kitten", "sitting"), 3);
        assert_eq!(edit_distance("", "abc"), 3);
        assert_eq!(edit_distance("gata2", "gata3"), 1);
    }
}
