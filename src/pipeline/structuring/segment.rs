/// Split a batch transcript into case paragraphs.
///
/// Cases are separated by one or more blank (or whitespace-only) lines. Each
/// paragraph keeps its inner line breaks and is trimmed; empty paragraphs are
/// dropped, so the result never contains an empty string.
pub fn segment_batch(text: &str) -> Vec<String> {
    let mut cases = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            flush(&mut current, &mut cases);
        } else {
            current.push(line);
        }
    }
    flush(&mut current, &mut cases);
    cases
}

fn flush(lines: &mut Vec<&str>, cases: &mut Vec<String>) {
    if lines.is_empty() {
        return;
    }
    let paragraph = lines.join("\n").trim().to_string();
    if !paragraph.is_empty() {
        cases.push(paragraph);
    }
    lines.clear();
}
