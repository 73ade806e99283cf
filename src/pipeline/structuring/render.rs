use super::types::{MarkerCandidate, Rendered, TableRow};
use crate::config::DEFAULT_SPECIMEN_LABEL;

/// Render validated markers as a narrative block plus one table row each.
///
/// Pure presentation: identical input always renders byte-identical output.
/// The narrative is `None` when there are no markers.
pub fn render(markers: &[MarkerCandidate], specimen_id: Option<&str>) -> Rendered {
    let table = markers.iter().map(table_row).collect();

    let narrative = (!markers.is_empty()).then(|| {
        let specimen = specimen_id
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SPECIMEN_LABEL);
        let lines = markers.iter().map(narrative_line).collect::<Vec<_>>();
        format!("Immunohistochemistry ({specimen}):\n{}", lines.join("\n"))
    });

    Rendered { narrative, table }
}

fn percent_text(m: &MarkerCandidate) -> Option<String> {
    match (m.percent, m.percent_range) {
        (Some(p), _) => {
            let bound = m.percent_bound.map(|b| b.symbol()).unwrap_or("");
            Some(format!("{bound}{p}%"))
        }
        (None, Some(r)) => Some(format!("{}-{}%", r.low, r.high)),
        (None, None) => None,
    }
}

fn narrative_line(m: &MarkerCandidate) -> String {
    let mut pieces: Vec<String> = vec![m
        .result
        .map(|r| r.display_label().to_string())
        .unwrap_or_else(|| "result not stated".into())];
    if let Some(p) = m.pattern {
        pieces.push(p.to_string());
    }
    if let Some(i) = m.intensity {
        pieces.push(i.to_string());
    }
    if let Some(e) = m.extent {
        pieces.push(e.to_string());
    }
    if let Some(p) = percent_text(m) {
        pieces.push(format!("in {p} of cells"));
    }

    let name = if m.recognized {
        m.marker.clone()
    } else {
        format!("{} (unrecognised marker)", m.marker)
    };
    let mut line = format!("{name}: {}.", pieces.join(", "));
    if let Some(controls) = &m.controls {
        line.push_str(&format!(" Controls: {controls}."));
    }
    line
}

fn table_row(m: &MarkerCandidate) -> TableRow {
    TableRow {
        marker: m.marker.clone(),
        result: m.result.map(|r| r.display_label().to_string()).unwrap_or_default(),
        pattern: m.pattern.map(|p| p.to_string()),
        intensity: m.intensity.map(|i| i.to_string()),
        percent: percent_text(m),
        extent: m.extent.map(|e| e.to_string()),
        controls: m.controls.clone(),
        comment: m.comment.clone(),
        confidence: m.confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::{Intensity, MarkerResult, PercentBound, StainPattern};
    use crate::pipeline::structuring::types::PercentRange;

    fn er() -> MarkerCandidate {
        let mut c = MarkerCandidate::new("ER", true, 0.95);
        c.result = Some(MarkerResult::Positive);
        c.pattern = Some(StainPattern::Nuclear);
        c.intensity = Some(Intensity::Strong);
        c.percent = Some(90);
        c
    }

    #[test]
    fn narrative_matches_report_style() {
        let r = render(&[er()], None);
        assert_eq!(
            r.narrative.as_deref(),
            Some("Immunohistochemistry (Specimen A):\nER: Positive, nuclear, strong, in 90% of cells.")
        );
    }

    #[test]
    fn specimen_label_from_context() {
        let r = render(&[er()], Some("B2"));
        assert!(r.narrative.unwrap().starts_with("Immunohistochemistry (B2):"));
    }

    #[test]
    fn no_markers_no_narrative() {
        let r = render(&[], Some("A"));
        assert!(r.narrative.is_none());
        assert!(r.table.is_empty());
    }

    #[test]
    fn missing_result_and_unknown_marker_are_visible() {
        let ck = MarkerCandidate::new("CK7", true, 0.65);
        let mut cd = MarkerCandidate::new("CD99", false, 0.25);
        cd.result = Some(MarkerResult::Negative);
        let r = render(&[ck, cd], None);
        let text = r.narrative.unwrap();
        assert!(text.contains("CK7: result not stated."));
        assert!(text.contains("CD99 (unrecognised marker): Negative."));
        assert_eq!(r.table[0].result, "");
    }

    #[test]
    fn percent_bound_is_kept_in_text() {
        let mut neg = MarkerCandidate::new("PR", true, 0.95);
        neg.result = Some(MarkerResult::Negative);
        neg.percent = Some(1);
        neg.percent_bound = Some(PercentBound::Below);
        let r = render(&[neg], None);
        assert_eq!(r.table[0].percent.as_deref(), Some("<1%"));
        assert!(r.narrative.unwrap().contains("in <1% of cells"));
    }

    #[test]
    fn table_row_fields() {
        let mut ki = MarkerCandidate::new("Ki-67", true, 0.80);
        ki.result = Some(MarkerResult::Positive);
        ki.percent_range = Some(PercentRange { low: 10, high: 20 });
        ki.controls = Some("internal controls adequate".into());
        let r = render(&[ki], None);
        let row = &r.table[0];
        assert_eq!(row.percent.as_deref(), Some("10-20%"));
        assert_eq!(row.result, "Positive");
        assert!((row.confidence - 0.80).abs() < f32::EPSILON);
        assert!(r
            .narrative
            .unwrap()
            .ends_with("Ki-67: Positive, in 10-20% of cells. Controls: internal controls adequate."));
    }

    #[test]
    fn rendering_is_repeatable() {
        let markers = vec![er(), MarkerCandidate::new("PR", true, 0.5)];
        assert_eq!(render(&markers, None), render(&markers, None));
    }
}
