// Markdown rendering
// Headings and pipe tables for an AnalysisReport

use super::{
    AnalysisReport, CountRow, DurationSummary, GapSection, IntersectionSummary, KeySummary,
    ModPairCounts, Variations,
};
use crate::overlap::{AnalysisWarning, ByModifier};

/// Pipe table with a header row
struct Table {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    fn new(header: &[&str]) -> Self {
        Table {
            header: header.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    fn row(&mut self, cells: Vec<String>) {
        self.rows.push(cells);
    }

    fn render(&self, out: &mut String) {
        let widths: Vec<usize> = (0..self.header.len())
            .map(|col| {
                self.rows
                    .iter()
                    .filter_map(|r| r.get(col))
                    .chain(std::iter::once(&self.header[col]))
                    .map(|cell| cell.chars().count())
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let line = |cells: &[String]| {
            let padded: Vec<String> = widths
                .iter()
                .enumerate()
                .map(|(i, w)| {
                    let cell = cells.get(i).map(String::as_str).unwrap_or("");
                    format!("{:<width$}", cell, width = *w)
                })
                .collect();
            format!("| {} |\n", padded.join(" | "))
        };

        out.push_str(&line(&self.header));
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat((*w).max(3))).collect();
        out.push_str(&format!("|-{}-|\n", rule.join("-|-")));
        for row in &self.rows {
            out.push_str(&line(row));
        }
        out.push('\n');
    }
}

fn heading(out: &mut String, level: usize, title: &str) {
    out.push_str(&format!("{} {}\n\n", "#".repeat(level), title));
}

fn millis(value: f64) -> String {
    format!("{:.0}", value)
}

fn percent(value: f64) -> String {
    format!("{:.2}%", value * 100.0)
}

fn pct_of(count: usize, total: usize) -> String {
    if total == 0 {
        "-".to_string()
    } else {
        percent(count as f64 / total as f64)
    }
}

fn summary(out: &mut String, value: &Option<DurationSummary>, percentile: f64, fmt: fn(f64) -> String) {
    let Some(s) = value else {
        out.push_str("was empty\n\n");
        return;
    };

    let below = format!("{}% below", trim_float(percentile * 100.0));
    let mut table = Table::new(&["count", "min", "max", "avg", "median", below.as_str()]);
    table.row(vec![
        s.count.to_string(),
        fmt(s.min),
        fmt(s.max),
        fmt(s.mean),
        fmt(s.median),
        fmt(s.below),
    ]);
    table.render(out);
}

/// `99.0` -> `99`, `99.5` -> `99.5`
fn trim_float(value: f64) -> String {
    let text = format!("{:.2}", value);
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

fn counts(out: &mut String, rows: &[CountRow]) {
    if rows.is_empty() {
        out.push_str("none\n\n");
        return;
    }
    let mut table = Table::new(&["key", "count"]);
    for row in rows {
        table.row(vec![row.key.clone(), row.count.to_string()]);
    }
    table.render(out);
}

fn per_key(out: &mut String, rows: &[KeySummary], percentile: f64) {
    if rows.is_empty() {
        return;
    }
    heading(out, 2, "Per key");
    let below = format!("{}% below", trim_float(percentile * 100.0));
    let mut table = Table::new(&["key", "count", "min", "max", "avg", "median", below.as_str()]);
    for row in rows {
        let s = &row.summary;
        table.row(vec![
            row.key.clone(),
            s.count.to_string(),
            millis(s.min),
            millis(s.max),
            millis(s.mean),
            millis(s.median),
            millis(s.below),
        ]);
    }
    table.render(out);
}

fn gaps(out: &mut String, section: &GapSection, percentile: f64) {
    heading(out, 2, "All keys");
    summary(out, &section.all, percentile, millis);
    heading(out, 2, "Non-mods");
    summary(out, &section.buckets.non_modifier, percentile, millis);
    heading(out, 2, "Mods");
    summary(out, &section.buckets.modifier, percentile, millis);
    per_key(out, &section.per_key, percentile);
}

fn intersections(out: &mut String, section: &IntersectionSummary, kind: &str, focus: &str, percentile: f64) {
    heading(out, 3, &format!("{} THEN others", focus));
    heading(out, 4, "Overlap duration");
    summary(out, &section.focus_overlap, percentile, millis);
    heading(out, 4, "Duration between both presses");
    summary(out, &section.focus_press_gap, percentile, millis);

    heading(out, 3, &format!("All {}", kind));
    heading(out, 4, "Overlap duration");
    summary(out, &section.overlap, percentile, millis);
    heading(out, 4, "Overlap percentages");
    summary(out, &section.overlap_ratio, percentile, percent);
    heading(out, 4, "Duration between both presses");
    summary(out, &section.press_gap, percentile, millis);

    if !section.busiest_pairs.is_empty() {
        heading(out, 4, "Most frequent pairs");
        let mut table = Table::new(&["relation", "first", "second", "count"]);
        for pair in &section.busiest_pairs {
            table.row(vec![
                format!("{:?}", pair.relation),
                pair.outer.clone(),
                pair.inner.clone(),
                pair.count.to_string(),
            ]);
        }
        table.render(out);
    }
}

fn bucket_rows(table: &mut Table, counts: &ByModifier<usize>, postfix: &str) {
    let total = counts.non_modifier + counts.modifier;
    table.row(vec![
        format!("non-mod {}", postfix),
        counts.non_modifier.to_string(),
        pct_of(counts.non_modifier, total),
    ]);
    table.row(vec![
        format!("mod {}", postfix),
        counts.modifier.to_string(),
        pct_of(counts.modifier, total),
    ]);
    table.row(vec![format!("total {}", postfix), total.to_string(), String::new()]);
}

fn pair_rows(table: &mut Table, counts: &ModPairCounts, interfix: &str) {
    let total = counts.total();
    for (first, second, count) in [
        ("non-mod", "non-mod", counts.non_mod_non_mod),
        ("non-mod", "mod", counts.non_mod_mod),
        ("mod", "non-mod", counts.mod_non_mod),
        ("mod", "mod", counts.mod_mod),
    ] {
        table.row(vec![
            format!("{} {} {}", first, interfix, second),
            count.to_string(),
            pct_of(count, total),
        ]);
    }
    table.row(vec![format!("total {}", interfix), total.to_string(), String::new()]);
}

fn variations(out: &mut String, v: &Variations, opposite: &str) {
    let mut table = Table::new(&["type", "%"]);
    for (label, value) in [
        ("no overlap/wrap".to_string(), v.no_overlap),
        ("any overlap".to_string(), v.any_overlap),
        ("- overlaps non-mod".to_string(), v.overlaps_non_mod),
        ("- overlaps mod".to_string(), v.overlaps_mod),
        (format!("- overlapped by {}", opposite), v.overlapped_by_opposite),
        ("any wrap".to_string(), v.any_wrap),
        ("- wraps non-mod".to_string(), v.wraps_non_mod),
        ("- wraps mod".to_string(), v.wraps_mod),
        (format!("- wrapped by {}", opposite), v.wrapped_by_opposite),
    ] {
        table.row(vec![label, percent(value)]);
    }
    table.render(out);
}

/// Share of `count` among `count + other`
fn pct2_row(table: &mut Table, label: &str, count: usize, other: usize) {
    table.row(vec![label.to_string(), count.to_string(), pct_of(count, count + other)]);
}

pub fn render(report: &AnalysisReport) -> String {
    let mut out = String::new();
    let p = report.percentile;

    out.push_str("All durations are milliseconds.\n\n");

    if !report.sources.is_empty() {
        heading(&mut out, 1, "Sources");
        let mut table = Table::new(&["path", "events", "sha256", "status"]);
        for source in &report.sources {
            table.row(vec![
                source.path.clone(),
                source.events.to_string(),
                source.sha256.clone(),
                source.skipped.clone().unwrap_or_else(|| "ok".to_string()),
            ]);
        }
        table.render(&mut out);
    }

    heading(&mut out, 1, "Counts per key");
    counts(&mut out, &report.key_counts);
    heading(&mut out, 1, "Simultaneous counts");
    counts(&mut out, &report.co_occurrences);
    heading(&mut out, 1, "Simultaneous mods counts");
    counts(&mut out, &report.modifier_simultaneity);

    let durations = &report.durations;
    heading(&mut out, 1, "Durations");
    heading(&mut out, 2, "All keys");
    summary(&mut out, &durations.all, p, millis);
    heading(&mut out, 2, "Non-mods");
    summary(&mut out, &durations.buckets.non_modifier.all, p, millis);
    heading(&mut out, 3, "Zero overlap");
    summary(&mut out, &durations.buckets.non_modifier.zero_overlap, p, millis);
    heading(&mut out, 2, "Mods");
    summary(&mut out, &durations.buckets.modifier.all, p, millis);
    heading(&mut out, 3, "Zero overlap");
    summary(&mut out, &durations.buckets.modifier.zero_overlap, p, millis);
    per_key(&mut out, &durations.per_key, p);

    heading(&mut out, 1, "Time between previous release and this press (no overlap)");
    gaps(&mut out, &report.release_gaps, p);

    heading(&mut out, 1, "Intersections");
    heading(&mut out, 2, "Non-mods");
    intersections(&mut out, &report.intersections.non_modifier, "non-mods", &report.focus_key, p);
    heading(&mut out, 2, "Mods");
    intersections(&mut out, &report.intersections.modifier, "mods", &report.focus_key, p);
    heading(&mut out, 4, "Duration between presses (only wrapped)");
    summary(&mut out, &report.wrap_press_offsets, p, millis);

    let types = &report.overlap_types;
    heading(&mut out, 1, "Counts per overlap-type");
    let mut table = Table::new(&["type", "count", "%"]);
    bucket_rows(&mut table, &types.zero_overlap, "zero overlap");
    pair_rows(&mut table, &types.overlaps, "overlaps");
    pair_rows(&mut table, &types.wraps, "wraps");
    bucket_rows(&mut table, &types.presses, "presses");
    table.render(&mut out);

    heading(&mut out, 2, "Release outcomes");
    let mut table = Table::new(&["bucket", "zero overlap", "wrapped", "overlapping", "overlapped earlier", "total"]);
    for (label, o) in [
        ("non-mod", &types.release_outcomes.non_modifier),
        ("mod", &types.release_outcomes.modifier),
    ] {
        table.row(vec![
            label.to_string(),
            o.zero_overlap.to_string(),
            o.wrapped.to_string(),
            o.overlapping.to_string(),
            o.overlapped_earlier.to_string(),
            o.total().to_string(),
        ]);
    }
    table.render(&mut out);

    let ratios = &report.ratios;
    heading(&mut out, 2, "Overlaps");
    let mut table = Table::new(&["mods overlaps any", "non-mods overlaps any"]);
    table.row(vec![
        ratios.mods_overlap_any.to_string(),
        ratios.non_mods_overlap_any.to_string(),
    ]);
    table.render(&mut out);
    if let Some(ratio) = ratios.overlap_ratio {
        out.push_str(&format!("as a ratio: `1 : {:.2}`\n\n", ratio));
    }

    heading(&mut out, 2, "Wraps");
    let mut table = Table::new(&["mods wraps any", "non-mods wraps any"]);
    table.row(vec![
        ratios.mods_wrap_any.to_string(),
        ratios.non_mods_wrap_any.to_string(),
    ]);
    table.render(&mut out);
    if let Some(ratio) = ratios.wrap_ratio {
        out.push_str(&format!("as a ratio: `{:.2} : 1`\n\n", ratio));
    }

    heading(&mut out, 2, "Of non-mods");
    variations(&mut out, &report.variations.non_modifier, "mod");
    heading(&mut out, 2, "Of mods");
    variations(&mut out, &report.variations.modifier, "non-mod");

    let training = &report.training;
    let c = &training.counts;
    heading(&mut out, 1, "Training Data");
    let mut table = Table::new(&["type", "count", "%"]);
    table.row(vec!["chord matches".to_string(), training.matches.to_string(), String::new()]);
    table.row(vec!["total".to_string(), c.total.to_string(), String::new()]);
    pct2_row(&mut table, "mod", c.examples.modifier, c.examples.non_modifier);
    pct2_row(&mut table, "non-mod", c.examples.non_modifier, c.examples.modifier);
    pct2_row(&mut table, "mod overlap", c.overlap.modifier, c.overlap.non_modifier);
    pct2_row(&mut table, "non-mod overlap", c.overlap.non_modifier, c.overlap.modifier);
    pct2_row(&mut table, "mod wrap", c.wrap.modifier, c.wrap.non_modifier);
    pct2_row(&mut table, "non-mod wrap", c.wrap.non_modifier, c.wrap.modifier);
    pct2_row(&mut table, "mod triple-down", c.triple_down.modifier, c.triple_down.non_modifier);
    pct2_row(&mut table, "non-mod triple-down", c.triple_down.non_modifier, c.triple_down.modifier);
    table.render(&mut out);

    heading(&mut out, 2, "Rejected matches");
    counts(&mut out, &training.rejected);
    heading(&mut out, 2, "Most common mods");
    counts(&mut out, &training.most_common_modifiers);

    if !report.warnings.is_empty() {
        heading(&mut out, 1, "Warnings");
        for warning in &report.warnings {
            match warning {
                AnalysisWarning::ZeroDuration { key, timestamp_ms } => {
                    out.push_str(&format!("- {} released at {} was pressed for 0 ms\n", key, timestamp_ms));
                }
                AnalysisWarning::UnterminatedKeys { keys } => {
                    let held: Vec<String> = keys.iter().map(|(k, t)| format!("{}@{}", k, t)).collect();
                    out.push_str(&format!("- still down at end of stream: {}\n", held.join(", ")));
                }
            }
        }
        out.push('\n');
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_layout() {
        let mut table = Table::new(&["key", "count"]);
        table.row(vec!["space".to_string(), "12".to_string()]);
        let mut out = String::new();
        table.render(&mut out);

        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "| key   | count |");
        assert_eq!(lines[1], "|-------|-------|");
        assert_eq!(lines[2], "| space | 12    |");
    }

    #[test]
    fn test_trim_float() {
        assert_eq!(trim_float(99.0), "99");
        assert_eq!(trim_float(99.5), "99.5");
    }

    #[test]
    fn test_empty_summary() {
        let mut out = String::new();
        summary(&mut out, &None, 0.99, millis);
        assert_eq!(out, "was empty\n\n");
    }

    #[test]
    fn test_render_sections() {
        let summary = DurationSummary::from_millis(&[10, 20], 0.99);
        let mut report = AnalysisReport {
            generated_at: String::new(),
            percentile: 0.99,
            focus_key: "space".to_string(),
            sources: Vec::new(),
            total_presses: 2,
            key_counts: vec![CountRow {
                key: "a".to_string(),
                count: 2,
            }],
            co_occurrences: Vec::new(),
            modifier_simultaneity: Vec::new(),
            durations: Default::default(),
            release_gaps: Default::default(),
            intersections: Default::default(),
            wrap_press_offsets: None,
            overlap_types: Default::default(),
            ratios: Default::default(),
            variations: Default::default(),
            training: Default::default(),
            warnings: vec![AnalysisWarning::ZeroDuration {
                key: "a".to_string(),
                timestamp_ms: 7,
            }],
        };
        report.durations.all = summary;
        report.ratios.overlap_ratio = Some(2.0);

        let text = report.render_markdown();
        assert!(text.contains("# Counts per key\n\n"));
        assert!(text.contains("as a ratio: `1 : 2.00`\n\n"));
        assert!(!text.contains("still down"));
        assert!(text.contains("| a   | 2     |"));
        assert!(text.contains("99% below"));
        assert!(text.contains("# space THEN others"));
        assert!(text.contains("a released at 7 was pressed for 0 ms"));
        assert!(!text.contains("# Sources"));
    }
}
