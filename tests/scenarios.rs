// End-to-end scenarios: hand-built streams and log files through the public API

use std::fs;
use tempfile::TempDir;

use tapstat::dataset;
use tapstat::overlap::{AnalysisWarning, PairKey, Relation, NO_OVERLAP_RATIO};
use tapstat::pipeline::{analyze_sessions, Session};
use tapstat::{
    analyze_stream, classify_stream, AnalysisConfig, AnalysisError, EventStream, KeyClasses,
    KeyEvent, KeyTable,
};

fn classify(keys: &KeyTable, events: Vec<KeyEvent>) -> tapstat::OverlapStats {
    classify_stream(keys, KeyClasses::default().resolve(keys), 1500, &EventStream::new(events))
        .unwrap()
}

#[test]
fn test_modifier_wraps_letter() {
    let mut keys = KeyTable::new();
    let shift = keys.intern("shift");
    let a = keys.intern("a");

    let stats = classify(
        &keys,
        vec![
            KeyEvent::press(0, shift),
            KeyEvent::press(5, a),
            KeyEvent::release(10, a),
            KeyEvent::release(12, shift),
        ],
    );

    let pair = PairKey {
        relation: Relation::Wrap,
        outer: shift,
        inner: a,
    };
    let entries = stats.mod_intersections.get(&pair);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].overlap_ms, 5);
    assert_eq!(entries[0].press_gap_ms, 5);
    assert_eq!(stats.wraps(true, false), 1);
    assert_eq!(stats.mod_intersections.entry_count(), 1);
}

#[test]
fn test_lone_press_is_zero_overlap() {
    let mut keys = KeyTable::new();
    let a = keys.intern("a");

    let stats = classify(&keys, vec![KeyEvent::press(0, a), KeyEvent::release(10, a)]);
    assert_eq!(stats.zero_overlaps.get(&false), 1);
    assert_eq!(stats.zero_overlap_durations.non_modifier, vec![10]);
    assert!(stats.zero_overlap_durations.modifier.is_empty());
}

#[test]
fn test_zero_duration_uses_sentinel() {
    let mut keys = KeyTable::new();
    let a = keys.intern("a");
    let b = keys.intern("b");

    let stats = classify(&keys, vec![KeyEvent::press(0, a), KeyEvent::release(5, a)]);
    assert_eq!(stats.key_durations[&a], vec![5]);
    assert_eq!(stats.zero_duration_warnings(), 0);

    // b held over an instantaneous a
    let stats = classify(
        &keys,
        vec![
            KeyEvent::press(0, b),
            KeyEvent::press(3, a),
            KeyEvent::release(3, a),
            KeyEvent::release(9, b),
        ],
    );
    assert_eq!(stats.zero_duration_warnings(), 1);
    let pair = PairKey {
        relation: Relation::Wrap,
        outer: b,
        inner: a,
    };
    let entries = stats.non_mod_intersections.get(&pair);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].overlap_ratio, NO_OVERLAP_RATIO);
    assert!(matches!(
        stats.warnings[0],
        AnalysisWarning::ZeroDuration { timestamp_ms: 3, .. }
    ));
}

#[test]
fn test_lone_zero_duration_tap() {
    let mut keys = KeyTable::new();
    let a = keys.intern("a");

    let stats = classify(&keys, vec![KeyEvent::press(0, a), KeyEvent::release(0, a)]);

    assert_eq!(
        stats.warnings,
        vec![AnalysisWarning::ZeroDuration {
            key: "a".to_string(),
            timestamp_ms: 0,
        }]
    );
    assert_eq!(stats.zero_overlaps.get(&false), 1);
    assert_eq!(stats.zero_overlap_durations.non_modifier, vec![0]);
    assert_eq!(stats.key_durations[&a], vec![0]);
}

#[test]
fn test_double_press_is_fatal() {
    let mut keys = KeyTable::new();
    let a = keys.intern("a");
    let stream = EventStream::new(vec![KeyEvent::press(0, a), KeyEvent::press(5, a)]);

    let err = classify_stream(&keys, KeyClasses::default().resolve(&keys), 1500, &stream)
        .unwrap_err();
    assert_eq!(err.key(), "a");
    assert_eq!(err.timestamp_ms(), 5);
    assert_eq!(err.down(), &[("a".to_string(), 0)]);
}

#[test]
fn test_tap_hold_chord_becomes_one_example() {
    let mut keys = KeyTable::new();
    let d = keys.intern("d");
    let f = keys.intern("f");
    let j = keys.intern("j");
    let k = keys.intern("k");

    let stream = EventStream::new(vec![
        KeyEvent::press(0, d),
        KeyEvent::release(20, d),
        KeyEvent::press(40, f),
        KeyEvent::press(80, j),
        KeyEvent::release(150, j),
        KeyEvent::release(170, f),
        KeyEvent::press(200, k),
        KeyEvent::release(230, k),
    ]);

    let analysis = analyze_stream(&keys, &stream, &AnalysisConfig::default()).unwrap();
    let training = &analysis.training;
    assert_eq!(training.len(), 1);
    assert_eq!(
        training.examples[0].timestamps(),
        [0, 20, 40, 80, 150, 170, 200]
    );
    assert!(training.examples[0].wrapped);
    assert_eq!(training.counts.total, 1);
}

#[test]
fn test_log_files_to_dataset_and_report() {
    let temp_dir = TempDir::new().unwrap();
    let good = temp_dir.path().join("good.tsv");
    let broken = temp_dir.path().join("broken.tsv");
    let rows = temp_dir.path().join("training.tsv.gz");

    fs::write(
        &good,
        "0\t1\tD\n20\t0\tD\n40\t1\tF\n80\t1\tJ\n150\t0\tJ\n170\t0\tF\n200\t1\tK\n230\t0\tK\n",
    )
    .unwrap();
    fs::write(&broken, "0\t0\ta\n").unwrap();

    let mut keys = KeyTable::new();
    let sessions = vec![
        Session::load(&good, &mut keys).unwrap(),
        Session::load(&broken, &mut keys).unwrap(),
    ];
    assert_eq!(sessions[0].sha256.len(), 64);

    let config = AnalysisConfig::default();
    let batch = analyze_sessions(&keys, &sessions, &config, None).unwrap();
    assert_eq!(batch.skipped(), 1);
    assert_eq!(batch.analysis.training.len(), 1);

    dataset::save(&rows, &batch.analysis.training.examples).unwrap();
    let loaded = dataset::load(&rows).unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].times_ms, [0, 20, 40, 80, 150, 170, 200]);
    assert!(!loaded[0].is_mod);

    let report = batch.report(&keys, &config);
    assert_eq!(report.total_presses, 4);
    assert_eq!(report.training.counts.total, 1);
    assert!(report.sources[1].skipped.is_some());

    let markdown = report.render_markdown();
    assert!(markdown.contains("# Training Data"));
    assert!(markdown.contains("good.tsv"));
}

#[test]
fn test_config_errors_surface() {
    let keys = KeyTable::new();
    let config = AnalysisConfig {
        max_release_gap_ms: 0,
        ..AnalysisConfig::default()
    };
    let result = analyze_stream(&keys, &EventStream::default(), &config);
    assert!(matches!(result, Err(AnalysisError::Config(_))));
}
