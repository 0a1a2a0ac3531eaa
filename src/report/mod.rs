// Reporting module
// Turns classifier and extractor output into a serializable report

pub mod markdown;
pub mod stats;

pub use stats::{percentile_below, DurationSummary};

use serde::{Deserialize, Serialize};

use crate::config::AnalysisConfig;
use crate::extract::{TrainingCounts, TrainingSet};
use crate::keys::{KeyFlags, KeyId, KeyTable};
use crate::overlap::{
    AnalysisWarning, ByModifier, IntersectionTable, ModPair, OverlapStats, Relation,
    ReleaseOutcome,
};
use crate::tally::Tally;

/// A named count in a frequency table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountRow {
    pub key: String,
    pub count: usize,
}

/// An input file that contributed to the report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSummary {
    pub path: String,
    pub sha256: String,
    pub events: usize,

    /// Set when the session was skipped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<String>,
}

/// Duration summaries for one modifier bucket
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BucketDurations {
    pub all: Option<DurationSummary>,
    pub zero_overlap: Option<DurationSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeySummary {
    pub key: String,
    pub summary: DurationSummary,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DurationSection {
    pub all: Option<DurationSummary>,
    pub buckets: ByModifier<BucketDurations>,
    pub per_key: Vec<KeySummary>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GapSection {
    pub all: Option<DurationSummary>,
    pub buckets: ByModifier<Option<DurationSummary>>,
    pub per_key: Vec<KeySummary>,
}

/// Entry count of one ordered key pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairRow {
    pub relation: Relation,
    pub outer: String,
    pub inner: String,
    pub count: usize,
}

/// Summaries over one intersection table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntersectionSummary {
    pub entries: usize,
    pub overlap: Option<DurationSummary>,

    /// Overlap as a fraction of the releasing key's hold time, sentinel entries excluded
    pub overlap_ratio: Option<DurationSummary>,
    pub press_gap: Option<DurationSummary>,

    /// Pairs whose outer key is the focus key
    pub focus_overlap: Option<DurationSummary>,
    pub focus_press_gap: Option<DurationSummary>,

    pub busiest_pairs: Vec<PairRow>,
}

/// Counts split by `(outer_is_mod, inner_is_mod)`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModPairCounts {
    pub non_mod_non_mod: usize,
    pub non_mod_mod: usize,
    pub mod_non_mod: usize,
    pub mod_mod: usize,
}

impl ModPairCounts {
    fn from_tally(tally: &Tally<ModPair>) -> Self {
        ModPairCounts {
            non_mod_non_mod: tally.get(&(false, false)),
            non_mod_mod: tally.get(&(false, true)),
            mod_non_mod: tally.get(&(true, false)),
            mod_mod: tally.get(&(true, true)),
        }
    }

    pub fn total(&self) -> usize {
        self.non_mod_non_mod + self.non_mod_mod + self.mod_non_mod + self.mod_mod
    }
}

/// Release outcomes of one modifier bucket; sums to that bucket's presses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCounts {
    pub zero_overlap: usize,
    pub wrapped: usize,
    pub overlapping: usize,
    pub overlapped_earlier: usize,
}

impl OutcomeCounts {
    fn from_stats(stats: &OverlapStats, is_mod: bool) -> Self {
        OutcomeCounts {
            zero_overlap: stats.outcomes(is_mod, ReleaseOutcome::ZeroOverlap),
            wrapped: stats.outcomes(is_mod, ReleaseOutcome::Wrapped),
            overlapping: stats.outcomes(is_mod, ReleaseOutcome::Overlapping),
            overlapped_earlier: stats.outcomes(is_mod, ReleaseOutcome::OverlappedEarlier),
        }
    }

    pub fn total(&self) -> usize {
        self.zero_overlap + self.wrapped + self.overlapping + self.overlapped_earlier
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverlapTypeCounts {
    pub presses: ByModifier<usize>,
    pub zero_overlap: ByModifier<usize>,
    pub overlaps: ModPairCounts,
    pub wraps: ModPairCounts,
    pub release_outcomes: ByModifier<OutcomeCounts>,
}

/// Modifier versus non-modifier overlap and wrap totals
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ratios {
    pub mods_overlap_any: usize,
    pub non_mods_overlap_any: usize,

    /// `non_mods_overlap_any / mods_overlap_any`, read as `1 : x`
    pub overlap_ratio: Option<f64>,

    pub mods_wrap_any: usize,
    pub non_mods_wrap_any: usize,

    /// `mods_wrap_any / non_mods_wrap_any`, read as `x : 1`
    pub wrap_ratio: Option<f64>,
}

/// How one bucket's keys relate to others, as fractions of `total`
///
/// `total` counts each pair once for every bucket it touches, so a pair of
/// two keys from the same bucket is counted once, not twice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Variations {
    pub total: usize,
    pub no_overlap: f64,
    pub any_overlap: f64,
    pub overlaps_non_mod: f64,
    pub overlaps_mod: f64,
    pub overlapped_by_opposite: f64,
    pub any_wrap: f64,
    pub wraps_non_mod: f64,
    pub wraps_mod: f64,
    pub wrapped_by_opposite: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub matches: usize,
    pub counts: TrainingCounts,
    pub rejected: Vec<CountRow>,
    pub most_common_modifiers: Vec<CountRow>,
}

/// Everything a run reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// RFC 3339 creation time
    pub generated_at: String,
    pub percentile: f64,
    pub focus_key: String,
    pub sources: Vec<SourceSummary>,

    pub total_presses: usize,
    pub key_counts: Vec<CountRow>,
    pub co_occurrences: Vec<CountRow>,
    pub modifier_simultaneity: Vec<CountRow>,

    pub durations: DurationSection,
    pub release_gaps: GapSection,
    pub intersections: ByModifier<IntersectionSummary>,

    /// `outer_pressed - inner_pressed` over all wraps
    pub wrap_press_offsets: Option<DurationSummary>,

    pub overlap_types: OverlapTypeCounts,
    pub ratios: Ratios,
    pub variations: ByModifier<Variations>,
    pub training: TrainingSummary,
    pub warnings: Vec<AnalysisWarning>,
}

impl AnalysisReport {
    pub fn build(
        keys: &KeyTable,
        overlap: &OverlapStats,
        training: &TrainingSet,
        config: &AnalysisConfig,
    ) -> Self {
        let flags = config.keys.resolve(keys);
        let builder = ReportBuilder {
            keys,
            flags: &flags,
            config,
        };

        AnalysisReport {
            generated_at: chrono::Utc::now().to_rfc3339(),
            percentile: config.percentile,
            focus_key: config.focus_key.clone(),
            sources: Vec::new(),
            total_presses: overlap.total_presses(),
            key_counts: builder.key_rows(&overlap.key_presses),
            co_occurrences: builder.key_set_rows(&overlap.co_occurrences),
            modifier_simultaneity: builder.key_set_rows(&overlap.modifier_simultaneity),
            durations: builder.durations(overlap),
            release_gaps: builder.release_gaps(overlap),
            intersections: ByModifier {
                non_modifier: builder.intersections(&overlap.non_mod_intersections),
                modifier: builder.intersections(&overlap.mod_intersections),
            },
            wrap_press_offsets: DurationSummary::from_millis(
                &overlap.wrap_press_offsets,
                config.percentile,
            ),
            overlap_types: overlap_types(overlap),
            ratios: ratios(overlap),
            variations: ByModifier {
                non_modifier: variations(overlap, false),
                modifier: variations(overlap, true),
            },
            training: builder.training(training),
            warnings: overlap.warnings.clone(),
        }
    }

    pub fn with_sources(mut self, sources: Vec<SourceSummary>) -> Self {
        self.sources = sources;
        self
    }

    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }

    pub fn from_json_bytes(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }

    pub fn render_markdown(&self) -> String {
        markdown::render(self)
    }
}

struct ReportBuilder<'a> {
    keys: &'a KeyTable,
    flags: &'a KeyFlags,
    config: &'a AnalysisConfig,
}

impl<'a> ReportBuilder<'a> {
    fn summary(&self, values: &[i64]) -> Option<DurationSummary> {
        DurationSummary::from_millis(values, self.config.percentile)
    }

    fn key_rows(&self, tally: &Tally<KeyId>) -> Vec<CountRow> {
        tally
            .most_common(self.config.top_n)
            .into_iter()
            .map(|(key, count)| CountRow {
                key: self.keys.name(key).to_string(),
                count,
            })
            .collect()
    }

    fn key_set_rows(&self, tally: &Tally<Vec<KeyId>>) -> Vec<CountRow> {
        tally
            .most_common(self.config.top_n)
            .into_iter()
            .map(|(set, count)| CountRow {
                key: self.keys.join_names(&set),
                count,
            })
            .collect()
    }

    /// Per-key summaries plus the lists pooled by modifier flag
    fn pooled(
        &self,
        per_key: &std::collections::BTreeMap<KeyId, Vec<i64>>,
    ) -> (Vec<i64>, ByModifier<Vec<i64>>, Vec<KeySummary>) {
        let mut all = Vec::new();
        let mut buckets: ByModifier<Vec<i64>> = ByModifier::default();
        let mut rows = Vec::new();

        for (key, values) in per_key.iter() {
            all.extend_from_slice(values);
            buckets
                .get_mut(self.flags.is_modifier(*key))
                .extend_from_slice(values);
            if let Some(summary) = self.summary(values) {
                rows.push(KeySummary {
                    key: self.keys.name(*key).to_string(),
                    summary,
                });
            }
        }

        rows.sort_by(|a, b| a.key.cmp(&b.key));
        (all, buckets, rows)
    }

    fn durations(&self, overlap: &OverlapStats) -> DurationSection {
        let (all, buckets, per_key) = self.pooled(&overlap.key_durations);

        let bucket = |is_mod: bool| BucketDurations {
            all: self.summary(buckets.get(is_mod)),
            zero_overlap: self.summary(overlap.zero_overlap_durations.get(is_mod)),
        };

        DurationSection {
            all: self.summary(&all),
            buckets: ByModifier {
                non_modifier: bucket(false),
                modifier: bucket(true),
            },
            per_key,
        }
    }

    fn release_gaps(&self, overlap: &OverlapStats) -> GapSection {
        let (all, buckets, per_key) = self.pooled(&overlap.release_gaps);

        GapSection {
            all: self.summary(&all),
            buckets: ByModifier {
                non_modifier: self.summary(&buckets.non_modifier),
                modifier: self.summary(&buckets.modifier),
            },
            per_key,
        }
    }

    fn intersections(&self, table: &IntersectionTable) -> IntersectionSummary {
        let focus = self.keys.get(&self.config.focus_key);

        let mut overlap = Vec::new();
        let mut ratios = Vec::new();
        let mut press_gap = Vec::new();
        let mut focus_overlap = Vec::new();
        let mut focus_press_gap = Vec::new();
        let mut pairs = Vec::new();

        for (pair, entries) in table.iter() {
            let led_by_focus = Some(pair.outer) == focus;
            for entry in entries {
                overlap.push(entry.overlap_ms);
                press_gap.push(entry.press_gap_ms);
                if entry.has_ratio() {
                    ratios.push(entry.overlap_ratio);
                }
                if led_by_focus {
                    focus_overlap.push(entry.overlap_ms);
                    focus_press_gap.push(entry.press_gap_ms);
                }
            }
            pairs.push(PairRow {
                relation: pair.relation,
                outer: self.keys.name(pair.outer).to_string(),
                inner: self.keys.name(pair.inner).to_string(),
                count: entries.len(),
            });
        }

        // stable sort keeps table order among equal counts
        pairs.sort_by(|a, b| b.count.cmp(&a.count));
        pairs.truncate(self.config.top_n);

        IntersectionSummary {
            entries: table.entry_count(),
            overlap: self.summary(&overlap),
            overlap_ratio: DurationSummary::from_values(&ratios, self.config.percentile),
            press_gap: self.summary(&press_gap),
            focus_overlap: self.summary(&focus_overlap),
            focus_press_gap: self.summary(&focus_press_gap),
            busiest_pairs: pairs,
        }
    }

    fn training(&self, training: &TrainingSet) -> TrainingSummary {
        TrainingSummary {
            matches: training.matches,
            counts: training.counts.clone(),
            rejected: training
                .rejected
                .most_common(self.config.top_n)
                .into_iter()
                .map(|(reason, count)| CountRow {
                    key: format!("{:?}", reason),
                    count,
                })
                .collect(),
            most_common_modifiers: self.key_rows(&training.modifier_tap_holds),
        }
    }
}

fn overlap_types(overlap: &OverlapStats) -> OverlapTypeCounts {
    OverlapTypeCounts {
        presses: ByModifier {
            non_modifier: overlap.presses.get(&false),
            modifier: overlap.presses.get(&true),
        },
        zero_overlap: ByModifier {
            non_modifier: overlap.zero_overlaps.get(&false),
            modifier: overlap.zero_overlaps.get(&true),
        },
        overlaps: ModPairCounts::from_tally(&overlap.overlaps),
        wraps: ModPairCounts::from_tally(&overlap.wraps),
        release_outcomes: ByModifier {
            non_modifier: OutcomeCounts::from_stats(overlap, false),
            modifier: OutcomeCounts::from_stats(overlap, true),
        },
    }
}

fn ratios(overlap: &OverlapStats) -> Ratios {
    let mods_overlap_any = overlap.overlaps.sum_where(|(outer, _)| *outer);
    let non_mods_overlap_any = overlap.overlaps.sum_where(|(outer, _)| !*outer);
    let mods_wrap_any = overlap.wraps.sum_where(|(outer, _)| *outer);
    let non_mods_wrap_any = overlap.wraps.sum_where(|(outer, _)| !*outer);

    Ratios {
        mods_overlap_any,
        non_mods_overlap_any,
        overlap_ratio: (mods_overlap_any > 0)
            .then(|| non_mods_overlap_any as f64 / mods_overlap_any as f64),
        mods_wrap_any,
        non_mods_wrap_any,
        wrap_ratio: (non_mods_wrap_any > 0)
            .then(|| mods_wrap_any as f64 / non_mods_wrap_any as f64),
    }
}

fn fraction(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}

fn variations(overlap: &OverlapStats, is_mod: bool) -> Variations {
    let touches = |pair: &ModPair| pair.0 == is_mod || pair.1 == is_mod;
    let zero = overlap.zero_overlaps.get(&is_mod);
    let any_overlap = overlap.overlaps.sum_where(touches);
    let any_wrap = overlap.wraps.sum_where(touches);
    let total = zero + any_overlap + any_wrap;

    Variations {
        total,
        no_overlap: fraction(zero, total),
        any_overlap: fraction(any_overlap, total),
        overlaps_non_mod: fraction(overlap.overlaps(is_mod, false), total),
        overlaps_mod: fraction(overlap.overlaps(is_mod, true), total),
        overlapped_by_opposite: fraction(overlap.overlapped_by(is_mod, !is_mod), total),
        any_wrap: fraction(any_wrap, total),
        wraps_non_mod: fraction(overlap.wraps(is_mod, false), total),
        wraps_mod: fraction(overlap.wraps(is_mod, true), total),
        wrapped_by_opposite: fraction(overlap.wrapped_by(is_mod, !is_mod), total),
    }
}
