//! Automatic WoE binning engine
//!
//! Implements the per-variable binning pipeline: special-value partitioning,
//! quantile fine classing, chi-square-driven coarse merging, and optional
//! monotonicity enforcement. Variables are fitted independently in parallel
//! and joined into a mapping from variable name to [`BinningTable`].

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use polars::prelude::*;
use rayon::prelude::*;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use super::monotonic::enforce_numeric_monotonicity;
use super::special::{
    partition_categorical, partition_numeric, CategoricalPartition, ClassCounts, NumericPartition,
};
use super::table::{Bin, BinBoundary, BinningTable, SpecialValue, VariableKind};
use super::target::{binary_target_mask, TargetMapping};

/// Number of initial quantile pre-bins before merging
pub const DEFAULT_PREBINS: usize = 50;

/// Smoothing constant to avoid log(0) in WoE calculation (Laplace smoothing)
pub const SMOOTHING: f64 = 0.5;

/// Chi-square threshold below which adjacent bins are considered
/// statistically indistinguishable (95th percentile, 1 degree of freedom)
pub const DEFAULT_MERGE_THRESHOLD: f64 = 3.841;

/// Hard limit on distinct categories per variable before binning refuses to
/// proceed without explicit configuration
pub const DEFAULT_MAX_CATEGORIES: usize = 50;

/// Explicit break specification for a variable, bypassing the automatic
/// fine/coarse/monotonic stages. Always structured data, never an expression.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum BreakSpec {
    /// Interior cut points for a numeric variable; bins become
    /// `[-inf,c1), [c1,c2), ..., [ck,+inf)`
    Numeric(Vec<f64>),
    /// Category groupings; observed categories absent from every group are
    /// collected into one extra bin
    Categorical(Vec<Vec<String>>),
}

/// Configuration for a binning run
#[derive(Debug, Clone)]
pub struct BinningConfig {
    /// Never merge below this many regular bins
    pub min_bins: usize,
    /// Merge down to at most this many regular bins
    pub max_bins: usize,
    /// Number of initial quantile pre-bins for numeric variables
    pub prebins: usize,
    /// Minimum bin size as a fraction of total valid observations
    pub min_bin_frac: f64,
    /// Chi-square significance threshold driving coarse merging
    pub merge_threshold: f64,
    /// Enforce monotonic WoE across ordered bins for numeric variables
    pub monotonic: bool,
    /// Variables exempt from monotonicity enforcement
    pub monotonic_skip: Vec<String>,
    /// Per-variable special-value groups; each group becomes one bin
    pub special_values: BTreeMap<String, Vec<Vec<SpecialValue>>>,
    /// Per-variable explicit breaks, bypassing the automatic stages
    pub breaks: BTreeMap<String, BreakSpec>,
    /// Refuse categorical variables with at least this many distinct values
    pub max_categories: usize,
    /// Abort the whole fit on the first per-variable failure instead of
    /// emitting a degenerate catch-all table
    pub strict: bool,
    /// Restrict fitting to these variables (all eligible columns if `None`)
    pub variables: Option<Vec<String>>,
}

impl Default for BinningConfig {
    fn default() -> Self {
        Self {
            min_bins: 2,
            max_bins: 8,
            prebins: DEFAULT_PREBINS,
            min_bin_frac: 0.05,
            merge_threshold: DEFAULT_MERGE_THRESHOLD,
            monotonic: true,
            monotonic_skip: Vec::new(),
            special_values: BTreeMap::new(),
            breaks: BTreeMap::new(),
            max_categories: DEFAULT_MAX_CATEGORIES,
            strict: false,
            variables: None,
        }
    }
}

impl BinningConfig {
    /// Validate configuration bounds; called before any per-variable work
    pub fn validate(&self) -> Result<()> {
        if self.min_bins == 0 {
            anyhow::bail!("min_bins must be at least 1");
        }
        if self.min_bins > self.max_bins {
            anyhow::bail!(
                "min_bins ({}) must not exceed max_bins ({})",
                self.min_bins,
                self.max_bins
            );
        }
        if self.max_bins > self.prebins {
            anyhow::bail!(
                "max_bins ({}) must not exceed prebins ({})",
                self.max_bins,
                self.prebins
            );
        }
        if !(self.min_bin_frac > 0.0 && self.min_bin_frac < 1.0) {
            anyhow::bail!(
                "min_bin_frac must be in (0, 1), got {}",
                self.min_bin_frac
            );
        }
        if self.merge_threshold < 0.0 {
            anyhow::bail!("merge_threshold must be non-negative");
        }
        if self.max_categories < 2 {
            anyhow::bail!("max_categories must be at least 2");
        }
        Ok(())
    }

    fn special_groups(&self, variable: &str) -> &[Vec<SpecialValue>] {
        self.special_values
            .get(variable)
            .map(|g| g.as_slice())
            .unwrap_or(&[])
    }

    fn monotonic_for(&self, variable: &str) -> bool {
        self.monotonic && !self.monotonic_skip.iter().any(|v| v == variable)
    }
}

// ============================================================================
// WoE / chi-square math
// ============================================================================

/// Calculate WoE and IV contribution for a bin.
///
/// Uses the ln(%bad/%good) convention: WoE > 0 indicates higher risk.
/// Laplace smoothing keeps WoE finite for zero-count classes; the same
/// smoothed value is stored in the table and reused at apply time.
pub(crate) fn woe_iv(
    events: usize,
    non_events: usize,
    total_events: usize,
    total_non_events: usize,
) -> (f64, f64) {
    let dist_events = (events as f64 + SMOOTHING) / (total_events as f64 + SMOOTHING);
    let dist_non_events = (non_events as f64 + SMOOTHING) / (total_non_events as f64 + SMOOTHING);

    let woe = (dist_events / dist_non_events).ln();
    let iv = (dist_events - dist_non_events) * woe;

    (woe, iv)
}

/// Chi-square statistic of the 2x2 contingency table formed by two adjacent
/// bins' event/non-event counts. Returns 0 for degenerate margins, which
/// makes empty bins merge freely.
pub(crate) fn chi_square(
    left_events: usize,
    left_non_events: usize,
    right_events: usize,
    right_non_events: usize,
) -> f64 {
    let a = left_events as f64;
    let b = left_non_events as f64;
    let c = right_events as f64;
    let d = right_non_events as f64;
    let n = a + b + c + d;

    let row1 = a + b;
    let row2 = c + d;
    let col1 = a + c;
    let col2 = b + d;
    if row1 == 0.0 || row2 == 0.0 || col1 == 0.0 || col2 == 0.0 {
        return 0.0;
    }

    n * (a * d - b * c).powi(2) / (row1 * row2 * col1 * col2)
}

// ============================================================================
// Working representation during fine/coarse classing
// ============================================================================

/// Mutable bin under construction; frozen into a [`Bin`] at finalization
#[derive(Debug, Clone)]
pub(crate) struct StatBin {
    pub boundary: BinBoundary,
    pub events: usize,
    pub non_events: usize,
}

impl StatBin {
    pub fn count(&self) -> usize {
        self.events + self.non_events
    }

    pub fn event_rate(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.events as f64 / count as f64
        }
    }
}

/// Merge two adjacent working bins; interval bins span, category bins union
pub(crate) fn merge_stat_bins(left: &StatBin, right: &StatBin) -> StatBin {
    let boundary = match (&left.boundary, &right.boundary) {
        (
            BinBoundary::Interval { lower, .. },
            BinBoundary::Interval { upper, .. },
        ) => BinBoundary::Interval {
            lower: *lower,
            upper: *upper,
        },
        (BinBoundary::Categories(a), BinBoundary::Categories(b)) => {
            let mut cats = a.clone();
            cats.extend(b.iter().cloned());
            BinBoundary::Categories(cats)
        }
        _ => unreachable!("adjacent bins always share a boundary kind"),
    };
    StatBin {
        boundary,
        events: left.events + right.events,
        non_events: left.non_events + right.non_events,
    }
}

// ============================================================================
// Fine classing
// ============================================================================

/// Quantile pre-bins over sorted (value, target) pairs. Ties never split
/// across a boundary, so zero-variance quantiles collapse to one breakpoint.
fn quantile_prebins(sorted: &[(f64, i32)], prebins: usize) -> Vec<StatBin> {
    let n = sorted.len();
    let bin_size = n.div_ceil(prebins).max(1);

    let mut bins: Vec<StatBin> = Vec::new();
    let mut start = 0;
    let mut lower = f64::NEG_INFINITY;

    while start < n {
        let mut end = (start + bin_size).min(n);
        while end < n && sorted[end].0 == sorted[end - 1].0 {
            end += 1;
        }

        let upper = if end < n { sorted[end].0 } else { f64::INFINITY };
        let events = sorted[start..end].iter().filter(|(_, t)| *t == 1).count();
        let non_events = end - start - events;

        bins.push(StatBin {
            boundary: BinBoundary::Interval { lower, upper },
            events,
            non_events,
        });

        lower = upper;
        start = end;
    }

    bins
}

/// One fine bin per distinct category, ordered by event rate ascending.
/// Rate ties break on the label so the traversal order is deterministic.
fn categorical_fine_bins(pairs: &[(String, i32)]) -> Vec<StatBin> {
    let mut counts: BTreeMap<&str, ClassCounts> = BTreeMap::new();
    for (cat, target) in pairs {
        counts.entry(cat.as_str()).or_default().add(*target);
    }

    let mut bins: Vec<StatBin> = counts
        .into_iter()
        .map(|(cat, c)| StatBin {
            boundary: BinBoundary::Categories(vec![cat.to_string()]),
            events: c.events,
            non_events: c.non_events,
        })
        .collect();

    bins.sort_by(|a, b| {
        a.event_rate()
            .partial_cmp(&b.event_rate())
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.boundary.label().cmp(&b.boundary.label()))
    });

    bins
}

// ============================================================================
// Coarse merging
// ============================================================================

/// Candidate merge of two currently-adjacent bins, keyed by chi-square merge
/// cost. Smaller cost merges first; ties prefer the smaller combined count
/// so sparse bins are eliminated early.
#[derive(Debug)]
struct MergeCandidate {
    cost: f64,
    combined: usize,
    left: usize,
    right: usize,
    left_version: u64,
    right_version: u64,
}

impl PartialEq for MergeCandidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for MergeCandidate {}

impl PartialOrd for MergeCandidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MergeCandidate {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so the BinaryHeap pops the cheapest candidate first
        other
            .cost
            .partial_cmp(&self.cost)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.combined.cmp(&self.combined))
            .then_with(|| other.left.cmp(&self.left))
    }
}

/// Doubly-linked slots over the ordered bin list; merging marks the right
/// slot dead and bumps the surviving slot's version to invalidate stale
/// heap candidates.
struct MergeArena {
    slots: Vec<Option<StatBin>>,
    prev: Vec<Option<usize>>,
    next: Vec<Option<usize>>,
    versions: Vec<u64>,
    alive: usize,
}

impl MergeArena {
    fn new(bins: Vec<StatBin>) -> Self {
        let n = bins.len();
        let prev = (0..n).map(|i| i.checked_sub(1)).collect();
        let next = (0..n).map(|i| if i + 1 < n { Some(i + 1) } else { None }).collect();
        Self {
            slots: bins.into_iter().map(Some).collect(),
            prev,
            next,
            versions: vec![0; n],
            alive: n,
        }
    }

    fn candidate(&self, left: usize, right: usize) -> MergeCandidate {
        let l = self.slots[left].as_ref().expect("live slot");
        let r = self.slots[right].as_ref().expect("live slot");
        MergeCandidate {
            cost: chi_square(l.events, l.non_events, r.events, r.non_events),
            combined: l.count() + r.count(),
            left,
            right,
            left_version: self.versions[left],
            right_version: self.versions[right],
        }
    }

    fn is_current(&self, cand: &MergeCandidate) -> bool {
        self.slots[cand.left].is_some()
            && self.slots[cand.right].is_some()
            && self.versions[cand.left] == cand.left_version
            && self.versions[cand.right] == cand.right_version
            && self.next[cand.left] == Some(cand.right)
    }

    /// Merge `right` into `left`; returns the surviving slot index
    fn merge(&mut self, left: usize, right: usize) -> usize {
        let l = self.slots[left].take().expect("live slot");
        let r = self.slots[right].take().expect("live slot");
        self.slots[left] = Some(merge_stat_bins(&l, &r));
        self.versions[left] += 1;

        self.next[left] = self.next[right];
        if let Some(nn) = self.next[right] {
            self.prev[nn] = Some(left);
        }
        self.alive -= 1;
        left
    }

    fn into_bins(self) -> Vec<StatBin> {
        let mut head = (0..self.slots.len()).find(|&i| self.slots[i].is_some());
        let mut out = Vec::with_capacity(self.alive);
        let mut slots = self.slots;
        while let Some(i) = head {
            head = self.next[i];
            if let Some(bin) = slots[i].take() {
                out.push(bin);
            }
        }
        out
    }
}

/// Greedy agglomerative merge of ordered fine bins.
///
/// Merges the cheapest adjacent pair (chi-square cost) while the bin count
/// exceeds `max_bins` or the pair is below the significance threshold, then
/// force-merges bins under the minimum size fraction. Never goes below
/// `min_bins`.
pub(crate) fn coarse_merge(
    bins: Vec<StatBin>,
    config: &BinningConfig,
    total_valid: usize,
) -> Vec<StatBin> {
    if bins.len() <= config.min_bins {
        return bins;
    }

    let mut arena = MergeArena::new(bins);
    let mut heap: BinaryHeap<MergeCandidate> = BinaryHeap::new();
    for i in 0..arena.slots.len() - 1 {
        heap.push(arena.candidate(i, i + 1));
    }

    while arena.alive > config.min_bins {
        let cand = match heap.pop() {
            Some(c) => c,
            None => break,
        };
        if !arena.is_current(&cand) {
            continue;
        }
        if arena.alive <= config.max_bins && cand.cost >= config.merge_threshold {
            // Cheapest remaining pair is significant and the cap is met
            break;
        }

        let survivor = arena.merge(cand.left, cand.right);
        // Only the two pairs touching the merged bin need re-costing
        if let Some(p) = arena.prev[survivor] {
            heap.push(arena.candidate(p, survivor));
        }
        if let Some(n) = arena.next[survivor] {
            heap.push(arena.candidate(survivor, n));
        }
    }

    let mut bins = arena.into_bins();

    // Enforce the minimum bin-size fraction, smallest offender first
    let min_count = (config.min_bin_frac * total_valid as f64).ceil() as usize;
    while bins.len() > config.min_bins {
        let offender = bins
            .iter()
            .enumerate()
            .filter(|(_, b)| b.count() < min_count)
            .min_by_key(|(i, b)| (b.count(), *i))
            .map(|(i, _)| i);
        let i = match offender {
            Some(i) => i,
            None => break,
        };
        let merge_left = if i == 0 {
            false
        } else if i == bins.len() - 1 {
            true
        } else {
            let left = &bins[i - 1];
            let right = &bins[i + 1];
            let cur = &bins[i];
            chi_square(left.events, left.non_events, cur.events, cur.non_events)
                <= chi_square(cur.events, cur.non_events, right.events, right.non_events)
        };
        let j = if merge_left { i - 1 } else { i };
        bins[j] = merge_stat_bins(&bins[j], &bins[j + 1]);
        bins.remove(j + 1);
    }

    bins
}

// ============================================================================
// Per-variable fitting
// ============================================================================

struct Totals {
    events: usize,
    non_events: usize,
}

impl Totals {
    fn valid(&self) -> usize {
        self.events + self.non_events
    }
}

fn special_bins_from_counts(
    groups: &[Vec<SpecialValue>],
    special: &[ClassCounts],
    missing: &ClassCounts,
    totals: &Totals,
) -> Vec<Bin> {
    let mut bins: Vec<Bin> = groups
        .iter()
        .zip(special.iter())
        .filter(|(_, counts)| counts.total() > 0)
        .map(|(group, counts)| {
            finalize_bin(
                BinBoundary::Special(group.clone()),
                counts.events,
                counts.non_events,
                totals,
            )
        })
        .collect();

    if missing.total() > 0 {
        bins.push(finalize_bin(
            BinBoundary::Missing,
            missing.events,
            missing.non_events,
            totals,
        ));
    }

    bins
}

fn finalize_bin(boundary: BinBoundary, events: usize, non_events: usize, totals: &Totals) -> Bin {
    let count = events + non_events;
    let (woe, iv) = woe_iv(events, non_events, totals.events, totals.non_events);
    Bin {
        boundary,
        count,
        events,
        event_rate: if count > 0 {
            events as f64 / count as f64
        } else {
            0.0
        },
        woe,
        iv,
    }
}

fn finalize_table(
    variable: &str,
    kind: VariableKind,
    stat_bins: Vec<StatBin>,
    special_bins: Vec<Bin>,
    totals: &Totals,
    degenerate: bool,
) -> BinningTable {
    let bins: Vec<Bin> = stat_bins
        .into_iter()
        .map(|b| finalize_bin(b.boundary, b.events, b.non_events, totals))
        .collect();
    let total_iv = bins
        .iter()
        .chain(special_bins.iter())
        .map(|b| b.iv)
        .sum();

    BinningTable {
        variable: variable.to_string(),
        kind,
        bins,
        special_bins,
        total_iv,
        degenerate,
    }
}

fn numeric_totals(partition: &NumericPartition) -> Totals {
    let mut events = partition.missing.events;
    let mut non_events = partition.missing.non_events;
    for counts in &partition.special {
        events += counts.events;
        non_events += counts.non_events;
    }
    events += partition.regular.iter().filter(|(_, t)| *t == 1).count();
    non_events += partition.regular.iter().filter(|(_, t)| *t == 0).count();
    Totals { events, non_events }
}

fn categorical_totals(partition: &CategoricalPartition) -> Totals {
    let mut events = partition.missing.events;
    let mut non_events = partition.missing.non_events;
    for counts in &partition.special {
        events += counts.events;
        non_events += counts.non_events;
    }
    events += partition.regular.iter().filter(|(_, t)| *t == 1).count();
    non_events += partition.regular.iter().filter(|(_, t)| *t == 0).count();
    Totals { events, non_events }
}

/// Fit bins for one numeric variable
fn fit_numeric_variable(
    variable: &str,
    values: &[Option<f64>],
    targets: &[Option<i32>],
    config: &BinningConfig,
) -> Result<BinningTable> {
    let groups = config.special_groups(variable);
    let partition = partition_numeric(values, targets, groups);
    let totals = numeric_totals(&partition);

    if totals.valid() == 0 {
        anyhow::bail!("Variable '{}' has no valid records", variable);
    }
    if totals.events == 0 || totals.non_events == 0 {
        anyhow::bail!(
            "Variable '{}' has no variation in target (all 0s or all 1s)",
            variable
        );
    }

    let special_bins =
        special_bins_from_counts(groups, &partition.special, &partition.missing, &totals);

    if partition.regular.is_empty() {
        anyhow::bail!("Variable '{}' has only special or missing values", variable);
    }

    let mut pairs = partition.regular;
    pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

    // Explicit breaks bypass fine classing, merging, and monotonicity
    if let Some(BreakSpec::Numeric(cuts)) = config.breaks.get(variable) {
        let bins = bins_from_numeric_breaks(&pairs, cuts);
        return Ok(finalize_table(
            variable,
            VariableKind::Numeric,
            bins,
            special_bins,
            &totals,
            false,
        ));
    }

    let distinct = count_distinct_sorted(&pairs);
    if distinct < 2 {
        // Single distinct regular value: one bin, merging skipped
        let bins = vec![StatBin {
            boundary: BinBoundary::Interval {
                lower: f64::NEG_INFINITY,
                upper: f64::INFINITY,
            },
            events: pairs.iter().filter(|(_, t)| *t == 1).count(),
            non_events: pairs.iter().filter(|(_, t)| *t == 0).count(),
        }];
        return Ok(finalize_table(
            variable,
            VariableKind::Numeric,
            bins,
            special_bins,
            &totals,
            true,
        ));
    }

    let fine = quantile_prebins(&pairs, config.prebins);
    let mut merged = coarse_merge(fine, config, totals.valid());

    if config.monotonic_for(variable) {
        merged = enforce_numeric_monotonicity(merged, config.min_bins);
    }

    Ok(finalize_table(
        variable,
        VariableKind::Numeric,
        merged,
        special_bins,
        &totals,
        false,
    ))
}

fn count_distinct_sorted(pairs: &[(f64, i32)]) -> usize {
    let mut distinct = 0;
    let mut last: Option<f64> = None;
    for (v, _) in pairs {
        if last != Some(*v) {
            distinct += 1;
            last = Some(*v);
        }
    }
    distinct
}

fn bins_from_numeric_breaks(sorted: &[(f64, i32)], cuts: &[f64]) -> Vec<StatBin> {
    let mut cuts: Vec<f64> = cuts.iter().copied().filter(|c| c.is_finite()).collect();
    cuts.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    cuts.dedup();

    let mut edges = Vec::with_capacity(cuts.len() + 2);
    edges.push(f64::NEG_INFINITY);
    edges.extend(cuts);
    edges.push(f64::INFINITY);

    let mut bins: Vec<StatBin> = edges
        .windows(2)
        .map(|w| StatBin {
            boundary: BinBoundary::Interval {
                lower: w[0],
                upper: w[1],
            },
            events: 0,
            non_events: 0,
        })
        .collect();

    for (value, target) in sorted {
        let idx = bins
            .iter()
            .position(|b| match b.boundary {
                BinBoundary::Interval { lower, upper } => *value >= lower && *value < upper,
                _ => false,
            })
            .unwrap_or(bins.len() - 1);
        if *target == 1 {
            bins[idx].events += 1;
        } else {
            bins[idx].non_events += 1;
        }
    }

    bins
}

/// Fit bins for one categorical variable
fn fit_categorical_variable(
    variable: &str,
    values: &[Option<String>],
    targets: &[Option<i32>],
    config: &BinningConfig,
) -> Result<BinningTable> {
    let groups = config.special_groups(variable);
    let partition = partition_categorical(values, targets, groups);
    let totals = categorical_totals(&partition);

    if totals.valid() == 0 {
        anyhow::bail!("Variable '{}' has no valid records", variable);
    }
    if totals.events == 0 || totals.non_events == 0 {
        anyhow::bail!(
            "Variable '{}' has no variation in target (all 0s or all 1s)",
            variable
        );
    }

    let special_bins =
        special_bins_from_counts(groups, &partition.special, &partition.missing, &totals);

    if partition.regular.is_empty() {
        anyhow::bail!("Variable '{}' has only special or missing values", variable);
    }

    if let Some(BreakSpec::Categorical(break_groups)) = config.breaks.get(variable) {
        let bins = bins_from_categorical_breaks(&partition.regular, break_groups);
        return Ok(finalize_table(
            variable,
            VariableKind::Categorical,
            bins,
            special_bins,
            &totals,
            false,
        ));
    }

    let fine = categorical_fine_bins(&partition.regular);
    if fine.len() >= config.max_categories {
        anyhow::bail!(
            "Variable '{}' has {} distinct categories (limit {}); raise max_categories \
             or supply explicit breaks",
            variable,
            fine.len(),
            config.max_categories
        );
    }

    if fine.len() < 2 {
        return Ok(finalize_table(
            variable,
            VariableKind::Categorical,
            fine,
            special_bins,
            &totals,
            true,
        ));
    }

    // Fine bins are event-rate ordered, so chi-square merging of
    // indistinguishable neighbors leaves a monotone WoE sequence
    let merged = coarse_merge(fine, config, totals.valid());

    Ok(finalize_table(
        variable,
        VariableKind::Categorical,
        merged,
        special_bins,
        &totals,
        false,
    ))
}

fn bins_from_categorical_breaks(
    pairs: &[(String, i32)],
    break_groups: &[Vec<String>],
) -> Vec<StatBin> {
    let mut bins: Vec<StatBin> = break_groups
        .iter()
        .map(|group| StatBin {
            boundary: BinBoundary::Categories(group.clone()),
            events: 0,
            non_events: 0,
        })
        .collect();

    // Categories outside every configured group keep the partition invariant
    // by landing in one extra bin
    let mut leftover: BTreeMap<String, ClassCounts> = BTreeMap::new();

    for (cat, target) in pairs {
        let idx = break_groups.iter().position(|g| g.iter().any(|c| c == cat));
        match idx {
            Some(i) => {
                if *target == 1 {
                    bins[i].events += 1;
                } else {
                    bins[i].non_events += 1;
                }
            }
            None => leftover.entry(cat.clone()).or_default().add(*target),
        }
    }

    if !leftover.is_empty() {
        let mut events = 0;
        let mut non_events = 0;
        let mut cats = Vec::new();
        for (cat, counts) in leftover {
            events += counts.events;
            non_events += counts.non_events;
            cats.push(cat);
        }
        bins.push(StatBin {
            boundary: BinBoundary::Categories(cats),
            events,
            non_events,
        });
    }

    bins.retain(|b| b.count() > 0);
    bins
}

/// Fall-back table for a variable that could not be statistically binned:
/// a single catch-all bin over every regular value, specials kept verbatim
fn catch_all_table(
    variable: &str,
    kind: VariableKind,
    df: &DataFrame,
    targets: &[Option<i32>],
    config: &BinningConfig,
) -> Result<BinningTable> {
    let groups = config.special_groups(variable);
    match kind {
        VariableKind::Numeric => {
            let values = numeric_values(df, variable)?;
            let partition = partition_numeric(&values, targets, groups);
            let totals = numeric_totals(&partition);
            let special_bins =
                special_bins_from_counts(groups, &partition.special, &partition.missing, &totals);
            let events = partition.regular.iter().filter(|(_, t)| *t == 1).count();
            let non_events = partition.regular.len() - events;
            let bins = vec![StatBin {
                boundary: BinBoundary::Interval {
                    lower: f64::NEG_INFINITY,
                    upper: f64::INFINITY,
                },
                events,
                non_events,
            }];
            Ok(finalize_table(variable, kind, bins, special_bins, &totals, true))
        }
        VariableKind::Categorical => {
            let values = string_values(df, variable)?;
            let partition = partition_categorical(&values, targets, groups);
            let totals = categorical_totals(&partition);
            let special_bins =
                special_bins_from_counts(groups, &partition.special, &partition.missing, &totals);
            let mut cats: Vec<String> = partition
                .regular
                .iter()
                .map(|(c, _)| c.clone())
                .collect();
            cats.sort();
            cats.dedup();
            let events = partition.regular.iter().filter(|(_, t)| *t == 1).count();
            let non_events = partition.regular.len() - events;
            let bins = vec![StatBin {
                boundary: BinBoundary::Categories(cats),
                events,
                non_events,
            }];
            Ok(finalize_table(variable, kind, bins, special_bins, &totals, true))
        }
    }
}

// ============================================================================
// Fitting entry point
// ============================================================================

/// Columns eligible for binning: numeric and string columns except the target
fn candidate_variables(
    df: &DataFrame,
    target: &str,
    config: &BinningConfig,
) -> Result<Vec<(String, VariableKind)>> {
    let mut candidates: Vec<(String, VariableKind)> = Vec::new();
    for col in df.get_columns() {
        let name = col.name().as_str();
        if name == target {
            continue;
        }
        if col.dtype().is_primitive_numeric() {
            candidates.push((name.to_string(), VariableKind::Numeric));
        } else if matches!(col.dtype(), DataType::String | DataType::Categorical(_, _)) {
            candidates.push((name.to_string(), VariableKind::Categorical));
        }
    }

    if let Some(requested) = &config.variables {
        for name in requested {
            if !candidates.iter().any(|(c, _)| c == name) {
                anyhow::bail!(
                    "Requested variable '{}' is not a bindable column in the dataset",
                    name
                );
            }
        }
        candidates.retain(|(c, _)| requested.iter().any(|r| r == c));
    }

    if candidates.is_empty() {
        anyhow::bail!("No bindable variables found (numeric or string columns besides the target)");
    }

    Ok(candidates)
}

fn numeric_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let col = df
        .column(name)
        .with_context(|| format!("Column '{}' not found", name))?;
    Ok(col.cast(&DataType::Float64)?.f64()?.into_iter().collect())
}

fn string_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let col = df
        .column(name)
        .with_context(|| format!("Column '{}' not found", name))?;
    Ok(col
        .cast(&DataType::String)?
        .str()?
        .into_iter()
        .map(|v| v.map(|s| s.to_string()))
        .collect())
}

/// Fit binning tables for every eligible variable in the dataset.
///
/// Variables are processed independently in parallel and joined into an
/// immutable mapping. In non-strict mode a variable that cannot be
/// statistically binned yields a single catch-all table flagged
/// `degenerate`; strict mode aborts the whole fit instead.
pub fn fit_bins(
    df: &DataFrame,
    target: &str,
    mapping: Option<&TargetMapping>,
    config: &BinningConfig,
) -> Result<BTreeMap<String, BinningTable>> {
    config.validate()?;

    let targets = binary_target_mask(df, target, mapping)?;
    let candidates = candidate_variables(df, target, config)?;

    let pb = ProgressBar::new(candidates.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("   Binning [{bar:40.cyan/blue}] {pos}/{len} variables ({percent}%) [{eta}]")
            .unwrap()
            .progress_chars("=>-"),
    );
    let progress = Arc::new(AtomicU64::new(0));

    let results: Vec<Result<(String, BinningTable)>> = candidates
        .par_iter()
        .map(|(name, kind)| {
            let fitted = match kind {
                VariableKind::Numeric => {
                    let values = numeric_values(df, name)?;
                    fit_numeric_variable(name, &values, &targets, config)
                }
                VariableKind::Categorical => {
                    let values = string_values(df, name)?;
                    fit_categorical_variable(name, &values, &targets, config)
                }
            };

            let done = progress.fetch_add(1, AtomicOrdering::Relaxed);
            pb.set_position(done + 1);

            let table = match fitted {
                Ok(table) => table,
                Err(err) if !config.strict => {
                    // Isolated per-variable failure: emit a catch-all table
                    catch_all_table(name, *kind, df, &targets, config)
                        .with_context(|| format!("{:#}", err))?
                }
                Err(err) => {
                    return Err(err.context(format!("Failed to bin variable '{}'", name)))
                }
            };
            Ok((name.clone(), table))
        })
        .collect();

    pb.finish_and_clear();

    let mut tables = BTreeMap::new();
    for result in results {
        let (name, table) = result?;
        tables.insert(name, table);
    }

    Ok(tables)
}
