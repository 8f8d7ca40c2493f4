//! Monotonicity enforcement for numeric bins
//!
//! Post-processes coarse-merged bins so the event rate (and therefore WoE,
//! which is monotone in the event rate) moves in one direction across the
//! ordered bins. The direction is the majority trend across adjacent pairs;
//! offending bins are merged into a neighbor and the scan repeats to a
//! fixed point.

use super::binning::{chi_square, merge_stat_bins, StatBin};

/// Trend direction established by the majority of adjacent pairs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trend {
    Increasing,
    Decreasing,
}

fn majority_trend(bins: &[StatBin]) -> Trend {
    let mut ups = 0usize;
    let mut downs = 0usize;
    for w in bins.windows(2) {
        let delta = w[1].event_rate() - w[0].event_rate();
        if delta > 0.0 {
            ups += 1;
        } else if delta < 0.0 {
            downs += 1;
        }
    }
    if ups >= downs {
        Trend::Increasing
    } else {
        Trend::Decreasing
    }
}

fn violates(trend: Trend, left: &StatBin, right: &StatBin) -> bool {
    let delta = right.event_rate() - left.event_rate();
    match trend {
        Trend::Increasing => delta < 0.0,
        Trend::Decreasing => delta > 0.0,
    }
}

/// Merge bins until the event-rate sequence is monotone in the majority
/// direction. Never reduces below `min_bins` unless a violation forces it;
/// two bins are always monotone, so the floor only matters for the scan.
pub(crate) fn enforce_numeric_monotonicity(
    mut bins: Vec<StatBin>,
    min_bins: usize,
) -> Vec<StatBin> {
    if bins.len() < 3 {
        return bins;
    }

    let trend = majority_trend(&bins);

    loop {
        let violation = bins
            .windows(2)
            .position(|w| violates(trend, &w[0], &w[1]));
        let i = match violation {
            Some(i) => i,
            None => break,
        };

        // Merge the offending pair into whichever neighbor costs less
        // separation; at the edges there is only one choice
        let j = if i == 0 {
            0
        } else if i + 2 >= bins.len() {
            i
        } else {
            let left_cost = chi_square(
                bins[i - 1].events,
                bins[i - 1].non_events,
                bins[i].events,
                bins[i].non_events,
            );
            let right_cost = chi_square(
                bins[i].events,
                bins[i].non_events,
                bins[i + 1].events,
                bins[i + 1].non_events,
            );
            if left_cost <= right_cost {
                i - 1
            } else {
                i
            }
        };

        bins[j] = merge_stat_bins(&bins[j], &bins[j + 1]);
        bins.remove(j + 1);

        if bins.len() <= min_bins.max(2) && bins.len() < 3 {
            break;
        }
    }

    bins
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::table::BinBoundary;

    fn bin(lower: f64, upper: f64, events: usize, non_events: usize) -> StatBin {
        StatBin {
            boundary: BinBoundary::Interval { lower, upper },
            events,
            non_events,
        }
    }

    fn rates(bins: &[StatBin]) -> Vec<f64> {
        bins.iter().map(|b| b.event_rate()).collect()
    }

    fn is_monotone(rates: &[f64]) -> bool {
        let inc = rates.windows(2).all(|w| w[1] >= w[0]);
        let dec = rates.windows(2).all(|w| w[1] <= w[0]);
        inc || dec
    }

    #[test]
    fn test_already_monotone_untouched() {
        let bins = vec![
            bin(f64::NEG_INFINITY, 10.0, 5, 95),
            bin(10.0, 20.0, 20, 80),
            bin(20.0, f64::INFINITY, 50, 50),
        ];
        let out = enforce_numeric_monotonicity(bins, 2);
        assert_eq!(out.len(), 3);
        assert!(is_monotone(&rates(&out)));
    }

    #[test]
    fn test_single_dip_merged_away() {
        // Increasing trend with a dip in the middle
        let bins = vec![
            bin(f64::NEG_INFINITY, 10.0, 5, 95),
            bin(10.0, 20.0, 20, 80),
            bin(20.0, 30.0, 10, 90),
            bin(30.0, f64::INFINITY, 60, 40),
        ];
        let out = enforce_numeric_monotonicity(bins, 2);
        assert!(out.len() < 4, "Dip must be merged away");
        assert!(is_monotone(&rates(&out)), "Rates must be monotone: {:?}", rates(&out));
    }

    #[test]
    fn test_decreasing_trend_detected() {
        let bins = vec![
            bin(f64::NEG_INFINITY, 10.0, 70, 30),
            bin(10.0, 20.0, 50, 50),
            bin(20.0, 30.0, 60, 40),
            bin(30.0, f64::INFINITY, 10, 90),
        ];
        let out = enforce_numeric_monotonicity(bins, 2);
        let r = rates(&out);
        assert!(is_monotone(&r), "Rates must be monotone: {:?}", r);
        assert!(r.first().unwrap() >= r.last().unwrap(), "Trend must stay decreasing");
    }

    #[test]
    fn test_boundaries_stay_contiguous_after_merges() {
        let bins = vec![
            bin(f64::NEG_INFINITY, 10.0, 5, 95),
            bin(10.0, 20.0, 30, 70),
            bin(20.0, 30.0, 10, 90),
            bin(30.0, 40.0, 40, 60),
            bin(40.0, f64::INFINITY, 80, 20),
        ];
        let out = enforce_numeric_monotonicity(bins, 2);
        for w in out.windows(2) {
            let (upper, lower) = match (&w[0].boundary, &w[1].boundary) {
                (
                    BinBoundary::Interval { upper, .. },
                    BinBoundary::Interval { lower, .. },
                ) => (*upper, *lower),
                _ => panic!("numeric bins expected"),
            };
            assert_eq!(upper, lower, "Merged intervals must stay contiguous");
        }
    }

    #[test]
    fn test_two_bins_passthrough() {
        let bins = vec![
            bin(f64::NEG_INFINITY, 10.0, 5, 95),
            bin(10.0, f64::INFINITY, 50, 50),
        ];
        let out = enforce_numeric_monotonicity(bins, 2);
        assert_eq!(out.len(), 2);
    }
}
