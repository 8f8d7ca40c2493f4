//! Special-value partitioning
//!
//! Splits a variable's observations into regular values eligible for
//! statistical binning and special values (plus missing) held out as
//! dedicated bins. Pure functions of input and configuration.

use crate::pipeline::table::SpecialValue;

/// Event / non-event counts for one special group or the missing bucket
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassCounts {
    pub events: usize,
    pub non_events: usize,
}

impl ClassCounts {
    pub fn total(&self) -> usize {
        self.events + self.non_events
    }

    pub fn add(&mut self, target: i32) {
        if target == 1 {
            self.events += 1;
        } else {
            self.non_events += 1;
        }
    }
}

/// Result of partitioning a numeric column
#[derive(Debug, Clone)]
pub struct NumericPartition {
    /// (value, target) pairs eligible for binning
    pub regular: Vec<(f64, i32)>,
    /// One entry per configured special group, aligned with `groups`
    pub special: Vec<ClassCounts>,
    /// Null feature values with a valid target
    pub missing: ClassCounts,
}

/// Result of partitioning a categorical column
#[derive(Debug, Clone)]
pub struct CategoricalPartition {
    /// (category, target) pairs eligible for binning
    pub regular: Vec<(String, i32)>,
    /// One entry per configured special group, aligned with `groups`
    pub special: Vec<ClassCounts>,
    /// Null feature values with a valid target
    pub missing: ClassCounts,
}

/// Partition a numeric column into regular and special observations.
///
/// Records with an invalid target (`None`) are dropped entirely; missing
/// feature values with a valid target go to the missing bucket.
pub fn partition_numeric(
    values: &[Option<f64>],
    targets: &[Option<i32>],
    groups: &[Vec<SpecialValue>],
) -> NumericPartition {
    let mut partition = NumericPartition {
        regular: Vec::new(),
        special: vec![ClassCounts::default(); groups.len()],
        missing: ClassCounts::default(),
    };

    for (value, target) in values.iter().zip(targets.iter()) {
        let target = match target {
            Some(t) => *t,
            None => continue,
        };
        match value {
            None => partition.missing.add(target),
            Some(v) => match numeric_group_index(*v, groups) {
                Some(g) => partition.special[g].add(target),
                None => partition.regular.push((*v, target)),
            },
        }
    }

    partition
}

/// Partition a categorical column into regular and special observations.
pub fn partition_categorical(
    values: &[Option<String>],
    targets: &[Option<i32>],
    groups: &[Vec<SpecialValue>],
) -> CategoricalPartition {
    let mut partition = CategoricalPartition {
        regular: Vec::new(),
        special: vec![ClassCounts::default(); groups.len()],
        missing: ClassCounts::default(),
    };

    for (value, target) in values.iter().zip(targets.iter()) {
        let target = match target {
            Some(t) => *t,
            None => continue,
        };
        match value {
            None => partition.missing.add(target),
            Some(v) => match categorical_group_index(v, groups) {
                Some(g) => partition.special[g].add(target),
                None => partition.regular.push((v.clone(), target)),
            },
        }
    }

    partition
}

/// Index of the special group containing a numeric value, if any.
/// Numeric columns match only `Number` members; sentinel values like -999
/// are exact, so bitwise equality is the right comparison.
pub fn numeric_group_index(value: f64, groups: &[Vec<SpecialValue>]) -> Option<usize> {
    groups.iter().position(|group| {
        group
            .iter()
            .any(|m| matches!(m, SpecialValue::Number(n) if *n == value))
    })
}

/// Index of the special group containing a category label, if any.
/// Categorical columns match the string form of both `Text` and `Number`
/// members, since CSV-sourced labels may carry numeric sentinels.
pub fn categorical_group_index(value: &str, groups: &[Vec<SpecialValue>]) -> Option<usize> {
    groups.iter().position(|group| {
        group.iter().any(|m| match m {
            SpecialValue::Text(s) => s == value,
            SpecialValue::Number(n) => n.to_string() == value,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn groups() -> Vec<Vec<SpecialValue>> {
        vec![
            vec![SpecialValue::Number(-999.0)],
            vec![SpecialValue::Number(-888.0), SpecialValue::Number(-887.0)],
        ]
    }

    #[test]
    fn test_partition_numeric_routes_specials() {
        let values = vec![
            Some(1.0),
            Some(-999.0),
            Some(2.0),
            Some(-888.0),
            Some(-887.0),
            None,
        ];
        let targets = vec![Some(0), Some(1), Some(1), Some(0), Some(1), Some(1)];

        let p = partition_numeric(&values, &targets, &groups());

        assert_eq!(p.regular, vec![(1.0, 0), (2.0, 1)]);
        assert_eq!(p.special[0], ClassCounts { events: 1, non_events: 0 });
        assert_eq!(p.special[1], ClassCounts { events: 1, non_events: 1 });
        assert_eq!(p.missing, ClassCounts { events: 1, non_events: 0 });
    }

    #[test]
    fn test_partition_drops_invalid_targets() {
        let values = vec![Some(1.0), Some(2.0), None];
        let targets = vec![Some(0), None, None];

        let p = partition_numeric(&values, &targets, &[]);

        assert_eq!(p.regular, vec![(1.0, 0)]);
        assert_eq!(p.missing.total(), 0, "Missing value with invalid target is dropped");
    }

    #[test]
    fn test_partition_categorical_matches_numeric_sentinels() {
        let values = vec![
            Some("A".to_string()),
            Some("-999".to_string()),
            Some("B".to_string()),
            None,
        ];
        let targets = vec![Some(1), Some(0), Some(0), Some(1)];

        let p = partition_categorical(&values, &targets, &[vec![SpecialValue::Number(-999.0)]]);

        assert_eq!(p.regular.len(), 2);
        assert_eq!(p.special[0].total(), 1);
        assert_eq!(p.missing.events, 1);
    }

    #[test]
    fn test_no_groups_everything_regular() {
        let values = vec![Some(5.0), Some(6.0)];
        let targets = vec![Some(1), Some(0)];

        let p = partition_numeric(&values, &targets, &[]);
        assert_eq!(p.regular.len(), 2);
        assert!(p.special.is_empty());
    }
}
