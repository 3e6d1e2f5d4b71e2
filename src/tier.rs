// Tertile classification: NTILE(3) semantics over one metric.
use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tier {
    Low,
    Mid,
    High,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Low => "Low",
            Tier::Mid => "Mid",
            Tier::High => "High",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Assign each value a tier by ascending sort position: the lowest third
/// becomes `Low`, the middle third `Mid`, the highest third `High`. The
/// returned vector is aligned with the input order.
///
/// Bucket sizes follow the standard order-preserving equal-partition rule:
/// when `n` is not divisible by 3, earlier buckets receive the extra rows
/// (7 rows -> 3/2/2). Equal values do not merge into one bucket; the sort
/// is stable, so ties resolve by input position and results are
/// reproducible. Fewer than 3 values still follow the same positional rule
/// (2 rows -> one Low, one Mid, no High).
pub fn ntile3(values: &[f64]) -> Vec<Tier> {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap_or(Ordering::Equal));

    let base = n / 3;
    let extra = n % 3;
    let mut out = vec![Tier::Low; n];
    let mut pos = 0usize;
    for (bucket, tier) in [Tier::Low, Tier::Mid, Tier::High].into_iter().enumerate() {
        let size = base + usize::from(bucket < extra);
        for _ in 0..size {
            out[order[pos]] = tier;
            pos += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buckets_are_near_equal_and_ordered() {
        let values = [50.0, 10.0, 40.0, 20.0, 60.0, 30.0, 70.0];
        let tiers = ntile3(&values);
        // 7 rows -> sizes 3 / 2 / 2.
        assert_eq!(tiers.iter().filter(|t| **t == Tier::Low).count(), 3);
        assert_eq!(tiers.iter().filter(|t| **t == Tier::Mid).count(), 2);
        assert_eq!(tiers.iter().filter(|t| **t == Tier::High).count(), 2);
        // Every Low value <= every Mid value <= every High value.
        let max_of = |tier: Tier| {
            values
                .iter()
                .zip(&tiers)
                .filter(|(_, t)| **t == tier)
                .map(|(v, _)| *v)
                .fold(f64::MIN, f64::max)
        };
        let min_of = |tier: Tier| {
            values
                .iter()
                .zip(&tiers)
                .filter(|(_, t)| **t == tier)
                .map(|(v, _)| *v)
                .fold(f64::MAX, f64::min)
        };
        assert!(max_of(Tier::Low) <= min_of(Tier::Mid));
        assert!(max_of(Tier::Mid) <= min_of(Tier::High));
    }

    #[test]
    fn ties_stay_in_separate_buckets_by_input_order() {
        let values = [5.0, 5.0, 5.0];
        assert_eq!(ntile3(&values), vec![Tier::Low, Tier::Mid, Tier::High]);
    }

    #[test]
    fn degenerate_scopes_keep_the_positional_rule() {
        assert_eq!(ntile3(&[]), Vec::<Tier>::new());
        assert_eq!(ntile3(&[1.0]), vec![Tier::Low]);
        assert_eq!(ntile3(&[2.0, 1.0]), vec![Tier::Mid, Tier::Low]);
    }
}
