// Partition-local rank-1 selection (ROW_NUMBER ... WHERE rank = 1).
use crate::aggregate::AggregateKey;
use crate::error::ReportError;
use serde::Deserialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Policy for exactly equal top scores within a partition.
///
/// The source queries leave this to incidental row order; here it is an
/// explicit contract. `Lexicographic` resolves the tie by the candidate's
/// label ascending; `Fail` reports `AmbiguousTie` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TieBreak {
    Lexicographic,
    Fail,
}

/// One contender within a partition: the label is the thing being chosen
/// (a crop, a season, a tier), the score is the mean yield it achieved,
/// and the payload carries whatever extra columns its report needs.
#[derive(Debug)]
pub struct Candidate<T> {
    pub partition: AggregateKey,
    pub label: String,
    pub score: f64,
    pub value: T,
}

/// Order each partition's candidates by score descending and keep only the
/// rank-1 row. Winners come back sorted by partition key.
///
/// Candidates with an absent score never reach this function; callers drop
/// groups whose sort metric has no contributing observations before
/// building candidates.
pub fn select_best<T>(
    candidates: Vec<Candidate<T>>,
    tie_break: TieBreak,
) -> Result<Vec<Candidate<T>>, ReportError> {
    let mut partitions: BTreeMap<AggregateKey, Vec<Candidate<T>>> = BTreeMap::new();
    for cand in candidates {
        partitions
            .entry(cand.partition.clone())
            .or_default()
            .push(cand);
    }

    let mut winners = Vec::with_capacity(partitions.len());
    for (key, mut cands) in partitions {
        cands.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.label.cmp(&b.label))
        });
        if tie_break == TieBreak::Fail && cands.len() > 1 && cands[0].score == cands[1].score {
            return Err(ReportError::AmbiguousTie {
                partition: key.to_string(),
                contenders: format!("{} / {}", cands[0].label, cands[1].label),
            });
        }
        if let Some(best) = cands.into_iter().next() {
            winners.push(best);
        }
    }
    Ok(winners)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cand(state: &str, label: &str, score: f64) -> Candidate<()> {
        Candidate {
            partition: AggregateKey::state(state),
            label: label.to_string(),
            score,
            value: (),
        }
    }

    #[test]
    fn one_winner_per_partition_with_max_score() {
        let cands = vec![
            cand("TX", "corn", 100.0),
            cand("TX", "wheat", 80.0),
            cand("IA", "soy", 60.0),
            cand("IA", "corn", 90.0),
        ];
        let winners = select_best(cands, TieBreak::Lexicographic).unwrap();
        assert_eq!(winners.len(), 2);
        // Sorted by partition key: IA before TX.
        assert_eq!(winners[0].label, "corn");
        assert_eq!(winners[0].score, 90.0);
        assert_eq!(winners[1].label, "corn");
        assert_eq!(winners[1].score, 100.0);
    }

    #[test]
    fn exact_tie_resolves_lexicographically() {
        let cands = vec![cand("TX", "wheat", 50.0), cand("TX", "barley", 50.0)];
        let winners = select_best(cands, TieBreak::Lexicographic).unwrap();
        assert_eq!(winners[0].label, "barley");
    }

    #[test]
    fn exact_tie_fails_under_strict_policy() {
        let cands = vec![cand("TX", "wheat", 50.0), cand("TX", "barley", 50.0)];
        let err = select_best(cands, TieBreak::Fail).unwrap_err();
        assert!(matches!(err, ReportError::AmbiguousTie { .. }));
    }

    #[test]
    fn near_ties_are_not_ambiguous() {
        let cands = vec![cand("TX", "wheat", 50.0), cand("TX", "barley", 50.1)];
        let winners = select_best(cands, TieBreak::Fail).unwrap();
        assert_eq!(winners[0].label, "barley");
    }
}
