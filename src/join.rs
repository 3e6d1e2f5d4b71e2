// Multi-way left-outer join over aggregate rows sharing one key shape.
use crate::aggregate::{AggregateKey, AggregateRow};
use crate::error::ReportError;
use std::collections::HashMap;

/// One output row: the primary source's row plus, per secondary source,
/// the matching row or `None`. An unmatched secondary never drops the row;
/// its columns render as absent downstream.
#[derive(Debug)]
pub struct JoinedRow<'a> {
    pub primary: &'a AggregateRow,
    pub secondaries: Vec<Option<&'a AggregateRow>>,
}

/// Left-join `primary` against each secondary source on key equality.
///
/// Each secondary is indexed by key up front and probed once per primary
/// row, so the output row count always equals the primary's row count.
/// Two differently-cased spellings collapsing into one canonical key is
/// expected; a duplicate key within one secondary whose row content
/// actually differs is a data inconsistency and is reported.
pub fn left_join<'a>(
    primary: &'a [AggregateRow],
    secondaries: &[&'a [AggregateRow]],
) -> Result<Vec<JoinedRow<'a>>, ReportError> {
    let mut indexes: Vec<HashMap<&AggregateKey, &AggregateRow>> =
        Vec::with_capacity(secondaries.len());
    for rows in secondaries {
        let mut index: HashMap<&AggregateKey, &AggregateRow> = HashMap::with_capacity(rows.len());
        for row in rows.iter() {
            if let Some(existing) = index.insert(&row.key, row) {
                if existing != row {
                    return Err(ReportError::InconsistentKey {
                        key: row.key.to_string(),
                    });
                }
            }
        }
        indexes.push(index);
    }

    Ok(primary
        .iter()
        .map(|p| JoinedRow {
            primary: p,
            secondaries: indexes.iter().map(|ix| ix.get(&p.key).copied()).collect(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn row(state: &str, metric: &str, value: f64) -> AggregateRow {
        let mut metrics = BTreeMap::new();
        metrics.insert(metric.to_string(), value);
        AggregateRow {
            key: AggregateKey::state(state),
            metrics,
            tags: BTreeMap::new(),
        }
    }

    #[test]
    fn output_count_equals_primary_count() {
        let primary = vec![row("IA", "avg_co", 1.0), row("TX", "avg_co", 2.0)];
        let temps = vec![row("TX", "avg_temp", 20.0)];
        let joined = left_join(&primary, &[&temps]).unwrap();
        assert_eq!(joined.len(), 2);
        assert!(joined[0].secondaries[0].is_none());
        assert_eq!(
            joined[1].secondaries[0].and_then(|r| r.metric("avg_temp")),
            Some(20.0)
        );
    }

    #[test]
    fn probes_multiple_secondaries_independently() {
        let primary = vec![row("TX", "avg_co", 1.0)];
        let temps = vec![row("TX", "avg_temp", 20.0)];
        let precip: Vec<AggregateRow> = vec![];
        let joined = left_join(&primary, &[&temps, &precip]).unwrap();
        assert!(joined[0].secondaries[0].is_some());
        assert!(joined[0].secondaries[1].is_none());
    }

    #[test]
    fn conflicting_duplicate_key_is_reported() {
        let primary = vec![row("TX", "avg_co", 1.0)];
        let dupes = vec![row("TX", "avg_temp", 20.0), row("TX", "avg_temp", 21.0)];
        let err = left_join(&primary, &[&dupes]).unwrap_err();
        assert!(matches!(err, ReportError::InconsistentKey { .. }));
    }

    #[test]
    fn identical_duplicate_key_is_tolerated() {
        let primary = vec![row("TX", "avg_co", 1.0)];
        let dupes = vec![row("TX", "avg_temp", 20.0), row("TX", "avg_temp", 20.0)];
        assert!(left_join(&primary, &[&dupes]).is_ok());
    }
}
