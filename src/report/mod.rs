//! Reporting utilities: the final ranking and formatted terminal output.

pub mod format;

pub use format::*;

use crate::domain::{N_CLASSES, PlanetRecord, Prediction, RankedEntry, ScoreBreakdown};
use crate::error::AppError;

/// Merge scores and predictions into a ranking ordered by total score.
///
/// The sort is stable, so equal totals keep input order. Ranks are 1-based.
pub fn assemble_ranking(
    records: &[PlanetRecord],
    scores: &[ScoreBreakdown],
    predictions: &[Prediction],
) -> Result<Vec<RankedEntry>, AppError> {
    if records.len() != scores.len() || scores.len() != predictions.len() {
        return Err(AppError::new(
            4,
            format!(
                "Cannot assemble ranking: {} records, {} scores, {} predictions.",
                records.len(),
                scores.len(),
                predictions.len()
            ),
        ));
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| {
        scores[b]
            .total
            .partial_cmp(&scores[a].total)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    Ok(order
        .into_iter()
        .enumerate()
        .map(|(pos, row)| {
            let record = &records[row];
            RankedEntry {
                rank: pos + 1,
                row,
                planet_name: record.display_name(row),
                host_name: record.host_name.clone().unwrap_or_default(),
                scores: scores[row],
                predicted: predictions[row].label,
                confidence: predictions[row].confidence,
            }
        })
        .collect())
}

/// Count of predicted labels per class.
pub fn class_distribution(entries: &[RankedEntry]) -> [usize; N_CLASSES] {
    let mut counts = [0usize; N_CLASSES];
    for e in entries {
        counts[e.predicted.index()] += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PriorityLabel;

    fn score(total: f64) -> ScoreBreakdown {
        ScoreBreakdown {
            habitability: 0.0,
            detectability: 0.0,
            biosignature: 0.0,
            stellar_activity: 0.0,
            total,
            zone: None,
        }
    }

    fn named(name: &str) -> PlanetRecord {
        PlanetRecord {
            planet_name: Some(name.to_string()),
            ..PlanetRecord::default()
        }
    }

    fn predicted(label: PriorityLabel) -> Prediction {
        Prediction {
            label,
            confidence: 0.5,
        }
    }

    #[test]
    fn ranking_is_sorted_and_stable() {
        let records = vec![named("a"), named("b"), named("c"), named("d")];
        let scores = vec![score(40.0), score(75.0), score(40.0), score(90.0)];
        let preds = vec![
            predicted(PriorityLabel::Low),
            predicted(PriorityLabel::High),
            predicted(PriorityLabel::Low),
            predicted(PriorityLabel::PrimeTarget),
        ];
        let ranking = assemble_ranking(&records, &scores, &preds).unwrap();

        assert_eq!(ranking.len(), 4);
        let names: Vec<&str> = ranking.iter().map(|e| e.planet_name.as_str()).collect();
        assert_eq!(names, ["d", "b", "a", "c"]);
        let ranks: Vec<usize> = ranking.iter().map(|e| e.rank).collect();
        assert_eq!(ranks, [1, 2, 3, 4]);
        assert!(
            ranking
                .windows(2)
                .all(|w| w[0].scores.total >= w[1].scores.total)
        );
        assert_eq!(ranking[0].predicted, PriorityLabel::PrimeTarget);
        assert_eq!(ranking[0].row, 3);
    }

    #[test]
    fn unnamed_planets_get_row_names() {
        let ranking = assemble_ranking(
            &[PlanetRecord::default()],
            &[score(10.0)],
            &[predicted(PriorityLabel::NoViable)],
        )
        .unwrap();
        assert_eq!(ranking[0].planet_name, "Planet_0");
        assert_eq!(ranking[0].host_name, "");
    }

    #[test]
    fn length_mismatch_is_an_error() {
        let err = assemble_ranking(&[named("a")], &[score(1.0)], &[]).unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn distribution_counts_predictions() {
        let records = vec![named("a"), named("b"), named("c")];
        let scores = vec![score(1.0), score(2.0), score(3.0)];
        let preds = vec![
            predicted(PriorityLabel::Low),
            predicted(PriorityLabel::Low),
            predicted(PriorityLabel::High),
        ];
        let ranking = assemble_ranking(&records, &scores, &preds).unwrap();
        assert_eq!(class_distribution(&ranking), [0, 2, 0, 1, 0]);
    }
}
