//! Forward-chaining (time series) cross validation

use chrono::NaiveDate;

use crate::error::{Result, RevenueError};

/// Row indices for one train/validate split
#[derive(Debug, Clone, PartialEq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub validate: Vec<usize>,
}

/// Split rows into `k` forward-chaining folds.
///
/// The distinct dates are cut into `k + 1` contiguous blocks. Fold `i` trains on every row
/// dated before block `i + 1` and validates on block `i + 1`. Rows sharing a date always
/// land on the same side of a cut.
pub fn forward_chaining_folds(dates: &[NaiveDate], k: usize) -> Result<Vec<Fold>> {
    if k == 0 {
        return Err(RevenueError::Config("forecaster.folds must be at least 1".to_string()));
    }

    let mut distinct = dates.to_vec();
    distinct.sort();
    distinct.dedup();

    let m = distinct.len();
    if m < k + 1 {
        return Err(RevenueError::InsufficientData {
            required: k + 1,
            actual: m,
        });
    }

    let block = m / (k + 1);
    let rank = |d: &NaiveDate| distinct.partition_point(|x| x < d);

    let folds = (0..k)
        .map(|i| {
            let val_start = m - (k - i) * block;
            let val_end = val_start + block;
            let mut fold = Fold {
                train: Vec::new(),
                validate: Vec::new(),
            };
            for (row, date) in dates.iter().enumerate() {
                let r = rank(date);
                if r < val_start {
                    fold.train.push(row);
                } else if r < val_end {
                    fold.validate.push(row);
                }
            }
            fold
        })
        .collect();

    Ok(folds)
}

pub fn mean_absolute_error(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).abs())
        .sum::<f64>()
        / actual.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn dates(n: i64) -> Vec<NaiveDate> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        (0..n).map(|i| start + Duration::days(i)).collect()
    }

    #[test]
    fn test_folds_never_validate_on_the_past() {
        let d = dates(60);
        let folds = forward_chaining_folds(&d, 5).unwrap();
        assert_eq!(folds.len(), 5);

        for fold in &folds {
            let last_train = fold.train.iter().map(|&i| d[i]).max().unwrap();
            let first_val = fold.validate.iter().map(|&i| d[i]).min().unwrap();
            assert!(last_train < first_val);
            assert_eq!(fold.validate.len(), 10);
        }
        // Training sets grow
        assert!(folds.windows(2).all(|w| w[0].train.len() < w[1].train.len()));
        // Last fold validates the most recent block
        assert_eq!(*folds[4].validate.last().unwrap(), 59);
    }

    #[test]
    fn test_shared_dates_stay_together() {
        let mut d = dates(12);
        d.extend(dates(12));
        let folds = forward_chaining_folds(&d, 3).unwrap();

        for fold in &folds {
            for &v in &fold.validate {
                assert!(fold.train.iter().all(|&t| d[t] != d[v]));
            }
            assert_eq!(fold.validate.len(), 6);
        }
    }

    #[test]
    fn test_too_few_dates() {
        let err = forward_chaining_folds(&dates(4), 5).unwrap_err();
        assert_eq!(err, RevenueError::InsufficientData { required: 6, actual: 4 });
    }

    #[test]
    fn test_zero_folds_is_a_config_error() {
        assert!(matches!(
            forward_chaining_folds(&dates(10), 0),
            Err(RevenueError::Config(_))
        ));
    }

    #[test]
    fn test_mean_absolute_error() {
        assert!((mean_absolute_error(&[0.5, 0.7], &[0.4, 0.9]) - 0.15).abs() < 1e-12);
        assert_eq!(mean_absolute_error(&[], &[]), 0.0);
    }
}
