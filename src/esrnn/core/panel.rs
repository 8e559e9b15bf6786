//! Panel — the `(series_id, timestamp, value)` table consumed by the engine.
//!
//! Purpose
//! -------
//! Hold the already-cleaned input triples for a collection of series,
//! align separate predictor/target tables, expose per-series sorted views,
//! and define the forecast row type produced by the engine.
//!
//! Key behaviors
//! -------------
//! - [`Panel::new`] rejects empty input and duplicate `(unique_id, ds)`
//!   keys.
//! - [`Panel::from_tables`] aligns a predictor table with a target table
//!   on `(unique_id, ds)`; any key present in one table only is an error.
//! - [`Panel::sorted_series`] groups rows by id (lexicographic order) and
//!   sorts each group by timestamp.
//! - [`Panel::trainable_ids`] keeps only series with enough finite,
//!   strictly positive observations, logging the ones it drops.
//!
//! Invariants & assumptions
//! ------------------------
//! - Keys are unique after construction.
//! - Exogenous vectors, when attached, belong to ids present in the panel;
//!   their length is checked against the configuration when records are
//!   built.
//!
//! Conventions
//! -----------
//! - Series ids are plain strings; their sorted order defines the dense
//!   record ids.
use crate::esrnn::errors::{EsrnnError, EsrnnResult};
use chrono::NaiveDateTime;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::warn;

/// One observation of the target table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelRow {
    pub unique_id: String,
    pub ds: NaiveDateTime,
    pub y: f64,
}

/// One row of the predictor table; `x` is an opaque label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictorRow {
    pub unique_id: String,
    pub ds: NaiveDateTime,
    pub x: String,
}

/// One forecast produced by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRow {
    pub unique_id: String,
    pub ds: NaiveDateTime,
    pub y_hat: f64,
}

/// Timestamps and values of one series, sorted by timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesView {
    pub unique_id: String,
    pub timestamps: Vec<NaiveDateTime>,
    pub values: Vec<f64>,
}

/// Panel — validated input table with optional per-series exogenous vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    rows: Vec<PanelRow>,
    exogenous: HashMap<String, Array1<f64>>,
}

impl Panel {
    /// Build a panel from target rows.
    ///
    /// # Errors
    /// - [`EsrnnError::EmptyPanel`] when `rows` is empty.
    /// - [`EsrnnError::DuplicateKey`] for the first repeated key.
    pub fn new(rows: Vec<PanelRow>) -> EsrnnResult<Self> {
        if rows.is_empty() {
            return Err(EsrnnError::EmptyPanel);
        }
        let mut seen = BTreeSet::new();
        for row in &rows {
            if !seen.insert((row.unique_id.as_str(), row.ds)) {
                return Err(EsrnnError::DuplicateKey {
                    unique_id: row.unique_id.clone(),
                    ds: row.ds,
                });
            }
        }
        Ok(Self { rows, exogenous: HashMap::new() })
    }

    /// Align a predictor table with a target table on `(unique_id, ds)`.
    ///
    /// # Errors
    /// - [`EsrnnError::MisalignedTables`] when the tables differ in length
    ///   or in their key sets.
    /// - Any error of [`Panel::new`].
    pub fn from_tables(predictors: &[PredictorRow], targets: Vec<PanelRow>) -> EsrnnResult<Self> {
        if predictors.len() != targets.len() {
            return Err(EsrnnError::MisalignedTables {
                reason: format!(
                    "{} predictor rows but {} target rows",
                    predictors.len(),
                    targets.len()
                ),
            });
        }
        let panel = Self::new(targets)?;
        let target_keys: BTreeSet<(&str, NaiveDateTime)> =
            panel.rows.iter().map(|r| (r.unique_id.as_str(), r.ds)).collect();
        for p in predictors {
            if !target_keys.contains(&(p.unique_id.as_str(), p.ds)) {
                return Err(EsrnnError::MisalignedTables {
                    reason: format!("predictor key ('{}', {}) has no target", p.unique_id, p.ds),
                });
            }
        }
        let predictor_keys: BTreeSet<(&str, NaiveDateTime)> =
            predictors.iter().map(|p| (p.unique_id.as_str(), p.ds)).collect();
        if predictor_keys.len() != target_keys.len() {
            return Err(EsrnnError::MisalignedTables {
                reason: "predictor table contains duplicate keys".to_string(),
            });
        }
        Ok(panel)
    }

    /// Attach an exogenous feature vector to a series.
    ///
    /// # Errors
    /// - [`EsrnnError::MisalignedTables`] when `unique_id` is not in the panel.
    pub fn with_exogenous(
        mut self, unique_id: impl Into<String>, features: Array1<f64>,
    ) -> EsrnnResult<Self> {
        let unique_id = unique_id.into();
        if !self.rows.iter().any(|r| r.unique_id == unique_id) {
            return Err(EsrnnError::MisalignedTables {
                reason: format!("exogenous vector for unknown series '{unique_id}'"),
            });
        }
        self.exogenous.insert(unique_id, features);
        Ok(self)
    }

    pub fn rows(&self) -> &[PanelRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn exogenous(&self, unique_id: &str) -> Option<&Array1<f64>> {
        self.exogenous.get(unique_id)
    }

    /// Group rows by id (sorted) and sort each group by timestamp.
    pub fn sorted_series(&self) -> Vec<SeriesView> {
        let mut groups: BTreeMap<&str, Vec<&PanelRow>> = BTreeMap::new();
        for row in &self.rows {
            groups.entry(row.unique_id.as_str()).or_default().push(row);
        }
        groups
            .into_iter()
            .map(|(id, mut rows)| {
                rows.sort_by_key(|r| r.ds);
                SeriesView {
                    unique_id: id.to_string(),
                    timestamps: rows.iter().map(|r| r.ds).collect(),
                    values: rows.iter().map(|r| r.y).collect(),
                }
            })
            .collect()
    }

    /// Ids of series with at least `min_length` observations, all finite
    /// and strictly positive, in sorted order.
    ///
    /// Dropped series are logged at warn level.
    pub fn trainable_ids(&self, min_length: usize) -> Vec<String> {
        let mut kept = Vec::new();
        for series in self.sorted_series() {
            let len = series.values.len();
            let valid = series.values.iter().all(|&v| v.is_finite() && v > 0.0);
            if len >= min_length && valid {
                kept.push(series.unique_id);
            } else if !valid {
                warn!(
                    series_id = %series.unique_id,
                    "dropping series with non-finite or non-positive observations"
                );
            } else {
                warn!(
                    series_id = %series.unique_id,
                    len,
                    min_length,
                    "dropping series shorter than the minimum length"
                );
            }
        }
        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // Duplicate detection, table alignment, sorting, and the trainable-id
    // filter boundary.
    // -------------------------------------------------------------------------

    fn day(k: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2021, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap()
            + Duration::days(k)
    }

    fn rows(id: &str, n: usize) -> Vec<PanelRow> {
        (0..n)
            .map(|k| PanelRow { unique_id: id.to_string(), ds: day(k as i64), y: 1.0 + k as f64 })
            .collect()
    }

    #[test]
    // Purpose
    // -------
    // Empty input and duplicate keys are rejected.
    //
    // Given
    // -----
    // - No rows; two rows sharing ("a", day 0).
    //
    // Expect
    // ------
    // - `EmptyPanel` and `DuplicateKey`.
    fn new_rejects_empty_and_duplicate_rows() {
        assert_eq!(Panel::new(vec![]), Err(EsrnnError::EmptyPanel));
        let mut r = rows("a", 2);
        r.push(PanelRow { unique_id: "a".into(), ds: day(0), y: 3.0 });
        assert!(matches!(Panel::new(r), Err(EsrnnError::DuplicateKey { .. })));
    }

    #[test]
    // Purpose
    // -------
    // `from_tables` accepts matching key sets and rejects mismatches.
    //
    // Given
    // -----
    // - Predictors matching all target keys; predictors with a shifted date.
    //
    // Expect
    // ------
    // - Success for the aligned tables; `MisalignedTables` otherwise.
    fn from_tables_checks_key_alignment() {
        let targets = rows("a", 3);
        let predictors: Vec<PredictorRow> = targets
            .iter()
            .map(|r| PredictorRow { unique_id: r.unique_id.clone(), ds: r.ds, x: "cat".into() })
            .collect();
        assert!(Panel::from_tables(&predictors, targets.clone()).is_ok());

        let mut shifted = predictors.clone();
        shifted[2].ds = day(10);
        assert!(matches!(
            Panel::from_tables(&shifted, targets.clone()),
            Err(EsrnnError::MisalignedTables { .. })
        ));
        assert!(matches!(
            Panel::from_tables(&predictors[..2], targets),
            Err(EsrnnError::MisalignedTables { .. })
        ));
    }

    #[test]
    // Purpose
    // -------
    // Series are grouped by sorted id and sorted by timestamp.
    //
    // Given
    // -----
    // - Rows for "b" then "a", with "a" given in reverse date order.
    //
    // Expect
    // ------
    // - Views ordered ["a", "b"]; "a" values in chronological order.
    fn sorted_series_orders_ids_and_timestamps() {
        let mut r = rows("b", 2);
        let mut a = rows("a", 3);
        a.reverse();
        r.extend(a);
        let panel = Panel::new(r).unwrap();
        let views = panel.sorted_series();
        assert_eq!(views[0].unique_id, "a");
        assert_eq!(views[1].unique_id, "b");
        assert_eq!(views[0].values, vec![1.0, 2.0, 3.0]);
        assert_eq!(views[0].timestamps, vec![day(0), day(1), day(2)]);
    }

    #[test]
    // Purpose
    // -------
    // The trainable filter keeps series of exactly the minimum length and
    // drops shorter or invalid ones.
    //
    // Given
    // -----
    // - "a" with 10 points, "b" with 9, "c" with 10 including a zero.
    //
    // Expect
    // ------
    // - Only "a" is kept for a minimum length of 10.
    fn trainable_ids_respects_length_boundary_and_positivity() {
        let mut r = rows("a", 10);
        r.extend(rows("b", 9));
        let mut c = rows("c", 10);
        c[4].y = 0.0;
        r.extend(c);
        let panel = Panel::new(r).unwrap();
        assert_eq!(panel.trainable_ids(10), vec!["a".to_string()]);
        assert_eq!(panel.trainable_ids(9), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn with_exogenous_requires_known_series() {
        let panel = Panel::new(rows("a", 2)).unwrap();
        let panel = panel.with_exogenous("a", ndarray::array![1.0, 0.0]).unwrap();
        assert_eq!(panel.exogenous("a").map(|x| x.len()), Some(2));
        assert!(panel.with_exogenous("zz", ndarray::array![1.0]).is_err());
    }
}
