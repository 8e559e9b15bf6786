//! SeriesRecord — one series' training prefix, hold-out block, and metadata.
//!
//! Purpose
//! -------
//! Carry the observations of a single series in the form consumed by the
//! smoothing recursion and the network: a validated training prefix, an
//! optional hold-out block, the last training timestamp, and the series'
//! exogenous features.
//!
//! Key behaviors
//! -------------
//! - With `lookback_periods > 0`, the trailing `lookback · h` points are
//!   removed; when the remaining prefix still holds at least `w + h`
//!   points, the first `h` of the removed points become `y_test`.
//!   Otherwise no split is made and the full series is kept (logged at
//!   debug level).
//! - The training prefix is truncated to its `max_series_length` most
//!   recent points.
//! - `last_timestamp` is the timestamp of the last retained training point.
//!
//! Invariants & assumptions
//! ------------------------
//! - `y.len() ≥ 2`, all values finite and strictly positive.
//! - `exogenous.len() == exogenous_feature_size`.
//! - `id` is dense and zero-based; the engine assigns it in sorted
//!   series-id order.
use crate::esrnn::{
    core::{config::EsrnnConfig, panel::SeriesView},
    errors::{EsrnnError, EsrnnResult},
};
use chrono::NaiveDateTime;
use ndarray::Array1;
use tracing::debug;

/// Minimum number of retained observations for a record.
pub const MIN_RECORD_LENGTH: usize = 2;

/// SeriesRecord — validated per-series data.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesRecord {
    pub id: usize,
    pub series_id: String,
    pub y: Array1<f64>,
    pub y_test: Option<Array1<f64>>,
    pub last_timestamp: NaiveDateTime,
    pub exogenous: Array1<f64>,
}

impl SeriesRecord {
    /// Build a record from sorted timestamps and values.
    ///
    /// Parameters
    /// ----------
    /// - `id`: dense row index of this series.
    /// - `series_id`: external key.
    /// - `timestamps`, `values`: chronologically sorted observations.
    /// - `exogenous`: optional feature vector (zeros when `None`).
    /// - `config`: supplies `lookback_periods`, `w`, `h`,
    ///   `max_series_length` and `exogenous_feature_size`.
    ///
    /// Errors
    /// ------
    /// - [`EsrnnError::LengthMismatch`] when timestamps and values differ in
    ///   length.
    /// - [`EsrnnError::NonFiniteObservation`] /
    ///   [`EsrnnError::NonPositiveObservation`] for invalid values.
    /// - [`EsrnnError::SeriesTooShort`] when fewer than two points remain.
    /// - [`EsrnnError::ExogenousLengthMismatch`] for a wrongly sized
    ///   exogenous vector.
    pub fn new(
        id: usize, series_id: impl Into<String>, timestamps: &[NaiveDateTime], values: &[f64],
        exogenous: Option<&Array1<f64>>, config: &EsrnnConfig,
    ) -> EsrnnResult<Self> {
        let series_id = series_id.into();
        if timestamps.len() != values.len() {
            return Err(EsrnnError::LengthMismatch {
                series_id,
                values: values.len(),
                timestamps: timestamps.len(),
            });
        }
        for (index, &value) in values.iter().enumerate() {
            if !value.is_finite() {
                return Err(EsrnnError::NonFiniteObservation { series_id, index, value });
            }
            if value <= 0.0 {
                return Err(EsrnnError::NonPositiveObservation { series_id, index, value });
            }
        }

        let exog_size = config.data.exogenous_feature_size;
        let exogenous = match exogenous {
            Some(x) if x.len() != exog_size => {
                return Err(EsrnnError::ExogenousLengthMismatch {
                    unique_id: series_id,
                    expected: exog_size,
                    found: x.len(),
                });
            }
            Some(x) => x.clone(),
            None => Array1::zeros(exog_size),
        };

        let n = values.len();
        let w = config.data.input_window_size;
        let h = config.data.output_horizon_size;
        let held_out = config.model.lookback_periods * h;
        let (end, y_test) = if held_out > 0 && n >= held_out && n - held_out >= w + h {
            let first = n - held_out;
            (first, Some(Array1::from(values[first..first + h].to_vec())))
        } else {
            if held_out > 0 {
                debug!(
                    series_id = %series_id,
                    len = n,
                    held_out,
                    "series too short for a hold-out block; keeping all points for training"
                );
            }
            (n, None)
        };
        let start = end.saturating_sub(config.max_series_length);

        if end - start < MIN_RECORD_LENGTH {
            return Err(EsrnnError::SeriesTooShort {
                series_id,
                len: end - start,
                min: MIN_RECORD_LENGTH,
            });
        }

        Ok(Self {
            id,
            series_id,
            y: Array1::from(values[start..end].to_vec()),
            y_test,
            last_timestamp: timestamps[end - 1],
            exogenous,
        })
    }

    /// Build a record from a sorted panel view.
    pub fn from_view(
        id: usize, view: &SeriesView, exogenous: Option<&Array1<f64>>, config: &EsrnnConfig,
    ) -> EsrnnResult<Self> {
        Self::new(id, view.unique_id.clone(), &view.timestamps, &view.values, exogenous, config)
    }

    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    /// Window ends `i` for which a full input window and a full target
    /// block exist: `w − 1 ≤ i < n − h`.
    pub fn window_ends(&self, w: usize, h: usize) -> std::ops::Range<usize> {
        let n = self.y.len();
        let start = w.saturating_sub(1);
        let end = n.saturating_sub(h).max(start);
        start..end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::esrnn::core::config::{EsrnnConfig, tests::DOCUMENT};
    use chrono::{Duration, NaiveDate};

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // Hold-out splitting (present and skipped), truncation to the maximum
    // length, validation failures, and window-end ranges.
    // -------------------------------------------------------------------------

    fn config(lback: usize) -> EsrnnConfig {
        let doc = DOCUMENT.replace("lback = 1", &format!("lback = {lback}"));
        EsrnnConfig::from_toml_str(&doc).unwrap()
    }

    fn days(n: usize) -> Vec<NaiveDateTime> {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        (0..n).map(|k| start + Duration::days(k as i64)).collect()
    }

    #[test]
    // Purpose
    // -------
    // A long enough series gets a hold-out block and a shortened prefix.
    //
    // Given
    // -----
    // - w = 7, h = 14, lback = 1, n = 60 values 1..=60.
    //
    // Expect
    // ------
    // - y = values[0..46], y_test = values[46..60], last timestamp = day 45.
    fn lookback_splits_off_holdout_block() {
        let cfg = config(1);
        let values: Vec<f64> = (1..=60).map(|v| v as f64).collect();
        let ts = days(60);
        let rec = SeriesRecord::new(0, "s", &ts, &values, None, &cfg).unwrap();
        assert_eq!(rec.len(), 46);
        assert_eq!(rec.y[45], 46.0);
        let y_test = rec.y_test.as_ref().unwrap();
        assert_eq!(y_test.len(), 14);
        assert_eq!(y_test[0], 47.0);
        assert_eq!(rec.last_timestamp, ts[45]);
        assert_eq!(rec.exogenous.len(), 0);
    }

    #[test]
    // Purpose
    // -------
    // Without room for the hold-out block the series is kept whole.
    //
    // Given
    // -----
    // - w = 7, h = 14, lback = 1, n = 30 (30 − 14 < 21).
    //
    // Expect
    // ------
    // - No y_test and all 30 points retained.
    fn short_series_skips_holdout_split() {
        let cfg = config(1);
        let values = vec![2.0; 30];
        let rec = SeriesRecord::new(0, "s", &days(30), &values, None, &cfg).unwrap();
        assert!(rec.y_test.is_none());
        assert_eq!(rec.len(), 30);
    }

    #[test]
    // Purpose
    // -------
    // Long prefixes are truncated to the most recent `max_series_length`.
    //
    // Given
    // -----
    // - lback = 0, max_series_length = 163, n = 200.
    //
    // Expect
    // ------
    // - 163 points kept, the first being value 38.
    fn long_series_are_truncated_to_max_length() {
        let cfg = config(0);
        let values: Vec<f64> = (1..=200).map(|v| v as f64).collect();
        let rec = SeriesRecord::new(3, "s", &days(200), &values, None, &cfg).unwrap();
        assert_eq!(rec.len(), cfg.max_series_length);
        assert_eq!(rec.y[0], 38.0);
        assert_eq!(rec.id, 3);
    }

    #[test]
    // Purpose
    // -------
    // Invalid inputs are rejected at construction.
    //
    // Given
    // -----
    // - One point; a zero value; mismatched lengths; a wrong exogenous length.
    //
    // Expect
    // ------
    // - The matching `EsrnnError` variants.
    fn construction_validates_inputs() {
        let cfg = config(0);
        assert!(matches!(
            SeriesRecord::new(0, "s", &days(1), &[1.0], None, &cfg),
            Err(EsrnnError::SeriesTooShort { len: 1, .. })
        ));
        assert!(matches!(
            SeriesRecord::new(0, "s", &days(3), &[1.0, 0.0, 2.0], None, &cfg),
            Err(EsrnnError::NonPositiveObservation { index: 1, .. })
        ));
        assert!(matches!(
            SeriesRecord::new(0, "s", &days(2), &[1.0, 2.0, 3.0], None, &cfg),
            Err(EsrnnError::LengthMismatch { .. })
        ));
        let exog = ndarray::array![1.0];
        assert!(matches!(
            SeriesRecord::new(0, "s", &days(3), &[1.0, 2.0, 3.0], Some(&exog), &cfg),
            Err(EsrnnError::ExogenousLengthMismatch { expected: 0, found: 1, .. })
        ));
    }

    #[test]
    fn window_ends_cover_full_windows_only() {
        let cfg = config(0);
        let values = vec![1.0; 30];
        let rec = SeriesRecord::new(0, "s", &days(30), &values, None, &cfg).unwrap();
        assert_eq!(rec.window_ends(7, 14), 6..16);
        assert_eq!(rec.window_ends(7, 40), 6..6);
    }
}
