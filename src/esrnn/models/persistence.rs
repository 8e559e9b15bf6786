//! Checkpoints: JSON persistence of the network and the smoothing table.
//!
//! Layout
//! ------
//! `{dir}/rnn.model` holds the serialized [`RecurrentForecaster`];
//! `{dir}/es.model` holds the smoothing table together with the external
//! series ids in row order. `dir` defaults to [`EsrnnModel::model_dir`].
//!
//! Loading requires prepared records and re-maps smoothing rows by external
//! series id onto them, so a series keeps its own parameters even when the
//! set of prepared series differs from the saved one. Series without a saved
//! row keep freshly initialized parameters. The saved network must match the
//! configured dimensions exactly, dilation schedule included.
use crate::esrnn::{
    core::{
        recurrent::{RecurrentForecaster, RnnDims},
        smoother::{ExponentialSmoother, INITIAL_PARAMETER},
    },
    errors::{EsrnnError, EsrnnResult},
    models::esrnn::EsrnnModel,
};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, error, info};

pub const RNN_FILE: &str = "rnn.model";
pub const ES_FILE: &str = "es.model";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct SmootherCheckpoint {
    series_ids: Vec<String>,
    smoother: ExponentialSmoother,
}

fn io_error(path: &Path, err: std::io::Error) -> EsrnnError {
    EsrnnError::Io { path: path.display().to_string(), reason: err.to_string() }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> EsrnnResult<()> {
    let encoded = serde_json::to_string(value)?;
    fs::write(path, encoded).map_err(|err| io_error(path, err))
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> EsrnnResult<T> {
    let encoded = fs::read_to_string(path).map_err(|err| io_error(path, err))?;
    Ok(serde_json::from_str(&encoded)?)
}

impl EsrnnModel {
    /// Write both parameter collections.
    ///
    /// Returns the checkpoint directory.
    ///
    /// # Errors
    /// - [`EsrnnError::ModelNotFitted`] when there is nothing to save.
    /// - [`EsrnnError::Io`] / [`EsrnnError::Serialization`] on failure.
    pub fn save(&self, dir: Option<&Path>) -> EsrnnResult<PathBuf> {
        let (Some(smoother), Some(rnn)) = (self.smoother.as_ref(), self.rnn.as_ref()) else {
            return Err(EsrnnError::ModelNotFitted);
        };
        let dir = dir.map_or_else(|| self.model_dir(), Path::to_path_buf);
        fs::create_dir_all(&dir).map_err(|err| io_error(&dir, err))?;

        write_json(&dir.join(RNN_FILE), rnn)?;
        let checkpoint = SmootherCheckpoint {
            series_ids: self.records.iter().map(|r| r.series_id.clone()).collect(),
            smoother: smoother.clone(),
        };
        write_json(&dir.join(ES_FILE), &checkpoint)?;
        info!(dir = %dir.display(), num_series = checkpoint.series_ids.len(), "saved checkpoint");
        Ok(dir)
    }

    /// Restore both parameter collections onto prepared records.
    ///
    /// Returns `Ok(false)`, leaving the model untouched, when no
    /// `rnn.model` exists in the directory.
    ///
    /// # Errors
    /// - [`EsrnnError::ModelNotFitted`] before `prepare`: smoothing rows are
    ///   attached to prepared series by id.
    /// - [`EsrnnError::ShapeMismatch`] when the saved network or table does
    ///   not match the configured architecture (sizes, dilations, projection
    ///   layer, seasonality).
    /// - [`EsrnnError::Io`] / [`EsrnnError::Serialization`] on failure.
    pub fn load(&mut self, dir: Option<&Path>) -> EsrnnResult<bool> {
        if self.records.is_empty() {
            error!("cannot load a checkpoint before the panel is prepared");
            return Err(EsrnnError::ModelNotFitted);
        }
        let dir = dir.map_or_else(|| self.model_dir(), Path::to_path_buf);
        let rnn_path = dir.join(RNN_FILE);
        if !rnn_path.is_file() {
            error!(path = %rnn_path.display(), "no saved model found");
            return Ok(false);
        }

        let rnn: RecurrentForecaster = read_json(&rnn_path)?;
        RnnDims::from_config(&self.config).ensure_matches(rnn.dims())?;
        rnn.check_shapes()?;

        let checkpoint: SmootherCheckpoint = read_json(&dir.join(ES_FILE))?;
        let smoother = self.remap_smoother(checkpoint)?;

        info!(dir = %dir.display(), num_series = smoother.num_series(), "loaded checkpoint");
        self.rnn = Some(rnn);
        self.smoother = Some(smoother);
        Ok(true)
    }

    fn remap_smoother(&self, checkpoint: SmootherCheckpoint) -> EsrnnResult<ExponentialSmoother> {
        let SmootherCheckpoint { series_ids, smoother: saved } = checkpoint;
        let p = self.config.data.seasonality_period;
        let h = self.config.data.output_horizon_size;
        if saved.seasonality() != p {
            return Err(EsrnnError::ShapeMismatch {
                what: "seasonality period",
                expected: p,
                found: saved.seasonality(),
            });
        }
        if saved.num_series() != series_ids.len() {
            return Err(EsrnnError::ShapeMismatch {
                what: "saved series ids",
                expected: saved.num_series(),
                found: series_ids.len(),
            });
        }
        let saved_rows: HashMap<&str, usize> =
            series_ids.iter().enumerate().map(|(row, id)| (id.as_str(), row)).collect();
        let mut table = Array2::from_elem((self.records.len(), saved.row_len()), INITIAL_PARAMETER);
        for record in &self.records {
            match saved_rows.get(record.series_id.as_str()) {
                Some(&row) => table.row_mut(record.id).assign(&saved.row(row)?),
                None => debug!(
                    series_id = %record.series_id,
                    "no saved smoothing row; keeping initial parameters"
                ),
            }
        }
        let mut smoother = ExponentialSmoother::new(self.records.len(), p, h);
        smoother.set_params(table)?;
        Ok(smoother)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::esrnn::core::{
        config::{EsrnnConfig, tests::DOCUMENT},
        panel::{Panel, PanelRow},
    };
    use chrono::{Duration, NaiveDate};

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // Save/load round trips, id-based row re-mapping, the missing-checkpoint
    // path, and architecture mismatches.
    // -------------------------------------------------------------------------

    fn config() -> EsrnnConfig {
        let doc = DOCUMENT
            .replace("output_size = 14", "output_size = 7")
            .replace("max_epochs = 2", "max_epochs = 1")
            .replace("lback = 1", "lback = 0");
        EsrnnConfig::from_toml_str(&doc).unwrap()
    }

    fn panel(ids: &[&str]) -> Panel {
        let start = NaiveDate::from_ymd_opt(2021, 6, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let rows = ids
            .iter()
            .enumerate()
            .flat_map(|(k, id)| {
                (0..30).map(move |t| PanelRow {
                    unique_id: id.to_string(),
                    ds: start + Duration::days(t),
                    y: 5.0 + k as f64 + ((t % 7) as f64).sqrt(),
                })
            })
            .collect();
        Panel::new(rows).unwrap()
    }

    #[test]
    // Purpose
    // -------
    // A saved model restores identical parameters and forecasts.
    //
    // Given
    // -----
    // - A fitted model saved to a temporary directory, then a fresh engine
    //   with a different seed prepared on the same panel and loaded.
    //
    // Expect
    // ------
    // - `load` returns true; tables, weights, and forecasts coincide.
    fn round_trip_restores_parameters() {
        let dir = tempfile::tempdir().unwrap();
        let mut model = EsrnnModel::new(config(), 11);
        model.fit(&panel(&["a", "b"])).unwrap();
        model.save(Some(dir.path())).unwrap();

        let mut restored = EsrnnModel::new(config(), 99);
        restored.prepare(&panel(&["a", "b"])).unwrap();
        assert!(restored.load(Some(dir.path())).unwrap());
        assert_eq!(restored.smoother(), model.smoother());
        assert_eq!(restored.rnn(), model.rnn());
        assert_eq!(restored.predict().unwrap(), model.predict().unwrap());
    }

    #[test]
    // Purpose
    // -------
    // Rows follow external ids when the prepared id set changes.
    //
    // Given
    // -----
    // - Saved ids ["a", "b"]; the new engine prepares ["b", "c"].
    //
    // Expect
    // ------
    // - Row 0 ("b") equals the saved "b" row; row 1 ("c") is at the initial value.
    fn load_remaps_rows_by_series_id() {
        let dir = tempfile::tempdir().unwrap();
        let mut model = EsrnnModel::new(config(), 11);
        model.fit(&panel(&["a", "b"])).unwrap();
        model.save(Some(dir.path())).unwrap();
        let saved_b = model.smoother().unwrap().row(1).unwrap().to_owned();

        let mut other = EsrnnModel::new(config(), 11);
        other.prepare(&panel(&["b", "c"])).unwrap();
        assert!(other.load(Some(dir.path())).unwrap());
        let table = other.smoother().unwrap();
        assert_eq!(table.row(0).unwrap().to_owned(), saved_b);
        assert!(table.row(1).unwrap().iter().all(|&v| v == INITIAL_PARAMETER));
    }

    #[test]
    fn missing_checkpoint_leaves_model_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let mut model = EsrnnModel::new(config(), 4);
        model.prepare(&panel(&["a"])).unwrap();
        let before = model.rnn().cloned();
        assert_eq!(model.load(Some(dir.path())), Ok(false));
        assert_eq!(model.rnn().cloned(), before);
    }

    #[test]
    // Purpose
    // -------
    // Loading needs prepared series to attach smoothing rows to.
    //
    // Given
    // -----
    // - A valid checkpoint and a fresh engine that was never prepared.
    //
    // Expect
    // ------
    // - `ModelNotFitted`; the engine stays unfitted and `predict` keeps failing.
    fn load_before_prepare_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut model = EsrnnModel::new(config(), 7);
        model.fit(&panel(&["a", "b"])).unwrap();
        model.save(Some(dir.path())).unwrap();

        let mut fresh = EsrnnModel::new(config(), 7);
        assert_eq!(fresh.load(Some(dir.path())), Err(EsrnnError::ModelNotFitted));
        assert!(!fresh.is_fitted());
        assert_eq!(fresh.predict(), Err(EsrnnError::ModelNotFitted));
    }

    #[test]
    // Purpose
    // -------
    // A checkpoint trained with another dilation schedule is rejected even
    // though every weight block has the same shape.
    //
    // Given
    // -----
    // - A model saved with dilations [1, 7], loaded into one with [1, 2].
    //
    // Expect
    // ------
    // - `ShapeMismatch` on the dilation; the target keeps its own network.
    fn dilation_mismatch_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut model = EsrnnModel::new(config(), 1);
        model.prepare(&panel(&["a"])).unwrap();
        model.save(Some(dir.path())).unwrap();

        let doc = DOCUMENT
            .replace("output_size = 14", "output_size = 7")
            .replace("lback = 1", "lback = 0")
            .replace("dilations = [1, 7]", "dilations = [1, 2]");
        let mut other = EsrnnModel::new(EsrnnConfig::from_toml_str(&doc).unwrap(), 1);
        other.prepare(&panel(&["a"])).unwrap();
        let before = other.rnn().cloned();
        assert_eq!(
            other.load(Some(dir.path())),
            Err(EsrnnError::ShapeMismatch { what: "dilation", expected: 2, found: 7 })
        );
        assert_eq!(other.rnn().cloned(), before);
        assert_eq!(other.rnn().unwrap().dims().dilations, vec![1, 2]);
    }

    #[test]
    fn save_before_fit_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let model = EsrnnModel::new(config(), 4);
        assert_eq!(model.save(Some(dir.path())), Err(EsrnnError::ModelNotFitted));
    }

    #[test]
    // Purpose
    // -------
    // A checkpoint from a different architecture is rejected.
    //
    // Given
    // -----
    // - A model saved with hidden size 8, loaded into one with hidden size 4.
    //
    // Expect
    // ------
    // - `ShapeMismatch` and the target model's weights unchanged.
    fn architecture_mismatch_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut model = EsrnnModel::new(config(), 1);
        model.prepare(&panel(&["a"])).unwrap();
        model.save(Some(dir.path())).unwrap();

        let small = EsrnnConfig::from_toml_str(
            &DOCUMENT
                .replace("output_size = 14", "output_size = 7")
                .replace("state_hsize = 8", "state_hsize = 4"),
        )
        .unwrap();
        let mut other = EsrnnModel::new(small, 1);
        other.prepare(&panel(&["a"])).unwrap();
        let before = other.rnn().cloned();
        assert!(matches!(
            other.load(Some(dir.path())),
            Err(EsrnnError::ShapeMismatch { .. })
        ));
        assert_eq!(other.rnn().cloned(), before);
    }
}
