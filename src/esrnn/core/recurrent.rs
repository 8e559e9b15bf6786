//! RecurrentForecaster — shared dilated LSTM stack with analytic BPTT.
//!
//! Purpose
//! -------
//! Map a deseasonalized, level-normalized input window (plus exogenous
//! features) to a vector of `h` predicted log-ratios, sharing one set of
//! weights across all series, and back-propagate loss gradients through
//! time to both the weights and the inputs.
//!
//! Key behaviors
//! -------------
//! - One LSTM cell per entry of the dilation schedule. Layer 0 consumes the
//!   network input; layer `l ≥ 1` consumes the running residual sum and
//!   adds its output to it (`r_l = r_{l−1} + h_l`).
//! - Layer `l` reads its recurrent state from `dilations[l]` steps earlier
//!   (zeros before that). With every dilation equal to 1 this is an
//!   ordinary stacked LSTM.
//! - An optional `tanh(W r + b)` projection precedes a linear adapter to
//!   the output horizon.
//! - Recurrent state lives in an explicit [`RecurrentCursor`], created per
//!   series per pass; it records every activation needed by
//!   [`RecurrentForecaster::backward`].
//! - An optional cell-state penalty `λ · mean(c²)` over all layers, steps
//!   and units is supported in both the forward value and the gradient.
//!
//! Invariants & assumptions
//! ------------------------
//! - Gate blocks are laid out `[i | f | g | o]`, each of width `H`.
//! - Weights are Glorot-uniform initialized from the caller's RNG; biases
//!   are zero except the forget-gate block, which starts at 1.
//! - [`RnnWeights`] doubles as the gradient container; its flat layout
//!   ([`RnnWeights::to_flat`]) is the parameter vector seen by the
//!   optimizer.
//!
//! Conventions
//! -----------
//! - Matrices are `(out, in)`; `W x` is `w.dot(&x)`.
//! - A cursor must not be shared between series.
//!
//! Testing notes
//! -------------
//! - Unit tests compare weight and input gradients against `finitediff`
//!   central differences for a two-layer dilated stack with the projection
//!   layer and the state penalty enabled.
use crate::{
    esrnn::{
        core::config::EsrnnConfig,
        errors::{EsrnnError, EsrnnResult},
    },
    optimization::numerical_stability::{glorot_limit, logistic_deriv, safe_logistic, tanh_deriv},
};
use ndarray::{Array1, Array2, ArrayView1, ArrayViewD, ArrayViewMutD, Zip, s};
use ndarray_rand::{RandomExt, rand_distr::Uniform};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Initial forget-gate bias.
pub const FORGET_BIAS: f64 = 1.0;

/// Network dimensions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RnnDims {
    pub input_size: usize,
    pub hidden_size: usize,
    pub output_size: usize,
    pub dilations: Vec<usize>,
    pub add_nonlinear_layer: bool,
}

impl RnnDims {
    pub fn from_config(config: &EsrnnConfig) -> Self {
        Self {
            input_size: config.network_input_size(),
            hidden_size: config.model.hidden_state_size,
            output_size: config.data.output_horizon_size,
            dilations: config.model.dilations.clone(),
            add_nonlinear_layer: config.model.add_nonlinear_layer,
        }
    }

    /// Check that `other` describes the same architecture.
    ///
    /// # Errors
    /// - [`EsrnnError::ShapeMismatch`] naming the first differing dimension,
    ///   including a single differing dilation.
    pub fn ensure_matches(&self, other: &RnnDims) -> EsrnnResult<()> {
        let sizes = [
            ("network input size", self.input_size, other.input_size),
            ("hidden state size", self.hidden_size, other.hidden_size),
            ("output horizon", self.output_size, other.output_size),
            ("recurrent layers", self.dilations.len(), other.dilations.len()),
            (
                "projection layers",
                usize::from(self.add_nonlinear_layer),
                usize::from(other.add_nonlinear_layer),
            ),
        ];
        for (what, expected, found) in sizes {
            if expected != found {
                return Err(EsrnnError::ShapeMismatch { what, expected, found });
            }
        }
        for (&expected, &found) in self.dilations.iter().zip(&other.dilations) {
            if expected != found {
                return Err(EsrnnError::ShapeMismatch { what: "dilation", expected, found });
            }
        }
        Ok(())
    }

    /// Weight-block shapes implied by these dimensions, in flat-layout order.
    fn block_shapes(&self) -> Vec<Vec<usize>> {
        let h = self.hidden_size;
        let mut shapes = Vec::with_capacity(3 * self.dilations.len() + 4);
        for l in 0..self.dilations.len() {
            let input = if l == 0 { self.input_size } else { h };
            shapes.extend([vec![4 * h, input], vec![4 * h, h], vec![4 * h]]);
        }
        if self.add_nonlinear_layer {
            shapes.extend([vec![h, h], vec![h]]);
        }
        shapes.extend([vec![self.output_size, h], vec![self.output_size]]);
        shapes
    }
}

/// Weights of one LSTM cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LstmWeights {
    pub w_input: Array2<f64>,
    pub w_hidden: Array2<f64>,
    pub bias: Array1<f64>,
}

/// Weights of a dense layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseWeights {
    pub weight: Array2<f64>,
    pub bias: Array1<f64>,
}

/// All network weights (or gradients with the same shapes).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RnnWeights {
    pub layers: Vec<LstmWeights>,
    pub nonlinear: Option<DenseWeights>,
    pub adapter: DenseWeights,
}

fn glorot<R: Rng + ?Sized>(rows: usize, cols: usize, rng: &mut R) -> Array2<f64> {
    let limit = glorot_limit(cols, rows);
    Array2::random_using((rows, cols), Uniform::new(-limit, limit), rng)
}

impl RnnWeights {
    /// Glorot-initialized weights for `dims`.
    pub fn init<R: Rng + ?Sized>(dims: &RnnDims, rng: &mut R) -> Self {
        let h = dims.hidden_size;
        let layers = (0..dims.dilations.len())
            .map(|l| {
                let input = if l == 0 { dims.input_size } else { h };
                let mut bias = Array1::zeros(4 * h);
                bias.slice_mut(s![h..2 * h]).fill(FORGET_BIAS);
                LstmWeights {
                    w_input: glorot(4 * h, input, rng),
                    w_hidden: glorot(4 * h, h, rng),
                    bias,
                }
            })
            .collect();
        let nonlinear = dims
            .add_nonlinear_layer
            .then(|| DenseWeights { weight: glorot(h, h, rng), bias: Array1::zeros(h) });
        let adapter = DenseWeights {
            weight: glorot(dims.output_size, h, rng),
            bias: Array1::zeros(dims.output_size),
        };
        Self { layers, nonlinear, adapter }
    }

    /// Zero-filled container with the same shapes.
    pub fn zeros_like(&self) -> Self {
        let zero_dense = |d: &DenseWeights| DenseWeights {
            weight: Array2::zeros(d.weight.raw_dim()),
            bias: Array1::zeros(d.bias.len()),
        };
        Self {
            layers: self
                .layers
                .iter()
                .map(|l| LstmWeights {
                    w_input: Array2::zeros(l.w_input.raw_dim()),
                    w_hidden: Array2::zeros(l.w_hidden.raw_dim()),
                    bias: Array1::zeros(l.bias.len()),
                })
                .collect(),
            nonlinear: self.nonlinear.as_ref().map(zero_dense),
            adapter: zero_dense(&self.adapter),
        }
    }

    fn blocks(&self) -> Vec<ArrayViewD<'_, f64>> {
        let mut out = Vec::with_capacity(3 * self.layers.len() + 4);
        for l in &self.layers {
            out.push(l.w_input.view().into_dyn());
            out.push(l.w_hidden.view().into_dyn());
            out.push(l.bias.view().into_dyn());
        }
        if let Some(nl) = &self.nonlinear {
            out.push(nl.weight.view().into_dyn());
            out.push(nl.bias.view().into_dyn());
        }
        out.push(self.adapter.weight.view().into_dyn());
        out.push(self.adapter.bias.view().into_dyn());
        out
    }

    fn blocks_mut(&mut self) -> Vec<ArrayViewMutD<'_, f64>> {
        let Self { layers, nonlinear, adapter } = self;
        let mut out = Vec::with_capacity(3 * layers.len() + 4);
        for l in layers.iter_mut() {
            let LstmWeights { w_input, w_hidden, bias } = l;
            out.push(w_input.view_mut().into_dyn());
            out.push(w_hidden.view_mut().into_dyn());
            out.push(bias.view_mut().into_dyn());
        }
        if let Some(DenseWeights { weight, bias }) = nonlinear {
            out.push(weight.view_mut().into_dyn());
            out.push(bias.view_mut().into_dyn());
        }
        out.push(adapter.weight.view_mut().into_dyn());
        out.push(adapter.bias.view_mut().into_dyn());
        out
    }

    /// Total number of scalar parameters.
    pub fn num_params(&self) -> usize {
        self.blocks().iter().map(|b| b.len()).sum()
    }

    /// Concatenate every block in row-major order.
    pub fn to_flat(&self) -> Array1<f64> {
        let mut flat = Vec::with_capacity(self.num_params());
        for block in self.blocks() {
            flat.extend(block.iter().copied());
        }
        Array1::from(flat)
    }

    /// Overwrite every block from a flat vector laid out like [`Self::to_flat`].
    ///
    /// # Errors
    /// - [`EsrnnError::ShapeMismatch`] when `flat` has the wrong length.
    pub fn assign_flat(&mut self, flat: ArrayView1<f64>) -> EsrnnResult<()> {
        let expected = self.num_params();
        if flat.len() != expected {
            return Err(EsrnnError::ShapeMismatch {
                what: "recurrent parameters",
                expected,
                found: flat.len(),
            });
        }
        let mut offset = 0;
        for mut block in self.blocks_mut() {
            let len = block.len();
            for (dst, &src) in block.iter_mut().zip(flat.slice(s![offset..offset + len])) {
                *dst = src;
            }
            offset += len;
        }
        Ok(())
    }
}

/// Activations of one layer at one step.
#[derive(Debug, Clone)]
struct LayerCache {
    input: Array1<f64>,
    h_prev: Array1<f64>,
    c_prev: Array1<f64>,
    gate_i: Array1<f64>,
    gate_f: Array1<f64>,
    gate_g: Array1<f64>,
    gate_o: Array1<f64>,
    c: Array1<f64>,
    tanh_c: Array1<f64>,
    h: Array1<f64>,
}

#[derive(Debug, Clone)]
struct StepCache {
    layers: Vec<LayerCache>,
    residual: Array1<f64>,
    projected: Array1<f64>,
}

/// RecurrentCursor — explicit per-series recurrent state and activation tape.
#[derive(Debug, Clone, Default)]
pub struct RecurrentCursor {
    steps: Vec<StepCache>,
}

impl RecurrentCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of steps taken so far.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    fn state(&self, layer: usize, dilation: usize, hidden: usize) -> (Array1<f64>, Array1<f64>) {
        let t = self.steps.len();
        if t >= dilation {
            let prev = &self.steps[t - dilation].layers[layer];
            (prev.h.clone(), prev.c.clone())
        } else {
            (Array1::zeros(hidden), Array1::zeros(hidden))
        }
    }
}

fn add_outer(target: &mut Array2<f64>, left: &Array1<f64>, right: &Array1<f64>) {
    Zip::from(target.rows_mut()).and(left).for_each(|mut row, &l| row.scaled_add(l, right));
}

/// RecurrentForecaster — dimensions plus shared weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurrentForecaster {
    dims: RnnDims,
    weights: RnnWeights,
}

impl RecurrentForecaster {
    /// Build a network with freshly initialized weights.
    pub fn new<R: Rng + ?Sized>(dims: RnnDims, rng: &mut R) -> Self {
        let weights = RnnWeights::init(&dims, rng);
        Self { dims, weights }
    }

    pub fn dims(&self) -> &RnnDims {
        &self.dims
    }

    pub fn weights(&self) -> &RnnWeights {
        &self.weights
    }

    pub fn num_params(&self) -> usize {
        self.weights.num_params()
    }

    pub fn to_flat(&self) -> Array1<f64> {
        self.weights.to_flat()
    }

    /// Overwrite the weights from a flat parameter vector.
    pub fn assign_flat(&mut self, flat: ArrayView1<f64>) -> EsrnnResult<()> {
        self.weights.assign_flat(flat)
    }

    /// Check that every weight block has the shape its dimensions imply.
    ///
    /// # Errors
    /// - [`EsrnnError::ShapeMismatch`] when the block count or any block
    ///   shape differs.
    pub fn check_shapes(&self) -> EsrnnResult<()> {
        let expected = self.dims.block_shapes();
        let blocks = self.weights.blocks();
        if blocks.len() != expected.len() {
            return Err(EsrnnError::ShapeMismatch {
                what: "recurrent weight blocks",
                expected: expected.len(),
                found: blocks.len(),
            });
        }
        for (block, shape) in blocks.iter().zip(&expected) {
            if block.shape() != shape.as_slice() {
                return Err(EsrnnError::ShapeMismatch {
                    what: "recurrent weight block",
                    expected: shape.iter().product(),
                    found: block.len(),
                });
            }
        }
        Ok(())
    }

    /// Advance the cursor by one step and return the `h`-vector output.
    ///
    /// # Panics
    /// - If `input.len() != dims.input_size` (shape bug in the caller).
    pub fn step(&self, cursor: &mut RecurrentCursor, input: ArrayView1<f64>) -> Array1<f64> {
        let hsz = self.dims.hidden_size;
        let mut layers = Vec::with_capacity(self.weights.layers.len());
        let mut residual = input.to_owned();

        for (l, w) in self.weights.layers.iter().enumerate() {
            let (h_prev, c_prev) = cursor.state(l, self.dims.dilations[l], hsz);
            let layer_input = residual.clone();
            let z = w.w_input.dot(&layer_input) + w.w_hidden.dot(&h_prev) + &w.bias;
            let gate_i = z.slice(s![0..hsz]).mapv(safe_logistic);
            let gate_f = z.slice(s![hsz..2 * hsz]).mapv(safe_logistic);
            let gate_g = z.slice(s![2 * hsz..3 * hsz]).mapv(f64::tanh);
            let gate_o = z.slice(s![3 * hsz..4 * hsz]).mapv(safe_logistic);
            let c = &gate_f * &c_prev + &gate_i * &gate_g;
            let tanh_c = c.mapv(f64::tanh);
            let h = &gate_o * &tanh_c;

            residual = if l == 0 { h.clone() } else { &residual + &h };
            layers.push(LayerCache {
                input: layer_input,
                h_prev,
                c_prev,
                gate_i,
                gate_f,
                gate_g,
                gate_o,
                c,
                tanh_c,
                h,
            });
        }

        let projected = match &self.weights.nonlinear {
            Some(nl) => (nl.weight.dot(&residual) + &nl.bias).mapv(f64::tanh),
            None => residual.clone(),
        };
        let output = self.weights.adapter.weight.dot(&projected) + &self.weights.adapter.bias;
        cursor.steps.push(StepCache { layers, residual, projected });
        output
    }

    /// `λ · mean(c²)` over every layer, step and unit of the cursor.
    pub fn cell_state_penalty(&self, cursor: &RecurrentCursor, penalty: f64) -> f64 {
        if penalty <= 0.0 || cursor.steps.is_empty() {
            return 0.0;
        }
        let mut sum = 0.0;
        let mut count = 0usize;
        for step in &cursor.steps {
            for layer in &step.layers {
                sum += layer.c.iter().map(|c| c * c).sum::<f64>();
                count += layer.c.len();
            }
        }
        penalty * sum / count as f64
    }

    /// Back-propagate through every step recorded in `cursor`.
    ///
    /// Parameters
    /// ----------
    /// - `cursor`: tape produced by [`Self::step`] calls.
    /// - `output_grads`: `∂loss/∂output` for each step, in step order.
    /// - `state_penalty`: `λ` of [`Self::cell_state_penalty`] (0 disables).
    ///
    /// Returns
    /// -------
    /// `(weight gradients, ∂loss/∂input per step)`.
    ///
    /// Errors
    /// ------
    /// - [`EsrnnError::ShapeMismatch`] if `output_grads` does not have one
    ///   entry per step.
    pub fn backward(
        &self, cursor: &RecurrentCursor, output_grads: &[Array1<f64>], state_penalty: f64,
    ) -> EsrnnResult<(RnnWeights, Vec<Array1<f64>>)> {
        let steps = cursor.steps.len();
        if output_grads.len() != steps {
            return Err(EsrnnError::ShapeMismatch {
                what: "output gradients",
                expected: steps,
                found: output_grads.len(),
            });
        }
        let hsz = self.dims.hidden_size;
        let n_layers = self.weights.layers.len();
        let penalty_scale = if state_penalty > 0.0 && steps > 0 {
            2.0 * state_penalty / (steps * n_layers * hsz) as f64
        } else {
            0.0
        };

        let mut grads = self.weights.zeros_like();
        let mut input_grads = vec![Array1::zeros(self.dims.input_size); steps];
        let mut carry_h = vec![vec![Array1::<f64>::zeros(hsz); n_layers]; steps];
        let mut carry_c = vec![vec![Array1::<f64>::zeros(hsz); n_layers]; steps];

        for t in (0..steps).rev() {
            let step = &cursor.steps[t];
            let d_out = &output_grads[t];

            add_outer(&mut grads.adapter.weight, d_out, &step.projected);
            grads.adapter.bias += d_out;
            let d_projected = self.weights.adapter.weight.t().dot(d_out);

            let mut d_residual = match (&self.weights.nonlinear, &mut grads.nonlinear) {
                (Some(nl), Some(g_nl)) => {
                    let d_pre = &d_projected * &step.projected.mapv(tanh_deriv);
                    add_outer(&mut g_nl.weight, &d_pre, &step.residual);
                    g_nl.bias += &d_pre;
                    nl.weight.t().dot(&d_pre)
                }
                _ => d_projected,
            };

            for l in (0..n_layers).rev() {
                let cache = &step.layers[l];
                let w = &self.weights.layers[l];

                let d_h = &d_residual + &carry_h[t][l];
                let d_tanh_c = &d_h * &cache.gate_o * &cache.tanh_c.mapv(tanh_deriv);
                let mut d_c = &carry_c[t][l] + &d_tanh_c;
                if penalty_scale > 0.0 {
                    d_c.scaled_add(penalty_scale, &cache.c);
                }

                let d_o = &d_h * &cache.tanh_c;
                let d_i = &d_c * &cache.gate_g;
                let d_g = &d_c * &cache.gate_i;
                let d_f = &d_c * &cache.c_prev;
                let d_c_prev = &d_c * &cache.gate_f;

                let mut d_z = Array1::zeros(4 * hsz);
                d_z.slice_mut(s![0..hsz]).assign(&(&d_i * &cache.gate_i.mapv(logistic_deriv)));
                d_z.slice_mut(s![hsz..2 * hsz])
                    .assign(&(&d_f * &cache.gate_f.mapv(logistic_deriv)));
                d_z.slice_mut(s![2 * hsz..3 * hsz])
                    .assign(&(&d_g * &cache.gate_g.mapv(tanh_deriv)));
                d_z.slice_mut(s![3 * hsz..4 * hsz])
                    .assign(&(&d_o * &cache.gate_o.mapv(logistic_deriv)));

                let g = &mut grads.layers[l];
                add_outer(&mut g.w_input, &d_z, &cache.input);
                add_outer(&mut g.w_hidden, &d_z, &cache.h_prev);
                g.bias += &d_z;

                let d_x = w.w_input.t().dot(&d_z);
                let dilation = self.dims.dilations[l];
                if t >= dilation {
                    let d_h_prev = w.w_hidden.t().dot(&d_z);
                    carry_h[t - dilation][l] += &d_h_prev;
                    carry_c[t - dilation][l] += &d_c_prev;
                }

                if l == 0 {
                    input_grads[t] = d_x;
                } else {
                    d_residual += &d_x;
                }
            }
        }

        Ok((grads, input_grads))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use finitediff::FiniteDiff;
    use rand::{SeedableRng, rngs::StdRng};

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // Shapes and initialization, flat round trips, dilated state lookup, and
    // exactness of back-propagation through time for weights and inputs.
    // -------------------------------------------------------------------------

    fn dims(nonlinear: bool) -> RnnDims {
        RnnDims {
            input_size: 3,
            hidden_size: 2,
            output_size: 2,
            dilations: vec![1, 2],
            add_nonlinear_layer: nonlinear,
        }
    }

    fn inputs(steps: usize) -> Vec<Array1<f64>> {
        (0..steps)
            .map(|t| {
                let t = t as f64;
                Array1::from(vec![0.3 * t.sin(), -0.2 + 0.1 * t, 0.5 * (0.7 * t).cos()])
            })
            .collect()
    }

    fn output_weights(steps: usize) -> Vec<Array1<f64>> {
        (0..steps).map(|t| Array1::from(vec![0.4 - 0.1 * t as f64, 0.25])).collect()
    }

    fn run_loss(
        net: &RecurrentForecaster, xs: &[Array1<f64>], weights: &[Array1<f64>], penalty: f64,
    ) -> f64 {
        let mut cursor = RecurrentCursor::new();
        let mut loss = 0.0;
        for (x, w) in xs.iter().zip(weights) {
            loss += net.step(&mut cursor, x.view()).dot(w);
        }
        loss + net.cell_state_penalty(&cursor, penalty)
    }

    #[test]
    // Purpose
    // -------
    // Initialization produces the documented shapes and forget-gate bias.
    //
    // Given
    // -----
    // - input 3, hidden 2, output 2, dilations [1, 2], projection enabled.
    //
    // Expect
    // ------
    // - Layer 0 input block 8 × 3, layer 1 input block 8 × 2, forget bias 1,
    //   other biases 0, and a flat vector of `num_params` entries.
    fn init_shapes_and_forget_bias() {
        let mut rng = StdRng::seed_from_u64(11);
        let net = RecurrentForecaster::new(dims(true), &mut rng);
        let w = net.weights();
        assert_eq!(w.layers[0].w_input.dim(), (8, 3));
        assert_eq!(w.layers[1].w_input.dim(), (8, 2));
        assert_eq!(w.layers[0].bias.slice(s![2..4]).to_vec(), vec![1.0, 1.0]);
        assert_eq!(w.layers[0].bias.slice(s![0..2]).to_vec(), vec![0.0, 0.0]);
        assert_eq!(w.adapter.weight.dim(), (2, 2));
        assert!(w.nonlinear.is_some());
        let expected = 2 * (8 * 2 + 8) + 8 * 3 + 8 * 2 + (4 + 2) + (4 + 2);
        assert_eq!(net.num_params(), expected);
        assert_eq!(net.to_flat().len(), expected);
    }

    #[test]
    // Purpose
    // -------
    // Architecture checks catch differences that weight shapes alone miss.
    //
    // Given
    // -----
    // - Dimensions differing only in one dilation, or in the projection layer.
    // - A network whose adapter bias was resized after construction.
    //
    // Expect
    // ------
    // - `ensure_matches` reports the dilation and the projection layer;
    //   `check_shapes` accepts a fresh network and rejects the resized one.
    fn architecture_checks_cover_dilations_and_blocks() {
        let base = dims(false);
        let mut other = base.clone();
        other.dilations = vec![1, 3];
        assert_eq!(
            base.ensure_matches(&other),
            Err(EsrnnError::ShapeMismatch { what: "dilation", expected: 2, found: 3 })
        );
        assert!(matches!(
            base.ensure_matches(&dims(true)),
            Err(EsrnnError::ShapeMismatch { what: "projection layers", .. })
        ));
        assert_eq!(base.ensure_matches(&base.clone()), Ok(()));

        let mut rng = StdRng::seed_from_u64(5);
        let mut net = RecurrentForecaster::new(dims(true), &mut rng);
        assert_eq!(net.check_shapes(), Ok(()));
        net.weights.adapter.bias = Array1::zeros(5);
        assert!(matches!(
            net.check_shapes(),
            Err(EsrnnError::ShapeMismatch { what: "recurrent weight block", .. })
        ));
    }

    #[test]
    fn flat_round_trip_restores_weights() {
        let mut rng = StdRng::seed_from_u64(3);
        let net = RecurrentForecaster::new(dims(false), &mut rng);
        let mut other = RecurrentForecaster::new(dims(false), &mut rng);
        assert_ne!(net, other);
        other.assign_flat(net.to_flat().view()).unwrap();
        assert_eq!(net, other);
        assert!(other.assign_flat(Array1::zeros(3).view()).is_err());
    }

    #[test]
    // Purpose
    // -------
    // Recurrent state lives only in the cursor, so two fresh cursors fed the
    // same sequence produce the same outputs.
    //
    // Given
    // -----
    // - Two fresh cursors fed the same sequence.
    //
    // Expect
    // ------
    // - Identical outputs at every step (cursor state is self-contained).
    fn cursors_are_independent() {
        let mut rng = StdRng::seed_from_u64(5);
        let net = RecurrentForecaster::new(dims(true), &mut rng);
        let xs = inputs(4);
        let mut a = RecurrentCursor::new();
        let first: Vec<Array1<f64>> = xs.iter().map(|x| net.step(&mut a, x.view())).collect();
        let mut b = RecurrentCursor::new();
        let second: Vec<Array1<f64>> = xs.iter().map(|x| net.step(&mut b, x.view())).collect();
        assert_eq!(first, second);
        assert_eq!(a.len(), 4);
    }

    #[test]
    // Purpose
    // -------
    // Weight gradients from BPTT match central finite differences.
    //
    // Given
    // -----
    // - Dilations [1, 2], projection layer, state penalty 0.3, 5 steps,
    //   loss = Σ_t ⟨out_t, w_t⟩ + penalty.
    //
    // Expect
    // ------
    // - Every flat gradient entry agrees within 1e-5.
    fn weight_gradients_match_finite_differences() {
        let mut rng = StdRng::seed_from_u64(17);
        let net = RecurrentForecaster::new(dims(true), &mut rng);
        let xs = inputs(5);
        let ws = output_weights(5);
        let penalty = 0.3;

        let mut cursor = RecurrentCursor::new();
        for x in &xs {
            net.step(&mut cursor, x.view());
        }
        let (grads, _) = net.backward(&cursor, &ws, penalty).unwrap();
        let analytic = grads.to_flat();

        let theta = net.to_flat();
        let loss = |th: &Array1<f64>| {
            let mut perturbed = net.clone();
            perturbed.assign_flat(th.view()).unwrap();
            run_loss(&perturbed, &xs, &ws, penalty)
        };
        let numeric = theta.central_diff(&loss);
        for (i, (a, b)) in analytic.iter().zip(numeric.iter()).enumerate() {
            assert!((a - b).abs() < 1e-5, "param {i}: analytic {a} vs numeric {b}");
        }
    }

    #[test]
    // Purpose
    // -------
    // Input gradients from BPTT match central finite differences.
    //
    // Given
    // -----
    // - Same network without projection, 4 steps, inputs flattened into one
    //   vector.
    //
    // Expect
    // ------
    // - Every input gradient entry agrees within 1e-5.
    fn input_gradients_match_finite_differences() {
        let mut rng = StdRng::seed_from_u64(23);
        let net = RecurrentForecaster::new(dims(false), &mut rng);
        let xs = inputs(4);
        let ws = output_weights(4);

        let mut cursor = RecurrentCursor::new();
        for x in &xs {
            net.step(&mut cursor, x.view());
        }
        let (_, input_grads) = net.backward(&cursor, &ws, 0.0).unwrap();
        let analytic: Vec<f64> = input_grads.iter().flat_map(|g| g.iter().copied()).collect();

        let flat: Array1<f64> = xs.iter().flat_map(|x| x.iter().copied()).collect();
        let loss = |v: &Array1<f64>| {
            let xs: Vec<Array1<f64>> =
                v.exact_chunks(3).into_iter().map(|c| c.to_owned()).collect();
            run_loss(&net, &xs, &ws, 0.0)
        };
        let numeric = flat.central_diff(&loss);
        for (i, (a, b)) in analytic.iter().zip(numeric.iter()).enumerate() {
            assert!((a - b).abs() < 1e-5, "input {i}: analytic {a} vs numeric {b}");
        }
    }

    #[test]
    fn backward_checks_gradient_count() {
        let mut rng = StdRng::seed_from_u64(1);
        let net = RecurrentForecaster::new(dims(false), &mut rng);
        let mut cursor = RecurrentCursor::new();
        net.step(&mut cursor, inputs(1)[0].view());
        assert!(matches!(
            net.backward(&cursor, &[], 0.0),
            Err(EsrnnError::ShapeMismatch { what: "output gradients", .. })
        ));
    }
}
