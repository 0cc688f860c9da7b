//! Self-attention sequence regressor
//!
//! Windows are projected to `d_model`, given sinusoidal positions, and passed
//! through encoder blocks (multi-head scaled dot-product attention and a
//! ReLU feed-forward, each with a residual and layer norm). The encoding of
//! the last step feeds a linear head. The whole network trains end to end.

use super::network::{self, DTYPE};
use super::{check_finite, FitReport};
use crate::error::{ForecastError, Result};
use candle_core::{Tensor, D};
use candle_nn::{linear, Linear, Module, VarBuilder, VarMap};
use ndarray::ArrayView3;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AttentionParams {
    pub d_model: usize,
    pub n_heads: usize,
    pub num_layers: usize,
    pub epochs: usize,
    pub learning_rate: f64,
    pub seed: u64,
}

impl Default for AttentionParams {
    fn default() -> Self {
        Self {
            d_model: 64,
            n_heads: 4,
            num_layers: 2,
            epochs: 30,
            learning_rate: 0.001,
            seed: 42,
        }
    }
}

/// Post-norm encoder layer
#[derive(Debug, Clone)]
struct EncoderBlock {
    query: Linear,
    key: Linear,
    value: Linear,
    output: Linear,
    ff_in: Linear,
    ff_out: Linear,
    n_heads: usize,
    head_dim: usize,
}

impl EncoderBlock {
    fn new(d_model: usize, n_heads: usize, vb: VarBuilder) -> candle_core::Result<Self> {
        Ok(Self {
            query: linear(d_model, d_model, vb.pp("query"))?,
            key: linear(d_model, d_model, vb.pp("key"))?,
            value: linear(d_model, d_model, vb.pp("value"))?,
            output: linear(d_model, d_model, vb.pp("output"))?,
            ff_in: linear(d_model, 2 * d_model, vb.pp("ff_in"))?,
            ff_out: linear(2 * d_model, d_model, vb.pp("ff_out"))?,
            n_heads,
            head_dim: d_model / n_heads,
        })
    }

    /// `[batch, steps, d_model]` in and out
    fn forward(&self, x: &Tensor) -> candle_core::Result<Tensor> {
        let (batch, steps, d_model) = x.dims3()?;
        let heads = |proj: &Linear| -> candle_core::Result<Tensor> {
            proj.forward(x)?
                .reshape((batch, steps, self.n_heads, self.head_dim))?
                .transpose(1, 2)?
                .contiguous()
        };
        let (q, k, v) = (heads(&self.query)?, heads(&self.key)?, heads(&self.value)?);

        let scores = (q.matmul(&k.t()?)? * (1.0 / (self.head_dim as f64).sqrt()))?;
        let weights = candle_nn::ops::softmax(&scores, D::Minus1)?;
        let context = weights
            .matmul(&v)?
            .transpose(1, 2)?
            .contiguous()?
            .reshape((batch, steps, d_model))?;

        let attended = layer_norm(&(x + self.output.forward(&context)?)?)?;
        let hidden = self.ff_in.forward(&attended)?.relu()?;
        layer_norm(&(&attended + self.ff_out.forward(&hidden)?)?)
    }
}

/// Normalise the last axis to zero mean and unit variance
fn layer_norm(x: &Tensor) -> candle_core::Result<Tensor> {
    let mean = x.mean_keepdim(D::Minus1)?;
    let centred = x.broadcast_sub(&mean)?;
    let var = centred.sqr()?.mean_keepdim(D::Minus1)?;
    centred.broadcast_div(&(var + 1e-5)?.sqrt()?)
}

/// Sinusoidal position table, `[steps, d_model]`
fn positional_encoding(steps: usize, d_model: usize) -> candle_core::Result<Tensor> {
    let table: Vec<f32> = (0..steps * d_model)
        .map(|idx| {
            let (pos, i) = (idx / d_model, idx % d_model);
            let rate = 1.0 / 10000f64.powf((2 * (i / 2)) as f64 / d_model as f64);
            let angle = pos as f64 * rate;
            (if i % 2 == 0 { angle.sin() } else { angle.cos() }) as f32
        })
        .collect();
    Tensor::from_vec(table, (steps, d_model), &network::device())
}

#[derive(Debug, Clone)]
struct AttentionNetwork {
    input: Linear,
    positions: Tensor,
    blocks: Vec<EncoderBlock>,
    head: Linear,
}

impl AttentionNetwork {
    fn new(
        window_len: usize,
        n_observations: usize,
        params: &AttentionParams,
        vb: VarBuilder,
    ) -> candle_core::Result<Self> {
        let d_model = params.d_model;
        let blocks = (0..params.num_layers)
            .map(|layer| EncoderBlock::new(d_model, params.n_heads, vb.pp(format!("block{}", layer))))
            .collect::<candle_core::Result<Vec<_>>>()?;
        Ok(Self {
            input: linear(n_observations, d_model, vb.pp("input"))?,
            positions: positional_encoding(window_len, d_model)?,
            blocks,
            head: linear(d_model, 1, vb.pp("head"))?,
        })
    }
}

impl Module for AttentionNetwork {
    /// `[windows, steps, observations]` to `[windows]`
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let mut x = self.input.forward(xs)?.broadcast_add(&self.positions)?;
        for block in &self.blocks {
            x = block.forward(&x)?;
        }
        let steps = x.dim(1)?;
        let last = x.narrow(1, steps.saturating_sub(1), 1)?.squeeze(1)?;
        self.head.forward(&last)?.squeeze(1)
    }
}

#[derive(Debug, Clone)]
struct Fitted {
    network: AttentionNetwork,
    window_len: usize,
    n_observations: usize,
}

#[derive(Debug, Clone)]
pub struct AttentionSequenceModel {
    params: AttentionParams,
    fitted: Option<Fitted>,
}

impl AttentionSequenceModel {
    const NAME: &'static str = "attention_sequence";

    pub fn new(params: AttentionParams) -> Self {
        Self { params, fitted: None }
    }

    pub fn params(&self) -> &AttentionParams {
        &self.params
    }

    pub fn fit(&mut self, windows: ArrayView3<'_, f64>, y: &[f64]) -> Result<FitReport> {
        let (_, window_len, n_observations) = windows.dim();
        let d_model = self.params.d_model;
        let n_heads = self.params.n_heads;
        if d_model == 0 || n_heads == 0 || d_model % n_heads != 0 {
            return Err(ForecastError::config(format!(
                "attention d_model {} must be a positive multiple of n_heads {}",
                d_model, n_heads
            )));
        }
        let fail = network::fit_error(Self::NAME);

        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DTYPE, &network::device());
        let model = AttentionNetwork::new(window_len, n_observations, &self.params, vb).map_err(&fail)?;
        network::seed_parameters(&varmap, self.params.seed).map_err(&fail)?;

        let inputs = network::windows_tensor(windows).map_err(&fail)?;
        let history = network::train(
            Self::NAME,
            &model,
            &varmap,
            &inputs,
            y,
            self.params.epochs,
            self.params.learning_rate,
        )?;

        self.fitted = Some(Fitted {
            network: model,
            window_len,
            n_observations,
        });
        Ok(FitReport {
            iterations: history.len(),
            train_loss: history.last().copied().unwrap_or(f64::NAN),
        })
    }

    pub fn predict(&self, windows: ArrayView3<'_, f64>) -> Result<Vec<f64>> {
        let fitted = self
            .fitted
            .as_ref()
            .ok_or_else(|| ForecastError::config("attention_sequence used before fit"))?;
        let (_, window_len, n_observations) = windows.dim();
        if window_len != fitted.window_len || n_observations != fitted.n_observations {
            return Err(ForecastError::config(format!(
                "attention_sequence fitted on {}x{} windows, got {}x{}",
                fitted.window_len, fitted.n_observations, window_len, n_observations
            )));
        }
        check_finite("attention_sequence inputs", windows.iter())?;

        network::predict(Self::NAME, &fitted.network, windows)
    }
}
