//! GRU sequence regressor
//!
//! A stacked GRU runs over each observation window and the last hidden state
//! of the top layer feeds a linear head. Every parameter starts from the
//! configured seed and trains for a fixed number of epochs.

use super::network::{self, DTYPE};
use super::{check_finite, FitReport};
use crate::error::{ForecastError, Result};
use candle_core::Tensor;
use candle_nn::rnn::{gru, GRUConfig, GRU, RNN};
use candle_nn::{linear, Linear, Module, VarBuilder, VarMap};
use ndarray::ArrayView3;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecurrentParams {
    pub hidden_size: usize,
    pub num_layers: usize,
    pub epochs: usize,
    pub learning_rate: f64,
    pub seed: u64,
}

impl Default for RecurrentParams {
    fn default() -> Self {
        Self {
            hidden_size: 64,
            num_layers: 2,
            epochs: 30,
            learning_rate: 0.001,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone)]
struct GruNetwork {
    layers: Vec<GRU>,
    head: Linear,
}

impl GruNetwork {
    fn new(n_observations: usize, params: &RecurrentParams, vb: VarBuilder) -> candle_core::Result<Self> {
        let hidden = params.hidden_size;
        let layers = (0..params.num_layers)
            .map(|layer| {
                let input = if layer == 0 { n_observations } else { hidden };
                gru(input, hidden, GRUConfig::default(), vb.pp(format!("gru{}", layer)))
            })
            .collect::<candle_core::Result<Vec<_>>>()?;
        let head = linear(hidden, 1, vb.pp("head"))?;
        Ok(Self { layers, head })
    }
}

impl Module for GruNetwork {
    /// `[windows, steps, observations]` to `[windows]`
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let mut input = xs.clone();
        let mut last = None;
        for layer in &self.layers {
            let states = layer.seq(&input)?;
            last = states.last().map(|s| s.h().clone());
            input = layer.states_to_tensor(&states)?;
        }
        let last = last.ok_or_else(|| candle_core::Error::Msg("GRU ran over an empty window".to_string()))?;
        self.head.forward(&last)?.squeeze(1)
    }
}

#[derive(Debug, Clone)]
struct Fitted {
    network: GruNetwork,
    window_len: usize,
    n_observations: usize,
}

#[derive(Debug, Clone)]
pub struct RecurrentSequenceModel {
    params: RecurrentParams,
    fitted: Option<Fitted>,
}

impl RecurrentSequenceModel {
    const NAME: &'static str = "recurrent_sequence";

    pub fn new(params: RecurrentParams) -> Self {
        Self { params, fitted: None }
    }

    pub fn params(&self) -> &RecurrentParams {
        &self.params
    }

    pub fn fit(&mut self, windows: ArrayView3<'_, f64>, y: &[f64]) -> Result<FitReport> {
        let (_, window_len, n_observations) = windows.dim();
        if self.params.hidden_size == 0 || self.params.num_layers == 0 {
            return Err(ForecastError::config(format!(
                "recurrent_sequence needs a positive hidden size and layer count, got {} and {}",
                self.params.hidden_size, self.params.num_layers
            )));
        }
        let fail = network::fit_error(Self::NAME);

        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DTYPE, &network::device());
        let model = GruNetwork::new(n_observations, &self.params, vb).map_err(&fail)?;
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
            .ok_or_else(|| ForecastError::config("recurrent_sequence used before fit"))?;
        let (_, window_len, n_observations) = windows.dim();
        if window_len != fitted.window_len || n_observations != fitted.n_observations {
            return Err(ForecastError::config(format!(
                "recurrent_sequence fitted on {}x{} windows, got {}x{}",
                fitted.window_len, fitted.n_observations, window_len, n_observations
            )));
        }
        check_finite("recurrent_sequence inputs", windows.iter())?;

        network::predict(Self::NAME, &fitted.network, windows)
    }
}
