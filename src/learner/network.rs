//! Tensor plumbing shared by the sequence learners
//!
//! Both sequence networks are candle modules whose parameters live in a
//! [`VarMap`]. Parameters are drawn from a seeded ChaCha stream, then every
//! one of them trains with full-batch Adam on MSE for a fixed number of epochs.

use crate::error::{ForecastError, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::{AdamW, Module, Optimizer, ParamsAdamW, VarMap};
use ndarray::ArrayView3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::Uniform;

pub(crate) const DTYPE: DType = DType::F32;

pub(crate) fn device() -> Device {
    Device::Cpu
}

/// Map a tensor failure to a fit error of `learner`
pub(crate) fn fit_error(learner: &'static str) -> impl Fn(candle_core::Error) -> ForecastError {
    move |e| ForecastError::model_fit(learner, e.to_string())
}

/// `[windows, steps, observations]` tensor
pub(crate) fn windows_tensor(windows: ArrayView3<'_, f64>) -> candle_core::Result<Tensor> {
    let values: Vec<f32> = windows.iter().map(|v| *v as f32).collect();
    Tensor::from_vec(values, windows.dim(), &device())
}

/// Overwrite every parameter with seeded draws from `U(-1/sqrt(fan_in), 1/sqrt(fan_in))`
///
/// Parameters are visited in name order so the same seed always yields the
/// same network.
pub(crate) fn seed_parameters(varmap: &VarMap, seed: u64) -> candle_core::Result<()> {
    let vars = varmap
        .data()
        .lock()
        .map_err(|_| candle_core::Error::Msg("parameter map lock poisoned".to_string()))?;
    let mut names: Vec<&String> = vars.keys().collect();
    names.sort();

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    for name in names {
        let var = &vars[name];
        let fan_in = var.dims().last().copied().unwrap_or(1).max(1);
        let limit = 1.0 / (fan_in as f64).sqrt();
        let dist = Uniform::new_inclusive(-limit, limit);
        let values: Vec<f32> = (0..var.elem_count()).map(|_| rng.sample(dist) as f32).collect();
        var.set(&Tensor::from_vec(values, var.dims(), var.device())?)?;
    }
    Ok(())
}

/// Full-batch Adam on MSE; returns the loss seen before each update
pub(crate) fn train<M: Module>(
    learner: &'static str,
    model: &M,
    varmap: &VarMap,
    windows: &Tensor,
    targets: &[f64],
    epochs: usize,
    learning_rate: f64,
) -> Result<Vec<f64>> {
    let fail = fit_error(learner);
    let y: Vec<f32> = targets.iter().map(|v| *v as f32).collect();
    let y = Tensor::from_vec(y, targets.len(), &device()).map_err(&fail)?;

    let params = ParamsAdamW {
        lr: learning_rate,
        weight_decay: 0.0,
        ..Default::default()
    };
    let mut optimizer = AdamW::new(varmap.all_vars(), params).map_err(&fail)?;
    let mut history = Vec::with_capacity(epochs);

    for epoch in 0..epochs {
        let predictions = model.forward(windows).map_err(&fail)?;
        let loss = candle_nn::loss::mse(&predictions, &y).map_err(&fail)?;
        let value = f64::from(loss.to_scalar::<f32>().map_err(&fail)?);
        if !value.is_finite() {
            return Err(ForecastError::model_fit(
                learner,
                format!("loss is {} at epoch {}", value, epoch),
            ));
        }
        history.push(value);
        optimizer.backward_step(&loss).map_err(&fail)?;
    }

    tracing::debug!(
        "{} trained {} epochs, loss {:?} -> {:?}",
        learner,
        history.len(),
        history.first(),
        history.last()
    );
    Ok(history)
}

/// One prediction per window
pub(crate) fn predict<M: Module>(learner: &'static str, model: &M, windows: ArrayView3<'_, f64>) -> Result<Vec<f64>> {
    let fail = fit_error(learner);
    let x = windows_tensor(windows).map_err(&fail)?;
    let out = model.forward(&x).and_then(|t| t.to_vec1::<f32>()).map_err(&fail)?;
    Ok(out.into_iter().map(f64::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_nn::{linear, Linear, VarBuilder};
    use ndarray::Array3;

    /// Mean over steps, then a linear head
    struct PooledLinear(Linear);

    impl Module for PooledLinear {
        fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
            self.0.forward(&xs.mean(1)?)?.squeeze(1)
        }
    }

    fn pooled(seed: u64) -> (VarMap, PooledLinear) {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DTYPE, &device());
        let model = PooledLinear(linear(3, 1, vb.pp("head")).unwrap());
        seed_parameters(&varmap, seed).unwrap();
        (varmap, model)
    }

    fn flat(varmap: &VarMap) -> Vec<f32> {
        let vars = varmap.data().lock().unwrap();
        let mut names: Vec<&String> = vars.keys().collect();
        names.sort();
        names
            .into_iter()
            .flat_map(|n| vars[n].flatten_all().unwrap().to_vec1::<f32>().unwrap())
            .collect()
    }

    #[test]
    fn test_seeded_parameters_repeat() {
        let (a, _) = pooled(7);
        let (b, _) = pooled(7);
        let (c, _) = pooled(8);

        assert_eq!(flat(&a), flat(&b));
        assert_ne!(flat(&a), flat(&c));
    }

    #[test]
    fn test_training_reduces_loss() {
        let x = Array3::from_shape_fn((40, 4, 3), |(i, t, j)| ((i * 3 + t + j) as f64 * 0.37).sin());
        let y: Vec<f64> = (0..40).map(|i| 0.8 * x[[i, 0, 0]] - 0.3 * x[[i, 3, 2]] + 0.1).collect();
        let (varmap, model) = pooled(11);

        let windows = windows_tensor(x.view()).unwrap();
        let history = train("test", &model, &varmap, &windows, &y, 200, 0.01).unwrap();

        assert_eq!(history.len(), 200);
        assert!(history[199] < history[0]);
        assert_eq!(predict("test", &model, x.view()).unwrap().len(), 40);
    }

    #[test]
    fn test_non_finite_loss_is_fit_error() {
        let x = Array3::from_elem((4, 2, 3), f64::NAN);
        let (varmap, model) = pooled(1);

        let windows = windows_tensor(x.view()).unwrap();
        let err = train("gru", &model, &varmap, &windows, &[0.0; 4], 3, 0.001).unwrap_err();
        assert!(matches!(err, ForecastError::ModelFit { .. }));
    }
}
