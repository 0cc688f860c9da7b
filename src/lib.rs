//! Stacking Forecast Ensemble
//!
//! Multi-horizon forecasting by blending heterogeneous regressors.
//!
//! ## Architecture
//!
//! ```text
//! FeatureMatrix + SequenceTensor + Target(h)
//!        → Training Coordinator (GBT, Forest, GRU, Attention)
//!        → Dynamic Weights (trailing inverse MAE) → Blender
//!        → Walk-Forward Validator (expanding folds) → metrics table
//!        → Production ensemble per horizon → prediction table
//! ```

pub mod config;
pub mod data;
pub mod ensemble;
pub mod error;
pub mod export;
pub mod learner;
pub mod pipeline;
pub mod types;
pub mod validation;

#[cfg(test)]
mod testing;

#[cfg(test)]
mod config_tests;
