//! Static per-trial behaviors: choice, stimulus, reward and block prior.
//!
//! The behavior export is a `[trial, time_bin, feature]` array.  Choice,
//! stimulus and reward are stored as two-column one-hot pairs repeated over
//! the time bins; the prior is a single column.  Column positions differ
//! between the active-trial and all-trial exports and are named by a
//! [`BehaviorLayout`].
use ndarray::{s, Array1, Array2, ArrayView3, Axis};
use tracing::info;

use crate::error::{PrepError, Result};

/// Feature-axis positions of the static behaviors.  Pairs are given by
/// their first column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BehaviorLayout {
    pub stimulus: usize,
    pub choice: usize,
    pub reward: usize,
    pub prior: usize,
}

impl BehaviorLayout {
    /// Export restricted to active trials.
    pub const ACTIVE_TRIALS: Self = Self { stimulus: 19, choice: 23, reward: 25, prior: 28 };
    /// Export covering every trial.
    pub const ALL_TRIALS: Self = Self { stimulus: 19, choice: 22, reward: 24, prior: 27 };

    pub fn for_trials(keep_active_trials: bool) -> Self {
        if keep_active_trials {
            Self::ACTIVE_TRIALS
        } else {
            Self::ALL_TRIALS
        }
    }

    fn n_features(&self) -> usize {
        [self.stimulus + 2, self.choice + 2, self.reward + 2, self.prior + 1]
            .into_iter()
            .max()
            .unwrap_or(0)
    }
}

/// Fraction of trials on each side of a two-column behavior.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Balance {
    pub first: f64,
    pub second: f64,
}

/// Static behaviors of every trial.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticBehaviors {
    /// `[trial, 2]` summed over time bins.
    pub choices: Array2<f64>,
    /// `[trial, 2]` contrast per side, summed over time bins.
    pub stimuli: Array2<f64>,
    /// `[trial, 2]` (wrong, correct) summed over time bins.
    pub rewards: Array2<f64>,
    /// Block prior per trial, read at the first time bin.
    pub priors: Array1<f64>,
}

impl StaticBehaviors {
    pub fn extract(features: ArrayView3<f64>, layout: &BehaviorLayout) -> Result<Self> {
        let (_, n_bins, n_feat) = features.dim();
        if n_feat < layout.n_features() {
            return Err(PrepError::DataShapeMismatch {
                column: "behavior features",
                expected: layout.n_features(),
                got: n_feat,
            });
        }
        if n_bins == 0 {
            return Err(PrepError::DataShapeMismatch { column: "behavior time bins", expected: 1, got: 0 });
        }
        let pair = |c: usize| features.slice(s![.., .., c..c + 2]).sum_axis(Axis(1));
        Ok(Self {
            choices: pair(layout.choice),
            stimuli: pair(layout.stimulus),
            rewards: pair(layout.reward),
            priors: features.slice(s![.., 0, layout.prior]).to_owned(),
        })
    }

    pub fn n_trials(&self) -> usize {
        self.priors.len()
    }

    /// Signed contrast per trial: `-(l + r)` when the second column holds the
    /// larger contrast, `+(l + r)` otherwise.
    pub fn signed_contrast(&self) -> Vec<f64> {
        self.stimuli
            .rows()
            .into_iter()
            .map(|row| if row[1] > row[0] { -row.sum() } else { row.sum() })
            .collect()
    }

    /// Choice, stimulus and reward balance; logged at `info`.
    pub fn balance(&self) -> (Balance, Balance, Balance) {
        let n = self.n_trials().max(1) as f64;
        let col_frac = |a: &Array2<f64>| {
            let sums = a.sum_axis(Axis(0));
            Balance { first: sums[0] / n, second: sums[1] / n }
        };
        let second_dominant = self.stimuli.rows().into_iter().filter(|r| r[1] > r[0]).count() as f64;
        let choice = col_frac(&self.choices);
        let stimulus = Balance {
            first: second_dominant / n,
            second: (self.n_trials() as f64 - second_dominant) / n,
        };
        let reward = col_frac(&self.rewards);
        info!("choices left: {:.3}, right: {:.3}", choice.first, choice.second);
        info!("stimuli left: {:.3}, right: {:.3}", stimulus.first, stimulus.second);
        info!("reward wrong: {:.3}, correct: {:.3}", reward.first, reward.second);
        (choice, stimulus, reward)
    }
}

/// One-hot encoding of signed contrasts over their sorted distinct values.
#[derive(Debug, Clone, PartialEq)]
pub struct StimulusEncoding {
    categories: Vec<f64>,
}

impl StimulusEncoding {
    pub fn fit(values: &[f64]) -> Self {
        let mut categories = values.to_vec();
        categories.sort_by(f64::total_cmp);
        categories.dedup();
        Self { categories }
    }

    pub fn categories(&self) -> &[f64] {
        &self.categories
    }

    /// `[n, n_categories]` one-hot rows; unseen values encode as all zeros.
    pub fn encode(&self, values: &[f64]) -> Array2<f64> {
        let mut out = Array2::zeros((values.len(), self.categories.len()));
        for (i, v) in values.iter().enumerate() {
            if let Ok(k) = self.categories.binary_search_by(|c| c.total_cmp(v)) {
                out[[i, k]] = 1.0;
            }
        }
        out
    }

    /// Category index → contrast.
    pub fn decode(&self, indices: &[usize]) -> Result<Vec<f64>> {
        indices
            .iter()
            .map(|&k| {
                self.categories.get(k).copied().ok_or(PrepError::InvalidUnitIdentity {
                    id: k as i64,
                    axis_len: self.categories.len(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn export(layout: &BehaviorLayout) -> Array3<f64> {
        // Two trials, three bins.  Trial 0: right contrast 0.25, choice left,
        // correct.  Trial 1: left contrast 1.0, choice right, wrong.
        let mut f = Array3::zeros((2, 3, 30));
        f[[0, 0, layout.stimulus + 1]] = 0.25;
        f[[0, 1, layout.choice]] = 1.0;
        f[[0, 1, layout.reward + 1]] = 1.0;
        f[[1, 0, layout.stimulus]] = 1.0;
        f[[1, 2, layout.choice + 1]] = 1.0;
        f[[1, 2, layout.reward]] = 1.0;
        f[[0, 0, layout.prior]] = 0.8;
        f[[1, 0, layout.prior]] = 0.2;
        f
    }

    #[test]
    fn extract_with_named_layout() {
        for keep_active in [true, false] {
            let layout = BehaviorLayout::for_trials(keep_active);
            let b = StaticBehaviors::extract(export(&layout).view(), &layout).unwrap();
            assert_eq!(b.choices, ndarray::array![[1.0, 0.0], [0.0, 1.0]]);
            assert_eq!(b.rewards, ndarray::array![[0.0, 1.0], [1.0, 0.0]]);
            assert_eq!(b.priors.to_vec(), vec![0.8, 0.2]);
            assert_eq!(b.signed_contrast(), vec![-0.25, 1.0]);
        }
    }

    #[test]
    fn too_few_feature_columns() {
        let f = Array3::<f64>::zeros((2, 3, 20));
        assert!(StaticBehaviors::extract(f.view(), &BehaviorLayout::ACTIVE_TRIALS).is_err());
    }

    #[test]
    fn balance_fractions() {
        let layout = BehaviorLayout::ACTIVE_TRIALS;
        let b = StaticBehaviors::extract(export(&layout).view(), &layout).unwrap();
        let (choice, stimulus, reward) = b.balance();
        assert_eq!(choice, Balance { first: 0.5, second: 0.5 });
        assert_eq!(stimulus, Balance { first: 0.5, second: 0.5 });
        assert_eq!(reward, Balance { first: 0.5, second: 0.5 });
    }

    #[test]
    fn stimulus_encoding_round_trip() {
        let enc = StimulusEncoding::fit(&[0.25, -1.0, 0.25, 0.0]);
        assert_eq!(enc.categories(), &[-1.0, 0.0, 0.25]);
        let one_hot = enc.encode(&[0.0, 0.5]);
        assert_eq!(one_hot, ndarray::array![[0.0, 1.0, 0.0], [0.0, 0.0, 0.0]]);
        assert_eq!(enc.decode(&[2, 0]).unwrap(), vec![0.25, -1.0]);
        assert!(enc.decode(&[3]).is_err());
    }
}
