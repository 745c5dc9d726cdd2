//! Gradient descent on three parameters with gradients from finite differences.
//!
//! The costs of the planner come out of a rasterization pass, so they have no
//! analytic gradient and are piecewise constant wherever the visible set jumps.
//! Central differences estimate the gradient and a halving line search only
//! accepts steps that lower the cost, which keeps every call monotonic.

use serde::{Deserialize, Serialize};

use crate::error::PlannerError;

/// Settings of one bounded descent run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerSettings {
    /// Initial step length along the negative gradient.
    pub step_size: f64,
    /// The run has converged when the gradient norm falls below this value.
    pub err_tol: f64,
    /// Maximum number of descent steps per call.
    pub iter_max: usize,
    /// Offset used by the central differences.
    pub fd_step: f64,
    /// How many times a rejected step is halved before giving up.
    pub max_backtracks: usize,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            step_size: 0.1,
            err_tol: 1e-3,
            iter_max: 1,
            fd_step: 1e-3,
            max_backtracks: 8,
        }
    }
}

impl OptimizerSettings {
    /// Check that every value is in range.
    pub fn validate(&self) -> Result<(), PlannerError> {
        let positive = |x: f64| x.is_finite() && x > 0.0;
        if !positive(self.step_size) || !positive(self.fd_step) {
            return Err(PlannerError::InvalidConfig(format!(
                "step_size and fd_step must be positive, got {} and {}",
                self.step_size, self.fd_step
            )));
        }
        if !self.err_tol.is_finite() || self.err_tol < 0.0 {
            return Err(PlannerError::InvalidConfig(format!(
                "err_tol must be non-negative, got {}",
                self.err_tol
            )));
        }
        if self.iter_max == 0 {
            return Err(PlannerError::InvalidConfig(
                "iter_max must be at least one".to_string(),
            ));
        }
        Ok(())
    }
}

/// Reason why a descent run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// The gradient norm fell below the tolerance.
    GradientConverged,
    /// The iteration cap was reached first; call again to continue.
    MaxIterations,
    /// No step along the negative gradient lowered the cost.
    StepRejected,
}

/// Outcome of a bounded descent run.
#[derive(Debug, Clone, PartialEq)]
pub struct DescentResult {
    /// The refined parameters.
    pub params: [f64; 3],
    /// The cost at `params`.
    pub cost: f64,
    /// The norm of the last estimated gradient.
    pub gradient_norm: f64,
    /// Number of accepted or attempted steps in this run.
    pub iterations: usize,
    /// Why the run stopped.
    pub termination_reason: TerminationReason,
}

impl DescentResult {
    /// Whether the tolerance was met.
    pub fn converged(&self) -> bool {
        self.termination_reason == TerminationReason::GradientConverged
    }
}

/// A resumable gradient descent over three parameters.
///
/// Every call to [`PoseOptimizer::step`] starts from the parameters given by the
/// caller and runs at most `iter_max` steps, so the optimizer can be driven one
/// step at a time by an interactive loop.
#[derive(Debug, Clone, Default)]
pub struct PoseOptimizer {
    settings: OptimizerSettings,
    total_iterations: usize,
    last_result: Option<DescentResult>,
}

impl PoseOptimizer {
    /// Create an optimizer with the given settings.
    pub fn new(settings: OptimizerSettings) -> Self {
        Self {
            settings,
            total_iterations: 0,
            last_result: None,
        }
    }

    /// The settings of every run.
    pub fn settings(&self) -> &OptimizerSettings {
        &self.settings
    }

    /// Number of steps taken over all calls since the last reset.
    pub fn total_iterations(&self) -> usize {
        self.total_iterations
    }

    /// The result of the previous call.
    pub fn last_result(&self) -> Option<&DescentResult> {
        self.last_result.as_ref()
    }

    /// Forget the progress of previous calls.
    pub fn reset(&mut self) {
        self.total_iterations = 0;
        self.last_result = None;
    }

    /// Run at most `iter_max` descent steps starting at `initial`.
    ///
    /// # Arguments
    ///
    /// * `initial` - The parameters to start from.
    /// * `cost` - The function to minimize. Errors abort the run. Non-finite values
    ///   mark parameters without a usable cost: gradients fall back to one-sided
    ///   differences next to them and steps landing on them are rejected.
    ///
    /// # Returns
    ///
    /// The refined parameters. Reaching the iteration cap is not an error; the
    /// result then reports [`TerminationReason::MaxIterations`].
    pub fn step<F, E>(&mut self, initial: [f64; 3], mut cost: F) -> Result<DescentResult, E>
    where
        F: FnMut(&[f64; 3]) -> Result<f64, E>,
    {
        let settings = self.settings;
        let mut params = initial;
        let mut value = cost(&params)?;
        let mut gradient_norm = f64::INFINITY;
        let mut iterations = 0;
        let mut termination_reason = TerminationReason::MaxIterations;

        // there is no descent signal from a start without a finite cost
        let max_iterations = if value.is_finite() {
            settings.iter_max
        } else {
            termination_reason = TerminationReason::StepRejected;
            0
        };

        for _ in 0..max_iterations {
            let gradient = central_difference(&params, value, settings.fd_step, &mut cost)?;
            gradient_norm = norm(&gradient);
            log::debug!(
                "Iteration {}: cost {value:.6}, gradient norm {gradient_norm:.6}",
                self.total_iterations + iterations
            );

            if gradient_norm < settings.err_tol {
                termination_reason = TerminationReason::GradientConverged;
                break;
            }

            iterations += 1;
            match line_search(&params, value, &gradient, &settings, &mut cost)? {
                Some((next, next_value)) => {
                    params = next;
                    value = next_value;
                }
                None => {
                    termination_reason = TerminationReason::StepRejected;
                    break;
                }
            }
        }

        self.total_iterations += iterations;
        let result = DescentResult {
            params,
            cost: value,
            gradient_norm,
            iterations,
            termination_reason,
        };
        self.last_result = Some(result.clone());
        Ok(result)
    }
}

fn norm(v: &[f64; 3]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

// Falls back to a one-sided difference when a probe has no finite cost.
fn central_difference<F, E>(
    params: &[f64; 3],
    value: f64,
    h: f64,
    cost: &mut F,
) -> Result<[f64; 3], E>
where
    F: FnMut(&[f64; 3]) -> Result<f64, E>,
{
    let mut gradient = [0.0; 3];
    for (i, g) in gradient.iter_mut().enumerate() {
        let mut forward = *params;
        forward[i] += h;
        let mut backward = *params;
        backward[i] -= h;

        let f_plus = cost(&forward)?;
        let f_minus = cost(&backward)?;
        *g = match (f_plus.is_finite(), f_minus.is_finite()) {
            (true, true) => (f_plus - f_minus) / (2.0 * h),
            (true, false) => (f_plus - value) / h,
            (false, true) => (value - f_minus) / h,
            (false, false) => 0.0,
        };
    }
    Ok(gradient)
}

fn line_search<F, E>(
    params: &[f64; 3],
    value: f64,
    gradient: &[f64; 3],
    settings: &OptimizerSettings,
    cost: &mut F,
) -> Result<Option<([f64; 3], f64)>, E>
where
    F: FnMut(&[f64; 3]) -> Result<f64, E>,
{
    let mut step = settings.step_size;
    for _ in 0..=settings.max_backtracks {
        let candidate = [
            params[0] - step * gradient[0],
            params[1] - step * gradient[1],
            params[2] - step * gradient[2],
        ];
        let candidate_value = cost(&candidate)?;
        if candidate_value < value {
            return Ok(Some((candidate, candidate_value)));
        }
        step *= 0.5;
    }
    Ok(None)
}
