//! Bound-constrained quasi-Newton minimization.
//!
//! Minimizes an [`Objective`] subject to `x ≥ 0` with a projected limited-memory
//! BFGS method:
//!
//! 1. Variables sitting on the bound whose gradient pushes them further out are
//!    *fixed* for the iteration; the rest are *free*.
//! 2. The search direction is the two-loop L-BFGS direction restricted to the
//!    free variables. If it is not a descent direction the curvature history is
//!    dropped and projected steepest descent is used instead.
//! 3. A backtracking line search along the projected path `P(x + t·d)` accepts the
//!    first step satisfying the Armijo condition.
//! 4. Curvature pairs are kept only when `sᵀy` is positive.
//!
//! The run stops when the projected gradient vanishes, when the relative reduction
//! of the objective becomes negligible, when the iteration ceiling is reached, or
//! when the line search cannot make progress. The last two are reported as not
//! converged, but the best point found is returned either way.

use std::collections::VecDeque;

use crate::objective::Objective;

pub const DEFAULT_MAX_ITERATIONS: usize = 50_000;
pub const DEFAULT_HISTORY: usize = 10;
pub const DEFAULT_GRADIENT_TOLERANCE: f64 = 1e-5;
/// Relative reduction tolerance, `1e7` machine epsilons.
pub const DEFAULT_REDUCTION_TOLERANCE: f64 = 1e7 * f64::EPSILON;

const ARMIJO: f64 = 1e-4;
const MAX_LINE_SEARCH_STEPS: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverOptions {
    /// Iteration ceiling; the only cancellation control of a run.
    pub max_iterations: usize,
    /// Number of curvature pairs kept.
    pub history: usize,
    /// Stop once the infinity norm of the projected gradient is at most this.
    pub gradient_tolerance: f64,
    /// Stop once `(f_old - f_new) / max(|f_old|, |f_new|, 1)` is at most this.
    pub reduction_tolerance: f64,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            history: DEFAULT_HISTORY,
            gradient_tolerance: DEFAULT_GRADIENT_TOLERANCE,
            reduction_tolerance: DEFAULT_REDUCTION_TOLERANCE,
        }
    }
}

/// Why a minimization run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum Termination {
    #[display("projected gradient below tolerance")]
    ProjectedGradient,
    #[display("relative reduction of the objective below tolerance")]
    RelativeReduction,
    #[display("iteration limit reached")]
    MaxIterations,
    #[display("line search could not decrease the objective")]
    LineSearchFailed,
}

impl Termination {
    #[must_use]
    pub fn is_converged(self) -> bool {
        matches!(self, Self::ProjectedGradient | Self::RelativeReduction)
    }
}

/// Result of a minimization run.
#[derive(Debug, Clone)]
pub struct Minimization {
    /// Best point found; every entry is non-negative.
    pub x: Vec<f64>,
    /// Objective value at `x`.
    pub value: f64,
    pub iterations: usize,
    pub evaluations: usize,
    pub termination: Termination,
}

#[derive(Debug)]
struct Correction {
    s: Vec<f64>,
    y: Vec<f64>,
    rho: f64,
}

/// Minimizes `objective` over the non-negative orthant, starting from `x0`.
///
/// `x0` is projected onto the feasible set first.
///
/// # Example
///
/// ```
/// use buildcost_fit::{
///     objective::Objective,
///     solver::{SolverOptions, minimize_nonnegative},
/// };
///
/// // (x0 - 3)² + (x1 + 2)²: the constrained minimum is (3, 0).
/// struct Bowl;
/// impl Objective for Bowl {
///     fn dimension(&self) -> usize {
///         2
///     }
///     fn value_and_gradient(&self, x: &[f64], g: &mut [f64]) -> f64 {
///         g[0] = 2.0 * (x[0] - 3.0);
///         g[1] = 2.0 * (x[1] + 2.0);
///         (x[0] - 3.0).powi(2) + (x[1] + 2.0).powi(2)
///     }
/// }
///
/// let result = minimize_nonnegative(&Bowl, vec![10.0, 10.0], &SolverOptions::default());
/// assert!(result.termination.is_converged());
/// assert!((result.x[0] - 3.0).abs() < 1e-4);
/// assert_eq!(result.x[1], 0.0);
/// ```
pub fn minimize_nonnegative<O>(objective: &O, x0: Vec<f64>, options: &SolverOptions) -> Minimization
where
    O: Objective + ?Sized,
{
    let n = objective.dimension();
    assert_eq!(x0.len(), n, "initial point has the wrong dimension");

    let mut x = x0;
    project(&mut x);
    let mut g = vec![0.0; n];
    let mut f = objective.value_and_gradient(&x, &mut g);
    let mut evaluations = 1;
    let mut history = VecDeque::with_capacity(options.history);

    let mut x_trial = vec![0.0; n];
    let mut g_trial = vec![0.0; n];

    for iteration in 0..options.max_iterations {
        if projected_gradient_norm(&x, &g) <= options.gradient_tolerance {
            return finish(x, f, iteration, evaluations, Termination::ProjectedGradient);
        }

        let free = free_mask(&x, &g);
        let mut accepted = None;
        for steepest in [history.is_empty(), true] {
            if steepest {
                history.clear();
            }
            let direction = if steepest {
                masked(&g, &free).into_iter().map(|v| -v).collect()
            } else {
                lbfgs_direction(&g, &history, &free)
            };
            if dot(&direction, &g) >= 0.0 {
                continue;
            }

            let mut step = if history.is_empty() {
                (1.0 / norm_inf(&direction)).min(1.0)
            } else {
                1.0
            };
            for _ in 0..MAX_LINE_SEARCH_STEPS {
                for ((t, xi), di) in x_trial.iter_mut().zip(&x).zip(&direction) {
                    *t = xi + step * di;
                }
                project(&mut x_trial);
                let decrease = g
                    .iter()
                    .zip(&x_trial)
                    .zip(&x)
                    .map(|((gi, ti), xi)| gi * (ti - xi))
                    .sum::<f64>();
                if decrease < 0.0 {
                    let f_trial = objective.value_and_gradient(&x_trial, &mut g_trial);
                    evaluations += 1;
                    if f_trial <= f + ARMIJO * decrease {
                        accepted = Some(f_trial);
                        break;
                    }
                }
                step *= 0.5;
            }
            if accepted.is_some() || steepest {
                break;
            }
        }

        let Some(f_trial) = accepted else {
            return finish(x, f, iteration, evaluations, Termination::LineSearchFailed);
        };

        let s = sub(&x_trial, &x);
        let y = sub(&g_trial, &g);
        let sy = dot(&s, &y);
        if sy > f64::EPSILON * dot(&y, &y) {
            if history.len() == options.history {
                history.pop_front();
            }
            if options.history > 0 {
                history.push_back(Correction { s, y, rho: 1.0 / sy });
            }
        }

        let reduction = (f - f_trial) / f.abs().max(f_trial.abs()).max(1.0);
        std::mem::swap(&mut x, &mut x_trial);
        std::mem::swap(&mut g, &mut g_trial);
        f = f_trial;

        if reduction <= options.reduction_tolerance {
            return finish(x, f, iteration + 1, evaluations, Termination::RelativeReduction);
        }
    }

    finish(
        x,
        f,
        options.max_iterations,
        evaluations,
        Termination::MaxIterations,
    )
}

fn finish(
    x: Vec<f64>,
    value: f64,
    iterations: usize,
    evaluations: usize,
    termination: Termination,
) -> Minimization {
    Minimization {
        x,
        value,
        iterations,
        evaluations,
        termination,
    }
}

/// Clamps every entry to the feasible set; `-0.0` and NaN become `0.0`.
fn project(x: &mut [f64]) {
    for v in x {
        if v.is_nan() || *v <= 0.0 {
            *v = 0.0;
        }
    }
}

/// Infinity norm of `P(x - g) - x`.
fn projected_gradient_norm(x: &[f64], g: &[f64]) -> f64 {
    x.iter()
        .zip(g)
        .map(|(xi, gi)| ((xi - gi).max(0.0) - xi).abs())
        .fold(0.0, f64::max)
}

fn free_mask(x: &[f64], g: &[f64]) -> Vec<bool> {
    x.iter()
        .zip(g)
        .map(|(xi, gi)| *xi > 0.0 || *gi <= 0.0)
        .collect()
}

fn masked(v: &[f64], free: &[bool]) -> Vec<f64> {
    v.iter()
        .zip(free)
        .map(|(vi, f)| if *f { *vi } else { 0.0 })
        .collect()
}

/// Two-loop recursion for `-H·g`, restricted to the free variables.
fn lbfgs_direction(g: &[f64], history: &VecDeque<Correction>, free: &[bool]) -> Vec<f64> {
    let mut q = masked(g, free);
    let mut alphas = Vec::with_capacity(history.len());
    for c in history.iter().rev() {
        let alpha = c.rho * masked_dot(&c.s, &q, free);
        axpy(-alpha, &c.y, &mut q, free);
        alphas.push(alpha);
    }

    if let Some(last) = history.back() {
        let gamma = dot(&last.s, &last.y) / dot(&last.y, &last.y);
        for v in &mut q {
            *v *= gamma;
        }
    }

    for (c, alpha) in history.iter().zip(alphas.iter().rev()) {
        let beta = c.rho * masked_dot(&c.y, &q, free);
        axpy(alpha - beta, &c.s, &mut q, free);
    }

    q.iter_mut().for_each(|v| *v = -*v);
    q
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn masked_dot(a: &[f64], b: &[f64], free: &[bool]) -> f64 {
    a.iter()
        .zip(b)
        .zip(free)
        .filter(|(_, f)| **f)
        .map(|((x, y), _)| x * y)
        .sum()
}

/// `y += a·x` on the free variables.
fn axpy(a: f64, x: &[f64], y: &mut [f64], free: &[bool]) {
    for ((yi, xi), f) in y.iter_mut().zip(x).zip(free) {
        if *f {
            *yi += a * xi;
        }
    }
}

fn sub(a: &[f64], b: &[f64]) -> Vec<f64> {
    a.iter().zip(b).map(|(x, y)| x - y).collect()
}

fn norm_inf(v: &[f64]) -> f64 {
    v.iter().map(|x| x.abs()).fold(0.0, f64::max)
}
