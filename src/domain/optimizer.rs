//! Brute-force parameter search.
//!
//! Every combination of a [`ParamGrid`] is built through the strategy registry,
//! backtested, and scored. Combinations that trade too rarely are discarded
//! before scoring. The caller's checkpoint runs after each combination and can
//! cancel the search, keeping the results gathered so far.

use serde::Serialize;
use std::ops::ControlFlow;
use tracing::{debug, info};

use crate::domain::backtest::{run_backtest_with_context, BacktestConfig, BacktestResult};
use crate::domain::candle::Candle;
use crate::domain::error::StratbenchError;
use crate::domain::strategy::{MarketContext, ParamValue, StrategyParams, StrategyRegistry};

/// Ordered parameter axes. Iteration varies the last axis fastest.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamGrid {
    axes: Vec<(String, Vec<ParamValue>)>,
}

impl ParamGrid {
    pub fn new() -> Self {
        ParamGrid::default()
    }

    pub fn axis<V: Into<ParamValue>>(mut self, key: &str, values: impl IntoIterator<Item = V>) -> Self {
        self.axes
            .push((key.to_string(), values.into_iter().map(Into::into).collect()));
        self
    }

    pub fn axes(&self) -> &[(String, Vec<ParamValue>)] {
        &self.axes
    }

    /// Number of combinations; 0 when the grid or any axis is empty.
    pub fn len(&self) -> usize {
        if self.axes.is_empty() {
            return 0;
        }
        self.axes.iter().map(|(_, values)| values.len()).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn combinations(&self) -> Combinations<'_> {
        Combinations {
            grid: self,
            odometer: vec![0; self.axes.len()],
            remaining: self.len(),
        }
    }
}

pub struct Combinations<'a> {
    grid: &'a ParamGrid,
    odometer: Vec<usize>,
    remaining: usize,
}

impl Iterator for Combinations<'_> {
    type Item = StrategyParams;

    fn next(&mut self) -> Option<StrategyParams> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let mut params = StrategyParams::new();
        for ((key, values), &i) in self.grid.axes.iter().zip(&self.odometer) {
            params.set(key, values[i].clone());
        }

        for (slot, (_, values)) in self.odometer.iter_mut().zip(&self.grid.axes).rev() {
            *slot += 1;
            if *slot < values.len() {
                break;
            }
            *slot = 0;
        }
        Some(params)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Combinations<'_> {}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerConfig {
    pub backtest: BacktestConfig,
    /// Results with fewer trades than this are dropped as insignificant.
    pub min_trades: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig {
            backtest: BacktestConfig::default(),
            min_trades: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizationResult {
    pub params: StrategyParams,
    pub result: BacktestResult,
    pub score: f64,
}

/// Reported to the checkpoint after each combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    pub kept: usize,
}

/// `10 × ROI% + 0.25 × win rate + 2 × ln(trades)`.
pub fn score(result: &BacktestResult) -> f64 {
    let trades = result.total_trades.max(1) as f64;
    10.0 * result.roi_pct() + 0.25 * result.win_rate + 2.0 * trades.ln()
}

pub struct Optimizer {
    strategy: String,
    grid: ParamGrid,
    config: OptimizerConfig,
    registry: StrategyRegistry,
}

impl Optimizer {
    pub fn new(strategy: &str, grid: ParamGrid) -> Self {
        Optimizer {
            strategy: strategy.to_string(),
            grid,
            config: OptimizerConfig::default(),
            registry: StrategyRegistry::builtin(),
        }
    }

    pub fn with_config(mut self, config: OptimizerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn grid(&self) -> &ParamGrid {
        &self.grid
    }

    /// Search the grid, best score first. `base` params sit under every combination.
    pub fn run<F>(
        &self,
        candles: &[Candle],
        context: &MarketContext<'_>,
        base: &StrategyParams,
        mut checkpoint: F,
    ) -> Result<Vec<OptimizationResult>, StratbenchError>
    where
        F: FnMut(Progress) -> ControlFlow<()>,
    {
        let entry = self
            .registry
            .get(&self.strategy)
            .ok_or_else(|| StratbenchError::UnknownStrategy {
                name: self.strategy.clone(),
            })?;

        let total = self.grid.len();
        info!(strategy = %self.strategy, combinations = total, candles = candles.len(), "optimizer started");

        let mut results = Vec::new();
        for (completed, combination) in self.grid.combinations().enumerate() {
            let params = base.merged(&combination);
            let strategy = entry.build(&params);
            let result = run_backtest_with_context(strategy.as_ref(), candles, context, &self.config.backtest);

            if result.total_trades >= self.config.min_trades {
                let score = score(&result);
                debug!(%params, trades = result.total_trades, score, "combination kept");
                results.push(OptimizationResult { params, result, score });
            } else {
                debug!(%params, trades = result.total_trades, "combination below min_trades");
            }

            let progress = Progress {
                completed: completed + 1,
                total,
                kept: results.len(),
            };
            if checkpoint(progress).is_break() {
                info!(completed = progress.completed, total, "optimizer cancelled");
                break;
            }
        }

        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        info!(
            strategy = %self.strategy,
            kept = results.len(),
            best = results.first().map(|r| r.score),
            "optimizer finished"
        );
        Ok(results)
    }
}

/// Default RSI/MFI grid: RSI period × oversold × overbought × soft exit.
pub fn default_rsi_mfi_grid() -> ParamGrid {
    ParamGrid::new()
        .axis("rsi_period", [7usize, 14, 21])
        .axis("oversold", [20.0, 25.0, 30.0, 35.0])
        .axis("overbought", [65.0, 70.0, 75.0, 80.0])
        .axis("soft_exit", [true, false])
}

/// Search the default RSI/MFI grid, yielding the thread between combinations.
pub fn optimize_strategy(candles: &[Candle]) -> Vec<OptimizationResult> {
    let optimizer = Optimizer::new("rsi_mfi", default_rsi_mfi_grid());
    optimizer
        .run(candles, &MarketContext::new(), &StrategyParams::new(), |_| {
            std::thread::yield_now();
            ControlFlow::Continue(())
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::strategy::testing::wave;

    #[test]
    fn grid_iterates_cartesian_product() {
        let grid = ParamGrid::new()
            .axis("a", [1.0, 2.0])
            .axis("b", [true, false])
            .axis("c", ["x", "y", "z"]);
        assert_eq!(grid.len(), 12);

        let all: Vec<StrategyParams> = grid.combinations().collect();
        assert_eq!(all.len(), 12);
        assert_eq!(all[0].number("a", 0.0), 1.0);
        assert!(all[0].flag("b", false));
        assert_eq!(all[0].text("c", ""), "x");
        assert_eq!(all[1].text("c", ""), "y");
        assert_eq!(all[3].text("c", ""), "x");
        assert!(!all[3].flag("b", true));
        assert_eq!(all[11].number("a", 0.0), 2.0);

        let mut rendered: Vec<String> = all.iter().map(|p| p.to_string()).collect();
        rendered.sort();
        rendered.dedup();
        assert_eq!(rendered.len(), 12);
    }

    #[test]
    fn empty_axis_means_no_combinations() {
        let grid = ParamGrid::new().axis("a", [1.0]).axis::<f64>("b", []);
        assert!(grid.is_empty());
        assert_eq!(grid.combinations().count(), 0);
        assert_eq!(ParamGrid::new().combinations().count(), 0);
    }

    #[test]
    fn default_grid_has_96_combinations() {
        assert_eq!(default_rsi_mfi_grid().len(), 96);
    }

    #[test]
    fn score_formula() {
        let result = BacktestResult {
            total_trades: 4,
            win_rate: 50.0,
            pnl: 100.0,
            trades: Vec::new(),
            initial_balance: 10_000.0,
            final_balance: 10_100.0,
        };
        let expected = 10.0 * 1.0 + 0.25 * 50.0 + 2.0 * 4f64.ln();
        assert!((score(&result) - expected).abs() < 1e-9);
    }

    #[test]
    fn results_respect_min_trades_and_order() {
        let candles = wave(600);
        let optimizer = Optimizer::new("rsi_mfi", default_rsi_mfi_grid());
        let results = optimizer
            .run(&candles, &MarketContext::new(), &StrategyParams::new(), |_| {
                ControlFlow::Continue(())
            })
            .unwrap();
        for r in &results {
            assert!(r.result.total_trades >= 3);
        }
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn checkpoint_can_cancel() {
        let candles = wave(120);
        let optimizer = Optimizer::new("rsi_mfi", default_rsi_mfi_grid()).with_config(OptimizerConfig {
            min_trades: 0,
            ..OptimizerConfig::default()
        });
        let mut seen = Vec::new();
        let results = optimizer
            .run(&candles, &MarketContext::new(), &StrategyParams::new(), |p| {
                seen.push(p);
                if p.completed == 5 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            })
            .unwrap();
        assert_eq!(seen.len(), 5);
        assert_eq!(seen[0].total, 96);
        assert_eq!(results.len(), 5);
    }

    #[test]
    fn unknown_strategy_is_an_error() {
        let err = Optimizer::new("nope", default_rsi_mfi_grid())
            .run(&wave(60), &MarketContext::new(), &StrategyParams::new(), |_| {
                ControlFlow::Continue(())
            })
            .unwrap_err();
        assert!(matches!(err, StratbenchError::UnknownStrategy { .. }));
    }
}
