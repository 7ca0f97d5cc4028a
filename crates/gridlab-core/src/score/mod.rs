//! Quality score: average reward normalized per task.
//!
//! Scoring is split into two phases that cannot interleave. [`ScoreNormalizer::observe`] collects
//! rewards from every run; [`ScoreNormalizer::finish`] consumes the accumulator and returns an
//! immutable [`RewardSnapshot`], which is the only type able to compute scores.
use std::collections::HashMap;

use gridlab_model::{Properties, TaskKey, constants::*};
use tracing::{debug, warn};

fn task_key(run: &Properties) -> Option<TaskKey> {
    Some(TaskKey::new(run.get_str(PROP_DOMAIN)?, run.get_str(PROP_PROBLEM)?))
}

/// Pass 1: collects average rewards per task.
#[derive(Debug, Default)]
pub struct ScoreNormalizer {
    rewards: HashMap<TaskKey, Vec<f64>>,
}

impl ScoreNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the average reward of `run`. Runs without one are skipped.
    pub fn observe(&mut self, run: &Properties) {
        let (Some(key), Some(reward)) = (task_key(run), run.get_f64(PROP_AVERAGE_REWARD)) else {
            return;
        };
        self.rewards.entry(key).or_default().push(reward);
    }

    pub fn observe_all<'a, I>(&mut self, runs: I)
    where
        I: IntoIterator<Item = &'a Properties>,
    {
        for run in runs {
            self.observe(run);
        }
    }

    /// End pass 1.
    pub fn finish(self) -> RewardSnapshot {
        let best = self
            .rewards
            .into_iter()
            .filter_map(|(key, rewards)| {
                let max = rewards.into_iter().reduce(f64::max)?;
                Some((key, max))
            })
            .collect::<HashMap<_, _>>();
        debug!(tasks = best.len(), "reward snapshot taken");
        RewardSnapshot { best }
    }
}

/// Pass 2: best observed reward per task, frozen.
#[derive(Clone, Debug, Default)]
pub struct RewardSnapshot {
    best: HashMap<TaskKey, f64>,
}

impl RewardSnapshot {
    pub fn best_reward(&self, key: &TaskKey) -> Option<f64> {
        self.best.get(key).copied()
    }

    /// Score of one run.
    ///
    /// Zero when the average reward is missing or at most `min_score`. The upper bound is
    /// `max_score` when given, otherwise the best reward observed on the task; a run of a task
    /// with no observed rewards is its own upper bound. A bound that does not exceed
    /// `min_score` yields one for every run above the minimum.
    pub fn score(&self, run: &Properties) -> f64 {
        let Some(reward) = run.get_f64(PROP_AVERAGE_REWARD) else {
            return 0.0;
        };
        let Some(lo) = run.get_f64(PROP_MIN_SCORE) else {
            warn!(domain = run.get_str(PROP_DOMAIN), problem = run.get_str(PROP_PROBLEM), "run without min score, scoring zero");
            return 0.0;
        };
        if reward <= lo {
            return 0.0;
        }

        let hi = run
            .get_f64(PROP_MAX_SCORE)
            .or_else(|| task_key(run).and_then(|k| self.best_reward(&k)))
            .unwrap_or(reward);
        if hi <= lo {
            return 1.0;
        }
        (reward - lo) / (hi - lo)
    }

    /// Store the score of `run` under `ipc_score`.
    pub fn apply(&self, run: &mut Properties) {
        let score = self.score(run);
        run.insert(PROP_QUALITY_SCORE, score);
    }
}

/// Run both passes over `runs`.
pub fn score_all(runs: &mut [Properties]) -> RewardSnapshot {
    let mut normalizer = ScoreNormalizer::new();
    normalizer.observe_all(runs.iter());
    let snapshot = normalizer.finish();
    for run in runs.iter_mut() {
        snapshot.apply(run);
    }
    snapshot
}
