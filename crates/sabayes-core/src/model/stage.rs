//! Lifecycle of a single model run.

use core::fmt;

use serde::{Deserialize, Serialize};

use super::ModelError;

/// Stage of a model run.
///
/// ```text
/// Specified ──► Sampling ──► Converged ──┐
///                    │                   ├──► Summarized
///                    └─────► Diverged ───┘
/// ```
///
/// `Diverged` means the chains finished but did not meet the convergence
/// targets or produced divergent sweeps. It is still summarized: the
/// report carries the warnings instead of aborting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    /// Model and data are set up.
    Specified,
    /// Chains are running.
    Sampling,
    /// Diagnostics met every target.
    Converged,
    /// Diagnostics missed a target or sweeps diverged.
    Diverged,
    /// Posterior summaries have been computed.
    Summarized,
}

impl RunStage {
    /// Whether `next` may follow `self`.
    pub fn can_transition_to(self, next: RunStage) -> bool {
        use RunStage::*;
        matches!(
            (self, next),
            (Specified, Sampling)
                | (Sampling, Converged)
                | (Sampling, Diverged)
                | (Converged, Summarized)
                | (Diverged, Summarized)
        )
    }

    /// Move to `next`, or fail if the transition is not allowed.
    pub fn advance(self, next: RunStage) -> Result<RunStage, ModelError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(ModelError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    /// Leave `Sampling` according to the diagnostics outcome.
    pub fn finish_sampling(self, converged: bool) -> Result<RunStage, ModelError> {
        self.advance(if converged {
            RunStage::Converged
        } else {
            RunStage::Diverged
        })
    }

    /// Stage name as written to metadata.
    pub fn as_str(self) -> &'static str {
        match self {
            RunStage::Specified => "specified",
            RunStage::Sampling => "sampling",
            RunStage::Converged => "converged",
            RunStage::Diverged => "diverged",
            RunStage::Summarized => "summarized",
        }
    }
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_paths() {
        let stage = RunStage::Specified.advance(RunStage::Sampling).unwrap();
        assert_eq!(stage.finish_sampling(true), Ok(RunStage::Converged));
        assert_eq!(stage.finish_sampling(false), Ok(RunStage::Diverged));
        assert_eq!(
            RunStage::Diverged.advance(RunStage::Summarized),
            Ok(RunStage::Summarized)
        );
    }

    #[test]
    fn test_rejects_skipped_stages() {
        assert_eq!(
            RunStage::Specified.advance(RunStage::Summarized),
            Err(ModelError::InvalidTransition {
                from: RunStage::Specified,
                to: RunStage::Summarized,
            })
        );
        assert!(RunStage::Summarized.advance(RunStage::Sampling).is_err());
        assert!(RunStage::Converged.finish_sampling(true).is_err());
    }
}
