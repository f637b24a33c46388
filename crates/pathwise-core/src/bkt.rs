//! Bayesian Knowledge Tracing.
//!
//! Standard two-state mastery model (Corbett & Anderson, 1994). Each observed
//! response updates the probability that the skill is mastered:
//!
//! ```text
//! P(L_{n-1} | correct)   = P(L_{n-1})(1 - S) / [P(L_{n-1})(1 - S) + (1 - P(L_{n-1}))G]
//! P(L_{n-1} | incorrect) = P(L_{n-1})S / [P(L_{n-1})S + (1 - P(L_{n-1}))(1 - G)]
//! P(L_n)                 = P(L_{n-1} | actual) + (1 - P(L_{n-1} | actual))T
//! P(correct_{n+1})       = P(L_n)(1 - S) + (1 - P(L_n))G
//! ```

use serde::{Deserialize, Serialize};

use crate::model::BktConfig;

/// Slip, guess and transit probabilities.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BktParameters {
    pub p_slip: f64,
    pub p_guess: f64,
    pub p_transit: f64,
}

impl From<&BktConfig> for BktParameters {
    fn from(config: &BktConfig) -> Self {
        Self {
            p_slip: config.p_slip,
            p_guess: config.p_guess,
            p_transit: config.p_transit,
        }
    }
}

/// Output of one BKT update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BktResult {
    pub p_ln_minus1_given_actual: f64,
    pub p_ln: f64,
    pub p_correct: f64,
}

/// Update the mastery estimate `p_ln_minus1` with one observed response.
pub fn bkt_update(p_ln_minus1: f64, params: BktParameters, actual: bool) -> BktResult {
    let prior = p_ln_minus1.clamp(0.0, 1.0);
    let BktParameters {
        p_slip,
        p_guess,
        p_transit,
    } = params;

    let (mastered, unmastered) = if actual {
        (prior * (1.0 - p_slip), (1.0 - prior) * p_guess)
    } else {
        (prior * p_slip, (1.0 - prior) * (1.0 - p_guess))
    };
    let evidence = mastered + unmastered;
    let p_ln_minus1_given_actual = if evidence > 0.0 {
        mastered / evidence
    } else {
        prior
    };

    let p_ln = p_ln_minus1_given_actual + (1.0 - p_ln_minus1_given_actual) * p_transit;
    let p_correct = p_ln * (1.0 - p_slip) + (1.0 - p_ln) * p_guess;

    BktResult {
        p_ln_minus1_given_actual,
        p_ln,
        p_correct,
    }
}

/// Completion from the number of completed walkables against `exit_after`.
pub fn exit_after_completion(child_completion_sum: f64, exit_after: u32) -> f64 {
    if exit_after == 0 {
        return 0.0;
    }
    (child_completion_sum / exit_after as f64).min(1.0)
}

/// Completion from how many recent snapshots reached the proficiency target.
///
/// `window` holds the current pLn followed by up to `maintain_for - 1` prior
/// values; anything beyond `maintain_for` entries is ignored.
pub fn maintenance_completion(window: &[f64], maintain_for: u32, target_p_ln: f64) -> f64 {
    if maintain_for == 0 {
        return 0.0;
    }
    let achieved = window
        .iter()
        .take(maintain_for as usize)
        .filter(|p| **p >= target_p_ln)
        .count();
    (achieved as f64 / maintain_for as f64).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARAMS: BktParameters = BktParameters {
        p_slip: 0.1,
        p_guess: 0.2,
        p_transit: 0.15,
    };

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn correct_response_raises_mastery() {
        let r = bkt_update(0.3, PARAMS, true);
        // 0.3*0.9 / (0.3*0.9 + 0.7*0.2) = 0.27 / 0.41
        assert!(close(r.p_ln_minus1_given_actual, 0.27 / 0.41));
        let expected_ln = 0.27 / 0.41 + (1.0 - 0.27 / 0.41) * 0.15;
        assert!(close(r.p_ln, expected_ln));
        assert!(close(r.p_correct, expected_ln * 0.9 + (1.0 - expected_ln) * 0.2));
        assert!(r.p_ln > 0.3);
    }

    #[test]
    fn incorrect_response_lowers_posterior() {
        let r = bkt_update(0.6, PARAMS, false);
        // 0.6*0.1 / (0.6*0.1 + 0.4*0.8) = 0.06 / 0.38
        assert!(close(r.p_ln_minus1_given_actual, 0.06 / 0.38));
        assert!(r.p_ln_minus1_given_actual < 0.6);
    }

    #[test]
    fn degenerate_evidence_keeps_prior() {
        let params = BktParameters {
            p_slip: 1.0,
            p_guess: 0.0,
            p_transit: 0.0,
        };
        let r = bkt_update(0.4, params, true);
        assert!(close(r.p_ln_minus1_given_actual, 0.4));
        assert!(close(r.p_ln, 0.4));
    }

    #[test]
    fn exit_after_is_capped() {
        assert!(close(exit_after_completion(1.0, 2), 0.5));
        assert!(close(exit_after_completion(5.0, 2), 1.0));
        assert_eq!(exit_after_completion(3.0, 0), 0.0);
    }

    #[test]
    fn maintenance_reaches_one_when_window_is_proficient() {
        assert!(close(maintenance_completion(&[0.85, 0.9, 0.81], 3, 0.8), 1.0));
    }

    #[test]
    fn maintenance_counts_only_proficient_entries() {
        assert!(close(
            maintenance_completion(&[0.85, 0.5, 0.9], 3, 0.8),
            2.0 / 3.0
        ));
        assert!(close(maintenance_completion(&[0.85], 3, 0.8), 1.0 / 3.0));
        assert!(close(
            maintenance_completion(&[0.9, 0.9, 0.9, 0.9], 3, 0.8),
            1.0
        ));
        assert_eq!(maintenance_completion(&[0.9], 0, 0.8), 0.0);
    }
}
