//! Document-level trust score

use crate::model::{Claim, VerificationStatus};

/// Upper bound of the trust score
pub const MAX_SCORE: f64 = 10.0;

/// Per-status claim counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClaimTally {
    pub total: usize,
    pub verified: usize,
    pub mixed: usize,
    pub unsupported: usize,
}

impl ClaimTally {
    /// Count final statuses; a claim left pending counts as unsupported
    pub fn from_claims(claims: &[Claim]) -> Self {
        claims.iter().fold(Self::default(), |mut tally, claim| {
            tally.total += 1;
            match claim.status {
                VerificationStatus::Verified => tally.verified += 1,
                VerificationStatus::Mixed => tally.mixed += 1,
                VerificationStatus::Unsupported | VerificationStatus::Pending => {
                    tally.unsupported += 1
                }
            }
            tally
        })
    }

    /// `10 * (verified + 0.5 * mixed) / total`, or 0 with no claims
    pub fn score(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let weighted = self.verified as f64 + 0.5 * self.mixed as f64;
        (MAX_SCORE * weighted / self.total as f64).clamp(0.0, MAX_SCORE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ClaimType;

    fn claims(statuses: &[VerificationStatus]) -> Vec<Claim> {
        statuses
            .iter()
            .enumerate()
            .map(|(i, status)| {
                let mut claim = Claim::pending(format!("claim {}", i), ClaimType::Factual, i);
                claim.status = *status;
                claim
            })
            .collect()
    }

    #[test]
    fn test_empty_scores_zero() {
        let tally = ClaimTally::from_claims(&[]);
        assert_eq!(tally, ClaimTally::default());
        assert_eq!(tally.score(), 0.0);
    }

    #[test]
    fn test_mixed_weighting() {
        use VerificationStatus::*;
        let tally = ClaimTally::from_claims(&claims(&[Verified, Mixed, Unsupported, Verified]));

        assert_eq!(tally.verified, 2);
        assert_eq!(tally.mixed, 1);
        assert_eq!(tally.unsupported, 1);
        assert_eq!(tally.score(), 6.25);
    }

    #[test]
    fn test_extremes() {
        use VerificationStatus::*;
        assert_eq!(ClaimTally::from_claims(&claims(&[Verified, Verified])).score(), 10.0);
        assert_eq!(ClaimTally::from_claims(&claims(&[Unsupported, Unsupported])).score(), 0.0);
        assert!(ClaimTally::from_claims(&claims(&[Verified, Mixed])).score() < 10.0);
        assert!(ClaimTally::from_claims(&claims(&[Unsupported, Mixed])).score() > 0.0);
    }

    #[test]
    fn test_counts_always_sum_to_total() {
        use VerificationStatus::*;
        let all = [Pending, Verified, Mixed, Unsupported];
        for len in 1..=8 {
            let statuses: Vec<_> = (0..len).map(|i| all[(i * 7 + len) % 4]).collect();
            let tally = ClaimTally::from_claims(&claims(&statuses));

            assert_eq!(tally.verified + tally.mixed + tally.unsupported, tally.total);
            assert!((0.0..=MAX_SCORE).contains(&tally.score()));
        }
    }
}
