//! Quorum and threshold evaluation.
//!
//! Both checks are pure functions of the vote multiset: they never look at
//! vote order, timestamps or signatures.

use std::collections::{BTreeMap, BTreeSet};

use covenant_types::{DecisionType, PartyClass, PartyId, QuorumProof, ThresholdProof, VoteRecord};

use crate::config::{QuorumConfig, ThresholdConfig};

/// Evaluates votes against the configured quorum and thresholds.
#[derive(Debug, Clone, Default)]
pub struct ProofEvaluator {
    quorum: QuorumConfig,
    thresholds: ThresholdConfig,
}

impl ProofEvaluator {
    pub fn new(quorum: QuorumConfig, thresholds: ThresholdConfig) -> Self {
        Self { quorum, thresholds }
    }

    pub fn thresholds(&self) -> &ThresholdConfig {
        &self.thresholds
    }

    /// Count distinct voters per class, regardless of direction.
    pub fn check_quorum(&self, votes: &[VoteRecord]) -> QuorumProof {
        let mut seen: BTreeSet<&PartyId> = BTreeSet::new();
        let mut class_counts: BTreeMap<PartyClass, u32> = BTreeMap::new();
        for vote in votes {
            if seen.insert(&vote.party_id) {
                *class_counts.entry(vote.party_class.clone()).or_insert(0) += 1;
            }
        }
        let total_voters = u32::try_from(seen.len()).unwrap_or(u32::MAX);

        let classes_met = self.quorum.class_minimums.iter().all(|(class, minimum)| {
            class_counts.get(class).copied().unwrap_or(0) >= *minimum
        });

        QuorumProof {
            satisfied: total_voters >= self.quorum.min_total_voters && classes_met,
            class_counts,
            total_voters,
        }
    }

    /// Compute the approval ratio and class-wise assent. Assent is reported
    /// for every class that voted and every class in `registered_classes`;
    /// a registered class without votes has not assented.
    pub fn check_threshold(
        &self,
        votes: &[VoteRecord],
        decision_type: DecisionType,
        registered_classes: &BTreeSet<PartyClass>,
    ) -> ThresholdProof {
        let threshold_required = self.thresholds.required_for(decision_type);

        let mut tallies: BTreeMap<PartyClass, (u32, u32)> = registered_classes
            .iter()
            .map(|class| (class.clone(), (0, 0)))
            .collect();
        let mut approvals = 0u32;
        for vote in votes {
            let tally = tallies.entry(vote.party_class.clone()).or_insert((0, 0));
            tally.1 += 1;
            if vote.approve {
                tally.0 += 1;
                approvals += 1;
            }
        }

        let approval_ratio = ratio(approvals, votes.len() as u32);
        let class_wise_assent: BTreeMap<PartyClass, bool> = tallies
            .into_iter()
            .map(|(class, (yes, total))| {
                let assents = total > 0 && ratio(yes, total) >= self.thresholds.class_assent_ratio;
                (class, assents)
            })
            .collect();

        let satisfied =
            approval_ratio >= threshold_required && class_wise_assent.values().all(|a| *a);

        ThresholdProof {
            satisfied,
            approval_ratio,
            threshold_required,
            class_wise_assent,
        }
    }
}

fn ratio(part: u32, whole: u32) -> f64 {
    if whole == 0 {
        0.0
    } else {
        f64::from(part) / f64::from(whole)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;

    fn vote(party: &str, class: &str, approve: bool) -> VoteRecord {
        VoteRecord {
            party_id: PartyId::new(party),
            party_class: PartyClass::new(class),
            approve,
            signature: String::new(),
            cast_at: Utc::now(),
        }
    }

    fn classes(names: &[&str]) -> BTreeSet<PartyClass> {
        names.iter().map(|c| PartyClass::new(*c)).collect()
    }

    #[test]
    fn quorum_counts_distinct_parties_per_class() {
        let evaluator = ProofEvaluator::default();
        let votes = vec![vote("a", "H", true), vote("b", "H", false), vote("m", "M", true)];
        let proof = evaluator.check_quorum(&votes);
        assert!(proof.satisfied);
        assert_eq!(proof.total_voters, 3);
        assert_eq!(proof.class_counts[&PartyClass::new("H")], 2);
        assert_eq!(proof.class_counts[&PartyClass::new("M")], 1);
    }

    #[test]
    fn quorum_class_minimum() {
        let evaluator = ProofEvaluator::new(
            QuorumConfig::default().with_class_minimum("M", 1),
            ThresholdConfig::default(),
        );
        let proof = evaluator.check_quorum(&[vote("a", "H", true), vote("b", "H", true)]);
        assert!(!proof.satisfied);
        assert_eq!(proof.total_voters, 2);
    }

    #[test]
    fn quorum_below_minimum_total() {
        let proof = ProofEvaluator::default().check_quorum(&[vote("a", "H", true)]);
        assert!(!proof.satisfied);
    }

    #[test]
    fn silent_registered_class_withholds_assent() {
        let evaluator = ProofEvaluator::default();
        let votes = vec![vote("a", "H", true), vote("b", "H", true)];
        let proof = evaluator.check_threshold(&votes, DecisionType::D2, &classes(&["H", "M"]));
        assert_eq!(proof.approval_ratio, 1.0);
        assert!(proof.ratio_met());
        assert!(!proof.satisfied);
        assert_eq!(proof.dissenting_classes(), vec![PartyClass::new("M")]);
    }

    #[test]
    fn threshold_per_type() {
        let evaluator = ProofEvaluator::default();
        let votes = vec![vote("a", "H", true), vote("b", "H", true), vote("c", "H", false)];
        let registered = classes(&["H"]);
        assert!(evaluator.check_threshold(&votes, DecisionType::D2, &registered).satisfied);
        let d3 = evaluator.check_threshold(&votes, DecisionType::D3, &registered);
        assert!(!d3.satisfied);
        assert_eq!(d3.threshold_required, 0.75);
    }

    #[test]
    fn class_assent_uses_in_class_ratio() {
        let evaluator = ProofEvaluator::default();
        let votes = vec![
            vote("a", "H", true),
            vote("b", "H", true),
            vote("c", "H", true),
            vote("m1", "M", false),
            vote("m2", "M", false),
        ];
        let proof = evaluator.check_threshold(&votes, DecisionType::D1, &classes(&["H", "M"]));
        assert!(proof.ratio_met());
        assert!(!proof.class_wise_assent[&PartyClass::new("M")]);
        assert!(!proof.satisfied);
    }

    #[test]
    fn no_votes_never_satisfies() {
        let proof = ProofEvaluator::default().check_threshold(&[], DecisionType::D1, &BTreeSet::new());
        assert_eq!(proof.approval_ratio, 0.0);
        assert!(!proof.satisfied);
    }

    fn arb_votes() -> impl Strategy<Value = Vec<VoteRecord>> {
        prop::collection::vec((0u8..3, any::<bool>()), 0..12).prop_map(|raw| {
            raw.into_iter()
                .enumerate()
                .map(|(i, (class, approve))| {
                    vote(&format!("p{i}"), ["H", "M", "X"][class as usize], approve)
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn evaluation_is_order_independent(
            (votes, shuffled) in arb_votes()
                .prop_flat_map(|votes| (Just(votes.clone()), Just(votes).prop_shuffle()))
        ) {
            let evaluator = ProofEvaluator::default();
            let registered = classes(&["H", "M"]);

            for decision_type in [DecisionType::D1, DecisionType::D2, DecisionType::D3, DecisionType::D4] {
                prop_assert_eq!(
                    evaluator.check_threshold(&votes, decision_type, &registered),
                    evaluator.check_threshold(&shuffled, decision_type, &registered)
                );
            }
            prop_assert_eq!(evaluator.check_quorum(&votes), evaluator.check_quorum(&shuffled));
        }
    }
}
