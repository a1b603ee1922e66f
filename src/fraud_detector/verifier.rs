use async_trait::async_trait;
use ethers::types::H256;
use serde::Serialize;

use super::error::SourceError;

/// Read access to a rollup node's state, canonical or verifier.
#[async_trait]
pub(crate) trait RollupNode {
    /// Returns the state root of the rollup block with the given number.
    async fn state_root(&self, block_number: u64) -> Result<H256, SourceError>;
}

/// The classification of one triple comparison.
///
/// Classification is by priority: a canonical/verifier split is reported
/// ahead of either node disagreeing with the commitment, since divergent node
/// execution is meaningful independent of the base chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum Outcome {
    Match,
    CommitVsCanonicalMismatch,
    CommitVsVerifierMismatch,
    CanonicalVsVerifierMismatch,
}

impl Outcome {
    pub(crate) fn is_match(self) -> bool {
        matches!(self, Self::Match)
    }
}

/// The three state roots fetched for a single rollup block and the comparison
/// outcome.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub(crate) struct BlockVerificationResult {
    pub(crate) rollup_block_number: u64,
    pub(crate) committed_root: H256,
    pub(crate) canonical_root: H256,
    pub(crate) verifier_root: H256,
    pub(crate) outcome: Outcome,
}

/// Fetches the canonical and verifier state roots for `rollup_block_number`
/// and compares all three roots pairwise.
///
/// A node query failure is a transient fault of the source, never a mismatch.
pub(crate) async fn verify_block<N: RollupNode>(
    canonical: &N,
    verifier: &N,
    rollup_block_number: u64,
    committed_root: H256,
) -> Result<BlockVerificationResult, SourceError> {
    let canonical_root = canonical.state_root(rollup_block_number).await?;
    let verifier_root = verifier.state_root(rollup_block_number).await?;
    Ok(BlockVerificationResult {
        rollup_block_number,
        committed_root,
        canonical_root,
        verifier_root,
        outcome: classify(committed_root, canonical_root, verifier_root),
    })
}

fn classify(committed: H256, canonical: H256, verifier: H256) -> Outcome {
    if canonical == verifier && canonical == committed {
        Outcome::Match
    } else if canonical != verifier {
        Outcome::CanonicalVsVerifierMismatch
    } else if canonical != committed {
        Outcome::CommitVsCanonicalMismatch
    } else {
        Outcome::CommitVsVerifierMismatch
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    struct FakeNode {
        roots: HashMap<u64, H256>,
    }

    #[async_trait]
    impl RollupNode for FakeNode {
        async fn state_root(&self, block_number: u64) -> Result<H256, SourceError> {
            self.roots.get(&block_number).copied().ok_or_else(|| {
                SourceError::new("rollup node does not have the requested block", "missing")
            })
        }
    }

    fn root(marker: u64) -> H256 {
        H256::from_low_u64_be(marker)
    }

    #[test]
    fn agreeing_roots_classify_as_match() {
        assert_eq!(classify(root(1), root(1), root(1)), Outcome::Match);
    }

    #[test]
    fn node_split_takes_priority_over_commitment_disagreement() {
        // the verifier disagrees with both the commitment and the canonical
        // node; the node split is reported
        assert_eq!(
            classify(root(1), root(1), root(2)),
            Outcome::CanonicalVsVerifierMismatch
        );
        // all three disagree; still the node split
        assert_eq!(
            classify(root(1), root(2), root(3)),
            Outcome::CanonicalVsVerifierMismatch
        );
    }

    #[test]
    fn agreeing_nodes_against_commitment_classify_as_commit_mismatch() {
        assert_eq!(
            classify(root(1), root(2), root(2)),
            Outcome::CommitVsCanonicalMismatch
        );
    }

    #[tokio::test]
    async fn verify_block_reports_all_three_roots() {
        let canonical = FakeNode {
            roots: HashMap::from([(7, root(70))]),
        };
        let verifier = FakeNode {
            roots: HashMap::from([(7, root(71))]),
        };
        let result = verify_block(&canonical, &verifier, 7, root(70))
            .await
            .unwrap();
        assert_eq!(result.committed_root, root(70));
        assert_eq!(result.canonical_root, root(70));
        assert_eq!(result.verifier_root, root(71));
        assert_eq!(result.outcome, Outcome::CanonicalVsVerifierMismatch);
    }

    #[tokio::test]
    async fn unavailable_node_is_a_source_fault_not_a_mismatch() {
        let canonical = FakeNode {
            roots: HashMap::new(),
        };
        let verifier = FakeNode {
            roots: HashMap::new(),
        };
        assert!(verify_block(&canonical, &verifier, 7, root(70))
            .await
            .is_err());
    }
}
