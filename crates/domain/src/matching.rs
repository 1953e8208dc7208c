//! Pure ranking of repository candidates for a branch/project query.

use crate::primitives::BranchName;
use crate::records::{ActivatedRepository, GoldenRepository, MatchCandidate, RepositoryMatch};
use crate::states::ActivationState;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Score for an already-active user activation on the requested branch.
pub const SCORE_ACTIVE: u32 = 300;
/// Score for a golden repository with an exact branch match.
pub const SCORE_GOLDEN_EXACT: u32 = 200;
/// Score for a golden repository falling back to its default branch.
pub const SCORE_GOLDEN_DEFAULT: u32 = 100;

/// Branch/project selector driving repository matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSelector {
    /// Project name or golden alias to match.
    pub project: Box<str>,
    /// Requested branch; `None` means the candidate's default branch.
    pub branch: Option<BranchName>,
}

/// Rank the user's activations and the golden catalog against `selector`.
///
/// Best match first. An empty result is not an error: it means no candidate
/// serves the project at all, and callers fall back to alternate flows
/// (e.g. local-only indexing).
#[must_use]
pub fn rank_candidates(
    selector: &MatchSelector,
    activations: &[ActivatedRepository],
    goldens: &[GoldenRepository],
) -> Vec<RepositoryMatch> {
    let mut matches: Vec<RepositoryMatch> = Vec::new();

    for activated in activations {
        if activated.state != ActivationState::Active {
            continue;
        }
        if !activation_matches_project(selector.project.as_ref(), activated, goldens) {
            continue;
        }
        if let Some(requested) = selector.branch.as_ref() {
            if &activated.branch != requested {
                continue;
            }
        }
        matches.push(RepositoryMatch {
            branch: activated.branch.clone(),
            candidate: MatchCandidate::Activated(activated.clone()),
            match_score: SCORE_ACTIVE,
        });
    }

    for golden in goldens {
        if !golden_matches_project(selector.project.as_ref(), golden) {
            continue;
        }
        let (branch, score) = match selector.branch.as_ref() {
            Some(requested) if golden.has_branch(requested) => {
                (requested.clone(), SCORE_GOLDEN_EXACT)
            },
            Some(_) => (golden.default_branch.clone(), SCORE_GOLDEN_DEFAULT),
            None => (golden.default_branch.clone(), SCORE_GOLDEN_EXACT),
        };
        matches.push(RepositoryMatch {
            branch,
            candidate: MatchCandidate::Golden(golden.clone()),
            match_score: score,
        });
    }

    matches.sort_by(compare_matches);
    matches
}

fn activation_matches_project(
    project: &str,
    activated: &ActivatedRepository,
    goldens: &[GoldenRepository],
) -> bool {
    if activated.golden_alias.as_str() == project {
        return true;
    }
    goldens
        .iter()
        .find(|golden| golden.alias == activated.golden_alias)
        .is_some_and(|golden| golden_matches_project(project, golden))
}

fn golden_matches_project(project: &str, golden: &GoldenRepository) -> bool {
    golden.alias.as_str() == project || golden.source_url.project_name().as_ref() == project
}

/// Deterministic ordering: score desc, recency desc, alias asc.
fn compare_matches(a: &RepositoryMatch, b: &RepositoryMatch) -> Ordering {
    b.match_score
        .cmp(&a.match_score)
        .then_with(|| recency(b).cmp(&recency(a)))
        .then_with(|| {
            a.candidate
                .golden_alias()
                .as_str()
                .cmp(b.candidate.golden_alias().as_str())
        })
}

fn recency(m: &RepositoryMatch) -> u64 {
    match &m.candidate {
        MatchCandidate::Activated(activated) => activated.activated_at_ms,
        MatchCandidate::Golden(golden) => golden.last_refreshed_at_ms,
    }
}
