//! User-alias generation for newly activated repositories.

use crate::primitives::{BranchName, PrimitiveError, UserAlias};
use std::collections::BTreeSet;

/// Generate a unique, human-meaningful alias for a new activation.
///
/// Produces `{project}-{branch}-{date_stamp}`; on collision with
/// `existing` a numeric suffix (`-2`, `-3`, …) is appended and incremented
/// until unique. Pure and deterministic: the date stamp is injected by the
/// caller rather than read from a clock here, so the function stays
/// testable.
pub fn generate_user_alias(
    project_name: &str,
    branch: &BranchName,
    date_stamp: &str,
    existing: &BTreeSet<UserAlias>,
) -> Result<UserAlias, PrimitiveError> {
    let base = format!(
        "{}-{}-{}",
        sanitize_segment(project_name),
        sanitize_segment(branch.as_str()),
        sanitize_segment(date_stamp),
    );

    let first = UserAlias::parse(&base).map_err(|_| PrimitiveError::DerivedAliasInvalid {
        candidate: base.clone(),
    })?;
    if !existing.contains(&first) {
        return Ok(first);
    }

    let mut suffix = 2u32;
    loop {
        let candidate = format!("{base}-{suffix}");
        let alias =
            UserAlias::parse(&candidate).map_err(|_| PrimitiveError::DerivedAliasInvalid {
                candidate: candidate.clone(),
            })?;
        if !existing.contains(&alias) {
            return Ok(alias);
        }
        suffix = suffix.saturating_add(1);
    }
}

fn sanitize_segment(raw: &str) -> String {
    let lowered: String = raw
        .chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_') {
                c
            } else {
                '-'
            }
        })
        .collect();
    let trimmed = lowered.trim_matches('-');
    if trimmed.is_empty() {
        "x".to_owned()
    } else {
        trimmed.to_owned()
    }
}
