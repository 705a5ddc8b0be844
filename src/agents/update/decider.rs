use crate::catalog::{Ceiling, CeilingOrigin, ResolvedCeiling};
use crate::error::{MclazyError, Result};
use crate::upstream::version::{MODERN_SCHEME_THRESHOLD, leading_component, to_dotted};
use crate::upstream::{VersionCandidate, VersionComparator};
use std::cmp::Ordering;
use std::fmt;
use tracing::debug;

/// Caller controlled knobs for a single decision.
#[derive(Debug, Clone, Default)]
pub struct UpdatePolicy {
    /// Allow switching to a different pre-40 release line
    pub relax_version_checks: bool,
    /// Version currently installed on this machine, if it was checked
    pub installed_version: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoUpdateReason {
    NoCandidateUnderCeiling,
    AlreadyCurrent,
}

impl fmt::Display for NoUpdateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoUpdateReason::NoCandidateUnderCeiling => f.write_str("no candidate under ceiling"),
            NoUpdateReason::AlreadyCurrent => f.write_str("already current"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateDecision {
    NoUpdate(NoUpdateReason),
    Update(VersionCandidate),
}

pub struct UpdateDecider;

impl UpdateDecider {
    /// Pick the upstream release `current` should move to, if any.
    ///
    /// `current` is the spec file version (tilde form). Candidates are
    /// upstream strings as published. Misconfiguration and policy violations
    /// come back as errors so the caller can record them against the module.
    pub fn decide(
        current: &str,
        candidates: &[String],
        ceiling: &ResolvedCeiling,
        policy: &UpdatePolicy,
    ) -> Result<UpdateDecision> {
        let eligible: Vec<VersionCandidate> = match &ceiling.ceiling {
            Ceiling::Ignored => {
                return Ok(UpdateDecision::NoUpdate(
                    NoUpdateReason::NoCandidateUnderCeiling,
                ));
            }
            Ceiling::Unbounded => candidates.iter().map(|v| VersionCandidate::new(v)).collect(),
            // compare the published string so `49.alpha` stays out of a `< 49` branch
            Ceiling::Bounded(limit) => candidates
                .iter()
                .filter(|v| VersionComparator::compare(v, limit) == Ordering::Less)
                .map(|v| VersionCandidate::new(v))
                .collect(),
        };

        let Some(selected) = VersionComparator::latest(&eligible) else {
            // only an explicit limit narrower than unbounded makes an empty set an error
            if let (Ceiling::Bounded(limit), CeilingOrigin::Override) =
                (&ceiling.ceiling, ceiling.origin)
            {
                return Err(MclazyError::NoEligibleCandidate {
                    ceiling: limit.clone(),
                });
            }
            return Ok(UpdateDecision::NoUpdate(
                NoUpdateReason::NoCandidateUnderCeiling,
            ));
        };
        debug!(
            "Best of {} eligible candidate(s) is {}",
            eligible.len(),
            selected.original
        );

        if let Some(installed) = &policy.installed_version {
            if VersionComparator::is_newer(installed, &selected.normalized) {
                return Err(MclazyError::InstalledAhead {
                    installed: installed.clone(),
                    candidate: selected.original.clone(),
                });
            }
        }

        let current_major = leading_component(&to_dotted(current));
        let candidate_major = leading_component(&selected.original);
        let old_release_line = candidate_major.is_some_and(|n| n < MODERN_SCHEME_THRESHOLD);
        if current_major != candidate_major && old_release_line {
            if !policy.relax_version_checks {
                return Err(MclazyError::PolicyBlocked {
                    from: current.to_string(),
                    to: selected.original.clone(),
                });
            }
            return Ok(UpdateDecision::Update(selected.clone()));
        }

        match VersionComparator::compare(&selected.normalized, current) {
            Ordering::Equal => Ok(UpdateDecision::NoUpdate(NoUpdateReason::AlreadyCurrent)),
            Ordering::Less => Err(MclazyError::InstalledAhead {
                installed: current.to_string(),
                candidate: selected.original.clone(),
            }),
            Ordering::Greater => Ok(UpdateDecision::Update(selected.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn versions(list: &[&str]) -> Vec<String> {
        list.iter().map(|v| v.to_string()).collect()
    }

    fn bounded(limit: &str, origin: CeilingOrigin) -> ResolvedCeiling {
        ResolvedCeiling::new(Ceiling::Bounded(limit.to_string()), origin)
    }

    fn unbounded() -> ResolvedCeiling {
        ResolvedCeiling::new(Ceiling::Unbounded, CeilingOrigin::Rolling)
    }

    #[test]
    fn ceiling_excludes_newer_series() {
        let decision = UpdateDecider::decide(
            "46.2",
            &versions(&["46.3", "47.0", "48.1"]),
            &bounded("48", CeilingOrigin::BranchDefault),
            &UpdatePolicy::default(),
        )
        .unwrap();
        assert_eq!(decision, UpdateDecision::Update(VersionCandidate::new("47.0")));
    }

    #[test]
    fn same_version_is_already_current() {
        let decision = UpdateDecider::decide(
            "46.2",
            &versions(&["46.2"]),
            &unbounded(),
            &UpdatePolicy::default(),
        )
        .unwrap();
        assert_eq!(
            decision,
            UpdateDecision::NoUpdate(NoUpdateReason::AlreadyCurrent)
        );
    }

    #[test]
    fn major_jump_below_threshold_needs_relaxation() {
        let candidates = versions(&["3.99.1"]);
        let err = UpdateDecider::decide(
            "39.0",
            &candidates,
            &unbounded(),
            &UpdatePolicy::default(),
        )
        .unwrap_err();
        assert!(matches!(err, MclazyError::PolicyBlocked { .. }));

        let relaxed = UpdatePolicy {
            relax_version_checks: true,
            ..Default::default()
        };
        let decision = UpdateDecider::decide("39.0", &candidates, &unbounded(), &relaxed).unwrap();
        assert_eq!(
            decision,
            UpdateDecision::Update(VersionCandidate::new("3.99.1"))
        );
    }

    #[test]
    fn moving_to_modern_scheme_is_allowed() {
        let decision = UpdateDecider::decide(
            "3.38.1",
            &versions(&["3.38.1", "40.0"]),
            &unbounded(),
            &UpdatePolicy::default(),
        )
        .unwrap();
        assert_eq!(decision, UpdateDecision::Update(VersionCandidate::new("40.0")));
    }

    #[test]
    fn empty_override_is_an_error() {
        let err = UpdateDecider::decide(
            "3.24.40",
            &versions(&["4.0.0", "4.2.0"]),
            &bounded("3.90", CeilingOrigin::Override),
            &UpdatePolicy::default(),
        )
        .unwrap_err();
        match err {
            MclazyError::NoEligibleCandidate { ceiling } => assert_eq!(ceiling, "3.90"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_default_is_benign() {
        let decision = UpdateDecider::decide(
            "49.0",
            &versions(&["49.1"]),
            &bounded("49", CeilingOrigin::BranchDefault),
            &UpdatePolicy::default(),
        )
        .unwrap();
        assert_eq!(
            decision,
            UpdateDecision::NoUpdate(NoUpdateReason::NoCandidateUnderCeiling)
        );
    }

    #[test]
    fn unbounded_override_without_releases_is_benign() {
        let decision = UpdateDecider::decide(
            "46.2",
            &[],
            &ResolvedCeiling::new(Ceiling::Unbounded, CeilingOrigin::Override),
            &UpdatePolicy::default(),
        )
        .unwrap();
        assert_eq!(
            decision,
            UpdateDecision::NoUpdate(NoUpdateReason::NoCandidateUnderCeiling)
        );
    }

    #[test]
    fn ignored_ceiling_never_selects() {
        let decision = UpdateDecider::decide(
            "46.2",
            &versions(&["47.0"]),
            &ResolvedCeiling::new(Ceiling::Ignored, CeilingOrigin::Override),
            &UpdatePolicy::default(),
        )
        .unwrap();
        assert_eq!(
            decision,
            UpdateDecision::NoUpdate(NoUpdateReason::NoCandidateUnderCeiling)
        );
    }

    #[test]
    fn newer_installed_version_is_reported() {
        let policy = UpdatePolicy {
            installed_version: Some("48.0".to_string()),
            ..Default::default()
        };
        let err = UpdateDecider::decide(
            "47.1",
            &versions(&["47.2", "48.0"]),
            &bounded("48", CeilingOrigin::BranchDefault),
            &policy,
        )
        .unwrap_err();
        assert!(matches!(err, MclazyError::InstalledAhead { .. }));
    }

    #[test]
    fn spec_ahead_of_ceiling_is_reported() {
        let err = UpdateDecider::decide(
            "48.1",
            &versions(&["47.3", "48.1"]),
            &bounded("48", CeilingOrigin::BranchDefault),
            &UpdatePolicy::default(),
        )
        .unwrap_err();
        match err {
            MclazyError::InstalledAhead {
                installed,
                candidate,
            } => {
                assert_eq!(installed, "48.1");
                assert_eq!(candidate, "47.3");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn prereleases_rank_below_release_and_respect_ceiling() {
        let candidates = versions(&["48.2", "49.alpha", "49.beta", "49.0"]);
        let decision = UpdateDecider::decide(
            "48.1",
            &candidates,
            &bounded("49", CeilingOrigin::BranchDefault),
            &UpdatePolicy::default(),
        )
        .unwrap();
        assert_eq!(decision, UpdateDecision::Update(VersionCandidate::new("48.2")));

        let decision = UpdateDecider::decide(
            "49~alpha",
            &candidates[..3],
            &unbounded(),
            &UpdatePolicy::default(),
        )
        .unwrap();
        match decision {
            UpdateDecision::Update(candidate) => {
                assert_eq!(candidate.original, "49.beta");
                assert_eq!(candidate.normalized, "49~beta");
            }
            other => panic!("unexpected decision: {other:?}"),
        }
    }
}
