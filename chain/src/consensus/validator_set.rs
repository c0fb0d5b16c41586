//! The fixed set of authorized validators.
//!
//! Per the hostname-normalization redesign, short-name vs fully-qualified
//! comparisons happen exactly once, here, at construction; every other
//! module compares [`ValidatorId`]s directly.

use crate::types::ValidatorId;

/// The fixed, sorted list of validator identifiers agreed on at startup.
///
/// Never grows or shrinks after construction (dynamic reconfiguration is
/// explicitly out of scope); [`crate::consensus::ConsensusState`] tracks
/// which members of this set are currently active vs failed.
#[derive(Clone, Debug)]
pub struct ValidatorSet {
    all: Vec<ValidatorId>,
}

impl ValidatorSet {
    /// Builds the canonical validator set from raw hostnames.
    ///
    /// When the same replica appears under both a short name and a fully
    /// qualified name, they are collapsed into one entry and the FQDN is
    /// kept. The result is sorted by string order, as every replica must
    /// independently compute the same list.
    pub fn new<I, S>(raw_hostnames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        use std::collections::HashMap;

        let mut by_short: HashMap<String, String> = HashMap::new();
        for raw in raw_hostnames {
            let host = raw.into();
            let short = host.split('.').next().unwrap_or(&host).to_string();
            by_short
                .entry(short)
                .and_modify(|canonical| {
                    if host.contains('.') && !canonical.contains('.') {
                        *canonical = host.clone();
                    }
                })
                .or_insert(host);
        }
        let mut all: Vec<ValidatorId> = by_short.into_values().map(ValidatorId).collect();
        all.sort();
        Self { all }
    }

    /// The full, fixed validator set (sorted).
    pub fn all(&self) -> &[ValidatorId] {
        &self.all
    }

    pub fn len(&self) -> usize {
        self.all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    pub fn contains(&self, id: &ValidatorId) -> bool {
        self.all.contains(id)
    }

    /// Quorum for view change: `floor(|validator_set| / 2) + 1`, over the
    /// full fixed set regardless of who is currently marked active.
    pub fn view_change_quorum(&self) -> usize {
        self.all.len() / 2 + 1
    }

    /// Resolves a raw wire identifier (which may be a short hostname or an
    /// FQDN) against the canonical set, matching exactly or by short-name.
    /// Falls back to treating `raw` itself as the identifier if it matches
    /// no known member (e.g. a not-yet-seen peer).
    pub fn normalize(&self, raw: &str) -> ValidatorId {
        if let Some(exact) = self.all.iter().find(|v| v.as_str() == raw) {
            return exact.clone();
        }
        let short = raw.split('.').next().unwrap_or(raw);
        if let Some(found) = self
            .all
            .iter()
            .find(|v| v.as_str().split('.').next().unwrap_or(v.as_str()) == short)
        {
            return found.clone();
        }
        ValidatorId::from(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorts_and_dedupes_on_construction() {
        let vs = ValidatorSet::new(["c", "a", "b"]);
        let ids: Vec<&str> = vs.all().iter().map(|v| v.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn fqdn_wins_over_short_name_for_the_same_replica() {
        let vs = ValidatorSet::new(["node-a", "node-a.cluster.internal", "node-b"]);
        assert_eq!(vs.len(), 2);
        let normalized = vs.normalize("node-a");
        assert_eq!(normalized.as_str(), "node-a.cluster.internal");
    }

    #[test]
    fn normalize_matches_by_short_hostname() {
        let vs = ValidatorSet::new(["node-a.cluster.internal", "node-b.cluster.internal"]);
        assert_eq!(vs.normalize("node-b").as_str(), "node-b.cluster.internal");
    }

    #[test]
    fn normalize_falls_back_to_raw_for_unknown_peers() {
        let vs = ValidatorSet::new(["node-a"]);
        assert_eq!(vs.normalize("stranger").as_str(), "stranger");
    }

    #[test]
    fn view_change_quorum_matches_the_floor_plus_one_rule() {
        assert_eq!(ValidatorSet::new(["a", "b", "c"]).view_change_quorum(), 2);
        assert_eq!(ValidatorSet::new(["a", "b", "c", "d"]).view_change_quorum(), 3);
        assert_eq!(ValidatorSet::new(["a"]).view_change_quorum(), 1);
    }
}
