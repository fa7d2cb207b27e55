//! POI membership sets with a per-user secondary index.

use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

/// Result of an atomic join attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined,
    AlreadyMember,
    Full,
}

/// In-memory participation store.
///
/// The membership set for one POI lives behind a single map entry, so the
/// capacity check and insert in [`join`](Self::join) happen under one lock.
/// That entry is the authoritative test: the post-condition
/// `count <= max_participants` holds even under concurrent joins.
#[derive(Clone, Default)]
pub struct ParticipationCache {
    members: Arc<DashMap<Uuid, HashSet<Uuid>>>,
    by_user: Arc<DashMap<Uuid, HashSet<Uuid>>>,
}

impl ParticipationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically add a user to a POI, honoring the capacity ceiling.
    pub fn join(&self, poi_id: Uuid, user_id: Uuid, max_participants: usize) -> JoinOutcome {
        let mut set = self.members.entry(poi_id).or_default();
        if set.contains(&user_id) {
            return JoinOutcome::AlreadyMember;
        }
        if set.len() >= max_participants {
            return JoinOutcome::Full;
        }
        set.insert(user_id);
        drop(set);

        self.by_user.entry(user_id).or_default().insert(poi_id);
        JoinOutcome::Joined
    }

    /// Remove a user from a POI. Returns whether they were a member.
    pub fn leave(&self, poi_id: Uuid, user_id: Uuid) -> bool {
        let removed = self
            .members
            .get_mut(&poi_id)
            .map(|mut set| set.remove(&user_id))
            .unwrap_or(false);

        if removed
            && let Some(mut pois) = self.by_user.get_mut(&user_id)
        {
            pois.remove(&poi_id);
        }
        removed
    }

    /// Snapshot the member set of a POI.
    pub fn members(&self, poi_id: Uuid) -> Vec<Uuid> {
        self.members
            .get(&poi_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Current member count of a POI.
    pub fn count(&self, poi_id: Uuid) -> usize {
        self.members.get(&poi_id).map(|set| set.len()).unwrap_or(0)
    }

    /// Whether a user is currently in a POI.
    pub fn is_member(&self, poi_id: Uuid, user_id: Uuid) -> bool {
        self.members
            .get(&poi_id)
            .is_some_and(|set| set.contains(&user_id))
    }

    /// Whether a POI has room below the given ceiling. Advisory only; the
    /// atomic [`join`](Self::join) is the authoritative test.
    pub fn can_join(&self, poi_id: Uuid, max_participants: usize) -> bool {
        self.count(poi_id) < max_participants
    }

    /// Empty a POI's member set (POI deletion). Returns the users removed.
    pub fn remove_all(&self, poi_id: Uuid) -> Vec<Uuid> {
        let users: Vec<Uuid> = self
            .members
            .remove(&poi_id)
            .map(|(_, set)| set.into_iter().collect())
            .unwrap_or_default();

        for user_id in &users {
            if let Some(mut pois) = self.by_user.get_mut(user_id) {
                pois.remove(&poi_id);
            }
        }
        users
    }

    /// The POIs a user is currently in. The engine keeps this to at most
    /// one entry; the index itself does not enforce that.
    pub fn pois_for(&self, user_id: Uuid) -> Vec<Uuid> {
        self.by_user
            .get(&user_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Remove a user from every POI (session end / expiry). Returns the
    /// affected POI ids.
    pub fn remove_user_from_all(&self, user_id: Uuid) -> Vec<Uuid> {
        let pois: Vec<Uuid> = self
            .by_user
            .remove(&user_id)
            .map(|(_, set)| set.into_iter().collect())
            .unwrap_or_default();

        for poi_id in &pois {
            if let Some(mut set) = self.members.get_mut(poi_id) {
                set.remove(&user_id);
            }
        }
        pois
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_respects_capacity() {
        let cache = ParticipationCache::new();
        let poi = Uuid::new_v4();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        assert_eq!(cache.join(poi, a, 1), JoinOutcome::Joined);
        assert_eq!(cache.join(poi, b, 1), JoinOutcome::Full);
        assert_eq!(cache.count(poi), 1);
    }

    #[test]
    fn join_twice_is_already_member() {
        let cache = ParticipationCache::new();
        let poi = Uuid::new_v4();
        let user = Uuid::new_v4();

        assert_eq!(cache.join(poi, user, 10), JoinOutcome::Joined);
        assert_eq!(cache.join(poi, user, 10), JoinOutcome::AlreadyMember);
        assert_eq!(cache.count(poi), 1);
    }

    #[test]
    fn leave_clears_both_indexes() {
        let cache = ParticipationCache::new();
        let poi = Uuid::new_v4();
        let user = Uuid::new_v4();

        cache.join(poi, user, 10);
        assert!(cache.leave(poi, user));
        assert!(!cache.is_member(poi, user));
        assert!(cache.pois_for(user).is_empty());

        // Leaving again is a no-op
        assert!(!cache.leave(poi, user));
    }

    #[test]
    fn remove_all_returns_members() {
        let cache = ParticipationCache::new();
        let poi = Uuid::new_v4();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        cache.join(poi, a, 10);
        cache.join(poi, b, 10);

        let mut removed = cache.remove_all(poi);
        removed.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(removed, expected);
        assert_eq!(cache.count(poi), 0);
        assert!(cache.pois_for(a).is_empty());
    }

    #[test]
    fn remove_user_from_all_returns_pois() {
        let cache = ParticipationCache::new();
        let poi_a = Uuid::new_v4();
        let poi_b = Uuid::new_v4();
        let user = Uuid::new_v4();
        cache.join(poi_a, user, 10);
        cache.join(poi_b, user, 10);

        let mut affected = cache.remove_user_from_all(user);
        affected.sort();
        let mut expected = vec![poi_a, poi_b];
        expected.sort();
        assert_eq!(affected, expected);
        assert!(!cache.is_member(poi_a, user));
        assert!(!cache.is_member(poi_b, user));
    }

    #[test]
    fn concurrent_joins_never_exceed_capacity() {
        let cache = Arc::new(ParticipationCache::new());
        let poi = Uuid::new_v4();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cache = cache.clone();
                std::thread::spawn(move || cache.join(poi, Uuid::new_v4(), 4))
            })
            .collect();

        let joined = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|o| *o == JoinOutcome::Joined)
            .count();

        assert_eq!(joined, 4);
        assert_eq!(cache.count(poi), 4);
    }
}
