// ABOUTME: Replica set of one service: instance number to running state.
// ABOUTME: Knows which replica is newest and which one retires next.

use std::collections::{BTreeMap, BTreeSet};

use crate::types::InstanceNum;

/// Containers of one service keyed by instance number.
///
/// Instance numbers grow monotonically as the engine scales a service up,
/// so the lowest number is always the oldest replica.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplicaSet {
    replicas: BTreeMap<InstanceNum, bool>,
}

impl ReplicaSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, instance: InstanceNum, running: bool) {
        self.replicas.insert(instance, running);
    }

    pub fn is_empty(&self) -> bool {
        self.replicas.is_empty()
    }

    pub fn len(&self) -> usize {
        self.replicas.len()
    }

    pub fn running_count(&self) -> usize {
        self.replicas.values().filter(|running| **running).count()
    }

    pub fn contains(&self, instance: InstanceNum) -> bool {
        self.replicas.contains_key(&instance)
    }

    pub fn is_running(&self, instance: InstanceNum) -> Option<bool> {
        self.replicas.get(&instance).copied()
    }

    /// Instance numbers in ascending order.
    pub fn instances(&self) -> impl Iterator<Item = InstanceNum> + '_ {
        self.replicas.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (InstanceNum, bool)> + '_ {
        self.replicas.iter().map(|(n, running)| (*n, *running))
    }

    pub fn newest(&self) -> Option<InstanceNum> {
        self.replicas.keys().next_back().copied()
    }

    pub fn oldest(&self) -> Option<InstanceNum> {
        self.replicas.keys().next().copied()
    }

    /// Pick the replica to remove next during a rolling update.
    ///
    /// Replicas retire oldest first. The newest replica is never chosen
    /// since it is the one just brought up, and replicas already retired
    /// in this rollout are skipped.
    pub fn next_to_retire(&self, retired: &BTreeSet<InstanceNum>) -> Option<InstanceNum> {
        let newest = self.newest()?;
        self.instances()
            .find(|n| *n != newest && !retired.contains(n))
    }
}

impl FromIterator<(InstanceNum, bool)> for ReplicaSet {
    fn from_iter<I: IntoIterator<Item = (InstanceNum, bool)>>(iter: I) -> Self {
        Self {
            replicas: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(instances: &[InstanceNum]) -> ReplicaSet {
        instances.iter().map(|n| (*n, true)).collect()
    }

    #[test]
    fn newest_and_oldest() {
        let replicas = set(&[3, 1, 2]);
        assert_eq!(replicas.newest(), Some(3));
        assert_eq!(replicas.oldest(), Some(1));
        assert_eq!(replicas.instances().collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn retires_oldest_first() {
        let replicas = set(&[1, 2, 3, 4]);
        assert_eq!(replicas.next_to_retire(&BTreeSet::new()), Some(1));
    }

    #[test]
    fn skips_already_retired() {
        let replicas = set(&[2, 3, 4, 5]);
        let retired = BTreeSet::from([1, 2]);
        assert_eq!(replicas.next_to_retire(&retired), Some(3));
    }

    #[test]
    fn never_retires_newest() {
        assert_eq!(set(&[7]).next_to_retire(&BTreeSet::new()), None);
        let retired = BTreeSet::from([1, 2]);
        assert_eq!(set(&[1, 2, 3]).next_to_retire(&retired), None);
    }

    #[test]
    fn counts_running() {
        let replicas: ReplicaSet = [(1, true), (2, false), (3, true)].into_iter().collect();
        assert_eq!(replicas.len(), 3);
        assert_eq!(replicas.running_count(), 2);
        assert_eq!(replicas.is_running(2), Some(false));
        assert_eq!(replicas.is_running(9), None);
    }
}
