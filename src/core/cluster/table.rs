// src/core/cluster/table.rs

//! The fixed-size table of cluster slots, built once at startup from the
//! shard partition and never resized afterward.

use crate::core::cluster::partition::{self, Block};
use crate::core::cluster::slot::{ClusterSlot, SlotState};
use crate::core::errors::OperatorError;
use std::sync::Arc;

pub struct SlotTable {
    slots: Vec<Arc<ClusterSlot>>,
}

impl SlotTable {
    pub fn new(shards: u32, clusters: u32) -> Result<Self, OperatorError> {
        let blocks = partition::partition(shards, clusters)?;
        let slots = blocks
            .into_iter()
            .enumerate()
            .map(|(id, block): (usize, Block)| Arc::new(ClusterSlot::new(id, block)))
            .collect();
        Ok(Self { slots })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, id: usize) -> Option<&Arc<ClusterSlot>> {
        self.slots.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ClusterSlot>> {
        self.slots.iter()
    }

    pub fn ready_slots(&self) -> impl Iterator<Item = &Arc<ClusterSlot>> {
        self.slots.iter().filter(|s| s.is_ready())
    }

    pub fn healthy_count(&self) -> usize {
        self.ready_slots().count()
    }

    /// Finds the first slot still `Waiting`, scanned in ascending ID order.
    /// This is the operator's entire placement policy: new connections fill
    /// the lowest free slot, never round-robin, never by load.
    pub fn next_available(&self) -> Option<&Arc<ClusterSlot>> {
        self.slots.iter().find(|s| s.state() == SlotState::Waiting)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_available_scans_in_id_order() {
        let table = SlotTable::new(16, 4).unwrap();
        let first = table.next_available().unwrap();
        assert_eq!(first.id, 0);

        first.set_state(SlotState::Ready);
        let second = table.next_available().unwrap();
        assert_eq!(second.id, 1);
    }

    #[test]
    fn healthy_count_reflects_ready_slots_only() {
        let table = SlotTable::new(16, 4).unwrap();
        assert_eq!(table.healthy_count(), 0);
        table.get(0).unwrap().set_state(SlotState::Ready);
        table.get(2).unwrap().set_state(SlotState::Connecting);
        assert_eq!(table.healthy_count(), 1);
    }

    #[test]
    fn construction_fails_on_uneven_partition() {
        assert!(SlotTable::new(10, 3).is_err());
    }
}
