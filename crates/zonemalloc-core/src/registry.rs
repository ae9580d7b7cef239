//! Per-class zone collections.
//!
//! A registry owns the zones of one size class as plain values; removing a
//! zone drops it, which releases its mapping. No ordering is maintained;
//! the address-sorted walk exists only for the state dump.

use crate::zone::Zone;

/// Owned, unordered collection of zones of one size class.
#[derive(Debug, Default)]
pub struct ZoneRegistry {
    zones: Vec<Zone>,
}

impl ZoneRegistry {
    #[must_use]
    pub const fn new() -> Self {
        Self { zones: Vec::new() }
    }

    /// Adds `zone` and returns its index. Indices are stable until the next
    /// removal.
    pub fn insert(&mut self, zone: Zone) -> usize {
        self.zones.push(zone);
        self.zones.len() - 1
    }

    /// Detaches and returns the zone at `index`; its mapping is released
    /// when the returned value drops. Invalidates other indices.
    pub fn remove(&mut self, index: usize) -> Zone {
        self.zones.swap_remove(index)
    }

    /// Index of the first zone whose payload contains `addr`.
    ///
    /// Linear in the number of zones. This scan dominates release and
    /// resize cost and is an accepted scalability limit of the design.
    #[must_use]
    pub fn find_owner(&self, addr: usize) -> Option<usize> {
        self.zones.iter().position(|zone| zone.contains(addr))
    }

    /// Index of the first zone carving `bin_size` blocks with spare
    /// capacity. The search is bin-aware because one class collection
    /// holds zones of several bin sizes.
    #[must_use]
    pub fn first_with_space(&self, bin_size: usize) -> Option<usize> {
        self.zones
            .iter()
            .position(|zone| zone.block_size() == bin_size && zone.has_space())
    }

    #[must_use]
    pub fn get(&self, index: usize) -> &Zone {
        &self.zones[index]
    }

    #[must_use]
    pub fn get_mut(&mut self, index: usize) -> &mut Zone {
        &mut self.zones[index]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.zones.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Drops every zone, releasing all mappings.
    pub fn clear(&mut self) {
        self.zones.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Zone> {
        self.zones.iter()
    }

    /// Free blocks across all zones in the collection.
    #[must_use]
    pub fn total_free_blocks(&self) -> usize {
        self.zones.iter().map(Zone::free_count).sum()
    }

    /// Indices in ascending payload-base order. Only the state dump
    /// depends on this ordering.
    #[must_use]
    pub fn sorted_by_base(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.zones.len()).collect();
        order.sort_by_key(|&index| self.zones[index].payload_start());
        order
    }
}
