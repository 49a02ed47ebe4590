//! Domains — per-directory groups of shuffle-eligible track indices.

/// Handle for one directory's domain.
///
/// [`Domains::open`] hands out a slot whose domain already has its place in
/// the order. A [`DomainSlot::new`] slot is unassigned until the first entry
/// from that directory is written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DomainSlot(Option<usize>);

impl DomainSlot {
    #[must_use]
    pub const fn new() -> Self {
        Self(None)
    }

    /// Position of this slot's domain, once created.
    #[must_use]
    pub const fn index(&self) -> Option<usize> {
        self.0
    }
}

/// Ordered domains, in the order their directories were entered.
///
/// A directory whose entries are all ignored or kept out of the shuffle
/// leaves an empty domain; the shuffle skips those.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Domains {
    groups: Vec<Vec<u32>>,
}

impl Domains {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the next domain for a directory about to be traversed.
    pub fn open(&mut self) -> DomainSlot {
        self.groups.push(Vec::new());
        DomainSlot(Some(self.groups.len().saturating_sub(1)))
    }

    /// Record that entry `index` was written from the directory behind `slot`.
    ///
    /// Creates the domain on first use. Only shuffle-eligible entries are
    /// added to it.
    pub fn record(&mut self, slot: &mut DomainSlot, index: u32, in_shuffle: bool) {
        let position = match slot.0 {
            Some(position) => position,
            None => {
                self.groups.push(Vec::new());
                let position = self.groups.len().saturating_sub(1);
                slot.0 = Some(position);
                position
            }
        };
        if in_shuffle {
            if let Some(group) = self.groups.get_mut(position) {
                group.push(index);
            }
        }
    }

    #[must_use]
    pub fn groups(&self) -> &[Vec<u32>] {
        &self.groups
    }

    #[must_use]
    pub fn into_groups(self) -> Vec<Vec<u32>> {
        self.groups
    }

    /// Number of shuffle-eligible tracks across all domains.
    #[must_use]
    pub fn track_count(&self) -> usize {
        self.groups.iter().map(Vec::len).sum()
    }
}

impl From<Vec<Vec<u32>>> for Domains {
    fn from(groups: Vec<Vec<u32>>) -> Self {
        Self { groups }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domains_are_created_lazily_in_contribution_order() {
        let mut domains = Domains::new();
        let mut a = DomainSlot::new();
        let mut b = DomainSlot::new();
        let _unused = DomainSlot::new();

        domains.record(&mut b, 0, true);
        domains.record(&mut a, 1, true);
        domains.record(&mut b, 2, true);

        assert_eq!(domains.groups(), &[vec![0, 2], vec![1]]);
        assert_eq!(b.index(), Some(0));
        assert_eq!(a.index(), Some(1));
    }

    #[test]
    fn opened_domains_keep_their_place_ahead_of_later_ones() {
        let mut domains = Domains::new();
        let mut parent = domains.open();
        let mut child = domains.open();
        domains.record(&mut child, 0, true);
        domains.record(&mut parent, 1, true);
        let _empty = domains.open();
        assert_eq!(domains.groups(), &[vec![1], vec![0], vec![]]);
        assert_eq!(domains.track_count(), 2);
    }

    #[test]
    fn non_shuffle_entries_create_but_do_not_fill_a_domain() {
        let mut domains = Domains::new();
        let mut slot = DomainSlot::new();
        domains.record(&mut slot, 0, false);
        domains.record(&mut slot, 1, true);
        assert_eq!(domains.groups(), &[vec![1]]);
        assert_eq!(domains.track_count(), 1);
    }
}
