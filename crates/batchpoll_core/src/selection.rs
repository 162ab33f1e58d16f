use std::collections::BTreeSet;

use crate::ItemId;

/// Items the user has marked for the next batch action.
///
/// Every mutation is idempotent and reports whether the set changed, so the
/// owner knows when the "can submit" flag must be recomputed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SelectionSet {
    ids: BTreeSet<ItemId>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, id: ItemId) -> bool {
        self.ids.insert(id)
    }

    pub fn remove(&mut self, id: ItemId) -> bool {
        self.ids.remove(&id)
    }

    /// Adds (`checked`) or removes every id in `all_ids`.
    pub fn toggle_all(&mut self, all_ids: &[ItemId], checked: bool) -> bool {
        let mut changed = false;
        for &id in all_ids {
            changed |= if checked { self.add(id) } else { self.remove(id) };
        }
        changed
    }

    pub fn clear(&mut self) -> bool {
        let changed = !self.ids.is_empty();
        self.ids.clear();
        changed
    }

    pub fn size(&self) -> usize {
        self.ids.len()
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.ids.contains(&id)
    }

    pub fn can_submit(&self) -> bool {
        !self.ids.is_empty()
    }

    /// Ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.ids.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::SelectionSet;

    #[test]
    fn duplicate_add_and_absent_remove_are_noops() {
        let mut set = SelectionSet::new();
        assert!(set.add(3));
        assert!(!set.add(3));
        assert_eq!(set.size(), 1);
        assert!(!set.remove(42));
        assert!(set.contains(3));
    }

    #[test]
    fn toggle_all_adds_and_removes() {
        let mut set = SelectionSet::new();
        set.add(1);
        assert!(set.toggle_all(&[1, 2, 3], true));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert!(!set.toggle_all(&[1, 2, 3], true));
        assert!(set.toggle_all(&[2, 3], false));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn can_submit_tracks_emptiness() {
        let mut set = SelectionSet::new();
        let ops: [(&str, u64); 7] = [
            ("add", 1),
            ("add", 2),
            ("remove", 1),
            ("remove", 1),
            ("remove", 2),
            ("add", 5),
            ("clear", 0),
        ];
        for (op, id) in ops {
            match op {
                "add" => {
                    set.add(id);
                }
                "remove" => {
                    set.remove(id);
                }
                _ => {
                    set.clear();
                }
            }
            assert_eq!(set.can_submit(), set.size() > 0, "after {op} {id}");
        }
        assert!(!set.can_submit());
        assert!(!set.clear());
    }
}
