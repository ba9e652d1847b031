//! Slot assignment for photos in the collage and the drop rule that swaps them.

use crate::layout::{Layout, Point, SLOT_COUNT};

/// Slot index → occupant. Each occupant appears in at most one slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlotTable<T> {
    slots: [Option<T>; SLOT_COUNT],
}

impl<T> Default for SlotTable<T> {
    fn default() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
        }
    }
}

impl<T: Copy + PartialEq> SlotTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn occupant(&self, slot: usize) -> Option<T> {
        self.slots.get(slot).copied().flatten()
    }

    /// Put `item` into `slot`, returning whatever was there before.
    ///
    /// Callers are responsible for clearing `item`'s previous slot.
    pub fn assign(&mut self, slot: usize, item: T) -> Option<T> {
        self.slots[slot].replace(item)
    }

    pub fn clear(&mut self, slot: usize) -> Option<T> {
        self.slots[slot].take()
    }

    pub fn slot_of(&self, item: T) -> Option<usize> {
        self.slots.iter().position(|s| *s == Some(item))
    }

    /// Replace `old` with `new` in whichever slot holds it.
    pub fn substitute(&mut self, old: T, new: T) -> Option<usize> {
        let slot = self.slot_of(old)?;
        self.slots[slot] = Some(new);
        Some(slot)
    }

    pub fn occupied(&self) -> impl Iterator<Item = (usize, T)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.map(|item| (i, item)))
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when no occupant is recorded in two slots.
    pub fn is_bijective(&self) -> bool {
        let items: Vec<T> = self.occupied().map(|(_, item)| item).collect();
        items
            .iter()
            .enumerate()
            .all(|(i, a)| items[i + 1..].iter().all(|b| a != b))
    }

    pub fn reset(&mut self) {
        self.slots = std::array::from_fn(|_| None);
    }
}

/// Which slot (if any) a drop at `center` lands in.
///
/// Candidates are the gap-inflated hit rectangles. With half-gap inflation
/// neighbours only touch, but if a layout ever produces overlapping targets
/// the slot whose canonical centre is nearest wins, exact ties going to the
/// lower index.
pub fn resolve_drop(layout: &Layout, center: Point) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for slot in 0..SLOT_COUNT {
        if !layout.hit_rect(slot).contains(center) {
            continue;
        }
        let dist = layout.slot_rect(slot).center().distance_sq(center);
        match best {
            Some((_, d)) if d <= dist => {}
            _ => best = Some((slot, dist)),
        }
    }
    best.map(|(slot, _)| slot)
}

/// What a drop did to the slot table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropOutcome<T> {
    /// Moved into an empty slot.
    Moved { from: usize, to: usize },
    /// Exchanged places with the previous occupant of `to`.
    Swapped { from: usize, to: usize, displaced: T },
    /// No valid target, or dropped on its own slot.
    SnappedBack { slot: usize },
}

impl<T> DropOutcome<T> {
    /// Slot the dragged item ends in.
    pub fn final_slot(&self) -> usize {
        match *self {
            DropOutcome::Moved { to, .. } | DropOutcome::Swapped { to, .. } => to,
            DropOutcome::SnappedBack { slot } => slot,
        }
    }
}

/// Apply the drop rule for `dragged`, released with its centre at `center`.
///
/// Returns `None` if `dragged` holds no slot. The table stays bijective.
pub fn reassign<T: Copy + PartialEq>(
    table: &mut SlotTable<T>,
    layout: &Layout,
    dragged: T,
    center: Point,
) -> Option<DropOutcome<T>> {
    let from = table.slot_of(dragged)?;
    let target = resolve_drop(layout, center).filter(|&to| to != from);

    let Some(to) = target else {
        return Some(DropOutcome::SnappedBack { slot: from });
    };

    table.clear(from);
    let outcome = match table.assign(to, dragged) {
        Some(displaced) => {
            table.assign(from, displaced);
            DropOutcome::Swapped {
                from,
                to,
                displaced,
            }
        }
        None => DropOutcome::Moved { from, to },
    };
    debug_assert!(table.is_bijective());
    Some(outcome)
}
