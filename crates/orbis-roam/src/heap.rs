//! Indexed binary heap with stable handles.
//!
//! The mesh keeps two of these: triangles ordered by descending error and
//! diamonds by ascending error. Unlike [`std::collections::BinaryHeap`] an
//! element can be removed or re-prioritised in O(log n) through the handle
//! returned by [`IndexedHeap::push`], which stays valid while other elements
//! come and go.

use std::cmp::Ordering;

/// Which end of the ordering [`IndexedHeap::peek`] returns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeapOrder {
    /// Largest priority first.
    Max,
    /// Smallest priority first.
    Min,
}

/// Stable reference to an element in an [`IndexedHeap`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct QueueHandle {
    slot: u32,
    generation: u32,
}

#[derive(Clone, Debug)]
struct Node<T> {
    item: T,
    priority: f64,
    slot: u32,
}

#[derive(Clone, Copy, Debug)]
struct Slot {
    /// Position in `nodes`, `None` while the slot is free.
    position: Option<usize>,
    generation: u32,
}

/// Binary heap addressed by [`QueueHandle`].
#[derive(Clone, Debug)]
pub struct IndexedHeap<T> {
    order: HeapOrder,
    nodes: Vec<Node<T>>,
    slots: Vec<Slot>,
    free_slots: Vec<u32>,
}

impl<T: Copy> IndexedHeap<T> {
    /// Create an empty heap with the given ordering.
    #[must_use]
    pub fn new(order: HeapOrder) -> Self {
        Self {
            order,
            nodes: Vec::new(),
            slots: Vec::new(),
            free_slots: Vec::new(),
        }
    }

    /// The ordering this heap was created with.
    pub fn order(&self) -> HeapOrder {
        self.order
    }

    /// Insert an element and return its handle.
    pub fn push(&mut self, item: T, priority: f64) -> QueueHandle {
        let position = self.nodes.len();
        let slot = match self.free_slots.pop() {
            Some(slot) => {
                self.slots[slot as usize].position = Some(position);
                slot
            }
            None => {
                let slot = self.slots.len() as u32;
                self.slots.push(Slot {
                    position: Some(position),
                    generation: 0,
                });
                slot
            }
        };
        self.nodes.push(Node {
            item,
            priority,
            slot,
        });
        self.sift_up(position);
        QueueHandle {
            slot,
            generation: self.slots[slot as usize].generation,
        }
    }

    /// Top element without removing it.
    pub fn peek(&self) -> Option<(T, f64)> {
        self.nodes.first().map(|node| (node.item, node.priority))
    }

    /// Remove and return the top element.
    pub fn pop(&mut self) -> Option<(T, f64)> {
        let slot = self.nodes.first()?.slot;
        let generation = self.slots[slot as usize].generation;
        self.remove(QueueHandle { slot, generation })
    }

    /// Remove an element by handle. Stale handles return `None`.
    pub fn remove(&mut self, handle: QueueHandle) -> Option<(T, f64)> {
        let position = self.position(handle)?;
        let last = self.nodes.len() - 1;
        self.swap_nodes(position, last);
        let node = self.nodes.pop()?;

        let slot = &mut self.slots[node.slot as usize];
        slot.position = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_slots.push(node.slot);

        if position < self.nodes.len() {
            self.resift(position);
        }
        Some((node.item, node.priority))
    }

    /// Change an element's priority and restore heap order.
    /// Returns `false` for stale handles.
    pub fn update_priority(&mut self, handle: QueueHandle, priority: f64) -> bool {
        let Some(position) = self.position(handle) else {
            return false;
        };
        self.nodes[position].priority = priority;
        self.resift(position);
        true
    }

    /// Current priority of an element.
    pub fn priority(&self, handle: QueueHandle) -> Option<f64> {
        self.position(handle).map(|p| self.nodes[p].priority)
    }

    /// Element stored under a handle.
    pub fn get(&self, handle: QueueHandle) -> Option<T> {
        self.position(handle).map(|p| self.nodes[p].item)
    }

    /// Whether the handle refers to a live element.
    pub fn contains(&self, handle: QueueHandle) -> bool {
        self.position(handle).is_some()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate over `(handle, item, priority)` in heap (not sorted) order.
    pub fn iter(&self) -> impl Iterator<Item = (QueueHandle, T, f64)> + '_ {
        self.nodes.iter().map(|node| {
            (
                QueueHandle {
                    slot: node.slot,
                    generation: self.slots[node.slot as usize].generation,
                },
                node.item,
                node.priority,
            )
        })
    }

    /// Drop every element. All outstanding handles go stale.
    pub fn clear(&mut self) {
        for node in self.nodes.drain(..) {
            let slot = &mut self.slots[node.slot as usize];
            slot.position = None;
            slot.generation = slot.generation.wrapping_add(1);
            self.free_slots.push(node.slot);
        }
    }

    fn position(&self, handle: QueueHandle) -> Option<usize> {
        let slot = self.slots.get(handle.slot as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.position
    }

    /// Whether `a` belongs above `b`.
    fn precedes(&self, a: f64, b: f64) -> bool {
        let ord = a.total_cmp(&b);
        match self.order {
            HeapOrder::Max => ord == Ordering::Greater,
            HeapOrder::Min => ord == Ordering::Less,
        }
    }

    fn swap_nodes(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        self.nodes.swap(a, b);
        self.slots[self.nodes[a].slot as usize].position = Some(a);
        self.slots[self.nodes[b].slot as usize].position = Some(b);
    }

    fn resift(&mut self, position: usize) {
        let position = self.sift_up(position);
        self.sift_down(position);
    }

    fn sift_up(&mut self, mut position: usize) -> usize {
        while position > 0 {
            let parent = (position - 1) / 2;
            if !self.precedes(self.nodes[position].priority, self.nodes[parent].priority) {
                break;
            }
            self.swap_nodes(position, parent);
            position = parent;
        }
        position
    }

    fn sift_down(&mut self, mut position: usize) {
        let len = self.nodes.len();
        loop {
            let left = 2 * position + 1;
            let right = left + 1;
            let mut best = position;
            if left < len && self.precedes(self.nodes[left].priority, self.nodes[best].priority) {
                best = left;
            }
            if right < len && self.precedes(self.nodes[right].priority, self.nodes[best].priority)
            {
                best = right;
            }
            if best == position {
                return;
            }
            self.swap_nodes(position, best);
            position = best;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain<T: Copy>(heap: &mut IndexedHeap<T>) -> Vec<T> {
        std::iter::from_fn(|| heap.pop().map(|(item, _)| item)).collect()
    }

    /// A max heap pops the largest priority first.
    #[test]
    fn test_max_order() {
        let mut heap = IndexedHeap::new(HeapOrder::Max);
        heap.push('a', 1.0);
        heap.push('b', 5.0);
        heap.push('c', 3.0);
        assert_eq!(heap.peek(), Some(('b', 5.0)));
        assert_eq!(drain(&mut heap), vec!['b', 'c', 'a']);
    }

    /// A min heap pops the smallest priority first.
    #[test]
    fn test_min_order() {
        let mut heap = IndexedHeap::new(HeapOrder::Min);
        heap.push('a', 1.0);
        heap.push('b', -5.0);
        heap.push('c', 3.0);
        assert_eq!(drain(&mut heap), vec!['b', 'a', 'c']);
    }

    /// Removing from the middle keeps the rest in order.
    #[test]
    fn test_remove_by_handle() {
        let mut heap = IndexedHeap::new(HeapOrder::Max);
        let handles: Vec<_> = (0..10).map(|i| heap.push(i, f64::from(i))).collect();
        assert_eq!(heap.remove(handles[4]), Some((4, 4.0)));
        assert_eq!(heap.remove(handles[9]), Some((9, 9.0)));
        assert_eq!(heap.len(), 8);
        assert_eq!(drain(&mut heap), vec![8, 7, 6, 5, 3, 2, 1, 0]);
    }

    /// A removed handle goes stale, even after its slot is reused.
    #[test]
    fn test_stale_handle_after_reuse() {
        let mut heap = IndexedHeap::new(HeapOrder::Min);
        let a = heap.push("a", 1.0);
        heap.remove(a);
        let b = heap.push("b", 2.0);
        assert!(!heap.contains(a));
        assert!(heap.remove(a).is_none());
        assert!(!heap.update_priority(a, 0.0));
        assert_eq!(heap.get(b), Some("b"));
    }

    /// Handles stay valid across interleaved pushes and removes.
    #[test]
    fn test_handles_stable_across_interleaving() {
        let mut heap = IndexedHeap::new(HeapOrder::Max);
        let keep = heap.push(100, 0.5);
        let mut others = Vec::new();
        for i in 0..50 {
            others.push(heap.push(i, f64::from(i % 7)));
            if i % 3 == 0 {
                let h = others.remove(0);
                heap.remove(h);
            }
        }
        assert_eq!(heap.get(keep), Some(100));
        assert_eq!(heap.priority(keep), Some(0.5));
        assert!(heap.update_priority(keep, 1_000.0));
        assert_eq!(heap.peek(), Some((100, 1_000.0)));
    }

    /// Lowering and raising priorities re-sifts the element.
    #[test]
    fn test_update_priority_reorders() {
        let mut heap = IndexedHeap::new(HeapOrder::Min);
        let a = heap.push('a', 1.0);
        let b = heap.push('b', 2.0);
        heap.push('c', 3.0);
        heap.update_priority(a, 10.0);
        assert_eq!(heap.peek(), Some(('b', 2.0)));
        heap.update_priority(b, 20.0);
        assert_eq!(drain(&mut heap), vec!['c', 'a', 'b']);
    }

    #[test]
    fn test_clear_invalidates_handles() {
        let mut heap = IndexedHeap::new(HeapOrder::Max);
        let a = heap.push(1, 1.0);
        heap.push(2, 2.0);
        heap.clear();
        assert!(heap.is_empty());
        assert!(!heap.contains(a));
        let c = heap.push(3, 3.0);
        assert_eq!(heap.iter().collect::<Vec<_>>(), vec![(c, 3, 3.0)]);
    }
}
