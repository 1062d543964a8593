//! Generation-checked slot storage for mesh records.
//!
//! Triangles, points and diamonds reference each other cyclically. They are
//! stored here and addressed by `{slot, generation}` keys: a freed slot bumps
//! its generation, so an id kept past its record's lifetime no longer
//! resolves.

use std::fmt;
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

/// Raw `{slot, generation}` pair shared by all typed ids.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct RawId {
    slot: u32,
    generation: u32,
}

impl RawId {
    const UNLINKED: Self = Self {
        slot: u32::MAX,
        generation: u32::MAX,
    };
}

/// A typed arena key.
pub(crate) trait Key: Copy {
    fn from_raw(raw: RawId) -> Self;
    fn raw(self) -> RawId;
}

macro_rules! arena_key {
    ($(#[$meta:meta])* $name:ident, $tag:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(RawId);

        impl $name {
            /// Placeholder for a link that has not been wired yet.
            /// Never resolves to a live record.
            pub const UNLINKED: Self = Self(RawId::UNLINKED);

            /// Slot index, stable for the lifetime of the record.
            pub fn slot(self) -> u32 {
                self.0.slot
            }
        }

        impl Key for $name {
            fn from_raw(raw: RawId) -> Self {
                Self(raw)
            }

            fn raw(self) -> RawId {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.0 == RawId::UNLINKED {
                    write!(f, concat!($tag, "(unlinked)"))
                } else {
                    write!(f, concat!($tag, "({}v{})"), self.0.slot, self.0.generation)
                }
            }
        }
    };
}

arena_key!(
    /// Id of a mesh vertex.
    PointId,
    "P"
);
arena_key!(
    /// Id of a mesh triangle (leaf or internal).
    TriangleId,
    "T"
);
arena_key!(
    /// Id of a split diamond.
    DiamondId,
    "D"
);

enum Entry<T> {
    Occupied { generation: u32, value: T },
    Vacant { generation: u32, next_free: Option<u32> },
}

/// Slot storage with free-list reuse and generation checks.
pub(crate) struct Arena<K, T> {
    entries: Vec<Entry<T>>,
    free_head: Option<u32>,
    len: usize,
    _key: PhantomData<K>,
}

impl<K: Key, T> Default for Arena<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Key, T> Arena<K, T> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::new(),
            free_head: None,
            len: 0,
            _key: PhantomData,
        }
    }

    /// Store a value and return its key.
    pub(crate) fn insert(&mut self, value: T) -> K {
        self.len += 1;
        if let Some(slot) = self.free_head {
            let entry = &mut self.entries[slot as usize];
            let Entry::Vacant {
                generation,
                next_free,
            } = *entry
            else {
                unreachable!("free list points at an occupied slot");
            };
            self.free_head = next_free;
            *entry = Entry::Occupied { generation, value };
            return K::from_raw(RawId { slot, generation });
        }

        // u32::MAX is reserved for unlinked ids.
        let slot = match u32::try_from(self.entries.len()) {
            Ok(slot) if slot != u32::MAX => slot,
            _ => panic!("arena slot count exceeds u32"),
        };
        self.entries.push(Entry::Occupied {
            generation: 0,
            value,
        });
        K::from_raw(RawId {
            slot,
            generation: 0,
        })
    }

    /// Remove a value, invalidating its key. Returns `None` for stale keys.
    pub(crate) fn remove(&mut self, key: K) -> Option<T> {
        let raw = key.raw();
        let entry = self.entries.get_mut(raw.slot as usize)?;
        match entry {
            Entry::Occupied { generation, .. } if *generation == raw.generation => {}
            _ => return None,
        }
        let old = std::mem::replace(
            entry,
            Entry::Vacant {
                generation: raw.generation.wrapping_add(1),
                next_free: self.free_head,
            },
        );
        self.free_head = Some(raw.slot);
        self.len -= 1;
        match old {
            Entry::Occupied { value, .. } => Some(value),
            Entry::Vacant { .. } => unreachable!(),
        }
    }

    pub(crate) fn get(&self, key: K) -> Option<&T> {
        let raw = key.raw();
        match self.entries.get(raw.slot as usize)? {
            Entry::Occupied { generation, value } if *generation == raw.generation => Some(value),
            _ => None,
        }
    }

    pub(crate) fn get_mut(&mut self, key: K) -> Option<&mut T> {
        let raw = key.raw();
        match self.entries.get_mut(raw.slot as usize)? {
            Entry::Occupied { generation, value } if *generation == raw.generation => Some(value),
            _ => None,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Iterate over live `(key, value)` pairs in slot order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (K, &T)> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(slot, entry)| match entry {
                Entry::Occupied { generation, value } => Some((
                    K::from_raw(RawId {
                        slot: slot as u32,
                        generation: *generation,
                    }),
                    value,
                )),
                Entry::Vacant { .. } => None,
            })
    }
}

impl<K: Key + fmt::Debug, T> Index<K> for Arena<K, T> {
    type Output = T;

    fn index(&self, key: K) -> &T {
        match self.get(key) {
            Some(value) => value,
            None => panic!("stale or unlinked arena id {key:?}"),
        }
    }
}

impl<K: Key + fmt::Debug, T> IndexMut<K> for Arena<K, T> {
    fn index_mut(&mut self, key: K) -> &mut T {
        match self.get_mut(key) {
            Some(value) => value,
            None => panic!("stale or unlinked arena id {key:?}"),
        }
    }
}
