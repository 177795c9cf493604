//! # PCI Capability List
//!
//! Standard PCI capabilities form a singly-linked list inside the Configuration Space. The list
//! head lives at [`CAPABILITIES_POINTER`](offset::CAPABILITIES_POINTER), each entry starts with a
//! one byte capability ID followed by a one byte pointer to the next entry.
//!
//! The list is read from hardware we don't control, so [`walk`] tolerates cycles and pointers
//! beyond the available bytes. Both stop the walk and keep what was found so far.

use std::collections::BTreeMap;

use tracing::debug;

use super::{
    config_space::ConfigSpace,
    constants::config_space::{
        capability_id, capability_list, mask::CAPABILITIES_POINTER as CAPABILITY_POINTER_MASK,
        offset,
    },
    device::Device,
};

/// A map from capability ID to the Configuration Space offset of that capability.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilityOffsetTable {
    offsets: BTreeMap<u8, u8>,
}

impl CapabilityOffsetTable {
    /// Walk the capability list of `device`, discarding why the walk ended.
    #[must_use]
    pub fn from_device(device: &Device) -> Self {
        walk(device).table
    }

    /// The offset of the capability with the given ID.
    #[must_use]
    pub fn get(&self, id: u8) -> Option<u8> {
        self.offsets.get(&id).copied()
    }

    /// The offset of the PCI Express capability.
    #[must_use]
    pub fn express(&self) -> Option<u8> {
        self.get(capability_id::PCI_EXPRESS)
    }

    /// The number of distinct capabilities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Whether no capabilities were found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Iterate over `(id, offset)` pairs in ascending ID order.
    pub fn iter(&self) -> impl Iterator<Item = (u8, u8)> + '_ {
        self.offsets.iter().map(|(&id, &offset)| (id, offset))
    }

    /// Record a capability. A repeated ID replaces the earlier offset.
    fn insert(&mut self, id: u8, offset: u8) {
        if let Some(previous) = self.offsets.insert(id, offset) {
            debug!("Capability {id:#04x} repeats at {offset:#04x}, was at {previous:#04x}");
        }
    }
}

impl FromIterator<(u8, u8)> for CapabilityOffsetTable {
    fn from_iter<T: IntoIterator<Item = (u8, u8)>>(iter: T) -> Self {
        let mut table = Self::default();
        for (id, offset) in iter {
            table.insert(id, offset);
        }
        table
    }
}

/// Why a capability list walk stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkEnd {
    /// The status register doesn't announce a capability list.
    NoCapabilities,

    /// A next pointer of zero terminated the list.
    EndOfList,

    /// A capability ID of `0xFF` was found. This is what reads from a vanished function return.
    AbsentId {
        /// The offset of the entry with the bogus ID.
        offset: u8,
    },

    /// The list points back to an entry that was already visited.
    Cycle {
        /// The offset that was visited twice.
        offset: u8,
    },

    /// The list points beyond the available Configuration Space bytes.
    Truncated {
        /// The offset that could not be read.
        offset: usize,
    },
}

impl WalkEnd {
    /// Whether the list itself is broken, as opposed to terminating normally.
    #[must_use]
    pub const fn is_malformed(&self) -> bool {
        matches!(self, Self::Cycle { .. } | Self::Truncated { .. })
    }
}

/// The result of walking a capability list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Walk {
    /// All capabilities found before the walk ended.
    pub table: CapabilityOffsetTable,

    /// Why the walk ended.
    pub end: WalkEnd,
}

/// Remembers which 4-byte aligned offsets in the first 256 bytes were visited.
#[derive(Debug, Clone, Copy, Default)]
struct VisitedSet(u64);

impl VisitedSet {
    /// Mark `offset` as visited. Returns false if it was visited before.
    fn insert(&mut self, offset: u8) -> bool {
        let bit = 1u64 << (offset >> 2);
        let fresh = self.0 & bit == 0;
        self.0 |= bit;
        fresh
    }
}

/// An iterator that yields `(id, offset)` pairs of standard PCI capabilities.
///
/// The iterator is bounded: there are only 64 aligned offsets a capability can live at and each
/// is visited at most once.
struct CapabilityIterator<'a> {
    config_space: ConfigSpace<'a>,
    next_ptr: u8,
    visited: VisitedSet,
    end: Option<WalkEnd>,
}

impl<'a> CapabilityIterator<'a> {
    fn new(device: &'a Device) -> Self {
        let config_space = device.config_space();

        let (next_ptr, end) = if !device.has_capabilities() {
            (capability_list::END_OF_LIST, Some(WalkEnd::NoCapabilities))
        } else {
            match config_space.u8_at(offset::CAPABILITIES_POINTER) {
                Ok(ptr) => (ptr, None),
                Err(_) => (
                    capability_list::END_OF_LIST,
                    Some(WalkEnd::Truncated {
                        offset: offset::CAPABILITIES_POINTER,
                    }),
                ),
            }
        };

        Self {
            config_space,
            next_ptr,
            visited: VisitedSet::default(),
            end,
        }
    }

    fn step(&mut self) -> Result<(u8, u8), WalkEnd> {
        let cap_ptr = self.next_ptr & CAPABILITY_POINTER_MASK;

        if cap_ptr == capability_list::END_OF_LIST {
            return Err(WalkEnd::EndOfList);
        }

        if !self.visited.insert(cap_ptr) {
            return Err(WalkEnd::Cycle { offset: cap_ptr });
        }

        let pos = usize::from(cap_ptr);
        let truncated = WalkEnd::Truncated { offset: pos };
        // Both the ID and the next pointer have to be readable.
        let id = self.config_space.u8_at(pos).map_err(|_| truncated)?;
        let next = self.config_space.u8_at(pos + 1).map_err(|_| truncated)?;

        if id == capability_list::ABSENT_ID {
            return Err(WalkEnd::AbsentId { offset: cap_ptr });
        }

        self.next_ptr = next;
        Ok((id, cap_ptr))
    }
}

impl Iterator for CapabilityIterator<'_> {
    type Item = (u8, u8);

    fn next(&mut self) -> Option<Self::Item> {
        if self.end.is_some() {
            return None;
        }

        match self.step() {
            Ok(entry) => Some(entry),
            Err(end) => {
                self.end = Some(end);
                None
            }
        }
    }
}

/// Walk the capability list of `device`.
///
/// This never fails. A malformed list yields the capabilities found up to the defect and a
/// [`WalkEnd`] describing it.
#[must_use]
pub fn walk(device: &Device) -> Walk {
    let mut it = CapabilityIterator::new(device);
    let table: CapabilityOffsetTable = it.by_ref().collect();
    let end = it.end.unwrap_or(WalkEnd::EndOfList);

    if end.is_malformed() {
        debug!("{}: malformed capability list: {end:?}", device.addr);
    }

    Walk { table, end }
}
