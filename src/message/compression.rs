// Copyright 2022 Matthew Ingwersen.
//
// Licensed under the Apache License, Version 2.0 (the "License"); you
// may not use this file except in compliance with the License. You may
// obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or
// implied. See the License for the specific language governing
// permissions and limitations under the License.

//! Implementation of the [`CompressionTable`] used by the
//! [`Writer`](super::Writer).

use super::constants::POINTER_MAX;
use crate::name::Name;

/// The offsets within a message at which names (and thus their
/// suffixes) have been written, for use as compression pointer
/// targets.
///
/// Only offsets that a pointer can express (those up to 0x3fff) are
/// kept. Lookups read the candidate names directly from the message
/// written so far, so the table itself is just a list of offsets.
#[derive(Clone, Debug, Default)]
pub struct CompressionTable {
    offsets: Vec<u16>,
}

impl CompressionTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of recorded offsets.
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Returns whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Drops all but the first `len` recorded offsets. Used to roll
    /// back failed writes.
    pub fn truncate(&mut self, len: usize) {
        self.offsets.truncate(len);
    }

    /// Records that a label was written at `offset`. Offsets too large
    /// for a pointer are ignored.
    pub fn record(&mut self, offset: usize) {
        if offset <= POINTER_MAX {
            self.offsets.push(offset as u16);
        }
    }

    /// Searches `message` for the longest suffix of `name` that starts
    /// at a recorded offset. On success, returns the position within
    /// [`Name::wire_repr`] where the suffix begins (i.e. the number of
    /// octets that still have to be written literally) and the offset
    /// to point to.
    pub fn find(&self, message: &[u8], name: &Name) -> Option<(usize, u16)> {
        let wire = name.wire_repr();
        name.label_offsets().find_map(|suffix_start| {
            let suffix = &wire[suffix_start..];
            self.offsets
                .iter()
                .find(|offset| suffix_matches(message, **offset as usize, suffix))
                .map(|offset| (suffix_start, *offset))
        })
    }
}

/// Checks whether the (possibly compressed) name at
/// `&message[position]` is equal to the uncompressed name `suffix`,
/// ignoring ASCII case.
///
/// Only backward pointers are followed, so this always terminates.
/// Anything unexpected in the message counts as a mismatch.
fn suffix_matches(message: &[u8], mut position: usize, mut suffix: &[u8]) -> bool {
    loop {
        let len = match message.get(position) {
            Some(len) => *len,
            None => return false,
        };
        match len & 0xc0 {
            0x00 => {
                let wire_len = 1 + len as usize;
                let stored = message.get(position..position + wire_len);
                let wanted = suffix.get(..wire_len);
                match (stored, wanted) {
                    (Some(stored), Some(wanted)) if stored.eq_ignore_ascii_case(wanted) => {
                        if len == 0 {
                            return true;
                        }
                        position += wire_len;
                        suffix = &suffix[wire_len..];
                    }
                    _ => return false,
                }
            }
            0xc0 => {
                let low = match message.get(position + 1) {
                    Some(low) => *low as usize,
                    None => return false,
                };
                let target = (((len & 0x3f) as usize) << 8) | low;
                if target >= position {
                    return false;
                }
                position = target;
            }
            _ => return false,
        }
    }
}
