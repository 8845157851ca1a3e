// Copyright 2021 Matthew Ingwersen.
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

//! Implementation of domain names and the name codec.
//!
//! A [`Name`] always holds an uncompressed on-the-wire representation.
//! Conversions to and from the presentation format are provided by the
//! [`FromStr`] and [`Display`](fmt::Display) implementations (also
//! available as [`compress_from_text`] and [`decompress_to_text`]),
//! while [`Name::decompress`] and [`skip`] deal with compressed names
//! inside DNS messages.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::iter::FusedIterator;
use std::str::FromStr;

use arrayvec::ArrayVec;

mod error;
mod wire;
pub use error::Error;
pub use wire::{decompress_to_text, skip};

/// The maximum length of the uncompressed on-the-wire representation of
/// a domain name.
pub const MAX_WIRE_LEN: usize = 255;

/// The maximum length of a label in a domain name (not including the
/// octet that provides the length).
pub const MAX_LABEL_LEN: usize = 63;

////////////////////////////////////////////////////////////////////////
// NAME STRUCTURE                                                     //
////////////////////////////////////////////////////////////////////////

/// A domain name.
///
/// Internally, a `Name` is the uncompressed on-the-wire representation
/// defined in [RFC 1035 § 3.1]: a sequence of length-prefixed labels
/// terminated by the null (root) label. The representation is stored
/// inline, so a `Name` never allocates, and this module only ever
/// constructs `Name`s whose representation is valid (no label longer
/// than 63 octets, no more than 255 octets in total, no compression
/// pointers).
///
/// `Name`s can be constructed
///
/// * from the presentation format, through the [`FromStr`]
///   implementation;
/// * from compressed on-the-wire names inside a DNS message, through
///   [`Name::decompress`]; and
/// * as the root, through [`Name::root`].
///
/// In accordance with [RFC 4343], comparison and hashing of `Name`s
/// are ASCII-case-insensitive, while the original case is kept for
/// display and serialization.
///
/// [RFC 1035 § 3.1]: https://datatracker.ietf.org/doc/html/rfc1035#section-3.1
/// [RFC 4343]: https://datatracker.ietf.org/doc/html/rfc4343
#[derive(Clone)]
pub struct Name {
    wire: ArrayVec<u8, MAX_WIRE_LEN>,
}

////////////////////////////////////////////////////////////////////////
// NAME PUBLIC API                                                    //
////////////////////////////////////////////////////////////////////////

impl Name {
    /// Returns a `Name` representing the DNS root, `.`.
    pub fn root() -> Self {
        let mut wire = ArrayVec::new();
        wire.push(0);
        Self { wire }
    }

    /// Returns whether the `Name` is the DNS root `.`.
    pub fn is_root(&self) -> bool {
        self.wire.len() == 1
    }

    /// Returns an iterator over the labels of this `Name`, from left to
    /// right. The null label at the end is not included.
    pub fn labels(&self) -> Labels {
        Labels {
            wire: &self.wire,
            offset: 0,
        }
    }

    /// Returns the number of labels in this `Name`, not counting the
    /// null label. The root has zero labels.
    pub fn label_count(&self) -> usize {
        self.labels().count()
    }

    /// Returns the uncompressed on-the-wire representation of the
    /// `Name`.
    pub fn wire_repr(&self) -> &[u8] {
        &self.wire
    }

    /// Returns the offsets within [`Name::wire_repr`] at which each
    /// (non-null) label starts. Each offset is also the start of a
    /// suffix of the name.
    pub fn label_offsets(&self) -> impl Iterator<Item = usize> + '_ {
        let mut offset = 0;
        std::iter::from_fn(move || {
            let len = self.wire[offset] as usize;
            if len == 0 {
                None
            } else {
                let start = offset;
                offset += len + 1;
                Some(start)
            }
        })
    }

    /// Decompresses the name starting at index `start` of `message`.
    /// Pointers are followed, with indices interpreted relative to the
    /// start of `message`, so the intention is for an entire DNS message
    /// to be passed in.
    ///
    /// On success, the `Name` is returned along with the number of
    /// octets the name occupies at `start` (up to and including the
    /// first pointer, if any).
    pub fn decompress(message: &[u8], start: usize) -> Result<(Self, usize), Error> {
        wire::decompress(message, start)
    }

    /// Appends a label to the end of an under-construction name. This
    /// is for use by this module's parsers only.
    fn push_label(wire: &mut ArrayVec<u8, MAX_WIRE_LEN>, label: &[u8]) -> Result<(), Error> {
        if label.len() > MAX_LABEL_LEN {
            return Err(Error::LabelTooLong);
        }
        wire.try_push(label.len() as u8).or(Err(Error::NameTooLong))?;
        wire.try_extend_from_slice(label).or(Err(Error::NameTooLong))
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_root() {
            return f.write_str(".");
        }
        for (i, label) in self.labels().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write_escaped_label(f, label)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "\"{}\"", self)
    }
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        // Length octets are at most 63 and thus never ASCII letters, so
        // a case-insensitive comparison of the whole representation is
        // a case-insensitive comparison of the labels.
        self.wire.eq_ignore_ascii_case(&other.wire)
    }
}

impl Eq for Name {}

impl Hash for Name {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for octet in self.wire.iter() {
            state.write_u8(octet.to_ascii_lowercase());
        }
    }
}

/// Writes a label in presentation format.
///
/// The characters `"`, `.`, `;`, `\`, `(`, `)`, `@`, and `$` are
/// special in master files and are escaped with a backslash. Octets
/// that are not printable ASCII are written as `\DDD`, where `DDD` is
/// the three-digit decimal value of the octet.
fn write_escaped_label(f: &mut fmt::Formatter, label: &[u8]) -> fmt::Result {
    for octet in label {
        match *octet {
            b'"' | b'.' | b';' | b'\\' | b'(' | b')' | b'@' | b'$' => {
                write!(f, "\\{}", *octet as char)?
            }
            0x21..=0x7e => write!(f, "{}", *octet as char)?,
            _ => write!(f, "\\{:03}", *octet)?,
        }
    }
    Ok(())
}

////////////////////////////////////////////////////////////////////////
// ITERATION OVER A NAME'S LABELS                                     //
////////////////////////////////////////////////////////////////////////

/// An iterator over the labels in a [`Name`], as octet slices.
///
/// To use this iterator, construct one from a [`Name`] using
/// [`Name::labels`].
#[derive(Clone, Debug)]
pub struct Labels<'a> {
    wire: &'a [u8],
    offset: usize,
}

impl<'a> Iterator for Labels<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        let len = self.wire[self.offset] as usize;
        if len == 0 {
            None
        } else {
            let label = &self.wire[self.offset + 1..self.offset + 1 + len];
            self.offset += len + 1;
            Some(label)
        }
    }
}

impl FusedIterator for Labels<'_> {}

////////////////////////////////////////////////////////////////////////
// PARSING OF NAMES FROM RUST STRINGS                                 //
////////////////////////////////////////////////////////////////////////

/// Allows for conversion of a Rust [`str`] in presentation format into
/// a [`Name`]. The passed string must be strictly ASCII. Escape
/// sequences as defined by [RFC 4343 § 2.1] are supported. The final
/// dot is optional: `example.com` and `example.com.` parse to the same
/// name, and `.` is the root.
///
/// [RFC 4343 § 2.1]: https://datatracker.ietf.org/doc/html/rfc4343#section-2.1
impl FromStr for Name {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(Error::StrEmpty);
        } else if s == "." {
            return Ok(Self::root());
        }

        let mut remaining_octets: &[u8] = s.as_ref();
        let mut wire = ArrayVec::new();
        let mut label = ArrayVec::<u8, MAX_LABEL_LEN>::new();

        // NOTE: to check that the string is ASCII, it suffices to check
        // that each octet is ASCII as we go. This is because all
        // multi-byte characters start with an octet that is not ASCII.
        while let Some(&octet) = remaining_octets.first() {
            if octet == b'\\' {
                let (value, consumed) = parse_escape(&remaining_octets[1..])?;
                label.try_push(value).or(Err(Error::LabelTooLong))?;
                remaining_octets = &remaining_octets[consumed + 1..];
            } else if octet == b'.' {
                if label.is_empty() {
                    return Err(Error::EmptyLabel);
                }
                Self::push_label(&mut wire, &label)?;
                label.clear();
                remaining_octets = &remaining_octets[1..];
            } else if !octet.is_ascii() {
                return Err(Error::StrNotAscii);
            } else {
                label.try_push(octet).or(Err(Error::LabelTooLong))?;
                remaining_octets = &remaining_octets[1..];
            }
        }

        // A name without the final dot still ends with the null label.
        if !label.is_empty() {
            Self::push_label(&mut wire, &label)?;
        }
        wire.try_push(0).or(Err(Error::NameTooLong))?;
        Ok(Self { wire })
    }
}

/// Converts a name in presentation format into its uncompressed
/// on-the-wire form. This is the same as parsing a [`Name`] through
/// its [`FromStr`] implementation; compression only happens when a
/// [`Writer`](crate::message::Writer) places the name in a message.
pub fn compress_from_text(text: &str) -> Result<Name, Error> {
    text.parse()
}

/// Parses an escape sequence. We expect `remaining_octets` to start
/// with the octet immediately *after* the backslash that introduces the
/// escape sequence.
pub(crate) fn parse_escape(remaining_octets: &[u8]) -> Result<(u8, usize), Error> {
    if remaining_octets.is_empty() {
        Err(Error::InvalidEscape)
    } else if remaining_octets[0].is_ascii_digit() {
        if remaining_octets.len() < 3
            || !remaining_octets[1].is_ascii_digit()
            || !remaining_octets[2].is_ascii_digit()
        {
            Err(Error::InvalidEscape)
        } else {
            let hundreds = (remaining_octets[0] - b'0') as usize;
            let tens = (remaining_octets[1] - b'0') as usize;
            let ones = (remaining_octets[2] - b'0') as usize;
            let value = 100 * hundreds + 10 * tens + ones;
            if value > 255 {
                Err(Error::InvalidEscape)
            } else {
                Ok((value as u8, 3))
            }
        }
    } else if !remaining_octets[0].is_ascii() {
        Err(Error::StrNotAscii)
    } else {
        Ok((remaining_octets[0], 1))
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_has_expected_characteristics() {
        let root = Name::root();
        assert!(root.is_root());
        assert_eq!(root.label_count(), 0);
        assert_eq!(root.wire_repr(), &[0]);
        assert_eq!(root.to_string(), ".");
        assert_eq!(".".parse(), Ok(root));
    }

    #[test]
    fn fromstr_works() {
        let name: Name = "example.test.".parse().unwrap();
        assert_eq!(name.wire_repr(), b"\x07example\x04test\x00");
        let relative: Name = "example.test".parse().unwrap();
        assert_eq!(relative.wire_repr(), b"\x07example\x04test\x00");
    }

    #[test]
    fn fromstr_handles_escapes() {
        let name: Name = "a\\.b\\000\\255.test".parse().unwrap();
        assert_eq!(name.wire_repr(), b"\x05a.b\x00\xff\x04test\x00");
    }

    #[test]
    fn fromstr_rejects_bad_input() {
        assert_eq!("".parse::<Name>(), Err(Error::StrEmpty));
        assert_eq!("a..b".parse::<Name>(), Err(Error::EmptyLabel));
        assert_eq!(".a".parse::<Name>(), Err(Error::EmptyLabel));
        assert_eq!("a\\256".parse::<Name>(), Err(Error::InvalidEscape));
        assert_eq!("a\\25".parse::<Name>(), Err(Error::InvalidEscape));
        assert_eq!("a\\".parse::<Name>(), Err(Error::InvalidEscape));
        assert_eq!("ü.test".parse::<Name>(), Err(Error::StrNotAscii));
    }

    #[test]
    fn fromstr_enforces_length_limits() {
        let long_label = "x".repeat(64);
        assert_eq!(long_label.parse::<Name>(), Err(Error::LabelTooLong));
        let ok_label = "x".repeat(63);
        assert!(ok_label.parse::<Name>().is_ok());

        // 127 labels of one octet each take 254 octets, which leaves
        // exactly one octet for the null label.
        let longest = vec!["x"; 127].join(".");
        assert_eq!(longest.parse::<Name>().unwrap().wire_repr().len(), 255);
        let too_long = vec!["x"; 128].join(".");
        assert_eq!(too_long.parse::<Name>(), Err(Error::NameTooLong));
    }

    #[test]
    fn display_escapes_special_and_unprintable_octets() {
        let name: Name = "a\\.b\\\"\\;\\(\\)\\@\\$\\\\.\\032\\127\\200".parse().unwrap();
        assert_eq!(
            name.to_string(),
            "a\\.b\\\"\\;\\(\\)\\@\\$\\\\.\\032\\127\\200"
        );
    }

    #[test]
    fn text_round_trips() {
        for text in ["example.com", "*.x-y.example", "\\000a\\.b.c", "a"] {
            let name: Name = text.parse().unwrap();
            assert_eq!(name.to_string(), text);
        }
    }

    #[test]
    fn comparison_is_case_insensitive() {
        use std::collections::HashSet;

        let lower: Name = "example.com".parse().unwrap();
        let upper: Name = "EXAMPLE.Com".parse().unwrap();
        assert_eq!(lower, upper);
        assert_eq!(upper.to_string(), "EXAMPLE.Com");
        let set: HashSet<Name> = [lower, upper].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn labels_and_offsets_work() {
        let name: Name = "a.bb.ccc".parse().unwrap();
        let labels: Vec<&[u8]> = name.labels().collect();
        assert_eq!(labels, vec![&b"a"[..], b"bb", b"ccc"]);
        assert_eq!(name.label_count(), 3);
        let offsets: Vec<usize> = name.label_offsets().collect();
        assert_eq!(offsets, vec![0, 2, 5]);
    }
}
