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

//! Implementation of the [`Parser`] type to read on-the-wire DNS
//! messages.

use std::fmt;

use super::constants::*;
use super::{Edns, Flag, Header, Question, Section};
use crate::class::Class;
use crate::name::{self, Name};
use crate::rr::{rdata, Rdata, ResourceRecord, Type};

////////////////////////////////////////////////////////////////////////
// PARSER                                                             //
////////////////////////////////////////////////////////////////////////

/// A "frame" around a buffer containing a DNS message that enables
/// reading the message data.
///
/// Construction through [`Parser::new`] validates the framing of the
/// whole message: the header must be present, each section must hold
/// as many entries as its count declares, and no octets may follow the
/// last section. Names and RDATA are only skipped over at this point;
/// they are decoded when the entry is retrieved with
/// [`Parser::get_record`].
///
/// The parser keeps a cursor just past the most recently retrieved
/// entry. Retrieving entries in order thus costs one skip per entry,
/// while retrieving an earlier entry (or an entry in another section)
/// rescans from the start of the section.
#[derive(Clone)]
pub struct Parser<'a> {
    octets: &'a [u8],
    header: Header,
    counts: [u16; 4],
    starts: [usize; 4],
    cursor: Cursor,
}

/// The position of the next entry after the one most recently
/// retrieved.
#[derive(Clone, Copy, Debug)]
struct Cursor {
    section: Section,
    index: u16,
    offset: usize,
}

/// A question or resource record as returned by
/// [`Parser::get_record`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Record {
    Question(Question),
    Resource(ResourceRecord),
}

impl<'a> Parser<'a> {
    /// Creates a `Parser` for the message in `octets`, locating the
    /// start of each section.
    pub fn new(octets: &'a [u8]) -> Result<Self> {
        if octets.len() < HEADER_SIZE {
            return Err(Error::Truncated);
        }
        let header = Header::read(octets).ok_or(Error::Truncated)?;
        let counts = [
            read_u16(octets, QDCOUNT_START)?,
            read_u16(octets, ANCOUNT_START)?,
            read_u16(octets, NSCOUNT_START)?,
            read_u16(octets, ARCOUNT_START)?,
        ];

        let mut starts = [HEADER_SIZE; 4];
        let mut offset = HEADER_SIZE;
        for section in Section::ALL {
            starts[section.index()] = offset;
            for _ in 0..counts[section.index()] {
                offset += skip_entry(octets, offset, section)?;
            }
        }
        if offset != octets.len() {
            return Err(Error::TrailingData);
        }

        Ok(Self {
            octets,
            header,
            counts,
            starts,
            cursor: Cursor {
                section: Section::Question,
                index: 0,
                offset: HEADER_SIZE,
            },
        })
    }

    /// Returns the message header.
    pub fn header(&self) -> Header {
        self.header
    }

    /// Returns the 16-bit ID of the message.
    pub fn id(&self) -> u16 {
        self.header.id
    }

    /// Returns the value of a field of the header flags word.
    pub fn flag(&self, flag: Flag) -> u16 {
        self.header.flag(flag)
    }

    /// Returns the number of entries in a section.
    pub fn count(&self, section: Section) -> u16 {
        self.counts[section.index()]
    }

    /// Returns the underlying message.
    pub fn octets(&self) -> &'a [u8] {
        self.octets
    }

    /// Retrieves entry `index` of `section`. Entries of the question
    /// section are returned as [`Record::Question`]; all others as
    /// [`Record::Resource`].
    pub fn get_record(&mut self, section: Section, index: u16) -> Result<Record> {
        if index >= self.count(section) {
            return Err(Error::OutOfRange);
        }

        let (mut offset, mut at) =
            if self.cursor.section == section && self.cursor.index <= index {
                (self.cursor.offset, self.cursor.index)
            } else {
                (self.starts[section.index()], 0)
            };
        while at < index {
            offset += skip_entry(self.octets, offset, section)?;
            at += 1;
        }

        let (record, len) = read_entry(self.octets, offset, section)?;
        self.cursor = Cursor {
            section,
            index: index + 1,
            offset: offset + len,
        };
        Ok(record)
    }

    /// Returns an iterator over the records of a section, in order.
    pub fn records(&mut self, section: Section) -> Records<'_, 'a> {
        Records {
            parser: self,
            section,
            index: 0,
        }
    }

    /// Returns the EDNS fields of the first OPT record in the
    /// additional section, if there is one.
    pub fn edns(&self) -> Option<Edns> {
        let mut offset = self.starts[Section::Additional.index()];
        for _ in 0..self.count(Section::Additional) {
            let name_len = name::skip(self.octets, offset).ok()?;
            let fields = offset + name_len;
            if read_u16(self.octets, fields).ok()? == u16::from(Type::OPT) {
                let class = read_u16(self.octets, fields + 2).ok()?;
                let ttl = read_u32(self.octets, fields + 4).ok()?;
                return Some(Edns::from_opt(class, ttl));
            }
            offset += skip_entry(self.octets, offset, Section::Additional).ok()?;
        }
        None
    }
}

impl fmt::Debug for Parser<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Parser")
            .field("header", &self.header)
            .field("qdcount", &self.counts[0])
            .field("ancount", &self.counts[1])
            .field("nscount", &self.counts[2])
            .field("arcount", &self.counts[3])
            .field("cursor", &self.cursor)
            .finish()
    }
}

/// An iterator over the records of one section of a message. See
/// [`Parser::records`].
pub struct Records<'p, 'a> {
    parser: &'p mut Parser<'a>,
    section: Section,
    index: u16,
}

impl Iterator for Records<'_, '_> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.parser.count(self.section) {
            None
        } else {
            let record = self.parser.get_record(self.section, self.index);
            self.index += 1;
            Some(record)
        }
    }
}

////////////////////////////////////////////////////////////////////////
// HELPERS                                                            //
////////////////////////////////////////////////////////////////////////

/// Returns the length of the entry of `section` at `&octets[offset]`,
/// checking only that its fields fit within the message.
fn skip_entry(octets: &[u8], offset: usize, section: Section) -> Result<usize> {
    let name_len = name::skip(octets, offset)?;
    let fields = offset + name_len;
    if section == Section::Question {
        if fields + 4 > octets.len() {
            Err(Error::Truncated)
        } else {
            Ok(name_len + 4)
        }
    } else {
        let rdlength = read_u16(octets, fields + 8)? as usize;
        if fields + 10 + rdlength > octets.len() {
            Err(Error::Truncated)
        } else {
            Ok(name_len + 10 + rdlength)
        }
    }
}

/// Decodes the entry of `section` at `&octets[offset]`, returning it
/// along with its length.
fn read_entry(octets: &[u8], offset: usize, section: Section) -> Result<(Record, usize)> {
    let (owner, name_len) = Name::decompress(octets, offset)?;
    let fields = offset + name_len;
    let rr_type = read_u16(octets, fields)?;
    let class = read_u16(octets, fields + 2)?;
    if section == Section::Question {
        let question = Question::new(owner, rr_type, class);
        return Ok((Record::Question(question), name_len + 4));
    }

    let rr_type = Type::from(rr_type);
    let ttl = read_u32(octets, fields + 4)?;
    let rdlength = read_u16(octets, fields + 8)?;
    let rdata = Rdata::decode(rr_type, octets, fields + 10, rdlength)?;
    let record = ResourceRecord {
        owner,
        rr_type,
        class: Class::from(class),
        ttl,
        rdata,
    };
    Ok((Record::Resource(record), name_len + 10 + rdlength as usize))
}

/// Reads a network-byte-order `u16` at `&octets[offset]`.
fn read_u16(octets: &[u8], offset: usize) -> Result<u16> {
    let array = octets
        .get(offset..offset + 2)
        .ok_or(Error::Truncated)?
        .try_into()
        .or(Err(Error::Truncated))?;
    Ok(u16::from_be_bytes(array))
}

/// Reads a network-byte-order `u32` at `&octets[offset]`.
fn read_u32(octets: &[u8], offset: usize) -> Result<u32> {
    let array = octets
        .get(offset..offset + 4)
        .ok_or(Error::Truncated)?
        .try_into()
        .or(Err(Error::Truncated))?;
    Ok(u32::from_be_bytes(array))
}

////////////////////////////////////////////////////////////////////////
// ERRORS                                                             //
////////////////////////////////////////////////////////////////////////

/// An error signaling that a message could not be parsed.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Error {
    /// The message ended before the header, or an entry declared by
    /// one of the section counts, was complete.
    Truncated,

    /// Octets remained after the last section.
    TrailingData,

    /// The requested entry index is beyond the section count.
    OutOfRange,

    /// A domain name was malformed.
    InvalidName(name::Error),

    /// RDATA could not be decoded.
    InvalidRdata(rdata::Error),
}

impl From<name::Error> for Error {
    fn from(err: name::Error) -> Self {
        match err {
            name::Error::Truncated => Self::Truncated,
            other => Self::InvalidName(other),
        }
    }
}

impl From<rdata::Error> for Error {
    fn from(err: rdata::Error) -> Self {
        Self::InvalidRdata(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::Truncated => f.write_str("unexpected end of message"),
            Self::TrailingData => f.write_str("trailing data after message"),
            Self::OutOfRange => f.write_str("record index out of range"),
            Self::InvalidName(err) => write!(f, "invalid name: {}", err),
            Self::InvalidRdata(err) => write!(f, "invalid RDATA: {}", err),
        }
    }
}

impl std::error::Error for Error {}

/// The type returned by fallible [`Parser`] methods.
pub type Result<T> = std::result::Result<T, Error>;

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
