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

//! Implementation of the [`Rdata`] type and DNS RDATA processing.
//!
//! RDATA is handled as a flat sequence of typed [`Field`]s. The shape
//! of the sequence is determined by the RR type:
//!
//! | type                              | fields                      |
//! |-----------------------------------|-----------------------------|
//! | A                                 | IPv4 address                |
//! | AAAA                              | IPv6 address                |
//! | NS, CNAME, PTR, DNAME, MB, MG, MR | name                        |
//! | SOA                               | 2 names, 5 × u32            |
//! | MX, AFSDB, RT                     | u16, name                   |
//! | PX                                | u16, 2 names                |
//! | SRV                               | 3 × u16, name               |
//! | MINFO, RP                         | 2 names                     |
//! | TXT                               | 1+ `<character-string>`s    |
//! | anything else                     | opaque octets               |

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use super::Type;
use crate::name::{self, Name};

mod text;

////////////////////////////////////////////////////////////////////////
// FIELDS                                                             //
////////////////////////////////////////////////////////////////////////

/// A single typed value within RDATA.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Field {
    Ipv4(Ipv4Addr),
    Ipv6(Ipv6Addr),
    U16(u16),
    U32(u32),
    Name(Name),

    /// The content of an [RFC 1035 § 3.3] `<character-string>`,
    /// without its length octet. It may be at most 255 octets long.
    ///
    /// [RFC 1035 § 3.3]: https://datatracker.ietf.org/doc/html/rfc1035#section-3.3
    CharacterString(Box<[u8]>),

    /// RDATA of a type whose structure is not known.
    Opaque(Box<[u8]>),
}

/// The kind of a [`Field`], without its value.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum FieldKind {
    Ipv4,
    Ipv6,
    U16,
    U32,
    Name,
    CharacterString,
    Opaque,
}

impl Field {
    /// Returns the [`FieldKind`] of this field.
    pub fn kind(&self) -> FieldKind {
        match self {
            Self::Ipv4(_) => FieldKind::Ipv4,
            Self::Ipv6(_) => FieldKind::Ipv6,
            Self::U16(_) => FieldKind::U16,
            Self::U32(_) => FieldKind::U32,
            Self::Name(_) => FieldKind::Name,
            Self::CharacterString(_) => FieldKind::CharacterString,
            Self::Opaque(_) => FieldKind::Opaque,
        }
    }

    /// Returns the length of the field on the wire, without
    /// compression.
    fn wire_len(&self) -> usize {
        match self {
            Self::Ipv4(_) => 4,
            Self::Ipv6(_) => 16,
            Self::U16(_) => 2,
            Self::U32(_) => 4,
            Self::Name(name) => name.wire_repr().len(),
            Self::CharacterString(octets) => 1 + octets.len(),
            Self::Opaque(octets) => octets.len(),
        }
    }

    /// Appends the uncompressed wire form of the field to `buf`.
    fn write_to(&self, buf: &mut Vec<u8>) {
        match self {
            Self::Ipv4(address) => buf.extend_from_slice(&address.octets()),
            Self::Ipv6(address) => buf.extend_from_slice(&address.octets()),
            Self::U16(value) => buf.extend_from_slice(&value.to_be_bytes()),
            Self::U32(value) => buf.extend_from_slice(&value.to_be_bytes()),
            Self::Name(name) => buf.extend_from_slice(name.wire_repr()),
            Self::CharacterString(octets) => {
                buf.push(octets.len() as u8);
                buf.extend_from_slice(octets);
            }
            Self::Opaque(octets) => buf.extend_from_slice(octets),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Ipv4(address) => address.fmt(f),
            Self::Ipv6(address) => address.fmt(f),
            Self::U16(value) => value.fmt(f),
            Self::U32(value) => value.fmt(f),
            Self::Name(name) => name.fmt(f),
            Self::CharacterString(octets) => text::write_character_string(f, octets),
            Self::Opaque(octets) => text::write_opaque(f, octets),
        }
    }
}

////////////////////////////////////////////////////////////////////////
// LAYOUTS                                                            //
////////////////////////////////////////////////////////////////////////

/// The shape of the RDATA of an RR type.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Layout {
    /// A fixed sequence of fields.
    Fixed(&'static [FieldKind]),

    /// One or more `<character-string>`s filling the RDATA.
    CharacterStrings,

    /// A single opaque field covering the whole RDATA.
    Opaque,
}

impl Layout {
    /// Returns the layout of RDATA of type `rr_type`.
    pub fn of(rr_type: Type) -> Self {
        use FieldKind as K;
        match rr_type {
            Type::A => Self::Fixed(&[K::Ipv4]),
            Type::AAAA => Self::Fixed(&[K::Ipv6]),
            Type::NS
            | Type::CNAME
            | Type::PTR
            | Type::DNAME
            | Type::MB
            | Type::MG
            | Type::MR => Self::Fixed(&[K::Name]),
            Type::SOA => Self::Fixed(&[K::Name, K::Name, K::U32, K::U32, K::U32, K::U32, K::U32]),
            Type::MX | Type::AFSDB | Type::RT => Self::Fixed(&[K::U16, K::Name]),
            Type::PX => Self::Fixed(&[K::U16, K::Name, K::Name]),
            Type::SRV => Self::Fixed(&[K::U16, K::U16, K::U16, K::Name]),
            Type::MINFO | Type::RP => Self::Fixed(&[K::Name, K::Name]),
            Type::TXT => Self::CharacterStrings,
            _ => Self::Opaque,
        }
    }
}

////////////////////////////////////////////////////////////////////////
// RDATA TYPE                                                         //
////////////////////////////////////////////////////////////////////////

/// Decoded record RDATA: a sequence of [`Field`]s.
///
/// An `Rdata` by itself does not know its RR type. Its fields are
/// checked against the [`Layout`] of a type when it is encoded with
/// [`Rdata::encode`] or written to a message.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Rdata {
    fields: Vec<Field>,
}

impl Rdata {
    /// Creates an `Rdata` from its fields.
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Returns the fields of the RDATA.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Consumes the `Rdata`, returning its fields.
    pub fn into_fields(self) -> Vec<Field> {
        self.fields
    }

    /// Returns the presentation form of each field.
    pub fn to_strings(&self) -> Vec<String> {
        self.fields.iter().map(ToString::to_string).collect()
    }

    /// Reads RDATA of type `rr_type` and length `rdlength` starting
    /// from `&message[start]`. Embedded domain names may be compressed;
    /// pointers are interpreted relative to the start of `message`, so
    /// an entire DNS message should be passed in.
    ///
    /// If `message` is not long enough to contain `rdlength` octets at
    /// `start`, or if the RDATA ends before the type's fields do, this
    /// fails with [`Error::Truncated`]. If octets remain after the
    /// fields of a fixed-shape type, this fails with
    /// [`Error::TrailingData`].
    pub fn decode(rr_type: Type, message: &[u8], start: usize, rdlength: u16) -> Result<Self> {
        let end = start + rdlength as usize;
        if end > message.len() {
            return Err(Error::Truncated);
        }

        let mut fields = Vec::new();
        let mut cursor = start;
        match Layout::of(rr_type) {
            Layout::Fixed(kinds) => {
                for kind in kinds {
                    let (field, len) = read_field(*kind, message, cursor, end)?;
                    fields.push(field);
                    cursor += len;
                }
                if cursor != end {
                    return Err(Error::TrailingData);
                }
            }
            Layout::CharacterStrings => {
                if cursor == end {
                    return Err(Error::Truncated);
                }
                while cursor < end {
                    let (field, len) =
                        read_field(FieldKind::CharacterString, message, cursor, end)?;
                    fields.push(field);
                    cursor += len;
                }
            }
            Layout::Opaque => fields.push(Field::Opaque(message[start..end].into())),
        }
        Ok(Self { fields })
    }

    /// Checks that the fields of this `Rdata` match the [`Layout`] of
    /// `rr_type` and that they fit in the RDATA of a record.
    pub fn check(&self, rr_type: Type) -> Result<()> {
        match Layout::of(rr_type) {
            Layout::Fixed(kinds) => {
                if self.fields.len() != kinds.len() {
                    return Err(Error::WrongFieldCount);
                }
                for (field, kind) in self.fields.iter().zip(kinds) {
                    if field.kind() != *kind {
                        return Err(Error::FieldTypeMismatch);
                    }
                }
            }
            Layout::CharacterStrings => {
                if self.fields.is_empty() {
                    return Err(Error::WrongFieldCount);
                }
                for field in self.fields.iter() {
                    match field {
                        Field::CharacterString(octets) if octets.len() > u8::MAX as usize => {
                            return Err(Error::FieldTooLarge)
                        }
                        Field::CharacterString(_) => (),
                        _ => return Err(Error::FieldTypeMismatch),
                    }
                }
            }
            Layout::Opaque => match self.fields.as_slice() {
                [Field::Opaque(_)] => (),
                [_] => return Err(Error::FieldTypeMismatch),
                _ => return Err(Error::WrongFieldCount),
            },
        }

        if self.wire_len() > u16::MAX as usize {
            Err(Error::FieldTooLarge)
        } else {
            Ok(())
        }
    }

    /// Encodes the RDATA as type `rr_type`, without name compression.
    pub fn encode(&self, rr_type: Type) -> Result<Vec<u8>> {
        self.check(rr_type)?;
        let mut buf = Vec::with_capacity(self.wire_len());
        for field in self.fields.iter() {
            field.write_to(&mut buf);
        }
        Ok(buf)
    }

    /// Parses RDATA of type `rr_type` from the presentation form of its
    /// fields. TXT RDATA takes one string per `<character-string>`,
    /// quoted or not; RDATA of types without a known layout takes the
    /// [RFC 3597 § 5] generic form, e.g. `["\\#", "2", "ABCD"]`.
    ///
    /// [RFC 3597 § 5]: https://datatracker.ietf.org/doc/html/rfc3597#section-5
    pub fn from_text(rr_type: Type, fields: &[&str]) -> Result<Self> {
        let parsed = match Layout::of(rr_type) {
            Layout::Fixed(kinds) => {
                if fields.len() != kinds.len() {
                    return Err(Error::WrongFieldCount);
                }
                kinds
                    .iter()
                    .zip(fields)
                    .map(|(kind, field)| text::parse_field(*kind, field))
                    .collect::<Result<Vec<_>>>()?
            }
            Layout::CharacterStrings => fields
                .iter()
                .map(|field| text::parse_field(FieldKind::CharacterString, field))
                .collect::<Result<Vec<_>>>()?,
            Layout::Opaque => vec![text::parse_opaque(fields)?],
        };
        let rdata = Self::new(parsed);
        rdata.check(rr_type)?;
        Ok(rdata)
    }

    /// Returns the uncompressed length of the RDATA on the wire.
    fn wire_len(&self) -> usize {
        self.fields.iter().map(Field::wire_len).sum()
    }
}

impl From<Vec<Field>> for Rdata {
    fn from(fields: Vec<Field>) -> Self {
        Self::new(fields)
    }
}

impl fmt::Display for Rdata {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            field.fmt(f)?;
        }
        Ok(())
    }
}

/// Reads a single field of kind `kind` at `&message[cursor]`, not
/// reading past `end`. Returns the field and the number of octets it
/// occupies at `cursor`.
fn read_field(kind: FieldKind, message: &[u8], cursor: usize, end: usize) -> Result<(Field, usize)> {
    match kind {
        FieldKind::Ipv4 => {
            let octets: [u8; 4] = take_array(message, cursor, end)?;
            Ok((Field::Ipv4(octets.into()), 4))
        }
        FieldKind::Ipv6 => {
            let octets: [u8; 16] = take_array(message, cursor, end)?;
            Ok((Field::Ipv6(octets.into()), 16))
        }
        FieldKind::U16 => {
            let octets: [u8; 2] = take_array(message, cursor, end)?;
            Ok((Field::U16(u16::from_be_bytes(octets)), 2))
        }
        FieldKind::U32 => {
            let octets: [u8; 4] = take_array(message, cursor, end)?;
            Ok((Field::U32(u32::from_be_bytes(octets)), 4))
        }
        FieldKind::Name => {
            if cursor >= end {
                return Err(Error::Truncated);
            }
            let (name, len) = Name::decompress(message, cursor)?;
            if cursor + len > end {
                Err(Error::Truncated)
            } else {
                Ok((Field::Name(name), len))
            }
        }
        FieldKind::CharacterString => {
            let [len]: [u8; 1] = take_array(message, cursor, end)?;
            let octets = take(message, cursor + 1, end, len as usize)?;
            Ok((Field::CharacterString(octets.into()), 1 + len as usize))
        }
        FieldKind::Opaque => {
            let octets = take(message, cursor, end, end - cursor)?;
            Ok((Field::Opaque(octets.into()), octets.len()))
        }
    }
}

/// Returns the `len` octets at `&message[cursor]`, failing if they
/// would extend past `end`.
fn take(message: &[u8], cursor: usize, end: usize, len: usize) -> Result<&[u8]> {
    if cursor + len > end {
        Err(Error::Truncated)
    } else {
        message.get(cursor..cursor + len).ok_or(Error::Truncated)
    }
}

/// Like [`take`], but for a fixed number of octets.
fn take_array<const N: usize>(message: &[u8], cursor: usize, end: usize) -> Result<[u8; N]> {
    take(message, cursor, end, N)?
        .try_into()
        .or(Err(Error::Truncated))
}

////////////////////////////////////////////////////////////////////////
// ERRORS                                                             //
////////////////////////////////////////////////////////////////////////

/// An error signaling that RDATA could not be decoded, encoded, or
/// parsed.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Error {
    /// The RDATA (or the message containing it) ended before all of
    /// the fields of the type were read.
    Truncated,

    /// Octets remained after all of the fields of a fixed-shape type
    /// were read.
    TrailingData,

    /// An embedded domain name was invalid.
    InvalidName(name::Error),

    /// The number of fields does not match the type.
    WrongFieldCount,

    /// A field is of the wrong kind for its position.
    FieldTypeMismatch,

    /// A `<character-string>` is longer than 255 octets, or the RDATA
    /// is longer than 65,535 octets.
    FieldTooLarge,

    /// The presentation form of a field could not be parsed.
    InvalidText,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Truncated => f.write_str("unexpected end of RDATA"),
            Self::TrailingData => f.write_str("trailing data after RDATA fields"),
            Self::InvalidName(err) => write!(f, "invalid embedded domain name: {}", err),
            Self::WrongFieldCount => f.write_str("wrong number of RDATA fields"),
            Self::FieldTypeMismatch => f.write_str("RDATA field of the wrong kind"),
            Self::FieldTooLarge => f.write_str("RDATA field is too large"),
            Self::InvalidText => f.write_str("invalid RDATA field text"),
        }
    }
}

impl std::error::Error for Error {}

impl From<name::Error> for Error {
    fn from(err: name::Error) -> Self {
        Self::InvalidName(err)
    }
}

/// The type returned by fallible RDATA operations.
pub type Result<T> = std::result::Result<T, Error>;

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    fn name(text: &str) -> Field {
        Field::Name(text.parse().unwrap())
    }

    #[test]
    fn a_rdata_works() {
        let rdata = Rdata::decode(Type::A, b"\x7f\x00\x00\x01", 0, 4).unwrap();
        assert_eq!(rdata.fields(), &[Field::Ipv4(Ipv4Addr::LOCALHOST)]);
        assert_eq!(rdata.to_strings(), vec!["127.0.0.1"]);
        assert_eq!(rdata.encode(Type::A).unwrap(), b"\x7f\x00\x00\x01");
    }

    #[test]
    fn a_rdata_of_wrong_length_is_rejected() {
        assert_eq!(
            Rdata::decode(Type::A, b"\x7f\x00\x00", 0, 3),
            Err(Error::Truncated)
        );
        assert_eq!(
            Rdata::decode(Type::A, b"\x7f\x00\x00\x01\x00", 0, 5),
            Err(Error::TrailingData)
        );
    }

    #[test]
    fn decode_checks_if_message_is_long_enough() {
        for raw in 0..=255 {
            assert_eq!(
                Rdata::decode(Type::from(raw), b"\x00\x00\x00", 1, 4),
                Err(Error::Truncated)
            );
        }
    }

    #[test]
    fn soa_rdata_decompresses_names() {
        let mut message = b"\x07example\x04test\x00".to_vec();
        let start = message.len();
        message.extend_from_slice(b"\x02ns\xc0\x00\x04mail\xc0\x00");
        for value in 1u32..=5 {
            message.extend_from_slice(&value.to_be_bytes());
        }
        let rdlength = (message.len() - start) as u16;
        let rdata = Rdata::decode(Type::SOA, &message, start, rdlength).unwrap();
        assert_eq!(
            rdata.fields(),
            &[
                name("ns.example.test"),
                name("mail.example.test"),
                Field::U32(1),
                Field::U32(2),
                Field::U32(3),
                Field::U32(4),
                Field::U32(5),
            ]
        );
        assert_eq!(
            rdata.to_string(),
            "ns.example.test mail.example.test 1 2 3 4 5"
        );
    }

    #[test]
    fn names_may_not_run_past_rdata() {
        // The name is complete in the message, but the declared RDATA
        // length only covers part of it.
        let message = b"\x00\x0a\x04mail\x04test\x00";
        assert_eq!(
            Rdata::decode(Type::MX, message, 0, 7),
            Err(Error::Truncated)
        );
        let rdata = Rdata::decode(Type::MX, message, 0, 13).unwrap();
        assert_eq!(rdata.fields(), &[Field::U16(10), name("mail.test")]);
    }

    #[test]
    fn srv_and_px_rdata_work() {
        let srv = Rdata::decode(Type::SRV, b"\x00\x01\x00\x02\x00\x35\x02ns\x00", 0, 10).unwrap();
        assert_eq!(
            srv.fields(),
            &[Field::U16(1), Field::U16(2), Field::U16(53), name("ns")]
        );
        let px = Rdata::decode(Type::PX, b"\x00\x05\x01a\x00\x01b\x00", 0, 8).unwrap();
        assert_eq!(px.fields(), &[Field::U16(5), name("a"), name("b")]);
    }

    #[test]
    fn txt_rdata_works() {
        let rdata = Rdata::decode(Type::TXT, b"\x05hello\x00\x02hi", 0, 10).unwrap();
        assert_eq!(
            rdata.fields(),
            &[
                Field::CharacterString(b"hello"[..].into()),
                Field::CharacterString(b""[..].into()),
                Field::CharacterString(b"hi"[..].into()),
            ]
        );
        assert_eq!(rdata.to_string(), "\"hello\" \"\" \"hi\"");
        assert_eq!(
            Rdata::decode(Type::TXT, b"\x05hell", 0, 5),
            Err(Error::Truncated)
        );
        assert_eq!(Rdata::decode(Type::TXT, b"", 0, 0), Err(Error::Truncated));
    }

    #[test]
    fn txt_strings_longer_than_255_octets_are_rejected() {
        let rdata = Rdata::new(vec![Field::CharacterString(vec![b'x'; 256].into())]);
        assert_eq!(rdata.encode(Type::TXT), Err(Error::FieldTooLarge));
        let rdata = Rdata::new(vec![Field::CharacterString(vec![b'x'; 255].into())]);
        assert_eq!(rdata.encode(Type::TXT).unwrap().len(), 256);
    }

    #[test]
    fn unknown_rdata_is_opaque() {
        let rdata = Rdata::decode(Type::from(65280u16), b"\xab\xcd", 0, 2).unwrap();
        assert_eq!(rdata.fields(), &[Field::Opaque(b"\xab\xcd"[..].into())]);
        assert_eq!(rdata.to_string(), "\\# 2 ABCD");
        assert_eq!(rdata.encode(Type::from(65280u16)).unwrap(), b"\xab\xcd");
    }

    #[test]
    fn check_enforces_layout() {
        let two_names = Rdata::new(vec![name("a"), name("b")]);
        assert_eq!(two_names.check(Type::MINFO), Ok(()));
        assert_eq!(two_names.check(Type::NS), Err(Error::WrongFieldCount));
        assert_eq!(two_names.check(Type::MX), Err(Error::FieldTypeMismatch));
        assert_eq!(Rdata::default().check(Type::TXT), Err(Error::WrongFieldCount));
        assert_eq!(
            Rdata::new(vec![Field::U16(1)]).check(Type::NULL),
            Err(Error::FieldTypeMismatch)
        );
    }

    #[test]
    fn from_text_works() {
        let a = Rdata::from_text(Type::A, &["127.0.0.1"]).unwrap();
        assert_eq!(a.fields(), &[Field::Ipv4(Ipv4Addr::LOCALHOST)]);

        let mx = Rdata::from_text(Type::MX, &["10", "mail.example.test."]).unwrap();
        assert_eq!(mx.fields(), &[Field::U16(10), name("mail.example.test")]);

        let aaaa = Rdata::from_text(Type::AAAA, &["::1"]).unwrap();
        assert_eq!(aaaa.fields(), &[Field::Ipv6(Ipv6Addr::LOCALHOST)]);

        let txt = Rdata::from_text(Type::TXT, &["\"hello world\"", "a\\032b"]).unwrap();
        assert_eq!(
            txt.fields(),
            &[
                Field::CharacterString(b"hello world"[..].into()),
                Field::CharacterString(b"a b"[..].into()),
            ]
        );

        let opaque = Rdata::from_text(Type::from(65280u16), &["\\#", "2", "ab", "CD"]).unwrap();
        assert_eq!(opaque.fields(), &[Field::Opaque(b"\xab\xcd"[..].into())]);
    }

    #[test]
    fn from_text_rejects_bad_input() {
        assert_eq!(
            Rdata::from_text(Type::A, &["127.0.0.1", "x"]),
            Err(Error::WrongFieldCount)
        );
        assert_eq!(
            Rdata::from_text(Type::A, &["localhost"]),
            Err(Error::InvalidText)
        );
        assert_eq!(
            Rdata::from_text(Type::MX, &["65536", "mail"]),
            Err(Error::InvalidText)
        );
        assert_eq!(
            Rdata::from_text(Type::NS, &["a..b"]),
            Err(Error::InvalidName(name::Error::EmptyLabel))
        );
        assert_eq!(
            Rdata::from_text(Type::NULL, &["\\#", "3", "abcd"]),
            Err(Error::InvalidText)
        );
        let long = "x".repeat(256);
        assert_eq!(
            Rdata::from_text(Type::TXT, &[long.as_str()]),
            Err(Error::FieldTooLarge)
        );
    }
}
