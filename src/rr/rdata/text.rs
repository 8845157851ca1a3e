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

//! Presentation format of RDATA fields.

use std::fmt::{self, Write};

use super::{Error, Field, FieldKind, Result};
use crate::name::{parse_escape, Name};
use crate::util::{ascii_hex_digit_to_nibble, nibble_to_ascii_hex_digit};

/// Parses the presentation form of a single field of kind `kind`.
pub(super) fn parse_field(kind: FieldKind, text: &str) -> Result<Field> {
    match kind {
        FieldKind::Ipv4 => text.parse().map(Field::Ipv4).or(Err(Error::InvalidText)),
        FieldKind::Ipv6 => text.parse().map(Field::Ipv6).or(Err(Error::InvalidText)),
        FieldKind::U16 => text.parse().map(Field::U16).or(Err(Error::InvalidText)),
        FieldKind::U32 => text.parse().map(Field::U32).or(Err(Error::InvalidText)),
        FieldKind::Name => Ok(Field::Name(text.parse::<Name>()?)),
        FieldKind::CharacterString => parse_character_string(text).map(Field::CharacterString),
        FieldKind::Opaque => parse_opaque(&[text]),
    }
}

/// Parses a `<character-string>`, which may be quoted or unquoted
/// ([RFC 1035 § 5.1]). Escapes are processed as for domain names. The
/// length is not checked here.
///
/// [RFC 1035 § 5.1]: https://datatracker.ietf.org/doc/html/rfc1035#section-5.1
fn parse_character_string(text: &str) -> Result<Box<[u8]>> {
    let octets = text.as_bytes();
    let mut remaining_octets = match octets {
        [b'"', inner @ .., b'"'] => inner,
        [b'"', ..] => return Err(Error::InvalidText),
        _ => octets,
    };

    let mut parsed = Vec::with_capacity(remaining_octets.len());
    while let Some(&octet) = remaining_octets.first() {
        if octet == b'\\' {
            let (value, consumed) =
                parse_escape(&remaining_octets[1..]).or(Err(Error::InvalidText))?;
            parsed.push(value);
            remaining_octets = &remaining_octets[consumed + 1..];
        } else if octet == b'"' {
            return Err(Error::InvalidText);
        } else {
            parsed.push(octet);
            remaining_octets = &remaining_octets[1..];
        }
    }
    Ok(parsed.into_boxed_slice())
}

/// Parses opaque RDATA in the [RFC 3597 § 5] generic form: the token
/// `\#`, the length of the data, and then the data in hexadecimal,
/// possibly split across several fields.
///
/// [RFC 3597 § 5]: https://datatracker.ietf.org/doc/html/rfc3597#section-5
pub(super) fn parse_opaque(fields: &[&str]) -> Result<Field> {
    let (len, hex) = match fields {
        ["\\#", len, hex @ ..] => (len.parse::<usize>().or(Err(Error::InvalidText))?, hex),
        _ => return Err(Error::InvalidText),
    };

    let mut octets = Vec::with_capacity(len);
    let mut high_nibble = None;
    for digit in hex.iter().flat_map(|piece| piece.bytes()) {
        let nibble = ascii_hex_digit_to_nibble(digit).ok_or(Error::InvalidText)?;
        match high_nibble.take() {
            Some(high) => octets.push((high << 4) | nibble),
            None => high_nibble = Some(nibble),
        }
    }

    if high_nibble.is_some() || octets.len() != len {
        Err(Error::InvalidText)
    } else {
        Ok(Field::Opaque(octets.into_boxed_slice()))
    }
}

/// Writes a `<character-string>` in quoted presentation form.
pub(super) fn write_character_string(f: &mut fmt::Formatter, octets: &[u8]) -> fmt::Result {
    f.write_char('"')?;
    for octet in octets {
        match *octet {
            b'"' | b'\\' => write!(f, "\\{}", *octet as char)?,
            0x20..=0x7e => f.write_char(*octet as char)?,
            _ => write!(f, "\\{:03}", *octet)?,
        }
    }
    f.write_char('"')
}

/// Writes opaque RDATA in the RFC 3597 generic form.
pub(super) fn write_opaque(f: &mut fmt::Formatter, octets: &[u8]) -> fmt::Result {
    write!(f, "\\# {}", octets.len())?;
    if !octets.is_empty() {
        f.write_char(' ')?;
        for octet in octets {
            f.write_char(char::from(nibble_to_ascii_hex_digit(octet >> 4)))?;
            f.write_char(char::from(nibble_to_ascii_hex_digit(octet & 0xf)))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn character_strings_parse_quoted_and_unquoted() {
        assert_eq!(&*parse_character_string("abc").unwrap(), b"abc");
        assert_eq!(&*parse_character_string("\"a b\"").unwrap(), b"a b");
        assert_eq!(&*parse_character_string("\"\"").unwrap(), b"");
        assert_eq!(&*parse_character_string("\\\"\\255").unwrap(), b"\"\xff");
        assert_eq!(parse_character_string("\"abc"), Err(Error::InvalidText));
        assert_eq!(parse_character_string("a\"b"), Err(Error::InvalidText));
        assert_eq!(parse_character_string("a\\9"), Err(Error::InvalidText));
    }

    #[test]
    fn character_strings_display_escaped() {
        let field = Field::CharacterString(b"say \"hi\"\\\x00"[..].into());
        assert_eq!(field.to_string(), "\"say \\\"hi\\\"\\\\\\000\"");
    }

    #[test]
    fn empty_opaque_rdata_works() {
        assert_eq!(
            parse_opaque(&["\\#", "0"]),
            Ok(Field::Opaque(Vec::new().into_boxed_slice()))
        );
        assert_eq!(Field::Opaque(Vec::new().into_boxed_slice()).to_string(), "\\# 0");
    }

    #[test]
    fn opaque_rdata_rejects_odd_digits() {
        assert_eq!(parse_opaque(&["\\#", "1", "abc"]), Err(Error::InvalidText));
        assert_eq!(parse_opaque(&["\\#", "1", "zz"]), Err(Error::InvalidText));
        assert_eq!(parse_opaque(&["#", "1", "ab"]), Err(Error::InvalidText));
    }
}
