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

//! Decoding of (possibly compressed) on-the-wire names within DNS
//! messages.

use arrayvec::ArrayVec;

use super::{Error, Name, MAX_WIRE_LEN};

/// Decompresses the name at index `start` of `message`. See
/// [`Name::decompress`].
pub(super) fn decompress(message: &[u8], start: usize) -> Result<(Name, usize), Error> {
    let mut wire = ArrayVec::<u8, MAX_WIRE_LEN>::new();
    let mut index = start;
    let mut consumed = None;

    // Every octet examined, whether part of a label or a pointer, is
    // counted. Once more octets have been examined than the message
    // contains, some octets must have been visited twice, which means
    // that the pointers form a loop.
    let mut checked = 0;

    // Once the name is known to be too long, the walk continues without
    // copying so that a pointer loop is still reported as such.
    let mut too_long = false;

    loop {
        let len = *message.get(index).ok_or(Error::Truncated)?;
        match len & 0xc0 {
            0x00 => {
                let len = len as usize;
                let end = index + 1 + len;
                if end > message.len() {
                    return Err(Error::Truncated);
                }
                if !too_long && wire.try_extend_from_slice(&message[index..end]).is_err() {
                    too_long = true;
                }
                index = end;
                if len == 0 {
                    break;
                }
                checked += len + 1;
            }
            0xc0 => {
                let low = *message.get(index + 1).ok_or(Error::Truncated)?;
                if consumed.is_none() {
                    consumed = Some(index + 2 - start);
                }
                let target = (((len & 0x3f) as usize) << 8) | low as usize;
                if target >= message.len() {
                    return Err(Error::Malformed);
                }
                checked += 2;
                if checked >= message.len() {
                    return Err(Error::Malformed);
                }
                index = target;
            }
            _ => return Err(Error::Malformed),
        }
    }

    if too_long {
        Err(Error::NameTooLong)
    } else {
        Ok((Name { wire }, consumed.unwrap_or_else(|| index - start)))
    }
}

/// Decompresses the name at index `start` of `message` and returns it
/// in presentation format, along with the number of octets the name
/// occupies at `start`. The root is rendered as `.`; other names are
/// rendered without a trailing dot.
pub fn decompress_to_text(message: &[u8], start: usize) -> Result<(String, usize), Error> {
    Name::decompress(message, start).map(|(name, consumed)| (name.to_string(), consumed))
}

/// Returns the number of octets occupied by the on-the-wire name at
/// index `start` of `message`, without following any pointers. The
/// name ends after the null label or after its first pointer.
pub fn skip(message: &[u8], start: usize) -> Result<usize, Error> {
    let mut index = start;
    loop {
        let len = *message.get(index).ok_or(Error::Truncated)?;
        match len & 0xc0 {
            0x00 => {
                index += 1 + len as usize;
                if index > message.len() {
                    return Err(Error::Truncated);
                } else if len == 0 {
                    return Ok(index - start);
                }
            }
            0xc0 => {
                if index + 2 > message.len() {
                    return Err(Error::Truncated);
                }
                return Ok(index + 2 - start);
            }
            _ => return Err(Error::Malformed),
        }
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    // A fake message: "example.test." at 0, "www" + pointer to 0 at
    // 14, and a lone pointer to 14 at 20.
    const MESSAGE: &[u8] = b"\x07example\x04test\x00\x03www\xc0\x00\xc0\x0e";

    #[test]
    fn decompress_handles_uncompressed_names() {
        let (name, consumed) = Name::decompress(MESSAGE, 0).unwrap();
        assert_eq!(name.wire_repr(), b"\x07example\x04test\x00");
        assert_eq!(consumed, 14);
    }

    #[test]
    fn decompress_follows_pointers() {
        let (name, consumed) = Name::decompress(MESSAGE, 14).unwrap();
        assert_eq!(name.to_string(), "www.example.test");
        assert_eq!(consumed, 6);

        let (name, consumed) = Name::decompress(MESSAGE, 20).unwrap();
        assert_eq!(name.to_string(), "www.example.test");
        assert_eq!(consumed, 2);
    }

    #[test]
    fn decompress_to_text_renders_root() {
        assert_eq!(decompress_to_text(b"\x00", 0), Ok((".".to_owned(), 1)));
        assert_eq!(
            decompress_to_text(MESSAGE, 14),
            Ok(("www.example.test".to_owned(), 6))
        );
    }

    #[test]
    fn decompress_allows_forward_pointers() {
        let message = b"\xc0\x02\x01a\x00";
        let (name, consumed) = Name::decompress(message, 0).unwrap();
        assert_eq!(name.to_string(), "a");
        assert_eq!(consumed, 2);
    }

    #[test]
    fn decompress_rejects_pointer_loops() {
        assert_eq!(
            Name::decompress(b"\xc0\x00", 0).unwrap_err(),
            Error::Malformed
        );
        assert_eq!(
            Name::decompress(b"\x01a\xc0\x04\xc0\x00", 0).unwrap_err(),
            Error::Malformed
        );
    }

    #[test]
    fn decompress_counts_only_octets_before_the_first_pointer() {
        // The pointer sits past the end of the name it refers to.
        let message = b"\x01a\x00\x00\x00\xc0\x00";
        let (name, consumed) = Name::decompress(message, 5).unwrap();
        assert_eq!(name.to_string(), "a");
        assert_eq!(consumed, 2);
    }

    #[test]
    fn decompress_rejects_loops_through_long_labels() {
        // A 63-octet label followed by a pointer back to it, in a
        // message long enough that the name overflows before the loop
        // counter runs out.
        let mut message = vec![63];
        message.extend_from_slice(&[b'x'; 63]);
        message.extend_from_slice(b"\xc0\x00");
        message.resize(message.len() + 2000, 0);
        assert_eq!(
            Name::decompress(&message, 0).unwrap_err(),
            Error::Malformed
        );
    }

    #[test]
    fn decompress_rejects_long_compressed_names() {
        // Three 63-octet labels, then a pointer to a fourth: 257 octets
        // in all, with no loop.
        let mut message = Vec::new();
        message.push(63);
        message.extend_from_slice(&[b'y'; 63]);
        message.push(0);
        let tail_start = message.len();
        for _ in 0..3 {
            message.push(63);
            message.extend_from_slice(&[b'x'; 63]);
        }
        message.extend_from_slice(b"\xc0\x00");
        assert_eq!(
            Name::decompress(&message, tail_start).unwrap_err(),
            Error::NameTooLong
        );
    }

    #[test]
    fn decompress_rejects_pointers_outside_message() {
        assert_eq!(
            Name::decompress(b"\x01a\xc0\x10", 0).unwrap_err(),
            Error::Malformed
        );
    }

    #[test]
    fn decompress_rejects_truncated_names() {
        assert_eq!(Name::decompress(b"", 0).unwrap_err(), Error::Truncated);
        assert_eq!(
            Name::decompress(b"\x07exam", 0).unwrap_err(),
            Error::Truncated
        );
        assert_eq!(
            Name::decompress(b"\x01a", 0).unwrap_err(),
            Error::Truncated
        );
        assert_eq!(Name::decompress(b"\xc0", 0).unwrap_err(), Error::Truncated);
    }

    #[test]
    fn decompress_rejects_extended_labels() {
        assert_eq!(
            Name::decompress(b"\x41\x00", 0).unwrap_err(),
            Error::Malformed
        );
        assert_eq!(
            Name::decompress(b"\x80\x00", 0).unwrap_err(),
            Error::Malformed
        );
    }

    #[test]
    fn decompress_rejects_long_names() {
        // Four 63-octet labels (256 octets) plus the null label.
        let mut message = Vec::new();
        for _ in 0..4 {
            message.push(63);
            message.extend_from_slice(&[b'x'; 63]);
        }
        message.push(0);
        assert_eq!(
            Name::decompress(&message, 0).unwrap_err(),
            Error::NameTooLong
        );
    }

    #[test]
    fn skip_works() {
        assert_eq!(skip(MESSAGE, 0), Ok(14));
        assert_eq!(skip(MESSAGE, 14), Ok(6));
        assert_eq!(skip(MESSAGE, 20), Ok(2));
        assert_eq!(skip(b"\x00", 0), Ok(1));
    }

    #[test]
    fn skip_rejects_bad_names() {
        assert_eq!(skip(b"\x03ab", 0), Err(Error::Truncated));
        assert_eq!(skip(b"\x01a", 0), Err(Error::Truncated));
        assert_eq!(skip(b"\xc0", 0), Err(Error::Truncated));
        assert_eq!(skip(b"\x40", 0), Err(Error::Malformed));
    }
}
