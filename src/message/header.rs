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

//! Implementation of the [`Header`] and [`Flag`] types.

use std::fmt;

use super::constants::*;
use super::{Opcode, Rcode};

////////////////////////////////////////////////////////////////////////
// FLAGS                                                              //
////////////////////////////////////////////////////////////////////////

/// A field within the 16-bit flags word of the DNS message header.
///
/// Each field is read and written through a fixed mask/shift pair. The
/// one-bit fields take the values 0 and 1; OPCODE and RCODE are four
/// bits wide.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Flag {
    Qr,
    Opcode,
    Aa,
    Tc,
    Rd,
    Ra,
    Z,
    Ad,
    Cd,
    Rcode,
}

impl Flag {
    /// Returns the mask of the field within the flags word.
    pub const fn mask(self) -> u16 {
        match self {
            Self::Qr => QR_MASK,
            Self::Opcode => OPCODE_MASK,
            Self::Aa => AA_MASK,
            Self::Tc => TC_MASK,
            Self::Rd => RD_MASK,
            Self::Ra => RA_MASK,
            Self::Z => Z_MASK,
            Self::Ad => AD_MASK,
            Self::Cd => CD_MASK,
            Self::Rcode => RCODE_MASK,
        }
    }

    /// Returns the position of the field's lowest bit within the flags
    /// word.
    pub const fn shift(self) -> u32 {
        match self {
            Self::Qr => QR_SHIFT,
            Self::Opcode => OPCODE_SHIFT,
            Self::Aa => AA_SHIFT,
            Self::Tc => TC_SHIFT,
            Self::Rd => RD_SHIFT,
            Self::Ra => RA_SHIFT,
            Self::Z => Z_SHIFT,
            Self::Ad => AD_SHIFT,
            Self::Cd => CD_SHIFT,
            Self::Rcode => RCODE_SHIFT,
        }
    }

    /// Extracts the field from `flags`.
    pub const fn get(self, flags: u16) -> u16 {
        (flags & self.mask()) >> self.shift()
    }

    /// Returns `flags` with the field replaced by `value`. Bits of
    /// `value` that do not fit in the field are discarded.
    pub const fn set(self, flags: u16, value: u16) -> u16 {
        (flags & !self.mask()) | ((value << self.shift()) & self.mask())
    }
}

////////////////////////////////////////////////////////////////////////
// HEADER                                                             //
////////////////////////////////////////////////////////////////////////

/// The ID and flags of a DNS message header.
///
/// The four section counts are not stored here. A [`Parser`] reads them
/// from the message, and a [`Writer`] computes them from the records it
/// writes.
///
/// [`Parser`]: super::Parser
/// [`Writer`]: super::Writer
#[derive(Clone, Copy, Default, Eq, Hash, PartialEq)]
pub struct Header {
    pub id: u16,
    pub flags: u16,
}

macro_rules! bit_accessors {
    ($($(#[$doc:meta])* $get:ident, $set:ident => $flag:ident;)*) => {
        $(
            $(#[$doc])*
            pub fn $get(&self) -> bool {
                Flag::$flag.get(self.flags) != 0
            }

            $(#[$doc])*
            pub fn $set(&mut self, value: bool) {
                self.flags = Flag::$flag.set(self.flags, value as u16);
            }
        )*
    };
}

impl Header {
    /// Reads the ID and flags from the start of `octets`, if they are
    /// present.
    pub fn read(octets: &[u8]) -> Option<Self> {
        let id = octets.get(ID_START..ID_END)?;
        let flags = octets.get(FLAGS_START..FLAGS_END)?;
        Some(Self {
            id: u16::from_be_bytes([id[0], id[1]]),
            flags: u16::from_be_bytes([flags[0], flags[1]]),
        })
    }

    /// Returns the value of a field of the flags word.
    pub fn flag(&self, flag: Flag) -> u16 {
        flag.get(self.flags)
    }

    /// Sets a field of the flags word.
    pub fn set_flag(&mut self, flag: Flag, value: u16) {
        self.flags = flag.set(self.flags, value);
    }

    bit_accessors! {
        /// The QR (query response) bit.
        qr, set_qr => Qr;
        /// The AA (authoritative answer) bit.
        aa, set_aa => Aa;
        /// The TC (truncation) bit.
        tc, set_tc => Tc;
        /// The RD (recursion desired) bit.
        rd, set_rd => Rd;
        /// The RA (recursion available) bit.
        ra, set_ra => Ra;
        /// The reserved Z bit.
        z, set_z => Z;
        /// The AD (authentic data) bit.
        ad, set_ad => Ad;
        /// The CD (checking disabled) bit.
        cd, set_cd => Cd;
    }

    /// Returns the message's opcode.
    pub fn opcode(&self) -> Opcode {
        Opcode::from_nibble(self.flag(Flag::Opcode) as u8)
    }

    /// Sets the message's opcode.
    pub fn set_opcode(&mut self, opcode: Opcode) {
        self.set_flag(Flag::Opcode, u8::from(opcode) as u16);
    }

    /// Returns the four-bit RCODE from the header. For EDNS messages,
    /// see [`Message::extended_rcode`](super::Message::extended_rcode).
    pub fn rcode(&self) -> Rcode {
        Rcode::from_nibble(self.flag(Flag::Rcode) as u8)
    }

    /// Sets the four-bit RCODE.
    pub fn set_rcode(&mut self, rcode: Rcode) {
        self.set_flag(Flag::Rcode, u8::from(rcode) as u16);
    }
}

impl fmt::Debug for Header {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Header")
            .field("id", &self.id)
            .field("qr", &self.qr())
            .field("opcode", &self.opcode())
            .field("aa", &self.aa())
            .field("tc", &self.tc())
            .field("rd", &self.rd())
            .field("ra", &self.ra())
            .field("z", &self.z())
            .field("ad", &self.ad())
            .field("cd", &self.cd())
            .field("rcode", &self.rcode())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_use_rfc_bit_positions() {
        let header = Header::read(b"\xe2\xd7\x81\x80").unwrap();
        assert_eq!(header.id, 0xe2d7);
        assert!(header.qr());
        assert_eq!(header.opcode(), Opcode::Query);
        assert!(!header.aa());
        assert!(!header.tc());
        assert!(header.rd());
        assert!(header.ra());
        assert!(!header.z());
        assert!(!header.ad());
        assert!(!header.cd());
        assert_eq!(header.rcode(), Rcode::NoError);
    }

    #[test]
    fn setters_touch_only_their_field() {
        let mut header = Header::default();
        header.set_opcode(Opcode::Update);
        assert_eq!(header.flags, 0x2800);
        header.set_ad(true);
        header.set_cd(true);
        assert_eq!(header.flags, 0x2830);
        header.set_rcode(Rcode::Refused);
        assert_eq!(header.flags, 0x2835);
        header.set_flag(Flag::Opcode, 0xff);
        assert_eq!(header.flags, 0x7835);
        header.set_ad(false);
        assert_eq!(header.flag(Flag::Ad), 0);
        assert_eq!(header.flag(Flag::Rcode), 5);
    }

    #[test]
    fn read_requires_four_octets() {
        assert!(Header::read(b"\x00\x01\x02").is_none());
    }
}
