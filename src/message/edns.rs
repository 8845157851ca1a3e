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

//! Base EDNS(0) fields carried by the OPT pseudo-record.

/// The fields of an OPT pseudo-record ([RFC 6891 § 6.1]) other than
/// its options. These are packed into the CLASS and TTL fields of the
/// record.
///
/// [RFC 6891 § 6.1]: https://datatracker.ietf.org/doc/html/rfc6891#section-6.1
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Edns {
    /// The requestor's UDP payload size, from the CLASS field.
    pub udp_payload_size: u16,

    /// The upper eight bits of the extended RCODE.
    pub extended_rcode_upper_bits: u8,

    pub version: u8,

    /// The DO (DNSSEC OK) bit.
    pub dnssec_ok: bool,

    /// The remaining fifteen flag bits, which must be zero.
    pub z: u16,
}

impl Edns {
    /// Unpacks the fields from the CLASS and TTL of an OPT record.
    pub fn from_opt(class: u16, ttl: u32) -> Self {
        Self {
            udp_payload_size: class,
            extended_rcode_upper_bits: (ttl >> 24) as u8,
            version: (ttl >> 16) as u8,
            dnssec_ok: ttl & 0x8000 != 0,
            z: (ttl & 0x7fff) as u16,
        }
    }

    /// Packs the fields into the TTL of an OPT record.
    pub fn opt_ttl(&self) -> u32 {
        ((self.extended_rcode_upper_bits as u32) << 24)
            | ((self.version as u32) << 16)
            | ((self.dnssec_ok as u32) << 15)
            | (self.z & 0x7fff) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opt_fields_unpack_and_pack() {
        let edns = Edns::from_opt(1232, 0x0100_8001);
        assert_eq!(edns.udp_payload_size, 1232);
        assert_eq!(edns.extended_rcode_upper_bits, 1);
        assert_eq!(edns.version, 0);
        assert!(edns.dnssec_ok);
        assert_eq!(edns.z, 1);
        assert_eq!(edns.opt_ttl(), 0x0100_8001);
    }
}
