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

//! Constants related to DNS messages.

pub const HEADER_SIZE: usize = 12;
pub const ID_START: usize = 0;
pub const ID_END: usize = 2;
pub const FLAGS_START: usize = 2;
pub const FLAGS_END: usize = 4;
pub const QDCOUNT_START: usize = 4;
pub const ANCOUNT_START: usize = 6;
pub const NSCOUNT_START: usize = 8;
pub const ARCOUNT_START: usize = 10;

// Mask/shift pairs for the 16-bit flags word.
pub const QR_MASK: u16 = 0x8000;
pub const QR_SHIFT: u32 = 15;
pub const OPCODE_MASK: u16 = 0x7800;
pub const OPCODE_SHIFT: u32 = 11;
pub const AA_MASK: u16 = 0x0400;
pub const AA_SHIFT: u32 = 10;
pub const TC_MASK: u16 = 0x0200;
pub const TC_SHIFT: u32 = 9;
pub const RD_MASK: u16 = 0x0100;
pub const RD_SHIFT: u32 = 8;
pub const RA_MASK: u16 = 0x0080;
pub const RA_SHIFT: u32 = 7;
pub const Z_MASK: u16 = 0x0040;
pub const Z_SHIFT: u32 = 6;
pub const AD_MASK: u16 = 0x0020;
pub const AD_SHIFT: u32 = 5;
pub const CD_MASK: u16 = 0x0010;
pub const CD_SHIFT: u32 = 4;
pub const RCODE_MASK: u16 = 0x000f;
pub const RCODE_SHIFT: u32 = 0;

/// The largest message offset a compression pointer can express.
pub const POINTER_MAX: usize = 0x3fff;

/// The size of an OPT record without options: a root owner, TYPE,
/// CLASS, TTL, and a zero RDLENGTH.
pub const OPT_RECORD_SIZE: usize = 11;
