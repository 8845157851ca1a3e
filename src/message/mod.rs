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

//! Implementation of reading and writing of DNS messages.
//!
//! [`Parser`] reads on-the-wire messages in place, and [`Writer`]
//! serializes them into a caller-provided buffer with name compression.
//! [`Message`] is an owned, fully-decoded message built on top of both.

use std::fmt;

mod compression;
mod constants;
mod edns;
mod header;
mod opcode;
mod owned;
pub mod parser;
mod question;
mod rcode;
pub mod writer;
pub use edns::Edns;
pub use header::{Flag, Header};
pub use opcode::{IntoOpcodeError, Opcode};
pub use owned::Message;
pub use parser::{Parser, Record};
pub use question::{Qclass, Qtype, Question};
pub use rcode::{ExtendedRcode, IntoRcodeError, Rcode};
pub use writer::Writer;

/// The sections of a DNS message body, in the order in which they
/// appear on the wire.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Section {
    Question,
    Answer,
    Authority,
    Additional,
}

impl Section {
    /// All sections, in wire order.
    pub const ALL: [Section; 4] = [
        Section::Question,
        Section::Answer,
        Section::Authority,
        Section::Additional,
    ];

    /// Returns the position of the section in the message (0 for the
    /// question section through 3 for the additional section).
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match *self {
            Self::Question => "QUESTION",
            Self::Answer => "ANSWER",
            Self::Authority => "AUTHORITY",
            Self::Additional => "ADDITIONAL",
        })
    }
}
