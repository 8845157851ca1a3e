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

//! Data structures and routines for handling DNS resource records.

use std::fmt;

use crate::class::Class;
use crate::name::Name;

pub mod rdata;
mod rr_type;
pub use rdata::{Field, Rdata};
pub use rr_type::Type;

/// A resource record.
///
/// The TTL is kept as the raw 32-bit value from the wire. (The OPT
/// pseudo-record, for instance, stores flags rather than a TTL in this
/// field.)
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResourceRecord {
    pub owner: Name,
    pub rr_type: Type,
    pub class: Class,
    pub ttl: u32,
    pub rdata: Rdata,
}

impl fmt::Display for ResourceRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}",
            self.owner, self.ttl, self.class, self.rr_type, self.rdata
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_displays_in_master_file_order() {
        let record = ResourceRecord {
            owner: "example.com".parse().unwrap(),
            rr_type: Type::A,
            class: Class::IN,
            ttl: 10,
            rdata: Rdata::from_text(Type::A, &["127.0.0.1"]).unwrap(),
        };
        assert_eq!(record.to_string(), "example.com\t10\tIN\tA\t127.0.0.1");
    }
}
