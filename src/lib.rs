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

//! A DNS wire-protocol engine.
//!
//! This crate reads and writes DNS messages in the on-the-wire format
//! of [RFC 1035 § 4], including compressed domain names, the four
//! message sections, type-specific RDATA, and the base fields of the
//! EDNS(0) OPT pseudo-record. On top of the codec, it provides a small
//! UDP transport: a [`Server`](server::Server) that hands parsed
//! requests to an application [`Handler`](server::Handler), and (with
//! the `tokio` feature) a [`Client`](client::Client) that issues
//! queries and matches responses by transaction ID.
//!
//! [RFC 1035 § 4]: https://datatracker.ietf.org/doc/html/rfc1035#section-4

pub mod class;
pub mod message;
pub mod name;
pub mod rr;
pub mod server;
mod util;

#[cfg(feature = "tokio")]
pub mod client;
#[cfg(feature = "tokio")]
pub mod io;
