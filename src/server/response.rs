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

//! Implementation of the [`ResponseBuilder`] passed to handlers.

use std::net::SocketAddr;

use super::{ReceivedInfo, Response};
use crate::class::Class;
use crate::message::{writer, Flag, Header, Rcode, Section, Writer};
use crate::name::Name;
use crate::rr::{Rdata, ResourceRecord, Type};

/// A response under construction, handed to a
/// [`Handler`](super::Handler).
///
/// The response starts out with the request's ID, opcode, RD bit, and
/// questions, and with QR set. The handler adds records and sets
/// header fields, then calls [`ResponseBuilder::send`].
///
/// If a record does not fit in the negotiated message size,
/// [`ResponseBuilder::add_rr`] fails with [`writer::Error::Truncation`]
/// and later records are refused too. The response then goes out with
/// TC set and only the question section, as a signal for the requestor
/// to retry over a transport with larger messages.
pub struct ResponseBuilder<'b> {
    writer: Writer<'b>,
    received_info: ReceivedInfo,
    truncated: bool,
    send: bool,
}

impl<'b> ResponseBuilder<'b> {
    pub(super) fn new(writer: Writer<'b>, received_info: ReceivedInfo) -> Self {
        Self {
            writer,
            received_info,
            truncated: false,
            send: false,
        }
    }

    /// Returns the address that the request came from.
    pub fn source(&self) -> SocketAddr {
        self.received_info.source()
    }

    /// Returns the response's ID and flags as they stand.
    pub fn header(&self) -> Header {
        self.writer.header()
    }

    /// Sets a field of the response's flags word.
    pub fn set_flag(&mut self, flag: Flag, value: u16) {
        self.writer.set_flag(flag, value);
    }

    /// Sets or clears the AA (authoritative answer) bit.
    pub fn set_aa(&mut self, aa: bool) {
        self.writer.set_aa(aa);
    }

    /// Sets or clears the RA (recursion available) bit.
    pub fn set_ra(&mut self, ra: bool) {
        self.writer.set_ra(ra);
    }

    /// Sets the response's RCODE.
    pub fn set_rcode(&mut self, rcode: Rcode) {
        self.writer.set_rcode(rcode);
    }

    /// Returns whether a record has failed to fit.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Adds a resource record to `section` of the response. See
    /// [`Writer::add_rr`] for the rules on section order.
    pub fn add_rr(
        &mut self,
        section: Section,
        owner: &Name,
        rr_type: Type,
        class: Class,
        ttl: u32,
        rdata: &Rdata,
    ) -> writer::Result<()> {
        if self.truncated {
            return Err(writer::Error::Truncation);
        }
        let result = self.writer.add_rr(section, owner, rr_type, class, ttl, rdata);
        if result == Err(writer::Error::Truncation) {
            self.truncated = true;
        }
        result
    }

    /// Adds `record` to `section` of the response.
    pub fn add_record(&mut self, section: Section, record: &ResourceRecord) -> writer::Result<()> {
        self.add_rr(
            section,
            &record.owner,
            record.rr_type,
            record.class,
            record.ttl,
            &record.rdata,
        )
    }

    /// Marks the response to be sent once the handler returns.
    pub fn send(&mut self) {
        self.send = true;
    }

    pub(super) fn into_response(mut self) -> Response {
        if !self.send {
            return Response::None;
        }
        if self.truncated {
            self.writer.clear_rrs();
            self.writer.set_tc(true);
        }
        Response::Single(self.writer.finish())
    }
}
