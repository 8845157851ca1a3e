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

//! The message-handling logic of a DNS server.
//!
//! The [`Server`] structure is the heart of this module; see its
//! documentation for details.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use log::debug;

use crate::message::{ExtendedRcode, Message, Rcode, Writer};
use crate::rr::{ResourceRecord, Type};

mod response;

pub use response::ResponseBuilder;

////////////////////////////////////////////////////////////////////////
// SERVER PUBLIC API AND CORE MESSAGE-HANDLING LOGIC                  //
////////////////////////////////////////////////////////////////////////

/// A DNS server, abstracted from any underlying network I/O provider
/// and from the application logic that answers requests.
///
/// The [`Server`] structure implements the message-processing logic
/// common to all DNS servers. It receives, parses, and responds to DNS
/// messages through the [`Server::handle_message`] method. An
/// underlying network I/O provider (see [`io`](crate::io)) is
/// responsible for receiving these messages from the network and then
/// sending the responses that the [`Server`] produces.
///
/// Requests that parse successfully are passed to a [`Handler`] along
/// with a [`ResponseBuilder`]. The server takes care of everything the
/// handler need not know about: dropping unparseable messages and
/// responses, EDNS negotiation, and falling back to a truncated
/// response (TC=1, question section only) when the handler's answer
/// does not fit.
pub struct Server<H> {
    handler: H,
    edns_udp_payload_size: u16,
}

/// Application logic that answers DNS requests.
///
/// A handler sees every request that parsed successfully and was not
/// itself a response. It adds records to the [`ResponseBuilder`] and
/// calls [`ResponseBuilder::send`] if a response should go out; if it
/// never does, the request goes unanswered.
///
/// Any `Fn(&Message, &mut ResponseBuilder)` closure is a handler.
pub trait Handler {
    fn handle(&self, request: &Message, response: &mut ResponseBuilder<'_>);
}

impl<F> Handler for F
where
    F: Fn(&Message, &mut ResponseBuilder<'_>),
{
    fn handle(&self, request: &Message, response: &mut ResponseBuilder<'_>) {
        self(request, response)
    }
}

/// The UDP payload size limit for messages without EDNS.
const UNEXTENDED_UDP_PAYLOAD_SIZE: u16 = 512;

impl<H> Server<H> {
    /// Creates a new `Server` that answers requests with `handler`.
    ///
    /// The default EDNS UDP payload size used is 1,232 octets. This is
    /// the safe default recommended for DNS Flag Day 2020, since 1,232
    /// (DNS message) + 8 (UDP header) + 40 (IPv6 header) = 1,280, the
    /// minimum MTU for IPv6. It should therefore avoid IP packet
    /// fragmentation on almost all present-day networks.
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            edns_udp_payload_size: 1232,
        }
    }

    /// Returns the server's handler.
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Returns the maximum UDP payload size that this `Server` will use
    /// with EDNS messages.
    pub fn edns_udp_payload_size(&self) -> u16 {
        self.edns_udp_payload_size
    }

    /// Sets the maximum UDP payload size that this `Server` will use
    /// with EDNS messages. This must be at least 512 octets (the
    /// maximum UDP payload size in unextended DNS).
    pub fn set_edns_udp_payload_size(&mut self, size: u16) -> Result<(), InvalidPayloadSizeError> {
        if size >= UNEXTENDED_UDP_PAYLOAD_SIZE {
            self.edns_udp_payload_size = size;
            Ok(())
        } else {
            Err(InvalidPayloadSizeError)
        }
    }
}

impl<H> Server<H>
where
    H: Handler,
{
    /// Handles a received DNS message. This is the API through which
    /// I/O providers submit messages.
    ///
    /// `received_buf` contains the message received, and
    /// `received_info` provides additional information about it (see
    /// [`ReceivedInfo`]). `response_buf` is a buffer into which a
    /// response message may be serialized. It must be at least as long
    /// as [`Server::edns_udp_payload_size`]; otherwise, this method
    /// will panic.
    ///
    /// A [`Response`] is returned, signifying whether a response is to
    /// be sent and, if so, how long the response message written into
    /// `response_buf` is.
    pub fn handle_message(
        &self,
        received_buf: &[u8],
        received_info: ReceivedInfo,
        response_buf: &mut [u8],
    ) -> Response {
        if response_buf.len() < self.edns_udp_payload_size as usize {
            panic!("the response buffer is not large enough");
        }

        // Malformed messages are dropped rather than answered, as are
        // messages that are themselves responses.
        let request = match Message::parse(received_buf) {
            Ok(request) => request,
            Err(e) => {
                debug!("dropping malformed message from {}: {}", received_info.source, e);
                return Response::None;
            }
        };
        if request.header.qr() {
            debug!("dropping response message from {}", received_info.source);
            return Response::None;
        }

        // Start the response by copying information from the received
        // message and setting the QR bit.
        let mut response = match Writer::new(response_buf, UNEXTENDED_UDP_PAYLOAD_SIZE as usize) {
            Ok(response) => response,
            Err(_) => return Response::None,
        };
        response.set_id(request.header.id);
        response.set_qr(true);
        response.set_opcode(request.header.opcode());
        response.set_rd(request.header.rd());

        // EDNS is set up before the questions are copied, since it may
        // raise the size limit.
        if let Err(rcode) = self.negotiate_edns(&request, &mut response) {
            return finish_early(&request, response, rcode);
        }
        for question in request.questions.iter() {
            if response.add_question(question).is_err() {
                response.set_rcode(Rcode::ServFail);
                return Response::Single(response.finish());
            }
        }

        let mut builder = ResponseBuilder::new(response, received_info);
        self.handler.handle(&request, &mut builder);
        builder.into_response()
    }

    /// Sets up EDNS in the response if the request has an OPT record.
    /// If the OPT record is unacceptable, the error RCODE for the
    /// response is returned.
    fn negotiate_edns(&self, request: &Message, response: &mut Writer) -> Result<(), ExtendedRcode> {
        // RFC 6891 § 6.1.1: the OPT record belongs in the additional
        // section, and there may be only one.
        let misplaced = request
            .answers
            .iter()
            .chain(request.authorities.iter())
            .any(|rr| rr.rr_type == Type::OPT);
        let mut opts = request.additionals.iter().filter(|rr| rr.rr_type == Type::OPT);
        let opt = match (opts.next(), opts.next()) {
            _ if misplaced => return Err(ExtendedRcode::FORMERR),
            (None, _) => return Ok(()),
            (Some(opt), None) => opt,
            (Some(_), Some(_)) => return Err(ExtendedRcode::FORMERR),
        };

        // Once we find an OPT record, we produce an EDNS response, even
        // if the OPT record is invalid (see RFC 6891 § 7).
        if response.set_edns(self.edns_udp_payload_size).is_err() {
            return Err(ExtendedRcode::SERVFAIL);
        }

        // Payload sizes below 512 are treated as 512 (RFC 6891
        // § 6.2.5).
        let their_limit = u16::from(opt.class).max(UNEXTENDED_UDP_PAYLOAD_SIZE);
        let negotiated_limit = their_limit.min(self.edns_udp_payload_size);
        response.set_limit(negotiated_limit as usize);

        match validate_opt(opt) {
            Some(rcode) => Err(rcode),
            None => Ok(()),
        }
    }
}

/// Completes a response that carries only an error RCODE (and the
/// question section, if it fits).
fn finish_early(request: &Message, mut response: Writer, rcode: ExtendedRcode) -> Response {
    if response.set_extended_rcode(rcode).is_err() {
        response.set_rcode(rcode.header_bits());
    }
    for question in request.questions.iter() {
        if response.add_question(question).is_err() {
            break;
        }
    }
    Response::Single(response.finish())
}

/// Provides network-related information about a received DNS message to
/// [`Server::handle_message`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ReceivedInfo {
    source: SocketAddr,
}

impl ReceivedInfo {
    /// Creates a new [`ReceivedInfo`].
    ///
    /// IPv4-mapped IPv6 addresses of the kind that dual-stack sockets
    /// produce (e.g. `::ffff:127.0.0.1`) are interpreted as IPv4
    /// addresses. This function performs that canonicalization; calling
    /// I/O code need not concern itself with this task.
    pub fn new(source: SocketAddr) -> Self {
        let ip = match source.ip() {
            original @ IpAddr::V4(_) => original,
            original @ IpAddr::V6(ipv6) => {
                let octets = ipv6.octets();
                if octets[0..10].iter().all(|o| *o == 0) && octets[10] == 0xff && octets[11] == 0xff
                {
                    // This is an IPv4-mapped address.
                    IpAddr::V4(Ipv4Addr::new(
                        octets[12], octets[13], octets[14], octets[15],
                    ))
                } else {
                    original
                }
            }
        };
        Self {
            source: SocketAddr::new(ip, source.port()),
        }
    }

    /// Returns the address the message came from.
    pub fn source(&self) -> SocketAddr {
        self.source
    }
}

/// Indicates to the caller of [`Server::handle_message`] what kind of
/// response needs to be sent.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Response {
    /// A single response is to be sent. The response has been written
    /// into the provided buffer. The length of the response is
    /// included.
    Single(usize),

    /// No response is to be sent.
    None,
}

////////////////////////////////////////////////////////////////////////
// EDNS OPT RECORD HANDLING                                           //
////////////////////////////////////////////////////////////////////////

/// Validates an EDNS OPT record. If it's not valid, then the proper
/// error RCODE for the response is returned.
fn validate_opt(opt_rr: &ResourceRecord) -> Option<ExtendedRcode> {
    // Since we don't support any EDNS options, we ignore any sent to us
    // (per RFC 6891 § 6.1.2). What remains is to check the owner name
    // and the EDNS version.
    if !opt_rr.owner.is_root() {
        Some(ExtendedRcode::FORMERR)
    } else {
        let edns_version = (opt_rr.ttl >> 16) as u8;
        if edns_version != 0 {
            Some(ExtendedRcode::BADVERS)
        } else {
            None
        }
    }
}

////////////////////////////////////////////////////////////////////////
// PUBLIC ERRORS                                                      //
////////////////////////////////////////////////////////////////////////

/// An error returned when an invalid EDNS UDP payload size is passed
/// to [`Server::set_edns_udp_payload_size`].
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct InvalidPayloadSizeError;

impl fmt::Display for InvalidPayloadSizeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("invalid EDNS UDP payload size (the minimum is 512 octets)")
    }
}

impl std::error::Error for InvalidPayloadSizeError {}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::class::Class;
    use crate::message::{Question, Section};
    use crate::name::Name;
    use crate::rr::Rdata;

    fn received_info() -> ReceivedInfo {
        ReceivedInfo::new(SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 5353))
    }

    fn query(name: &str, edns: Option<(u16, u32)>) -> Vec<u8> {
        let mut buf = vec![0; 512];
        let mut writer = Writer::try_from(buf.as_mut_slice()).unwrap();
        writer.set_id(0x1234);
        writer.set_rd(true);
        let qname: Name = name.parse().unwrap();
        writer.add_question(&Question::new(qname, Type::A, Class::IN)).unwrap();
        if let Some((payload, ttl)) = edns {
            let opt = ResourceRecord {
                owner: Name::root(),
                rr_type: Type::OPT,
                class: Class::from(payload),
                ttl,
                rdata: Rdata::new(vec![crate::rr::Field::Opaque(Box::default())]),
            };
            writer.add_record(Section::Additional, &opt).unwrap();
        }
        let len = writer.finish();
        buf.truncate(len);
        buf
    }

    /// Answers every A query with `count` loopback records.
    fn loopback_handler(count: usize) -> impl Fn(&Message, &mut ResponseBuilder<'_>) {
        move |request: &Message, response: &mut ResponseBuilder<'_>| {
            let qname = request.questions[0].qname.clone();
            let rdata = Rdata::from_text(Type::A, &["127.0.0.1"]).unwrap();
            for _ in 0..count {
                if response
                    .add_rr(Section::Answer, &qname, Type::A, Class::IN, 10, &rdata)
                    .is_err()
                {
                    break;
                }
            }
            response.send();
        }
    }

    fn handle(server: &Server<impl Handler>, received: &[u8]) -> Option<Message> {
        let mut response_buf = vec![0; server.edns_udp_payload_size() as usize];
        match server.handle_message(received, received_info(), &mut response_buf) {
            Response::Single(len) => Some(Message::parse(&response_buf[..len]).unwrap()),
            Response::None => None,
        }
    }

    #[test]
    fn set_edns_udp_payload_size_enforces_min() {
        let mut server = Server::new(loopback_handler(1));
        assert!(server.set_edns_udp_payload_size(256).is_err());
        assert!(server.set_edns_udp_payload_size(4096).is_ok());
    }

    #[test]
    #[should_panic(expected = "the response buffer is not large enough")]
    fn handle_message_rejects_short_buffers() {
        let server = Server::new(loopback_handler(1));
        let mut not_quite_large_enough = vec![0; server.edns_udp_payload_size() as usize - 1];
        server.handle_message(&[], received_info(), &mut not_quite_large_enough);
    }

    #[test]
    fn responses_are_prepopulated() {
        let server = Server::new(loopback_handler(1));
        let response = handle(&server, &query("example.com", None)).unwrap();
        assert_eq!(response.header.id, 0x1234);
        assert!(response.header.qr());
        assert!(response.header.rd());
        assert_eq!(response.header.rcode(), Rcode::NoError);
        assert_eq!(response.questions.len(), 1);
        assert_eq!(response.answers.len(), 1);
        assert_eq!(response.answers[0].rdata.to_string(), "127.0.0.1");
        assert!(response.edns().is_none());
    }

    #[test]
    fn malformed_messages_and_responses_are_dropped() {
        let calls = AtomicUsize::new(0);
        let server = Server::new(|_: &Message, response: &mut ResponseBuilder<'_>| {
            calls.fetch_add(1, Ordering::Relaxed);
            response.send();
        });
        assert_eq!(handle(&server, b"\x12\x34\x01"), None);

        let mut truncated = query("example.com", None);
        truncated.pop();
        assert_eq!(handle(&server, &truncated), None);

        let mut response = query("example.com", None);
        response[2] |= 0x80;
        assert_eq!(handle(&server, &response), None);

        assert_eq!(calls.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn no_response_without_send() {
        let server = Server::new(|_: &Message, _: &mut ResponseBuilder<'_>| ());
        assert_eq!(handle(&server, &query("example.com", None)), None);
    }

    #[test]
    fn edns_requests_get_edns_responses() {
        let server = Server::new(loopback_handler(1));
        let response = handle(&server, &query("example.com", Some((4096, 0)))).unwrap();
        let edns = response.edns().unwrap();
        assert_eq!(edns.udp_payload_size, 1232);
        assert_eq!(edns.version, 0);
        assert_eq!(response.answers.len(), 1);
    }

    #[test]
    fn unknown_edns_versions_get_badvers() {
        let server = Server::new(loopback_handler(1));
        let response = handle(&server, &query("example.com", Some((4096, 0x0001_0000)))).unwrap();
        assert_eq!(response.extended_rcode(), ExtendedRcode::BADVERS);
        assert_eq!(response.questions.len(), 1);
        assert!(response.answers.is_empty());
    }

    #[test]
    fn oversized_responses_are_truncated() {
        // Each answer is 16 octets with compression, so 40 of them
        // overflow 512 octets but fit in 1,232.
        let server = Server::new(loopback_handler(40));
        let response = handle(&server, &query("example.com", None)).unwrap();
        assert!(response.header.tc());
        assert_eq!(response.questions.len(), 1);
        assert!(response.answers.is_empty());

        let response = handle(&server, &query("example.com", Some((4096, 0)))).unwrap();
        assert!(!response.header.tc());
        assert_eq!(response.answers.len(), 40);

        // The requestor's smaller payload size wins.
        let response = handle(&server, &query("example.com", Some((600, 0)))).unwrap();
        assert!(response.header.tc());
        assert!(response.edns().is_some());
    }

    #[test]
    fn received_info_constructor_canonicalizes_ipv4_mapped_ipv6_addrs() {
        let ipv4_mapped_ipv6 = "[::ffff:127.0.0.1]:53".parse().unwrap();
        let received_info = ReceivedInfo::new(ipv4_mapped_ipv6);
        assert_eq!(
            received_info.source(),
            SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 53),
        );
    }
}
