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

//! Error types for the [`Client`](super::Client).

use std::fmt;
use std::io;

use crate::message::{writer, ExtendedRcode, Message};

/// An error signaling that a request could not be completed.
#[derive(Debug)]
pub enum Error {
    /// The socket reported an error.
    Io(io::Error),

    /// No response arrived within the request's timeout.
    TimedOut,

    /// Every transaction ID is in use by an outstanding request.
    NoFreeId,

    /// The request message could not be serialized.
    Write(writer::Error),

    /// The client was closed before a response arrived.
    Closed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {}", e),
            Self::TimedOut => f.write_str("Request timed out."),
            Self::NoFreeId => f.write_str("no free transaction ID"),
            Self::Write(e) => write!(f, "failed to write request: {}", e),
            Self::Closed => f.write_str("client closed"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Write(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<writer::Error> for Error {
    fn from(e: writer::Error) -> Self {
        Self::Write(e)
    }
}

/// The type returned by fallible [`Client`](super::Client) operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A descriptive error for a response whose RCODE signals a failure.
/// See [`rcode_error`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct RcodeError {
    rcode: ExtendedRcode,
    name: &'static str,
    message: &'static str,
}

impl RcodeError {
    /// Returns the RCODE of the response.
    pub fn rcode(&self) -> ExtendedRcode {
        self.rcode
    }

    /// Returns a short name for the error, e.g. `NXDOMAIN`.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns a sentence describing the error.
    pub fn message(&self) -> &'static str {
        self.message
    }
}

impl fmt::Display for RcodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.name {
            "UNKNOWN" => write!(f, "Unknown Error {}.", u16::from(self.rcode)),
            _ => f.write_str(self.message),
        }
    }
}

impl std::error::Error for RcodeError {}

/// Maps the (extended) RCODE of `response` to an [`RcodeError`], or to
/// `None` for NOERROR.
pub fn rcode_error(response: &Message) -> Option<RcodeError> {
    let rcode = response.extended_rcode();
    let (name, message) = match rcode {
        ExtendedRcode::NOERROR => return None,
        ExtendedRcode::FORMERR => (
            "FORMERR",
            "Format Error: The name server was unable to interpret the query.",
        ),
        ExtendedRcode::SERVFAIL => (
            "SERVFAIL",
            "Server Failure: The name server was unable to process this query due to a problem \
             with the name server.",
        ),
        ExtendedRcode::NXDOMAIN => (
            "NXDOMAIN",
            "Name Error: The domain name referenced in the query does not exist.",
        ),
        ExtendedRcode::NOTIMP => (
            "NOTIMPL",
            "Not Implemented: The name server does not support the requested kind of query.",
        ),
        ExtendedRcode::REFUSED => (
            "REFUSED",
            "Refused: The name server refused to perform the specified operation for policy \
             reasons.",
        ),
        ExtendedRcode::BADVERS => (
            "BADVERS",
            "Bad Version: Server does not implement the version level of the request.",
        ),
        _ => ("UNKNOWN", "Unknown Error."),
    };
    Some(RcodeError {
        rcode,
        name,
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Rcode;

    fn response_with(rcode: Rcode) -> Message {
        let mut message = Message::default();
        message.header.set_qr(true);
        message.header.set_rcode(rcode);
        message
    }

    #[test]
    fn noerror_is_not_an_error() {
        assert_eq!(rcode_error(&response_with(Rcode::NoError)), None);
    }

    #[test]
    fn rcodes_map_to_descriptive_errors() {
        let error = rcode_error(&response_with(Rcode::NxDomain)).unwrap();
        assert_eq!(error.name(), "NXDOMAIN");
        assert_eq!(error.rcode(), ExtendedRcode::NXDOMAIN);
        assert_eq!(
            error.to_string(),
            "Name Error: The domain name referenced in the query does not exist."
        );
        assert_eq!(
            rcode_error(&response_with(Rcode::NotImp)).unwrap().name(),
            "NOTIMPL"
        );
        assert_eq!(
            rcode_error(&response_with(Rcode::Refused)).unwrap().name(),
            "REFUSED"
        );
    }

    #[test]
    fn unlisted_rcodes_are_unknown() {
        let error = rcode_error(&response_with(Rcode::NotZone)).unwrap();
        assert_eq!(error.name(), "UNKNOWN");
        assert_eq!(error.to_string(), "Unknown Error 10.");
    }

    #[test]
    fn timeouts_display_as_expected() {
        assert_eq!(Error::TimedOut.to_string(), "Request timed out.");
    }
}
