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

//! Implementation of the owned [`Message`] type.

use super::{parser, writer};
use super::{Edns, ExtendedRcode, Header, Parser, Question, Record, Section, Writer};
use crate::rr::{ResourceRecord, Type};

/// A fully decoded DNS message.
///
/// This is convenient for clients and tools that want to look at a
/// whole message at once. For performance-sensitive paths, use
/// [`Parser`] and [`Writer`] directly.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Message {
    pub header: Header,
    pub questions: Vec<Question>,
    pub answers: Vec<ResourceRecord>,
    pub authorities: Vec<ResourceRecord>,
    pub additionals: Vec<ResourceRecord>,
}

impl Message {
    /// Parses and decodes every entry of the message in `octets`.
    pub fn parse(octets: &[u8]) -> parser::Result<Self> {
        let mut parser = Parser::new(octets)?;
        let mut message = Self {
            header: parser.header(),
            ..Self::default()
        };
        for section in Section::ALL {
            for record in parser.records(section) {
                match record? {
                    Record::Question(question) => message.questions.push(question),
                    Record::Resource(rr) => match section {
                        Section::Answer => message.answers.push(rr),
                        Section::Authority => message.authorities.push(rr),
                        _ => message.additionals.push(rr),
                    },
                }
            }
        }
        Ok(message)
    }

    /// Returns the resource records of `section`. The question section
    /// has none.
    pub fn records(&self, section: Section) -> &[ResourceRecord] {
        match section {
            Section::Question => &[],
            Section::Answer => &self.answers,
            Section::Authority => &self.authorities,
            Section::Additional => &self.additionals,
        }
    }

    /// Returns the EDNS fields of the first OPT record in the
    /// additional section, if there is one.
    pub fn edns(&self) -> Option<Edns> {
        self.additionals
            .iter()
            .find(|rr| rr.rr_type == Type::OPT)
            .map(|opt| Edns::from_opt(opt.class.into(), opt.ttl))
    }

    /// Returns the extended RCODE: the header RCODE, combined with the
    /// upper bits from the OPT record if there is one.
    pub fn extended_rcode(&self) -> ExtendedRcode {
        let lower_four = u8::from(self.header.rcode()) as u16;
        match self.edns() {
            Some(edns) => (((edns.extended_rcode_upper_bits as u16) << 4) | lower_four).into(),
            None => lower_four.into(),
        }
    }

    /// Serializes the message into `buf` with name compression and
    /// returns its length. OPT records in the additional section are
    /// written as they are.
    pub fn write_to(&self, buf: &mut [u8]) -> writer::Result<usize> {
        let mut writer = Writer::try_from(buf)?;
        writer.set_header(self.header);
        for question in self.questions.iter() {
            writer.add_question(question)?;
        }
        for section in [Section::Answer, Section::Authority, Section::Additional] {
            for rr in self.records(section) {
                writer.add_record(section, rr)?;
            }
        }
        Ok(writer.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::super::parser::tests::EXAMPLE_COM_NS_MESSAGE;
    use super::*;
    use crate::class::Class;
    use crate::message::Rcode;
    use crate::rr::Rdata;

    #[test]
    fn messages_survive_a_round_trip() {
        let message = Message::parse(EXAMPLE_COM_NS_MESSAGE).unwrap();
        assert_eq!(message.questions.len(), 1);
        assert_eq!(message.answers.len(), 2);
        assert_eq!(message.additionals.len(), 1);

        let mut buf = [0; 512];
        let len = message.write_to(&mut buf).unwrap();
        assert_eq!(Message::parse(&buf[..len]).unwrap(), message);
    }

    #[test]
    fn extended_rcode_combines_header_and_opt() {
        let mut message = Message::default();
        message.header.set_rcode(Rcode::NoError);
        assert_eq!(message.extended_rcode(), ExtendedRcode::NOERROR);
        assert_eq!(message.edns(), None);

        message.additionals.push(ResourceRecord {
            owner: crate::name::Name::root(),
            rr_type: Type::OPT,
            class: Class::from(1232u16),
            ttl: 0x0100_0000,
            rdata: Rdata::new(vec![crate::rr::Field::Opaque(Box::default())]),
        });
        assert_eq!(message.extended_rcode(), ExtendedRcode::BADVERS);
        assert_eq!(message.edns().unwrap().udp_payload_size, 1232);
    }
}
