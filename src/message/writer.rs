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

//! Implementation of the [`Writer`] type to write on-the-wire DNS
//! messages.

use std::fmt;

use super::compression::CompressionTable;
use super::constants::*;
use super::{Edns, ExtendedRcode, Flag, Header, Opcode, Question, Rcode, Section};
use crate::class::Class;
use crate::name::Name;
use crate::rr::{rdata, Field, Rdata, ResourceRecord, Type};

////////////////////////////////////////////////////////////////////////
// WRITER                                                             //
////////////////////////////////////////////////////////////////////////

/// A "frame" around a buffer that serializes a DNS message into it.
///
/// A `Writer` is constructed using [`Writer::new`] (to set an initial
/// message size limit different from the underlying buffer size) or
/// with its [`TryFrom`] implementation (which sets the message size
/// limit equal to the buffer length). The underlying buffer and initial
/// message size limit must be long enough to accommodate a full DNS
/// message header of 12 octets. The message header is initially zeroed.
///
/// Since header information is in a fixed position, it can be written
/// at any time through the appropriate `Writer` methods. Questions are
/// added with [`Writer::add_question`] and resource records with
/// [`Writer::add_rr`] (or [`Writer::add_record`]).
///
/// Questions and resource records are written sequentially into the
/// buffer based on a cursor. Thus they must be added in the proper
/// order (questions, answer RRs, authority RRs, additional RRs). To
/// ensure this, the `Writer` keeps track of the section of the DNS
/// message body it is currently writing. Attempts to add entries out
/// of order will fail with [`Error::OutOfOrder`].
///
/// Owner names, question names, and names within the RDATA of the
/// types listed in [`Type::allows_rdata_compression`] are compressed
/// against every name written before them. Each operation either
/// succeeds completely or leaves the message exactly as it was.
///
/// For EDNS messages, use [`Writer::set_edns`]. Space for an OPT record
/// will be reserved, and the OPT record will be automatically added to
/// the message when [`Writer::finish`] is called.
pub struct Writer<'a> {
    octets: &'a mut [u8],
    cursor: usize,
    limit: usize,
    available: usize,
    rr_start: usize,
    rr_start_compression_len: usize,
    section: Section,
    counts: [u16; 4],
    compression: CompressionTable,
    edns: Option<Edns>,
}

impl<'a> Writer<'a> {
    /// Creates a new `Writer` from the underlying buffer `octets`. The
    /// message size is initially limited to `limit` or `octets.len()`
    /// (whichever is smaller). If the smaller limit is too small to
    /// hold a full DNS message header of 12 octets, then this will
    /// fail.
    pub fn new(octets: &'a mut [u8], limit: usize) -> Result<Self> {
        let limit = limit.min(octets.len());
        if limit < HEADER_SIZE {
            Err(Error::Truncation)
        } else {
            octets[0..HEADER_SIZE].fill(0);
            Ok(Self {
                octets,
                cursor: HEADER_SIZE,
                limit,
                available: limit,
                rr_start: HEADER_SIZE,
                rr_start_compression_len: 0,
                section: Section::Question,
                counts: [0; 4],
                compression: CompressionTable::new(),
                edns: None,
            })
        }
    }

    /// Sets the size limit for the message as close to `new_limit` as
    /// possible. Note that this method silently clamps the value: the
    /// limit cannot be more than the underlying buffer's size and
    /// cannot be less than the length of the message written so far,
    /// plus any reserved space.
    pub fn set_limit(&mut self, new_limit: usize) {
        if new_limit >= self.limit {
            let new_limit = new_limit.min(self.octets.len());
            let increase = new_limit - self.limit;
            self.limit = new_limit;
            self.available += increase;
        } else {
            let new_limit = new_limit.max(self.cursor + self.limit - self.available);
            let decrease = self.limit - new_limit;
            self.limit = new_limit;
            self.available -= decrease;
        }
    }

    /// Returns the ID and flags as currently written.
    pub fn header(&self) -> Header {
        Header {
            id: read_u16(self.octets, ID_START),
            flags: read_u16(self.octets, FLAGS_START),
        }
    }

    /// Overwrites the ID and flags.
    pub fn set_header(&mut self, header: Header) {
        self.write_u16(ID_START, header.id);
        self.write_u16(FLAGS_START, header.flags);
    }

    fn update_header(&mut self, f: impl FnOnce(&mut Header)) {
        let mut header = self.header();
        f(&mut header);
        self.set_header(header);
    }

    /// Returns the current 16-bit ID of the message.
    pub fn id(&self) -> u16 {
        self.header().id
    }

    /// Sets the 16-bit ID of the message.
    pub fn set_id(&mut self, id: u16) {
        self.write_u16(ID_START, id);
    }

    /// Returns the value of a field of the flags word.
    pub fn flag(&self, flag: Flag) -> u16 {
        self.header().flag(flag)
    }

    /// Sets a field of the flags word. Bits of `value` that do not fit
    /// in the field are discarded.
    pub fn set_flag(&mut self, flag: Flag, value: u16) {
        self.update_header(|header| header.set_flag(flag, value));
    }

    /// Sets or clears the QR (query response) bit.
    pub fn set_qr(&mut self, qr: bool) {
        self.update_header(|header| header.set_qr(qr));
    }

    /// Sets the message's opcode.
    pub fn set_opcode(&mut self, opcode: Opcode) {
        self.update_header(|header| header.set_opcode(opcode));
    }

    /// Sets or clears the AA (authoritative answer) bit.
    pub fn set_aa(&mut self, aa: bool) {
        self.update_header(|header| header.set_aa(aa));
    }

    /// Sets or clears the TC (truncation) bit.
    pub fn set_tc(&mut self, tc: bool) {
        self.update_header(|header| header.set_tc(tc));
    }

    /// Sets or clears the RD (recursion desired) bit.
    pub fn set_rd(&mut self, rd: bool) {
        self.update_header(|header| header.set_rd(rd));
    }

    /// Sets or clears the RA (recursion available) bit.
    pub fn set_ra(&mut self, ra: bool) {
        self.update_header(|header| header.set_ra(ra));
    }

    /// Sets or clears the AD (authentic data) bit.
    pub fn set_ad(&mut self, ad: bool) {
        self.update_header(|header| header.set_ad(ad));
    }

    /// Sets or clears the CD (checking disabled) bit.
    pub fn set_cd(&mut self, cd: bool) {
        self.update_header(|header| header.set_cd(cd));
    }

    /// Sets the message's RCODE. In an EDNS message, this clears the
    /// 8-bit extension of the RCODE in the OPT TTL field.
    pub fn set_rcode(&mut self, rcode: Rcode) {
        self.update_header(|header| header.set_rcode(rcode));
        if let Some(ref mut edns) = self.edns {
            edns.extended_rcode_upper_bits = 0;
        }
    }

    /// Returns the message's extended RCODE. If EDNS is not in use,
    /// then this is just the RCODE.
    pub fn extended_rcode(&self) -> ExtendedRcode {
        let lower_four = self.flag(Flag::Rcode);
        if let Some(ref edns) = self.edns {
            (((edns.extended_rcode_upper_bits as u16) << 4) | lower_four).into()
        } else {
            lower_four.into()
        }
    }

    /// Sets the message's extended RCODE. This will fail is EDNS is not
    /// in use, or if the value is greater than 4,095 (since OPT records
    /// can only express extended RCODEs that fit in 12 bits).
    pub fn set_extended_rcode(&mut self, rcode: ExtendedRcode) -> Result<()> {
        if self.edns.is_none() {
            return Err(Error::NotEdns);
        } else if u16::from(rcode) > 4095 {
            return Err(Error::ExtendedRcodeOverflow);
        }
        self.update_header(|header| header.set_rcode(rcode.header_bits()));
        if let Some(ref mut edns) = self.edns {
            edns.extended_rcode_upper_bits = rcode.upper_bits();
        }
        Ok(())
    }

    /// Returns the number of entries written to `section` so far. For
    /// the additional section, this includes the OPT record if EDNS is
    /// in use.
    pub fn count(&self, section: Section) -> u16 {
        self.counts[section.index()]
    }

    /// Returns the number of octets written so far (not counting any
    /// reserved space).
    pub fn len(&self) -> usize {
        self.cursor
    }

    /// Returns whether nothing besides the header has been written.
    pub fn is_empty(&self) -> bool {
        self.cursor == HEADER_SIZE
    }

    /// Adds a question to message. This must be used before any
    /// resource records are added.
    pub fn add_question(&mut self, question: &Question) -> Result<()> {
        if self.section != Section::Question {
            Err(Error::OutOfOrder)
        } else if let Some(new_qdcount) = self.counts[0].checked_add(1) {
            self.with_rollback(|this| {
                this.write_name(&question.qname, true)?;
                this.try_push_u16(question.qtype.into())?;
                this.try_push_u16(question.qclass.into())
            })?;
            self.counts[0] = new_qdcount;
            self.rr_start = self.cursor;
            self.rr_start_compression_len = self.compression.len();
            Ok(())
        } else {
            Err(Error::CountOverflow)
        }
    }

    /// Adds a resource record to `section`. Records may be added to
    /// the current section or to any later one, but never to an
    /// earlier section or to the question section.
    ///
    /// The RDATA must match the layout of `rr_type` (see
    /// [`Rdata::check`]); otherwise this fails with
    /// [`Error::InvalidRdata`] and nothing is written.
    pub fn add_rr(
        &mut self,
        section: Section,
        owner: &Name,
        rr_type: Type,
        class: Class,
        ttl: u32,
        rdata: &Rdata,
    ) -> Result<()> {
        if section == Section::Question {
            return Err(Error::QuestionSection);
        } else if section < self.section {
            return Err(Error::OutOfOrder);
        }
        let index = section.index();
        let new_count = self.counts[index]
            .checked_add(1)
            .ok_or(Error::CountOverflow)?;
        rdata.check(rr_type).map_err(Error::InvalidRdata)?;

        self.with_rollback(|this| {
            this.section = section;
            this.write_rr(owner, rr_type, class, ttl, rdata)?;
            this.counts[index] = new_count;
            Ok(())
        })
    }

    /// Adds `record` to `section`. See [`Writer::add_rr`].
    pub fn add_record(&mut self, section: Section, record: &ResourceRecord) -> Result<()> {
        self.add_rr(
            section,
            &record.owner,
            record.rr_type,
            record.class,
            record.ttl,
            &record.rdata,
        )
    }

    fn write_rr(
        &mut self,
        owner: &Name,
        rr_type: Type,
        class: Class,
        ttl: u32,
        rdata: &Rdata,
    ) -> Result<()> {
        self.write_name(owner, true)?;
        self.try_push_u16(rr_type.into())?;
        self.try_push_u16(class.into())?;
        self.try_push_u32(ttl)?;

        // Save two octets for the RDLENGTH field. We must compute and
        // write this field at the end, since it's affected by
        // compression.
        if self.available - self.cursor < 2 {
            return Err(Error::Truncation);
        }
        let rdlength_start = self.cursor;
        self.cursor += 2;

        let compress = rr_type.allows_rdata_compression();
        for field in rdata.fields() {
            match field {
                Field::Ipv4(address) => self.try_push(&address.octets())?,
                Field::Ipv6(address) => self.try_push(&address.octets())?,
                Field::U16(value) => self.try_push_u16(*value)?,
                Field::U32(value) => self.try_push_u32(*value)?,
                Field::Name(name) => self.write_name(name, compress)?,
                Field::CharacterString(octets) => {
                    self.try_push(&[octets.len() as u8])?;
                    self.try_push(octets)?;
                }
                Field::Opaque(octets) => self.try_push(octets)?,
            }
        }

        // Compute and write the RDLENGTH field.
        let rdlength = self.cursor - rdlength_start - 2;
        self.write_u16(rdlength_start, rdlength as u16);
        Ok(())
    }

    /// Removes all resource records from the message, leaving the
    /// header and questions (and any EDNS setup) intact.
    pub fn clear_rrs(&mut self) {
        self.counts[1] = 0;
        self.counts[2] = 0;
        self.counts[3] = 0;
        if self.edns.is_some() {
            self.counts[3] += 1;
        }
        self.cursor = self.rr_start;
        self.section = Section::Question;
        self.compression.truncate(self.rr_start_compression_len);
    }

    /// Makes the message an EDNS message advertising the given UDP
    /// payload size. Space for the OPT record is reserved right away.
    pub fn set_edns(&mut self, udp_payload_size: u16) -> Result<()> {
        if self.edns.is_some() {
            Err(Error::AlreadyEdns)
        } else if self.cursor + OPT_RECORD_SIZE > self.available {
            Err(Error::Truncation)
        } else if let Some(new_arcount) = self.counts[3].checked_add(1) {
            self.counts[3] = new_arcount;
            self.available -= OPT_RECORD_SIZE;
            self.edns = Some(Edns {
                udp_payload_size,
                extended_rcode_upper_bits: 0,
                version: 0,
                dnssec_ok: false,
                z: 0,
            });
            Ok(())
        } else {
            Err(Error::CountOverflow)
        }
    }

    /// Writes the section counts (and the OPT record, for EDNS
    /// messages) and returns the final length of the message.
    pub fn finish(mut self) -> usize {
        self.write_u16(QDCOUNT_START, self.counts[0]);
        self.write_u16(ANCOUNT_START, self.counts[1]);
        self.write_u16(NSCOUNT_START, self.counts[2]);
        self.write_u16(ARCOUNT_START, self.counts[3]);

        if let Some(edns) = self.edns {
            // The space was reserved by set_edns.
            let class = edns.udp_payload_size.to_be_bytes();
            let ttl = edns.opt_ttl().to_be_bytes();
            let opt: [u8; OPT_RECORD_SIZE] = [
                0,
                0,
                u16::from(Type::OPT) as u8,
                class[0],
                class[1],
                ttl[0],
                ttl[1],
                ttl[2],
                ttl[3],
                0,
                0,
            ];
            self.write(self.cursor, &opt);
            self.cursor += OPT_RECORD_SIZE;
        }
        self.cursor
    }

    /// Executes `f(self)`, returning the result and rolling back the
    /// section, cursor, and compression state to the current values
    /// first if the result is an error.
    fn with_rollback<F, T>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        let saved_section = self.section;
        let saved_cursor = self.cursor;
        let saved_compression_len = self.compression.len();
        let result = f(self);
        if result.is_err() {
            self.section = saved_section;
            self.cursor = saved_cursor;
            self.compression.truncate(saved_compression_len);
        }
        result
    }

    /// Writes a domain name at the current cursor. If `compress` is
    /// set, the longest suffix already present in the message is
    /// replaced by a pointer, and the labels written literally become
    /// candidates for later names.
    fn write_name(&mut self, name: &Name, compress: bool) -> Result<()> {
        let wire = name.wire_repr();
        if !compress {
            return self.try_push(wire);
        }

        let (literal_len, pointer) = match self.compression.find(&self.octets[..self.cursor], name) {
            Some((suffix_start, pointer)) => (suffix_start, Some(pointer)),
            None => (wire.len(), None),
        };
        let start = self.cursor;
        self.try_push(&wire[..literal_len])?;
        if let Some(pointer) = pointer {
            self.try_push_u16(0xc000 | pointer)?;
        }
        for label_offset in name.label_offsets().take_while(|o| *o < literal_len) {
            self.compression.record(start + label_offset);
        }
        Ok(())
    }

    /// Tries to write `data` to the underlying buffer at the current
    /// cursor, failing if there is not sufficient space.
    fn try_push(&mut self, data: &[u8]) -> Result<()> {
        if self.available - self.cursor >= data.len() {
            self.write(self.cursor, data);
            self.cursor += data.len();
            Ok(())
        } else {
            Err(Error::Truncation)
        }
    }

    /// Tries to write `data` in network byte order to the underlying
    /// buffer, failing if there is not sufficient space.
    fn try_push_u16(&mut self, data: u16) -> Result<()> {
        self.try_push(&data.to_be_bytes())
    }

    /// Tries to write `data` in network byte order to the underlying
    /// buffer, failing if there is not sufficient space.
    fn try_push_u32(&mut self, data: u32) -> Result<()> {
        self.try_push(&data.to_be_bytes())
    }

    /// Writes `data` to the underlying buffer at `position`. Note that
    /// this performs no bounds checking.
    fn write(&mut self, position: usize, data: &[u8]) {
        self.octets[position..position + data.len()].copy_from_slice(data);
    }

    /// Writes `data` in network byte order to the underlying buffer at
    /// `position`. Note that this performs no bounds checking.
    fn write_u16(&mut self, position: usize, data: u16) {
        self.write(position, &data.to_be_bytes());
    }
}

impl<'a> TryFrom<&'a mut [u8]> for Writer<'a> {
    type Error = Error;

    fn try_from(octets: &'a mut [u8]) -> Result<Self> {
        let len = octets.len();
        Self::new(octets, len)
    }
}

fn read_u16(octets: &[u8], position: usize) -> u16 {
    u16::from_be_bytes([octets[position], octets[position + 1]])
}

////////////////////////////////////////////////////////////////////////
// ERRORS                                                             //
////////////////////////////////////////////////////////////////////////

/// An error signaling that a [`Writer`] operation could not be
/// performed.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Error {
    /// Adding the question or resource record would overflow the
    /// corresponding 16-bit counter in the DNS header.
    CountOverflow,

    /// There is not enough room left in the buffer.
    Truncation,

    /// An attempt was made to serialize a question or resource record
    /// in the wrong place in the message (e.g., adding a question after
    /// an answer resource record has already been serialized).
    OutOfOrder,

    /// An attempt was made to add a resource record to the question
    /// section.
    QuestionSection,

    /// The RDATA does not match the layout of the record's type.
    InvalidRdata(rdata::Error),

    /// An attempt was made to set EDNS parameters on a non-EDNS
    /// message.
    NotEdns,

    /// An attempt was made to set up EDNS when EDNS is already enabled.
    AlreadyEdns,

    /// An attempt was made to set an extended RCODE over 4,095.
    ExtendedRcodeOverflow,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::CountOverflow => f.write_str("record count would overflow"),
            Self::Truncation => f.write_str("message would be truncated"),
            Self::OutOfOrder => f.write_str("question or record serialized out of order"),
            Self::QuestionSection => f.write_str("resource record added to question section"),
            Self::InvalidRdata(err) => write!(f, "invalid RDATA: {}", err),
            Self::NotEdns => f.write_str("not an EDNS message"),
            Self::AlreadyEdns => f.write_str("already an EDNS message"),
            Self::ExtendedRcodeOverflow => f.write_str("extended RCODE would overflow"),
        }
    }
}

impl std::error::Error for Error {}

/// The type returned by fallible [`Writer`] methods.
pub type Result<T> = std::result::Result<T, Error>;

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use lazy_static::lazy_static;

    use super::super::{Parser, Record};
    use super::*;

    lazy_static! {
        static ref NAME: Name = "resolver.test.".parse().unwrap();
        static ref QUESTION: Question = Question::new(NAME.clone(), Type::A, Class::IN);
        static ref RDATA: Rdata = Rdata::from_text(Type::A, &["127.0.0.1"]).unwrap();
    }

    fn add_a(writer: &mut Writer, section: Section) -> Result<()> {
        writer.add_rr(section, &NAME, Type::A, Class::IN, 3600, &RDATA)
    }

    #[test]
    fn writer_works() {
        // This is not meant to be exhaustive by any means. Rather, it's
        // just a check that the Writer works in a basic scenario.
        let mut buf = vec![0; 512];
        let mut writer = Writer::try_from(buf.as_mut_slice()).unwrap();
        writer.set_id(0x0703);
        writer.set_opcode(Opcode::Query);
        writer.set_qr(true);
        writer.set_aa(true);
        writer.set_rcode(Rcode::NoError);
        writer.add_question(&QUESTION).unwrap();
        add_a(&mut writer, Section::Answer).unwrap();
        let len = writer.finish();
        assert_eq!(
            &buf[0..len],
            b"\x07\x03\x84\x00\x00\x01\x00\x01\x00\x00\x00\x00\
              \x08resolver\x04test\x00\x00\x01\x00\x01\
              \xc0\x0c\x00\x01\x00\x01\x00\x00\x0e\x10\x00\x04\
              \x7f\x00\x00\x01"
        );
    }

    #[test]
    fn writer_works_with_edns() {
        let mut buf = [0; 512];
        let mut writer = Writer::try_from(buf.as_mut_slice()).unwrap();
        writer.set_id(0x0703);
        writer.set_opcode(Opcode::Update);
        writer.set_qr(true);
        writer.set_edns(1232).unwrap();
        assert_eq!(writer.set_edns(1232), Err(Error::AlreadyEdns));
        let len = writer.finish();
        assert_eq!(
            &buf[0..len],
            b"\x07\x03\xa8\x00\x00\x00\x00\x00\x00\x00\x00\x01\
              \x00\x00\x29\x04\xd0\x00\x00\x00\x00\x00\x00",
        );
    }

    #[test]
    fn extended_rcodes_need_edns() {
        let mut buf = [0; 512];
        let mut writer = Writer::try_from(buf.as_mut_slice()).unwrap();
        assert_eq!(
            writer.set_extended_rcode(ExtendedRcode::BADVERS),
            Err(Error::NotEdns)
        );
        writer.set_edns(512).unwrap();
        assert_eq!(
            writer.set_extended_rcode(ExtendedRcode::from(4096u16)),
            Err(Error::ExtendedRcodeOverflow)
        );
        writer.set_extended_rcode(ExtendedRcode::BADVERS).unwrap();
        assert_eq!(writer.extended_rcode(), ExtendedRcode::BADVERS);
        assert_eq!(writer.header().rcode(), Rcode::NoError);
        let len = writer.finish();

        // Upper bits 0x01 in the first octet of the OPT TTL.
        assert_eq!(&buf[len - 6..len - 2], b"\x01\x00\x00\x00");
    }

    #[test]
    fn set_flag_masks_values() {
        let mut buf = [0; 12];
        let mut writer = Writer::try_from(buf.as_mut_slice()).unwrap();
        writer.set_flag(Flag::Opcode, 0x1f);
        writer.set_rd(true);
        assert_eq!(writer.flag(Flag::Opcode), 0xf);
        assert_eq!(writer.header().flags, 0x7900);
    }

    #[test]
    fn writer_tracks_counts() {
        let mut buf = vec![0; 512];
        let mut writer = Writer::try_from(buf.as_mut_slice()).unwrap();
        writer.add_question(&QUESTION).unwrap();
        add_a(&mut writer, Section::Answer).unwrap();
        add_a(&mut writer, Section::Answer).unwrap();
        add_a(&mut writer, Section::Additional).unwrap();
        assert_eq!(writer.count(Section::Question), 1);
        assert_eq!(writer.count(Section::Answer), 2);
        assert_eq!(writer.count(Section::Authority), 0);
        assert_eq!(writer.count(Section::Additional), 1);
        let len = writer.finish();
        assert_eq!(&buf[4..12], b"\x00\x01\x00\x02\x00\x00\x00\x01");

        let parser = Parser::new(&buf[..len]).unwrap();
        assert_eq!(parser.count(Section::Answer), 2);
    }

    #[test]
    fn writer_detects_qdcount_overflow() {
        let mut buf = vec![0; 2_097_152]; // 2 MiB
        let mut writer = Writer::try_from(buf.as_mut_slice()).unwrap();
        for _ in 0..u16::MAX {
            writer.add_question(&QUESTION).unwrap();
        }
        assert_eq!(writer.add_question(&QUESTION), Err(Error::CountOverflow));
    }

    #[test]
    fn writer_enforces_ordering() {
        let mut buf = vec![0; 512];
        let mut writer = Writer::try_from(buf.as_mut_slice()).unwrap();
        writer.add_question(&QUESTION).unwrap();
        add_a(&mut writer, Section::Authority).unwrap();
        assert_eq!(add_a(&mut writer, Section::Answer), Err(Error::OutOfOrder));
        assert_eq!(writer.add_question(&QUESTION), Err(Error::OutOfOrder));
        assert_eq!(
            add_a(&mut writer, Section::Question),
            Err(Error::QuestionSection)
        );
        add_a(&mut writer, Section::Authority).unwrap();
        add_a(&mut writer, Section::Additional).unwrap();
        assert_eq!(add_a(&mut writer, Section::Authority), Err(Error::OutOfOrder));
    }

    #[test]
    fn writer_rejects_mismatched_rdata() {
        let mut buf = vec![0; 512];
        let mut writer = Writer::try_from(buf.as_mut_slice()).unwrap();
        let before = writer.len();
        assert_eq!(
            writer.add_rr(Section::Answer, &NAME, Type::MX, Class::IN, 0, &RDATA),
            Err(Error::InvalidRdata(rdata::Error::WrongFieldCount))
        );
        assert_eq!(writer.len(), before);
        assert_eq!(writer.count(Section::Answer), 0);
    }

    #[test]
    fn writer_rolls_back_on_truncation() {
        // Room for the header, the question (19 octets), and one A
        // record with a compressed owner (16 octets), but not two.
        let mut buf = vec![0; 12 + 19 + 16 + 10];
        let mut writer = Writer::try_from(buf.as_mut_slice()).unwrap();
        writer.add_question(&QUESTION).unwrap();
        add_a(&mut writer, Section::Answer).unwrap();
        let len = writer.len();
        assert_eq!(add_a(&mut writer, Section::Answer), Err(Error::Truncation));
        assert_eq!(writer.len(), len);
        assert_eq!(writer.count(Section::Answer), 1);

        // Nor does a record whose owner alone does not fit.
        let long: Name = "a-long-name-that-does-not-fit.resolver.test"
            .parse()
            .unwrap();
        assert_eq!(
            writer.add_rr(Section::Additional, &long, Type::A, Class::IN, 0, &RDATA),
            Err(Error::Truncation)
        );
        let len = writer.finish();
        let parser = Parser::new(&buf[..len]).unwrap();
        assert_eq!(parser.count(Section::Additional), 0);
    }

    #[test]
    fn clear_rrs_keeps_questions_and_edns() {
        let mut buf = vec![0; 512];
        let mut writer = Writer::try_from(buf.as_mut_slice()).unwrap();
        writer.add_question(&QUESTION).unwrap();
        writer.set_edns(1232).unwrap();
        add_a(&mut writer, Section::Answer).unwrap();
        add_a(&mut writer, Section::Additional).unwrap();
        writer.clear_rrs();
        writer.set_tc(true);
        let len = writer.finish();
        assert_eq!(len, 12 + 19 + OPT_RECORD_SIZE);

        let parser = Parser::new(&buf[..len]).unwrap();
        assert!(parser.header().tc());
        assert_eq!(parser.count(Section::Answer), 0);
        assert_eq!(parser.count(Section::Additional), 1);
        assert_eq!(parser.edns().unwrap().udp_payload_size, 1232);
    }

    #[test]
    fn names_are_compressed_against_suffixes() {
        let mut buf = vec![0; 512];
        let mut writer = Writer::try_from(buf.as_mut_slice()).unwrap();
        let www: Name = "www.RESOLVER.test".parse().unwrap();
        let cname = Rdata::new(vec![Field::Name("mail.resolver.test".parse().unwrap())]);
        writer.add_question(&QUESTION).unwrap();
        writer
            .add_rr(Section::Answer, &www, Type::CNAME, Class::IN, 60, &cname)
            .unwrap();
        let len = writer.finish();
        assert_eq!(
            &buf[31..len],
            b"\x03www\xc0\x0c\x00\x05\x00\x01\x00\x00\x00\x3c\x00\x07\
              \x04mail\xc0\x0c"
        );
    }

    #[test]
    fn srv_targets_are_not_compressed() {
        let mut buf = vec![0; 512];
        let mut writer = Writer::try_from(buf.as_mut_slice()).unwrap();
        let srv = Rdata::from_text(Type::SRV, &["0", "0", "53", "resolver.test."]).unwrap();
        writer.add_question(&QUESTION).unwrap();
        writer
            .add_rr(Section::Answer, &NAME, Type::SRV, Class::IN, 60, &srv)
            .unwrap();
        let len = writer.finish();
        assert_eq!(
            &buf[41..len],
            b"\x00\x15\x00\x00\x00\x00\x00\x35\x08resolver\x04test\x00"
        );
    }

    #[test]
    fn compressed_names_read_back_identically() {
        let names = [
            "resolver.test",
            "a.resolver.test",
            "b.a.resolver.test",
            "B.A.RESOLVER.TEST",
            "other.test",
            "test",
            ".",
        ];
        let mut buf = vec![0; 1024];
        let mut writer = Writer::try_from(buf.as_mut_slice()).unwrap();
        for name in names.iter() {
            let name: Name = name.parse().unwrap();
            let rdata = Rdata::new(vec![Field::Name(name.clone())]);
            writer
                .add_rr(Section::Answer, &name, Type::NS, Class::IN, 0, &rdata)
                .unwrap();
        }
        let len = writer.finish();

        let mut parser = Parser::new(&buf[..len]).unwrap();
        for (i, name) in names.iter().enumerate() {
            let name: Name = name.parse().unwrap();
            match parser.get_record(Section::Answer, i as u16).unwrap() {
                Record::Resource(rr) => {
                    assert_eq!(rr.owner, name);
                    assert_eq!(rr.rdata.fields(), &[Field::Name(name)]);
                }
                other => panic!("unexpected record {:?}", other),
            }
        }
    }
}
