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

//! Implements the `query` command.

use std::fmt::Write;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use anyhow::{Context, Result};
use log::debug;

use ndns::client::{rcode_error, Client, RequestOptions};
use ndns::message::{Message, Section};

use crate::args::QueryArgs;

/// Sends the query described by `args` and prints the response. A
/// response carrying an error RCODE is printed and then reported as a
/// failure.
pub fn query(args: QueryArgs) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start the Tokio runtime")?;
    let response = runtime.block_on(send(&args))?;
    print!("{}", format_response(&response));
    match rcode_error(&response) {
        Some(e) => {
            let name = e.name();
            Err(anyhow::Error::new(e).context(format!("the server answered {}", name)))
        }
        None => Ok(()),
    }
}

async fn send(args: &QueryArgs) -> Result<Message> {
    let local: SocketAddr = if args.server.is_ipv4() {
        (Ipv4Addr::UNSPECIFIED, 0).into()
    } else {
        (Ipv6Addr::UNSPECIFIED, 0).into()
    };
    let client = Client::bind(local)
        .await
        .context("failed to bind the client socket")?;
    debug!("Sending query from {:?} to {}.", client.local_addr().ok(), args.server);

    let mut options = RequestOptions::new(args.server);
    options.timeout = Some(Duration::from_millis(args.timeout));
    options.edns_udp_payload_size = args.edns;
    let mut request = client.request(options);
    request
        .add_question(args.name.clone(), args.qtype, args.qclass)
        .set_rd(!args.no_rd);
    let response = request.send().await.context("the query failed")?;
    client.close();
    Ok(response)
}

/// Formats a response in the style of `dig`.
fn format_response(response: &Message) -> String {
    let header = &response.header;
    let mut flags = String::new();
    for (set, name) in [
        (header.qr(), "qr"),
        (header.aa(), "aa"),
        (header.tc(), "tc"),
        (header.rd(), "rd"),
        (header.ra(), "ra"),
        (header.ad(), "ad"),
        (header.cd(), "cd"),
    ] {
        if set {
            flags.push(' ');
            flags.push_str(name);
        }
    }

    // Writing to a String cannot fail, so results are ignored below.
    let mut out = String::new();
    let _ = writeln!(
        out,
        ";; ->>HEADER<<- opcode: {}, status: {}, id: {}",
        header.opcode(),
        response.extended_rcode(),
        header.id,
    );
    let _ = writeln!(
        out,
        ";; flags:{}; QUERY: {}, ANSWER: {}, AUTHORITY: {}, ADDITIONAL: {}",
        flags,
        response.questions.len(),
        response.answers.len(),
        response.authorities.len(),
        response.additionals.len(),
    );
    if let Some(edns) = response.edns() {
        let _ = writeln!(
            out,
            ";; EDNS: version {}, udp: {}",
            edns.version, edns.udp_payload_size
        );
    }

    if !response.questions.is_empty() {
        let _ = writeln!(out, "\n;; QUESTION SECTION:");
        for question in &response.questions {
            let _ = writeln!(out, ";{}", question);
        }
    }
    for section in [Section::Answer, Section::Authority, Section::Additional] {
        let records: Vec<_> = response
            .records(section)
            .iter()
            .filter(|rr| rr.rr_type != ndns::rr::Type::OPT)
            .collect();
        if records.is_empty() {
            continue;
        }
        let _ = writeln!(out, "\n;; {} SECTION:", section);
        for record in records {
            let _ = writeln!(out, "{}", record);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use ndns::class::Class;
    use ndns::message::{Question, Rcode};
    use ndns::rr::{Rdata, ResourceRecord, Type};

    use super::*;

    #[test]
    fn format_response_works() {
        let mut response = Message::default();
        response.header.id = 7;
        response.header.set_qr(true);
        response.header.set_aa(true);
        response.header.set_rcode(Rcode::NoError);
        response.questions.push(Question::new(
            "example.test.".parse().unwrap(),
            Type::A,
            Class::IN,
        ));
        response.answers.push(ResourceRecord {
            owner: "example.test.".parse().unwrap(),
            rr_type: Type::A,
            class: Class::IN,
            ttl: 60,
            rdata: Rdata::from_text(Type::A, &["192.0.2.1"]).unwrap(),
        });

        let text = format_response(&response);
        assert!(text.contains("status: NOERROR, id: 7"));
        assert!(text.contains(";; flags: qr aa; QUERY: 1, ANSWER: 1, AUTHORITY: 0"));
        assert!(text.contains(";; ANSWER SECTION:\nexample.test\t60\tIN\tA\t192.0.2.1\n"));
        assert!(!text.contains("AUTHORITY SECTION"));
    }
}
