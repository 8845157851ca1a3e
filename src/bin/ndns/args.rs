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

//! Implements command-line argument parsing.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, Context};
use clap::{ArgGroup, Parser, Subcommand};

use ndns::class::Class;
use ndns::message::{Qclass, Qtype};
use ndns::name::Name;
use ndns::rr::{ResourceRecord, Rdata, Type};

/// Parses the command line arguments.
pub fn parse() -> Args {
    Args::parse()
}

/// A small DNS server and query tool
#[derive(Debug, Parser)]
#[command(author, version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve a static set of records over UDP
    Serve(ServeArgs),

    /// Send a query and print the response
    Query(QueryArgs),

    /// Forward requests to an upstream server
    Proxy(ProxyArgs),
}

#[derive(Debug, Parser)]
#[command(group(ArgGroup::new("source").required(true).args(["config", "bind"])))]
pub struct ServeArgs {
    /// Set the configuration file to use
    #[arg(long, conflicts_with_all = ["bind", "records", "edns_udp_payload_size"], value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Set the server bind IP address and port
    #[arg(long, value_name = "IP:PORT")]
    pub bind: Option<SocketAddr>,

    /// Set the advertised EDNS UDP payload size
    #[arg(long, value_name = "OCTETS")]
    pub edns_udp_payload_size: Option<u16>,

    /// Add a record to serve
    #[arg(long = "record", value_name = "NAME TTL TYPE DATA...")]
    pub records: Vec<RecordDescription>,
}

#[derive(Debug, Parser)]
pub struct QueryArgs {
    /// The server to query
    #[arg(long, default_value = "127.0.0.1:53", value_name = "IP:PORT")]
    pub server: SocketAddr,

    /// How long to wait for a response, in milliseconds
    #[arg(long, default_value_t = 5000, value_name = "MS")]
    pub timeout: u64,

    /// Advertise this EDNS UDP payload size in the query
    #[arg(long, value_name = "OCTETS")]
    pub edns: Option<u16>,

    /// Clear the RD (recursion desired) bit
    #[arg(long)]
    pub no_rd: bool,

    /// The name to look up
    pub name: Name,

    /// The QTYPE to ask for
    #[arg(default_value = "A", value_parser = parse_qtype)]
    pub qtype: Qtype,

    /// The QCLASS to ask for
    #[arg(default_value = "IN", value_parser = parse_qclass)]
    pub qclass: Qclass,
}

#[derive(Debug, Parser)]
pub struct ProxyArgs {
    /// Set the proxy bind IP address and port
    #[arg(long, default_value = "127.0.0.1:5300", value_name = "IP:PORT")]
    pub bind: SocketAddr,

    /// The upstream server to forward requests to
    #[arg(long, value_name = "IP:PORT")]
    pub upstream: SocketAddr,

    /// How long to wait for the upstream server, in milliseconds
    #[arg(long, default_value_t = 5000, value_name = "MS")]
    pub timeout: u64,

    /// Set the advertised EDNS UDP payload size
    #[arg(long, value_name = "OCTETS")]
    pub edns_udp_payload_size: Option<u16>,
}

fn parse_qtype(text: &str) -> Result<Qtype, String> {
    text.parse().map_err(|e: &str| e.to_owned())
}

fn parse_qclass(text: &str) -> Result<Qclass, String> {
    text.parse().map_err(|e: &str| e.to_owned())
}

/// A record provided on the command line with the `--record` option,
/// in master-file order without the class (which is always IN):
///
/// * `"www.example.test. 3600 A 192.0.2.1"`
/// * `"example.test. 3600 TXT \"hello world\""`
///
/// Fields are separated by whitespace; quoted character-strings may
/// contain spaces.
#[derive(Clone, Debug)]
pub struct RecordDescription(pub ResourceRecord);

impl FromStr for RecordDescription {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tokens = tokenize(s)?;
        let (owner, ttl, rr_type, data) = match tokens.as_slice() {
            [owner, ttl, rr_type, data @ ..] => (owner, ttl, rr_type, data),
            _ => return Err(anyhow!("expected NAME TTL TYPE DATA...")),
        };
        let owner: Name = owner
            .parse()
            .map_err(|e| anyhow!("invalid owner name: {}", e))?;
        let ttl: u32 = ttl.parse().context("invalid TTL")?;
        let rr_type: Type = rr_type
            .parse()
            .map_err(|e| anyhow!("invalid type: {}", e))?;
        let data: Vec<&str> = data.iter().map(String::as_str).collect();
        let rdata = Rdata::from_text(rr_type, &data)
            .map_err(|e| anyhow!("invalid RDATA: {}", e))?;
        Ok(Self(ResourceRecord {
            owner,
            rr_type,
            class: Class::IN,
            ttl,
            rdata,
        }))
    }
}

/// Splits `s` on whitespace, keeping quoted strings (quotes included)
/// together. A backslash escapes the octet after it.
fn tokenize(s: &str) -> anyhow::Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                current.push(c);
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            '"' => {
                quoted = !quoted;
                current.push(c);
            }
            c if c.is_whitespace() && !quoted => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if quoted {
        return Err(anyhow!("unterminated quoted string"));
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_description_parses_quoted_data() {
        let description: RecordDescription =
            "example.test. 60 TXT \"hello world\" x".parse().unwrap();
        assert_eq!(description.0.rr_type, Type::TXT);
        assert_eq!(description.0.ttl, 60);
        assert_eq!(description.0.rdata.fields().len(), 2);
    }

    #[test]
    fn record_description_rejects_missing_fields() {
        assert!("example.test. 60".parse::<RecordDescription>().is_err());
        assert!("example.test. 60 A \"1.2.3.4".parse::<RecordDescription>().is_err());
        assert!("example.test. sixty A 1.2.3.4".parse::<RecordDescription>().is_err());
    }

    #[test]
    fn proxy_requires_an_upstream() {
        assert!(Args::try_parse_from(["ndns", "proxy"]).is_err());
        let args = Args::try_parse_from(["ndns", "proxy", "--upstream", "192.0.2.53:53"]).unwrap();
        match args.command {
            Command::Proxy(proxy) => {
                assert_eq!(proxy.upstream, "192.0.2.53:53".parse().unwrap());
                assert_eq!(proxy.bind, "127.0.0.1:5300".parse().unwrap());
                assert_eq!(proxy.timeout, 5000);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn tokenize_keeps_escaped_spaces() {
        assert_eq!(tokenize(" a\\ b  c ").unwrap(), vec!["a\\ b", "c"]);
    }
}
