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

//! Implements the server configuration file.

use std::fmt::Write;
use std::fs;
use std::net::{IpAddr, Ipv6Addr, SocketAddr};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use log::Level::Debug;
use log::{debug, log_enabled};
use serde::{de, Deserialize};

use ndns::class::Class;
use ndns::name::Name;
use ndns::rr::{Rdata, ResourceRecord, Type};

use crate::args::ServeArgs;

////////////////////////////////////////////////////////////////////////
// CONFIGURATION LOADING                                              //
////////////////////////////////////////////////////////////////////////

/// Loads the server configuration from the file given by `path`.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config> {
    let raw_config =
        fs::read_to_string(path.as_ref()).context("failed to read the configuration file")?;
    let config = parse(&raw_config).context("failed to parse the configuration file")?;
    log_config_summary(&config);
    Ok(config)
}

/// Loads the server configuration from the parsed command line
/// arguments given by `args`.
pub fn load_from_args(args: ServeArgs) -> Config {
    let config = Config {
        bind: args.bind.unwrap_or_else(default_bind),
        edns_udp_payload_size: args.edns_udp_payload_size,
        records: args.records.into_iter().map(|r| r.0).collect(),
    };
    log_config_summary(&config);
    config
}

fn parse(text: &str) -> Result<Config> {
    let raw: RawConfig = toml::from_str(text)?;
    let records = raw
        .records
        .into_iter()
        .enumerate()
        .map(|(i, r)| {
            r.into_record()
                .with_context(|| format!("invalid record #{}", i + 1))
        })
        .collect::<Result<_>>()?;
    Ok(Config {
        bind: raw.bind,
        edns_udp_payload_size: raw.edns_udp_payload_size,
        records,
    })
}

/// Summarizes the configuration in the log, if the debug log level is
/// enabled.
fn log_config_summary(config: &Config) {
    if !log_enabled!(Debug) {
        return;
    }

    let mut message = format!(
        "Configuration loaded:\n\
         Bind address: {}\n\
         Payload size: {}\n\
         Records:      {}",
        config.bind,
        config
            .edns_udp_payload_size
            .map_or_else(|| "default".to_owned(), |s| s.to_string()),
        config.records.len(),
    );
    for record in &config.records {
        // Writing to a String cannot fail.
        let _ = write!(message, "\n  {}", record);
    }
    debug!("{}", message);
}

////////////////////////////////////////////////////////////////////////
// CONFIGURATION FILE STRUCTURE                                       //
////////////////////////////////////////////////////////////////////////

/// The loaded configuration.
#[derive(Debug)]
pub struct Config {
    pub bind: SocketAddr,
    pub edns_udp_payload_size: Option<u16>,
    pub records: Vec<ResourceRecord>,
}

/// The configuration file as written.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default = "default_bind")]
    bind: SocketAddr,
    edns_udp_payload_size: Option<u16>,
    #[serde(default)]
    records: Vec<RecordConfig>,
}

const DEFAULT_BIND_IP: IpAddr = IpAddr::V6(Ipv6Addr::LOCALHOST);
const DEFAULT_BIND_PORT: u16 = 53;

fn default_bind() -> SocketAddr {
    SocketAddr::new(DEFAULT_BIND_IP, DEFAULT_BIND_PORT)
}

/// A `[[records]]` table.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RecordConfig {
    name: ConfigName,
    #[serde(rename = "type")]
    rr_type: ConfigType,
    #[serde(default = "default_record_class")]
    class: ConfigClass,
    ttl: u32,
    data: Vec<String>,
}

fn default_record_class() -> ConfigClass {
    ConfigClass(Class::IN)
}

impl RecordConfig {
    fn into_record(self) -> Result<ResourceRecord> {
        let data: Vec<&str> = self.data.iter().map(String::as_str).collect();
        let rdata = Rdata::from_text(self.rr_type.0, &data)
            .map_err(|e| anyhow!("invalid RDATA: {}", e))?;
        Ok(ResourceRecord {
            owner: self.name.0,
            rr_type: self.rr_type.0,
            class: self.class.0,
            ttl: self.ttl,
            rdata,
        })
    }
}

////////////////////////////////////////////////////////////////////////
// DESERIALIZATION HELPERS                                            //
////////////////////////////////////////////////////////////////////////

/// A wrapper for deserializing domain names.
#[derive(Debug)]
struct ConfigName(Name);

impl<'de> Deserialize<'de> for ConfigName {
    fn deserialize<D: de::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map(Self).map_err(de::Error::custom)
    }
}

/// A wrapper for deserializing RR types from their mnemonics.
#[derive(Debug)]
struct ConfigType(Type);

impl<'de> Deserialize<'de> for ConfigType {
    fn deserialize<D: de::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map(Self).map_err(de::Error::custom)
    }
}

/// A wrapper for deserializing classes from their mnemonics.
#[derive(Debug)]
struct ConfigClass(Class);

impl<'de> Deserialize<'de> for ConfigClass {
    fn deserialize<D: de::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map(Self).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_parses() {
        let config = parse(
            r#"
            bind = "127.0.0.1:5353"
            edns_udp_payload_size = 1400

            [[records]]
            name = "example.test."
            type = "A"
            ttl = 300
            data = ["192.0.2.1"]

            [[records]]
            name = "example.test."
            type = "MX"
            class = "IN"
            ttl = 300
            data = ["10", "mail.example.test."]
            "#,
        )
        .unwrap();
        assert_eq!(config.bind, "127.0.0.1:5353".parse().unwrap());
        assert_eq!(config.edns_udp_payload_size, Some(1400));
        assert_eq!(config.records.len(), 2);
        assert_eq!(config.records[1].rr_type, Type::MX);
        assert_eq!(config.records[1].class, Class::IN);
    }

    #[test]
    fn config_defaults_apply() {
        let config = parse("").unwrap();
        assert_eq!(config.bind, default_bind());
        assert!(config.edns_udp_payload_size.is_none());
        assert!(config.records.is_empty());
    }

    #[test]
    fn config_rejects_unknown_fields_and_bad_records() {
        assert!(parse("colour = \"blue\"").is_err());
        assert!(parse(
            r#"
            [[records]]
            name = "example.test."
            type = "A"
            ttl = 300
            data = ["not-an-address"]
            "#,
        )
        .is_err());
    }
}
