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

//! The `ndns` command-line tool: a small static-record DNS server, a
//! forwarding proxy and a query client.

use std::fmt::Write;
use std::process;

use env_logger::Env;
use log::{error, info};

mod args;
mod config;
mod proxy;
mod query;
mod serve;

use args::Command;

fn main() {
    let args = args::parse();
    env_logger::init_from_env(Env::new().default_filter_or("warn"));
    let what = match args.command {
        Command::Serve(_) => "run",
        Command::Query(_) => "query",
        Command::Proxy(_) => "run the proxy",
    };

    let result = match args.command {
        Command::Serve(serve_args) => {
            info!(
                "ndns v{}.{}.{} starting.",
                env!("CARGO_PKG_VERSION_MAJOR"),
                env!("CARGO_PKG_VERSION_MINOR"),
                env!("CARGO_PKG_VERSION_PATCH"),
            );
            serve::serve(serve_args)
        }
        Command::Query(query_args) => query::query(query_args),
        Command::Proxy(proxy_args) => {
            info!(
                "ndns v{}.{}.{} starting as a proxy.",
                env!("CARGO_PKG_VERSION_MAJOR"),
                env!("CARGO_PKG_VERSION_MINOR"),
                env!("CARGO_PKG_VERSION_PATCH"),
            );
            proxy::proxy(proxy_args)
        }
    };

    if let Err(e) = result {
        let mut message = format!("Failed to {}:", what);
        for (i, cause) in e.chain().enumerate() {
            let _ = write!(message, "\n[{}] {}", i + 1, cause);
        }
        message.push_str("\nExiting with failure.");
        error!("{}", message);
        process::exit(1);
    }
}
