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

//! Implements the `serve` command.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::info;
use signal_hook::consts::signal::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use tokio::runtime::Runtime;

use ndns::io::TokioIoProvider;
use ndns::message::{Message, Opcode, Qclass, Qtype, Rcode, Section};
use ndns::name::Name;
use ndns::rr::ResourceRecord;
use ndns::server::{Handler, ResponseBuilder};

use crate::args::ServeArgs;
use crate::config;

/// The specific [`Server`](ndns::server::Server) type we use.
pub type Server = ndns::server::Server<Records>;

/// Runs the static record server.
pub fn serve(args: ServeArgs) -> Result<()> {
    let config = if let Some(ref config_path) = args.config {
        info!("Loading the configuration from {}.", config_path.display());
        config::load_from_path(config_path).context("failed to load the configuration")?
    } else {
        info!("Loading the configuration from the command line.");
        config::load_from_args(args)
    };

    let mut server = Server::new(Records::new(config.records));
    if let Some(size) = config.edns_udp_payload_size {
        server
            .set_edns_udp_payload_size(size)
            .context("failed to set the EDNS UDP payload size")?;
    }
    run(&build_runtime()?, config.bind, server)
}

/// Builds the multi-threaded Tokio runtime the server runs on.
pub fn build_runtime() -> Result<Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start the Tokio runtime")
}

/// Binds `bind` and runs `server` on `runtime` until SIGINT or SIGTERM
/// arrives.
pub fn run<H>(runtime: &Runtime, bind: SocketAddr, server: ndns::server::Server<H>) -> Result<()>
where
    H: Handler + Send + Sync + 'static,
{
    let server = Arc::new(server);
    let io_provider = runtime
        .block_on(TokioIoProvider::bind([bind]))
        .context("failed to bind sockets")?;
    for addr in io_provider.local_addrs().context("failed to get the bound address")? {
        info!("Listening on {}.", addr);
    }

    let mut signals = Signals::new([SIGINT, SIGTERM]).context("failed to set up signal handling")?;

    info!("Set-up is complete; starting the server.");
    let shutdown = {
        let _guard = runtime.enter();
        io_provider.start(&server)
    };

    if let Some(signal) = signals.forever().next() {
        let name = if signal == SIGINT { "SIGINT" } else { "SIGTERM" };
        info!("Received {}; shutting down.", name);
    }
    shutdown.blocking_shut_down();
    info!("Shutdown complete.");
    Ok(())
}

////////////////////////////////////////////////////////////////////////
// THE RECORD TABLE                                                   //
////////////////////////////////////////////////////////////////////////

/// A static table of records, answered authoritatively.
///
/// Names not in the table get NXDOMAIN. Names in the table without
/// records of the requested type get an empty NOERROR answer.
#[derive(Debug, Default)]
pub struct Records {
    by_name: HashMap<Name, Vec<ResourceRecord>>,
}

impl Records {
    pub fn new(records: impl IntoIterator<Item = ResourceRecord>) -> Self {
        let mut by_name: HashMap<Name, Vec<ResourceRecord>> = HashMap::new();
        for record in records {
            by_name.entry(record.owner.clone()).or_default().push(record);
        }
        Self { by_name }
    }
}

impl Handler for Records {
    fn handle(&self, request: &Message, response: &mut ResponseBuilder<'_>) {
        response.send();
        if request.header.opcode() != Opcode::Query {
            response.set_rcode(Rcode::NotImp);
            return;
        }
        let question = match request.questions.as_slice() {
            [question] => question,
            _ => {
                response.set_rcode(Rcode::FormErr);
                return;
            }
        };

        let records = match self.by_name.get(&question.qname) {
            Some(records) => records,
            None => {
                response.set_aa(true);
                response.set_rcode(Rcode::NxDomain);
                return;
            }
        };
        response.set_aa(true);
        for record in records {
            let type_matches =
                question.qtype == Qtype::ANY || question.qtype == Qtype::from(record.rr_type);
            let class_matches =
                question.qclass == Qclass::ANY || question.qclass == Qclass::from(record.class);
            if type_matches && class_matches && response.add_record(Section::Answer, record).is_err()
            {
                // The server sets TC once the response is truncated.
                break;
            }
        }
    }
}
