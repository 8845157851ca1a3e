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

//! Implements the `proxy` command, which forwards each request to an
//! upstream server and relays its answer.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use anyhow::{Context, Result};
use log::{info, warn};
use tokio::runtime::Handle;

use ndns::client::{Client, RequestOptions};
use ndns::message::{Message, Rcode, Section};
use ndns::rr::Type;
use ndns::server::{Handler, ResponseBuilder, Server};

use crate::args::ProxyArgs;
use crate::serve;

/// Runs the proxy.
pub fn proxy(args: ProxyArgs) -> Result<()> {
    let runtime = serve::build_runtime()?;
    let client = runtime
        .block_on(Client::bind(unspecified_like(args.upstream)))
        .context("failed to bind the upstream client socket")?;
    info!("Forwarding requests to {}.", args.upstream);

    let proxy = Proxy::new(
        client,
        runtime.handle().clone(),
        args.upstream,
        Duration::from_millis(args.timeout),
    );
    let mut server = Server::new(proxy);
    if let Some(size) = args.edns_udp_payload_size {
        server
            .set_edns_udp_payload_size(size)
            .context("failed to set the EDNS UDP payload size")?;
    }
    serve::run(&runtime, args.bind, server)
}

/// Returns the unspecified address (port 0) of the same family as
/// `addr`.
fn unspecified_like(addr: SocketAddr) -> SocketAddr {
    if addr.is_ipv4() {
        (Ipv4Addr::UNSPECIFIED, 0).into()
    } else {
        (Ipv6Addr::UNSPECIFIED, 0).into()
    }
}

/// A handler that asks `upstream` the same questions (with RD set) and
/// copies the AA bit, RCODE and records of its answer into the
/// response. If the upstream request fails, the response is SERVFAIL.
///
/// The upstream request is awaited from within the handler, so the
/// server must run on a multi-threaded Tokio runtime.
pub struct Proxy {
    client: Client,
    runtime: Handle,
    upstream: SocketAddr,
    timeout: Duration,
}

impl Proxy {
    pub fn new(client: Client, runtime: Handle, upstream: SocketAddr, timeout: Duration) -> Self {
        Self {
            client,
            runtime,
            upstream,
            timeout,
        }
    }

    fn ask_upstream(&self, request: &Message) -> ndns::client::Result<Message> {
        let mut options = RequestOptions::new(self.upstream);
        options.timeout = Some(self.timeout);
        let mut upstream_request = self.client.request(options);
        upstream_request.set_rd(true);
        for question in &request.questions {
            upstream_request.add_question(question.qname.clone(), question.qtype, question.qclass);
        }
        tokio::task::block_in_place(|| self.runtime.block_on(upstream_request.send()))
    }
}

impl Handler for Proxy {
    fn handle(&self, request: &Message, response: &mut ResponseBuilder<'_>) {
        response.send();
        let answer = match self.ask_upstream(request) {
            Ok(answer) => answer,
            Err(e) => {
                warn!("upstream request to {} failed: {}", self.upstream, e);
                response.set_rcode(Rcode::ServFail);
                return;
            }
        };

        response.set_aa(answer.header.aa());
        response.set_rcode(answer.header.rcode());
        for section in [Section::Answer, Section::Authority, Section::Additional] {
            for record in answer.records(section) {
                // Our own OPT record is managed by the server.
                if record.rr_type == Type::OPT {
                    continue;
                }
                if response.add_record(section, record).is_err() {
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ndns::class::Class;
    use ndns::io::TokioIoProvider;
    use ndns::rr::{Rdata, ResourceRecord};

    use super::*;
    use crate::serve::Records;

    fn localhost() -> SocketAddr {
        (Ipv4Addr::LOCALHOST, 0).into()
    }

    async fn ask(proxy_addr: SocketAddr, qname: &str) -> Message {
        let client = Client::bind(localhost()).await.unwrap();
        let mut request = client.request(RequestOptions::new(proxy_addr));
        request.add_question(qname.parse().unwrap(), Type::A, Class::IN);
        request.send().await.unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn proxy_relays_upstream_answers() {
        let upstream_records = Records::new([ResourceRecord {
            owner: "example.test.".parse().unwrap(),
            rr_type: Type::A,
            class: Class::IN,
            ttl: 300,
            rdata: Rdata::from_text(Type::A, &["192.0.2.1"]).unwrap(),
        }]);
        let upstream_provider = TokioIoProvider::bind([localhost()]).await.unwrap();
        let upstream_addr = upstream_provider.local_addrs().unwrap()[0];
        let upstream_shutdown = upstream_provider.start(&Arc::new(Server::new(upstream_records)));

        let proxy = Proxy::new(
            Client::bind(localhost()).await.unwrap(),
            Handle::current(),
            upstream_addr,
            Duration::from_secs(5),
        );
        let proxy_provider = TokioIoProvider::bind([localhost()]).await.unwrap();
        let proxy_addr = proxy_provider.local_addrs().unwrap()[0];
        let proxy_shutdown = proxy_provider.start(&Arc::new(Server::new(proxy)));

        let response = ask(proxy_addr, "example.test.").await;
        assert!(response.header.aa());
        assert_eq!(response.header.rcode(), Rcode::NoError);
        assert_eq!(response.answers.len(), 1);
        assert_eq!(response.answers[0].rdata.to_strings(), vec!["192.0.2.1"]);

        let response = ask(proxy_addr, "other.test.").await;
        assert_eq!(response.header.rcode(), Rcode::NxDomain);
        assert!(response.answers.is_empty());

        proxy_shutdown.shut_down().await;
        upstream_shutdown.shut_down().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn proxy_answers_servfail_when_upstream_is_silent() {
        // Requests sent here are received but never answered.
        let silent = tokio::net::UdpSocket::bind(localhost()).await.unwrap();
        let proxy = Proxy::new(
            Client::bind(localhost()).await.unwrap(),
            Handle::current(),
            silent.local_addr().unwrap(),
            Duration::from_millis(50),
        );
        let proxy_provider = TokioIoProvider::bind([localhost()]).await.unwrap();
        let proxy_addr = proxy_provider.local_addrs().unwrap()[0];
        let proxy_shutdown = proxy_provider.start(&Arc::new(Server::new(proxy)));

        let response = ask(proxy_addr, "example.test.").await;
        assert_eq!(response.header.rcode(), Rcode::ServFail);
        assert_eq!(response.questions.len(), 1);

        proxy_shutdown.shut_down().await;
    }
}
