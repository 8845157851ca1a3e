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

//! An asynchronous UDP DNS client.
//!
//! A [`Client`] owns a UDP socket and a background task that receives
//! responses. Each request is assigned a transaction ID that is not in
//! use by any other outstanding request of the client; responses are
//! matched to requests by ID (and source address) and delivered to the
//! waiting [`ClientRequest::send`] future.
//!
//! ```no_run
//! # async fn f() -> Result<(), Box<dyn std::error::Error>> {
//! use ndns::client::{Client, RequestOptions};
//! use ndns::class::Class;
//! use ndns::rr::Type;
//!
//! let client = Client::bind("0.0.0.0:0".parse()?).await?;
//! let mut request = client.request(RequestOptions::new("192.0.2.53:53".parse()?));
//! request.add_question("example.com".parse()?, Type::A, Class::IN);
//! let response = request.send().await?;
//! println!("{} answers", response.answers.len());
//! # Ok(())
//! # }
//! ```

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::{debug, warn};
use tokio::net::UdpSocket;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::message::{Message, Qclass, Qtype, Question, Writer};
use crate::name::Name;

mod error;

pub use error::{rcode_error, Error, RcodeError, Result};

/// The timeout used by [`RequestOptions::new`].
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// The largest possible DNS message (over UDP or otherwise).
const MAX_MESSAGE_SIZE: usize = u16::MAX as usize;

/// How long the receive task waits after an unexpected socket error
/// before receiving again.
const RECEIVE_ERROR_DELAY: Duration = Duration::from_millis(500);

////////////////////////////////////////////////////////////////////////
// CLIENT                                                             //
////////////////////////////////////////////////////////////////////////

/// An asynchronous UDP DNS client. See the [module
/// documentation](self).
///
/// The receive task is stopped when the client is closed with
/// [`Client::close`] or dropped.
pub struct Client {
    socket: Arc<UdpSocket>,
    shared: Arc<Shared>,
    receiver: JoinHandle<()>,
}

/// State shared between a [`Client`] and its receive task.
struct Shared {
    pending: Mutex<HashMap<u16, Pending>>,
    id_counter: Arc<AtomicU16>,
}

/// An outstanding request.
struct Pending {
    server: SocketAddr,
    sender: oneshot::Sender<Message>,
}

impl Client {
    /// Binds a client to the local address `addr`. Transaction IDs
    /// start at a random value.
    pub async fn bind(addr: SocketAddr) -> io::Result<Self> {
        Self::with_id_counter(addr, Arc::new(AtomicU16::new(rand::random()))).await
    }

    /// Binds a client to the local address `addr`, drawing transaction
    /// IDs from `id_counter`. The counter may be shared between clients
    /// so that their IDs do not collide.
    pub async fn with_id_counter(addr: SocketAddr, id_counter: Arc<AtomicU16>) -> io::Result<Self> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        let shared = Arc::new(Shared {
            pending: Mutex::new(HashMap::new()),
            id_counter,
        });
        let receiver = tokio::spawn(run_receiver(socket.clone(), shared.clone()));
        Ok(Self {
            socket,
            shared,
            receiver,
        })
    }

    /// Returns the local address of the client's socket.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Starts building a request.
    pub fn request(&self, options: RequestOptions) -> ClientRequest<'_> {
        ClientRequest {
            client: self,
            options,
            questions: Vec::new(),
            rd: true,
        }
    }

    /// Returns whether a request with transaction ID `id` is
    /// outstanding.
    pub fn is_pending(&self, id: u16) -> bool {
        self.shared.lock().contains_key(&id)
    }

    /// Returns the number of outstanding requests.
    pub fn pending_count(&self) -> usize {
        self.shared.lock().len()
    }

    /// Stops the receive task. Outstanding requests fail with
    /// [`Error::Closed`].
    pub fn close(&self) {
        self.receiver.abort();
        self.shared.lock().clear();
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.receiver.abort();
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, HashMap<u16, Pending>> {
        // The map is left consistent by every critical section, so a
        // panic elsewhere does not invalidate it.
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocates a transaction ID not used by any outstanding request
    /// and registers the request under it.
    fn register(&self, server: SocketAddr) -> Result<(u16, oneshot::Receiver<Message>)> {
        let mut pending = self.lock();
        for _ in 0..=u16::MAX {
            let id = self.id_counter.fetch_add(1, Ordering::Relaxed);
            if let Entry::Vacant(entry) = pending.entry(id) {
                let (sender, receiver) = oneshot::channel();
                entry.insert(Pending { server, sender });
                return Ok((id, receiver));
            }
        }
        Err(Error::NoFreeId)
    }

    /// Removes the request with transaction ID `id`, returning whether
    /// it was still outstanding.
    fn unregister(&self, id: u16) -> bool {
        self.lock().remove(&id).is_some()
    }

    /// Delivers `response` (received from `src`) to the request waiting
    /// for it, if there is one.
    fn deliver(&self, response: Message, src: SocketAddr) {
        let id = response.header.id;
        let mut pending = self.lock();
        match pending.get(&id) {
            Some(entry) if entry.server == src => {
                if let Some(entry) = pending.remove(&id) {
                    // The requester may have given up already.
                    let _ = entry.sender.send(response);
                }
            }
            Some(_) => debug!("ignoring response with ID {} from unexpected address {}", id, src),
            None => debug!("ignoring response with unknown ID {} from {}", id, src),
        }
    }
}

/// The receive loop run for each [`Client`].
async fn run_receiver(socket: Arc<UdpSocket>, shared: Arc<Shared>) {
    let mut buf = vec![0; MAX_MESSAGE_SIZE];
    loop {
        let (len, src) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(e) => {
                match receive_error_delay(&e) {
                    None => debug!("client receive error: {e}"),
                    Some(delay) => {
                        warn!("client receive error: {e}; retrying in {delay:?}");
                        tokio::time::sleep(delay).await;
                    }
                }
                continue;
            }
        };
        match Message::parse(&buf[..len]) {
            Ok(response) => shared.deliver(response, src),
            Err(e) => debug!("dropping malformed message from {}: {}", src, e),
        }
    }
}

/// Returns how long to wait before receiving again after `error`.
/// Some platforms report ICMP errors for earlier sends on the next
/// receive; those concern a single request and are not waited on.
fn receive_error_delay(error: &io::Error) -> Option<Duration> {
    match error.kind() {
        io::ErrorKind::ConnectionRefused | io::ErrorKind::ConnectionReset => None,
        _ => Some(RECEIVE_ERROR_DELAY),
    }
}

////////////////////////////////////////////////////////////////////////
// REQUESTS                                                           //
////////////////////////////////////////////////////////////////////////

/// Options for a single request.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RequestOptions {
    /// The server to send the request to.
    pub server: SocketAddr,

    /// How long to wait for a response. `None` waits indefinitely.
    pub timeout: Option<Duration>,

    /// If set, the request carries an OPT record advertising this UDP
    /// payload size.
    pub edns_udp_payload_size: Option<u16>,
}

impl RequestOptions {
    /// Creates options for a request to `server` with the default
    /// timeout and without EDNS.
    pub fn new(server: SocketAddr) -> Self {
        Self {
            server,
            timeout: Some(DEFAULT_TIMEOUT),
            edns_udp_payload_size: None,
        }
    }
}

/// A request under construction. Created with [`Client::request`].
pub struct ClientRequest<'c> {
    client: &'c Client,
    options: RequestOptions,
    questions: Vec<Question>,
    rd: bool,
}

impl<'c> ClientRequest<'c> {
    /// Adds a question to the request.
    pub fn add_question(
        &mut self,
        qname: Name,
        qtype: impl Into<Qtype>,
        qclass: impl Into<Qclass>,
    ) -> &mut Self {
        self.questions.push(Question::new(qname, qtype, qclass));
        self
    }

    /// Sets or clears the RD (recursion desired) bit, which is set by
    /// default.
    pub fn set_rd(&mut self, rd: bool) -> &mut Self {
        self.rd = rd;
        self
    }

    /// Sends the request and waits for the response.
    ///
    /// The request stays registered with the client until a response
    /// arrives, the timeout expires, or this future is dropped.
    pub async fn send(self) -> Result<Message> {
        let shared: &Shared = &self.client.shared;
        let (id, mut receiver) = shared.register(self.options.server)?;
        let registration = Registration { shared, id };

        let mut buf = vec![0; MAX_MESSAGE_SIZE];
        let len = self.write(id, &mut buf)?;
        self.client
            .socket
            .send_to(&buf[..len], self.options.server)
            .await?;

        let response = match self.options.timeout {
            Some(duration) => match tokio::time::timeout(duration, &mut receiver).await {
                Ok(received) => received.map_err(|_| Error::Closed)?,
                Err(_) => {
                    // A response delivered just as the timer fired is
                    // still used.
                    if shared.unregister(id) {
                        return Err(Error::TimedOut);
                    }
                    receiver.try_recv().map_err(|_| Error::Closed)?
                }
            },
            None => receiver.await.map_err(|_| Error::Closed)?,
        };
        drop(registration);
        Ok(response)
    }

    fn write(&self, id: u16, buf: &mut [u8]) -> Result<usize> {
        let mut writer = Writer::try_from(buf)?;
        writer.set_id(id);
        writer.set_rd(self.rd);
        if let Some(size) = self.options.edns_udp_payload_size {
            writer.set_edns(size)?;
        }
        for question in self.questions.iter() {
            writer.add_question(question)?;
        }
        Ok(writer.finish())
    }
}

/// Removes a request from the pending table when the request ends for
/// any reason.
struct Registration<'s> {
    shared: &'s Shared,
    id: u16,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.shared.unregister(self.id);
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;
    use crate::class::Class;
    use crate::io::TokioIoProvider;
    use crate::message::{Rcode, Section};
    use crate::rr::{Rdata, Type};
    use crate::server::{ResponseBuilder, Server};

    fn localhost() -> SocketAddr {
        (Ipv4Addr::LOCALHOST, 0).into()
    }

    fn example_handler(request: &Message, response: &mut ResponseBuilder<'_>) {
        let question = &request.questions[0];
        let rdata = Rdata::from_text(Type::A, &["127.0.0.1"]).unwrap();
        response
            .add_rr(Section::Answer, &question.qname, Type::A, Class::IN, 10, &rdata)
            .unwrap();
        response.send();
    }

    #[tokio::test]
    async fn client_and_server_exchange_a_records() {
        let provider = TokioIoProvider::bind([localhost()]).await.unwrap();
        let server_addr = provider.local_addrs().unwrap()[0];
        let server = Arc::new(Server::new(example_handler));
        let shutdown = provider.start(&server);

        let client = Client::bind(localhost()).await.unwrap();
        let mut request = client.request(RequestOptions::new(server_addr));
        request.add_question("example.com".parse().unwrap(), Type::A, Class::IN);
        let response = request.send().await.unwrap();

        assert!(response.header.qr());
        assert!(response.header.rd());
        assert_eq!(response.header.rcode(), Rcode::NoError);
        assert_eq!(response.answers.len(), 1);
        assert_eq!(response.answers[0].ttl, 10);
        assert_eq!(response.answers[0].rdata.to_strings(), vec!["127.0.0.1"]);
        assert_eq!(rcode_error(&response), None);
        assert_eq!(client.pending_count(), 0);

        shutdown.shut_down().await;
    }

    #[tokio::test]
    async fn unanswered_requests_time_out() {
        // Requests sent here are received but never answered.
        let silent = UdpSocket::bind(localhost()).await.unwrap();
        let silent_addr = silent.local_addr().unwrap();

        let counter = Arc::new(AtomicU16::new(100));
        let client = Client::with_id_counter(localhost(), counter).await.unwrap();
        let mut options = RequestOptions::new(silent_addr);
        options.timeout = Some(Duration::from_millis(50));
        let mut request = client.request(options);
        request.add_question("example.com".parse().unwrap(), Type::A, Class::IN);

        assert!(matches!(request.send().await, Err(Error::TimedOut)));
        assert!(!client.is_pending(100));
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test]
    async fn responses_from_other_addresses_are_ignored() {
        let server = UdpSocket::bind(localhost()).await.unwrap();
        let server_addr = server.local_addr().unwrap();
        let impostor = UdpSocket::bind(localhost()).await.unwrap();

        let counter = Arc::new(AtomicU16::new(7));
        let client = Client::with_id_counter(localhost(), counter).await.unwrap();
        let client_addr = client.local_addr().unwrap();
        let mut options = RequestOptions::new(server_addr);
        options.timeout = Some(Duration::from_secs(5));
        let mut request = client.request(options);
        request.add_question("example.com".parse().unwrap(), Type::A, Class::IN);

        // Echo the query back as a "response" from both sockets, the
        // impostor first.
        let respond = async {
            let mut buf = [0; 512];
            let (len, _) = server.recv_from(&mut buf).await.unwrap();
            buf[2] |= 0x80;
            impostor.send_to(&buf[..len], client_addr).await.unwrap();
            tokio::time::sleep(Duration::from_millis(20)).await;
            server.send_to(&buf[..len], client_addr).await.unwrap();
        };
        let (response, ()) = tokio::join!(request.send(), respond);

        let response = response.unwrap();
        assert_eq!(response.header.id, 7);
        assert_eq!(response.questions.len(), 1);
        assert!(!client.is_pending(7));
    }

    #[test]
    fn only_unexpected_receive_errors_back_off() {
        let refused = io::Error::from(io::ErrorKind::ConnectionRefused);
        let reset = io::Error::from(io::ErrorKind::ConnectionReset);
        let other = io::Error::from(io::ErrorKind::PermissionDenied);
        assert_eq!(receive_error_delay(&refused), None);
        assert_eq!(receive_error_delay(&reset), None);
        assert_eq!(receive_error_delay(&other), Some(RECEIVE_ERROR_DELAY));
    }

    #[tokio::test]
    async fn ids_in_use_are_skipped() {
        let counter = Arc::new(AtomicU16::new(u16::MAX));
        let client = Client::with_id_counter(localhost(), counter.clone()).await.unwrap();
        let server = localhost();
        let (first, _r1) = client.shared.register(server).unwrap();
        let (second, _r2) = client.shared.register(server).unwrap();
        assert_eq!((first, second), (u16::MAX, 0));

        // Wrap around to an ID that is still outstanding.
        counter.store(u16::MAX, Ordering::Relaxed);
        let (third, _r3) = client.shared.register(server).unwrap();
        assert_eq!(third, 1);
    }

    #[tokio::test]
    async fn no_free_id_when_all_are_pending() {
        let client = Client::bind(localhost()).await.unwrap();
        let server = localhost();
        let mut receivers = Vec::new();
        for _ in 0..=u16::MAX {
            receivers.push(client.shared.register(server).unwrap());
        }
        assert!(matches!(client.shared.register(server), Err(Error::NoFreeId)));
        assert_eq!(client.pending_count(), 65536);

        client.close();
        assert_eq!(client.pending_count(), 0);
    }
}
