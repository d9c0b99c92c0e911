/*
 * This file is part of ferrokv.
 *
 * ferrokv is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * ferrokv is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with ferrokv. If not, see <https://www.gnu.org/licenses/>.
 *
*/

//! # Server loop (§4.H)
//!
//! A single-threaded mio reactor: one `Poll`, one listener, a table of
//! connections keyed by `Token`. Each iteration waits at most 50ms for
//! I/O, drains every readable socket into complete lines, dispatches each
//! through [`commands::execute`], flushes whatever the dispatch queued
//! (including pub/sub fan-out to other connections), then checks whether
//! it's time to run sampled expiration or a persistence tick. Plays the
//! role the teacher's `dbnet::listener` accept loop plays, but as one
//! thread polling readiness events rather than a task spawned per
//! connection -- see DESIGN.md for why tokio was dropped in favor of mio.

use crate::commands::{self, ClientSink, Context};
use crate::config::Config;
use crate::keyspace::Keyspace;
use crate::persistence::PersistenceManager;
use crate::pubsub::{ClientId, PubSubRouter};
use crate::util::now_unix_secs;

use bytes::BytesMut;
use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token};
use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

const LISTENER: Token = Token(0);
const POLL_TIMEOUT: Duration = Duration::from_millis(50);
const READ_CHUNK: usize = 4096;
const SAMPLE_EXPIRE_BATCH: usize = 20;

struct Connection {
    stream: TcpStream,
    read_buf: BytesMut,
    write_buf: Vec<u8>,
    write_interest_registered: bool,
}

impl Connection {
    fn new(stream: TcpStream) -> Self {
        Connection {
            stream,
            read_buf: BytesMut::with_capacity(READ_CHUNK),
            write_buf: Vec::new(),
            write_interest_registered: false,
        }
    }
}

/// Hands pub/sub fan-out frames to whichever connection owns `client`,
/// without the dispatcher ever touching a socket directly.
struct ConnSink<'a> {
    connections: &'a mut HashMap<Token, Connection>,
}

impl<'a> ClientSink for ConnSink<'a> {
    fn deliver(&mut self, client: ClientId, frame: &[u8]) -> bool {
        match self.connections.get_mut(&Token(client as usize)) {
            Some(conn) => {
                conn.write_buf.extend_from_slice(frame);
                true
            }
            None => false,
        }
    }
}

pub struct Server {
    poll: Poll,
    listener: TcpListener,
    connections: HashMap<Token, Connection>,
    next_token: usize,
    keyspace: Keyspace,
    pubsub: PubSubRouter,
    persistence: PersistenceManager,
    config: Config,
    started_at_unix: u64,
    last_cleanup: Instant,
    last_persistence_tick: Instant,
}

impl Server {
    pub fn bind(
        config: Config,
        keyspace: Keyspace,
        pubsub: PubSubRouter,
        persistence: PersistenceManager,
    ) -> io::Result<Self> {
        let addr = SocketAddr::new(config.host, config.port);
        let mut listener = TcpListener::bind(addr)?;
        let poll = Poll::new()?;
        poll.registry()
            .register(&mut listener, LISTENER, Interest::READABLE)?;
        log::info!("listening on {addr}");
        Ok(Server {
            poll,
            listener,
            connections: HashMap::new(),
            next_token: 1,
            keyspace,
            pubsub,
            persistence,
            config,
            started_at_unix: now_unix_secs(),
            last_cleanup: Instant::now(),
            last_persistence_tick: Instant::now(),
        })
    }

    /// Runs until `running` is cleared (typically by a signal handler in
    /// `main`), then syncs the AOF one last time before returning.
    pub fn run(&mut self, running: &AtomicBool) -> io::Result<()> {
        let mut events = Events::with_capacity(1024);
        while running.load(Ordering::Relaxed) {
            if let Err(e) = self.poll.poll(&mut events, Some(POLL_TIMEOUT)) {
                if e.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(e);
            }
            for event in events.iter() {
                let token = event.token();
                if token == LISTENER {
                    self.accept_all();
                } else if event.is_readable() {
                    self.handle_readable(token);
                } else if event.is_writable() {
                    self.flush(token);
                }
            }
            self.tick();
        }
        self.persistence.sync_on_shutdown();
        Ok(())
    }

    fn accept_all(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((mut stream, addr)) => {
                    let token = Token(self.next_token);
                    self.next_token += 1;
                    if let Err(e) = self
                        .poll
                        .registry()
                        .register(&mut stream, token, Interest::READABLE)
                    {
                        log::warn!("failed to register connection from {addr}: {e}");
                        continue;
                    }
                    log::debug!("accepted connection {addr} as client {}", token.0);
                    self.connections.insert(token, Connection::new(stream));
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    log::warn!("accept failed: {e}");
                    break;
                }
            }
        }
    }

    fn handle_readable(&mut self, token: Token) {
        let Some(conn) = self.connections.get_mut(&token) else {
            return;
        };
        let mut buf = [0u8; READ_CHUNK];
        let mut closed = false;
        loop {
            match conn.stream.read(&mut buf) {
                Ok(0) => {
                    closed = true;
                    break;
                }
                Ok(n) => conn.read_buf.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    log::debug!("read error on client {}: {e}", token.0);
                    closed = true;
                    break;
                }
            }
        }
        let lines = drain_lines(&mut conn.read_buf);

        for line in lines {
            if line.trim().is_empty() {
                continue;
            }
            let mut ctx = Context {
                keyspace: &mut self.keyspace,
                pubsub: &mut self.pubsub,
                persistence: &mut self.persistence,
                config: &mut self.config,
                started_at_unix: self.started_at_unix,
            };
            let mut sink = ConnSink { connections: &mut self.connections };
            let reply = commands::execute(&mut ctx, &mut sink, token.0 as ClientId, &line);
            if let Some(conn) = self.connections.get_mut(&token) {
                conn.write_buf.extend_from_slice(&reply);
            }
        }

        // A PUBLISH may have queued fan-out bytes into *other* connections'
        // write_bufs via ConnSink, not just this one -- flush every
        // connection that now has pending output, or a subscriber with no
        // outgoing traffic of its own never gets a WRITABLE wakeup.
        let pending: Vec<Token> = self
            .connections
            .iter()
            .filter(|(_, conn)| !conn.write_buf.is_empty())
            .map(|(&t, _)| t)
            .collect();
        for pending_token in pending {
            self.flush(pending_token);
        }

        if closed {
            self.disconnect(token);
        }
    }

    fn flush(&mut self, token: Token) {
        let Some(conn) = self.connections.get_mut(&token) else {
            return;
        };
        if conn.write_buf.is_empty() {
            if conn.write_interest_registered {
                let _ = self
                    .poll
                    .registry()
                    .reregister(&mut conn.stream, token, Interest::READABLE);
                conn.write_interest_registered = false;
            }
            return;
        }
        match conn.stream.write(&conn.write_buf) {
            Ok(n) => {
                conn.write_buf.drain(..n);
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
            Err(e) => {
                log::debug!("write error on client {}: {e}", token.0);
                self.disconnect(token);
                return;
            }
        }
        if !conn.write_buf.is_empty() && !conn.write_interest_registered {
            if self
                .poll
                .registry()
                .reregister(&mut conn.stream, token, Interest::READABLE.add(Interest::WRITABLE))
                .is_ok()
            {
                conn.write_interest_registered = true;
            }
        }
    }

    fn disconnect(&mut self, token: Token) {
        if let Some(mut conn) = self.connections.remove(&token) {
            let _ = self.poll.registry().deregister(&mut conn.stream);
        }
        self.pubsub.disconnect(token.0 as ClientId);
    }

    /// Runs the two background duties the spec gives the server loop
    /// itself rather than a separate thread: sampled lazy expiration and
    /// the AOF/snapshot persistence tick.
    fn tick(&mut self) {
        let now = Instant::now();
        if now.duration_since(self.last_cleanup) >= Duration::from_millis(self.config.cleanup_interval_ms) {
            let expired = self.keyspace.sample_expire(SAMPLE_EXPIRE_BATCH);
            if expired > 0 {
                log::trace!("sampled expiration removed {expired} keys");
            }
            self.last_cleanup = now;
        }
        if now.duration_since(self.last_persistence_tick)
            >= Duration::from_millis(self.config.persistence_interval_ms)
        {
            self.persistence.tick(&mut self.keyspace);
            self.last_persistence_tick = now;
        }
    }
}

/// Splits complete `\n`-terminated (optionally `\r\n`-terminated) lines off
/// the front of `buf`, leaving any trailing partial line in place.
fn drain_lines(buf: &mut BytesMut) -> Vec<String> {
    let mut lines = Vec::new();
    loop {
        let Some(pos) = buf.iter().position(|&b| b == b'\n') else {
            break;
        };
        let mut line = buf.split_to(pos + 1);
        line.truncate(line.len() - 1);
        if line.last() == Some(&b'\r') {
            line.truncate(line.len() - 1);
        }
        lines.push(String::from_utf8_lossy(&line).into_owned());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_lines_splits_on_newline_and_keeps_partial_tail() {
        let mut buf = BytesMut::from(&b"PING\r\nGET foo\r\nPAR"[..]);
        let lines = drain_lines(&mut buf);
        assert_eq!(lines, vec!["PING".to_owned(), "GET foo".to_owned()]);
        assert_eq!(&buf[..], b"PAR");
    }

    #[test]
    fn drain_lines_handles_bare_lf() {
        let mut buf = BytesMut::from(&b"PING\n"[..]);
        let lines = drain_lines(&mut buf);
        assert_eq!(lines, vec!["PING".to_owned()]);
        assert!(buf.is_empty());
    }

    /// A subscriber that never sends its own data must still receive a
    /// PUBLISH fanned out through a *different* connection's readable
    /// event -- the bug this guards against left such a subscriber's
    /// frame stuck in `write_buf` forever with no WRITABLE registration.
    #[test]
    fn handle_readable_flushes_pubsub_fanout_to_other_connections() {
        use std::net::{TcpListener as StdListener, TcpStream as StdStream};

        let std_listener = StdListener::bind("127.0.0.1:0").unwrap();
        let addr = std_listener.local_addr().unwrap();

        let mut publisher_client = StdStream::connect(addr).unwrap();
        let (publisher_server, _) = std_listener.accept().unwrap();
        let mut subscriber_client = StdStream::connect(addr).unwrap();
        let (subscriber_server, _) = std_listener.accept().unwrap();

        publisher_server.set_nonblocking(true).unwrap();
        subscriber_server.set_nonblocking(true).unwrap();
        subscriber_client
            .set_read_timeout(Some(Duration::from_millis(500)))
            .unwrap();

        let poll = Poll::new().unwrap();
        let mut publisher_stream = TcpStream::from_std(publisher_server);
        let mut subscriber_stream = TcpStream::from_std(subscriber_server);
        let publisher_token = Token(1);
        let subscriber_token = Token(2);
        poll.registry()
            .register(&mut publisher_stream, publisher_token, Interest::READABLE)
            .unwrap();
        poll.registry()
            .register(&mut subscriber_stream, subscriber_token, Interest::READABLE)
            .unwrap();

        let mut connections = HashMap::new();
        connections.insert(publisher_token, Connection::new(publisher_stream));
        connections.insert(subscriber_token, Connection::new(subscriber_stream));

        let base = std::env::temp_dir().join(format!("ferrokv-server-test-{}", std::process::id()));
        let mut config = Config::default();
        config.data_dir = base.join("data").to_string_lossy().into_owned();
        config.temp_dir = base.join("tmp").to_string_lossy().into_owned();
        std::fs::create_dir_all(&config.data_dir).unwrap();
        std::fs::create_dir_all(&config.temp_dir).unwrap();
        let persistence = PersistenceManager::new(&config).unwrap();
        let listener = TcpListener::bind("127.0.0.1:0".parse().unwrap()).unwrap();

        let mut server = Server {
            poll,
            listener,
            connections,
            next_token: 3,
            keyspace: Keyspace::new(),
            pubsub: PubSubRouter::new(),
            persistence,
            config,
            started_at_unix: now_unix_secs(),
            last_cleanup: Instant::now(),
            last_persistence_tick: Instant::now(),
        };
        server
            .pubsub
            .subscribe(subscriber_token.0 as ClientId, &[b"ch".to_vec()]);

        publisher_client.write_all(b"PUBLISH ch hello\n").unwrap();

        server.handle_readable(publisher_token);

        let mut buf = [0u8; 256];
        let n = subscriber_client.read(&mut buf).expect("subscriber should receive fanout");
        let frame = String::from_utf8_lossy(&buf[..n]);
        assert!(frame.contains("hello"), "unexpected frame: {frame}");
    }
}
