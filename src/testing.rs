//! In-process RCON server used by the unit tests.

use crate::protocol::{encode, packet_type, PacketDecoder, AUTH_FAILURE_ID};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

pub(crate) const TEST_PASSWORD: &str = "hunter2";

pub(crate) const STEVE_ENTITY_DATA: &str = "Steve has the following entity data: {Health: 15.0f, \
foodLevel: 18, Pos: [12.5d, 64.0d, -30.2d], Dimension: \"minecraft:the_nether\"}";

#[derive(Debug, Clone, Default)]
pub(crate) struct MockServerBuilder {
    empty_response_before_auth: bool,
    ignore_auth: bool,
}

impl MockServerBuilder {
    /// Sends an empty RESPONSE_VALUE ahead of the auth verdict.
    pub(crate) fn empty_response_before_auth(mut self) -> Self {
        self.empty_response_before_auth = true;
        self
    }

    /// Never answers the login packet.
    pub(crate) fn ignore_auth(mut self) -> Self {
        self.ignore_auth = true;
        self
    }

    pub(crate) async fn start(self) -> MockServer {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));

        let accepted_clone = Arc::clone(&accepted);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                accepted_clone.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(serve(stream, self.clone()));
            }
        });

        MockServer { addr, accepted }
    }
}

/// A fake Minecraft RCON endpoint.
///
/// Commands it understands:
/// - `sleep <ms>`: waits, then replies `slept`
/// - `silent`: never replies
/// - `close`: drops the socket
/// - `chunked`: replies one byte per write
/// - `list`: a vanilla player list line
/// - `data get entity Steve`: a small entity dump
/// - anything else: `echo: <command>`
pub(crate) struct MockServer {
    addr: SocketAddr,
    accepted: Arc<AtomicUsize>,
}

impl MockServer {
    pub(crate) fn builder() -> MockServerBuilder {
        MockServerBuilder::default()
    }

    pub(crate) async fn start() -> Self {
        Self::builder().start().await
    }

    pub(crate) fn host(&self) -> &'static str {
        "127.0.0.1"
    }

    pub(crate) fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Number of TCP connections accepted so far.
    pub(crate) fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }
}

async fn serve(mut stream: TcpStream, options: MockServerBuilder) {
    let mut decoder = PacketDecoder::new();

    loop {
        match stream.read_buf(decoder.buffer_mut()).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }

        while let Ok(Some(packet)) = decoder.next_packet() {
            let id = packet.request_id;
            match packet.packet_type {
                packet_type::AUTH => {
                    if options.ignore_auth {
                        continue;
                    }
                    if options.empty_response_before_auth {
                        reply(&mut stream, id, packet_type::RESPONSE_VALUE, "").await;
                    }
                    if packet.body == TEST_PASSWORD {
                        reply(&mut stream, id, packet_type::AUTH_RESPONSE, "").await;
                    } else {
                        reply(&mut stream, AUTH_FAILURE_ID, packet_type::AUTH_RESPONSE, "")
                            .await;
                    }
                }
                packet_type::EXEC_COMMAND => {
                    let command = packet.body.as_str();
                    if let Some(ms) = command.strip_prefix("sleep ") {
                        let ms = ms.parse().unwrap_or(0);
                        tokio::time::sleep(Duration::from_millis(ms)).await;
                        reply(&mut stream, id, packet_type::RESPONSE_VALUE, "slept").await;
                        continue;
                    }
                    match command {
                        "silent" => {}
                        "close" => return,
                        "chunked" => {
                            let frame = encode(
                                id,
                                packet_type::RESPONSE_VALUE,
                                "a response delivered one byte at a time",
                            );
                            for byte in frame.iter() {
                                let _ = stream.write_all(&[*byte]).await;
                                let _ = stream.flush().await;
                            }
                        }
                        "list" => {
                            reply(
                                &mut stream,
                                id,
                                packet_type::RESPONSE_VALUE,
                                "There are 1 of a max of 20 players online: Steve",
                            )
                            .await;
                        }
                        "data get entity Steve" => {
                            reply(&mut stream, id, packet_type::RESPONSE_VALUE, STEVE_ENTITY_DATA)
                                .await;
                        }
                        "data get entity Nobody" => {
                            reply(
                                &mut stream,
                                id,
                                packet_type::RESPONSE_VALUE,
                                "No entity was found",
                            )
                            .await;
                        }
                        other => {
                            let body = format!("echo: {}", other);
                            reply(&mut stream, id, packet_type::RESPONSE_VALUE, &body).await;
                        }
                    }
                }
                _ => {}
            }
        }
    }
}

async fn reply(stream: &mut TcpStream, request_id: i32, packet_type: i32, body: &str) {
    let _ = stream.write_all(&encode(request_id, packet_type, body)).await;
}
