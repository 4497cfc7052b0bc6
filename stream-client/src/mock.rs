use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::{SinkExt, StreamExt};
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

pub struct MockConfig {
    /// Frames pushed to every connection.
    pub frames: Vec<Message>,
    /// Hold the frames until the client's first text frame arrives.
    pub wait_for_request: bool,
    /// Start a close handshake after the frames.
    pub close_after_frames: bool,
    /// Drop the TCP stream after the frames, without a close handshake.
    pub drop_after_frames: bool,
    /// Accept TCP but never answer the WebSocket handshake.
    pub stall_handshake: bool,
}

impl MockConfig {
    pub fn immediate(frames: Vec<Message>) -> Self {
        Self {
            frames,
            wait_for_request: false,
            close_after_frames: false,
            drop_after_frames: false,
            stall_handshake: false,
        }
    }

    pub fn on_request(frames: Vec<Message>) -> Self {
        Self {
            wait_for_request: true,
            ..Self::immediate(frames)
        }
    }

    pub fn stalled() -> Self {
        Self {
            stall_handshake: true,
            ..Self::immediate(vec![])
        }
    }
}

pub struct MockServer {
    addr: SocketAddr,
    received: Arc<Mutex<Vec<String>>>,
    connections: Arc<AtomicUsize>,
}

impl MockServer {
    pub async fn start(config: MockConfig) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let received = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));

        let config = Arc::new(config);
        let (log, count) = (received.clone(), connections.clone());
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                count.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(Self::handle_connection(stream, config.clone(), log.clone()));
            }
        });

        Self {
            addr,
            received,
            connections,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}/ws/data/", self.addr)
    }

    /// Text frames received from clients, across all connections.
    pub fn received(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }

    /// Number of accepted TCP connections.
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    async fn handle_connection(
        mut stream: TcpStream,
        config: Arc<MockConfig>,
        received: Arc<Mutex<Vec<String>>>,
    ) {
        if config.stall_handshake {
            // Read until the client gives up
            let mut buf = [0u8; 1024];
            while let Ok(n) = stream.read(&mut buf).await {
                if n == 0 {
                    break;
                }
            }
            return;
        }

        let Ok(mut ws) = accept_async(stream).await else {
            return;
        };

        if config.wait_for_request {
            loop {
                match ws.next().await {
                    Some(Ok(Message::Text(text))) => {
                        received.lock().unwrap().push(text);
                        break;
                    }
                    Some(Ok(_)) => {}
                    _ => return,
                }
            }
        }

        for frame in &config.frames {
            if ws.send(frame.clone()).await.is_err() {
                return;
            }
        }

        if config.drop_after_frames {
            return;
        }
        if config.close_after_frames {
            let _ = ws.close(None).await;
        }

        while let Some(Ok(message)) = ws.next().await {
            if let Message::Text(text) = message {
                received.lock().unwrap().push(text);
            }
        }
    }
}
