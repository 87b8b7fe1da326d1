use std::net::SocketAddr;

use anyhow::{bail, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::core::protocol::{latin1_to_string, Message};

/// Inbound queue depth. The reader waits when the tick loop falls this far behind.
pub const INBOUND_CAPACITY: usize = 1024;

/// Outbound queue depth. A peer that lets this many messages pile up has
/// stopped reading and is treated as gone.
pub const OUTBOX_CAPACITY: usize = 1024;

/// Events produced by the receive path and consumed by the tick loop.
#[derive(Debug, Clone, PartialEq)]
pub enum NetEvent {
    Message(Message),
    Disconnected(String),
}

/// Handle to the one peer connection. The socket itself lives in two
/// background tasks: a line reader feeding a bounded queue and a writer
/// draining an outbox, so nothing here blocks the tick loop.
pub struct NetworkManager {
    remote: SocketAddr,
    outbox: mpsc::Sender<Message>,
    events: mpsc::Receiver<NetEvent>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl NetworkManager {
    /// Take ownership of a connected stream and start both I/O tasks.
    pub fn spawn(stream: TcpStream) -> Result<Self> {
        stream.set_nodelay(true)?;
        let remote = stream.peer_addr()?;
        let (read_half, write_half) = stream.into_split();

        let (event_tx, events) = mpsc::channel(INBOUND_CAPACITY);
        let (outbox, outbox_rx) = mpsc::channel(OUTBOX_CAPACITY);

        let reader = tokio::spawn(read_loop(read_half, event_tx.clone()));
        let writer = tokio::spawn(write_loop(write_half, outbox_rx, event_tx));
        info!(%remote, "peer link established");

        Ok(Self {
            remote,
            outbox,
            events,
            reader,
            writer,
        })
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote
    }

    /// Queue a message for the writer task without waiting. Fails only when
    /// the outbox is full; if the writer has already died the loss is
    /// reported through [`NetEvent::Disconnected`] instead.
    pub fn send(&self, msg: Message) -> Result<()> {
        match self.outbox.try_send(msg) {
            Ok(()) | Err(TrySendError::Closed(_)) => Ok(()),
            Err(TrySendError::Full(_)) => {
                bail!("peer stopped reading ({OUTBOX_CAPACITY} messages unsent)")
            }
        }
    }

    /// Everything received since the last call, in arrival order. Never waits.
    pub fn drain(&mut self) -> Vec<NetEvent> {
        let mut drained = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            drained.push(event);
        }
        drained
    }

    /// Wait for the next event. Only meant for tests and tools outside the tick loop.
    pub async fn next_event(&mut self) -> Option<NetEvent> {
        self.events.recv().await
    }
}

impl Drop for NetworkManager {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}

async fn read_loop(read_half: OwnedReadHalf, event_tx: mpsc::Sender<NetEvent>) {
    let mut reader = BufReader::new(read_half);
    let mut buf = Vec::with_capacity(64);

    let reason = loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break "peer closed the connection".to_string(),
            Ok(_) => {
                let line = latin1_to_string(&buf);
                match Message::decode(&line) {
                    Ok(msg) => {
                        if event_tx.send(NetEvent::Message(msg)).await.is_err() {
                            // Tick loop is gone; nobody left to deliver to.
                            return;
                        }
                    }
                    Err(e) => {
                        debug!(error = %e, line = %line.trim_end(), "ignoring malformed line")
                    }
                }
            }
            Err(e) => break e.to_string(),
        }
    };

    error!(%reason, "receive path lost the connection");
    let _ = event_tx.send(NetEvent::Disconnected(reason)).await;
}

async fn write_loop(
    mut write_half: OwnedWriteHalf,
    mut outbox: mpsc::Receiver<Message>,
    event_tx: mpsc::Sender<NetEvent>,
) {
    while let Some(msg) = outbox.recv().await {
        let result = async {
            write_half.write_all(msg.encode().as_bytes()).await?;
            write_half.flush().await
        }
        .await;

        if let Err(e) = result {
            error!(error = %e, "send path lost the connection");
            let _ = event_tx.send(NetEvent::Disconnected(e.to_string())).await;
            return;
        }
    }
    let _ = write_half.shutdown().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;
    use tokio::time::timeout;

    async fn socket_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (client, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
        (client.unwrap(), accepted.unwrap().0)
    }

    async fn next(net: &mut NetworkManager) -> NetEvent {
        timeout(Duration::from_secs(5), net.next_event())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed")
    }

    #[tokio::test]
    async fn test_messages_cross_the_link_in_order() {
        let (a, b) = socket_pair().await;
        let a = NetworkManager::spawn(a).unwrap();
        let mut b = NetworkManager::spawn(b).unwrap();

        a.send(Message::BallPos(100.5, 42.25)).unwrap();
        a.send(Message::PaddlePos(250.0)).unwrap();

        assert_eq!(next(&mut b).await, NetEvent::Message(Message::BallPos(100.5, 42.25)));
        assert_eq!(next(&mut b).await, NetEvent::Message(Message::PaddlePos(250.0)));
    }

    #[tokio::test]
    async fn test_writes_plain_text_lines() {
        let (a, mut raw) = socket_pair().await;
        let a = NetworkManager::spawn(a).unwrap();

        a.send(Message::PaddlePos(236.0)).unwrap();
        a.send(Message::BallPos(384.0, 284.0)).unwrap();

        let expected = b"p236.0\nb384.0,284.0\n";
        let mut buf = vec![0u8; expected.len()];
        timeout(Duration::from_secs(5), raw.read_exact(&mut buf))
            .await
            .expect("timed out")
            .unwrap();
        assert_eq!(&buf, expected);
    }

    #[tokio::test]
    async fn test_malformed_lines_are_skipped() {
        let (mut raw, b) = socket_pair().await;
        let mut b = NetworkManager::spawn(b).unwrap();

        raw.write_all(b"garbage\npxyz\nb1\n\xff\xfe\np12.5\r\n").await.unwrap();

        assert_eq!(next(&mut b).await, NetEvent::Message(Message::PaddlePos(12.5)));
    }

    #[tokio::test]
    async fn test_peer_close_is_reported() {
        let (raw, b) = socket_pair().await;
        let mut b = NetworkManager::spawn(b).unwrap();
        drop(raw);

        assert!(matches!(next(&mut b).await, NetEvent::Disconnected(_)));
    }

    #[tokio::test]
    async fn test_drain_does_not_wait() {
        let (a, b) = socket_pair().await;
        let _a = NetworkManager::spawn(a).unwrap();
        let mut b = NetworkManager::spawn(b).unwrap();

        assert!(b.drain().is_empty());
    }

    #[tokio::test]
    async fn test_full_outbox_means_the_peer_is_gone() {
        // A writer that never drains stands in for a peer that stopped reading.
        let (outbox, _parked) = mpsc::channel(OUTBOX_CAPACITY);
        let (_event_tx, events) = mpsc::channel(INBOUND_CAPACITY);
        let net = NetworkManager {
            remote: "127.0.0.1:2000".parse().unwrap(),
            outbox,
            events,
            reader: tokio::spawn(async {}),
            writer: tokio::spawn(async {}),
        };

        for _ in 0..OUTBOX_CAPACITY {
            net.send(Message::PaddlePos(236.0)).unwrap();
        }
        let err = net.send(Message::PaddlePos(236.0)).unwrap_err();
        assert!(err.to_string().contains("stopped reading"), "{err}");
    }

    #[tokio::test]
    async fn test_send_after_writer_exit_is_not_an_error() {
        let (outbox, parked) = mpsc::channel(OUTBOX_CAPACITY);
        drop(parked);
        let (_event_tx, events) = mpsc::channel(INBOUND_CAPACITY);
        let net = NetworkManager {
            remote: "127.0.0.1:2000".parse().unwrap(),
            outbox,
            events,
            reader: tokio::spawn(async {}),
            writer: tokio::spawn(async {}),
        };

        assert!(net.send(Message::PaddlePos(1.0)).is_ok());
    }
}
