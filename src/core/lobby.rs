use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context as _, Result};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::core::config::Endpoint;
use crate::core::game::Role;

/// Pause between accept attempts after an accept error.
const ACCEPT_RETRY: Duration = Duration::from_millis(100);

/// Result of role negotiation.
pub enum Negotiated {
    /// Our outbound connect succeeded: the other side is authoritative.
    Mirror(TcpStream),
    /// Nobody answered, so we listen and own the ball.
    Host(PendingPeer),
}

impl Negotiated {
    pub fn role(&self) -> Role {
        match self {
            Negotiated::Mirror(_) => Role::Mirror,
            Negotiated::Host(_) => Role::Host,
        }
    }
}

/// Try to reach a peer at `endpoint`; fall back to listening on its port.
///
/// Each side infers its role purely from whether its own connect worked,
/// so no handshake is exchanged. Only a failure to bind the listening
/// socket is an error.
pub async fn negotiate(endpoint: &Endpoint, connect_timeout: Duration) -> Result<Negotiated> {
    let target = (endpoint.host(), endpoint.port());
    match tokio::time::timeout(connect_timeout, TcpStream::connect(target)).await {
        Ok(Ok(stream)) => {
            info!(%endpoint, "connected to a waiting peer, playing as client");
            return Ok(Negotiated::Mirror(stream));
        }
        Ok(Err(e)) => info!(%endpoint, error = %e, "no peer to connect to, hosting"),
        Err(_) => info!(%endpoint, ?connect_timeout, "connect timed out, hosting"),
    }

    let listener = TcpListener::bind(("0.0.0.0", endpoint.port()))
        .await
        .with_context(|| format!("binding listener on port {}", endpoint.port()))?;
    Ok(Negotiated::Host(PendingPeer::spawn(listener)?))
}

/// A listening socket waiting, in the background, for its single peer.
pub struct PendingPeer {
    local_addr: SocketAddr,
    accepted: oneshot::Receiver<TcpStream>,
    task: JoinHandle<()>,
}

impl PendingPeer {
    pub fn spawn(listener: TcpListener) -> Result<Self> {
        let local_addr = listener.local_addr()?;
        let (tx, accepted) = oneshot::channel();
        let task = tokio::spawn(accept_one(listener, tx));
        info!(%local_addr, "waiting for opponent");
        Ok(Self {
            local_addr,
            accepted,
            task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The accepted stream, once there is one. Never waits; yields the stream
    /// at most once.
    pub fn poll(&mut self) -> Option<TcpStream> {
        self.accepted.try_recv().ok()
    }
}

impl Drop for PendingPeer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Accept exactly one connection, then drop the listener so later attempts
/// are refused.
async fn accept_one(listener: TcpListener, tx: oneshot::Sender<TcpStream>) {
    loop {
        match listener.accept().await {
            Ok((stream, remote)) => {
                info!(%remote, "opponent connected");
                let _ = tx.send(stream);
                return;
            }
            Err(e) => {
                warn!(error = %e, "accept failed, retrying");
                tokio::time::sleep(ACCEPT_RETRY).await;
            }
        }
    }
}
