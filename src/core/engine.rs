use crate::core::config::{Endpoint, Settings};
use crate::core::game::{InputSource, Role};
use crate::core::lobby::{self, Negotiated, PendingPeer};
use crate::core::network::{NetEvent, NetworkManager};
use crate::core::renderer::Renderer;
use crate::core::session::Session;
use anyhow::{Context as _, Result};
use std::time::Instant;
use tokio::net::TcpStream;
use tracing::{error, info};

/// Lifecycle of one process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Negotiating,
    Running,
    Terminated,
}

/// Why the tick loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// The local user closed the window.
    Closed,
    /// The peer link failed; the session cannot continue.
    ConnectionLost(String),
}

/// The connection as seen from the tick loop.
enum Link {
    Waiting(PendingPeer),
    Connected(NetworkManager),
}

pub struct Engine<I: InputSource, R: Renderer> {
    endpoint: Endpoint,
    settings: Settings,
    input: I,
    renderer: R,
    phase: Phase,
    session: Option<Session>,
    ticks: u64,
}

impl<I: InputSource, R: Renderer> Engine<I, R> {
    pub fn new(endpoint: Endpoint, settings: Settings, input: I, renderer: R) -> Self {
        Self {
            endpoint,
            settings,
            input,
            renderer,
            phase: Phase::Negotiating,
            session: None,
            ticks: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The negotiated role, once negotiation has happened.
    pub fn role(&self) -> Option<Role> {
        self.session.as_ref().map(Session::role)
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Negotiate a role, then tick until the window closes or the link dies.
    pub async fn run(&mut self) -> Result<Termination> {
        self.run_with(Session::new).await
    }

    /// Like [`Engine::run`], with the session built by the caller once the
    /// role is known (tests pass a seeded one).
    pub async fn run_with(
        &mut self,
        session_for: impl FnOnce(Role) -> Session,
    ) -> Result<Termination> {
        let result = self.negotiate_and_play(session_for).await;
        self.phase = Phase::Terminated;
        result
    }

    async fn negotiate_and_play(
        &mut self,
        session_for: impl FnOnce(Role) -> Session,
    ) -> Result<Termination> {
        let negotiated = lobby::negotiate(&self.endpoint, self.settings.connect_timeout())
            .await
            .context("negotiating role")?;
        let role = negotiated.role();
        let link = match negotiated {
            Negotiated::Mirror(stream) => match attach(stream) {
                Ok(net) => Link::Connected(net),
                Err(lost) => return Ok(lost),
            },
            Negotiated::Host(pending) => Link::Waiting(pending),
        };
        info!(%role, period = ?self.settings.tick_period(), "session starting");

        self.phase = Phase::Running;
        self.run_ticks(session_for(role), link).await
    }

    async fn run_ticks(&mut self, session: Session, mut link: Link) -> Result<Termination> {
        let session = self.session.insert(session);
        let period = self.settings.tick_period();
        let start_delay = self.settings.start_delay_ticks();
        let mut status = status_line(session.role(), &link, &self.endpoint);
        if let Link::Waiting(_) = link {
            session.wait_for_peer();
        }

        loop {
            let started = Instant::now();

            if let Link::Waiting(pending) = &mut link {
                if let Some(stream) = pending.poll() {
                    let net = match attach(stream) {
                        Ok(net) => net,
                        Err(lost) => return Ok(lost),
                    };
                    info!(
                        remote = %net.remote_addr(),
                        hold_ticks = start_delay,
                        "opponent attached"
                    );
                    session.peer_joined(start_delay);
                    link = Link::Connected(net);
                    status = status_line(session.role(), &link, &self.endpoint);
                }
            }

            let polled = self.input.poll()?;
            if polled.close {
                info!(ticks = self.ticks, "window closed");
                return Ok(Termination::Closed);
            }

            let mut inbound = Vec::new();
            if let Link::Connected(net) = &mut link {
                for event in net.drain() {
                    match event {
                        NetEvent::Message(msg) => inbound.push(msg),
                        NetEvent::Disconnected(reason) => {
                            error!(%reason, ticks = self.ticks, "connection lost");
                            return Ok(Termination::ConnectionLost(reason));
                        }
                    }
                }
            }

            let outbound = session.tick(polled.intent, inbound);
            if let Link::Connected(net) = &link {
                for msg in outbound {
                    if let Err(e) = net.send(msg) {
                        error!(error = %e, ticks = self.ticks, "connection lost");
                        return Ok(Termination::ConnectionLost(e.to_string()));
                    }
                }
            }
            self.ticks += 1;

            self.renderer.render(&session.view(&status))?;

            // Behind schedule: carry straight on, no sleep and no skipped ticks.
            let elapsed = started.elapsed();
            if elapsed < period {
                tokio::time::sleep(period - elapsed).await;
            }
        }
    }
}

/// Start the I/O tasks for a freshly connected peer. A socket that fails
/// this early is as lost as one that drops mid-match.
fn attach(stream: TcpStream) -> Result<NetworkManager, Termination> {
    NetworkManager::spawn(stream).map_err(|e| {
        error!(error = %e, "could not set up the peer link");
        Termination::ConnectionLost(format!("{e:#}"))
    })
}

fn status_line(role: Role, link: &Link, endpoint: &Endpoint) -> String {
    match (role, link) {
        (_, Link::Waiting(pending)) => {
            format!("server | waiting for opponent on port {}", pending.local_addr().port())
        }
        (Role::Host, Link::Connected(net)) => {
            format!("server | client connected from {}", net.remote_addr())
        }
        (Role::Mirror, Link::Connected(_)) => format!("client | connected to {endpoint}"),
    }
}
