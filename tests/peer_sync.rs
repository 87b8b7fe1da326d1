//! End-to-end tests: two engines on loopback negotiate roles and mirror
//! each other's state through the line protocol.
//!
//! Each engine runs with a scripted input source that closes the "window"
//! after a fixed number of ticks, and a renderer that only records the
//! status lines it was shown.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use netpong::core::config::{Endpoint, Settings};
use netpong::core::engine::Phase;
use netpong::core::game::Polled;
use netpong::core::physics::Score;
use netpong::{Engine, FieldView, InputSource, Intent, Renderer, Role, Termination};
use tokio::net::{TcpListener, TcpSocket};
use tokio::time::timeout;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Holds one intent for `ticks` polls, then asks to close.
struct Scripted {
    intent: Intent,
    ticks: u32,
}

impl InputSource for Scripted {
    fn poll(&mut self) -> Result<Polled> {
        if self.ticks == 0 {
            return Ok(Polled {
                intent: self.intent,
                close: true,
            });
        }
        self.ticks -= 1;
        Ok(Polled {
            intent: self.intent,
            close: false,
        })
    }
}

/// Remembers every distinct status line, in order.
#[derive(Clone, Default)]
struct StatusLog(Arc<Mutex<Vec<String>>>);

impl StatusLog {
    fn lines(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|l| l.contains(needle))
    }
}

impl Renderer for StatusLog {
    fn render(&mut self, view: &FieldView<'_>) -> Result<()> {
        let mut lines = self.0.lock().unwrap();
        if lines.last().map(String::as_str) != Some(view.status) {
            lines.push(view.status.to_string());
        }
        Ok(())
    }
}

type TestEngine = Engine<Scripted, StatusLog>;

async fn free_port() -> u16 {
    let probe = TcpListener::bind("127.0.0.1:0").await.unwrap();
    probe.local_addr().unwrap().port()
}

fn settings(tick_rate_hz: u32) -> Settings {
    delayed_settings(tick_rate_hz, 0)
}

fn delayed_settings(tick_rate_hz: u32, start_delay_ms: u64) -> Settings {
    Settings {
        tick_rate_hz,
        start_delay_ms,
        connect_timeout_ms: 500,
        ..Settings::default()
    }
}

fn engine(port: u16, tick_rate_hz: u32, intent: Intent, ticks: u32, log: StatusLog) -> TestEngine {
    engine_with(port, settings(tick_rate_hz), intent, ticks, log)
}

fn engine_with(
    port: u16,
    settings: Settings,
    intent: Intent,
    ticks: u32,
    log: StatusLog,
) -> TestEngine {
    let endpoint = Endpoint::new("127.0.0.1", port).unwrap();
    Engine::new(endpoint, settings, Scripted { intent, ticks }, log)
}

/// Run an engine in the background and hand it back with its result.
fn spawn(mut engine: TestEngine) -> tokio::task::JoinHandle<(TestEngine, Result<Termination>)> {
    tokio::spawn(async move {
        let result = engine.run().await;
        (engine, result)
    })
}

async fn wait_until_listening(log: &StatusLog) {
    timeout(Duration::from_secs(5), async {
        while !log.contains("waiting for opponent") {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("host never started listening");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

/// With nobody to talk to, the process hosts and keeps ticking, but the ball
/// stays parked until an opponent arrives.
#[tokio::test]
async fn lone_process_hosts_and_ticks_without_a_peer() {
    let port = free_port().await;
    let log = StatusLog::default();
    let mut host = engine(port, 500, Intent::IDLE, 20, log.clone());
    assert_eq!(host.phase(), Phase::Negotiating);

    let termination = timeout(Duration::from_secs(5), host.run())
        .await
        .expect("host timed out")
        .expect("host failed");

    assert_eq!(termination, Termination::Closed);
    assert_eq!(host.phase(), Phase::Terminated);
    assert_eq!(host.role(), Some(Role::Host));
    assert_eq!(host.ticks(), 20);
    let session = host.session().unwrap();
    assert_eq!((session.ball().x(), session.ball().y()), (384.0, 284.0));
    assert_eq!(session.score(), Score::default());
    assert!(session.is_holding());
    assert_eq!(log.lines(), vec![format!("server | waiting for opponent on port {port}")]);
}

/// The second process connects, becomes the mirror, and sees the host's paddle.
#[tokio::test]
async fn second_process_mirrors_the_host() {
    let port = free_port().await;
    let host_log = StatusLog::default();
    let host = spawn(engine(port, 500, Intent::UP, 400, host_log.clone()));
    wait_until_listening(&host_log).await;

    let mirror_log = StatusLog::default();
    let mut mirror = engine(port, 500, Intent::IDLE, 150, mirror_log.clone());
    let mirror_result = timeout(Duration::from_secs(10), mirror.run())
        .await
        .expect("mirror timed out");
    assert!(mirror_result.is_ok(), "mirror failed: {mirror_result:?}");

    assert_eq!(mirror.role(), Some(Role::Mirror));
    let mirrored = mirror.session().unwrap();
    // The host has been holding "up" long enough to pin its paddle to the top.
    assert_eq!(mirrored.remote_paddle().y(), 0.0);
    assert_eq!(mirrored.local_paddle().y(), 236.0);
    assert_eq!(mirror_log.lines(), vec![format!("client | connected to 127.0.0.1:{port}")]);

    let (host, host_result) = timeout(Duration::from_secs(10), host)
        .await
        .expect("host timed out")
        .expect("host task panicked");
    let host_termination = host_result.expect("host failed");
    assert!(matches!(
        host_termination,
        Termination::Closed | Termination::ConnectionLost(_)
    ));

    assert_eq!(host.role(), Some(Role::Host));
    assert_eq!(host.session().unwrap().remote_paddle().y(), 236.0);
    let statuses = host_log.lines();
    assert_eq!(statuses.len(), 2, "{statuses:?}");
    assert!(statuses[1].starts_with("server | client connected from 127.0.0.1:"));
}

/// When the host goes away the mirror's session ends with a connection loss.
#[tokio::test]
async fn mirror_terminates_when_host_leaves() {
    let port = free_port().await;
    let host_log = StatusLog::default();
    let host = spawn(engine(port, 100, Intent::IDLE, 100, host_log.clone()));
    wait_until_listening(&host_log).await;

    let mut mirror = engine(port, 100, Intent::DOWN, 5_000, StatusLog::default());
    let termination = timeout(Duration::from_secs(10), mirror.run())
        .await
        .expect("mirror timed out")
        .expect("mirror failed");

    assert!(matches!(termination, Termination::ConnectionLost(_)), "{termination:?}");
    assert_eq!(mirror.phase(), Phase::Terminated);
    assert!(mirror.ticks() < 5_000);

    let (_, host_result) = host.await.unwrap();
    assert_eq!(host_result.unwrap(), Termination::Closed);
}

/// Time the host spent alone must not show up in the match: both sides start
/// at 0-0 with the ball on the centre spot.
#[tokio::test]
async fn late_joiner_starts_from_a_fresh_match() {
    let port = free_port().await;
    let host_log = StatusLog::default();
    let host_settings = delayed_settings(500, 60_000);
    let host = spawn(engine_with(port, host_settings, Intent::IDLE, 2_000, host_log.clone()));
    wait_until_listening(&host_log).await;
    // Long enough for a free-running ball to reach a goal several times.
    tokio::time::sleep(Duration::from_millis(600)).await;

    let mut mirror = engine(port, 500, Intent::IDLE, 60, StatusLog::default());
    timeout(Duration::from_secs(10), mirror.run())
        .await
        .expect("mirror timed out")
        .expect("mirror failed");

    let mirrored = mirror.session().unwrap();
    assert_eq!(mirrored.score(), Score::default());
    assert_eq!((mirrored.ball().x(), mirrored.ball().y()), (384.0, 284.0));

    let (host, host_result) = timeout(Duration::from_secs(10), host)
        .await
        .expect("host timed out")
        .expect("host task panicked");
    host_result.expect("host failed");
    let hosted = host.session().unwrap();
    assert_eq!(hosted.score(), Score::default());
    assert_eq!((hosted.ball().x(), hosted.ball().y()), (384.0, 284.0));
}

/// Nobody answers and the port cannot be bound: `run` fails, and the engine
/// still reports that it is done.
#[tokio::test]
async fn unbindable_port_ends_negotiation() {
    // Bound but not listening: connects are refused and a second bind clashes.
    let blocker = TcpSocket::new_v4().unwrap();
    blocker.bind("0.0.0.0:0".parse().unwrap()).unwrap();
    let port = blocker.local_addr().unwrap().port();

    let mut host = engine(port, 500, Intent::IDLE, 10, StatusLog::default());
    let result = timeout(Duration::from_secs(5), host.run())
        .await
        .expect("negotiation timed out");

    assert!(result.is_err());
    assert_eq!(host.phase(), Phase::Terminated);
    assert_eq!(host.role(), None);
    assert_eq!(host.ticks(), 0);
}
