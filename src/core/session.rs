/// One peer's view of the match, advanced a tick at a time. Pure state: the
/// engine feeds it inbound messages and sends whatever it returns.
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};

use crate::core::game::{Intent, Role};
use crate::core::physics::{collide, Ball, Paddle, Point, Score, Side};
use crate::core::protocol::Message;
use crate::core::renderer::FieldView;

pub struct Session {
    role: Role,
    ball: Ball,
    left: Paddle,
    right: Paddle,
    score: Score,
    serve: Serve,
    rng: StdRng,
}

/// Whether the host's ball is in play.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Serve {
    /// No opponent yet: the ball stays at the centre and nobody scores.
    AwaitingPeer,
    /// Ticks left before the ball is released.
    Holding(u32),
    Live,
}

impl Session {
    pub fn new(role: Role) -> Self {
        Self::with_rng(role, StdRng::from_os_rng())
    }

    /// Deterministic serves for tests and replays.
    pub fn with_rng(role: Role, mut rng: StdRng) -> Self {
        Self {
            role,
            ball: Ball::new(&mut rng),
            left: Paddle::new(Side::Left),
            right: Paddle::new(Side::Right),
            score: Score::default(),
            serve: Serve::Live,
            rng,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn ball(&self) -> &Ball {
        &self.ball
    }

    pub fn score(&self) -> Score {
        self.score
    }

    /// Host drives the left paddle, the mirror the right one.
    pub fn local_paddle(&self) -> &Paddle {
        match self.role {
            Role::Host => &self.left,
            Role::Mirror => &self.right,
        }
    }

    pub fn remote_paddle(&self) -> &Paddle {
        match self.role {
            Role::Host => &self.right,
            Role::Mirror => &self.left,
        }
    }

    fn local_paddle_mut(&mut self) -> &mut Paddle {
        match self.role {
            Role::Host => &mut self.left,
            Role::Mirror => &mut self.right,
        }
    }

    fn remote_paddle_mut(&mut self) -> &mut Paddle {
        match self.role {
            Role::Host => &mut self.right,
            Role::Mirror => &mut self.left,
        }
    }

    /// Keep the ball still for the next `ticks` ticks (host only).
    pub fn hold_ball(&mut self, ticks: u32) {
        if self.role.is_host() {
            self.serve = match ticks {
                0 => Serve::Live,
                n => Serve::Holding(n),
            };
        }
    }

    /// Park the ball until [`Session::peer_joined`] (host only).
    pub fn wait_for_peer(&mut self) {
        if self.role.is_host() {
            self.serve = Serve::AwaitingPeer;
        }
    }

    /// Start the match proper: 0-0, a fresh serve, then `hold_ticks` of stillness.
    pub fn peer_joined(&mut self, hold_ticks: u32) {
        self.score = Score::default();
        self.ball.reset(&mut self.rng);
        self.hold_ball(hold_ticks);
    }

    pub fn is_holding(&self) -> bool {
        self.serve != Serve::Live
    }

    /// Write one received message into the state it targets. Every mirrored
    /// ball position is checked for a point on its own, so a point is not
    /// lost when the re-serve arrives in the same batch.
    pub fn apply(&mut self, msg: Message) {
        match msg {
            Message::PaddlePos(y) => self.remote_paddle_mut().set_y(y),
            Message::BallPos(x, y) => match self.role {
                Role::Mirror => {
                    self.ball.set_position(x, y);
                    self.award_point();
                }
                Role::Host => debug!(x, y, "host ignores ball position from peer"),
            },
        }
    }

    fn award_point(&mut self) -> Option<Point> {
        let point = self.score.evaluate(&mut self.ball, &mut self.rng)?;
        let scorer = match point {
            Point::Server => "server",
            Point::Client => "client",
        };
        info!(
            scorer,
            server = self.score.server,
            client = self.score.client,
            "point"
        );
        Some(point)
    }

    /// Run one tick and return the messages to send, in order.
    pub fn tick<M>(&mut self, intent: Intent, inbound: M) -> Vec<Message>
    where
        M: IntoIterator<Item = Message>,
    {
        for msg in inbound {
            self.apply(msg);
        }

        self.local_paddle_mut().update(intent);

        let mut outbound = Vec::with_capacity(2);
        if self.role.is_host() {
            match self.serve {
                Serve::AwaitingPeer => {}
                Serve::Holding(1) => self.serve = Serve::Live,
                Serve::Holding(n) => self.serve = Serve::Holding(n - 1),
                Serve::Live => self.ball.update(),
            }
            outbound.push(Message::BallPos(self.ball.x(), self.ball.y()));
        }
        outbound.push(Message::PaddlePos(self.local_paddle().y()));

        // Both peers check collisions whatever their role. On the mirror this
        // only touches velocity, which it never integrates.
        collide(&self.left, &mut self.ball, Side::Left);
        collide(&self.right, &mut self.ball, Side::Right);

        if self.serve != Serve::AwaitingPeer {
            self.award_point();
        }

        outbound
    }

    pub fn view<'a>(&'a self, status: &'a str) -> FieldView<'a> {
        FieldView {
            role: self.role,
            ball: &self.ball,
            left: &self.left,
            right: &self.right,
            score: self.score,
            status,
        }
    }
}
