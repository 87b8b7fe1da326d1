/// Ball and paddle motion plus paddle/ball collision response. No I/O lives here.
use rand::Rng;

use crate::core::config::{
    BALL_MAX_SPEED, BALL_MAX_START_VY, BALL_SIZE, BALL_SPEED_INCREMENT, BALL_START_SPEED,
    BOUNCE_ANGLE, FIELD_HEIGHT, FIELD_WIDTH, PADDLE_ACCELERATION, PADDLE_DECELERATION,
    PADDLE_HEIGHT, PADDLE_MARGIN, PADDLE_MAX_SPEED, PADDLE_WIDTH,
};
use crate::core::game::Intent;

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    /// Strict overlap: boxes that only touch along an edge do not intersect.
    pub fn intersects(&self, other: &Bounds) -> bool {
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }
}

/// Which side of the field a paddle defends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ball {
    x: f64,
    y: f64,
    vx: f64,
    vy: f64,
    speed: f64,
}

impl Ball {
    /// A ball at the reset position with a random direction.
    pub fn new<R: Rng>(rng: &mut R) -> Self {
        let mut ball = Self {
            x: 0.0,
            y: 0.0,
            vx: 0.0,
            vy: 0.0,
            speed: BALL_START_SPEED,
        };
        ball.reset(rng);
        ball
    }

    pub fn start_position() -> (f64, f64) {
        (FIELD_WIDTH / 2.0 - BALL_SIZE / 2.0, FIELD_HEIGHT / 2.0 - BALL_SIZE / 2.0)
    }

    /// Centre the ball and serve it in a random direction at the start speed.
    pub fn reset<R: Rng>(&mut self, rng: &mut R) {
        let (x, y) = Self::start_position();
        self.x = x;
        self.y = y;
        self.speed = BALL_START_SPEED;

        let vy = f64::from(rng.random_range(0..BALL_MAX_START_VY));
        self.vx = if rng.random_bool(0.5) {
            -self.speed
        } else {
            self.speed
        };
        self.vy = if rng.random_bool(0.5) { -vy } else { vy };
    }

    /// Advance one tick. Only the scalar speed is clamped; the velocity is
    /// recomputed from it on the next paddle hit.
    pub fn update(&mut self) {
        self.x += self.vx;
        self.y += self.vy;

        if self.speed > BALL_MAX_SPEED {
            self.speed = BALL_MAX_SPEED;
        }

        if self.y < 0.0 {
            self.y = 0.0;
            self.vy = self.vy.abs();
        } else if self.y + BALL_SIZE > FIELD_HEIGHT {
            self.y = FIELD_HEIGHT - BALL_SIZE;
            self.vy = -self.vy;
        }
    }

    pub fn set_position(&mut self, x: f64, y: f64) {
        self.x = x;
        self.y = y;
    }

    pub fn bounds(&self) -> Bounds {
        Bounds {
            x: self.x,
            y: self.y,
            width: BALL_SIZE,
            height: BALL_SIZE,
        }
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn velocity(&self) -> (f64, f64) {
        (self.vx, self.vy)
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Paddle {
    x: f64,
    y: f64,
    speed: f64,
}

impl Paddle {
    /// A paddle at rest, vertically centred, on the given side.
    pub fn new(side: Side) -> Self {
        let x = match side {
            Side::Left => PADDLE_MARGIN,
            Side::Right => FIELD_WIDTH - (PADDLE_MARGIN + PADDLE_WIDTH),
        };
        Self {
            x,
            y: FIELD_HEIGHT / 2.0 - PADDLE_HEIGHT / 2.0,
            speed: 0.0,
        }
    }

    /// Apply one tick of intent: accelerate while a direction is held,
    /// otherwise decay towards rest without overshooting.
    pub fn update(&mut self, intent: Intent) {
        if intent.moving_up {
            self.speed = (self.speed - PADDLE_ACCELERATION).max(-PADDLE_MAX_SPEED);
        } else if intent.moving_down {
            self.speed = (self.speed + PADDLE_ACCELERATION).min(PADDLE_MAX_SPEED);
        } else if self.speed < 0.0 {
            self.speed = (self.speed + PADDLE_DECELERATION).min(0.0);
        } else if self.speed > 0.0 {
            self.speed = (self.speed - PADDLE_DECELERATION).max(0.0);
        }

        self.y = (self.y + self.speed).clamp(0.0, FIELD_HEIGHT - PADDLE_HEIGHT);
    }

    /// Position reported by the remote peer.
    pub fn set_y(&mut self, y: f64) {
        self.y = y;
    }

    pub fn bounds(&self) -> Bounds {
        Bounds {
            x: self.x,
            y: self.y,
            width: PADDLE_WIDTH,
            height: PADDLE_HEIGHT,
        }
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }
}

/// Bounce the ball off `paddle` if their boxes overlap. The return angle grows
/// with the distance between the strike point and the paddle centre, and every
/// hit adds to the ball's speed. Returns whether a bounce happened.
pub fn collide(paddle: &Paddle, ball: &mut Ball, side: Side) -> bool {
    if !paddle.bounds().intersects(&ball.bounds()) {
        return false;
    }

    let half = PADDLE_HEIGHT / 2.0;
    let offset = ((paddle.y + half) - (ball.y + BALL_SIZE / 2.0)) / half;
    let angle = offset * BOUNCE_ANGLE;

    let vx = ball.speed * angle.cos();
    ball.vx = match side {
        Side::Left => vx,
        Side::Right => -vx,
    };
    ball.vy = -ball.speed * angle.sin();
    ball.speed += BALL_SPEED_INCREMENT;
    true
}

/// Who took a point on a given tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Point {
    Server,
    Client,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Score {
    pub server: u32,
    pub client: u32,
}

impl Score {
    /// Award at most one point when the ball has fully left the field, and
    /// re-serve it.
    pub fn evaluate<R: Rng>(&mut self, ball: &mut Ball, rng: &mut R) -> Option<Point> {
        let point = if ball.x + BALL_SIZE < 0.0 {
            self.client += 1;
            Point::Client
        } else if ball.x > FIELD_WIDTH {
            self.server += 1;
            Point::Server
        } else {
            return None;
        };
        ball.reset(rng);
        Some(point)
    }
}
