//! Liveness detection for half-open connections.
//!
//! The controller holds a single deadline and never schedules anything
//! itself; the session's heartbeat task sleeps until [`deadline`] and
//! then calls [`poll`].
//!
//! ```text
//!              arm / pong                      deadline: SendPing
//!  Disarmed ──────────────► Idle ───────────────────────────────► AwaitingPong
//!      ▲                     ▲  │ activity: push deadline              │  │
//!      │                     │  └──────┘                               │  │
//!      │                     └──────────────── pong ───────────────────┘  │
//!      └────────────────────────────── deadline: Expired ─────────────────┘
//! ```
//!
//! [`deadline`]: HeartbeatController::deadline
//! [`poll`]: HeartbeatController::poll

use std::time::Duration;

use tokio::time::Instant;

/// What the driver must do after a [`HeartbeatController::poll`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatAction {
    /// The line went quiet; send `pusher:ping`.
    SendPing,
    /// No pong arrived in time; tear the session down.
    Expired,
}

/// Longest timeout honoured; anything above is clamped so deadlines
/// never overflow `Instant`.
const MAX_TIMEOUT: Duration = Duration::from_secs(86_400 * 365 * 30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Disarmed,
    Idle { deadline: Instant },
    AwaitingPong { deadline: Instant },
}

/// Two-phase inactivity / pong-wait timer.
#[derive(Debug, Clone)]
pub struct HeartbeatController {
    activity_timeout: Duration,
    pong_timeout: Duration,
    phase: Phase,
}

impl HeartbeatController {
    pub fn new(activity_timeout: Duration, pong_timeout: Duration) -> Self {
        Self {
            activity_timeout: activity_timeout.min(MAX_TIMEOUT),
            pong_timeout: pong_timeout.min(MAX_TIMEOUT),
            phase: Phase::Disarmed,
        }
    }

    pub fn activity_timeout(&self) -> Duration {
        self.activity_timeout
    }

    pub fn pong_timeout(&self) -> Duration {
        self.pong_timeout
    }

    /// Start inactivity tracking from `now`.
    pub fn arm(&mut self, now: Instant) {
        self.phase = Phase::Idle {
            deadline: now + self.activity_timeout,
        };
    }

    /// Record inbound traffic.
    ///
    /// Pushes the inactivity deadline out. Does not end a pong wait;
    /// only [`on_pong`](Self::on_pong) does that.
    pub fn on_activity(&mut self, now: Instant) {
        if let Phase::Idle { .. } = self.phase {
            self.arm(now);
        }
    }

    /// Record an inbound `pusher:pong`.
    pub fn on_pong(&mut self, now: Instant) {
        match self.phase {
            Phase::Idle { .. } | Phase::AwaitingPong { .. } => self.arm(now),
            Phase::Disarmed => {}
        }
    }

    /// Stop all tracking. Nothing fires until the next [`arm`](Self::arm).
    pub fn disarm(&mut self) {
        self.phase = Phase::Disarmed;
    }

    pub fn is_armed(&self) -> bool {
        !matches!(self.phase, Phase::Disarmed)
    }

    pub fn is_awaiting_pong(&self) -> bool {
        matches!(self.phase, Phase::AwaitingPong { .. })
    }

    /// The instant the driver should next wake, if any.
    pub fn deadline(&self) -> Option<Instant> {
        match self.phase {
            Phase::Disarmed => None,
            Phase::Idle { deadline } | Phase::AwaitingPong { deadline } => Some(deadline),
        }
    }

    /// Advance the state machine to `now`.
    pub fn poll(&mut self, now: Instant) -> Option<HeartbeatAction> {
        match self.phase {
            Phase::Idle { deadline } if now >= deadline => {
                self.phase = Phase::AwaitingPong {
                    deadline: now + self.pong_timeout,
                };
                Some(HeartbeatAction::SendPing)
            }
            Phase::AwaitingPong { deadline } if now >= deadline => {
                self.phase = Phase::Disarmed;
                Some(HeartbeatAction::Expired)
            }
            _ => None,
        }
    }
}
