//! Rate limiting utilities
//!
//! Game operations are throttled per operation kind with plain-data token
//! buckets. Raw inbound socket traffic is guarded separately by a `governor`
//! limiter per connection.

use std::num::NonZeroU32;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use serde::Serialize;

/// Rate limiter type alias
pub type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Create a rate limiter with the specified requests per second
pub fn create_limiter(requests_per_second: u32) -> Arc<Limiter> {
    let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::direct(quota))
}

/// Inbound message rate limit for a play connection
pub const INBOUND_MESSAGE_RATE_LIMIT: u32 = 30; // Max 30 frames per second

/// Per-connection guard against message floods, independent of game rules
#[derive(Clone)]
pub struct ConnectionFloodGuard {
    inbound_limiter: Arc<Limiter>,
}

impl ConnectionFloodGuard {
    pub fn new() -> Self {
        Self {
            inbound_limiter: create_limiter(INBOUND_MESSAGE_RATE_LIMIT),
        }
    }

    /// Check if an inbound frame is allowed (returns true if allowed)
    pub fn check_inbound(&self) -> bool {
        self.inbound_limiter.check().is_ok()
    }
}

impl Default for ConnectionFloodGuard {
    fn default() -> Self {
        Self::new()
    }
}

/// Operation kinds that carry their own throttle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    Rotate,
    Move,
    Radar,
    Scout,
    Environment,
    Watch,
    Attack,
    /// Shared by defend and undefend
    Defend,
    Health,
}

impl OpKind {
    pub const ALL: [OpKind; 9] = [
        OpKind::Rotate,
        OpKind::Move,
        OpKind::Radar,
        OpKind::Scout,
        OpKind::Environment,
        OpKind::Watch,
        OpKind::Attack,
        OpKind::Defend,
        OpKind::Health,
    ];

    /// How often the operation may be called per second. Also the burst size.
    pub fn per_second(self) -> u32 {
        match self {
            OpKind::Rotate => 2,
            OpKind::Move => 1,
            OpKind::Radar => 1,
            OpKind::Scout => 2,
            OpKind::Environment => 4,
            OpKind::Watch => 2,
            OpKind::Attack => 3,
            OpKind::Defend => 1,
            OpKind::Health => 2,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OpKind::Rotate => "rotate",
            OpKind::Move => "move",
            OpKind::Radar => "radar",
            OpKind::Scout => "scout",
            OpKind::Environment => "environment",
            OpKind::Watch => "watch",
            OpKind::Attack => "attack",
            OpKind::Defend => "defend",
            OpKind::Health => "health",
        };
        f.write_str(name)
    }
}

/// Token bucket state. Plain data, advanced only through [`try_acquire`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenBucket {
    pub tokens: f64,
    pub last_refill: Instant,
}

impl TokenBucket {
    pub fn full(capacity: u32, now: Instant) -> Self {
        Self {
            tokens: capacity.max(1) as f64,
            last_refill: now,
        }
    }
}

/// Refill `bucket` for the time elapsed until `now` and try to take one token.
/// Returns the advanced bucket and whether the token was granted.
pub fn try_acquire(bucket: TokenBucket, per_second: u32, now: Instant) -> (TokenBucket, bool) {
    let capacity = per_second.max(1) as f64;
    let elapsed = now.saturating_duration_since(bucket.last_refill).as_secs_f64();
    let tokens = (bucket.tokens + elapsed * capacity).min(capacity);

    if tokens >= 1.0 {
        (
            TokenBucket {
                tokens: tokens - 1.0,
                last_refill: now,
            },
            true,
        )
    } else {
        (
            TokenBucket {
                tokens,
                last_refill: now,
            },
            false,
        )
    }
}

/// One bucket per [`OpKind`]
#[derive(Debug, Clone)]
pub struct OpLimits {
    buckets: [TokenBucket; 9],
}

impl OpLimits {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(now: Instant) -> Self {
        Self {
            buckets: OpKind::ALL.map(|op| TokenBucket::full(op.per_second(), now)),
        }
    }

    /// Consume a token for `op` if one is available
    pub fn check(&mut self, op: OpKind) -> bool {
        self.check_at(op, Instant::now())
    }

    pub fn check_at(&mut self, op: OpKind, now: Instant) -> bool {
        let slot = &mut self.buckets[op.index()];
        let (next, granted) = try_acquire(*slot, op.per_second(), now);
        *slot = next;
        granted
    }
}

impl Default for OpLimits {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether several connections of one user share a single budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RateLimitScope {
    #[default]
    PerUser,
    PerConnection,
}

impl FromStr for RateLimitScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" | "per_user" => Ok(Self::PerUser),
            "connection" | "per_connection" => Ok(Self::PerConnection),
            other => Err(format!("unknown rate limit scope '{}'", other)),
        }
    }
}
