use chrono::{DateTime, Utc};
use dataseal_protocol::{Protocol, ProtocolConfig, ProtocolError};
use dataseal_types::Timestamp;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::ApiError;

/// Source of ledger time for transactions
#[derive(Clone)]
pub enum Clock {
    /// Server wall clock, whole seconds since the Unix epoch
    System,
    /// Manually advanced time, for tests and scripted demos
    Manual(Arc<AtomicU64>),
}

impl Clock {
    pub fn manual(start: Timestamp) -> Self {
        Clock::Manual(Arc::new(AtomicU64::new(start)))
    }

    pub fn now(&self) -> Timestamp {
        match self {
            Clock::System => Utc::now().timestamp().max(0) as u64,
            Clock::Manual(time) => time.load(Ordering::SeqCst),
        }
    }

    /// Move a manual clock forward; no effect on the system clock
    pub fn advance(&self, seconds: u64) {
        if let Clock::Manual(time) = self {
            time.fetch_add(seconds, Ordering::SeqCst);
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub protocol: Arc<Mutex<Protocol>>,
    pub clock: Clock,
    pub started_at: DateTime<Utc>,
    /// Whether `/v1/accounts/deposit` may mint funds. Off unless enabled.
    pub faucet: bool,
}

impl AppState {
    pub fn new(config: ProtocolConfig) -> Result<Self, ProtocolError> {
        Self::with_clock(config, Clock::System)
    }

    pub fn with_clock(config: ProtocolConfig, clock: Clock) -> Result<Self, ProtocolError> {
        Ok(AppState {
            protocol: Arc::new(Mutex::new(Protocol::new(config)?)),
            clock,
            started_at: Utc::now(),
            faucet: false,
        })
    }

    /// Open or close the development deposit faucet
    pub fn with_faucet(mut self, enabled: bool) -> Self {
        self.faucet = enabled;
        self
    }

    pub fn protocol(&self) -> Result<MutexGuard<'_, Protocol>, ApiError> {
        self.protocol
            .lock()
            .map_err(|_| ApiError::internal("protocol state lock poisoned"))
    }

    pub fn uptime_seconds(&self) -> u64 {
        (Utc::now() - self.started_at).num_seconds().max(0) as u64
    }
}
