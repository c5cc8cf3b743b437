//! Device lifecycle events.
//!
//! The stack reports connectivity and commissioning transitions as
//! [`LifecycleEvent`]s. They are posted to an unbounded channel and consumed
//! by the [`LifecycleEventRouter`] task, so posting never blocks the caller.
//!
//! ## Commissioning progression
//!
//! ```text
//! Uncommissioned --WindowOpened--> WindowOpen --SessionStarted--> SessionActive
//!                                      ^                               |
//!                                      +--SessionStopped/FailSafe------+
//!                                                                      |
//!                                      Commissioned <--Complete--------+
//! ```

mod router;

pub use router::{EventSender, LifecycleEventRouter};

use log::info;
use std::str::FromStr;

/// Connectivity and commissioning notifications from the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::IntoStaticStr)]
pub enum LifecycleEvent {
    InterfaceIpAddressChanged,
    CommissioningComplete,
    FailSafeTimerExpired,
    CommissioningSessionStarted,
    CommissioningSessionStopped,
    CommissioningWindowOpened,
    CommissioningWindowClosed,
    /// Event kinds this build does not interpret
    Other(u16),
}

impl LifecycleEvent {
    /// Every interpreted kind, in declaration order.
    pub const KNOWN: [LifecycleEvent; 7] = [
        LifecycleEvent::InterfaceIpAddressChanged,
        LifecycleEvent::CommissioningComplete,
        LifecycleEvent::FailSafeTimerExpired,
        LifecycleEvent::CommissioningSessionStarted,
        LifecycleEvent::CommissioningSessionStopped,
        LifecycleEvent::CommissioningWindowOpened,
        LifecycleEvent::CommissioningWindowClosed,
    ];
}

impl FromStr for LifecycleEvent {
    type Err = String;

    /// Accepts the variant name in any case, or a numeric code for
    /// [`LifecycleEvent::Other`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(event) = Self::KNOWN
            .into_iter()
            .find(|e| <&str>::from(*e).eq_ignore_ascii_case(s))
        {
            return Ok(event);
        }
        s.parse::<u16>()
            .map(LifecycleEvent::Other)
            .map_err(|_| format!("unknown event '{s}'"))
    }
}

/// Application hook for lifecycle events.
///
/// Runs on the router task: implementations must not block.
pub trait LifecycleEventCallback: Send + Sync {
    fn on_event(&self, event: LifecycleEvent);
}

/// Logs each event, one arm per kind.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingEventHandler;

impl LifecycleEventCallback for LoggingEventHandler {
    fn on_event(&self, event: LifecycleEvent) {
        match event {
            LifecycleEvent::InterfaceIpAddressChanged => {
                info!("[Matter] Interface IP Address changed")
            }
            LifecycleEvent::CommissioningComplete => info!("[Matter] Commissioning complete"),
            LifecycleEvent::FailSafeTimerExpired => {
                info!("[Matter] Commissioning failed, fail safe timer expired")
            }
            LifecycleEvent::CommissioningSessionStarted => {
                info!("[Matter] Commissioning session started")
            }
            LifecycleEvent::CommissioningSessionStopped => {
                info!("[Matter] Commissioning session stopped")
            }
            LifecycleEvent::CommissioningWindowOpened => {
                info!("[Matter] Commissioning window opened")
            }
            LifecycleEvent::CommissioningWindowClosed => {
                info!("[Matter] Commissioning window closed")
            }
            LifecycleEvent::Other(_) => {}
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display)]
pub enum CommissioningState {
    #[default]
    Uncommissioned,
    WindowOpen,
    SessionActive,
    Commissioned,
}

impl CommissioningState {
    /// State after `event`. Events that do not apply leave the state as is.
    pub fn on_event(self, event: LifecycleEvent) -> Self {
        use CommissioningState::*;
        match (self, event) {
            (Commissioned, _) => Commissioned,
            (_, LifecycleEvent::CommissioningComplete) => Commissioned,
            (_, LifecycleEvent::CommissioningWindowOpened) => WindowOpen,
            (_, LifecycleEvent::CommissioningSessionStarted) => SessionActive,
            (SessionActive, LifecycleEvent::CommissioningSessionStopped)
            | (SessionActive, LifecycleEvent::FailSafeTimerExpired) => WindowOpen,
            (_, LifecycleEvent::CommissioningWindowClosed) => Uncommissioned,
            (state, _) => state,
        }
    }
}
