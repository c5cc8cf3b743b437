//! Simulated Matter stack start.
//!
//! Starting the stack freezes the endpoint tree, loads the commissioning
//! record and spawns the lifecycle event router. An uncommissioned device
//! opens its commissioning window, which closes again after the configured
//! timeout unless a controller completes commissioning first.

use super::events::{
    CommissioningState, EventSender, LifecycleEvent, LifecycleEventCallback,
    LifecycleEventRouter,
};
use super::node::{ROOT_ENDPOINT_ID, SharedNode};
use crate::commissioning::{CommissioningStore, format_pairing_code, generate_pairing_code};
use crate::error::{BridgeError, Result};
use log::{error, info};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Default commissioning window, in seconds
pub const DEFAULT_COMMISSIONING_WINDOW_SECS: u64 = 900;

#[derive(Debug, Clone)]
pub struct StackOptions {
    /// Directory holding `commissioning.json`
    pub persist_dir: PathBuf,
    pub commissioning_window: Duration,
}

impl StackOptions {
    pub fn new(persist_dir: impl Into<PathBuf>) -> Self {
        Self {
            persist_dir: persist_dir.into(),
            commissioning_window: Duration::from_secs(DEFAULT_COMMISSIONING_WINDOW_SECS),
        }
    }
}

/// Handle to the running stack.
pub struct MatterStack {
    events: EventSender,
    router: LifecycleEventRouter,
    store: Arc<CommissioningStore>,
    tasks: Vec<JoinHandle<()>>,
}

impl MatterStack {
    /// Sender for lifecycle events (network layer, console).
    pub fn events(&self) -> EventSender {
        self.events.clone()
    }

    pub fn state(&self) -> CommissioningState {
        self.router.state()
    }

    pub fn commissioning(&self) -> &Arc<CommissioningStore> {
        &self.store
    }

    /// Stop the router and the window timer.
    pub fn shutdown(self) {
        for task in self.tasks {
            task.abort();
        }
        info!("[Matter] Stack stopped");
    }
}

/// Start the stack on the current tokio runtime.
///
/// Fails if the stack already runs on this node, if the node has no root
/// endpoint, or if no runtime is available. The node is left untouched on
/// failure.
pub fn start(
    node: &SharedNode,
    options: &StackOptions,
    callback: Arc<dyn LifecycleEventCallback>,
) -> Result<MatterStack> {
    tokio::runtime::Handle::try_current()
        .map_err(|e| BridgeError::StackStart(format!("no async runtime: {e}")))?;

    let (discriminator, passcode) = {
        let mut node = node.write();
        if node.is_started() {
            return Err(BridgeError::StackAlreadyStarted);
        }
        node.endpoint(ROOT_ENDPOINT_ID)
            .map_err(|_| BridgeError::StackStart("root endpoint missing".into()))?;
        node.mark_started();
        (node.config().discriminator, node.config().passcode)
    };

    let store = Arc::new(CommissioningStore::open(&options.persist_dir));
    let router = LifecycleEventRouter::new(callback, Some(store.clone()));
    let (events, rx) = EventSender::channel();

    let mut tasks = vec![router.clone().spawn(rx)];

    if store.is_commissioned() {
        info!("[Matter] Device already commissioned, skipping commissioning window");
        info!(
            "  (Delete {:?} to reset commissioning)",
            options.persist_dir.join(crate::commissioning::COMMISSIONING_FILE)
        );
    } else {
        let code = generate_pairing_code(discriminator, passcode);
        info!("[Matter] Device ready for commissioning");
        info!("  Discriminator: {}", discriminator);
        info!("  Passcode: {}", passcode);
        info!("  Manual pairing code: {}", format_pairing_code(&code));

        events.post(LifecycleEvent::CommissioningWindowOpened);
        tasks.push(spawn_window_timer(
            events.clone(),
            router.clone(),
            options.commissioning_window,
        ));
    }

    info!("[Matter] Stack started");
    Ok(MatterStack {
        events,
        router,
        store,
        tasks,
    })
}

fn spawn_window_timer(
    events: EventSender,
    router: LifecycleEventRouter,
    window: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(window).await;
        if router.state() != CommissioningState::Commissioned {
            info!("[Matter] Commissioning window timed out");
            events.post(LifecycleEvent::CommissioningWindowClosed);
        }
    })
}

/// Start the stack, logging failure instead of returning it.
///
/// Startup continues uncommissioned when the stack does not come up.
pub fn start_or_degrade(
    node: &SharedNode,
    options: &StackOptions,
    callback: Arc<dyn LifecycleEventCallback>,
) -> Option<MatterStack> {
    match start(node, options, callback) {
        Ok(stack) => Some(stack),
        Err(e) => {
            error!("[Matter] Matter start failed: {}", e);
            None
        }
    }
}
