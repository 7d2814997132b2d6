//! Lifecycle host for one agent version.
//!
//! `Registration` plays the host environment's part: it sequences install
//! before activate, routes fetches to the agent only once a version has
//! activated, performs default network handling for pass-through requests,
//! and tracks the page clients the agent claims.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::Error;
use crate::agent::{ActivateReport, Agent, ClientControl, Fetched, InstallReport, Interception, ResponseSource};
use crate::request::Request;

/// Worker lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    /// Not installed yet, or the last install failed.
    Parsed,
    Installing,
    /// Installed and waiting to activate.
    Installed,
    Activating,
    /// Active and intercepting fetches.
    Activated,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerState::Parsed => "parsed",
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Activated => "activated",
        };
        f.write_str(name)
    }
}

/// Result of `Registration::register`.
#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct Registered {
    pub install: InstallReport,
    pub activate: ActivateReport,
}

/// Hosts one agent version.
pub struct Registration {
    agent: Agent,
    state: RwLock<WorkerState>,
    /// Set once any activation of this version succeeded.
    active: AtomicBool,
    skip_waiting: AtomicBool,
    open_clients: AtomicUsize,
    controlled_clients: AtomicUsize,
}

impl Registration {
    pub fn new(agent: Agent) -> Self {
        Self {
            agent,
            state: RwLock::new(WorkerState::Parsed),
            active: AtomicBool::new(false),
            skip_waiting: AtomicBool::new(false),
            open_clients: AtomicUsize::new(0),
            controlled_clients: AtomicUsize::new(0),
        }
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Whether the last successful install asked to skip waiting.
    pub fn skipped_waiting(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    /// A page client opened within the scope.
    pub fn connect_client(&self) -> usize {
        self.open_clients.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// A page client closed. Controlled counts never exceed open ones.
    pub fn disconnect_client(&self) {
        let _ = self
            .open_clients
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        let open = self.open_clients.load(Ordering::SeqCst);
        let _ = self
            .controlled_clients
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| Some(n.min(open)));
    }

    pub fn open_clients(&self) -> usize {
        self.open_clients.load(Ordering::SeqCst)
    }

    pub fn controlled_clients(&self) -> usize {
        self.controlled_clients.load(Ordering::SeqCst)
    }

    async fn transition(&self, allowed: &[WorkerState], next: WorkerState) -> Result<(), Error> {
        let mut state = self.state.write().await;
        let current = *state;
        if !allowed.contains(&current) {
            return Err(Error::InvalidState {
                expected: allowed.iter().map(ToString::to_string).collect::<Vec<_>>().join(" or "),
                actual: current.to_string(),
            });
        }
        *state = next;
        tracing::debug!(from = %current, to = %next, "worker state");
        Ok(())
    }

    async fn set_state(&self, next: WorkerState) {
        *self.state.write().await = next;
    }

    /// Dispatch the install event.
    ///
    /// A failed install returns the worker to `parsed`; calling again retries.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        self.transition(
            &[WorkerState::Parsed, WorkerState::Installed, WorkerState::Activated],
            WorkerState::Installing,
        )
        .await?;
        self.skip_waiting.store(false, Ordering::SeqCst);

        match self.agent.install(self).await {
            Ok(report) => {
                self.set_state(WorkerState::Installed).await;
                Ok(report)
            }
            Err(e) => {
                self.set_state(WorkerState::Parsed).await;
                Err(e)
            }
        }
    }

    /// Dispatch the activate event. Requires an installed worker.
    pub async fn activate(&self) -> Result<ActivateReport, Error> {
        self.transition(&[WorkerState::Installed], WorkerState::Activating)
            .await?;

        match self.agent.activate(self).await {
            Ok(report) => {
                self.active.store(true, Ordering::SeqCst);
                self.set_state(WorkerState::Activated).await;
                Ok(report)
            }
            Err(e) => {
                self.set_state(WorkerState::Installed).await;
                Err(e)
            }
        }
    }

    /// Install, then activate straight away.
    ///
    /// The agent always skips waiting after a successful install, so there is
    /// no waiting phase to sit out before activation.
    pub async fn register(&self) -> Result<Registered, Error> {
        let install = self.install().await?;
        let activate = self.activate().await?;
        Ok(Registered { install, activate })
    }

    /// Dispatch a fetch from a page client.
    ///
    /// Until the version has activated, and for requests the agent passes
    /// through, the request goes straight to the network.
    pub async fn fetch(&self, request: Request) -> Result<Fetched, Error> {
        if self.is_active() {
            match self.agent.handle_fetch(&request).await? {
                Interception::Respond(fetched) => return Ok(fetched),
                Interception::PassThrough => {}
            }
        }

        let response = self.agent.network().fetch(&request).await?;
        Ok(Fetched { response, source: ResponseSource::PassThrough, write: None })
    }
}

#[async_trait]
impl ClientControl for Registration {
    fn skip_waiting(&self) {
        self.skip_waiting.store(true, Ordering::SeqCst);
    }

    async fn claim(&self) -> Result<usize, Error> {
        let open = self.open_clients.load(Ordering::SeqCst);
        self.controlled_clients.store(open, Ordering::SeqCst);
        Ok(open)
    }
}
