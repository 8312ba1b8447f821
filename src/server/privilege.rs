//! Waiting for elevated privileges to be dropped before serving.
//!
//! A supervisor that binds low ports as root keeps the
//! [`PrivilegeDropNotifier`] and calls [`release`](PrivilegeDropNotifier::release)
//! once it has switched to an unprivileged user. Each runner holds a
//! [`PrivilegeGate`] and parks on it without polling.

use thiserror::Error;
use tokio::sync::watch;

#[derive(Debug, Error)]
pub enum PrivilegeError {
    #[error("privilege notifier dropped before privileges were released")]
    NotifierDropped,
}

/// Creates a closed gate and the notifier that opens it.
pub fn gate() -> (PrivilegeDropNotifier, PrivilegeGate) {
    let (tx, rx) = watch::channel(false);
    (PrivilegeDropNotifier { tx }, PrivilegeGate { rx })
}

/// Opens every gate created alongside it.
#[derive(Debug)]
pub struct PrivilegeDropNotifier {
    tx: watch::Sender<bool>,
}

impl PrivilegeDropNotifier {
    /// Marks privileges as dropped. Gates cloned later see the open state too.
    pub fn release(&self) {
        self.tx.send_replace(true);
    }

    /// Another gate on the same notifier, e.g. for a second port.
    pub fn subscribe(&self) -> PrivilegeGate {
        PrivilegeGate {
            rx: self.tx.subscribe(),
        }
    }
}

/// Blocks a runner until privileges are dropped.
#[derive(Debug, Clone)]
pub struct PrivilegeGate {
    rx: watch::Receiver<bool>,
}

impl PrivilegeGate {
    /// A gate that is already open.
    pub fn released() -> Self {
        let (notifier, gate) = gate();
        notifier.release();
        gate
    }

    pub fn is_released(&self) -> bool {
        *self.rx.borrow()
    }

    /// Waits until the gate is open.
    ///
    /// # Errors
    ///
    /// [`PrivilegeError::NotifierDropped`] if the notifier goes away while the
    /// gate is still closed.
    pub async fn wait(&mut self) -> Result<(), PrivilegeError> {
        self.rx
            .wait_for(|released| *released)
            .await
            .map(|_| ())
            .map_err(|_| PrivilegeError::NotifierDropped)
    }
}

/// Whether the process runs with root's effective user or group.
#[cfg(unix)]
pub fn is_elevated() -> bool {
    use nix::unistd::{getegid, geteuid};

    geteuid().is_root() || getegid().as_raw() == 0
}

#[cfg(not(unix))]
pub fn is_elevated() -> bool {
    false
}
