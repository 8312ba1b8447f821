//! One-shot readiness notification for supervisors.

use std::net::SocketAddr;

use tokio::sync::oneshot;

/// Creates a linked signal/readiness pair.
pub fn channel() -> (ReadySignal, Readiness) {
    let (tx, rx) = oneshot::channel();
    (ReadySignal { tx }, Readiness { rx })
}

/// Sending half, handed to a [`ServerRunner`](super::ServerRunner).
///
/// Firing consumes the signal, so a runner can report readiness at most once.
#[derive(Debug)]
pub struct ReadySignal {
    tx: oneshot::Sender<SocketAddr>,
}

impl ReadySignal {
    /// Reports the bound address. A supervisor that stopped listening is not
    /// an error.
    pub fn fire(self, addr: SocketAddr) {
        let _ = self.tx.send(addr);
    }
}

/// Receiving half, kept by the supervisor.
#[derive(Debug)]
pub struct Readiness {
    rx: oneshot::Receiver<SocketAddr>,
}

impl Readiness {
    /// Waits until the runner is accepting connections.
    ///
    /// Returns `None` if the runner failed or was dropped before becoming
    /// ready, e.g. because the port could not be bound.
    pub async fn wait(self) -> Option<SocketAddr> {
        self.rx.await.ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    #[tokio::test]
    async fn delivers_address() {
        let (signal, readiness) = channel();
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 4321);
        signal.fire(addr);
        assert_eq!(readiness.wait().await, Some(addr));
    }

    #[tokio::test]
    async fn dropped_signal_means_never_ready() {
        let (signal, readiness) = channel();
        drop(signal);
        assert_eq!(readiness.wait().await, None);
    }

    #[test]
    fn fire_without_listener_is_silent() {
        let (signal, readiness) = channel();
        drop(readiness);
        signal.fire(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 1));
    }
}
