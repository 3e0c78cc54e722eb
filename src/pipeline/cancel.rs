use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

/// Triggers cancellation of a pipeline run
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// Cooperative cancellation observed by in-flight work.
///
/// Fires when its handle is cancelled or when the optional deadline passes.
/// A signal whose handle was dropped without cancelling never fires.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: Option<watch::Receiver<bool>>,
    deadline: Option<Instant>,
}

impl CancelSignal {
    pub fn new() -> (CancelHandle, CancelSignal) {
        let (tx, rx) = watch::channel(false);
        (
            CancelHandle { tx },
            CancelSignal {
                rx: Some(rx),
                deadline: None,
            },
        )
    }

    /// A signal that never fires
    pub fn never() -> Self {
        Self {
            rx: None,
            deadline: None,
        }
    }

    /// Also fire once `timeout` has elapsed from now.
    /// A timeout past the clock's range adds no deadline.
    pub fn with_deadline(mut self, timeout: Duration) -> Self {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return self;
        };
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    pub fn is_cancelled(&self) -> bool {
        let flagged = self.rx.as_ref().is_some_and(|rx| *rx.borrow());
        let expired = self.deadline.is_some_and(|d| Instant::now() >= d);
        flagged || expired
    }

    /// Resolves once the run is cancelled
    pub async fn cancelled(&mut self) {
        let deadline = self.deadline;
        let flag = async {
            match self.rx.as_mut() {
                Some(rx) => {
                    // Err means the handle was dropped without cancelling
                    let closed = rx.wait_for(|cancelled| *cancelled).await.is_err();
                    if closed {
                        std::future::pending::<()>().await;
                    }
                }
                None => std::future::pending::<()>().await,
            }
        };
        match deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = flag => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => flag.await,
        }
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::never()
    }
}
