// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pause / resume / stop signalling between a caller and a running batch.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

/// Requested state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    /// Finish the in-flight file, then wait before starting the next.
    Paused,
    /// Abandon the in-flight file and end the run.
    Stopped,
}

/// Cloneable handle for steering a run from another task.
#[derive(Debug, Clone)]
pub struct RunControl {
    sender: Arc<watch::Sender<RunState>>,
}

impl Default for RunControl {
    fn default() -> Self {
        Self::new()
    }
}

impl RunControl {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(RunState::Running);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn state(&self) -> RunState {
        *self.sender.borrow()
    }

    pub fn pause(&self) {
        self.set(RunState::Paused);
    }

    pub fn resume(&self) {
        self.set(RunState::Running);
    }

    pub fn stop(&self) {
        self.set(RunState::Stopped);
    }

    /// Re-arm after a stopped run so the next one can start.
    pub fn reset(&self) {
        self.set(RunState::Running);
    }

    fn set(&self, state: RunState) {
        let previous = self.sender.send_replace(state);
        if previous != state {
            info!(?previous, ?state, "Run state changed");
        }
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<RunState> {
        self.sender.subscribe()
    }
}

/// Wait while paused. Returns the state that ended the wait (`Running` or
/// `Stopped`).
pub(crate) async fn wait_while_paused(receiver: &mut watch::Receiver<RunState>) -> RunState {
    match receiver
        .wait_for(|state| *state != RunState::Paused)
        .await
    {
        Ok(state) => *state,
        // The sender lives in the runner's control handle; losing it ends the run.
        Err(_) => RunState::Stopped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn pause_blocks_until_resume() {
        let control = RunControl::new();
        let mut receiver = control.subscribe();
        control.pause();

        let resumer = control.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            resumer.resume();
        });

        assert_eq!(wait_while_paused(&mut receiver).await, RunState::Running);
    }

    #[tokio::test]
    async fn stop_ends_a_pause() {
        let control = RunControl::new();
        let mut receiver = control.subscribe();
        control.pause();
        control.stop();
        assert_eq!(wait_while_paused(&mut receiver).await, RunState::Stopped);
        control.reset();
        assert_eq!(control.state(), RunState::Running);
    }
}
