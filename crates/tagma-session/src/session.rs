//! The detection session loop.
//!
//! The session is the single owner of the [`TemporalCompiler`]. Merged sets
//! from the ensemble are fed to it in arrival order, each paired with the
//! most recent hand outcome, and every published result is forwarded to the
//! results channel.

use tagma_models::{CompiledResult, HandDetectionOutcome};
use tagma_vision::{FrameDetectionSet, SequencedHands, TemporalCompiler};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::SessionConfig;
use crate::error::{SessionError, SessionResult};

/// Commands accepted by a running session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    /// Drop buffered frames, e.g. after the context changed
    Clear,
}

/// Client side of a session.
pub struct SessionChannels {
    pub results: mpsc::Receiver<CompiledResult>,
    pub commands: mpsc::Sender<SessionCommand>,
}

/// Keep only the newest hand outcome, by submission order.
///
/// Outcomes can complete out of order when several hand inferences run at
/// once; older ones are ignored. Until the first outcome arrives the
/// receiver holds an empty outcome.
pub fn track_latest_hands(
    mut outcomes: mpsc::Receiver<SequencedHands>,
) -> (watch::Receiver<HandDetectionOutcome>, JoinHandle<()>) {
    let (tx, rx) = watch::channel(HandDetectionOutcome::empty());
    let handle = tokio::spawn(async move {
        let mut newest: Option<u64> = None;
        while let Some(hands) = outcomes.recv().await {
            if newest.is_some_and(|n| hands.sequence < n) {
                debug!(sequence = hands.sequence, "Discarding stale hand outcome");
                continue;
            }
            newest = Some(hands.sequence);
            if tx.send(hands.outcome).is_err() {
                break;
            }
        }
    });
    (rx, handle)
}

pub struct DetectionSession {
    compiler: TemporalCompiler,
    merged: mpsc::Receiver<FrameDetectionSet>,
    hands: watch::Receiver<HandDetectionOutcome>,
    commands: mpsc::Receiver<SessionCommand>,
    results: mpsc::Sender<CompiledResult>,
}

impl DetectionSession {
    pub fn new(
        config: &SessionConfig,
        merged: mpsc::Receiver<FrameDetectionSet>,
        hands: watch::Receiver<HandDetectionOutcome>,
    ) -> SessionResult<(Self, SessionChannels)> {
        config.validate()?;
        let compiler = TemporalCompiler::from_config(&config.detection)?;

        let (results_tx, results_rx) = mpsc::channel(config.results_capacity);
        let (commands_tx, commands_rx) = mpsc::channel(config.command_capacity);

        Ok((
            Self {
                compiler,
                merged,
                hands,
                commands: commands_rx,
                results: results_tx,
            },
            SessionChannels {
                results: results_rx,
                commands: commands_tx,
            },
        ))
    }

    /// Run until the ensemble output closes.
    ///
    /// Fails if the results receiver is dropped.
    pub async fn run(mut self) -> SessionResult<()> {
        info!("Detection session started");
        let mut accepting_commands = true;
        let mut published = 0u64;

        loop {
            tokio::select! {
                biased;

                command = self.commands.recv(), if accepting_commands => match command {
                    Some(SessionCommand::Clear) => {
                        debug!("Clearing buffered outcomes on request");
                        self.compiler.clear_outcomes();
                    }
                    None => accepting_commands = false,
                },

                set = self.merged.recv() => match set {
                    Some(set) => {
                        if self.handle_set(set).await? {
                            published += 1;
                        }
                    }
                    None => break,
                },
            }
        }

        info!(published, "Detection session finished");
        Ok(())
    }

    async fn handle_set(&mut self, set: FrameDetectionSet) -> SessionResult<bool> {
        let hands = self.hands.borrow().clone();
        if !self.compiler.add_outcome(set, &hands) {
            return Ok(false);
        }

        let results = self.compiler.retrieve_results();
        self.results
            .send(results)
            .await
            .map_err(|_| SessionError::ResultsClosed)?;
        Ok(true)
    }
}
