//! Substitution on a worker task
//!
//! The producer sends prebuilt segments into a bounded channel; one task
//! drains it through a [`Substitution`] and owns the output buffer. A full
//! channel makes the producer wait.

use crate::substitute::Substitution;
use crate::{Error, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Bounded producer/consumer pair around a [`Substitution`]
#[derive(Debug)]
pub struct SubstitutionPipe {
    sender: mpsc::Sender<String>,
    worker: JoinHandle<Result<String>>,
}

impl SubstitutionPipe {
    /// Start the worker on the current tokio runtime
    ///
    /// `capacity` is the number of segments the channel buffers; zero is
    /// treated as one.
    #[must_use]
    pub fn spawn(mut substitution: Substitution, capacity: usize) -> Self {
        let (sender, mut receiver) = mpsc::channel::<String>(capacity.max(1));
        let worker = tokio::spawn(async move {
            let mut out = String::new();
            while let Some(segment) = receiver.recv().await {
                substitution.push(&segment, &mut out)?;
            }
            debug!(segments = substitution.segments(), "Substitution worker drained");
            Ok(out)
        });
        Self { sender, worker }
    }

    /// Queue one prebuilt segment
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Pipe`] once the worker has stopped; the reason
    /// is returned by [`SubstitutionPipe::finish`].
    pub async fn send(&self, segment: String) -> Result<()> {
        self.sender
            .send(segment)
            .await
            .map_err(|_| Error::Pipe("channel closed".to_string()))
    }

    /// Close the channel and wait for the substituted text
    ///
    /// # Errors
    ///
    /// Returns the worker's substitution error, or [`Error::Pipe`] when the
    /// task panicked or was cancelled.
    pub async fn finish(self) -> Result<String> {
        drop(self.sender);
        self.worker
            .await
            .map_err(|e| Error::Pipe(e.to_string()))?
    }
}

/// Substitute `segments` through a pipe of `capacity`
///
/// # Errors
///
/// See [`SubstitutionPipe::finish`].
pub async fn substitute_all<I>(
    substitution: Substitution,
    segments: I,
    capacity: usize,
) -> Result<String>
where
    I: IntoIterator<Item = String>,
{
    let pipe = SubstitutionPipe::spawn(substitution, capacity);
    for segment in segments {
        if pipe.send(segment).await.is_err() {
            break;
        }
    }
    pipe.finish().await
}
