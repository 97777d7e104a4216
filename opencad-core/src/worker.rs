//! Off-thread model decoding.
//!
//! Large files take long enough to decode that a UI thread should not do
//! it. `spawn_load` moves the bytes onto a worker thread and hands the
//! finished scene back through a one-shot channel; nothing is shared
//! between the two sides while the parse runs.

use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use tracing::debug;

use crate::error::{Error, Result};
use crate::format::{ModelFormat, ModelSource};
use crate::scene::Scene;

/// Identifies one load request issued by a [`crate::ViewerSession`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LoadTicket(pub(crate) u64);

/// A decoded scene together with the bytes it came from
#[derive(Debug, Clone)]
pub struct LoadedModel {
    pub source: ModelSource,
    pub scene: Scene,
}

impl LoadedModel {
    /// Decode synchronously.
    pub fn decode(source: ModelSource) -> Result<Self> {
        let scene = source.decode()?;
        Ok(Self { source, scene })
    }
}

/// A decode running on a worker thread
#[derive(Debug)]
pub struct PendingLoad {
    ticket: LoadTicket,
    format: ModelFormat,
    receiver: Receiver<Result<LoadedModel>>,
}

impl PendingLoad {
    pub fn ticket(&self) -> LoadTicket {
        self.ticket
    }

    /// Result if the worker is done, without blocking.
    pub fn try_take(&self) -> Option<Result<LoadedModel>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(self.worker_lost())),
        }
    }

    /// Block until the worker finishes.
    pub fn wait(self) -> Result<LoadedModel> {
        self.receiver.recv().unwrap_or_else(|_| Err(self.worker_lost()))
    }

    fn worker_lost(&self) -> Error {
        let reason = "decoder thread exited without a result".to_string();
        match self.format {
            ModelFormat::Stl => Error::MalformedStl(reason),
            ModelFormat::Obj => Error::MalformedObj(reason),
        }
    }
}

/// Decode `source` on a new thread.
pub fn spawn_load(ticket: LoadTicket, source: ModelSource) -> PendingLoad {
    let (sender, receiver) = mpsc::sync_channel(1);
    let format = source.format;

    thread::spawn(move || {
        debug!(ticket = ticket.0, name = %source.name, "Decoding on worker thread");
        // The receiver may already be gone if the caller gave up
        let _ = sender.send(LoadedModel::decode(source));
    });

    PendingLoad {
        ticket,
        format,
        receiver,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_background_decode() {
        let source = ModelSource::new(
            b"o Tri\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n".to_vec(),
            ModelFormat::Obj,
            "tri.obj",
        );
        let pending = spawn_load(LoadTicket(7), source.clone());
        assert_eq!(pending.ticket(), LoadTicket(7));

        let loaded = pending.wait().unwrap();
        assert_eq!(loaded.source, source);
        assert_eq!(loaded.scene.hierarchy(), vec!["Tri".to_string()]);
    }

    #[test]
    fn test_try_take_polls_until_done() {
        let source = ModelSource::new(
            b"v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n".to_vec(),
            ModelFormat::Obj,
            "tri.obj",
        );
        let pending = spawn_load(LoadTicket(3), source);
        let result = loop {
            if let Some(result) = pending.try_take() {
                break result;
            }
            thread::yield_now();
        };
        assert_eq!(result.unwrap().scene.triangle_count(), 1);
    }

    #[test]
    fn test_background_failure_is_reported() {
        let source = ModelSource::new(vec![0u8; 10], ModelFormat::Stl, "short.stl");
        let result = spawn_load(LoadTicket(1), source).wait();
        assert!(matches!(result, Err(Error::MalformedStl(_))));
    }
}
