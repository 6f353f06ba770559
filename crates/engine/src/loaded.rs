use crossbeam_channel::{Receiver, Select, SendError, Sender, TryRecvError, TrySendError, bounded};
use tiles::TileRef;

/// Creates the bounded worker -> render thread handoff.
///
/// Dropping the returned `Sender<()>` releases any worker blocked on a full buffer.
pub(crate) fn loaded_buffer(capacity: usize) -> (LoadedSender, LoadedReceiver, Sender<()>) {
    assert!(
        capacity > 0,
        "loaded buffer capacity must be greater than zero"
    );
    let (record_sender, record_receiver) = bounded(capacity);
    let (shutdown_sender, shutdown_receiver) = bounded::<()>(0);
    (
        LoadedSender {
            records: record_sender,
            shutdown: shutdown_receiver,
        },
        LoadedReceiver {
            records: record_receiver,
        },
        shutdown_sender,
    )
}

#[derive(Clone)]
pub(crate) struct LoadedSender {
    records: Sender<TileRef>,
    shutdown: Receiver<()>,
}

impl LoadedSender {
    /// Hands `record` (and the caller's holder) to the render thread, blocking while
    /// the buffer is full. Returns the record if shutdown begins first.
    pub(crate) fn send(&self, record: TileRef) -> Result<(), TileRef> {
        let record = match self.records.try_send(record) {
            Ok(()) => return Ok(()),
            Err(TrySendError::Full(record)) => record,
            Err(TrySendError::Disconnected(record)) => return Err(record),
        };

        let mut select = Select::new();
        let send_index = select.send(&self.records);
        let shutdown_index = select.recv(&self.shutdown);
        let operation = select.select();
        let index = operation.index();
        if index == send_index {
            operation
                .send(&self.records, record)
                .map_err(|SendError(record)| record)
        } else if index == shutdown_index {
            let _ = operation.recv(&self.shutdown);
            Err(record)
        } else {
            panic!("loaded buffer select returned unknown operation {index}");
        }
    }
}

pub(crate) struct LoadedReceiver {
    records: Receiver<TileRef>,
}

impl LoadedReceiver {
    pub(crate) fn try_recv(&self) -> Option<TileRef> {
        match self.records.try_recv() {
            Ok(record) => Some(record),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }
}
