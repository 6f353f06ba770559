use std::sync::Arc;
use std::thread::{self, JoinHandle};

use protocol::TileFetcher;
use tiles::{LoadQueue, ReleaseBuffer, TileRef, TileState};
use tracing::{debug, error, trace, warn};

use crate::EngineError;
use crate::loaded::LoadedSender;

pub(crate) struct WorkerContext {
    pub(crate) queue: Arc<LoadQueue>,
    pub(crate) releases: Arc<ReleaseBuffer>,
    pub(crate) fetcher: Arc<dyn TileFetcher>,
    pub(crate) loaded: LoadedSender,
}

/// Fixed set of fetch threads draining the load queue.
pub(crate) struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub(crate) fn spawn(count: usize, context: WorkerContext) -> Result<Self, EngineError> {
        assert!(count > 0, "worker count must be greater than zero");
        let context = Arc::new(context);
        let mut handles = Vec::with_capacity(count);
        for index in 0..count {
            let worker_context = Arc::clone(&context);
            let spawned = thread::Builder::new()
                .name(format!("tile-worker-{index}"))
                .spawn(move || run_worker(index, &worker_context));
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(source) => {
                    let mut pool = Self { handles };
                    context.queue.close();
                    pool.join();
                    return Err(EngineError::SpawnWorker(source));
                }
            }
        }
        Ok(Self { handles })
    }

    pub(crate) fn len(&self) -> usize {
        self.handles.len()
    }

    /// Joins every worker. The load queue must already be closed.
    pub(crate) fn join(&mut self) {
        for handle in self.handles.drain(..) {
            let name = handle.thread().name().unwrap_or("tile-worker").to_string();
            handle
                .join()
                .unwrap_or_else(|err| error!(worker = %name, "tile worker panicked: {:?}", err));
        }
    }
}

fn run_worker(index: usize, context: &WorkerContext) {
    debug!(worker = index, "tile worker started");
    while let Some(record) = context.queue.pop_blocking() {
        load_tile(context, record);
        context.queue.complete();
    }
    debug!(worker = index, "tile worker stopped");
}

/// `record` arrives carrying the load queue's holder, which this function
/// either forwards to the loaded buffer or releases.
fn load_tile(context: &WorkerContext, record: TileRef) {
    let key = record.key();
    if record.is_sole_holder() {
        trace!(tile = %key, "skipping fetch of orphaned tile");
        context.releases.release(record);
        return;
    }

    record.set_state(TileState::Loading);
    match context.fetcher.fetch(key) {
        Ok(image) => {
            if record.is_sole_holder() {
                debug!(tile = %key, "discarding payload of tile released during fetch");
                drop(image);
                context.releases.release(record);
                return;
            }
            record.attach_payload(image);
            record.set_state(TileState::Loaded);
            if let Err(record) = context.loaded.send(record) {
                trace!(tile = %key, "loaded buffer closed, dropping fetched tile");
                context.releases.release(record);
            }
        }
        Err(error) => {
            warn!(tile = %key, %error, "tile fetch failed");
            record.set_state(TileState::Failed);
            context.releases.release(record);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use protocol::{FetchError, RawImage, TileKey};
    use tiles::TileRecord;

    use super::*;
    use crate::loaded::loaded_buffer;

    struct SolidFetcher;

    impl TileFetcher for SolidFetcher {
        fn fetch(&self, _key: TileKey) -> Result<RawImage, FetchError> {
            RawImage::new(1, 1, vec![0, 0, 0, 255])
        }
    }

    #[test]
    fn pool_delivers_fetched_tiles_and_joins_after_close() {
        let queue = Arc::new(LoadQueue::new());
        let releases = Arc::new(ReleaseBuffer::new());
        let (sender, receiver, _shutdown) = loaded_buffer(4);
        let mut pool = WorkerPool::spawn(
            2,
            WorkerContext {
                queue: Arc::clone(&queue),
                releases: Arc::clone(&releases),
                fetcher: Arc::new(SolidFetcher),
                loaded: sender,
            },
        )
        .expect("spawn workers");
        assert_eq!(pool.len(), 2);

        let wanted = TileRecord::new(TileKey::new(2, 1, 1));
        queue.enqueue_front(&wanted).expect("enqueue");
        let deadline = Instant::now() + Duration::from_secs(5);
        let delivered = loop {
            if let Some(record) = receiver.try_recv() {
                break record;
            }
            assert!(Instant::now() < deadline, "worker never delivered the tile");
            thread::sleep(Duration::from_millis(1));
        };
        assert_eq!(delivered.key(), wanted.key());
        assert_eq!(delivered.state(), TileState::Loaded);
        assert!(delivered.take_payload().is_some());

        queue.close();
        pool.join();
        assert_eq!(pool.len(), 0);
        assert!(!releases.release(delivered));
        assert_eq!(wanted.holders(), 1);
        assert!(releases.is_drained());
    }
}
