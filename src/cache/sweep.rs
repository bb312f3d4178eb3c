use super::core::DataCache;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use tracing::{debug, info};

/// Background thread evicting expired cache entries.
///
/// Runs [`DataCache::sweep`] every `sweep_interval` until dropped. Server-side caches
/// live for a single request and get no sweeper.
pub struct CacheSweeper {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl CacheSweeper {
    /// Start sweeping `cache`. Returns `Ok(None)` for server-side caches.
    pub fn start(cache: DataCache) -> std::io::Result<Option<Self>> {
        if cache.mode().is_server() {
            debug!("Server execution, cache sweeper not started");
            return Ok(None);
        }
        let interval = cache.config().sweep_interval;
        let (stop, rx) = mpsc::channel::<()>();
        let handle = thread::Builder::new()
            .name("brrtnav-cache-sweep".into())
            .spawn(move || loop {
                match rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        let removed = cache.sweep(cache.now());
                        debug!(removed, remaining = cache.len(), "Cache sweep tick");
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })?;
        info!(interval_ms = interval.as_millis() as u64, "Cache sweeper started");
        Ok(Some(Self {
            stop: Some(stop),
            handle: Some(handle),
        }))
    }
}

impl Drop for CacheSweeper {
    fn drop(&mut self) {
        self.stop.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
