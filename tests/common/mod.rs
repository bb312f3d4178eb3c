#![allow(dead_code)]

pub mod temp_files {
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Write `content` to a temporary file with extension `ext`; removed on drop.
    pub fn create_temp_routes(content: &str, ext: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new()
            .prefix("brrtnav_test_")
            .suffix(&format!(".{ext}"))
            .tempfile()
            .unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    pub fn create_temp_yaml(content: &str) -> NamedTempFile {
        create_temp_routes(content, "yaml")
    }

    pub fn create_temp_json(content: &str) -> NamedTempFile {
        create_temp_routes(content, "json")
    }
}

pub mod history {
    use brrtnav::navigation::{HistoryEntry, HistorySink, HistoryUpdate};
    use brrtnav::signal::Subscription;
    use std::sync::{Arc, Mutex};

    /// A sink without traversal support that records every write.
    #[derive(Clone)]
    pub struct RecordingHistory {
        current: Arc<Mutex<HistoryEntry>>,
        writes: Arc<Mutex<Vec<HistoryUpdate>>>,
    }

    impl RecordingHistory {
        pub fn new(initial: &str) -> Self {
            Self {
                current: Arc::new(Mutex::new(HistoryEntry::new(initial))),
                writes: Arc::default(),
            }
        }

        pub fn writes(&self) -> Vec<HistoryUpdate> {
            self.writes.lock().unwrap().clone()
        }

        pub fn values(&self) -> Vec<String> {
            self.writes().into_iter().map(|w| w.value).collect()
        }
    }

    impl HistorySink for RecordingHistory {
        fn get(&self) -> HistoryEntry {
            self.current.lock().unwrap().clone()
        }

        fn set(&self, update: HistoryUpdate) {
            *self.current.lock().unwrap() = HistoryEntry {
                value: update.value.clone(),
                state: update.state.clone(),
                depth: None,
            };
            self.writes.lock().unwrap().push(update);
        }

        fn subscribe(&self, _listener: Box<dyn Fn(HistoryEntry) + Send + Sync>) -> Subscription {
            Subscription::noop()
        }
    }
}

pub mod fixtures {
    use brrtnav::cache::DataCache;
    use brrtnav::clock::MockClock;
    use brrtnav::definition::RouteDefinition;
    use brrtnav::loader::{loader, ready, Loader};
    use brrtnav::navigation::{HistorySink, Navigator, NavigatorOptions};
    use brrtnav::runtime_config::CacheConfig;
    use brrtnav::{ExecutionMode, Intent, Router};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// A client cache on a mock clock, isolated from the process-wide cache.
    pub fn test_cache() -> (DataCache, MockClock) {
        let clock = MockClock::new();
        let cache = DataCache::new(
            ExecutionMode::Client,
            CacheConfig::default(),
            Arc::new(clock.clone()),
        );
        (cache, clock)
    }

    pub fn navigator_with(
        routes: &[RouteDefinition],
        sink: Arc<dyn HistorySink>,
        base: &str,
    ) -> Navigator {
        let (cache, _clock) = test_cache();
        Navigator::new(
            Arc::new(Router::new(routes, base)),
            sink,
            NavigatorOptions {
                base: base.to_string(),
                cache: Some(cache),
                ..NavigatorOptions::default()
            },
        )
        .unwrap()
    }

    pub fn navigator(routes: &[RouteDefinition], sink: Arc<dyn HistorySink>) -> Navigator {
        navigator_with(routes, sink, "")
    }

    /// Loader calls observed by [`recording_loader`].
    #[derive(Clone, Default)]
    pub struct LoadLog {
        calls: Arc<Mutex<Vec<(String, Intent)>>>,
        count: Arc<AtomicUsize>,
    }

    impl LoadLog {
        pub fn count(&self) -> usize {
            self.count.load(Ordering::SeqCst)
        }

        pub fn calls(&self) -> Vec<(String, Intent)> {
            self.calls.lock().unwrap().clone()
        }
    }

    /// A loader resolving to `{ "name": name, "params": params }` that logs each call.
    pub fn recording_loader(name: &'static str, log: &LoadLog) -> Loader {
        let log = log.clone();
        loader(move |args| {
            log.count.fetch_add(1, Ordering::SeqCst);
            log.calls
                .lock()
                .unwrap()
                .push((args.location.pathname.clone(), args.intent));
            ready(Some(json!({ "name": name, "params": args.params })))
        })
    }
}
