/// Observation → extraction → dedup → eviction → persistence
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use futures::{Stream, StreamExt};
use log::{debug, info, warn};

use crate::bridge::PersistenceBridge;
use crate::collection::{AppendOutcome, WorkingSet};
use crate::config::{CaptureMode, PipelineConfig};
use crate::extract::Extractor;
use crate::inject::{Injector, PendingControl, SaveOutcome};
use crate::locate::MatchRule;
use crate::node::PostNode;
use crate::observer::find_candidates;
use crate::record::Record;
use crate::store::{Store, Subscription};

/// Counters for one processed batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub candidates: usize,
    pub extracted: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub evicted: usize,
}

pub struct Pipeline<S: Store> {
    mode: CaptureMode,
    extractor: Extractor,
    injector: Injector,
    set: WorkingSet,
    bridge: PersistenceBridge<S>,
}

impl<S: Store> Pipeline<S> {
    pub fn new(config: &PipelineConfig, bridge: PersistenceBridge<S>) -> Self {
        Pipeline {
            mode: config.mode,
            extractor: Extractor::new(config.locators.clone()),
            injector: Injector::new(),
            set: WorkingSet::new(config.capacity),
            bridge,
        }
    }

    pub fn with_extractor(mut self, extractor: Extractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn mode(&self) -> CaptureMode {
        self.mode
    }

    pub fn records(&self) -> &[Record] {
        self.set.records()
    }

    pub fn bridge(&self) -> &PersistenceBridge<S> {
        &self.bridge
    }

    pub fn injector(&self) -> &Injector {
        &self.injector
    }

    pub fn candidate_signature(&self) -> &MatchRule {
        &self.extractor.locators().candidate
    }

    /// Seed the working set from persisted state.
    pub fn hydrate(&mut self, records: Vec<Record>) {
        let discarded = self.set.replace(records);
        info!("working set hydrated with {} records ({} discarded)", self.set.len(), discarded);
    }

    /// Adopt a set written by another context, wholesale.
    pub fn apply_external(&mut self, records: Vec<Record>) {
        self.set.replace(records);
        info!("working set replaced externally ({} records)", self.set.len());
    }

    /// Append and, when anything changed, commit the full set in the same step.
    pub fn ingest(&mut self, record: Record) -> AppendOutcome {
        let outcome = self.set.append(record);
        match &outcome {
            AppendOutcome::Inserted { evicted } => {
                if let Some(old) = evicted {
                    debug!("evicted oldest post by {}", old.author);
                }
                self.bridge.save(self.set.records());
            }
            AppendOutcome::Duplicate => debug!("duplicate post ignored"),
        }
        outcome
    }

    /// Handle one batch of candidates in order. In auto mode every
    /// extractable candidate is ingested; in manual mode the candidates that
    /// need a save control are returned instead.
    pub fn process_batch<N: PostNode>(&mut self, candidates: Vec<N>) -> (BatchReport, Vec<PendingControl<N>>) {
        let mut report = BatchReport {
            candidates: candidates.len(),
            ..BatchReport::default()
        };

        match self.mode {
            CaptureMode::Manual => {
                let pending = self.injector.scan(candidates, &self.extractor);
                report.extracted = pending.len();
                (report, pending)
            }
            CaptureMode::Auto => {
                for candidate in &candidates {
                    let Some(record) = self.extractor.extract(candidate) else {
                        continue;
                    };
                    report.extracted += 1;
                    match self.ingest(record) {
                        AppendOutcome::Inserted { evicted } => {
                            report.inserted += 1;
                            report.evicted += usize::from(evicted.is_some());
                        }
                        AppendOutcome::Duplicate => report.duplicates += 1,
                    }
                }
                (report, Vec::new())
            }
        }
    }

    /// The user pressed a save control.
    pub fn save_manual(&mut self, record: Record) -> SaveOutcome {
        match self.ingest(record) {
            AppendOutcome::Inserted { .. } => SaveOutcome::Saved,
            AppendOutcome::Duplicate => SaveOutcome::AlreadySaved,
        }
    }

    /// Clear the working set and the persisted copy.
    pub fn reset(&mut self) {
        self.set.reset();
        self.bridge.reset();
    }
}

/// Follow external changes, load persisted state, and scan what is already
/// in the document. Returns the change subscription (keep it alive) and any
/// controls the initial scan wants attached.
///
/// The subscription is in place before the load starts. A change heard while
/// the load is in flight is newer than whatever the load returns, so it wins.
pub async fn start<S, N>(pipeline: &Rc<RefCell<Pipeline<S>>>, root: &N) -> (Subscription, Vec<PendingControl<N>>)
where
    S: Store + 'static,
    N: PostNode,
{
    let loading = Rc::new(Cell::new(true));
    let heard_while_loading: Rc<RefCell<Option<Vec<Record>>>> = Rc::new(RefCell::new(None));

    let weak = Rc::downgrade(pipeline);
    let subscription = pipeline.borrow().bridge().on_external_change({
        let loading = loading.clone();
        let heard = heard_while_loading.clone();
        move |records| {
            if loading.get() {
                *heard.borrow_mut() = Some(records);
                return;
            }
            let Some(pipeline) = weak.upgrade() else {
                return;
            };
            match pipeline.try_borrow_mut() {
                Ok(mut pipeline) => pipeline.apply_external(records),
                Err(_) => warn!("pipeline busy; external change dropped"),
            };
        }
    });

    let pending_load = pipeline.borrow().bridge().load();
    let loaded = pending_load.await;
    loading.set(false);

    let records = match heard_while_loading.borrow_mut().take() {
        Some(newer) => {
            info!("stored set changed during load; using the newer copy");
            newer
        }
        None => loaded,
    };
    pipeline.borrow_mut().hydrate(records);

    let candidates = {
        let pipeline = pipeline.borrow();
        find_candidates(root, pipeline.candidate_signature())
    };
    let (report, pending) = pipeline.borrow_mut().process_batch(candidates);
    info!("initial scan: {:?}", report);

    (subscription, pending)
}

/// Drain the batch stream one batch at a time until it ends.
pub async fn run<S, N, B>(pipeline: Rc<RefCell<Pipeline<S>>>, mut batches: B, mut on_pending: impl FnMut(PendingControl<N>))
where
    S: Store,
    N: PostNode,
    B: Stream<Item = Vec<N>> + Unpin,
{
    while let Some(batch) = batches.next().await {
        let (report, pending) = pipeline.borrow_mut().process_batch(batch);
        debug!("batch processed: {:?}", report);
        for control in pending {
            on_pending(control);
        }
    }
    info!("batch stream ended");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Listener, MemoryStore, StoreError};
    use crate::test_support::{blocking_spawner, el, feed_post, fixed_time, record};
    use futures::executor::block_on;
    use futures::FutureExt;
    use futures::future::LocalBoxFuture;
    use futures::stream;

    fn pipeline(store: &MemoryStore, capacity: usize, mode: CaptureMode) -> Pipeline<MemoryStore> {
        let config = PipelineConfig {
            capacity,
            mode,
            ..PipelineConfig::default()
        };
        let bridge = PersistenceBridge::new(store.clone(), "posts", blocking_spawner());
        Pipeline::new(&config, bridge).with_extractor(Extractor::default().with_clock(fixed_time))
    }

    #[test]
    fn test_auto_batch_persists_after_every_append() {
        let store = MemoryStore::new();
        let mut pipeline = pipeline(&store, 100, CaptureMode::Auto);

        let (report, pending) = pipeline.process_batch(vec![feed_post("Jane", "Hello world"), feed_post("John", "Hi")]);

        assert!(pending.is_empty());
        assert_eq!(report.inserted, 2);
        assert_eq!(store.peek("posts").unwrap(), pipeline.records().to_vec());
    }

    #[test]
    fn test_reinserted_post_is_not_stored_twice() {
        let store = MemoryStore::new();
        let mut pipeline = pipeline(&store, 100, CaptureMode::Auto);
        pipeline.process_batch(vec![feed_post("Jane", "Hello world")]);

        let (report, _) = pipeline.process_batch(vec![feed_post("Jane", "Hello world")]);

        assert_eq!(report.duplicates, 1);
        assert_eq!(pipeline.records().len(), 1);
    }

    #[test]
    fn test_unextractable_candidate_does_not_stop_batch() {
        let store = MemoryStore::new();
        let mut pipeline = pipeline(&store, 100, CaptureMode::Auto);
        let author_only = el("div")
            .with_attr("role", "article")
            .child(el("h3").child(el("a").with_text("Jane")));

        let (report, _) = pipeline.process_batch(vec![author_only, feed_post("John", "Hi")]);

        assert_eq!(report.candidates, 2);
        assert_eq!(report.extracted, 1);
        assert_eq!(pipeline.records()[0].author, "John");
    }

    #[test]
    fn test_eviction_is_persisted() {
        let store = MemoryStore::new();
        let mut pipeline = pipeline(&store, 2, CaptureMode::Auto);

        let (report, _) = pipeline.process_batch(vec![
            feed_post("A", "one"),
            feed_post("B", "two"),
            feed_post("C", "three"),
        ]);

        assert_eq!(report.evicted, 1);
        let persisted: Vec<String> = store.peek("posts").unwrap().into_iter().map(|r| r.author).collect();
        assert_eq!(persisted, vec!["B", "C"]);
    }

    #[test]
    fn test_manual_mode_returns_controls_and_saves_on_demand() {
        let store = MemoryStore::new();
        let mut pipeline = pipeline(&store, 100, CaptureMode::Manual);

        let (report, pending) = pipeline.process_batch(vec![feed_post("Jane", "Hello world")]);

        assert_eq!(report.extracted, 1);
        assert_eq!(pending.len(), 1);
        assert!(pipeline.records().is_empty());
        assert_eq!(store.peek("posts"), None);

        let record = pending[0].record.clone();
        assert_eq!(pipeline.save_manual(record.clone()), SaveOutcome::Saved);
        assert_eq!(pipeline.save_manual(record), SaveOutcome::AlreadySaved);
        assert_eq!(store.peek("posts").unwrap().len(), 1);
    }

    #[test]
    fn test_duplicate_manual_save_matches_existing_entry() {
        let store = MemoryStore::new();
        let mut pipeline = pipeline(&store, 100, CaptureMode::Manual);
        pipeline.hydrate(vec![record("Hello world", "Jane")]);

        let outcome = pipeline.save_manual(record("Hello world", "Jane"));

        assert_eq!(outcome, SaveOutcome::AlreadySaved);
        assert_eq!(pipeline.records().len(), 1);
    }

    #[test]
    fn test_failed_save_keeps_memory_state() {
        let store = MemoryStore::new();
        store.set_read_only(true);
        let mut pipeline = pipeline(&store, 100, CaptureMode::Auto);

        pipeline.process_batch(vec![feed_post("Jane", "Hello world")]);

        assert_eq!(pipeline.records().len(), 1);
        assert_eq!(store.peek("posts"), None);
    }

    #[test]
    fn test_reset_clears_memory_and_store() {
        let store = MemoryStore::new();
        let mut pipeline = pipeline(&store, 100, CaptureMode::Auto);
        pipeline.process_batch(vec![feed_post("Jane", "Hello world")]);

        pipeline.reset();

        assert!(pipeline.records().is_empty());
        assert_eq!(store.peek("posts"), Some(vec![]));
    }

    #[test]
    fn test_start_hydrates_and_scans_existing_document() {
        let store = MemoryStore::new();
        block_on(store.save("posts", vec![record("Earlier post", "Jane")])).unwrap();
        let pipeline = Rc::new(RefCell::new(pipeline(&store, 100, CaptureMode::Auto)));
        let document = el("body").child(el("div").with_attr("role", "feed").child(feed_post("John", "Hi")));

        let (_subscription, pending) = block_on(start(&pipeline, &document));

        assert!(pending.is_empty());
        let authors: Vec<String> = pipeline.borrow().records().iter().map(|r| r.author.clone()).collect();
        assert_eq!(authors, vec!["Jane", "John"]);
    }

    #[test]
    fn test_external_clear_replaces_working_set() {
        let store = MemoryStore::new();
        let popup = PersistenceBridge::new(store.context(), "posts", blocking_spawner());
        let pipeline = Rc::new(RefCell::new(pipeline(&store, 100, CaptureMode::Auto)));
        let (_subscription, _) = block_on(start(&pipeline, &feed_post("Jane", "Hello world")));
        assert_eq!(pipeline.borrow().records().len(), 1);

        popup.reset();

        assert!(pipeline.borrow().records().is_empty());
        pipeline.borrow_mut().process_batch(vec![feed_post("John", "Hi")]);
        assert_eq!(store.peek("posts").unwrap().len(), 1);
    }

    /// Another context clears the store after the read has been taken but
    /// before it resolves.
    struct ClearedDuringLoad {
        content: MemoryStore,
        popup: MemoryStore,
    }

    impl Store for ClearedDuringLoad {
        fn load(&self, key: &str) -> LocalBoxFuture<'static, Result<Option<Vec<Record>>, StoreError>> {
            let stale = self.content.load(key);
            self.popup.save(key, Vec::new()).now_or_never().unwrap().unwrap();
            stale
        }

        fn save(&self, key: &str, records: Vec<Record>) -> LocalBoxFuture<'static, Result<(), StoreError>> {
            self.content.save(key, records)
        }

        fn subscribe(&self, key: &str, listener: Listener) -> Subscription {
            self.content.subscribe(key, listener)
        }
    }

    #[test]
    fn test_clear_during_load_is_not_undone() {
        let store = MemoryStore::new();
        block_on(store.save("posts", vec![record("Earlier post", "Jane")])).unwrap();
        let racing = ClearedDuringLoad {
            content: store.clone(),
            popup: store.context(),
        };
        let bridge = PersistenceBridge::new(racing, "posts", blocking_spawner());
        let pipeline = Rc::new(RefCell::new(
            Pipeline::new(&PipelineConfig::default(), bridge).with_extractor(Extractor::default().with_clock(fixed_time)),
        ));

        let (_subscription, _) = block_on(start(&pipeline, &el("body")));
        assert!(pipeline.borrow().records().is_empty());

        pipeline.borrow_mut().process_batch(vec![feed_post("John", "Hi")]);

        let persisted: Vec<String> = store.peek("posts").unwrap().into_iter().map(|r| r.author).collect();
        assert_eq!(persisted, vec!["John"]);
    }

    #[test]
    fn test_run_processes_batches_in_order_until_stream_ends() {
        let store = MemoryStore::new();
        let pipeline = Rc::new(RefCell::new(pipeline(&store, 100, CaptureMode::Auto)));
        let batches = stream::iter(vec![
            vec![feed_post("A", "one"), feed_post("B", "two")],
            vec![],
            vec![feed_post("C", "three"), feed_post("A", "one")],
        ]);

        block_on(run(pipeline.clone(), batches, |_: PendingControl<_>| {}));

        let authors: Vec<String> = pipeline.borrow().records().iter().map(|r| r.author.clone()).collect();
        assert_eq!(authors, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_manual_rescan_yields_no_new_controls() {
        let store = MemoryStore::new();
        let pipeline = Rc::new(RefCell::new(pipeline(&store, 100, CaptureMode::Manual)));
        let post = feed_post("Jane", "Hello world");
        let mut attached = Vec::new();

        block_on(run(
            pipeline.clone(),
            stream::iter(vec![vec![post.clone()], vec![post.clone()]]),
            |control| attached.push(control),
        ));

        assert_eq!(attached.len(), 1);
        assert_eq!(attached[0].node, post);
    }
}
