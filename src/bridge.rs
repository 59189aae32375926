/// Persistence bridge between the working set and the shared store
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use futures::FutureExt;
use futures::future::LocalBoxFuture;
use log::{debug, error, info, warn};

use crate::record::Record;
use crate::store::{Store, Subscription};

/// Runs fire-and-forget futures on the context's event loop.
pub type Spawner = Rc<dyn Fn(LocalBoxFuture<'static, ()>)>;

/// The one key the content script and the popup both read and write.
pub const STORAGE_KEY: &str = "posts";

/// How many unacknowledged writes are remembered for echo suppression.
const ECHO_WINDOW: usize = 32;

/// The browser's microtask queue.
pub fn local_spawner() -> Spawner {
    Rc::new(|future: LocalBoxFuture<'static, ()>| wasm_bindgen_futures::spawn_local(future))
}

pub struct PersistenceBridge<S: Store> {
    store: S,
    key: String,
    spawner: Spawner,
    /// Values this bridge wrote whose change notification may still arrive.
    written: Rc<RefCell<VecDeque<Vec<Record>>>>,
}

impl<S: Store> PersistenceBridge<S> {
    pub fn new(store: S, key: impl Into<String>, spawner: Spawner) -> Self {
        PersistenceBridge {
            store,
            key: key.into(),
            spawner,
            written: Rc::new(RefCell::new(VecDeque::new())),
        }
    }

    /// Bridge over [`STORAGE_KEY`], shared by every extension context.
    pub fn shared(store: S, spawner: Spawner) -> Self {
        Self::new(store, STORAGE_KEY, spawner)
    }

    /// Current persisted set. Unset keys and read failures both yield an
    /// empty set.
    pub fn load(&self) -> LocalBoxFuture<'static, Vec<Record>> {
        let pending = self.store.load(&self.key);
        let key = self.key.clone();
        async move {
            match pending.await {
                Ok(Some(records)) => {
                    info!("loaded {} records from {}", records.len(), key);
                    records
                }
                Ok(None) => {
                    debug!("nothing stored under {}", key);
                    Vec::new()
                }
                Err(e) => {
                    warn!("starting with an empty set: {}", e);
                    Vec::new()
                }
            }
        }
        .boxed_local()
    }

    /// Write the full set without waiting for the store. Failures are logged
    /// and leave the caller's in-memory state alone.
    pub fn save(&self, records: &[Record]) {
        let snapshot = records.to_vec();
        {
            let mut written = self.written.borrow_mut();
            written.push_back(snapshot.clone());
            if written.len() > ECHO_WINDOW {
                written.pop_front();
            }
        }

        let pending = self.store.save(&self.key, snapshot);
        let key = self.key.clone();
        (self.spawner)(
            async move {
                if let Err(e) = pending.await {
                    error!("failed to persist {}: {}", key, e);
                }
            }
            .boxed_local(),
        );
    }

    /// Unconditionally persist the empty set.
    pub fn reset(&self) {
        info!("clearing {}", self.key);
        self.save(&[]);
    }

    /// Deliver the new set whenever another context changes it. Echoes of
    /// this bridge's own writes are swallowed.
    pub fn on_external_change(&self, callback: impl Fn(Vec<Record>) + 'static) -> Subscription {
        let written = self.written.clone();
        self.store.subscribe(
            &self.key,
            Box::new(move |records| {
                let echo = {
                    let mut written = written.borrow_mut();
                    match written.iter().position(|w| *w == records) {
                        Some(index) => {
                            written.drain(..=index);
                            true
                        }
                        None => false,
                    }
                };
                if echo {
                    debug!("ignoring echo of own write ({} records)", records.len());
                } else {
                    callback(records);
                }
            }),
        )
    }
}
