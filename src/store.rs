/// Asynchronous key-value stores holding the serialized working set
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use futures::FutureExt;
use futures::future::{self, LocalBoxFuture};
use log::warn;
use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::record::Record;

// Import JS bridge functions
#[wasm_bindgen(module = "/extension.js")]
extern "C" {
    #[wasm_bindgen(catch)]
    async fn getStorage(key: &str) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn setStorage(key: &str, value: JsValue) -> Result<(), JsValue>;

    fn onStorageChanged(key: &str, callback: &Closure<dyn Fn(JsValue)>) -> js_sys::Function;

    fn hasChromeStorage() -> bool;
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("storage is unavailable in this context")]
    Unavailable,
    #[error("failed to read {key}: {message}")]
    Read { key: String, message: String },
    #[error("failed to write {key}: {message}")]
    Write { key: String, message: String },
    #[error("stored value under {key} is malformed: {message}")]
    Decode { key: String, message: String },
    #[error("failed to encode records: {0}")]
    Encode(String),
}

pub type Listener = Box<dyn Fn(Vec<Record>)>;

/// Handle for a change subscription; dropping it unsubscribes.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + 'static) -> Self {
        Subscription {
            cancel: Some(Box::new(cancel)),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

/// A key-value namespace shared between execution contexts.
///
/// `load` yields `Ok(None)` for an unset key. Listeners only hear about
/// writes made from other contexts where the backend can tell them apart.
pub trait Store {
    fn load(&self, key: &str) -> LocalBoxFuture<'static, Result<Option<Vec<Record>>, StoreError>>;

    fn save(&self, key: &str, records: Vec<Record>) -> LocalBoxFuture<'static, Result<(), StoreError>>;

    fn subscribe(&self, key: &str, listener: Listener) -> Subscription;
}

impl<T: Store + ?Sized> Store for Rc<T> {
    fn load(&self, key: &str) -> LocalBoxFuture<'static, Result<Option<Vec<Record>>, StoreError>> {
        (**self).load(key)
    }

    fn save(&self, key: &str, records: Vec<Record>) -> LocalBoxFuture<'static, Result<(), StoreError>> {
        (**self).save(key, records)
    }

    fn subscribe(&self, key: &str, listener: Listener) -> Subscription {
        (**self).subscribe(key, listener)
    }
}

struct Entry {
    id: u64,
    context: u64,
    key: String,
    listener: Rc<dyn Fn(Vec<Record>)>,
}

#[derive(Default)]
struct Backing {
    values: HashMap<String, Vec<Record>>,
    listeners: Vec<Entry>,
    next_listener: u64,
    next_context: u64,
    read_only: bool,
}

/// In-process store. Handles created with [`MemoryStore::context`] share the
/// same values but act as separate execution contexts for notifications.
#[derive(Clone)]
pub struct MemoryStore {
    backing: Rc<RefCell<Backing>>,
    context: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            backing: Rc::new(RefCell::new(Backing::default())),
            context: 0,
        }
    }

    /// A handle on the same values, acting as another execution context.
    pub fn context(&self) -> MemoryStore {
        let mut backing = self.backing.borrow_mut();
        backing.next_context += 1;
        MemoryStore {
            backing: self.backing.clone(),
            context: backing.next_context,
        }
    }

    /// Reject every write until switched back.
    pub fn set_read_only(&self, read_only: bool) {
        self.backing.borrow_mut().read_only = read_only;
    }

    pub fn peek(&self, key: &str) -> Option<Vec<Record>> {
        self.backing.borrow().values.get(key).cloned()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for MemoryStore {
    fn load(&self, key: &str) -> LocalBoxFuture<'static, Result<Option<Vec<Record>>, StoreError>> {
        future::ready(Ok(self.peek(key))).boxed_local()
    }

    fn save(&self, key: &str, records: Vec<Record>) -> LocalBoxFuture<'static, Result<(), StoreError>> {
        let listeners: Vec<Rc<dyn Fn(Vec<Record>)>> = {
            let mut backing = self.backing.borrow_mut();
            if backing.read_only {
                return future::ready(Err(StoreError::Write {
                    key: key.to_string(),
                    message: "store is read-only".to_string(),
                }))
                .boxed_local();
            }
            backing.values.insert(key.to_string(), records.clone());
            backing
                .listeners
                .iter()
                .filter(|e| e.key == key && e.context != self.context)
                .map(|e| e.listener.clone())
                .collect()
        };

        for listener in listeners {
            listener(records.clone());
        }

        future::ready(Ok(())).boxed_local()
    }

    fn subscribe(&self, key: &str, listener: Listener) -> Subscription {
        let id = {
            let mut backing = self.backing.borrow_mut();
            backing.next_listener += 1;
            let id = backing.next_listener;
            backing.listeners.push(Entry {
                id,
                context: self.context,
                key: key.to_string(),
                listener: Rc::from(listener),
            });
            id
        };

        let backing = Rc::downgrade(&self.backing);
        Subscription::new(move || {
            if let Some(backing) = backing.upgrade() {
                backing.borrow_mut().listeners.retain(|e| e.id != id);
            }
        })
    }
}

/// `chrome.storage.local`, reached through the extension's JS bridge
#[derive(Debug, Clone)]
pub struct ChromeStore {
    _private: (),
}

impl ChromeStore {
    pub fn new() -> Result<Self, StoreError> {
        if hasChromeStorage() {
            Ok(ChromeStore { _private: () })
        } else {
            Err(StoreError::Unavailable)
        }
    }
}

/// Falls back to an in-memory store when `chrome.storage` is missing, so the
/// page keeps working outside the extension.
pub fn open_store() -> Rc<dyn Store> {
    match ChromeStore::new() {
        Ok(store) => Rc::new(store),
        Err(e) => {
            warn!("{}; records will not outlive this page", e);
            Rc::new(MemoryStore::new())
        }
    }
}

fn decode(key: &str, value: JsValue) -> Result<Option<Vec<Record>>, StoreError> {
    if value.is_null() || value.is_undefined() {
        return Ok(None);
    }
    let entries: Vec<serde_json::Value> = serde_wasm_bindgen::from_value(value).map_err(|e| StoreError::Decode {
        key: key.to_string(),
        message: e.to_string(),
    })?;
    Ok(Some(decode_entries(key, entries)))
}

/// A malformed entry is logged and skipped; it never costs the rest of the set.
fn decode_entries(key: &str, entries: Vec<serde_json::Value>) -> Vec<Record> {
    entries
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| match serde_json::from_value::<Record>(entry) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("dropping malformed entry {} under {}: {}", index, key, e);
                None
            }
        })
        .collect()
}

fn js_message(value: &JsValue) -> String {
    value.as_string().unwrap_or_else(|| format!("{:?}", value))
}

impl Store for ChromeStore {
    fn load(&self, key: &str) -> LocalBoxFuture<'static, Result<Option<Vec<Record>>, StoreError>> {
        let key = key.to_string();
        async move {
            let value = getStorage(&key).await.map_err(|e| StoreError::Read {
                key: key.clone(),
                message: js_message(&e),
            })?;
            decode(&key, value)
        }
        .boxed_local()
    }

    fn save(&self, key: &str, records: Vec<Record>) -> LocalBoxFuture<'static, Result<(), StoreError>> {
        let key = key.to_string();
        let serializer = serde_wasm_bindgen::Serializer::json_compatible();
        let value = records.serialize(&serializer);
        async move {
            let value = value.map_err(|e| StoreError::Encode(e.to_string()))?;
            setStorage(&key, value).await.map_err(|e| StoreError::Write {
                key: key.clone(),
                message: js_message(&e),
            })
        }
        .boxed_local()
    }

    fn subscribe(&self, key: &str, listener: Listener) -> Subscription {
        let owned_key = key.to_string();
        let callback = Closure::<dyn Fn(JsValue)>::new(move |value: JsValue| {
            match decode(&owned_key, value) {
                Ok(records) => listener(records.unwrap_or_default()),
                Err(e) => warn!("ignoring storage change: {}", e),
            }
        });
        let unsubscribe = onStorageChanged(key, &callback);

        Subscription::new(move || {
            if let Err(e) = unsubscribe.call0(&JsValue::NULL) {
                warn!("failed to remove storage listener: {}", js_message(&e));
            }
            drop(callback);
        })
    }
}
