/// Candidate discovery and the stream of inserted-subtree batches
use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use log::{debug, info};
use std::cell::Cell;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{Element, MutationObserver, MutationObserverInit, MutationRecord};

use crate::locate::MatchRule;
use crate::node::PostNode;

/// Ordered, non-restartable sequence of candidate batches.
pub type BatchStream<N> = UnboundedReceiver<Vec<N>>;

/// Candidates at or below `root`, in document order.
pub fn find_candidates<N: PostNode>(root: &N, signature: &MatchRule) -> Vec<N> {
    signature.find_all(root)
}

/// Candidates across a batch of inserted subtrees, in insertion order. A node
/// reachable from several inserted roots is reported once.
pub fn collect_batch<N: PostNode>(roots: impl IntoIterator<Item = N>, signature: &MatchRule) -> Vec<N> {
    let mut batch: Vec<N> = Vec::new();
    for root in roots {
        for candidate in find_candidates(&root, signature) {
            if !batch.contains(&candidate) {
                batch.push(candidate);
            }
        }
    }
    batch
}

/// Watches a document subtree for insertions and feeds candidate batches
/// into a [`BatchStream`].
pub struct DomObserver {
    observer: MutationObserver,
    sender: UnboundedSender<Vec<Element>>,
    connected: Cell<bool>,
    _callback: Closure<dyn FnMut(js_sys::Array, MutationObserver)>,
}

impl DomObserver {
    pub fn observe(root: &Element, signature: MatchRule) -> Result<(DomObserver, BatchStream<Element>), JsValue> {
        let (sender, receiver) = mpsc::unbounded();

        let batches = sender.clone();
        let callback = Closure::<dyn FnMut(js_sys::Array, MutationObserver)>::new(
            move |mutations: js_sys::Array, _observer: MutationObserver| {
                let inserted: Vec<Element> = mutations
                    .iter()
                    .filter_map(|m| m.dyn_into::<MutationRecord>().ok())
                    .flat_map(|record| {
                        let nodes = record.added_nodes();
                        (0..nodes.length())
                            .filter_map(|i| nodes.item(i))
                            .collect::<Vec<_>>()
                    })
                    .filter_map(|node| node.dyn_into::<Element>().ok())
                    .collect();

                let batch = collect_batch(inserted, &signature);
                if batch.is_empty() {
                    return;
                }
                debug!("{} new candidates", batch.len());
                if batches.unbounded_send(batch).is_err() {
                    debug!("batch stream closed; dropping notification");
                }
            },
        );

        let observer = MutationObserver::new(callback.as_ref().unchecked_ref())?;
        let options = MutationObserverInit::new();
        options.set_child_list(true);
        options.set_subtree(true);
        observer.observe_with_options(root, &options)?;
        info!("observing document for new posts");

        Ok((
            DomObserver {
                observer,
                sender,
                connected: Cell::new(true),
                _callback: callback,
            },
            receiver,
        ))
    }

    /// Stop notifications and end the stream. Safe to call more than once.
    pub fn disconnect(&self) {
        if !self.connected.replace(false) {
            return;
        }
        self.observer.disconnect();
        self.sender.close_channel();
        info!("observer disconnected");
    }
}
