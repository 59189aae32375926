/// Content-script host: wires the pipeline to the live page
use std::cell::RefCell;
use std::rc::Rc;

use log::{info, warn};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::{Document, Element, HtmlButtonElement};

use crate::bridge::{PersistenceBridge, local_spawner};
use crate::config::PipelineConfig;
use crate::extract::Extractor;
use crate::inject::PendingControl;
use crate::observer::DomObserver;
use crate::pipeline::{self, Pipeline};
use crate::store::{Store, open_store};

type SharedPipeline = Rc<RefCell<Pipeline<Rc<dyn Store>>>>;

const CONTROL_STYLE: &str = "margin: 8px 12px; padding: 6px 12px; border: none; border-radius: 4px; \
     background-color: #5B4FE8; color: white; font-size: 13px; font-weight: 500; cursor: pointer;";

pub fn start(config: PipelineConfig) -> Result<(), JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let document = window.document().ok_or_else(|| JsValue::from_str("no document"))?;
    let root: Element = match document.body() {
        Some(body) => body.into(),
        None => document
            .document_element()
            .ok_or_else(|| JsValue::from_str("empty document"))?,
    };

    let bridge = PersistenceBridge::shared(open_store(), local_spawner());
    let mut extractor = Extractor::new(config.locators.clone());
    if let Ok(href) = window.location().href() {
        extractor = extractor.with_page_url(href);
    }
    let pipeline: SharedPipeline = Rc::new(RefCell::new(Pipeline::new(&config, bridge).with_extractor(extractor)));
    info!("PostList content script starting in {:?} mode", pipeline.borrow().mode());

    let signature = pipeline.borrow().candidate_signature().clone();
    let (observer, batches) = DomObserver::observe(&root, signature)?;
    let observer = Rc::new(observer);

    let on_page_hide = {
        let observer = observer.clone();
        Closure::<dyn FnMut()>::new(move || observer.disconnect())
    };
    window.add_event_listener_with_callback("pagehide", on_page_hide.as_ref().unchecked_ref())?;
    on_page_hide.forget();

    spawn_local(async move {
        let (subscription, pending) = pipeline::start(&pipeline, &root).await;
        for control in pending {
            attach_control(&document, &pipeline, control);
        }

        let host = pipeline.clone();
        pipeline::run(pipeline, batches, |control| attach_control(&document, &host, control)).await;

        drop(subscription);
        drop(observer);
    });

    Ok(())
}

fn attach_control(document: &Document, pipeline: &SharedPipeline, control: PendingControl<Element>) {
    if let Err(e) = try_attach_control(document, pipeline, control) {
        warn!("failed to attach save control: {:?}", e);
    }
}

fn try_attach_control(document: &Document, pipeline: &SharedPipeline, control: PendingControl<Element>) -> Result<(), JsValue> {
    let button: HtmlButtonElement = document.create_element("button")?.dyn_into()?;
    button.set_type("button");
    button.set_class_name("postlist-save");
    button.set_text_content(Some("Save post"));
    button.set_attribute("style", CONTROL_STYLE)?;

    let PendingControl { node, record } = control;
    let on_click = {
        let pipeline = pipeline.clone();
        let button = button.clone();
        let node = node.clone();
        Closure::once_into_js(move |event: web_sys::MouseEvent| {
            event.prevent_default();
            event.stop_propagation();
            let outcome = pipeline.borrow_mut().save_manual(record);
            pipeline.borrow().injector().complete(&node, outcome);
            button.set_text_content(Some(outcome.label()));
            button.set_disabled(true);
        })
    };
    button.add_event_listener_with_callback("click", on_click.unchecked_ref())?;

    node.append_child(&button)?;
    Ok(())
}
