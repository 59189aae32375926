/// Popup UI: read-only view of the captured posts

use chrono::Utc;
use patternfly_yew::prelude::*;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::console;
use yew::prelude::*;

use crate::bridge::{PersistenceBridge, local_spawner};
use crate::record::Record;
use crate::store::{Store, open_store};
use crate::ui::components::{EmptyNotice, PostCard};

// Import JS bridge functions
#[wasm_bindgen(module = "/extension.js")]
extern "C" {
    fn exportToFile(data: &str, filename: &str);
}

type PopupBridge = PersistenceBridge<std::rc::Rc<dyn Store>>;

#[function_component(App)]
pub fn app() -> Html {
    let loading = use_state(|| true);
    let posts = use_state(Vec::<Record>::new);
    let bridge = use_memo((), |_| -> PopupBridge {
        PersistenceBridge::shared(open_store(), local_spawner())
    });

    // Load on mount and follow writes from the content script
    {
        let loading = loading.clone();
        let posts = posts.clone();
        let bridge = bridge.clone();

        use_effect_with((), move |_| {
            let pending = bridge.load();
            {
                let posts = posts.clone();
                spawn_local(async move {
                    posts.set(pending.await);
                    loading.set(false);
                });
            }
            let subscription = bridge.on_external_change(move |records| posts.set(records));
            move || drop(subscription)
        });
    }

    let on_clear = {
        let posts = posts.clone();
        let bridge = bridge.clone();
        Callback::from(move |_| {
            bridge.reset();
            posts.set(Vec::new());
        })
    };

    let on_export = {
        let posts = posts.clone();
        Callback::from(move |_| match serde_json::to_string_pretty(&*posts) {
            Ok(json) => {
                let filename = format!("postlist-export-{}.json", Utc::now().timestamp_millis());
                exportToFile(&json, &filename);
            }
            Err(e) => {
                console::log_1(&format!("Export failed: {:?}", e).into());
            }
        })
    };

    let is_empty = posts.is_empty();

    html! {
        <div class="padding-20">
            <h1 class="popup-title">{"PostList"}</h1>
            <p class="status-line">
                {"Status: "}<span class="status-active">{"Active"}</span>
                {format!(" • {} saved", posts.len())}
            </p>

            <div class="flex-row-gap">
                <Button onclick={on_export} disabled={is_empty} variant={ButtonVariant::Secondary}>
                    {"📥 Export"}
                </Button>
                <Button onclick={on_clear} disabled={is_empty} variant={ButtonVariant::Danger}>
                    {"🗑️ Clear all"}
                </Button>
            </div>

            if *loading {
                <div class="loading-text-center">
                    <Spinner />
                    <p class="loading-text">{"Loading posts..."}</p>
                </div>
            } else if is_empty {
                <EmptyNotice
                    message={"No posts captured yet."}
                    hint={Some("Scroll your feed and posts will show up here.".to_string())}
                />
            } else {
                <div class="posts-list">
                    {for posts.iter().rev().map(|record| html! {
                        <PostCard key={record.id.clone()} record={record.clone()} />
                    })}
                </div>
            }
        </div>
    }
}
