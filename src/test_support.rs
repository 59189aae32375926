/// In-memory element tree and record builders for unit tests
use std::cell::RefCell;
use std::rc::Rc;

use chrono::{DateTime, TimeZone, Utc};
use futures::FutureExt;
use futures::future::LocalBoxFuture;

use crate::bridge::Spawner;
use crate::node::PostNode;
use crate::record::Record;

#[derive(Debug, Default)]
struct Inner {
    tag: String,
    attrs: Vec<(String, String)>,
    text: String,
    children: Vec<TestNode>,
}

/// Shared handle, compared by identity like a DOM element.
#[derive(Debug, Clone)]
pub struct TestNode(Rc<RefCell<Inner>>);

pub fn el(tag: &str) -> TestNode {
    TestNode(Rc::new(RefCell::new(Inner {
        tag: tag.to_string(),
        ..Inner::default()
    })))
}

impl TestNode {
    pub fn with_attr(self, name: &str, value: &str) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn with_text(self, text: &str) -> Self {
        self.0.borrow_mut().text = text.to_string();
        self
    }

    pub fn child(self, child: TestNode) -> Self {
        self.append(child);
        self
    }

    pub fn append(&self, child: TestNode) {
        self.0.borrow_mut().children.push(child);
    }
}

impl PartialEq for TestNode {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PostNode for TestNode {
    fn tag(&self) -> String {
        self.0.borrow().tag.clone()
    }

    fn attr(&self, name: &str) -> Option<String> {
        self.0
            .borrow()
            .attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
    }

    fn children(&self) -> Vec<Self> {
        self.0.borrow().children.clone()
    }

    fn text(&self) -> String {
        let inner = self.0.borrow();
        let mut text = inner.text.clone();
        for child in &inner.children {
            text.push_str(&PostNode::text(child));
        }
        text
    }

    fn set_attr(&self, name: &str, value: &str) -> bool {
        let mut inner = self.0.borrow_mut();
        match inner.attrs.iter_mut().find(|(key, _)| key == name) {
            Some(slot) => slot.1 = value.to_string(),
            None => inner.attrs.push((name.to_string(), value.to_string())),
        }
        true
    }
}

/// Runs every spawned write to completion before returning.
pub fn blocking_spawner() -> Spawner {
    Rc::new(|future: LocalBoxFuture<'static, ()>| {
        // Polled in place: the spawner may be called from inside a `block_on`.
        future.now_or_never().expect("test store writes complete immediately")
    })
}

pub fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 10, 28, 10, 30, 0).unwrap()
}

pub fn record(content: &str, author: &str) -> Record {
    Record::new(content, author, fixed_time()).unwrap()
}

/// A feed post shaped like the markup the default locators target.
pub fn feed_post(author: &str, body: &str) -> TestNode {
    el("div")
        .with_attr("role", "article")
        .child(
            el("h3").child(
                el("a")
                    .with_attr("href", "https://www.facebook.com/jane.doe?__cft__[0]=x&__tn__=R")
                    .with_text(author),
            ),
        )
        .child(
            el("a")
                .with_attr("href", "https://www.facebook.com/jane.doe/posts/12345?__cft__[0]=x")
                .with_text("2h"),
        )
        .child(el("div").with_attr("data-ad-preview", "message").child(el("span").with_text(body)))
        .child(
            el("a").with_attr("href", "https://www.facebook.com/photo/?fbid=1").child(
                el("img").with_attr("src", "https://scontent.xx.fbcdn.net/v/t39/1.jpg?_nc_cat=1&oh=ab"),
            ),
        )
        .child(
            el("div")
                .child(el("span").with_text("All reactions: 1.2K"))
                .child(el("span").with_text("Comment"))
                .child(el("span").with_text("34 comments"))
                .child(el("span").with_text("Share"))
                .child(el("span").with_text("5 shares")),
        )
}
