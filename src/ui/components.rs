/// Reusable UI components

use chrono::Local;
use yew::prelude::*;

use crate::record::Record;

const EXCERPT_CHARS: usize = 280;

/// Shorten text to at most `max` characters, ending in an ellipsis when cut.
pub fn excerpt(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max.saturating_sub(1)).collect();
    format!("{}…", cut.trim_end())
}

/// "12 likes · 3 comments · 1 share"
pub fn engagement_summary(record: &Record) -> String {
    fn part(count: u64, singular: &str, plural: &str) -> String {
        format!("{} {}", count, if count == 1 { singular } else { plural })
    }

    [
        part(record.likes, "like", "likes"),
        part(record.comments, "comment", "comments"),
        part(record.shares, "share", "shares"),
    ]
    .join(" · ")
}

#[derive(Properties, PartialEq)]
pub struct PostCardProps {
    pub record: Record,
}

#[function_component(PostCard)]
pub fn post_card(props: &PostCardProps) -> Html {
    let record = &props.record;
    let captured = record
        .timestamp
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M")
        .to_string();

    html! {
        <div class="post-card">
            <div class="post-header">
                if record.profile_link.is_empty() {
                    <span class="post-author">{&record.author}</span>
                } else {
                    <a class="post-author" href={record.profile_link.clone()} target="_blank" rel="noopener">
                        {&record.author}
                    </a>
                }
                <span class="post-date">{captured}</span>
            </div>
            <p class="post-content">{excerpt(&record.content, EXCERPT_CHARS)}</p>
            if let Some(src) = &record.image_url {
                <img class="post-image" src={src.clone()} alt="" />
            }
            <div class="post-footer">
                <span class="post-stats">{engagement_summary(record)}</span>
                if let Some(url) = &record.post_url {
                    <a class="post-link" href={url.clone()} target="_blank" rel="noopener">{"Open post"}</a>
                }
            </div>
        </div>
    }
}

#[derive(Properties, PartialEq)]
pub struct EmptyNoticeProps {
    pub message: String,
    #[prop_or_default]
    pub hint: Option<String>,
}

#[function_component(EmptyNotice)]
pub fn empty_notice(props: &EmptyNoticeProps) -> Html {
    html! {
        <div class="empty-state">
            <p>{&props.message}</p>
            if let Some(hint) = &props.hint {
                <p class="empty-state-hint">{hint}</p>
            }
        </div>
    }
}
