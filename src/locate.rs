/// Field locators: structural heuristics for finding post fields
///
/// Every field of a [`Record`](crate::record::Record) is found by its own
/// [`FieldLocator`], an ordered list of probes over role/attribute/text
/// conditions rather than fixed paths. The feed's markup is not ours and
/// changes without notice, so the whole heuristic set is plain data: it can be
/// swapped from configuration without touching the pipeline.
use serde::{Deserialize, Serialize};

use crate::node::{PostNode, Walk};
use crate::normalize::{normalize_text, parse_count};

/// A condition on one attribute
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", tag = "op")]
pub enum AttrMatch {
    Equals { name: String, value: String },
    Contains { name: String, value: String },
    StartsWith { name: String, value: String },
    Present { name: String },
}

impl AttrMatch {
    pub fn matches<N: PostNode>(&self, node: &N) -> bool {
        match self {
            AttrMatch::Equals { name, value } => node.attr(name).is_some_and(|v| v == *value),
            AttrMatch::Contains { name, value } => node.attr(name).is_some_and(|v| v.contains(value.as_str())),
            AttrMatch::StartsWith { name, value } => node.attr(name).is_some_and(|v| v.starts_with(value.as_str())),
            AttrMatch::Present { name } => node.attr(name).is_some(),
        }
    }
}

/// Structural matcher for a single element.
///
/// An empty rule matches every element. `within` restricts matches to
/// elements strictly inside an element matching the outer rule. When
/// `text_contains` is set, only the innermost matching elements count, since
/// every ancestor of a labelled span contains its text too. `outside` then
/// drops matches at or below any element matching one of its rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct MatchRule {
    pub tags: Vec<String>,
    pub attrs: Vec<AttrMatch>,
    pub text_contains: Option<String>,
    pub non_empty_text: bool,
    pub within: Option<Box<MatchRule>>,
    pub outside: Vec<MatchRule>,
}

impl MatchRule {
    pub fn any() -> Self {
        MatchRule::default()
    }

    pub fn tags(tags: &[&str]) -> Self {
        MatchRule {
            tags: tags.iter().map(|t| t.to_string()).collect(),
            ..MatchRule::default()
        }
    }

    pub fn attr_eq(mut self, name: &str, value: &str) -> Self {
        self.attrs.push(AttrMatch::Equals {
            name: name.to_string(),
            value: value.to_string(),
        });
        self
    }

    pub fn attr_contains(mut self, name: &str, value: &str) -> Self {
        self.attrs.push(AttrMatch::Contains {
            name: name.to_string(),
            value: value.to_string(),
        });
        self
    }

    pub fn attr_present(mut self, name: &str) -> Self {
        self.attrs.push(AttrMatch::Present { name: name.to_string() });
        self
    }

    pub fn text_contains(mut self, needle: &str) -> Self {
        self.text_contains = Some(needle.to_string());
        self
    }

    pub fn non_empty(mut self) -> Self {
        self.non_empty_text = true;
        self
    }

    pub fn within(mut self, outer: MatchRule) -> Self {
        self.within = Some(Box::new(outer));
        self
    }

    pub fn outside(mut self, excluded: MatchRule) -> Self {
        self.outside.push(excluded);
        self
    }

    /// Checks the element's own conditions, ignoring `within`.
    pub fn matches_node<N: PostNode>(&self, node: &N) -> bool {
        if !self.tags.is_empty() {
            let tag = node.tag();
            if !self.tags.iter().any(|t| t.eq_ignore_ascii_case(&tag)) {
                return false;
            }
        }
        if !self.attrs.iter().all(|a| a.matches(node)) {
            return false;
        }
        if self.non_empty_text || self.text_contains.is_some() {
            let text = node.text();
            if self.non_empty_text && normalize_text(&text).is_empty() {
                return false;
            }
            if let Some(needle) = &self.text_contains {
                if !text.to_lowercase().contains(&needle.to_lowercase()) {
                    return false;
                }
            }
        }
        true
    }

    /// Every match under `root` (root included), in document order.
    pub fn find_all<N: PostNode>(&self, root: &N) -> Vec<N> {
        let walk = Walk::new(root);
        self.find_in(&walk)
            .into_iter()
            .map(|index| walk.node(index).clone())
            .collect()
    }

    /// Indices into `walk` of every match, ascending.
    fn find_in<N: PostNode>(&self, walk: &Walk<N>) -> Vec<usize> {
        let pool: Vec<usize> = match &self.within {
            None => (0..walk.len()).collect(),
            Some(outer) => {
                let mut inside = vec![false; walk.len()];
                mark_subtrees(walk, &outer.find_in(walk), false, &mut inside);
                (0..walk.len()).filter(|index| inside[*index]).collect()
            }
        };

        let mut matches: Vec<usize> = pool
            .into_iter()
            .filter(|index| self.matches_node(walk.node(*index)))
            .collect();

        // In document order, a match contains another match iff it contains
        // the one right after it.
        if self.text_contains.is_some() {
            matches = matches
                .iter()
                .enumerate()
                .filter(|(k, index)| matches.get(k + 1).is_none_or(|next| !walk.is_inside(**index, *next)))
                .map(|(_, index)| *index)
                .collect();
        }

        if !self.outside.is_empty() {
            let mut excluded = vec![false; walk.len()];
            for rule in &self.outside {
                mark_subtrees(walk, &rule.find_in(walk), true, &mut excluded);
            }
            matches.retain(|index| !excluded[*index]);
        }

        matches
    }
}

/// Flags every element below each of `roots` (ascending indices), and the
/// roots themselves when `include_roots` is set.
fn mark_subtrees<N: PostNode>(walk: &Walk<N>, roots: &[usize], include_roots: bool, marks: &mut [bool]) {
    let mut covered = 0;
    for &root in roots {
        let first = if include_roots { root } else { root + 1 };
        let start = first.max(covered);
        let end = walk.end(root);
        if start < end {
            marks[start..end].fill(true);
            covered = end;
        }
    }
}

/// Where a probe reads its value from
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum ValueSource {
    #[default]
    Text,
    Attr(String),
}

/// One rule plus the place to read the field value from a matching element
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Probe {
    pub rule: MatchRule,
    #[serde(default)]
    pub read: ValueSource,
}

impl Probe {
    pub fn text(rule: MatchRule) -> Self {
        Probe { rule, read: ValueSource::Text }
    }

    pub fn attr(rule: MatchRule, name: &str) -> Self {
        Probe {
            rule,
            read: ValueSource::Attr(name.to_string()),
        }
    }

    fn read_value<N: PostNode>(&self, node: &N) -> Option<String> {
        let raw = match &self.read {
            ValueSource::Text => node.text(),
            ValueSource::Attr(name) => node.attr(name)?,
        };
        let value = normalize_text(&raw);
        (!value.is_empty()).then_some(value)
    }

    fn values<N: PostNode>(&self, walk: &Walk<N>) -> impl Iterator<Item = String> {
        self.rule
            .find_in(walk)
            .into_iter()
            .filter_map(move |index| self.read_value(walk.node(index)))
    }
}

/// Ordered probes for one field; the first probe that yields a value wins.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct FieldLocator {
    pub probes: Vec<Probe>,
}

impl FieldLocator {
    pub fn new(probes: Vec<Probe>) -> Self {
        FieldLocator { probes }
    }

    /// First non-empty value, normalized.
    pub fn locate<N: PostNode>(&self, walk: &Walk<N>) -> Option<String> {
        self.probes.iter().find_map(|probe| probe.values(walk).next())
    }

    /// First value that reads as a positive count; zero when none does.
    pub fn locate_count<N: PostNode>(&self, walk: &Walk<N>) -> u64 {
        self.probes
            .iter()
            .flat_map(|probe| probe.values(walk))
            .map(|label| parse_count(&label))
            .find(|count| *count > 0)
            .unwrap_or(0)
    }
}

/// The complete heuristic set: candidate signature plus one locator per field
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Locators {
    pub candidate: MatchRule,
    pub author: FieldLocator,
    pub profile_link: FieldLocator,
    pub content: FieldLocator,
    pub post_url: FieldLocator,
    pub image: FieldLocator,
    pub likes: FieldLocator,
    pub comments: FieldLocator,
    pub shares: FieldLocator,
}

impl Default for Locators {
    fn default() -> Self {
        let heading = || MatchRule::tags(&["h2", "h3", "h4"]);
        let profile_name = || MatchRule::any().attr_eq("data-ad-rendering-role", "profile_name");
        let permalink = |fragment: &str| Probe::attr(MatchRule::tags(&["a"]).attr_contains("href", fragment), "href");
        let message = |name: &str, value: &str| MatchRule::any().attr_eq(name, value);
        // Footer counters, never the post body quoting them
        let footer_label = |needle: &str| {
            MatchRule::any()
                .text_contains(needle)
                .outside(message("data-ad-preview", "message"))
                .outside(message("data-ad-comet-preview", "message"))
                .outside(message("data-ad-rendering-role", "story_message"))
        };

        Locators {
            candidate: MatchRule::any().attr_eq("role", "article"),
            author: FieldLocator::new(vec![
                Probe::text(profile_name().non_empty()),
                Probe::text(MatchRule::tags(&["a"]).non_empty().within(heading())),
                Probe::text(heading().non_empty()),
                Probe::text(MatchRule::tags(&["strong"]).non_empty()),
            ]),
            profile_link: FieldLocator::new(vec![
                Probe::attr(MatchRule::tags(&["a"]).attr_present("href").within(profile_name()), "href"),
                Probe::attr(MatchRule::tags(&["a"]).attr_present("href").within(heading()), "href"),
                Probe::attr(MatchRule::tags(&["a"]).attr_present("href").within(MatchRule::tags(&["strong"])), "href"),
            ]),
            content: FieldLocator::new(vec![
                Probe::text(message("data-ad-preview", "message").non_empty()),
                Probe::text(message("data-ad-comet-preview", "message").non_empty()),
                Probe::text(message("data-ad-rendering-role", "story_message").non_empty()),
                Probe::text(MatchRule::tags(&["div"]).attr_eq("dir", "auto").non_empty()),
            ]),
            post_url: FieldLocator::new(vec![
                permalink("/posts/"),
                permalink("/permalink"),
                permalink("story_fbid="),
                permalink("/videos/"),
            ]),
            image: FieldLocator::new(vec![
                Probe::attr(MatchRule::tags(&["img"]).attr_contains("src", "scontent"), "src"),
                Probe::attr(
                    MatchRule::tags(&["img"]).attr_present("src").within(MatchRule::tags(&["a"]).attr_contains("href", "/photo")),
                    "src",
                ),
            ]),
            likes: FieldLocator::new(vec![
                Probe::text(footer_label("all reactions")),
                Probe::attr(MatchRule::any().attr_contains("aria-label", "reaction"), "aria-label"),
                Probe::attr(MatchRule::any().attr_contains("aria-label", "Like:"), "aria-label"),
            ]),
            comments: FieldLocator::new(vec![Probe::text(footer_label("comment"))]),
            shares: FieldLocator::new(vec![Probe::text(footer_label("share"))]),
        }
    }
}
