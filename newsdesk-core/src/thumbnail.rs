//! Best-effort thumbnail lookup for feed items.
//!
//! Strategies run in the order of [`RSS_THUMBNAIL_CHAIN`]; the first one that
//! produces a non-empty URL wins. Scraping `<img>` tags out of the item body
//! is the last resort.

use once_cell::sync::Lazy;
use regex::Regex;
use rss::extension::Extension;
use tracing::debug;

static INLINE_IMG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<img[^>]+src\s*=\s*["']([^"']+)["']"#).expect("inline image pattern is valid")
});

pub type RssStrategy = fn(&rss::Item) -> Option<String>;

pub const RSS_THUMBNAIL_CHAIN: [(&str, RssStrategy); 6] = [
    ("enclosure", from_enclosure),
    ("media:content", from_media_content),
    ("media:thumbnail", from_media_thumbnail),
    ("media:group", from_media_group),
    ("itunes:image", from_itunes_image),
    ("inline img", from_inline_img),
];

pub fn rss_thumbnail(item: &rss::Item) -> Option<String> {
    RSS_THUMBNAIL_CHAIN.iter().find_map(|(name, strategy)| {
        let found = strategy(item).filter(|url| !url.trim().is_empty())?;
        debug!(strategy = name, url = %found, "thumbnail resolved");
        Some(found.trim().to_owned())
    })
}

pub fn atom_thumbnail(entry: &atom_syndication::Entry) -> Option<String> {
    entry
        .links()
        .iter()
        .find(|link| {
            link.rel() == "enclosure" && link.mime_type().is_some_and(|mime| mime.starts_with("image/"))
        })
        .map(|link| link.href().to_owned())
        .or_else(|| entry.content().and_then(|c| c.value()).and_then(first_inline_img))
        .or_else(|| entry.summary().and_then(|s| first_inline_img(s.as_str())))
        .filter(|url| !url.trim().is_empty())
}

pub fn first_inline_img(html: &str) -> Option<String> {
    INLINE_IMG
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_owned())
}

fn from_enclosure(item: &rss::Item) -> Option<String> {
    item.enclosure()
        .filter(|e| e.mime_type().starts_with("image/"))
        .map(|e| e.url().to_owned())
}

fn media<'a>(item: &'a rss::Item, name: &str) -> impl Iterator<Item = &'a Extension> {
    item.extensions()
        .get("media")
        .and_then(|media| media.get(name))
        .into_iter()
        .flatten()
}

/// `media:content` entries that declare a non-image medium or type are skipped.
fn image_like(ext: &Extension) -> bool {
    let attrs = ext.attrs();
    let medium_ok = attrs.get("medium").map_or(true, |m| m == "image");
    let type_ok = attrs.get("type").map_or(true, |t| t.starts_with("image/"));
    medium_ok && type_ok
}

fn url_attr(ext: &Extension) -> Option<String> {
    ext.attrs().get("url").cloned()
}

fn from_media_content(item: &rss::Item) -> Option<String> {
    media(item, "content").filter(|ext| image_like(ext)).find_map(url_attr)
}

fn from_media_thumbnail(item: &rss::Item) -> Option<String> {
    media(item, "thumbnail").find_map(url_attr)
}

/// Children of a `media:group`, whether keyed by local or qualified name.
fn group_children<'a>(group: &'a Extension, local: &str) -> impl Iterator<Item = &'a Extension> {
    let children = group.children();
    children
        .get(local)
        .or_else(|| children.get(&format!("media:{local}")))
        .into_iter()
        .flatten()
}

fn from_media_group(item: &rss::Item) -> Option<String> {
    media(item, "group").find_map(|group| {
        group_children(group, "content")
            .filter(|ext| image_like(ext))
            .find_map(url_attr)
            .or_else(|| group_children(group, "thumbnail").find_map(url_attr))
    })
}

fn from_itunes_image(item: &rss::Item) -> Option<String> {
    item.itunes_ext()
        .and_then(|itunes| itunes.image())
        .map(ToOwned::to_owned)
}

fn from_inline_img(item: &rss::Item) -> Option<String> {
    item.content()
        .and_then(first_inline_img)
        .or_else(|| item.description().and_then(first_inline_img))
}
