//! Reduces an HTML subtree to lightweight markup: `#` headings, blank-line
//! separated paragraphs, `![alt](url)` images, `> ` quotes and `- ` list items.

use scraper::ElementRef;
use url::Url;

/// Checked in order; the first attribute holding a usable URL wins.
pub const IMAGE_SOURCE_ATTRS: [&str; 3] = ["src", "data-src", "data-lazy-src"];

const SKIPPED_TAGS: [&str; 6] = ["script", "style", "noscript", "nav", "aside", "footer"];
const CONTAINER_TAGS: [&str; 4] = ["div", "section", "article", "main"];

pub fn normalize(element: ElementRef<'_>, base: &Url) -> String {
    let mut out = String::new();
    visit_children(element, base, &mut out);
    collapse_newlines(&out).trim().to_string()
}

/// Emits a single element the way [`normalize`] would inside a container.
pub fn render_block(element: ElementRef<'_>, base: &Url, out: &mut String) {
    let name = element.value().name();
    if SKIPPED_TAGS.contains(&name) {
        return;
    }
    match name {
        "img" => {
            if let Some(markup) = image_markup(element, base) {
                push_block(out, &markup);
            }
        }
        "figure" => render_figure(element, base, out),
        "p" => {
            let text = visible_text(element);
            if !text.is_empty() {
                push_block(out, &text);
            } else if let Some(img) = first_image(element) {
                if let Some(markup) = image_markup(img, base) {
                    push_block(out, &markup);
                }
            }
        }
        "h1" | "h2" | "h3" => {
            let text = visible_text(element);
            if !text.is_empty() {
                let level = match name {
                    "h1" => "#",
                    "h2" => "##",
                    _ => "###",
                };
                push_block(out, &format!("{level} {text}"));
            }
        }
        "blockquote" => {
            let text = visible_text(element);
            if !text.is_empty() {
                push_block(out, &format!("> {text}"));
            }
        }
        "ul" | "ol" => {
            let items: Vec<String> = element
                .children()
                .filter_map(ElementRef::wrap)
                .filter(|child| child.value().name() == "li")
                .map(visible_text)
                .filter(|text| !text.is_empty())
                .map(|text| format!("- {text}"))
                .collect();
            if !items.is_empty() {
                push_block(out, &items.join("\n"));
            }
        }
        _ if CONTAINER_TAGS.contains(&name) => visit_children(element, base, out),
        _ => {}
    }
}

fn visit_children(element: ElementRef<'_>, base: &Url, out: &mut String) {
    for child in element.children().filter_map(ElementRef::wrap) {
        render_block(child, base, out);
    }
}

fn render_figure(figure: ElementRef<'_>, base: &Url, out: &mut String) {
    let Some(markup) = first_image(figure).and_then(|img| image_markup(img, base)) else {
        return;
    };
    push_block(out, &markup);
    let caption = figure
        .children()
        .filter_map(ElementRef::wrap)
        .find(|child| child.value().name() == "figcaption")
        .map(visible_text)
        .unwrap_or_default();
    if !caption.is_empty() {
        push_block(out, &format!("*{caption}*"));
    }
}

fn first_image(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    element
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "img")
}

fn image_markup(img: ElementRef<'_>, base: &Url) -> Option<String> {
    let url = resolve_image_url(img, base)?;
    let alt = img.value().attr("alt").unwrap_or_default().trim();
    Some(format!("![{alt}]({url})"))
}

/// Resolves the first usable image attribute against `base`. Inline `data:`
/// placeholders used by lazy loaders are not usable.
pub fn resolve_image_url(img: ElementRef<'_>, base: &Url) -> Option<String> {
    IMAGE_SOURCE_ATTRS
        .iter()
        .filter_map(|attr| img.value().attr(attr))
        .map(str::trim)
        .filter(|value| !value.is_empty() && !value.starts_with("data:"))
        .find_map(|value| base.join(value).ok())
        .map(|url| url.to_string())
}

/// Text content with whitespace runs collapsed to single spaces.
pub fn visible_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Like [`visible_text`] but separates every text node, so adjacent block
/// elements without whitespace between them do not run together.
pub fn spaced_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn push_block(out: &mut String, block: &str) {
    out.push_str(block);
    out.push_str("\n\n");
}

/// Caps runs of newlines at three.
pub fn collapse_newlines(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut run = 0usize;
    for c in s.chars() {
        if c == '\n' {
            run += 1;
            if run > 3 {
                continue;
            }
        } else {
            run = 0;
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    fn normalize_body(html: &str, base: &str) -> String {
        let doc = Html::parse_document(html);
        let body = Selector::parse("body").unwrap();
        let root = doc.select(&body).next().unwrap();
        normalize(root, &Url::parse(base).unwrap())
    }

    #[test]
    fn renders_headings_paragraphs_quotes_and_lists() {
        let html = r#"<body><div>
            <h1>Title</h1>
            <p>First   paragraph
               text.</p>
            <h2>Section</h2>
            <blockquote>Quoted words</blockquote>
            <ul><li>one</li><li> two </li><li></li></ul>
            <h3>Small</h3>
        </div></body>"#;
        let out = normalize_body(html, "https://news.example/a/b");
        assert_eq!(
            out,
            "# Title\n\nFirst paragraph text.\n\n## Section\n\n> Quoted words\n\n- one\n- two\n\n### Small"
        );
    }

    #[test]
    fn skips_noise_tags_and_empty_paragraphs() {
        let html = r#"<body><section>
            <script>var x = 1;</script>
            <nav><p>Menu</p></nav>
            <p>   </p>
            <aside><p>Sidebar</p></aside>
            <p>Kept</p>
            <footer><p>Footer</p></footer>
        </section></body>"#;
        assert_eq!(normalize_body(html, "https://news.example/"), "Kept");
    }

    #[test]
    fn resolves_image_sources_in_priority_order() {
        let html = r#"<body>
            <img src="/img/a.jpg" alt="A">
            <img src="data:image/gif;base64,R0lG" data-src="b.jpg">
            <img data-lazy-src="https://cdn.example/c.png" alt=" C ">
            <img alt="no source">
        </body>"#;
        let out = normalize_body(html, "https://news.example/story/page.html");
        assert_eq!(
            out,
            "![A](https://news.example/img/a.jpg)\n\n![](https://news.example/story/b.jpg)\n\n![C](https://cdn.example/c.png)"
        );
    }

    #[test]
    fn figure_emits_image_and_caption() {
        let html = r#"<body><article><figure>
            <picture><img src="/p.jpg" alt="Pic"></picture>
            <figcaption>A caption</figcaption>
        </figure><figure><figcaption>orphan caption</figcaption></figure></article></body>"#;
        let out = normalize_body(html, "https://news.example/");
        assert_eq!(out, "![Pic](https://news.example/p.jpg)\n\n*A caption*");
    }

    #[test]
    fn collapse_caps_newline_runs() {
        assert_eq!(collapse_newlines("a\n\n\n\n\n\nb"), "a\n\n\nb");
        assert_eq!(collapse_newlines("a\n\nb"), "a\n\nb");
    }
}
