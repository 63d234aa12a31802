//! Message body classification and neutralization
//!
//! Remote HTML is displayed verbatim apart from what these passes strip:
//! script/style blocks, event-handler attributes, script-scheme URLs and
//! a short list of embedding tags. Plain text gets a minimal display
//! rendering (links + line breaks).

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

const EVENT_ATTRIBUTES: &[&str] = &[
    "onload",
    "onclick",
    "onmouseover",
    "onmouseout",
    "onmousedown",
    "onmouseup",
    "onkeydown",
    "onkeyup",
    "onkeypress",
    "onfocus",
    "onblur",
    "onchange",
    "onsubmit",
    "onreset",
    "onselect",
    "onabort",
    "onerror",
    "onresize",
    "onscroll",
    "onunload",
    "onbeforeunload",
    "ondragstart",
    "ondrag",
    "ondragend",
    "ondrop",
    "ondragover",
    "ondragenter",
    "ondragleave",
    "oncontextmenu",
    "oninput",
    "oninvalid",
    "onwheel",
    "onanimationend",
    "onanimationiteration",
    "onanimationstart",
    "ontransitionend",
];

const DANGEROUS_TAGS: &[&str] = &[
    "object", "embed", "applet", "iframe", "frame", "frameset", "meta", "link",
];

static SCRIPT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<script[^>]*>.*?</script>").unwrap());

static STYLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<style[^>]*>.*?</style>").unwrap());

static EVENT_ATTR_RE: Lazy<Regex> = Lazy::new(|| {
    let names = EVENT_ATTRIBUTES.join("|");
    Regex::new(&format!(
        r#"(?i)\s*(?:{})\s*=\s*("[^"]*"|'[^']*'|[^\s>]+)"#,
        names
    ))
    .unwrap()
});

static JS_URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)javascript:").unwrap());
static VB_URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)vbscript:").unwrap());

// data: URLs are neutralized unless they carry an image payload
static DATA_URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)data:(image/)?").unwrap());

// Per tag: the paired form first (drops enclosed content), then any
// stray opening or self-closing form left behind.
static DANGEROUS_TAG_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    DANGEROUS_TAGS
        .iter()
        .flat_map(|tag| {
            [
                Regex::new(&format!(r"(?is)<{tag}\b[^>]*>.*?</{tag}>")).unwrap(),
                Regex::new(&format!(r"(?is)<{tag}\b[^>]*>")).unwrap(),
            ]
        })
        .collect()
});

/// Neutralize dangerous HTML for display. Safe tags and text pass
/// through untouched. Entities are decoded before the stripping passes
/// so entity-encoded markup cannot slip past them.
pub fn sanitize_html(html: &str) -> String {
    if html.is_empty() {
        return String::new();
    }

    let mut sanitized = decode_basic_entities(html);

    sanitized = SCRIPT_RE.replace_all(&sanitized, "").into_owned();
    sanitized = STYLE_RE.replace_all(&sanitized, "").into_owned();
    sanitized = EVENT_ATTR_RE.replace_all(&sanitized, "").into_owned();

    sanitized = JS_URL_RE.replace_all(&sanitized, "about:blank").into_owned();
    sanitized = VB_URL_RE.replace_all(&sanitized, "about:blank").into_owned();
    sanitized = DATA_URL_RE
        .replace_all(&sanitized, |caps: &Captures| {
            if caps.get(1).is_some() {
                caps[0].to_string()
            } else {
                "about:blank".to_string()
            }
        })
        .into_owned();

    for re in DANGEROUS_TAG_RES.iter() {
        sanitized = re.replace_all(&sanitized, "").into_owned();
    }

    sanitized
}

static HTML_INDICATORS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)<html[^>]*>",
        r"(?i)<body[^>]*>",
        r"(?i)<head[^>]*>",
        r"(?i)<div[^>]*>",
        r"(?i)<p[^>]*>",
        r"(?i)<span[^>]*>",
        r"(?i)<table[^>]*>",
        r"(?i)<br\s*/?>",
        r"(?i)<img[^>]*>",
        r"(?i)<a[^>]*href",
        r"(?i)<strong[^>]*>",
        r"(?i)<em[^>]*>",
        r"(?i)<h[1-6][^>]*>",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static HTML_ENTITY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"&[a-zA-Z0-9#]+;").unwrap());
static TAG_STRUCTURE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[a-zA-Z!][^>]*>").unwrap());

/// Heuristic HTML-vs-plain-text classification of a message body.
pub fn is_html_content(content: &str) -> bool {
    if content.is_empty() {
        return false;
    }

    let has_html_tags = HTML_INDICATORS.iter().any(|re| re.is_match(content));
    let has_entities = HTML_ENTITY_RE.is_match(content);
    let has_tag_structure =
        content.contains('<') && content.contains('>') && TAG_STRUCTURE_RE.is_match(content);

    has_html_tags || (has_tag_structure && has_entities)
}

static TAG_STRIP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());

/// Strip all markup, for previews.
pub fn extract_text_from_html(html: &str) -> String {
    TAG_STRIP_RE
        .replace_all(html, "")
        .replace("&nbsp;", " ")
        .trim()
        .to_string()
}

static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)https?://[^\s<>"'()\[\]]+[^\s<>"'()\[\].,;:!?]"#).unwrap());

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").unwrap());

static BR_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:<br>\s*){3,}").unwrap());

/// Render plain text for HTML display: clickable links, mailto links,
/// line breaks, with runs of blank lines collapsed.
pub fn plain_text_to_html(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let formatted = URL_RE.replace_all(text, |caps: &Captures| {
        let url = &caps[0];
        let display = if url.chars().count() > 80 {
            let truncated: String = url.chars().take(77).collect();
            format!("{}...", truncated)
        } else {
            url.to_string()
        };
        format!(
            "<a href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\">{}</a>",
            url, display
        )
    });

    let formatted = EMAIL_RE.replace_all(&formatted, |caps: &Captures| {
        format!("<a href=\"mailto:{0}\">{0}</a>", &caps[0])
    });

    let formatted = formatted.replace("\r\n", "<br>").replace('\n', "<br>");

    BR_RUN_RE.replace_all(&formatted, "<br><br>").into_owned()
}

fn decode_basic_entities(content: &str) -> String {
    content
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
}
