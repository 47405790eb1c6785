//! Decoding and light repair of filing HTML.
//!
//! EDGAR primary documents are hand-authored HTML of varying quality and
//! encoding. Structure is read with `scraper`; edits are applied to the
//! original markup so that everything the renderer does not care about stays
//! byte-for-byte as filed.

use regex::{Captures, Regex};
use scraper::{Html, Selector};
use std::collections::HashMap;
use std::ops::Range;
use std::sync::LazyLock;

static META_CHARSET: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("meta[charset]").expect("valid selector"));
static ASSET_ELEMENTS: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("img[src], script[src], link[href]").expect("valid selector")
});

// Attribute values are consumed whole so that matches never start inside quotes.
static HEAD_OPEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<head(?:\s(?:[^>"']|"[^"]*"|'[^']*')*)?>"#).expect("valid regex")
});
static HTML_OPEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<html(?:\s(?:[^>"']|"[^"]*"|'[^']*')*)?>"#).expect("valid regex")
});
static META_CHARSET_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(<meta\b(?:[^>"']|"[^"]*"|'[^']*')*?\scharset\s*=\s*["']?)([^"'\s/>;]*)"#)
        .expect("valid regex")
});
static ASSET_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<(img|script|link)\b((?:[^>"']|"[^"]*"|'[^']*')*)>"#).expect("valid regex")
});
// One attribute of a tag body; the value keeps its quotes.
static TAG_ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([^\s"'<>/=]+)(?:\s*=\s*("[^"]*"|'[^']*'|[^\s"'>]+))?"#).expect("valid regex")
});

/// Mis-decoded UTF-8 punctuation, longest sequences first so that the bare
/// `â€` prefix only matches what the others leave behind.
const PUNCTUATION_FIXES: &[(&str, &str)] = &[
    ("â€œ", "\""),
    ("â€™", "'"),
    ("â€˜", "'"),
    ("â€“", "-"),
    ("â€”", "-"),
    ("â€", "\""),
];

/// Encoding a document body was decoded with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Latin1,
    Windows1252,
}

impl TextEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Latin1 => "iso-8859-1",
            TextEncoding::Windows1252 => "cp1252",
        }
    }
}

#[derive(Debug, Clone)]
pub struct DecodedText {
    pub text: String,
    pub encoding: TextEncoding,
}

/// Decodes a response body: UTF-8, then Latin-1, then lossy Windows-1252.
///
/// Latin-1 maps every byte, so it is only accepted when the body has no bytes
/// in 0x80..=0x9F. Those are C1 controls in Latin-1 but curly quotes and
/// dashes in Windows-1252, which is what such documents actually contain.
pub fn decode_bytes(bytes: &[u8]) -> DecodedText {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return DecodedText {
            text: text.to_string(),
            encoding: TextEncoding::Utf8,
        };
    }

    if !bytes.iter().any(|b| (0x80..=0x9F).contains(b)) {
        return DecodedText {
            text: encoding_rs::mem::decode_latin1(bytes).into_owned(),
            encoding: TextEncoding::Latin1,
        };
    }

    let (text, _) = encoding_rs::WINDOWS_1252.decode_without_bom_handling(bytes);
    DecodedText {
        text: text.into_owned(),
        encoding: TextEncoding::Windows1252,
    }
}

/// Replaces common encoding-mismatch artifacts with plain ASCII punctuation.
pub fn repair_punctuation(text: &str) -> String {
    let mut repaired = text.to_string();
    for (wrong, correct) in PUNCTUATION_FIXES {
        if repaired.contains(wrong) {
            repaired = repaired.replace(wrong, correct);
        }
    }
    repaired
}

/// Kind of embeddable resource referenced by a document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Image,
    Script,
    Stylesheet,
}

impl AssetKind {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_ascii_lowercase().as_str() {
            "img" => Some(AssetKind::Image),
            "script" => Some(AssetKind::Script),
            "link" => Some(AssetKind::Stylesheet),
            _ => None,
        }
    }

    pub fn attribute(&self) -> &'static str {
        match self {
            AssetKind::Image | AssetKind::Script => "src",
            AssetKind::Stylesheet => "href",
        }
    }
}

/// A fetchable reference found in a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetLink {
    pub kind: AssetKind,
    /// Attribute value as the document states it, entities decoded
    pub url: String,
}

/// Outcome of [`FilingDocument::ensure_utf8_charset`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharsetFix {
    Unchanged,
    Inserted,
    Corrected,
}

/// A filing's HTML with the edits needed before rendering
#[derive(Debug, Clone)]
pub struct FilingDocument {
    markup: String,
}

impl FilingDocument {
    pub fn parse(markup: impl Into<String>) -> Self {
        Self {
            markup: markup.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.markup
    }

    /// Makes sure the document declares `<meta charset="UTF-8">`.
    pub fn ensure_utf8_charset(&mut self) -> CharsetFix {
        let existing = {
            let html = Html::parse_document(&self.markup);
            html.select(&META_CHARSET)
                .next()
                .and_then(|el| el.value().attr("charset").map(str::to_string))
        };

        match existing {
            Some(charset) if charset.trim().eq_ignore_ascii_case("utf-8") => CharsetFix::Unchanged,
            Some(_) => {
                self.markup = META_CHARSET_VALUE
                    .replace(&self.markup, |caps: &Captures| format!("{}UTF-8", &caps[1]))
                    .into_owned();
                CharsetFix::Corrected
            }
            None => {
                const META: &str = r#"<meta charset="UTF-8">"#;
                if let Some(head) = HEAD_OPEN.find(&self.markup) {
                    self.markup.insert_str(head.end(), META);
                } else {
                    let head = format!("<head>{}</head>", META);
                    let at = HTML_OPEN.find(&self.markup).map(|m| m.end()).unwrap_or(0);
                    self.markup.insert_str(at, &head);
                }
                CharsetFix::Inserted
            }
        }
    }

    /// Images, scripts and stylesheets with a fetchable reference, in document order.
    pub fn asset_links(&self) -> Vec<AssetLink> {
        let html = Html::parse_document(&self.markup);
        let mut links = Vec::new();

        for element in html.select(&ASSET_ELEMENTS) {
            let el = element.value();
            let kind = match el.name() {
                "img" => AssetKind::Image,
                "script" => AssetKind::Script,
                "link" => {
                    let is_stylesheet = el
                        .attr("rel")
                        .map(|rel| rel.trim().eq_ignore_ascii_case("stylesheet"))
                        .unwrap_or(false);
                    if !is_stylesheet {
                        continue;
                    }
                    AssetKind::Stylesheet
                }
                _ => continue,
            };

            let Some(url) = el.attr(kind.attribute()) else {
                continue;
            };
            if url.is_empty() || url.trim_start().to_ascii_lowercase().starts_with("data:") {
                continue;
            }

            links.push(AssetLink {
                kind,
                url: url.to_string(),
            });
        }

        links
    }

    /// Points asset references at local copies in a single pass over the markup.
    ///
    /// `local_names` maps a reference as [`FilingDocument::asset_links`] reports it
    /// to the file name that replaces it. Values are matched against the markup as
    /// it was before the call, so a name written here is never rewritten again.
    /// Returns the number of elements rewritten per reference.
    pub fn retarget_all(&mut self, local_names: &HashMap<String, String>) -> HashMap<String, usize> {
        let mut rewritten: HashMap<String, usize> = HashMap::new();
        if local_names.is_empty() {
            return rewritten;
        }

        let updated = ASSET_TAG.replace_all(&self.markup, |caps: &Captures| {
            let whole = &caps[0];
            let (Some(kind), Some(body)) = (AssetKind::from_tag(&caps[1]), caps.get(2)) else {
                return whole.to_string();
            };
            let attributes = tag_attributes(body.as_str());

            if kind == AssetKind::Stylesheet {
                let is_stylesheet = attributes.iter().any(|a| {
                    a.name.eq_ignore_ascii_case("rel") && a.value.trim().eq_ignore_ascii_case("stylesheet")
                });
                if !is_stylesheet {
                    return whole.to_string();
                }
            }

            // html5ever keeps the first of duplicated attributes
            let Some(target) = attributes.iter().find(|a| a.name.eq_ignore_ascii_case(kind.attribute())) else {
                return whole.to_string();
            };
            let Some(span) = target.value_span.clone() else {
                return whole.to_string();
            };
            let reference = html_escape::decode_html_entities(target.value).into_owned();
            let Some(local_name) = local_names.get(&reference) else {
                return whole.to_string();
            };

            let offset = body.start() - caps.get(0).map(|m| m.start()).unwrap_or_default();
            *rewritten.entry(reference).or_default() += 1;
            format!(
                "{}\"{}\"{}",
                &whole[..offset + span.start],
                local_name,
                &whole[offset + span.end..]
            )
        });

        self.markup = updated.into_owned();
        rewritten
    }
}

struct TagAttribute<'a> {
    name: &'a str,
    /// Unquoted value; empty for bare attributes
    value: &'a str,
    /// Span of the value, quotes included, within the tag body
    value_span: Option<Range<usize>>,
}

fn tag_attributes(body: &str) -> Vec<TagAttribute<'_>> {
    TAG_ATTRIBUTE
        .captures_iter(body)
        .filter_map(|caps| {
            let name = caps.get(1)?.as_str();
            let (value, value_span) = match caps.get(2) {
                Some(m) => {
                    let raw = m.as_str();
                    let unquoted = if raw.len() >= 2 && (raw.starts_with('"') || raw.starts_with('\'')) {
                        &raw[1..raw.len() - 1]
                    } else {
                        raw
                    };
                    (unquoted, Some(m.range()))
                }
                None => ("", None),
            };
            Some(TagAttribute { name, value, value_span })
        })
        .collect()
}
