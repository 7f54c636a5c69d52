use quick_xml::escape::resolve_html5_entity;
use regex::{Captures, Regex};
use std::sync::OnceLock;

static ENTITY: OnceLock<Regex> = OnceLock::new();
static MARKUP: OnceLock<Regex> = OnceLock::new();
static NBSP: OnceLock<Regex> = OnceLock::new();

/// Reduces survey-authored markup to display text.
///
/// Entities are unescaped before tags are removed, so escaped markup such as
/// `&lt;b&gt;` is stripped as well. Both a literal non-breaking space and the
/// `\xa0` escape sequence some exports carry collapse to a plain space.
pub fn clean_field_text(value: &str) -> String {
    let unescaped = unescape_entities(value);

    let markup = MARKUP.get_or_init(|| Regex::new(r"(?s)<.*?>").expect("markup pattern"));
    let without_tags = markup.replace_all(&unescaped, "");

    let nbsp = NBSP.get_or_init(|| Regex::new(r"\x{a0}|\\xa0").expect("nbsp pattern"));
    nbsp.replace_all(&without_tags, " ").trim().to_string()
}

/// Decodes each entity on its own; a bare `&` or an unknown name stays as written.
fn unescape_entities(value: &str) -> String {
    let entity = ENTITY.get_or_init(|| {
        Regex::new(r"&(?:#([0-9]{1,7})|#[xX]([0-9a-fA-F]{1,6})|([A-Za-z][A-Za-z0-9]*));")
            .expect("entity pattern")
    });
    entity
        .replace_all(value, |caps: &Captures<'_>| {
            let resolved = if let Some(decimal) = caps.get(1) {
                decimal.as_str().parse().ok().and_then(char::from_u32).map(String::from)
            } else if let Some(hex) = caps.get(2) {
                u32::from_str_radix(hex.as_str(), 16)
                    .ok()
                    .and_then(char::from_u32)
                    .map(String::from)
            } else {
                caps.get(3)
                    .and_then(|name| resolve_html5_entity(name.as_str()))
                    .map(str::to_string)
            };
            resolved.unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}
