//! Document locator.
//!
//! Given a target date, a locator returns the documents a source published
//! that day. [`FeedLocator`] renders the source's listing URL template,
//! requests it and parses the body according to [`ListingFormat`]:
//!
//! - **Feed**: RSS 2.0, Atom and RDF. Per item, an enclosure
//!   (`<enclosure url>` or `<link rel="enclosure" href>`) wins over the
//!   item's primary link.
//! - **Json**: any JSON shape. Item-like objects (objects with a link and
//!   no arrays of objects) are found recursively; attachment fields win over
//!   link fields, and the department label of the nearest enclosing
//!   `departamento` object is carried along.
//!
//! If neither yields a single URL, the raw body is scanned for PDF links.
//!
//! A listing that cannot be fetched or parsed is an empty listing, not an
//! error: a bulletin may simply not exist for that date.

use std::collections::HashSet;
use std::sync::OnceLock;

use async_trait::async_trait;
use chrono::NaiveDate;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::IngestError;
use crate::fetch::is_accepted_status;
use crate::models::{DocumentKind, DocumentRef};
use crate::sources::{ListingFormat, SourceProfile};

/// Placeholder replaced by the formatted target date.
pub const DATE_PLACEHOLDER: &str = "{date}";

const ATTACHMENT_FIELDS: &[&str] = &["enclosure", "attachment", "url_pdf", "pdf"];
const LINK_FIELDS: &[&str] = &["link", "url", "url_html", "href"];
const NESTED_URL_FIELDS: &[&str] = &["url", "href", "texto"];
const TITLE_FIELDS: &[&str] = &["title", "titulo"];

#[async_trait]
pub trait Locator: Send + Sync {
    async fn locate(&self, date: NaiveDate) -> Result<Vec<DocumentRef>, IngestError>;
}

/// Locator backed by one HTTP listing endpoint.
pub struct FeedLocator {
    client: reqwest::Client,
    listing_url: String,
    token: Option<String>,
    date_format: String,
    format: ListingFormat,
    kind: DocumentKind,
}

impl FeedLocator {
    pub fn new(client: reqwest::Client, profile: &SourceProfile) -> Result<Self, IngestError> {
        let listing_url = profile.listing_url.clone().ok_or_else(|| {
            IngestError::configuration(format!(
                "no listing URL configured for source '{}' (set sources.{}.listing_url or GAZETTE_{}_LISTING_URL)",
                profile.tag,
                profile.tag,
                profile.tag.as_str().to_uppercase()
            ))
        })?;

        Ok(Self {
            client,
            listing_url,
            token: profile.token.clone(),
            date_format: profile.date_format.clone(),
            format: profile.listing_format,
            kind: profile.document_kind,
        })
    }

    pub fn listing_url_for(&self, date: NaiveDate) -> String {
        render_listing_url(&self.listing_url, &self.date_format, date)
    }
}

pub fn render_listing_url(template: &str, date_format: &str, date: NaiveDate) -> String {
    template.replace(DATE_PLACEHOLDER, &date.format(date_format).to_string())
}

#[async_trait]
impl Locator for FeedLocator {
    async fn locate(&self, date: NaiveDate) -> Result<Vec<DocumentRef>, IngestError> {
        let url = self.listing_url_for(date);

        let mut request = self.client.get(&url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        if self.format == ListingFormat::Json {
            request = request.header(reqwest::header::ACCEPT, "application/json");
        }

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(%url, error = %e, "listing request failed");
                return Ok(Vec::new());
            }
        };

        let status = response.status();
        if !is_accepted_status(status) {
            warn!(%url, %status, "listing returned non-success status");
            return Ok(Vec::new());
        }

        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => {
                warn!(%url, error = %e, "failed to read listing body");
                return Ok(Vec::new());
            }
        };

        let refs = parse_listing(self.format, self.kind, &body);
        debug!(%url, documents = refs.len(), "listing parsed");
        Ok(refs)
    }
}

/// Parse a listing body into document references, first-seen order, no
/// duplicate URLs.
pub fn parse_listing(format: ListingFormat, kind: DocumentKind, body: &str) -> Vec<DocumentRef> {
    let mut refs = match format {
        ListingFormat::Feed => parse_feed(body).unwrap_or_else(|e| {
            warn!(error = %e, "listing is not a readable feed");
            Vec::new()
        }),
        ListingFormat::Json => match serde_json::from_str::<Value>(body) {
            Ok(value) => {
                let mut out = Vec::new();
                walk_json(&value, None, &mut out);
                out
            }
            Err(e) => {
                warn!(error = %e, "listing is not valid JSON");
                Vec::new()
            }
        },
    };

    if kind == DocumentKind::Structured {
        // Structured items are filtered and titled by their listing title.
        refs.retain(|r| r.title.as_deref().is_some_and(|t| !t.trim().is_empty()));
    } else if refs.is_empty() {
        refs = scan_pdf_urls(body).into_iter().map(DocumentRef::new).collect();
    }

    dedup_by_url(refs)
}

fn dedup_by_url(refs: Vec<DocumentRef>) -> Vec<DocumentRef> {
    let mut seen = HashSet::new();
    refs.into_iter()
        .filter(|r| seen.insert(r.url.clone()))
        .collect()
}

fn pdf_url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)https?://[^\s"'<>]+?\.pdf(?:\?[^\s"'<>]*)?"#)
            .expect("PDF URL pattern is valid")
    })
}

/// Every absolute PDF-looking URL in `body`, in order of appearance.
pub fn scan_pdf_urls(body: &str) -> Vec<String> {
    pdf_url_regex()
        .find_iter(body)
        .map(|m| m.as_str().replace("&amp;", "&"))
        .collect()
}

// ============ Feeds ============

#[derive(Default)]
struct FeedItem {
    title: String,
    link: Option<String>,
    enclosure: Option<String>,
}

impl FeedItem {
    fn into_ref(self) -> Option<DocumentRef> {
        let url = self.enclosure.or(self.link)?;
        let title = self.title.trim();
        Some(DocumentRef {
            url,
            title: (!title.is_empty()).then(|| title.to_string()),
            department: None,
        })
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum FeedField {
    Title,
    Link,
}

fn attr(e: &BytesStart<'_>, name: &[u8]) -> anyhow::Result<Option<String>> {
    for a in e.attributes() {
        let a = a?;
        if a.key.local_name().as_ref() == name {
            return Ok(Some(a.unescape_value()?.trim().to_string()));
        }
    }
    Ok(None)
}

/// Handle `<link>` / `<enclosure>` attributes on an item.
fn apply_link_attrs(item: &mut FeedItem, e: &BytesStart<'_>) -> anyhow::Result<()> {
    match e.local_name().as_ref() {
        b"enclosure" => {
            if let Some(url) = attr(e, b"url")?.filter(|u| !u.is_empty()) {
                item.enclosure.get_or_insert(url);
            }
        }
        b"link" => {
            if let Some(href) = attr(e, b"href")?.filter(|h| !h.is_empty()) {
                let rel = attr(e, b"rel")?;
                if rel.as_deref() == Some("enclosure") {
                    item.enclosure.get_or_insert(href);
                } else if rel.is_none() || rel.as_deref() == Some("alternate") {
                    item.link.get_or_insert(href);
                }
            }
        }
        _ => {}
    }
    Ok(())
}

pub fn parse_feed(body: &str) -> anyhow::Result<Vec<DocumentRef>> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut refs = Vec::new();
    let mut current: Option<FeedItem> = None;
    let mut field: Option<FeedField> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"item" | b"entry" => current = Some(FeedItem::default()),
                b"title" if current.is_some() => field = Some(FeedField::Title),
                b"link" | b"enclosure" => {
                    if let Some(item) = current.as_mut() {
                        apply_link_attrs(item, &e)?;
                        field = Some(FeedField::Link);
                    }
                }
                _ => {}
            },
            Event::Empty(e) => {
                if let Some(item) = current.as_mut() {
                    apply_link_attrs(item, &e)?;
                }
            }
            Event::Text(t) => {
                let text = t.unescape()?;
                push_field_text(current.as_mut(), field, &text);
            }
            Event::CData(t) => {
                let raw = t.into_inner();
                let text = String::from_utf8_lossy(&raw);
                push_field_text(current.as_mut(), field, &text);
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"item" | b"entry" => {
                    if let Some(r) = current.take().and_then(FeedItem::into_ref) {
                        refs.push(r);
                    }
                    field = None;
                }
                b"title" | b"link" | b"enclosure" => field = None,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(refs)
}

fn push_field_text(item: Option<&mut FeedItem>, field: Option<FeedField>, text: &str) {
    let (Some(item), Some(field)) = (item, field) else {
        return;
    };
    match field {
        FeedField::Title => {
            if !item.title.is_empty() {
                item.title.push(' ');
            }
            item.title.push_str(text.trim());
        }
        FeedField::Link => {
            let link = text.trim();
            if !link.is_empty() {
                item.link.get_or_insert_with(|| link.to_string());
            }
        }
    }
}

// ============ JSON ============

fn is_http_url(s: &str) -> bool {
    let s = s.trim();
    s.starts_with("http://") || s.starts_with("https://")
}

/// A string URL, or an object carrying one under `url` / `href` / `texto`.
fn url_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if is_http_url(s) => Some(s.trim().to_string()),
        Value::Object(map) => NESTED_URL_FIELDS
            .iter()
            .filter_map(|k| map.get(*k))
            .find_map(|v| v.as_str().filter(|s| is_http_url(s)))
            .map(|s| s.trim().to_string()),
        _ => None,
    }
}

fn first_url(map: &serde_json::Map<String, Value>, fields: &[&str]) -> Option<String> {
    fields
        .iter()
        .filter_map(|k| map.get(*k))
        .find_map(url_value)
}

fn title_of(map: &serde_json::Map<String, Value>) -> Option<String> {
    TITLE_FIELDS
        .iter()
        .filter_map(|k| map.get(*k))
        .find_map(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn department_name(value: &Value) -> Option<&str> {
    value
        .get("nombre")
        .or_else(|| value.get("name"))
        .and_then(Value::as_str)
}

fn walk_json(value: &Value, department: Option<&str>, out: &mut Vec<DocumentRef>) {
    match value {
        Value::Array(items) => {
            for item in items {
                walk_json(item, department, out);
            }
        }
        Value::Object(map) => {
            // An object holding arrays of objects is a container (a page, a
            // section), even when it carries a link of its own such as a self URL.
            let is_container = map
                .values()
                .any(|v| v.as_array().is_some_and(|a| a.iter().any(Value::is_object)));
            let url = first_url(map, ATTACHMENT_FIELDS).or_else(|| first_url(map, LINK_FIELDS));
            if let Some(url) = url.filter(|_| !is_container) {
                out.push(DocumentRef {
                    url,
                    title: title_of(map),
                    department: department.map(|d| d.to_string()),
                });
                return;
            }

            for (key, child) in map {
                if key == "departamento" {
                    // A single department may be an object rather than a one-element array.
                    let departments: Vec<&Value> = match child {
                        Value::Array(items) => items.iter().collect(),
                        other => vec![other],
                    };
                    for dept in departments {
                        walk_json(dept, department_name(dept).or(department), out);
                    }
                } else {
                    walk_json(child, department, out);
                }
            }
        }
        _ => {}
    }
}
