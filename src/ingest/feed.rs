// src/ingest/feed.rs
//! Feed document parsing: RSS 2.0, RSS 1.0 (RDF) and Atom.
//!
//! The root element decides the format. Entries come back loosely typed
//! ([`FeedEntry`]); deciding which ones become articles is the caller's job.

use chrono::{DateTime, Utc};
use quick_xml::de::from_str;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Deserialize;
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::OffsetDateTime;

use crate::error::ParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedFormat {
    Rss,
    Rdf,
    Atom,
}

/// One entry as found in the document, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedEntry {
    pub title: Option<String>,
    pub link: Option<String>,
    pub date: Option<String>,
    pub summary: Option<String>,
}

/* ----------------------------
RSS 2.0 / RDF
---------------------------- */

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(default, rename = "item")]
    item: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct Rdf {
    #[serde(default, rename = "item")]
    item: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    guid: Option<Text>,
    #[serde(default, rename = "pubDate")]
    pub_date: Option<String>,
    #[serde(default, rename = "dc:date")]
    dc_date: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

/* ----------------------------
Atom
---------------------------- */

#[derive(Debug, Deserialize)]
struct Atom {
    #[serde(default, rename = "entry")]
    entry: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    #[serde(default)]
    title: Option<Text>,
    #[serde(default, rename = "link")]
    links: Vec<AtomLink>,
    #[serde(default)]
    published: Option<String>,
    #[serde(default)]
    updated: Option<String>,
    #[serde(default)]
    summary: Option<Text>,
    #[serde(default)]
    content: Option<Text>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(default, rename = "@href")]
    href: Option<String>,
    #[serde(default, rename = "@rel")]
    rel: Option<String>,
}

/// Element whose attributes we ignore and whose text we keep.
#[derive(Debug, Deserialize)]
struct Text {
    #[serde(default, rename = "$text")]
    value: Option<String>,
}

fn text(t: Option<Text>) -> Option<String> {
    t.and_then(|t| t.value)
}

/// Look at the first element to pick a format.
pub fn detect_format(xml: &str) -> Result<FeedFormat, ParseError> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let local = e.local_name();
                let name = String::from_utf8_lossy(local.as_ref()).to_ascii_lowercase();
                return match name.as_str() {
                    "rss" => Ok(FeedFormat::Rss),
                    "rdf" => Ok(FeedFormat::Rdf),
                    "feed" => Ok(FeedFormat::Atom),
                    _ => Err(ParseError::UnknownFormat(name)),
                };
            }
            Ok(Event::Eof) => return Err(ParseError::EmptyDocument),
            Ok(_) => continue,
            Err(e) => return Err(ParseError::Xml(e.to_string())),
        }
    }
}

/// Parse a whole feed document into raw entries.
pub fn parse_feed(xml: &str) -> Result<Vec<FeedEntry>, ParseError> {
    let xml = scrub_html_entities_for_xml(xml);
    let format = detect_format(&xml)?;
    let xml_err = |e: quick_xml::de::DeError| ParseError::Xml(e.to_string());

    let entries = match format {
        FeedFormat::Rss => {
            let rss: Rss = from_str(&xml).map_err(xml_err)?;
            rss.channel.item.into_iter().map(rss_entry).collect()
        }
        FeedFormat::Rdf => {
            let rdf: Rdf = from_str(&xml).map_err(xml_err)?;
            rdf.item.into_iter().map(rss_entry).collect()
        }
        FeedFormat::Atom => {
            let atom: Atom = from_str(&xml).map_err(xml_err)?;
            atom.entry.into_iter().map(atom_entry).collect()
        }
    };
    Ok(entries)
}

fn rss_entry(it: RssItem) -> FeedEntry {
    // Some feeds only carry a permalink guid.
    let link = non_empty(it.link).or_else(|| {
        non_empty(text(it.guid)).filter(|g| g.starts_with("http://") || g.starts_with("https://"))
    });
    FeedEntry {
        title: non_empty(it.title),
        link,
        date: non_empty(it.pub_date).or_else(|| non_empty(it.dc_date)),
        summary: non_empty(it.description),
    }
}

fn atom_entry(e: AtomEntry) -> FeedEntry {
    let link = e
        .links
        .iter()
        .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
        .or_else(|| e.links.first())
        .and_then(|l| l.href.clone());
    FeedEntry {
        title: non_empty(text(e.title)),
        link: non_empty(link),
        date: non_empty(e.published).or_else(|| non_empty(e.updated)),
        summary: non_empty(text(e.summary)).or_else(|| non_empty(text(e.content))),
    }
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Parse an RFC 2822 (`pubDate`) or RFC 3339 (Atom, `dc:date`) timestamp.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    let unix = OffsetDateTime::parse(s, &Rfc2822)
        .or_else(|_| OffsetDateTime::parse(s, &Rfc3339))
        .map(|dt| dt.unix_timestamp())
        .ok()
        // chrono is more lenient with obsolete zone names ("EST", "PDT").
        .or_else(|| chrono::DateTime::parse_from_rfc2822(s).ok().map(|d| d.timestamp()));
    unix.and_then(|t| DateTime::from_timestamp(t, 0))
}

/// XML only knows five entities; feeds routinely use HTML ones.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}
