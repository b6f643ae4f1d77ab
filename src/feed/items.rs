use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{AppError, Result};
use crate::models::FeedItems;

use super::fetcher::PageFetcher;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Guid,
    PubDate,
}

impl Field {
    fn from_name(name: &[u8]) -> Option<Self> {
        if name.eq_ignore_ascii_case(b"guid") {
            Some(Field::Guid)
        } else if name.eq_ignore_ascii_case(b"pubdate") {
            Some(Field::PubDate)
        } else {
            None
        }
    }
}

#[derive(Default)]
struct PendingItem {
    guid: Option<String>,
    pub_date: Option<String>,
}

impl PendingItem {
    fn slot(&mut self, field: Field) -> &mut Option<String> {
        match field {
            Field::Guid => &mut self.guid,
            Field::PubDate => &mut self.pub_date,
        }
    }
}

/// Fetch a feed and list its items' links and publish dates.
///
/// A feed that answers with an error status lists nothing. Transport and
/// parse failures are returned to the caller.
pub async fn list_items<F>(fetcher: &F, feed_url: &str) -> Result<FeedItems>
where
    F: PageFetcher + ?Sized,
{
    let xml = match fetcher.fetch_text(feed_url).await {
        Ok(xml) => xml,
        Err(AppError::Status { status, .. }) => {
            tracing::warn!("Feed {} answered HTTP {}, no items listed", feed_url, status);
            return Ok(FeedItems::default());
        }
        Err(e) => return Err(e),
    };
    parse_feed_items(&xml)
}

/// Extract `guid` and `pubDate` text from every `<item>`, in document order.
///
/// Dates are kept exactly as published. An item missing either element makes
/// the whole document invalid.
pub fn parse_feed_items(xml: &str) -> Result<FeedItems> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().check_end_names = false;

    let mut items = FeedItems::default();
    let mut current: Option<PendingItem> = None;
    // The field whose text is being collected, and whether it is the first
    // occurrence within the item.
    let mut capturing: Option<(Field, bool)> = None;
    let mut buf = String::new();

    loop {
        let event = reader.read_event().map_err(|e| {
            AppError::Feed(format!("XML error at byte {}: {}", reader.buffer_position(), e))
        })?;

        match event {
            Event::Start(e) => {
                let name = e.local_name();
                if name.as_ref().eq_ignore_ascii_case(b"item") {
                    current = Some(PendingItem::default());
                    capturing = None;
                } else if let (Some(item), Some(field)) =
                    (current.as_mut(), Field::from_name(name.as_ref()))
                {
                    buf.clear();
                    capturing = Some((field, item.slot(field).is_none()));
                }
            }
            Event::Empty(e) => {
                if let (Some(item), Some(field)) =
                    (current.as_mut(), Field::from_name(e.local_name().as_ref()))
                {
                    item.slot(field).get_or_insert_with(String::new);
                }
            }
            Event::Text(e) => {
                if capturing.is_some() {
                    let text = e.unescape().map_err(|e| AppError::Feed(e.to_string()))?;
                    buf.push_str(&text);
                }
            }
            Event::CData(e) => {
                if capturing.is_some() {
                    buf.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::End(e) => {
                let name = e.local_name();
                if name.as_ref().eq_ignore_ascii_case(b"item") {
                    if let Some(item) = current.take() {
                        let index = items.len() + 1;
                        let guid = item
                            .guid
                            .ok_or_else(|| AppError::Feed(format!("item {index} has no guid")))?;
                        let pub_date = item
                            .pub_date
                            .ok_or_else(|| AppError::Feed(format!("item {index} has no pubDate")))?;
                        items.push(guid, pub_date);
                    }
                    capturing = None;
                } else if let Some((field, first)) = capturing {
                    if Field::from_name(name.as_ref()) == Some(field) {
                        if first {
                            if let Some(item) = current.as_mut() {
                                *item.slot(field) = Some(buf.trim().to_string());
                            }
                        }
                        capturing = None;
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(items)
}
