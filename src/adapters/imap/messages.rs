use async_imap::types::{Fetch, Flag};
use futures::{Stream, StreamExt, TryStreamExt};
use tracing::warn;

use super::connection::MailSession;
use crate::types::error::{MailtraceError, Result};

/// The raw bytes and flags of one message in a fetched window, before
/// any parsing has been attempted.
pub struct RawMessage {
    pub sequence_id: u32,
    pub is_read: bool,
    pub body: Vec<u8>,
}

pub struct RawWindow {
    pub total: u32,
    pub items: Vec<RawMessage>,
}

/// Sequence-number window for reverse-chronological page `offset / limit`
/// over a folder of `total` messages. The remote numbers messages from
/// the oldest (1) upward, so the newest page sits at the top of the
/// range. `None` means the page is past the end — an empty result, not
/// an error.
pub fn page_window(total: u32, limit: usize, offset: usize) -> Option<(u32, u32)> {
    if total == 0 || limit == 0 {
        return None;
    }

    let total = total as i64;
    let limit = limit as i64;
    let offset = offset as i64;

    let start = std::cmp::max(1, total - offset - limit + 1);
    let end = total - offset;

    if start > end {
        return None;
    }

    Some((start as u32, end as u32))
}

/// Collects a FETCH stream tolerantly — logs and skips individual
/// responses that fail to parse. Returns all successfully parsed Fetch
/// items.
pub async fn collect_tolerant<E: std::fmt::Display>(
    stream: impl Stream<Item = std::result::Result<Fetch, E>>,
    context: &str,
) -> Vec<Fetch> {
    futures::pin_mut!(stream);
    let mut items = Vec::new();
    while let Some(result) = stream.next().await {
        match result {
            Ok(fetch) => items.push(fetch),
            Err(e) => {
                warn!("Skipping unparseable IMAP response ({}): {}", context, e);
            }
        }
    }
    items
}

/// SELECT the folder and fetch one page window of raw messages, newest
/// page first. Flags ride along so read state never needs a second
/// round trip; BODY.PEEK keeps the fetch from setting \Seen itself.
pub async fn fetch_window(
    session: &mut MailSession,
    folder: &str,
    limit: usize,
    offset: usize,
) -> Result<RawWindow> {
    let mailbox = session.select_folder(folder).await?;
    let total = mailbox.exists;

    let Some((start, end)) = page_window(total, limit, offset) else {
        return Ok(RawWindow {
            total,
            items: Vec::new(),
        });
    };

    let seq_set = format!("{}:{}", start, end);
    let fetches = collect_tolerant(
        session
            .session
            .fetch(&seq_set, "(FLAGS BODY.PEEK[])")
            .await
            .map_err(|e| MailtraceError::Protocol(format!("FETCH failed: {}", e)))?,
        folder,
    )
    .await;

    let items = fetches
        .iter()
        .filter_map(|fetch| {
            let body = fetch.body()?;
            Some(RawMessage {
                sequence_id: fetch.message,
                is_read: fetch.flags().any(|f| f == Flag::Seen),
                body: body.to_vec(),
            })
        })
        .collect();

    Ok(RawWindow { total, items })
}

/// Add or remove \Seen on one message, by sequence id, in the given
/// folder. The folder is selected first; sequence ids only mean anything
/// relative to that selection.
pub async fn set_read_state(
    session: &mut MailSession,
    folder: &str,
    sequence_id: u32,
    read: bool,
) -> Result<()> {
    session.select_folder(folder).await?;

    let query = if read {
        "+FLAGS (\\Seen)"
    } else {
        "-FLAGS (\\Seen)"
    };

    let updates = session
        .session
        .store(sequence_id.to_string(), query)
        .await
        .map_err(|e| MailtraceError::Protocol(format!("STORE failed: {}", e)))?;

    // The server echoes the updated flags; drain them so the session is
    // ready for the next command.
    updates
        .try_collect::<Vec<_>>()
        .await
        .map_err(|e| MailtraceError::Protocol(format!("STORE response failed: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_counts_from_the_newest_message() {
        // 100 messages, pages of 20: page 1 is the newest 20
        assert_eq!(page_window(100, 20, 0), Some((81, 100)));
        assert_eq!(page_window(100, 20, 20), Some((61, 80)));
        assert_eq!(page_window(100, 20, 80), Some((1, 20)));
    }

    #[test]
    fn window_clamps_the_last_partial_page() {
        // 15 messages, pages of 10: page 2 holds the oldest 5
        assert_eq!(page_window(15, 10, 10), Some((1, 5)));
    }

    #[test]
    fn window_past_the_end_is_empty_not_an_error() {
        assert_eq!(page_window(15, 10, 20), None);
        assert_eq!(page_window(15, 10, 15), None);
        assert_eq!(page_window(0, 10, 0), None);
    }

    #[test]
    fn window_never_exceeds_limit_and_never_underflows() {
        for total in [0u32, 1, 5, 19, 20, 21, 100, 1000] {
            for limit in [1usize, 7, 20, 50] {
                for page in 1usize..=8 {
                    let offset = (page - 1) * limit;
                    if let Some((start, end)) = page_window(total, limit, offset) {
                        assert!(start >= 1, "start {} for t={} l={} o={}", start, total, limit, offset);
                        assert!(end <= total);
                        assert!((end - start + 1) as usize <= limit);
                    } else {
                        assert!(total == 0 || offset >= total as usize);
                    }
                }
            }
        }
    }
}
