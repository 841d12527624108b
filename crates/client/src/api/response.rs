//! Paginated response envelope.

use serde::Deserialize;
use serde_json::Value;

/// One page from a notes or listings endpoint.
///
/// `result` is `null` on some empty pages, so every field tolerates absence.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub result: Option<Vec<Value>>,
    #[serde(default)]
    pub result_count: Option<u64>,
    #[serde(default)]
    pub total_count: Option<u64>,
}

impl Page {
    pub fn parse(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// The page's records, consuming the page.
    pub fn into_records(self) -> Vec<Value> {
        self.result.unwrap_or_default()
    }
}

/// Decide whether another page should be requested.
///
/// Stops on an empty page, once `collected` reaches the server's
/// `total_count`, or on a short page when no total is reported.
pub fn has_more(received: usize, collected: usize, limit: u32, total_count: Option<u64>) -> bool {
    if received == 0 {
        return false;
    }
    match total_count {
        Some(total) => (collected as u64) < total,
        None => received >= limit as usize,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_envelope() {
        let page = Page::parse(br#"{"result":[{"listing_number":1}],"result_count":1,"total_count":40}"#).unwrap();
        assert_eq!(page.total_count, Some(40));
        assert_eq!(page.into_records().len(), 1);
    }

    #[test]
    fn test_parse_null_result() {
        let page = Page::parse(br#"{"result":null,"result_count":0}"#).unwrap();
        assert!(page.total_count.is_none());
        assert!(page.into_records().is_empty());
    }

    #[test]
    fn test_has_more() {
        assert!(!has_more(0, 50, 25, Some(100)));
        assert!(has_more(25, 25, 25, Some(100)));
        assert!(!has_more(25, 100, 25, Some(100)));
        // a server reporting fewer than it sent still terminates
        assert!(!has_more(25, 25, 25, Some(10)));
        assert!(has_more(25, 25, 25, None));
        assert!(!has_more(7, 32, 25, None));
    }
}
