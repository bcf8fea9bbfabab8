//! Bounded date ⇄ text cache.
//!
//! Formatting and parsing ISO dates is hot when a schema stores dates as
//! strings. Both directions are memoized in moka caches bounded at
//! [`DEFAULT_CAPACITY`] entries each; eviction is approximate LRU.

use std::sync::Arc;

use chrono::NaiveDate;
use moka::sync::Cache;
use once_cell::sync::Lazy;

use crate::error::ConversionError;

/// Entries kept per direction.
pub const DEFAULT_CAPACITY: u64 = 2_000;

/// Memoized ISO-8601 (`YYYY-MM-DD`) date conversions.
pub struct DateStringCache {
    to_text: Cache<NaiveDate, Arc<str>>,
    from_text: Cache<Arc<str>, NaiveDate>,
}

static GLOBAL_DATE_CACHE: Lazy<Arc<DateStringCache>> =
    Lazy::new(|| Arc::new(DateStringCache::new(DEFAULT_CAPACITY)));

impl DateStringCache {
    pub fn new(capacity: u64) -> Self {
        Self {
            to_text: Cache::builder().max_capacity(capacity).build(),
            from_text: Cache::builder().max_capacity(capacity).build(),
        }
    }

    /// The process-wide cache used by default.
    pub fn global() -> Arc<DateStringCache> {
        Arc::clone(&GLOBAL_DATE_CACHE)
    }

    pub fn format(&self, date: NaiveDate) -> Arc<str> {
        self.to_text
            .get_with(date, || Arc::from(date.format("%Y-%m-%d").to_string()))
    }

    pub fn parse(&self, text: &str) -> Result<NaiveDate, ConversionError> {
        if let Some(date) = self.from_text.get(text) {
            return Ok(date);
        }
        let date = NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .map_err(|e| ConversionError::invalid("date", format!("'{}': {}", text, e)))?;
        self.from_text.insert(Arc::from(text), date);
        Ok(date)
    }

    /// Approximate number of cached entries in both directions.
    pub fn entry_count(&self) -> u64 {
        self.to_text.run_pending_tasks();
        self.from_text.run_pending_tasks();
        self.to_text.entry_count() + self.from_text.entry_count()
    }
}

impl std::fmt::Debug for DateStringCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DateStringCache")
            .field("to_text", &self.to_text.entry_count())
            .field("from_text", &self.from_text.entry_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_and_parse() {
        let cache = DateStringCache::new(16);
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(&*cache.format(date), "2024-02-29");
        assert_eq!(cache.parse("2024-02-29").unwrap(), date);
        // second lookups hit the cache
        assert_eq!(cache.parse("2024-02-29").unwrap(), date);
        assert_eq!(cache.entry_count(), 2);
    }

    #[test]
    fn test_invalid_text() {
        let cache = DateStringCache::new(16);
        assert!(cache.parse("2023-02-29").is_err());
        assert!(cache.parse("yesterday").is_err());
    }

    #[test]
    fn test_bounded() {
        let cache = DateStringCache::new(8);
        let start = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
        for day in 0..200 {
            cache.format(start + chrono::Duration::days(day));
        }
        assert!(cache.entry_count() <= 16);
    }
}
