use std::collections::HashMap;

use serde::Serialize;
use time::{Duration, OffsetDateTime};

use crate::parse::parse_url_domain;
use crate::tweet::TweetRecord;

/// Links to this domain are tweet permalinks and quotes, not outbound links.
const IGNORED_DOMAIN: &str = "twitter.com";

pub const WEEKDAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// Decides which offset shifts a tweet's UTC creation time.
///
/// A manual offset always wins. Otherwise the author's declared offset is used
/// unless automatic adjustment is disabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimezonePolicy {
    pub manual_offset: Option<i64>,
    pub auto_adjust: bool,
}

impl TimezonePolicy {
    pub fn new(manual_offset: Option<i64>, auto_adjust: bool) -> Self {
        Self {
            manual_offset,
            auto_adjust,
        }
    }

    /// Offset in seconds applied for an author with the given declared offset.
    pub fn offset_for(&self, author_offset: Option<i64>) -> i64 {
        match (self.manual_offset, author_offset) {
            (Some(manual), _) => manual,
            (None, Some(author)) if self.auto_adjust => author,
            _ => 0,
        }
    }

    pub fn resolve(&self, tweet: &TweetRecord) -> OffsetDateTime {
        let offset = self.offset_for(tweet.author_utc_offset);
        match tweet.created_at.checked_add(Duration::seconds(offset)) {
            Some(timestamp) => timestamp,
            None => {
                tracing::warn!(
                    offset,
                    created_at = %tweet.created_at,
                    "utc offset out of range, using the raw timestamp"
                );
                tweet.created_at
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FrequencyCounter {
    counts: HashMap<String, u64>,
}

impl FrequencyCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&mut self, key: &str) {
        *self.counts.entry(key.to_owned()).or_insert(0) += 1;
    }

    pub fn get(&self, key: &str) -> u64 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl<K: AsRef<str>> FromIterator<(K, u64)> for FrequencyCounter {
    fn from_iter<I: IntoIterator<Item = (K, u64)>>(iter: I) -> Self {
        let mut counter = Self::new();
        for (key, count) in iter {
            *counter.counts.entry(key.as_ref().to_owned()).or_insert(0) += count;
        }
        counter
    }
}

/// Tweets per (weekday, hour) with Monday as row 0.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivityMatrix {
    cells: [[u64; 24]; 7],
}

#[derive(Debug, Clone, Serialize)]
pub struct MatrixExport {
    pub cells: [[u64; 24]; 7],
    pub row_labels: Vec<String>,
    pub col_labels: Vec<String>,
}

impl MatrixExport {
    /// Count in the busiest cell.
    pub fn max(&self) -> u64 {
        self.cells.iter().flatten().copied().max().unwrap_or(0)
    }
}

impl ActivityMatrix {
    pub fn record(&mut self, timestamp: OffsetDateTime) {
        let day = timestamp.weekday().number_days_from_monday() as usize;
        let hour = timestamp.hour() as usize;
        self.cells[day][hour] += 1;
    }

    pub fn get(&self, day: usize, hour: usize) -> u64 {
        self.cells[day][hour]
    }

    pub fn total(&self) -> u64 {
        self.cells.iter().flatten().sum()
    }

    pub fn export(&self) -> MatrixExport {
        MatrixExport {
            cells: self.cells,
            row_labels: WEEKDAYS.iter().map(|d| d.to_string()).collect(),
            col_labels: (0..24).map(|h| format!("{h:02}:00")).collect(),
        }
    }
}

/// Oldest and newest effective timestamps seen, for a newest-first sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunRange {
    pub start_date: Option<OffsetDateTime>,
    pub end_date: Option<OffsetDateTime>,
}

impl RunRange {
    pub fn observe(&mut self, timestamp: OffsetDateTime) {
        if self.end_date.is_none() {
            self.end_date = Some(timestamp);
        }
        self.start_date = Some(timestamp);
    }

    pub fn days(&self) -> Option<i64> {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => Some((end - start).whole_days()),
            _ => None,
        }
    }
}

/// Owns every tally collected during one run.
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    policy: TimezonePolicy,
    processed: u64,
    pub urls: FrequencyCounter,
    pub hashtags: FrequencyCounter,
    pub mentions: FrequencyCounter,
    pub retweets: FrequencyCounter,
    pub locations: FrequencyCounter,
    pub devices: FrequencyCounter,
    pub languages: FrequencyCounter,
    pub activity: ActivityMatrix,
    pub range: RunRange,
}

impl Aggregator {
    pub fn new(policy: TimezonePolicy) -> Self {
        Self {
            policy,
            ..Default::default()
        }
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }

    pub fn process(&mut self, tweet: &TweetRecord) {
        let timestamp = self.policy.resolve(tweet);

        self.range.observe(timestamp);
        self.activity.record(timestamp);

        for url in &tweet.urls {
            if let Some(domain) = parse_url_domain(url) {
                if domain != IGNORED_DOMAIN {
                    self.urls.increment(&domain);
                }
            }
        }

        if let Some(user) = &tweet.retweeted_user {
            self.retweets.increment(user);
        }

        for hashtag in &tweet.hashtags {
            self.hashtags.increment(hashtag);
        }

        for mention in &tweet.mentions {
            self.mentions.increment(mention);
        }

        if let Some(place) = &tweet.place {
            self.locations.increment(place);
        }

        self.devices.increment(&tweet.source);

        if let Some(lang) = &tweet.lang {
            self.languages.increment(lang);
        }

        self.processed += 1;
    }

    /// Counters in display order, with their table titles.
    pub fn counters(&self) -> [(&'static str, &FrequencyCounter); 7] {
        [
            ("hashtags", &self.hashtags),
            ("mentioned users", &self.mentions),
            ("retweeted users", &self.retweets),
            ("linked domains", &self.urls),
            ("locations", &self.locations),
            ("devices", &self.devices),
            ("languages", &self.languages),
        ]
    }
}
