use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::AnalyzerError;
use crate::parse::{parse_created_at, parse_source_text};

/// A status as returned by `statuses/user_timeline.json`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Tweet {
    pub id: u64,
    pub created_at: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub lang: Option<String>,
    pub user: User,
    #[serde(default)]
    pub entities: Entities,
    #[serde(default)]
    pub retweeted_status: Option<Box<Tweet>>,
    #[serde(default)]
    pub place: Option<Place>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct User {
    #[serde(default)]
    pub id: u64,
    pub screen_name: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub followers_count: u64,
    #[serde(default)]
    pub friends_count: u64,
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(default)]
    pub geo_enabled: bool,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub time_zone: Option<String>,
    #[serde(default)]
    pub utc_offset: Option<i64>,
    #[serde(default)]
    pub statuses_count: u64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Entities {
    #[serde(default)]
    pub hashtags: Vec<Hashtag>,
    #[serde(default)]
    pub urls: Vec<UrlEntity>,
    #[serde(default)]
    pub user_mentions: Vec<UserMention>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Hashtag {
    pub text: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UrlEntity {
    #[serde(default)]
    pub expanded_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UserMention {
    pub screen_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Place {
    pub name: String,
}

/// The fields of a tweet the aggregator consumes, detached from the wire format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TweetRecord {
    pub created_at: OffsetDateTime,
    pub author_utc_offset: Option<i64>,
    pub urls: Vec<String>,
    pub hashtags: Vec<String>,
    pub mentions: Vec<String>,
    pub retweeted_user: Option<String>,
    pub place: Option<String>,
    pub source: String,
    pub lang: Option<String>,
}

impl TryFrom<&Tweet> for TweetRecord {
    type Error = AnalyzerError;

    fn try_from(tweet: &Tweet) -> Result<Self, Self::Error> {
        let created_at = parse_created_at(&tweet.created_at)?;

        Ok(Self {
            created_at,
            author_utc_offset: tweet.user.utc_offset,
            urls: tweet
                .entities
                .urls
                .iter()
                .filter_map(|u| u.expanded_url.clone())
                .collect(),
            hashtags: tweet
                .entities
                .hashtags
                .iter()
                .map(|h| h.text.clone())
                .collect(),
            mentions: tweet
                .entities
                .user_mentions
                .iter()
                .map(|m| m.screen_name.clone())
                .collect(),
            retweeted_user: tweet
                .retweeted_status
                .as_ref()
                .map(|rt| rt.user.screen_name.clone()),
            place: tweet.place.as_ref().map(|p| p.name.clone()),
            source: parse_source_text(&tweet.source),
            lang: tweet.lang.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> serde_json::Value {
        json!({
            "id": 1050118621198921728u64,
            "created_at": "Wed Oct 10 20:19:24 +0000 2018",
            "source": "<a href=\"http://twitter.com/download/iphone\" rel=\"nofollow\">Twitter for iPhone</a>",
            "lang": "en",
            "user": { "id": 6253282, "screen_name": "TwitterAPI", "utc_offset": -25200 },
            "entities": {
                "hashtags": [{ "text": "rustlang", "indices": [0, 9] }],
                "urls": [
                    { "url": "https://t.co/x", "expanded_url": "https://www.rust-lang.org/learn" },
                    { "url": "https://t.co/y", "expanded_url": null }
                ],
                "user_mentions": [{ "screen_name": "rustlang", "id": 1 }]
            },
            "place": { "name": "Berlin", "full_name": "Berlin, Germany" }
        })
    }

    #[test]
    fn record_from_full_tweet() {
        let tweet: Tweet = serde_json::from_value(sample()).unwrap();
        let record = TweetRecord::try_from(&tweet).unwrap();

        assert_eq!(record.created_at.unix_timestamp(), 1_539_202_764);
        assert_eq!(record.author_utc_offset, Some(-25200));
        assert_eq!(record.urls, vec!["https://www.rust-lang.org/learn"]);
        assert_eq!(record.hashtags, vec!["rustlang"]);
        assert_eq!(record.mentions, vec!["rustlang"]);
        assert_eq!(record.retweeted_user, None);
        assert_eq!(record.place.as_deref(), Some("Berlin"));
        assert_eq!(record.source, "Twitter for iPhone");
        assert_eq!(record.lang.as_deref(), Some("en"));
    }

    #[test]
    fn record_from_retweet() {
        let mut value = sample();
        value["retweeted_status"] = json!({
            "id": 2,
            "created_at": "Tue Oct 09 10:00:00 +0000 2018",
            "user": { "screen_name": "alice" }
        });
        let tweet: Tweet = serde_json::from_value(value).unwrap();
        let record = TweetRecord::try_from(&tweet).unwrap();

        assert_eq!(record.retweeted_user.as_deref(), Some("alice"));
    }

    #[test]
    fn record_without_entities() {
        let tweet: Tweet = serde_json::from_value(json!({
            "id": 3,
            "created_at": "Wed Oct 10 20:19:24 +0000 2018",
            "source": "web",
            "user": { "screen_name": "bob" }
        }))
        .unwrap();
        let record = TweetRecord::try_from(&tweet).unwrap();

        assert!(record.urls.is_empty());
        assert!(record.hashtags.is_empty());
        assert!(record.mentions.is_empty());
        assert_eq!(record.place, None);
        assert_eq!(record.source, "web");
    }

    #[test]
    fn record_rejects_bad_timestamp() {
        let mut value = sample();
        value["created_at"] = json!("yesterday");
        let tweet: Tweet = serde_json::from_value(value).unwrap();

        assert!(matches!(
            TweetRecord::try_from(&tweet),
            Err(AnalyzerError::Parse(_))
        ));
    }
}
