mod error;
mod parse;
pub mod report;
pub mod stats;
mod tweet;

use std::collections::VecDeque;

use futures_util::{Stream, StreamExt};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use stats::{Aggregator, TimezonePolicy};
use typed_builder::TypedBuilder;

pub use error::AnalyzerError;
pub use parse::{format_timestamp, parse_screen_name};
pub use tweet::{Entities, Hashtag, Place, Tweet, TweetRecord, UrlEntity, User, UserMention};

pub const DEFAULT_API_BASE: &str = "https://api.twitter.com";

/// Largest page `statuses/user_timeline` will return.
const MAX_PAGE_SIZE: usize = 200;

#[derive(TypedBuilder)]
pub struct TwitterClient {
    client: Client,

    #[builder(setter(into), default = DEFAULT_API_BASE.to_owned())]
    api_base: String,

    #[builder(setter(into))]
    bearer_token: String,
}

#[derive(Default, Debug)]
struct TimelineState {
    screen_name: String,
    limit: usize,
    tweets: VecDeque<Tweet>,
    max_id: Option<u64>,
    count: usize,
    exhausted: bool,
    errored: bool,
}

#[derive(Deserialize)]
struct TokenResponse {
    token_type: String,
    access_token: String,
}

/// Exchange consumer credentials for an application-only bearer token.
pub async fn fetch_bearer_token(
    client: &Client,
    api_base: &str,
    consumer_key: &str,
    consumer_secret: &str,
) -> Result<String, AnalyzerError> {
    let url = format!("{}/oauth2/token", api_base.trim_end_matches('/'));
    let response = client
        .post(url)
        .basic_auth(
            urlencoding::encode(consumer_key),
            Some(urlencoding::encode(consumer_secret)),
        )
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded;charset=UTF-8")
        .body("grant_type=client_credentials")
        .send()
        .await?;

    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        let e = parse::parse_api_error(status.as_u16(), &text);
        return Err(AnalyzerError::Auth(e.to_string()));
    }

    let token: TokenResponse = serde_json::from_str(&text)
        .map_err(|e| AnalyzerError::Auth(format!("unexpected token response: {e}")))?;
    if !token.token_type.eq_ignore_ascii_case("bearer") {
        return Err(AnalyzerError::Auth(format!(
            "unexpected token type {:?}",
            token.token_type
        )));
    }

    tracing::info!("obtained application bearer token");
    Ok(token.access_token)
}

/// Number of tweets a run requests: the limit, capped by what the account has posted.
pub fn tweets_to_fetch(limit: u64, user: &User) -> usize {
    usize::try_from(limit.min(user.statuses_count)).unwrap_or(usize::MAX)
}

/// Fetch and tally the timeline of `user`.
///
/// Returns `None` without touching the timeline when there is nothing to fetch.
/// Any error while fetching discards everything tallied so far.
pub async fn analyze_timeline<F: FnMut()>(
    twitter: &TwitterClient,
    user: &User,
    limit: u64,
    policy: TimezonePolicy,
    mut on_tweet: F,
) -> Result<Option<Aggregator>, AnalyzerError> {
    let count = tweets_to_fetch(limit, user);
    if count == 0 {
        return Ok(None);
    }

    let mut aggregator = Aggregator::new(policy);
    let timeline = twitter.timeline(&user.screen_name, count);
    futures_util::pin_mut!(timeline);

    while let Some(tweet) = timeline.next().await {
        let tweet = tweet?;
        let record = TweetRecord::try_from(&tweet)?;
        aggregator.process(&record);
        on_tweet();
    }

    Ok(Some(aggregator))
}

impl TwitterClient {
    pub async fn lookup_user(&self, screen_name: &str) -> Result<User, AnalyzerError> {
        let url = format!(
            "{}/1.1/users/show.json?screen_name={}",
            self.base(),
            utf8_percent_encode(screen_name, NON_ALPHANUMERIC)
        );
        self.get_json(&url).await
    }

    /// Most recent tweets of `screen_name`, newest first, at most `limit` of them.
    ///
    /// The stream ends after the first error.
    pub fn timeline(
        &self,
        screen_name: &str,
        limit: usize,
    ) -> impl Stream<Item = Result<Tweet, AnalyzerError>> + '_ {
        let state = TimelineState {
            screen_name: screen_name.to_owned(),
            limit,
            ..Default::default()
        };

        futures_util::stream::unfold((self, state), |(api, mut state)| async move {
            // Stop if previously errored
            if state.errored {
                return None;
            }

            // Stop if limit reached
            if state.count >= state.limit {
                return None;
            }

            if state.tweets.is_empty() && !state.exhausted {
                match api.fetch_page(&state).await {
                    Ok(tweets) => {
                        match tweets.iter().map(|t| t.id).min() {
                            Some(oldest) if oldest > 0 => state.max_id = Some(oldest - 1),
                            _ => state.exhausted = true,
                        }
                        state.tweets.extend(tweets);
                    }
                    Err(e) => {
                        state.errored = true;
                        return Some((Err(e), (api, state)));
                    }
                }
            }

            let tweet = state.tweets.pop_front()?;
            state.count += 1;
            Some((Ok(tweet), (api, state)))
        })
    }

    async fn fetch_page(&self, state: &TimelineState) -> Result<Vec<Tweet>, AnalyzerError> {
        let count = (state.limit - state.count).min(MAX_PAGE_SIZE);
        let mut url = format!(
            "{}/1.1/statuses/user_timeline.json?screen_name={}&count={}&include_rts=true&tweet_mode=extended",
            self.base(),
            utf8_percent_encode(&state.screen_name, NON_ALPHANUMERIC),
            count,
        );
        if let Some(max_id) = state.max_id {
            url.push_str(&format!("&max_id={max_id}"));
        }

        let tweets: Vec<Tweet> = self.get_json(&url).await?;
        tracing::debug!(
            screen_name = state.screen_name.as_str(),
            requested = count,
            received = tweets.len(),
            max_id = ?state.max_id,
            "fetched timeline page"
        );
        Ok(tweets)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, AnalyzerError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.bearer_token)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(parse::parse_api_error(status.as_u16(), &text));
        }

        serde_json::from_str(&text).map_err(|e| AnalyzerError::Parse(e.to_string()))
    }

    fn base(&self) -> &str {
        self.api_base.trim_end_matches('/')
    }
}
