use std::collections::BTreeMap;
use std::io::{IsTerminal, Write};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use reqwest::Client;
use serde::Serialize;
use time::OffsetDateTime;
use tracing_subscriber::EnvFilter;
use tweet_analyzer::report::{self, HeatmapTitle, RankedEntry, DEFAULT_TOP};
use tweet_analyzer::stats::{MatrixExport, TimezonePolicy};
use tweet_analyzer::{
    analyze_timeline, fetch_bearer_token, format_timestamp, parse_screen_name, tweets_to_fetch,
    AnalyzerError, TwitterClient, User, DEFAULT_API_BASE,
};

/// Twitter profile analyzer
#[derive(Parser)]
#[command(version, override_usage = "tweet-analyzer -n <screen_name> [options]")]
struct Args {
    /// Target screen name
    #[arg(short, long, value_name = "screen_name", value_parser = parse_screen_name)]
    name: String,

    /// Limit the number of tweets to retrieve
    #[arg(short, long, value_name = "N", default_value_t = 1000)]
    limit: u64,

    /// Manually apply a timezone offset (in seconds)
    #[arg(
        long,
        allow_negative_numbers = true,
        value_parser = clap::value_parser!(i64).range(-86_400..=86_400)
    )]
    utc_offset: Option<i64>,

    /// Don't shift tweets into the account's declared timezone
    #[arg(long)]
    no_timezone: bool,

    /// Rows per table
    #[arg(long, value_name = "N", default_value_t = DEFAULT_TOP)]
    top: usize,

    /// Skip the activity heatmap
    #[arg(long)]
    no_heatmap: bool,

    /// Print the analysis as a single JSON document
    #[arg(long)]
    json: bool,

    #[arg(long, env = "TWITTER_CONSUMER_KEY", hide_env_values = true)]
    consumer_key: Option<String>,

    #[arg(long, env = "TWITTER_CONSUMER_SECRET", hide_env_values = true)]
    consumer_secret: Option<String>,

    /// Application bearer token, used instead of the consumer key pair
    #[arg(long, env = "TWITTER_BEARER_TOKEN", hide_env_values = true)]
    bearer_token: Option<String>,

    #[arg(long, env = "TWITTER_API_BASE", default_value = DEFAULT_API_BASE, hide = true)]
    api_base: String,
}

#[derive(Serialize)]
struct Analysis<'a> {
    user: &'a User,
    tweets: u64,
    utc_offset: i64,
    start_date: Option<String>,
    end_date: Option<String>,
    rankings: BTreeMap<&'static str, Vec<RankedEntry>>,
    activity: MatrixExport,
}

/// Single line progress bar on stderr, redrawn in place.
struct Progress {
    total: usize,
    done: usize,
    visible: bool,
}

impl Progress {
    const WIDTH: usize = 30;

    fn new(total: usize, visible: bool) -> Self {
        Self {
            total,
            done: 0,
            visible,
        }
    }

    fn tick(&mut self) {
        self.done += 1;
        if !self.visible {
            return;
        }
        let percent = self.done * 100 / self.total.max(1);
        let filled = (self.done * Self::WIDTH / self.total.max(1)).min(Self::WIDTH);
        let mut stderr = std::io::stderr().lock();
        let _ = write!(
            stderr,
            "\r{percent:3}%|{}{}| {}/{}",
            "#".repeat(filled),
            " ".repeat(Self::WIDTH - filled),
            self.done,
            self.total
        );
        let _ = stderr.flush();
    }
}

impl Drop for Progress {
    fn drop(&mut self) {
        if self.visible && self.done > 0 {
            eprintln!();
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<AnalyzerError>() {
                Some(twitter) if twitter.is_api_error() => eprintln!("Twitter error: {twitter}"),
                _ => {
                    eprintln!("Error: {e}");
                    eprintln!("{e:?}");
                }
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let client = Client::builder()
        .timeout(Duration::from_secs(10))
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("unable to build http client")?;

    let bearer_token = match (args.bearer_token, args.consumer_key, args.consumer_secret) {
        (Some(token), _, _) => token,
        (None, Some(key), Some(secret)) => {
            fetch_bearer_token(&client, &args.api_base, &key, &secret).await?
        }
        _ => {
            return Err(AnalyzerError::Auth(
                "set TWITTER_BEARER_TOKEN, or TWITTER_CONSUMER_KEY and TWITTER_CONSUMER_SECRET"
                    .to_owned(),
            )
            .into())
        }
    };

    let twitter = TwitterClient::builder()
        .client(client)
        .api_base(args.api_base)
        .bearer_token(bearer_token)
        .build();

    let verbose = !args.json;
    if verbose {
        println!("[[-]] Getting @{} account information...", args.name);
    }
    let user = twitter.lookup_user(&args.name).await?;
    let count = tweets_to_fetch(args.limit, &user);

    if verbose {
        print_profile(&user, args.utc_offset);
        println!("[[-]] Retrieving last {count} tweets...");
    }

    let policy = TimezonePolicy::new(args.utc_offset, !args.no_timezone);
    let aggregator = {
        let mut progress = Progress::new(count, verbose && std::io::stderr().is_terminal());
        analyze_timeline(&twitter, &user, args.limit, policy, || progress.tick()).await?
    };
    let Some(aggregator) = aggregator else {
        return Ok(());
    };

    let utc_offset = policy.offset_for(user.utc_offset);

    if args.json {
        let analysis = Analysis {
            user: &user,
            tweets: aggregator.processed(),
            utc_offset,
            start_date: aggregator.range.start_date.map(format_timestamp),
            end_date: aggregator.range.end_date.map(format_timestamp),
            rankings: aggregator
                .counters()
                .into_iter()
                .map(|(title, counter)| (title, report::rank(counter, args.top)))
                .collect(),
            activity: aggregator.activity.export(),
        };
        println!("{}", serde_json::to_string_pretty(&analysis)?);
        return Ok(());
    }

    if let (Some(start), Some(end), Some(days)) = (
        aggregator.range.start_date,
        aggregator.range.end_date,
        aggregator.range.days(),
    ) {
        println!(
            "[[-]] Success! Tweets retrieved from {} to {} ({days} days)",
            format_timestamp(start),
            format_timestamp(end),
        );
    }
    println!();

    let color = std::io::stdout().is_terminal();
    for (title, counter) in aggregator.counters() {
        println!("{}", report::render_table(title, counter, args.top, color));
    }

    if !args.no_heatmap {
        let title = HeatmapTitle {
            screen_name: &args.name,
            generated: OffsetDateTime::now_utc(),
            tweets: aggregator.processed(),
            utc_offset,
        };
        print!(
            "{}",
            report::render_heatmap(&aggregator.activity.export(), &title, color)
        );
    }

    Ok(())
}

fn print_profile(user: &User, utc_offset: Option<i64>) {
    let show = |value: &Option<String>| value.clone().unwrap_or_else(|| "None".to_owned());

    println!("[[-]] name           : {}", user.name);
    println!("[[-]] description    : {}", show(&user.description));
    println!("[[-]] followers      : {}", user.followers_count);
    println!("[[-]] following      : {}", user.friends_count);
    println!("[[-]] language       : {}", show(&user.lang));
    println!("[[-]] geo enabled    : {}", user.geo_enabled);
    println!("[[-]] location       : {}", show(&user.location));
    println!("[[-]] time zone      : {}", show(&user.time_zone));
    println!(
        "[[-]] utc offset     : {}",
        user.utc_offset
            .map(|o| o.to_string())
            .unwrap_or_else(|| "None".to_owned())
    );
    if let Some(offset) = utc_offset {
        println!("[[!]] applying timezone offset of {offset} s");
    }
    println!("[[-]] tweets         : {}", user.statuses_count);
    println!();
}
