use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use clap::Parser;
use csv_export::CsvExporter;
use harvest_core::{
    AppConfig, CoreError, ErrorReporter, PostQuery, SortMode, TimeFilter, MAX_PAGE_SIZE,
};
use reddit_client::{RedditClient, RedditOAuth2Config};
use std::path::PathBuf;
use std::process::ExitCode;

const DATE_FORMAT: &str = "%d-%m-%y";

/// Fetch posts from a subreddit and write them to a CSV file.
#[derive(Debug, Parser)]
#[command(name = "reddit-harvest", version, about)]
struct Cli {
    /// Subreddit to read, without the `r/` prefix
    subreddit: String,

    /// Newest date of the walk (DD-MM-YY, default today)
    #[arg(long, value_parser = parse_date)]
    start: Option<NaiveDate>,

    /// Oldest date of the walk (DD-MM-YY, default one day before start)
    #[arg(long, value_parser = parse_date)]
    end: Option<NaiveDate>,

    /// Posts requested per page
    #[arg(long, default_value_t = MAX_PAGE_SIZE)]
    limit: u32,

    /// Listing order: hot, new, top, rising or controversial
    #[arg(long, default_value = "new", value_parser = parse_sort)]
    sort: SortMode,

    /// Period for top/controversial: hour, day, week, month, year or all
    #[arg(long = "time", value_parser = parse_time_filter)]
    time_filter: Option<TimeFilter>,

    /// Stop after this many pages
    #[arg(long)]
    max_pages: Option<u32>,

    /// Directory for the CSV file (overrides the config file)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// File name prefix
    #[arg(long, default_value = "posts")]
    name: String,

    /// Add an `author` column to the export
    #[arg(long)]
    with_author: bool,

    /// Path to a TOML config file
    #[arg(long, env = "REDDIT_HARVEST_CONFIG")]
    config: Option<PathBuf>,
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|e| format!("expected DD-MM-YY, got '{}': {}", value, e))
}

fn parse_sort(value: &str) -> Result<SortMode, String> {
    value.parse().map_err(|e: CoreError| e.to_string())
}

fn parse_time_filter(value: &str) -> Result<TimeFilter, String> {
    value.parse().map_err(|e: CoreError| e.to_string())
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::default()))
}

async fn run(cli: Cli) -> Result<PathBuf, CoreError> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(output_dir) = cli.output_dir {
        config.output_dir = output_dir;
    }

    // Defaults are resolved per run, from the current local date.
    let start = cli.start.unwrap_or_else(|| Local::now().date_naive());
    let end = cli.end.unwrap_or(start - Duration::days(1));

    let query = PostQuery::new(cli.subreddit, start_of_day(start), start_of_day(end))
        .with_sort(cli.sort)
        .with_page_size(cli.limit)
        .with_time_filter(cli.time_filter)
        .with_max_pages(cli.max_pages);
    query.validate()?;

    let client = RedditClient::new(RedditOAuth2Config::from_app_config(&config)?)?;
    let posts = client.fetch_posts(&query).await?;

    let exporter = CsvExporter::new(&config.output_dir).with_author_column(cli.with_author);
    exporter.export(&posts, &cli.name)
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(
                    "reddit_harvest=info,reddit_client=info,csv_export=info,harvest_core=info",
                )
            }),
        )
        .init();

    let cli = Cli::parse();
    tracing::info!("Starting reddit-harvest for r/{}", cli.subreddit);

    match run(cli).await {
        Ok(path) => {
            tracing::info!("Export complete: {}", path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            ErrorReporter::new().report_error(&e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["reddit-harvest", "rust"]).unwrap();
        assert_eq!(cli.subreddit, "rust");
        assert_eq!(cli.limit, MAX_PAGE_SIZE);
        assert_eq!(cli.sort, SortMode::New);
        assert!(cli.start.is_none());
        assert!(cli.time_filter.is_none());
        assert_eq!(cli.name, "posts");
        assert!(!cli.with_author);
    }

    #[test]
    fn test_cli_dates_and_sort() {
        let cli = Cli::try_parse_from([
            "reddit-harvest",
            "conversas",
            "--start",
            "01-03-23",
            "--end",
            "01-03-22",
            "--sort",
            "top",
            "--time",
            "year",
            "--limit",
            "50",
        ])
        .unwrap();

        assert_eq!(cli.start, NaiveDate::from_ymd_opt(2023, 3, 1));
        assert_eq!(cli.end, NaiveDate::from_ymd_opt(2022, 3, 1));
        assert_eq!(cli.sort, SortMode::Top);
        assert_eq!(cli.time_filter, Some(TimeFilter::Year));
        assert_eq!(cli.limit, 50);
    }

    #[test]
    fn test_cli_rejects_bad_values() {
        assert!(Cli::try_parse_from(["reddit-harvest", "rust", "--start", "2023-03-01"]).is_err());
        assert!(Cli::try_parse_from(["reddit-harvest", "rust", "--sort", "best"]).is_err());
    }

    #[test]
    fn test_start_of_day_is_utc_midnight() {
        let date = NaiveDate::from_ymd_opt(2023, 3, 1).unwrap();
        assert_eq!(start_of_day(date).to_rfc3339(), "2023-03-01T00:00:00+00:00");
    }
}
