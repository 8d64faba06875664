//! CSV export of fetched posts.
//!
//! Every file starts with the same header row, even when there are no posts.
//! Rows are written to a hidden temporary file next to the target and only
//! renamed into place once fully flushed, so a failed export leaves nothing
//! behind under the final name.

use chrono::{DateTime, Local};
use harvest_core::{CoreError, ExportError, PostRecord};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Column order of every export.
pub const COLUMNS: [&str; 10] = [
    "title",
    "selftext",
    "ups",
    "downs",
    "link_flair_text",
    "upvote_ratio",
    "num_comments",
    "timestamp",
    "url",
    "permalink",
];

/// Appended after [`COLUMNS`] when author export is switched on.
pub const AUTHOR_COLUMN: &str = "author";

pub const DEFAULT_FILENAME_HINT: &str = "posts";

const FILE_TIMESTAMP_FORMAT: &str = "%H-%M-%S.%d-%m-%y";
const ROW_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Source of the generation time embedded in file names.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Local>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Local> {
        self.0
    }
}

pub struct CsvExporter {
    output_dir: PathBuf,
    include_author: bool,
    clock: Box<dyn Clock>,
}

impl CsvExporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            include_author: false,
            clock: Box::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn with_author_column(mut self, include_author: bool) -> Self {
        self.include_author = include_author;
        self
    }

    pub fn columns(&self) -> Vec<&'static str> {
        let mut columns = COLUMNS.to_vec();
        if self.include_author {
            columns.push(AUTHOR_COLUMN);
        }
        columns
    }

    /// `{hint}-{HH-MM-SS.DD-MM-YY}.csv` in local time. A blank hint becomes
    /// `posts`; path separators in the hint are replaced.
    pub fn file_name(&self, filename_hint: &str, generated_at: DateTime<Local>) -> String {
        let hint = filename_hint.trim();
        let hint = if hint.is_empty() {
            DEFAULT_FILENAME_HINT.to_string()
        } else {
            hint.replace(['/', '\\'], "_")
        };
        format!("{}-{}.csv", hint, generated_at.format(FILE_TIMESTAMP_FORMAT))
    }

    /// Writes `records` to a new file in the output directory and returns its
    /// path. An existing file with the same name is never overwritten; a
    /// numeric suffix is added instead.
    pub fn export(&self, records: &[PostRecord], filename_hint: &str) -> Result<PathBuf, CoreError> {
        fs::create_dir_all(&self.output_dir).map_err(|source| ExportError::Io {
            path: self.output_dir.display().to_string(),
            source,
        })?;

        let file_name = self.file_name(filename_hint, self.clock.now());
        let target = unique_path(&self.output_dir.join(file_name));
        let staging = staging_path(&target);

        debug!("Writing {} rows to {}", records.len(), staging.display());
        if let Err(e) = self.write_rows(&staging, records) {
            discard(&staging);
            return Err(e.into());
        }

        if let Err(source) = fs::rename(&staging, &target) {
            discard(&staging);
            return Err(ExportError::Persist {
                path: target.display().to_string(),
                source,
            }
            .into());
        }

        info!("Data written to {} ({} rows)", target.display(), records.len());
        Ok(target)
    }

    fn write_rows(&self, path: &Path, records: &[PostRecord]) -> Result<(), ExportError> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(self.columns())?;
        for record in records {
            writer.write_record(self.row(record))?;
        }
        writer.flush().map_err(|source| ExportError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    fn row(&self, record: &PostRecord) -> Vec<String> {
        let mut row = vec![
            record.title.clone(),
            record.body_text.clone(),
            record.upvote_count.to_string(),
            record.downvote_count.to_string(),
            record.category_label.clone().unwrap_or_default(),
            record.upvote_ratio.to_string(),
            record.comment_count.to_string(),
            record.created_at.format(ROW_TIMESTAMP_FORMAT).to_string(),
            record.url.clone(),
            record.permalink.clone(),
        ];
        if self.include_author {
            row.push(record.author.clone().unwrap_or_default());
        }
        row
    }
}

fn unique_path(candidate: &Path) -> PathBuf {
    if !candidate.exists() {
        return candidate.to_path_buf();
    }
    let stem = candidate
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let parent = candidate.parent().unwrap_or_else(|| Path::new("."));
    (1..)
        .map(|n| parent.join(format!("{}-{}.csv", stem, n)))
        .find(|path| !path.exists())
        .unwrap_or_else(|| candidate.to_path_buf())
}

fn staging_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(".{}.tmp", name))
}

fn discard(path: &Path) {
    if path.exists() {
        if let Err(e) = fs::remove_file(path) {
            warn!("Could not remove partial export {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::env;

    fn test_dir() -> PathBuf {
        env::temp_dir().join(format!("test_csv_export_{}", uuid::Uuid::new_v4()))
    }

    fn fixed_clock() -> FixedClock {
        FixedClock(Local.with_ymd_and_hms(2023, 3, 1, 14, 5, 9).single().unwrap())
    }

    fn record(title: &str, day: u32) -> PostRecord {
        PostRecord {
            title: title.to_string(),
            body_text: format!("body, with \"quotes\" for {}", title),
            upvote_count: 12,
            downvote_count: 1,
            category_label: Some("news".to_string()),
            upvote_ratio: 0.92,
            comment_count: 4,
            created_at: Utc.with_ymd_and_hms(2023, 3, day, 8, 30, 0).unwrap(),
            url: format!("https://example.com/{}", title),
            permalink: format!("/r/test/comments/{}", title),
            author: Some("writer".to_string()),
        }
    }

    fn read_back(path: &Path) -> (Vec<String>, Vec<Vec<String>>) {
        let mut reader = csv::Reader::from_path(path).unwrap();
        let header = reader
            .headers()
            .unwrap()
            .iter()
            .map(str::to_string)
            .collect();
        let rows = reader
            .records()
            .map(|r| r.unwrap().iter().map(str::to_string).collect())
            .collect();
        (header, rows)
    }

    #[test]
    fn test_export_round_trip() {
        let dir = test_dir();
        let exporter = CsvExporter::new(&dir).with_clock(fixed_clock());
        let records = vec![record("first", 5), record("second", 4), record("third", 3)];

        let path = exporter.export(&records, "posts").unwrap();
        let (header, rows) = read_back(&path);

        assert_eq!(header, COLUMNS.to_vec());
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0][0], "first");
        assert_eq!(rows[0][1], "body, with \"quotes\" for first");
        assert_eq!(rows[0][4], "news");
        assert_eq!(rows[0][5], "0.92");
        assert_eq!(rows[0][7], "2023-03-05 08:30:00");
        assert_eq!(rows[2][0], "third");

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_empty_export_writes_header_only() {
        let dir = test_dir();
        let exporter = CsvExporter::new(&dir).with_clock(fixed_clock());

        let path = exporter.export(&[], "posts").unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();

        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].split(',').count(), 10);
        assert_eq!(lines[0], COLUMNS.join(","));

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_author_column() {
        let dir = test_dir();
        let exporter = CsvExporter::new(&dir)
            .with_clock(fixed_clock())
            .with_author_column(true);
        let mut anonymous = record("deleted", 2);
        anonymous.author = None;

        let path = exporter
            .export(&[record("named", 3), anonymous], "posts")
            .unwrap();
        let (header, rows) = read_back(&path);

        assert_eq!(header.len(), 11);
        assert_eq!(header.last().map(String::as_str), Some(AUTHOR_COLUMN));
        assert_eq!(rows[0][10], "writer");
        assert_eq!(rows[1][10], "");

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_file_name_embeds_generation_time() {
        let exporter = CsvExporter::new(".");
        let at = fixed_clock().now();

        assert_eq!(exporter.file_name("posts", at), "posts-14-05-09.01-03-23.csv");
        assert_eq!(exporter.file_name("  ", at), "posts-14-05-09.01-03-23.csv");
        assert_eq!(
            exporter.file_name("r/rust", at),
            "r_rust-14-05-09.01-03-23.csv"
        );
    }

    #[test]
    fn test_same_second_exports_do_not_collide() {
        let dir = test_dir();
        let exporter = CsvExporter::new(&dir).with_clock(fixed_clock());

        let first = exporter.export(&[record("a", 3)], "posts").unwrap();
        let second = exporter.export(&[record("b", 3)], "posts").unwrap();

        assert_ne!(first, second);
        assert!(second
            .file_name()
            .unwrap()
            .to_string_lossy()
            .ends_with("-1.csv"));
        assert_eq!(read_back(&first).1[0][0], "a");
        assert_eq!(read_back(&second).1[0][0], "b");

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_failed_export_leaves_no_file() {
        let dir = test_dir();
        fs::create_dir_all(&dir).unwrap();
        // A regular file where the output directory should be.
        let blocked = dir.join("not-a-dir");
        fs::write(&blocked, b"occupied").unwrap();

        let exporter = CsvExporter::new(&blocked).with_clock(fixed_clock());
        let result = exporter.export(&[record("a", 3)], "posts");

        assert!(matches!(result, Err(CoreError::Export(_))));
        let entries: Vec<_> = fs::read_dir(&dir).unwrap().collect();
        assert_eq!(entries.len(), 1);

        fs::remove_dir_all(&dir).ok();
    }
}
