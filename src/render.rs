//! Plain-text and JSON-lines output of a result list.

use std::io::Write;

use anyhow::Context as _;
use chrono::{DateTime, Local, NaiveDateTime};

use crate::formats::Book;
use crate::prefs::DisplayMode;
use crate::session::SessionView;

const CATALOG_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DESC_PREVIEW_CHARS: usize = 80;

/// `123456` → `12.3万字`, `8000` → `8000字`. Non-numeric input is returned
/// as is.
pub fn format_word_count(raw: &str) -> String {
    let Ok(count) = raw.trim().parse::<u64>() else {
        return raw.trim().to_owned();
    };
    if count >= 10_000 {
        format!("{:.1}万字", count as f64 / 10_000.0)
    } else {
        format!("{count}字")
    }
}

/// Relative age of a catalog timestamp: `today`, `yesterday`, `N days ago`
/// for the last 30 days, the calendar date otherwise.
pub fn format_update_time(raw: &str, now: NaiveDateTime) -> String {
    let Some(time) = parse_catalog_time(raw) else {
        return raw.trim().to_owned();
    };
    match (now - time).num_days().max(0) {
        0 => "today".to_owned(),
        1 => "yesterday".to_owned(),
        days @ 2..30 => format!("{days} days ago"),
        _ => time.format("%Y-%m-%d").to_string(),
    }
}

fn parse_catalog_time(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, CATALOG_TIME_FORMAT)
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|t| t.with_timezone(&Local).naive_local())
        })
}

pub fn status_label(book_status: &str) -> &'static str {
    match book_status.trim() {
        "0" => "ongoing",
        "1" => "completed",
        _ => "unknown",
    }
}

/// Writes one JSON object per book.
pub fn write_json_lines(out: &mut impl Write, books: &[Book]) -> anyhow::Result<()> {
    for book in books {
        serde_json::to_writer(&mut *out, book).context("serialize book")?;
        writeln!(out).context("write book line")?;
    }
    Ok(())
}

pub fn write_text(out: &mut impl Write, view: &SessionView<'_>) -> anyhow::Result<()> {
    write_text_at(out, view, Local::now().naive_local())
}

/// [`write_text`] against a fixed clock.
pub fn write_text_at(
    out: &mut impl Write,
    view: &SessionView<'_>,
    now: NaiveDateTime,
) -> anyhow::Result<()> {
    if let Some(message) = view.error {
        writeln!(out, "error: {message}")?;
    }

    let offset = match view.display_mode {
        DisplayMode::Pagination => view.page.saturating_sub(1) as usize * view.page_size as usize,
        DisplayMode::Infinite => 0,
    };
    for (i, book) in view.books.iter().enumerate() {
        write_book(out, offset + i + 1, book, now)?;
    }

    if view.books.is_empty() && view.error.is_none() {
        writeln!(out, "no results")?;
    }
    writeln!(out, "{}", summary_line(view))?;
    Ok(())
}

fn write_book(
    out: &mut impl Write,
    index: usize,
    book: &Book,
    now: NaiveDateTime,
) -> anyhow::Result<()> {
    writeln!(
        out,
        "{index:>3}. {} / {}",
        non_blank(&book.book_name, "(untitled)"),
        non_blank(&book.author_name, "(unknown author)")
    )?;
    writeln!(
        out,
        "     {} | {} | updated {}",
        status_label(&book.book_status),
        format_word_count(&book.word_count),
        format_update_time(&book.last_index_update_time, now)
    )?;

    let tags = book.tags();
    if !tags.is_empty() || !book.crawl_source_name.trim().is_empty() {
        writeln!(
            out,
            "     tags: {}  source: {}",
            tags.join(", "),
            non_blank(&book.crawl_source_name, "-")
        )?;
    }

    let desc = book.book_desc.split_whitespace().collect::<Vec<_>>().join(" ");
    if !desc.is_empty() {
        writeln!(out, "     {}", truncate_chars(&desc, DESC_PREVIEW_CHARS))?;
    }
    Ok(())
}

fn summary_line(view: &SessionView<'_>) -> String {
    let mut line = match view.display_mode {
        DisplayMode::Pagination => {
            let pages = if view.page_size == 0 {
                0
            } else {
                view.total.div_ceil(u64::from(view.page_size))
            };
            format!(
                "page {}/{} ({} books, {} per page)",
                view.page, pages, view.total, view.page_size
            )
        }
        DisplayMode::Infinite => {
            format!("showing {} of {} books", view.books.len(), view.total)
        }
    };
    if view.loading {
        line.push_str(", loading");
    } else if view.display_mode == DisplayMode::Infinite && view.has_more && view.page > 0 {
        line.push_str(", more available");
    }
    line
}

fn non_blank<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    let value = value.trim();
    if value.is_empty() { fallback } else { value }
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::params::SearchParams;
    use crate::prefs::ThemeMode;

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn word_count_switches_to_wan_at_ten_thousand() {
        assert_eq!(format_word_count("9999"), "9999字");
        assert_eq!(format_word_count("10000"), "1.0万字");
        assert_eq!(format_word_count("123456"), "12.3万字");
        assert_eq!(format_word_count("n/a"), "n/a");
    }

    #[test]
    fn update_time_is_relative_for_a_month() {
        let now = at(2024, 5, 20, 12);
        assert_eq!(format_update_time("2024-05-20 08:00:00", now), "today");
        assert_eq!(format_update_time("2024-05-19 08:00:00", now), "yesterday");
        assert_eq!(format_update_time("2024-05-10 12:00:00", now), "10 days ago");
        assert_eq!(format_update_time("2024-03-01 12:00:00", now), "2024-03-01");
        assert_eq!(format_update_time("2024-05-21 12:00:00", now), "today");
        assert_eq!(format_update_time("soon", now), "soon");
    }

    #[test]
    fn status_labels() {
        assert_eq!(status_label("0"), "ongoing");
        assert_eq!(status_label(" 1 "), "completed");
        assert_eq!(status_label(""), "unknown");
    }

    #[test]
    fn text_output_numbers_pages_by_offset() {
        let books = vec![Book {
            id: "7".to_owned(),
            book_name: "Garden".to_owned(),
            author_name: "Mei".to_owned(),
            tag: "百合,校园".to_owned(),
            word_count: "20000".to_owned(),
            book_status: "1".to_owned(),
            last_index_update_time: "2024-05-19 10:00:00".to_owned(),
            ..Book::default()
        }];
        let params = SearchParams::default();
        let view = SessionView {
            location: "/search?curr=2",
            display_mode: DisplayMode::Pagination,
            theme: ThemeMode::Light,
            params: &params,
            books: &books,
            total: 41,
            page: 2,
            page_size: 20,
            has_more: true,
            loading: false,
            error: None,
        };
        let mut out = Vec::new();
        write_text_at(&mut out, &view, at(2024, 5, 20, 12)).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains(" 21. Garden / Mei"), "{text}");
        assert!(text.contains("completed | 2.0万字 | updated yesterday"));
        assert!(text.contains("tags: 百合, 校园"));
        assert!(text.trim_end().ends_with("page 2/3 (41 books, 20 per page)"));
    }

    #[test]
    fn json_lines_one_object_per_book() {
        let books = vec![
            Book {
                id: "1".to_owned(),
                ..Book::default()
            },
            Book {
                id: "2".to_owned(),
                ..Book::default()
            },
        ];
        let mut out = Vec::new();
        write_json_lines(&mut out, &books).unwrap();
        let text = String::from_utf8(out).unwrap();
        let ids: Vec<String> = text
            .lines()
            .map(|l| serde_json::from_str::<Book>(l).unwrap().id)
            .collect();
        assert_eq!(ids, vec!["1", "2"]);
    }
}
