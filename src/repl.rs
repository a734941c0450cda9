//! Line-oriented browsing session (`novelsearch browse`).

use std::io::Write;
use std::time::Instant;

use anyhow::Context as _;
use tokio::io::{AsyncBufRead, AsyncBufReadExt as _};

use crate::params::{ParsedQuery, SearchForm, parse_query};
use crate::prefs::DisplayMode;
use crate::render;
use crate::session::{FetchOutcome, SearchSession};

pub const HELP: &str = "\
commands:
  search [keyword]      new search from page 1 (debounced)
  set key=value ...     merge query parameters, e.g. set tag=百合 sort=word_count
  tag <name>            search by tag
  source <name>         search by source
  next | more           load the next page (infinite mode)
  page <n>              go to page n (pagination mode)
  size <n>              change page size
  back | forward        history navigation
  open <url>            navigate to a /search?... location
  mode [infinite|pagination]
  theme                 toggle light/dark
  retry | dismiss       retry or dismiss the last error
  refresh | reset       page 1 with current filters, or defaults
  url                   print the current location
  show                  print the current results
  quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Search(String),
    Set(ParsedQuery),
    Tag(String),
    Source(String),
    More,
    Page(u32),
    Size(u32),
    Back,
    Forward,
    Open(String),
    Mode(Option<DisplayMode>),
    Theme,
    Retry,
    Dismiss,
    Refresh,
    Reset,
    Url,
    Show,
    Help,
    Quit,
}

/// Parses one input line; blank lines yield `None`.
pub fn parse_command(line: &str) -> anyhow::Result<Option<ReplCommand>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let require = |what: &str| -> anyhow::Result<String> {
        if rest.is_empty() {
            anyhow::bail!("`{word}` needs {what}");
        }
        Ok(rest.to_owned())
    };
    let number = |what: &str| -> anyhow::Result<u32> {
        let n: u32 = require(what)?
            .parse()
            .with_context(|| format!("`{word}` expects a positive number"))?;
        if n == 0 {
            anyhow::bail!("`{word}` expects a positive number");
        }
        Ok(n)
    };

    let command = match word.to_ascii_lowercase().as_str() {
        "search" | "s" => ReplCommand::Search(rest.to_owned()),
        "set" => {
            let query = require("key=value pairs")?
                .split_whitespace()
                .collect::<Vec<_>>()
                .join("&");
            let parsed = parse_query(&query);
            if let Some((key, value)) = parsed.rejected.first() {
                anyhow::bail!("invalid value for {key}: {value:?}");
            }
            ReplCommand::Set(parsed)
        }
        "tag" => ReplCommand::Tag(require("a tag")?),
        "source" => ReplCommand::Source(require("a source")?),
        "next" | "more" | "n" => ReplCommand::More,
        "page" | "p" => ReplCommand::Page(number("a page number")?),
        "size" => ReplCommand::Size(number("a page size")?),
        "back" | "b" => ReplCommand::Back,
        "forward" | "f" => ReplCommand::Forward,
        "open" | "go" => ReplCommand::Open(require("a location")?),
        "mode" => {
            let mode = if rest.is_empty() {
                None
            } else {
                Some(rest.parse::<DisplayMode>()?)
            };
            ReplCommand::Mode(mode)
        }
        "theme" => ReplCommand::Theme,
        "retry" => ReplCommand::Retry,
        "dismiss" => ReplCommand::Dismiss,
        "refresh" => ReplCommand::Refresh,
        "reset" => ReplCommand::Reset,
        "url" => ReplCommand::Url,
        "show" | "ls" => ReplCommand::Show,
        "help" | "?" => ReplCommand::Help,
        "quit" | "exit" | "q" => ReplCommand::Quit,
        other => anyhow::bail!("unknown command `{other}` (try `help`)"),
    };
    Ok(Some(command))
}

/// Reads commands from `input` until EOF or `quit`, printing the session
/// after each one.
pub async fn run<R, W>(
    session: &mut SearchSession,
    input: R,
    out: &mut W,
    json: bool,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await.context("read command")? {
        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(err) => {
                writeln!(out, "{err:#}")?;
                continue;
            }
        };
        if command == ReplCommand::Quit {
            break;
        }
        if let Err(err) = execute(session, command, out, json).await {
            writeln!(out, "{err:#}")?;
        }
        out.flush()?;
    }
    Ok(())
}

async fn execute<W: Write>(
    session: &mut SearchSession,
    command: ReplCommand,
    out: &mut W,
    json: bool,
) -> anyhow::Result<()> {
    let outcome = match command {
        ReplCommand::Search(keyword) => {
            let form = SearchForm {
                keyword,
                ..SearchForm::default()
            };
            match session.submit_search(form, Instant::now()).await {
                Some(outcome) => outcome,
                None => {
                    writeln!(out, "search ignored: submitted again too quickly")?;
                    return Ok(());
                }
            }
        }
        ReplCommand::Set(parsed) => {
            let mut patch = parsed.patch;
            patch.curr = patch.curr.or(Some(1));
            session.set_parameters(patch).await
        }
        ReplCommand::Tag(tag) => session.select_tag(&tag).await,
        ReplCommand::Source(source) => session.select_source(&source).await,
        ReplCommand::More => {
            if session.prefs().display_mode() != DisplayMode::Infinite {
                writeln!(out, "`next` is for infinite mode; use `page <n>`")?;
                return Ok(());
            }
            session.load_more().await
        }
        ReplCommand::Page(page) => session.change_page(page).await,
        ReplCommand::Size(limit) => session.change_page_size(1, limit).await,
        ReplCommand::Back => session.back().await,
        ReplCommand::Forward => session.forward().await,
        ReplCommand::Open(location) => session.navigate(&location).await,
        ReplCommand::Mode(None) => session.toggle_display_mode().await?,
        ReplCommand::Mode(Some(mode)) => session.set_display_mode(mode).await?,
        ReplCommand::Theme => {
            let theme = session.toggle_theme()?;
            writeln!(out, "theme: {theme}")?;
            return Ok(());
        }
        ReplCommand::Retry => session.retry().await,
        ReplCommand::Dismiss => {
            session.dismiss_error();
            return Ok(());
        }
        ReplCommand::Refresh => session.refresh().await,
        ReplCommand::Reset => session.reset().await,
        ReplCommand::Url => {
            writeln!(out, "{}", session.router().location())?;
            return Ok(());
        }
        ReplCommand::Show => FetchOutcome::Loaded,
        ReplCommand::Help => {
            writeln!(out, "{HELP}")?;
            return Ok(());
        }
        ReplCommand::Quit => return Ok(()),
    };

    match outcome {
        FetchOutcome::Skipped => writeln!(out, "nothing to do")?,
        FetchOutcome::Stale => {}
        FetchOutcome::Loaded | FetchOutcome::RolledBack => print_view(session, out, json)?,
    }
    Ok(())
}

pub fn print_view<W: Write>(session: &SearchSession, out: &mut W, json: bool) -> anyhow::Result<()> {
    if json {
        serde_json::to_writer(&mut *out, &session.view()).context("serialize view")?;
        writeln!(out)?;
    } else {
        render::write_text(out, &session.view())?;
    }
    Ok(())
}
