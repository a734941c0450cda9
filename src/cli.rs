use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::params::SearchForm;
use crate::prefs::{DisplayMode, ThemeMode};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Overrides for the `NOVELSEARCH_*` environment settings.
#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Catalog base URL.
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Request timeout in seconds.
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,

    /// Preference file path.
    #[arg(long, global = true)]
    pub prefs: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Search the catalog and print the results.
    Search(SearchArgs),
    /// Load a bookmarked `/search?...` location.
    Open(OpenArgs),
    /// Print the location for a set of filters without searching.
    Url(UrlArgs),
    /// Interactive browsing session.
    Browse(BrowseArgs),
    /// Show or change persisted preferences.
    Prefs {
        #[command(subcommand)]
        command: PrefsCommand,
    },
    /// Run the same-origin catalog proxy.
    Serve(ServeArgs),
}

#[derive(Debug, Clone, Default, Args)]
pub struct FilterArgs {
    /// Title or author keyword.
    pub keyword: Option<String>,

    /// Tag filter (repeatable).
    #[arg(long = "tag")]
    pub tags: Vec<String>,

    /// Source site filter (repeatable).
    #[arg(long = "source")]
    pub sources: Vec<String>,

    /// Sort field (default: last_index_update_time).
    #[arg(long)]
    pub sort: Option<String>,

    /// Book status: 0 ongoing, 1 completed.
    #[arg(long)]
    pub status: Option<String>,

    #[arg(long)]
    pub word_count_min: Option<String>,

    #[arg(long)]
    pub word_count_max: Option<String>,

    #[arg(long)]
    pub purity: Option<String>,

    /// Updated within this many days.
    #[arg(long)]
    pub update_period: Option<String>,
}

impl FilterArgs {
    pub fn into_form(self) -> SearchForm {
        SearchForm {
            keyword: self.keyword.unwrap_or_default(),
            tags: self.tags,
            sources: self.sources,
            sort: self.sort.unwrap_or_default(),
            word_count_min: self.word_count_min.unwrap_or_default(),
            word_count_max: self.word_count_max.unwrap_or_default(),
            purity: self.purity.unwrap_or_default(),
            update_period: self.update_period.unwrap_or_default(),
            book_status: self.status.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Args)]
pub struct SearchArgs {
    #[command(flatten)]
    pub filters: FilterArgs,

    /// First page to fetch.
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub page: u32,

    /// Page size (default: NOVELSEARCH_PAGE_SIZE or 20).
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=100))]
    pub limit: Option<u32>,

    /// Display mode for this run (not persisted).
    #[arg(long, value_enum)]
    pub mode: Option<DisplayMode>,

    /// Number of pages to fetch.
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub pages: u32,

    /// Print one JSON object per book.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct OpenArgs {
    /// Location such as `/search?keyword=x&curr=2` or a full URL.
    pub location: String,

    /// Print one JSON object per book.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct UrlArgs {
    #[command(flatten)]
    pub filters: FilterArgs,

    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub page: u32,

    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=100))]
    pub limit: Option<u32>,

    /// Origin to prefix, e.g. `https://example.com`.
    #[arg(long)]
    pub base: Option<String>,
}

#[derive(Debug, Args)]
pub struct BrowseArgs {
    /// Starting location (default: `/search`).
    pub location: Option<String>,

    /// Print the session state as JSON after each command.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Subcommand)]
pub enum PrefsCommand {
    Show,
    ToggleDisplay,
    ToggleTheme,
    SetDisplay {
        #[arg(value_enum)]
        mode: DisplayMode,
    },
    SetTheme {
        #[arg(value_enum)]
        theme: ThemeMode,
    },
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    #[arg(long, default_value = "127.0.0.1:3000")]
    pub addr: SocketAddr,
}
