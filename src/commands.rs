//! Subcommand implementations.

use std::io::Write as _;
use std::sync::Arc;

use anyhow::Context as _;

use crate::api::HttpSearchApi;
use crate::cli::{
    BrowseArgs, GlobalArgs, OpenArgs, PrefsCommand, SearchArgs, ServeArgs, UrlArgs,
};
use crate::config::{Config, parse_timeout_secs};
use crate::params::{ParamsPatch, SearchParams};
use crate::prefs::{DisplayMode, JsonFileStore, Preferences};
use crate::render;
use crate::repl;
use crate::router::{MemoryHistory, SEARCH_PATH, build_location};
use crate::server::{self, ProxyState};
use crate::session::{FetchOutcome, SearchSession};

/// Environment settings with command-line overrides applied.
pub fn load_config(global: &GlobalArgs) -> anyhow::Result<Config> {
    let mut config = Config::from_env().context("read environment")?;
    if let Some(url) = &global.api_url {
        config.api_url = url.trim().trim_end_matches('/').to_owned();
    }
    if let Some(secs) = global.timeout_secs {
        let secs = parse_timeout_secs(&secs.to_string()).context("--timeout-secs")?;
        config.timeout = std::time::Duration::from_secs(secs);
    }
    if let Some(path) = &global.prefs {
        config.prefs_path = path.clone();
    }
    tracing::debug!(?config, "config");
    Ok(config)
}

fn load_prefs(config: &Config) -> anyhow::Result<Preferences> {
    Preferences::load(
        Box::new(JsonFileStore::new(&config.prefs_path)),
        &config.user_agent,
    )
    .with_context(|| format!("load preferences: {}", config.prefs_path.display()))
}

fn new_session(config: &Config, prefs: Preferences) -> anyhow::Result<SearchSession> {
    let api = HttpSearchApi::new(&config.api_url, config.timeout).context("build catalog client")?;
    Ok(SearchSession::new(
        Arc::new(api),
        Box::new(MemoryHistory::default()),
        prefs,
        config.page_size,
    ))
}

fn filter_params(
    form: crate::params::SearchForm,
    page: u32,
    limit: Option<u32>,
    config: &Config,
) -> SearchParams {
    let limit = limit.unwrap_or(config.page_size);
    SearchParams::default()
        .merge(&form.into_patch(limit))
        .merge(&ParamsPatch::page(page))
}

fn ensure_loaded(session: &SearchSession, outcome: FetchOutcome) -> anyhow::Result<()> {
    if let Some(message) = session.error() {
        anyhow::bail!("search failed: {message}");
    }
    if outcome == FetchOutcome::Skipped {
        anyhow::bail!("no search was issued");
    }
    Ok(())
}

fn print_results(session: &SearchSession, json: bool) -> anyhow::Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if json {
        render::write_json_lines(&mut out, session.books())?;
    } else {
        render::write_text(&mut out, &session.view())?;
    }
    out.flush().context("flush stdout")?;
    Ok(())
}

pub async fn search(config: &Config, args: SearchArgs) -> anyhow::Result<()> {
    let prefs = match args.mode {
        // A one-off mode is not written back to the preference file.
        Some(mode) => {
            let mut prefs = Preferences::in_memory(&config.user_agent);
            prefs.set_display_mode(mode)?;
            prefs
        }
        None => load_prefs(config)?,
    };
    let mut session = new_session(config, prefs)?;
    let params = filter_params(args.filters.into_form(), args.page, args.limit, config);
    let location = build_location(SEARCH_PATH, &params);
    tracing::info!(%location, "search");

    let outcome = session.open(&location).await;
    ensure_loaded(&session, outcome)?;

    let mode = session.prefs().display_mode();
    for _ in 1..args.pages {
        if !session.orchestrator().has_more() {
            break;
        }
        if mode == DisplayMode::Pagination {
            print_results(&session, args.json)?;
            let next = session.orchestrator().page() + 1;
            let outcome = session.change_page(next).await;
            ensure_loaded(&session, outcome)?;
        } else {
            let outcome = session.load_more().await;
            ensure_loaded(&session, outcome)?;
        }
    }
    print_results(&session, args.json)
}

pub async fn open(config: &Config, args: OpenArgs) -> anyhow::Result<()> {
    let mut session = new_session(config, load_prefs(config)?)?;
    let outcome = session.open(&args.location).await;
    ensure_loaded(&session, outcome)?;
    print_results(&session, args.json)
}

pub fn url(config: &Config, args: UrlArgs) -> anyhow::Result<()> {
    let params = filter_params(args.filters.into_form(), args.page, args.limit, config);
    let location = build_location(SEARCH_PATH, &params);
    match args.base {
        Some(base) => println!("{}{location}", base.trim().trim_end_matches('/')),
        None => println!("{location}"),
    }
    Ok(())
}

pub async fn browse(config: &Config, args: BrowseArgs) -> anyhow::Result<()> {
    let mut session = new_session(config, load_prefs(config)?)?;
    let location = args.location.unwrap_or_else(|| SEARCH_PATH.to_owned());
    session.open(&location).await;

    let mut out = std::io::stdout();
    repl::print_view(&session, &mut out, args.json)?;
    let input = tokio::io::BufReader::new(tokio::io::stdin());
    repl::run(&mut session, input, &mut out, args.json).await
}

pub fn prefs(config: &Config, command: PrefsCommand) -> anyhow::Result<()> {
    let mut prefs = load_prefs(config)?;
    match command {
        PrefsCommand::Show => {}
        PrefsCommand::ToggleDisplay => {
            prefs.toggle_display_mode()?;
        }
        PrefsCommand::ToggleTheme => {
            prefs.toggle_theme()?;
        }
        PrefsCommand::SetDisplay { mode } => prefs.set_display_mode(mode)?,
        PrefsCommand::SetTheme { theme } => prefs.set_theme(theme)?,
    }
    println!("display: {}", prefs.display_mode());
    println!("theme: {}", prefs.theme());
    Ok(())
}

pub async fn serve(config: &Config, args: ServeArgs) -> anyhow::Result<()> {
    let state = ProxyState::new(&config.api_url, config.timeout)?;
    server::serve(args.addr, state).await
}
