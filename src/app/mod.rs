mod tui;

#[cfg(test)]
mod tests;

use std::io::{self, Write};

use anyhow::{Context, Result, bail};

use crate::cli::{Cli, Command};
use crate::db::Database;
use crate::paths::database_file_path;
use crate::player::run_player;
use crate::provider::{ProviderClient, SESSION_TOKEN_KEY, Title, Viewer};

pub fn run(cli: Cli) -> Result<()> {
    let db = open_db()?;
    let provider = ProviderClient::new(&db);

    match cli.command {
        Some(Command::Play { title, episode }) => run_play(&db, &provider, &title, episode)?,
        Some(Command::Resume) => run_resume(&db, &provider)?,
        Some(Command::List) => run_list(&db, &provider)?,
        Some(Command::Login { email }) => run_login(&db, &provider, &email)?,
        Some(Command::Logout) => run_logout(&db, &provider)?,
        Some(Command::Register { email }) => run_register(&provider, &email)?,
        Some(Command::ResetPassword { email }) => run_reset_password(&provider, &email)?,
        Some(Command::Tui) | None => tui::run_tui(&db)?,
    }

    Ok(())
}

fn run_play(
    db: &Database,
    provider: &ProviderClient,
    query: &str,
    episode: Option<usize>,
) -> Result<()> {
    let viewer = fetch_viewer_or_guest(provider);
    let catalog = provider.fetch_catalog()?;
    let titles = visible_titles(catalog, viewer.as_ref());

    let Some(title) = find_title(&titles, query) else {
        bail!("no title in the catalog matches '{query}'");
    };

    // CLI episodes are 1-based; storage and playback are 0-based.
    let episode_index = episode.map(|n| n.saturating_sub(1));
    if let Some(index) = episode_index {
        if !title.episodes.is_empty() && index >= title.episodes.len() {
            bail!(
                "'{}' has {} episode(s), episode {} does not exist",
                title.title,
                title.episodes.len(),
                index + 1
            );
        }
    }

    run_player(db, provider, title, viewer.as_ref(), episode_index)
}

fn run_resume(db: &Database, provider: &ProviderClient) -> Result<()> {
    let Some((content_id, point)) = db.latest_resume()? else {
        println!("Nothing to resume yet. Run `aniryx play <title>` first.");
        return Ok(());
    };

    let viewer = fetch_viewer_or_guest(provider);
    let catalog = provider.fetch_catalog()?;
    let titles = visible_titles(catalog, viewer.as_ref());
    let Some(title) = titles.iter().find(|title| title.id == content_id) else {
        bail!("the last watched title is no longer in the catalog");
    };

    run_player(
        db,
        provider,
        title,
        viewer.as_ref(),
        Some(point.episode_index),
    )
}

fn run_list(db: &Database, provider: &ProviderClient) -> Result<()> {
    let viewer = fetch_viewer_or_guest(provider);
    let titles = visible_titles(provider.fetch_catalog()?, viewer.as_ref());
    if titles.is_empty() {
        println!("The catalog is empty.");
        return Ok(());
    }

    println!("{:<40} {:<8} {:<8} {:<5} {}", "TITLE", "EPS", "PREMIUM", "FAV", "PROGRESS");
    for title in &titles {
        let eps = if title.episodes.is_empty() {
            "-".to_string()
        } else {
            title.episodes.len().to_string()
        };
        let premium = if title.premium { "yes" } else { "no" };
        let fav = if db.is_favorite(&title.id)? { "★" } else { "" };
        let progress = match db.resume_for(&title.id)? {
            Some(point) => format!(
                "ep {} at {:.0}s",
                point.episode_index + 1,
                point.position_seconds
            ),
            None => "-".to_string(),
        };
        println!(
            "{:<40} {:<8} {:<8} {:<5} {}",
            truncate(&title.title, 40),
            eps,
            premium,
            fav,
            progress
        );
    }
    Ok(())
}

fn run_login(db: &Database, provider: &ProviderClient, email: &str) -> Result<()> {
    let password = prompt_password()?;
    match provider.login(email, &password) {
        Ok(token) => {
            db.set_state(SESSION_TOKEN_KEY, &token)?;
            println!("Logged in as {email}.");
        }
        Err(err) => bail!("login failed: {err}"),
    }
    Ok(())
}

fn run_logout(db: &Database, provider: &ProviderClient) -> Result<()> {
    provider.logout();
    db.clear_state(SESSION_TOKEN_KEY)?;
    println!("Logged out.");
    Ok(())
}

fn run_register(provider: &ProviderClient, email: &str) -> Result<()> {
    let password = prompt_password()?;
    match provider.register(email, &password) {
        Ok(()) => println!("Account created for {email}. Run `aniryx login {email}` to sign in."),
        Err(err) => bail!("registration failed: {err}"),
    }
    Ok(())
}

fn run_reset_password(provider: &ProviderClient, email: &str) -> Result<()> {
    match provider.reset_password(email) {
        Ok(()) => println!("Password reset email sent to {email}."),
        Err(err) => bail!("password reset failed: {err}"),
    }
    Ok(())
}

fn prompt_password() -> Result<String> {
    print!("Password: ");
    io::stdout().flush().context("failed to flush stdout")?;
    let mut password = String::new();
    io::stdin()
        .read_line(&mut password)
        .context("failed to read password")?;
    Ok(password.trim_end_matches(['\r', '\n']).to_string())
}

fn fetch_viewer_or_guest(provider: &ProviderClient) -> Option<Viewer> {
    match provider.fetch_viewer() {
        Ok(viewer) => viewer,
        Err(err) => {
            println!("Profile lookup failed: {err}. Continuing as guest.");
            None
        }
    }
}

/// Unpublished titles are only visible to staff roles.
pub(super) fn visible_titles(catalog: Vec<Title>, viewer: Option<&Viewer>) -> Vec<Title> {
    let privileged = viewer.is_some_and(Viewer::is_privileged);
    catalog
        .into_iter()
        .filter(|title| title.published || privileged)
        .collect()
}

/// Exact case-insensitive match wins over the first substring match.
pub(super) fn find_title<'a>(titles: &'a [Title], query: &str) -> Option<&'a Title> {
    let needle = query.to_lowercase();
    titles
        .iter()
        .find(|title| title.title.to_lowercase() == needle)
        .or_else(|| {
            titles
                .iter()
                .find(|title| title.title.to_lowercase().contains(&needle))
        })
}

pub(super) fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    format!("{truncated}…")
}

fn open_db() -> Result<Database> {
    let db_path = database_file_path()?;
    let db = Database::open(&db_path)?;
    db.migrate()?;
    Ok(db)
}
