//!
//! src/view.rs
//!
//! Text rendering of the user, music and query sections
//!

use std::io::{self, Write};

use crate::home::HomePage;
use crate::query::{QuerySection, QueryState};
use crate::types::{Notice, Song};

fn song_line(out: &mut impl Write, index: usize, song: &Song) -> io::Result<()> {
    write!(out, "  {index:>3}. {} - {} ({})", song.title, song.artist, song.year)?;
    if !song.img_url.is_empty() {
        write!(out, "  {}", song.img_url)?;
    }
    writeln!(out)
}

pub fn user_section(out: &mut impl Write, home: &HomePage) -> io::Result<()> {
    match home.username() {
        Some(name) => writeln!(out, "== Welcome, {name} =="),
        None => writeln!(out, "== Welcome ==")
    }
}

pub fn music_section(out: &mut impl Write, home: &HomePage) -> io::Result<()> {
    writeln!(out, "-- Subscriptions --")?;
    if home.is_loading() {
        return writeln!(out, "  Loading...");
    }
    if home.subscriptions().is_empty() {
        return writeln!(out, "  (none)");
    }
    for (i, song) in home.subscriptions().iter().enumerate() {
        song_line(out, i + 1, song)?;
    }
    Ok(())
}

pub fn query_section(out: &mut impl Write, query: &QuerySection, loading: bool) -> io::Result<()> {
    let q = query.query();
    writeln!(out, "-- Query --")?;
    writeln!(out, "  title: {:?}  year: {:?}  artist: {:?}", q.title, q.year, q.artist)?;
    if loading {
        return writeln!(out, "  Loading...");
    }
    if let QueryState::Searching(_) = query.state() {
        writeln!(out, "  Searching...")?;
    }
    for (i, song) in query.results().iter().enumerate() {
        song_line(out, i + 1, song)?;
    }
    Ok(())
}

pub fn page(out: &mut impl Write, home: &HomePage, query: &QuerySection) -> io::Result<()> {
    user_section(out, home)?;
    music_section(out, home)?;
    query_section(out, query, home.is_loading())?;
    out.flush()
}

pub fn notice(out: &mut impl Write, notice: &Notice) -> io::Result<()> {
    writeln!(out, "!! {notice}")?;
    out.flush()
}

pub fn help(out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "commands:")?;
    writeln!(out, "  title <text> | artist <text> | year <text>   set a search field")?;
    writeln!(out, "  clear                                        clear the search fields")?;
    writeln!(out, "  search                                       run the query")?;
    writeln!(out, "  subscribe <n>                                subscribe to result n")?;
    writeln!(out, "  unsubscribe <n>                              drop subscription n")?;
    writeln!(out, "  refresh                                      reload from the server")?;
    writeln!(out, "  show | help | quit")?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::home::tests::song;
    use crate::types::HomeData;

    #[test]
    fn music_section_shows_loading_then_songs() {
        let mut home = HomePage::new("a@b.com");
        let mut out = Vec::new();
        music_section(&mut out, &home).unwrap();
        assert!(String::from_utf8(out).unwrap().contains("Loading..."));

        home.apply_home(Ok(HomeData {
            user_name: "A".into(),
            subscribed_songs: vec![song("X", "Y")]
        }));
        let mut out = Vec::new();
        page(&mut out, &home, &QuerySection::new("a@b.com", CancellationToken::new())).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Welcome, A"));
        assert!(text.contains("1. X - Y (2001)"));
    }
}
