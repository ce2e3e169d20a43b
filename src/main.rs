// Command line entry point
// Thin shell over the Last.fm client: argument parsing, logging setup,
// interactive login, and printing

use std::io::{self, Write};

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use clap::{Parser, Subcommand, ValueEnum};

use lastfm_scrobbler::config::Config;
use lastfm_scrobbler::lastfm::{LastfmClient, LastfmError, Period};
use lastfm_scrobbler::text_cleanup::TextCleaner;

#[derive(Parser)]
#[command(name = "lastfm-scrobbler", version, about = "Scrobble tracks and browse your Last.fm profile")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Authorize this application with your Last.fm account
    Login,
    /// Forget the stored session
    Logout,
    /// Show your profile and scrobble counts
    Profile,
    /// List your latest scrobbles
    Recent {
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
    /// Show your friends and what they are listening to
    Friends,
    /// Your most played artists
    TopArtists {
        #[arg(long, default_value_t = 10)]
        limit: u32,
        #[arg(long, value_enum, default_value_t = PeriodArg::Overall)]
        period: PeriodArg,
    },
    /// Your most played tracks
    TopTracks {
        #[arg(long, default_value_t = 10)]
        limit: u32,
        #[arg(long, value_enum, default_value_t = PeriodArg::Overall)]
        period: PeriodArg,
    },
    /// Your most played albums
    TopAlbums {
        #[arg(long, default_value_t = 10)]
        limit: u32,
        #[arg(long, value_enum, default_value_t = PeriodArg::Overall)]
        period: PeriodArg,
    },
    /// Look up an artist
    Artist { name: String },
    /// Look up a track
    Track { artist: String, title: String },
    /// Look up an album
    Album { artist: String, title: String },
    /// Tell Last.fm what is playing right now
    NowPlaying {
        artist: String,
        title: String,
        #[arg(long)]
        album: Option<String>,
        #[arg(long)]
        album_artist: Option<String>,
        /// Track length in seconds
        #[arg(long, default_value_t = 240)]
        duration: u32,
    },
    /// Submit a completed play
    Scrobble {
        artist: String,
        title: String,
        #[arg(long)]
        album: Option<String>,
        #[arg(long)]
        album_artist: Option<String>,
        /// Unix timestamp of the play; defaults to now
        #[arg(long)]
        timestamp: Option<i64>,
    },
    /// Mark a track as loved
    Love { artist: String, title: String },
    /// Remove a track from your loved tracks
    Unlove { artist: String, title: String },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PeriodArg {
    Overall,
    Week,
    Month,
    ThreeMonths,
    SixMonths,
    Year,
}

impl From<PeriodArg> for Period {
    fn from(period: PeriodArg) -> Self {
        match period {
            PeriodArg::Overall => Period::Overall,
            PeriodArg::Week => Period::Week,
            PeriodArg::Month => Period::Month,
            PeriodArg::ThreeMonths => Period::ThreeMonths,
            PeriodArg::SixMonths => Period::SixMonths,
            PeriodArg::Year => Period::Year,
        }
    }
}

fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    let mut config = Config::load()?;
    let mut client = LastfmClient::new(
        config.lastfm.api_key.clone(),
        config.lastfm.api_secret.clone(),
    );
    if let Some(session) = config.session() {
        client.log_in_with_session(session);
    }

    match cli.command {
        Command::Login => login(&client, &mut config),
        Command::Logout => {
            config.clear_session();
            config.save()?;
            println!("Stored session removed.");
            Ok(())
        }
        Command::Profile => profile(&client),
        Command::Recent { limit } => recent(&client, limit),
        Command::Friends => friends(&client),
        Command::TopArtists { limit, period } => top_artists(&client, limit, period.into()),
        Command::TopTracks { limit, period } => top_tracks(&client, limit, period.into()),
        Command::TopAlbums { limit, period } => top_albums(&client, limit, period.into()),
        Command::Artist { name } => artist_info(&client, &name),
        Command::Track { artist, title } => track_info(&client, &artist, &title),
        Command::Album { artist, title } => album_info(&client, &artist, &title),
        Command::NowPlaying {
            artist,
            title,
            album,
            album_artist,
            duration,
        } => {
            let cleaner = TextCleaner::new(&config.cleanup);
            let status = client.update_now_playing(
                &cleaner.clean(&artist),
                &cleaner.clean(&title),
                duration,
                cleaner.clean_option(album.as_deref()).as_deref(),
                cleaner.clean_option(album_artist.as_deref()).as_deref(),
            )?;
            report_submission("Now playing updated", &status);
            Ok(())
        }
        Command::Scrobble {
            artist,
            title,
            album,
            album_artist,
            timestamp,
        } => {
            let cleaner = TextCleaner::new(&config.cleanup);
            let played_at = match timestamp {
                Some(unix) => DateTime::from_timestamp(unix, 0).context("Invalid timestamp")?,
                None => Utc::now(),
            };
            let status = client.submit_scrobble(
                &cleaner.clean(&artist),
                &cleaner.clean(&title),
                played_at,
                cleaner.clean_option(album.as_deref()).as_deref(),
                cleaner.clean_option(album_artist.as_deref()).as_deref(),
            )?;
            report_submission("Scrobbled", &status);
            Ok(())
        }
        Command::Love { artist, title } => {
            client.set_track_loved(&artist, &title, true)?;
            println!("Loved: {} - {}", artist, title);
            Ok(())
        }
        Command::Unlove { artist, title } => {
            client.set_track_loved(&artist, &title, false)?;
            println!("Unloved: {} - {}", artist, title);
            Ok(())
        }
    }
}

fn init_logging() {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if !atty::is(atty::Stream::Stderr) {
        builder.write_style(env_logger::WriteStyle::Never);
    }
    builder.init();
}

/// Interactive authorization: request a token, have the user approve it
/// in their browser, then exchange it for a session and persist it.
fn login(client: &LastfmClient, config: &mut Config) -> Result<()> {
    println!("Starting Last.fm authentication...\n");

    let token = client.get_auth_token()?;
    let url = client.generate_authorization_url(&token);

    println!("Open this URL in your browser and allow access to your account:\n");
    println!("  {}\n", url);
    print!("Press Enter once you have authorized the application... ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;

    match client.get_session(&token) {
        Ok(session) => {
            println!("\nLogged in as {}.", session.username);
            config.store_session(&session);
            config.save()?;
            Ok(())
        }
        Err(LastfmError::AuthPending) => {
            anyhow::bail!("The token was not authorized; run `login` again and approve it first")
        }
        Err(err) => Err(err).context("Failed to obtain a Last.fm session"),
    }
}

fn profile(client: &LastfmClient) -> Result<()> {
    let info = client
        .get_user_info()?
        .context("Profile is unavailable right now")?;

    match &info.real_name {
        Some(real_name) => println!("{} ({})", info.username, real_name),
        None => println!("{}", info.username),
    }
    println!("  {}", info.url);
    println!(
        "  Scrobbling since {}",
        info.registered_date.with_timezone(&Local).format("%B %Y")
    );
    println!("  {} scrobbles total", info.total_scrobbles);
    println!("  {} today", client.get_total_scrobbles_today()?);
    println!("  {} loved tracks", client.get_total_loved_tracks()?);

    Ok(())
}

fn recent(client: &LastfmClient, limit: u32) -> Result<()> {
    let scrobbles = match client.get_recent_scrobbles(limit, None, None)? {
        Some(list) => list,
        None => {
            println!("No scrobbles yet.");
            return Ok(());
        }
    };

    for scrobble in &scrobbles.items {
        let when = scrobble
            .timestamp
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M");
        match &scrobble.album_title {
            Some(album) => println!(
                "{}  {} - {} ({})",
                when, scrobble.artist_name, scrobble.track_title, album
            ),
            None => println!("{}  {} - {}", when, scrobble.artist_name, scrobble.track_title),
        }
    }
    println!("\n{} scrobbles total", scrobbles.attr_total);

    Ok(())
}

fn friends(client: &LastfmClient) -> Result<()> {
    let friends = match client.get_friends()? {
        Some(friends) => friends,
        None => {
            println!("No friends on Last.fm yet.");
            return Ok(());
        }
    };

    for friend in &friends {
        let name = friend.real_name.as_deref().unwrap_or(&friend.username);
        match client.get_friend_scrobble(&friend.username)? {
            Some(scrobble) if scrobble.is_playing => {
                println!(
                    "{} ♪ {} - {}",
                    name, scrobble.artist_name, scrobble.track_title
                );
            }
            Some(scrobble) => {
                println!(
                    "{}   {} - {} (recently)",
                    name, scrobble.artist_name, scrobble.track_title
                );
            }
            None => println!("{}   nothing recent", name),
        }
    }

    Ok(())
}

fn top_artists(client: &LastfmClient, limit: u32, period: Period) -> Result<()> {
    let artists = match client.get_top_artists(limit, period)? {
        Some(list) => list,
        None => {
            println!("No listening history yet.");
            return Ok(());
        }
    };

    for (rank, artist) in artists.items.iter().enumerate() {
        println!(
            "{:>3}. {} ({} plays)",
            rank + 1,
            artist.name,
            artist.plays.unwrap_or(0)
        );
    }

    Ok(())
}

fn top_tracks(client: &LastfmClient, limit: u32, period: Period) -> Result<()> {
    let tracks = match client.get_top_tracks(limit, period)? {
        Some(tracks) => tracks,
        None => {
            println!("No listening history yet.");
            return Ok(());
        }
    };

    for (rank, track) in tracks.iter().enumerate() {
        println!(
            "{:>3}. {} - {} ({} plays)",
            rank + 1,
            track.artist_link.name,
            track.title,
            track.plays.unwrap_or(0)
        );
    }

    Ok(())
}

fn top_albums(client: &LastfmClient, limit: u32, period: Period) -> Result<()> {
    let albums = match client.get_top_albums(limit, period)? {
        Some(albums) => albums,
        None => {
            println!("No listening history yet.");
            return Ok(());
        }
    };

    for (rank, album) in albums.iter().enumerate() {
        println!(
            "{:>3}. {} - {} ({} plays)",
            rank + 1,
            album.artist_link.name,
            album.title,
            album.plays.unwrap_or(0)
        );
    }

    Ok(())
}

fn artist_info(client: &LastfmClient, name: &str) -> Result<()> {
    let artist = match client.get_artist_info(name, None)? {
        Some(artist) => artist,
        None => {
            println!("Artist not found.");
            return Ok(());
        }
    };

    println!("{}", artist.name);
    if let Some(url) = &artist.url {
        println!("  {}", url);
    }
    println!(
        "  {} listeners, {} plays ({} yours)",
        artist.global_listeners.unwrap_or(0),
        artist.global_plays.unwrap_or(0),
        artist.plays.unwrap_or(0)
    );
    if !artist.tags.is_empty() {
        let tags: Vec<&str> = artist.tags.iter().map(|tag| tag.name.as_str()).collect();
        println!("  Tags: {}", tags.join(", "));
    }
    if !artist.similar_artists.is_empty() {
        let similar: Vec<&str> = artist
            .similar_artists
            .iter()
            .map(|artist| artist.name.as_str())
            .collect();
        println!("  Similar: {}", similar.join(", "));
    }
    if let Some(bio) = &artist.bio {
        if !bio.is_empty() {
            println!("\n{}", bio);
        }
    }

    Ok(())
}

fn track_info(client: &LastfmClient, artist: &str, title: &str) -> Result<()> {
    let track = match client.get_track_info(artist, title, None)? {
        Some(track) => track,
        None => {
            println!("Track not found.");
            return Ok(());
        }
    };

    println!("{} - {}", track.artist_link.name, track.title);
    println!("  {}", track.url);
    println!(
        "  {} listeners, {} plays ({} yours)",
        track.global_listeners.unwrap_or(0),
        track.global_plays.unwrap_or(0),
        track.plays.unwrap_or(0)
    );
    if track.is_loved == Some(true) {
        println!("  ❤ loved");
    }
    if !track.tags.is_empty() {
        let tags: Vec<&str> = track.tags.iter().map(|tag| tag.name.as_str()).collect();
        println!("  Tags: {}", tags.join(", "));
    }

    Ok(())
}

fn album_info(client: &LastfmClient, artist: &str, title: &str) -> Result<()> {
    let album = match client.get_album_info(artist, title, None)? {
        Some(album) => album,
        None => {
            println!("Album not found.");
            return Ok(());
        }
    };

    println!("{} - {}", album.artist_link.name, album.title);
    if let Some(url) = &album.url {
        println!("  {}", url);
    }
    println!(
        "  {} listeners, {} plays ({} yours)",
        album.global_listeners.unwrap_or(0),
        album.global_plays.unwrap_or(0),
        album.plays.unwrap_or(0)
    );
    if let Some(artwork) = &album.image_set.medium_url {
        println!("  Artwork: {}", artwork);
    }

    Ok(())
}

fn report_submission(action: &str, status: &lastfm_scrobbler::lastfm::LastfmSubmissionStatus) {
    match status.ignored_error_code {
        Some(code) => println!(
            "{}, but the service ignored it (code {}).",
            action, code
        ),
        None => println!("{}.", action),
    }
}
