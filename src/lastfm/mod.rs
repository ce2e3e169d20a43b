// Last.fm API client
// One method per remote operation; the request/retry/caching protocol
// lives in request.rs and the JSON-to-domain translation in mappers.rs.

use chrono::{DateTime, Local, NaiveTime, Utc};

mod cache;
mod error;
mod mappers;
mod models;
mod request;
pub mod signature;
pub mod transport;

pub use error::{LastfmError, Result};
pub use models::{
    FriendScrobble, ImageSet, LastfmAlbum, LastfmArtist, LastfmArtistLink, LastfmList,
    LastfmScrobble, LastfmSession, LastfmSubmissionStatus, LastfmTag, LastfmTrack, LastfmUser,
    LastfmUserInfo, Period,
};

use request::RequestOrchestrator;
use transport::{HttpMethod, HttpTransport, Transport};

fn arg(key: &str, value: impl ToString) -> (String, String) {
    (key.to_string(), value.to_string())
}

/// Client for the Last.fm web service.
///
/// Owns the authenticated session: `log_in_with_session` stores it once
/// and every subsequent signed call reads it. Domain objects are returned
/// by value and carry no reference back to the client.
pub struct LastfmClient {
    orchestrator: RequestOrchestrator,
    session: Option<LastfmSession>,
}

impl LastfmClient {
    pub fn new(api_key: String, api_secret: String) -> Self {
        Self::with_transport(api_key, api_secret, Box::new(HttpTransport))
    }

    /// Build a client over a custom transport (used by tests).
    pub fn with_transport(
        api_key: String,
        api_secret: String,
        transport: Box<dyn Transport>,
    ) -> Self {
        Self {
            orchestrator: RequestOrchestrator::new(api_key, api_secret, transport),
            session: None,
        }
    }

    // --- Authentication ---

    /// Request an authorization token; it stays valid for 60 minutes and
    /// becomes useful once the user approves it in their browser.
    pub fn get_auth_token(&self) -> Result<String> {
        self.orchestrator
            .request(
                None,
                vec![arg("method", "auth.getToken")],
                HttpMethod::Get,
                false,
                mappers::auth_token,
            )?
            .ok_or(LastfmError::EmptyResponse("auth.getToken"))
    }

    /// URL the user opens to allow this application access to their
    /// account.
    pub fn generate_authorization_url(&self, auth_token: &str) -> String {
        format!(
            "https://www.last.fm/api/auth/?api_key={}&token={}",
            self.orchestrator.api_key(),
            auth_token
        )
    }

    /// Exchange an authorized token for a session key and username.
    pub fn get_session(&self, auth_token: &str) -> Result<LastfmSession> {
        let session = self
            .orchestrator
            .request(
                None,
                vec![arg("method", "auth.getSession"), arg("token", auth_token)],
                HttpMethod::Get,
                false,
                mappers::session,
            )?
            .ok_or(LastfmError::EmptyResponse("auth.getSession"))?;

        if session.session_key.is_empty() {
            return Err(LastfmError::AuthPending);
        }

        Ok(session)
    }

    /// Store the session used by every subsequent signed call.
    pub fn log_in_with_session(&mut self, session: LastfmSession) {
        log::info!("Logged in to Last.fm as {}", session.username);
        self.session = Some(session);
    }

    pub fn is_logged_in(&self) -> bool {
        self.session.is_some()
    }

    fn username(&self) -> Result<&str> {
        self.session
            .as_ref()
            .map(|session| session.username.as_str())
            .ok_or(LastfmError::NotLoggedIn)
    }

    // --- User reads ---

    pub fn get_user_info(&self) -> Result<Option<LastfmUserInfo>> {
        let args = vec![
            arg("method", "user.getInfo"),
            arg("username", self.username()?),
        ];

        self.orchestrator
            .request(None, args, HttpMethod::Get, false, mappers::user_info)
    }

    /// The user's latest completed scrobbles, newest first. Currently
    /// playing tracks are excluded; a user with no history yields `None`.
    pub fn get_recent_scrobbles(
        &self,
        limit: u32,
        from: Option<DateTime<Utc>>,
        username: Option<&str>,
    ) -> Result<Option<LastfmList<LastfmScrobble>>> {
        let username = match username {
            Some(username) => username.to_string(),
            None => self.username()?.to_string(),
        };

        let mut args = vec![
            arg("method", "user.getRecentTracks"),
            arg("username", username),
            arg("limit", limit),
        ];
        if let Some(from) = from {
            // Whole seconds; the API rejects decimal timestamps.
            args.push(arg("from", from.timestamp()));
        }

        self.orchestrator
            .request(None, args, HttpMethod::Get, false, mappers::recent_scrobbles)
    }

    pub fn get_total_loved_tracks(&self) -> Result<u32> {
        let args = vec![
            arg("method", "user.getLovedTracks"),
            arg("user", self.username()?),
            // The count comes from the list attributes; one item is enough.
            arg("limit", 1),
        ];

        self.orchestrator
            .request(None, args, HttpMethod::Get, false, mappers::loved_total)?
            .ok_or(LastfmError::EmptyResponse("user.getLovedTracks"))
    }

    /// Scrobbles submitted since local midnight.
    pub fn get_total_scrobbles_today(&self) -> Result<u32> {
        let midnight = Local::now().date_naive().and_time(NaiveTime::MIN);
        let from = midnight
            .and_local_timezone(Local)
            .earliest()
            .map(|start| start.with_timezone(&Utc));

        let scrobbles = self.get_recent_scrobbles(1, from, None)?;
        Ok(scrobbles.map(|list| list.attr_total).unwrap_or(0))
    }

    /// The user's friends list. The remote reports an error for users
    /// with no friends; that case surfaces as `None`.
    pub fn get_friends(&self) -> Result<Option<Vec<LastfmUser>>> {
        let args = vec![
            arg("method", "user.getFriends"),
            arg("username", self.username()?),
        ];

        match self
            .orchestrator
            .request(None, args, HttpMethod::Get, false, mappers::friends)
        {
            Ok(friends) => Ok(friends),
            Err(err) => {
                log::debug!("Friends listing unavailable: {}", err);
                Ok(None)
            }
        }
    }

    /// A friend's current or latest track. `None` when the friend has no
    /// scrobbles, their last one is older than 24 hours, or their
    /// listening history is private (403).
    pub fn get_friend_scrobble(&self, username: &str) -> Result<Option<FriendScrobble>> {
        let args = vec![
            arg("method", "user.getRecentTracks"),
            arg("username", username),
            arg("limit", 1),
            arg("extended", 1),
        ];

        let now = Utc::now();
        match self.orchestrator.request(
            None,
            args,
            HttpMethod::Get,
            false,
            |json| mappers::friend_scrobble(json, now),
        ) {
            Err(LastfmError::PermissionDenied { .. }) => {
                log::debug!("{} has their recent listening hidden", username);
                Ok(None)
            }
            other => other,
        }
    }

    // --- Charts ---

    pub fn get_top_artists(
        &self,
        limit: u32,
        period: Period,
    ) -> Result<Option<LastfmList<LastfmArtist>>> {
        let args = vec![
            arg("method", "user.getTopArtists"),
            arg("username", self.username()?),
            arg("limit", limit),
            arg("period", period.as_str()),
        ];

        self.orchestrator
            .request(None, args, HttpMethod::Get, false, mappers::top_artists)
    }

    pub fn get_top_tracks(&self, limit: u32, period: Period) -> Result<Option<Vec<LastfmTrack>>> {
        let args = vec![
            arg("method", "user.getTopTracks"),
            arg("username", self.username()?),
            arg("limit", limit),
            arg("period", period.as_str()),
            arg("extended", 1),
        ];

        self.orchestrator
            .request(None, args, HttpMethod::Get, false, mappers::top_tracks)
    }

    pub fn get_top_albums(&self, limit: u32, period: Period) -> Result<Option<Vec<LastfmAlbum>>> {
        let args = vec![
            arg("method", "user.getTopAlbums"),
            arg("username", self.username()?),
            arg("limit", limit),
            arg("period", period.as_str()),
        ];

        self.orchestrator
            .request(None, args, HttpMethod::Get, false, mappers::top_albums)
    }

    // --- Info lookups ---

    /// `None` when the artist is unknown to the service.
    pub fn get_artist_info(
        &self,
        artist_name: &str,
        username: Option<&str>,
    ) -> Result<Option<LastfmArtist>> {
        let args = vec![
            arg("method", "artist.getInfo"),
            arg("username", self.scoped_username(username)?),
            arg("artist", artist_name),
        ];

        self.orchestrator
            .request(None, args, HttpMethod::Get, false, mappers::artist_info)
    }

    pub fn get_track_info(
        &self,
        artist_name: &str,
        track_title: &str,
        username: Option<&str>,
    ) -> Result<Option<LastfmTrack>> {
        let args = vec![
            arg("method", "track.getInfo"),
            arg("username", self.scoped_username(username)?),
            arg("artist", artist_name),
            arg("track", track_title),
        ];

        self.orchestrator
            .request(None, args, HttpMethod::Get, false, mappers::track_info)
    }

    /// Album details. The only cacheable lookup: play counts are not
    /// displayed from it, so a one-minute-stale answer is acceptable.
    pub fn get_album_info(
        &self,
        artist_name: &str,
        album_title: &str,
        username: Option<&str>,
    ) -> Result<Option<LastfmAlbum>> {
        let args = vec![
            arg("method", "album.getInfo"),
            arg("username", self.scoped_username(username)?),
            arg("artist", artist_name),
            arg("album", album_title),
        ];

        self.orchestrator
            .request(None, args, HttpMethod::Get, true, mappers::album_info)
    }

    fn scoped_username(&self, username: Option<&str>) -> Result<String> {
        match username {
            Some(username) => Ok(username.to_string()),
            None => Ok(self.username()?.to_string()),
        }
    }

    // --- Submissions ---

    /// Record a completed play. The timestamp identifies the play event;
    /// submitting the same one twice is reported back via the ignored
    /// counters rather than an error.
    pub fn submit_scrobble(
        &self,
        artist_name: &str,
        track_title: &str,
        timestamp: DateTime<Utc>,
        album_title: Option<&str>,
        album_artist_name: Option<&str>,
    ) -> Result<LastfmSubmissionStatus> {
        let mut args = vec![
            arg("method", "track.scrobble"),
            arg("username", self.username()?),
            arg("artist", artist_name),
            arg("track", track_title),
            arg("timestamp", timestamp.timestamp()),
        ];
        if let Some(album_title) = album_title {
            args.push(arg("album", album_title));

            // Album artist only makes sense alongside an album title.
            if let Some(album_artist_name) = album_artist_name {
                args.push(arg("albumArtist", album_artist_name));
            }
        }

        self.orchestrator
            .request(
                self.session.as_ref(),
                args,
                HttpMethod::Post,
                false,
                mappers::scrobble_status,
            )?
            .ok_or(LastfmError::EmptyResponse("track.scrobble"))
    }

    /// Tell the service what is playing right now. Transient state, not a
    /// scrobble; `duration` is the track length in seconds.
    pub fn update_now_playing(
        &self,
        artist_name: &str,
        track_title: &str,
        duration: u32,
        album_title: Option<&str>,
        album_artist_name: Option<&str>,
    ) -> Result<LastfmSubmissionStatus> {
        let mut args = vec![
            arg("method", "track.updateNowPlaying"),
            arg("artist", artist_name),
            arg("track", track_title),
            arg("duration", duration),
        ];
        if let Some(album_title) = album_title {
            args.push(arg("album", album_title));

            if let Some(album_artist_name) = album_artist_name {
                args.push(arg("albumArtist", album_artist_name));
            }
        }

        self.orchestrator
            .request(
                self.session.as_ref(),
                args,
                HttpMethod::Post,
                false,
                mappers::now_playing_status,
            )?
            .ok_or(LastfmError::EmptyResponse("track.updateNowPlaying"))
    }

    pub fn set_track_loved(
        &self,
        artist_name: &str,
        track_title: &str,
        loved: bool,
    ) -> Result<LastfmSubmissionStatus> {
        let args = vec![
            arg(
                "method",
                if loved { "track.love" } else { "track.unlove" },
            ),
            arg("artist", artist_name),
            arg("track", track_title),
        ];

        self.orchestrator
            .request(
                self.session.as_ref(),
                args,
                HttpMethod::Post,
                false,
                mappers::loved_status,
            )?
            .ok_or(LastfmError::EmptyResponse("track.love"))
    }
}
