// Response mappers for the Last.fm API
// Pure functions from decoded JSON to domain objects. No I/O and no
// retries here; an absent expected key propagates as MissingKey and the
// orchestrator decides what to do with it.

use std::fmt;

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::models::{
    FriendScrobble, ImageSet, LastfmAlbum, LastfmArtist, LastfmArtistLink, LastfmList,
    LastfmScrobble, LastfmSession, LastfmSubmissionStatus, LastfmTag, LastfmTrack, LastfmUser,
    LastfmUserInfo,
};

/// An expected key (or array slot) was absent or unreadable in an
/// otherwise well-formed response. Treated as a transient upstream glitch
/// by the retry loop, not as a permanent shape change.
#[derive(Debug, Clone)]
pub struct MissingKey(pub String);

impl fmt::Display for MissingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "missing key: {}", self.0)
    }
}

fn missing(path: impl Into<String>) -> MissingKey {
    MissingKey(path.into())
}

/// A mapper yields the domain object, or `None` for documented empty
/// outcomes (no scrobbles yet, stale friend track), or a missing-key
/// failure.
pub type MapResult<T> = Result<Option<T>, MissingKey>;

// --- JSON field access ---

pub(crate) trait JsonFieldExt {
    fn field(&self, key: &str) -> Result<&Value, MissingKey>;
    fn str_field(&self, key: &str) -> Result<&str, MissingKey>;
    /// Integer that the wire may send as a number or a numeric string.
    fn u32_field(&self, key: &str) -> Result<u32, MissingKey>;
    fn i64_field(&self, key: &str) -> Result<i64, MissingKey>;
    /// Boolean transmitted as "0"/"1", parsed via integer coercion.
    fn flag_field(&self, key: &str) -> Result<bool, MissingKey>;
    fn array_field(&self, key: &str) -> Result<&Vec<Value>, MissingKey>;
}

impl JsonFieldExt for Value {
    fn field(&self, key: &str) -> Result<&Value, MissingKey> {
        self.get(key).ok_or_else(|| missing(key))
    }

    fn str_field(&self, key: &str) -> Result<&str, MissingKey> {
        self.field(key)?.as_str().ok_or_else(|| missing(key))
    }

    fn u32_field(&self, key: &str) -> Result<u32, MissingKey> {
        lenient_i64(self.field(key)?)
            .and_then(|value| u32::try_from(value).ok())
            .ok_or_else(|| missing(key))
    }

    fn i64_field(&self, key: &str) -> Result<i64, MissingKey> {
        lenient_i64(self.field(key)?).ok_or_else(|| missing(key))
    }

    fn flag_field(&self, key: &str) -> Result<bool, MissingKey> {
        Ok(self.u32_field(key)? != 0)
    }

    fn array_field(&self, key: &str) -> Result<&Vec<Value>, MissingKey> {
        self.field(key)?.as_array().ok_or_else(|| missing(key))
    }
}

fn lenient_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// The service uses "" to mean "no value"; normalize it to absent.
fn non_empty(text: &str) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

fn timestamp(unix: i64) -> Result<DateTime<Utc>, MissingKey> {
    DateTime::from_timestamp(unix, 0).ok_or_else(|| missing("timestamp out of range"))
}

/// Select artwork URLs by position in the image array: index 1 for small,
/// the last slot for medium. The declared size labels are not trusted.
fn image_set(images: &Value) -> Result<ImageSet, MissingKey> {
    let list = images.as_array().ok_or_else(|| missing("image"))?;
    let small = list.get(1).ok_or_else(|| missing("image[1]"))?.str_field("#text")?;
    let medium = list.last().ok_or_else(|| missing("image[-1]"))?.str_field("#text")?;

    Ok(ImageSet {
        small_url: non_empty(small),
        medium_url: non_empty(medium),
    })
}

fn tag_list(container: &Value) -> Result<Vec<LastfmTag>, MissingKey> {
    container
        .array_field("tag")?
        .iter()
        .map(|tag| {
            Ok(LastfmTag {
                name: tag.str_field("name")?.to_string(),
                url: tag.str_field("url")?.to_string(),
            })
        })
        .collect()
}

fn artist_link(artist: &Value) -> Result<LastfmArtistLink, MissingKey> {
    Ok(LastfmArtistLink {
        name: artist.str_field("name")?.to_string(),
        url: Some(artist.str_field("url")?.to_string()),
    })
}

// --- Authentication ---

pub(crate) fn auth_token(response: &Value) -> MapResult<String> {
    Ok(Some(response.str_field("token")?.to_string()))
}

/// Maps the session exchange payload. An unauthorized token comes back
/// with an empty key; the facade turns that into an auth-incomplete
/// failure.
pub(crate) fn session(response: &Value) -> MapResult<LastfmSession> {
    let session = response.field("session")?;

    Ok(Some(LastfmSession {
        session_key: session.str_field("key")?.to_string(),
        username: session.str_field("name")?.to_string(),
    }))
}

// --- User reads ---

pub(crate) fn user_info(response: &Value) -> MapResult<LastfmUserInfo> {
    let user = response.field("user")?;
    let images = user.array_field("image")?;
    let image_url = images
        .last()
        .ok_or_else(|| missing("image[-1]"))?
        .str_field("#text")?
        .replace("300", "500");

    Ok(Some(LastfmUserInfo {
        username: user.str_field("name")?.to_string(),
        real_name: non_empty(user.str_field("realname")?),
        image_url,
        url: user.str_field("url")?.to_string(),
        registered_date: timestamp(user.field("registered")?.i64_field("unixtime")?)?,
        total_scrobbles: user.u32_field("playcount")?,
    }))
}

pub(crate) fn recent_scrobbles(response: &Value) -> MapResult<LastfmList<LastfmScrobble>> {
    let recent = response.field("recenttracks")?;
    let tracks = recent.array_field("track")?;
    let attr_total = recent.field("@attr")?.u32_field("total")?;

    if attr_total == 0 {
        return Ok(None);
    }

    let items = tracks
        .iter()
        // A now-playing entry carries an @attr marker and is not yet a
        // completed scrobble.
        .filter(|track| track.get("@attr").is_none())
        .map(|track| {
            Ok(LastfmScrobble {
                artist_name: track.field("artist")?.str_field("#text")?.to_string(),
                track_title: track.str_field("name")?.to_string(),
                album_title: non_empty(track.field("album")?.str_field("#text")?),
                timestamp: timestamp(track.field("date")?.i64_field("uts")?)?,
            })
        })
        .collect::<Result<Vec<_>, MissingKey>>()?;

    Ok(Some(LastfmList { items, attr_total }))
}

pub(crate) fn loved_total(response: &Value) -> MapResult<u32> {
    Ok(Some(
        response
            .field("lovedtracks")?
            .field("@attr")?
            .u32_field("total")?,
    ))
}

pub(crate) fn friends(response: &Value) -> MapResult<Vec<LastfmUser>> {
    let users = response
        .field("friends")?
        .array_field("user")?
        .iter()
        .map(|friend| {
            // All image sizes are the same for user avatars.
            let image_url = friend
                .array_field("image")?
                .first()
                .ok_or_else(|| missing("image[0]"))?
                .str_field("#text")?
                .to_string();

            Ok(LastfmUser {
                url: friend.str_field("url")?.to_string(),
                username: friend.str_field("name")?.to_string(),
                real_name: non_empty(friend.str_field("realname")?),
                image_url,
            })
        })
        .collect::<Result<Vec<_>, MissingKey>>()?;

    Ok(Some(users))
}

/// A friend's latest track, requested with `extended=1` and `limit=1`.
/// Currently playing tracks have no timestamp; a past scrobble older than
/// 24 hours maps to "no recent scrobble".
pub(crate) fn friend_scrobble(response: &Value, now: DateTime<Utc>) -> MapResult<FriendScrobble> {
    let tracks = response.field("recenttracks")?.array_field("track")?;
    // Not every user has scrobbled at all.
    let track = match tracks.first() {
        Some(track) => track,
        None => return Ok(None),
    };

    // "nowplaying" is "true" when present and missing otherwise.
    let is_playing = track
        .get("@attr")
        .and_then(|attr| attr.get("nowplaying"))
        .is_some();

    if !is_playing {
        let played_at = timestamp(track.field("date")?.i64_field("uts")?)?;
        if now.signed_duration_since(played_at).num_seconds() >= 86_400 {
            return Ok(None);
        }
    }

    let artist = track.field("artist")?;

    Ok(Some(FriendScrobble {
        url: track.str_field("url")?.to_string(),
        track_title: track.str_field("name")?.to_string(),
        artist_name: artist.str_field("name")?.to_string(),
        artist_url: artist.str_field("url")?.to_string(),
        album_title: non_empty(track.field("album")?.str_field("#text")?),
        is_loved: track.flag_field("loved")?,
        is_playing,
    }))
}

// --- Charts ---

pub(crate) fn top_artists(response: &Value) -> MapResult<LastfmList<LastfmArtist>> {
    let top = response.field("topartists")?;
    let items = top
        .array_field("artist")?
        .iter()
        .map(|artist| {
            Ok(LastfmArtist {
                name: artist.str_field("name")?.to_string(),
                url: Some(artist.str_field("url")?.to_string()),
                plays: Some(artist.u32_field("playcount")?),
                ..Default::default()
            })
        })
        .collect::<Result<Vec<_>, MissingKey>>()?;

    Ok(Some(LastfmList {
        items,
        attr_total: top.field("@attr")?.u32_field("total")?,
    }))
}

pub(crate) fn top_tracks(response: &Value) -> MapResult<Vec<LastfmTrack>> {
    let tracks = response
        .field("toptracks")?
        .array_field("track")?
        .iter()
        .map(|track| {
            Ok(LastfmTrack {
                url: track.str_field("url")?.to_string(),
                title: track.str_field("name")?.to_string(),
                artist_link: artist_link(track.field("artist")?)?,
                plays: Some(track.u32_field("playcount")?),
                is_loved: None,
                global_listeners: None,
                global_plays: None,
                tags: Vec::new(),
            })
        })
        .collect::<Result<Vec<_>, MissingKey>>()?;

    Ok(Some(tracks))
}

pub(crate) fn top_albums(response: &Value) -> MapResult<Vec<LastfmAlbum>> {
    let albums = response
        .field("topalbums")?
        .array_field("album")?
        .iter()
        .map(|album| {
            Ok(LastfmAlbum {
                url: Some(album.str_field("url")?.to_string()),
                title: album.str_field("name")?.to_string(),
                artist_link: artist_link(album.field("artist")?)?,
                image_set: image_set(album.field("image")?)?,
                plays: Some(album.u32_field("playcount")?),
                global_listeners: None,
                global_plays: None,
                tags: Vec::new(),
            })
        })
        .collect::<Result<Vec<_>, MissingKey>>()?;

    Ok(Some(albums))
}

// --- Info lookups ---

pub(crate) fn artist_info(response: &Value) -> MapResult<LastfmArtist> {
    let artist = response.field("artist")?;
    let stats = artist.field("stats")?;

    // The bio ends with a promotional "Read more on Last.fm" anchor;
    // keep everything before it.
    let bio = artist
        .field("bio")?
        .str_field("content")?
        .split(" <")
        .next()
        .unwrap_or_default()
        .trim()
        .to_string();

    let similar_artists = artist
        .field("similar")?
        .array_field("artist")?
        .iter()
        .map(|similar| {
            Ok(LastfmArtist {
                name: similar.str_field("name")?.to_string(),
                url: Some(similar.str_field("url")?.to_string()),
                ..Default::default()
            })
        })
        .collect::<Result<Vec<_>, MissingKey>>()?;

    Ok(Some(LastfmArtist {
        name: artist.str_field("name")?.to_string(),
        url: Some(artist.str_field("url")?.to_string()),
        plays: Some(stats.u32_field("userplaycount")?),
        global_listeners: Some(stats.u32_field("listeners")?),
        global_plays: Some(stats.u32_field("playcount")?),
        bio: Some(bio),
        tags: tag_list(artist.field("tags")?)?,
        similar_artists,
    }))
}

pub(crate) fn track_info(response: &Value) -> MapResult<LastfmTrack> {
    let track = response.field("track")?;

    Ok(Some(LastfmTrack {
        url: track.str_field("url")?.to_string(),
        title: track.str_field("name")?.to_string(),
        artist_link: artist_link(track.field("artist")?)?,
        plays: Some(track.u32_field("userplaycount")?),
        is_loved: Some(track.flag_field("userloved")?),
        global_listeners: Some(track.u32_field("listeners")?),
        global_plays: Some(track.u32_field("playcount")?),
        tags: tag_list(track.field("toptags")?)?,
    }))
}

pub(crate) fn album_info(response: &Value) -> MapResult<LastfmAlbum> {
    let album = response.field("album")?;

    Ok(Some(LastfmAlbum {
        url: Some(album.str_field("url")?.to_string()),
        title: album.str_field("name")?.to_string(),
        // Album lookups carry the artist as a bare name.
        artist_link: LastfmArtistLink {
            name: album.str_field("artist")?.to_string(),
            url: None,
        },
        image_set: image_set(album.field("image")?)?,
        plays: Some(album.u32_field("userplaycount")?),
        global_listeners: Some(album.u32_field("listeners")?),
        global_plays: Some(album.u32_field("playcount")?),
        tags: tag_list(album.field("tags")?)?,
    }))
}

// --- Submissions ---

/// Code 0 on the wire means the submission was not ignored.
fn ignored_code(status: &Value) -> Result<Option<u32>, MissingKey> {
    let code = status.field("ignoredMessage")?.u32_field("code")?;
    Ok(if code == 0 { None } else { Some(code) })
}

pub(crate) fn scrobble_status(response: &Value) -> MapResult<LastfmSubmissionStatus> {
    let scrobbles = response.field("scrobbles")?;
    let attr = scrobbles.field("@attr")?;
    let status = scrobbles.field("scrobble")?;

    Ok(Some(LastfmSubmissionStatus {
        accepted_count: attr.u32_field("accepted")?,
        ignored_count: Some(attr.u32_field("ignored")?),
        ignored_error_code: ignored_code(status)?,
    }))
}

pub(crate) fn now_playing_status(response: &Value) -> MapResult<LastfmSubmissionStatus> {
    let status = response.field("nowplaying")?;

    Ok(Some(LastfmSubmissionStatus {
        accepted_count: 1,
        ignored_count: None,
        ignored_error_code: ignored_code(status)?,
    }))
}

/// track.love and track.unlove return no useful payload; any failure is
/// raised before we get here.
pub(crate) fn loved_status(_response: &Value) -> MapResult<LastfmSubmissionStatus> {
    Ok(Some(LastfmSubmissionStatus {
        accepted_count: 1,
        ignored_count: None,
        ignored_error_code: None,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    #[test]
    fn user_info_normalizes_empty_real_name() {
        let response = json!({
            "user": {
                "name": "kale",
                "realname": "",
                "url": "https://www.last.fm/user/kale",
                "playcount": "12345",
                "registered": { "unixtime": "1388534400" },
                "image": [
                    { "size": "small", "#text": "https://images/34s/a.png" },
                    { "size": "large", "#text": "https://images/300x300/a.png" }
                ]
            }
        });

        let info = user_info(&response).unwrap().unwrap();
        assert_eq!(info.username, "kale");
        assert_eq!(info.real_name, None);
        assert_eq!(info.total_scrobbles, 12345);
        // The largest avatar is requested one size up.
        assert_eq!(info.image_url, "https://images/500x500/a.png");
    }

    #[test]
    fn user_info_reports_missing_keys() {
        let response = json!({ "user": { "name": "kale" } });

        assert!(user_info(&response).is_err());
    }

    #[test]
    fn recent_scrobbles_skips_now_playing_entries() {
        let response = json!({
            "recenttracks": {
                "@attr": { "total": "2" },
                "track": [
                    {
                        "@attr": { "nowplaying": "true" },
                        "name": "Still Playing",
                        "artist": { "#text": "Cher" },
                        "album": { "#text": "" }
                    },
                    {
                        "name": "Believe",
                        "artist": { "#text": "Cher" },
                        "album": { "#text": "Believe" },
                        "date": { "uts": "1700000000" }
                    }
                ]
            }
        });

        let list = recent_scrobbles(&response).unwrap().unwrap();
        assert_eq!(list.attr_total, 2);
        assert_eq!(list.items.len(), 1);
        assert_eq!(list.items[0].track_title, "Believe");
        assert_eq!(list.items[0].album_title.as_deref(), Some("Believe"));
    }

    #[test]
    fn recent_scrobbles_empty_history_is_none() {
        let response = json!({
            "recenttracks": {
                "@attr": { "total": "0" },
                "track": []
            }
        });

        assert!(recent_scrobbles(&response).unwrap().is_none());
    }

    fn friend_track(uts: i64) -> Value {
        json!({
            "recenttracks": {
                "track": [{
                    "name": "Believe",
                    "url": "https://www.last.fm/music/Cher/_/Believe",
                    "artist": { "name": "Cher", "url": "https://www.last.fm/music/Cher" },
                    "album": { "#text": "Believe" },
                    "loved": "1",
                    "date": { "uts": uts.to_string() }
                }]
            }
        })
    }

    #[test]
    fn friend_scrobble_at_freshness_boundary() {
        let now = Utc::now();

        // Exactly 24 hours old: dropped.
        let stale = friend_track((now - Duration::seconds(86_400)).timestamp());
        assert!(friend_scrobble(&stale, now).unwrap().is_none());

        // One second inside the window: kept.
        let fresh = friend_track((now - Duration::seconds(86_399)).timestamp());
        let scrobble = friend_scrobble(&fresh, now).unwrap().unwrap();
        assert_eq!(scrobble.artist_name, "Cher");
        assert!(scrobble.is_loved);
        assert!(!scrobble.is_playing);
    }

    #[test]
    fn friend_scrobble_now_playing_has_no_timestamp() {
        let response = json!({
            "recenttracks": {
                "track": [{
                    "@attr": { "nowplaying": "true" },
                    "name": "Believe",
                    "url": "https://www.last.fm/music/Cher/_/Believe",
                    "artist": { "name": "Cher", "url": "https://www.last.fm/music/Cher" },
                    "album": { "#text": "" },
                    "loved": "0"
                }]
            }
        });

        let scrobble = friend_scrobble(&response, Utc::now()).unwrap().unwrap();
        assert!(scrobble.is_playing);
        assert!(!scrobble.is_loved);
        assert_eq!(scrobble.album_title, None);
    }

    #[test]
    fn friend_scrobble_without_history_is_none() {
        let response = json!({ "recenttracks": { "track": [] } });

        assert!(friend_scrobble(&response, Utc::now()).unwrap().is_none());
    }

    #[test]
    fn artist_info_truncates_promotional_bio_link() {
        let response = json!({
            "artist": {
                "name": "Cher",
                "url": "https://www.last.fm/music/Cher",
                "stats": {
                    "listeners": "1000000",
                    "playcount": "20000000",
                    "userplaycount": "42"
                },
                "bio": {
                    "content": "Cher is an American singer. <a href=\"https://www.last.fm/music/Cher\">Read more on Last.fm</a>"
                },
                "tags": { "tag": [{ "name": "pop", "url": "https://www.last.fm/tag/pop" }] },
                "similar": { "artist": [{ "name": "Madonna", "url": "https://www.last.fm/music/Madonna" }] }
            }
        });

        let artist = artist_info(&response).unwrap().unwrap();
        assert_eq!(artist.bio.as_deref(), Some("Cher is an American singer."));
        assert_eq!(artist.plays, Some(42));
        assert_eq!(artist.similar_artists.len(), 1);
        assert_eq!(artist.tags[0].name, "pop");
    }

    #[test]
    fn track_info_coerces_loved_flag() {
        let response = json!({
            "track": {
                "name": "Believe",
                "url": "https://www.last.fm/music/Cher/_/Believe",
                "artist": { "name": "Cher", "url": "https://www.last.fm/music/Cher" },
                "userplaycount": "7",
                "userloved": "1",
                "listeners": "500000",
                "playcount": "3000000",
                "toptags": { "tag": [] }
            }
        });

        let track = track_info(&response).unwrap().unwrap();
        assert_eq!(track.is_loved, Some(true));
        assert_eq!(track.plays, Some(7));
    }

    #[test]
    fn album_image_selection_is_positional() {
        let response = json!({
            "album": {
                "name": "Believe",
                "url": "https://www.last.fm/music/Cher/Believe",
                "artist": "Cher",
                "userplaycount": "3",
                "listeners": "100",
                "playcount": "1000",
                "image": [
                    { "size": "small", "#text": "https://images/s.png" },
                    { "size": "whatever", "#text": "https://images/m.png" },
                    { "size": "large", "#text": "https://images/l.png" },
                    { "size": "mega", "#text": "" }
                ],
                "tags": { "tag": [] }
            }
        });

        let album = album_info(&response).unwrap().unwrap();
        // Index 1 regardless of its size label; the last slot is empty and
        // therefore absent.
        assert_eq!(album.image_set.small_url.as_deref(), Some("https://images/m.png"));
        assert_eq!(album.image_set.medium_url, None);
        assert_eq!(album.artist_link.name, "Cher");
        assert_eq!(album.artist_link.url, None);
    }

    #[test]
    fn scrobble_status_normalizes_ignored_code() {
        let accepted = json!({
            "scrobbles": {
                "@attr": { "accepted": 1, "ignored": 0 },
                "scrobble": { "ignoredMessage": { "code": "0" } }
            }
        });
        let status = scrobble_status(&accepted).unwrap().unwrap();
        assert_eq!(status.accepted_count, 1);
        assert_eq!(status.ignored_count, Some(0));
        assert_eq!(status.ignored_error_code, None);

        let ignored = json!({
            "scrobbles": {
                "@attr": { "accepted": 0, "ignored": 1 },
                "scrobble": { "ignoredMessage": { "code": "1" } }
            }
        });
        let status = scrobble_status(&ignored).unwrap().unwrap();
        assert_eq!(status.accepted_count, 0);
        assert_eq!(status.ignored_error_code, Some(1));
    }

    #[test]
    fn now_playing_status_reads_ignored_message() {
        let response = json!({
            "nowplaying": { "ignoredMessage": { "code": "5" } }
        });

        let status = now_playing_status(&response).unwrap().unwrap();
        assert_eq!(status.accepted_count, 1);
        assert_eq!(status.ignored_error_code, Some(5));
    }

    #[test]
    fn session_maps_key_and_username() {
        let response = json!({
            "session": { "key": "abc123", "name": "kale", "subscriber": 0 }
        });

        let session = session(&response).unwrap().unwrap();
        assert_eq!(session.session_key, "abc123");
        assert_eq!(session.username, "kale");
    }

    #[test]
    fn friends_reads_first_image_slot() {
        let response = json!({
            "friends": {
                "user": [{
                    "name": "bestie",
                    "realname": "Bestie",
                    "url": "https://www.last.fm/user/bestie",
                    "image": [
                        { "size": "small", "#text": "https://images/avatar.png" },
                        { "size": "large", "#text": "https://images/avatar.png" }
                    ]
                }]
            }
        });

        let users = friends(&response).unwrap().unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].image_url, "https://images/avatar.png");
        assert_eq!(users[0].real_name.as_deref(), Some("Bestie"));
    }
}
