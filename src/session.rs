use std::collections::HashSet;
use std::time::Duration;

use serde::Serialize;
use strum::{Display, EnumString};

/// Positions below this are treated as "the track just (re)started" by the
/// previous-track heuristic.
pub const START_OF_TRACK: Duration = Duration::from_secs(1);

/// One media session as printed to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaSession {
    pub source: String,
    pub title: String,
    pub artist: String,
    pub current_time: String,
    pub total_time: String,
    pub status: PlaybackStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, Display, Serialize)]
pub enum PlaybackStatus {
    #[default]
    Unknown,
    Playing,
    Paused,
    Stopped,
}

/// Point-in-time read of one session. `track_id` and `position` only feed
/// change detection and never reach the caller.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub track_id: String,
    pub position: Option<Duration>,
    pub session: MediaSession,
}

impl SessionSnapshot {
    /// Whether this snapshot represents a real state change relative to
    /// `baseline`. Position and track identity alone never count; players
    /// update those constantly without anything the caller cares about
    /// having happened.
    pub fn differs_materially(&self, baseline: &SessionSnapshot) -> bool {
        self.session.title != baseline.session.title
            || self.session.artist != baseline.session.artist
            || self.session.status != baseline.session.status
    }

    /// Whether this snapshot looks like the player re-seeked the current
    /// track to its beginning instead of changing tracks. Some players
    /// (Spotify, notably) do this on a previous-track command before
    /// actually loading the previous track.
    pub fn is_reset_to_start_of(&self, baseline: &SessionSnapshot) -> bool {
        self.track_id == baseline.track_id
            && self.position.is_some_and(|position| position < START_OF_TRACK)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum CommandKind {
    Toggle,
    Next,
    Previous,
}

impl CommandKind {
    /// Only previous-track commands need the reset-to-start heuristic.
    /// Applied unconditionally since players do not advertise whether they
    /// exhibit the reset behavior; the cost is one redundant re-issue
    /// against players that do not.
    pub fn reset_to_start_aware(self) -> bool {
        matches!(self, CommandKind::Previous)
    }
}

/// Render a playback offset as `H:MM:SS`, or an empty string when the
/// player does not report one.
pub fn format_clock(value: Option<Duration>) -> String {
    match value {
        None => String::new(),
        Some(duration) => {
            let secs = duration.as_secs();
            format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
        }
    }
}

/// Drop sessions that repeat an already-seen (title, artist) pair, keeping
/// the first occurrence.
pub fn distinct_sessions(sessions: Vec<MediaSession>) -> Vec<MediaSession> {
    let mut seen = HashSet::new();
    sessions
        .into_iter()
        .filter(|session| seen.insert((session.title.clone(), session.artist.clone())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(title: &str, artist: &str, status: PlaybackStatus) -> SessionSnapshot {
        SessionSnapshot {
            track_id: String::new(),
            position: None,
            session: MediaSession {
                source: "player".to_string(),
                title: title.to_string(),
                artist: artist.to_string(),
                current_time: String::new(),
                total_time: String::new(),
                status,
            },
        }
    }

    #[test]
    fn status_change_is_material() {
        let baseline = snapshot("A", "X", PlaybackStatus::Playing);
        let paused = snapshot("A", "X", PlaybackStatus::Paused);
        assert!(paused.differs_materially(&baseline));
    }

    #[test]
    fn title_and_artist_changes_are_material() {
        let baseline = snapshot("A", "X", PlaybackStatus::Playing);
        assert!(snapshot("B", "X", PlaybackStatus::Playing).differs_materially(&baseline));
        assert!(snapshot("A", "Y", PlaybackStatus::Playing).differs_materially(&baseline));
    }

    #[test]
    fn position_and_track_id_changes_are_not_material() {
        let mut baseline = snapshot("A", "X", PlaybackStatus::Playing);
        baseline.track_id = "t1".to_string();
        baseline.position = Some(Duration::from_secs(100));

        let mut moved = baseline.clone();
        moved.track_id = "t2".to_string();
        moved.position = Some(Duration::from_secs(3));
        assert!(!moved.differs_materially(&baseline));
    }

    #[test]
    fn reset_to_start_needs_same_track_and_near_zero_position() {
        let mut baseline = snapshot("A", "X", PlaybackStatus::Playing);
        baseline.track_id = "t1".to_string();
        baseline.position = Some(Duration::from_secs(100));

        let mut reset = baseline.clone();
        reset.position = Some(Duration::from_millis(200));
        assert!(reset.is_reset_to_start_of(&baseline));

        let mut other_track = reset.clone();
        other_track.track_id = "t2".to_string();
        assert!(!other_track.is_reset_to_start_of(&baseline));

        let mut mid_track = baseline.clone();
        mid_track.position = Some(Duration::from_secs(42));
        assert!(!mid_track.is_reset_to_start_of(&baseline));

        let mut no_position = baseline.clone();
        no_position.position = None;
        assert!(!no_position.is_reset_to_start_of(&baseline));
    }

    #[test]
    fn clock_formatting() {
        assert_eq!(format_clock(None), "");
        assert_eq!(format_clock(Some(Duration::from_secs(0))), "0:00:00");
        assert_eq!(format_clock(Some(Duration::from_secs(61))), "0:01:01");
        assert_eq!(format_clock(Some(Duration::from_secs(3723))), "1:02:03");
    }

    #[test]
    fn distinct_keeps_first_occurrence() {
        let a = snapshot("A", "X", PlaybackStatus::Playing).session;
        let mut a_again = a.clone();
        a_again.source = "other".to_string();
        let b = snapshot("B", "X", PlaybackStatus::Playing).session;

        let distinct = distinct_sessions(vec![a.clone(), a_again, b.clone()]);
        assert_eq!(distinct, vec![a, b]);
    }

    #[test]
    fn session_serializes_camel_case() {
        let session = snapshot("A", "X", PlaybackStatus::Playing).session;
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["title"], "A");
        assert_eq!(json["currentTime"], "");
        assert_eq!(json["status"], "Playing");
    }
}
