//! Windows System Media Transport Controls (SMTC) session backend.

use std::cmp::Reverse;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use windows::Foundation::TypedEventHandler;
use windows::Media::Control::{
    GlobalSystemMediaTransportControlsSession, GlobalSystemMediaTransportControlsSessionManager,
    GlobalSystemMediaTransportControlsSessionPlaybackStatus, MediaPropertiesChangedEventArgs,
    PlaybackInfoChangedEventArgs, TimelinePropertiesChangedEventArgs,
};

use crate::controller::{ChangeSubscription, PlayerHandle, SessionBackend};
use crate::error::ControlError;
use crate::session::{CommandKind, MediaSession, PlaybackStatus, SessionSnapshot, format_clock};

#[derive(Clone)]
pub struct SmtcHandle {
    app_id: String,
}

impl PlayerHandle for SmtcHandle {
    fn key(&self) -> &str {
        &self.app_id
    }
}

pub struct SmtcBackend {
    manager: GlobalSystemMediaTransportControlsSessionManager,
}

impl SmtcBackend {
    pub async fn connect() -> Result<Self, ControlError> {
        let manager = GlobalSystemMediaTransportControlsSessionManager::RequestAsync()?.get()?;
        Ok(SmtcBackend { manager })
    }

    /// All current sessions, most recently updated first. SMTC has no
    /// "active" ordering of its own; the timeline update stamp is the best
    /// available proxy for which player the user touched last.
    fn ordered_sessions(
        &self,
    ) -> windows::core::Result<Vec<GlobalSystemMediaTransportControlsSession>> {
        let mut stamped = Vec::new();
        for session in self.manager.GetSessions()? {
            let last_updated = session
                .GetTimelineProperties()
                .and_then(|timeline| timeline.LastUpdatedTime())
                .map(|stamp| stamp.UniversalTime)
                .unwrap_or_default();
            stamped.push((last_updated, session));
        }
        stamped.sort_by_key(|(stamp, _)| Reverse(*stamp));
        Ok(stamped.into_iter().map(|(_, session)| session).collect())
    }

    fn find_session(
        &self,
        handle: &SmtcHandle,
    ) -> Result<GlobalSystemMediaTransportControlsSession, ControlError> {
        self.ordered_sessions()?
            .into_iter()
            .find(|session| {
                session
                    .SourceAppUserModelId()
                    .map(|id| id.to_string() == handle.app_id)
                    .unwrap_or(false)
            })
            .ok_or_else(|| ControlError::NotFound {
                requested: Some(handle.app_id.clone()),
            })
    }

    fn read_session(
        session: &GlobalSystemMediaTransportControlsSession,
    ) -> windows::core::Result<SessionSnapshot> {
        let app_id = session.SourceAppUserModelId()?.to_string();

        let status = session
            .GetPlaybackInfo()
            .and_then(|info| info.PlaybackStatus())
            .map(map_status)
            .unwrap_or_default();

        let media_properties = session.TryGetMediaPropertiesAsync()?.get();
        let (title, artist) = match &media_properties {
            Ok(props) => (
                props.Title().unwrap_or_default().to_string(),
                props.Artist().unwrap_or_default().to_string(),
            ),
            Err(_) => (String::new(), String::new()),
        };

        let (position, total) = match session.GetTimelineProperties() {
            Ok(timeline) => {
                let position = timeline
                    .Position()
                    .ok()
                    .map(|span| ticks_to_duration(span.Duration));
                let end = timeline.EndTime().map(|span| span.Duration).unwrap_or(0);
                let start = timeline.StartTime().map(|span| span.Duration).unwrap_or(0);
                let total = (end > 0).then(|| ticks_to_duration(end - start));
                (position, total)
            }
            Err(_) => (None, None),
        };

        Ok(SessionSnapshot {
            // SMTC exposes no stable track identity; change detection falls
            // back to title/artist comparison.
            track_id: String::new(),
            position,
            session: MediaSession {
                source: app_id,
                title,
                artist,
                current_time: format_clock(position),
                total_time: format_clock(total),
                status,
            },
        })
    }
}

#[async_trait]
impl SessionBackend for SmtcBackend {
    type Handle = SmtcHandle;

    async fn sessions(&self) -> Result<Vec<MediaSession>, ControlError> {
        let mut sessions = Vec::new();
        for session in self.ordered_sessions()? {
            sessions.push(Self::read_session(&session)?.session);
        }
        Ok(sessions)
    }

    async fn discover(&self, source: Option<&str>) -> Result<SmtcHandle, ControlError> {
        let sessions = self.ordered_sessions()?;
        let found = match source {
            None | Some("") => sessions.into_iter().next(),
            Some(wanted) => sessions.into_iter().find(|session| {
                session
                    .SourceAppUserModelId()
                    .map(|id| id.to_string().eq_ignore_ascii_case(wanted))
                    .unwrap_or(false)
            }),
        };
        let found = found.ok_or_else(|| ControlError::NotFound {
            requested: source.map(str::to_string),
        })?;
        Ok(SmtcHandle {
            app_id: found.SourceAppUserModelId()?.to_string(),
        })
    }

    async fn snapshot(&self, handle: &SmtcHandle) -> Result<SessionSnapshot, ControlError> {
        let session = self.find_session(handle)?;
        Ok(Self::read_session(&session)?)
    }

    async fn execute(
        &self,
        handle: &SmtcHandle,
        command: CommandKind,
    ) -> Result<(), ControlError> {
        let session = self.find_session(handle)?;
        // Fire-and-forget: the operation is dropped without awaiting its
        // boolean outcome; observation decides what actually happened.
        match command {
            CommandKind::Toggle => {
                let _ = session.TryTogglePlayPauseAsync()?;
            }
            CommandKind::Next => {
                let _ = session.TrySkipNextAsync()?;
            }
            CommandKind::Previous => {
                let _ = session.TrySkipPreviousAsync()?;
            }
        }
        Ok(())
    }

    async fn subscribe(&self, handle: &SmtcHandle) -> Result<ChangeSubscription, ControlError> {
        let session = self.find_session(handle)?;
        let (tx, rx) = mpsc::channel(8);

        let media_tx = tx.clone();
        let media_token = session.MediaPropertiesChanged(&TypedEventHandler::<
            GlobalSystemMediaTransportControlsSession,
            MediaPropertiesChangedEventArgs,
        >::new(move |_, _| {
            let _ = media_tx.try_send(());
            Ok(())
        }))?;

        let playback_tx = tx.clone();
        let playback_token = session.PlaybackInfoChanged(&TypedEventHandler::<
            GlobalSystemMediaTransportControlsSession,
            PlaybackInfoChangedEventArgs,
        >::new(move |_, _| {
            let _ = playback_tx.try_send(());
            Ok(())
        }))?;

        let timeline_token = session.TimelinePropertiesChanged(&TypedEventHandler::<
            GlobalSystemMediaTransportControlsSession,
            TimelinePropertiesChangedEventArgs,
        >::new(move |_, _| {
            let _ = tx.try_send(());
            Ok(())
        }))?;

        Ok(ChangeSubscription::new(rx, move || {
            let _ = session.RemoveMediaPropertiesChanged(media_token);
            let _ = session.RemovePlaybackInfoChanged(playback_token);
            let _ = session.RemoveTimelinePropertiesChanged(timeline_token);
        }))
    }
}

fn map_status(status: GlobalSystemMediaTransportControlsSessionPlaybackStatus) -> PlaybackStatus {
    match status {
        GlobalSystemMediaTransportControlsSessionPlaybackStatus::Playing => PlaybackStatus::Playing,
        GlobalSystemMediaTransportControlsSessionPlaybackStatus::Paused => PlaybackStatus::Paused,
        GlobalSystemMediaTransportControlsSessionPlaybackStatus::Stopped => PlaybackStatus::Stopped,
        _ => PlaybackStatus::Unknown,
    }
}

/// WinRT `TimeSpan` carries 100ns ticks.
fn ticks_to_duration(ticks: i64) -> Duration {
    Duration::from_micros(u64::try_from(ticks / 10).unwrap_or_default())
}
