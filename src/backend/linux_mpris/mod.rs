//! MPRIS (D-Bus) session backend.

mod metadata;
mod player;

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::StreamExt;
use tokio::sync::mpsc;
use tracing::debug;
use zbus::Connection;
use zbus::fdo::DBusProxy;

use crate::controller::{ChangeSubscription, PlayerHandle, SessionBackend};
use crate::error::ControlError;
use crate::session::{
    CommandKind, MediaSession, PlaybackStatus, SessionSnapshot, format_clock,
};
use self::metadata::Metadata;
use self::player::PlayerProxy;

const MPRIS2_PREFIX: &str = "org.mpris.MediaPlayer2.";

#[derive(Clone)]
pub struct MprisHandle {
    bus_name: String,
}

impl MprisHandle {
    fn short_name(&self) -> &str {
        self.bus_name
            .strip_prefix(MPRIS2_PREFIX)
            .unwrap_or(&self.bus_name)
    }
}

impl PlayerHandle for MprisHandle {
    fn key(&self) -> &str {
        &self.bus_name
    }
}

pub struct MprisBackend {
    connection: Connection,
}

impl MprisBackend {
    pub async fn connect() -> Result<Self, ControlError> {
        let connection = Connection::session().await?;
        Ok(MprisBackend { connection })
    }

    async fn player_names(&self) -> zbus::Result<Vec<String>> {
        let dbus_proxy = DBusProxy::new(&self.connection).await?;
        Ok(dbus_proxy
            .list_names()
            .await?
            .into_iter()
            .map(|name| name.to_string())
            .filter(|name| name.starts_with(MPRIS2_PREFIX))
            .collect())
    }

    async fn player_proxy(&self, handle: &MprisHandle) -> zbus::Result<PlayerProxy<'static>> {
        PlayerProxy::builder(&self.connection)
            .uncached_properties(&["Position"])
            .destination(handle.bus_name.clone())?
            .build()
            .await
    }

    async fn read_snapshot(&self, handle: &MprisHandle) -> zbus::Result<SessionSnapshot> {
        let player = self.player_proxy(handle).await?;

        let metadata = Metadata::from(player.metadata().await.unwrap_or_default());
        let status = player.playback_status().await.unwrap_or_default();
        // Position is optional in practice; several players reject the read.
        let position = player
            .position()
            .await
            .ok()
            .and_then(|us| u64::try_from(us).ok())
            .map(Duration::from_micros);

        Ok(SessionSnapshot {
            track_id: metadata.track_id().unwrap_or_default(),
            position,
            session: MediaSession {
                source: handle.short_name().to_string(),
                title: metadata.title().unwrap_or_default().to_string(),
                artist: metadata.first_artist().unwrap_or_default(),
                current_time: format_clock(position),
                total_time: format_clock(metadata.length()),
                status: PlaybackStatus::from_str(&status).unwrap_or_default(),
            },
        })
    }
}

#[async_trait]
impl SessionBackend for MprisBackend {
    type Handle = MprisHandle;

    async fn sessions(&self) -> Result<Vec<MediaSession>, ControlError> {
        let mut sessions = Vec::new();
        for bus_name in self.player_names().await? {
            let handle = MprisHandle { bus_name };
            match self.read_snapshot(&handle).await {
                Ok(snapshot) => sessions.push(snapshot.session),
                // A player can drop off the bus between discovery and read.
                Err(err) => debug!(player = handle.key(), %err, "skipping unreadable player"),
            }
        }
        Ok(sessions)
    }

    async fn discover(&self, source: Option<&str>) -> Result<MprisHandle, ControlError> {
        let names = self.player_names().await?;
        let found = match source {
            None | Some("") => names.into_iter().next(),
            Some(wanted) => names.into_iter().find(|name| {
                name.strip_prefix(MPRIS2_PREFIX)
                    .unwrap_or(name)
                    .eq_ignore_ascii_case(wanted)
            }),
        };
        found
            .map(|bus_name| MprisHandle { bus_name })
            .ok_or_else(|| ControlError::NotFound {
                requested: source.map(str::to_string),
            })
    }

    async fn snapshot(&self, handle: &MprisHandle) -> Result<SessionSnapshot, ControlError> {
        Ok(self.read_snapshot(handle).await?)
    }

    async fn execute(
        &self,
        handle: &MprisHandle,
        command: CommandKind,
    ) -> Result<(), ControlError> {
        let player = self.player_proxy(handle).await?;
        match command {
            CommandKind::Toggle => player.play_pause().await?,
            CommandKind::Next => player.next().await?,
            CommandKind::Previous => player.previous().await?,
        }
        Ok(())
    }

    async fn subscribe(&self, handle: &MprisHandle) -> Result<ChangeSubscription, ControlError> {
        let player = self.player_proxy(handle).await?;
        let (tx, rx) = mpsc::channel(8);

        let mut metadata_changed = player.receive_metadata_changed().await;
        let mut status_changed = player.receive_playback_status_changed().await;
        let seeked = player.receive_seeked().await;

        // Collapse every property/signal stream into bare "something
        // changed" ticks; observers re-read the player rather than trust
        // event payloads. try_send: a full channel already means a snapshot
        // fetch is due.
        let forwarder = tokio::spawn(async move {
            let metadata_ticks = async {
                while metadata_changed.next().await.is_some() {
                    let _ = tx.try_send(());
                }
            };
            let status_ticks = async {
                while status_changed.next().await.is_some() {
                    let _ = tx.try_send(());
                }
            };
            let seek_ticks = async {
                if let Ok(mut seeked) = seeked {
                    while seeked.next().await.is_some() {
                        let _ = tx.try_send(());
                    }
                }
            };
            tokio::join!(metadata_ticks, status_ticks, seek_ticks);
        });

        Ok(ChangeSubscription::new(rx, move || forwarder.abort()))
    }
}
