use std::collections::HashMap;

use zbus::proxy;
use zbus::zvariant::OwnedValue;

/// The `org.mpris.MediaPlayer2.Player` interface, reduced to what transport
/// control and change observation need.
#[proxy(
    interface = "org.mpris.MediaPlayer2.Player",
    default_path = "/org/mpris/MediaPlayer2"
)]
pub trait Player {
    fn play_pause(&self) -> zbus::Result<()>;

    fn next(&self) -> zbus::Result<()>;

    fn previous(&self) -> zbus::Result<()>;

    /// Emitted when playback position jumps in a way that is not ordinary
    /// progression, e.g. a seek or a track reset.
    #[zbus(signal)]
    fn seeked(&self, position: i64) -> zbus::Result<()>;

    #[zbus(property)]
    fn metadata(&self) -> zbus::Result<HashMap<String, OwnedValue>>;

    #[zbus(property)]
    fn playback_status(&self) -> zbus::Result<String>;

    /// Microseconds into the current track. Must stay uncached: players do
    /// not emit property-change signals for it.
    #[zbus(property)]
    fn position(&self) -> zbus::Result<i64>;
}
