//! Platform bindings for session discovery, snapshots, transport, and
//! change notifications.

#[cfg(target_os = "linux")]
pub mod linux_mpris;

#[cfg(target_os = "windows")]
pub mod windows_smtc;

#[cfg(target_os = "linux")]
pub use linux_mpris::MprisBackend as PlatformBackend;

#[cfg(target_os = "windows")]
pub use windows_smtc::SmtcBackend as PlatformBackend;

#[cfg(not(any(target_os = "linux", target_os = "windows")))]
compile_error!("mediaq requires MPRIS (Linux) or SMTC (Windows) media session support");
