pub mod bell;
pub mod config;
pub mod run;

use focusbell_core::bell::{
    AlertSound, CommandSound, InhibitWakeLock, NoWakeLock, Notifier, SilentSound, WakeLockProvider,
};
use focusbell_core::{BellManager, Config};

/// Multi-threaded runtime for the commands that drive a timer or a bell.
pub fn runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
}

/// Assemble the bell from the `[bell]` config section and the compiled-in
/// backends.
pub fn build_bell(config: &Config) -> BellManager {
    BellManager::new(
        alert_sound(config),
        notifier(),
        wake_lock(config),
        config.bell_config(),
    )
}

fn alert_sound(config: &Config) -> Box<dyn AlertSound> {
    let sound = config
        .sound_path()
        .map(CommandSound::new)
        .or_else(CommandSound::system_default);
    let Some(sound) = sound else {
        tracing::warn!("no bell sound configured or found, the bell will be silent");
        return Box::new(SilentSound);
    };

    #[cfg(feature = "rodio")]
    if config.bell.player.trim().is_empty() {
        match focusbell_core::bell::RodioSound::new(sound.path(), config.bell.volume) {
            Ok(rodio) => return Box::new(rodio),
            Err(e) => tracing::warn!("{}, falling back to an external player", e),
        }
    }

    Box::new(
        sound
            .with_player(config.bell.player.clone())
            .with_volume(config.bell.volume),
    )
}

#[cfg(feature = "desktop-notify")]
fn notifier() -> Box<dyn Notifier> {
    Box::new(focusbell_core::bell::DesktopNotifier::new("focusbell"))
}

#[cfg(not(feature = "desktop-notify"))]
fn notifier() -> Box<dyn Notifier> {
    Box::new(focusbell_core::bell::LogNotifier)
}

fn wake_lock(config: &Config) -> Box<dyn WakeLockProvider> {
    if config.bell.wake_lock {
        Box::new(InhibitWakeLock)
    } else {
        Box::new(NoWakeLock)
    }
}
