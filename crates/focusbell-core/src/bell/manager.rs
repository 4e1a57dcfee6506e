//! Bell lifecycle.
//!
//! ```text
//! start_bell: cleanup leftovers -> strategy cascade -> wake lock -> notification -> watchdog
//! stop_bell:  watchdog -> audio -> wake lock -> notification   (every step best effort)
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;

use super::strategy::play_cascade;
use super::{
    lock_sound, AckSender, AlertSound, NoWakeLock, NotificationRequest, Notifier, NullNotifier,
    Permission, PlaybackStatus, PlaybackStrategy, SharedSound, ShownNotification, SilentSound,
    WakeLockGuard, WakeLockProvider,
};
use crate::error::PermissionError;
use crate::timer::SessionType;

pub const NOTIFICATION_TAG: &str = "focusbell-bell";

/// Timing knobs for the bell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BellConfig {
    /// Upper bound on waiting for a reloaded resource to buffer.
    pub ready_timeout: Duration,
    pub ready_poll: Duration,
    /// Delay before restarting audio that failed mid-alert.
    pub restart_delay: Duration,
    /// How often the watchdog checks that the audio is still going.
    pub watch_interval: Duration,
    pub wake_lock: bool,
    pub icon: Option<String>,
}

impl Default for BellConfig {
    fn default() -> Self {
        Self {
            ready_timeout: Duration::from_secs(10),
            ready_poll: Duration::from_millis(50),
            restart_delay: Duration::from_secs(1),
            watch_interval: Duration::from_millis(250),
            wake_lock: true,
            icon: None,
        }
    }
}

/// What `start_bell` managed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BellOutcome {
    Ringing {
        strategy: PlaybackStrategy,
        wake_lock: bool,
        notified: bool,
    },
    /// No strategy produced sound; only the notification (if any) alerts.
    VisualOnly { notified: bool },
    AlreadyRinging,
    /// A [`BellInterrupt`] fired before any strategy produced sound. Nothing
    /// is held.
    Interrupted,
}

/// Cuts a pending [`BellManager::start_bell`] short from another task.
///
/// Only a start already in progress is affected; interrupting an idle or
/// ringing bell does nothing.
#[derive(Debug, Clone)]
pub struct BellInterrupt(Arc<Notify>);

impl BellInterrupt {
    pub fn interrupt(&self) {
        self.0.notify_waiters();
    }
}

/// Resources of one ringing episode.
struct BellSession {
    episode: u64,
    audio: Option<SharedSound>,
    wake_lock: Option<Box<dyn WakeLockGuard>>,
    notification: Option<Box<dyn ShownNotification>>,
    watchdog: Option<JoinHandle<()>>,
}

impl BellSession {
    /// Release everything. Failures are logged and do not stop the
    /// remaining releases.
    fn release(self) {
        if let Some(watchdog) = self.watchdog {
            watchdog.abort();
        }
        if let Some(audio) = self.audio {
            if let Err(e) = lock_sound(&audio).stop() {
                tracing::warn!("{}", e);
            }
        }
        if let Some(guard) = self.wake_lock {
            if let Err(e) = guard.release() {
                tracing::warn!("{}", e);
            }
        }
        if let Some(notification) = self.notification {
            if let Err(e) = notification.close() {
                tracing::warn!("{}", e);
            }
        }
    }
}

/// Owns the alert sound, notifier and wake-lock provider for the lifetime of
/// the application.
pub struct BellManager {
    config: BellConfig,
    sound: SharedSound,
    notifier: Box<dyn Notifier>,
    wake_lock: Box<dyn WakeLockProvider>,
    session: Option<BellSession>,
    /// Shared with the watchdog so it stops restarting once the bell stops.
    ringing: Arc<AtomicBool>,
    episode: u64,
    ack_tx: mpsc::UnboundedSender<u64>,
    ack_rx: mpsc::UnboundedReceiver<u64>,
    interrupt: Arc<Notify>,
}

impl BellManager {
    pub fn new(
        sound: Box<dyn AlertSound>,
        notifier: Box<dyn Notifier>,
        wake_lock: Box<dyn WakeLockProvider>,
        config: BellConfig,
    ) -> Self {
        let (ack_tx, ack_rx) = mpsc::unbounded_channel();
        Self {
            config,
            sound: Arc::new(Mutex::new(sound)),
            notifier,
            wake_lock,
            session: None,
            ringing: Arc::new(AtomicBool::new(false)),
            episode: 0,
            ack_tx,
            ack_rx,
            interrupt: Arc::new(Notify::new()),
        }
    }

    /// A bell with no sound, no notifications and no wake lock.
    pub fn silent() -> Self {
        Self::new(
            Box::new(SilentSound),
            Box::new(NullNotifier),
            Box::new(NoWakeLock),
            BellConfig::default(),
        )
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn is_ringing(&self) -> bool {
        self.ringing.load(Ordering::SeqCst)
    }

    /// True while any episode resources are held, including a visual-only
    /// alert.
    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn config(&self) -> &BellConfig {
        &self.config
    }

    pub fn permission(&self) -> Permission {
        self.notifier.permission()
    }

    pub fn interrupter(&self) -> BellInterrupt {
        BellInterrupt(self.interrupt.clone())
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn request_permission(&mut self) -> Permission {
        let permission = self.notifier.request_permission();
        if permission == Permission::Denied {
            tracing::warn!("{}", PermissionError(permission));
        }
        permission
    }

    /// Ring the bell for the end of a `finished` session.
    ///
    /// Never fails: when no strategy produces sound, the bell degrades to a
    /// notification, and without notification permission to nothing at all.
    pub async fn start_bell(&mut self, finished: SessionType) -> BellOutcome {
        if self.is_ringing() {
            tracing::debug!("bell already ringing");
            return BellOutcome::AlreadyRinging;
        }
        if let Some(leftover) = self.session.take() {
            tracing::debug!("tearing down leftover bell session {}", leftover.episode);
            leftover.release();
        }
        self.episode += 1;

        // Registered before the first await so an interrupt cannot slip in
        // between polls.
        let interrupt = self.interrupt.clone();
        let interrupted = interrupt.notified();
        tokio::pin!(interrupted);
        interrupted.as_mut().enable();

        let cascade = play_cascade(
            &self.sound,
            self.config.ready_timeout,
            self.config.ready_poll,
        );
        let played = tokio::select! {
            played = cascade => played,
            _ = interrupted => {
                tracing::info!("bell start interrupted");
                if let Err(e) = lock_sound(&self.sound).stop() {
                    tracing::warn!("{}", e);
                }
                return BellOutcome::Interrupted;
            }
        };

        let Some(strategy) = played else {
            tracing::warn!("all bell playback strategies failed, alerting visually only");
            let notification = self.show_notification(bell_notification(finished, false));
            let notified = notification.is_some();
            self.session = Some(BellSession {
                episode: self.episode,
                audio: None,
                wake_lock: None,
                notification,
                watchdog: None,
            });
            return BellOutcome::VisualOnly { notified };
        };

        self.ringing.store(true, Ordering::SeqCst);
        let wake_lock = self.acquire_wake_lock();
        let held = wake_lock.is_some();
        let notification = self.show_notification(bell_notification(finished, true));
        let notified = notification.is_some();
        let watchdog = spawn_watchdog(
            self.sound.clone(),
            self.ringing.clone(),
            self.config.watch_interval,
            self.config.restart_delay,
        );

        self.session = Some(BellSession {
            episode: self.episode,
            audio: Some(self.sound.clone()),
            wake_lock,
            notification,
            watchdog,
        });
        tracing::info!(
            "bell ringing (strategy: {}, wake lock: {}, notification: {})",
            strategy,
            held,
            notified
        );
        BellOutcome::Ringing {
            strategy,
            wake_lock: held,
            notified,
        }
    }

    /// Stop ringing and release every resource. Safe to call at any time.
    ///
    /// Returns whether there was anything to stop.
    pub fn stop_bell(&mut self) -> bool {
        self.ringing.store(false, Ordering::SeqCst);
        match self.session.take() {
            Some(session) => {
                session.release();
                tracing::info!("bell stopped");
                true
            }
            None => false,
        }
    }

    /// Wait for the user to click a bell notification. Returns the episode
    /// the click belongs to. Cancel safe.
    pub async fn acknowledged(&mut self) -> u64 {
        match self.ack_rx.recv().await {
            Some(episode) => episode,
            // The manager holds a sender, so the channel never closes.
            None => std::future::pending().await,
        }
    }

    /// Stop the bell if `episode` is the one ringing. Clicks on notifications
    /// of earlier episodes are ignored.
    pub fn acknowledge(&mut self, episode: u64) -> bool {
        match &self.session {
            Some(session) if session.episode == episode => self.stop_bell(),
            _ => {
                tracing::debug!("ignoring acknowledgement for stale bell episode {}", episode);
                false
            }
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn acquire_wake_lock(&mut self) -> Option<Box<dyn WakeLockGuard>> {
        if !self.config.wake_lock {
            return None;
        }
        match self.wake_lock.acquire("session bell ringing") {
            Ok(Some(guard)) => Some(guard),
            Ok(None) => {
                tracing::debug!("no wake lock available on this platform");
                None
            }
            Err(e) => {
                tracing::warn!("{}", e);
                None
            }
        }
    }

    fn show_notification(
        &mut self,
        mut request: NotificationRequest,
    ) -> Option<Box<dyn ShownNotification>> {
        let permission = match self.notifier.permission() {
            Permission::Default => self.notifier.request_permission(),
            permission => permission,
        };
        if permission != Permission::Granted {
            tracing::info!(
                "{}, bell continues without a notification",
                PermissionError(permission)
            );
            return None;
        }

        request.icon = self.config.icon.clone();
        let ack = AckSender::new(self.episode, self.ack_tx.clone());
        match self.notifier.show(&request, ack) {
            Ok(shown) => Some(shown),
            Err(e) => {
                tracing::warn!("{}", e);
                None
            }
        }
    }
}

impl Drop for BellManager {
    fn drop(&mut self) {
        self.stop_bell();
    }
}

fn bell_notification(finished: SessionType, audible: bool) -> NotificationRequest {
    let (title, body) = match finished {
        SessionType::Work => ("Work session complete", "Time for a break. Great job!"),
        SessionType::Break => ("Break complete", "Ready to get back to work?"),
    };
    let action = if audible {
        "Click to stop the bell."
    } else {
        "The bell sound could not be played."
    };
    NotificationRequest {
        title: title.to_string(),
        body: format!("{body} {action}"),
        icon: None,
        require_interaction: true,
        tag: NOTIFICATION_TAG.to_string(),
        silent: false,
    }
}

/// Keeps the alert going until the bell is stopped. Ended audio restarts
/// at once; failed audio restarts after `restart_delay`.
fn spawn_watchdog(
    sound: SharedSound,
    ringing: Arc<AtomicBool>,
    interval: Duration,
    restart_delay: Duration,
) -> Option<JoinHandle<()>> {
    let runtime = tokio::runtime::Handle::try_current().ok()?;
    Some(runtime.spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            if !ringing.load(Ordering::SeqCst) {
                break;
            }
            let status = lock_sound(&sound).status();
            match status {
                PlaybackStatus::Playing | PlaybackStatus::Stopped => continue,
                PlaybackStatus::Ended => tracing::debug!("bell audio ended, looping"),
                PlaybackStatus::Errored => {
                    tracing::warn!("bell audio failed, restarting in {:?}", restart_delay);
                    tokio::time::sleep(restart_delay).await;
                    if !ringing.load(Ordering::SeqCst) {
                        break;
                    }
                }
            }
            if let Err(e) = lock_sound(&sound).play() {
                tracing::error!("failed to restart bell audio: {}", e);
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{NotificationError, PlaybackError, ReleaseError, WakeLockError};
    use std::sync::atomic::AtomicUsize;

    /// Scripted sound: fails the first `failures` play attempts.
    #[derive(Clone, Default)]
    struct Script {
        plays: Arc<AtomicUsize>,
        reloads: Arc<AtomicUsize>,
        stops: Arc<AtomicUsize>,
        resumes: Arc<AtomicUsize>,
        status: Arc<Mutex<Option<PlaybackStatus>>>,
    }

    struct FakeSound {
        script: Script,
        failures: usize,
        ready: bool,
        suspended: Option<bool>,
        stop_fails: bool,
    }

    impl FakeSound {
        fn boxed(script: &Script, failures: usize) -> Box<dyn AlertSound> {
            Box::new(Self {
                script: script.clone(),
                failures,
                ready: true,
                suspended: None,
                stop_fails: false,
            })
        }
    }

    impl AlertSound for FakeSound {
        fn play(&mut self) -> Result<(), PlaybackError> {
            let n = self.script.plays.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                return Err(PlaybackError::Refused("autoplay blocked".into()));
            }
            *self.script.status.lock().unwrap() = Some(PlaybackStatus::Playing);
            Ok(())
        }
        fn reload(&mut self) -> Result<(), PlaybackError> {
            self.script.reloads.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        fn is_ready(&self) -> bool {
            self.ready
        }
        fn output_suspended(&self) -> Option<bool> {
            self.suspended
        }
        fn resume_output(&mut self) -> Result<(), PlaybackError> {
            self.script.resumes.fetch_add(1, Ordering::SeqCst);
            self.suspended = Some(false);
            Ok(())
        }
        fn status(&mut self) -> PlaybackStatus {
            self.script
                .status
                .lock()
                .unwrap()
                .unwrap_or(PlaybackStatus::Stopped)
        }
        fn stop(&mut self) -> Result<(), ReleaseError> {
            self.script.stops.fetch_add(1, Ordering::SeqCst);
            *self.script.status.lock().unwrap() = Some(PlaybackStatus::Stopped);
            if self.stop_fails {
                return Err(ReleaseError::Audio("device gone".into()));
            }
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct Shown {
        shown: Arc<Mutex<Vec<NotificationRequest>>>,
        closed: Arc<AtomicUsize>,
        acks: Arc<Mutex<Vec<AckSender>>>,
    }

    struct FakeNotifier {
        permission: Permission,
        shown: Shown,
    }

    struct FakeShown(Arc<AtomicUsize>);

    impl ShownNotification for FakeShown {
        fn close(self: Box<Self>) -> Result<(), ReleaseError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    impl Notifier for FakeNotifier {
        fn permission(&self) -> Permission {
            self.permission
        }
        fn request_permission(&mut self) -> Permission {
            if self.permission == Permission::Default {
                self.permission = Permission::Granted;
            }
            self.permission
        }
        fn show(
            &mut self,
            request: &NotificationRequest,
            ack: AckSender,
        ) -> Result<Box<dyn ShownNotification>, NotificationError> {
            self.shown.shown.lock().unwrap().push(request.clone());
            self.shown.acks.lock().unwrap().push(ack);
            Ok(Box::new(FakeShown(self.shown.closed.clone())))
        }
    }

    struct FakeLock(Arc<AtomicUsize>);
    struct FakeGuard(Arc<AtomicUsize>);

    impl WakeLockProvider for FakeLock {
        fn acquire(
            &mut self,
            _reason: &str,
        ) -> Result<Option<Box<dyn WakeLockGuard>>, WakeLockError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(Some(Box::new(FakeGuard(self.0.clone()))))
        }
    }

    impl WakeLockGuard for FakeGuard {
        fn release(self: Box<Self>) -> Result<(), ReleaseError> {
            self.0.fetch_sub(1, Ordering::SeqCst);
            Err(ReleaseError::WakeLock("already released".into()))
        }
    }

    struct Rig {
        script: Script,
        shown: Shown,
        locks: Arc<AtomicUsize>,
    }

    fn manager(failures: usize, permission: Permission) -> (BellManager, Rig) {
        let rig = Rig {
            script: Script::default(),
            shown: Shown::default(),
            locks: Arc::new(AtomicUsize::new(0)),
        };
        let manager = BellManager::new(
            FakeSound::boxed(&rig.script, failures),
            Box::new(FakeNotifier {
                permission,
                shown: rig.shown.clone(),
            }),
            Box::new(FakeLock(rig.locks.clone())),
            BellConfig::default(),
        );
        (manager, rig)
    }

    #[tokio::test(start_paused = true)]
    async fn direct_play_rings_with_wake_lock_and_notification() {
        let (mut bell, rig) = manager(0, Permission::Granted);
        let outcome = bell.start_bell(SessionType::Work).await;
        assert_eq!(
            outcome,
            BellOutcome::Ringing {
                strategy: PlaybackStrategy::Direct,
                wake_lock: true,
                notified: true,
            }
        );
        assert!(bell.is_ringing());
        assert_eq!(rig.locks.load(Ordering::SeqCst), 1);
        let shown = rig.shown.shown.lock().unwrap();
        assert!(shown[0].require_interaction);
        assert_eq!(shown[0].tag, NOTIFICATION_TAG);
        assert!(shown[0].title.contains("Work"));
    }

    #[tokio::test(start_paused = true)]
    async fn cascade_falls_through_to_reload() {
        let (mut bell, rig) = manager(1, Permission::Granted);
        let outcome = bell.start_bell(SessionType::Break).await;
        assert!(matches!(
            outcome,
            BellOutcome::Ringing {
                strategy: PlaybackStrategy::ReloadAndRetry,
                ..
            }
        ));
        assert_eq!(rig.script.reloads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn resume_strategy_wakes_suspended_output() {
        let script = Script::default();
        let sound = Box::new(FakeSound {
            script: script.clone(),
            failures: 2,
            ready: true,
            suspended: Some(true),
            stop_fails: false,
        });
        let mut bell = BellManager::new(
            sound,
            Box::new(NullNotifier),
            Box::new(NoWakeLock),
            BellConfig::default(),
        );
        let outcome = bell.start_bell(SessionType::Work).await;
        assert!(matches!(
            outcome,
            BellOutcome::Ringing {
                strategy: PlaybackStrategy::ResumeOutputAndRetry,
                wake_lock: false,
                notified: false,
            }
        ));
        assert_eq!(script.resumes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn reload_waits_at_most_the_ready_timeout() {
        let script = Script::default();
        let sound = Box::new(FakeSound {
            script: script.clone(),
            failures: usize::MAX,
            ready: false,
            suspended: None,
            stop_fails: false,
        });
        let mut bell = BellManager::new(
            sound,
            Box::new(NullNotifier),
            Box::new(NoWakeLock),
            BellConfig::default(),
        );
        let started = tokio::time::Instant::now();
        let outcome = bell.start_bell(SessionType::Work).await;
        assert_eq!(outcome, BellOutcome::VisualOnly { notified: false });
        assert!(started.elapsed() >= Duration::from_secs(10));
        assert!(started.elapsed() < Duration::from_secs(11));
        assert!(!bell.is_ringing());
    }

    #[tokio::test(start_paused = true)]
    async fn total_failure_shows_visual_only_notification() {
        let (mut bell, rig) = manager(usize::MAX, Permission::Granted);
        let outcome = bell.start_bell(SessionType::Work).await;
        assert_eq!(outcome, BellOutcome::VisualOnly { notified: true });
        assert!(!bell.is_ringing());
        assert!(bell.is_active());
        assert_eq!(rig.locks.load(Ordering::SeqCst), 0);
        assert!(rig.shown.shown.lock().unwrap()[0]
            .body
            .contains("could not be played"));

        assert!(bell.stop_bell());
        assert_eq!(rig.shown.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn denied_permission_degrades_to_audio_only() {
        let (mut bell, rig) = manager(0, Permission::Denied);
        let outcome = bell.start_bell(SessionType::Work).await;
        assert!(matches!(
            outcome,
            BellOutcome::Ringing { notified: false, .. }
        ));
        assert!(rig.shown.shown.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn default_permission_is_requested_once() {
        let (mut bell, rig) = manager(0, Permission::Default);
        let outcome = bell.start_bell(SessionType::Work).await;
        assert!(matches!(outcome, BellOutcome::Ringing { notified: true, .. }));
        assert_eq!(bell.permission(), Permission::Granted);
        assert_eq!(rig.shown.shown.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn second_start_is_a_noop() {
        let (mut bell, rig) = manager(0, Permission::Granted);
        bell.start_bell(SessionType::Work).await;
        let outcome = bell.start_bell(SessionType::Work).await;
        assert_eq!(outcome, BellOutcome::AlreadyRinging);
        assert_eq!(rig.script.plays.load(Ordering::SeqCst), 1);
        assert_eq!(rig.shown.shown.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_releases_everything_and_is_idempotent() {
        let (mut bell, rig) = manager(0, Permission::Granted);
        assert!(!bell.stop_bell());

        bell.start_bell(SessionType::Work).await;
        assert!(bell.stop_bell());
        assert!(!bell.is_ringing());
        assert_eq!(rig.script.stops.load(Ordering::SeqCst), 1);
        assert_eq!(rig.locks.load(Ordering::SeqCst), 0);
        assert_eq!(rig.shown.closed.load(Ordering::SeqCst), 1);

        assert!(!bell.stop_bell());
        assert_eq!(rig.script.stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_release_does_not_block_remaining_cleanup() {
        let script = Script::default();
        let shown = Shown::default();
        let sound = Box::new(FakeSound {
            script: script.clone(),
            failures: 0,
            ready: true,
            suspended: None,
            stop_fails: true,
        });
        let mut bell = BellManager::new(
            sound,
            Box::new(FakeNotifier {
                permission: Permission::Granted,
                shown: shown.clone(),
            }),
            Box::new(NoWakeLock),
            BellConfig::default(),
        );
        bell.start_bell(SessionType::Work).await;
        assert!(bell.stop_bell());
        assert_eq!(shown.closed.load(Ordering::SeqCst), 1);
        assert!(!bell.is_ringing());
    }

    #[tokio::test(start_paused = true)]
    async fn watchdog_restarts_ended_audio_until_stopped() {
        let (mut bell, rig) = manager(0, Permission::Granted);
        bell.start_bell(SessionType::Work).await;
        assert_eq!(rig.script.plays.load(Ordering::SeqCst), 1);

        *rig.script.status.lock().unwrap() = Some(PlaybackStatus::Ended);
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(rig.script.plays.load(Ordering::SeqCst), 2);

        *rig.script.status.lock().unwrap() = Some(PlaybackStatus::Errored);
        tokio::time::sleep(Duration::from_millis(300)).await;
        // Errors wait for the restart delay first.
        assert_eq!(rig.script.plays.load(Ordering::SeqCst), 2);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(rig.script.plays.load(Ordering::SeqCst), 3);

        bell.stop_bell();
        *rig.script.status.lock().unwrap() = Some(PlaybackStatus::Ended);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(rig.script.plays.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn notification_click_acknowledges_current_episode_only() {
        let (mut bell, rig) = manager(0, Permission::Granted);
        bell.start_bell(SessionType::Work).await;
        bell.stop_bell();
        bell.start_bell(SessionType::Break).await;

        let acks = rig.shown.acks.lock().unwrap().clone();
        acks[0].acknowledge();
        let stale = bell.acknowledged().await;
        assert!(!bell.acknowledge(stale));
        assert!(bell.is_ringing());

        acks[1].acknowledge();
        let current = bell.acknowledged().await;
        assert!(bell.acknowledge(current));
        assert!(!bell.is_ringing());
    }

    #[tokio::test(start_paused = true)]
    async fn leftover_visual_session_is_torn_down_before_next_bell() {
        let (mut bell, rig) = manager(usize::MAX, Permission::Granted);
        bell.start_bell(SessionType::Work).await;
        assert!(bell.is_active());

        bell.start_bell(SessionType::Break).await;
        assert_eq!(rig.shown.closed.load(Ordering::SeqCst), 1);
        assert_eq!(rig.shown.shown.lock().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn interrupt_cuts_the_ready_wait_short() {
        let script = Script::default();
        let sound = Box::new(FakeSound {
            script: script.clone(),
            failures: usize::MAX,
            ready: false,
            suspended: None,
            stop_fails: false,
        });
        let mut bell = BellManager::new(
            sound,
            Box::new(NullNotifier),
            Box::new(NoWakeLock),
            BellConfig::default(),
        );
        let interrupt = bell.interrupter();
        // Nothing pending yet, so this is dropped rather than remembered.
        interrupt.interrupt();

        let started = tokio::time::Instant::now();
        let cutter = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            interrupt.interrupt();
        });
        let outcome = bell.start_bell(SessionType::Work).await;
        cutter.await.unwrap();

        assert_eq!(outcome, BellOutcome::Interrupted);
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(started.elapsed() >= Duration::from_millis(500));
        assert!(!bell.is_ringing());
        assert!(!bell.is_active());
    }

    #[test]
    fn silent_bell_is_quiet() {
        let bell = BellManager::silent();
        assert!(!bell.is_ringing());
        assert!(!bell.is_active());
        assert_eq!(bell.permission(), Permission::Denied);
    }
}
