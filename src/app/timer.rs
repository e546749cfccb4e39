use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::app::readiness::wait_for_host;
use crate::domain::{
    format_time, AppEvent, DomainError, FeatureFlags, PeerMessage, RetryPolicy, RunState,
    TimerConfig, TimerForm, TimerPhase, TimerRun,
};
use crate::ports::{
    AudioPlayer, AudioSource, AudioTrack, Clock, HostBridge, LoadErrorHandler, OverlayFrame,
    OverlayRenderer, OverlayStream, Scheduler, StatusView, TaskHandle, TickFn,
};

const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Collaborators of the timer controller.
pub struct TimerPorts {
    pub clock: Arc<dyn Clock>,
    pub scheduler: Arc<dyn Scheduler>,
    pub audio: Arc<dyn AudioPlayer>,
    pub source: Arc<dyn AudioSource>,
    pub host: Arc<dyn HostBridge>,
    pub view: Arc<dyn StatusView>,
    pub renderer: Box<dyn OverlayRenderer>,
}

/// What happened to a `timer_start` received from a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerOutcome {
    /// Local countdown started with this many seconds left.
    Joined { remaining: u64, is_starter: bool },
    /// The run was already over on arrival.
    AlreadyFinished,
    /// Not a timer message, or the controller is disposed.
    Ignored,
}

/// Publisher side of the overlay stream for one run.
struct OverlayFeed {
    frames: watch::Sender<Arc<OverlayFrame>>,
}

impl OverlayFeed {
    fn new(first: OverlayFrame) -> (Self, OverlayStream) {
        let (frames, stream) = watch::channel(Arc::new(first));
        (Self { frames }, stream)
    }

    fn publish(&self, frame: OverlayFrame) {
        self.frames.send_replace(Arc::new(frame));
    }
}

/// The live run. Kept after finishing so a later stop can rewind the audio.
struct ActiveRun {
    run: TimerRun,
    is_starter: bool,
    tick: Option<TaskHandle>,
    track: Arc<dyn AudioTrack>,
    overlay: Option<OverlayFeed>,
}

impl ActiveRun {
    /// Cancel the tick and rewind the audio, handing back the overlay feed.
    fn release(mut self) -> Option<OverlayFeed> {
        if let Some(tick) = self.tick.take() {
            tick.cancel();
        }
        self.track.reset();
        debug!(start = self.run.start_timestamp, "Run released");
        self.overlay.take()
    }
}

struct ControllerState {
    phase: TimerPhase,
    remaining: u64,
    /// Identifies the live run; callbacks from older runs are ignored.
    generation: u64,
    host_ready: bool,
    disposed: bool,
    identity: Option<String>,
    run: Option<ActiveRun>,
}

struct Shared {
    clock: Arc<dyn Clock>,
    scheduler: Arc<dyn Scheduler>,
    audio: Arc<dyn AudioPlayer>,
    source: Arc<dyn AudioSource>,
    host: Arc<dyn HostBridge>,
    view: Arc<dyn StatusView>,
    renderer: Mutex<Box<dyn OverlayRenderer>>,
    features: FeatureFlags,
    state: Mutex<ControllerState>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

/// Countdown state machine tying scheduler, audio, host and overlay together.
///
/// Cheap to clone; clones share the same run.
#[derive(Clone)]
pub struct TimerController {
    shared: Arc<Shared>,
}

impl TimerController {
    pub fn new(ports: TimerPorts, features: FeatureFlags) -> Self {
        Self {
            shared: Arc::new(Shared {
                clock: ports.clock,
                scheduler: ports.scheduler,
                audio: ports.audio,
                source: ports.source,
                host: ports.host,
                view: ports.view,
                renderer: Mutex::new(ports.renderer),
                features,
                state: Mutex::new(ControllerState {
                    phase: TimerPhase::Idle,
                    remaining: 0,
                    generation: 0,
                    host_ready: false,
                    disposed: false,
                    identity: None,
                    run: None,
                }),
                listener: Mutex::new(None),
            }),
        }
    }

    /// Wait for the host bridge and declare the needed capabilities.
    ///
    /// Failure leaves the controller usable for local timers only.
    pub async fn connect_host(&self, policy: &RetryPolicy) -> Result<(), DomainError> {
        let shared = &self.shared;
        shared.view.show_status("App loaded, waiting for host...");

        let result = async {
            wait_for_host(shared.host.as_ref(), shared.scheduler.as_ref(), policy).await?;
            shared
                .host
                .configure(&shared.features.capabilities())
                .await
                .map_err(|e| match e {
                    DomainError::HostConfig(_) => e,
                    other => DomainError::HostConfig(other.to_string()),
                })
        }
        .await;

        match result {
            Ok(()) => {
                shared.state.lock().host_ready = true;
                info!("Host bridge initialized");
                shared.view.show_status("Ready to start timer");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Host bridge initialization failed");
                shared.view.show_status(&e.to_string());
                Err(e)
            }
        }
    }

    /// Fill the duration field from a preset.
    pub fn apply_preset(&self, form: &mut TimerForm, seconds: u64) {
        info!(seconds, "Preset selected");
        form.duration = seconds.to_string();
        self.shared
            .view
            .show_status(&format!("Preset set to {} seconds", seconds));
    }

    /// Validate the form and start a run as its starter.
    pub async fn start(&self, form: &TimerForm) -> Result<TimerRun, DomainError> {
        let shared = &self.shared;
        shared.view.show_status("Starting timer...");

        let previous = {
            let mut state = shared.state.lock();
            if state.disposed {
                return Err(DomainError::Config(
                    "Timer controller has been disposed".to_string(),
                ));
            }
            let previous = state.phase;
            if !previous.is_running() {
                state.phase = TimerPhase::Validating;
            }
            previous
        };

        let config = match shared.validate(form).await {
            Ok(config) => config,
            Err(e) => {
                {
                    let mut state = shared.state.lock();
                    if state.phase == TimerPhase::Validating {
                        state.phase = previous;
                    }
                }
                warn!(error = %e, "Timer input rejected");
                shared.view.show_status(&e.to_string());
                return Err(e);
            }
        };

        let broadcasting = shared.features.broadcast && shared.host_ready();
        let identity = if broadcasting {
            shared.local_identity().await
        } else {
            Ok(None)
        };
        let starter_id = identity.as_ref().ok().cloned().flatten();

        let run = TimerRun::new(config, shared.clock.now_millis(), starter_id);
        info!(
            duration = run.duration_seconds,
            audio_url = %run.audio_url,
            "Starting timer"
        );

        if !shared
            .enter_running(run.clone(), run.duration_seconds, true)
            .await
        {
            let e = DomainError::StartSuperseded;
            info!("Timer start superseded");
            shared.view.show_status(&e.to_string());
            return Err(e);
        }
        shared.view.show_status("Timer running");

        if let Err(e) = identity {
            shared.view.show_status(&e.to_string());
        }
        if broadcasting {
            shared.broadcast(&run).await;
        }

        Ok(run)
    }

    /// Stop the current run, if any.
    pub async fn stop(&self) {
        self.shared.stop().await;
    }

    /// React to a message broadcast by another participant.
    pub async fn handle_peer_message(&self, message: Value) -> PeerOutcome {
        let disposed = self.shared.state.lock().disposed;
        if disposed {
            return PeerOutcome::Ignored;
        }

        match PeerMessage::from_value(message) {
            Ok(PeerMessage::TimerStart(start)) => match TimerRun::try_from(start) {
                Ok(run) => self.shared.join(run).await,
                Err(e) => {
                    warn!(error = %e, "Rejecting peer timer");
                    PeerOutcome::Ignored
                }
            },
            Err(e) => {
                debug!(error = %e, "Ignoring peer message");
                PeerOutcome::Ignored
            }
        }
    }

    /// Spawn a task feeding host broadcast messages into the controller.
    pub fn listen(&self) {
        let mut messages = self.shared.host.subscribe();
        let controller = self.clone();

        let handle = tokio::spawn(async move {
            loop {
                match messages.recv().await {
                    Ok(message) => {
                        controller.handle_peer_message(message).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Peer messages dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            debug!("Peer listener stopped");
        });

        let previous = self.shared.listener.lock().replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Stop everything and refuse further work.
    pub async fn dispose(&self) {
        self.shared.stop().await;
        self.shared.state.lock().disposed = true;
        let listener = self.shared.listener.lock().take();
        if let Some(listener) = listener {
            listener.abort();
        }
        info!("Timer controller disposed");
    }

    pub fn phase(&self) -> TimerPhase {
        self.shared.state.lock().phase
    }

    pub fn run_state(&self) -> RunState {
        let state = self.shared.state.lock();
        let is_active = state.phase.is_running();
        RunState {
            remaining_seconds: state.remaining,
            is_active,
            is_starter: is_active && state.run.as_ref().is_some_and(|r| r.is_starter),
        }
    }

    pub fn host_ready(&self) -> bool {
        self.shared.host_ready()
    }
}

impl Shared {
    fn host_ready(&self) -> bool {
        self.state.lock().host_ready
    }

    async fn validate(&self, form: &TimerForm) -> Result<TimerConfig, DomainError> {
        let config = TimerConfig::from_form(form)?;
        if self.features.probe_audio {
            self.source.probe(&config.audio_url).await?;
        }
        Ok(config)
    }

    /// Local participant id, looked up once and cached.
    async fn local_identity(&self) -> Result<Option<String>, DomainError> {
        let cached = self.state.lock().identity.clone();
        if cached.is_some() {
            return Ok(cached);
        }

        match self.host.user_context().await {
            Ok(context) => {
                debug!(participant_id = ?context.participant_id, "Local participant resolved");
                self.state.lock().identity = context.participant_id.clone();
                Ok(context.participant_id)
            }
            Err(e) => {
                let e = match e {
                    DomainError::HostIdentityLookup(_) => e,
                    other => DomainError::HostIdentityLookup(other.to_string()),
                };
                warn!(error = %e, "Participant lookup failed");
                Err(e)
            }
        }
    }

    async fn broadcast(&self, run: &TimerRun) {
        let sent = match PeerMessage::from(run).to_value() {
            Ok(message) => self.host.post_message(message).await,
            Err(e) => Err(e),
        };

        match sent {
            Ok(()) => info!(start = run.start_timestamp, "Timer broadcast to peers"),
            Err(e) => {
                let e = match e {
                    DomainError::BroadcastSend(_) => e,
                    other => DomainError::BroadcastSend(other.to_string()),
                };
                warn!(error = %e, "Timer broadcast failed");
                self.view.show_status(&e.to_string());
            }
        }
    }

    async fn join(self: &Arc<Self>, run: TimerRun) -> PeerOutcome {
        let remaining = run.remaining_at(self.clock.now_millis());
        if remaining <= 0 {
            info!(start = run.start_timestamp, "Peer timer already finished");
            self.view.show_status("Timer already finished");
            return PeerOutcome::AlreadyFinished;
        }

        let identity = if run.starter_id.is_some() {
            match self.local_identity().await {
                Ok(identity) => identity,
                Err(e) => {
                    self.view.show_status(&e.to_string());
                    None
                }
            }
        } else {
            None
        };
        let is_starter = run.started_by(identity.as_deref());
        let remaining = remaining as u64;

        info!(remaining, is_starter, "Joining peer timer");
        if self.enter_running(run, remaining, is_starter).await {
            self.view.show_status("Timer started by a participant");
        }
        PeerOutcome::Joined {
            remaining,
            is_starter,
        }
    }

    /// Replace any live run with `run`. Returns false if superseded meanwhile.
    async fn enter_running(
        self: &Arc<Self>,
        run: TimerRun,
        remaining: u64,
        is_starter: bool,
    ) -> bool {
        let (generation, previous_overlay, host_ready) = {
            let mut state = self.state.lock();
            state.generation += 1;
            let previous_overlay = state.run.take().and_then(ActiveRun::release);
            (state.generation, previous_overlay, state.host_ready)
        };

        if previous_overlay.is_some() {
            drop(previous_overlay);
            self.clear_overlay().await;
        }

        let track = self.audio.load(&run.audio_url, self.load_error_handler(generation));

        let overlay = if is_starter && self.features.video_overlay && host_ready {
            self.apply_overlay(remaining).await
        } else {
            None
        };

        let stale_overlay = {
            let mut state = self.state.lock();
            if state.generation == generation {
                state.remaining = remaining;
                state.phase = TimerPhase::Running;
                self.view.show_time(&format_time(remaining));

                let tick = self.scheduler.every(TICK_PERIOD, self.tick_callback(generation));
                state.run = Some(ActiveRun {
                    run,
                    is_starter,
                    tick: Some(tick),
                    track,
                    overlay,
                });
                return true;
            }

            debug!("Run superseded before it started");
            track.reset();
            // A newer run may already own the filter.
            let newer_overlay = state.run.as_ref().is_some_and(|r| r.overlay.is_some());
            overlay.filter(|_| !newer_overlay)
        };

        if stale_overlay.is_some() {
            drop(stale_overlay);
            self.clear_overlay().await;
        }
        false
    }

    fn tick_callback(self: &Arc<Self>, generation: u64) -> TickFn {
        let weak: Weak<Self> = Arc::downgrade(self);
        Box::new(move || {
            let weak = weak.clone();
            Box::pin(async move {
                if let Some(shared) = weak.upgrade() {
                    shared.tick(generation).await;
                }
            })
        })
    }

    fn load_error_handler(self: &Arc<Self>, generation: u64) -> LoadErrorHandler {
        let weak: Weak<Self> = Arc::downgrade(self);
        Box::new(move |e| {
            let Some(shared) = weak.upgrade() else {
                return;
            };
            let current = shared.state.lock().generation == generation;
            if current {
                error!(error = %e, "Audio failed to load");
                shared.view.show_status(&e.to_string());
            }
        })
    }

    async fn tick(&self, generation: u64) {
        let finished = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            if state.generation != generation || state.disposed {
                return;
            }
            let Some(active) = state.run.as_mut() else {
                return;
            };
            if active.tick.is_none() {
                return;
            }

            state.remaining = state.remaining.saturating_sub(1);
            let label = format_time(state.remaining);
            self.view.show_time(&label);

            if let Some(feed) = active.overlay.as_ref() {
                feed.publish(self.renderer.lock().render(&label));
            }

            if state.remaining == 0 {
                if let Some(tick) = active.tick.take() {
                    tick.cancel();
                }
                state.phase = TimerPhase::Finished;
                Some((Arc::clone(&active.track), active.overlay.take()))
            } else {
                None
            }
        };

        if let Some((track, overlay)) = finished {
            self.finish(track, overlay).await;
        }
    }

    async fn finish(&self, track: Arc<dyn AudioTrack>, overlay: Option<OverlayFeed>) {
        info!("Timer finished, playing audio");
        self.view.show_status("Timer finished! Playing audio...");

        if let Err(e) = track.play().await {
            error!(error = %e, "Error playing audio");
            self.view.show_status(&e.to_string());
        }

        if overlay.is_some() {
            drop(overlay);
            self.clear_overlay().await;
        }

        if self.host_ready() {
            if let Err(e) = self.host.notify_app_event(&AppEvent::timer_finished()).await {
                error!(error = %e, "Error notifying host event");
            }
        }
    }

    async fn stop(&self) {
        let (previous, remaining) = {
            let mut state = self.state.lock();
            state.generation += 1;
            state.phase = TimerPhase::Idle;
            (state.run.take(), state.remaining)
        };

        if let Some(active) = previous {
            if active.release().is_some() {
                self.clear_overlay().await;
            }
            info!("Timer stopped");
            self.view.show_status("Timer stopped");
        }

        self.view.show_time(&format_time(remaining));
    }

    async fn apply_overlay(&self, remaining: u64) -> Option<OverlayFeed> {
        let first = self.renderer.lock().render(&format_time(remaining));
        let (feed, stream) = OverlayFeed::new(first);

        match self.host.set_video_filter(Some(stream)).await {
            Ok(()) => {
                info!("Video overlay applied");
                Some(feed)
            }
            Err(e) => {
                let e = match e {
                    DomainError::OverlayApply(_) => e,
                    other => DomainError::OverlayApply(other.to_string()),
                };
                error!(error = %e, "Video overlay failed");
                self.view.show_status(&e.to_string());
                None
            }
        }
    }

    async fn clear_overlay(&self) {
        match self.host.set_video_filter(None).await {
            Ok(()) => debug!("Video overlay removed"),
            Err(e) => warn!(error = %e, "Failed to remove video overlay"),
        }
    }
}
