//! Session-wide playback coordination.
//!
//! At most one NFT is audible at a time. Media elements are reached only
//! through the injected [`MediaHost`], keyed by [`NftKey`]; their async
//! load/play outcomes come back through [`PlaybackCoordinator::on_event`]
//! tagged with the generation of the `play()` call that started them.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::types::{NftKey, NormalizedNft};

/// Handle onto the platform's media elements.
pub trait MediaHost {
    /// Point the element for `key` at `url` and start playback. The outcome is
    /// reported later via `on_event(key, generation, ..)`.
    fn load(&mut self, key: &NftKey, url: &str, generation: u64);
    fn pause(&mut self, key: &NftKey);
    /// Rewind to the start.
    fn reset(&mut self, key: &NftKey);
    fn seek(&mut self, key: &NftKey, seconds: f64);
    fn set_video_muted(&mut self, key: &NftKey, muted: bool);
    /// Ambient looping videos are muted unless their NFT is the one playing.
    fn mute_all_videos(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MediaEvent {
    Playing,
    Error,
    TimeUpdate(f64),
    LoadedMetadata(f64),
    Ended,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackPhase {
    Idle,
    /// Waiting on source number `attempt` (0 = canonical URL).
    Loading { key: NftKey, attempt: usize },
    Playing { key: NftKey },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaybackState {
    pub now_playing: Option<NftKey>,
    pub elapsed_seconds: f64,
    pub duration_seconds: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    Started,
    /// The NFT was already current; play acts as the stop toggle.
    Stopped,
    /// Nothing to play; the coordinator is idle.
    Unavailable,
}

#[derive(Debug)]
struct Session {
    key: NftKey,
    sources: Vec<String>,
    cursor: usize,
    confirmed: bool,
    generation: u64,
}

enum Step {
    Nothing,
    Retry(String),
    Stop,
}

pub struct PlaybackCoordinator<H: MediaHost> {
    host: H,
    state: PlaybackState,
    session: Option<Session>,
    generation: u64,
}

impl<H: MediaHost> PlaybackCoordinator<H> {
    pub fn new(host: H) -> Self {
        Self { host, state: PlaybackState::default(), session: None, generation: 0 }
    }

    pub fn state(&self) -> &PlaybackState { &self.state }
    pub fn generation(&self) -> u64 { self.generation }
    pub fn host(&self) -> &H { &self.host }
    pub fn host_mut(&mut self) -> &mut H { &mut self.host }

    pub fn phase(&self) -> PlaybackPhase {
        match &self.session {
            None => PlaybackPhase::Idle,
            Some(s) if s.confirmed => PlaybackPhase::Playing { key: s.key.clone() },
            Some(s) => PlaybackPhase::Loading { key: s.key.clone(), attempt: s.cursor },
        }
    }

    pub fn is_current(&self, key: &NftKey) -> bool { self.state.now_playing.as_ref() == Some(key) }

    /// Start `nft`, or stop it if it is already current.
    pub fn play(&mut self, nft: &NormalizedNft) -> PlayOutcome {
        if self.is_current(&nft.key) {
            self.stop();
            return PlayOutcome::Stopped;
        }
        self.stop();

        let sources: Vec<String> = nft
            .audio_asset
            .as_ref()
            .map(|a| a.sources().into_iter().filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();
        if sources.is_empty() {
            debug!(nft = %nft.key, "no audio source to play");
            return PlayOutcome::Unavailable;
        }

        self.generation += 1;
        let generation = self.generation;

        self.host.mute_all_videos();
        if nft.is_video() {
            self.host.set_video_muted(&nft.key, false);
        }

        info!(nft = %nft.key, generation, sources = sources.len(), "starting playback");
        self.host.load(&nft.key, &sources[0], generation);
        self.state = PlaybackState { now_playing: Some(nft.key.clone()), elapsed_seconds: 0.0, duration_seconds: 0.0 };
        self.session = Some(Session { key: nft.key.clone(), sources, cursor: 0, confirmed: false, generation });
        PlayOutcome::Started
    }

    /// Unconditionally return to idle.
    pub fn stop(&mut self) {
        if let Some(s) = self.session.take() {
            self.host.pause(&s.key);
            self.host.reset(&s.key);
            self.host.mute_all_videos();
        }
        self.state = PlaybackState::default();
    }

    /// Seek within the playing item; returns the applied position.
    /// Ignored unless playback has been confirmed.
    pub fn seek(&mut self, seconds: f64) -> Option<f64> {
        let key = match self.phase() {
            PlaybackPhase::Playing { key } => key,
            _ => return None,
        };
        if seconds.is_nan() { return None; }
        let upper = if self.state.duration_seconds > 0.0 { self.state.duration_seconds } else { f64::INFINITY };
        let target = seconds.clamp(0.0, upper);
        self.host.seek(&key, target);
        self.state.elapsed_seconds = target;
        Some(target)
    }

    /// Feed a media element notification. Events for another key or an
    /// older generation are dropped.
    pub fn on_event(&mut self, key: &NftKey, generation: u64, event: MediaEvent) {
        let step = {
            let Some(s) = self.session.as_mut() else { return };
            if s.generation != generation || &s.key != key {
                debug!(nft = %key, generation, current = s.generation, "ignoring stale media event");
                return;
            }
            match event {
                MediaEvent::Playing => {
                    s.confirmed = true;
                    Step::Nothing
                }
                MediaEvent::Error if s.confirmed => Step::Stop,
                MediaEvent::Error => {
                    if s.cursor + 1 < s.sources.len() {
                        s.cursor += 1;
                        debug!(nft = %key, attempt = s.cursor, "source failed, trying next gateway");
                        Step::Retry(s.sources[s.cursor].clone())
                    } else {
                        debug!(nft = %key, tried = s.sources.len(), "every source failed");
                        Step::Stop
                    }
                }
                MediaEvent::TimeUpdate(t) => {
                    if t.is_finite() { self.state.elapsed_seconds = t.max(0.0); }
                    Step::Nothing
                }
                MediaEvent::LoadedMetadata(d) => {
                    self.state.duration_seconds = if d.is_finite() && d > 0.0 { d } else { 0.0 };
                    Step::Nothing
                }
                MediaEvent::Ended => Step::Stop,
            }
        };
        match step {
            Step::Nothing => {}
            Step::Retry(url) => self.host.load(key, &url, generation),
            Step::Stop => self.stop(),
        }
    }
}
