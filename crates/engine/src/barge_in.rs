//! Barge-in monitoring
//!
//! A monitor runs only while barge-in is enabled for the current playback.
//! It samples the frame-based voice-activity probe at a fixed interval and
//! accumulates continuous speech; once the trigger threshold is reached it
//! waits out the smooth delay (so playback can fade naturally) and resolves.
//! The playing phase races this future against playback completion and drops
//! it as soon as playback ends.

use std::sync::Arc;
use std::time::Duration;

use call_agent_config::BargeInSettings;
use call_agent_core::{CallId, VoiceActivity, VoiceActivityProbe};

/// What the monitor observed
#[derive(Debug, Clone, Copy)]
pub struct BargeInResult {
    pub interrupted: bool,
    /// Time into playback when the stop signal fired (trigger + smooth delay)
    pub at: Duration,
    /// Continuous speech measured at the trigger
    pub speech: Duration,
}

/// Watches one playback for sustained caller speech
pub struct BargeInMonitor {
    probe: Arc<dyn VoiceActivityProbe>,
    settings: BargeInSettings,
    call: CallId,
}

impl BargeInMonitor {
    pub fn new(probe: Arc<dyn VoiceActivityProbe>, settings: BargeInSettings, call: CallId) -> Self {
        Self {
            probe,
            settings,
            call,
        }
    }

    /// Resolve when the caller has barged in
    ///
    /// Never resolves on its own if the caller stays quiet; the playing phase
    /// cancels it when playback completes. Probe failures count as silence so
    /// a degraded audio path cannot stop playback by itself.
    pub async fn watch(&self) -> BargeInResult {
        let interval = self.settings.poll_interval();
        let start_threshold = self.settings.start_threshold();
        let trigger_threshold = self.settings.trigger_threshold();

        let mut elapsed = Duration::ZERO;
        let mut continuous = Duration::ZERO;
        let mut speech_started = false;

        loop {
            tokio::time::sleep(interval).await;
            elapsed += interval;

            let activity = match self.probe.sample(&self.call).await {
                Ok(activity) => activity,
                Err(e) => {
                    tracing::debug!(call = %self.call, error = %e, "activity probe failed");
                    VoiceActivity::silence()
                }
            };

            if activity.speaking {
                continuous += interval;
                if !speech_started && continuous >= start_threshold {
                    speech_started = true;
                    tracing::trace!(call = %self.call, at_ms = elapsed.as_millis() as u64, "speech started during playback");
                }
            } else {
                continuous = Duration::ZERO;
            }

            if continuous >= trigger_threshold {
                let speech = continuous;
                tokio::time::sleep(self.settings.smooth_delay()).await;
                elapsed += self.settings.smooth_delay();
                tracing::debug!(
                    call = %self.call,
                    at_ms = elapsed.as_millis() as u64,
                    speech_ms = speech.as_millis() as u64,
                    "barge-in triggered"
                );
                return BargeInResult {
                    interrupted: true,
                    at: elapsed,
                    speech,
                };
            }
        }
    }
}
