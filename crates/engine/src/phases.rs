//! Real-time call phases
//!
//! The three phases every conversation is built from:
//! - AMD: record the greeting, transcribe it, decide human vs machine
//! - Playing: prompt playback, raced against a barge-in monitor
//! - Waiting: record the reply, ended by trailing silence or a hard timeout
//!
//! Each phase is a bounded operation; nothing here blocks without a timeout.

use std::sync::Arc;
use std::time::{Duration, Instant};

use call_agent_config::{AmdSettings, BargeInSettings, ListenSettings};
use call_agent_core::{
    AudioRef, CallId, CallTransport, Transcriber, TranscriptResult, TransportError, VoiceActivity,
    VoiceActivityProbe,
};

use crate::barge_in::BargeInMonitor;

/// Verdict of the answering-machine detection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmdVerdict {
    Human,
    Machine,
    /// Low confidence or nothing matched; the call continues as if human
    Unknown,
}

/// Result of the AMD phase
#[derive(Debug, Clone)]
pub struct AmdOutcome {
    pub verdict: AmdVerdict,
    pub confidence: f32,
    /// What the greeting sample transcribed to
    pub transcript: String,
}

/// Result of the playing phase
#[derive(Debug, Clone, Copy)]
pub struct PlayOutcome {
    pub interrupted: bool,
    /// Time into playback when it ended, by completion or interruption
    pub elapsed: Duration,
    /// Continuous speech measured by the monitor, when it fired
    pub speech: Option<Duration>,
}

/// Result of the waiting phase
#[derive(Debug, Clone)]
pub struct ListenOutcome {
    pub transcript: TranscriptResult,
    /// Wall-clock length of the capture
    pub capture: Duration,
}

impl ListenOutcome {
    fn silence(capture: Duration) -> Self {
        Self {
            transcript: TranscriptResult::silence(),
            capture,
        }
    }

    /// True when the reply is to be treated as silence
    pub fn is_silence(&self) -> bool {
        self.transcript.is_empty()
    }
}

/// Executes the three real-time phases for one call at a time
pub struct PhaseExecutor {
    transport: Arc<dyn CallTransport>,
    transcriber: Arc<dyn Transcriber>,
    probe: Arc<dyn VoiceActivityProbe>,
    amd: AmdSettings,
    listen: ListenSettings,
    barge_in: BargeInSettings,
}

impl PhaseExecutor {
    pub fn new(
        transport: Arc<dyn CallTransport>,
        transcriber: Arc<dyn Transcriber>,
        probe: Arc<dyn VoiceActivityProbe>,
        amd: AmdSettings,
        listen: ListenSettings,
        barge_in: BargeInSettings,
    ) -> Self {
        Self {
            transport,
            transcriber,
            probe,
            amd,
            listen,
            barge_in,
        }
    }

    /// Answering-machine detection
    ///
    /// Records a fixed-length sample of the greeting, transcribes it and
    /// scans both keyword sets. Machine keywords always outrank human ones:
    /// voicemail greetings tend to start with perfectly human-sounding
    /// phrases.
    pub async fn amd(&self, call: &CallId) -> Result<AmdOutcome, TransportError> {
        let target = AudioRef::new(format!("captures/{call}-amd.wav"));
        self.transport.start_recording(call, &target).await?;
        tokio::time::sleep(self.amd.sample_duration()).await;
        let recording = self.transport.stop_recording(call).await?;

        let transcript = match self.transcriber.transcribe(&recording.audio).await {
            Ok(result) => result.text,
            Err(e) => {
                tracing::warn!(%call, error = %e, "AMD transcription failed, assuming unknown");
                String::new()
            }
        };
        let lower = transcript.to_lowercase();

        let machine_hits = count_hits(&lower, &self.amd.machine_keywords);
        let human_hits = count_hits(&lower, &self.amd.human_keywords);

        let (verdict, hits) = if machine_hits > 0 {
            (AmdVerdict::Machine, machine_hits)
        } else if human_hits > 0 {
            (AmdVerdict::Human, human_hits)
        } else {
            (AmdVerdict::Unknown, 0)
        };

        let confidence = match hits {
            0 => 0.0,
            1 => 0.6,
            2 => 0.8,
            _ => 0.95,
        };

        let verdict = if verdict != AmdVerdict::Unknown && confidence < self.amd.min_confidence {
            AmdVerdict::Unknown
        } else {
            verdict
        };

        tracing::info!(
            %call,
            ?verdict,
            confidence,
            machine_hits,
            human_hits,
            "AMD verdict"
        );
        metrics::counter!("amd_verdicts_total", "verdict" => verdict_label(verdict)).increment(1);

        Ok(AmdOutcome {
            verdict,
            confidence,
            transcript,
        })
    }

    /// Prompt playback, with an optional barge-in monitor racing it
    pub async fn play(
        &self,
        call: &CallId,
        audio: &AudioRef,
        barge_in: bool,
    ) -> Result<PlayOutcome, TransportError> {
        let started = Instant::now();

        if !barge_in {
            self.transport.play(call, audio).await?;
            return Ok(PlayOutcome {
                interrupted: false,
                elapsed: started.elapsed(),
                speech: None,
            });
        }

        let monitor =
            BargeInMonitor::new(Arc::clone(&self.probe), self.barge_in.clone(), call.clone());

        tokio::select! {
            played = self.transport.play(call, audio) => {
                played?;
                Ok(PlayOutcome {
                    interrupted: false,
                    elapsed: started.elapsed(),
                    speech: None,
                })
            }
            result = monitor.watch() => {
                self.transport.stop_playback(call).await?;
                metrics::counter!("barge_ins_total").increment(1);
                Ok(PlayOutcome {
                    interrupted: true,
                    elapsed: result.at,
                    speech: Some(result.speech),
                })
            }
        }
    }

    /// Record the caller's reply
    ///
    /// The capture ends on trailing silence or the hard timeout (the step
    /// may override the configured default), whichever comes first. Very
    /// short captures are reported as silence without ever hitting the
    /// transcriber.
    pub async fn wait_reply(
        &self,
        call: &CallId,
        timeout: Option<Duration>,
    ) -> Result<ListenOutcome, TransportError> {
        let target = AudioRef::new(format!("captures/{call}-reply.wav"));
        self.transport.start_recording(call, &target).await?;

        let timeout = timeout.unwrap_or_else(|| self.listen.timeout());
        let interval = self.listen.poll_interval();
        let mut elapsed = Duration::ZERO;
        let mut trailing_silence = Duration::ZERO;
        let mut heard_speech = false;

        while elapsed < timeout {
            tokio::time::sleep(interval).await;
            elapsed += interval;

            let activity = match self.probe.sample(call).await {
                Ok(activity) => activity,
                Err(e) => {
                    tracing::debug!(%call, error = %e, "activity probe failed during listen");
                    VoiceActivity::silence()
                }
            };

            if activity.speaking {
                heard_speech = true;
                trailing_silence = Duration::ZERO;
            } else {
                trailing_silence += interval;
                if trailing_silence >= self.listen.silence_threshold() {
                    break;
                }
            }
        }

        let recording = self.transport.stop_recording(call).await?;

        if !heard_speech || recording.duration < self.listen.min_capture() {
            tracing::debug!(
                %call,
                capture_ms = recording.duration.as_millis() as u64,
                heard_speech,
                "capture treated as silence"
            );
            return Ok(ListenOutcome::silence(recording.duration));
        }

        let transcript = match self.transcriber.transcribe(&recording.audio).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(%call, error = %e, "transcription failed, treating as silence");
                TranscriptResult::silence()
            }
        };

        Ok(ListenOutcome {
            transcript,
            capture: recording.duration,
        })
    }
}

fn count_hits(text: &str, keywords: &[String]) -> usize {
    keywords
        .iter()
        .filter(|kw| text.contains(kw.to_lowercase().as_str()))
        .count()
}

fn verdict_label(verdict: AmdVerdict) -> &'static str {
    match verdict {
        AmdVerdict::Human => "human",
        AmdVerdict::Machine => "machine",
        AmdVerdict::Unknown => "unknown",
    }
}
