//! Collaborator traits
//!
//! Everything the engine talks to lives behind one of these traits so tests
//! can script a PBX, a transcriber or a sentiment backend without any real
//! media path.

mod sentiment;
mod speech;
mod transport;

pub use sentiment::{SentimentAnalyzer, SentimentLabel, SentimentResult};
pub use speech::{Transcriber, VoiceActivity, VoiceActivityProbe};
pub use transport::{CallTransport, RecordingInfo, TransportEvent};
