//! Event seam between the pipeline and its UI consumer.
//! The orchestrator never blocks on the sink; cancellation emits nothing.

use crossbeam_channel as cb;
use serde::Serialize;

use super::progress::ProgressSnapshot;

/// Everything the pipeline reports outward.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PreloadEvent {
    /// Counter snapshot after a unit of work landed.
    Progress(ProgressSnapshot),
    /// A word failed the target language's character pattern. Emitted once
    /// per word per load.
    InvalidWord { word: String, reason: String },
    /// All unverifiable words of one dictionary batch, aggregated into a
    /// single user-visible warning.
    WordsNotFound { words: Vec<String> },
    /// A still-current load finished end to end.
    Finished { generation: u64 },
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: PreloadEvent);
}

/// Discards everything. For headless use and most unit tests.
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: PreloadEvent) {}
}

/// Forwards events over an unbounded channel so the emitting side never
/// blocks, whatever the consumer is doing.
pub struct ChannelSink {
    tx: cb::Sender<PreloadEvent>,
}

impl ChannelSink {
    pub fn pair() -> (Self, cb::Receiver<PreloadEvent>) {
        let (tx, rx) = cb::unbounded();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: PreloadEvent) {
        // Receiver gone means nobody is listening; drop silently.
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_sink_delivers_in_order() {
        let (sink, rx) = ChannelSink::pair();
        sink.emit(PreloadEvent::InvalidWord {
            word: "猫咪".into(),
            reason: "pattern".into(),
        });
        sink.emit(PreloadEvent::Finished { generation: 1 });
        assert!(matches!(
            rx.recv().unwrap(),
            PreloadEvent::InvalidWord { .. }
        ));
        assert!(matches!(
            rx.recv().unwrap(),
            PreloadEvent::Finished { generation: 1 }
        ));
    }

    #[test]
    fn emit_after_receiver_dropped_is_silent() {
        let (sink, rx) = ChannelSink::pair();
        drop(rx);
        sink.emit(PreloadEvent::Finished { generation: 1 });
    }
}
