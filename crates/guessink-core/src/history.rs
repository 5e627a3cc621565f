//! Replay log of the current round.

use crate::protocol::Envelope;

/// Ordered record of every durable envelope the drawer broadcast since the
/// round began. Late joiners rebuild their canvas by replaying it.
#[derive(Debug, Clone, Default)]
pub struct EventHistory {
    events: Vec<Envelope>,
}

impl EventHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an envelope if it is durable.
    /// Returns true if it was recorded.
    pub fn record(&mut self, envelope: &Envelope) -> bool {
        if !envelope.is_durable() {
            return false;
        }
        self.events.push(envelope.clone());
        true
    }

    /// Forget everything (a new round has begun).
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Replace the log with a received one, dropping anything non-durable.
    pub fn restore(&mut self, events: &[Envelope]) {
        self.events = events.iter().filter(|e| e.is_durable()).cloned().collect();
    }

    pub fn events(&self) -> &[Envelope] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::RoundCommand;

    fn line(x: f64) -> Envelope {
        Envelope::Line {
            coords: vec![x, 0.0, x + 1.0, 1.0],
            colour: "black".into(),
            width: 3.0,
        }
    }

    #[test]
    fn test_records_in_order() {
        let mut history = EventHistory::new();
        history.record(&Envelope::Command {
            command: RoundCommand::Start,
        });
        history.record(&line(1.0));
        history.record(&line(2.0));
        assert_eq!(history.len(), 3);
        assert_eq!(history.events()[1], line(1.0));
        assert_eq!(history.events()[2], line(2.0));
    }

    #[test]
    fn test_skips_transient_envelopes() {
        let mut history = EventHistory::new();
        assert!(!history.record(&Envelope::Cursor {
            id: "p".into(),
            coords: vec![1.0, 2.0],
        }));
        assert!(!history.record(&Envelope::Hello { id: "p".into() }));
        assert!(!history.record(&Envelope::Unknown));
        assert!(history.is_empty());
    }

    #[test]
    fn test_clear_and_restore() {
        let mut history = EventHistory::new();
        history.record(&line(1.0));
        history.clear();
        assert!(history.is_empty());

        history.restore(&[
            line(5.0),
            Envelope::Cursor {
                id: "p".into(),
                coords: vec![0.0, 0.0],
            },
            line(6.0),
        ]);
        assert_eq!(history.events(), &[line(5.0), line(6.0)]);
    }
}
