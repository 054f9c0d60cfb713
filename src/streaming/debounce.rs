//! Output debounce gate.
//!
//! A gesture held across consecutive windows yields the same label over and
//! over; only a change is worth synthesizing and streaming.

/// Outcome of offering a prediction to the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Same as the last emitted label.
    Suppress,
    /// New label; it is now the last emitted one.
    Emit(String),
}

/// Remembers the last emitted label for one session.
#[derive(Debug, Clone, Default)]
pub struct DebounceGate {
    last_emitted: Option<String>,
}

impl DebounceGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offers a classifier result.
    ///
    /// The label is recorded as emitted before any downstream work happens,
    /// so a failed emission is not retried on the next identical prediction.
    pub fn offer(&mut self, label: &str) -> GateDecision {
        if self.last_emitted.as_deref() == Some(label) {
            return GateDecision::Suppress;
        }
        self.last_emitted = Some(label.to_string());
        GateDecision::Emit(label.to_string())
    }

    pub fn last_emitted(&self) -> Option<&str> {
        self.last_emitted.as_deref()
    }

    pub fn reset(&mut self) {
        self.last_emitted = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_prediction_emits() {
        let mut gate = DebounceGate::new();
        assert_eq!(gate.offer("hello"), GateDecision::Emit("hello".to_string()));
        assert_eq!(gate.last_emitted(), Some("hello"));
    }

    #[test]
    fn test_repeated_prediction_is_suppressed() {
        let mut gate = DebounceGate::new();
        gate.offer("wave");
        for _ in 0..10 {
            assert_eq!(gate.offer("wave"), GateDecision::Suppress);
        }
    }

    #[test]
    fn test_every_change_emits() {
        let mut gate = DebounceGate::new();
        let labels = ["a", "a", "b", "b", "b", "a", "c", "c"];
        let emitted: Vec<&str> = labels
            .iter()
            .filter(|label| matches!(gate.offer(label), GateDecision::Emit(_)))
            .copied()
            .collect();
        assert_eq!(emitted, vec!["a", "b", "a", "c"]);
    }

    #[test]
    fn test_empty_label_is_a_label() {
        let mut gate = DebounceGate::new();
        assert_eq!(gate.offer(""), GateDecision::Emit(String::new()));
        assert_eq!(gate.offer(""), GateDecision::Suppress);
    }

    #[test]
    fn test_reset_forgets_last_label() {
        let mut gate = DebounceGate::new();
        gate.offer("x");
        gate.reset();
        assert_eq!(gate.last_emitted(), None);
        assert_eq!(gate.offer("x"), GateDecision::Emit("x".to_string()));
    }
}
