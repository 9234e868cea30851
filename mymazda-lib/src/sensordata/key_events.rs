use rand::Rng;

/// Minimum time since collection start before any key event is emitted
pub const KEY_EVENT_MIN_ELAPSED_MS: i64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    /// Delay since the previous key event in milliseconds
    pub time: u32,
    /// Character code sum of the focused field's id, shared by all events of a run
    pub id_char_code_sum: u32,
    pub longer_than_before: bool,
}

impl KeyEvent {
    fn write_to(&self, out: &mut String) {
        out.push_str(&format!("2,{},{}", self.time, self.id_char_code_sum));
        if self.longer_than_before {
            out.push_str(",1");
        }
        out.push(';');
    }
}

#[derive(Debug, Clone, Default)]
pub struct KeyEventList {
    pub events: Vec<KeyEvent>,
}

impl KeyEventList {
    /// Regenerate the list. With probability `1 / odds`, and only once at
    /// least [`KEY_EVENT_MIN_ELAPSED_MS`] have passed, emits 2-4 keystrokes.
    pub fn randomize<R: Rng + ?Sized>(&mut self, rng: &mut R, elapsed_ms: i64, odds: u32) {
        self.events.clear();

        if rng.gen_range(0..odds.max(1)) > 0 {
            return;
        }
        if elapsed_ms < KEY_EVENT_MIN_ELAPSED_MS {
            return;
        }

        let event_count = rng.gen_range(2..5);
        let id_char_code_sum = rng.gen_range(517..519);
        for i in 0..event_count {
            let time = if i == 0 {
                rng.gen_range(5000..8000)
            } else {
                rng.gen_range(10..50)
            };
            self.events.push(KeyEvent {
                time,
                id_char_code_sum,
                longer_than_before: rng.gen_bool(0.5),
            });
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Σ(code sum + time + 2) over all events
    pub fn sum(&self) -> i64 {
        self.events
            .iter()
            .map(|e| e.id_char_code_sum as i64 + e.time as i64 + 2)
            .sum()
    }
}

impl std::fmt::Display for KeyEventList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut out = String::new();
        for event in &self.events {
            event.write_to(&mut out);
        }
        f.write_str(&out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_format() {
        let list = KeyEventList {
            events: vec![
                KeyEvent {
                    time: 6000,
                    id_char_code_sum: 517,
                    longer_than_before: true,
                },
                KeyEvent {
                    time: 20,
                    id_char_code_sum: 517,
                    longer_than_before: false,
                },
            ],
        };
        assert_eq!(list.to_string(), "2,6000,517,1;2,20,517;");
        assert_eq!(list.sum(), (517 + 6000 + 2) + (517 + 20 + 2));
    }

    #[test]
    fn test_gate_respects_elapsed_time() {
        let mut rng = rand::thread_rng();
        let mut list = KeyEventList::default();

        for _ in 0..50 {
            list.randomize(&mut rng, 9_999, 1);
            assert!(list.is_empty(), "No key events before 10 s");
        }

        for _ in 0..50 {
            list.randomize(&mut rng, 10_000, 1);
            assert!((2..=4).contains(&list.len()), "2-4 key events once the gate fires");
            let code = list.events[0].id_char_code_sum;
            assert!(list.events.iter().all(|e| e.id_char_code_sum == code));
            assert!((5000..8000).contains(&list.events[0].time));
            assert!(list.events[1..].iter().all(|e| (10..50).contains(&e.time)));
        }
    }

    #[test]
    fn test_randomize_replaces_previous_events() {
        let mut rng = rand::thread_rng();
        let mut list = KeyEventList::default();
        list.randomize(&mut rng, 60_000, 1);
        assert!(!list.is_empty());
        list.randomize(&mut rng, 0, 1);
        assert!(list.is_empty());
    }
}
