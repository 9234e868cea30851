use rand::Rng;

/// Motion event action codes as reported in the touch section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TouchAction {
    Move = 1,
    Down = 2,
    Up = 3,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TouchEvent {
    pub action: TouchAction,
    /// Delay since the previous touch event in milliseconds
    pub time: u32,
}

#[derive(Debug, Clone, Default)]
pub struct TouchEventList {
    pub events: Vec<TouchEvent>,
}

impl TouchEventList {
    /// Regenerate the list: no gestures before 3 s, then one, two or three
    /// swipe gestures depending on how long the app has been "open".
    pub fn randomize<R: Rng + ?Sized>(&mut self, rng: &mut R, elapsed_ms: i64) {
        self.events.clear();

        let gestures = if elapsed_ms < 3_000 {
            0
        } else if elapsed_ms < 5_000 {
            1
        } else if elapsed_ms < 10_000 {
            2
        } else {
            3
        };

        for _ in 0..gestures {
            self.push_gesture(rng);
        }
    }

    fn push_gesture<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.events.push(TouchEvent {
            action: TouchAction::Down,
            time: rng.gen_range(500..2500),
        });
        for _ in 0..rng.gen_range(2..9) {
            self.events.push(TouchEvent {
                action: TouchAction::Move,
                time: rng.gen_range(3..50),
            });
        }
        self.events.push(TouchEvent {
            action: TouchAction::Up,
            time: rng.gen_range(3..100),
        });
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Σ(action + time) over all events
    pub fn sum(&self) -> i64 {
        self.events.iter().map(|e| e.action as i64 + e.time as i64).sum()
    }
}

impl std::fmt::Display for TouchEventList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for event in &self.events {
            write!(f, "{},{},0,0,1,1,1,-1;", event.action as u8, event.time)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gesture_count(list: &TouchEventList) -> usize {
        list.events.iter().filter(|e| e.action == TouchAction::Down).count()
    }

    #[test]
    fn test_gesture_count_follows_elapsed_time() {
        let mut rng = rand::thread_rng();
        let mut list = TouchEventList::default();

        for (elapsed, expected) in [(0, 0), (2_999, 0), (3_000, 1), (7_500, 2), (10_000, 3), (90_000, 3)] {
            list.randomize(&mut rng, elapsed);
            assert_eq!(gesture_count(&list), expected, "elapsed {elapsed} ms");
        }
    }

    #[test]
    fn test_each_gesture_is_well_formed() {
        let mut rng = rand::thread_rng();
        let mut list = TouchEventList::default();
        list.randomize(&mut rng, 20_000);

        let mut open = false;
        for event in &list.events {
            match event.action {
                TouchAction::Down => {
                    assert!(!open, "Down while a gesture is open");
                    open = true;
                }
                TouchAction::Move => assert!(open, "Move outside a gesture"),
                TouchAction::Up => {
                    assert!(open, "Up without Down");
                    open = false;
                }
            }
        }
        assert!(!open, "Last gesture must be closed");
    }

    #[test]
    fn test_format_and_sum() {
        let list = TouchEventList {
            events: vec![
                TouchEvent {
                    action: TouchAction::Down,
                    time: 900,
                },
                TouchEvent {
                    action: TouchAction::Up,
                    time: 40,
                },
            ],
        };
        assert_eq!(list.to_string(), "2,900,0,0,1,1,1,-1;3,40,0,0,1,1,1,-1;");
        assert_eq!(list.sum(), 2 + 900 + 3 + 40);
    }
}
