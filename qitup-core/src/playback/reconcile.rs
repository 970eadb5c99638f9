use std::collections::VecDeque;

use crate::{Item, PlayerEvent, PlayerState, RemoteSnapshot};

/// The state an adapter keeps about its remote: the working set it handed out,
/// the state it derived, and the last snapshot it observed.
#[derive(Debug, Default)]
pub struct Reconciler {
    items: VecDeque<Item>,
    state: PlayerState,
    last: Option<RemoteSnapshot>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn set_state(&mut self, state: PlayerState) {
        self.state = state;
    }

    pub fn has_items(&self) -> bool {
        !self.items.is_empty()
    }

    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.items.iter()
    }

    /// The source keys of the working set, in play order.
    pub fn keys(&self) -> Vec<String> {
        self.items
            .iter()
            .map(|i| i.source_key().to_string())
            .collect()
    }

    pub fn last(&self) -> Option<&RemoteSnapshot> {
        self.last.as_ref()
    }

    /// Replaces the working set after a successful play command.
    pub fn start(&mut self, items: Vec<Item>) {
        self.items = items.into();
        self.playing();
    }

    /// Marks the working set as playing again after a resume or re-issue.
    pub fn playing(&mut self) {
        self.state = PlayerState::Playing;

        if let Some(current) = self.items.front_mut() {
            current.state.play();
        }
    }

    pub fn paused(&mut self) {
        self.state = PlayerState::Paused;

        if let Some(current) = self.items.front_mut() {
            current.state.pause();
        }
    }

    /// Consumes the current item, marking it done.
    pub fn advance(&mut self) -> Option<Item> {
        let mut finished = self.items.pop_front()?;
        finished.state.done();

        match self.items.front_mut() {
            Some(next) if self.state == PlayerState::Playing => {
                next.state.play();
            }
            Some(_) => {}
            None => self.state = PlayerState::Ready,
        }

        Some(finished)
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.state = PlayerState::Ready;
        self.last = None;
    }

    fn current_key(&self) -> Option<&str> {
        self.items.front().map(|i| i.source_key())
    }

    fn next_key(&self) -> Option<&str> {
        self.items.get(1).map(|i| i.source_key())
    }

    /// Derives a transition from a freshly polled snapshot. The snapshot always
    /// replaces the previous one. A missing snapshot means the remote has no
    /// active playback and is ignored.
    pub fn apply(&mut self, snapshot: Option<RemoteSnapshot>) -> Option<PlayerEvent> {
        let snapshot = snapshot?;
        let event = self.diff(&snapshot);

        self.last = Some(snapshot);
        event
    }

    fn diff(&mut self, new: &RemoteSnapshot) -> Option<PlayerEvent> {
        let Some(last) = self.last.as_ref() else {
            if !new.playing {
                return None;
            }

            return if new.item.as_deref() == self.current_key() {
                self.transition(PlayerState::Playing, PlayerEvent::Play)
            } else {
                self.transition(PlayerState::Interrupted, PlayerEvent::Interrupted)
            };
        };

        if last.playing && !new.playing {
            // Progress is reset when the remote reaches the end of an item
            if new.progress == 0 {
                return self.finish();
            }

            return if last.item == new.item {
                self.transition(PlayerState::Paused, PlayerEvent::Pause)
            } else {
                self.transition(PlayerState::Interrupted, PlayerEvent::Interrupted)
            };
        }

        if last.item != new.item {
            let item = new.item.as_deref();

            if self.items.is_empty() {
                return self.transition(PlayerState::Interrupted, PlayerEvent::Interrupted);
            }

            if item == self.current_key() {
                return self.transition(PlayerState::Playing, PlayerEvent::Play);
            }

            if item.is_some() && item == self.next_key() {
                return self.finish();
            }

            // The remote moved on by itself after the final item
            if self.items.len() == 1 && last.playing {
                return self.finish();
            }

            return self.transition(PlayerState::Interrupted, PlayerEvent::Interrupted);
        }

        match (last.playing, new.playing) {
            (false, true) => self.transition(PlayerState::Playing, PlayerEvent::Play),
            (true, false) => self.transition(PlayerState::Paused, PlayerEvent::Pause),
            _ => None,
        }
    }

    fn finish(&mut self) -> Option<PlayerEvent> {
        self.advance().map(|_| PlayerEvent::TrackFinished)
    }

    fn transition(&mut self, state: PlayerState, event: PlayerEvent) -> Option<PlayerEvent> {
        if self.state == state {
            return None;
        }

        match state {
            PlayerState::Playing => self.playing(),
            PlayerState::Paused => self.paused(),
            other => self.state = other,
        }

        Some(event)
    }
}
