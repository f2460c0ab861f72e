//! Paced reveal of a growing composite string.
//!
//! Events arrive in bursts; a typewriter smooths them into a steady reveal of a few characters
//! per tick. Pacing is purely cosmetic and never changes what is eventually shown.

use std::pin::Pin;
use std::time::Duration;

use futures::stream::{self, Stream, StreamExt};
use tokio::time::{Interval, MissedTickBehavior};

/// What a single tick of a [`Typewriter`] revealed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reveal<'a> {
    /// Text to append to what is already on screen.
    Append(&'a str),
    /// The target diverged from what was shown; redraw everything with this text.
    Rewrite(&'a str),
}

/// Reveals a target string a fixed number of characters at a time.
#[derive(Debug, Clone)]
pub struct Typewriter {
    target: String,
    // Byte offset into `target`, always on a char boundary.
    shown: usize,
    units_per_tick: usize,
    rewrite: bool,
}

impl Default for Typewriter {
    fn default() -> Self {
        Self::new(1)
    }
}

impl Typewriter {
    /// Creates a typewriter that reveals `units_per_tick` characters per tick (at least one).
    pub fn new(units_per_tick: usize) -> Self {
        Self {
            target: String::new(),
            shown: 0,
            units_per_tick: units_per_tick.max(1),
            rewrite: false,
        }
    }

    /// Replaces the string being revealed.
    ///
    /// If `target` extends what is already revealed the reveal simply continues. Otherwise the
    /// reveal falls back to the longest common prefix and the next tick is a rewrite.
    pub fn set_target(&mut self, target: &str) {
        if !target.starts_with(self.revealed()) {
            self.shown = common_prefix_len(self.revealed(), target);
            self.rewrite = true;
        }
        self.target.clear();
        self.target.push_str(target);
    }

    /// Advances the reveal by one tick.
    ///
    /// Returns `None` when there is nothing new to show.
    pub fn tick(&mut self) -> Option<Reveal<'_>> {
        let start = self.shown;
        self.advance(self.units_per_tick);
        if std::mem::take(&mut self.rewrite) {
            return Some(Reveal::Rewrite(&self.target[..self.shown]));
        }
        if start == self.shown {
            return None;
        }
        Some(Reveal::Append(&self.target[start..self.shown]))
    }

    /// Reveals the rest of the target at once.
    pub fn flush(&mut self) -> Option<Reveal<'_>> {
        let start = self.shown;
        self.shown = self.target.len();
        if std::mem::take(&mut self.rewrite) {
            return Some(Reveal::Rewrite(&self.target));
        }
        if start == self.shown {
            return None;
        }
        Some(Reveal::Append(&self.target[start..]))
    }

    /// True when everything in the target has been revealed.
    pub fn is_caught_up(&self) -> bool {
        self.shown == self.target.len() && !self.rewrite
    }

    /// The text revealed so far.
    pub fn revealed(&self) -> &str {
        &self.target[..self.shown]
    }

    fn advance(&mut self, units: usize) {
        let rest = &self.target[self.shown..];
        let step = rest
            .char_indices()
            .nth(units)
            .map(|(idx, _)| idx)
            .unwrap_or(rest.len());
        self.shown += step;
    }
}

fn common_prefix_len(a: &str, b: &str) -> usize {
    a.char_indices()
        .zip(b.chars())
        .find(|((_, ca), cb)| ca != cb)
        .map(|((idx, _), _)| idx)
        .unwrap_or_else(|| a.len().min(b.len()))
}

struct PaceState<S> {
    updates: Pin<Box<S>>,
    typewriter: Typewriter,
    interval: Interval,
    updates_done: bool,
}

/// Turns a stream of composite strings into a stream of paced reveals.
///
/// Each item is the text revealed so far. Updates are taken as soon as they arrive; reveals
/// happen once per `tick`. The stream ends after `updates` ends and the last target is fully
/// revealed.
pub fn pace<S>(updates: S, tick: Duration, units_per_tick: usize) -> impl Stream<Item = String>
where
    S: Stream<Item = String>,
{
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let state = PaceState {
        updates: Box::pin(updates),
        typewriter: Typewriter::new(units_per_tick),
        interval,
        updates_done: false,
    };
    stream::unfold(state, |mut state| async move {
        loop {
            if state.updates_done && state.typewriter.is_caught_up() {
                return None;
            }
            let mut emit = false;
            tokio::select! {
                biased;
                next = state.updates.next(), if !state.updates_done => match next {
                    Some(target) => state.typewriter.set_target(&target),
                    None => state.updates_done = true,
                },
                _ = state.interval.tick() => {
                    emit = state.typewriter.tick().is_some();
                }
            }
            if emit {
                let revealed = state.typewriter.revealed().to_string();
                return Some((revealed, state));
            }
        }
    })
}
