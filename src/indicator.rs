use crate::character::{Glyph, GlyphSet, PetCharacter};
use crate::engine::{EngineEvent, TickOutcome};
use log::debug;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};

/// Time between nudge frame toggles.
pub const NUDGE_FRAME_INTERVAL: Duration = Duration::from_millis(600);
/// Toggles per nudge before falling back to idle (about six seconds).
pub const NUDGE_TOGGLES: u8 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorState {
    Idle,
    Watching,
    /// `toggles` counts frame flips already shown since the nudge began.
    Nudging { toggles: u8 },
}

/// Decides which glyph the menu bar shows.
///
/// A fire always (re)starts the nudge. While nudging, "approaching" is
/// ignored; once the countdown runs out the indicator drops to idle and the
/// next tick decides whether to watch again.
#[derive(Debug, Clone)]
pub struct VisualStateMachine {
    state: IndicatorState,
    glyphs: GlyphSet,
    animation_enabled: bool,
}

impl VisualStateMachine {
    pub fn new(character: PetCharacter, animation_enabled: bool) -> Self {
        Self {
            state: IndicatorState::Idle,
            glyphs: character.glyphs(),
            animation_enabled,
        }
    }

    pub fn state(&self) -> IndicatorState {
        self.state
    }

    pub fn is_nudging(&self) -> bool {
        matches!(self.state, IndicatorState::Nudging { .. })
    }

    pub fn glyph(&self) -> Glyph {
        match self.state {
            IndicatorState::Idle => self.glyphs.idle,
            IndicatorState::Watching => self.glyphs.watching,
            IndicatorState::Nudging { toggles } => {
                self.glyphs.nudge_frames[usize::from(toggles) % self.glyphs.nudge_frames.len()]
            }
        }
    }

    pub fn apply_tick(&mut self, outcome: &TickOutcome) -> Option<Glyph> {
        self.on_tick(!outcome.fired.is_empty(), outcome.any_approaching)
    }

    /// Returns the glyph to show when the state changed.
    pub fn on_tick(&mut self, any_fired: bool, any_approaching: bool) -> Option<Glyph> {
        if any_fired && self.animation_enabled {
            self.state = IndicatorState::Nudging { toggles: 0 };
            return Some(self.glyph());
        }

        if self.is_nudging() {
            return None;
        }

        let next = if any_approaching {
            IndicatorState::Watching
        } else {
            IndicatorState::Idle
        };
        self.transition(next)
    }

    /// One animation step. No-op unless nudging.
    pub fn advance_frame(&mut self) -> Option<Glyph> {
        let IndicatorState::Nudging { toggles } = self.state else {
            return None;
        };

        let toggles = toggles.saturating_add(1);
        self.state = if toggles >= NUDGE_TOGGLES {
            IndicatorState::Idle
        } else {
            IndicatorState::Nudging { toggles }
        };
        Some(self.glyph())
    }

    /// Swaps the glyph set; the current state is kept.
    pub fn set_character(&mut self, character: PetCharacter) -> Glyph {
        self.glyphs = character.glyphs();
        self.glyph()
    }

    pub fn set_animation_enabled(&mut self, enabled: bool) {
        self.animation_enabled = enabled;
    }

    /// Cuts a running nudge short, e.g. when the user opens the menu.
    pub fn dismiss(&mut self) -> Option<Glyph> {
        if !self.is_nudging() {
            return None;
        }
        self.transition(IndicatorState::Idle)
    }

    fn transition(&mut self, next: IndicatorState) -> Option<Glyph> {
        if self.state == next {
            return None;
        }
        self.state = next;
        Some(self.glyph())
    }
}

pub trait IndicatorSink: Send + 'static {
    fn set_indicator_glyph(&self, glyph: Glyph);
}

impl<F> IndicatorSink for F
where
    F: Fn(Glyph) + Send + 'static,
{
    fn set_indicator_glyph(&self, glyph: Glyph) {
        self(glyph)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorCommand {
    SetCharacter(PetCharacter),
    SetAnimationEnabled(bool),
    Dismiss,
}

/// Drives a [`VisualStateMachine`] from engine events and a frame timer that
/// only runs while nudging. Ends when the engine event channel closes.
pub fn spawn_indicator_driver(
    mut machine: VisualStateMachine,
    mut events: mpsc::UnboundedReceiver<EngineEvent>,
    mut commands: mpsc::UnboundedReceiver<IndicatorCommand>,
    sink: impl IndicatorSink,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        sink.set_indicator_glyph(machine.glyph());
        let mut frame_deadline: Option<Instant> = None;
        let mut commands_open = true;

        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else {
                        break;
                    };
                    if let EngineEvent::Tick(outcome) = event {
                        if let Some(glyph) = machine.apply_tick(&outcome) {
                            sink.set_indicator_glyph(glyph);
                        }
                        if !outcome.fired.is_empty() && machine.is_nudging() {
                            debug!("nudging for {} fired reminder(s)", outcome.fired.len());
                            frame_deadline = Some(Instant::now() + NUDGE_FRAME_INTERVAL);
                        }
                    }
                }
                command = commands.recv(), if commands_open => {
                    match command {
                        Some(IndicatorCommand::SetCharacter(character)) => {
                            sink.set_indicator_glyph(machine.set_character(character));
                        }
                        Some(IndicatorCommand::SetAnimationEnabled(enabled)) => {
                            machine.set_animation_enabled(enabled);
                        }
                        Some(IndicatorCommand::Dismiss) => {
                            if let Some(glyph) = machine.dismiss() {
                                sink.set_indicator_glyph(glyph);
                            }
                            frame_deadline = None;
                        }
                        None => commands_open = false,
                    }
                }
                _ = wait_for_frame(frame_deadline), if frame_deadline.is_some() => {
                    if let Some(glyph) = machine.advance_frame() {
                        sink.set_indicator_glyph(glyph);
                    }
                    frame_deadline = if machine.is_nudging() {
                        frame_deadline.map(|deadline| deadline + NUDGE_FRAME_INTERVAL)
                    } else {
                        None
                    };
                }
            }
        }
    })
}

async fn wait_for_frame(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
