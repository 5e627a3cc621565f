//! Round and turn state.
//!
//! Every participant holds its own [`RoundState`] and drives it with the same
//! transitions whether the trigger was local or arrived over the network.
//! Nothing here reads a clock: callers pass `now` in and call
//! [`RoundState::tick`] from their control loop to fire due timers.

use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::protocol::ParticipantId;

/// Delay between a correct guess and the winner's round starting.
pub const ROTATION_DELAY: Duration = Duration::from_millis(5000);

/// How long the drawer sees the prompt before drawing must have begun.
pub const PROMPT_VISIBLE_FOR: Duration = Duration::from_secs(10);

/// Words a drawer can be asked to draw.
pub const PROMPTS: &[&str] = &[
    "Dog", "Fish", "Bird", "House", "Star", "Heart", "Cloud", "Flower", "Apple", "Boat", "Cup",
    "Key", "Book", "Moon",
];

/// Source of prompt words for new rounds.
pub trait PromptPicker {
    fn pick(&mut self) -> String;
}

/// Uniform random choice from [`PROMPTS`].
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomPrompts;

impl PromptPicker for RandomPrompts {
    fn pick(&mut self) -> String {
        let index = (Uuid::new_v4().as_u128() % PROMPTS.len() as u128) as usize;
        PROMPTS[index].to_string()
    }
}

/// Cycles through a fixed word list. Useful for scripted sessions and tests.
#[derive(Debug, Clone)]
pub struct FixedPrompts {
    words: Vec<String>,
    next: usize,
}

impl FixedPrompts {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let words: Vec<String> = words.into_iter().map(Into::into).collect();
        Self { words, next: 0 }
    }
}

impl PromptPicker for FixedPrompts {
    fn pick(&mut self) -> String {
        if self.words.is_empty() {
            return RandomPrompts.pick();
        }
        let word = self.words[self.next % self.words.len()].clone();
        self.next += 1;
        word
    }
}

/// Coarse phase derived from the round flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    NotStarted,
    PromptShown,
    Drawing,
    RoundWon,
}

/// Cancellable one-shot timer. Dropping the handle cancels it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerHandle {
    deadline: Instant,
}

impl TimerHandle {
    fn arm(now: Instant, delay: Duration) -> Self {
        Self {
            deadline: now + delay,
        }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    fn is_due(&self, now: Instant) -> bool {
        now >= self.deadline
    }
}

/// A committed drawer rotation waiting for its delay to elapse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRotation {
    pub winner: ParticipantId,
    pub due: Instant,
}

/// A timer that fired during [`RoundState::tick`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerEvent {
    /// The prompt was hidden because drawing never began.
    PromptHidden,
    /// The winner's round should start now.
    RotationDue { winner: ParticipantId },
}

/// Per-participant view of the current round.
#[derive(Debug, Clone)]
pub struct RoundState {
    local_id: ParticipantId,
    current_drawer: ParticipantId,
    current_prompt: String,
    game_started: bool,
    round_active: bool,
    prompt_visible: bool,
    drawing_enabled: bool,
    pending_next_drawer: Option<ParticipantId>,
    prompt_timer: Option<TimerHandle>,
    /// Only set on the drawer that judged the winning guess.
    rotation: Option<PendingRotation>,
}

impl RoundState {
    /// Fresh state with the local participant as drawer and no game running.
    pub fn new(local_id: ParticipantId) -> Self {
        Self {
            current_drawer: local_id.clone(),
            local_id,
            current_prompt: String::new(),
            game_started: false,
            round_active: false,
            prompt_visible: false,
            drawing_enabled: false,
            pending_next_drawer: None,
            prompt_timer: None,
            rotation: None,
        }
    }

    pub fn local_id(&self) -> &ParticipantId {
        &self.local_id
    }

    pub fn current_drawer(&self) -> &ParticipantId {
        &self.current_drawer
    }

    pub fn current_prompt(&self) -> &str {
        &self.current_prompt
    }

    pub fn game_started(&self) -> bool {
        self.game_started
    }

    pub fn round_active(&self) -> bool {
        self.round_active
    }

    pub fn prompt_visible(&self) -> bool {
        self.prompt_visible
    }

    pub fn drawing_enabled(&self) -> bool {
        self.drawing_enabled
    }

    pub fn pending_next_drawer(&self) -> Option<&ParticipantId> {
        self.pending_next_drawer.as_ref()
    }

    pub fn pending_rotation(&self) -> Option<&PendingRotation> {
        self.rotation.as_ref()
    }

    pub fn prompt_timer(&self) -> Option<&TimerHandle> {
        self.prompt_timer.as_ref()
    }

    pub fn is_drawer(&self) -> bool {
        self.current_drawer == self.local_id
    }

    /// Whether a round is running and still accepting guesses.
    pub fn round_open(&self) -> bool {
        self.game_started && self.round_active
    }

    pub fn phase(&self) -> Phase {
        if !self.game_started {
            Phase::NotStarted
        } else if !self.round_active {
            Phase::RoundWon
        } else if self.drawing_enabled {
            Phase::Drawing
        } else {
            Phase::PromptShown
        }
    }

    /// Adopt a new round (`start_round`).
    pub fn begin_round(&mut self, drawer: ParticipantId, prompt: String, now: Instant) {
        self.current_drawer = drawer;
        self.current_prompt = prompt;
        self.game_started = true;
        self.round_active = true;
        self.drawing_enabled = false;
        self.pending_next_drawer = None;
        self.rotation = None;
        self.prompt_visible = self.is_drawer();
        self.rearm_prompt_timer(now);
    }

    /// Adopt the round described by a catch-up snapshot.
    pub fn adopt_snapshot(
        &mut self,
        drawer: ParticipantId,
        prompt: String,
        game_started: bool,
        round_active: bool,
        now: Instant,
    ) {
        self.current_drawer = drawer;
        self.current_prompt = prompt;
        self.game_started = game_started;
        self.round_active = round_active;
        self.drawing_enabled = false;
        self.pending_next_drawer = None;
        self.rotation = None;
        self.prompt_visible = self.is_drawer() && game_started;
        self.rearm_prompt_timer(now);
    }

    /// `START` within a running round. Returns false if no round is open.
    pub fn enable_drawing(&mut self, now: Instant) -> bool {
        if !self.round_open() {
            return false;
        }
        self.drawing_enabled = true;
        self.prompt_visible = self.is_drawer();
        self.rearm_prompt_timer(now);
        true
    }

    /// `STOP`. Returns false if there was no game to stop.
    pub fn disable_drawing(&mut self, now: Instant) -> bool {
        if !self.game_started {
            return false;
        }
        self.drawing_enabled = false;
        self.rearm_prompt_timer(now);
        true
    }

    /// Whether `guess` wins the current round, judged by the drawer only.
    pub fn judge(&self, guess: &str) -> bool {
        self.is_drawer()
            && self.round_open()
            && guess.trim().to_lowercase() == self.current_prompt.to_lowercase()
    }

    /// Apply `correct_guess`. The drawer also commits to a rotation at
    /// `now + ROTATION_DELAY`; returns true if that happened.
    pub fn record_win(&mut self, winner: ParticipantId, now: Instant) -> bool {
        self.round_active = false;
        self.drawing_enabled = false;
        self.prompt_timer = None;
        self.pending_next_drawer = Some(winner.clone());

        if self.is_drawer() && self.rotation.is_none() {
            self.rotation = Some(PendingRotation {
                winner,
                due: now + ROTATION_DELAY,
            });
            return true;
        }
        false
    }

    /// Fire every timer that is due at `now`.
    pub fn tick(&mut self, now: Instant) -> Vec<TimerEvent> {
        let mut fired = Vec::new();

        if self.prompt_timer.is_some_and(|t| t.is_due(now)) {
            self.prompt_timer = None;
            if !self.drawing_enabled && self.prompt_visible {
                self.prompt_visible = false;
                fired.push(TimerEvent::PromptHidden);
            }
        }

        if self.rotation.as_ref().is_some_and(|r| now >= r.due) {
            if let Some(rotation) = self.rotation.take() {
                fired.push(TimerEvent::RotationDue {
                    winner: rotation.winner,
                });
            }
        }

        fired
    }

    /// Dispose of the current prompt timer and arm a fresh one if we are the
    /// drawer of a running round.
    fn rearm_prompt_timer(&mut self, now: Instant) {
        self.prompt_timer = None;
        if self.is_drawer() && self.round_open() {
            self.prompt_timer = Some(TimerHandle::arm(now, PROMPT_VISIBLE_FOR));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn me() -> ParticipantId {
        ParticipantId::from("me")
    }

    fn other() -> ParticipantId {
        ParticipantId::from("other")
    }

    #[test]
    fn test_new_state_is_not_started_with_self_as_drawer() {
        let state = RoundState::new(me());
        assert!(state.is_drawer());
        assert_eq!(state.phase(), Phase::NotStarted);
        assert!(!state.drawing_enabled());
        assert!(state.prompt_timer().is_none());
    }

    #[test]
    fn test_begin_round_as_drawer() {
        let now = Instant::now();
        let mut state = RoundState::new(me());
        state.begin_round(me(), "Dog".into(), now);

        assert_eq!(state.phase(), Phase::PromptShown);
        assert!(state.prompt_visible());
        assert_eq!(
            state.prompt_timer().unwrap().deadline(),
            now + PROMPT_VISIBLE_FOR
        );
    }

    #[test]
    fn test_begin_round_as_guesser() {
        let now = Instant::now();
        let mut state = RoundState::new(me());
        state.begin_round(other(), "Dog".into(), now);

        assert!(!state.is_drawer());
        assert!(!state.prompt_visible());
        assert!(state.prompt_timer().is_none());
        assert_eq!(state.current_prompt(), "Dog");
    }

    #[test]
    fn test_enable_drawing_requires_open_round() {
        let now = Instant::now();
        let mut state = RoundState::new(me());
        assert!(!state.enable_drawing(now));
        assert_eq!(state.phase(), Phase::NotStarted);

        state.begin_round(me(), "Dog".into(), now);
        assert!(state.enable_drawing(now));
        assert_eq!(state.phase(), Phase::Drawing);

        assert!(state.disable_drawing(now));
        assert_eq!(state.phase(), Phase::PromptShown);
    }

    #[test]
    fn test_prompt_hidden_when_drawing_never_starts() {
        let now = Instant::now();
        let mut state = RoundState::new(me());
        state.begin_round(me(), "Dog".into(), now);

        assert!(state.tick(now + Duration::from_secs(9)).is_empty());
        assert!(state.prompt_visible());

        let fired = state.tick(now + PROMPT_VISIBLE_FOR);
        assert_eq!(fired, vec![TimerEvent::PromptHidden]);
        assert!(!state.prompt_visible());
        assert!(state.prompt_timer().is_none());
    }

    #[test]
    fn test_prompt_stays_while_drawing() {
        let now = Instant::now();
        let mut state = RoundState::new(me());
        state.begin_round(me(), "Dog".into(), now);
        state.enable_drawing(now + Duration::from_secs(1));

        assert!(state.tick(now + Duration::from_secs(30)).is_empty());
        assert!(state.prompt_visible());
    }

    #[test]
    fn test_rearm_replaces_stale_timer() {
        let now = Instant::now();
        let mut state = RoundState::new(me());
        state.begin_round(me(), "Dog".into(), now);
        let later = now + Duration::from_secs(8);
        state.enable_drawing(later);
        state.disable_drawing(later);

        // the timer armed at `now` would have fired here
        assert!(state.tick(now + PROMPT_VISIBLE_FOR).is_empty());
        assert!(state.prompt_visible());
        assert_eq!(
            state.tick(later + PROMPT_VISIBLE_FOR),
            vec![TimerEvent::PromptHidden]
        );
    }

    #[test]
    fn test_judge_is_case_insensitive_and_drawer_only() {
        let now = Instant::now();
        let mut drawer = RoundState::new(me());
        drawer.begin_round(me(), "Dog".into(), now);
        assert!(drawer.judge("dog"));
        assert!(drawer.judge(" DOG "));
        assert!(!drawer.judge("dogs"));

        let mut guesser = RoundState::new(other());
        guesser.begin_round(me(), "Dog".into(), now);
        assert!(!guesser.judge("dog"));
    }

    #[test]
    fn test_record_win_schedules_one_rotation_on_drawer() {
        let now = Instant::now();
        let mut state = RoundState::new(me());
        state.begin_round(me(), "Dog".into(), now);
        state.enable_drawing(now);

        assert!(state.record_win(other(), now));
        assert!(!state.record_win(other(), now + Duration::from_millis(10)));
        assert_eq!(state.phase(), Phase::RoundWon);
        assert!(!state.judge("dog"));
        assert_eq!(state.pending_next_drawer(), Some(&other()));

        assert!(
            state
                .tick(now + ROTATION_DELAY - Duration::from_millis(1))
                .is_empty()
        );
        assert_eq!(
            state.tick(now + ROTATION_DELAY),
            vec![TimerEvent::RotationDue { winner: other() }]
        );
        assert!(state.tick(now + ROTATION_DELAY * 2).is_empty());
    }

    #[test]
    fn test_record_win_on_guesser_schedules_nothing() {
        let now = Instant::now();
        let mut state = RoundState::new(me());
        state.begin_round(other(), "Dog".into(), now);
        assert!(!state.record_win(me(), now));
        assert!(state.pending_rotation().is_none());
        assert_eq!(state.pending_next_drawer(), Some(&me()));
    }

    #[test]
    fn test_new_round_clears_pending_winner() {
        let now = Instant::now();
        let mut state = RoundState::new(me());
        state.begin_round(other(), "Dog".into(), now);
        state.record_win(me(), now);
        state.begin_round(me(), "Cup".into(), now + ROTATION_DELAY);

        assert!(state.is_drawer());
        assert!(state.pending_next_drawer().is_none());
        assert_eq!(state.phase(), Phase::PromptShown);
    }

    #[test]
    fn test_fixed_prompts_cycle() {
        let mut prompts = FixedPrompts::new(["Dog", "Cup"]);
        assert_eq!(prompts.pick(), "Dog");
        assert_eq!(prompts.pick(), "Cup");
        assert_eq!(prompts.pick(), "Dog");
    }

    #[test]
    fn test_random_prompts_come_from_list() {
        let mut prompts = RandomPrompts;
        for _ in 0..32 {
            let word = prompts.pick();
            assert!(PROMPTS.contains(&word.as_str()));
        }
    }
}
