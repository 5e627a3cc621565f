//! Game session for one participant.
//!
//! Bridges the round state machine, the replay history, the drawer's tools and
//! the renderer. Every trigger, local or remote, goes through [`GameSession::apply`]
//! so all participants run identical logic. Envelopes to send are queued and
//! must be collected with [`GameSession::take_outgoing`].
//!
//! ## Catch-up
//!
//! A joiner's transport announces it with `hello`. The current drawer answers
//! with a directed `state_snapshot` holding the round and its history, and the
//! joiner replays that history through the same handler used for live events.

use std::time::Instant;

use kurbo::Point;

use crate::canvas::Renderer;
use crate::history::EventHistory;
use crate::input::{CommandError, UserCommand, parse_command};
use crate::protocol::{Envelope, ParticipantId, RoundCommand};
use crate::round::{Phase, PromptPicker, RandomPrompts, RoundState, TimerEvent};
use crate::tools::{BrushKind, ShapeMode, ToolManager};

/// One participant's view of the game.
pub struct GameSession<R: Renderer> {
    id: ParticipantId,
    round: RoundState,
    history: EventHistory,
    tools: ToolManager,
    prompts: Box<dyn PromptPicker + Send>,
    renderer: R,
    /// Pending outgoing envelopes.
    outgoing: Vec<Envelope>,
}

impl<R: Renderer> GameSession<R> {
    /// Create a session with random prompts.
    pub fn new(id: ParticipantId, renderer: R) -> Self {
        Self::with_prompts(id, renderer, RandomPrompts)
    }

    /// Create a session drawing prompts from `prompts`.
    pub fn with_prompts(
        id: ParticipantId,
        renderer: R,
        prompts: impl PromptPicker + Send + 'static,
    ) -> Self {
        let mut session = Self {
            round: RoundState::new(id.clone()),
            id,
            history: EventHistory::new(),
            tools: ToolManager::new(),
            prompts: Box::new(prompts),
            renderer,
            outgoing: Vec::new(),
        };
        session.refresh_banner();
        session
    }

    pub fn id(&self) -> &ParticipantId {
        &self.id
    }

    pub fn round(&self) -> &RoundState {
        &self.round
    }

    pub fn history(&self) -> &EventHistory {
        &self.history
    }

    pub fn tools(&self) -> &ToolManager {
        &self.tools
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    /// Take pending outgoing envelopes (drains the queue).
    pub fn take_outgoing(&mut self) -> Vec<Envelope> {
        std::mem::take(&mut self.outgoing)
    }

    /// Check if there are pending outgoing envelopes.
    pub fn has_outgoing(&self) -> bool {
        !self.outgoing.is_empty()
    }

    // --- Local commands ---

    /// Parse and run a normalized command string.
    pub fn handle_input(&mut self, raw: &str, now: Instant) -> Result<(), CommandError> {
        let command = parse_command(raw)?;
        self.handle_command(command, now);
        Ok(())
    }

    /// Run a local command. Commands the local participant may not issue
    /// right now are ignored.
    pub fn handle_command(&mut self, command: UserCommand, now: Instant) {
        match command {
            UserCommand::Start => self.start(now),
            UserCommand::Stop => self.stop(now),
            UserCommand::Guess(word) => self.guess(word),
            UserCommand::ChangeBrush(kind) => {
                if self.round.is_drawer() {
                    self.tools.brush.kind = kind;
                    self.refresh_banner();
                }
            }
            UserCommand::ChangeColour(colour) => {
                if self.round.is_drawer() {
                    self.tools.brush.colour = colour;
                }
            }
            UserCommand::Eraser => {
                if self.round.is_drawer() {
                    self.tools.brush.kind = BrushKind::Eraser;
                    if self.round.round_open() && !self.round.drawing_enabled() {
                        self.broadcast_command(RoundCommand::Start, now);
                    }
                    self.refresh_banner();
                }
            }
            UserCommand::Shape(mode) => self.toggle_shape(mode, now),
            UserCommand::Place => self.place_shape(),
        }
    }

    fn start(&mut self, now: Instant) {
        if !self.round.is_drawer() {
            log::debug!("Ignoring START: not the drawer");
            return;
        }
        if !self.round.game_started() {
            let prompt = self.prompts.pick();
            let envelope = Envelope::StartRound {
                drawer_id: self.id.clone(),
                prompt,
            };
            self.apply(&envelope, now);
            self.outgoing.push(envelope);
        } else if self.round.round_open() {
            self.broadcast_command(RoundCommand::Start, now);
        } else {
            log::debug!("Ignoring START: round already won");
        }
    }

    fn stop(&mut self, now: Instant) {
        if !self.round.is_drawer() || !self.round.game_started() {
            log::debug!("Ignoring STOP: not drawing");
            return;
        }
        self.broadcast_command(RoundCommand::Stop, now);
    }

    fn guess(&mut self, word: String) {
        if self.round.is_drawer() {
            log::debug!("Ignoring guess '{}': the drawer cannot guess", word);
            return;
        }
        self.outgoing.push(Envelope::Guess {
            id: self.id.clone(),
            guess: word,
        });
    }

    fn toggle_shape(&mut self, mode: ShapeMode, now: Instant) {
        if !self.round.is_drawer() || !self.round.round_open() {
            return;
        }
        match self.tools.shape_mode() {
            Some(active) if active == mode => self.place_shape(),
            active => {
                if active.is_some() {
                    self.place_shape();
                }
                if self.round.drawing_enabled() {
                    self.broadcast_command(RoundCommand::Stop, now);
                }
                self.tools.enter_shape_mode(mode);
                self.refresh_banner();
            }
        }
    }

    fn place_shape(&mut self) {
        if !self.round.is_drawer() || !self.round.round_open() {
            return;
        }
        if let Some(envelope) = self.tools.finalize() {
            self.emit_drawing(envelope);
        }
        self.refresh_banner();
    }

    // --- Pointer input ---

    /// Move the local pointer. With `pen_down` the drawer's brush paints from
    /// the previous position; otherwise the stroke ends.
    pub fn pointer_moved(&mut self, at: Point, pen_down: bool) {
        self.outgoing.push(Envelope::Cursor {
            id: self.id.clone(),
            coords: vec![at.x, at.y],
        });

        if !pen_down {
            self.tools.lift();
            return;
        }
        if !self.round.is_drawer() || !self.round.drawing_enabled() {
            return;
        }
        if let Some(envelope) = self.tools.stroke_to(at) {
            self.emit_drawing(envelope);
        }
    }

    /// End the current stroke.
    pub fn pointer_lifted(&mut self) {
        self.tools.lift();
    }

    /// Size the active square or circle between two corners.
    /// Returns true if a preview was sent.
    pub fn shape_dragged(&mut self, a: Point, b: Point) -> bool {
        if !self.round.is_drawer() || !self.round.round_open() {
            return false;
        }
        match self.tools.preview(a, b) {
            Some(envelope) => {
                self.emit_drawing(envelope);
                true
            }
            None => false,
        }
    }

    /// Broadcast a drawing envelope produced outside the session (e.g. by the
    /// brush engine). Returns false if the local participant may not draw.
    pub fn broadcast_drawing(&mut self, envelope: Envelope) -> bool {
        let shape_kind = matches!(
            envelope,
            Envelope::SquarePreview { .. }
                | Envelope::SquareFinalize { .. }
                | Envelope::CirclePreview { .. }
                | Envelope::CircleFinalize { .. }
        );
        let allowed = self.round.is_drawer()
            && self.round.round_open()
            && envelope.is_drawing()
            && (self.round.drawing_enabled() || (shape_kind && self.tools.shape_mode().is_some()));
        if !allowed {
            log::debug!("Ignoring {}: drawing not permitted", envelope.kind());
            return false;
        }
        self.emit_drawing(envelope);
        true
    }

    fn emit_drawing(&mut self, envelope: Envelope) {
        self.renderer.render_event(&envelope);
        self.broadcast(envelope);
    }

    fn broadcast_command(&mut self, command: RoundCommand, now: Instant) {
        let envelope = Envelope::Command { command };
        self.apply(&envelope, now);
        self.broadcast(envelope);
    }

    /// Queue a broadcast, recording it for late joiners if we are the drawer.
    fn broadcast(&mut self, envelope: Envelope) {
        if self.round.is_drawer() {
            self.history.record(&envelope);
        }
        self.outgoing.push(envelope);
    }

    // --- Inbound envelopes and timers ---

    /// Apply an envelope received from the hub.
    pub fn handle_envelope(&mut self, envelope: Envelope, now: Instant) {
        self.apply(&envelope, now);
    }

    /// Fire due timers. Call this from the control loop every tick.
    pub fn tick(&mut self, now: Instant) {
        for event in self.round.tick(now) {
            match event {
                TimerEvent::PromptHidden => {
                    log::debug!("Prompt hidden: drawing never started");
                    self.refresh_banner();
                }
                TimerEvent::RotationDue { winner } => {
                    let prompt = self.prompts.pick();
                    let envelope = Envelope::StartRound {
                        drawer_id: winner,
                        prompt,
                    };
                    self.apply(&envelope, now);
                    self.outgoing.push(envelope);
                }
            }
        }
    }

    /// The single event handler shared by live events, local commands and
    /// catch-up replay.
    fn apply(&mut self, envelope: &Envelope, now: Instant) {
        match envelope {
            Envelope::Hello { id } => self.answer_hello(id),
            Envelope::StateSnapshot { to, drawer, prompt, history, game_started, round_active } => {
                if *to != self.id {
                    log::debug!("Ignoring snapshot addressed to {}", to);
                    return;
                }
                self.catch_up(
                    drawer.clone(),
                    prompt.clone(),
                    history,
                    *game_started,
                    *round_active,
                    now,
                );
            }
            Envelope::StartRound { drawer_id, prompt } => {
                self.begin_round(drawer_id.clone(), prompt.clone(), now);
            }
            Envelope::Command { command: RoundCommand::Start } => {
                if self.round.enable_drawing(now) {
                    self.refresh_banner();
                }
            }
            Envelope::Command { command: RoundCommand::Stop } => {
                if self.round.disable_drawing(now) {
                    self.tools.cancel_shape_mode();
                    self.refresh_banner();
                }
            }
            Envelope::Guess { id, guess } => self.judge_guess(id, guess, now),
            Envelope::CorrectGuess { winner_id, prompt } => {
                if !prompt.eq_ignore_ascii_case(self.round.current_prompt()) {
                    log::debug!("Ignoring correct_guess for stale prompt '{}'", prompt);
                    return;
                }
                if self.round.record_win(winner_id.clone(), now) {
                    log::info!("{} guessed '{}'; rotating drawer", winner_id, prompt);
                }
                self.tools.cancel_shape_mode();
                self.refresh_banner();
            }
            Envelope::Cursor { id, .. } => {
                if *id != self.id {
                    self.renderer.render_event(envelope);
                }
            }
            Envelope::Line { .. }
            | Envelope::Air { .. }
            | Envelope::Texture { .. }
            | Envelope::Calligraphy { .. }
            | Envelope::Blending { .. }
            | Envelope::Shining { .. }
            | Envelope::Eraser { .. }
            | Envelope::SquarePreview { .. }
            | Envelope::SquareFinalize { .. }
            | Envelope::CirclePreview { .. }
            | Envelope::CircleFinalize { .. } => self.renderer.render_event(envelope),
            Envelope::Unknown => log::debug!("Ignoring envelope of unknown type"),
        }
    }

    fn begin_round(&mut self, drawer: ParticipantId, prompt: String, now: Instant) {
        log::info!("New round: drawer {}", drawer);
        self.round.begin_round(drawer, prompt, now);
        self.history.clear();
        self.tools.reset();
        self.renderer.clear_canvas();
        self.refresh_banner();
    }

    /// Only a drawer with a running game answers; everyone else stays quiet.
    fn answer_hello(&mut self, joiner: &ParticipantId) {
        if *joiner == self.id {
            return;
        }
        if !self.round.is_drawer() || !self.round.game_started() {
            log::debug!("Not answering hello from {}", joiner);
            return;
        }
        log::info!(
            "Sending catch-up to {} ({} events)",
            joiner, self.history.len()
        );
        self.outgoing.push(Envelope::StateSnapshot {
            to: joiner.clone(),
            drawer: self.id.clone(),
            prompt: self.round.current_prompt().to_string(),
            history: self.history.events().to_vec(),
            game_started: self.round.game_started(),
            round_active: self.round.round_active(),
        });
    }

    fn catch_up(
        &mut self,
        drawer: ParticipantId,
        prompt: String,
        history: &[Envelope],
        game_started: bool,
        round_active: bool,
        now: Instant,
    ) {
        log::info!("Catching up: drawer {}, {} events", drawer, history.len());
        self.renderer.clear_canvas();
        self.history.clear();
        self.tools.reset();
        self.round.adopt_snapshot(drawer, prompt, game_started, round_active, now);

        for envelope in history.iter().filter(|e| e.is_durable()) {
            self.apply(envelope, now);
        }
        if self.round.is_drawer() {
            self.history.restore(history);
        }
        self.refresh_banner();
    }

    fn judge_guess(&mut self, guesser: &ParticipantId, guess: &str, now: Instant) {
        if *guesser == self.id || !self.round.is_drawer() {
            return;
        }
        if !self.round.round_open() {
            log::debug!("Ignoring guess '{}' from {}: round closed", guess, guesser);
            return;
        }
        if self.round.judge(guess) {
            let envelope = Envelope::CorrectGuess {
                winner_id: guesser.clone(),
                prompt: self.round.current_prompt().to_string(),
            };
            self.apply(&envelope, now);
            self.broadcast(envelope);
        } else {
            log::info!("Wrong guess '{}' from {}", guess, guesser);
            let text = format!("{}\n'{}' is wrong.", self.banner_text(), guess);
            self.renderer.show_banner(&text);
        }
    }

    // --- Banner ---

    /// Instruction text for the local participant.
    pub fn banner_text(&self) -> String {
        let round = &self.round;
        let prompt = round.current_prompt();
        let prompt_line = format!("Draw: {}", prompt);

        match round.phase() {
            Phase::NotStarted => {
                if round.is_drawer() {
                    "Say 'START' to start the game.".to_string()
                } else {
                    "Waiting for the game to start.".to_string()
                }
            }
            Phase::RoundWon => match round.pending_next_drawer() {
                Some(winner) if *winner == self.id => {
                    format!("You guessed it! It was {}.", prompt)
                }
                Some(winner) => format!("{} guessed it! It was {}.", winner, prompt),
                None => format!("Round over. It was {}.", prompt),
            },
            _ if !round.is_drawer() => {
                "Opponent is drawing. Say 'MY GUESS IS ...' to guess!".to_string()
            }
            Phase::Drawing => {
                let mut lines = Vec::new();
                if round.prompt_visible() {
                    lines.push(prompt_line);
                }
                lines.push(format!(
                    "Brush: {}. Say 'STOP' to stop drawing.",
                    self.tools.brush.kind
                ));
                lines.join("\n")
            }
            Phase::PromptShown => {
                let mut lines = Vec::new();
                if round.prompt_visible() {
                    lines.push(prompt_line);
                }
                match self.tools.shape_mode() {
                    Some(mode) => lines.push(format!(
                        "{} mode ON. Say '{}' again or 'PLACE' to finalise.",
                        mode.name(),
                        mode.name().to_uppercase()
                    )),
                    None => lines.push("Say 'START' to begin.".to_string()),
                }
                lines.join("\n")
            }
        }
    }

    fn refresh_banner(&mut self) {
        let text = self.banner_text();
        self.renderer.show_banner(&text);
    }
}
