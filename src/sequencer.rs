//! Display Sequencer: owns the cursor and the title-card-then-content transition.
//!
//! The sequencer never performs I/O itself. Each operation returns the
//! [`Effect`]s the controller must carry out, and every completion is fed back
//! with the [`TransitionToken`] it was issued under. Completions carrying a
//! superseded token change nothing.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::constants::TITLE_CARD_DURATION;
use crate::error::{NavigationError, ShellError};
use crate::playlist::Playlist;
use crate::shell::CardData;
use crate::state::{CardPhase, SequencerState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavCommand {
    Next,
    Previous,
    Shuffle,
    GoTo(usize),
}

/// Generation of one navigation request. Only the latest one is live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransitionToken(u64);

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    LoadInterstitial { token: TransitionToken },
    SendCardData(CardData),
    StartCardTimer { token: TransitionToken, duration: Duration },
    LoadContent { token: TransitionToken, url: String },
    RecordActivity,
}

pub struct Sequencer {
    playlist: Playlist,
    card_duration: Duration,
    cursor: usize,
    displayed: Option<usize>,
    state: SequencerState,
    card_visible: bool,
    live: Option<TransitionToken>,
    generation: u64,
    rng: StdRng,
}

impl Sequencer {
    pub fn new(playlist: Playlist) -> Self {
        Self::with_rng(playlist, StdRng::seed_from_u64(rand::random()))
    }

    pub fn with_rng(playlist: Playlist, rng: StdRng) -> Self {
        let card_duration = if playlist.config.title_card_duration.is_zero() {
            TITLE_CARD_DURATION
        } else {
            playlist.config.title_card_duration
        };
        Self {
            playlist,
            card_duration,
            cursor: 0,
            displayed: None,
            state: SequencerState::Idle,
            card_visible: false,
            live: None,
            generation: 0,
            rng,
        }
    }

    pub fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Index whose content was last sent to the display.
    pub fn displayed(&self) -> Option<usize> {
        self.displayed
    }

    pub fn state(&self) -> SequencerState {
        self.state
    }

    pub fn is_card_visible(&self) -> bool {
        self.card_visible
    }

    pub fn live_token(&self) -> Option<TransitionToken> {
        self.live
    }

    pub fn navigate(&mut self, command: NavCommand) -> Result<Vec<Effect>, NavigationError> {
        match command {
            NavCommand::Next => self.next(),
            NavCommand::Previous => self.previous(),
            NavCommand::Shuffle => self.shuffle(),
            NavCommand::GoTo(index) => self.go_to(index),
        }
    }

    pub fn go_to(&mut self, index: usize) -> Result<Vec<Effect>, NavigationError> {
        let len = self.non_empty_len()?;
        let project = self
            .playlist
            .get(index)
            .ok_or(NavigationError::OutOfRange { index, len })?;
        if !project.has_url() {
            return Err(NavigationError::InvalidProject { index });
        }

        let title = project.title.clone();

        self.cursor = index;
        let token = self.issue_token();
        info!(index, %title, token = token.0, "showing project");

        let mut effects = vec![Effect::RecordActivity];
        if self.card_visible {
            // Card still up from a superseded transition: refresh it in place.
            self.state = SequencerState::ShowingCard(CardPhase::Holding);
            effects.push(Effect::SendCardData(self.card()));
            effects.push(Effect::StartCardTimer {
                token,
                duration: self.card_duration,
            });
        } else {
            self.state = SequencerState::ShowingCard(CardPhase::Loading);
            effects.push(Effect::LoadInterstitial { token });
        }
        Ok(effects)
    }

    pub fn next(&mut self) -> Result<Vec<Effect>, NavigationError> {
        let len = self.non_empty_len()?;
        self.go_to((self.cursor + 1) % len)
    }

    pub fn previous(&mut self) -> Result<Vec<Effect>, NavigationError> {
        let len = self.non_empty_len()?;
        self.go_to((self.cursor + len - 1) % len)
    }

    pub fn shuffle(&mut self) -> Result<Vec<Effect>, NavigationError> {
        self.shuffle_excluding(self.cursor)
    }

    pub fn shuffle_excluding(&mut self, excluding: usize) -> Result<Vec<Effect>, NavigationError> {
        self.non_empty_len()?;
        let index = self.pick_shuffle(excluding);
        self.go_to(index)
    }

    /// Uniform pick among the showable indices other than `excluding`. Falls
    /// back to `excluding` itself (0 when out of range) when nothing else can
    /// be shown, so a single project redisplays.
    pub fn pick_shuffle(&mut self, excluding: usize) -> usize {
        let candidates: Vec<usize> = self
            .playlist
            .projects
            .iter()
            .enumerate()
            .filter(|(i, p)| *i != excluding && p.has_url())
            .map(|(i, _)| i)
            .collect();
        if candidates.is_empty() {
            return if excluding < self.playlist.len() { excluding } else { 0 };
        }
        candidates[self.rng.random_range(0..candidates.len())]
    }

    pub fn interstitial_loaded(&mut self, token: TransitionToken, result: Result<(), ShellError>) -> Vec<Effect> {
        if !self.is_live(token) || self.state != SequencerState::ShowingCard(CardPhase::Loading) {
            debug!(token = token.0, "ignoring stale title card load");
            return Vec::new();
        }

        match result {
            Ok(()) => {
                self.card_visible = true;
                self.state = SequencerState::ShowingCard(CardPhase::Holding);
                vec![
                    Effect::SendCardData(self.card()),
                    Effect::StartCardTimer {
                        token,
                        duration: self.card_duration,
                    },
                ]
            }
            Err(e) => {
                warn!(token = token.0, "title card failed, skipping to content: {e}");
                self.begin_content(token)
            }
        }
    }

    pub fn card_elapsed(&mut self, token: TransitionToken) -> Vec<Effect> {
        if !self.is_live(token) || self.state != SequencerState::ShowingCard(CardPhase::Holding) {
            debug!(token = token.0, "ignoring stale title card timer");
            return Vec::new();
        }
        self.card_visible = false;
        self.begin_content(token)
    }

    pub fn content_loaded(&mut self, token: TransitionToken, result: Result<(), ShellError>) {
        if !self.is_live(token) || self.state != SequencerState::ShowingContent {
            debug!(token = token.0, "ignoring stale content load");
            return;
        }
        self.state = SequencerState::Idle;
        match result {
            Ok(()) => debug!(index = self.cursor, "content loaded"),
            Err(e) => warn!(index = self.cursor, "content failed to load: {e}"),
        }
    }

    fn begin_content(&mut self, token: TransitionToken) -> Vec<Effect> {
        self.state = SequencerState::ShowingContent;
        self.displayed = Some(self.cursor);
        let url = self.playlist.projects[self.cursor].url.clone();
        vec![Effect::LoadContent { token, url }]
    }

    fn card(&self) -> CardData {
        let config = &self.playlist.config;
        CardData::new(
            &self.playlist.projects[self.cursor],
            self.cursor,
            self.playlist.len(),
            &config.background_color,
            config.background_image.as_deref(),
        )
    }

    fn issue_token(&mut self) -> TransitionToken {
        self.generation += 1;
        let token = TransitionToken(self.generation);
        self.live = Some(token);
        token
    }

    fn is_live(&self, token: TransitionToken) -> bool {
        self.live == Some(token)
    }

    fn non_empty_len(&self) -> Result<usize, NavigationError> {
        match self.playlist.len() {
            0 => Err(NavigationError::EmptyPlaylist),
            len => Ok(len),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::playlist::Project;
    use proptest::prelude::*;

    fn playlist(n: usize) -> Playlist {
        let projects = (0..n)
            .map(|i| Project::new(format!("Project {i}"), "Someone", format!("https://p{i}.example")))
            .collect();
        Playlist { config: Config::default(), projects }
    }

    fn sequencer(n: usize) -> Sequencer {
        Sequencer::with_rng(playlist(n), StdRng::seed_from_u64(7))
    }

    fn token_of(effects: &[Effect]) -> TransitionToken {
        effects
            .iter()
            .find_map(|e| match e {
                Effect::LoadInterstitial { token }
                | Effect::StartCardTimer { token, .. }
                | Effect::LoadContent { token, .. } => Some(*token),
                _ => None,
            })
            .expect("no token in effects")
    }

    fn content_url(effects: &[Effect]) -> Option<&str> {
        effects.iter().find_map(|e| match e {
            Effect::LoadContent { url, .. } => Some(url.as_str()),
            _ => None,
        })
    }

    /// Drives a transition from request to settled content.
    fn complete(seq: &mut Sequencer, effects: Vec<Effect>) {
        let token = token_of(&effects);
        if effects.iter().any(|e| matches!(e, Effect::LoadInterstitial { .. })) {
            seq.interstitial_loaded(token, Ok(()));
        }
        let loads = seq.card_elapsed(token);
        assert!(content_url(&loads).is_some());
        seq.content_loaded(token, Ok(()));
    }

    #[test]
    fn go_to_runs_card_then_content() {
        let mut seq = sequencer(3);
        let effects = seq.go_to(2).unwrap();
        let token = token_of(&effects);
        assert_eq!(effects, vec![Effect::RecordActivity, Effect::LoadInterstitial { token }]);
        assert_eq!(seq.state(), SequencerState::ShowingCard(CardPhase::Loading));
        assert_eq!(seq.cursor(), 2);
        assert_eq!(seq.displayed(), None);

        let effects = seq.interstitial_loaded(token, Ok(()));
        assert!(matches!(&effects[0], Effect::SendCardData(card) if card.title == "Project 2" && card.index == 2));
        assert_eq!(
            effects[1],
            Effect::StartCardTimer {
                token,
                duration: TITLE_CARD_DURATION
            }
        );
        assert!(seq.is_card_visible());

        let effects = seq.card_elapsed(token);
        assert_eq!(content_url(&effects), Some("https://p2.example"));
        assert!(!seq.is_card_visible());
        assert_eq!(seq.displayed(), Some(2));
        assert_eq!(seq.state(), SequencerState::ShowingContent);

        seq.content_loaded(token, Ok(()));
        assert_eq!(seq.state(), SequencerState::Idle);
    }

    #[test]
    fn go_to_twice_ends_in_same_state() {
        let mut seq = sequencer(4);
        let first = seq.go_to(1).unwrap();
        complete(&mut seq, first);
        let (cursor, displayed) = (seq.cursor(), seq.displayed());

        let second = seq.go_to(1).unwrap();
        complete(&mut seq, second);
        assert_eq!(seq.cursor(), cursor);
        assert_eq!(seq.displayed(), displayed);
        assert_eq!(seq.state(), SequencerState::Idle);
    }

    #[test]
    fn superseded_transition_never_loads_content() {
        let mut seq = sequencer(5);
        let first = token_of(&seq.next().unwrap());
        seq.interstitial_loaded(first, Ok(()));

        // Card is up: the second request refreshes it in place.
        let effects = seq.next().unwrap();
        let second = token_of(&effects);
        assert!(!effects.iter().any(|e| matches!(e, Effect::LoadInterstitial { .. })));
        assert!(effects.iter().any(|e| matches!(e, Effect::SendCardData(card) if card.index == 2)));

        assert!(seq.card_elapsed(first).is_empty());
        assert_eq!(seq.displayed(), None);

        let effects = seq.card_elapsed(second);
        assert_eq!(content_url(&effects), Some("https://p2.example"));
        assert_eq!(seq.displayed(), Some(2));
    }

    #[test]
    fn request_during_card_load_reloads_card() {
        let mut seq = sequencer(3);
        let first = token_of(&seq.next().unwrap());
        let effects = seq.next().unwrap();
        let second = token_of(&effects);
        assert_eq!(effects[1], Effect::LoadInterstitial { token: second });

        assert!(seq.interstitial_loaded(first, Ok(())).is_empty());
        assert!(!seq.is_card_visible());
        assert_eq!(seq.interstitial_loaded(second, Ok(())).len(), 2);
    }

    #[test]
    fn stale_content_completion_is_ignored() {
        let mut seq = sequencer(3);
        let first = token_of(&seq.go_to(1).unwrap());
        seq.interstitial_loaded(first, Ok(()));
        seq.card_elapsed(first);

        let second = token_of(&seq.go_to(2).unwrap());
        seq.content_loaded(first, Ok(()));
        assert_eq!(seq.state(), SequencerState::ShowingCard(CardPhase::Loading));
        assert_eq!(seq.live_token(), Some(second));
    }

    #[test]
    fn failed_card_skips_to_content() {
        let mut seq = sequencer(2);
        let token = token_of(&seq.go_to(1).unwrap());
        let effects = seq.interstitial_loaded(token, Err(ShellError::Interstitial("gone".into())));
        assert_eq!(content_url(&effects), Some("https://p1.example"));
        assert!(!seq.is_card_visible());
    }

    #[test]
    fn failed_content_leaves_sequencer_usable() {
        let mut seq = sequencer(2);
        let token = token_of(&seq.go_to(1).unwrap());
        seq.interstitial_loaded(token, Ok(()));
        seq.card_elapsed(token);
        seq.content_loaded(
            token,
            Err(ShellError::Content {
                url: "https://p1.example".into(),
                reason: "refused".into(),
            }),
        );
        assert_eq!(seq.state(), SequencerState::Idle);
        assert!(seq.next().is_ok());
    }

    #[test]
    fn navigation_records_activity() {
        let mut seq = sequencer(2);
        for command in [NavCommand::Next, NavCommand::Previous, NavCommand::Shuffle, NavCommand::GoTo(1)] {
            let effects = seq.navigate(command).unwrap();
            assert_eq!(effects[0], Effect::RecordActivity);
        }
    }

    #[test]
    fn invalid_targets_are_refused() {
        let mut list = playlist(3);
        list.projects[1].url.clear();
        let mut seq = Sequencer::with_rng(list, StdRng::seed_from_u64(1));

        assert_eq!(seq.go_to(1), Err(NavigationError::InvalidProject { index: 1 }));
        assert_eq!(seq.go_to(3), Err(NavigationError::OutOfRange { index: 3, len: 3 }));
        assert_eq!(seq.next(), Err(NavigationError::InvalidProject { index: 1 }));
        assert_eq!(seq.cursor(), 0);
        assert_eq!(seq.live_token(), None);
        assert_eq!(seq.state(), SequencerState::Idle);
    }

    #[test]
    fn empty_playlist_is_not_operational() {
        let mut seq = Sequencer::with_rng(
            Playlist {
                config: Config::default(),
                projects: Vec::new(),
            },
            StdRng::seed_from_u64(1),
        );
        for command in [NavCommand::Next, NavCommand::Previous, NavCommand::Shuffle, NavCommand::GoTo(0)] {
            assert_eq!(seq.navigate(command), Err(NavigationError::EmptyPlaylist));
        }
    }

    #[test]
    fn single_project_shuffle_redisplays() {
        let mut seq = sequencer(1);
        assert_eq!(seq.pick_shuffle(0), 0);
        assert!(seq.shuffle().is_ok());
        assert_eq!(seq.cursor(), 0);
    }

    #[test]
    fn shuffle_reaches_every_other_index() {
        let mut seq = sequencer(4);
        let mut seen = [false; 4];
        for _ in 0..200 {
            seen[seq.pick_shuffle(2)] = true;
        }
        assert_eq!(seen, [true, true, false, true]);
    }

    #[test]
    fn shuffle_skips_projects_without_url() {
        let mut list = playlist(4);
        list.projects[1].url.clear();
        list.projects[3].url.clear();
        let mut seq = Sequencer::with_rng(list, StdRng::seed_from_u64(3));
        for _ in 0..100 {
            assert_eq!(seq.pick_shuffle(0), 2);
        }
        assert!(seq.shuffle_excluding(0).is_ok());
        assert_eq!(seq.cursor(), 2);
    }

    #[test]
    fn shuffle_with_nothing_else_showable_redisplays() {
        let mut list = playlist(3);
        list.projects[1].url.clear();
        list.projects[2].url.clear();
        let mut seq = Sequencer::with_rng(list, StdRng::seed_from_u64(3));
        assert_eq!(seq.pick_shuffle(0), 0);
        assert!(seq.shuffle().is_ok());
        assert_eq!(seq.cursor(), 0);
    }

    #[test]
    fn zero_card_duration_uses_default() {
        let mut list = playlist(1);
        list.config.title_card_duration = Duration::ZERO;
        let mut seq = Sequencer::with_rng(list, StdRng::seed_from_u64(1));
        let token = token_of(&seq.go_to(0).unwrap());
        let effects = seq.interstitial_loaded(token, Ok(()));
        assert!(effects.contains(&Effect::StartCardTimer {
            token,
            duration: TITLE_CARD_DURATION
        }));
    }

    proptest! {
        #[test]
        fn next_len_times_returns_home(len in 1usize..20, start in 0usize..20) {
            let mut seq = sequencer(len);
            let start = start % len;
            seq.go_to(start).unwrap();
            for _ in 0..len {
                seq.next().unwrap();
            }
            prop_assert_eq!(seq.cursor(), start);
        }

        #[test]
        fn previous_undoes_next(len in 1usize..20, steps in 0usize..40) {
            let mut seq = sequencer(len);
            for _ in 0..steps {
                seq.next().unwrap();
            }
            for _ in 0..steps {
                seq.previous().unwrap();
            }
            prop_assert_eq!(seq.cursor(), 0);
        }

        #[test]
        fn shuffle_never_repeats_excluded(len in 2usize..30, excluding in 0usize..30, seed in any::<u64>()) {
            let excluding = excluding % len;
            let mut seq = Sequencer::with_rng(playlist(len), StdRng::seed_from_u64(seed));
            let pick = seq.pick_shuffle(excluding);
            prop_assert!(pick < len);
            prop_assert_ne!(pick, excluding);
        }
    }
}
