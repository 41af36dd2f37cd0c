//! Small games used only by the crate's tests.

use engine_core::{Game, GameError, Transition};
use rand::Rng;
use rand_chacha::ChaCha20Rng;

pub const BANK: u8 = 0;
pub const ROLL: u8 = 1;

/// Two seats alternate for `turns` turns each. Banking scores 2 points;
/// rolling scores a die face, and the face is the chance key.
#[derive(Debug, Clone, Copy)]
pub struct DiceRace {
    pub faces: u8,
    pub turns: u8,
}

impl Default for DiceRace {
    fn default() -> Self {
        Self { faces: 6, turns: 2 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DiceState {
    pub turn: u8,
    pub scores: [u32; 2],
}

impl DiceRace {
    fn is_over(&self, state: &DiceState) -> bool {
        state.turn >= self.turns * 2
    }
}

impl Game for DiceRace {
    type State = DiceState;
    type Action = u8;
    type ChanceKey = u8;

    fn initial_state(&self, _rng: &mut ChaCha20Rng) -> DiceState {
        DiceState {
            turn: 0,
            scores: [0, 0],
        }
    }

    fn num_players(&self, _state: &DiceState) -> usize {
        2
    }

    fn current_player(&self, state: &DiceState) -> usize {
        (state.turn % 2) as usize
    }

    fn legal_actions(&self, state: &DiceState) -> Vec<u8> {
        if self.is_over(state) {
            Vec::new()
        } else {
            vec![BANK, ROLL]
        }
    }

    fn apply(
        &self,
        state: &DiceState,
        action: &u8,
        rng: &mut ChaCha20Rng,
    ) -> Result<Transition<DiceState, u8>, GameError> {
        if self.is_over(state) {
            return Err(GameError::InvalidState("game is over".into()));
        }
        let (points, key) = match *action {
            BANK => (2, 0),
            ROLL => {
                let face = rng.gen_range(1..=self.faces);
                (face as u32, face)
            }
            other => return Err(GameError::IllegalAction(format!("action {}", other))),
        };

        let mut next = state.clone();
        next.scores[self.current_player(state)] += points;
        next.turn += 1;
        Ok(Transition {
            state: next,
            chance: key,
        })
    }

    fn terminal_values(&self, state: &DiceState) -> Option<Vec<f32>> {
        if !self.is_over(state) {
            return None;
        }
        let [a, b] = state.scores;
        Some(match a.cmp(&b) {
            std::cmp::Ordering::Greater => vec![1.0, -1.0],
            std::cmp::Ordering::Less => vec![-1.0, 1.0],
            std::cmp::Ordering::Equal => vec![0.0, 0.0],
        })
    }
}
