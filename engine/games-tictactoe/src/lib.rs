//! TicTacToe reference game for the search engine
//!
//! A deterministic two-seat game used by search tests, benchmarks and the
//! self-play actor. Seat 0 plays X and moves first, seat 1 plays O.
//!
//! # Usage
//!
//! ```rust
//! use engine_core::Game;
//! use games_tictactoe::TicTacToe;
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha20Rng;
//!
//! let game = TicTacToe::new();
//! let mut rng = ChaCha20Rng::seed_from_u64(42);
//! let state = game.initial_state(&mut rng);
//! assert_eq!(game.legal_actions(&state).len(), 9);
//! ```

use engine_core::{Game, GameError, Transition};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};

/// Value awarded to the winning seat.
pub const WIN_VALUE: f32 = 1.0;
/// Value awarded to the losing seat.
pub const LOSS_VALUE: f32 = -1.0;
/// Value awarded to both seats on a full board.
pub const DRAW_VALUE: f32 = 0.0;

/// Winning positions (rows, columns, diagonals)
const LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

/// TicTacToe game state
///
/// Represents the complete state of a TicTacToe game including the board,
/// current player, and winner information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct State {
    /// Board representation: 0=empty, 1=X, 2=O
    board: [u8; 9],
    /// Current player: 1=X, 2=O
    current_player: u8,
    /// Winner: 0=none/ongoing, 1=X, 2=O, 3=draw
    winner: u8,
}

impl State {
    /// Create a new initial game state
    pub fn new() -> Self {
        Self {
            board: [0; 9],
            current_player: 1,
            winner: 0,
        }
    }

    /// Build a state from a board, deriving whose turn it is and the winner.
    ///
    /// Returns an error when the piece counts cannot arise from legal play.
    pub fn from_board(board: [u8; 9]) -> Result<Self, GameError> {
        if board.iter().any(|&c| c > 2) {
            return Err(GameError::InvalidState(
                "cell values must be 0, 1 or 2".into(),
            ));
        }
        let xs = board.iter().filter(|&&c| c == 1).count();
        let os = board.iter().filter(|&&c| c == 2).count();
        if xs != os && xs != os + 1 {
            return Err(GameError::InvalidState(format!(
                "piece counts X={} O={} are unreachable",
                xs, os
            )));
        }
        Ok(Self {
            board,
            current_player: if xs == os { 1 } else { 2 },
            winner: Self::check_winner(&board),
        })
    }

    /// Board cells: 0=empty, 1=X, 2=O
    pub fn board(&self) -> &[u8; 9] {
        &self.board
    }

    /// Check if the game is over
    pub fn is_done(&self) -> bool {
        self.winner != 0
    }

    /// Winner code: 0=ongoing, 1=X, 2=O, 3=draw
    pub fn winner(&self) -> u8 {
        self.winner
    }

    /// Get legal moves (empty positions)
    pub fn legal_moves(&self) -> Vec<u8> {
        if self.is_done() {
            return Vec::new();
        }

        (0..9u8)
            .filter(|&pos| self.board[pos as usize] == 0)
            .collect()
    }

    /// Make a move and return the new state.
    pub fn make_move(&self, position: u8) -> Result<State, GameError> {
        if self.is_done() {
            return Err(GameError::IllegalAction("game is over".into()));
        }
        if position >= 9 || self.board[position as usize] != 0 {
            return Err(GameError::IllegalAction(format!(
                "position {} is not empty or out of range",
                position
            )));
        }

        let mut new_state = *self;
        new_state.board[position as usize] = self.current_player;
        new_state.winner = Self::check_winner(&new_state.board);

        if new_state.winner == 0 {
            new_state.current_player = if self.current_player == 1 { 2 } else { 1 };
        }

        Ok(new_state)
    }

    fn check_winner(board: &[u8; 9]) -> u8 {
        for line in &LINES {
            let [a, b, c] = *line;
            if board[a] != 0 && board[a] == board[b] && board[b] == board[c] {
                return board[a];
            }
        }

        if board.iter().all(|&cell| cell != 0) {
            return 3;
        }

        0
    }
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

/// TicTacToe game implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct TicTacToe;

impl TicTacToe {
    /// Create a new TicTacToe game
    pub fn new() -> Self {
        Self
    }
}

impl Game for TicTacToe {
    type State = State;
    type Action = u8;
    type ChanceKey = ();

    fn initial_state(&self, _rng: &mut ChaCha20Rng) -> State {
        State::new()
    }

    fn num_players(&self, _state: &State) -> usize {
        2
    }

    fn current_player(&self, state: &State) -> usize {
        (state.current_player - 1) as usize
    }

    fn legal_actions(&self, state: &State) -> Vec<u8> {
        state.legal_moves()
    }

    fn apply(
        &self,
        state: &State,
        action: &u8,
        _rng: &mut ChaCha20Rng,
    ) -> Result<Transition<State, ()>, GameError> {
        Ok(Transition {
            state: state.make_move(*action)?,
            chance: (),
        })
    }

    fn terminal_values(&self, state: &State) -> Option<Vec<f32>> {
        match state.winner {
            0 => None,
            1 => Some(vec![WIN_VALUE, LOSS_VALUE]),
            2 => Some(vec![LOSS_VALUE, WIN_VALUE]),
            _ => Some(vec![DRAW_VALUE, DRAW_VALUE]),
        }
    }
}

#[cfg(test)]
mod tests;
