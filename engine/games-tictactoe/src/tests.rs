use super::*;
use rand::SeedableRng;

fn rng() -> ChaCha20Rng {
    ChaCha20Rng::seed_from_u64(42)
}

#[test]
fn test_initial_state() {
    let state = State::new();
    assert_eq!(state.board, [0; 9]);
    assert_eq!(state.current_player, 1);
    assert_eq!(state.winner, 0);
    assert!(!state.is_done());
}

#[test]
fn test_legal_moves() {
    let state = State::new();
    assert_eq!(state.legal_moves(), (0..9).collect::<Vec<_>>());

    // After one move
    let state = state.make_move(4).unwrap();
    let legal = state.legal_moves();
    assert_eq!(legal.len(), 8);
    assert!(!legal.contains(&4));
}

#[test]
fn test_make_move_switches_player() {
    let state = State::new().make_move(4).unwrap();
    assert_eq!(state.board[4], 1);
    assert_eq!(state.current_player, 2);
    assert!(!state.is_done());
}

#[test]
fn test_occupied_cell_is_rejected() {
    let state = State::new().make_move(4).unwrap();
    let err = state.make_move(4).unwrap_err();
    assert!(matches!(err, GameError::IllegalAction(_)));
    assert!(state.make_move(9).is_err());
}

#[test]
fn test_winning_game() {
    let mut state = State::new();
    for m in [0, 3, 1, 4, 2] {
        state = state.make_move(m).unwrap();
    }

    assert_eq!(state.winner, 1);
    assert!(state.is_done());
    assert!(state.legal_moves().is_empty());
    assert!(state.make_move(5).is_err());
}

#[test]
fn test_draw_game() {
    // X O X
    // X O O
    // O X X
    let mut state = State::new();
    for m in [0, 1, 2, 4, 3, 5, 7, 6, 8] {
        state = state.make_move(m).unwrap();
    }
    assert_eq!(state.winner, 3);
}

#[test]
fn test_from_board() {
    let state = State::from_board([1, 1, 0, 2, 2, 0, 0, 0, 0]).unwrap();
    assert_eq!(state.current_player, 1);
    assert!(!state.is_done());

    let won = State::from_board([1, 1, 1, 2, 2, 0, 0, 0, 0]).unwrap();
    assert_eq!(won.winner, 1);

    assert!(State::from_board([2, 2, 0, 0, 0, 0, 0, 0, 0]).is_err());
    assert!(State::from_board([3, 0, 0, 0, 0, 0, 0, 0, 0]).is_err());
}

#[test]
fn test_game_trait_values() {
    let game = TicTacToe::new();
    let mut rng = rng();
    let mut state = game.initial_state(&mut rng);
    assert_eq!(game.num_players(&state), 2);
    assert_eq!(game.current_player(&state), 0);
    assert!(game.terminal_values(&state).is_none());

    for m in [0u8, 3, 1, 4] {
        state = game.apply(&state, &m, &mut rng).unwrap().state;
    }
    assert_eq!(game.current_player(&state), 0);

    let done = game.apply(&state, &2, &mut rng).unwrap().state;
    assert_eq!(
        game.terminal_values(&done),
        Some(vec![WIN_VALUE, LOSS_VALUE])
    );
    assert!(game.is_terminal(&done));
}

#[test]
fn test_o_win_values() {
    let game = TicTacToe::new();
    let state = State::from_board([1, 1, 0, 2, 2, 2, 1, 0, 0]).unwrap();
    assert_eq!(
        game.terminal_values(&state),
        Some(vec![LOSS_VALUE, WIN_VALUE])
    );
}

#[test]
fn test_apply_illegal_action() {
    let game = TicTacToe::new();
    let mut rng = rng();
    let state = game.initial_state(&mut rng);
    let next = game.apply(&state, &0, &mut rng).unwrap().state;
    assert!(game.apply(&next, &0, &mut rng).is_err());
}
