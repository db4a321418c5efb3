mod support;

use pong_server::client::{
    ClientInput, ClientSession, GameConnection, Notice, Notifier, PaddleDirection, RenderedState,
    Renderer,
};
use pong_server::domain::{FieldTuning, SessionPhase};
use pong_server::interface_adapters::protocol::{
    ClientMessage, GameStateDto, PhaseDto, PlayersDto, ServerMessage,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

fn game_state(msg: &ServerMessage) -> Option<&GameStateDto> {
    match msg {
        ServerMessage::GameState(dto) => Some(dto),
        _ => None,
    }
}

fn error_reason(msg: &ServerMessage) -> Option<&str> {
    match msg {
        ServerMessage::Error { reason, .. } => Some(reason),
        _ => None,
    }
}

async fn seated_pair() -> (String, GameConnection, GameConnection) {
    let game_key = support::new_game().await;
    let mut one = support::connect(&game_key, None).await;
    let (slot, _) = support::expect_join(&mut one).await;
    assert_eq!(slot, 1);
    let mut two = support::connect(&game_key, None).await;
    let (slot, _) = support::expect_join(&mut two).await;
    assert_eq!(slot, 2);
    (game_key, one, two)
}

// Drains a connection until the server closes it.
async fn expect_closed(conn: &mut GameConnection) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while let Ok(Some(_)) = conn.recv().await {}
    })
    .await
    .expect("connection should be closed");
}

#[tokio::test]
async fn peers_get_slots_in_order_and_a_third_is_rejected() {
    let (game_key, mut one, _two) = seated_pair().await;

    support::recv_until(&mut one, |msg| {
        *msg == ServerMessage::UpdatePlayers {
            players: PlayersDto {
                player1: true,
                player2: true,
            },
        }
    })
    .await;

    let mut third = support::connect(&game_key, None).await;
    let rejected = third.recv().await.expect("recv").expect("error frame");
    assert_eq!(error_reason(&rejected), Some("SlotsExhausted"));
    expect_closed(&mut third).await;
}

#[tokio::test]
async fn start_reaches_both_peers_and_serves_from_midfield() {
    let (_game_key, mut one, mut two) = seated_pair().await;

    two.send(&ClientMessage::StartGame).await.expect("send start");

    for conn in [&mut one, &mut two] {
        support::recv_until(conn, |msg| *msg == ServerMessage::GameStarted).await;
        let first = support::recv_until(conn, |msg| game_state(msg).is_some()).await;
        let dto = game_state(&first).unwrap();
        assert_eq!(dto.phase, PhaseDto::Running);
        assert_eq!((dto.ball.x, dto.ball.y), (400.0, 300.0));
        assert_eq!((dto.ball.dx, dto.ball.dy), (2.0, -2.0));
    }
}

#[tokio::test]
async fn spoofed_input_is_ignored_and_own_input_is_clamped() {
    let (_game_key, mut one, _two) = seated_pair().await;

    // Slot one pretends to be slot two.
    one.send(&ClientMessage::paddle(
        pong_server::domain::PlayerSlot::Two,
        0.0,
    ))
    .await
    .expect("send spoof");
    one.send(&ClientMessage::PlayerUpdate {
        player_id: Some(1),
        x: -50.0,
    })
    .await
    .expect("send input");

    let msg = support::recv_until(&mut one, |msg| {
        game_state(msg).is_some_and(|dto| dto.player1.x == 0.0)
    })
    .await;
    let dto = game_state(&msg).unwrap();
    assert_eq!(dto.player2.x, 350.0);
    assert_eq!(dto.phase, PhaseDto::Ready);
}

#[tokio::test]
async fn start_before_the_second_player_is_an_illegal_transition() {
    let game_key = support::new_game().await;
    let mut one = support::connect(&game_key, None).await;
    support::expect_join(&mut one).await;

    one.send(&ClientMessage::StartGame).await.expect("send start");

    let msg = support::recv_until(&mut one, |msg| error_reason(msg).is_some()).await;
    assert_eq!(error_reason(&msg), Some("IllegalTransition"));

    let state = support::api().game_state(&game_key).await.expect("state");
    assert_eq!(game_state(&state).unwrap().phase, PhaseDto::WaitingForPlayers);
}

#[tokio::test]
async fn malformed_frames_get_an_error_reply() {
    let game_key = support::new_game().await;
    let mut one = support::connect(&game_key, None).await;
    support::expect_join(&mut one).await;

    one.send_text("{not json").await.expect("send garbage");

    let msg = support::recv_until(&mut one, |msg| error_reason(msg).is_some()).await;
    assert_eq!(error_reason(&msg), Some("MalformedMessage"));
}

#[tokio::test]
async fn reconnect_token_reclaims_the_slot_and_replaces_the_old_socket() {
    let game_key = support::new_game().await;
    let mut first = support::connect(&game_key, None).await;
    let (slot, token) = support::expect_join(&mut first).await;
    let mut two = support::connect(&game_key, None).await;
    support::expect_join(&mut two).await;

    let mut again = support::connect(&game_key, Some(&token)).await;
    let (reclaimed, same_token) = support::expect_join(&mut again).await;

    assert_eq!(reclaimed, slot);
    assert_eq!(same_token, token);
    expect_closed(&mut first).await;

    // Unknown tokens do not get a seat in a full session.
    let mut stranger = support::connect(&game_key, Some("not-a-token")).await;
    let rejected = stranger.recv().await.expect("recv").expect("error frame");
    assert_eq!(error_reason(&rejected), Some("SlotsExhausted"));

    // Slot two can still drop and come back.
    drop(two);
    support::recv_until(&mut again, |msg| {
        *msg == ServerMessage::UpdatePlayers {
            players: PlayersDto {
                player1: true,
                player2: false,
            },
        }
    })
    .await;
}

#[tokio::test]
async fn full_match_finishes_once_and_rejects_further_input() {
    let (game_key, mut one, _two) = seated_pair().await;
    one.send(&ClientMessage::StartGame).await.expect("send start");

    let mut last_seq = 0;
    let finished = tokio::time::timeout(Duration::from_secs(30), async {
        loop {
            let msg = one.recv().await.expect("recv").expect("open");
            let Some(dto) = game_state(&msg) else {
                continue;
            };
            // Duplicates of the join snapshot are allowed; order never goes back.
            assert!(dto.seq >= last_seq);
            last_seq = dto.seq;
            if dto.phase == PhaseDto::Finished {
                return dto.clone();
            }
        }
    })
    .await
    .expect("match should finish");

    assert_eq!(finished.score_player1.max(finished.score_player2), 5);

    one.send(&ClientMessage::PlayerUpdate {
        player_id: None,
        x: 10.0,
    })
    .await
    .expect("send input");
    let msg = support::recv_until(&mut one, |msg| error_reason(msg).is_some()).await;
    assert_eq!(error_reason(&msg), Some("SessionFinished"));

    // Finished sessions stay readable while players are connected.
    let state = support::api().game_state(&game_key).await.expect("state");
    let dto = game_state(&state).unwrap();
    assert_eq!(dto.phase, PhaseDto::Finished);
    assert_eq!(dto.seq, finished.seq);
    assert_eq!(dto.player1.x, finished.player1.x);
}

// Keeps every frame and notice so a test can inspect what a player would have seen.
#[derive(Clone, Default)]
struct Recorder {
    frames: Arc<Mutex<Vec<RenderedState>>>,
    notices: Arc<Mutex<Vec<Notice>>>,
}

impl Recorder {
    fn frames(&self) -> Vec<RenderedState> {
        self.frames.lock().unwrap().clone()
    }

    fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }
}

impl Renderer for Recorder {
    fn render(&mut self, state: &RenderedState) {
        self.frames.lock().unwrap().push(state.clone());
    }
}

impl Notifier for Recorder {
    fn notify(&mut self, notice: Notice) {
        self.notices.lock().unwrap().push(notice);
    }
}

async fn client_session(game_key: &str, recorder: &Recorder) -> ClientSession<Recorder, Recorder> {
    let connection = support::connect(game_key, None).await;
    ClientSession::new(
        connection,
        FieldTuning::default(),
        recorder.clone(),
        recorder.clone(),
    )
}

async fn wait_for<F>(what: &str, mut done: F)
where
    F: FnMut() -> bool,
{
    tokio::time::timeout(Duration::from_secs(30), async {
        while !done() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {what}"));
}

#[tokio::test]
async fn client_session_renders_its_own_move_before_the_server_confirms_it() {
    let game_key = support::new_game().await;
    let recorder = Recorder::default();
    let mut session = client_session(&game_key, &recorder).await;
    let mut two = support::connect(&game_key, None).await;
    support::expect_join(&mut two).await;

    tokio::time::timeout(Duration::from_secs(10), async {
        while session.reconciler().state().phase != SessionPhase::Ready {
            session.next_event().await.expect("recv").expect("open");
        }
    })
    .await
    .expect("session should become ready");
    let seq_before = session.reconciler().last_seq();
    let frames_before = recorder.frames().len();

    assert!(
        session
            .handle_input(ClientInput::Move(PaddleDirection::Right))
            .await
            .expect("send move")
    );

    // Drawn straight away, with no snapshot applied in between.
    let frames = recorder.frames();
    assert_eq!(frames.len(), frames_before + 1);
    assert_eq!(frames.last().unwrap().paddle_one.x, 365.0);
    assert_eq!(session.reconciler().last_seq(), seq_before);

    // The server echo lands on the same position.
    tokio::time::timeout(Duration::from_secs(10), async {
        while session.reconciler().last_seq() == seq_before {
            session.next_event().await.expect("recv").expect("open");
        }
    })
    .await
    .expect("server should confirm the move");
    assert_eq!(session.reconciler().state().paddle_one.x, 365.0);
    session.close().await.expect("close");
}

#[tokio::test]
async fn client_session_run_renders_snapshots_announces_one_winner_and_quits() {
    let game_key = support::new_game().await;
    let recorder = Recorder::default();
    let session = client_session(&game_key, &recorder).await;
    let mut two = support::connect(&game_key, None).await;
    support::expect_join(&mut two).await;

    let (inputs_tx, inputs_rx) = mpsc::channel(8);
    let running = tokio::spawn(session.run(inputs_rx));

    wait_for("the ready frame", || {
        recorder
            .frames()
            .last()
            .is_some_and(|frame| frame.phase == SessionPhase::Ready)
    })
    .await;
    inputs_tx.send(ClientInput::Start).await.expect("send start");

    wait_for("the win notice", || !recorder.notices().is_empty()).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let frames = recorder.frames();
    let last = frames.last().expect("frames rendered");
    assert_eq!(last.phase, SessionPhase::Finished);
    assert!(
        frames
            .iter()
            .any(|frame| frame.phase == SessionPhase::Running)
    );
    let winner = if last.score.score_one > last.score.score_two { 1 } else { 2 };

    let notices = recorder.notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].message, format!("Player {winner} wins!"));
    assert_eq!(notices[0].total(), Duration::from_millis(3500));

    inputs_tx.send(ClientInput::Quit).await.expect("send quit");
    let reconciler = tokio::time::timeout(Duration::from_secs(5), running)
        .await
        .expect("run should stop after quit")
        .expect("join")
        .expect("session ran cleanly");
    assert_eq!(reconciler.state().phase, SessionPhase::Finished);

    // The server sees the socket go away.
    support::recv_until(&mut two, |msg| {
        *msg == ServerMessage::UpdatePlayers {
            players: PlayersDto {
                player1: false,
                player2: true,
            },
        }
    })
    .await;
}
