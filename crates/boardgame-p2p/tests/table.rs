//! multi-peer games over an in-process hub

use std::sync::Arc;

use std::time::{Duration, Instant};

use boardgame_p2p::{
    die_deck_id, Channel, ChannelEvent, Connection, DeckError, DieFaces, Face, Game, GameConfig,
    GameError, LocalChannel, LocalHub, Message, UserId,
};
use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedReceiver;

struct Peer {
    game: Game<LocalChannel>,
    inbound: UnboundedReceiver<ChannelEvent>,
}

struct Table {
    hub: LocalHub,
    channel_id: String,
    peers: Vec<Peer>,
}

impl Table {
    fn new(n: usize) -> Self {
        let hub = LocalHub::new();
        let mut channel_id: Option<String> = None;
        let mut peers = Vec::new();
        for i in 0..n {
            let conn = Connection::new(hub.clone(), format!("user-{}", i));
            let (channel, inbound) = match &channel_id {
                None => conn.open().unwrap(),
                Some(id) => conn.connect(id).unwrap(),
            };
            if channel_id.is_none() {
                channel_id = Some(channel.id().to_owned());
            }
            let mut game = Game::new(GameConfig::default()).unwrap();
            game.start_connection(channel);
            peers.push(Peer { game, inbound });
        }
        let mut table = Self {
            hub,
            channel_id: channel_id.unwrap(),
            peers,
        };
        table.settle();
        table
    }

    /// deliver until every queue is empty, returns the events handled
    fn settle(&mut self) -> usize {
        let mut handled = 0;
        loop {
            let mut progressed = false;
            for peer in self.peers.iter_mut() {
                while let Ok(event) = peer.inbound.try_recv() {
                    peer.game.handle_channel_event(event);
                    handled += 1;
                    progressed = true;
                }
            }
            if !progressed {
                return handled;
            }
        }
    }

    fn start(&mut self) {
        self.peers[0].game.start().unwrap();
        self.settle();
        for peer in &self.peers {
            assert!(peer.game.is_started());
        }
    }

    /// connect a raw listener. joined before start it is seated but never answers.
    fn observer(&mut self) -> Observer {
        let (channel, inbound) = Connection::new(self.hub.clone(), "observer")
            .connect(&self.channel_id)
            .unwrap();
        self.settle();
        Observer { channel, inbound }
    }
}

struct Observer {
    channel: LocalChannel,
    inbound: UnboundedReceiver<ChannelEvent>,
}

impl Observer {
    fn kinds(&mut self) -> Vec<&'static str> {
        let mut kinds = Vec::new();
        while let Ok(event) = self.inbound.try_recv() {
            if let ChannelEvent::Message { payload, .. } = event {
                kinds.push(Message::from_json(&payload).unwrap().kind());
            }
        }
        kinds
    }
}

type Log = Arc<Mutex<Vec<String>>>;

fn log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

fn add_deck(game: &mut Game<LocalChannel>, faces: &[&str], log: &Log) -> u32 {
    let deck = game.create_deck(faces.iter().copied()).unwrap();
    let l = log.clone();
    deck.on.error.add(move |e| l.lock().push(format!("error:{}", e)));
    let l = log.clone();
    deck.on.shuffle_finish.add(move |_| l.lock().push("finish".into()));
    let l = log.clone();
    deck.on
        .drawn
        .add(move |(card, player)| l.lock().push(format!("drawn:{}:{}", card, player)));
    let l = log.clone();
    deck.on
        .secretly_known_face
        .add(move |(card, face)| l.lock().push(format!("secret:{}:{}", card, face)));
    let l = log.clone();
    deck.on
        .public_known_face
        .add(move |(card, face)| l.lock().push(format!("public:{}:{}", card, face)));
    deck.id()
}

fn add_die(game: &mut Game<LocalChannel>, faces: DieFaces) -> (Log, Arc<Mutex<Vec<Face>>>) {
    add_named_die(game, "d", faces)
}

fn add_named_die(
    game: &mut Game<LocalChannel>,
    id: &str,
    faces: DieFaces,
) -> (Log, Arc<Mutex<Vec<Face>>>) {
    let log = log();
    let rolls = Arc::new(Mutex::new(Vec::new()));
    let die = game.create_die(id, faces).unwrap();
    let l = log.clone();
    die.on.error.add(move |e| l.lock().push(format!("error:{}", e)));
    let l = log.clone();
    die.on.roll_start.add(move |_| l.lock().push("rollstart".into()));
    let r = rolls.clone();
    die.on.roll_finish.add(move |face| r.lock().push(face.clone()));
    (log, rolls)
}

#[test]
fn test_two_peers_agree_on_a_d6_roll() {
    let mut table = Table::new(2);
    let dice: Vec<_> = table
        .peers
        .iter_mut()
        .map(|p| add_die(&mut p.game, DieFaces::default()))
        .collect();
    table.start();
    let mut observer = table.observer();

    assert!(table.peers[0].game.roll("d").unwrap());
    table.settle();

    let (log0, rolls0) = &dice[0];
    let (log1, rolls1) = &dice[1];
    assert_eq!(*log0.lock(), vec!["rollstart".to_string()]);
    assert_eq!(*log1.lock(), vec!["rollstart".to_string()]);
    assert_eq!(rolls0.lock().len(), 1);
    assert_eq!(*rolls0.lock(), *rolls1.lock());
    match &rolls0.lock()[0] {
        Face::Number(n) => assert!((1..=6).contains(n)),
        other => panic!("unexpected face {}", other),
    }

    let kinds = observer.kinds();
    assert_eq!(kinds.iter().filter(|k| **k == "die/rollstart").count(), 1);
    assert_eq!(kinds.iter().filter(|k| **k == "deck/initial").count(), 1);
    assert_eq!(kinds.iter().filter(|k| **k == "deck/cardflip").count(), 1);
    assert!(!table.peers[0].game.die("d").unwrap().is_rolling());
    assert!(!table.peers[1].game.die("d").unwrap().is_rolling());
}

#[test]
fn test_rolls_rotate_between_players() {
    let mut table = Table::new(3);
    let dice: Vec<_> = table
        .peers
        .iter_mut()
        .map(|p| add_die(&mut p.game, DieFaces::Custom(vec!["heads".into(), "tails".into()])))
        .collect();
    table.start();

    for roll in 0..3 {
        assert!(table.peers[roll].game.roll("d").unwrap());
        table.settle();
    }

    let first = dice[0].1.lock().clone();
    assert_eq!(first.len(), 3);
    for (log, rolls) in &dice {
        assert_eq!(*rolls.lock(), first);
        assert!(log.lock().iter().all(|entry| entry == "rollstart"));
    }
    // the last roll ran on player 2's first die deck everywhere
    let decks: Vec<_> = (0..3)
        .map(|i| table.peers[i].game.die("d").unwrap().deck_id())
        .collect();
    assert_eq!(decks, vec![die_deck_id(2, 0, 3); 3]);
}

#[test]
fn test_concurrent_rolls_of_different_dice() {
    let mut table = Table::new(3);
    let mut d1 = Vec::new();
    let mut d2 = Vec::new();
    for peer in table.peers.iter_mut() {
        d1.push(add_named_die(&mut peer.game, "d1", DieFaces::default()));
        d2.push(add_named_die(&mut peer.game, "d2", DieFaces::Count(8)));
    }
    table.start();

    // both rolls start before either peer hears of the other
    assert!(table.peers[0].game.roll("d1").unwrap());
    assert!(table.peers[1].game.roll("d2").unwrap());
    table.settle();

    for (dice, roller) in [(&d1, 0), (&d2, 1)] {
        let first = dice[0].1.lock().clone();
        assert_eq!(first.len(), 1);
        for (log, rolls) in dice {
            assert_eq!(*rolls.lock(), first);
            assert_eq!(*log.lock(), vec!["rollstart".to_string()]);
        }
        let id = if roller == 0 { "d1" } else { "d2" };
        for peer in &table.peers {
            let die = peer.game.die(id).unwrap();
            assert!(!die.is_rolling());
            assert_eq!(die.deck_id(), die_deck_id(roller, 0, 3));
        }
    }
    for peer in &table.peers {
        assert_eq!(peer.game.parked_count(), 0);
    }
}

#[test]
fn test_roll_finishes_after_the_flip_is_sent() {
    let mut table = Table::new(2);
    let _watcher = add_die(&mut table.peers[1].game, DieFaces::default());
    table.start();

    let observer = Arc::new(Mutex::new(table.observer()));
    let flip_seen = Arc::new(Mutex::new(Vec::new()));
    let die = table.peers[0]
        .game
        .create_die("d", DieFaces::default())
        .unwrap();
    die.on.error.add(|_| {});
    let (o, f) = (observer.clone(), flip_seen.clone());
    die.on.roll_finish.add(move |_| {
        let kinds = o.lock().kinds();
        f.lock().push(kinds.contains(&"deck/cardflip"));
    });

    assert!(table.peers[0].game.roll("d").unwrap());
    table.settle();
    assert_eq!(*flip_seen.lock(), vec![true]);
}

#[test]
fn test_timed_out_roll_can_be_rolled_again() {
    let mut table = Table::new(1);
    let (log, rolls) = add_die(&mut table.peers[0].game, DieFaces::default());
    // seated, but never sends its player details
    let _guest = table.observer();
    table.start();
    assert_eq!(table.peers[0].game.number_of_players().unwrap(), 2);

    assert!(table.peers[0].game.roll("d").unwrap());
    table
        .peers[0]
        .game
        .check_timeouts(Instant::now() + Duration::from_secs(60));

    assert_eq!(
        *log.lock(),
        vec![
            "rollstart".to_string(),
            "error:timed out waiting for player details".to_string()
        ]
    );
    let die = table.peers[0].game.die("d").unwrap();
    assert!(!die.is_rolling());
    assert!(rolls.lock().is_empty());

    assert!(table.peers[0].game.roll("d").unwrap());
    assert_eq!(log.lock().last().unwrap(), "rollstart");
    assert_eq!(
        table.peers[0].game.die("d").unwrap().deck_id(),
        die_deck_id(0, 1, 2)
    );
}

#[test]
fn test_rolls_of_unknown_dice_are_dropped() {
    let mut table = Table::new(2);
    let (log, _) = add_die(&mut table.peers[0].game, DieFaces::default());
    table.start();

    assert!(table.peers[0].game.roll("d").unwrap());
    table.settle();
    // peer 1 has no such die, nothing for that deck stays behind
    assert!(table.peers[1].game.deck(die_deck_id(0, 0, 2).unwrap()).is_none());
    assert_eq!(table.peers[1].game.parked_count(), 0);
    assert_eq!(*log.lock(), vec!["rollstart".to_string()]);
    assert!(table.peers[0].game.die("d").unwrap().is_rolling());
}

#[test]
fn test_roll_start_outside_the_senders_deck_range_is_ignored() {
    let mut table = Table::new(2);
    let dice: Vec<_> = table
        .peers
        .iter_mut()
        .map(|p| add_die(&mut p.game, DieFaces::default()))
        .collect();
    let mut guest = table.observer();
    table.start();

    // player 2 claims the deck player 0 will roll on next
    let claimed = die_deck_id(0, 0, 3).unwrap();
    guest.channel.send(&Message::RollStart {
        die_id: "d".into(),
        deck_id: claimed,
    });
    table.settle();
    for (peer, (log, _)) in table.peers.iter().zip(&dice) {
        assert!(!peer.game.die("d").unwrap().is_rolling());
        assert!(peer.game.deck(claimed).is_none());
        assert!(log.lock().is_empty());
    }

    // the rightful roll still goes through
    assert!(table.peers[0].game.roll("d").unwrap());
    table.settle();
    let die = table.peers[1].game.die("d").unwrap();
    assert!(die.is_rolling());
    assert_eq!(die.deck_id(), Some(claimed));
}

#[test]
fn test_second_roll_while_rolling_is_ignored() {
    let mut table = Table::new(2);
    let _dice: Vec<_> = table
        .peers
        .iter_mut()
        .map(|p| add_die(&mut p.game, DieFaces::Count(4)))
        .collect();
    table.start();

    assert!(table.peers[0].game.roll("d").unwrap());
    assert!(!table.peers[0].game.roll("d").unwrap());
    table.settle();
    assert!(!table.peers[0].game.die("d").unwrap().is_rolling());
}

#[test]
fn test_single_player_roll_finishes_locally() {
    let mut table = Table::new(1);
    let (log, rolls) = add_die(&mut table.peers[0].game, DieFaces::Count(20));
    table.start();

    assert!(table.peers[0].game.roll("d").unwrap());
    assert_eq!(rolls.lock().len(), 1);
    assert_eq!(*log.lock(), vec!["rollstart".to_string()]);
}

#[test]
fn test_deck_draw_and_flip() {
    let mut table = Table::new(3);
    let logs: Vec<Log> = (0..3).map(|_| log()).collect();
    for (peer, log) in table.peers.iter_mut().zip(&logs) {
        assert_eq!(add_deck(&mut peer.game, &["A", "B"], log), 0);
    }
    table.start();
    for log in &logs {
        assert_eq!(*log.lock(), vec!["finish".to_string()]);
    }

    let card = table.peers[0].game.draw_card(0, None).unwrap();
    table.settle();

    let secret = logs[0]
        .lock()
        .iter()
        .find(|e| e.starts_with("secret:"))
        .cloned()
        .unwrap();
    let face = secret.rsplit(':').next().unwrap().to_owned();
    assert!(face == "A" || face == "B");
    for log in &logs[1..] {
        assert!(log.lock().contains(&format!("drawn:{}:0", card)));
        assert!(!log.lock().iter().any(|e| e.starts_with("secret:")));
    }

    table.peers[0].game.flip_card(0, card).unwrap();
    table.settle();
    for log in &logs {
        assert!(log.lock().contains(&format!("public:{}:{}", card, face)));
        assert!(!log.lock().iter().any(|e| e.starts_with("error:")));
    }
    assert_eq!(
        table.peers[2].game.deck(0).unwrap().known_face(card),
        Some(&Face::from(face.as_str()))
    );
}

#[test]
fn test_only_player_zero_sends_the_initial_deck() {
    let mut table = Table::new(4);
    table.start();
    let mut observer = table.observer();

    let logs: Vec<Log> = (0..4).map(|_| log()).collect();
    for (peer, log) in table.peers.iter_mut().zip(&logs) {
        let id = add_deck(&mut peer.game, &["x", "y", "z"], log);
        peer.game.shuffle_deck(id).unwrap();
    }
    table.settle();

    let kinds = observer.kinds();
    let count = |kind: &str| kinds.iter().filter(|k| **k == kind).count();
    assert_eq!(count("deck/playerdetails"), 4);
    assert_eq!(count("deck/initial"), 1);
    assert_eq!(count("deck/shuffled"), 4);
    assert_eq!(count("deck/locked"), 4);
    for log in &logs {
        assert_eq!(*log.lock(), vec!["finish".to_string()]);
    }
}

#[test]
fn test_messages_for_unknown_decks_are_parked() {
    let mut table = Table::new(3);
    table.start();

    let logs: Vec<Log> = (0..3).map(|_| log()).collect();
    let id = add_deck(&mut table.peers[0].game, &["a", "b", "c", "d"], &logs[0]);
    table.peers[0].game.shuffle_deck(id).unwrap();
    table.settle();
    assert!(table.peers[1].game.deck(id).is_none());

    for i in 1..3 {
        let game = &mut table.peers[i].game;
        assert_eq!(add_deck(game, &["a", "b", "c", "d"], &logs[i]), id);
        game.shuffle_deck(id).unwrap();
    }
    table.settle();

    for (peer, log) in table.peers.iter().zip(&logs) {
        assert_eq!(*log.lock(), vec!["finish".to_string()]);
        let deck = peer.game.deck(id).unwrap();
        assert!(deck.is_shuffled());
        assert_eq!(deck.deferred_count(), 0);
    }
}

#[test]
fn test_start_twice_is_an_error() {
    let mut table = Table::new(2);
    table.start();
    let mut observer = table.observer();

    assert_eq!(table.peers[0].game.start(), Err(GameError::AlreadyStarted));
    assert_eq!(table.settle(), 0);
    assert!(observer.kinds().is_empty());
    assert_eq!(table.peers[0].game.player_number(), Some(0));
    assert_eq!(table.peers[0].game.players().unwrap().len(), 2);
}

#[test]
fn test_create_die_replaces_an_existing_die() {
    let mut table = Table::new(1);
    let (_, rolls) = add_die(&mut table.peers[0].game, DieFaces::default());
    let die = table.peers[0]
        .game
        .create_die("d", DieFaces::Count(4))
        .unwrap();
    assert_eq!(die.faces().len(), 4);
    table.start();

    // the replacement starts without listeners
    assert_eq!(
        table.peers[0].game.roll("d"),
        Err(GameError::Deck(DeckError::NoErrorListener))
    );
    assert!(rolls.lock().is_empty());
}

#[test]
fn test_start_requires_error_listeners() {
    let mut table = Table::new(2);
    table.peers[0].game.create_deck(["a", "b"]).unwrap();

    assert_eq!(
        table.peers[0].game.start(),
        Err(GameError::Deck(DeckError::NoErrorListener))
    );
    assert_eq!(table.settle(), 0);
    assert!(!table.peers[1].game.is_started());
}

#[test]
fn test_roll_requires_error_listener() {
    let mut table = Table::new(2);
    table.peers[0]
        .game
        .create_die("bare", DieFaces::default())
        .unwrap();
    table.start();

    assert_eq!(
        table.peers[0].game.roll("bare"),
        Err(GameError::Deck(DeckError::NoErrorListener))
    );
    assert_eq!(table.settle(), 0);
    assert_eq!(
        table.peers[0].game.roll("missing"),
        Err(GameError::UnknownDie("missing".into()))
    );
}

#[test]
fn test_invalid_face_counts() {
    let mut table = Table::new(1);
    let game = &mut table.peers[0].game;
    assert!(matches!(
        game.create_deck(["only"]),
        Err(GameError::InvalidFaceCount(1))
    ));
    let faces: Vec<String> = (0..53).map(|i| i.to_string()).collect();
    assert!(matches!(
        game.create_deck(faces),
        Err(GameError::InvalidFaceCount(53))
    ));
    assert!(matches!(
        game.create_die("d1", DieFaces::Count(1)),
        Err(GameError::InvalidFaceCount(1))
    ));
    assert!(game.create_die("d52", DieFaces::Count(52)).is_ok());
}

#[test]
fn test_piece_moves_reach_everyone() {
    let mut table = Table::new(3);
    let moves: Vec<Arc<Mutex<Vec<(f64, f64)>>>> = table
        .peers
        .iter_mut()
        .map(|peer| {
            let moves = Arc::new(Mutex::new(Vec::new()));
            let m = moves.clone();
            peer.game
                .create_piece("pawn")
                .on
                .moved
                .add(move |pos| m.lock().push(*pos));
            moves
        })
        .collect();
    table.start();

    table.peers[1].game.move_piece("pawn", 1.5, -2.0).unwrap();
    table.settle();

    for (peer, moves) in table.peers.iter().zip(&moves) {
        assert_eq!(*moves.lock(), vec![(1.5, -2.0)]);
        assert_eq!(peer.game.piece("pawn").unwrap().position(), Some((1.5, -2.0)));
    }
    assert_eq!(
        table.peers[0].game.move_piece("rook", 0.0, 0.0),
        Err(GameError::UnknownPiece("rook".into()))
    );
}

#[test]
fn test_roster_and_player_numbers() {
    let mut table = Table::new(3);
    let started = Arc::new(Mutex::new(0));
    let s = started.clone();
    table.peers[2].game.on.start.add(move |_| *s.lock() += 1);
    table.start();

    let roster: Vec<UserId> = (0..3).map(|i| UserId(format!("user-{}", i))).collect();
    for (i, peer) in table.peers.iter().enumerate() {
        assert_eq!(peer.game.players(), Some(roster.as_slice()));
        assert_eq!(peer.game.player_number(), Some(i));
        assert_eq!(peer.game.number_of_players().unwrap(), 3);
    }
    assert_eq!(*started.lock(), 1);

    // start is remembered for late listeners
    let late = Arc::new(Mutex::new(false));
    let l = late.clone();
    table.peers[1].game.on.start.add(move |_| *l.lock() = true);
    assert!(*late.lock());
}

#[test]
fn test_join_and_leave_signals() {
    let mut table = Table::new(2);
    let seen = log();
    let s = seen.clone();
    table.peers[0]
        .game
        .on
        .player_join
        .add(move |user| s.lock().push(format!("join:{}", user)));
    let s = seen.clone();
    table.peers[0]
        .game
        .on
        .player_leave
        .add(move |user| s.lock().push(format!("leave:{}", user)));

    let observer = table.observer();
    drop(observer);
    table.peers.pop();
    table.settle();

    assert_eq!(
        *seen.lock(),
        vec![
            "join:observer".to_string(),
            "leave:observer".to_string(),
            "leave:user-1".to_string()
        ]
    );
}

#[test]
fn test_url_needs_a_connection() {
    let game: Game<LocalChannel> = Game::new(GameConfig::default()).unwrap();
    assert_eq!(
        game.url("https://example.org/play"),
        Err(GameError::ConnectionNotStarted)
    );
    assert_eq!(game.number_of_players(), Err(GameError::ConnectionNotStarted));

    let table = Table::new(1);
    let url = table.peers[0]
        .game
        .url("https://example.org/play#old")
        .unwrap();
    assert_eq!(url, format!("https://example.org/play#{}", table.channel_id));
}
