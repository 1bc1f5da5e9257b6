//! dice-table: roll a fair die among in-process peers and check they agree

use std::time::Duration;

use anyhow::{bail, Context, Result};
use boardgame_p2p::{
    Channel, Connection, DeckError, DieFaces, Face, Game, GameConfig, LocalChannel, LocalHub,
    Session, SessionHandle,
};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "dice-table")]
#[command(about = "roll a die that no single peer controls", long_about = None)]
struct Args {
    /// peers at the table
    #[arg(long, default_value_t = 3)]
    players: usize,

    /// faces on the die
    #[arg(long, default_value_t = 6)]
    faces: usize,

    /// rolls, the roller rotates through the table
    #[arg(long, default_value_t = 3)]
    rolls: usize,

    /// seconds to wait on other peers before giving up
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,

    /// log filter used when RUST_LOG is unset
    #[arg(long, env = "DICE_TABLE_LOG", default_value = "info")]
    log_level: String,
}

struct Table {
    handles: Vec<SessionHandle<LocalChannel>>,
    tasks: Vec<tokio::task::JoinHandle<()>>,
    started: mpsc::UnboundedReceiver<usize>,
    results: mpsc::UnboundedReceiver<(usize, Face)>,
    errors: mpsc::UnboundedReceiver<(usize, DeckError)>,
}

fn seat_peers(args: &Args, config: &GameConfig) -> Result<Table> {
    let hub = LocalHub::new();
    let (started_tx, started) = mpsc::unbounded_channel();
    let (results_tx, results) = mpsc::unbounded_channel();
    let (errors_tx, errors) = mpsc::unbounded_channel();

    let mut channel_id: Option<String> = None;
    let mut handles = Vec::new();
    let mut tasks = Vec::new();

    for peer in 0..args.players {
        let conn = Connection::new(hub.clone(), format!("peer-{}", peer));
        let (channel, inbound) = match &channel_id {
            None => conn.open()?,
            Some(id) => conn.connect(id)?,
        };
        if channel_id.is_none() {
            info!("hosting table {}", channel.id());
            channel_id = Some(channel.id().to_owned());
        }

        let mut game = Game::new(config.clone())?;
        game.start_connection(channel);

        let tx = started_tx.clone();
        game.on.start.add(move |_| {
            let _ = tx.send(peer);
        });

        let die = game.create_die("die", DieFaces::Count(args.faces))?;
        let tx = results_tx.clone();
        die.on.roll_finish.add(move |face| {
            let _ = tx.send((peer, face.clone()));
        });
        let tx = errors_tx.clone();
        die.on.error.add(move |error| {
            let _ = tx.send((peer, error.clone()));
        });

        let mut session = Session::new(game, inbound);
        handles.push(session.handle());
        tasks.push(tokio::spawn(async move { session.run().await }));
    }

    Ok(Table {
        handles,
        tasks,
        started,
        results,
        errors,
    })
}

async fn wait_for_starts(table: &mut Table, players: usize, timeout: Duration) -> Result<()> {
    for _ in 0..players {
        tokio::time::timeout(timeout, table.started.recv())
            .await
            .context("peers did not start in time")?
            .context("start listeners dropped")?;
    }
    Ok(())
}

async fn collect_roll(table: &mut Table, players: usize, timeout: Duration) -> Result<Vec<Face>> {
    let mut faces = vec![None; players];
    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);

    while faces.iter().any(Option::is_none) {
        tokio::select! {
            Some((peer, face)) = table.results.recv() => faces[peer] = Some(face),
            Some((peer, error)) = table.errors.recv() => bail!("peer {} failed: {}", peer, error),
            _ = &mut deadline => bail!("roll did not finish within {:?}", timeout),
        }
    }
    Ok(faces.into_iter().flatten().collect())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.as_str().into()),
        )
        .init();

    if args.players == 0 {
        bail!("need at least one player");
    }
    let timeout = Duration::from_secs(args.timeout_secs);
    let config = GameConfig::with_timeout(timeout);
    config.validate()?;

    let mut table = seat_peers(&args, &config)?;
    info!("{} peers seated, starting", args.players);

    table.handles[0].execute(|game: &mut Game<LocalChannel>| {
        if let Err(e) = game.start() {
            tracing::warn!("start failed: {}", e);
        }
    })?;
    wait_for_starts(&mut table, args.players, timeout).await?;

    for roll in 0..args.rolls {
        let roller = roll % args.players;
        table.handles[roller].execute(move |game: &mut Game<LocalChannel>| {
            if let Err(e) = game.roll("die") {
                tracing::warn!("peer {} cannot roll: {}", roller, e);
            }
        })?;

        let faces = collect_roll(&mut table, args.players, timeout).await?;
        for (peer, face) in faces.iter().enumerate() {
            println!("roll {} by peer {}: peer {} saw {}", roll, roller, peer, face);
        }
        if faces.iter().any(|face| face != &faces[0]) {
            bail!("peers disagree on roll {}: {:?}", roll, faces);
        }
    }

    for task in table.tasks {
        task.abort();
    }
    info!("all {} rolls agreed", args.rolls);
    Ok(())
}
