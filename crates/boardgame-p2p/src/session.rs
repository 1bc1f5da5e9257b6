//! session - drives one game from its inbound channel events
//!
//! the game itself never blocks or spawns. a session owns it together with
//! the receiver its channel delivers to, runs commands sent through a
//! `SessionHandle` and checks protocol timeouts on a fixed interval.

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::channel::{Channel, ChannelEvent};
use crate::game::{now, Game, GameError};

type Command<C> = Box<dyn FnOnce(&mut Game<C>) + Send>;

pub struct Session<C> {
    game: Game<C>,
    inbound: mpsc::UnboundedReceiver<ChannelEvent>,
    commands: mpsc::UnboundedReceiver<Command<C>>,
    handle: SessionHandle<C>,
}

/// send work to a running session from anywhere
pub struct SessionHandle<C> {
    commands: mpsc::UnboundedSender<Command<C>>,
}

impl<C> Clone for SessionHandle<C> {
    fn clone(&self) -> Self {
        Self {
            commands: self.commands.clone(),
        }
    }
}

impl<C: Channel> SessionHandle<C> {
    /// run `f` on the game inside the session task
    pub fn execute(&self, f: impl FnOnce(&mut Game<C>) + Send + 'static) -> Result<(), GameError> {
        self.commands
            .send(Box::new(f))
            .map_err(|_| GameError::SessionClosed)
    }
}

impl<C: Channel> Session<C> {
    pub fn new(game: Game<C>, inbound: mpsc::UnboundedReceiver<ChannelEvent>) -> Self {
        let (tx, commands) = mpsc::unbounded_channel();
        Self {
            game,
            inbound,
            commands,
            handle: SessionHandle { commands: tx },
        }
    }

    pub fn handle(&self) -> SessionHandle<C> {
        self.handle.clone()
    }

    pub fn game(&self) -> &Game<C> {
        &self.game
    }

    pub fn game_mut(&mut self) -> &mut Game<C> {
        &mut self.game
    }

    pub fn into_game(self) -> Game<C> {
        self.game
    }

    /// handle one queued inbound event, false if none was waiting
    pub fn step(&mut self) -> bool {
        match self.inbound.try_recv() {
            Ok(event) => {
                self.game.handle_channel_event(event);
                true
            }
            Err(_) => false,
        }
    }

    /// run queued commands and events until both queues are empty
    pub fn run_until_idle(&mut self) -> usize {
        let mut handled = 0;
        loop {
            let mut progressed = false;
            while let Ok(command) = self.commands.try_recv() {
                command(&mut self.game);
                handled += 1;
                progressed = true;
            }
            while self.step() {
                handled += 1;
                progressed = true;
            }
            if !progressed {
                return handled;
            }
        }
    }

    /// run until the channel closes
    pub async fn run(&mut self) {
        let mut ticker = tokio::time::interval(self.game.config().timeout_check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                event = self.inbound.recv() => match event {
                    Some(event) => self.game.handle_channel_event(event),
                    None => {
                        tracing::debug!("inbound channel closed, session ends");
                        return;
                    }
                },
                Some(command) = self.commands.recv() => command(&mut self.game),
                _ = ticker.tick() => self.game.check_timeouts(now()),
            }
        }
    }
}
