//! The bot itself: game client, economy scanner, decision loop,
//! save-file persistence, and the user-facing status logger.
//!
//! The split mirrors the tick: [`game`] knows how to ask the page things,
//! [`economy`] turns the answers into scored purchase options, [`bot`]
//! runs the loop that picks and executes one option per tick, [`savefile`]
//! holds the exported save blob on disk, and [`echo`] prints what happened.

pub mod bot;
pub mod echo;
pub mod economy;
pub mod error;
pub mod game;
pub mod html;
pub mod savefile;

pub use bot::BotSession;
pub use echo::Echo;
pub use error::BotError;
pub use game::GameClient;
pub use savefile::SaveFile;
