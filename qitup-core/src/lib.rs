mod config;
mod credentials;
mod events;
mod item;
mod playback;
mod util;

pub use config::*;
pub use credentials::*;
pub use events::*;
pub use item::*;
pub use playback::*;
pub use util::*;
