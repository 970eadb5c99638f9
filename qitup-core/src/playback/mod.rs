mod adapter;
mod player;
mod reconcile;
mod remote;

pub use adapter::*;
pub use player::*;
pub use reconcile::*;
pub use remote::*;
