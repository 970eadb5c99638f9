mod client;
mod factory;

pub use client::*;
pub use factory::*;
