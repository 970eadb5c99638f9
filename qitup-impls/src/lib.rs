mod spotify;

pub use spotify::*;
