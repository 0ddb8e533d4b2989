pub mod wal2json;

pub use wal2json::{decode, Decoded};
