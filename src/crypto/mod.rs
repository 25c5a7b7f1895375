pub mod signatures;

pub use signatures::{EntrySignature, IntegritySigner, SigningMode};
