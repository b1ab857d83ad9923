pub mod cipher;
pub mod crypto;
pub mod entropy;
pub mod error;
pub mod events;
pub mod kat;
pub mod keys;

pub use crate::cipher::Eamsa512;
pub use crate::error::{CipherError, Result};
