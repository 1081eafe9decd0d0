pub mod ecc;
pub mod error;
pub mod transfer;

pub use ecc::{Decoder, Droplet, Encoder, EncoderParameters, Glass};
pub use error::{Error, Result};
pub use transfer::{Receiver, ReceiverConfig};
