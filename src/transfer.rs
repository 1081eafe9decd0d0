//! File transfer over a one-way droplet stream.
//!
//! A sender frames each file with a header line, optionally compresses the
//! body, and fountain-encodes the result. The receiver decodes droplets as
//! they arrive and hands back completed files.

pub mod frame;
pub mod receiver;

pub use frame::{
    build_payload, decompress, manifest_payload, maybe_compress, split_payload, FileHeader,
    COMPRESS_MAGIC, MANIFEST_NAME,
};
pub use receiver::{Delivery, ReceivedFile, Receiver, ReceiverConfig};
