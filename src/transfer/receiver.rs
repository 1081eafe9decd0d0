//! Receive-side session.
//!
//! A [`Receiver`] takes droplet wire strings one at a time, for example as
//! they come off a QR scanner, and turns completed streams into files. It
//! validates every droplet against [`DropletLimits`], follows stream switches,
//! skips streams whose payload was already delivered, and interprets the file
//! framing of [`crate::transfer::frame`].

use crate::ecc::decoder::{Decoder, DropletStatus, Progress};
use crate::ecc::droplet::{Droplet, DropletLimits};
use crate::error::Result;
use crate::transfer::frame::{decompress, split_payload};
use log::{debug, info, warn};
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// Configuration for a receive session
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReceiverConfig {
    /// Limits applied to every incoming droplet
    pub limits: DropletLimits,
}

/// A completed file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedFile {
    /// File name from the header, or a generated one
    pub name: String,
    /// Position in the batch, when the header carried one
    pub index: Option<usize>,
    /// Batch size, when the header carried one
    pub total: Option<usize>,
    /// File contents, decompressed if the sender compressed them
    pub body: Vec<u8>,
}

/// What a completed stream turned out to be
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// A regular file
    File(ReceivedFile),
    /// The batch manifest: this many files follow
    Manifest(usize),
}

/// Identity of an already delivered stream: chunk count, padding, SHA-256
type Fingerprint = (usize, usize, Vec<u8>);

/// Droplet-by-droplet receive session
#[derive(Debug)]
pub struct Receiver {
    config: ReceiverConfig,
    decoder: Decoder,
    delivered: HashSet<Fingerprint>,
    /// Counter used to name files that arrive without a name
    file_index: usize,
    expected_total: Option<usize>,
    completed_total: usize,
    total_files: usize,
    received_files: usize,
}

impl Receiver {
    /// Create a session with the given configuration
    pub fn new(config: ReceiverConfig) -> Self {
        Self {
            decoder: Decoder::with_limits(config.limits.clone()),
            config,
            delivered: HashSet::new(),
            file_index: 1,
            expected_total: None,
            completed_total: 0,
            total_files: 0,
            received_files: 0,
        }
    }

    /// Feed one wire string.
    ///
    /// Returns the delivery completed by this droplet, if any.
    ///
    /// # Errors
    ///
    /// `Format` for strings that do not parse and `InvalidDroplet` for
    /// droplets outside the configured limits. Either way the droplet is
    /// dropped and the session is unchanged.
    pub fn feed(&mut self, line: &str) -> Result<Option<Delivery>> {
        let droplet: Droplet = line.parse()?;
        self.feed_droplet(droplet)
    }

    /// Feed one already parsed droplet.
    ///
    /// # Errors
    ///
    /// `InvalidDroplet` for droplets outside the configured limits.
    pub fn feed_droplet(&mut self, droplet: Droplet) -> Result<Option<Delivery>> {
        if self.decoder.add_droplet(droplet)? == DropletStatus::Duplicate {
            return Ok(None);
        }

        let progress = self.decoder.progress();
        debug!(
            "progress {}/{} chunks, {} droplets",
            progress.done, progress.total, progress.received
        );

        let Some(glass) = self.decoder.glass().filter(|g| g.is_done()) else {
            return Ok(None);
        };
        let (num_chunks, padding) = (glass.num_chunks(), glass.padding());
        let Some(data) = self.decoder.take_data() else {
            return Ok(None);
        };

        let fingerprint = (num_chunks, padding, Sha256::digest(&data).to_vec());
        if !self.delivered.insert(fingerprint) {
            info!("stream already delivered, skipping");
            return Ok(None);
        }

        Ok(self.deliver(&data))
    }

    fn deliver(&mut self, data: &[u8]) -> Option<Delivery> {
        let (header, body) = split_payload(data);

        if header.is_manifest() {
            let text = String::from_utf8_lossy(body);
            return match text.trim().parse::<usize>() {
                Ok(count) => {
                    info!("batch of {count} files announced");
                    self.expected_total = Some(count);
                    self.completed_total = 0;
                    Some(Delivery::Manifest(count))
                }
                Err(_) => {
                    warn!("unreadable file count in manifest: {:?}", text.trim());
                    None
                }
            };
        }

        if let Some(total) = header.total.filter(|&t| t > 0) {
            self.total_files = total;
        }

        if self
            .expected_total
            .is_some_and(|expected| self.completed_total >= expected)
        {
            warn!("all announced files received, ignoring extra file");
            return None;
        }

        let name = if header.name.is_empty() {
            format!("qr_output_{}", self.file_index)
        } else {
            header.name
        };
        let body = decompress(body).into_owned();

        self.file_index += 1;
        self.completed_total += 1;
        self.received_files += 1;
        info!("received {} ({} bytes)", name, body.len());

        Some(Delivery::File(ReceivedFile {
            name,
            index: header.index,
            total: header.total,
            body,
        }))
    }

    /// Progress of the stream currently being received
    pub fn progress(&self) -> Progress {
        self.decoder.progress()
    }

    /// Files received so far and the batch size announced by headers
    pub fn file_progress(&self) -> (usize, usize) {
        (self.received_files, self.total_files)
    }

    /// Whether every file of an announced batch has arrived
    pub fn is_all_done(&self) -> bool {
        let announced = self.expected_total.unwrap_or(self.total_files);
        announced > 0 && self.received_files >= announced
    }

    /// Drop the stream in progress, keeping delivery history
    pub fn reset(&mut self) {
        self.decoder.reset();
    }

    /// Forget everything, including which streams were already delivered
    pub fn reset_all(&mut self) {
        *self = Self::new(self.config.clone());
    }
}

impl Default for Receiver {
    fn default() -> Self {
        Self::new(ReceiverConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecc::encoder::Encoder;
    use crate::error::Error;
    use crate::transfer::frame::{build_payload, manifest_payload, maybe_compress, FileHeader};

    fn wire_lines(payload: &[u8], chunk_size: usize, count: usize) -> Vec<String> {
        Encoder::with_chunk_size(payload, chunk_size)
            .unwrap()
            .take(count)
            .map(|d| d.to_wire())
            .collect()
    }

    /// Feed lines until something is delivered
    fn receive(receiver: &mut Receiver, lines: &[String]) -> Option<Delivery> {
        lines
            .iter()
            .find_map(|line| receiver.feed(line).ok().flatten())
    }

    #[test]
    fn test_receives_single_file() {
        let body = b"The quick brown fox jumps over the lazy dog".to_vec();
        let payload = build_payload(&FileHeader::single("fox.txt"), &body);
        let lines = wire_lines(&payload, 8, 200);

        let mut receiver = Receiver::new(ReceiverConfig::default());
        let delivery = receive(&mut receiver, &lines).unwrap();

        assert_eq!(
            delivery,
            Delivery::File(ReceivedFile {
                name: "fox.txt".to_string(),
                index: None,
                total: None,
                body,
            })
        );
        assert_eq!(receiver.file_progress(), (1, 0));
        assert_eq!(receiver.progress(), Progress::default());
    }

    #[test]
    fn test_compressed_body_is_inflated() {
        let body = vec![b'z'; 5_000];
        let framed = maybe_compress(&body);
        let payload = build_payload(&FileHeader::single("zeds.txt"), &framed);
        let lines = wire_lines(&payload, 16, 200);

        let mut receiver = Receiver::new(ReceiverConfig::default());
        match receive(&mut receiver, &lines) {
            Some(Delivery::File(file)) => assert_eq!(file.body, body),
            other => panic!("unexpected delivery: {other:?}"),
        }
    }

    #[test]
    fn test_malformed_lines_are_errors() {
        let mut receiver = Receiver::new(ReceiverConfig::default());

        assert!(matches!(receiver.feed("nonsense"), Err(Error::Format(_))));
        assert!(matches!(
            receiver.feed("1|2|3|@@@"),
            Err(Error::Format(_))
        ));
        assert!(matches!(
            receiver.feed("1|0|0|AAAA"),
            Err(Error::InvalidDroplet(_))
        ));
        assert!(matches!(
            receiver.feed("1|2|5000|AAAA"),
            Err(Error::InvalidDroplet(_))
        ));
        assert!(receiver.decoder.glass().is_none());
    }

    #[test]
    fn test_parsed_droplets_are_checked_too() {
        let mut receiver = Receiver::new(ReceiverConfig::default());
        let huge = Droplet::new(1, usize::MAX, 0, vec![0; 3]);

        assert!(matches!(
            receiver.feed_droplet(huge),
            Err(Error::InvalidDroplet(_))
        ));
        assert_eq!(receiver.progress(), Progress::default());
    }

    #[test]
    fn test_configured_chunk_size_is_enforced() {
        let config = ReceiverConfig {
            limits: DropletLimits {
                chunk_size: Some(8),
                ..DropletLimits::default()
            },
        };
        let mut receiver = Receiver::new(config);

        let lines = wire_lines(&[1u8; 40], 10, 1);
        assert!(matches!(
            receiver.feed(&lines[0]),
            Err(Error::InvalidDroplet(_))
        ));
    }

    #[test]
    fn test_repeated_stream_is_delivered_once() {
        let payload = build_payload(&FileHeader::single("loop.bin"), &[7u8; 300]);
        let lines = wire_lines(&payload, 20, 400);

        let mut receiver = Receiver::new(ReceiverConfig::default());
        assert!(receive(&mut receiver, &lines).is_some());

        // The sender loops the same droplets; the second pass is ignored
        assert!(receive(&mut receiver, &lines).is_none());
        assert_eq!(receiver.file_progress(), (1, 0));
    }

    #[test]
    fn test_batch_with_manifest() {
        let files = [("a.txt", vec![b'a'; 100]), ("b.txt", vec![b'b'; 150])];

        let mut receiver = Receiver::new(ReceiverConfig::default());
        let manifest = wire_lines(&manifest_payload(2), 16, 50);
        assert_eq!(
            receive(&mut receiver, &manifest),
            Some(Delivery::Manifest(2))
        );

        for (i, (name, body)) in files.iter().enumerate() {
            let payload = build_payload(&FileHeader::batch(*name, i + 1, files.len()), body);
            match receive(&mut receiver, &wire_lines(&payload, 16, 300)) {
                Some(Delivery::File(file)) => {
                    assert_eq!(file.name, *name);
                    assert_eq!(file.index, Some(i + 1));
                    assert_eq!(file.total, Some(2));
                    assert_eq!(&file.body, body);
                }
                other => panic!("unexpected delivery: {other:?}"),
            }
        }

        assert_eq!(receiver.file_progress(), (2, 2));
        assert!(receiver.is_all_done());

        // A third file beyond the announced count is ignored
        let extra = build_payload(&FileHeader::single("c.txt"), b"surplus file");
        assert!(receive(&mut receiver, &wire_lines(&extra, 16, 100)).is_none());
    }

    #[test]
    fn test_unnamed_payload_gets_generated_name() {
        let lines = wire_lines(b"no header at all", 4, 100);
        let mut receiver = Receiver::new(ReceiverConfig::default());

        match receive(&mut receiver, &lines) {
            Some(Delivery::File(file)) => {
                assert_eq!(file.name, "qr_output_1");
                assert_eq!(file.body, b"no header at all");
            }
            other => panic!("unexpected delivery: {other:?}"),
        }
    }

    #[test]
    fn test_stream_switch_mid_transfer() {
        let first = build_payload(&FileHeader::single("one"), &[1u8; 200]);
        let second = build_payload(&FileHeader::single("two"), &[2u8; 400]);

        let mut receiver = Receiver::new(ReceiverConfig::default());
        for line in wire_lines(&first, 16, 3) {
            assert_eq!(receiver.feed(&line).unwrap(), None);
        }
        assert!(receiver.progress().total > 0);

        match receive(&mut receiver, &wire_lines(&second, 16, 400)) {
            Some(Delivery::File(file)) => assert_eq!(file.name, "two"),
            other => panic!("unexpected delivery: {other:?}"),
        }
    }

    #[test]
    fn test_reset_all_forgets_history() {
        let payload = build_payload(&FileHeader::single("again"), &[9u8; 64]);
        let lines = wire_lines(&payload, 8, 200);

        let mut receiver = Receiver::new(ReceiverConfig::default());
        assert!(receive(&mut receiver, &lines).is_some());
        receiver.reset_all();
        assert!(receive(&mut receiver, &lines).is_some());
    }
}
