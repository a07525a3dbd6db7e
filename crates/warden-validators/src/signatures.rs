//! Known cheat-client signatures: packet sequences, timing windows, and
//! compression bands observed from popular cheat clients.

use warden_model::PacketKind;

/// An anomalous inter-packet timing window between two packet kinds.
#[derive(Debug, Clone, PartialEq)]
pub struct TimingWindow {
    /// Earlier packet kind.
    pub first: PacketKind,
    /// Later packet kind.
    pub second: PacketKind,
    /// Window start (inclusive), ms.
    pub min_gap_ms: u64,
    /// Window end (inclusive), ms.
    pub max_gap_ms: u64,
    /// Match confidence.
    pub confidence: f64,
}

/// A compression-ratio band characteristic of a cheat client.
///
/// Ratio = actual time span / (packet count × nominal tick time); honest
/// clients hover near 1.0, timer cheats compress it well below.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressionBand {
    /// Band start (inclusive).
    pub min_ratio: f64,
    /// Band end (inclusive).
    pub max_ratio: f64,
    /// Match confidence.
    pub confidence: f64,
}

/// One known cheat-client signature.
#[derive(Debug, Clone, PartialEq)]
pub struct CheatSignature {
    /// Stable signature name, referenced in evidence.
    pub name: &'static str,
    /// Ordered packet-kind sequence; an exact suffix match of the live
    /// stream triggers the signature.
    pub sequence: Vec<PacketKind>,
    /// Confidence of a sequence match.
    pub confidence: f64,
    /// Anomalous timing windows between packet pairs.
    pub timing_windows: Vec<TimingWindow>,
    /// Known compression-ratio bands.
    pub compression_bands: Vec<CompressionBand>,
}

/// The signature table consulted by the packet-flow validator.
#[derive(Debug, Clone)]
pub struct SignatureTable {
    signatures: Vec<CheatSignature>,
}

impl SignatureTable {
    /// An empty table (all signature checks disabled).
    pub fn empty() -> Self {
        Self {
            signatures: Vec::new(),
        }
    }

    /// Builds a table from explicit signatures.
    pub fn new(signatures: Vec<CheatSignature>) -> Self {
        Self { signatures }
    }

    /// The built-in signatures shipped with the engine.
    pub fn builtin() -> Self {
        use PacketKind::*;
        Self::new(vec![
            CheatSignature {
                name: "rapidfire-crescent",
                sequence: vec![Swing, UseEntity, Swing, UseEntity],
                confidence: 0.92,
                timing_windows: vec![TimingWindow {
                    first: Swing,
                    second: UseEntity,
                    min_gap_ms: 0,
                    max_gap_ms: 15,
                    confidence: 0.85,
                }],
                compression_bands: vec![],
            },
            CheatSignature {
                name: "packetfly-meteor",
                sequence: vec![Abilities, Movement, Movement, Abilities],
                confidence: 0.88,
                timing_windows: vec![],
                compression_bands: vec![CompressionBand {
                    min_ratio: 0.05,
                    max_ratio: 0.4,
                    confidence: 0.8,
                }],
            },
            CheatSignature {
                name: "autoeat-ferrous",
                sequence: vec![HeldItem, Window, HeldItem, Window],
                confidence: 0.75,
                timing_windows: vec![TimingWindow {
                    first: HeldItem,
                    second: Window,
                    min_gap_ms: 0,
                    max_gap_ms: 5,
                    confidence: 0.7,
                }],
                compression_bands: vec![],
            },
        ])
    }

    /// All signatures.
    pub fn signatures(&self) -> &[CheatSignature] {
        &self.signatures
    }

    /// Signatures whose sequence is an exact suffix of `stream`.
    pub fn suffix_matches<'a>(&'a self, stream: &[PacketKind]) -> Vec<&'a CheatSignature> {
        self.signatures
            .iter()
            .filter(|sig| {
                !sig.sequence.is_empty()
                    && stream.len() >= sig.sequence.len()
                    && stream[stream.len() - sig.sequence.len()..] == sig.sequence[..]
            })
            .collect()
    }
}

impl Default for SignatureTable {
    fn default() -> Self {
        Self::builtin()
    }
}
