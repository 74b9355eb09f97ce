//! # Siamese Pair Index
//!
//! Indexes the labeled edges of a whole ROI as training pairs for a node
//! embedding network. Each pair is the two endpoint fragments of an edge;
//! the target is `+1.0` for "same neuron" (label 0) and `-1.0` for "different
//! neuron" (label 1).
//!
//! Volumetric patches come from a [`PatchProvider`]; this module only decides
//! which box to request and how the returned volumes become channels.

use crate::balance::sample_weights;
use crate::graph::RagProvider;
use crate::{EdgeRecord, ExcerptError, NodeId, NodeRecord, Position, Region};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Target for a pair whose ground-truth label is `value`.
///
/// Label 0 (merge) maps to `+1.0`, label 1 (split) to `-1.0`.
pub fn pair_target(value: f32) -> Result<f32, ExcerptError> {
    if value == 0.0 {
        Ok(1.0)
    } else if value == 1.0 {
        Ok(-1.0)
    } else {
        Err(ExcerptError::InvalidLabel { value })
    }
}

// =============================================================================
// PATCH CONFIGURATION
// =============================================================================

/// Which channels a patch carries. Channel order is always
/// `raw_mask`, `raw`, `mask`, skipping disabled ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Raw intensities.
    pub raw: bool,
    /// Binary mask of the fragment.
    pub mask: bool,
    /// Raw intensities inside the fragment, zero elsewhere.
    pub raw_mask: bool,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            raw: true,
            mask: true,
            raw_mask: false,
        }
    }
}

impl ChannelConfig {
    pub fn validate(&self) -> Result<(), ExcerptError> {
        if !(self.raw || self.mask || self.raw_mask) {
            return Err(ExcerptError::InvalidConfig(
                "at least one patch channel must be enabled".to_string(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn count(&self) -> usize {
        usize::from(self.raw) + usize::from(self.mask) + usize::from(self.raw_mask)
    }

    fn needs_raw(&self) -> bool {
        self.raw || self.raw_mask
    }

    fn needs_labels(&self) -> bool {
        self.mask || self.raw_mask
    }
}

/// Patch geometry and channels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatchConfig {
    /// Patch extent in world units (z, y, x).
    pub patch_shape: [i64; 3],
    /// Voxel size of the volumes (z, y, x).
    pub voxel_size: [i64; 3],
    #[serde(flatten)]
    pub channels: ChannelConfig,
}

impl Default for PatchConfig {
    fn default() -> Self {
        Self {
            patch_shape: [128, 128, 128],
            voxel_size: [8, 8, 8],
            channels: ChannelConfig::default(),
        }
    }
}

impl PatchConfig {
    pub fn validate(&self) -> Result<(), ExcerptError> {
        if self.patch_shape.iter().any(|&s| s <= 0) {
            return Err(ExcerptError::InvalidConfig(format!(
                "patch shape must be positive, got {:?}",
                self.patch_shape
            )));
        }
        if self.voxel_size.iter().any(|&v| v <= 0) {
            return Err(ExcerptError::InvalidConfig(format!(
                "voxel size must be positive, got {:?}",
                self.voxel_size
            )));
        }
        self.channels.validate()
    }
}

// =============================================================================
// PATCH CAPABILITY
// =============================================================================

/// A box of volumetric data to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchRequest {
    /// Box in world units, snapped to the voxel grid.
    pub region: Region,
    /// Whether raw intensities are needed.
    pub raw: bool,
    /// Whether fragment labels are needed.
    pub labels: bool,
}

impl PatchRequest {
    /// Box of `config.patch_shape` centred on `center`, snapped to the voxel
    /// grid.
    pub fn centered(center: &Position, config: &PatchConfig) -> Result<Self, ExcerptError> {
        let c = center.to_array();
        let offset = [0, 1, 2]
            .map(|axis| (c[axis] - config.patch_shape[axis] as f64 / 2.0).round() as i64);
        let region = Region::new(offset, config.patch_shape).snap_to_grid(config.voxel_size)?;
        Ok(Self {
            region,
            raw: config.channels.needs_raw(),
            labels: config.channels.needs_labels(),
        })
    }
}

/// Raw intensities and fragment labels over the same box, row-major
/// `(z, y, x)` voxels. A volume that was not requested may be empty.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VolumePair {
    pub shape: [usize; 3],
    pub raw: Vec<f32>,
    pub labels: Vec<u64>,
}

impl VolumePair {
    #[must_use]
    pub fn voxel_count(&self) -> usize {
        self.shape.iter().product()
    }
}

/// Source of volumetric patches (raw data and fragment labels).
pub trait PatchProvider {
    fn fetch(&self, request: &PatchRequest) -> Result<VolumePair, ExcerptError>;
}

/// A multi-channel patch, channel-major then row-major voxels.
#[derive(Debug, Clone, PartialEq)]
pub struct Patch {
    pub shape: [usize; 3],
    pub channels: Vec<Vec<f32>>,
}

/// Turn fetched volumes into channels for fragment `id`.
pub fn compose_channels(
    volumes: &VolumePair,
    id: NodeId,
    channels: &ChannelConfig,
) -> Result<Patch, ExcerptError> {
    let voxels = volumes.voxel_count();
    if channels.needs_raw() && volumes.raw.len() != voxels {
        return Err(ExcerptError::PatchUnavailable(format!(
            "raw volume has {} voxels, expected {}",
            volumes.raw.len(),
            voxels
        )));
    }
    if channels.needs_labels() && volumes.labels.len() != voxels {
        return Err(ExcerptError::PatchUnavailable(format!(
            "label volume has {} voxels, expected {}",
            volumes.labels.len(),
            voxels
        )));
    }

    let inside = |label: &u64| if *label == id.0 { 1.0f32 } else { 0.0 };
    let mut out: Vec<Vec<f32>> = Vec::with_capacity(channels.count());
    if channels.raw_mask {
        out.push(
            volumes
                .raw
                .iter()
                .zip(&volumes.labels)
                .map(|(raw, label)| raw * inside(label))
                .collect(),
        );
    }
    if channels.raw {
        out.push(volumes.raw.clone());
    }
    if channels.mask {
        let mask: Vec<f32> = volumes.labels.iter().map(inside).collect();
        tracing::trace!(
            fragment = %id,
            overlap = mask.iter().filter(|&&m| m > 0.0).count(),
            "fragment overlap in patch"
        );
        out.push(mask);
    }

    Ok(Patch {
        shape: volumes.shape,
        channels: out,
    })
}

// =============================================================================
// PAIR DATASET
// =============================================================================

/// Endpoints and target of one training pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairSample {
    pub ids: [NodeId; 2],
    pub centers: [Position; 2],
    pub label: f32,
}

/// A pair together with its two patches.
#[derive(Debug, Clone, PartialEq)]
pub struct PairPatches {
    pub sample: PairSample,
    pub patches: [Patch; 2],
}

/// Labeled edges of an ROI, indexed for siamese training.
#[derive(Debug, Clone)]
pub struct PairDataset {
    positions: FxHashMap<NodeId, Position>,
    pairs: Vec<(NodeId, NodeId)>,
    labels: Vec<f32>,
    weights: Vec<f32>,
}

impl PairDataset {
    /// Read the whole `roi` from `provider` and index its labeled edges.
    pub fn load(provider: &dyn RagProvider, roi: &Region) -> Result<Self, ExcerptError> {
        let (nodes, edges) = provider.read_region(roi)?;
        Self::from_records(&nodes, &edges)
    }

    /// Index labeled edges whose endpoints both lie in `nodes`.
    ///
    /// Edges leaving the node set are dropped, as are edges whose label is
    /// anything but exactly 0 or 1.
    pub fn from_records(nodes: &[NodeRecord], edges: &[EdgeRecord]) -> Result<Self, ExcerptError> {
        let positions: FxHashMap<NodeId, Position> =
            nodes.iter().map(|n| (n.id, n.position)).collect();

        let inside: Vec<&EdgeRecord> = edges
            .iter()
            .filter(|e| positions.contains_key(&e.u) && positions.contains_key(&e.v))
            .collect();
        tracing::debug!(
            before = edges.len(),
            after = inside.len(),
            "dropped outgoing edges"
        );

        let labeled: Vec<&EdgeRecord> = inside
            .into_iter()
            .filter(|e| e.gt_label == 0.0 || e.gt_label == 1.0)
            .collect();

        let pairs = labeled.iter().map(|e| (e.u, e.v)).collect();
        let labels: Vec<f32> = labeled.iter().map(|e| e.gt_label).collect();
        let classes: Vec<i64> = labels.iter().map(|&l| l as i64).collect();
        let weights = sample_weights(&classes)?;

        tracing::debug!(nodes = positions.len(), pairs = labels.len(), "pair index");
        Ok(Self {
            positions,
            pairs,
            labels,
            weights,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Per-pair sampling weights `1 / count(class)`.
    #[must_use]
    pub fn sample_weights(&self) -> &[f32] {
        &self.weights
    }

    /// Number of pairs labeled 0 and 1.
    #[must_use]
    pub fn class_counts(&self) -> [usize; 2] {
        let ones = self.labels.iter().filter(|&&l| l == 1.0).count();
        [self.labels.len() - ones, ones]
    }

    /// Endpoints, centres and target of pair `index`.
    pub fn pair(&self, index: usize) -> Result<PairSample, ExcerptError> {
        let (&(u, v), &label) = self
            .pairs
            .get(index)
            .zip(self.labels.get(index))
            .ok_or(ExcerptError::IndexOutOfRange {
                index,
                len: self.len(),
            })?;
        let center = |id: NodeId| {
            self.positions
                .get(&id)
                .copied()
                .ok_or(ExcerptError::MissingNode { id })
        };
        Ok(PairSample {
            ids: [u, v],
            centers: [center(u)?, center(v)?],
            label: pair_target(label)?,
        })
    }

    /// Pair `index` with one patch per endpoint.
    pub fn get(
        &self,
        index: usize,
        provider: &dyn PatchProvider,
        config: &PatchConfig,
    ) -> Result<PairPatches, ExcerptError> {
        config.validate()?;
        let sample = self.pair(index)?;
        let patch = |slot: usize| -> Result<Patch, ExcerptError> {
            let request = PatchRequest::centered(&sample.centers[slot], config)?;
            let volumes = provider.fetch(&request)?;
            compose_channels(&volumes, sample.ids[slot], &config.channels)
        };
        Ok(PairPatches {
            sample,
            patches: [patch(0)?, patch(1)?],
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    fn node(id: u64, p: f64) -> NodeRecord {
        NodeRecord::new(NodeId(id), Position::new(p, p, p))
    }

    fn edge(u: u64, v: u64, label: f32) -> EdgeRecord {
        EdgeRecord::new(NodeId(u), NodeId(v), 0.5, label, 1.0)
    }

    fn dataset() -> PairDataset {
        PairDataset::from_records(
            &[node(1, 10.0), node(2, 20.0), node(3, 30.0)],
            &[
                edge(1, 2, 0.0),
                edge(2, 3, 1.0),
                edge(1, 3, 1.0),
                edge(3, 9, 0.0),
                edge(1, 2, 2.0),
                edge(2, 1, 0.5),
            ],
        )
        .expect("dataset")
    }

    #[test]
    fn filters_outgoing_and_unlabeled_edges() {
        let data = dataset();
        assert_eq!(data.len(), 3);
        assert_eq!(data.class_counts(), [1, 2]);
    }

    #[test]
    fn weights_are_inverse_class_counts() {
        let data = dataset();
        assert_eq!(data.sample_weights(), &[1.0, 0.5, 0.5]);
    }

    #[test]
    fn labels_map_to_similarity_targets() {
        let data = dataset();
        assert_eq!(data.pair(0).expect("pair").label, 1.0);
        assert_eq!(data.pair(1).expect("pair").label, -1.0);
        assert_eq!(
            data.pair(0).expect("pair").centers[1],
            Position::new(20.0, 20.0, 20.0)
        );
    }

    #[test]
    fn pair_out_of_range() {
        assert!(matches!(
            dataset().pair(3),
            Err(ExcerptError::IndexOutOfRange { index: 3, len: 3 })
        ));
    }

    #[test]
    fn other_labels_are_invalid() {
        assert!(matches!(
            pair_target(0.5),
            Err(ExcerptError::InvalidLabel { .. })
        ));
    }

    #[test]
    fn request_is_centred_and_snapped() {
        let config = PatchConfig {
            patch_shape: [40, 40, 40],
            voxel_size: [8, 8, 8],
            channels: ChannelConfig::default(),
        };
        let request =
            PatchRequest::centered(&Position::new(100.0, 100.0, 100.0), &config).expect("request");
        // offset 80 is already on the grid, end 120 snaps to 120
        assert_eq!(request.region, Region::new([80, 80, 80], [40, 40, 40]));
        assert!(request.raw && request.labels);
    }

    #[test]
    fn no_channel_rejected() {
        let channels = ChannelConfig {
            raw: false,
            mask: false,
            raw_mask: false,
        };
        assert!(channels.validate().is_err());
    }

    #[test]
    fn channels_follow_fixed_order() {
        let volumes = VolumePair {
            shape: [1, 1, 3],
            raw: vec![2.0, 3.0, 4.0],
            labels: vec![7, 8, 7],
        };
        let channels = ChannelConfig {
            raw: true,
            mask: true,
            raw_mask: true,
        };
        let patch = compose_channels(&volumes, NodeId(7), &channels).expect("patch");
        assert_eq!(patch.channels[0], vec![2.0, 0.0, 4.0]);
        assert_eq!(patch.channels[1], vec![2.0, 3.0, 4.0]);
        assert_eq!(patch.channels[2], vec![1.0, 0.0, 1.0]);
    }

    #[test]
    fn short_volume_rejected() {
        let volumes = VolumePair {
            shape: [1, 1, 3],
            raw: vec![2.0],
            labels: vec![],
        };
        let channels = ChannelConfig {
            raw: true,
            mask: false,
            raw_mask: false,
        };
        assert!(matches!(
            compose_channels(&volumes, NodeId(1), &channels),
            Err(ExcerptError::PatchUnavailable(_))
        ));
    }

    struct ConstantVolumes;

    impl PatchProvider for ConstantVolumes {
        fn fetch(&self, request: &PatchRequest) -> Result<VolumePair, ExcerptError> {
            assert!(request.labels);
            Ok(VolumePair {
                shape: [1, 1, 2],
                raw: vec![1.0, 1.0],
                labels: vec![1, 2],
            })
        }
    }

    #[test]
    fn get_builds_one_patch_per_endpoint() {
        let config = PatchConfig {
            patch_shape: [16, 16, 16],
            voxel_size: [8, 8, 8],
            channels: ChannelConfig {
                raw: false,
                mask: true,
                raw_mask: false,
            },
        };
        let item = dataset().get(0, &ConstantVolumes, &config).expect("pair");
        assert_eq!(item.sample.ids, [NodeId(1), NodeId(2)]);
        assert_eq!(item.patches[0].channels, vec![vec![1.0, 0.0]]);
        assert_eq!(item.patches[1].channels, vec![vec![0.0, 1.0]]);
    }
}
