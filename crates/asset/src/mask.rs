//! Procedural fur masks: one stippled opacity layer per shell.
//!
//! Layer `l` of `n` receives `floor(fur_density * (1 - l/n))` random texel
//! picks (with replacement), so coverage thins linearly toward the tips.
//! Picks are independent between layers; the stacked noise reads as volume.

use corelib::fur::MAX_LAYERS;
use corelib::{CoreResult, FurError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Bytes per mask texel (RGBA8).
pub const MASK_TEXEL_BYTES: usize = 4;

/// Edge length used by the demo; small enough to regenerate interactively.
pub const DEFAULT_MASK_SIZE: u32 = 128;

/// Largest accepted edge length. A full stack at this size and
/// `MAX_LAYERS` layers is 1 GiB.
pub const MAX_MASK_SIZE: u32 = 1024;

const OPAQUE: [u8; MASK_TEXEL_BYTES] = [255; MASK_TEXEL_BYTES];

/// Scatter count for `layer`, computed exactly in integers.
pub fn layer_density(fur_density: u32, layer: u32, num_of_layers: u32) -> u32 {
    if num_of_layers == 0 || layer >= num_of_layers {
        return 0;
    }
    let remaining = u64::from(num_of_layers - layer);
    (u64::from(fur_density) * remaining / u64::from(num_of_layers)) as u32
}

/// Reject mask sizes that are zero or exceed `max_size` (typically the
/// device's `max_texture_dimension_2d`) or [`MAX_MASK_SIZE`].
pub fn check_mask_size(size: u32, max_size: u32) -> CoreResult<()> {
    if size == 0 || size > max_size.min(MAX_MASK_SIZE) {
        return Err(FurError::InvalidMaskParameters { size, layers: 1 });
    }
    Ok(())
}

/// Expected distinct texels hit by `trials` uniform picks over `texels` cells.
pub fn expected_opaque(trials: u32, texels: u32) -> f64 {
    if texels == 0 {
        return 0.0;
    }
    let n = f64::from(texels);
    n * (1.0 - (1.0 - 1.0 / n).powf(f64::from(trials)))
}

/// `num_of_layers` square RGBA8 masks stored back to back, innermost first.
#[derive(Clone, Debug, PartialEq)]
pub struct FurLayerStack {
    size: u32,
    scatter_counts: Vec<u32>,
    texels: Vec<u8>,
}

impl FurLayerStack {
    /// Edge length of every layer in texels.
    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn layer_count(&self) -> u32 {
        self.scatter_counts.len() as u32
    }

    fn layer_bytes(&self) -> usize {
        (self.size as usize) * (self.size as usize) * MASK_TEXEL_BYTES
    }

    /// All layers, ready for a 2D array texture upload.
    pub fn as_bytes(&self) -> &[u8] {
        &self.texels
    }

    pub fn layer(&self, layer: u32) -> Option<&[u8]> {
        let len = self.layer_bytes();
        let start = (layer as usize).checked_mul(len)?;
        self.texels.get(start..start + len)
    }

    /// Number of random picks that went into `layer`.
    pub fn scatter_count(&self, layer: u32) -> u32 {
        self.scatter_counts.get(layer as usize).copied().unwrap_or(0)
    }

    /// Texels of `layer` whose alpha is fully opaque.
    pub fn opaque_count(&self, layer: u32) -> usize {
        self.layer(layer)
            .map(|bytes| {
                bytes
                    .chunks_exact(MASK_TEXEL_BYTES)
                    .filter(|texel| texel[3] == 255)
                    .count()
            })
            .unwrap_or(0)
    }
}

/// Generates [`FurLayerStack`]s of a fixed size from its own random source.
pub struct FurMaskGenerator<R = StdRng> {
    size: u32,
    rng: R,
}

impl FurMaskGenerator<StdRng> {
    /// Generator seeded from OS entropy, so every run looks different.
    pub fn new(size: u32) -> CoreResult<Self> {
        Self::with_rng(size, StdRng::from_entropy())
    }

    /// Reproducible generator, for tests and captures.
    pub fn seeded(size: u32, seed: u64) -> CoreResult<Self> {
        Self::with_rng(size, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> FurMaskGenerator<R> {
    pub fn with_rng(size: u32, rng: R) -> CoreResult<Self> {
        check_mask_size(size, MAX_MASK_SIZE)?;
        if !size.is_power_of_two() {
            log::warn!("Fur mask size {size} is not a power of two");
        }
        Ok(Self { size, rng })
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn generate(&mut self, num_of_layers: u32, fur_density: u32) -> CoreResult<FurLayerStack> {
        generate_with_rng(self.size, num_of_layers, fur_density, &mut self.rng)
    }
}

/// One-shot generation from the thread-local random source.
pub fn generate(size: u32, num_of_layers: u32, fur_density: u32) -> CoreResult<FurLayerStack> {
    generate_with_rng(size, num_of_layers, fur_density, &mut rand::thread_rng())
}

pub fn generate_with_rng<R: Rng + ?Sized>(
    size: u32,
    num_of_layers: u32,
    fur_density: u32,
    rng: &mut R,
) -> CoreResult<FurLayerStack> {
    let invalid = FurError::InvalidMaskParameters {
        size,
        layers: num_of_layers,
    };
    if size == 0 || size > MAX_MASK_SIZE || num_of_layers == 0 || num_of_layers > MAX_LAYERS {
        return Err(invalid);
    }

    let row = size as usize;
    let layer_bytes = row
        .checked_mul(row)
        .and_then(|texels| texels.checked_mul(MASK_TEXEL_BYTES));
    let Some((layer_bytes, total_bytes)) = layer_bytes.and_then(|bytes| {
        bytes
            .checked_mul(num_of_layers as usize)
            .map(|total| (bytes, total))
    }) else {
        return Err(invalid);
    };
    // Zeroed means alpha = 0 everywhere.
    let mut texels = vec![0u8; total_bytes];
    let mut scatter_counts = Vec::with_capacity(num_of_layers as usize);

    for (layer, chunk) in texels.chunks_exact_mut(layer_bytes).enumerate() {
        let picks = layer_density(fur_density, layer as u32, num_of_layers);
        for _ in 0..picks {
            let x = rng.gen_range(0..row);
            let y = rng.gen_range(0..row);
            let at = (y * row + x) * MASK_TEXEL_BYTES;
            chunk[at..at + MASK_TEXEL_BYTES].copy_from_slice(&OPAQUE);
        }
        scatter_counts.push(picks);
    }

    log::debug!(
        "Generated {num_of_layers} fur layers of {size}x{size} (density {fur_density})"
    );

    Ok(FurLayerStack {
        size,
        scatter_counts,
        texels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stack_has_one_mask_per_layer_within_budget() {
        for &(layers, density) in &[(1, 0), (1, 500), (7, 1234), (30, 30_000), (64, 10)] {
            let mut rng = StdRng::seed_from_u64(u64::from(layers) * 31 + u64::from(density));
            let stack = generate_with_rng(32, layers, density, &mut rng).expect("generate");
            assert_eq!(stack.layer_count(), layers);
            assert_eq!(stack.as_bytes().len(), 32 * 32 * 4 * layers as usize);
            for l in 0..layers {
                let budget = (f64::from(density) * (1.0 - f64::from(l) / f64::from(layers))).floor();
                assert!(stack.opaque_count(l) as f64 <= budget + 1e-9, "layer {l}");
                assert_eq!(stack.scatter_count(l), layer_density(density, l, layers));
            }
        }
    }

    #[test]
    fn scatter_counts_thin_toward_the_tip() {
        let counts: Vec<u32> = (0..30).map(|l| layer_density(30_000, l, 30)).collect();
        assert!(counts.windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(counts[0], 30_000);
        assert_eq!(counts[29], 1_000);
        assert_eq!(layer_density(30_000, 30, 30), 0);
    }

    #[test]
    fn default_demo_stack_matches_expected_coverage() {
        let mut generator = FurMaskGenerator::seeded(128, 7).expect("generator");
        let stack = generator.generate(30, 30_000).expect("generate");
        assert_eq!(stack.layer_count(), 30);

        let texels = 128 * 128;
        for l in [0, 15, 29] {
            let expected = expected_opaque(stack.scatter_count(l), texels);
            let realized = stack.opaque_count(l) as f64;
            assert!(
                (realized - expected).abs() <= expected * 0.03,
                "layer {l}: realized {realized}, expected {expected:.1}"
            );
        }
        assert!(stack.opaque_count(29) <= 1_000);
        assert!(stack.opaque_count(0) > stack.opaque_count(29));
    }

    #[test]
    fn opaque_texels_are_fully_set() {
        let stack = generate_with_rng(8, 2, 40, &mut StdRng::seed_from_u64(1)).expect("generate");
        let layer = stack.layer(0).expect("layer 0");
        for texel in layer.chunks_exact(4) {
            assert!(texel == [0, 0, 0, 0] || texel == [255, 255, 255, 255]);
        }
    }

    #[test]
    fn layers_are_independent_noise() {
        let stack = generate_with_rng(64, 2, 2_000, &mut StdRng::seed_from_u64(3)).expect("generate");
        assert_ne!(stack.layer(0), stack.layer(1));
    }

    #[test]
    fn zero_density_is_fully_transparent() {
        let stack = generate(16, 4, 0).expect("generate");
        assert!(stack.as_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn non_positive_parameters_are_rejected() {
        assert_eq!(
            generate(0, 3, 10),
            Err(FurError::InvalidMaskParameters { size: 0, layers: 3 })
        );
        assert!(generate(16, 0, 10).is_err());
        assert!(FurMaskGenerator::new(0).is_err());
    }

    #[test]
    fn oversized_masks_are_rejected() {
        let huge = 1 << 31;
        assert_eq!(
            generate_with_rng(huge, 1, 0, &mut StdRng::seed_from_u64(1)),
            Err(FurError::InvalidMaskParameters { size: huge, layers: 1 })
        );
        assert!(generate(MAX_MASK_SIZE * 2, 1, 0).is_err());
        assert!(generate(4, MAX_LAYERS + 1, 0).is_err());
        assert!(FurMaskGenerator::new(MAX_MASK_SIZE + 1).is_err());
    }

    #[test]
    fn mask_size_respects_device_limit() {
        assert!(check_mask_size(256, 8192).is_ok());
        assert!(check_mask_size(MAX_MASK_SIZE, 8192).is_ok());
        assert!(check_mask_size(MAX_MASK_SIZE * 2, 8192).is_err());
        assert_eq!(
            check_mask_size(512, 256),
            Err(FurError::InvalidMaskParameters { size: 512, layers: 1 })
        );
        assert!(check_mask_size(0, 8192).is_err());
    }

    #[test]
    fn out_of_range_layers_are_empty() {
        let stack = generate(4, 2, 1).expect("generate");
        assert!(stack.layer(2).is_none());
        assert_eq!(stack.opaque_count(5), 0);
        assert_eq!(stack.scatter_count(5), 0);
    }
}
