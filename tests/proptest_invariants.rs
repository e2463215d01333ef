//! Property-based invariant tests for slice planning, cut editing and patch tiling.
//!
//! 1. Slices partition the stack: heights sum to the total, chunks tile each slice.
//! 2. Cut lists stay ordered, aligned and spaced within limits across arbitrary moves.
//! 3. Cleanup is idempotent and never breaks the spacing invariants.
//! 4. Patch recipes cover every pixel; an identity transform reconstructs the image.
//! 5. Sampled rows match the stacked source pixels regardless of access order.

use cropybara::sampler::luma;
use cropybara::{carving, CutsState, NeverCancel, Patchify, RowSampler};
use image::{Rgba, RgbaImage};
use proptest::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────────

fn source_heights() -> impl Strategy<Value = Vec<u32>> {
    proptest::collection::vec(1u32..=200, 1..=6)
}

/// Turn raw values into strictly increasing cuts inside `(0, total)`.
fn normalize_cuts(raw: &[u32], total: u32) -> Vec<u32> {
    if total < 2 {
        return Vec::new();
    }
    let mut cuts: Vec<u32> = raw.iter().map(|v| 1 + v % (total - 1)).collect();
    cuts.sort_unstable();
    cuts.dedup();
    cuts
}

/// `(min, max, height, divisor)` that `CutsState::new` accepts.
fn cuts_config() -> impl Strategy<Value = (u32, u32, u32, u32)> {
    (1u32..=10, 1u32..=20, 1u32..=300, 1u32..=5000)
        .prop_map(|(divisor, k, extra, height)| (divisor * k, divisor * k + extra, height, divisor))
}

fn moves() -> impl Strategy<Value = Vec<(usize, u32)>> {
    proptest::collection::vec((0usize..64, 0u32..6000), 0..=20)
}

fn assert_cut_invariants(state: &CutsState) -> Result<(), TestCaseError> {
    let cuts = state.cuts();
    let mut prev = 0;
    for &cut in cuts {
        prop_assert!(cut > prev, "cuts not increasing: {:?}", cuts);
        prop_assert_eq!(cut % state.divisor(), 0, "unaligned cut in {:?}", cuts);
        prop_assert!(cut - prev <= state.max_distance(), "gap too wide in {:?}", cuts);
        prop_assert!(cut < state.height(), "cut past bottom in {:?}", cuts);
        prev = cut;
    }
    prop_assert!(
        prev + state.max_distance() >= state.height(),
        "bottom left uncovered: {:?} height {}",
        cuts,
        state.height()
    );
    Ok(())
}

fn noisy(width: u32, height: u32, seed: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        let v = x.wrapping_mul(31) ^ y.wrapping_mul(17) ^ seed;
        let b = v.to_le_bytes();
        Rgba([b[0], b[1].wrapping_add(b[0]), b[2] ^ b[0], 255])
    })
}

// ═════════════════════════════════════════════════════════════════════════
// 1. Slices partition the stack
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn slices_partition_stack(
        heights in source_heights(),
        raw in proptest::collection::vec(any::<u32>(), 0..=8),
    ) {
        let stack: Vec<(u32, u32)> = heights.iter().map(|&h| (64, h)).collect();
        let total: u32 = heights.iter().sum();
        let cuts = normalize_cuts(&raw, total);

        let slices = carving::cut(&stack, &cuts).unwrap();
        prop_assert_eq!(slices.len(), cuts.len() + 1);
        prop_assert_eq!(slices.iter().map(|s| s.height).sum::<u32>(), total);

        for slice in &slices {
            let mut next_y = 0;
            for chunk in &slice.chunks {
                prop_assert_eq!(chunk.dst_y, next_y);
                prop_assert_eq!(chunk.src_height, chunk.dst_height);
                prop_assert!(chunk.dst_height > 0);
                prop_assert!(chunk.src_y + chunk.src_height <= heights[chunk.source_index]);
                next_y += chunk.dst_height;
            }
            prop_assert_eq!(next_y, slice.height);
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 2. Cut invariants survive arbitrary moves
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn moves_preserve_cut_invariants(
        (min, max, height, divisor) in cuts_config(),
        moves in moves(),
    ) {
        let mut state = CutsState::new(min, max, height, divisor).unwrap();
        assert_cut_invariants(&state)?;

        for (seed, position) in moves {
            let len = state.cuts().len();
            if len == 0 {
                break;
            }
            state.move_cut(seed % len, position).unwrap();
            assert_cut_invariants(&state)?;
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3. Cleanup is idempotent
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn cleanup_is_idempotent(
        (min, max, height, divisor) in cuts_config(),
        moves in moves(),
    ) {
        let mut state = CutsState::new(min, max, height, divisor).unwrap();
        for (seed, position) in moves {
            let len = state.cuts().len();
            if len == 0 {
                break;
            }
            state.move_cut(seed % len, position).unwrap();
        }

        state.cleanup();
        assert_cut_invariants(&state)?;
        let settled = state.cuts().to_vec();
        prop_assert!(!state.cleanup());
        prop_assert_eq!(state.cuts(), settled.as_slice());
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4. Patch coverage and reconstruction
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn patches_cover_every_pixel(
        width in 1u32..=120,
        height in 1u32..=120,
        (size, overlap) in (2u32..=40).prop_flat_map(|s| (Just(s), 0..s)),
    ) {
        let img = RgbaImage::new(width, height);
        let patches = Patchify::new(&img, size, overlap).unwrap();
        let recipe = patches.recipe();

        for y in 0..height {
            for x in 0..width {
                prop_assert!(
                    recipe.iter().any(|r| r.x <= x && x < r.x + size && r.y <= y && y < r.y + size),
                    "pixel ({}, {}) not covered", x, y
                );
            }
        }
    }

    #[test]
    fn identity_transform_reconstructs_image(
        width in 1u32..=90,
        height in 1u32..=90,
        seed in any::<u32>(),
        (size, overlap) in (2u32..=32).prop_flat_map(|s| (Just(s), 0..s)),
    ) {
        let img = noisy(width, height, seed);
        let patches = Patchify::new(&img, size, overlap).unwrap();
        let identity = |patch: RgbaImage| -> cropybara::Result<RgbaImage> { Ok(patch) };
        let out = patches.process(&identity, &NeverCancel).unwrap();
        prop_assert_eq!(out, img);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 5. Sampler determinism
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn sampled_rows_match_sources(
        heights in proptest::collection::vec(1u32..=60, 1..=4),
        seed in any::<u32>(),
        order in proptest::collection::vec(any::<u32>(), 1..=40),
    ) {
        let stack: Vec<RgbaImage> = heights
            .iter()
            .enumerate()
            .map(|(i, &h)| noisy(12, h, seed.wrapping_add(u32::try_from(i).unwrap())))
            .collect();
        let total: u32 = heights.iter().sum();
        let mut sampler = RowSampler::new(&stack).unwrap();

        for raw in order {
            let y = raw % total;
            let mut local = y;
            let mut page = &stack[0];
            for img in &stack {
                page = img;
                if local < img.height() {
                    break;
                }
                local -= img.height();
            }
            let expected: Vec<u8> = (0..12).map(|x| luma(page.get_pixel(x, local))).collect();
            prop_assert_eq!(sampler.sample(y).unwrap(), expected);
        }
    }
}
