//! BC3 (DXT5) block compression.
//!
//! Each 4x4 block is stored in 16 bytes:
//!
//! ```text
//! byte  0      alpha endpoint A0
//! byte  1      alpha endpoint A1
//! bytes 2..8   16 x 3-bit alpha indices, little endian, texel 0 in the low bits
//! bytes 8..10  color endpoint C0 (RGB565, little endian)
//! bytes 10..12 color endpoint C1 (RGB565, little endian)
//! bytes 12..16 16 x 2-bit color indices, little endian, texel 0 in the low bits
//! ```
//!
//! Texels are numbered row-major within the block. Color blocks are always
//! emitted with `C0 > C1` (four-color mode) unless both endpoints quantize to
//! the same value, in which case every index is zero.

use tracing::debug;

use crate::buffer::{ImageBuffer, PixelFormat};
use crate::error::{try_filled, MapError, Result};
use crate::packing::pad_to_blocks;
use crate::parallel::WorkerPool;

/// Bytes per compressed 4x4 block.
pub const BLOCK_BYTES: usize = 16;

/// Summed squared RGBA error below which a block is accepted without
/// least-squares endpoint refinement.
pub const BLOCK_ERROR_THRESHOLD: u32 = 4096;

const REFINE_PASSES: usize = 2;
const POWER_ITERATIONS: usize = 8;

/// An RGBA8 texel.
pub type Texel = [u8; 4];

/// One compressed 4x4 block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Bc3Block(pub [u8; BLOCK_BYTES]);

impl Bc3Block {
    /// Compress 16 row-major texels.
    pub fn encode(texels: &[Texel; 16]) -> Self {
        let alpha = encode_alpha(texels);
        let color = encode_color(texels);

        let mut bytes = [0u8; BLOCK_BYTES];
        bytes[0] = alpha.a0;
        bytes[1] = alpha.a1;
        bytes[2..8].copy_from_slice(&alpha.indices.to_le_bytes()[..6]);
        bytes[8..10].copy_from_slice(&color.c0.to_le_bytes());
        bytes[10..12].copy_from_slice(&color.c1.to_le_bytes());
        bytes[12..16].copy_from_slice(&color.indices.to_le_bytes());
        Self(bytes)
    }

    /// Color endpoints `(C0, C1)` as RGB565.
    pub fn color_endpoints(&self) -> (u16, u16) {
        (
            u16::from_le_bytes([self.0[8], self.0[9]]),
            u16::from_le_bytes([self.0[10], self.0[11]]),
        )
    }

    /// Alpha endpoints `(A0, A1)`.
    pub fn alpha_endpoints(&self) -> (u8, u8) {
        (self.0[0], self.0[1])
    }

    /// Decompress to 16 row-major texels.
    pub fn decode(&self) -> [Texel; 16] {
        let (c0, c1) = self.color_endpoints();
        let colors = color_palette(c0, c1);
        let color_indices = u32::from_le_bytes([self.0[12], self.0[13], self.0[14], self.0[15]]);

        let (a0, a1) = self.alpha_endpoints();
        let alphas = alpha_palette(a0, a1);
        let mut raw = [0u8; 8];
        raw[..6].copy_from_slice(&self.0[2..8]);
        let alpha_indices = u64::from_le_bytes(raw);

        let mut texels = [[0u8; 4]; 16];
        for (i, texel) in texels.iter_mut().enumerate() {
            let c = colors[((color_indices >> (2 * i)) & 0b11) as usize];
            let a = alphas[((alpha_indices >> (3 * i)) & 0b111) as usize];
            *texel = [c[0], c[1], c[2], a];
        }
        texels
    }

    /// Summed squared RGBA error of this block against `texels`.
    pub fn error(&self, texels: &[Texel; 16]) -> u32 {
        self.decode()
            .iter()
            .zip(texels)
            .map(|(d, s)| (0..4).map(|c| sq_diff(d[c], s[c])).sum::<u32>())
            .sum()
    }
}

/// Convert an 8-bit color to RGB565 with rounding.
pub fn to_rgb565(c: [u8; 3]) -> u16 {
    let r = (c[0] as u16 * 31 + 127) / 255;
    let g = (c[1] as u16 * 63 + 127) / 255;
    let b = (c[2] as u16 * 31 + 127) / 255;
    (r << 11) | (g << 5) | b
}

/// Expand RGB565 to 8-bit by bit replication.
pub fn from_rgb565(v: u16) -> [u8; 3] {
    let r = (v >> 11) & 0x1f;
    let g = (v >> 5) & 0x3f;
    let b = v & 0x1f;
    [
        ((r << 3) | (r >> 2)) as u8,
        ((g << 2) | (g >> 4)) as u8,
        ((b << 3) | (b >> 2)) as u8,
    ]
}

#[inline]
fn sq_diff(a: u8, b: u8) -> u32 {
    let d = a as i32 - b as i32;
    (d * d) as u32
}

#[inline]
fn rgb_error(a: [u8; 3], b: [u8; 3]) -> u32 {
    sq_diff(a[0], b[0]) + sq_diff(a[1], b[1]) + sq_diff(a[2], b[2])
}

fn mix(a: [u8; 3], b: [u8; 3], wa: u32, wb: u32) -> [u8; 3] {
    let div = wa + wb;
    let m = |x: u8, y: u8| ((wa * x as u32 + wb * y as u32 + div / 2) / div) as u8;
    [m(a[0], b[0]), m(a[1], b[1]), m(a[2], b[2])]
}

fn color_palette(c0: u16, c1: u16) -> [[u8; 3]; 4] {
    let a = from_rgb565(c0);
    let b = from_rgb565(c1);
    if c0 > c1 {
        [a, b, mix(a, b, 2, 1), mix(a, b, 1, 2)]
    } else {
        [a, b, mix(a, b, 1, 1), [0, 0, 0]]
    }
}

fn alpha_palette(a0: u8, a1: u8) -> [u8; 8] {
    let lerp = |w0: u32, w1: u32, div: u32| {
        ((w0 * a0 as u32 + w1 * a1 as u32 + div / 2) / div) as u8
    };
    if a0 > a1 {
        [
            a0,
            a1,
            lerp(6, 1, 7),
            lerp(5, 2, 7),
            lerp(4, 3, 7),
            lerp(3, 4, 7),
            lerp(2, 5, 7),
            lerp(1, 6, 7),
        ]
    } else {
        [
            a0,
            a1,
            lerp(4, 1, 5),
            lerp(3, 2, 5),
            lerp(2, 3, 5),
            lerp(1, 4, 5),
            0,
            255,
        ]
    }
}

#[derive(Debug, Clone, Copy)]
struct ColorFit {
    c0: u16,
    c1: u16,
    indices: u32,
    error: u32,
}

/// Assign indices for a pair of 565 endpoints, ordering them for
/// four-color mode.
fn fit_color(texels: &[Texel; 16], e0: u16, e1: u16) -> ColorFit {
    let (c0, c1) = if e0 < e1 { (e1, e0) } else { (e0, e1) };
    let palette = color_palette(c0, c1);
    let usable = if c0 == c1 { 1 } else { 4 };

    let mut indices = 0u32;
    let mut error = 0u32;
    for (i, t) in texels.iter().enumerate() {
        let rgb = [t[0], t[1], t[2]];
        let mut best = 0;
        let mut best_err = rgb_error(rgb, palette[0]);
        for (j, p) in palette.iter().enumerate().take(usable).skip(1) {
            let e = rgb_error(rgb, *p);
            if e < best_err {
                best = j;
                best_err = e;
            }
        }
        indices |= (best as u32) << (2 * i);
        error += best_err;
    }
    ColorFit {
        c0,
        c1,
        indices,
        error,
    }
}

fn luminance_key(t: &Texel) -> u32 {
    // Rec. 709 in integer weights summing to 10000
    2126 * t[0] as u32 + 7152 * t[1] as u32 + 722 * t[2] as u32
}

/// Candidate endpoint pairs: luminance extremes, principal-axis extremes and
/// the bounding box corners.
fn color_candidates(texels: &[Texel; 16]) -> Vec<([u8; 3], [u8; 3])> {
    let rgb = |t: &Texel| [t[0], t[1], t[2]];
    let mut candidates = Vec::with_capacity(3);

    // max_by_key keeps the last maximum; min_by_key the first minimum
    let brightest = texels.iter().max_by_key(|t| luminance_key(t));
    let darkest = texels.iter().min_by_key(|t| luminance_key(t));
    if let (Some(hi), Some(lo)) = (brightest, darkest) {
        candidates.push((rgb(hi), rgb(lo)));
    }

    if let Some(axis) = principal_axis(texels) {
        let project =
            |t: &Texel| t[0] as f64 * axis[0] + t[1] as f64 * axis[1] + t[2] as f64 * axis[2];
        let mut hi = &texels[0];
        let mut lo = &texels[0];
        for t in texels.iter() {
            if project(t) > project(hi) {
                hi = t;
            }
            if project(t) < project(lo) {
                lo = t;
            }
        }
        candidates.push((rgb(hi), rgb(lo)));
    }

    let mut max = [0u8; 3];
    let mut min = [255u8; 3];
    for t in texels {
        for c in 0..3 {
            max[c] = max[c].max(t[c]);
            min[c] = min[c].min(t[c]);
        }
    }
    candidates.push((max, min));
    candidates
}

/// Dominant color direction by power iteration on the covariance matrix.
fn principal_axis(texels: &[Texel; 16]) -> Option<[f64; 3]> {
    let mut mean = [0.0f64; 3];
    for t in texels {
        for c in 0..3 {
            mean[c] += t[c] as f64 / 16.0;
        }
    }
    let mut cov = [[0.0f64; 3]; 3];
    for t in texels {
        let d = [
            t[0] as f64 - mean[0],
            t[1] as f64 - mean[1],
            t[2] as f64 - mean[2],
        ];
        for i in 0..3 {
            for j in 0..3 {
                cov[i][j] += d[i] * d[j];
            }
        }
    }

    // Start from the channel with the largest spread
    let start = (0..3).fold(0, |best, c| if cov[c][c] > cov[best][best] { c } else { best });
    let mut v = [0.0; 3];
    v[start] = 1.0;
    for _ in 0..POWER_ITERATIONS {
        let w = [
            cov[0][0] * v[0] + cov[0][1] * v[1] + cov[0][2] * v[2],
            cov[1][0] * v[0] + cov[1][1] * v[1] + cov[1][2] * v[2],
            cov[2][0] * v[0] + cov[2][1] * v[1] + cov[2][2] * v[2],
        ];
        let len = (w[0] * w[0] + w[1] * w[1] + w[2] * w[2]).sqrt();
        if len < 1e-9 {
            return None;
        }
        v = [w[0] / len, w[1] / len, w[2] / len];
    }
    Some(v)
}

/// Least-squares endpoints for fixed four-color indices.
fn refine_endpoints(texels: &[Texel; 16], indices: u32) -> Option<([u8; 3], [u8; 3])> {
    const WEIGHTS: [f64; 4] = [1.0, 0.0, 2.0 / 3.0, 1.0 / 3.0];

    let (mut aa, mut ab, mut bb) = (0.0, 0.0, 0.0);
    let mut xa = [0.0f64; 3];
    let mut xb = [0.0f64; 3];
    for (i, t) in texels.iter().enumerate() {
        let w = WEIGHTS[((indices >> (2 * i)) & 0b11) as usize];
        let v = 1.0 - w;
        aa += w * w;
        ab += w * v;
        bb += v * v;
        for c in 0..3 {
            xa[c] += w * t[c] as f64;
            xb[c] += v * t[c] as f64;
        }
    }
    let det = aa * bb - ab * ab;
    if det.abs() < 1e-9 {
        return None;
    }

    let channel = |x: f64| x.round().clamp(0.0, 255.0) as u8;
    let mut a = [0u8; 3];
    let mut b = [0u8; 3];
    for c in 0..3 {
        a[c] = channel((bb * xa[c] - ab * xb[c]) / det);
        b[c] = channel((aa * xb[c] - ab * xa[c]) / det);
    }
    Some((a, b))
}

fn encode_color(texels: &[Texel; 16]) -> ColorFit {
    let mut best: Option<ColorFit> = None;
    for (a, b) in color_candidates(texels) {
        let fit = fit_color(texels, to_rgb565(a), to_rgb565(b));
        if best.map_or(true, |cur| fit.error < cur.error) {
            best = Some(fit);
        }
        if fit.error == 0 {
            break;
        }
    }
    let mut best = best.unwrap_or(ColorFit {
        c0: 0,
        c1: 0,
        indices: 0,
        error: u32::MAX,
    });

    for _ in 0..REFINE_PASSES {
        if best.error <= BLOCK_ERROR_THRESHOLD || best.c0 == best.c1 {
            break;
        }
        let Some((a, b)) = refine_endpoints(texels, best.indices) else {
            break;
        };
        let fit = fit_color(texels, to_rgb565(a), to_rgb565(b));
        if fit.error >= best.error {
            break;
        }
        best = fit;
    }
    best
}

#[derive(Debug, Clone, Copy)]
struct AlphaFit {
    a0: u8,
    a1: u8,
    indices: u64,
    error: u32,
}

fn fit_alpha(texels: &[Texel; 16], a0: u8, a1: u8) -> AlphaFit {
    let palette = alpha_palette(a0, a1);
    let mut indices = 0u64;
    let mut error = 0u32;
    for (i, t) in texels.iter().enumerate() {
        let mut best = 0;
        let mut best_err = sq_diff(t[3], palette[0]);
        for (j, &p) in palette.iter().enumerate().skip(1) {
            let e = sq_diff(t[3], p);
            if e < best_err {
                best = j;
                best_err = e;
            }
        }
        indices |= (best as u64) << (3 * i);
        error += best_err;
    }
    AlphaFit {
        a0,
        a1,
        indices,
        error,
    }
}

/// Compare eight interpolated levels between the extremes against six
/// levels between the interior extremes plus explicit 0 and 255.
fn encode_alpha(texels: &[Texel; 16]) -> AlphaFit {
    let (mut max, mut min) = (0u8, 255u8);
    let (mut inner_max, mut inner_min) = (0u8, 255u8);
    for t in texels {
        let a = t[3];
        max = max.max(a);
        min = min.min(a);
        if a != 0 && a != 255 {
            inner_max = inner_max.max(a);
            inner_min = inner_min.min(a);
        }
    }

    let eight = fit_alpha(texels, max, min);
    if eight.error == 0 || inner_min > inner_max {
        return eight;
    }
    let six = fit_alpha(texels, inner_min, inner_max);
    if six.error < eight.error {
        six
    } else {
        eight
    }
}

/// A texture compressed to BC3 blocks.
///
/// `width` and `height` are the source dimensions; blocks cover the image
/// padded up to multiples of 4.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedTexture {
    pub width: u32,
    pub height: u32,
    pub blocks: Vec<Bc3Block>,
}

impl CompressedTexture {
    /// Compress an image, padding it to whole blocks by edge replication.
    pub fn compress(pool: &WorkerPool, image: &ImageBuffer) -> Result<Self> {
        let (width, height) = image.dimensions();
        let padded = pad_to_blocks(image)?;
        let (blocks_x, blocks_y) = (padded.width() / 4, padded.height() / 4);
        let _span = tracing::debug_span!("bc3", width, height, blocks_x, blocks_y).entered();

        let blocks = pool.map_indexed((blocks_x * blocks_y) as usize, |i| {
            let bx = i as u32 % blocks_x;
            let by = i as u32 / blocks_x;
            Bc3Block::encode(&gather_block(&padded, bx, by))
        });

        let texture = Self {
            width,
            height,
            blocks,
        };
        debug!(
            max_block_error = texture.max_block_error(&padded),
            "compressed {} blocks",
            texture.blocks.len()
        );
        Ok(texture)
    }

    /// Wrap pre-compressed blocks, checking the count against the dimensions.
    pub fn from_blocks(width: u32, height: u32, blocks: Vec<Bc3Block>) -> Result<Self> {
        let expected = width.div_ceil(4) as usize * height.div_ceil(4) as usize;
        if width == 0 || height == 0 || blocks.len() != expected {
            return Err(MapError::InvalidDimensions(format!(
                "{}x{} needs {} blocks, got {}",
                width,
                height,
                expected,
                blocks.len()
            )));
        }
        Ok(Self {
            width,
            height,
            blocks,
        })
    }

    /// Number of blocks across and down.
    pub fn block_dimensions(&self) -> (u32, u32) {
        (self.width.div_ceil(4), self.height.div_ceil(4))
    }

    /// Size of the block payload in bytes.
    pub fn linear_size(&self) -> usize {
        self.blocks.len() * BLOCK_BYTES
    }

    /// Block payload in storage order.
    pub fn block_bytes(&self) -> Vec<u8> {
        self.blocks.iter().flat_map(|b| b.0).collect()
    }

    /// Decompress to an RGBA image of the padded dimensions.
    pub fn decode_padded(&self) -> Result<ImageBuffer> {
        let (blocks_x, blocks_y) = self.block_dimensions();
        let (w, h) = (blocks_x * 4, blocks_y * 4);
        let mut data = try_filled(w as usize * h as usize * 4, 0u8)?;
        for (i, block) in self.blocks.iter().enumerate() {
            let bx = i as u32 % blocks_x;
            let by = i as u32 / blocks_x;
            for (t, texel) in block.decode().iter().enumerate() {
                let x = bx * 4 + t as u32 % 4;
                let y = by * 4 + t as u32 / 4;
                let idx = (y as usize * w as usize + x as usize) * 4;
                data[idx..idx + 4].copy_from_slice(texel);
            }
        }
        ImageBuffer::new(w, h, PixelFormat::Rgba8, data)
    }

    /// Decompress and crop to the source dimensions.
    pub fn decode(&self) -> Result<ImageBuffer> {
        let padded = self.decode_padded()?;
        ImageBuffer::from_fn_rgba(self.width, self.height, |x, y| padded.rgba8(x, y))
    }

    /// Largest per-block summed squared error against a block-padded source.
    pub fn max_block_error(&self, padded: &ImageBuffer) -> u32 {
        let (blocks_x, _) = self.block_dimensions();
        self.blocks
            .iter()
            .enumerate()
            .map(|(i, block)| {
                let bx = i as u32 % blocks_x;
                let by = i as u32 / blocks_x;
                block.error(&gather_block(padded, bx, by))
            })
            .max()
            .unwrap_or(0)
    }
}

/// Texels of block (bx, by), row-major. Reads with edge clamping.
fn gather_block(image: &ImageBuffer, bx: u32, by: u32) -> [Texel; 16] {
    let mut texels = [[0u8; 4]; 16];
    for (i, texel) in texels.iter_mut().enumerate() {
        let x = (bx * 4 + i as u32 % 4) as i64;
        let y = (by * 4 + i as u32 / 4) as i64;
        *texel = image.rgba8_clamped(x, y);
    }
    texels
}
