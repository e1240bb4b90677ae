//! The image driver: splits a raster into 4x4 blocks, encodes or decodes them
//! and keeps the statistics of the last call.

use alloc::vec::Vec;
use core::time::Duration;

use log::{debug, trace, warn};
#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::bits::decode_block;
use crate::block::{Block4x4, BlockEncoding};
use crate::color::Rgba8;
use crate::error::Error;
use crate::format::Format;
use crate::metric::ErrorMetric;
use crate::num_blocks;
use crate::status::EncodingStatus;

/// Efforts of the intermediate refinement passes of [`Image::encode`].
const REFINEMENT_EFFORTS: [f32; 3] = [25.0, 50.0, 75.0];

#[cfg(feature = "std")]
struct Stopwatch(std::time::Instant);

#[cfg(feature = "std")]
impl Stopwatch {
    fn start() -> Self {
        Stopwatch(std::time::Instant::now())
    }

    fn elapsed(&self) -> Duration {
        self.0.elapsed()
    }
}

/// Without a clock every call reports zero elapsed time.
#[cfg(not(feature = "std"))]
struct Stopwatch;

#[cfg(not(feature = "std"))]
impl Stopwatch {
    fn start() -> Self {
        Stopwatch
    }

    fn elapsed(&self) -> Duration {
        Duration::ZERO
    }
}

fn clamp_effort(effort: f32) -> (f32, EncodingStatus) {
    if (0.0..=100.0).contains(&effort) {
        (effort, EncodingStatus::SUCCESS)
    } else if effort > 100.0 {
        (100.0, EncodingStatus::EFFORT_OUT_OF_RANGE)
    } else {
        (0.0, EncodingStatus::EFFORT_OUT_OF_RANGE)
    }
}

/// Out-of-range percentages clamp to 100, or to the single-block minimum.
fn clamp_block_percent(block_percent: f32) -> (f32, EncodingStatus) {
    if block_percent > 0.0 && block_percent <= 100.0 {
        (block_percent, EncodingStatus::SUCCESS)
    } else if block_percent > 100.0 {
        (100.0, EncodingStatus::BLOCK_PERCENT_OUT_OF_RANGE)
    } else {
        (0.0, EncodingStatus::BLOCK_PERCENT_OUT_OF_RANGE)
    }
}

/// Efforts of the passes that follow the initial effort 0 pass.
fn pass_efforts(effort: f32) -> Vec<f32> {
    let mut efforts: Vec<f32> = REFINEMENT_EFFORTS.iter().copied().filter(|&e| e < effort).collect();
    if effort > 0.0 {
        efforts.push(effort);
    }
    efforts
}

/// Number of blocks a refinement pass takes out of `candidates`.
fn pass_size(candidates: usize, block_percent: f32) -> usize {
    let share = libm::ceilf(candidates as f32 * block_percent / 100.0) as usize;
    share.clamp(1, candidates.max(1))
}

/// Indices of the blocks a refinement pass re-encodes: the worst share of the
/// blocks with non-zero error, ties going to the lower index.
fn refinement_order(errors: &[f32], block_percent: f32) -> Vec<usize> {
    let mut working: Vec<usize> = (0..errors.len()).filter(|&i| errors[i] > 0.0).collect();
    working.sort_by(|&a, &b| errors[b].total_cmp(&errors[a]).then(a.cmp(&b)));
    working.truncate(pass_size(working.len(), block_percent));
    working
}

/// An RGBA8 raster bound to a block format.
///
/// The source is borrowed, never copied. Output buffers are provided by the
/// caller on every call.
#[derive(Clone, Debug)]
pub struct Image<'a> {
    source: Option<&'a [u8]>,
    width: usize,
    height: usize,
    block_columns: usize,
    block_rows: usize,
    raster_size: usize,
    encoded_size: usize,
    format: Format,
    error_metric: ErrorMetric,
    effort: f32,
    encoding_time: Duration,
    error: f32,
    status: EncodingStatus,
}

impl<'a> Image<'a> {
    /// Binds a row-major RGBA8 source of `width * height` pixels.
    pub fn new(
        format: Format,
        source: &'a [u8],
        width: usize,
        height: usize,
        error_metric: ErrorMetric,
    ) -> Result<Self, Error> {
        let mut image = Self::without_source(format, width, height)?;
        let needed = image.raster_size;
        if source.len() < needed {
            return Err(Error::SourceTooSmall {
                needed,
                actual: source.len(),
            });
        }
        image.source = Some(source);
        image.error_metric = error_metric;
        Ok(image)
    }

    /// An image that can only decode.
    pub fn without_source(format: Format, width: usize, height: usize) -> Result<Self, Error> {
        if width == 0 || height == 0 {
            return Err(Error::ZeroDimensions { width, height });
        }
        let (block_columns, block_rows) = (num_blocks(width), num_blocks(height));
        let raster_size = width.checked_mul(height).and_then(|n| n.checked_mul(4));
        let encoded_size = block_columns
            .checked_mul(block_rows)
            .and_then(|n| n.checked_mul(format.block_size()));
        let (raster_size, encoded_size) = match (raster_size, encoded_size) {
            (Some(raster_size), Some(encoded_size)) => (raster_size, encoded_size),
            _ => return Err(Error::DimensionsTooLarge { width, height }),
        };
        Ok(Image {
            source: None,
            width,
            height,
            block_columns,
            block_rows,
            raster_size,
            encoded_size,
            format,
            error_metric: ErrorMetric::default(),
            effort: 0.0,
            encoding_time: Duration::ZERO,
            error: 0.0,
            status: EncodingStatus::SUCCESS,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn block_columns(&self) -> usize {
        self.block_columns
    }

    pub fn block_rows(&self) -> usize {
        self.block_rows
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn error_metric(&self) -> ErrorMetric {
        self.error_metric
    }

    /// Effort of the last encode, after clamping.
    pub fn effort(&self) -> f32 {
        self.effort
    }

    /// Wall time of the last call. Always zero without the `std` feature.
    pub fn encoding_time(&self) -> Duration {
        self.encoding_time
    }

    /// Sum of the block errors of the last encode.
    pub fn error(&self) -> f32 {
        self.error
    }

    /// Flags raised by the last call.
    pub fn status(&self) -> EncodingStatus {
        self.status
    }

    /// Size in bytes of the encoded block grid.
    pub fn encoded_size(&self) -> usize {
        self.encoded_size
    }

    /// Source pixel with coordinates clamped to the last row and column.
    pub fn source_pixel(&self, x: usize, y: usize) -> Option<Rgba8> {
        self.source.map(|source| self.pixel_at(source, x, y))
    }

    fn pixel_at(&self, source: &[u8], x: usize, y: usize) -> Rgba8 {
        let x = x.min(self.width - 1);
        let y = y.min(self.height - 1);
        let offset = 4 * (y * self.width + x);
        [
            source[offset],
            source[offset + 1],
            source[offset + 2],
            source[offset + 3],
        ]
    }

    fn block(&self, source: &[u8], column: usize, row: usize) -> Block4x4 {
        let mut rgba = [[0u8; 4]; 16];
        for (i, pixel) in rgba.iter_mut().enumerate() {
            *pixel = self.pixel_at(source, 4 * column + i % 4, 4 * row + i / 4);
        }
        Block4x4::new(rgba)
    }

    fn check_output(&self, actual: usize) -> Result<usize, Error> {
        let needed = self.encoded_size();
        if actual < needed {
            return Err(Error::BufferTooSmall { needed, actual });
        }
        Ok(needed)
    }

    fn finish(&mut self, stopwatch: Stopwatch, error: f32, status: EncodingStatus) -> EncodingStatus {
        self.encoding_time = stopwatch.elapsed();
        self.error = error;
        self.status = status;
        debug!(
            "{} {}x{}: effort {}, error {}, {:?}",
            self.format,
            self.width,
            self.height,
            self.effort,
            self.error,
            self.encoding_time
        );
        status
    }

    /// Encodes every block once at `effort`.
    ///
    /// * `effort` - Search depth in `[0, 100]`; clamped otherwise
    /// * `output` - At least [`Image::encoded_size`] bytes, filled in row-major block order
    pub fn encode_singlepass(&mut self, effort: f32, output: &mut [u8]) -> Result<EncodingStatus, Error> {
        let source = self.source.ok_or(Error::MissingSource)?;
        let needed = self.check_output(output.len())?;
        let stopwatch = Stopwatch::start();

        let (effort, mut status) = clamp_effort(effort);
        self.effort = effort;
        let (format, metric) = (self.format, self.error_metric);
        let block_size = format.block_size();
        let this = &*self;

        #[cfg(feature = "rayon")]
        let output_rows = output[..needed].par_chunks_mut(this.block_columns * block_size);
        #[cfg(not(feature = "rayon"))]
        let output_rows = output[..needed].chunks_mut(this.block_columns * block_size);

        let rows: Vec<(f32, EncodingStatus)> = output_rows
            .enumerate()
            .map(|(row, output_row)| {
                let mut error = 0.0;
                let mut status = EncodingStatus::SUCCESS;
                for (column, output_block) in output_row.chunks_mut(block_size).enumerate() {
                    let encoding = this.block(source, column, row).encode(format, metric, effort);
                    encoding.bits.write_to(output_block);
                    error += encoding.error;
                    status |= encoding.status;
                }
                (error, status)
            })
            .collect();

        let mut error = 0.0;
        for (row_error, row_status) in rows {
            error += row_error;
            status |= row_status;
        }
        Ok(self.finish(stopwatch, error, status))
    }

    /// Encodes every block at effort 0, then refines the worst blocks in passes
    /// of increasing effort up to `effort`.
    ///
    /// * `block_percent` - Share of the blocks with non-zero error re-encoded by each
    ///   pass, in `(0, 100]`; clamped otherwise, at least one block per pass
    /// * `effort` - Effort of the final pass, in `[0, 100]`; clamped otherwise
    /// * `output` - At least [`Image::encoded_size`] bytes, filled in row-major block order
    pub fn encode(&mut self, block_percent: f32, effort: f32, output: &mut [u8]) -> Result<EncodingStatus, Error> {
        let source = self.source.ok_or(Error::MissingSource)?;
        let needed = self.check_output(output.len())?;
        let stopwatch = Stopwatch::start();

        let (effort, mut status) = clamp_effort(effort);
        let (block_percent, percent_status) = clamp_block_percent(block_percent);
        status |= percent_status;
        self.effort = effort;
        let (format, metric) = (self.format, self.error_metric);

        let count = self.block_columns * self.block_rows;
        let blocks: Vec<Block4x4> = (0..count)
            .map(|i| self.block(source, i % self.block_columns, i / self.block_columns))
            .collect();

        #[cfg(feature = "rayon")]
        let initial = blocks.par_iter();
        #[cfg(not(feature = "rayon"))]
        let initial = blocks.iter();
        let mut encodings: Vec<BlockEncoding> = initial.map(|block| block.encode(format, metric, 0.0)).collect();

        for pass_effort in pass_efforts(effort) {
            let errors: Vec<f32> = encodings.iter().map(|encoding| encoding.error).collect();
            let working = refinement_order(&errors, block_percent);
            if working.is_empty() {
                trace!("every block is exact, skipping the pass at effort {pass_effort}");
                break;
            }
            debug!("refining {} of {count} blocks at effort {pass_effort}", working.len());

            #[cfg(feature = "rayon")]
            let selected = working.par_iter();
            #[cfg(not(feature = "rayon"))]
            let selected = working.iter();
            let refined: Vec<(usize, BlockEncoding)> = selected
                .map(|&i| (i, blocks[i].encode(format, metric, pass_effort)))
                .collect();

            for (i, encoding) in refined {
                if encoding.error < encodings[i].error {
                    encodings[i] = encoding;
                }
            }
        }

        let mut error = 0.0;
        for (encoding, output_block) in encodings.iter().zip(output[..needed].chunks_mut(format.block_size())) {
            encoding.bits.write_to(output_block);
            error += encoding.error;
            status |= encoding.status;
        }
        Ok(self.finish(stopwatch, error, status))
    }

    /// Decodes a block grid into a `width * height` RGBA8 raster.
    ///
    /// Pixels of the padding region are dropped. Blocks that cannot be decoded
    /// are written as opaque black and raise [`EncodingStatus::MALFORMED_BLOCK`].
    pub fn decode(&mut self, blocks: &[u8], output: &mut [u8]) -> Result<EncodingStatus, Error> {
        let needed = self.encoded_size();
        if blocks.len() < needed {
            return Err(Error::SourceTooSmall {
                needed,
                actual: blocks.len(),
            });
        }
        let pixels = self.raster_size;
        if output.len() < pixels {
            return Err(Error::BufferTooSmall {
                needed: pixels,
                actual: output.len(),
            });
        }
        let stopwatch = Stopwatch::start();

        let format = self.format;
        let block_size = format.block_size();
        let (width, block_columns) = (self.width, self.block_columns);
        let row_pitch = width * 4;

        #[cfg(feature = "rayon")]
        let output_rows = output[..pixels].par_chunks_mut(row_pitch.saturating_mul(4));
        #[cfg(not(feature = "rayon"))]
        let output_rows = output[..pixels].chunks_mut(row_pitch.saturating_mul(4));

        let malformed: usize = output_rows
            .enumerate()
            .map(|(y, output_row)| {
                let rows_here = output_row.len() / row_pitch;
                let mut malformed = 0;
                for x in 0..block_columns {
                    let offset = (x + y * block_columns) * block_size;
                    let rgba = decode_block(format, &blocks[offset..offset + block_size]).unwrap_or_else(|black| {
                        malformed += 1;
                        black
                    });

                    for py in 0..rows_here.min(4) {
                        for px in 0..4 {
                            let sx = 4 * x + px;
                            if sx < width {
                                let target = py * row_pitch + 4 * sx;
                                output_row[target..target + 4].copy_from_slice(&rgba[px + py * 4]);
                            }
                        }
                    }
                }
                malformed
            })
            .sum();

        let mut status = EncodingStatus::SUCCESS;
        if malformed > 0 {
            warn!("{malformed} malformed {format} blocks decoded as opaque black");
            status |= EncodingStatus::MALFORMED_BLOCK;
        }
        Ok(self.finish(stopwatch, 0.0, status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn gradient(width: usize, height: usize) -> Vec<u8> {
        let mut rgba = Vec::with_capacity(width * height * 4);
        for y in 0..height {
            for x in 0..width {
                rgba.extend_from_slice(&[(x * 16) as u8, (y * 16) as u8, 128, 255]);
            }
        }
        rgba
    }

    #[test]
    fn test_source_pixel_clamps() {
        let source = gradient(5, 5);
        let image = Image::new(Format::Rgb8, &source, 5, 5, ErrorMetric::Numeric).unwrap();
        assert_eq!(image.block_columns(), 2);
        assert_eq!(image.block_rows(), 2);
        for y in 0..8 {
            for x in 0..8 {
                let expected = [(x.min(4) * 16) as u8, (y.min(4) * 16) as u8, 128, 255];
                assert_eq!(image.source_pixel(x, y), Some(expected), "({x}, {y})");
            }
        }
        assert_eq!(Image::without_source(Format::Rgb8, 5, 5).unwrap().source_pixel(0, 0), None);
    }

    #[test]
    fn test_preconditions() {
        let source = gradient(4, 4);
        assert_eq!(
            Image::new(Format::Etc1, &source, 0, 4, ErrorMetric::Numeric).unwrap_err(),
            Error::ZeroDimensions { width: 0, height: 4 }
        );
        assert_eq!(
            Image::new(Format::Etc1, &source[..60], 4, 4, ErrorMetric::Numeric).unwrap_err(),
            Error::SourceTooSmall { needed: 64, actual: 60 }
        );

        let mut image = Image::new(Format::Rgba8, &source, 4, 4, ErrorMetric::Numeric).unwrap();
        let mut output = [0u8; 8];
        assert_eq!(
            image.encode_singlepass(50.0, &mut output),
            Err(Error::BufferTooSmall { needed: 16, actual: 8 })
        );
        assert_eq!(image.encode(10.0, 50.0, &mut output), Err(Error::BufferTooSmall { needed: 16, actual: 8 }));

        let mut decoder = Image::without_source(Format::Rgba8, 4, 4).unwrap();
        assert_eq!(decoder.encode_singlepass(50.0, &mut [0u8; 16]), Err(Error::MissingSource));
        assert_eq!(
            decoder.decode(&[0u8; 16], &mut [0u8; 60]),
            Err(Error::BufferTooSmall { needed: 64, actual: 60 })
        );
    }

    #[test]
    fn test_out_of_range_settings_are_flagged() {
        let source = gradient(4, 4);
        let mut image = Image::new(Format::Rgb8, &source, 4, 4, ErrorMetric::Numeric).unwrap();
        let mut output = [0u8; 8];

        let status = image.encode_singlepass(150.0, &mut output).unwrap();
        assert_eq!(status, EncodingStatus::EFFORT_OUT_OF_RANGE);
        assert_eq!(image.effort(), 100.0);

        let status = image.encode(0.0, -5.0, &mut output).unwrap();
        assert_eq!(
            status,
            EncodingStatus::EFFORT_OUT_OF_RANGE | EncodingStatus::BLOCK_PERCENT_OUT_OF_RANGE
        );
        assert_eq!(image.effort(), 0.0);
        assert_eq!(image.status(), status);
    }

    #[test]
    fn test_pass_schedule() {
        assert!(pass_efforts(0.0).is_empty());
        assert_eq!(pass_efforts(25.0), vec![25.0]);
        assert_eq!(pass_efforts(60.0), vec![25.0, 50.0, 60.0]);
        assert_eq!(pass_efforts(100.0), vec![25.0, 50.0, 75.0, 100.0]);

        assert_eq!(pass_size(10, 10.0), 1);
        assert_eq!(pass_size(10, 15.0), 2);
        assert_eq!(pass_size(10, 0.0), 1);
        assert_eq!(pass_size(10, 100.0), 10);
    }

    #[test]
    fn test_huge_dimensions() {
        assert_eq!(
            Image::without_source(Format::Etc1, usize::MAX / 2, 4).unwrap_err(),
            Error::DimensionsTooLarge {
                width: usize::MAX / 2,
                height: 4
            }
        );
        assert_eq!(
            Image::without_source(Format::Rg11, usize::MAX, 1).unwrap_err(),
            Error::DimensionsTooLarge {
                width: usize::MAX,
                height: 1
            }
        );
        assert_eq!(
            Image::new(Format::Etc1, &[0u8; 16], usize::MAX / 3, usize::MAX / 3, ErrorMetric::Numeric).unwrap_err(),
            Error::DimensionsTooLarge {
                width: usize::MAX / 3,
                height: usize::MAX / 3
            }
        );
    }

    #[test]
    fn test_refinement_order() {
        let errors = [0.5, 0.0, 0.5, 0.9, 0.5, 0.1];
        assert_eq!(refinement_order(&errors, 1.0), vec![3]);
        assert_eq!(refinement_order(&errors, 40.0), vec![3, 0]);
        assert_eq!(refinement_order(&errors, 60.0), vec![3, 0, 2]);
        assert_eq!(refinement_order(&errors, 100.0), vec![3, 0, 2, 4, 5]);
        assert!(refinement_order(&[0.0; 4], 100.0).is_empty());
    }

    /// Three noisy but smooth blocks around one red and blue checkerboard.
    fn one_hard_block() -> Vec<u8> {
        let mut rgba = Vec::with_capacity(16 * 4 * 4);
        for y in 0..4 {
            for x in 0..16 {
                let pixel = if x / 4 == 2 {
                    if (x + y) % 2 == 0 {
                        [255, 0, 0, 255]
                    } else {
                        [0, 0, 255, 255]
                    }
                } else {
                    let i = x + 16 * y;
                    [(100 + i * 7 % 11) as u8, (100 + i * 5 % 13) as u8, (100 + i * 3 % 7) as u8, 255]
                };
                rgba.extend_from_slice(&pixel);
            }
        }
        rgba
    }

    #[test]
    fn test_multipass_refines_the_worst_block() {
        let source = one_hard_block();
        let mut image = Image::new(Format::Rgb8, &source, 16, 4, ErrorMetric::Numeric).unwrap();
        let mut initial = vec![0u8; image.encoded_size()];
        image.encode_singlepass(0.0, &mut initial).unwrap();
        let initial_error = image.error();
        assert!(initial_error > 0.0);

        // one block per pass, at efforts 25 and 50
        let mut refined = vec![0u8; image.encoded_size()];
        image.encode(1.0, 50.0, &mut refined).unwrap();
        assert!(image.error() < initial_error, "{} >= {initial_error}", image.error());
        for block in [0, 1, 3] {
            let range = 8 * block..8 * block + 8;
            assert_eq!(refined[range.clone()], initial[range], "block {block}");
        }
        assert_ne!(refined[16..24], initial[16..24]);
    }

    #[test]
    fn test_multipass_matches_singlepass_at_zero_effort() {
        let source = gradient(8, 8);
        let mut image = Image::new(Format::Srgb8, &source, 8, 8, ErrorMetric::Rec709).unwrap();
        let mut single = vec![0u8; image.encoded_size()];
        let mut multi = vec![0u8; image.encoded_size()];
        image.encode_singlepass(0.0, &mut single).unwrap();
        let single_error = image.error();
        image.encode(100.0, 0.0, &mut multi).unwrap();
        assert_eq!(single, multi);
        assert!((image.error() - single_error).abs() <= 1e-6 * single_error.max(1.0));
    }

    #[test]
    fn test_decode_drops_padding() {
        let source = [[0u8, 0, 0, 255]; 9].concat();
        let mut image = Image::new(Format::Etc1, &source, 3, 3, ErrorMetric::Numeric).unwrap();
        let mut blocks = [0u8; 8];
        image.encode_singlepass(0.0, &mut blocks).unwrap();

        let mut output = [7u8; 3 * 3 * 4 + 4];
        let status = image.decode(&blocks, &mut output).unwrap();
        assert!(status.is_success());
        assert_eq!(&output[..36], &source[..]);
        assert_eq!(&output[36..], &[7u8; 4]);
    }
}
