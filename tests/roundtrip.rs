use etcblock::{compressed_size, decompress, EncodingStatus, ErrorMetric, Format, Image};

const SIZE: usize = 16;

/// Smooth colour and alpha ramps, gentle enough for every mode family.
fn gradient() -> Vec<u8> {
    let mut rgba = Vec::with_capacity(SIZE * SIZE * 4);
    for y in 0..SIZE {
        for x in 0..SIZE {
            rgba.extend_from_slice(&[(x * 4) as u8, (y * 4) as u8, 100, (255 - x * 2 - y * 2) as u8]);
        }
    }
    rgba
}

fn encode(format: Format, rgba: &[u8], metric: ErrorMetric, effort: f32, multipass: Option<f32>) -> (Vec<u8>, f32) {
    let mut image = Image::new(format, rgba, SIZE, SIZE, metric).unwrap();
    let mut blocks = vec![0u8; compressed_size(format, SIZE, SIZE)];
    match multipass {
        Some(block_percent) => image.encode(block_percent, effort, &mut blocks).unwrap(),
        None => image.encode_singlepass(effort, &mut blocks).unwrap(),
    };
    (blocks, image.error())
}

fn decode(format: Format, blocks: &[u8]) -> Vec<u8> {
    let mut rgba = vec![0u8; SIZE * SIZE * 4];
    let status = decompress(format, blocks, SIZE, SIZE, &mut rgba).unwrap();
    assert!(status.is_success());
    rgba
}

/// Largest per-channel deviation over the channels in `channels`.
fn max_deviation(a: &[u8], b: &[u8], channels: &[usize]) -> u8 {
    a.chunks(4)
        .zip(b.chunks(4))
        .flat_map(|(p, q)| channels.iter().map(move |&c| p[c].abs_diff(q[c])))
        .max()
        .unwrap_or(0)
}

#[test]
fn test_colour_formats_round_trip() {
    let rgba = gradient();
    for format in [Format::Etc1, Format::Rgb8, Format::Srgb8, Format::Rgb8A1, Format::Srgb8A1] {
        for effort in [0.0, 50.0, 100.0] {
            let (blocks, _) = encode(format, &rgba, ErrorMetric::Rec709, effort, None);
            let decoded = decode(format, &blocks);
            let deviation = max_deviation(&rgba, &decoded, &[0, 1, 2]);
            assert!(deviation <= 24, "{format} at {effort}: {deviation}");
            assert!(decoded.chunks(4).all(|p| p[3] == 255), "{format}");
        }
    }
}

#[test]
fn test_alpha_formats_round_trip() {
    let rgba = gradient();
    for format in [Format::Rgba8, Format::Srgba8] {
        for effort in [0.0, 50.0, 100.0] {
            let (blocks, _) = encode(format, &rgba, ErrorMetric::Numeric, effort, None);
            let decoded = decode(format, &blocks);
            assert!(max_deviation(&rgba, &decoded, &[0, 1, 2]) <= 24, "{format} at {effort}");
            assert!(max_deviation(&rgba, &decoded, &[3]) <= 8, "{format} at {effort}");
        }
    }
}

#[test]
fn test_channel_formats_round_trip() {
    let rgba = gradient();
    for (format, channels) in [
        (Format::R11, &[0usize][..]),
        (Format::SignedR11, &[0][..]),
        (Format::Rg11, &[0, 1][..]),
        (Format::SignedRg11, &[0, 1][..]),
    ] {
        for effort in [0.0, 100.0] {
            let (blocks, _) = encode(format, &rgba, ErrorMetric::Numeric, effort, None);
            let decoded = decode(format, &blocks);
            assert!(max_deviation(&rgba, &decoded, channels) <= 6, "{format} at {effort}");
            for pixel in decoded.chunks(4) {
                assert_eq!(pixel[2], 0);
                assert_eq!(pixel[3], 255);
                if channels.len() == 1 {
                    assert_eq!(pixel[1], 0);
                }
            }
        }
    }
}

#[test]
fn test_encoding_is_deterministic() {
    let rgba = gradient();
    for format in Format::ALL {
        for multipass in [None, Some(30.0)] {
            let first = encode(format, &rgba, ErrorMetric::Rec709, 60.0, multipass);
            let second = encode(format, &rgba, ErrorMetric::Rec709, 60.0, multipass);
            assert_eq!(first.0, second.0, "{format}");
            assert_eq!(first.1, second.1, "{format}");
        }
    }
}

#[test]
fn test_error_does_not_grow_with_effort() {
    let rgba = gradient();
    for format in Format::ALL {
        for metric in [ErrorMetric::Numeric, ErrorMetric::Rec709, ErrorMetric::Rgba] {
            for multipass in [None, Some(20.0), Some(100.0)] {
                let (_, low) = encode(format, &rgba, metric, 0.0, multipass);
                let (_, high) = encode(format, &rgba, metric, 100.0, multipass);
                assert!(high <= low, "{format} {metric} {multipass:?}: {high} > {low}");
            }
        }
    }
}

#[test]
fn test_multipass_at_full_share_is_no_worse_than_singlepass() {
    let rgba = gradient();
    for format in [Format::Rgb8, Format::Rgba8, Format::Rg11] {
        let (_, single) = encode(format, &rgba, ErrorMetric::Rec709, 80.0, None);
        let (_, multi) = encode(format, &rgba, ErrorMetric::Rec709, 80.0, Some(100.0));
        assert!(multi <= single * (1.0 + 1e-5) + 1e-6, "{format}: {multi} > {single}");
    }
}

#[test]
fn test_statistics_follow_last_call() {
    let rgba = gradient();
    let mut image = Image::new(Format::Rgb8, &rgba, SIZE, SIZE, ErrorMetric::Numeric).unwrap();
    let mut blocks = vec![0u8; image.encoded_size()];

    let status = image.encode_singlepass(30.0, &mut blocks).unwrap();
    assert_eq!(status, EncodingStatus::SOME_NON_OPAQUE_PIXELS);
    assert_eq!(image.status(), status);
    assert_eq!(image.effort(), 30.0);
    assert!(image.error() > 0.0);

    let mut decoded = vec![0u8; rgba.len()];
    let status = image.decode(&blocks, &mut decoded).unwrap();
    assert!(status.is_success());
    assert_eq!(image.status(), EncodingStatus::SUCCESS);
}
