use image::{ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use vega_preprocess::{decode, DecodeError, PixelStats, Preprocessor, Source};

fn png_bytes(img: &RgbImage) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

#[test]
fn cpu_smoke() -> anyhow::Result<()> {
    // Fake 640×480 scene, white
    let img = RgbImage::from_pixel(640, 480, Rgb([255, 255, 255]));
    let decoded = decode(&Source::bytes(png_bytes(&img)))?;
    assert_eq!(decoded.dimensions(), (640, 480));

    let pp = Preprocessor::default();
    let out = pp.run(&decoded)?;
    assert_eq!(out.shape(), &[1, 3, 224, 224]);
    Ok(())
}

#[test]
fn path_and_bytes_decode_identically() -> anyhow::Result<()> {
    let img = RgbImage::from_fn(33, 21, |x, y| Rgb([x as u8 * 5, y as u8 * 9, 77]));
    let bytes = png_bytes(&img);

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("patch.png");
    std::fs::write(&path, &bytes)?;

    let from_path = decode(&Source::path(&path))?;
    let from_bytes = decode(&Source::bytes(bytes))?;
    assert_eq!(from_path, from_bytes);
    assert_eq!(PixelStats::of(&from_path), PixelStats::of(&img));
    Ok(())
}

#[test]
fn garbage_bytes_fail_to_decode() {
    let err = decode(&Source::bytes(b"definitely not an image".to_vec())).unwrap_err();
    assert!(matches!(err, DecodeError::Image { .. } | DecodeError::Format(_)));
}

#[test]
fn missing_path_fails_to_open() {
    let err = decode(&Source::path("/nonexistent/vega/tile.png")).unwrap_err();
    assert!(matches!(err, DecodeError::Open { .. }));
}
