//! Font copy and image optimization pipelines.

use crate::build::context::BuildContext;
use crate::build::result::TaskOutput;
use crate::config::ImagesConfig;
use crate::error::TaskError;
use crate::paths::Category;
use crate::pipeline::size::human_size;
use crate::pipeline::svg::optimize_svg;
use crate::pipeline::{read_category, write_all, Asset};
use image::codecs::gif::GifDecoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{AnimationDecoder, DynamicImage, ImageEncoder, ImageFormat};
use rayon::prelude::*;
use std::io::Cursor;

/// Copy every font file to the distribution directory, keeping the layout
/// below the font glob base.
pub fn copy_fonts(ctx: &BuildContext, task: &str) -> Result<TaskOutput, TaskError> {
    let fonts = read_category(ctx.registry(), Category::Fonts)?;
    let files = write_all(&fonts, &ctx.registry().dest())?;
    tracing::info!(task, count = files.len(), "copied fonts");
    Ok(TaskOutput::with_files(files))
}

/// Optimize every image in parallel and write the results to the
/// distribution directory.
pub fn optimize_images(ctx: &BuildContext, task: &str) -> Result<TaskOutput, TaskError> {
    let options = &ctx.config().images;
    let images = read_category(ctx.registry(), Category::Images)?;
    let before: usize = images.iter().map(|a| a.contents.len()).sum();

    let optimized = images
        .into_par_iter()
        .map(|asset| optimize_image(asset, options))
        .collect::<Result<Vec<_>, _>>()?;

    let after: usize = optimized.iter().map(|a| a.contents.len()).sum();
    tracing::info!(
        task,
        count = optimized.len(),
        "optimized images, saved {}",
        human_size(before.saturating_sub(after))
    );

    let files = write_all(&optimized, &ctx.registry().dest())?;
    Ok(TaskOutput::with_files(files))
}

/// Optimize one image by extension. The optimized bytes are kept only when
/// they are smaller than the input.
pub fn optimize_image(mut asset: Asset, options: &ImagesConfig) -> Result<Asset, TaskError> {
    let image_error =
        |message: String| TaskError::Image { file: asset.display_path(), message };

    let optimized = match asset.extension().as_deref() {
        Some("png") => encode_png(&asset.contents, options.png_level).map_err(image_error)?,
        Some("jpg") | Some("jpeg") => {
            encode_jpeg(&asset.contents, options.jpeg_quality, options.jpeg_progressive)
                .map_err(image_error)?
        }
        Some("gif") => encode_gif(&asset.contents, options.gif_interlaced).map_err(image_error)?,
        Some("svg") => optimize_svg(asset.text()?, options.svg).into_bytes(),
        _ => return Ok(asset),
    };

    if optimized.len() < asset.contents.len() {
        tracing::debug!(
            file = %asset.name(),
            before = asset.contents.len(),
            after = optimized.len(),
            "optimized"
        );
        asset.contents = optimized;
    }
    Ok(asset)
}

fn decode(bytes: &[u8], format: ImageFormat) -> Result<DynamicImage, String> {
    image::load_from_memory_with_format(bytes, format).map_err(|e| e.to_string())
}

/// Re-encode a PNG; levels 5 and up use the strongest deflate setting.
fn encode_png(bytes: &[u8], level: u8) -> Result<Vec<u8>, String> {
    let image = decode(bytes, ImageFormat::Png)?;
    let compression = if level >= 5 { CompressionType::Best } else { CompressionType::Default };

    let mut out = Vec::new();
    PngEncoder::new_with_quality(&mut out, compression, FilterType::Adaptive)
        .write_image(image.as_bytes(), image.width(), image.height(), image.color())
        .map_err(|e| e.to_string())?;
    Ok(out)
}

/// Re-encode a JPEG at a fixed quality, baseline or progressive.
fn encode_jpeg(bytes: &[u8], quality: u8, progressive: bool) -> Result<Vec<u8>, String> {
    let image = decode(bytes, ImageFormat::Jpeg)?;
    let (width, height) = dimensions(image.width(), image.height(), "JPEG")?;

    let mut out = Vec::new();
    let mut encoder = jpeg_encoder::Encoder::new(&mut out, quality.clamp(1, 100));
    encoder.set_progressive(progressive);
    let encoded = match image {
        DynamicImage::ImageLuma8(gray) => {
            encoder.encode(gray.as_raw(), width, height, jpeg_encoder::ColorType::Luma)
        }
        other => {
            let rgb = other.to_rgb8();
            encoder.encode(rgb.as_raw(), width, height, jpeg_encoder::ColorType::Rgb)
        }
    };
    encoded.map_err(|e| e.to_string())?;
    Ok(out)
}

/// Both encoders take 16-bit dimensions.
fn dimensions(width: u32, height: u32, format: &str) -> Result<(u16, u16), String> {
    match (u16::try_from(width), u16::try_from(height)) {
        (Ok(w), Ok(h)) => Ok((w, h)),
        _ => Err(format!("{}x{} is too large to encode as {}", width, height, format)),
    }
}

/// Re-encode every frame of a GIF, keeping frame delays. Animated images
/// loop forever.
fn encode_gif(bytes: &[u8], interlaced: bool) -> Result<Vec<u8>, String> {
    let decoder = GifDecoder::new(Cursor::new(bytes)).map_err(|e| e.to_string())?;
    let frames = decoder.into_frames().collect_frames().map_err(|e| e.to_string())?;
    let (width, height) = match frames.first() {
        Some(frame) => dimensions(frame.buffer().width(), frame.buffer().height(), "GIF")?,
        None => return Err("GIF has no frames".to_string()),
    };

    let mut out = Vec::new();
    {
        let mut encoder =
            gif::Encoder::new(&mut out, width, height, &[]).map_err(|e| e.to_string())?;
        if frames.len() > 1 {
            encoder.set_repeat(gif::Repeat::Infinite).map_err(|e| e.to_string())?;
        }
        for frame in frames {
            let (numer, denom) = frame.delay().numer_denom_ms();
            let delay_ms = if denom == 0 { 0 } else { numer / denom };
            let mut rgba = frame.into_buffer().into_raw();

            let mut gif_frame = gif::Frame::from_rgba_speed(width, height, &mut rgba, 10);
            gif_frame.delay = u16::try_from(delay_ms / 10).unwrap_or(u16::MAX);
            gif_frame.interlaced = interlaced;
            encoder.write_frame(&gif_frame).map_err(|e| e.to_string())?;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AssetConfig;
    use image::codecs::gif::GifEncoder;
    use image::codecs::jpeg::JpegEncoder;
    use image::{ColorType, Rgb, RgbImage, Rgba, RgbaImage};
    use std::fs;
    use tempfile::TempDir;

    fn png_bytes() -> Vec<u8> {
        let img = RgbaImage::from_pixel(32, 32, Rgba([200, 10, 10, 255]));
        let mut out = Vec::new();
        PngEncoder::new_with_quality(&mut out, CompressionType::Fast, FilterType::NoFilter)
            .write_image(img.as_raw(), 32, 32, ColorType::Rgba8)
            .unwrap();
        out
    }

    fn jpeg_bytes() -> Vec<u8> {
        let img = RgbImage::from_fn(64, 64, |x, y| Rgb([(x * 4) as u8, (y * 4) as u8, 128]));
        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, 100)
            .encode(img.as_raw(), 64, 64, ColorType::Rgb8)
            .unwrap();
        out
    }

    #[test]
    fn test_png_never_grows() {
        let input = png_bytes();
        let asset = optimize_image(Asset::new("a.png", input.clone()), &ImagesConfig::default())
            .unwrap();
        assert!(asset.contents.len() <= input.len());
        let decoded = image::load_from_memory(&asset.contents).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (32, 32));
    }

    #[test]
    fn test_jpeg_quality_reduces_size() {
        let input = jpeg_bytes();
        let asset =
            optimize_image(Asset::new("photo.JPG", input.clone()), &ImagesConfig::default())
                .unwrap();
        assert!(asset.contents.len() < input.len());
    }

    /// Whether the JPEG carries a start-of-frame marker of the given kind.
    /// Entropy-coded 0xFF bytes are stuffed with 0x00, so a match is a marker.
    fn has_marker(jpeg: &[u8], marker: u8) -> bool {
        jpeg.windows(2).any(|w| w == [0xFF, marker])
    }

    #[test]
    fn test_jpeg_progressive_toggle() {
        let input = jpeg_bytes();
        assert!(!has_marker(&input, 0xC2));

        let progressive = encode_jpeg(&input, 75, true).unwrap();
        assert!(has_marker(&progressive, 0xC2));
        assert!(!has_marker(&progressive, 0xC0));
        let decoded = image::load_from_memory(&progressive).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 64));

        let baseline = encode_jpeg(&input, 75, false).unwrap();
        assert!(has_marker(&baseline, 0xC0));
        assert!(!has_marker(&baseline, 0xC2));
    }

    fn gif_bytes(frames: usize) -> Vec<u8> {
        let mut input = Vec::new();
        {
            let mut encoder = GifEncoder::new(&mut input);
            for i in 0..frames {
                let color = Rgba([0, (i * 80) as u8, 255, 255]);
                let frame = image::Frame::new(RgbaImage::from_pixel(8, 8, color));
                encoder.encode_frame(frame).unwrap();
            }
        }
        input
    }

    fn gif_frames(bytes: &[u8]) -> Vec<bool> {
        let mut options = gif::DecodeOptions::new();
        options.set_color_output(gif::ColorOutput::RGBA);
        let mut decoder = options.read_info(Cursor::new(bytes)).unwrap();
        let mut interlaced = Vec::new();
        while let Some(frame) = decoder.read_next_frame().unwrap() {
            interlaced.push(frame.interlaced);
        }
        interlaced
    }

    #[test]
    fn test_gif_interlace_toggle() {
        let input = gif_bytes(3);
        assert_eq!(gif_frames(&input), vec![false; 3]);

        assert_eq!(gif_frames(&encode_gif(&input, true).unwrap()), vec![true; 3]);
        assert_eq!(gif_frames(&encode_gif(&input, false).unwrap()), vec![false; 3]);
    }

    #[test]
    fn test_gif_roundtrips_frames() {
        let input = gif_bytes(1);
        let asset =
            optimize_image(Asset::new("a.gif", input.clone()), &ImagesConfig::default()).unwrap();
        let decoded = image::load_from_memory(&asset.contents).unwrap();
        assert_eq!(decoded.width(), 8);
    }

    #[test]
    fn test_corrupt_image_fails() {
        let asset = Asset::new("bad.png", b"not a png".to_vec());
        let err = optimize_image(asset, &ImagesConfig::default()).unwrap_err();
        assert!(matches!(err, TaskError::Image { .. }));
    }

    #[test]
    fn test_svg_goes_through_optimizer() {
        let svg = "<!-- c -->\n<svg>\n  <path d=\"M0 0\"/>\n</svg>\n";
        let asset = optimize_image(Asset::new("i.svg", svg), &ImagesConfig::default()).unwrap();
        assert_eq!(asset.text().unwrap(), "<svg><path d=\"M0 0\"/></svg>");
    }

    #[test]
    fn test_fonts_copied_with_layout() {
        let temp = TempDir::new().unwrap();
        let ctx = BuildContext::new(AssetConfig::default(), temp.path().to_path_buf());
        let font = temp.path().join("src/fonts/inter/Inter.woff2");
        fs::create_dir_all(font.parent().unwrap()).unwrap();
        fs::write(&font, b"wOF2data").unwrap();

        let output = copy_fonts(&ctx, "fonts").unwrap();
        let out = temp.path().join("assets/inter/Inter.woff2");
        assert_eq!(output.files, vec![out.clone()]);
        assert_eq!(fs::read(out).unwrap(), b"wOF2data");
    }

    #[test]
    fn test_images_pipeline_writes_to_dest() {
        let temp = TempDir::new().unwrap();
        let ctx = BuildContext::new(AssetConfig::default(), temp.path().to_path_buf());
        let dir = temp.path().join("src/img/icons");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("logo.png"), png_bytes()).unwrap();
        fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let output = optimize_images(&ctx, "images").unwrap();
        assert_eq!(output.files, vec![temp.path().join("assets/icons/logo.png")]);
        assert!(!temp.path().join("assets/icons/notes.txt").exists());
    }
}
