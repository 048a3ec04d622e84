//! Decode and encode the raw sensor bitmaps embedded in
//! thermal image metadata.
//!
//! FLIR cameras embed the sensor matrix as a complete TIFF or
//! PNG grayscale image inside the exif data. Decoding always
//! yields 16-bit counts (8-bit containers are widened).
//! Encoding writes raw counts back in the native container,
//! and temperature fields as TIFF at a configurable bit
//! depth.

use std::io::Cursor;

use byteordered::ByteOrdered;
use image::{ColorType, ImageDecoder};
use itertools::iproduct;
use ndarray::Array2;
use tracing::debug;

use crate::error::{Error, Result};

/// Container format of the embedded raw bitmap, from the
/// `RawThermalImageType` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawFormat {
    Tiff,
    Png,
}

impl RawFormat {
    pub fn from_tag(ty: &str) -> Result<Self> {
        match ty.trim().to_ascii_lowercase().as_str() {
            "tiff" => Ok(RawFormat::Tiff),
            "png" => Ok(RawFormat::Png),
            other => Err(Error::UnsupportedFormat(format!(
                "raw thermal image type `{}`",
                other
            ))),
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            RawFormat::Tiff => "tiff",
            RawFormat::Png => "png",
        }
    }
}

/// Sample width of encoded output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitDepth {
    Sixteen,
    ThirtyTwo,
    SixtyFour,
}

impl BitDepth {
    pub fn bits(self) -> u32 {
        match self {
            BitDepth::Sixteen => 16,
            BitDepth::ThirtyTwo => 32,
            BitDepth::SixtyFour => 64,
        }
    }

    pub fn from_bits(bits: u32) -> Result<Self> {
        match bits {
            16 => Ok(BitDepth::Sixteen),
            32 => Ok(BitDepth::ThirtyTwo),
            64 => Ok(BitDepth::SixtyFour),
            other => Err(Error::UnsupportedFormat(format!("bit depth {}", other))),
        }
    }
}

impl std::str::FromStr for BitDepth {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, String> {
        let bits: u32 = s.parse().map_err(|_| format!("invalid bit depth: {}", s))?;
        BitDepth::from_bits(bits).map_err(|e| e.to_string())
    }
}

/// Decode an embedded raw bitmap into a matrix of sensor
/// counts.
pub fn decode_raw(bytes: &[u8], format: RawFormat) -> Result<Array2<u16>> {
    match format {
        RawFormat::Tiff => {
            use image::tiff::TiffDecoder;
            let decoder = TiffDecoder::new(Cursor::new(bytes)).map_err(Error::Decode)?;
            decode_gray(decoder)
        }
        RawFormat::Png => {
            use image::png::PngDecoder;
            let decoder = PngDecoder::new(Cursor::new(bytes)).map_err(Error::Decode)?;
            decode_gray(decoder)
        }
    }
}

fn decode_gray<'a, R: ImageDecoder<'a>>(decoder: R) -> Result<Array2<u16>> {
    let (width, height) = decoder.dimensions();
    let width = width as usize;
    let height = height as usize;
    debug!(width, height, "decoding raw sensor bitmap");

    let samples = match decoder.color_type() {
        ColorType::L8 => decoder_samples::<u8, _>(decoder)?
            .into_iter()
            .map(u16::from)
            .collect(),
        ColorType::L16 => decoder_samples::<u16, _>(decoder)?,
        other => {
            return Err(Error::UnsupportedFormat(format!(
                "raw bitmap color type {:?}",
                other
            )))
        }
    };

    Ok(Array2::from_shape_vec((height, width), samples)?)
}

fn decoder_samples<'a, T, R>(decoder: R) -> Result<Vec<T>>
where
    T: zerocopy::AsBytes + zerocopy::FromBytes,
    R: ImageDecoder<'a>,
{
    use zerocopy::AsBytes;

    let (width, height) = decoder.dimensions();
    let num_pixels = (width * height) as usize;
    let mut samples: Vec<T> = Vec::with_capacity(num_pixels);
    unsafe {
        samples.set_len(num_pixels);
    }
    decoder
        .read_image(samples.as_bytes_mut())
        .map_err(Error::Decode)?;
    Ok(samples)
}

/// Encode raw sensor counts back into their native container.
pub fn encode_raw(raw: &Array2<u16>, format: RawFormat) -> Result<Vec<u8>> {
    let (height, width) = nonzero_dims(raw)?;
    match format {
        RawFormat::Tiff => tiff_gray16(raw, width, height),
        RawFormat::Png => png_gray16(raw, width, height),
    }
}

/// Encode a temperature field as TIFF at the requested bit
/// depth.
///
/// 32- and 64-bit output are native float samples. A 16-bit
/// sample cannot hold Kelvin losslessly, so that depth
/// quantizes through an affine map of `range` onto the full
/// `u16` range.
pub fn encode_temperature(
    temp: &Array2<f64>,
    depth: BitDepth,
    range: (f64, f64),
) -> Result<Vec<u8>> {
    use tiff::encoder::colortype::{Gray32Float, Gray64Float};

    let (height, width) = nonzero_dims(temp)?;
    match depth {
        BitDepth::Sixteen => {
            let quantizer = Quantizer::from_range(range.0, range.1);
            let scaled: Vec<u16> = temp.iter().map(|&val| quantizer.apply(val)).collect();
            tiff_gray::<tiff::encoder::colortype::Gray16>(&scaled, width, height)
        }
        BitDepth::ThirtyTwo => {
            let samples: Vec<f32> = temp.iter().map(|&val| val as f32).collect();
            tiff_gray::<Gray32Float>(&samples, width, height)
        }
        BitDepth::SixtyFour => {
            let samples: Vec<f64> = temp.iter().copied().collect();
            tiff_gray::<Gray64Float>(&samples, width, height)
        }
    }
}

/// Affine map of a value range onto the full `u16` range,
/// clamped at the bounds.
#[derive(Debug, Clone, Copy)]
pub struct Quantizer {
    coeffs: [f64; 2],
}

impl Quantizer {
    /// A degenerate range (`max <= min`) maps everything to 0.
    pub fn from_range(min: f64, max: f64) -> Self {
        let factor = u16::MAX as f64 / (max - min);
        let coeffs = if factor.is_finite() && factor > 0. {
            [-min * factor, factor]
        } else {
            [0., 0.]
        };
        Quantizer { coeffs }
    }

    pub fn apply(&self, val: f64) -> u16 {
        let tval = self.coeffs[0] + self.coeffs[1] * val;
        tval.max(0.).min(u16::MAX as f64) as u16
    }
}

fn nonzero_dims<T>(matrix: &Array2<T>) -> Result<(usize, usize)> {
    let (height, width) = matrix.dim();
    if matrix.is_empty() {
        return Err(Error::EmptyMatrix { height, width });
    }
    Ok((height, width))
}

fn tiff_gray16(raw: &Array2<u16>, width: usize, height: usize) -> Result<Vec<u8>> {
    let samples: Vec<u16> = raw.iter().copied().collect();
    tiff_gray::<tiff::encoder::colortype::Gray16>(&samples, width, height)
}

fn tiff_gray<C>(samples: &[C::Inner], width: usize, height: usize) -> Result<Vec<u8>>
where
    C: tiff::encoder::colortype::ColorType,
    [C::Inner]: tiff::encoder::TiffValue,
{
    let mut bytes = Vec::new();
    tiff::encoder::TiffEncoder::new(Cursor::new(&mut bytes))
        .and_then(|mut enc| enc.write_image::<C>(width as u32, height as u32, samples))
        .map_err(|e| Error::Encode(e.to_string()))?;
    Ok(bytes)
}

fn png_gray16(raw: &Array2<u16>, width: usize, height: usize) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    {
        let mut png_writer = {
            let mut encoder = png::Encoder::new(&mut bytes, width as u32, height as u32);
            encoder.set_color(png::ColorType::Grayscale);
            encoder.set_depth(png::BitDepth::Sixteen);
            encoder
                .write_header()
                .map_err(|e| Error::Encode(e.to_string()))?
        };
        let mut png_streamer = ByteOrdered::be(png_writer.stream_writer());
        for (row, col) in iproduct!(0..height, 0..width) {
            png_streamer.write_u16(raw[(row, col)])?;
        }
        png_streamer
            .into_inner()
            .finish()
            .map_err(|e| Error::Encode(e.to_string()))?;
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use ndarray::{Array2, Axis};

    use super::*;

    fn sample_raw() -> Array2<u16> {
        let mut raw = Array2::zeros((3, 4));
        for (idx, val) in raw.iter_mut().enumerate() {
            *val = 1000 + 137 * idx as u16;
        }
        raw
    }

    #[test]
    fn tiff_round_trip() {
        let raw = sample_raw();
        let bytes = encode_raw(&raw, RawFormat::Tiff).unwrap();
        let back = decode_raw(&bytes, RawFormat::Tiff).unwrap();
        assert_eq!(raw, back);
    }

    #[test]
    fn png_round_trip() {
        let raw = sample_raw();
        let bytes = encode_raw(&raw, RawFormat::Png).unwrap();
        let back = decode_raw(&bytes, RawFormat::Png).unwrap();
        assert_eq!(raw, back);
    }

    #[test]
    fn empty_matrix_does_not_encode() {
        let raw = Array2::<u16>::zeros((0, 4));
        match encode_raw(&raw, RawFormat::Tiff) {
            Err(Error::EmptyMatrix { height, width }) => assert_eq!((height, width), (0, 4)),
            other => panic!("expected EmptyMatrix, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn format_tags_parse_case_insensitively() {
        assert_eq!(RawFormat::from_tag("TIFF").unwrap(), RawFormat::Tiff);
        assert_eq!(RawFormat::from_tag("png").unwrap(), RawFormat::Png);
        assert!(RawFormat::from_tag("jxl").is_err());
    }

    #[test]
    fn float_tiff_is_re_readable() {
        let temp = Array2::from_shape_fn((2, 2), |(row, col)| 290. + (row * 2 + col) as f64);
        for depth in [BitDepth::ThirtyTwo, BitDepth::SixtyFour] {
            let bytes = encode_temperature(&temp, depth, (290., 293.)).unwrap();
            // little-endian TIFF magic
            assert_eq!(&bytes[..4], b"II\x2a\x00");

            let mut decoder =
                tiff::decoder::Decoder::new(Cursor::new(&bytes)).expect("valid tiff");
            assert_eq!(decoder.dimensions().unwrap(), (2, 2));
        }
    }

    #[test]
    fn sixteen_bit_temperature_spans_the_value_range() {
        let temp = Array2::from_shape_fn((1, 3), |(_, col)| 290. + col as f64);
        let bytes = encode_temperature(&temp, BitDepth::Sixteen, (290., 292.)).unwrap();
        let scaled = decode_raw(&bytes, RawFormat::Tiff).unwrap();
        assert_eq!(scaled[(0, 0)], 0);
        assert_eq!(scaled[(0, 2)], u16::MAX);
        let mid = scaled[(0, 1)];
        assert!((mid as i32 - i32::from(u16::MAX / 2)).abs() <= 1, "mid = {}", mid);
    }

    #[test]
    fn quantizer_clamps_out_of_range_values() {
        let quantizer = Quantizer::from_range(0., 100.);
        assert_eq!(quantizer.apply(-5.), 0);
        assert_eq!(quantizer.apply(200.), u16::MAX);
        assert_eq!(quantizer.apply(0.), 0);
        assert_eq!(quantizer.apply(100.), u16::MAX);
    }

    #[test]
    fn degenerate_range_maps_to_zero() {
        let quantizer = Quantizer::from_range(300., 300.);
        assert_eq!(quantizer.apply(300.), 0);
    }

    #[test]
    fn eight_bit_containers_widen() {
        let mut bytes = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut bytes, 2, 2);
            encoder.set_color(png::ColorType::Grayscale);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header().unwrap();
            writer.write_image_data(&[0, 17, 128, 255]).unwrap();
        }
        let raw = decode_raw(&bytes, RawFormat::Png).unwrap();
        assert_eq!(raw.len_of(Axis(0)), 2);
        assert_eq!(raw[(0, 1)], 17);
        assert_eq!(raw[(1, 1)], 255);
    }
}
