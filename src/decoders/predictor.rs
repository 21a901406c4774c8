//! Predictor reversal for FlateDecode streams.
//!
//! Cross-reference streams are almost always written with PNG Up (12)
//! predictors; the other PNG variants and TIFF 2 show up in object streams
//! produced by less common writers.

use crate::error::{Error, Result};

/// `/DecodeParms` of a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeParams {
    /// Predictor algorithm (1 = none, 2 = TIFF, 10-15 = PNG)
    pub predictor: i64,
    /// Samples per row
    pub columns: usize,
    /// Color components per sample
    pub colors: usize,
    /// Bits per component
    pub bits_per_component: usize,
}

impl Default for DecodeParams {
    fn default() -> Self {
        Self {
            predictor: 1,
            columns: 1,
            colors: 1,
            bits_per_component: 8,
        }
    }
}

impl DecodeParams {
    /// Pixel bytes in one row, tag byte excluded.
    pub fn pixel_bytes_per_row(&self) -> usize {
        (self.columns * self.colors * self.bits_per_component).div_ceil(8)
    }

    /// Bytes in one encoded row; PNG rows carry a leading tag byte.
    pub fn bytes_per_row(&self) -> usize {
        self.pixel_bytes_per_row() + usize::from(self.predictor >= 10)
    }

    fn bytes_per_pixel(&self) -> usize {
        (self.colors * self.bits_per_component).div_ceil(8).max(1)
    }
}

/// Undo the predictor named in `params`.
pub fn decode_predictor(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    match params.predictor {
        1 => Ok(data.to_vec()),
        2 => decode_tiff(data, params),
        10..=15 => decode_png(data, params),
        other => Err(Error::Decode(format!("Unsupported predictor: {}", other))),
    }
}

fn decode_tiff(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    let row_len = params.pixel_bytes_per_row();
    if row_len == 0 || data.len() % row_len != 0 {
        return Err(Error::Decode(format!(
            "Data length {} is not a multiple of row size {}",
            data.len(),
            row_len
        )));
    }
    let bpp = params.bytes_per_pixel();
    let mut out = data.to_vec();
    for row in out.chunks_mut(row_len) {
        for i in bpp..row.len() {
            row[i] = row[i].wrapping_add(row[i - bpp]);
        }
    }
    Ok(out)
}

fn decode_png(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    let row_len = params.bytes_per_row();
    let pixels = params.pixel_bytes_per_row();
    if pixels == 0 || data.len() % row_len != 0 {
        return Err(Error::Decode(format!(
            "Data length {} is not a multiple of row size {}",
            data.len(),
            row_len
        )));
    }
    let bpp = params.bytes_per_pixel();
    let mut out: Vec<u8> = Vec::with_capacity(data.len() / row_len * pixels);
    let mut prev = vec![0u8; pixels];

    for encoded in data.chunks(row_len) {
        let tag = encoded[0];
        let mut row = encoded[1..].to_vec();
        for i in 0..pixels {
            let left = if i >= bpp { row[i - bpp] } else { 0 };
            let up = prev[i];
            let up_left = if i >= bpp { prev[i - bpp] } else { 0 };
            let predicted = match tag {
                0 => 0,
                1 => left,
                2 => up,
                3 => ((u16::from(left) + u16::from(up)) / 2) as u8,
                4 => paeth(left, up, up_left),
                other => {
                    return Err(Error::Decode(format!("Invalid PNG predictor tag: {}", other)));
                },
            };
            row[i] = row[i].wrapping_add(predicted);
        }
        out.extend_from_slice(&row);
        prev = row;
    }
    Ok(out)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = i16::from(a) + i16::from(b) - i16::from(c);
    let pa = (p - i16::from(a)).abs();
    let pb = (p - i16::from(b)).abs();
    let pc = (p - i16::from(c)).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_params(columns: usize) -> DecodeParams {
        DecodeParams {
            predictor: 12,
            columns,
            ..Default::default()
        }
    }

    #[test]
    fn test_no_predictor() {
        let result = decode_predictor(b"abc", &DecodeParams::default()).unwrap();
        assert_eq!(result, b"abc");
    }

    #[test]
    fn test_png_up() {
        let encoded = vec![2, 10, 20, 30, 2, 5, 5, 5];
        let result = decode_predictor(&encoded, &png_params(3)).unwrap();
        assert_eq!(result, vec![10, 20, 30, 15, 25, 35]);
    }

    #[test]
    fn test_png_sub_and_none_mixed() {
        let encoded = vec![1, 1, 1, 1, 0, 7, 8, 9];
        let result = decode_predictor(&encoded, &png_params(3)).unwrap();
        assert_eq!(result, vec![1, 2, 3, 7, 8, 9]);
    }

    #[test]
    fn test_png_bad_length() {
        assert!(decode_predictor(&[2, 1, 2], &png_params(3)).is_err());
    }

    #[test]
    fn test_png_bad_tag() {
        assert!(decode_predictor(&[9, 1, 2, 3], &png_params(3)).is_err());
    }

    #[test]
    fn test_tiff_predictor() {
        let params = DecodeParams {
            predictor: 2,
            columns: 3,
            ..Default::default()
        };
        assert_eq!(decode_predictor(&[1, 1, 1], &params).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_bytes_per_row() {
        let params = png_params(5);
        assert_eq!(params.bytes_per_row(), 6);
        assert_eq!(params.pixel_bytes_per_row(), 5);
    }
}
