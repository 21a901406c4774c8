//! Stream decoders for the filters found on cross-reference and object
//! streams.
//!
//! Only FlateDecode (with predictors) is needed to read the structure of a
//! document; content streams are never decoded.

use crate::dict_scan;
use crate::error::{Error, Result};
use crate::object::Literal;
use crate::parser_config::ParserOptions;

mod flate;
mod predictor;

pub use flate::{compress, FlateDecoder};
pub use predictor::{decode_predictor, DecodeParams};

/// Trait for PDF stream decoders.
pub trait StreamDecoder {
    /// Decode the input data.
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>>;

    /// Get the name of this decoder (e.g., "FlateDecode").
    fn name(&self) -> &str;
}

/// Filter names listed under `/Filter`, a single name or an array of names.
pub fn filter_names(dict_body: &str) -> Vec<String> {
    match dict_scan::literal_after("/Filter", dict_body) {
        Some(Literal::Name(n)) => vec![n.trim_start_matches('/').to_string()],
        Some(Literal::Array(a)) => a
            .trim_start_matches('[')
            .trim_end_matches(']')
            .split('/')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// `/DecodeParms` of a stream dictionary; the first entry when it is an
/// array.
pub fn decode_params(dict_body: &str) -> Option<DecodeParams> {
    let parms = match dict_scan::literal_after("/DecodeParms", dict_body)? {
        Literal::Dictionary(d) => d,
        Literal::Array(a) => {
            let inner = a.trim_start_matches('[').trim_start();
            dict_scan::classify(inner).as_dict().map(|_| inner)?
        },
        _ => return None,
    };
    let int = |key: &str, default: i64| {
        dict_scan::literal_after(key, parms)
            .and_then(|l| l.as_integer())
            .unwrap_or(default)
    };
    Some(DecodeParams {
        predictor: int("/Predictor", 1),
        columns: int("/Columns", 1).max(1) as usize,
        colors: int("/Colors", 1).max(1) as usize,
        bits_per_component: int("/BitsPerComponent", 8).max(1) as usize,
    })
}

/// Decode stream data according to the `/Filter` and `/DecodeParms` of its
/// dictionary.
pub fn decode_stream(data: &[u8], dict_body: &str, options: &ParserOptions) -> Result<Vec<u8>> {
    let mut current = data.to_vec();
    for name in filter_names(dict_body) {
        current = match name.as_str() {
            "FlateDecode" | "Fl" => FlateDecoder.decode(&current)?,
            other => return Err(Error::UnsupportedFilter(other.to_string())),
        };
        if options.max_decompressed_size > 0 && current.len() > options.max_decompressed_size {
            return Err(Error::Decode(format!(
                "Decompressed size {} exceeds limit {}",
                current.len(),
                options.max_decompressed_size
            )));
        }
    }
    match decode_params(dict_body) {
        Some(params) if params.predictor > 1 => decode_predictor(&current, &params),
        _ => Ok(current),
    }
}
