//! An LZMA encoder and decoder.
//!
//! [`compress`] and [`decompress`] handle whole `.lzma` images. [`LzmaEncoder`] and
//! [`LzmaDecoder`] work on raw streams through the [`Coder`] trait, and [`LzmaStream`]
//! adapts images to `Read`/`Write`.

pub mod compressors;
pub mod error;
pub mod utils;

pub use crate::compressors::lzma::codecs::header_codec::{LzmaHeader, LzmaProperties};
pub use crate::compressors::lzma::stream::{CompressionMode, LzmaStream};
pub use crate::compressors::lzma::{
    compress, decompress, Coder, CoderPropId, LzmaDecoder, LzmaEncoder, LzmaOptions,
    MatchFinderKind, PropValue, SetCoderProperties, SetDecoderProperties, WriteCoderProperties,
};
pub use crate::error::{LzmaError, Result};
