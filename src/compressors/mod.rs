pub mod lzma;
