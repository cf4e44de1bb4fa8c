use clap::ValueEnum;
use parquet::basic::Compression;
use tree2arrow::arrow::WriteOptions;

#[derive(Clone, Copy, Debug, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum CompressionArg {
    Zstd,
    Snappy,
    None,
}

impl CompressionArg {
    pub fn to_compression(self) -> Compression {
        match self {
            CompressionArg::Zstd => WriteOptions::default().compression,
            CompressionArg::Snappy => Compression::SNAPPY,
            CompressionArg::None => Compression::UNCOMPRESSED,
        }
    }
}
