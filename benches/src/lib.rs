//! Общие фикстуры для бенчмарков.

use std::io;

use cphd_testkit::CphdBuilder;
use cphd_types::SampleType;
use tempfile::NamedTempFile;

/// Один канал `num_vectors × num_samples` на диске.
pub fn wideband_fixture(
    sample_type: SampleType,
    num_vectors: usize,
    num_samples: usize,
) -> io::Result<NamedTempFile> {
    CphdBuilder::new(sample_type)
        .channel(num_vectors, num_samples)
        .write_temp()
}
