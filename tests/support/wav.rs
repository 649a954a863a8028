use std::path::Path;

/// Write a mono float wav fixture at the given sample rate.
pub fn write_test_wav(path: &Path, samples: &[f32], sample_rate: u32) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create wav parent dirs");
    }
    let mut writer = hound::WavWriter::create(path, spec).expect("create wav writer");
    for &sample in samples {
        writer.write_sample(sample).expect("write wav sample");
    }
    writer.finalize().expect("finalize wav");
}

/// Write unparsable bytes where a wav file is expected.
pub fn write_corrupt_wav(path: &Path) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create wav parent dirs");
    }
    std::fs::write(path, b"not audio at all").expect("write corrupt wav");
}
