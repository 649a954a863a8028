//! End-to-end coverage of the batch loading pipeline against real files.

mod support;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use cliptab::metadata::{ClipKey, MetadataTable};
use cliptab::pipeline::PipelineContext;
use support::wav::{write_corrupt_wav, write_test_wav};
use tempfile::tempdir;

const SAMPLE_RATE: u32 = 16_000;

fn write_metadata(path: &Path, rows: &[(&str, i64, i64)]) {
    let mut contents = String::from("Show,EpId,ClipId\n");
    for (show, ep_id, clip_id) in rows {
        contents.push_str(&format!("{show},{ep_id},{clip_id}\n"));
    }
    std::fs::write(path, contents).unwrap();
}

fn clip_path(clips_root: &Path, show: &str, ep_id: i64, clip_id: i64) -> PathBuf {
    clips_root
        .join(show)
        .join(ep_id.to_string())
        .join(format!("{show}_{ep_id}_{clip_id}.wav"))
}

fn context(root: &Path, metadata: MetadataTable, worker_cap: usize) -> PipelineContext {
    PipelineContext {
        metadata,
        clips_root: root.join("clips_audio"),
        originals_root: root.join("original_audio"),
        data_root: root.join("data"),
        worker_cap,
    }
}

fn key(show: &str, ep_id: i64, clip_id: i64) -> ClipKey {
    ClipKey {
        show: show.to_string(),
        ep_id,
        clip_id,
    }
}

#[test]
fn three_row_batch_tolerates_a_missing_file() {
    let dir = tempdir().unwrap();
    let metadata_path = dir.path().join("labels.csv");
    write_metadata(
        &metadata_path,
        &[("ShowA", 1, 1), ("ShowA", 1, 2), ("ShowB", 2, 1)],
    );
    let clips_root = dir.path().join("clips_audio");
    write_test_wav(
        &clip_path(&clips_root, "ShowA", 1, 1),
        &[0.1, 0.2, 0.3],
        SAMPLE_RATE,
    );
    write_test_wav(
        &clip_path(&clips_root, "ShowB", 2, 1),
        &[-0.5, 0.5],
        SAMPLE_RATE,
    );

    let metadata = MetadataTable::load(&metadata_path).unwrap();
    let table = context(dir.path(), metadata, 4).load_clip_table();

    assert_eq!(table.len(), 3);
    // Row set matches the input record set, whatever the order.
    let keys: BTreeSet<_> = table.rows.iter().map(|row| row.key()).collect();
    let expected: BTreeSet<_> = [key("ShowA", 1, 1), key("ShowA", 1, 2), key("ShowB", 2, 1)]
        .into_iter()
        .collect();
    assert_eq!(keys, expected);

    let loaded = table.find(&key("ShowA", 1, 1)).unwrap();
    assert_eq!(loaded.audio, Some(vec![0.1, 0.2, 0.3]));
    assert_eq!(loaded.sample_rate, Some(SAMPLE_RATE));

    let missing = table.find(&key("ShowA", 1, 2)).unwrap();
    assert_eq!(missing.audio, None);
    assert_eq!(missing.sample_rate, None);

    let other = table.find(&key("ShowB", 2, 1)).unwrap();
    assert_eq!(other.audio, Some(vec![-0.5, 0.5]));
    assert_eq!(other.sample_rate, Some(SAMPLE_RATE));
}

#[test]
fn corrupt_file_yields_null_fields_not_a_crash() {
    let dir = tempdir().unwrap();
    let metadata_path = dir.path().join("labels.csv");
    write_metadata(&metadata_path, &[("ShowA", 1, 1), ("ShowA", 1, 2)]);
    let clips_root = dir.path().join("clips_audio");
    write_corrupt_wav(&clip_path(&clips_root, "ShowA", 1, 1));
    write_test_wav(&clip_path(&clips_root, "ShowA", 1, 2), &[0.9], SAMPLE_RATE);

    let metadata = MetadataTable::load(&metadata_path).unwrap();
    let table = context(dir.path(), metadata, 2).load_clip_table();

    assert_eq!(table.len(), 2);
    assert_eq!(table.find(&key("ShowA", 1, 1)).unwrap().audio, None);
    assert_eq!(
        table.find(&key("ShowA", 1, 2)).unwrap().audio,
        Some(vec![0.9])
    );
}

#[test]
fn augmentation_keeps_every_result_at_its_input_index() {
    let dir = tempdir().unwrap();
    let metadata_path = dir.path().join("labels.csv");
    let rows: Vec<(&str, i64, i64)> = (0..16).map(|clip_id| ("ShowA", 1, clip_id)).collect();
    write_metadata(&metadata_path, &rows);

    // Scatter the clips across nested folders; every fourth file is absent.
    let data_root = dir.path().join("data");
    for (row_index, (show, ep_id, clip_id)) in rows.iter().enumerate() {
        if row_index % 4 == 3 {
            continue;
        }
        let nested = data_root
            .join(format!("disk{}", row_index % 3))
            .join(format!("{show}_{ep_id}_{clip_id}.wav"));
        // Each file carries its own row index as a recognizable amplitude.
        let signature = row_index as f32 / 100.0;
        write_test_wav(&nested, &[signature, signature], SAMPLE_RATE);
    }

    let metadata = MetadataTable::load(&metadata_path).unwrap();
    let augmented = context(dir.path(), metadata, 4).augment_metadata().unwrap();

    assert_eq!(augmented.len(), rows.len());
    for row_index in 0..rows.len() {
        if row_index % 4 == 3 {
            assert_eq!(augmented.clips_audio[row_index], None);
            assert_eq!(augmented.clips_sample_rate[row_index], None);
        } else {
            let audio = augmented.clips_audio[row_index]
                .as_ref()
                .unwrap_or_else(|| panic!("row {row_index} should have audio"));
            assert_eq!(audio[0], row_index as f32 / 100.0);
            assert_eq!(augmented.clips_sample_rate[row_index], Some(SAMPLE_RATE));
        }
    }
}

#[test]
fn repeat_runs_are_bitwise_identical() {
    let dir = tempdir().unwrap();
    let metadata_path = dir.path().join("labels.csv");
    write_metadata(
        &metadata_path,
        &[("ShowA", 1, 1), ("ShowA", 1, 2), ("ShowA", 1, 3)],
    );
    let data_root = dir.path().join("data");
    write_test_wav(
        &data_root.join("a").join("ShowA_1_1.wav"),
        &[0.25, -0.75, 0.125],
        SAMPLE_RATE,
    );
    write_test_wav(
        &data_root.join("b").join("ShowA_1_3.wav"),
        &[1.0, -1.0],
        SAMPLE_RATE,
    );

    let metadata = MetadataTable::load(&metadata_path).unwrap();
    let context = context(dir.path(), metadata, 3);
    let first = context.augment_metadata().unwrap();
    let second = context.augment_metadata().unwrap();

    assert_eq!(first.len(), second.len());
    for row_index in 0..first.len() {
        match (
            &first.clips_audio[row_index],
            &second.clips_audio[row_index],
        ) {
            (Some(a), Some(b)) => {
                assert_eq!(a.len(), b.len());
                for (x, y) in a.iter().zip(b.iter()) {
                    assert_eq!(x.to_bits(), y.to_bits());
                }
            }
            (None, None) => {}
            (a, b) => panic!("null pattern diverged at row {row_index}: {a:?} vs {b:?}"),
        }
        assert_eq!(
            first.clips_sample_rate[row_index],
            second.clips_sample_rate[row_index]
        );
    }
}

#[test]
fn episode_table_deduplicates_show_episode_pairs() {
    let dir = tempdir().unwrap();
    let metadata_path = dir.path().join("labels.csv");
    write_metadata(
        &metadata_path,
        &[
            ("ShowA", 1, 1),
            ("ShowA", 1, 2),
            ("ShowA", 1, 3),
            ("ShowB", 2, 1),
        ],
    );
    let originals_root = dir.path().join("original_audio");
    write_test_wav(
        &originals_root.join("ShowA").join("1.wav"),
        &[0.5, 0.25],
        SAMPLE_RATE,
    );

    let metadata = MetadataTable::load(&metadata_path).unwrap();
    let table = context(dir.path(), metadata, 2).load_episode_table();

    assert_eq!(table.len(), 2);
    let loaded: Vec<_> = table
        .rows
        .iter()
        .map(|row| (row.show.as_str(), row.ep_id, row.audio.is_some()))
        .collect();
    assert!(loaded.contains(&("ShowA", 1, true)));
    assert!(loaded.contains(&("ShowB", 2, false)));
    assert_eq!(table.loaded_count(), 1);
}

#[test]
fn duplicate_bare_filenames_resolve_to_the_later_walk_entry() {
    let dir = tempdir().unwrap();
    let metadata_path = dir.path().join("labels.csv");
    write_metadata(&metadata_path, &[("ShowA", 1, 1)]);
    let data_root = dir.path().join("data");
    // Same bare name in two subtrees; `late` sorts after `early` in the walk.
    write_test_wav(
        &data_root.join("early").join("ShowA_1_1.wav"),
        &[0.1],
        SAMPLE_RATE,
    );
    write_test_wav(
        &data_root.join("late").join("ShowA_1_1.wav"),
        &[0.9],
        SAMPLE_RATE,
    );

    let metadata = MetadataTable::load(&metadata_path).unwrap();
    let augmented = context(dir.path(), metadata, 1).augment_metadata().unwrap();

    assert_eq!(augmented.clips_audio[0], Some(vec![0.9]));
}

#[test]
fn augmentation_leaves_label_columns_untouched() {
    let dir = tempdir().unwrap();
    let metadata_path = dir.path().join("labels.csv");
    std::fs::write(
        &metadata_path,
        "Show,EpId,ClipId,Prolongation,Block\nShowA,1,1,2,0\nShowA,1,2,0,3\n",
    )
    .unwrap();
    let data_root = dir.path().join("data");
    write_test_wav(&data_root.join("ShowA_1_1.wav"), &[0.5], SAMPLE_RATE);

    let metadata = MetadataTable::load(&metadata_path).unwrap();
    let augmented = context(dir.path(), metadata, 2).augment_metadata().unwrap();

    assert_eq!(
        augmented.metadata.label_columns,
        vec!["Prolongation", "Block"]
    );
    assert_eq!(augmented.metadata.records[0].labels, vec!["2", "0"]);
    assert_eq!(augmented.metadata.records[1].labels, vec!["0", "3"]);
    assert_eq!(augmented.clips_audio[0], Some(vec![0.5]));
    assert_eq!(augmented.clips_audio[1], None);
}

#[test]
fn missing_index_root_fails_before_any_decoding() {
    let dir = tempdir().unwrap();
    let metadata_path = dir.path().join("labels.csv");
    write_metadata(&metadata_path, &[("ShowA", 1, 1)]);

    let metadata = MetadataTable::load(&metadata_path).unwrap();
    // No data/ directory was created, so the walk cannot start.
    assert!(context(dir.path(), metadata, 2).augment_metadata().is_err());
}
