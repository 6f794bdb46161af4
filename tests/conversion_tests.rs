// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! End-to-end conversion tests.
//!
//! Input archives are written with the archive writer, converted, and the
//! outputs are read back and compared against the merged input stream.

mod common;

use std::fs;

use common::{
    options, payload, read_archive, read_metadata, scenario_inputs, stamps, string_topic,
    temp_root, write_archive,
};
use robobag::io::metadata::METADATA_FILENAME;
use robobag::{
    bag_rewrite, convert, convert_with, BagError, ConversionJob, ConversionOptions,
    OutputCompression, OutputStatus, OutputTarget, TopicSelector,
};

fn pairs(items: &[(&str, u64)]) -> Vec<(String, u64)> {
    items.iter().map(|(t, ts)| (t.to_string(), *ts)).collect()
}

#[test]
fn test_two_inputs_two_outputs() {
    let (root, _guard) = temp_root("scenario");
    let (a, b) = scenario_inputs(&root);
    let out1 = root.join("out_a_empty");
    let out2 = root.join("out_no_empty");

    let summary = bag_rewrite(
        vec![options(&a), options(&b)],
        vec![
            OutputTarget::new(options(&out1)).with_selector(TopicSelector::include(["a_empty"])),
            OutputTarget::new(options(&out2)).with_selector(TopicSelector::exclude(".*empty.*")),
        ],
    )
    .unwrap();

    assert!(summary.is_success());
    assert_eq!(summary.messages_read, 6);
    assert_eq!(summary.outputs.len(), 2);
    assert!(summary
        .outputs
        .iter()
        .all(|o| o.status == OutputStatus::Finalized));

    assert!(out1.join(METADATA_FILENAME).is_file());
    assert!(out2.join(METADATA_FILENAME).is_file());

    let (_, records1) = read_archive(&out1);
    assert!(records1.iter().all(|r| r.topic == "a_empty"));
    let metadata1 = read_metadata(&out1);
    assert_eq!(metadata1.message_count, records1.len() as u64);
    assert_eq!(metadata1.topic_message_count("a_full"), None);
    assert_eq!(metadata1.topic_message_count("b_full"), None);

    let (_, records2) = read_archive(&out2);
    assert_eq!(
        stamps(&records2),
        pairs(&[
            ("a_full", 100),
            ("b_full", 200),
            ("a_full", 300),
            ("b_full", 300),
            ("a_full", 500),
            ("b_full", 600),
        ])
    );
    let metadata2 = read_metadata(&out2);
    assert_eq!(metadata2.topic_message_count("a_full"), Some(3));
    assert_eq!(metadata2.topic_message_count("b_full"), Some(3));
    assert_eq!(metadata2.topic_message_count("a_empty"), None);
    assert_eq!(metadata2.topic_message_count("b_empty"), None);
    assert_eq!(metadata2.starting_time, 100);
    assert_eq!(metadata2.duration, 500);
}

#[test]
fn test_empty_arguments_fail_validation() {
    let (root, _guard) = temp_root("empty_args");

    let err = bag_rewrite(Vec::new(), Vec::new()).unwrap_err();
    assert!(matches!(err, BagError::Validation { .. }));

    let out = root.join("never_created");
    let err = bag_rewrite(Vec::new(), vec![OutputTarget::new(options(&out))]).unwrap_err();
    assert!(matches!(err, BagError::Validation { .. }));
    assert!(!out.exists());

    let (a, _) = scenario_inputs(&root);
    let err = bag_rewrite(vec![options(&a)], Vec::new()).unwrap_err();
    assert!(matches!(err, BagError::Validation { .. }));
}

#[test]
fn test_invalid_pattern_creates_nothing() {
    let (root, _guard) = temp_root("bad_pattern");
    let (a, _) = scenario_inputs(&root);
    let good = root.join("good");
    let bad = root.join("bad");

    let err = bag_rewrite(
        vec![options(&a)],
        vec![
            OutputTarget::new(options(&good)),
            OutputTarget::new(options(&bad)).with_selector(TopicSelector::exclude("(a_")),
        ],
    )
    .unwrap_err();

    assert!(matches!(err, BagError::Validation { .. }));
    assert!(!good.exists());
    assert!(!bad.exists());
}

#[test]
fn test_inclusion_wins_over_exclusion() {
    let (root, _guard) = temp_root("precedence");
    let (a, b) = scenario_inputs(&root);
    let out = root.join("out");

    bag_rewrite(
        vec![options(&a), options(&b)],
        vec![OutputTarget::new(options(&out)).with_selector(
            TopicSelector::include(["a_full"]).with_exclude(".*full.*"),
        )],
    )
    .unwrap();

    let (_, records) = read_archive(&out);
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.topic == "a_full"));
}

#[test]
fn test_counts_match_records_and_order() {
    let (root, _guard) = temp_root("counts");
    let a = root.join("a");
    let b = root.join("b");
    write_archive(
        &a,
        &[string_topic("/x"), string_topic("/y")],
        &[("/x", 10), ("/y", 10), ("/x", 20), ("/y", 40)],
    );
    write_archive(
        &b,
        &[string_topic("/z")],
        &[("/z", 5), ("/z", 20), ("/z", 30)],
    );
    let out = root.join("all");

    let summary = bag_rewrite(
        vec![options(&a), options(&b)],
        vec![OutputTarget::new(options(&out))],
    )
    .unwrap();
    assert_eq!(summary.outputs[0].message_count, 7);

    let (topics, records) = read_archive(&out);
    assert_eq!(topics.len(), 3);
    assert_eq!(
        stamps(&records),
        pairs(&[
            ("/z", 5),
            ("/x", 10),
            ("/y", 10),
            ("/x", 20),
            ("/z", 20),
            ("/z", 30),
            ("/y", 40),
        ])
    );
    for record in &records {
        assert_eq!(record.data, payload(&record.topic, record.send_timestamp));
    }

    let metadata = read_metadata(&out);
    assert_eq!(metadata.sum_of_topic_counts(), records.len() as u64);
    assert_eq!(metadata.message_count, 7);
    assert_eq!(metadata.topic_message_count("/x"), Some(2));
    assert_eq!(metadata.topic_message_count("/y"), Some(2));
    assert_eq!(metadata.topic_message_count("/z"), Some(3));
    assert_eq!(metadata.storage_identifier, "mcap");
    assert_eq!(metadata.version, 5);
}

#[test]
fn test_rerun_to_fresh_destination_is_identical() {
    let (root, _guard) = temp_root("rerun");
    let (a, b) = scenario_inputs(&root);

    let run = |name: &str| {
        let out = root.join(name);
        bag_rewrite(
            vec![options(&a), options(&b)],
            vec![OutputTarget::new(options(&out))],
        )
        .unwrap();
        let (_, records) = read_archive(&out);
        (records, read_metadata(&out))
    };

    let (records1, metadata1) = run("first");
    let (records2, metadata2) = run("second");

    assert_eq!(records1, records2);
    assert_eq!(
        metadata1.topics_with_message_count,
        metadata2.topics_with_message_count
    );
    assert_eq!(metadata1.message_count, metadata2.message_count);
}

#[test]
fn test_lazy_outputs_skip_unused_destinations() {
    let (root, _guard) = temp_root("lazy");
    let (a, b) = scenario_inputs(&root);
    let unused = root.join("unused");
    let used = root.join("used");

    let job = ConversionJob::new(
        vec![options(&a), options(&b)],
        vec![
            OutputTarget::new(options(&unused)).with_selector(TopicSelector::include(["a_empty"])),
            OutputTarget::new(options(&used)).with_selector(TopicSelector::include(["b_full"])),
        ],
    );
    let summary = convert_with(&job, &ConversionOptions::new().with_eager_outputs(false)).unwrap();

    assert_eq!(summary.outputs[0].status, OutputStatus::Skipped);
    assert!(!unused.exists());
    assert_eq!(summary.outputs[1].status, OutputStatus::Finalized);
    assert_eq!(read_metadata(&used).message_count, 3);
}

#[test]
fn test_eager_outputs_create_empty_archives() {
    let (root, _guard) = temp_root("eager");
    let (a, _) = scenario_inputs(&root);
    let out = root.join("nothing_matches");

    let summary = bag_rewrite(
        vec![options(&a)],
        vec![OutputTarget::new(options(&out)).with_selector(TopicSelector::include(["/none"]))],
    )
    .unwrap();

    assert_eq!(summary.outputs[0].status, OutputStatus::Finalized);
    let metadata = read_metadata(&out);
    assert_eq!(metadata.message_count, 0);
    assert!(metadata.topics_with_message_count.is_empty());
    assert_eq!(metadata.relative_file_paths.len(), 1);
}

#[test]
fn test_output_rolls_over_by_duration() {
    let (root, _guard) = temp_root("rollover");
    let input = root.join("long");
    let records: Vec<(&str, u64)> = (0..10u64).map(|i| ("/tick", i * 400_000_000)).collect();
    write_archive(&input, &[string_topic("/tick")], &records);
    let out = root.join("split");

    bag_rewrite(
        vec![options(&input)],
        vec![OutputTarget::new(options(&out).with_max_bagfile_duration(1))],
    )
    .unwrap();

    let metadata = read_metadata(&out);
    assert!(metadata.relative_file_paths.len() > 1);
    assert_eq!(metadata.files.len(), metadata.relative_file_paths.len());
    assert_eq!(
        metadata.files.iter().map(|f| f.message_count).sum::<u64>(),
        10
    );
    assert_eq!(metadata.topic_message_count("/tick"), Some(10));
    for file in &metadata.relative_file_paths {
        assert!(out.join(file).is_file());
        assert!(file.starts_with("split_"));
    }

    let (_, read) = read_archive(&out);
    let expected: Vec<u64> = (0..10u64).map(|i| i * 400_000_000).collect();
    assert_eq!(
        read.iter().map(|r| r.send_timestamp).collect::<Vec<_>>(),
        expected
    );
}

#[test]
fn test_compressed_outputs() {
    let (root, _guard) = temp_root("compression");
    let (a, b) = scenario_inputs(&root);
    let file_mode = root.join("file_mode");
    let message_mode = root.join("message_mode");

    bag_rewrite(
        vec![options(&a), options(&b)],
        vec![
            OutputTarget::new(options(&file_mode)).with_compression(OutputCompression::file()),
            OutputTarget::new(options(&message_mode))
                .with_compression(OutputCompression::message()),
        ],
    )
    .unwrap();

    let metadata = read_metadata(&file_mode);
    assert_eq!(metadata.compression_mode, "FILE");
    assert_eq!(metadata.compression_format, "zstd");
    assert!(metadata
        .relative_file_paths
        .iter()
        .all(|p| p.ends_with(".mcap.zstd")));
    let (_, records) = read_archive(&file_mode);
    assert_eq!(records.len(), 6);

    let metadata = read_metadata(&message_mode);
    assert_eq!(metadata.compression_mode, "MESSAGE");
    assert_eq!(metadata.compression_format, "zstd");
    assert!(metadata
        .relative_file_paths
        .iter()
        .all(|p| p.ends_with(".mcap")));
    let (_, records) = read_archive(&message_mode);
    assert_eq!(records.len(), 6);

    // A file-compressed archive is a valid input.
    let recompressed = root.join("from_compressed");
    bag_rewrite(
        vec![options(&file_mode)],
        vec![OutputTarget::new(options(&recompressed))],
    )
    .unwrap();
    assert_eq!(read_metadata(&recompressed).message_count, 6);
    assert!(read_metadata(&recompressed).compression_mode.is_empty());
}

#[test]
fn test_single_data_file_input() {
    let (root, _guard) = temp_root("single_file");
    let (a, _) = scenario_inputs(&root);
    let data_file = a.join(&read_metadata(&a).relative_file_paths[0]);
    let out = root.join("out");

    let summary = bag_rewrite(
        vec![options(&data_file)],
        vec![OutputTarget::new(options(&out))],
    )
    .unwrap();
    assert_eq!(summary.messages_read, 3);
    assert_eq!(read_metadata(&out).topic_message_count("a_full"), Some(3));
}

#[test]
fn test_job_from_yaml() {
    let (root, _guard) = temp_root("yaml_job");
    let (a, b) = scenario_inputs(&root);
    let out1 = root.join("one");
    let out2 = root.join("two");

    let yaml = format!(
        r#"
inputs:
  - uri: "{}"
  - uri: "{}"
outputs:
  - storage: {{ uri: "{}" }}
    selector: {{ topics: [a_full] }}
  - storage: {{ uri: "{}", storage_id: mcap }}
    selector: {{ exclude: "a_.*" }}
    compression: {{ mode: message }}
"#,
        a.display(),
        b.display(),
        out1.display(),
        out2.display()
    );
    let job_path = root.join("job.yaml");
    fs::write(&job_path, yaml).unwrap();

    let job = ConversionJob::from_yaml_file(&job_path).unwrap();
    let summary = convert(&job).unwrap();
    assert!(summary.is_success());

    assert_eq!(read_metadata(&out1).topic_message_count("a_full"), Some(3));
    let metadata2 = read_metadata(&out2);
    assert_eq!(metadata2.topic_message_count("b_full"), Some(3));
    assert_eq!(metadata2.topic_message_count("a_full"), None);
    assert_eq!(metadata2.compression_mode, "MESSAGE");
}
