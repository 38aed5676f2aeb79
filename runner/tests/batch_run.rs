use simbatch_runner::{
    batch,
    config::{ExecutionConfig, PathsConfig, Retention, RetentionConfig, RunConfig, SimulatorConfig},
};
use std::{
    fs,
    path::{Path, PathBuf},
};

fn sh_config(script: &str, output_root: &Path, workers: usize) -> RunConfig {
    RunConfig {
        simulator: SimulatorConfig {
            exec: PathBuf::from("/bin/sh"),
            params: vec![String::from("-c"), String::from(script)],
            payload: String::from("{attribute1} {attribute2}"),
        },
        execution: ExecutionConfig {
            workers,
            timeout: 1,
            pin_workers: false,
            isolate_tasks: false,
        },
        paths: PathsConfig {
            output_root: output_root.to_path_buf(),
        },
        retention: RetentionConfig::default(),
    }
}

fn write_task_list(dir: &Path, contents: &str) -> PathBuf {
    let path = dir.join("inputfile.dat");
    fs::write(&path, contents).unwrap();
    path
}

// echoes its stdin back without a trailing newline
const ECHO_ATTRIBUTES: &str = "read a b; printf '%s %s' \"$a\" \"$b\"";

#[test]
fn echoed_attributes_come_back_combined_in_task_order() {
    let dir = tempfile::tempdir().unwrap();
    let task_list = write_task_list(dir.path(), "1 2 0\n3 4 1\n5 6 2\n");
    let config = sh_config(ECHO_ATTRIBUTES, dir.path(), 1);

    let summary = batch::run(&config, &task_list, 0).unwrap();

    assert_eq!(summary.tasks, 3);
    assert_eq!(summary.completed, 3);
    assert_eq!(summary.timed_out, 0);
    assert_eq!(summary.failed, 0);

    assert_eq!(
        fs::read_to_string(dir.path().join("combined_output_0.txt")).unwrap(),
        "0\nOutput for attribute1 1 and attribute2 2: 1 2\n\
         1\nOutput for attribute1 3 and attribute2 4: 3 4\n\
         2\nOutput for attribute1 5 and attribute2 6: 5 6\n"
    );
}

#[test]
fn worker_count_does_not_change_the_combined_output() {
    let task_records = "1 2 0\n3 4 1\n5 6 2\n7 8 3\n9 10 4\n";

    let single = tempfile::tempdir().unwrap();
    let task_list = write_task_list(single.path(), task_records);
    batch::run(&sh_config(ECHO_ATTRIBUTES, single.path(), 1), &task_list, 0).unwrap();

    let multi = tempfile::tempdir().unwrap();
    let task_list = write_task_list(multi.path(), task_records);
    batch::run(&sh_config(ECHO_ATTRIBUTES, multi.path(), 3), &task_list, 0).unwrap();

    assert_eq!(
        fs::read(single.path().join("combined_output_0.txt")).unwrap(),
        fs::read(multi.path().join("combined_output_0.txt")).unwrap()
    );
}

#[test]
fn empty_task_list_yields_an_empty_combined_file() {
    let dir = tempfile::tempdir().unwrap();
    let task_list = write_task_list(dir.path(), "\n   \n");
    let config = sh_config(ECHO_ATTRIBUTES, dir.path(), 2);

    let summary = batch::run(&config, &task_list, 0).unwrap();

    assert_eq!(summary.tasks, 0);
    assert_eq!(
        fs::read_to_string(dir.path().join("combined_output_0.txt")).unwrap(),
        ""
    );
}

#[test]
fn timed_out_tasks_reach_the_checkpoint_but_not_the_combined_file() {
    let dir = tempfile::tempdir().unwrap();
    // attribute1 == 7 hangs past the 1s timeout
    let script = "read a b; [ \"$a\" = 7 ] && sleep 30; printf 'run %s' \"$a\"";
    let task_list = write_task_list(dir.path(), "1 0 0\n7 0 1\n2 0 2\n");
    let config = sh_config(script, dir.path(), 2);

    let summary = batch::run(&config, &task_list, 0).unwrap();

    assert_eq!(summary.completed, 2);
    assert_eq!(summary.timed_out, 1);

    let combined = fs::read_to_string(dir.path().join("combined_output_0.txt")).unwrap();
    assert_eq!(
        combined,
        "0\nOutput for attribute1 1 and attribute2 0: run 1\n\
         2\nOutput for attribute1 2 and attribute2 0: run 2\n"
    );

    // global position 1 belongs to rank 1 of 2
    let checkpoint =
        fs::read_to_string(dir.path().join("checkpoint_0/checkpoint_0_1.txt")).unwrap();
    assert!(checkpoint.contains("Output for 7 and attribute2 0: timeout"));
}

#[test]
fn failed_tasks_are_dropped_everywhere_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let script = "read a b; [ \"$a\" = 9 ] && exit 2; printf 'run %s' \"$a\"";
    let task_list = write_task_list(dir.path(), "1 0 0\n9 0 1\n2 0 2\n");
    let config = sh_config(script, dir.path(), 1);

    let summary = batch::run(&config, &task_list, 0).unwrap();

    assert_eq!(summary.completed, 2);
    assert_eq!(summary.failed, 1);

    let combined = fs::read_to_string(dir.path().join("combined_output_0.txt")).unwrap();
    assert!(!combined.contains("\n1\n"));
    assert!(!combined.starts_with("1\n"));

    let checkpoint =
        fs::read_to_string(dir.path().join("checkpoint_0/checkpoint_0_0.txt")).unwrap();
    let indices: Vec<&str> = checkpoint.lines().step_by(3).collect();
    assert_eq!(indices, vec!["0", "2"]);
}

#[test]
fn timeout_retention_keep_carries_the_sentinel_into_the_combined_file() {
    let dir = tempfile::tempdir().unwrap();
    let script = "read a b; [ \"$a\" = 7 ] && sleep 30; printf 'run %s' \"$a\"";
    let task_list = write_task_list(dir.path(), "1 0 0\n7 0 1\n");
    let mut config = sh_config(script, dir.path(), 1);
    config.retention.timeouts = Retention::Keep;

    batch::run(&config, &task_list, 0).unwrap();

    let combined = fs::read_to_string(dir.path().join("combined_output_0.txt")).unwrap();
    assert_eq!(
        combined,
        "0\nOutput for attribute1 1 and attribute2 0: run 1\n\
         1\nOutput for 7 and attribute2 0: timeout\n"
    );
}

#[test]
fn job_index_namespaces_checkpoints_and_output() {
    let dir = tempfile::tempdir().unwrap();
    let task_list = write_task_list(dir.path(), "1 2 0\n");
    let config = sh_config(ECHO_ATTRIBUTES, dir.path(), 1);

    batch::run(&config, &task_list, 3).unwrap();

    assert!(dir.path().join("checkpoint_3/checkpoint_3_0.txt").exists());
    assert!(dir.path().join("combined_output_3.txt").exists());
}
