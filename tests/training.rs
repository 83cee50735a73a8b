mod common;

use std::fs;

use ferrite_stylegan::checkpoint::CheckpointManager;
use ferrite_stylegan::samples::parse_sample_file_name;
use ferrite_stylegan::schedule::Phase;
use ferrite_stylegan::train::{train_loop, TrainConfig, Trainer};
use ferrite_stylegan::{FrechetEvaluator, TrainError};

use common::{tiny_config, tiny_dataset};

#[test]
fn short_run_follows_the_level_table() {
    let dir = tempfile::tempdir().unwrap();
    let config = tiny_config(dir.path());
    let table = config.validate().unwrap();
    let mut train_cfg = TrainConfig::from_config(&config, &table);
    train_cfg.show_progress = false;
    train_cfg.image_interval = 3;
    assert_eq!(train_cfg.num_epochs, 4);

    let manager = CheckpointManager::new(config.checkpoint_dir());
    let mut trainer = Trainer::new(&config, table);
    let records = train_loop(&mut trainer, &tiny_dataset(6), None, &manager, &train_cfg).unwrap();

    let levels: Vec<usize> = records.iter().map(|r| r.level).collect();
    let phases: Vec<Phase> = records.iter().map(|r| r.phase).collect();
    let alphas: Vec<f64> = records.iter().map(|r| r.alpha).collect();
    assert_eq!(levels, vec![0, 1, 1, 1]);
    assert_eq!(
        phases,
        vec![Phase::Stabilization, Phase::Transition, Phase::Transition, Phase::Stabilization]
    );
    assert_eq!(alphas, vec![1.0, 0.5, 1.0, 1.0]);
    assert!(records.iter().all(|r| r.train_loss.is_finite() && r.eval_metric.is_none()));
    assert_eq!(trainer.history(), records.as_slice());
    assert_eq!(trainer.schedule().global_epoch, 4);
    assert_eq!(trainer.iteration(), 12);

    // Epochs 0..=3 are always checkpointed.
    let epochs: Vec<usize> = manager.list().unwrap().iter().map(|e| e.epoch).collect();
    assert_eq!(epochs, vec![1, 2, 3, 4]);

    // 3 batches per epoch, one grid every 3 iterations.
    let mut grids: Vec<(usize, usize, usize, f64)> = fs::read_dir(config.image_dir())
        .unwrap()
        .filter_map(|e| parse_sample_file_name(&e.unwrap().file_name().to_string_lossy()))
        .collect();
    grids.sort_by_key(|g| g.0);
    let iterations: Vec<usize> = grids.iter().map(|g| g.0).collect();
    assert_eq!(iterations, vec![3, 6, 9, 12]);
    assert_eq!(grids[0].1, 0);
    assert_eq!(grids[1].1, 1);
}

#[test]
fn resumed_run_matches_uninterrupted_run() {
    let full_dir = tempfile::tempdir().unwrap();
    let config = tiny_config(full_dir.path());
    let table = config.validate().unwrap();
    let mut train_cfg = TrainConfig::from_config(&config, &table);
    train_cfg.show_progress = false;
    let dataset = tiny_dataset(5);

    let mut full = Trainer::new(&config, table.clone());
    let manager = CheckpointManager::new(config.checkpoint_dir());
    train_loop(&mut full, &dataset, None, &manager, &train_cfg).unwrap();

    let split_dir = tempfile::tempdir().unwrap();
    let config = tiny_config(split_dir.path());
    let manager = CheckpointManager::new(config.checkpoint_dir());
    let mut first = Trainer::new(&config, table.clone());
    let mut partial_cfg = TrainConfig::from_config(&config, &table);
    partial_cfg.show_progress = false;
    partial_cfg.num_epochs = 2;
    train_loop(&mut first, &dataset, None, &manager, &partial_cfg).unwrap();
    drop(first);

    let snapshot = CheckpointManager::load(&manager.find(2).unwrap()).unwrap();
    let mut resumed = Trainer::from_snapshot(&config, table, snapshot).unwrap();
    partial_cfg.num_epochs = 4;
    let records = train_loop(&mut resumed, &dataset, None, &manager, &partial_cfg).unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].epoch, 2);
    assert_eq!(resumed.snapshot(), full.snapshot());
}

#[test]
fn finished_run_does_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let config = tiny_config(dir.path());
    let table = config.validate().unwrap();
    let mut train_cfg = TrainConfig::from_config(&config, &table);
    train_cfg.show_progress = false;
    train_cfg.num_epochs = 0;
    let manager = CheckpointManager::new(config.checkpoint_dir());
    let mut trainer = Trainer::new(&config, table);
    let records = train_loop(&mut trainer, &tiny_dataset(2), None, &manager, &train_cfg).unwrap();
    assert!(records.is_empty());
    assert!(manager.list().unwrap().is_empty());
}

#[test]
fn empty_dataset_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = tiny_config(dir.path());
    let table = config.validate().unwrap();
    let mut train_cfg = TrainConfig::from_config(&config, &table);
    train_cfg.show_progress = false;
    let manager = CheckpointManager::new(config.checkpoint_dir());
    let mut trainer = Trainer::new(&config, table);
    let err = train_loop(&mut trainer, &tiny_dataset(0), None, &manager, &train_cfg).unwrap_err();
    assert!(matches!(err, TrainError::Data(_)));
    assert_eq!(trainer.schedule().global_epoch, 0);
}

#[test]
fn evaluation_records_a_score_and_progress_is_streamed() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = tiny_config(dir.path());
    config.evaluate = true;
    config.fid_samples = Some(8);
    let table = config.validate().unwrap();
    let mut train_cfg = TrainConfig::from_config(&config, &table);
    train_cfg.show_progress = false;
    train_cfg.num_epochs = 2;
    let (tx, rx) = std::sync::mpsc::channel();
    train_cfg.progress_tx = Some(tx);

    let manager = CheckpointManager::new(config.checkpoint_dir());
    let mut trainer = Trainer::new(&config, table);
    let mut evaluator = FrechetEvaluator::new(8);
    let records = train_loop(&mut trainer, &tiny_dataset(8), Some(&mut evaluator), &manager, &train_cfg).unwrap();

    for record in &records {
        let score = record.eval_metric.unwrap();
        assert!(score.is_finite() && score >= 0.0);
    }
    assert!(config.stats_dir().join("tiny_statistics_2.json").exists());
    assert!(config.stats_dir().join("tiny_statistics_4.json").exists());
    drop(train_cfg);
    let streamed: Vec<_> = rx.iter().collect();
    assert_eq!(streamed, records);
}
