use nf_gram_core::io::{build_output_path, read_history};
use nf_gram_core::persistence::{load_from_path, save_to_path};
use nf_gram_core::{ModelConfig, ModelError, NextFileModelRunner};

const HISTORY_PATH: &str = "./data/history.txt";
const ORDER: usize = 3;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // RUST_LOG=debug shows evictions and window slides
    env_logger::init();

    // Model parameters: trigram, lambda 0.8, at most 200 files over the last 2000 opens
    let mut config = ModelConfig::new(ORDER)?;
    config.set_lambda(0.8)?;
    config.set_vocabulary_limit(200)?;
    config.set_sequence_limit(2000)?;

    // Invalid values are rejected, not clamped
    match config.set_lambda(1.5) {
        Ok(_) => println!("Should not happen"),
        Err(e) => println!("{e}"),
    }

    // Resume from the snapshot next to the history file if there is a usable one
    let model_path = build_output_path(HISTORY_PATH, "bin")?;
    let mut runner = match load_from_path(&model_path, ORDER) {
        Ok(runner) => {
            println!("Resumed model at position {}", runner.position());
            runner
        }
        Err(ModelError::Io(_)) => NextFileModelRunner::new(config)?,
        Err(e) => {
            log::warn!("discarding persisted model: {e}");
            NextFileModelRunner::new(config)?
        }
    };

    // Replay the history, one opened file per line
    let history = read_history(HISTORY_PATH)?;
    runner.learn_all(&history);
    println!(
        "Learned {} events, {} files live, phase {:?}",
        history.len(),
        runner.vocabulary_len(),
        runner.phase()
    );

    // What is likely to be opened next?
    for (i, (path, p)) in runner.predict_next(10).iter().enumerate() {
        println!(
            "{:>2}. {:<50} p={:.4} x{:.1} over floor, {:.2} of best",
            i + 1,
            path,
            p.probability,
            p.floor_ratio,
            p.relative_probability
        );
    }

    // Candidates supplied by a caller, known or not
    let candidates = ["src/main.rs", "Cargo.toml", "never/opened.rs"];
    for (path, p) in runner.score(&candidates) {
        println!("{path}: {:.4}", p.probability);
    }

    save_to_path(&runner, &model_path)?;
    Ok(())
}
