// Quick debug script to inspect encoded feature columns
// Run with: cargo run --example debug_features [games.json]

use gridiron::data::dataset::{load_games, BatchPreprocessor};
use gridiron::features::{FeatureEncoder, SchemaRegistry};
use gridiron::Config;

fn main() -> gridiron::Result<()> {
    let config = Config::default();
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| config.data.games_path.clone());

    let schema = SchemaRegistry::new(config.schema.clone());
    let names = schema.feature_names();
    let games = load_games(&path)?;

    let preprocessor = BatchPreprocessor::new(
        FeatureEncoder::new(schema),
        config.filter.training_seasons,
    );
    let matrix = preprocessor.process(&games)?;
    println!(
        "{} of {} games encoded, {} features each",
        matrix.len(),
        games.len(),
        matrix.feature_len
    );
    if matrix.is_empty() {
        return Ok(());
    }

    let n = matrix.len() as f32;
    let mut constant = Vec::new();

    println!("\n  offset | mean      | min       | max       | name");
    println!("  ------ | --------- | --------- | --------- | ----");
    for (i, name) in names.iter().enumerate() {
        let column: Vec<f32> = matrix.features.iter().map(|row| row[i]).collect();
        let mean = column.iter().sum::<f32>() / n;
        let min = column.iter().cloned().fold(f32::MAX, f32::min);
        let max = column.iter().cloned().fold(f32::MIN, f32::max);

        if min == max {
            constant.push(name.as_str());
        }
        if i < 40 {
            println!("  {:>6} | {:>9.3} | {:>9.3} | {:>9.3} | {}", i, mean, min, max, name);
        }
    }

    println!("\n{} constant columns", constant.len());
    for name in constant.iter().take(20) {
        println!("  {}", name);
    }

    let home_wins = matrix.labels.iter().filter(|l| l.home_win > 0.5).count();
    println!(
        "\nHome win rate: {:.1}% ({} of {})",
        home_wins as f32 / n * 100.0,
        home_wins,
        matrix.len()
    );

    Ok(())
}
