//! College football prediction CLI
//!
//! Builds game records from the statistics store, encodes them into feature
//! matrices, trains the score ensemble and writes weekly predictions.

use clap::{Parser, Subcommand};
use gridiron::{Config, Result};

#[derive(Parser)]
#[command(name = "gridiron")]
#[command(about = "College football score prediction from per-period statistics", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new project with default config
    Init,
    /// Print the feature layout
    Schema {
        /// List every feature name with its offset
        #[arg(long)]
        names: bool,
    },
    /// Aggregate and print one roster object from the database
    Roster {
        /// Team identifier
        team: String,
        season: u16,
        week: u8,
        /// Time window label (currentSeason, last3Games, lastSeason, ...)
        window: String,
    },
    /// Assemble the bulk game file from the database
    Build {
        /// Schedule file (JSON); defaults to the configured schedule path
        #[arg(long)]
        schedule: Option<String>,
    },
    /// Encode the training matrix and write it as CSV
    Encode {
        /// Output path
        #[arg(long, default_value = "training_matrix.csv")]
        output: String,
    },
    /// Train the model ensemble
    Train {
        /// Override number of epochs
        #[arg(long)]
        epochs: Option<usize>,
        /// Override number of ensemble members
        #[arg(long)]
        members: Option<usize>,
    },
    /// Predict contests in the inference seasons
    Predict {
        /// Only predict this week
        #[arg(long)]
        week: Option<u8>,
        /// Output path; defaults to the configured predictions path
        #[arg(long)]
        output: Option<String>,
    },
    /// Database commands
    Db {
        #[command(subcommand)]
        action: DbCommands,
    },
    /// Model management commands
    Model {
        #[command(subcommand)]
        action: ModelCommands,
    },
}

#[derive(Subcommand)]
enum DbCommands {
    /// Show database status
    Status,
    /// Import exported period statistics (JSON)
    Import {
        /// Input file
        file: String,
    },
}

#[derive(Subcommand)]
enum ModelCommands {
    /// Show the trained artifact manifest
    Info,
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load or create config
    let config = if std::path::Path::new(&cli.config).exists() {
        match Config::load(&cli.config) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    let result = match cli.command {
        Commands::Init => commands::init(&cli.config),
        Commands::Schema { names } => commands::schema(&config, names),
        Commands::Roster {
            team,
            season,
            week,
            window,
        } => commands::roster(&config, &team, season, week, &window),
        Commands::Build { schedule } => commands::build(&config, schedule),
        Commands::Encode { output } => commands::encode(&config, &output),
        Commands::Train { epochs, members } => commands::train(&config, epochs, members),
        Commands::Predict { week, output } => commands::predict(&config, week, output),
        Commands::Db { action } => match action {
            DbCommands::Status => commands::db_status(&config),
            DbCommands::Import { file } => commands::db_import(&config, &file),
        },
        Commands::Model { action } => match action {
            ModelCommands::Info => commands::model_info(&config),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

mod commands {
    use super::*;
    use gridiron::data::database::load_import;
    use gridiron::data::dataset::{load_games, save_games, BatchPreprocessor};
    use gridiron::data::{Database, StatKey, TimeWindow};
    use gridiron::features::aggregator::{assemble_games, ScheduledGame};
    use gridiron::features::{FeatureEncoder, PeriodAggregator, PositionGroup, SchemaRegistry};
    use gridiron::predict::context::{ArtifactManifest, MANIFEST_FILE};
    use gridiron::predict::inference::{load_schedule, save_predictions};
    use gridiron::predict::{InferenceContext, Predictor};
    use gridiron::training::Trainer;
    use gridiron::{GridironError, TeamId};
    use std::path::Path;

    pub fn init(config_path: &str) -> Result<()> {
        let config = Config::default();
        config.save(config_path)?;
        println!("Created default config at {}", config_path);

        std::fs::create_dir_all("data")?;
        std::fs::create_dir_all(&config.data.artifact_dir)?;
        println!("Created data/ and {}/ directories", config.data.artifact_dir);

        println!("\nNext steps:");
        println!("  1. Edit {} to customize settings", config_path);
        println!("  2. Run 'gridiron db import <file>' to load period statistics");
        println!("  3. Run 'gridiron build' to assemble the game file");
        println!("  4. Run 'gridiron train' to train the ensemble");
        println!("  5. Run 'gridiron predict' to write predictions");

        Ok(())
    }

    pub fn schema(config: &Config, names: bool) -> Result<()> {
        let schema = SchemaRegistry::new(config.schema.clone());

        println!("Feature Schema (version {})", schema.options().version);
        println!("───────────────────────────────");
        println!("  Header:       {}", schema.header_len());
        println!("  Recruiting:   {}", schema.recruiting_len());
        println!(
            "  Windows:      {}",
            schema
                .windows()
                .iter()
                .map(|w| w.label())
                .collect::<Vec<_>>()
                .join(", ")
        );
        println!("  Per roster:   {}", schema.roster_len());
        for group in PositionGroup::ALL {
            println!(
                "    {:<10} {} x {} fields",
                group.label(),
                group.capacity(),
                group.fields().len()
            );
        }
        println!("  Total length: {}", schema.feature_len());
        println!("  Fingerprint:  {}", schema.fingerprint());

        if names {
            println!();
            for (offset, name) in schema.feature_names().iter().enumerate() {
                println!("{:>5}  {}", offset, name);
            }
        }

        Ok(())
    }

    pub fn roster(config: &Config, team: &str, season: u16, week: u8, window: &str) -> Result<()> {
        let window = TimeWindow::from_label(window)
            .ok_or_else(|| GridironError::Parse(format!("Unknown time window: {}", window)))?;
        let db = Database::open(&config.data.database_path)?;
        let aggregator = PeriodAggregator::new(&db);

        let key = StatKey::new(TeamId::new(team), season, week, window);
        match aggregator.try_build(&key)? {
            Some(roster) => {
                println!("{}", serde_json::to_string_pretty(&roster)?);
                let missing = roster.missing_required_groups();
                if !missing.is_empty() {
                    let labels: Vec<_> = missing.iter().map(|g| g.label()).collect();
                    eprintln!("Warning: no players in {}", labels.join(", "));
                }
            }
            None => println!("No statistics recorded for {}", key),
        }

        Ok(())
    }

    pub fn build(config: &Config, schedule: Option<String>) -> Result<()> {
        let schedule_path = schedule.unwrap_or_else(|| config.data.schedule_path.clone());
        let content = std::fs::read_to_string(&schedule_path)?;
        let scheduled: Vec<ScheduledGame> = serde_json::from_str(&content)?;
        println!("Loaded {} scheduled games from {}", scheduled.len(), schedule_path);

        let db = Database::open(&config.data.database_path)?;
        let aggregator = PeriodAggregator::new(&db);
        let games = assemble_games(&aggregator, &scheduled, &config.schema.windows);

        let complete = games.iter().filter(|g| g.is_complete()).count();
        save_games(&config.data.games_path, &games)?;
        println!(
            "Wrote {} games ({} with complete rosters) to {}",
            games.len(),
            complete,
            config.data.games_path
        );

        Ok(())
    }

    pub fn encode(config: &Config, output: &str) -> Result<()> {
        let schema = SchemaRegistry::new(config.schema.clone());
        let names = schema.feature_names();
        let games = load_games(&config.data.games_path)?;

        let preprocessor = BatchPreprocessor::new(
            FeatureEncoder::new(schema),
            config.filter.training_seasons,
        );
        let matrix = preprocessor.process(&games)?;
        matrix.write_csv(output, &names)?;

        println!(
            "Encoded {} of {} games ({} features) to {}",
            matrix.len(),
            games.len(),
            matrix.feature_len,
            output
        );

        Ok(())
    }

    pub fn train(config: &Config, epochs: Option<usize>, members: Option<usize>) -> Result<()> {
        let mut training = config.training.clone();
        if let Some(e) = epochs {
            training.epochs = e;
        }
        if let Some(m) = members {
            training.ensemble_size = m;
        }

        println!("Initializing training...");
        let schema = SchemaRegistry::new(config.schema.clone());
        let games = load_games(&config.data.games_path)?;
        let preprocessor = BatchPreprocessor::new(
            FeatureEncoder::new(schema.clone()),
            config.filter.training_seasons,
        );
        let matrix = preprocessor.process(&games)?;
        if matrix.is_empty() {
            return Err(GridironError::EmptyDataset(
                "No training games passed the checks. Run 'gridiron build' first.".to_string(),
            ));
        }

        let manifest = Trainer::new(training, schema).train(&matrix, &config.data.artifact_dir)?;

        println!("\nTraining complete!");
        for (i, member) in manifest.members.iter().enumerate() {
            println!(
                "  Member {}: best epoch {}, val loss {:.4} (seed {})",
                i + 1,
                member.best_epoch + 1,
                member.validation_loss,
                member.seed
            );
        }
        println!("Artifacts saved to {}", config.data.artifact_dir);

        Ok(())
    }

    pub fn predict(config: &Config, week: Option<u8>, output: Option<String>) -> Result<()> {
        let schema = SchemaRegistry::new(config.schema.clone());
        let context = InferenceContext::load(&config.data.artifact_dir, &schema)?;

        let games = load_games(&config.data.games_path)?;
        let schedule = if Path::new(&config.data.schedule_path).exists() {
            load_schedule(&config.data.schedule_path)?
        } else {
            log::warn!(
                "Schedule file {} not found, predictions will carry no team metadata",
                config.data.schedule_path
            );
            Vec::new()
        };

        let predictor = Predictor::new(
            &context,
            FeatureEncoder::new(schema),
            config.filter.inference_seasons,
        )?;
        let predictions = predictor.predict(&games, &schedule, week)?;

        for (week, games) in &predictions {
            println!("\nWeek {}", week);
            println!("───────────────────────────────────────────────────────────");
            for p in games {
                println!(
                    "  {:<22} {:>5.1}  vs  {:<22} {:>5.1}   P(home) {:>5.1}%",
                    display_name(&p.home_team, &p.game_id),
                    p.predicted_home_score,
                    display_name(&p.away_team, &p.game_id),
                    p.predicted_away_score,
                    p.home_win_probability * 100.0
                );
            }
        }

        let output = output.unwrap_or_else(|| config.data.predictions_path.clone());
        save_predictions(&output, &predictions)?;
        println!("\nPredictions saved to {}", output);

        Ok(())
    }

    fn display_name<'a>(name: &'a str, game_id: &'a str) -> &'a str {
        if name.is_empty() {
            game_id
        } else {
            name
        }
    }

    pub fn db_status(config: &Config) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let stats = db.get_stats()?;

        println!("Database Status");
        println!("───────────────────────────────");
        println!("  Path:         {}", config.data.database_path);
        println!("  Teams:        {}", stats.team_count);
        println!("  Team rows:    {}", stats.team_rows);
        println!("  Player rows:  {}", stats.player_rows);
        if let (Some(earliest), Some(latest)) = (stats.earliest_season, stats.latest_season) {
            println!("  Seasons:      {} to {}", earliest, latest);
        }

        Ok(())
    }

    pub fn db_import(config: &Config, file: &str) -> Result<()> {
        let records = load_import(file)?;
        let db = Database::open(&config.data.database_path)?;
        let summary = db.import(&records)?;
        println!(
            "Imported {} records: {} team rows, {} player rows",
            records.len(),
            summary.team_rows,
            summary.player_rows
        );
        Ok(())
    }

    pub fn model_info(config: &Config) -> Result<()> {
        let path = Path::new(&config.data.artifact_dir).join(MANIFEST_FILE);
        if !path.exists() {
            return Err(GridironError::NoModel);
        }
        let manifest = ArtifactManifest::load(&path)?;
        let schema = SchemaRegistry::new(config.schema.clone());

        println!("Model Information");
        println!("───────────────────────────────");
        println!("  Directory:      {}", config.data.artifact_dir);
        println!("  Trained at:     {}", manifest.trained_at.format("%Y-%m-%d %H:%M UTC"));
        println!("  Training games: {}", manifest.training_games);
        println!("  Feature length: {}", manifest.feature_len);
        println!("  Hidden layers:  {:?}", manifest.model.hidden_dims);
        println!("  Members:        {}", manifest.members.len());
        println!(
            "  Schema:         {} ({})",
            manifest.schema_fingerprint,
            if manifest.check_schema(&schema).is_ok() {
                "matches config"
            } else {
                "does not match config"
            }
        );

        Ok(())
    }
}
