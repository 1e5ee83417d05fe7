//! seqfit CLI
//!
//! Fits an LSTM or CNN-LSTM regressor on a JSON train/validation split and writes
//! the loss curves and validation predictions as JSON.

use clap::{Args, Parser, Subcommand};
use seqfit::model::ModelKind;
use seqfit::{Config, Result};

#[derive(Parser)]
#[command(name = "seqfit")]
#[command(about = "Sliding-window time-series regression with recurrent networks", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "seqfit.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit a single-layer LSTM
    FitLstm {
        #[command(flatten)]
        fit: FitArgs,
    },
    /// Fit the convolutional + recurrent hybrid
    FitCnnLstm {
        #[command(flatten)]
        fit: FitArgs,
        /// Dropout on the recurrent state of the last LSTM
        #[arg(long)]
        recurrent_dropout: Option<f64>,
        /// Dropout after each convolution stage
        #[arg(long)]
        other_dropout: Option<f64>,
    },
    /// Write a default config file
    Init,
}

#[derive(Args)]
struct FitArgs {
    /// Input split (JSON with x_train, y_train, x_val, y_val, preds)
    #[arg(long)]
    data: String,
    /// Output file for the result bundle (stdout when omitted)
    #[arg(long)]
    out: Option<String>,
    /// Override the past horizon
    #[arg(long)]
    past: Option<usize>,
    /// Override the sampling rate inside a window
    #[arg(long)]
    step: Option<usize>,
    /// Override the learning rate
    #[arg(long)]
    lr: Option<f64>,
    /// Override the batch size
    #[arg(long)]
    batch_size: Option<usize>,
    /// Override number of epochs
    #[arg(long)]
    epochs: Option<usize>,
    /// Override early stopping patience
    #[arg(long)]
    patience: Option<usize>,
    /// Override the checkpoint path (without extension)
    #[arg(long)]
    checkpoint: Option<String>,
}

impl FitArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(past) = self.past {
            config.window.past = past;
        }
        if let Some(step) = self.step {
            config.window.step = step;
        }
        if let Some(lr) = self.lr {
            config.training.learning_rate = lr;
        }
        if let Some(batch_size) = self.batch_size {
            config.training.batch_size = batch_size;
        }
        if let Some(epochs) = self.epochs {
            config.training.epochs = epochs;
        }
        if let Some(patience) = self.patience {
            config.training.patience = patience;
        }
        if let Some(checkpoint) = &self.checkpoint {
            config.checkpoint.path = checkpoint.clone();
        }
    }
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load or create config
    let mut config = if std::path::Path::new(&cli.config).exists() {
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
        Commands::FitLstm { fit } => {
            fit.apply(&mut config);
            commands::fit(&config, ModelKind::Lstm, &fit.data, fit.out.as_deref())
        }
        Commands::FitCnnLstm {
            fit,
            recurrent_dropout,
            other_dropout,
        } => {
            fit.apply(&mut config);
            if let Some(rate) = recurrent_dropout {
                config.model.recurrent_dropout = rate;
            }
            if let Some(rate) = other_dropout {
                config.model.other_dropout = rate;
            }
            commands::fit(&config, ModelKind::CnnLstm, &fit.data, fit.out.as_deref())
        }
        Commands::Init => commands::init(&cli.config),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

mod commands {
    use super::*;
    use seqfit::data::DatasetSplit;
    use seqfit::fit::DefaultBackend;

    pub fn init(config_path: &str) -> Result<()> {
        let config = Config::default();
        config.save(config_path)?;
        println!("Created default config at {}", config_path);

        println!("\nNext steps:");
        println!("  1. Edit {} to set the past horizon and training settings", config_path);
        println!("  2. Run 'seqfit fit-lstm --data split.json --out result.json'");
        println!("  3. Or 'seqfit fit-cnn-lstm --data split.json --out result.json'");

        Ok(())
    }

    pub fn fit(config: &Config, kind: ModelKind, data_path: &str, out: Option<&str>) -> Result<()> {
        let data = DatasetSplit::load(data_path)?;
        let params = config.fit_params();
        let settings = config.fit_settings();
        let device = Default::default();

        log::info!(
            "Loaded {} training and {} validation rows from {}",
            data.x_train.len(),
            data.x_val.len(),
            data_path
        );

        let result = match kind {
            ModelKind::Lstm => seqfit::fit_lstm::<DefaultBackend>(&data, &params, &settings, &device)?,
            ModelKind::CnnLstm => {
                seqfit::fit_cnn_lstm::<DefaultBackend>(&data, &params, &settings, &device)?
            }
        };

        log::info!(
            "Validation MAE over {} windows: {:.4}",
            result.pred_y.len(),
            result.val_mae()
        );

        match out {
            Some(path) => {
                result.save(path)?;
                println!("Wrote results to {}", path);
            }
            None => println!("{}", serde_json::to_string_pretty(&result)?),
        }

        Ok(())
    }
}
