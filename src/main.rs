use std::io;
use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing::{error, info};

use histlean::cli::{self, CliOptions, Command, ExtractArgs};
use histlean::config;
use histlean::error::PipelineError;
use histlean::extract::{BrowserChoice, HistoryFilter, Roots};
use histlean::logging;
use histlean::pipeline::{Pipeline, StageLogs};

fn main() -> ExitCode {
    let opts = cli::parse();
    match run(opts) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(&err);
            ExitCode::FAILURE
        }
    }
}

fn run(opts: CliOptions) -> Result<()> {
    let mut loaded =
        config::load_config(opts.config_path.as_deref()).context("loading configuration")?;
    if let Some(root) = opts.workdir.as_deref() {
        loaded.config = loaded.config.rooted_at(root);
    }
    let paths = loaded.config.paths();
    logging::init_logging(Some(&paths.log_file));
    info!(config_hash = %loaded.config_hash, "histlean {}", env!("CARGO_PKG_VERSION"));

    let pipeline = Pipeline::new(&loaded, StageLogs::tracing());
    match opts.command {
        Command::Run(args) => {
            let (choice, filter) = prepare_extract(&pipeline, &args)?;
            let roots = Roots::from_env()?;
            let summary = pipeline.run(choice, &roots, &filter)?;
            println!("Accuracy: {:.2}", summary.accuracy);
            println!("Your predicted leaning is: {}", summary.prediction);
        }
        Command::Extract(args) => {
            let (choice, filter) = prepare_extract(&pipeline, &args)?;
            let roots = Roots::from_env()?;
            let outcome = pipeline.extractor().extract(choice, &roots, &filter)?;
            println!(
                "Saved {} {} history rows to {}",
                outcome.rows,
                outcome.browser,
                outcome.raw_path.display()
            );
        }
        Command::Clean { inputs } => {
            let outcome = pipeline.clean_only(inputs)?;
            println!(
                "Saved {} cleaned rows to {}",
                outcome.records.len(),
                outcome.output.display()
            );
        }
        Command::Label => {
            let labels = pipeline.label_only()?;
            println!("Saved {} labels to {}", labels.len(), paths.labels.display());
        }
        Command::Vectorize => {
            let features = pipeline.vectorize_only()?;
            println!(
                "Saved {}x{} feature matrix to {}",
                features.rows(),
                features.columns(),
                paths.features.display()
            );
        }
        Command::Train => {
            let outcome = pipeline.train_only()?;
            println!("Model accuracy: {:.2}", outcome.accuracy);
        }
        Command::Predict { text } => {
            let prediction = pipeline.predict_only(&text)?;
            println!("Your predicted leaning is: {prediction}");
        }
    }
    Ok(())
}

/// Resolve the browser and ask for consent before anything reads history.
fn prepare_extract(pipeline: &Pipeline<'_>, args: &ExtractArgs) -> Result<(BrowserChoice, HistoryFilter)> {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut output = io::stdout();
    let choice = match args.browser {
        Some(arg) => arg.into(),
        None => cli::prompt_browser(&mut input, &mut output)?,
    };
    if !args.yes {
        cli::confirm_consent(&mut input, &mut output)?;
    }

    let mut filter = pipeline.filter();
    if let Some(limit) = args.limit {
        filter.limit = limit;
    }
    if let Some(keywords) = &args.keywords {
        filter.keywords = keywords.clone();
    }
    Ok((choice, filter))
}

fn report(err: &anyhow::Error) {
    let Some(failure) = err.downcast_ref::<PipelineError>() else {
        error!("{err:#}");
        eprintln!("error: {err:#}");
        return;
    };
    let hint = match failure.kind() {
        "consent_declined" => "Consent not provided. Exiting.",
        "unsupported_browser" => "Unsupported browser. Choose chrome, brave or firefox.",
        "not_found" => "A required file is missing. Run the earlier stages first.",
        "permission" => "Permission denied. Close the browser or check file access.",
        "alignment" => "Features and labels are out of step. Re-run label and vectorize.",
        "no_input" => "Nothing to process.",
        "training" => "Model training failed.",
        "validation" | "dimension_mismatch" => "A saved artifact is inconsistent. Re-run the pipeline.",
        _ => "The pipeline failed.",
    };
    error!(kind = failure.kind(), "{failure}");
    eprintln!("{hint}\n{failure}");
}
