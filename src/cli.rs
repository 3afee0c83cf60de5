use std::io::{BufRead, Write};
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::error::{PipelineError, Result};
use crate::extract::BrowserChoice;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserArg {
    Chrome,
    Brave,
    Firefox,
}

impl From<BrowserArg> for BrowserChoice {
    fn from(arg: BrowserArg) -> Self {
        match arg {
            BrowserArg::Chrome => BrowserChoice::Chrome,
            BrowserArg::Brave => BrowserChoice::Brave,
            BrowserArg::Firefox => BrowserChoice::Firefox,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct CliOptions {
    /// Optional path to config file (YAML)
    #[arg(long, global = true)]
    pub config_path: Option<PathBuf>,

    /// Root directory for data/, models/ and logs/ (defaults to the current directory)
    #[arg(long, global = true)]
    pub workdir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Extract, clean, label, vectorize, train and predict in one pass
    Run(ExtractArgs),
    /// Copy a browser's history into data/raw/
    Extract(ExtractArgs),
    /// Normalize raw history tables into data/processed/cleaned_history.csv
    Clean {
        /// Raw tables to clean (defaults to every data/raw/user*_history.csv)
        inputs: Vec<PathBuf>,
    },
    /// Write keyword labels for the cleaned table
    Label,
    /// Fit TF-IDF features over the cleaned table
    Vectorize,
    /// Train the classifier on saved features and labels
    Train,
    /// Score text (or the saved feature rows) with the trained model
    Predict {
        /// Free text to classify
        text: Vec<String>,
    },
}

#[derive(Args, Debug, Clone)]
pub struct ExtractArgs {
    /// Browser to read (prompted when absent)
    #[arg(long, value_enum)]
    pub browser: Option<BrowserArg>,

    /// Skip the consent prompt
    #[arg(long)]
    pub yes: bool,

    /// Maximum rows to extract (overrides config)
    #[arg(long)]
    pub limit: Option<usize>,

    /// Keep only rows whose url or title contains one of these (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub keywords: Option<Vec<String>>,
}

pub fn parse() -> CliOptions {
    CliOptions::parse()
}

fn read_answer<R: BufRead, W: Write>(input: &mut R, output: &mut W, question: &str) -> Result<String> {
    write!(output, "{question}")?;
    output.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim().to_ascii_lowercase())
}

/// Ask which browser to read; anything unrecognized is `UnsupportedBrowser`.
pub fn prompt_browser<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> Result<BrowserChoice> {
    read_answer(input, output, "Which browser do you use? (chrome/brave/firefox): ")?.parse()
}

/// Only an explicit `yes` allows touching browser storage.
pub fn confirm_consent<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> Result<()> {
    let answer = read_answer(
        input,
        output,
        "This will read your local browsing history. Do you consent? (yes/no): ",
    )?;
    if answer == "yes" {
        Ok(())
    } else {
        Err(PipelineError::ConsentDeclined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parses_run_with_browser_and_yes() {
        let opts = CliOptions::try_parse_from(["histlean", "run", "--browser", "brave", "--yes"])
            .expect("parse");
        let Command::Run(args) = opts.command else {
            panic!("expected run");
        };
        assert_eq!(args.browser, Some(BrowserArg::Brave));
        assert!(args.yes);
    }

    #[test]
    fn rejects_unknown_browser() {
        assert!(CliOptions::try_parse_from(["histlean", "extract", "--browser", "safari"]).is_err());
    }

    #[test]
    fn parses_keyword_list_and_global_config() {
        let opts = CliOptions::try_parse_from([
            "histlean",
            "extract",
            "--keywords",
            "senate,election",
            "--config-path",
            "custom.yml",
        ])
        .expect("parse");
        assert_eq!(opts.config_path, Some(PathBuf::from("custom.yml")));
        let Command::Extract(args) = opts.command else {
            panic!("expected extract");
        };
        assert_eq!(args.keywords.expect("keywords"), vec!["senate", "election"]);
    }

    #[test]
    fn parses_predict_text() {
        let opts = CliOptions::try_parse_from(["histlean", "predict", "tax cuts", "border wall"])
            .expect("parse");
        let Command::Predict { text } = opts.command else {
            panic!("expected predict");
        };
        assert_eq!(text.len(), 2);
    }

    #[test]
    fn consent_requires_yes() {
        let mut out = Vec::new();
        assert!(confirm_consent(&mut Cursor::new("YES\n"), &mut out).is_ok());
        let err = confirm_consent(&mut Cursor::new("y\n"), &mut out).expect_err("declined");
        assert_eq!(err.kind(), "consent_declined");
        let err = confirm_consent(&mut Cursor::new(""), &mut out).expect_err("eof");
        assert_eq!(err.kind(), "consent_declined");
    }

    #[test]
    fn browser_prompt_parses_answer() {
        let mut out = Vec::new();
        let choice = prompt_browser(&mut Cursor::new(" Firefox \n"), &mut out).expect("choice");
        assert_eq!(choice, BrowserChoice::Firefox);
        assert!(String::from_utf8(out).expect("utf8").contains("chrome/brave/firefox"));
        let err = prompt_browser(&mut Cursor::new("opera\n"), &mut Vec::new()).expect_err("bad");
        assert_eq!(err.kind(), "unsupported_browser");
    }
}
