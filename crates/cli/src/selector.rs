//! Terminal candidate picker.

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader, Stdin};
use tokio::sync::Mutex;

use marginalia_core::provider::{Provider, ProviderError, SearchCandidate};
use marginalia_core::resolver::{CandidateSelector, Selection};

/// Prompts on stderr and reads the answer from stdin.
///
/// A number picks that candidate, `s` or an empty line skips the item,
/// `q` stops the whole run.
pub struct StdinSelector {
    input: Mutex<BufReader<Stdin>>,
}

impl StdinSelector {
    pub fn new() -> Self {
        Self {
            input: Mutex::new(BufReader::new(tokio::io::stdin())),
        }
    }
}

#[derive(Debug, PartialEq)]
enum Answer {
    Pick(usize),
    Skip,
    Quit,
    Invalid,
}

fn parse_answer(line: &str, count: usize) -> Answer {
    match line.trim().to_ascii_lowercase().as_str() {
        "" | "s" | "skip" => Answer::Skip,
        "q" | "quit" => Answer::Quit,
        other => match other.parse::<usize>() {
            Ok(n) if (1..=count).contains(&n) => Answer::Pick(n - 1),
            _ => Answer::Invalid,
        },
    }
}

#[async_trait]
impl CandidateSelector for StdinSelector {
    async fn select(
        &self,
        provider: Provider,
        title: &str,
        candidates: &[SearchCandidate],
    ) -> Result<Selection, ProviderError> {
        eprintln!("\n{} matches for \"{}\":", provider, title);
        for (i, candidate) in candidates.iter().enumerate() {
            eprintln!("  {}. {} ({} votes)", i + 1, candidate.label(), candidate.vote_count);
        }

        let mut input = self.input.lock().await;
        loop {
            eprint!("Pick 1-{}, [s]kip or [q]uit: ", candidates.len());

            let mut line = String::new();
            let read = input
                .read_line(&mut line)
                .await
                .map_err(|e| ProviderError::stop(format!("failed to read selection: {}", e)))?;
            if read == 0 {
                return Ok(Selection::Skipped);
            }

            match parse_answer(&line, candidates.len()) {
                Answer::Pick(index) => return Ok(Selection::Selected(candidates[index].clone())),
                Answer::Skip => return Ok(Selection::Skipped),
                Answer::Quit => return Ok(Selection::Stopped),
                Answer::Invalid => eprintln!("Not a valid choice"),
            }
        }
    }
}
