//! Line-oriented interactive chooser.
//!
//! Lists the candidates with their token counts and reads a selection such
//! as `1 3-5 src/*.rs`. Accepted terms, separated by spaces or commas:
//!
//! - a 1-based index: `3`
//! - an inclusive range: `2-4`
//! - `all`
//! - a glob over relative paths: `src/**/*.rs`, `*.md`
//!
//! `q`, `quit` or end of input cancels with an empty selection.

use std::collections::HashSet;
use std::io::{BufRead, Write};

use glob::{MatchOptions, Pattern};
use tracing::debug;

use crate::errors::CmdcError;
use crate::interrupt::{triggered, Interrupt};
use crate::selector::{Choice, Chooser};

const EMPTY_SELECTION: &str = "Please select at least one file";

/// Chooser that reads selections from `input` and writes prompts to `output`.
pub struct PromptChooser<R, W> {
    input: R,
    output: W,
    interrupt: Option<Interrupt>,
}

impl<R: BufRead, W: Write> PromptChooser<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            interrupt: None,
        }
    }

    /// Stop prompting once `interrupt` fires.
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = Some(interrupt);
        self
    }

    fn list(&mut self, choices: &[Choice]) -> std::io::Result<()> {
        writeln!(self.output, "\nSelect files to include:")?;
        let width = choices.len().to_string().len();
        for (i, choice) in choices.iter().enumerate() {
            writeln!(self.output, "  {:>width$}. {}", i + 1, choice.label())?;
        }
        Ok(())
    }
}

impl<R: BufRead, W: Write> Chooser for PromptChooser<R, W> {
    fn choose(&mut self, choices: &[Choice]) -> Result<Vec<String>, CmdcError> {
        self.list(choices)?;

        let mut line = String::new();
        loop {
            write!(
                self.output,
                "Selection (numbers, ranges, globs or 'all'; 'q' to cancel): "
            )?;
            self.output.flush()?;

            line.clear();
            let read = self.input.read_line(&mut line)?;
            if read == 0 || triggered(self.interrupt.as_ref()) {
                debug!("prompt closed without a selection");
                return Ok(Vec::new());
            }

            let answer = line.trim();
            if answer.eq_ignore_ascii_case("q") || answer.eq_ignore_ascii_case("quit") {
                return Ok(Vec::new());
            }

            match parse_selection(answer, choices) {
                Ok(selected) if !selected.is_empty() => return Ok(selected),
                Ok(_) => writeln!(self.output, "{}", EMPTY_SELECTION)?,
                Err(message) => writeln!(self.output, "{}. {}", message, EMPTY_SELECTION)?,
            }
        }
    }
}

/// Resolve a selection line against `choices`.
///
/// Paths come back in the order the terms name them, without repeats.
/// Returns a message describing the first term that matched nothing.
pub fn parse_selection(answer: &str, choices: &[Choice]) -> Result<Vec<String>, String> {
    let mut seen = HashSet::new();
    let mut selected = Vec::new();
    let mut push = |index: usize| {
        let path = &choices[index].relative_path;
        if seen.insert(index) {
            selected.push(path.clone());
        }
    };

    for term in answer
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
    {
        for index in resolve_term(term, choices)? {
            push(index);
        }
    }

    Ok(selected)
}

fn resolve_term(term: &str, choices: &[Choice]) -> Result<Vec<usize>, String> {
    if term.eq_ignore_ascii_case("all") {
        return Ok((0..choices.len()).collect());
    }

    if let Ok(n) = term.parse::<usize>() {
        return index(n, choices.len()).map(|i| vec![i]);
    }

    if let Some((start, end)) = term.split_once('-') {
        if let (Ok(start), Ok(end)) = (start.parse::<usize>(), end.parse::<usize>()) {
            if start > end {
                return Err(format!("Invalid range '{}'", term));
            }
            let first = index(start, choices.len())?;
            let last = index(end, choices.len())?;
            return Ok((first..=last).collect());
        }
    }

    let matched = match_glob(term, choices);
    if matched.is_empty() {
        Err(format!("No file matches '{}'", term))
    } else {
        Ok(matched)
    }
}

fn index(n: usize, len: usize) -> Result<usize, String> {
    if n == 0 || n > len {
        Err(format!("No file numbered {} (1-{})", n, len))
    } else {
        Ok(n - 1)
    }
}

fn match_glob(term: &str, choices: &[Choice]) -> Vec<usize> {
    let options = MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    };
    let normalized = term.replace('\\', "/");

    match Pattern::new(&normalized) {
        Ok(pattern) => choices
            .iter()
            .enumerate()
            .filter(|(_, c)| pattern.matches_with(&c.relative_path.replace('\\', "/"), options))
            .map(|(i, _)| i)
            .collect(),
        Err(_) => choices
            .iter()
            .enumerate()
            .filter(|(_, c)| c.relative_path == term)
            .map(|(i, _)| i)
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn choices() -> Vec<Choice> {
        ["a.py", "b.txt", "src/lib.rs", "src/main.rs", "README.md"]
            .iter()
            .enumerate()
            .map(|(i, p)| Choice {
                relative_path: p.to_string(),
                tokens: (i + 1) * 10,
            })
            .collect()
    }

    fn run(input: &str) -> (Vec<String>, String) {
        let mut output = Vec::new();
        let selected = PromptChooser::new(Cursor::new(input.as_bytes()), &mut output)
            .choose(&choices())
            .unwrap();
        (selected, String::from_utf8(output).unwrap())
    }

    #[test]
    fn test_indices_and_ranges() {
        let (selected, shown) = run("3-4, 1\n");
        assert_eq!(selected, vec!["src/lib.rs", "src/main.rs", "a.py"]);
        assert!(shown.contains("1. a.py (10 tokens)"));
        assert!(shown.contains("5. README.md (50 tokens)"));
    }

    #[test]
    fn test_all() {
        let (selected, _) = run("all\n");
        assert_eq!(selected.len(), 5);
        assert_eq!(selected[0], "a.py");
    }

    #[test]
    fn test_globs_and_repeats() {
        let (selected, _) = run("src/*.rs 3 *.md\n");
        assert_eq!(selected, vec!["src/lib.rs", "src/main.rs", "README.md"]);
    }

    #[test]
    fn test_globs_stay_in_their_directory() {
        let choices: Vec<Choice> = ["src/lib.rs", "src/a/b.rs", "README.md", "docs/x.md"]
            .iter()
            .map(|p| Choice {
                relative_path: p.to_string(),
                tokens: 1,
            })
            .collect();

        assert_eq!(parse_selection("src/*.rs", &choices).unwrap(), vec!["src/lib.rs"]);
        assert_eq!(parse_selection("*.md", &choices).unwrap(), vec!["README.md"]);
        assert_eq!(parse_selection("*/*.md", &choices).unwrap(), vec!["docs/x.md"]);
        assert_eq!(
            parse_selection("src/**/*.rs", &choices).unwrap(),
            vec!["src/lib.rs", "src/a/b.rs"]
        );
    }

    #[test]
    fn test_exact_path() {
        let (selected, _) = run("b.txt\n");
        assert_eq!(selected, vec!["b.txt"]);
    }

    #[test]
    fn test_empty_and_invalid_reprompt() {
        let (selected, shown) = run("\n9\nnothing*\n2\n");
        assert_eq!(selected, vec!["b.txt"]);
        assert_eq!(shown.matches(EMPTY_SELECTION).count(), 3);
        assert!(shown.contains("No file numbered 9"));
        assert!(shown.contains("No file matches 'nothing*'"));
    }

    #[test]
    fn test_cancel() {
        assert!(run("q\n").0.is_empty());
        assert!(run("QUIT\n").0.is_empty());
        assert!(run("").0.is_empty());
        assert!(run("\n\n").0.is_empty());
    }

    #[test]
    fn test_interrupt_cancels() {
        let interrupt = Interrupt::new();
        interrupt.trigger();
        let mut output = Vec::new();
        let selected = PromptChooser::new(Cursor::new("1\n".as_bytes()), &mut output)
            .with_interrupt(interrupt)
            .choose(&choices())
            .unwrap();
        assert!(selected.is_empty());
    }

    #[test]
    fn test_parse_selection_errors() {
        let choices = choices();
        assert!(parse_selection("0", &choices).is_err());
        assert!(parse_selection("4-2", &choices).is_err());
        assert!(parse_selection("2-9", &choices).is_err());
        assert_eq!(parse_selection("", &choices).unwrap(), Vec::<String>::new());
    }
}
