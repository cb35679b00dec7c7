use std::io::{self, BufRead, Write};

use owo_colors::OwoColorize;

use crate::search::SearchResult;

const ACCEPT_HELP: &str = "\
y  accept this result (default)
n  list every result
?  show this help
q  quit without output";

/// Preview of the document, shown when the user asks for it.
pub type Preview<'a> = &'a dyn Fn() -> Vec<String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    /// Index into the result list.
    Selected(usize),
    Quit,
}

pub struct Prompter<R, W> {
    input: R,
    output: W,
    color: bool,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W, color: bool) -> Self {
        Prompter {
            input,
            output,
            color,
        }
    }

    /// A pacman-style `:: text` header.
    pub fn header(&mut self, text: &str) -> io::Result<()> {
        if self.color {
            writeln!(self.output, "{} {}", "::".blue().bold(), text.bold())
        } else {
            writeln!(self.output, ":: {text}")
        }
    }

    pub fn line(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.output, "{text}")
    }

    /// Offer the best result, then the full list if it is declined. End of input quits.
    pub fn choose(
        &mut self,
        results: &[Box<dyn SearchResult>],
        preview: Option<Preview<'_>>,
    ) -> io::Result<Choice> {
        let Some(best) = results.first() else {
            return Ok(Choice::Quit);
        };

        self.header("Best result")?;
        let best = indent(&best.to_string());
        self.line(&best)?;
        loop {
            let Some(answer) = self.ask("Accept? [Y/n/?/q]")? else {
                return Ok(Choice::Quit);
            };
            match answer.as_str() {
                "" | "y" | "yes" => return Ok(Choice::Selected(0)),
                "n" | "no" => break,
                "?" => self.line(ACCEPT_HELP)?,
                "q" => return Ok(Choice::Quit),
                other => self.line(&format!("Invalid response {other:?}"))?,
            }
        }

        self.list(results)?;
        let n = results.len();
        let prompt = format!("Select a result [1-{n}/s/?/q]");
        loop {
            let Some(answer) = self.ask(&prompt)? else {
                return Ok(Choice::Quit);
            };
            match answer.as_str() {
                "" => return Ok(Choice::Selected(0)),
                "s" => match preview {
                    Some(preview) => {
                        self.header("First lines")?;
                        for line in preview() {
                            self.line(&format!("    {line}"))?;
                        }
                    }
                    None => self.line("No document to show")?,
                },
                "?" => self.line(&select_help(n))?,
                "q" => return Ok(Choice::Quit),
                other => match other.parse::<usize>() {
                    Ok(k) if (1..=n).contains(&k) => return Ok(Choice::Selected(k - 1)),
                    _ => self.line(&format!("Invalid response {other:?}"))?,
                },
            }
        }
    }

    fn list(&mut self, results: &[Box<dyn SearchResult>]) -> io::Result<()> {
        self.header("Results")?;
        for (k, result) in results.iter().enumerate() {
            let text = indent(&result.to_string());
            let provider = format!("({})", result.provider());
            if self.color {
                writeln!(self.output, "{} {}", format!("[{}]", k + 1).bold(), provider.dimmed())?;
            } else {
                writeln!(self.output, "[{}] {provider}", k + 1)?;
            }
            self.line(&text)?;
        }
        Ok(())
    }

    /// Prompt and read one trimmed, lowercased answer; `None` at end of input.
    fn ask(&mut self, prompt: &str) -> io::Result<Option<String>> {
        write!(self.output, "{prompt} ")?;
        self.output.flush()?;
        let mut answer = String::new();
        if self.input.read_line(&mut answer)? == 0 {
            writeln!(self.output)?;
            return Ok(None);
        }
        Ok(Some(answer.trim().to_lowercase()))
    }
}

fn select_help(n: usize) -> String {
    format!(
        "1-{n}  select that result (default 1)\n\
         s     show the first lines of the document\n\
         ?     show this help\n\
         q     quit without output"
    )
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|l| format!("    {l}"))
        .collect::<Vec<_>>()
        .join("\n")
}
