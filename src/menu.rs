use crate::competitor::{Identity, Mode};
use crate::error::{LedgerError, Result};
use crate::ledger::Ledger;
use crate::storage::Storage;
use color_eyre::eyre;
use std::io::{BufRead, Write};

pub fn parse_score(input: &str) -> Result<u32> {
    input
        .trim()
        .parse()
        .map_err(|_| LedgerError::InvalidScore {
            input: input.trim().to_string(),
        })
}

/// Interactive loop over any line source, so it can be scripted in tests.
pub struct Menu<'a, S, R, W> {
    ledger: &'a mut Ledger<S>,
    input: R,
    output: W,
}

enum Step {
    Continue,
    Exit,
}

impl<'a, S: Storage, R: BufRead, W: Write> Menu<'a, S, R, W> {
    pub fn new(ledger: &'a mut Ledger<S>, input: R, output: W) -> Self {
        Self {
            ledger,
            input,
            output,
        }
    }

    /// Runs until the user exits or input ends. Storage failures end the loop.
    pub fn run(mut self) -> eyre::Result<()> {
        loop {
            let (register, _) = self.labels();
            writeln!(
                self.output,
                "\n1. {register}\n2. Record Match\n3. Show Leaderboard\n4. Exit"
            )?;
            let Some(choice) = self.prompt("Choose an option: ")? else {
                return Ok(());
            };
            let step = match choice.as_str() {
                "1" => self.report(Self::register)?,
                "2" => self.report(Self::record_match)?,
                "3" => self.report(Self::show_leaderboard)?,
                "4" => Step::Exit,
                _ => {
                    writeln!(self.output, "Invalid choice. Please try again.")?;
                    Step::Continue
                }
            };
            if let Step::Exit = step {
                return Ok(());
            }
        }
    }

    fn labels(&self) -> (&'static str, &'static str) {
        match self.ledger.mode() {
            Mode::Singles => ("Add Player", "Player"),
            Mode::Doubles => ("Create New Duo", "Team"),
        }
    }

    /// Prints recoverable ledger failures and keeps going.
    fn report(
        &mut self,
        action: fn(&mut Self) -> eyre::Result<Option<Result<String>>>,
    ) -> eyre::Result<Step> {
        match action(self)? {
            None => Ok(Step::Exit),
            Some(Ok(message)) => {
                writeln!(self.output, "{message}")?;
                Ok(Step::Continue)
            }
            Some(Err(LedgerError::Storage(e))) => Err(e.into()),
            Some(Err(e)) => {
                writeln!(self.output, "{e}")?;
                Ok(Step::Continue)
            }
        }
    }

    fn prompt(&mut self, label: &str) -> eyre::Result<Option<String>> {
        write!(self.output, "{label}")?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn read_identity(&mut self, side: Option<&str>) -> eyre::Result<Option<Result<Identity>>> {
        let prefix = side.map(|s| format!("{s} ")).unwrap_or_default();
        match self.ledger.mode() {
            Mode::Singles => {
                let label = if prefix.is_empty() {
                    "Enter player name: ".to_string()
                } else {
                    format!("Enter {prefix}Name: ")
                };
                let Some(name) = self.prompt(&label)? else {
                    return Ok(None);
                };
                Ok(Some(Identity::player(&name)))
            }
            Mode::Doubles => {
                let (first, second) = if prefix.is_empty() {
                    (
                        "Enter first player name: ".to_string(),
                        "Enter second player name: ".to_string(),
                    )
                } else {
                    (
                        format!("Enter {prefix}Player 1: "),
                        format!("Enter {prefix}Player 2: "),
                    )
                };
                let Some(a) = self.prompt(&first)? else {
                    return Ok(None);
                };
                let Some(b) = self.prompt(&second)? else {
                    return Ok(None);
                };
                Ok(Some(Identity::duo(&a, &b)))
            }
        }
    }

    fn register(&mut self) -> eyre::Result<Option<Result<String>>> {
        let Some(identity) = self.read_identity(None)? else {
            return Ok(None);
        };
        let result = identity.and_then(|identity| {
            self.ledger.register(identity.clone())?;
            Ok(format!(
                "'{identity}' added with ELO {:.0}.",
                crate::constants::ELO_BASE
            ))
        });
        Ok(Some(result))
    }

    fn record_match(&mut self) -> eyre::Result<Option<Result<String>>> {
        let (_, side) = self.labels();
        let Some(a) = self.read_identity(Some(&format!("{side} 1")))? else {
            return Ok(None);
        };
        let Some(b) = self.read_identity(Some(&format!("{side} 2")))? else {
            return Ok(None);
        };
        let Some(score_a) = self.prompt(&format!("Enter {side} 1's Score: "))? else {
            return Ok(None);
        };
        let Some(score_b) = self.prompt(&format!("Enter {side} 2's Score: "))? else {
            return Ok(None);
        };

        let result = (|| -> Result<String> {
            let (a, b) = (a?, b?);
            let (score_a, score_b) = (parse_score(&score_a)?, parse_score(&score_b)?);
            let (new_a, new_b) = self.ledger.record_match(&a, &b, score_a, score_b)?;
            Ok(format!("Updated ELO: {a} ({new_a:.2}), {b} ({new_b:.2})"))
        })();
        Ok(Some(result))
    }

    fn show_leaderboard(&mut self) -> eyre::Result<Option<Result<String>>> {
        if let Err(e) = self.ledger.refresh() {
            return Ok(Some(Err(e)));
        }
        let (_, side) = self.labels();
        let mut table = format!("{:>3}  {:<30} {:>8} {:>7}\n", "#", side, "ELO", "Matches");
        table.push_str(&"-".repeat(51));
        for (rank, c) in self.ledger.leaderboard().iter().enumerate() {
            table.push_str(&format!(
                "\n{:>3}  {:<30} {:>8.2} {:>7}",
                rank + 1,
                c.identity.to_string(),
                c.rating,
                c.matches
            ));
        }
        Ok(Some(Ok(table)))
    }
}
