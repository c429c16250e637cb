//! Interactive change selection for `split`

use std::io::{self, BufRead, BufReader, Stdin, Stderr, Write};
use std::sync::Mutex;

use restack_core::select::stage_change;
use restack_core::{FileChange, HunkSelector, PathFilter, Result, SelectOptions, StagingArea};

const HELP: &str = "\
y - stage this change
n - do not stage this change
q - quit; do not stage this change or any of the remaining ones
a - stage this change and all later changes
d - do not stage this change or any of the later changes
? - print help
";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Answer {
    Yes,
    No,
    Quit,
    All,
    Done,
}

fn parse_answer(line: &str) -> Option<Answer> {
    match line.trim().chars().next()? {
        'y' | 'Y' => Some(Answer::Yes),
        'n' | 'N' => Some(Answer::No),
        'q' | 'Q' => Some(Answer::Quit),
        'a' | 'A' => Some(Answer::All),
        'd' | 'D' => Some(Answer::Done),
        _ => None,
    }
}

/// Asks about every change on a terminal
///
/// Changes are whole files, so there is no hunk editing sub-mode to offer
/// regardless of [`SelectOptions::allow_edit`].
pub struct TerminalSelector<R, W> {
    input: Mutex<R>,
    output: Mutex<W>,
}

impl TerminalSelector<BufReader<Stdin>, Stderr> {
    pub fn stdio() -> Self {
        Self::new(BufReader::new(io::stdin()), io::stderr())
    }
}

impl<R, W> TerminalSelector<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input: Mutex::new(input),
            output: Mutex::new(output),
        }
    }
}

impl<R: BufRead + Send, W: Write + Send> HunkSelector for TerminalSelector<R, W> {
    fn select(
        &self,
        staging: &mut StagingArea,
        changes: &[FileChange],
        _filter: &PathFilter,
        options: SelectOptions,
    ) -> Result<()> {
        tracing::debug!("selecting among {} change(s), allow_edit={}", changes.len(), options.allow_edit);
        let mut input = self.input.lock().unwrap_or_else(|e| e.into_inner());
        let mut output = self.output.lock().unwrap_or_else(|e| e.into_inner());
        let mut take_rest = false;

        for (n, change) in changes.iter().enumerate() {
            if take_rest {
                stage_change(staging, change);
                continue;
            }
            writeln!(output, "{}: {}", change.kind, change.path)?;
            let answer = loop {
                write!(output, "({}/{}) Stage this change [y,n,q,a,d,?]? ", n + 1, changes.len())?;
                output.flush()?;
                let mut line = String::new();
                if input.read_line(&mut line)? == 0 {
                    break Answer::Quit;
                }
                match parse_answer(&line) {
                    Some(answer) => break answer,
                    None => write!(output, "{}", HELP)?,
                }
            };
            match answer {
                Answer::Yes => stage_change(staging, change),
                Answer::No => {}
                Answer::All => {
                    stage_change(staging, change);
                    take_rest = true;
                }
                Answer::Quit | Answer::Done => break,
            }
        }
        Ok(())
    }
}
