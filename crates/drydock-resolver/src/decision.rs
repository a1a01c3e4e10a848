use std::collections::BTreeSet;
use std::io::{self, BufRead, Write};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Decision {
    Include,
    Exclude,
}

/// The one suspension point of a resolution run: deciding whether an
/// optional dependency candidate joins the resolved set. Production wires a
/// terminal prompt; tests and non-interactive runs wire a scripted table.
pub trait DecisionProvider {
    fn decide(&mut self, parent: &str, candidate: &str) -> Decision;
}

pub fn decision_prompt(parent: &str, candidate: &str) -> String {
    format!("Package {parent} has optional dependency '{candidate}'. Include it?")
}

/// Excludes every candidate. Used wherever prompting is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeclineAll;

impl DecisionProvider for DeclineAll {
    fn decide(&mut self, _parent: &str, _candidate: &str) -> Decision {
        Decision::Exclude
    }
}

/// Includes exactly the named candidates, regardless of parent.
#[derive(Debug, Default, Clone)]
pub struct ScriptedDecisions {
    include: BTreeSet<String>,
}

impl ScriptedDecisions {
    pub fn including(candidates: impl IntoIterator<Item = String>) -> Self {
        Self {
            include: candidates.into_iter().collect(),
        }
    }
}

impl DecisionProvider for ScriptedDecisions {
    fn decide(&mut self, _parent: &str, candidate: &str) -> Decision {
        if self.include.contains(candidate) {
            Decision::Include
        } else {
            Decision::Exclude
        }
    }
}

/// Terminal prompt provider. Blocks the resolution until the user answers;
/// anything but an explicit yes (including EOF) excludes the candidate.
#[derive(Debug, Default, Clone, Copy)]
pub struct InteractivePrompt;

impl DecisionProvider for InteractivePrompt {
    fn decide(&mut self, parent: &str, candidate: &str) -> Decision {
        print!("{} [y/N]: ", decision_prompt(parent, candidate));
        if io::stdout().flush().is_err() {
            return Decision::Exclude;
        }

        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(0) | Err(_) => Decision::Exclude,
            Ok(_) => match answer.trim().to_ascii_lowercase().as_str() {
                "y" | "yes" => Decision::Include,
                _ => Decision::Exclude,
            },
        }
    }
}
