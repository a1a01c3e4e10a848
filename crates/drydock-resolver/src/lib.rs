mod decision;
mod error;
mod orphans;
mod rebuild;
mod resolve;

pub use decision::{
    decision_prompt, Decision, DecisionProvider, DeclineAll, InteractivePrompt, ScriptedDecisions,
};
pub use error::ResolveError;
pub use orphans::detect_orphans;
pub use rebuild::mark_for_rebuild;
pub use resolve::{Resolution, Resolver, ResolverPolicy};

#[cfg(test)]
mod tests;
