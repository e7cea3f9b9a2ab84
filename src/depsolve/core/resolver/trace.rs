//! The solve trace: a diagnostic record of the attempted-version graph.
//!
//! The solver emits an event at every visit, candidate attempt, selection,
//! unselection, and queue advance. A sink owns what happens to them; the
//! solver never inspects its own trace.

use std::fmt::Write as _;

use crate::core::project::{Atom, ProjectIdentifier};
use crate::core::version::Version;

#[derive(Clone, Debug)]
pub enum TraceEvent {
    /// The solver pulled a project off the unselected queue.
    Visit { id: ProjectIdentifier },
    /// A candidate is about to be checked.
    TryVersion { atom: Atom },
    /// A candidate was rejected; `reason` is the failure's display form.
    Reject { atom: Atom, reason: String },
    /// A candidate passed all checks and was pushed onto the selection.
    Select { atom: Atom, pkg_only: bool },
    /// A selection was popped while backtracking.
    Unselect { atom: Atom },
    /// A version queue moved past `from`.
    Advance { id: ProjectIdentifier, from: Version },
    /// The solver ran out of candidates and is unwinding.
    Backtrack { id: ProjectIdentifier },
}

pub trait TraceSink {
    fn record(&mut self, event: TraceEvent);
}

/// Discards everything. The default for callers that don't care.
#[derive(Default)]
pub struct NullTrace;

impl TraceSink for NullTrace {
    fn record(&mut self, _event: TraceEvent) {}
}

/// Retains the attempted-version tree for post-mortem rendering.
#[derive(Default)]
pub struct TreeTrace {
    events: Vec<(usize, TraceEvent)>,
    depth: usize,
}

impl TreeTrace {
    pub fn new() -> TreeTrace {
        TreeTrace::default()
    }

    pub fn events(&self) -> impl Iterator<Item = &TraceEvent> {
        self.events.iter().map(|(_, e)| e)
    }

    /// Renders the trace as an indented tree, one line per event.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (depth, event) in &self.events {
            for _ in 0..*depth {
                out.push_str("  ");
            }
            match event {
                TraceEvent::Visit { id } => writeln!(out, "? {id}"),
                TraceEvent::TryVersion { atom } => writeln!(out, "try {atom}"),
                TraceEvent::Reject { atom, reason } => writeln!(out, "no {atom}: {reason}"),
                TraceEvent::Select { atom, pkg_only: false } => writeln!(out, "pick {atom}"),
                TraceEvent::Select { atom, pkg_only: true } => writeln!(out, "add pkgs {atom}"),
                TraceEvent::Unselect { atom } => writeln!(out, "drop {atom}"),
                TraceEvent::Advance { id, from } => writeln!(out, "next {id} (past {from})"),
                TraceEvent::Backtrack { id } => writeln!(out, "backtrack over {id}"),
            }
            .expect("writing to a String cannot fail");
        }
        out
    }
}

impl TraceSink for TreeTrace {
    fn record(&mut self, event: TraceEvent) {
        let deepens = matches!(event, TraceEvent::Select { .. });
        if matches!(event, TraceEvent::Unselect { .. }) {
            self.depth = self.depth.saturating_sub(1);
        }
        self.events.push((self.depth, event));
        if deepens {
            self.depth += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::version::Revision;

    fn atom(root: &str, tag: &str) -> Atom {
        Atom::new(
            ProjectIdentifier::plain(root),
            Version::from_tag(tag).pair(Revision::new("aaaa")),
        )
    }

    #[test]
    fn selections_nest_and_unselections_unnest() {
        let mut trace = TreeTrace::new();
        trace.record(TraceEvent::Select {
            atom: atom("github.com/a/a", "v1.0.0"),
            pkg_only: false,
        });
        trace.record(TraceEvent::TryVersion {
            atom: atom("github.com/b/b", "v1.0.0"),
        });
        trace.record(TraceEvent::Unselect {
            atom: atom("github.com/a/a", "v1.0.0"),
        });

        let rendered = trace.render();
        let lines: Vec<&str> = rendered.lines().collect();
        assert!(lines[0].starts_with("pick "));
        assert!(lines[1].starts_with("  try "));
        assert!(lines[2].starts_with("drop "));
    }
}
