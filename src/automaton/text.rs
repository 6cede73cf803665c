//! Line-oriented automaton formats.
//!
//! The legacy format lists one block per node:
//!
//! ```text
//! State 0 with rank # -> <x:1, y:0>
//!     With successors : 1, 2
//! ```
//!
//! Only states and transitions are represented; the `mode` and `rgrad`
//! annotations are lost when writing and default to -1 when reading.
//!
//! Linear traces of model checkers (SPIN, SMV) describe a single run as a
//! sequence of assignments. Consecutive steps with an unchanged valuation
//! are collapsed into one node.

use std::collections::BTreeSet;
use std::fmt::Write;

use log::warn;
use regex::Regex;

use super::{check_variables, Automaton, AutomatonError, NodeId, State};

/// Dialect of a linear counterexample trace.
struct TraceDialect {
    state: &'static str,
    assignment: &'static str,
    loop_marker: &'static str,
}

const SPIN: TraceDialect = TraceDialect {
    state: r"\(state (\d+)\)",
    assignment: r"^\s*((?:\w+\(\d+\):)?\w+) = (\w+)",
    loop_marker: "<<<<<START OF CYCLE>>>>>",
};

const SMV: TraceDialect = TraceDialect {
    state: r"State: \d+\.(\d+)",
    assignment: r"([\w.]+) = (\w+)",
    loop_marker: "-- Loop starts here",
};

fn regex(pattern: &str) -> Result<Regex, AutomatonError> {
    Regex::new(pattern).map_err(|e| AutomatonError::Format(e.to_string()))
}

fn parse_value(line: usize, value: &str) -> Result<i64, AutomatonError> {
    match value {
        "TRUE" | "true" => Ok(1),
        "FALSE" | "false" => Ok(0),
        _ => value.parse().map_err(|_| AutomatonError::Syntax {
            line,
            message: format!("value '{}' is not an integer", value),
        }),
    }
}

impl Automaton {
    /// Read an automaton in the legacy line format.
    ///
    /// Lines outside of node blocks, such as the synthesis log around a
    /// strategy, are ignored. If `varnames` is not empty, variables missing
    /// from it are reported as warnings.
    pub fn from_text(text: &str, varnames: &[&str]) -> Result<Self, AutomatonError> {
        let state_re = regex(r"State (\d+)")?;
        let pair_re = regex(r"(\w+):(-?\w+)")?;
        let succ_re = regex(r" (\d+)")?;

        let mut aut = Automaton::new();
        let mut current: Option<NodeId> = None;
        for (lineno, line) in text.lines().enumerate() {
            let lineno = lineno + 1;
            if line.contains("State ") {
                let id = state_re
                    .captures(line)
                    .and_then(|c| c[1].parse::<usize>().ok())
                    .ok_or_else(|| AutomatonError::Syntax {
                        line: lineno,
                        message: "missing state id".to_string(),
                    })?;
                let mut state = State::new();
                for c in pair_re.captures_iter(line) {
                    state.insert(c[1].to_string(), parse_value(lineno, &c[2])?);
                }
                check_variables(&state, varnames);
                for name in varnames {
                    if !state.contains_key(*name) {
                        warn!("Variable {} not assigned in state {}", name, id);
                    }
                }
                aut.set_state(NodeId(id), &state);
                current = Some(NodeId(id));
            }
            if line.contains("successors") {
                let id = current.ok_or_else(|| AutomatonError::Syntax {
                    line: lineno,
                    message: "successors outside of a state block".to_string(),
                })?;
                let succs: BTreeSet<NodeId> = succ_re
                    .captures_iter(line)
                    .filter_map(|c| c[1].parse().ok().map(NodeId))
                    .collect();
                aut.set_transitions(id, succs);
            }
        }
        Ok(aut)
    }

    /// Write the automaton in the legacy line format.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for (id, node) in self.nodes() {
            let pairs: Vec<String> = node
                .valuation()
                .iter()
                .map(|(var, value)| format!("{}:{}", self.schema.name(var), value))
                .collect();
            // writing to a string cannot fail
            let _ = write!(out, "State {} with rank # -> <{}>\n\t", id, pairs.join(", "));
            if node.num_successors() == 0 {
                out.push_str("With no successors.\n");
            } else {
                let succs: Vec<String> = node.successors().map(|s| s.to_string()).collect();
                let _ = writeln!(out, "With successors : {}", succs.join(", "));
            }
        }
        out
    }

    /// Read a linear SPIN counterexample trail.
    pub fn from_spin_trace(text: &str, varnames: &[&str]) -> Result<Self, AutomatonError> {
        Self::from_linear_trace(text, &SPIN, varnames)
    }

    /// Read a linear NuSMV counterexample trace.
    pub fn from_smv_trace(text: &str, varnames: &[&str]) -> Result<Self, AutomatonError> {
        Self::from_linear_trace(text, &SMV, varnames)
    }

    fn from_linear_trace(
        text: &str,
        dialect: &TraceDialect,
        varnames: &[&str],
    ) -> Result<Self, AutomatonError> {
        let state_re = regex(dialect.state)?;
        let assign_re = regex(dialect.assignment)?;

        // valuation at the end of every step of the run
        let mut steps: Vec<State> = Vec::new();
        let mut valuation = State::new();
        let mut in_step = false;
        let mut loop_step = None;
        for (lineno, line) in text.lines().enumerate() {
            if state_re.is_match(line) {
                if in_step {
                    steps.push(valuation.clone());
                }
                in_step = true;
            } else if line.contains(dialect.loop_marker) {
                loop_step = Some(steps.len() + usize::from(in_step));
            } else if let Some(c) = assign_re.captures(line) {
                let name = c[1].to_string();
                if !varnames.is_empty() && !varnames.contains(&name.as_str()) {
                    warn!("Unknown variable {}", name);
                }
                valuation.insert(name, parse_value(lineno + 1, &c[2])?);
            }
        }
        if in_step {
            steps.push(valuation);
        }

        let mut aut = Automaton::new();
        let mut node_of_step = Vec::with_capacity(steps.len());
        for (i, step) in steps.iter().enumerate() {
            if i > 0 && *step == steps[i - 1] {
                let id = node_of_step[i - 1];
                node_of_step.push(id);
                continue;
            }
            let id = NodeId(aut.len());
            if let Some(&prev) = node_of_step.last() {
                aut.set_transitions(prev, Some(id));
            }
            aut.add_node(id, step, None);
            node_of_step.push(id);
        }
        if let (Some(&last), Some(&target)) = (
            node_of_step.last(),
            loop_step.and_then(|step| node_of_step.get(step)),
        ) {
            aut.set_transitions(last, Some(target));
        }
        Ok(aut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REFERENCE_AUTFILE: &str = "
smv file: robot_simple.smv
spc file: robot_simple.spc
priority kind: 3
Specification is realizable...
==== Building an implementation =========
-----------------------------------------
State 0 with rank 0 -> <park:1, cellID:0, X0reach:0>
	With successors : 1, 2
State 1 with rank 1 -> <park:0, cellID:0, X0reach:0>
	With successors : 3, 4
State 2 with rank 1 -> <park:1, cellID:0, X0reach:0>
	With successors : 3, 4
State 3 with rank 1 -> <park:0, cellID:1, X0reach:0>
	With successors : 5, 6
State 4 with rank 1 -> <park:1, cellID:1, X0reach:0>
	With successors : 5, 6
State 5 with rank 1 -> <park:0, cellID:4, X0reach:0>
	With successors : 7, 6
State 6 with rank 1 -> <park:1, cellID:4, X0reach:0>
	With successors : 7, 6
State 7 with rank 1 -> <park:0, cellID:3, X0reach:0>
	With successors : 8, 9
State 8 with rank 1 -> <park:0, cellID:4, X0reach:1>
	With successors : 15, 16
State 9 with rank 1 -> <park:1, cellID:4, X0reach:1>
	With successors : 10, 11
State 10 with rank 0 -> <park:0, cellID:4, X0reach:0>
	With successors : 12, 13
State 11 with rank 0 -> <park:1, cellID:4, X0reach:0>
	With successors : 12, 13
State 12 with rank 0 -> <park:0, cellID:1, X0reach:0>
	With successors : 14, 0
State 13 with rank 0 -> <park:1, cellID:1, X0reach:0>
	With successors : 14, 0
State 14 with rank 0 -> <park:0, cellID:0, X0reach:0>
	With successors : 1, 2, 1, 2
State 15 with rank 0 -> <park:0, cellID:4, X0reach:1>
	With successors : 17, 18
State 16 with rank 0 -> <park:1, cellID:4, X0reach:1>
	With successors : 12, 13
State 17 with rank 0 -> <park:0, cellID:1, X0reach:1>
	With successors : 19, 20
State 18 with rank 0 -> <park:1, cellID:1, X0reach:1>
	With successors : 14, 0
State 19 with rank 0 -> <park:0, cellID:0, X0reach:1>
	With successors : 21, 22
State 20 with rank 0 -> <park:1, cellID:0, X0reach:1>
	With successors : 1, 2
State 21 with rank 1 -> <park:0, cellID:0, X0reach:1>
	With successors : 19, 20
State 22 with rank 1 -> <park:1, cellID:0, X0reach:1>
	With successors : 14, 0
-----------------------------------------
Games time: 12
Checking realizability time: 14
Strategy time: 240
";

    fn state(pairs: &[(&str, i64)]) -> State {
        pairs.iter().map(|&(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn test_load_reference() {
        let aut = Automaton::from_text(REFERENCE_AUTFILE, &["park", "cellID", "X0reach"]).unwrap();
        assert_eq!(aut.len(), 23);
        assert_eq!(
            aut.state(NodeId(8)),
            Some(state(&[("park", 0), ("cellID", 4), ("X0reach", 1)]))
        );
        // duplicate successors are merged
        assert_eq!(
            aut.successors(NodeId(14)).collect::<Vec<_>>(),
            vec![NodeId(1), NodeId(2)]
        );
        assert!(aut.validate().is_ok());
        assert_eq!(aut.node(NodeId(0)).map(|n| n.mode()), Some(-1));
    }

    #[test]
    fn test_text_roundtrip() {
        let aut = Automaton::from_text(REFERENCE_AUTFILE, &[]).unwrap();
        let again = Automaton::from_text(&aut.to_text(), &[]).unwrap();
        assert_eq!(aut, again);
    }

    #[test]
    fn test_no_successors() {
        let mut aut = Automaton::new();
        aut.add_node(NodeId(0), &state(&[("x", 1)]), Vec::new());
        let text = aut.to_text();
        assert_eq!(text, "State 0 with rank # -> <x:1>\n\tWith no successors.\n");
        assert_eq!(Automaton::from_text(&text, &[]).unwrap(), aut);
    }

    #[test]
    fn test_negative_values() {
        // e.g. a range variable over [-1, 2]
        let mut aut = Automaton::new();
        aut.add_node(NodeId(0), &state(&[("x", -1), ("y", 2)]), vec![NodeId(0)]);
        let text = aut.to_text();
        assert!(text.starts_with("State 0 with rank # -> <x:-1, y:2>"));
        let again = Automaton::from_text(&text, &["x", "y"]).unwrap();
        assert_eq!(again.state(NodeId(0)), Some(state(&[("x", -1), ("y", 2)])));
        assert_eq!(again, aut);
    }

    #[test]
    fn test_bad_value() {
        let result = Automaton::from_text("State 0 with rank 0 -> <x:abc>\n", &[]);
        assert!(matches!(result, Err(AutomatonError::Syntax { line: 1, .. })));
        let result = Automaton::from_text("State 0 with rank 0 -> <y:1, x:-abc>\n", &[]);
        assert!(matches!(result, Err(AutomatonError::Syntax { line: 1, .. })));
    }

    #[test]
    fn test_smv_trace_collapses_repeats() {
        let trace = "\
-> State: 1.1 <-
  x = 0
  y = 0
-> State: 1.2 <-
  x = 1
-> State: 1.3 <-
-- Loop starts here
-> State: 1.4 <-
  y = 1
-> State: 1.5 <-
  x = 0
";
        let aut = Automaton::from_smv_trace(trace, &["x", "y"]).unwrap();
        assert_eq!(aut.len(), 4);
        assert_eq!(aut.state(NodeId(0)), Some(state(&[("x", 0), ("y", 0)])));
        assert_eq!(aut.state(NodeId(1)), Some(state(&[("x", 1), ("y", 0)])));
        assert_eq!(aut.state(NodeId(2)), Some(state(&[("x", 1), ("y", 1)])));
        assert_eq!(aut.state(NodeId(3)), Some(state(&[("x", 0), ("y", 1)])));
        assert_eq!(aut.successors(NodeId(1)).collect::<Vec<_>>(), vec![NodeId(2)]);
        assert_eq!(aut.successors(NodeId(3)).collect::<Vec<_>>(), vec![NodeId(2)]);
    }

    #[test]
    fn test_spin_trace_without_loop_is_terminal() {
        let trace = "\
(state 1)
\tx = 1
(state 2)
\tx = 2
(state 3)
";
        let aut = Automaton::from_spin_trace(trace, &[]).unwrap();
        assert_eq!(aut.len(), 2);
        assert_eq!(aut.successors(NodeId(0)).collect::<Vec<_>>(), vec![NodeId(1)]);
        assert_eq!(aut.successors(NodeId(1)).count(), 0);
        assert_eq!(aut.state(NodeId(1)), Some(state(&[("x", 2)])));
    }
}
