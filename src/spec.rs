//! GR(1) specifications.
//!
//! A [`GrSpec`] describes a game of the form
//!
//! ```text
//! (env_init & []env_safety & []<>env_prog) -> (sys_init & []sys_safety & []<>sys_prog)
//! ```
//!
//! Formulas are kept as text in the syntax of gr1c, where the next-state
//! value of a variable `x` is written `x'`. Each of the six slots is a list
//! of conjuncts, and an empty list stands for `True`.

use std::collections::BTreeMap;
use std::fmt;

use indexmap::IndexMap;
use log::debug;
use regex::{NoExpand, Regex};

use crate::automaton::State;
use crate::gridworld::{GridWorld, GridWorldError, SpecOptions};
use crate::partition::{PropPreservingPartition, Region};

/// Rounds of symbol substitution after which a substitution is assumed to
/// feed itself.
const MAX_SUBSTITUTION_ROUNDS: usize = 64;

/// Errors raised while building or encoding a specification.
#[derive(Debug, thiserror::Error)]
pub enum SpecError {
    #[error("state has no value for variable '{0}'")]
    MissingVariable(String),
    #[error("reachability games admit at most one system goal, found {0}")]
    TooManyReachGoals(usize),
    #[error("substitution of '{0}' does not reach a fixpoint")]
    SubstitutionDiverged(String),
    #[error("invalid substitution pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error("malformed partition: {0}")]
    MalformedPartition(String),
}

/// Domain of a game variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    Boolean,
    /// Integers from the first to the second bound, inclusive.
    Range(i64, i64),
}

impl Default for Domain {
    fn default() -> Self {
        Self::Boolean
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Domain::Boolean => write!(f, "boolean"),
            Domain::Range(lo, hi) => write!(f, "[{},{}]", lo, hi),
        }
    }
}

/// Conversion of a formula or list of formulas into a list of conjuncts.
///
/// A single empty or blank formula becomes the empty list.
pub trait IntoConjuncts {
    fn into_conjuncts(self) -> Vec<String>;
}

impl IntoConjuncts for &str {
    fn into_conjuncts(self) -> Vec<String> {
        if self.trim().is_empty() {
            Vec::new()
        } else {
            vec![self.to_string()]
        }
    }
}

impl IntoConjuncts for String {
    fn into_conjuncts(self) -> Vec<String> {
        if self.trim().is_empty() {
            Vec::new()
        } else {
            vec![self]
        }
    }
}

impl IntoConjuncts for Vec<String> {
    fn into_conjuncts(self) -> Vec<String> {
        self
    }
}

impl IntoConjuncts for Vec<&str> {
    fn into_conjuncts(self) -> Vec<String> {
        self.into_iter().map(str::to_string).collect()
    }
}

impl IntoConjuncts for &[&str] {
    fn into_conjuncts(self) -> Vec<String> {
        self.iter().map(|s| s.to_string()).collect()
    }
}

/// A GR(1) specification over environment and system variables.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GrSpec {
    pub env_vars: IndexMap<String, Domain>,
    pub sys_vars: IndexMap<String, Domain>,
    pub env_init: Vec<String>,
    pub env_safety: Vec<String>,
    pub env_prog: Vec<String>,
    pub sys_init: Vec<String>,
    pub sys_safety: Vec<String>,
    pub sys_prog: Vec<String>,
}

impl GrSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add environment variables, all with the given domain.
    pub fn with_env_vars<'a, I>(mut self, names: I, domain: Domain) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        for name in names {
            self.env_vars.insert(name.to_string(), domain);
        }
        self
    }

    /// Add system variables, all with the given domain.
    pub fn with_sys_vars<'a, I>(mut self, names: I, domain: Domain) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        for name in names {
            self.sys_vars.insert(name.to_string(), domain);
        }
        self
    }

    pub fn with_env_init(mut self, formulas: impl IntoConjuncts) -> Self {
        self.env_init = formulas.into_conjuncts();
        self
    }

    pub fn with_env_safety(mut self, formulas: impl IntoConjuncts) -> Self {
        self.env_safety = formulas.into_conjuncts();
        self
    }

    pub fn with_env_prog(mut self, formulas: impl IntoConjuncts) -> Self {
        self.env_prog = formulas.into_conjuncts();
        self
    }

    pub fn with_sys_init(mut self, formulas: impl IntoConjuncts) -> Self {
        self.sys_init = formulas.into_conjuncts();
        self
    }

    pub fn with_sys_safety(mut self, formulas: impl IntoConjuncts) -> Self {
        self.sys_safety = formulas.into_conjuncts();
        self
    }

    pub fn with_sys_prog(mut self, formulas: impl IntoConjuncts) -> Self {
        self.sys_prog = formulas.into_conjuncts();
        self
    }

    pub fn env_var_names(&self) -> Vec<String> {
        self.env_vars.keys().cloned().collect()
    }

    pub fn sys_var_names(&self) -> Vec<String> {
        self.sys_vars.keys().cloned().collect()
    }

    fn slots_mut(&mut self) -> [&mut Vec<String>; 6] {
        [
            &mut self.env_init,
            &mut self.sys_init,
            &mut self.env_safety,
            &mut self.sys_safety,
            &mut self.env_prog,
            &mut self.sys_prog,
        ]
    }

    /// Merge another specification into this one.
    ///
    /// Variables already declared keep their domain, and the conjuncts of
    /// every slot are appended.
    pub fn merge(&mut self, other: GrSpec) {
        for (name, domain) in other.env_vars {
            self.env_vars.entry(name).or_insert(domain);
        }
        for (name, domain) in other.sys_vars {
            self.sys_vars.entry(name).or_insert(domain);
        }
        self.env_init.extend(other.env_init);
        self.env_safety.extend(other.env_safety);
        self.env_prog.extend(other.env_prog);
        self.sys_init.extend(other.sys_init);
        self.sys_safety.extend(other.sys_safety);
        self.sys_prog.extend(other.sys_prog);
    }

    /// Append the specification describing a gridworld.
    ///
    /// # Errors
    ///
    /// Returns an error if an initial or goal cell of the world is out of
    /// bounds.
    pub fn import_gridworld(
        &mut self,
        world: &GridWorld,
        options: &SpecOptions,
    ) -> Result<(), GridWorldError> {
        self.merge(world.spec(options)?);
        Ok(())
    }

    /// Append the discrete abstraction of a continuous system.
    ///
    /// Every region `i` of the partition becomes a boolean system variable
    /// `<cell_prefix>_i`. Proposition symbols declared as system variables
    /// are removed and replaced in every formula by the disjunction of the
    /// cells in which they hold. The transition matrix of the partition is
    /// added as system safety, together with the mutual exclusion of the
    /// cell variables in the initial and in every next state.
    ///
    /// Returns the regions keyed by their new variable name.
    ///
    /// # Errors
    ///
    /// Returns an error if the transition matrix does not match the number
    /// of regions, or if a substitution does not terminate.
    pub fn import_disc_dynamics(
        &mut self,
        partition: &PropPreservingPartition,
        cell_prefix: &str,
    ) -> Result<BTreeMap<String, Region>, SpecError> {
        let num_regions = partition.num_regions();
        if num_regions == 0 {
            return Ok(BTreeMap::new());
        }
        if partition.trans.len() != num_regions
            || partition.trans.iter().any(|row| row.len() != num_regions)
        {
            return Err(SpecError::MalformedPartition(format!(
                "transition matrix is not {0}x{0}",
                num_regions
            )));
        }

        let cell = |i: usize| format!("{}_{}", cell_prefix, i);
        let mut cells = BTreeMap::new();
        for (i, region) in partition.regions.iter().enumerate() {
            cells.insert(cell(i), region.clone());
            self.sys_vars.entry(cell(i)).or_insert(Domain::Boolean);
        }
        for symbol in &partition.prop_symbols {
            self.sys_vars.shift_remove(symbol);
        }

        for (k, symbol) in partition.prop_symbols.iter().enumerate() {
            let holds: Vec<usize> = partition
                .regions
                .iter()
                .enumerate()
                .filter(|(_, r)| r.props.get(k).map_or(false, |&p| p != 0))
                .map(|(i, _)| i)
                .collect();
            let (now, next) = if holds.is_empty() {
                ("False".to_string(), "False".to_string())
            } else {
                let now: Vec<String> = holds.iter().map(|&i| cell(i)).collect();
                let next: Vec<String> = holds.iter().map(|&i| format!("{}'", cell(i))).collect();
                (now.join(" | "), next.join(" | "))
            };
            self.symbol_substitute(&[(format!("{}'", symbol), next)])?;
            self.symbol_substitute(&[(symbol.clone(), now)])?;
        }

        for from in 0..num_regions {
            let to: Vec<String> = (0..num_regions)
                .filter(|&to| partition.trans[to][from] != 0)
                .map(|to| format!("{}'", cell(to)))
                .collect();
            if to.is_empty() {
                self.sys_safety.push(format!("{} -> False", cell(from)));
            } else {
                self.sys_safety
                    .push(format!("{} -> ({})", cell(from), to.join(" | ")));
            }
        }

        let mut init = Vec::with_capacity(num_regions);
        let mut safety = Vec::with_capacity(num_regions);
        for i in 0..num_regions {
            let others: Vec<usize> = (0..num_regions).filter(|&j| j != i).collect();
            let mut now = format!("({}", cell(i));
            let mut next = format!("({}'", cell(i));
            if !others.is_empty() {
                let negated: Vec<String> = others.iter().map(|&j| format!("(!{})", cell(j))).collect();
                let negated_next: Vec<String> =
                    others.iter().map(|&j| format!("(!{}')", cell(j))).collect();
                now.push_str(&format!(" & {}", negated.join(" & ")));
                next.push_str(&format!(" & {}", negated_next.join(" & ")));
            }
            now.push(')');
            next.push(')');
            init.push(now);
            safety.push(next);
        }
        self.sys_init.push(init.join("\n| "));
        self.sys_safety.push(safety.join("\n| "));

        debug!(
            "Imported {} cells, {} system variables",
            num_regions,
            self.sys_vars.len()
        );
        Ok(cells)
    }

    /// Replace proposition symbols by formulas in all six slots.
    ///
    /// Symbols are matched as whole words; a symbol ending in `'` is
    /// matched regardless of what follows. Every replacement is wrapped in
    /// parentheses. Substitution is repeated until no symbol occurs any
    /// more, since a replacement may contain another symbol.
    ///
    /// # Errors
    ///
    /// Returns an error if substitution does not reach a fixpoint, e.g.
    /// because a replacement contains its own symbol.
    pub fn symbol_substitute(&mut self, props: &[(String, String)]) -> Result<(), SpecError> {
        let patterns = props
            .iter()
            .map(|(symbol, formula)| {
                let mut pattern = format!(r"\b{}", regex::escape(symbol));
                if !symbol.ends_with('\'') {
                    pattern.push_str(r"\b");
                }
                Ok((symbol, Regex::new(&pattern)?, format!("({})", formula)))
            })
            .collect::<Result<Vec<_>, regex::Error>>()?;

        for _ in 0..MAX_SUBSTITUTION_ROUNDS {
            let mut found = false;
            for (_, regex, replacement) in &patterns {
                for slot in self.slots_mut() {
                    for conjunct in slot.iter_mut() {
                        if regex.is_match(conjunct) {
                            *conjunct = regex
                                .replace_all(conjunct, NoExpand(replacement))
                                .into_owned();
                            found = true;
                        }
                    }
                }
            }
            if !found {
                return Ok(());
            }
        }
        let symbol = patterns
            .first()
            .map(|(s, _, _)| s.to_string())
            .unwrap_or_default();
        Err(SpecError::SubstitutionDiverged(symbol))
    }

    fn declarations(vars: &IndexMap<String, Domain>) -> String {
        vars.iter()
            .map(|(name, domain)| match domain {
                Domain::Boolean => format!(" {}", name),
                Domain::Range(lo, hi) => format!(" {} [{},{}]", name, lo, hi),
            })
            .collect()
    }

    fn section(label: &str, conjuncts: &[String], wrap: impl Fn(&str) -> String) -> String {
        if conjuncts.is_empty() {
            format!("{}:;\n", label)
        } else {
            let parts: Vec<String> = conjuncts.iter().map(|s| wrap(s)).collect();
            format!("{}: {};\n", label, parts.join("\n& "))
        }
    }

    fn to_gr1c_with(&self, sys_goal: String) -> String {
        let mut out = format!(
            "ENV:{};\nSYS:{};\n\n",
            Self::declarations(&self.env_vars),
            Self::declarations(&self.sys_vars)
        );
        out += &Self::section("ENVINIT", &self.env_init, |s| format!("({})", s));
        out += &Self::section("ENVTRANS", &self.env_safety, |s| format!("[]({})", s));
        out += &Self::section("ENVGOAL", &self.env_prog, |s| format!("[]<>({})", s));
        out.push('\n');
        out += &Self::section("SYSINIT", &self.sys_init, |s| format!("({})", s));
        out += &Self::section("SYSTRANS", &self.sys_safety, |s| format!("[]({})", s));
        out += &sys_goal;
        out
    }

    /// Write the specification in the input syntax of gr1c.
    pub fn to_gr1c(&self) -> String {
        let goal = Self::section("SYSGOAL", &self.sys_prog, |s| format!("[]<>({})", s));
        self.to_gr1c_with(goal)
    }

    /// Write the specification as a reachability game for `gr1c rg`.
    ///
    /// # Errors
    ///
    /// Returns an error if there is more than one system goal.
    pub fn to_gr1c_reachability(&self) -> Result<String, SpecError> {
        if self.sys_prog.len() > 1 {
            return Err(SpecError::TooManyReachGoals(self.sys_prog.len()));
        }
        let goal = Self::section("SYSGOAL", &self.sys_prog, |s| format!("<>({})", s));
        Ok(self.to_gr1c_with(goal))
    }

    /// Write the specification as the assumption and guarantee formulas
    /// of a JTLV game.
    pub fn to_jtlv(&self) -> (String, String) {
        fn append(out: &mut String, comment: &str, conjuncts: &[String], wrap: &dyn Fn(&str) -> String) {
            let mut described = false;
            for conjunct in conjuncts.iter().filter(|c| !c.is_empty()) {
                if !out.is_empty() {
                    out.push_str(" & \n");
                }
                if !described {
                    out.push_str(comment);
                    out.push('\n');
                    described = true;
                }
                out.push('\t');
                out.push_str(&wrap(conjunct));
            }
        }
        let plain = |s: &str| s.to_string();
        let always = |s: &str| format!("[]({})", s);
        let eventually = |s: &str| format!("[]<>({})", s);

        let mut assumption = String::new();
        append(&mut assumption, "-- valid initial env states", &self.env_init, &plain);
        append(&mut assumption, "-- safety assumption on environment", &self.env_safety, &always);
        append(&mut assumption, "-- justice assumption on environment", &self.env_prog, &eventually);
        let mut guarantee = String::new();
        append(&mut guarantee, "-- valid initial system states", &self.sys_init, &plain);
        append(&mut guarantee, "-- safety requirement on system", &self.sys_safety, &always);
        append(&mut guarantee, "-- progress requirement on system", &self.sys_prog, &eventually);
        (assumption, guarantee)
    }

    fn vector<'a, I>(names: I, state: &State) -> Result<Vec<i64>, SpecError>
    where
        I: Iterator<Item = &'a String>,
    {
        names
            .map(|name| {
                state
                    .get(name)
                    .copied()
                    .ok_or_else(|| SpecError::MissingVariable(name.clone()))
            })
            .collect()
    }

    /// Positional encoding of a state: environment variables followed by
    /// system variables, in declaration order.
    ///
    /// # Errors
    ///
    /// Returns an error if the state lacks one of the variables.
    pub fn state_vector(&self, state: &State) -> Result<Vec<i64>, SpecError> {
        Self::vector(self.env_vars.keys().chain(self.sys_vars.keys()), state)
    }

    /// Positional encoding of the environment part of a state.
    ///
    /// # Errors
    ///
    /// Returns an error if the state lacks one of the variables.
    pub fn env_vector(&self, state: &State) -> Result<Vec<i64>, SpecError> {
        Self::vector(self.env_vars.keys(), state)
    }

    /// Positional encoding of the system part of a state.
    ///
    /// # Errors
    ///
    /// Returns an error if the state lacks one of the variables.
    pub fn sys_vector(&self, state: &State) -> Result<Vec<i64>, SpecError> {
        Self::vector(self.sys_vars.keys(), state)
    }
}

impl fmt::Display for GrSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_gr1c())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::Polytope;

    /// The three-state reference game.
    fn reference() -> GrSpec {
        GrSpec::new()
            .with_env_vars(vec!["x"], Domain::Boolean)
            .with_sys_vars(vec!["y"], Domain::Boolean)
            .with_env_init("x")
            .with_env_prog("x")
            .with_sys_init("y")
            .with_sys_prog(vec!["y & x", "!y"])
    }

    #[test]
    fn test_conjunct_normalization() {
        let spec = GrSpec::new()
            .with_env_init("")
            .with_env_safety("  ")
            .with_sys_init("a")
            .with_sys_safety(vec!["a -> b'", "b"]);
        assert!(spec.env_init.is_empty());
        assert!(spec.env_safety.is_empty());
        assert_eq!(spec.sys_init, vec!["a"]);
        assert_eq!(spec.sys_safety.len(), 2);
    }

    #[test]
    fn test_dump_gr1c() {
        let expected = "ENV: x;\nSYS: y;\n\n\
                        ENVINIT: (x);\nENVTRANS:;\nENVGOAL: []<>(x);\n\n\
                        SYSINIT: (y);\nSYSTRANS:;\nSYSGOAL: []<>(y & x)\n& []<>(!y);\n";
        assert_eq!(reference().to_gr1c(), expected);
    }

    #[test]
    fn test_dump_domains_and_empty() {
        let spec = GrSpec::new()
            .with_sys_vars(vec!["Y_r"], Domain::Range(0, 3))
            .with_sys_vars(vec!["park"], Domain::Boolean);
        assert_eq!(
            spec.to_gr1c(),
            "ENV:;\nSYS: Y_r [0,3] park;\n\nENVINIT:;\nENVTRANS:;\nENVGOAL:;\n\n\
             SYSINIT:;\nSYSTRANS:;\nSYSGOAL:;\n"
        );
    }

    #[test]
    fn test_dump_reachability() {
        assert!(matches!(
            reference().to_gr1c_reachability(),
            Err(SpecError::TooManyReachGoals(2))
        ));
        let single = reference().with_sys_prog("y");
        assert!(single
            .to_gr1c_reachability()
            .unwrap()
            .ends_with("SYSGOAL: <>(y);\n"));
    }

    #[test]
    fn test_dump_jtlv() {
        let spec = reference().with_sys_safety(vec!["y -> !y'"]);
        let (assumption, guarantee) = spec.to_jtlv();
        assert_eq!(
            assumption,
            "-- valid initial env states\n\tx & \n-- justice assumption on environment\n\t[]<>(x)"
        );
        assert_eq!(
            guarantee,
            "-- valid initial system states\n\ty & \n\
             -- safety requirement on system\n\t[](y -> !y') & \n\
             -- progress requirement on system\n\t[]<>(y & x) & \n\t[]<>(!y)"
        );
    }

    #[test]
    fn test_substitution_word_boundaries() {
        let mut spec = GrSpec::new()
            .with_sys_safety(vec!["park -> parking'", "park' | X_park"])
            .with_env_prog("park");
        spec.symbol_substitute(&[("park".to_string(), "a | b".to_string())])
            .unwrap();
        assert_eq!(spec.sys_safety[0], "(a | b) -> parking'");
        // the unprimed pattern also matches the primed occurrence
        assert_eq!(spec.sys_safety[1], "(a | b)' | X_park");
        assert_eq!(spec.env_prog, vec!["(a | b)"]);
    }

    #[test]
    fn test_substitution_fixpoint() {
        let mut spec = GrSpec::new().with_sys_init("p & q'");
        spec.symbol_substitute(&[
            ("p".to_string(), "q".to_string()),
            ("q".to_string(), "r".to_string()),
            ("q'".to_string(), "s'".to_string()),
        ])
        .unwrap();
        // `q` is substituted first and also rewrites `q'`
        assert_eq!(spec.sys_init, vec!["((r)) & (r)'"]);

        let mut looping = GrSpec::new().with_sys_init("p");
        assert!(matches!(
            looping.symbol_substitute(&[("p".to_string(), "p | q".to_string())]),
            Err(SpecError::SubstitutionDiverged(_))
        ));
    }

    #[test]
    fn test_import_disc_dynamics() {
        let region = |name: &str, props: Vec<u8>| {
            Region::new(name, vec![Polytope::from_box(&[0.0], &[1.0])], props)
        };
        let partition = PropPreservingPartition {
            regions: vec![region("R_0", vec![1, 0]), region("R_1", vec![0, 0]), region("R_2", vec![1, 0])],
            prop_symbols: vec!["home".to_string(), "lot".to_string()],
            trans: vec![vec![1, 1, 0], vec![1, 1, 1], vec![0, 1, 0]],
            ..Default::default()
        };
        let mut spec = GrSpec::new()
            .with_sys_vars(vec!["home", "park"], Domain::Boolean)
            .with_sys_safety(vec!["home' -> park"])
            .with_sys_prog(vec!["home", "lot"]);
        let cells = spec.import_disc_dynamics(&partition, "cellID").unwrap();

        assert_eq!(cells.len(), 3);
        assert_eq!(cells["cellID_2"].name, "R_2");
        assert_eq!(
            spec.sys_var_names(),
            vec!["park", "cellID_0", "cellID_1", "cellID_2"]
        );
        assert_eq!(spec.sys_safety[0], "(cellID_0' | cellID_2') -> park");
        assert_eq!(spec.sys_prog, vec!["(cellID_0 | cellID_2)", "(False)"]);
        assert_eq!(spec.sys_safety[1], "cellID_0 -> (cellID_0' | cellID_1')");
        assert_eq!(
            spec.sys_safety[2],
            "cellID_1 -> (cellID_0' | cellID_1' | cellID_2')"
        );
        assert_eq!(spec.sys_safety[3], "cellID_2 -> (cellID_1')");
        assert_eq!(
            spec.sys_init[0],
            "(cellID_0 & (!cellID_1) & (!cellID_2))\n\
             | (cellID_1 & (!cellID_0) & (!cellID_2))\n\
             | (cellID_2 & (!cellID_0) & (!cellID_1))"
        );
        assert!(spec.sys_safety[4].starts_with("(cellID_0' & (!cellID_1') & (!cellID_2'))\n| "));
    }

    #[test]
    fn test_import_disc_dynamics_errors() {
        let mut spec = GrSpec::new();
        assert!(spec
            .import_disc_dynamics(&PropPreservingPartition::default(), "c")
            .unwrap()
            .is_empty());
        let partition = PropPreservingPartition {
            regions: vec![Region::new("R", Vec::new(), Vec::new())],
            ..Default::default()
        };
        assert!(matches!(
            spec.import_disc_dynamics(&partition, "c"),
            Err(SpecError::MalformedPartition(_))
        ));
    }

    #[test]
    fn test_state_vectors() {
        let spec = reference();
        let state: State = vec![("y".to_string(), 0), ("x".to_string(), 1)]
            .into_iter()
            .collect();
        assert_eq!(spec.state_vector(&state).unwrap(), vec![1, 0]);
        assert_eq!(spec.env_vector(&state).unwrap(), vec![1]);
        assert_eq!(spec.sys_vector(&state).unwrap(), vec![0]);
        let partial: State = vec![("x".to_string(), 1)].into_iter().collect();
        assert!(matches!(
            spec.state_vector(&partial),
            Err(SpecError::MissingVariable(name)) if name == "y"
        ));
    }

    #[test]
    fn test_merge_skips_duplicates() {
        let mut spec = reference();
        let other = GrSpec::new()
            .with_sys_vars(vec!["y", "z"], Domain::Range(0, 2))
            .with_sys_prog("z = 1");
        spec.merge(other);
        assert_eq!(spec.sys_vars["y"], Domain::Boolean);
        assert_eq!(spec.sys_vars["z"], Domain::Range(0, 2));
        assert_eq!(spec.sys_prog.len(), 3);
    }
}
