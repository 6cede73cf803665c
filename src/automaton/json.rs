//! Strategy formats of the gr1c tool.
//!
//! gr1c writes strategies as JSON (`-t json`) and reads them back in its
//! plaintext format (`-a`), both with states given as vectors in the order
//! of the declared environment variables followed by the system variables.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

use super::{Automaton, AutomatonError, NodeId, Valuation};

/// Version of the plaintext strategy format written for gr1c.
const PLAIN_FORMAT_VERSION: u32 = 1;

#[derive(Deserialize)]
struct StrategyFile {
    #[serde(rename = "ENV", default)]
    env: Vec<IndexMap<String, Value>>,
    #[serde(rename = "SYS", default)]
    sys: Vec<IndexMap<String, Value>>,
    nodes: IndexMap<String, StrategyNode>,
}

#[derive(Deserialize)]
struct StrategyNode {
    state: Vec<i64>,
    #[serde(default = "unset")]
    mode: i32,
    #[serde(default = "unset")]
    rgrad: i32,
    #[serde(default)]
    initial: Flag,
    #[serde(default)]
    trans: Vec<Key>,
}

fn unset() -> i32 {
    -1
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Int(i64),
}

impl Default for Flag {
    fn default() -> Self {
        Flag::Bool(false)
    }
}

impl Flag {
    fn is_set(&self) -> bool {
        match *self {
            Flag::Bool(b) => b,
            Flag::Int(i) => i != 0,
        }
    }
}

/// Reference to a node, given as a number or as a string.
#[derive(Deserialize)]
#[serde(untagged)]
enum Key {
    Number(u64),
    Name(String),
}

impl Key {
    fn as_string(&self) -> String {
        match self {
            Key::Number(n) => n.to_string(),
            Key::Name(s) => s.clone(),
        }
    }
}

impl Automaton {
    /// Read a strategy written by `gr1c -t json`.
    ///
    /// If every node key is an integer, the integers are kept as node ids.
    /// Otherwise nodes are numbered densely in the order they appear.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid JSON of the expected
    /// shape, a state vector has the wrong length, or a transition refers
    /// to an unknown node.
    pub fn from_gr1c_json(json: &str) -> Result<Self, AutomatonError> {
        let file: StrategyFile = serde_json::from_str(json)?;

        let mut aut = Automaton::new();
        let vars: Vec<_> = file
            .env
            .iter()
            .chain(file.sys.iter())
            .flat_map(|decl| decl.keys())
            .map(|name| aut.schema.intern(name))
            .collect();

        let numeric: Option<Vec<usize>> = file.nodes.keys().map(|k| k.parse().ok()).collect();
        let ids: BTreeMap<&str, NodeId> = match numeric {
            Some(numbers) => file
                .nodes
                .keys()
                .map(String::as_str)
                .zip(numbers.into_iter().map(NodeId))
                .collect(),
            None => file
                .nodes
                .keys()
                .enumerate()
                .map(|(i, k)| (k.as_str(), NodeId(i)))
                .collect(),
        };

        for (key, node) in &file.nodes {
            let id = ids[key.as_str()];
            if node.state.len() != vars.len() {
                return Err(AutomatonError::Format(format!(
                    "node {} has {} values for {} variables",
                    key,
                    node.state.len(),
                    vars.len()
                )));
            }
            let mut valuation = Valuation::new();
            for (&var, &value) in vars.iter().zip(&node.state) {
                valuation.set(var, value);
            }
            let successors = node
                .trans
                .iter()
                .map(|t| {
                    let name = t.as_string();
                    ids.get(name.as_str()).copied().ok_or_else(|| {
                        AutomatonError::Format(format!(
                            "node {} has a transition to unknown node {}",
                            key, name
                        ))
                    })
                })
                .collect::<Result<BTreeSet<_>, _>>()?;
            aut.insert(id, valuation, successors)
                .set_mode(node.mode)
                .set_rgrad(node.rgrad)
                .set_initial(node.initial.is_set());
        }
        Ok(aut)
    }

    /// Write the automaton in the plaintext strategy format of gr1c.
    ///
    /// States are written as vectors over `env_vars` followed by
    /// `sys_vars`.
    ///
    /// # Errors
    ///
    /// Returns an error if a node has no value for one of the variables.
    pub fn to_gr1c_plain(
        &self,
        env_vars: &[String],
        sys_vars: &[String],
    ) -> Result<String, AutomatonError> {
        let order: Vec<String> = env_vars.iter().chain(sys_vars).cloned().collect();
        let mut out = format!("{}\n", PLAIN_FORMAT_VERSION);
        for (id, node) in self.nodes() {
            let fields: Vec<String> = self
                .vector(id, &order)?
                .into_iter()
                .map(|v| v.to_string())
                .chain(Some(u8::from(node.is_initial()).to_string()))
                .chain(Some(node.mode().to_string()))
                .chain(Some(node.rgrad().to_string()))
                .chain(node.successors().map(|s| s.to_string()))
                .collect();
            // writing to a string cannot fail
            let _ = writeln!(out, "{} {}", id, fields.join(" "));
        }
        Ok(out)
    }
}
