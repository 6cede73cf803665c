//! Interactive sessions with gr1c.
//!
//! `gr1c -i <specfile>` reads one command per line and answers with one
//! line, or with a list of state vectors terminated by a `---` line. Each
//! answer may be preceded by the prompt of the tool. gr1c must be built
//! without GNU Readline, which would echo the commands.

use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use log::{debug, trace};

use super::{EngineError, Gr1cConfig};
use crate::automaton::State;
use crate::spec::SpecError;

pub const DEFAULT_PROMPT: &str = ">>> ";

/// A running interactive session.
///
/// Requests and responses are matched by order, so a session must not be
/// shared between callers. A session should be ended with
/// [`close`](Gr1cSession::close); dropping an open session kills the process.
pub struct Gr1cSession<W: Write, R: BufRead> {
    io: Option<(W, R)>,
    child: Option<Child>,
    config: Gr1cConfig,
    spec_file: Option<PathBuf>,
    env_vars: Vec<String>,
    sys_vars: Vec<String>,
    prompt: String,
}

pub type ProcessSession = Gr1cSession<ChildStdin, BufReader<ChildStdout>>;

impl Gr1cSession<ChildStdin, BufReader<ChildStdout>> {
    /// Start gr1c on a specification file.
    ///
    /// The variable lists fix the order of values in the state vectors
    /// exchanged with the process.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be started.
    pub fn spawn(
        config: &Gr1cConfig,
        spec_file: impl Into<PathBuf>,
        env_vars: Vec<String>,
        sys_vars: Vec<String>,
    ) -> Result<Self, EngineError> {
        let spec_file = spec_file.into();
        let (child, io) = Self::start(config, &spec_file)?;
        Ok(Self {
            io: Some(io),
            child: Some(child),
            config: config.clone(),
            spec_file: Some(spec_file),
            env_vars,
            sys_vars,
            prompt: DEFAULT_PROMPT.to_string(),
        })
    }

    fn start(
        config: &Gr1cConfig,
        spec_file: &Path,
    ) -> Result<(Child, (ChildStdin, BufReader<ChildStdout>)), EngineError> {
        let mut child = Command::new(&config.program)
            .args(&config.args)
            .arg("-i")
            .arg(spec_file)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;
        debug!("Started interactive gr1c on {}", spec_file.display());
        let stdin = child.stdin.take().ok_or(EngineError::NoProcess)?;
        let stdout = child.stdout.take().ok_or(EngineError::NoProcess)?;
        Ok((child, (stdin, BufReader::new(stdout))))
    }

    /// Quit the running process and start again, on `spec_file` if
    /// given and on the previous file otherwise.
    ///
    /// Returns `false` if the old process did not exit cleanly, in which
    /// case no new process is started.
    ///
    /// # Errors
    ///
    /// Returns an error if the new process cannot be started.
    pub fn reset(&mut self, spec_file: Option<PathBuf>) -> Result<bool, EngineError> {
        if self.child.is_some() && !self.close()? {
            self.spec_file = None;
            return Ok(false);
        }
        if let Some(file) = spec_file {
            self.spec_file = Some(file);
        }
        if let Some(file) = &self.spec_file {
            let (child, io) = Self::start(&self.config, file)?;
            self.child = Some(child);
            self.io = Some(io);
        }
        Ok(true)
    }
}

impl<W: Write, R: BufRead> Gr1cSession<W, R> {
    /// Run a session over the given streams instead of a process.
    pub fn from_streams(writer: W, reader: R, env_vars: Vec<String>, sys_vars: Vec<String>) -> Self {
        Self {
            io: Some((writer, reader)),
            child: None,
            config: Gr1cConfig::default(),
            spec_file: None,
            env_vars,
            sys_vars,
            prompt: DEFAULT_PROMPT.to_string(),
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn spec_file(&self) -> Option<&Path> {
        self.spec_file.as_deref()
    }

    pub fn is_open(&self) -> bool {
        self.io.is_some()
    }

    fn send(&mut self, command: &str) -> Result<(), EngineError> {
        let (writer, _) = self.io.as_mut().ok_or(EngineError::NoProcess)?;
        trace!("gr1c <- {}", command);
        writeln!(writer, "{}", command)?;
        writer.flush()?;
        Ok(())
    }

    /// Read one response line with the prompt and line break removed.
    fn receive(&mut self) -> Result<String, EngineError> {
        let (_, reader) = self.io.as_mut().ok_or(EngineError::NoProcess)?;
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            return Err(EngineError::Protocol("unexpected end of output".to_string()));
        }
        trace!("gr1c -> {}", line.trim_end());
        let line = line.trim_end_matches(&['\r', '\n'][..]);
        let line = if self.prompt.is_empty() {
            line
        } else {
            line.strip_prefix(self.prompt.as_str()).unwrap_or(line)
        };
        Ok(line.to_string())
    }

    fn parse_values(line: &str) -> Result<Vec<i64>, EngineError> {
        line.split_whitespace()
            .map(|s| {
                s.parse()
                    .map_err(|_| EngineError::Protocol(format!("not a number: '{}'", s)))
            })
            .collect()
    }

    /// Read a `---` terminated list of moves over the given variables.
    ///
    /// The whole list is consumed even if a line is malformed, so that the
    /// next command reads its own response. The first error is returned.
    fn receive_moves(&mut self, vars: &[String]) -> Result<Vec<State>, EngineError> {
        let mut moves = Vec::new();
        let mut error = None;
        loop {
            let line = self.receive()?;
            if line.contains("---") {
                return match error {
                    Some(e) => Err(e),
                    None => Ok(moves),
                };
            }
            if error.is_some() {
                continue;
            }
            match Self::parse_values(&line) {
                Ok(values) if values.len() == vars.len() => {
                    moves.push(vars.iter().cloned().zip(values).collect());
                }
                Ok(values) => {
                    error = Some(EngineError::Protocol(format!(
                        "expected {} values, got {}: '{}'",
                        vars.len(),
                        values.len(),
                        line
                    )));
                }
                Err(e) => error = Some(e),
            }
        }
    }

    fn encode<'a>(vars: impl Iterator<Item = &'a String>, state: &State) -> Result<String, EngineError> {
        let values = vars
            .map(|name| {
                state
                    .get(name)
                    .map(|v| v.to_string())
                    .ok_or_else(|| SpecError::MissingVariable(name.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(values.join(" "))
    }

    fn state_vector(&self, state: &State) -> Result<String, EngineError> {
        Self::encode(self.env_vars.iter().chain(&self.sys_vars), state)
    }

    fn env_vector(&self, env_move: &State) -> Result<String, EngineError> {
        Self::encode(self.env_vars.iter(), env_move)
    }

    fn check_goal_mode(&mut self, goal_mode: i64) -> Result<(), EngineError> {
        let num_goals = self.num_goals()?;
        if goal_mode < 0 || goal_mode >= num_goals {
            return Err(EngineError::InvalidGoalMode {
                mode: goal_mode,
                num_goals,
            });
        }
        Ok(())
    }

    /// Whether `state` is in the winning set.
    pub fn is_winning(&mut self, state: &State) -> Result<bool, EngineError> {
        let command = format!("winning {}", self.state_vector(state)?);
        self.send(&command)?;
        Ok(self.receive()?.contains("True"))
    }

    /// Index of `state` in the fixpoint iteration towards goal
    /// `goal_mode`.
    ///
    /// # Errors
    ///
    /// Returns an error if the goal mode does not name a system goal.
    pub fn get_index(&mut self, state: &State, goal_mode: i64) -> Result<i64, EngineError> {
        self.check_goal_mode(goal_mode)?;
        let command = format!("getindex {} {}", self.state_vector(state)?, goal_mode);
        self.send(&command)?;
        let line = self.receive()?;
        line.trim()
            .parse()
            .map_err(|_| EngineError::Protocol(format!("not an index: '{}'", line)))
    }

    /// Possible next moves of the environment in `state`.
    pub fn env_next(&mut self, state: &State) -> Result<Vec<State>, EngineError> {
        let command = format!("envnext {}", self.state_vector(state)?);
        self.send(&command)?;
        let vars = self.env_vars.clone();
        self.receive_moves(&vars)
    }

    /// Next moves of the system that are consistent with some winning
    /// strategy for goal `goal_mode`.
    pub fn sys_next_feasible(
        &mut self,
        state: &State,
        env_move: &State,
        goal_mode: i64,
    ) -> Result<Vec<State>, EngineError> {
        self.check_goal_mode(goal_mode)?;
        let command = format!(
            "sysnext {} {} {}",
            self.state_vector(state)?,
            self.env_vector(env_move)?,
            goal_mode
        );
        self.send(&command)?;
        let vars = self.sys_vars.clone();
        self.receive_moves(&vars)
    }

    /// All next moves of the system, winning or not.
    pub fn sys_next_any(&mut self, state: &State, env_move: &State) -> Result<Vec<State>, EngineError> {
        let command = format!(
            "sysnexta {} {}",
            self.state_vector(state)?,
            self.env_vector(env_move)?
        );
        self.send(&command)?;
        let vars = self.sys_vars.clone();
        self.receive_moves(&vars)
    }

    /// Variable names known to the engine, with their indices.
    pub fn get_vars(&mut self) -> Result<String, EngineError> {
        self.send("var")?;
        self.receive()
    }

    pub fn num_goals(&mut self) -> Result<i64, EngineError> {
        self.send("numgoals")?;
        let line = self.receive()?;
        line.trim()
            .parse()
            .map_err(|_| EngineError::Protocol(format!("not a goal count: '{}'", line)))
    }

    /// End the session. Returns whether the process exited cleanly.
    pub fn close(&mut self) -> Result<bool, EngineError> {
        if self.io.is_some() {
            self.send("quit")?;
        }
        self.io = None;
        match self.child.take() {
            Some(mut child) => {
                let status = child.wait()?;
                if !status.success() {
                    debug!("Interactive gr1c exited with {}", status);
                }
                Ok(status.success())
            }
            None => Ok(true),
        }
    }
}

impl<W: Write, R: BufRead> Drop for Gr1cSession<W, R> {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            debug!("Killing interactive gr1c that was not closed");
            // the process may already be gone
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn state(pairs: &[(&str, i64)]) -> State {
        pairs.iter().map(|&(k, v)| (k.to_string(), v)).collect()
    }

    fn session(output: &str) -> Gr1cSession<Vec<u8>, Cursor<Vec<u8>>> {
        Gr1cSession::from_streams(
            Vec::new(),
            Cursor::new(output.as_bytes().to_vec()),
            vec!["x".to_string()],
            vec!["y".to_string(), "z".to_string()],
        )
    }

    fn sent(session: &Gr1cSession<Vec<u8>, Cursor<Vec<u8>>>) -> String {
        let (writer, _) = session.io.as_ref().unwrap();
        String::from_utf8(writer.clone()).unwrap()
    }

    #[test]
    fn test_winning() {
        let mut s = session(">>> True\n>>> False\n");
        let current = state(&[("x", 1), ("y", 0), ("z", 2)]);
        assert!(s.is_winning(&current).unwrap());
        assert!(!s.is_winning(&current).unwrap());
        assert_eq!(sent(&s), "winning 1 0 2\nwinning 1 0 2\n");
    }

    #[test]
    fn test_env_next() {
        let mut s = session(">>> 0\n1\n---\n");
        let moves = s.env_next(&state(&[("x", 1), ("y", 0), ("z", 2)])).unwrap();
        assert_eq!(moves, vec![state(&[("x", 0)]), state(&[("x", 1)])]);
        assert_eq!(sent(&s), "envnext 1 0 2\n");
    }

    #[test]
    fn test_sys_next_checks_goal_mode() {
        let mut s = session(">>> 2\n>>> 1 1\n>>> 0 3\n>>> ---\n>>> 2\n");
        let current = state(&[("x", 1), ("y", 0), ("z", 2)]);
        let env_move = state(&[("x", 0)]);
        let moves = s.sys_next_feasible(&current, &env_move, 1).unwrap();
        assert_eq!(
            moves,
            vec![state(&[("y", 1), ("z", 1)]), state(&[("y", 0), ("z", 3)])]
        );
        assert!(matches!(
            s.sys_next_feasible(&current, &env_move, 2),
            Err(EngineError::InvalidGoalMode { mode: 2, num_goals: 2 })
        ));
        assert_eq!(sent(&s), "numgoals\nsysnext 1 0 2 0 1\nnumgoals\n");
    }

    #[test]
    fn test_sys_next_any() {
        let mut s = session("---\n");
        let current = state(&[("x", 1), ("y", 0), ("z", 2)]);
        let moves = s.sys_next_any(&current, &state(&[("x", 1)])).unwrap();
        assert!(moves.is_empty());
        assert_eq!(sent(&s), "sysnexta 1 0 2 1\n");
    }

    #[test]
    fn test_malformed_moves_are_consumed() {
        let mut s = session("0 x\n1 1\n---\n3\n");
        let current = state(&[("x", 1), ("y", 0), ("z", 2)]);
        let env_move = state(&[("x", 1)]);
        assert!(matches!(s.sys_next_any(&current, &env_move), Err(EngineError::Protocol(_))));
        assert_eq!(s.num_goals().unwrap(), 3);
    }

    #[test]
    fn test_short_move_is_rejected() {
        let mut s = session("1\n---\n>>> 2\n");
        let current = state(&[("x", 1), ("y", 0), ("z", 2)]);
        let result = s.sys_next_any(&current, &state(&[("x", 1)]));
        assert!(matches!(result, Err(EngineError::Protocol(m)) if m.contains("expected 2 values")));
        assert_eq!(s.num_goals().unwrap(), 2);
    }

    #[test]
    fn test_get_index_and_vars() {
        let mut s = session(">>> 1\n>>> 4\n>>> x (0), y (1), z (2)\n");
        let current = state(&[("x", 0), ("y", 0), ("z", 0)]);
        assert_eq!(s.get_index(&current, 0).unwrap(), 4);
        assert_eq!(s.get_vars().unwrap(), "x (0), y (1), z (2)");
        assert_eq!(sent(&s), "numgoals\ngetindex 0 0 0 0\nvar\n");
    }

    #[test]
    fn test_custom_prompt() {
        let mut s = session("gr1c> 3\n").with_prompt("gr1c> ");
        assert_eq!(s.prompt(), "gr1c> ");
        assert_eq!(s.num_goals().unwrap(), 3);
    }

    #[test]
    fn test_protocol_errors() {
        let mut s = session(">>> many\n");
        assert!(matches!(s.num_goals(), Err(EngineError::Protocol(_))));
        assert!(matches!(s.num_goals(), Err(EngineError::Protocol(_))));
        assert!(matches!(
            s.is_winning(&state(&[("x", 1)])),
            Err(EngineError::Spec(SpecError::MissingVariable(v))) if v == "y"
        ));
    }

    #[test]
    fn test_close() {
        let mut s = session("");
        assert!(s.is_open());
        assert!(s.close().unwrap());
        assert!(!s.is_open());
        assert!(matches!(s.get_vars(), Err(EngineError::NoProcess)));
    }
}
