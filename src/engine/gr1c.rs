//! The gr1c command-line tool as a synthesis engine.

use std::ffi::OsString;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use fs_err as fs;
use log::{debug, info};
use tempfile::NamedTempFile;

use super::{ChangeFile, EngineError, SynthesisEngine, ToolLog};
use crate::automaton::Automaton;
use crate::spec::GrSpec;

/// How to invoke gr1c.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gr1cConfig {
    /// Name or path of the executable.
    pub program: PathBuf,
    /// Arguments placed before those of each call.
    pub args: Vec<OsString>,
    pub tool_log: ToolLog,
    /// Directory in which the change and specification files of patch
    /// calls are kept. Without one they are removed after each call.
    pub work_dir: Option<PathBuf>,
}

impl Default for Gr1cConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("gr1c"),
            args: Vec::new(),
            tool_log: ToolLog::default(),
            work_dir: None,
        }
    }
}

/// Output of one finished gr1c run.
struct Run {
    success: bool,
    stdout: String,
    stderr: String,
}

/// A file handed to gr1c by name.
enum Staged {
    Kept(PathBuf),
    Temp(NamedTempFile),
}

impl Staged {
    fn path(&self) -> &Path {
        match self {
            Staged::Kept(path) => path,
            Staged::Temp(file) => file.path(),
        }
    }
}

/// Synthesis engine that runs one gr1c process per call.
#[derive(Debug, Clone, Default)]
pub struct Gr1cProcess {
    config: Gr1cConfig,
}

impl Gr1cProcess {
    pub fn new(config: Gr1cConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Gr1cConfig {
        &self.config
    }

    fn command<I, S>(&self, args: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let mut cmd = Command::new(&self.config.program);
        cmd.args(&self.config.args);
        cmd.args(args.into_iter().map(Into::into));
        cmd
    }

    /// Flags selecting the diagnostic output. `rg` knows no verbose level.
    fn log_flags(&self, reachability: bool) -> &'static [&'static str] {
        match self.config.tool_log {
            ToolLog::Verbose if reachability => ToolLog::Log.flags(),
            level => level.flags(),
        }
    }

    /// Run a command with `input` on its standard input and wait for it.
    ///
    /// Returns `None` if the process could not be started. Input and
    /// outputs pass through anonymous temporary files, so a chatty process
    /// cannot block on a full pipe.
    fn run(&self, mut cmd: Command, input: &str) -> Result<Option<Run>, EngineError> {
        let mut stdin = tempfile::tempfile()?;
        stdin.write_all(input.as_bytes())?;
        stdin.seek(SeekFrom::Start(0))?;
        let mut stdout = tempfile::tempfile()?;
        let mut stderr = tempfile::tempfile()?;
        cmd.stdin(Stdio::from(stdin))
            .stdout(Stdio::from(stdout.try_clone()?))
            .stderr(Stdio::from(stderr.try_clone()?));

        debug!("Running {:?}", cmd);
        let status = match cmd.status() {
            Ok(status) => status,
            Err(e) => {
                debug!("Could not start {}: {}", self.config.program.display(), e);
                return Ok(None);
            }
        };
        Ok(Some(Run {
            success: status.success(),
            stdout: read_back(&mut stdout)?,
            stderr: read_back(&mut stderr)?,
        }))
    }

    /// Log the diagnostics of a failed run, if they were requested.
    fn report_failure(&self, what: &str, run: &Run) {
        debug!("gr1c {} failed", what);
        if self.config.tool_log != ToolLog::Off {
            debug!("gr1c stdout:\n{}", run.stdout);
            debug!("gr1c stderr:\n{}", run.stderr);
        }
    }

    /// Write `contents` to the named file `<base><suffix>`.
    fn stage(&self, base: &str, suffix: &str, contents: &str) -> Result<Staged, EngineError> {
        match &self.config.work_dir {
            Some(dir) => {
                let path = dir.join(format!("{}{}", base, suffix));
                fs::write(&path, contents)?;
                Ok(Staged::Kept(path))
            }
            None => {
                let mut file = tempfile::Builder::new()
                    .prefix(base)
                    .suffix(suffix)
                    .tempfile()?;
                file.write_all(contents.as_bytes())?;
                file.flush()?;
                Ok(Staged::Temp(file))
            }
        }
    }

    fn parse_strategy(&self, what: &str, run: &Run) -> Option<Automaton> {
        if !run.success {
            self.report_failure(what, run);
            return None;
        }
        match Automaton::from_gr1c_json(&run.stdout) {
            Ok(aut) => Some(aut),
            Err(e) => {
                debug!("Could not read strategy of gr1c {}: {}", what, e);
                None
            }
        }
    }

    /// Run `gr1c patch` with the given mode arguments on the strategy
    /// `aut` and the staged specification file.
    fn run_patch(
        &self,
        what: &str,
        spec: &GrSpec,
        aut: &Automaton,
        base: &str,
        mode_args: Vec<OsString>,
    ) -> Result<Option<Automaton>, EngineError> {
        let env_vars = spec.env_var_names();
        let sys_vars = spec.sys_var_names();
        let strategy = aut.to_gr1c_plain(&env_vars, &sys_vars)?;
        let spec_file = self.stage(base, "_specfile.spc", &spec.to_gr1c())?;

        let mut args: Vec<OsString> = vec!["patch".into()];
        args.extend(self.log_flags(false).iter().map(OsString::from));
        args.extend(["-t", "json", "-a", "-"].iter().map(OsString::from));
        args.extend(mode_args);
        args.push(spec_file.path().as_os_str().to_owned());

        let run = match self.run(self.command(args), &strategy)? {
            Some(run) => run,
            None => return Ok(None),
        };
        Ok(self.parse_strategy(what, &run))
    }
}

fn read_back(file: &mut File) -> Result<String, EngineError> {
    let mut text = String::new();
    file.seek(SeekFrom::Start(0))?;
    file.read_to_string(&mut text)?;
    Ok(text)
}

impl SynthesisEngine for Gr1cProcess {
    fn check_syntax(&self, text: &str) -> Result<bool, EngineError> {
        let cmd = self.command(Some("-s").into_iter().chain(self.log_flags(false).iter().copied()));
        match self.run(cmd, text)? {
            Some(run) if run.success => Ok(true),
            Some(run) => {
                self.report_failure("syntax check", &run);
                Ok(false)
            }
            None => Ok(false),
        }
    }

    fn check_realizable(&self, spec: &GrSpec) -> Result<bool, EngineError> {
        let cmd = self.command(Some("-r").into_iter().chain(self.log_flags(false).iter().copied()));
        match self.run(cmd, &spec.to_gr1c())? {
            Some(run) if run.success => Ok(true),
            Some(run) => {
                self.report_failure("realizability check", &run);
                Ok(false)
            }
            None => Ok(false),
        }
    }

    fn synthesize(&self, spec: &GrSpec) -> Result<Option<Automaton>, EngineError> {
        info!(
            "Synthesizing strategy for {} env and {} sys variables",
            spec.env_vars.len(),
            spec.sys_vars.len()
        );
        let args = ["-t", "json"].iter().chain(self.log_flags(false)).copied();
        let run = match self.run(self.command(args), &spec.to_gr1c())? {
            Some(run) => run,
            None => return Ok(None),
        };
        let aut = self.parse_strategy("synthesis", &run);
        if let Some(aut) = &aut {
            info!("Synthesized strategy with {} nodes", aut.len());
        }
        Ok(aut)
    }

    fn synthesize_reachgame(&self, spec: &GrSpec) -> Result<Option<Automaton>, EngineError> {
        let input = spec.to_gr1c_reachability()?;
        let args = ["rg", "-t", "tulip"].iter().chain(self.log_flags(true)).copied();
        let run = match self.run(self.command(args), &input)? {
            Some(run) => run,
            None => return Ok(None),
        };
        if !run.success {
            self.report_failure("rg", &run);
            return Ok(None);
        }
        match Automaton::from_xml(&run.stdout) {
            Ok(aut) => Ok(Some(aut)),
            Err(e) => {
                debug!("Could not read strategy of gr1c rg: {}", e);
                Ok(None)
            }
        }
    }

    fn patch(
        &self,
        spec: &GrSpec,
        aut: &Automaton,
        changes: &ChangeFile,
    ) -> Result<Option<Automaton>, EngineError> {
        const BASE: &str = "patch_localfixpoint";
        let change_file = self.stage(BASE, "_changefile.edc", &changes.render(spec)?)?;
        let mode_args = vec!["-e".into(), change_file.path().as_os_str().to_owned()];
        self.run_patch("patch", spec, aut, BASE, mode_args)
    }

    fn add_sys_goal(
        &self,
        spec: &GrSpec,
        aut: &Automaton,
        goal: &str,
        metric_vars: &[String],
    ) -> Result<Option<Automaton>, EngineError> {
        let mode_args = vec![
            "-f".into(),
            goal.into(),
            "-m".into(),
            metric_vars.join(" ").into(),
        ];
        self.run_patch("goal addition", spec, aut, "add_sysgoal", mode_args)
    }

    fn rm_sys_goal(
        &self,
        spec: &GrSpec,
        aut: &Automaton,
        index: usize,
    ) -> Result<Option<Automaton>, EngineError> {
        let mode_args = vec!["-r".into(), index.to_string().into()];
        self.run_patch("goal removal", spec, aut, "rm_sysgoal", mode_args)
    }
}
