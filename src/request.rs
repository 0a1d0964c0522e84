use nix::unistd::Pid;

use crate::config::ManagerConfig;
use crate::error::{ManagerError, Result};

/// A parsed operator command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Run {
        program: String,
        args: Vec<String>,
        runtime: i64,
    },
    Stop(Pid),
    Resume(Pid),
    Kill(Pid),
    List,
    Exit,
}

/// Cut `line` to at most `max_len` bytes without splitting a character.
pub fn truncate_line(line: &str, max_len: usize) -> &str {
    if line.len() <= max_len {
        return line;
    }
    let mut end = max_len;
    while !line.is_char_boundary(end) {
        end -= 1;
    }
    &line[..end]
}

/// Parse one command line. Blank lines yield `Ok(None)`.
pub fn parse(line: &str, config: &ManagerConfig) -> Result<Option<Request>> {
    let line = truncate_line(line, config.max_line_len);
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let Some((&name, rest)) = tokens.split_first() else {
        return Ok(None);
    };

    if tokens.len() > config.max_args {
        return Err(ManagerError::Validation(format!(
            "too many arguments (at most {} tokens)",
            config.max_args
        )));
    }

    let request = match name {
        "run" => parse_run(rest)?,
        "stop" => Request::Stop(parse_pid(name, rest)?),
        "resume" => Request::Resume(parse_pid(name, rest)?),
        "kill" => Request::Kill(parse_pid(name, rest)?),
        "list" => Request::List,
        "exit" => Request::Exit,
        other => return Err(ManagerError::UnknownCommand(other.to_string())),
    };
    Ok(Some(request))
}

// run <program> <args>* <runtime>
fn parse_run(rest: &[&str]) -> Result<Request> {
    let [program, args @ .., runtime] = rest else {
        return Err(ManagerError::Validation(
            "usage: run <program> [args...] <runtime>".to_string(),
        ));
    };
    let runtime = runtime
        .parse::<i64>()
        .map_err(|_| ManagerError::Validation("runtime must be a number > 0".to_string()))?;

    Ok(Request::Run {
        program: program.to_string(),
        args: args.iter().map(|a| a.to_string()).collect(),
        runtime,
    })
}

fn parse_pid(name: &str, rest: &[&str]) -> Result<Pid> {
    let raw = rest
        .first()
        .ok_or_else(|| ManagerError::Validation(format!("usage: {} <pid>", name)))?;
    raw.parse::<i32>().map(Pid::from_raw).map_err(|_| {
        ManagerError::Validation("the process ID must be a positive integer".to_string())
    })
}
