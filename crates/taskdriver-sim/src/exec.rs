//! Commands understood by `ExecTask` inside a simulated task.
//!
//! | Command        | Behavior                                   |
//! |----------------|--------------------------------------------|
//! | `echo ARGS..`  | prints its arguments                       |
//! | `true`/`false` | exits 0 / 1                                |
//! | `exit N`       | exits with code N                          |
//! | `sleep SECS`   | sleeps, then exits 0                       |
//! | `stdout`       | prints the task's configured stdout string |
//! | `env`          | prints the task environment                |
//!
//! Anything else exits 127 with a message on stderr.

use std::time::Duration;

use taskdriver_core::{ExecTaskResult, ExitResult};

use crate::task::SimTask;

pub(crate) async fn run_command(task: &SimTask, cmd: &[String]) -> ExecTaskResult {
    let Some((program, args)) = cmd.split_first() else {
        return failure(2, "exec: empty command\n");
    };
    let name = program.rsplit('/').next().unwrap_or(program);

    match name {
        "echo" => success(format!("{}\n", args.join(" "))),
        "true" => success(String::new()),
        "false" => failure(1, ""),
        "exit" => match args.first().map(|a| a.parse::<i32>()) {
            Some(Ok(code)) => ExecTaskResult {
                exit_result: ExitResult::new(code, 0),
                ..Default::default()
            },
            _ => failure(2, "exit: numeric argument required\n"),
        },
        "sleep" => match args
            .first()
            .and_then(|a| a.parse::<f64>().ok())
            .map(Duration::try_from_secs_f64)
        {
            Some(Ok(duration)) => {
                tokio::time::sleep(duration).await;
                success(String::new())
            }
            _ => failure(1, "sleep: invalid time interval\n"),
        },
        "stdout" => success(task.workload.stdout_string.clone()),
        "env" => {
            let mut out = task.config.env_list().join("\n");
            if !out.is_empty() {
                out.push('\n');
            }
            success(out)
        }
        other => failure(127, &format!("{other}: command not found\n")),
    }
}

fn success(stdout: String) -> ExecTaskResult {
    ExecTaskResult {
        stdout: stdout.into_bytes(),
        stderr: Vec::new(),
        exit_result: ExitResult::new(0, 0),
    }
}

fn failure(code: i32, stderr: &str) -> ExecTaskResult {
    ExecTaskResult {
        stdout: Vec::new(),
        stderr: stderr.as_bytes().to_vec(),
        exit_result: ExitResult::new(code, 0),
    }
}
