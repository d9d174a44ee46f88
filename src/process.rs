//! 외부 프로세스 실행 모듈
//!
//! stdout/stderr는 부모 스트림을 물려받지 않고 메모리에 모읍니다.
//! 실패하면 전체 명령줄과 두 버퍼를 그대로 담은 `ProcessFailure`를 돌려줍니다.

use log::debug;
use std::ffi::OsStr;
use std::process::{Command, Stdio};

use crate::error::{BatchError, Result};

/// 명령을 실행하고 stdout을 반환
///
/// # Arguments
/// * `program` - 실행 파일 이름 또는 경로
/// * `args` - 인자 목록
///
/// # Returns
/// 성공 시 캡처된 stdout, 실패 시 `BatchError::ProcessFailure`
pub fn run<S: AsRef<OsStr>>(program: &str, args: &[S]) -> Result<String> {
    let command_line = display_command(program, args);
    debug!("exec: {}", command_line);

    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| BatchError::ProcessFailure {
            command: command_line.clone(),
            reason: e.to_string(),
            stdout: String::new(),
            stderr: String::new(),
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    if output.status.success() {
        return Ok(stdout);
    }

    Err(BatchError::ProcessFailure {
        command: command_line,
        reason: output.status.to_string(),
        stdout,
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// 단일 값을 출력하는 명령 실행 (끝의 개행 제거)
///
/// 페이지 수처럼 한 줄짜리 결과를 읽을 때 사용합니다.
pub fn run_scalar<S: AsRef<OsStr>>(program: &str, args: &[S]) -> Result<String> {
    let stdout = run(program, args)?;
    Ok(stdout.trim_end_matches(['\n', '\r']).to_string())
}

/// 실패를 되돌릴 수 없는 순차 단계용 실행
///
/// 워커 풀 파이프라인에서는 쓰지 않습니다. 파일 단위 에러는 [`run`]으로 보고합니다.
///
/// # Panics
/// 명령이 실행되지 않거나 0이 아닌 코드로 종료되면 진단 메시지와 함께 패닉
pub fn must_run<S: AsRef<OsStr>>(program: &str, args: &[S]) -> String {
    match run(program, args) {
        Ok(stdout) => stdout,
        Err(err) => panic!("{}", err),
    }
}

fn display_command<S: AsRef<OsStr>>(program: &str, args: &[S]) -> String {
    let mut line = program.to_string();
    for arg in args {
        let arg = arg.as_ref().to_string_lossy();
        line.push(' ');
        if arg.is_empty() || arg.contains(char::is_whitespace) {
            line.push_str(&format!("'{}'", arg));
        } else {
            line.push_str(&arg);
        }
    }
    line
}
