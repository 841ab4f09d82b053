//! The `arachno` binary: stdlib bootstrap, script runner, and REPL.
//!
//! With no script argument the standard library is loaded from a path
//! relative to the executable (`../stdlib/main.as`, overridable with
//! `ARACHNO_STDLIB`) and the REPL starts. With a script argument the script
//! runs after the stdlib. Exit code 1 on any unrecovered error.

use std::{cell::RefCell, io::Write as _, path::PathBuf, process::ExitCode, rc::Rc};

use arachno::{PrintWriter, Runner, Session, StdPrint, Value, register_macro, set_runtime_arguments};

fn stdlib_path() -> PathBuf {
    if let Ok(path) = std::env::var("ARACHNO_STDLIB") {
        return PathBuf::from(path);
    }
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("../stdlib/main.as")))
        .unwrap_or_else(|| PathBuf::from("../stdlib/main.as"))
}

fn run_file(path: &str, dump_ast: bool) -> Result<(), String> {
    let source = std::fs::read_to_string(path).map_err(|err| format!("could not read {path}: {err}"))?;
    let runner = Runner::new(source, path);
    if dump_ast {
        let program = runner.parse().map_err(|err| err.render(true, None))?;
        let json = serde_json::to_string_pretty(&program).map_err(|err| err.to_string())?;
        println!("{json}");
        return Ok(());
    }
    runner
        .run_with_writer(Rc::new(RefCell::new(StdPrint)), true)
        .map(|_| ())
        .map_err(|err| err.render(true))
}

fn repl() -> Result<(), String> {
    println!("ArachnoScript REPL - \x1b[32mv0.1\x1b[0m");
    println!("enter .peace to exit the repl.");
    let out: Rc<RefCell<dyn PrintWriter>> = Rc::new(RefCell::new(StdPrint));
    let mut session = Session::new("<repl>", out, true);
    let stdin = std::io::stdin();
    loop {
        print!("\x1b[32m>>\x1b[0m ");
        let _ = std::io::stdout().flush();
        let mut line = String::new();
        match stdin.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(err) => return Err(err.to_string()),
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == ".peace" {
            break;
        }
        match session.eval_line(input) {
            Ok(Value::Undefined) => {}
            Ok(value) => {
                let rendered = session.display(&value);
                println!("{rendered}");
            }
            Err(err) => eprintln!("{}", err.render(true)),
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    let mut dump_ast = false;
    let mut script = None;
    let mut script_args = Vec::new();
    for (index, arg) in argv.iter().enumerate() {
        match arg.as_str() {
            "--ast" => dump_ast = true,
            _ => {
                script = Some(arg.clone());
                script_args = argv[index + 1..].to_vec();
                break;
            }
        }
    }
    set_runtime_arguments(script_args);

    register_macro("#_start_repl", |_interp, _args, _env, _pos| {
        if let Err(message) = repl() {
            eprintln!("{message}");
        }
        Ok(Value::Undefined)
    });
    register_macro("#_stdin_prompt", |_interp, args, _env, _pos| {
        if let Some(message) = args.first() {
            print!("{}", match message {
                Value::Str(s) => s.to_string(),
                other => format!("{other:?}"),
            });
            let _ = std::io::stdout().flush();
        }
        let mut line = String::new();
        match std::io::stdin().read_line(&mut line) {
            Ok(_) => Ok(Value::Str(line.trim_end().into())),
            Err(_) => Ok(args.get(1).cloned().unwrap_or(Value::Undefined)),
        }
    });

    let stdlib = stdlib_path();
    if stdlib.exists() {
        let path = stdlib.to_string_lossy().into_owned();
        if let Err(message) = run_file(&path, false) {
            eprintln!("{message}");
            return ExitCode::FAILURE;
        }
    } else if std::env::var("ARACHNO_STDLIB").is_ok() {
        eprintln!("standard library not found at {}", stdlib.display());
        return ExitCode::FAILURE;
    }

    let outcome = match script {
        Some(path) => run_file(&path, dump_ast),
        None => repl(),
    };
    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}
