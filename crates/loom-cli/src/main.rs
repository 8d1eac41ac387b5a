use std::{env, fs, process::ExitCode};

use loom_core::{eval_with, register_default_externs, ExternRegistry, NoopTracer, StderrTracer, VmLimits};

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();

    let mut file_path = None;
    let mut trace = false;
    let mut dump_tokens = false;
    let mut dump_ast = false;

    for arg in &args[1..] {
        match arg.as_str() {
            "--trace" => trace = true,
            "--dump-tokens" => dump_tokens = true,
            "--dump-ast" => dump_ast = true,
            other => file_path = Some(other.to_string()),
        }
    }

    let Some(file_path) = file_path else {
        eprintln!("usage: loom [--trace] [--dump-tokens] [--dump-ast] <file>");
        return ExitCode::FAILURE;
    };

    let source = match read_file(&file_path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    if dump_tokens {
        println!("{}", loom_core::tokenize_dump(&source));
        return ExitCode::SUCCESS;
    }

    if dump_ast {
        println!("{}", loom_core::parse_dump(&source));
        return ExitCode::SUCCESS;
    }

    let mut externs = ExternRegistry::new();
    register_default_externs(&mut externs);

    let (code, diags) = if trace {
        eval_with(&source, VmLimits::default(), &mut StderrTracer, &mut externs)
    } else {
        eval_with(&source, VmLimits::default(), &mut NoopTracer, &mut externs)
    };

    if !diags.is_empty() {
        eprint!("{diags}");
    }

    match u8::try_from(code) {
        Ok(code) => ExitCode::from(code),
        Err(_) => ExitCode::FAILURE,
    }
}

fn read_file(file_path: &str) -> Result<String, String> {
    match fs::metadata(file_path) {
        Ok(metadata) if !metadata.is_file() => return Err(format!("{file_path} is not a file")),
        Err(err) => return Err(format!("reading {file_path}: {err}")),
        Ok(_) => {}
    }
    fs::read_to_string(file_path).map_err(|err| format!("reading {file_path}: {err}"))
}
