use bcl_rust::{
    json, parse, parse_and_bind, validate_required, DynamicTarget, Error, Errors, ParseOptions,
    SpecSet, TypeSet, Walker,
};

use std::io::{self, Read};
use std::process::ExitCode;

const CONTEXT_LINES: usize = 2;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut input = String::new();
    if let Err(err) = io::stdin().read_to_string(&mut input) {
        eprintln!("error: reading stdin: {}", err);
        return ExitCode::FAILURE;
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    let result = match args.as_slice() {
        [] => check(&input),
        [types, root] => bind(&input, types, root, None),
        [types, root, specs] => bind(&input, types, root, Some(specs)),
        _ => {
            eprintln!("usage: bcl [<types.json> <root-schema> [specs.json]] < source");
            return ExitCode::FAILURE;
        }
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(report) => {
            eprint!("{}", report);
            ExitCode::FAILURE
        }
    }
}

/// Parse only, reporting every error found.
fn check(input: &str) -> Result<(), String> {
    let result = parse(input, &ParseOptions::default());
    if result.errors.is_empty() {
        println!("ok");
        return Ok(());
    }
    Err(report(&result.errors, input))
}

fn bind(input: &str, types: &str, root: &str, specs: Option<&String>) -> Result<(), String> {
    let types = read_config(types, TypeSet::from_json)?;
    let specs = match specs {
        Some(path) => read_config(path, SpecSet::from_json)?,
        None => SpecSet::new(),
    };

    let mut target = DynamicTarget::new(&types, root).map_err(|e| format!("error: {}\n", e))?;
    let mut walker = Walker::new(specs);
    parse_and_bind(input, &ParseOptions::default(), &mut walker, &mut target)
        .map_err(|errors| report(&errors, input))?;

    let message = target.into_message();
    let missing = validate_required(&message, &types);
    if !missing.is_empty() {
        let errors = Errors::from(missing.into_iter().map(Error::from).collect::<Vec<_>>());
        return Err(report(&errors, input));
    }
    println!("{}", json::to_json_pretty(&message));
    Ok(())
}

fn read_config<T, E: std::fmt::Display>(
    path: &str,
    load: impl FnOnce(&str) -> Result<T, E>,
) -> Result<T, String> {
    let text = std::fs::read_to_string(path).map_err(|e| format!("error: {}: {}\n", path, e))?;
    load(&text).map_err(|e| format!("error: {}: {}\n", path, e))
}

fn report(errors: &Errors, input: &str) -> String {
    let mut out = errors.render(input, CONTEXT_LINES);
    out.push('\n');
    out
}
