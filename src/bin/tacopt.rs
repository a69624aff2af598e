//! The optimizer driver.
//!
//! Reads one program document from stdin, runs the requested passes, and
//! writes the transformed document to stdout. Any failure aborts with a
//! non-zero status before anything is written.

use std::io;

use clap::{Arg, ArgAction, Command};
use tacopt::{
    ir::{read_program, write_program},
    passes::{
        const_prop::{ConstProp, CONST_PROP},
        dce::{Dce, LocalDce, TrivialDce, DCE},
        loops::invariant_motion::Licm,
        ssa::ToSsa,
        PassManager, TransformPass,
    },
};

fn main() {
    if let Err(err) = run() {
        eprintln!("tacopt: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut passman = PassManager::new();
    ConstProp::register(&mut passman);
    Dce::register(&mut passman);
    TrivialDce::register(&mut passman);
    LocalDce::register(&mut passman);
    ToSsa::register(&mut passman);
    Licm::register(&mut passman);

    let known = passman.gather_transform_names().join(", ");

    let matches = Command::new("tacopt")
        .about("CFG-based optimizer for a three-address IR")
        .arg(
            Arg::new("passes")
                .action(ArgAction::Append)
                .help(format!("passes to run in order, from: {known}")),
        )
        .arg(
            Arg::new("max-iter")
                .long("max-iter")
                .default_value("10")
                .help("per-pass iteration bound"),
        )
        .get_matches();

    let max_iter: usize = matches
        .get_one::<String>("max-iter")
        .map(String::as_str)
        .unwrap_or("10")
        .parse()?;

    let passes: Vec<String> = match matches.get_many::<String>("passes") {
        Some(names) => names.cloned().collect(),
        // the default pipeline: propagate constants, then delete the dead
        None => vec![CONST_PROP.to_string(), DCE.to_string()],
    };

    let mut program = read_program(io::stdin().lock())?;
    for name in &passes {
        passman.run_transform(name, &mut program, max_iter)?;
    }
    write_program(io::stdout().lock(), &program)?;
    Ok(())
}
