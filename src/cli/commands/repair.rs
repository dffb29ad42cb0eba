//! Repair Command
//!
//! Runs the JSON repair passes over a file (or stdin) and prints the result.
//!
//! Usage:
//!   ewhgen repair response.txt
//!   ewhgen repair --check - < response.txt

use std::path::Path;

use crate::ai::validation::{parse_or_repair, repair};
use crate::cli::{Output, read_text_input};
use crate::config::ConfigLoader;
use crate::types::{EwhError, Result};

pub fn run(input: &Path, check: bool) -> Result<()> {
    let raw = read_text_input(input)?;

    if !check {
        println!("{}", repair(&raw));
        return Ok(());
    }

    let excerpt_chars = ConfigLoader::load()?.output.excerpt_chars;
    let output = Output::new();
    match parse_or_repair(&raw) {
        Ok((value, was_repaired)) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            if was_repaired {
                output.success("Valid JSON after repair");
            } else {
                output.success("Valid JSON, no repair needed");
            }
            Ok(())
        }
        Err(failure) => Err(EwhError::malformed(
            format!("invalid JSON after repair: {}", failure.error),
            &failure.repaired,
            excerpt_chars,
        )),
    }
}
