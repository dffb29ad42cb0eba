//! CLI Common Utilities

use std::io::Read;
use std::path::Path;

use crate::types::{EwhError, Result};

/// Read UTF-8 text from `path`, or from stdin when `path` is `-`
pub fn read_text_input(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        return Ok(buffer);
    }

    std::fs::read_to_string(path).map_err(|e| {
        EwhError::Io(std::io::Error::new(
            e.kind(),
            format!("{}: {}", path.display(), e),
        ))
    })
}
