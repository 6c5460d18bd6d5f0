use anyhow::{Context, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// The prompt file whose contents replace the built-in assistant persona.
pub const INSTRUCTIONS_FILE: &str = "instructions.md";

/// Returns the persona override from `dir_path`, if one is present.
///
/// A missing directory or file is not an error: the service then runs with
/// the built-in instructions. Blank files are ignored as well.
pub fn load_instructions(dir_path: &Path) -> Result<Option<String>> {
    let path = dir_path.join(INSTRUCTIONS_FILE);
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read prompt file: {}", path.display()));
        }
    };

    let text = text.trim();
    Ok((!text.is_empty()).then(|| text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn instructions_are_optional() -> Result<()> {
        assert_eq!(load_instructions(Path::new("nonexistent_dir_for_testing_prompts"))?, None);

        let dir = tempdir()?;
        assert_eq!(load_instructions(dir.path())?, None);

        fs::write(dir.path().join(INSTRUCTIONS_FILE), "   \n")?;
        assert_eq!(load_instructions(dir.path())?, None);
        Ok(())
    }

    #[test]
    fn instructions_are_trimmed() -> Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join(INSTRUCTIONS_FILE), "\nYou draft patents.\n\n")?;
        fs::write(dir.path().join("claims.md"), "Not the persona.")?;

        assert_eq!(load_instructions(dir.path())?.as_deref(), Some("You draft patents."));
        Ok(())
    }

    #[test]
    fn unreadable_instructions_are_an_error() -> Result<()> {
        let dir = tempdir()?;
        fs::create_dir(dir.path().join(INSTRUCTIONS_FILE))?;

        let err = load_instructions(dir.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to read prompt file"));
        Ok(())
    }
}
