use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Paths {
    pub base: PathBuf,
}

impl Paths {
    pub fn new() -> Self {
        let base = dirs::home_dir()
            .map(|h| h.join(".pagemock"))
            .unwrap_or_else(|| PathBuf::from(".pagemock"));
        Self { base }
    }

    pub fn with_base(base: PathBuf) -> Self {
        Self { base }
    }

    pub fn config_file(&self) -> PathBuf {
        self.base.join("config.json")
    }

    pub fn workspace(&self) -> PathBuf {
        self.base.join("workspace")
    }

    /// Base directory for browser session data (user data dirs, profiles).
    pub fn browser_dir(&self) -> PathBuf {
        self.base.join("browser")
    }

    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.base)?;
        std::fs::create_dir_all(self.workspace())?;
        std::fs::create_dir_all(self.browser_dir())?;
        Ok(())
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_base_layout() {
        let paths = Paths::with_base(PathBuf::from("/tmp/pm"));
        assert_eq!(paths.config_file(), PathBuf::from("/tmp/pm/config.json"));
        assert_eq!(paths.browser_dir(), PathBuf::from("/tmp/pm/browser"));
    }

    #[test]
    fn test_ensure_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = Paths::with_base(tmp.path().join("base"));
        paths.ensure_dirs().unwrap();
        assert!(paths.workspace().is_dir());
        assert!(paths.browser_dir().is_dir());
    }
}
