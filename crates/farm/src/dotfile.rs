//! Dotfile name translation
//!
//! Packages store `dot-vimrc`; the target receives `.vimrc`. The mapping
//! applies to every path component.

use std::path::{Path, PathBuf};

/// Default prefix standing in for a leading `.`
pub const DEFAULT_PREFIX: &str = "dot-";

/// Maps names between package and target form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DotfileTranslator {
    prefix: String,
    enabled: bool,
}

impl Default for DotfileTranslator {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            enabled: true,
        }
    }
}

impl DotfileTranslator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            enabled: true,
        }
    }

    /// Translator that leaves every name unchanged
    pub fn disabled() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            enabled: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled && !self.prefix.is_empty()
    }

    /// `dot-vimrc` -> `.vimrc`
    pub fn to_target_name(&self, name: &str) -> String {
        if self.is_enabled() {
            if let Some(rest) = name.strip_prefix(&self.prefix) {
                if !rest.is_empty() {
                    return format!(".{rest}");
                }
            }
        }
        name.to_string()
    }

    /// `.vimrc` -> `dot-vimrc`
    pub fn to_package_name(&self, name: &str) -> String {
        if self.is_enabled() && name != "." && name != ".." {
            if let Some(rest) = name.strip_prefix('.') {
                if !rest.is_empty() {
                    return format!("{}{rest}", self.prefix);
                }
            }
        }
        name.to_string()
    }

    /// Translate every component of a package-relative path
    pub fn to_target_path(&self, rel: &Path) -> PathBuf {
        map_components(rel, |name| self.to_target_name(name))
    }

    /// Translate every component of a target-relative path
    pub fn to_package_path(&self, rel: &Path) -> PathBuf {
        map_components(rel, |name| self.to_package_name(name))
    }
}

fn map_components<F>(rel: &Path, f: F) -> PathBuf
where
    F: Fn(&str) -> String,
{
    rel.components()
        .map(|c| {
            let name = c.as_os_str().to_string_lossy();
            f(&name)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translate_names() {
        let t = DotfileTranslator::default();
        assert_eq!(t.to_target_name("dot-vimrc"), ".vimrc");
        assert_eq!(t.to_target_name("vimrc"), "vimrc");
        assert_eq!(t.to_target_name("dot-"), "dot-");
        assert_eq!(t.to_package_name(".vimrc"), "dot-vimrc");
        assert_eq!(t.to_package_name("."), ".");
        assert_eq!(t.to_package_name("plain"), "plain");
    }

    #[test]
    fn translate_nested_path() {
        let t = DotfileTranslator::default();
        let rel: PathBuf = ["dot-config", "nvim", "dot-init.lua"].iter().collect();
        let expected: PathBuf = [".config", "nvim", ".init.lua"].iter().collect();
        assert_eq!(t.to_target_path(&rel), expected);
        assert_eq!(t.to_package_path(&expected), rel);
    }

    #[test]
    fn disabled_is_identity() {
        let t = DotfileTranslator::disabled();
        assert_eq!(t.to_target_name("dot-vimrc"), "dot-vimrc");
        assert_eq!(t.to_package_name(".vimrc"), ".vimrc");
    }

    #[test]
    fn custom_prefix() {
        let t = DotfileTranslator::new("_");
        assert_eq!(t.to_target_name("_bashrc"), ".bashrc");
        assert_eq!(t.to_package_name(".bashrc"), "_bashrc");
    }
}
