//! Language Registry - registration, lookup and program compilation
//!
//! The registry maps language names (case-insensitive) to their definitions
//! and turns program envelopes into runnable [`Code`]. It is owned by the
//! caller; there is no process-wide table.

use super::binary::Envelope;
use super::code::Code;
use super::language::Language;
use crate::error::{EvoluError, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Table of known languages.
#[derive(Default)]
pub struct Registry {
    /// Lowercase name → language.
    languages: HashMap<String, Arc<Language>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a language. A language with the same name (in any case) is
    /// replaced, not merged.
    pub fn register(&mut self, language: Language) -> Arc<Language> {
        let key = language.name().to_lowercase();
        let language = Arc::new(language);
        if self.languages.insert(key, language.clone()).is_some() {
            log::debug!("replaced language '{}'", language.name());
        } else {
            log::debug!(
                "registered language '{}' ({} commands)",
                language.name(),
                language.len() - 1,
            );
        }
        language
    }

    /// Build and register a language in one step.
    ///
    /// ```ignore
    /// registry.add("LNG", |lang| {
    ///     lang.define_condition("if_a", CommandDef::new());
    /// });
    /// ```
    pub fn add<F>(&mut self, name: &str, build: F) -> Arc<Language>
    where
        F: FnOnce(&mut Language),
    {
        let mut language = Language::new(name);
        build(&mut language);
        self.register(language)
    }

    /// Find a language by name, ignoring case.
    pub fn lookup(&self, name: &str) -> Option<&Arc<Language>> {
        self.languages.get(&name.to_lowercase())
    }

    /// Compile program text `EVOLU:<language>:<genome>`.
    pub fn compile(&self, program: &str) -> Result<Code> {
        self.compile_envelope(Envelope::parse(program)?)
    }

    /// Compile a raw envelope as stored on disk.
    pub fn compile_bytes(&self, data: &[u8]) -> Result<Code> {
        self.compile_envelope(Envelope::from_bytes(data)?)
    }

    fn compile_envelope(&self, envelope: Envelope) -> Result<Code> {
        let language = self
            .lookup(&envelope.language)
            .ok_or_else(|| EvoluError::UnknownLanguage(envelope.language.clone()))?;
        Ok(language.compile(&envelope.genome))
    }

    /// Registered language names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.languages.values().map(|lang| lang.name()).collect();
        names.sort();
        names
    }

    /// Number of registered languages.
    pub fn len(&self) -> usize {
        self.languages.len()
    }

    /// Whether no language is registered.
    pub fn is_empty(&self) -> bool {
        self.languages.is_empty()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Registry({} languages: {:?})", self.languages.len(), self.names())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::CommandDef;

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry.add("LNG", |lang| {
            lang.define_condition("if_a", CommandDef::new())
                .define_command("one", CommandDef::new());
        });
        registry
    }

    #[test]
    fn test_lookup_ignores_case() {
        let registry = registry();
        assert_eq!(registry.lookup("lng").unwrap().name(), "LNG");
        assert_eq!(registry.lookup("Lng").unwrap().name(), "LNG");
        assert!(registry.lookup("other").is_none());
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = registry();
        registry.add("lng", |lang| {
            lang.define_command("two", CommandDef::new());
        });

        assert_eq!(registry.len(), 1);
        let lang = registry.lookup("LNG").unwrap();
        assert_eq!(lang.name(), "lng");
        assert!(lang.command("one").is_none());
        assert!(lang.command("two").is_some());
    }

    #[test]
    fn test_compile_program() {
        let registry = registry();
        let code = registry.compile("EVOLU:lng:\u{1}\u{2}\u{0}\u{2}").unwrap();

        assert!(Arc::ptr_eq(code.language(), registry.lookup("LNG").unwrap()));
        assert_eq!(code.bytes(), &[1, 2, 0, 2]);
        assert_eq!(code.rules().len(), 2);
        assert_eq!(code.rules()[0].required(), 1);
        assert!(code.rules()[1].is_initializer());
        // Envelope carries the registered spelling of the name
        assert_eq!(code.to_source(), "EVOLU:LNG:\u{1}\u{2}\u{0}\u{2}");
    }

    #[test]
    fn test_compile_errors() {
        let registry = registry();

        match registry.compile("EVOLU:NO:abc") {
            Err(EvoluError::UnknownLanguage(name)) => assert_eq!(name, "NO"),
            other => panic!("expected UnknownLanguage, got {:?}", other),
        }
        assert!(matches!(
            registry.compile("NO PROGRAM"),
            Err(EvoluError::MalformedProgram(_))
        ));
    }

    #[test]
    fn test_compile_bytes() {
        let registry = registry();
        let code = registry.compile_bytes(b"EVOLU:LNG:\x01\x82\x00").unwrap();
        assert_eq!(code.bytes(), &[1, 130, 0]);
        assert!(matches!(
            registry.compile_bytes(b"EVOL"),
            Err(EvoluError::MalformedProgram(_))
        ));
    }

    #[test]
    fn test_debug_lists_names() {
        let mut registry = registry();
        registry.add("ABC", |_| {});
        assert_eq!(format!("{:?}", registry), r#"Registry(2 languages: ["ABC", "LNG"])"#);
    }
}
