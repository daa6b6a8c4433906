//! Genome byte-code and program envelope
//!
//! ## Genome format
//!
//! ```text
//! 0xxxxxxx            opcode: language.commands()[x % len]
//! 1ppppppp ...        parameter group(s) for the preceding opcode,
//!                     value = value * 128 + p, most significant group first
//! ```
//!
//! Opcode 0 is the separator and closes the current rule. Two zero bytes
//! are appended before decoding so a trailing rule is always closed.
//! Every byte array decodes to some rule set: opcodes wrap around the
//! command table and parameters wrap around label lists. Unlabelled
//! parameters longer than 64 bits saturate.
//!
//! ## Envelope
//!
//! ```text
//! EVOLU:<language>:<genome bytes as characters 0-255>
//! ```

use super::code::Code;
use super::command::{CommandDef, Line};
use super::language::Language;
use super::registry::Registry;
use super::{ENVELOPE_MAGIC, ENVELOPE_SEPARATOR, PARAM_FLAG};
use crate::error::{EvoluError, Result};
use anyhow::Context;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;

/// Appended to every genome to close the last rule.
const TRAILER: [u8; 2] = [0, 0];

/// Decode a genome into the line lists of its rules.
///
/// Pure and total. Parameters of labelled commands are reduced modulo the
/// label count as each group arrives, so runs of any length pick the same
/// label as the full number would. Unlabelled parameters saturate at
/// `u64::MAX`.
pub fn decode(language: &Language, bytes: &[u8]) -> Vec<Vec<Line>> {
    let mut rules = Vec::new();
    let mut lines = Vec::new();
    let mut command: Option<&Arc<CommandDef>> = None;
    let mut param: Option<u64> = None;

    for &byte in bytes.iter().chain(TRAILER.iter()) {
        if byte & PARAM_FLAG != 0 {
            let group = u64::from(byte & !PARAM_FLAG);
            let acc = match param {
                Some(acc) => acc.saturating_mul(128).saturating_add(group),
                None => group,
            };
            let labels = command.and_then(|cmd| cmd.labels()).map(<[String]>::len);
            param = Some(match labels {
                Some(count) => acc % count as u64,
                None => acc,
            });
            continue;
        }

        if let Some(command) = command {
            if command.is_separator() {
                rules.push(std::mem::take(&mut lines));
            } else {
                let param = param.map(|raw| command.resolve_param(raw));
                lines.push(Line::new(command.clone(), param));
            }
        }
        param = None;
        command = Some(language.resolve(u64::from(byte)));
    }

    rules
}

/// Append the opcode byte for a command slot.
pub fn encode_opcode(out: &mut Vec<u8>, position: usize) -> Option<()> {
    let byte = u8::try_from(position).ok().filter(|b| b & PARAM_FLAG == 0)?;
    out.push(byte);
    Some(())
}

/// Append a parameter as base-128 groups, most significant first.
pub fn encode_param(out: &mut Vec<u8>, mut value: u64) {
    let mut groups = vec![(value & 0x7F) as u8];
    value >>= 7;
    while value > 0 {
        groups.push((value & 0x7F) as u8);
        value >>= 7;
    }
    out.extend(groups.iter().rev().map(|group| group | PARAM_FLAG));
}

/// A parsed program envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Language name as written (lookup is case-insensitive).
    pub language: String,
    /// Raw genome bytes.
    pub genome: Vec<u8>,
}

impl Envelope {
    pub fn new(language: impl Into<String>, genome: Vec<u8>) -> Self {
        Self {
            language: language.into(),
            genome,
        }
    }

    /// Parse program text. Every character must have a code in 0-255.
    pub fn parse(program: &str) -> Result<Self> {
        let mut data = Vec::with_capacity(program.len());
        for (idx, chr) in program.chars().enumerate() {
            let byte = u8::try_from(u32::from(chr)).map_err(|_| {
                EvoluError::MalformedProgram(format!(
                    "character {:?} at {} is outside 0-255",
                    chr, idx
                ))
            })?;
            data.push(byte);
        }
        Self::split(&data, |name| name.iter().copied().map(char::from).collect())
    }

    /// Parse a raw envelope as stored on disk (UTF-8 language name).
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::split(data, |name| String::from_utf8_lossy(name).into_owned())
    }

    fn split(data: &[u8], name: impl Fn(&[u8]) -> String) -> Result<Self> {
        let mut parts = data.splitn(3, |&b| b == ENVELOPE_SEPARATOR as u8);
        let mark = parts.next().unwrap_or_default();
        if mark != ENVELOPE_MAGIC.as_bytes() {
            let shown: String = mark.iter().take(16).copied().map(char::from).collect();
            return Err(EvoluError::MalformedProgram(format!(
                "missing {} mark at beginning (found {:?})",
                ENVELOPE_MAGIC, shown
            )));
        }
        let language = name(parts.next().unwrap_or_default());
        let genome = parts.next().unwrap_or_default().to_vec();
        Ok(Self { language, genome })
    }

    fn capacity(&self) -> usize {
        ENVELOPE_MAGIC.len() + self.language.len() + self.genome.len() + 2
    }

    /// Program text: the genome bytes become characters 0-255.
    pub fn to_source(&self) -> String {
        let mut out = String::with_capacity(self.capacity());
        out.push_str(ENVELOPE_MAGIC);
        out.push(ENVELOPE_SEPARATOR);
        out.push_str(&self.language);
        out.push(ENVELOPE_SEPARATOR);
        out.extend(self.genome.iter().copied().map(char::from));
        out
    }

    /// On-disk form: raw genome bytes after a UTF-8 header.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.capacity());
        out.extend_from_slice(ENVELOPE_MAGIC.as_bytes());
        out.push(ENVELOPE_SEPARATOR as u8);
        out.extend_from_slice(self.language.as_bytes());
        out.push(ENVELOPE_SEPARATOR as u8);
        out.extend_from_slice(&self.genome);
        out
    }
}

/// Save a program's envelope to file
pub fn save_to_file(code: &Code, path: impl AsRef<Path>) -> anyhow::Result<()> {
    let path = path.as_ref();
    let envelope = Envelope::new(code.language().name(), code.bytes().to_vec());
    let mut file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    file.write_all(&envelope.to_bytes())?;
    Ok(())
}

/// Load and compile a program envelope from file
pub fn load_from_file(registry: &Registry, path: impl AsRef<Path>) -> anyhow::Result<Code> {
    let path = path.as_ref();
    let mut file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let mut data = Vec::new();
    file.read_to_end(&mut data)?;
    let code = registry
        .compile_bytes(&data)
        .with_context(|| format!("Failed to compile {}", path.display()))?;
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::Param;
    use arbtest::arbtest;

    fn language() -> Language {
        let mut lang = Language::new("LNG");
        lang.define_command("a", CommandDef::new().params(["one", "two"]))
            .define_command("b", CommandDef::new());
        lang
    }

    fn shape(rules: &[Vec<Line>]) -> Vec<Vec<String>> {
        rules
            .iter()
            .map(|lines| lines.iter().map(|line| format!("{:?}", line)).collect())
            .collect()
    }

    #[test]
    fn test_decode_rules() {
        let lang = language();
        let rules = decode(&lang, &[128, 5, 0, 1, 128, 131, 2, 130, 128]);

        // Leading parameter has no opcode and is dropped; 5 % 3 selects `b`
        assert_eq!(
            shape(&rules),
            vec![vec!["b".to_string()], vec!["a two".to_string(), "b 256".to_string()]],
        );
        assert_eq!(rules[1][0].param, Some(Param::from("two")));
        assert_eq!(rules[1][1].param, Some(Param::Number(256)));
    }

    #[test]
    fn test_decode_empty_genome() {
        let rules = decode(&language(), &[]);
        assert_eq!(rules.len(), 1);
        assert!(rules[0].is_empty());
    }

    #[test]
    fn test_trailing_separator_opens_empty_rule() {
        let rules = decode(&language(), &[1, 0]);
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].len(), 1);
        assert!(rules[1].is_empty());
    }

    #[test]
    fn test_opcode_wraps_to_separator() {
        // 3 % 3 == 0
        let rules = decode(&language(), &[2, 3, 2]);
        assert_eq!(shape(&rules), vec![vec!["b".to_string()], vec!["b".to_string()]]);
    }

    #[test]
    fn test_lines_share_definitions() {
        let lang = language();
        let rules = decode(&lang, &[2]);
        assert!(Arc::ptr_eq(&rules[0][0].command, lang.command("b").unwrap()));
    }

    #[test]
    fn test_decode_is_total_and_deterministic() {
        let lang = language();
        arbtest(|u| {
            let bytes: Vec<u8> = u.arbitrary()?;
            let first = decode(&lang, &bytes);
            let second = decode(&lang, &bytes);
            assert_eq!(first, second);

            let separators = bytes
                .iter()
                .filter(|&&b| b & PARAM_FLAG == 0 && lang.resolve(u64::from(b)).is_separator())
                .count();
            assert_eq!(first.len(), separators + 1);
            Ok(())
        });
    }

    #[test]
    fn test_encode_param_groups() {
        let mut out = Vec::new();
        encode_param(&mut out, 3);
        assert_eq!(out, vec![131]);

        out.clear();
        encode_param(&mut out, 256);
        assert_eq!(out, vec![130, 128]);

        out.clear();
        encode_param(&mut out, 0);
        assert_eq!(out, vec![128]);
    }

    #[test]
    fn test_encode_param_decodes_back() {
        let mut lang = Language::new("LNG");
        lang.define_command("n", CommandDef::new());
        arbtest(|u| {
            let value: u64 = u.arbitrary()?;
            let mut bytes = vec![1];
            encode_param(&mut bytes, value);
            let rules = decode(&lang, &bytes);
            assert_eq!(rules[0][0].param, Some(Param::Number(value)));
            Ok(())
        });
    }

    #[test]
    fn test_long_parameter_selects_exact_label() {
        let mut lang = Language::new("LNG");
        lang.define_command("a", CommandDef::new().params(["a", "b", "c", "d", "e"]));

        // Ten full groups: 2^70 - 1, and 2^70 - 1 = 3 (mod 5)
        let mut bytes = vec![1];
        bytes.extend([0xFF; 10]);
        let rules = decode(&lang, &bytes);
        assert_eq!(rules[0][0].param, Some(Param::from("d")));
    }

    #[test]
    fn test_long_parameter_saturates_without_labels() {
        let mut lang = Language::new("LNG");
        lang.define_command("n", CommandDef::new());

        let mut bytes = vec![1];
        bytes.extend([0xFF; 10]);
        let rules = decode(&lang, &bytes);
        assert_eq!(rules[0][0].param, Some(Param::Number(u64::MAX)));
    }

    #[test]
    fn test_encode_opcode_limits() {
        let mut out = Vec::new();
        assert!(encode_opcode(&mut out, 5).is_some());
        assert!(encode_opcode(&mut out, 128).is_none());
        assert_eq!(out, vec![5]);
    }

    #[test]
    fn test_envelope_parse() {
        let env = Envelope::parse("EVOLU:LNG:abc").unwrap();
        assert_eq!(env.language, "LNG");
        assert_eq!(env.genome, vec![97, 98, 99]);
        assert_eq!(env.to_source(), "EVOLU:LNG:abc");
    }

    #[test]
    fn test_envelope_keeps_separator_bytes_in_genome() {
        let env = Envelope::parse("EVOLU:LNG:a:b").unwrap();
        assert_eq!(env.genome, b"a:b".to_vec());
        assert_eq!(env.to_source(), "EVOLU:LNG:a:b");
    }

    #[test]
    fn test_envelope_high_bytes() {
        let source = "EVOLU:LNG:\u{1}\u{80}\u{ff}";
        let env = Envelope::parse(source).unwrap();
        assert_eq!(env.genome, vec![1, 128, 255]);
        assert_eq!(env.to_source(), source);
    }

    #[test]
    fn test_envelope_rejects_missing_mark() {
        assert!(matches!(
            Envelope::parse("NO PROGRAM"),
            Err(EvoluError::MalformedProgram(_))
        ));
        assert!(matches!(
            Envelope::parse("evolu:LNG:abc"),
            Err(EvoluError::MalformedProgram(_))
        ));
    }

    #[test]
    fn test_envelope_rejects_wide_characters() {
        assert!(matches!(
            Envelope::parse("EVOLU:LNG:\u{100}"),
            Err(EvoluError::MalformedProgram(_))
        ));
    }

    #[test]
    fn test_envelope_bytes_roundtrip() {
        let env = Envelope::new("ODD-EVEN", vec![4, 128, 0, 58, 255]);
        assert_eq!(Envelope::from_bytes(&env.to_bytes()).unwrap(), env);
    }

    #[test]
    fn test_source_reproduces_genome() {
        let lang = Arc::new(language());
        let mut registry = Registry::new();
        registry.register(language());
        arbtest(|u| {
            let bytes: Vec<u8> = u.arbitrary()?;
            let expected: String = "EVOLU:LNG:"
                .chars()
                .chain(bytes.iter().copied().map(char::from))
                .collect();
            assert_eq!(lang.compile(&bytes).to_source(), expected);

            let code = registry.compile(&expected).unwrap();
            assert_eq!(code.bytes(), &bytes[..]);
            assert_eq!(code.to_source(), expected);
            Ok(())
        });
    }

    #[test]
    fn test_genome_file_roundtrip() {
        use tempfile::tempdir;

        let mut registry = Registry::new();
        registry.add("LNG", |lang| {
            lang.define_command("a", CommandDef::new().params(["one", "two"]));
        });
        let code = registry.compile("EVOLU:LNG:\u{1}\u{81}:\u{ff}").unwrap();

        let dir = tempdir().unwrap();
        let path = dir.path().join("program.evolu");
        save_to_file(&code, &path).unwrap();

        let raw = std::fs::read(&path).unwrap();
        assert_eq!(raw, b"EVOLU:LNG:\x01\x81:\xff".to_vec());

        let loaded = load_from_file(&registry, &path).unwrap();
        assert_eq!(loaded.bytes(), code.bytes());
        assert_eq!(loaded.to_source(), code.to_source());
    }

    #[test]
    fn test_load_missing_file() {
        let registry = Registry::new();
        let err = load_from_file(&registry, "definitely/does/not/exist.evolu").unwrap_err();
        assert!(err.to_string().contains("Failed to open"));
    }
}
